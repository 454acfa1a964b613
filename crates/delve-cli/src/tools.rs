//! Host-provided dynamic tools.

use chrono::Local;
use chrono::format::{Item, StrftimeItems};
use delve_agent::{ParamSpec, ParamType, ToolDescriptor, ToolFault, ToolRegistry};
use serde_json::Value;

const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Register every host tool on `registry`.
pub fn register(registry: &mut ToolRegistry) -> delve_agent::Result<()> {
    registry.register_fn(
        ToolDescriptor::new(
            "current_time",
            "Returns the current local date and time.\nThe format uses strftime syntax.",
        )
        .param(
            ParamSpec::new("format", ParamType::String)
                .describe("strftime format string")
                .with_default(DEFAULT_TIME_FORMAT),
        ),
        current_time,
    )
}

fn current_time(arguments: Value) -> Result<Value, ToolFault> {
    let format = arguments
        .get("format")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_TIME_FORMAT);

    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(ToolFault::new(
            "ValueError",
            format!("invalid time format '{format}'"),
        ));
    }

    Ok(Value::String(Local::now().format(format).to_string()))
}

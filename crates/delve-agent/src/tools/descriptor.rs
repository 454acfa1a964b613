//! Declarative tool descriptors.
//!
//! A host describes each dynamic tool explicitly: its parameters, their
//! types and defaults, and a description.  The descriptor produces the JSON
//! schema the model sees and fills in defaults before validation.

use serde_json::{Map, Value, json};

use crate::llm::types::ToolSpec;

/// Parameter type, mapped onto JSON-schema primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamType {
    /// No declared type.  Treated as a string.
    #[default]
    Untyped,
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    pub fn json_type(self) -> &'static str {
        match self {
            Self::Untyped | Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

/// One named parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub param_type: ParamType,
    pub description: Option<String>,
    /// Parameters with a default are optional.
    pub default: Option<Value>,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: None,
            default: None,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// Everything the registry needs to expose a dynamic tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    /// First non-blank line of the description, or a generic sentence when
    /// there is none.
    pub fn summary(&self) -> String {
        self.description
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_owned)
            .unwrap_or_else(|| format!("Executes the {} tool.", self.name))
    }

    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for param in &self.params {
            let mut property = Map::new();
            property.insert("type".into(), param.param_type.json_type().into());
            let description = param
                .description
                .clone()
                .unwrap_or_else(|| format!("Parameter '{}'", param.name));
            property.insert("description".into(), description.into());
            if let Some(default) = &param.default {
                property.insert("default".into(), default.clone());
            }
            properties.insert(param.name.clone(), Value::Object(property));

            if param.is_required() {
                required.push(Value::String(param.name.clone()));
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    pub fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name.clone(),
            description: self.summary(),
            input_schema: self.input_schema(),
        }
    }

    /// Fill in defaults for parameters the caller left out.  A missing
    /// argument object counts as empty.
    pub fn apply_defaults(&self, arguments: Value) -> Value {
        let mut map = match arguments {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => return other,
        };
        for param in &self.params {
            if let Some(default) = &param.default {
                map.entry(param.name.clone()).or_insert_with(|| default.clone());
            }
        }
        Value::Object(map)
    }
}

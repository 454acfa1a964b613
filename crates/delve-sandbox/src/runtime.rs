//! Sandbox runtime.
//!
//! [`Sandbox`] is the main entry point: it owns the persistent [`Namespace`]
//! and the [`SandboxConfig`] limits, and evaluates snippets against them.

use serde::Serialize;

use crate::config::SandboxConfig;
use crate::interp::{Interpreter, Output};
use crate::modules;
use crate::namespace::{Bindings, Namespace};
use crate::parser::parse_program;
use crate::value::Value;

/// Outcome of one [`Sandbox::execute`] call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    /// Everything the snippet printed, including output produced before a
    /// fault.
    pub stdout: String,
    /// `"<fault-kind>: <message>"` when the snippet faulted.
    pub error: Option<String>,
    /// Bindings that are new or differ from the pre-call snapshot.
    pub changed_bindings: Bindings,
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// A persistent evaluation environment.
///
/// State written by one [`execute`](Sandbox::execute) call is visible to the
/// next.  Nothing isolates snippets from each other; the only restriction is
/// which native modules are bound at construction.
#[derive(Debug)]
pub struct Sandbox {
    config: SandboxConfig,
    namespace: Namespace,
    bound_modules: Vec<String>,
}

impl Sandbox {
    /// Create a sandbox, binding every known module in the allow-list.
    pub fn new(config: SandboxConfig) -> Self {
        let mut namespace = Namespace::new();
        let mut bound_modules: Vec<String> = Vec::new();

        for module in &config.allowed_modules {
            if !modules::is_known(module) {
                tracing::warn!(module = %module, "unknown module in allow-list, skipping");
                continue;
            }
            if bound_modules.contains(module) {
                continue;
            }
            namespace.insert(module.clone(), Value::Module(module.clone()));
            bound_modules.push(module.clone());
        }

        tracing::info!(
            modules = ?bound_modules,
            max_fuel = config.max_fuel,
            "sandbox initialized"
        );

        Self {
            config,
            namespace,
            bound_modules,
        }
    }

    /// Create a sandbox with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(SandboxConfig::default())
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Modules actually bound, in allow-list order.
    pub fn bound_modules(&self) -> &[String] {
        &self.bound_modules
    }

    /// Bind a value directly, as if a snippet had assigned it.
    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.namespace.insert(name, value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.namespace.get(name)
    }

    /// Run `code` against the persistent namespace.
    ///
    /// Never fails: syntax and runtime faults are reported through
    /// [`ExecutionResult::error`], and statements that ran before the fault
    /// keep their effects and output.
    pub fn execute(&mut self, code: &str) -> ExecutionResult {
        let before = self.namespace.snapshot();
        let mut out = Output::new(self.config.max_output_bytes);

        let outcome = parse_program(code).and_then(|program| {
            let mut interp =
                Interpreter::new(&mut self.namespace, &mut out, self.config.max_fuel);
            let result = interp.run(&program);
            tracing::debug!(
                statements = program.len(),
                fuel_used = interp.fuel_used(),
                "snippet evaluated"
            );
            result
        });

        let changed_bindings = self.namespace.diff(&before);
        let error = outcome.err().map(|fault| fault.to_string());
        if let Some(error) = &error {
            tracing::debug!(error = %error, "snippet faulted");
        }

        ExecutionResult {
            stdout: out.finish(),
            error,
            changed_bindings,
        }
    }
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::TRUNCATION_MARKER;
    use crate::value::MAX_NESTING_DEPTH;

    #[test]
    fn bindings_persist_across_calls() {
        let mut sandbox = Sandbox::with_defaults();

        let first = sandbox.execute("x = 1");
        assert!(first.is_success());
        assert_eq!(first.changed_bindings.get("x"), Some(&Value::Int(1)));

        let second = sandbox.execute("print(x)");
        assert_eq!(second.stdout, "1\n");
        assert!(second.changed_bindings.is_empty());
    }

    #[test]
    fn division_by_zero_is_reported_not_raised() {
        let mut sandbox = Sandbox::with_defaults();
        let result = sandbox.execute("1 / 0");
        assert_eq!(
            result,
            ExecutionResult {
                stdout: String::new(),
                error: Some("ZeroDivisionError: division by zero".into()),
                changed_bindings: Bindings::new(),
            }
        );
    }

    #[test]
    fn in_place_mutation_counts_as_change() {
        let mut sandbox = Sandbox::with_defaults();
        sandbox.execute("items = [1]");
        let result = sandbox.execute("items.append(2)");
        assert_eq!(
            result.changed_bindings.get("items"),
            Some(&Value::List(vec![Value::Int(1), Value::Int(2)]))
        );
    }

    #[test]
    fn effects_before_a_fault_survive() {
        let mut sandbox = Sandbox::with_defaults();
        let result = sandbox.execute("a = 5\nprint('before')\nb = a / 0\nc = 1");
        assert_eq!(result.stdout, "before\n");
        assert_eq!(
            result.error.as_deref(),
            Some("ZeroDivisionError: division by zero")
        );
        assert!(result.changed_bindings.contains_key("a"));
        assert!(sandbox.get("c").is_none());
    }

    #[test]
    fn syntax_error_changes_nothing() {
        let mut sandbox = Sandbox::with_defaults();
        let result = sandbox.execute("x = 1\ny = (2 +)");
        assert!(result.error.as_deref().unwrap().starts_with("SyntaxError:"));
        assert!(result.changed_bindings.is_empty());
        assert!(sandbox.get("x").is_none());
    }

    #[test]
    fn allow_list_controls_modules() {
        let config = SandboxConfig::new().with_allowed_modules(["math", "os", "math"]);
        let mut sandbox = Sandbox::new(config);
        assert_eq!(sandbox.bound_modules(), ["math".to_string()]);

        assert_eq!(sandbox.execute("print(math.floor(2.5))").stdout, "2\n");
        let result = sandbox.execute("json.dumps(1)");
        assert_eq!(
            result.error.as_deref(),
            Some("NameError: name 'json' is not defined")
        );
    }

    #[test]
    fn modules_are_not_reported_as_changes() {
        let mut sandbox = Sandbox::with_defaults();
        let result = sandbox.execute("pass");
        assert!(result.changed_bindings.is_empty());
    }

    #[test]
    fn internal_names_are_hidden_from_diff() {
        let mut sandbox = Sandbox::with_defaults();
        let result = sandbox.execute("__scratch = 1\nvisible = 2");
        assert!(!result.changed_bindings.contains_key("__scratch"));
        assert!(result.changed_bindings.contains_key("visible"));
        assert_eq!(sandbox.get("__scratch"), Some(&Value::Int(1)));
    }

    #[test]
    fn fuel_exhaustion_is_a_timeout() {
        let mut sandbox = Sandbox::new(SandboxConfig::new().with_max_fuel(50));
        let result = sandbox.execute("n = 0\nwhile True { n += 1 }");
        assert_eq!(
            result.error.as_deref(),
            Some("TimeoutError: execution budget of 50 steps exhausted")
        );
        assert!(matches!(result.changed_bindings.get("n"), Some(Value::Int(n)) if *n > 0));
    }

    #[test]
    fn output_over_limit_is_truncated() {
        let mut sandbox = Sandbox::new(SandboxConfig::new().with_max_output_bytes(10));
        let result = sandbox.execute("for i in range(100) { print(i) }");
        assert!(result.is_success());
        assert!(result.stdout.len() <= 10 + TRUNCATION_MARKER.len() + 2);
        assert!(result.stdout.ends_with(&format!("{TRUNCATION_MARKER}\n")));
    }

    fn error_of(sandbox: &mut Sandbox, code: &str) -> String {
        sandbox
            .execute(code)
            .error
            .unwrap_or_else(|| panic!("expected a fault from {code:?}"))
    }

    const TOO_DEEP: &str = "RecursionError: maximum nesting depth exceeded";

    #[test]
    fn runaway_list_nesting_is_a_fault() {
        let mut sandbox = Sandbox::with_defaults();
        let result = sandbox.execute("x = []\nfor i in range(5000) { x = [x] }");
        assert_eq!(result.error.as_deref(), Some(TOO_DEEP));
        let x = sandbox.get("x").unwrap();
        assert_eq!(x.nesting_depth(MAX_NESTING_DEPTH + 1), MAX_NESTING_DEPTH);

        // The sandbox stays usable afterwards.
        assert_eq!(sandbox.execute("print(len(x))").stdout, "1\n");
    }

    #[test]
    fn every_way_of_growing_a_container_is_capped() {
        let mut sandbox = Sandbox::with_defaults();
        for code in [
            "d = {}\nfor i in range(5000) { d = {'k': d} }",
            "d = {}\nfor i in range(5000) { e = {}\ne['k'] = d\nd = e }",
            "x = []\nfor i in range(5000) { y = []\ny.append(x)\nx = y }",
            "x = []\nfor i in range(5000) { y = [0]\ny.insert(0, x)\nx = y }",
            "x = []\nfor i in range(5000) { y = []\ny.extend([x])\nx = y }",
            "d = {}\nfor i in range(5000) { e = {}\ne.update({'k': d})\nd = e }",
            "d = {}\nfor i in range(5000) { e = {}\ne.setdefault('k', d)\nd = e }",
            "x = [[]]\nfor i in range(5000) { x[0] = [x[0]] }",
        ] {
            assert_eq!(error_of(&mut sandbox, code), TOO_DEEP, "{code}");
        }
    }

    #[test]
    fn deeply_nested_json_is_a_fault() {
        let mut sandbox = Sandbox::with_defaults();
        let shallow = format!("x = json.loads('{}{}')", "[".repeat(120), "]".repeat(120));
        assert_eq!(error_of(&mut sandbox, &shallow), TOO_DEEP);

        let deep = format!("x = json.loads('{}{}')", "[".repeat(5000), "]".repeat(5000));
        assert!(error_of(&mut sandbox, &deep).starts_with("ValueError: invalid JSON"));
        assert!(sandbox.get("x").is_none());
    }

    #[test]
    fn long_expressions_are_syntax_errors() {
        let mut sandbox = Sandbox::with_defaults();
        for code in [
            format!("x = 1{}", " + 1".repeat(500)),
            format!("x = {}True", "not ".repeat(500)),
            format!("x = {}1", "-".repeat(500)),
        ] {
            let error = error_of(&mut sandbox, &code);
            assert!(error.starts_with("SyntaxError: expression too deeply nested"), "{error}");
        }
        let ok = sandbox.execute(&format!("x = 1{}", " + 1".repeat(40)));
        assert!(ok.is_success());
        assert_eq!(sandbox.get("x"), Some(&Value::Int(41)));
    }

    #[test]
    fn rereading_a_large_list_burns_fuel() {
        let mut sandbox = Sandbox::with_defaults();
        let result = sandbox.execute("x = range(40000)\nfor i in range(25000) { y = x }");
        assert_eq!(
            result.error.as_deref(),
            Some("TimeoutError: execution budget of 100000 steps exhausted")
        );
        assert!(matches!(sandbox.get("i"), Some(Value::Int(i)) if *i < 5));
    }

    #[test]
    fn huge_repetition_is_a_timeout() {
        let mut sandbox = Sandbox::with_defaults();
        for code in ["s = 'x' * 1000000000000", "xs = [0] * 1000000000"] {
            assert!(error_of(&mut sandbox, code).starts_with("TimeoutError"), "{code}");
        }
    }

    #[test]
    fn bound_values_are_visible_to_snippets() {
        let mut sandbox = Sandbox::with_defaults();
        sandbox.bind("rows", Value::List(vec![Value::Int(3), Value::Int(4)]));
        let result = sandbox.execute("print(sum(rows))");
        assert_eq!(result.stdout, "7\n");
    }
}

//! Generated system instructions.
//!
//! Used when the configuration does not supply a system prompt.  The text
//! lists every tool with its input schema, the modules bound in the sandbox,
//! the snippet-language rules, and the plan/act/observe workflow.

use std::fmt::Write;

use crate::llm::types::ToolSpec;

const PREAMBLE: &str = "\
You are an analysis agent. Work through the user's TASK one step at a time \
using the tools listed below, and keep going until the task is resolved.";

const WORKFLOW: &str = "\
## How to work

1. Plan: review progress and rewrite the plan with `set-plan`. Keep it a \
Markdown checklist, ticking finished items `[x]` and listing the next ones `[ ]`.
2. Act: pick the one tool call that best advances the plan and supply \
arguments that match its input schema exactly.
3. Observe: read the tool result that comes back, then plan again.

Before calling `finish`, summarize what you found with `record-findings`. \
The final answer must be delivered through `finish`.";

const SANDBOX_RULES: &str = "\
## Running code (`run-code`)

- The sandbox is stateful: variables defined in one call are still there in \
the next.
- Output comes only from `print(...)`; it is returned as `stdout`. A fault is \
returned as `error` in the form `Kind: message`.
- The language is small and dynamically typed. Blocks use braces: \
`if x > 1 { ... } elif x == 1 { ... } else { ... }`, `while cond { ... }`, \
`for item in items { ... }`. Statements end at a newline or `;`.
- Available values are None, True/False, integers, floats, strings, lists \
and dicts, with the usual operators, indexing and slicing.
- Built-in functions include print, len, str, repr, int, float, bool, list, \
dict, range, abs, min, max, sum, round, sorted, reversed, enumerate, zip and \
type.
- Long-running loops are stopped with a TimeoutError.";

const RULES: &str = "\
## Rules

- Reason briefly before each tool call and say why you chose it.
- Call one tool at a time and wait for its result.
- When a tool fails, read the error, adjust the plan and try another approach.";

/// Build the default system instructions.
pub fn system_instructions(tools: &[ToolSpec], allowed_modules: &[String]) -> String {
    let mut out = String::new();
    out.push_str(PREAMBLE);
    out.push_str("\n\n");
    out.push_str(WORKFLOW);
    out.push_str("\n\n## Tools\n");

    for tool in tools {
        let _ = write!(
            out,
            "\n### `{}`\n{}\nInput schema: {}\n",
            tool.name, tool.description, tool.input_schema
        );
    }

    out.push('\n');
    out.push_str(SANDBOX_RULES);
    let modules = if allowed_modules.is_empty() {
        "none".to_owned()
    } else {
        allowed_modules.join(", ")
    };
    let _ = write!(
        out,
        "\n- Pre-bound modules: {modules}. Call them as `module.function(...)`; \
         there is no import statement.\n\n"
    );
    out.push_str(RULES);
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Builtin;

    #[test]
    fn lists_every_tool_and_module() {
        let tools: Vec<_> = Builtin::ALL.iter().map(|b| b.spec()).collect();
        let modules = vec!["math".to_string(), "re".to_string()];
        let text = system_instructions(&tools, &modules);

        for tool in &tools {
            assert!(text.contains(&format!("### `{}`", tool.name)));
        }
        assert!(text.contains("\"required\":[\"code\"]"));
        assert!(text.contains("Pre-bound modules: math, re."));
        assert!(text.contains("record-findings"));
    }

    #[test]
    fn empty_allow_list_says_none() {
        let text = system_instructions(&[], &[]);
        assert!(text.contains("Pre-bound modules: none."));
    }
}

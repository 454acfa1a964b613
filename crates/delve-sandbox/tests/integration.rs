//! Integration tests for the delve-sandbox crate.
//!
//! These tests drive [`Sandbox::execute`] the way the agent's `run-code` tool
//! does: many snippets against one long-lived namespace.

use delve_sandbox::{MAX_NESTING_DEPTH, Sandbox, SandboxConfig, Value};

// ═══════════════════════════════════════════════════════════════════════
//  Multi-step analysis sessions
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn analysis_session_builds_up_state() {
    let mut sandbox = Sandbox::with_defaults();

    let load = sandbox.execute(
        r#"
rows = json.loads('[{"city": "Oslo", "temp": 4}, {"city": "Rome", "temp": 18}, {"city": "Cairo", "temp": 27}]')
temps = []
for row in rows {
    temps.append(row["temp"])
}
"#,
    );
    assert!(load.is_success(), "{load:?}");
    assert!(load.changed_bindings.contains_key("rows"));
    assert!(load.changed_bindings.contains_key("temps"));

    let summary = sandbox.execute(
        "avg = statistics.mean(temps)\nprint('avg', round(avg, 1))\nprint('max', max(temps))",
    );
    assert!(summary.is_success(), "{summary:?}");
    assert_eq!(summary.stdout, "avg 16.3\nmax 27\n");
    assert_eq!(summary.changed_bindings.len(), 1);
    assert!(summary.changed_bindings.contains_key("avg"));
}

#[test]
fn dict_counting_idiom() {
    let mut sandbox = Sandbox::with_defaults();
    let result = sandbox.execute(
        r#"
words = "the cat and the hat and the bat".split()
counts = {}
for w in words {
    counts[w] = counts.get(w, 0) + 1
}
top = sorted(counts.keys())
print(counts["the"], top[0])
"#,
    );
    assert!(result.is_success(), "{result:?}");
    assert_eq!(result.stdout, "3 and\n");
}

#[test]
fn regex_and_string_processing() {
    let mut sandbox = Sandbox::with_defaults();
    let result = sandbox.execute(
        r#"
log = "ERROR 12 disk; WARN 3 cpu; ERROR 7 net"
codes = []
for n in re.findall("ERROR (\\d+)", log) {
    codes.append(int(n))
}
print(sum(codes), "|".join(["a", "b"]).upper())
"#,
    );
    assert!(result.is_success(), "{result:?}");
    assert_eq!(result.stdout, "19 A|B\n");
}

#[test]
fn fault_mid_session_keeps_previous_state() {
    let mut sandbox = Sandbox::with_defaults();
    sandbox.execute("total = 10");

    let failed = sandbox.execute("total = total + 5\nmissing_fn()");
    assert_eq!(
        failed.error.as_deref(),
        Some("NameError: name 'missing_fn' is not defined")
    );
    assert_eq!(failed.changed_bindings.get("total"), Some(&Value::Int(15)));

    let after = sandbox.execute("print(total)");
    assert_eq!(after.stdout, "15\n");
}

#[test]
fn datetime_module_is_usable() {
    let mut sandbox = Sandbox::with_defaults();
    let result = sandbox.execute("year = datetime.strftime('%Y', 86400 * 366)\nprint(year)");
    assert!(result.is_success(), "{result:?}");
    assert_eq!(result.stdout, "1971\n");
}

// ═══════════════════════════════════════════════════════════════════════
//  Limits
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn empty_allow_list_binds_nothing() {
    let mut sandbox = Sandbox::new(SandboxConfig::new().with_allowed_modules(Vec::<String>::new()));
    assert!(sandbox.bound_modules().is_empty());
    let result = sandbox.execute("math.pi");
    assert_eq!(
        result.error.as_deref(),
        Some("NameError: name 'math' is not defined")
    );
}

#[test]
fn runaway_loop_is_stopped_and_sandbox_stays_usable() {
    let mut sandbox = Sandbox::new(SandboxConfig::new().with_max_fuel(1_000));
    let stuck = sandbox.execute("i = 0\nwhile i >= 0 { i += 1 }");
    assert!(stuck.error.as_deref().unwrap().starts_with("TimeoutError"));

    let next = sandbox.execute("print(i > 0)");
    assert_eq!(next.stdout, "True\n");
}

// ═══════════════════════════════════════════════════════════════════════
//  Hostile but valid input
// ═══════════════════════════════════════════════════════════════════════

/// Each limit turns into a fault string, and the namespace keeps working
/// for the next snippet.
#[test]
fn every_limit_reports_a_fault() {
    let mut sandbox = Sandbox::new(SandboxConfig::new().with_max_fuel(20_000));
    sandbox.execute("keep = 'still here'");

    let cases: Vec<(String, &str)> = vec![
        ("nest = []\nfor i in range(1000) { nest = [nest] }".into(), "RecursionError"),
        ("pairs = {}\nfor i in range(1000) { pairs = {'up': pairs} }".into(), "RecursionError"),
        (format!("total = 0{}", " + 1".repeat(1000)), "SyntaxError"),
        (format!("flag = {}False", "not ".repeat(1000)), "SyntaxError"),
        (format!("v = {}1{}", "(".repeat(1000), ")".repeat(1000)), "SyntaxError"),
        ("big = 'ab' * 100000000".into(), "TimeoutError"),
        ("xs = range(10000)\nwhile True { ys = xs }".into(), "TimeoutError"),
    ];
    for (code, kind) in &cases {
        let result = sandbox.execute(code);
        let error = result.error.unwrap_or_else(|| panic!("no fault for {code:.40}"));
        assert!(error.starts_with(kind), "{code:.40}: {error}");
    }

    assert_eq!(sandbox.execute("print(keep)").stdout, "still here\n");
    let nest = sandbox.get("nest").unwrap();
    assert!(nest.nesting_depth(MAX_NESTING_DEPTH + 1) <= MAX_NESTING_DEPTH);
}

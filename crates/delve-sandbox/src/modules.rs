//! Native modules that can be pre-bound into a sandbox namespace.
//!
//! Which of these are visible to snippets is decided by
//! [`crate::SandboxConfig::allowed_modules`].

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, Utc};
use regex::Regex;
use serde_json::Value as Json;

use crate::builtins::{arity, exactly, float_arg, float_to_int, int_arg, iterate, sort_values, str_arg};
use crate::error::{Fault, Result};
use crate::value::{NativeFn, Value};

/// Every module this crate knows how to provide.
pub const KNOWN_MODULES: &[&str] = &["math", "json", "datetime", "statistics", "re"];

pub fn is_known(module: &str) -> bool {
    KNOWN_MODULES.contains(&module)
}

const MATH_FUNCTIONS: &[&str] = &[
    "acos", "asin", "atan", "atan2", "ceil", "cos", "degrees", "exp", "fabs", "factorial", "floor",
    "gcd", "hypot", "isfinite", "isinf", "isnan", "log", "log10", "log2", "pow", "radians", "sin",
    "sqrt", "tan", "trunc",
];
const JSON_FUNCTIONS: &[&str] = &["dumps", "loads"];
const DATETIME_FUNCTIONS: &[&str] = &[
    "fromtimestamp",
    "now",
    "strftime",
    "timestamp",
    "today",
    "utcnow",
];
const STATISTICS_FUNCTIONS: &[&str] = &[
    "mean",
    "median",
    "mode",
    "pstdev",
    "pvariance",
    "stdev",
    "variance",
];
const RE_FUNCTIONS: &[&str] = &["findall", "fullmatch", "match", "search", "split", "sub"];

fn functions(module: &str) -> &'static [&'static str] {
    match module {
        "math" => MATH_FUNCTIONS,
        "json" => JSON_FUNCTIONS,
        "datetime" => DATETIME_FUNCTIONS,
        "statistics" => STATISTICS_FUNCTIONS,
        "re" => RE_FUNCTIONS,
        _ => &[],
    }
}

fn constant(module: &str, name: &str) -> Option<Value> {
    let value = match (module, name) {
        ("math", "pi") => std::f64::consts::PI,
        ("math", "e") => std::f64::consts::E,
        ("math", "tau") => std::f64::consts::TAU,
        ("math", "inf") => f64::INFINITY,
        ("math", "nan") => f64::NAN,
        _ => return None,
    };
    Some(Value::Float(value))
}

fn no_attribute(module: &str, name: &str) -> Fault {
    Fault::attribute(format!("module '{module}' has no attribute '{name}'"))
}

/// `module.name` without a call: a constant or a function reference.
pub(crate) fn attribute(module: &str, name: &str) -> Result<Value> {
    if let Some(value) = constant(module, name) {
        return Ok(value);
    }
    if functions(module).contains(&name) {
        return Ok(Value::Function(NativeFn::member(module, name)));
    }
    Err(no_attribute(module, name))
}

/// `module.name(args...)`.
pub(crate) fn call(module: &str, name: &str, args: Vec<Value>) -> Result<Value> {
    if !functions(module).contains(&name) {
        return match constant(module, name) {
            Some(value) => Err(Fault::type_error(format!(
                "'{}' object is not callable",
                value.type_name()
            ))),
            None => Err(no_attribute(module, name)),
        };
    }
    match module {
        "math" => math(name, args),
        "json" => json(name, args),
        "datetime" => datetime(name, args),
        "statistics" => statistics(name, args),
        _ => re(name, args),
    }
}

// ---------------------------------------------------------------------------
// math
// ---------------------------------------------------------------------------

fn domain_error() -> Fault {
    Fault::value("math domain error")
}

fn math(name: &str, args: Vec<Value>) -> Result<Value> {
    match name {
        "floor" | "ceil" | "trunc" => {
            let [x] = exactly::<1>(name, args)?;
            if let Some(i) = x.as_i64() {
                return Ok(Value::Int(i));
            }
            let x = float_arg(name, &x)?;
            float_to_int(match name {
                "floor" => x.floor(),
                "ceil" => x.ceil(),
                _ => x.trunc(),
            })
        }
        "factorial" => {
            let [n] = exactly::<1>(name, args)?;
            let n = int_arg(name, &n)?;
            if n < 0 {
                return Err(Fault::value("factorial() not defined for negative values"));
            }
            (2..=n)
                .try_fold(1i64, |acc, k| acc.checked_mul(k))
                .map(Value::Int)
                .ok_or_else(Fault::overflow)
        }
        "gcd" => {
            let mut acc: u64 = 0;
            for arg in &args {
                let mut b = int_arg(name, arg)?.unsigned_abs();
                let mut a = acc;
                while b != 0 {
                    (a, b) = (b, a % b);
                }
                acc = a;
            }
            i64::try_from(acc).map(Value::Int).map_err(|_| Fault::overflow())
        }
        "isnan" | "isinf" | "isfinite" => {
            let [x] = exactly::<1>(name, args)?;
            let x = float_arg(name, &x)?;
            Ok(Value::Bool(match name {
                "isnan" => x.is_nan(),
                "isinf" => x.is_infinite(),
                _ => x.is_finite(),
            }))
        }
        "log" => {
            arity(name, &args, 1, 2)?;
            let x = float_arg(name, &args[0])?;
            if x <= 0.0 {
                return Err(domain_error());
            }
            match args.get(1) {
                None => Ok(Value::Float(x.ln())),
                Some(base) => {
                    let base = float_arg(name, base)?;
                    if base <= 0.0 || base == 1.0 {
                        return Err(domain_error());
                    }
                    Ok(Value::Float(x.log(base)))
                }
            }
        }
        "pow" | "atan2" | "hypot" => {
            let [a, b] = exactly::<2>(name, args)?;
            let (a, b) = (float_arg(name, &a)?, float_arg(name, &b)?);
            Ok(Value::Float(match name {
                "pow" => a.powf(b),
                "atan2" => a.atan2(b),
                _ => a.hypot(b),
            }))
        }
        _ => {
            let [x] = exactly::<1>(name, args)?;
            let x = float_arg(name, &x)?;
            let result = match name {
                "sqrt" if x < 0.0 => return Err(domain_error()),
                "sqrt" => x.sqrt(),
                "log10" | "log2" if x <= 0.0 => return Err(domain_error()),
                "log10" => x.log10(),
                "log2" => x.log2(),
                "asin" | "acos" if !(-1.0..=1.0).contains(&x) => return Err(domain_error()),
                "asin" => x.asin(),
                "acos" => x.acos(),
                "exp" => x.exp(),
                "sin" => x.sin(),
                "cos" => x.cos(),
                "tan" => x.tan(),
                "atan" => x.atan(),
                "fabs" => x.abs(),
                "radians" => x.to_radians(),
                _ => x.to_degrees(),
            };
            Ok(Value::Float(result))
        }
    }
}

// ---------------------------------------------------------------------------
// json
// ---------------------------------------------------------------------------

fn json(name: &str, args: Vec<Value>) -> Result<Value> {
    match name {
        "dumps" => {
            arity(name, &args, 1, 2)?;
            let indent = match args.get(1) {
                None | Some(Value::None) => None,
                Some(n) => Some(usize::try_from(int_arg(name, n)?).unwrap_or(0)),
            };
            if args[0].has_non_finite() {
                return Err(Fault::value("Out of range float values are not JSON compliant"));
            }
            let mut out = String::new();
            render_json(&args[0].to_json(), indent, 0, &mut out);
            Ok(Value::Str(out))
        }
        _ => {
            let [text] = exactly::<1>(name, args)?;
            let parsed: Json = serde_json::from_str(str_arg(name, &text)?)
                .map_err(|e| Fault::value(format!("invalid JSON: {e}")))?;
            Ok(Value::from_json(&parsed))
        }
    }
}

/// Serialize with `", "` / `": "` separators, or one item per line when an
/// indent is given.
fn render_json(json: &Json, indent: Option<usize>, depth: usize, out: &mut String) {
    let newline = |out: &mut String, depth: usize| {
        if let Some(width) = indent {
            out.push('\n');
            out.push_str(&" ".repeat(width * depth));
        }
    };
    let item_sep = if indent.is_some() { "," } else { ", " };
    match json {
        Json::Array(items) if !items.is_empty() => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(item_sep);
                }
                newline(out, depth + 1);
                render_json(item, indent, depth + 1, out);
            }
            newline(out, depth);
            out.push(']');
        }
        Json::Object(map) if !map.is_empty() => {
            out.push('{');
            for (i, (key, value)) in map.iter().enumerate() {
                if i > 0 {
                    out.push_str(item_sep);
                }
                newline(out, depth + 1);
                out.push_str(&Json::String(key.clone()).to_string());
                out.push_str(": ");
                render_json(value, indent, depth + 1, out);
            }
            newline(out, depth);
            out.push('}');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

// ---------------------------------------------------------------------------
// datetime
// ---------------------------------------------------------------------------

const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

fn datetime(name: &str, args: Vec<Value>) -> Result<Value> {
    match name {
        "now" => {
            exactly::<0>(name, args)?;
            Ok(Value::str(Local::now().format(DISPLAY_FORMAT).to_string()))
        }
        "utcnow" => {
            exactly::<0>(name, args)?;
            Ok(Value::str(Utc::now().format(DISPLAY_FORMAT).to_string()))
        }
        "today" => {
            exactly::<0>(name, args)?;
            Ok(Value::str(Local::now().format("%Y-%m-%d").to_string()))
        }
        "timestamp" => {
            exactly::<0>(name, args)?;
            let now = Utc::now();
            Ok(Value::Float(
                now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1e6,
            ))
        }
        "fromtimestamp" => {
            let [ts] = exactly::<1>(name, args)?;
            let moment = from_timestamp(float_arg(name, &ts)?)?;
            Ok(Value::str(moment.format(DISPLAY_FORMAT).to_string()))
        }
        _ => {
            // strftime(format) formats local now; strftime(format, ts) a UTC timestamp.
            arity(name, &args, 1, 2)?;
            let format = str_arg(name, &args[0])?;
            let items: Vec<Item<'_>> = StrftimeItems::new(format).collect();
            if items.iter().any(|item| matches!(item, Item::Error)) {
                return Err(Fault::value(format!("invalid format string: {format:?}")));
            }
            let rendered = match args.get(1) {
                None => Local::now().format_with_items(items.into_iter()).to_string(),
                Some(ts) => from_timestamp(float_arg(name, ts)?)?
                    .format_with_items(items.into_iter())
                    .to_string(),
            };
            Ok(Value::Str(rendered))
        }
    }
}

fn from_timestamp(ts: f64) -> Result<DateTime<Utc>> {
    if !ts.is_finite() {
        return Err(Fault::value("timestamp out of range"));
    }
    let secs = ts.floor();
    let nanos = ((ts - secs) * 1e9) as u32;
    DateTime::from_timestamp(secs as i64, nanos)
        .ok_or_else(|| Fault::value("timestamp out of range"))
}

// ---------------------------------------------------------------------------
// statistics
// ---------------------------------------------------------------------------

fn statistics(name: &str, args: Vec<Value>) -> Result<Value> {
    let [data] = exactly::<1>(name, args)?;
    let data = iterate(data)?;
    for item in &data {
        if !item.is_number() {
            return Err(Fault::type_error(format!(
                "can't convert type '{}' to numerator/denominator",
                item.type_name()
            )));
        }
    }
    let floats: Vec<f64> = data.iter().filter_map(Value::as_f64).collect();
    let needed = if matches!(name, "stdev" | "variance") { 2 } else { 1 };
    if data.len() < needed {
        let noun = if needed == 2 { "two data points" } else { "one data point" };
        let what = if name == "stdev" { "variance" } else { name };
        return Err(Fault::value(format!("{what} requires at least {noun}")));
    }
    match name {
        "mean" => {
            let mean = floats.iter().sum::<f64>() / floats.len() as f64;
            let all_ints = data.iter().all(|v| matches!(v, Value::Int(_) | Value::Bool(_)));
            Ok(if all_ints && mean.fract() == 0.0 {
                float_to_int(mean)?
            } else {
                Value::Float(mean)
            })
        }
        "median" => {
            let mut sorted = data;
            sort_values(&mut sorted)?;
            let mid = sorted.len() / 2;
            if sorted.len() % 2 == 1 {
                return Ok(sorted[mid].clone());
            }
            let (a, b) = (
                sorted[mid - 1].as_f64().unwrap_or_default(),
                sorted[mid].as_f64().unwrap_or_default(),
            );
            Ok(Value::Float((a + b) / 2.0))
        }
        "mode" => {
            let mut best: Option<(&Value, usize)> = None;
            for candidate in &data {
                let count = data.iter().filter(|v| v.loose_eq(candidate)).count();
                if best.is_none_or(|(_, top)| count > top) {
                    best = Some((candidate, count));
                }
            }
            Ok(best.map(|(v, _)| v.clone()).unwrap_or_default())
        }
        _ => {
            let sample = matches!(name, "stdev" | "variance");
            let n = floats.len() as f64;
            let mean = floats.iter().sum::<f64>() / n;
            let squares: f64 = floats.iter().map(|x| (x - mean).powi(2)).sum();
            let variance = squares / if sample { n - 1.0 } else { n };
            Ok(Value::Float(if name.ends_with("stdev") {
                variance.sqrt()
            } else {
                variance
            }))
        }
    }
}

// ---------------------------------------------------------------------------
// re
// ---------------------------------------------------------------------------

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Fault::value(format!("invalid pattern: {e}")))
}

/// Rewrite `\1` and `\g<name>` back-references into the `${1}` form.
fn translate_replacement(repl: &str) -> String {
    let mut out = String::with_capacity(repl.len());
    let mut chars = repl.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '$' => out.push_str("$$"),
            '\\' => match chars.peek().copied() {
                Some(d) if d.is_ascii_digit() => {
                    let mut group = String::new();
                    while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                        group.push(d);
                        chars.next();
                    }
                    out.push_str(&format!("${{{group}}}"));
                }
                Some('g') => {
                    chars.next();
                    let mut group = String::new();
                    if chars.peek() == Some(&'<') {
                        chars.next();
                        for d in chars.by_ref() {
                            if d == '>' {
                                break;
                            }
                            group.push(d);
                        }
                    }
                    out.push_str(&format!("${{{group}}}"));
                }
                Some('n') => {
                    chars.next();
                    out.push('\n');
                }
                Some('\\') => {
                    chars.next();
                    out.push('\\');
                }
                _ => out.push('\\'),
            },
            other => out.push(other),
        }
    }
    out
}

fn re(name: &str, args: Vec<Value>) -> Result<Value> {
    match name {
        "search" | "match" | "fullmatch" => {
            let [pattern, text] = exactly::<2>(name, args)?;
            let (pattern, text) = (str_arg(name, &pattern)?, str_arg(name, &text)?);
            let regex = if name == "fullmatch" {
                compile(&format!("^(?:{pattern})$"))?
            } else {
                compile(pattern)?
            };
            let found = regex
                .find(text)
                .filter(|m| name == "search" || m.start() == 0);
            Ok(found.map_or(Value::None, |m| Value::str(m.as_str())))
        }
        "findall" => {
            let [pattern, text] = exactly::<2>(name, args)?;
            let regex = compile(str_arg(name, &pattern)?)?;
            let text = str_arg(name, &text)?;
            let group = |caps: &regex::Captures<'_>, i: usize| {
                Value::str(caps.get(i).map_or("", |m| m.as_str()))
            };
            let matches = regex
                .captures_iter(text)
                .map(|caps| match regex.captures_len() {
                    1 => group(&caps, 0),
                    2 => group(&caps, 1),
                    n => Value::List((1..n).map(|i| group(&caps, i)).collect()),
                })
                .collect();
            Ok(Value::List(matches))
        }
        "sub" => {
            arity(name, &args, 3, 4)?;
            let regex = compile(str_arg(name, &args[0])?)?;
            let replacement = translate_replacement(str_arg(name, &args[1])?);
            let text = str_arg(name, &args[2])?;
            let limit = match args.get(3) {
                None => 0,
                Some(count) => usize::try_from(int_arg(name, count)?).unwrap_or(0),
            };
            Ok(Value::str(
                regex.replacen(text, limit, replacement.as_str()).into_owned(),
            ))
        }
        _ => {
            let [pattern, text] = exactly::<2>(name, args)?;
            let regex = compile(str_arg(name, &pattern)?)?;
            Ok(Value::List(
                regex.split(str_arg(name, &text)?).map(Value::from).collect(),
            ))
        }
    }
}

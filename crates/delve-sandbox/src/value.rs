//! Runtime values of the snippet language.

use std::cmp::Ordering;
use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::Value as Json;

use crate::error::{Fault, FaultKind, Result};

/// Deepest list/dict nesting a value may reach.
pub const MAX_NESTING_DEPTH: usize = 100;

/// A value stored in the sandbox namespace.
///
/// Equality is structural (`Int(1) != Float(1.0)`), which is what the binding
/// diff needs.  The language-level `==` operator uses [`Value::loose_eq`].
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    /// Insertion-ordered key/value pairs.  Keys are never lists or dicts.
    Dict(Vec<(Value, Value)>),
    /// A pre-bound native module, by name.
    Module(String),
    /// A native function, either a global built-in or a module member.
    Function(NativeFn),
}

/// Reference to a native function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeFn {
    /// Owning module, or `None` for global built-ins such as `len`.
    pub module: Option<String>,
    pub name: String,
}

impl NativeFn {
    pub fn builtin(name: &str) -> Self {
        Self {
            module: None,
            name: name.to_owned(),
        }
    }

    pub fn member(module: &str, name: &str) -> Self {
        Self {
            module: Some(module.to_owned()),
            name: name.to_owned(),
        }
    }
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Self::Str(s.into())
    }

    /// The type name reported in fault messages and by `type()`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "NoneType",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Dict(_) => "dict",
            Self::Module(_) => "module",
            Self::Function(_) => "builtin_function_or_method",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::List(items) => !items.is_empty(),
            Self::Dict(entries) => !entries.is_empty(),
            Self::Module(_) | Self::Function(_) => true,
        }
    }

    /// Whether the value may be used as a dict key.
    pub fn is_hashable(&self) -> bool {
        !matches!(self, Self::List(_) | Self::Dict(_))
    }

    /// Numeric view used by arithmetic; booleans count as integers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Bool(b) => Some(f64::from(u8::from(*b))),
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Self::Bool(_) | Self::Int(_) | Self::Float(_))
    }

    /// Language-level equality: numbers compare across int/float.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_number() && b.is_number() => match (a.as_i64(), b.as_i64()) {
                (Some(x), Some(y)) => x == y,
                _ => a.as_f64() == b.as_f64(),
            },
            (Self::List(a), Self::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            (Self::Dict(a), Self::Dict(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| dict_get(b, k).is_some_and(|other| v.loose_eq(other)))
            }
            (a, b) => a == b,
        }
    }

    /// Ordering for `<`, `sorted`, `min` and `max`.
    pub fn compare(&self, other: &Value) -> Result<Ordering> {
        match (self, other) {
            (a, b) if a.is_number() && b.is_number() => match (a.as_i64(), b.as_i64()) {
                (Some(x), Some(y)) => Ok(x.cmp(&y)),
                _ => {
                    let (x, y) = (a.as_f64().unwrap_or_default(), b.as_f64().unwrap_or_default());
                    Ok(x.partial_cmp(&y).unwrap_or(Ordering::Equal))
                }
            },
            (Self::Str(a), Self::Str(b)) => Ok(a.cmp(b)),
            (Self::List(a), Self::List(b)) => {
                for (x, y) in a.iter().zip(b) {
                    match x.compare(y)? {
                        Ordering::Equal => continue,
                        unequal => return Ok(unequal),
                    }
                }
                Ok(a.len().cmp(&b.len()))
            }
            (a, b) => Err(Fault::type_error(format!(
                "'<' not supported between instances of '{}' and '{}'",
                a.type_name(),
                b.type_name()
            ))),
        }
    }

    /// The quoted representation used inside containers and by `repr()`.
    pub fn repr(&self) -> String {
        match self {
            Self::Str(s) => quote(s),
            other => other.to_string(),
        }
    }

    /// Container nesting depth: scalars are 0, `[]` is 1, `[[1]]` is 2.
    ///
    /// Counting stops one level past `limit`, so the walk never recurses
    /// deeper than `limit` frames.
    pub fn nesting_depth(&self, limit: usize) -> usize {
        match self {
            Self::List(_) | Self::Dict(_) if limit == 0 => 1,
            Self::List(items) => {
                1 + items
                    .iter()
                    .map(|item| item.nesting_depth(limit - 1))
                    .max()
                    .unwrap_or(0)
            }
            Self::Dict(entries) => {
                1 + entries
                    .iter()
                    .map(|(_, v)| v.nesting_depth(limit - 1))
                    .max()
                    .unwrap_or(0)
            }
            _ => 0,
        }
    }

    /// Whether any float inside the value is NaN or infinite.
    pub fn has_non_finite(&self) -> bool {
        match self {
            Self::Float(x) => !x.is_finite(),
            Self::List(items) => items.iter().any(Value::has_non_finite),
            Self::Dict(entries) => entries.iter().any(|(k, v)| k.has_non_finite() || v.has_non_finite()),
            _ => false,
        }
    }

    /// Convert to JSON for canonical storage and the `json` module.
    pub fn to_json(&self) -> Json {
        match self {
            Self::None => Json::Null,
            Self::Bool(b) => Json::Bool(*b),
            Self::Int(i) => Json::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Self::Str(s) => Json::String(s.clone()),
            Self::List(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Self::Dict(entries) => Json::Object(
                entries
                    .iter()
                    .map(|(k, v)| {
                        let key = match k {
                            Self::Str(s) => s.clone(),
                            other => other.to_string(),
                        };
                        (key, v.to_json())
                    })
                    .collect(),
            ),
            Self::Module(_) | Self::Function(_) => Json::String(self.to_string()),
        }
    }

    /// Build a value from JSON.  Numbers that fit `i64` become ints.
    pub fn from_json(json: &Json) -> Value {
        match json {
            Json::Null => Self::None,
            Json::Bool(b) => Self::Bool(*b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Self::Str(s.clone()),
            Json::Array(items) => Self::List(items.iter().map(Value::from_json).collect()),
            Json::Object(map) => Self::Dict(
                map.iter()
                    .map(|(k, v)| (Self::Str(k.clone()), Value::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => f.write_str(&format_float(*x)),
            Self::Str(s) => f.write_str(s),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(&item.repr())?;
                }
                f.write_str("]")
            }
            Self::Dict(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", k.repr(), v.repr())?;
                }
                f.write_str("}")
            }
            Self::Module(name) => write!(f, "<module '{name}'>"),
            Self::Function(func) => match &func.module {
                Some(module) => write!(f, "<built-in function {module}.{}>", func.name),
                None => write!(f, "<built-in function {}>", func.name),
            },
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

/// Fail when `value`, stored `base` levels below the top of a binding,
/// would push the binding past [`MAX_NESTING_DEPTH`].
pub fn check_nesting(value: &Value, base: usize) -> Result<()> {
    let room = MAX_NESTING_DEPTH.saturating_sub(base);
    if base > MAX_NESTING_DEPTH || value.nesting_depth(room) > room {
        return Err(Fault::new(
            FaultKind::Recursion,
            "maximum nesting depth exceeded",
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Dict helpers
// ---------------------------------------------------------------------------

pub fn dict_get<'a>(entries: &'a [(Value, Value)], key: &Value) -> Option<&'a Value> {
    entries.iter().find(|(k, _)| k.loose_eq(key)).map(|(_, v)| v)
}

pub fn dict_get_mut<'a>(entries: &'a mut [(Value, Value)], key: &Value) -> Option<&'a mut Value> {
    entries
        .iter_mut()
        .find(|(k, _)| k.loose_eq(key))
        .map(|(_, v)| v)
}

/// Insert or overwrite, keeping the original position of an existing key.
pub fn dict_insert(entries: &mut Vec<(Value, Value)>, key: Value, value: Value) -> Result<()> {
    if !key.is_hashable() {
        return Err(Fault::type_error(format!(
            "unhashable type: '{}'",
            key.type_name()
        )));
    }
    match dict_get_mut(entries, &key) {
        Some(slot) => *slot = value,
        None => entries.push((key, value)),
    }
    Ok(())
}

pub fn dict_remove(entries: &mut Vec<(Value, Value)>, key: &Value) -> Option<Value> {
    let pos = entries.iter().position(|(k, _)| k.loose_eq(key))?;
    Some(entries.remove(pos).1)
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

/// Render a float the way the language prints it: integral values keep a
/// trailing `.0`, very large or small magnitudes use exponent notation.
pub fn format_float(x: f64) -> String {
    if x.is_nan() {
        return "nan".into();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf".into() } else { "-inf".into() };
    }
    let magnitude = x.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        let rendered = format!("{x:e}");
        return match rendered.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp:0>2}"),
            Some((mantissa, exp)) => format!("{mantissa}e-{:0>2}", &exp[1..]),
            None => rendered,
        };
    }
    if x.fract() == 0.0 {
        format!("{x:.1}")
    } else {
        format!("{x}")
    }
}

/// Single quotes unless the text contains `'` and no `"`.
fn quote(s: &str) -> String {
    let delim = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(delim);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            c if c == delim => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out.push(delim);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_formatting() {
        assert_eq!(format_float(2.0), "2.0");
        assert_eq!(format_float(0.5), "0.5");
        assert_eq!(format_float(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(format_float(1e20), "1e+20");
        assert_eq!(format_float(1.5e-7), "1.5e-07");
        assert_eq!(format_float(f64::INFINITY), "inf");
    }

    #[test]
    fn container_display_uses_repr() {
        let v = Value::List(vec![Value::Int(1), Value::str("a"), Value::None]);
        assert_eq!(v.to_string(), "[1, 'a', None]");

        let d = Value::Dict(vec![(Value::str("k"), Value::Float(1.0))]);
        assert_eq!(d.to_string(), "{'k': 1.0}");
    }

    #[test]
    fn loose_equality_crosses_numeric_types() {
        assert!(Value::Int(1).loose_eq(&Value::Float(1.0)));
        assert!(Value::Bool(true).loose_eq(&Value::Int(1)));
        assert_ne!(Value::Int(1), Value::Float(1.0));
    }

    #[test]
    fn compare_mismatched_types_is_type_error() {
        let err = Value::Int(1).compare(&Value::str("a")).unwrap_err();
        assert_eq!(err.kind, crate::error::FaultKind::Type);
    }

    #[test]
    fn json_conversion() {
        let json = serde_json::json!({"a": [1, 2.5, "x", null, true]});
        let value = Value::from_json(&json);
        assert_eq!(value.to_json(), json);
    }

    #[test]
    fn dict_insert_keeps_position() {
        let mut entries = Vec::new();
        dict_insert(&mut entries, Value::str("a"), Value::Int(1)).unwrap();
        dict_insert(&mut entries, Value::str("b"), Value::Int(2)).unwrap();
        dict_insert(&mut entries, Value::str("a"), Value::Int(3)).unwrap();
        assert_eq!(
            Value::Dict(entries).to_string(),
            "{'a': 3, 'b': 2}"
        );
    }

    #[test]
    fn repr_picks_the_quote_that_avoids_escapes() {
        assert_eq!(Value::str("plain").repr(), "'plain'");
        assert_eq!(Value::str("a'b").repr(), "\"a'b\"");
        assert_eq!(Value::str("a'b\"c").repr(), "'a\\'b\"c'");
        assert_eq!(Value::str("say \"hi\"").repr(), "'say \"hi\"'");
    }

    #[test]
    fn nesting_depth_counts_containers() {
        assert_eq!(Value::Int(1).nesting_depth(10), 0);
        assert_eq!(Value::List(vec![]).nesting_depth(10), 1);
        let nested = Value::Dict(vec![(Value::str("k"), Value::List(vec![Value::List(vec![])]))]);
        assert_eq!(nested.nesting_depth(10), 3);
        assert_eq!(nested.nesting_depth(1), 2);
    }

    #[test]
    fn nesting_check_respects_the_base_level() {
        let mut value = Value::Int(0);
        for _ in 0..MAX_NESTING_DEPTH {
            value = Value::List(vec![value]);
        }
        assert!(check_nesting(&value, 0).is_ok());
        let err = check_nesting(&value, 1).unwrap_err();
        assert_eq!(err.to_string(), "RecursionError: maximum nesting depth exceeded");
        assert!(check_nesting(&Value::Int(1), MAX_NESTING_DEPTH + 1).is_err());
    }

    #[test]
    fn list_keys_are_unhashable() {
        let mut entries = Vec::new();
        let err = dict_insert(&mut entries, Value::List(vec![]), Value::None).unwrap_err();
        assert_eq!(err.to_string(), "TypeError: unhashable type: 'list'");
    }
}

//! Global built-in functions and the methods of `str`, `list` and `dict`.
//!
//! `print` and `range` are handled by the evaluator itself because they touch
//! captured output and the fuel budget; everything here is pure.

use std::cmp::Ordering;

use crate::error::{Fault, FaultKind, Result};
use crate::modules;
use crate::ops;
use crate::parser::BinOp;
use crate::value::{Value, dict_get, dict_insert, dict_remove};

/// Names resolvable without a binding.
pub const BUILTINS: &[&str] = &[
    "abs", "all", "any", "bool", "dict", "enumerate", "float", "int", "len", "list", "max", "min",
    "print", "range", "repr", "reversed", "round", "sorted", "str", "sum", "type", "zip",
];

pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

pub(crate) fn call(name: &str, args: Vec<Value>) -> Result<Value> {
    match name {
        "len" => {
            let [value] = exactly::<1>(name, args)?;
            let len = match &value {
                Value::Str(s) => s.chars().count(),
                Value::List(items) => items.len(),
                Value::Dict(entries) => entries.len(),
                other => {
                    return Err(Fault::type_error(format!(
                        "object of type '{}' has no len()",
                        other.type_name()
                    )));
                }
            };
            Ok(Value::Int(len as i64))
        }
        "str" => {
            arity(name, &args, 0, 1)?;
            Ok(Value::Str(args.first().map(ToString::to_string).unwrap_or_default()))
        }
        "repr" => {
            let [value] = exactly::<1>(name, args)?;
            Ok(Value::Str(value.repr()))
        }
        "int" => {
            arity(name, &args, 0, 1)?;
            match args.into_iter().next() {
                None => Ok(Value::Int(0)),
                Some(value) => to_int(&value),
            }
        }
        "float" => {
            arity(name, &args, 0, 1)?;
            match args.into_iter().next() {
                None => Ok(Value::Float(0.0)),
                Some(value) => to_float(&value).map(Value::Float),
            }
        }
        "bool" => {
            arity(name, &args, 0, 1)?;
            Ok(Value::Bool(args.first().is_some_and(Value::is_truthy)))
        }
        "list" => {
            arity(name, &args, 0, 1)?;
            match args.into_iter().next() {
                None => Ok(Value::List(Vec::new())),
                Some(value) => iterate(value).map(Value::List),
            }
        }
        "dict" => {
            arity(name, &args, 0, 1)?;
            match args.into_iter().next() {
                None => Ok(Value::Dict(Vec::new())),
                Some(Value::Dict(entries)) => Ok(Value::Dict(entries)),
                Some(other) => {
                    let mut entries = Vec::new();
                    for pair in iterate(other)? {
                        let [key, value] = pair_of(pair)?;
                        dict_insert(&mut entries, key, value)?;
                    }
                    Ok(Value::Dict(entries))
                }
            }
        }
        "abs" => {
            let [value] = exactly::<1>(name, args)?;
            match value {
                Value::Float(x) => Ok(Value::Float(x.abs())),
                other => match other.as_i64() {
                    Some(i) => i.checked_abs().map(Value::Int).ok_or_else(Fault::overflow),
                    None => Err(Fault::type_error(format!(
                        "bad operand type for abs(): '{}'",
                        other.type_name()
                    ))),
                },
            }
        }
        "min" | "max" => extremum(name, args),
        "sum" => {
            arity(name, &args, 1, 2)?;
            let mut args = args.into_iter();
            let items = iterate(args.next().unwrap_or_default())?;
            let mut total = args.next().unwrap_or(Value::Int(0));
            for item in items {
                if let Value::Str(_) = item {
                    return Err(Fault::type_error(
                        "unsupported operand type(s) for +: 'int' and 'str'",
                    ));
                }
                total = ops::binary_op(BinOp::Add, total, item)?;
            }
            Ok(total)
        }
        "round" => round(args),
        "sorted" => {
            let [value] = exactly::<1>(name, args)?;
            let mut items = iterate(value)?;
            sort_values(&mut items)?;
            Ok(Value::List(items))
        }
        "reversed" => {
            let [value] = exactly::<1>(name, args)?;
            let mut items = iterate(value)?;
            items.reverse();
            Ok(Value::List(items))
        }
        "enumerate" => {
            let [value] = exactly::<1>(name, args)?;
            let items = iterate(value)?;
            Ok(Value::List(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| Value::List(vec![Value::Int(i as i64), item]))
                    .collect(),
            ))
        }
        "zip" => {
            let columns = args.into_iter().map(iterate).collect::<Result<Vec<_>>>()?;
            let rows = columns.iter().map(Vec::len).min().unwrap_or(0);
            Ok(Value::List(
                (0..rows)
                    .map(|row| Value::List(columns.iter().map(|col| col[row].clone()).collect()))
                    .collect(),
            ))
        }
        "any" => {
            let [value] = exactly::<1>(name, args)?;
            Ok(Value::Bool(iterate(value)?.iter().any(Value::is_truthy)))
        }
        "all" => {
            let [value] = exactly::<1>(name, args)?;
            Ok(Value::Bool(iterate(value)?.iter().all(Value::is_truthy)))
        }
        "type" => {
            let [value] = exactly::<1>(name, args)?;
            Ok(Value::str(value.type_name()))
        }
        other => Err(Fault::name(other)),
    }
}

/// Call `name` on `receiver`.  Module receivers dispatch to the module.
pub(crate) fn call_method(receiver: &mut Value, name: &str, args: Vec<Value>) -> Result<Value> {
    match receiver {
        Value::Module(module) => modules::call(module, name, args),
        Value::List(items) => list_method(items, name, args),
        Value::Dict(entries) => dict_method(entries, name, args),
        Value::Str(s) => str_method(s, name, args),
        other => Err(no_attribute(other, name)),
    }
}

/// Attribute access without a call.
pub(crate) fn attribute(object: &Value, name: &str) -> Result<Value> {
    match object {
        Value::Module(module) => modules::attribute(module, name),
        other if has_method(other, name) => Err(Fault::type_error(format!(
            "method '{name}' of '{}' objects must be called",
            other.type_name()
        ))),
        other => Err(no_attribute(other, name)),
    }
}

const LIST_METHODS: &[&str] = &[
    "append", "clear", "copy", "count", "extend", "index", "insert", "pop", "remove", "reverse",
    "sort",
];
const DICT_METHODS: &[&str] = &[
    "clear", "copy", "get", "items", "keys", "pop", "setdefault", "update", "values",
];
const STR_METHODS: &[&str] = &[
    "count", "endswith", "find", "isalpha", "isdigit", "join", "lower", "lstrip", "replace",
    "rstrip", "split", "splitlines", "startswith", "strip", "upper",
];

fn has_method(value: &Value, name: &str) -> bool {
    match value {
        Value::List(_) => LIST_METHODS.contains(&name),
        Value::Dict(_) => DICT_METHODS.contains(&name),
        Value::Str(_) => STR_METHODS.contains(&name),
        _ => false,
    }
}

fn no_attribute(value: &Value, name: &str) -> Fault {
    Fault::attribute(format!(
        "'{}' object has no attribute '{name}'",
        value.type_name()
    ))
}

fn list_method(items: &mut Vec<Value>, name: &str, args: Vec<Value>) -> Result<Value> {
    match name {
        "append" => {
            let [value] = exactly::<1>(name, args)?;
            items.push(value);
            Ok(Value::None)
        }
        "extend" => {
            let [value] = exactly::<1>(name, args)?;
            items.extend(iterate(value)?);
            Ok(Value::None)
        }
        "insert" => {
            let [index, value] = exactly::<2>(name, args)?;
            let len = items.len() as i64;
            let index = int_arg(name, &index)?;
            let index = if index < 0 { (index + len).max(0) } else { index.min(len) };
            items.insert(index as usize, value);
            Ok(Value::None)
        }
        "pop" => {
            arity(name, &args, 0, 1)?;
            if items.is_empty() {
                return Err(Fault::index("pop from empty list"));
            }
            let index = match args.first() {
                None => items.len() - 1,
                Some(index) => list_index(items.len(), index)
                    .map_err(|_| Fault::index("pop index out of range"))?,
            };
            Ok(items.remove(index))
        }
        "remove" => {
            let [value] = exactly::<1>(name, args)?;
            let pos = items
                .iter()
                .position(|x| x.loose_eq(&value))
                .ok_or_else(|| Fault::value("list.remove(x): x not in list"))?;
            items.remove(pos);
            Ok(Value::None)
        }
        "index" => {
            let [value] = exactly::<1>(name, args)?;
            items
                .iter()
                .position(|x| x.loose_eq(&value))
                .map(|pos| Value::Int(pos as i64))
                .ok_or_else(|| Fault::value(format!("{} is not in list", value.repr())))
        }
        "count" => {
            let [value] = exactly::<1>(name, args)?;
            Ok(Value::Int(items.iter().filter(|x| x.loose_eq(&value)).count() as i64))
        }
        "clear" => {
            exactly::<0>(name, args)?;
            items.clear();
            Ok(Value::None)
        }
        "copy" => {
            exactly::<0>(name, args)?;
            Ok(Value::List(items.clone()))
        }
        "sort" => {
            exactly::<0>(name, args)?;
            sort_values(items)?;
            Ok(Value::None)
        }
        "reverse" => {
            exactly::<0>(name, args)?;
            items.reverse();
            Ok(Value::None)
        }
        _ => Err(no_attribute(&Value::List(Vec::new()), name)),
    }
}

fn dict_method(entries: &mut Vec<(Value, Value)>, name: &str, args: Vec<Value>) -> Result<Value> {
    match name {
        "get" => {
            arity(name, &args, 1, 2)?;
            let mut args = args.into_iter();
            let key = args.next().unwrap_or_default();
            let default = args.next().unwrap_or_default();
            Ok(dict_get(entries, &key).cloned().unwrap_or(default))
        }
        "keys" => {
            exactly::<0>(name, args)?;
            Ok(Value::List(entries.iter().map(|(k, _)| k.clone()).collect()))
        }
        "values" => {
            exactly::<0>(name, args)?;
            Ok(Value::List(entries.iter().map(|(_, v)| v.clone()).collect()))
        }
        "items" => {
            exactly::<0>(name, args)?;
            Ok(Value::List(
                entries
                    .iter()
                    .map(|(k, v)| Value::List(vec![k.clone(), v.clone()]))
                    .collect(),
            ))
        }
        "pop" => {
            arity(name, &args, 1, 2)?;
            let mut args = args.into_iter();
            let key = args.next().unwrap_or_default();
            match (dict_remove(entries, &key), args.next()) {
                (Some(value), _) => Ok(value),
                (None, Some(default)) => Ok(default),
                (None, None) => Err(Fault::key(key.repr())),
            }
        }
        "setdefault" => {
            arity(name, &args, 1, 2)?;
            let mut args = args.into_iter();
            let key = args.next().unwrap_or_default();
            if let Some(existing) = dict_get(entries, &key) {
                return Ok(existing.clone());
            }
            let default = args.next().unwrap_or_default();
            dict_insert(entries, key, default.clone())?;
            Ok(default)
        }
        "update" => {
            let [other] = exactly::<1>(name, args)?;
            let Value::Dict(other) = other else {
                return Err(Fault::type_error(format!(
                    "'{}' object is not a mapping",
                    other.type_name()
                )));
            };
            for (key, value) in other {
                dict_insert(entries, key, value)?;
            }
            Ok(Value::None)
        }
        "clear" => {
            exactly::<0>(name, args)?;
            entries.clear();
            Ok(Value::None)
        }
        "copy" => {
            exactly::<0>(name, args)?;
            Ok(Value::Dict(entries.clone()))
        }
        _ => Err(no_attribute(&Value::Dict(Vec::new()), name)),
    }
}

fn str_method(s: &str, name: &str, args: Vec<Value>) -> Result<Value> {
    match name {
        "upper" => {
            exactly::<0>(name, args)?;
            Ok(Value::str(s.to_uppercase()))
        }
        "lower" => {
            exactly::<0>(name, args)?;
            Ok(Value::str(s.to_lowercase()))
        }
        "strip" | "lstrip" | "rstrip" => {
            arity(name, &args, 0, 1)?;
            let chars: Option<Vec<char>> = match args.first() {
                None | Some(Value::None) => None,
                Some(other) => Some(str_arg(name, other)?.chars().collect()),
            };
            let matches = |c: char| match &chars {
                Some(set) => set.contains(&c),
                None => c.is_whitespace(),
            };
            let stripped = match name {
                "strip" => s.trim_matches(matches),
                "lstrip" => s.trim_start_matches(matches),
                _ => s.trim_end_matches(matches),
            };
            Ok(Value::str(stripped))
        }
        "split" => {
            arity(name, &args, 0, 1)?;
            let parts: Vec<Value> = match args.first() {
                None | Some(Value::None) => s.split_whitespace().map(Value::from).collect(),
                Some(sep) => {
                    let sep = str_arg(name, sep)?;
                    if sep.is_empty() {
                        return Err(Fault::value("empty separator"));
                    }
                    s.split(sep).map(Value::from).collect()
                }
            };
            Ok(Value::List(parts))
        }
        "splitlines" => {
            exactly::<0>(name, args)?;
            Ok(Value::List(s.lines().map(Value::from).collect()))
        }
        "join" => {
            let [items] = exactly::<1>(name, args)?;
            let mut parts = Vec::new();
            for (i, item) in iterate(items)?.into_iter().enumerate() {
                match item {
                    Value::Str(part) => parts.push(part),
                    other => {
                        return Err(Fault::type_error(format!(
                            "sequence item {i}: expected str instance, {} found",
                            other.type_name()
                        )));
                    }
                }
            }
            Ok(Value::Str(parts.join(s)))
        }
        "replace" => {
            let [old, new] = exactly::<2>(name, args)?;
            Ok(Value::Str(s.replace(str_arg(name, &old)?, str_arg(name, &new)?)))
        }
        "startswith" | "endswith" => {
            let [affix] = exactly::<1>(name, args)?;
            let affix = str_arg(name, &affix)?;
            Ok(Value::Bool(if name == "startswith" {
                s.starts_with(affix)
            } else {
                s.ends_with(affix)
            }))
        }
        "find" => {
            let [needle] = exactly::<1>(name, args)?;
            let needle = str_arg(name, &needle)?;
            Ok(Value::Int(match s.find(needle) {
                Some(byte) => s[..byte].chars().count() as i64,
                None => -1,
            }))
        }
        "count" => {
            let [needle] = exactly::<1>(name, args)?;
            let needle = str_arg(name, &needle)?;
            let count = if needle.is_empty() {
                s.chars().count() + 1
            } else {
                s.matches(needle).count()
            };
            Ok(Value::Int(count as i64))
        }
        "isdigit" => {
            exactly::<0>(name, args)?;
            Ok(Value::Bool(!s.is_empty() && s.chars().all(|c| c.is_ascii_digit())))
        }
        "isalpha" => {
            exactly::<0>(name, args)?;
            Ok(Value::Bool(!s.is_empty() && s.chars().all(char::is_alphabetic)))
        }
        _ => Err(no_attribute(&Value::str(""), name)),
    }
}

// ---------------------------------------------------------------------------
// Sequences
// ---------------------------------------------------------------------------

/// The items a `for` loop visits: list items, dict keys, or characters.
pub(crate) fn iterate(value: Value) -> Result<Vec<Value>> {
    match value {
        Value::List(items) => Ok(items),
        Value::Dict(entries) => Ok(entries.into_iter().map(|(k, _)| k).collect()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
        other => Err(Fault::type_error(format!(
            "'{}' object is not iterable",
            other.type_name()
        ))),
    }
}

/// Resolve a possibly negative index against a sequence of length `len`.
pub(crate) fn list_index(len: usize, index: &Value) -> Result<usize> {
    let Some(i) = index.as_i64() else {
        return Err(Fault::type_error(format!(
            "list indices must be integers or slices, not {}",
            index.type_name()
        )));
    };
    let resolved = if i < 0 { i + len as i64 } else { i };
    if resolved < 0 || resolved >= len as i64 {
        return Err(Fault::index("list index out of range"));
    }
    Ok(resolved as usize)
}

pub(crate) fn get_item(object: &Value, key: &Value) -> Result<Value> {
    match object {
        Value::List(items) => Ok(items[list_index(items.len(), key)?].clone()),
        Value::Dict(entries) => dict_get(entries, key)
            .cloned()
            .ok_or_else(|| Fault::key(key.repr())),
        Value::Str(s) => {
            let len = s.chars().count();
            let index = list_index(len, key).map_err(|e| match e.kind {
                FaultKind::Index => Fault::index("string index out of range"),
                _ => Fault::type_error("string indices must be integers"),
            })?;
            Ok(s.chars().nth(index).map(String::from).map_or(Value::None, Value::Str))
        }
        other => Err(not_subscriptable(other)),
    }
}

pub(crate) fn not_subscriptable(value: &Value) -> Fault {
    Fault::type_error(format!(
        "'{}' object is not subscriptable",
        value.type_name()
    ))
}

/// Clamp optional slice bounds to `0..=len` the way negative indices work.
pub(crate) fn slice_bounds(len: usize, start: Option<i64>, end: Option<i64>) -> (usize, usize) {
    let len = len as i64;
    let clamp = |i: i64| (if i < 0 { (i + len).max(0) } else { i.min(len) }) as usize;
    let start = start.map_or(0, clamp);
    let end = end.map_or(len as usize, clamp);
    (start, end.max(start))
}

/// In-place sort that surfaces the first comparison failure.
pub(crate) fn sort_values(items: &mut [Value]) -> Result<()> {
    let mut failure = None;
    items.sort_by(|a, b| {
        a.compare(b).unwrap_or_else(|e| {
            failure.get_or_insert(e);
            Ordering::Equal
        })
    });
    failure.map_or(Ok(()), Err)
}

/// Clamped range description used by `range()`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RangeSpec {
    start: i64,
    stop: i64,
    step: i64,
}

impl RangeSpec {
    pub(crate) fn from_args(args: &[Value]) -> Result<Self> {
        arity("range", args, 1, 3)?;
        let ints = args
            .iter()
            .map(|v| int_arg("range", v))
            .collect::<Result<Vec<_>>>()?;
        let (start, stop, step) = match ints[..] {
            [stop] => (0, stop, 1),
            [start, stop] => (start, stop, 1),
            [start, stop, step] => (start, stop, step),
            _ => return Err(Fault::type_error("range expected at most 3 arguments")),
        };
        let spec = Self { start, stop, step };
        if spec.step == 0 {
            return Err(Fault::value("range() arg 3 must not be zero"));
        }
        Ok(spec)
    }

    pub(crate) fn len(&self) -> u64 {
        let (span, step) = if self.step > 0 {
            (i128::from(self.stop) - i128::from(self.start), i128::from(self.step))
        } else {
            (i128::from(self.start) - i128::from(self.stop), -i128::from(self.step))
        };
        if span <= 0 {
            0
        } else {
            u64::try_from((span + step - 1) / step).unwrap_or(u64::MAX)
        }
    }

    pub(crate) fn values(&self) -> Vec<Value> {
        let step = self.step;
        (0..self.len())
            .map(|i| Value::Int(self.start.wrapping_add(step.wrapping_mul(i as i64))))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

pub(crate) fn to_int(value: &Value) -> Result<Value> {
    match value {
        Value::Float(x) => float_to_int(*x),
        Value::Str(s) => {
            let trimmed = s.trim().replace('_', "");
            trimmed.parse::<i64>().map(Value::Int).map_err(|_| {
                Fault::value(format!(
                    "invalid literal for int() with base 10: {}",
                    value.repr()
                ))
            })
        }
        other => other.as_i64().map(Value::Int).ok_or_else(|| {
            Fault::type_error(format!(
                "int() argument must be a string or a number, not '{}'",
                other.type_name()
            ))
        }),
    }
}

pub(crate) fn to_float(value: &Value) -> Result<f64> {
    match value {
        Value::Str(s) => {
            let trimmed = s.trim().to_ascii_lowercase();
            match trimmed.as_str() {
                "inf" | "+inf" | "infinity" => Ok(f64::INFINITY),
                "-inf" | "-infinity" => Ok(f64::NEG_INFINITY),
                "nan" => Ok(f64::NAN),
                _ => trimmed.parse::<f64>().map_err(|_| {
                    Fault::value(format!(
                        "could not convert string to float: {}",
                        value.repr()
                    ))
                }),
            }
        }
        other => other.as_f64().ok_or_else(|| {
            Fault::type_error(format!(
                "float() argument must be a string or a number, not '{}'",
                other.type_name()
            ))
        }),
    }
}

/// Truncate toward zero, rejecting NaN, infinities and out-of-range values.
pub(crate) fn float_to_int(x: f64) -> Result<Value> {
    if x.is_nan() {
        return Err(Fault::value("cannot convert float NaN to integer"));
    }
    if x.is_infinite() {
        return Err(Fault::new(
            FaultKind::Overflow,
            "cannot convert float infinity to integer",
        ));
    }
    let truncated = x.trunc();
    if truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
        return Err(Fault::overflow());
    }
    Ok(Value::Int(truncated as i64))
}

fn round(args: Vec<Value>) -> Result<Value> {
    arity("round", &args, 1, 2)?;
    let mut args = args.into_iter();
    let number = args.next().unwrap_or_default();
    let digits = match args.next() {
        None | Some(Value::None) => None,
        Some(d) => Some(int_arg("round", &d)?),
    };
    match (&number, digits) {
        (Value::Float(x), None) => float_to_int(x.round_ties_even()),
        (Value::Float(x), Some(d)) => {
            let factor = 10f64.powi(d.clamp(-308, 308) as i32);
            Ok(Value::Float((x * factor).round_ties_even() / factor))
        }
        (other, _) => match other.as_i64() {
            Some(i) => Ok(Value::Int(i)),
            None => Err(Fault::type_error(format!(
                "type {} doesn't define __round__ method",
                other.type_name()
            ))),
        },
    }
}

fn extremum(name: &str, args: Vec<Value>) -> Result<Value> {
    let items = match args.len() {
        0 => {
            return Err(Fault::type_error(format!(
                "{name} expected at least 1 argument, got 0"
            )));
        }
        1 => iterate(args.into_iter().next().unwrap_or_default())?,
        _ => args,
    };
    let mut iter = items.into_iter();
    let Some(mut best) = iter.next() else {
        return Err(Fault::value(format!("{name}() arg is an empty sequence")));
    };
    for item in iter {
        let ordering = item.compare(&best)?;
        let better = if name == "min" {
            ordering == Ordering::Less
        } else {
            ordering == Ordering::Greater
        };
        if better {
            best = item;
        }
    }
    Ok(best)
}

fn pair_of(value: Value) -> Result<[Value; 2]> {
    match value {
        Value::List(items) if items.len() == 2 => {
            let mut items = items.into_iter();
            Ok([items.next().unwrap_or_default(), items.next().unwrap_or_default()])
        }
        other => Err(Fault::value(format!(
            "dictionary update sequence element {} is not a pair",
            other.repr()
        ))),
    }
}

// ---------------------------------------------------------------------------
// Argument checking
// ---------------------------------------------------------------------------

pub(crate) fn arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<()> {
    let given = args.len();
    if (min..=max).contains(&given) {
        return Ok(());
    }
    let expected = if min == max {
        format!("exactly {min}")
    } else if given < min {
        format!("at least {min}")
    } else {
        format!("at most {max}")
    };
    let plural = if min == max && min == 1 { "" } else { "s" };
    Err(Fault::type_error(format!(
        "{name}() takes {expected} argument{plural} ({given} given)"
    )))
}

/// Destructure exactly `N` arguments.
pub(crate) fn exactly<const N: usize>(name: &str, args: Vec<Value>) -> Result<[Value; N]> {
    arity(name, &args, N, N)?;
    args.try_into()
        .map_err(|_| Fault::type_error(format!("{name}() received a malformed argument list")))
}

pub(crate) fn int_arg(name: &str, value: &Value) -> Result<i64> {
    value.as_i64().ok_or_else(|| {
        Fault::type_error(format!(
            "{name}(): '{}' object cannot be interpreted as an integer",
            value.type_name()
        ))
    })
}

pub(crate) fn float_arg(name: &str, value: &Value) -> Result<f64> {
    value.as_f64().ok_or_else(|| {
        Fault::type_error(format!(
            "{name}(): must be real number, not {}",
            value.type_name()
        ))
    })
}

pub(crate) fn str_arg<'v>(name: &str, value: &'v Value) -> Result<&'v str> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(Fault::type_error(format!(
            "{name}(): argument must be str, not {}",
            other.type_name()
        ))),
    }
}

//! Tree-walking evaluator.

use crate::builtins::{self, RangeSpec};
use crate::error::{Fault, FaultKind, Result};
use crate::modules;
use crate::namespace::Namespace;
use crate::ops;
use crate::parser::{BinOp, Expr, Stmt};
use crate::value::{NativeFn, Value, check_nesting, dict_get, dict_get_mut, dict_insert};

/// Appended to stdout when the capture limit was hit.
pub const TRUNCATION_MARKER: &str = "[output truncated]";

/// Captured stdout with a byte cap.
#[derive(Debug)]
pub(crate) struct Output {
    buf: String,
    limit: usize,
    truncated: bool,
}

impl Output {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            buf: String::new(),
            limit,
            truncated: false,
        }
    }

    pub(crate) fn write(&mut self, text: &str) {
        if self.truncated {
            return;
        }
        let room = self.limit.saturating_sub(self.buf.len());
        if text.len() <= room {
            self.buf.push_str(text);
            return;
        }
        let mut cut = room;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        self.buf.push_str(&text[..cut]);
        self.truncated = true;
    }

    pub(crate) fn finish(self) -> String {
        let mut buf = self.buf;
        if self.truncated {
            if !buf.is_empty() && !buf.ends_with('\n') {
                buf.push('\n');
            }
            buf.push_str(TRUNCATION_MARKER);
            buf.push('\n');
        }
        buf
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Normal,
    Break,
    Continue,
}

/// A storage location: a binding plus a chain of subscript keys.
struct Place {
    root: String,
    keys: Vec<Value>,
}

pub(crate) struct Interpreter<'a> {
    ns: &'a mut Namespace,
    out: &'a mut Output,
    fuel: u64,
    budget: u64,
}

impl<'a> Interpreter<'a> {
    pub(crate) fn new(ns: &'a mut Namespace, out: &'a mut Output, budget: u64) -> Self {
        Self {
            ns,
            out,
            fuel: budget,
            budget,
        }
    }

    pub(crate) fn fuel_used(&self) -> u64 {
        self.budget - self.fuel
    }

    /// Run a parsed program.  Effects of statements that completed before a
    /// fault stay in the namespace.
    pub(crate) fn run(&mut self, program: &[Stmt]) -> Result<()> {
        self.block(program).map(|_| ())
    }

    fn charge(&mut self, units: u64) -> Result<()> {
        match self.fuel.checked_sub(units) {
            Some(rest) => {
                self.fuel = rest;
                Ok(())
            }
            None => {
                self.fuel = 0;
                Err(Fault::new(
                    FaultKind::Timeout,
                    format!("execution budget of {} steps exhausted", self.budget),
                ))
            }
        }
    }

    // -- statements ---------------------------------------------------------

    fn block(&mut self, body: &[Stmt]) -> Result<Flow> {
        for stmt in body {
            let flow = self.statement(stmt)?;
            if flow != Flow::Normal {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    fn statement(&mut self, stmt: &Stmt) -> Result<Flow> {
        self.charge(1)?;
        match stmt {
            Stmt::Expr(expr) => {
                self.eval(expr)?;
            }
            Stmt::Assign { target, value } => {
                let place = self.resolve(target)?;
                let value = self.eval(value)?;
                self.store(place, value)?;
            }
            Stmt::AugAssign { target, op, value } => {
                let place = self.resolve(target)?;
                let current = self.load(&place)?;
                let rhs = self.eval(value)?;
                let updated = self.binary(*op, current, rhs)?;
                self.store(place, updated)?;
            }
            Stmt::If { branches, orelse } => {
                for (cond, body) in branches {
                    if self.eval(cond)?.is_truthy() {
                        return self.block(body);
                    }
                }
                return self.block(orelse);
            }
            Stmt::While { cond, body } => {
                while self.eval(cond)?.is_truthy() {
                    self.charge(1)?;
                    if self.block(body)? == Flow::Break {
                        break;
                    }
                }
            }
            Stmt::For { var, iter, body } => {
                let items = builtins::iterate(self.eval(iter)?)?;
                for item in items {
                    self.charge(1)?;
                    self.ns.insert(var.clone(), item);
                    if self.block(body)? == Flow::Break {
                        break;
                    }
                }
            }
            Stmt::Break => return Ok(Flow::Break),
            Stmt::Continue => return Ok(Flow::Continue),
            Stmt::Pass => {}
        }
        Ok(Flow::Normal)
    }

    // -- places -------------------------------------------------------------

    fn resolve(&mut self, target: &Expr) -> Result<Place> {
        match target {
            Expr::Name(name) => Ok(Place {
                root: name.clone(),
                keys: Vec::new(),
            }),
            Expr::Index { object, index } => {
                let mut place = self.resolve(object)?;
                place.keys.push(self.eval(index)?);
                Ok(place)
            }
            _ => Err(Fault::syntax("cannot assign to expression")),
        }
    }

    fn load(&mut self, place: &Place) -> Result<Value> {
        let root = self
            .ns
            .get(&place.root)
            .ok_or_else(|| Fault::name(&place.root))?;
        let value = match place.keys.split_last() {
            None => root.clone(),
            Some((last, inner)) => {
                let mut current = root;
                for key in inner {
                    current = item_ref(current, key)?;
                }
                builtins::get_item(current, last)?
            }
        };
        self.charge(clone_cost(&value))?;
        Ok(value)
    }

    fn place_mut(&mut self, root: &str, keys: &[Value]) -> Result<&mut Value> {
        let mut current = self.ns.get_mut(root).ok_or_else(|| Fault::name(root))?;
        for key in keys {
            current = item_mut(current, key)?;
        }
        Ok(current)
    }

    fn store(&mut self, place: Place, value: Value) -> Result<()> {
        let Place { root, mut keys } = place;
        if !keys.is_empty() {
            check_nesting(&value, keys.len())?;
        }
        let Some(last) = keys.pop() else {
            self.ns.insert(root, value);
            return Ok(());
        };
        let container = self.place_mut(&root, &keys)?;
        set_item(container, last, value)
    }

    // -- expressions --------------------------------------------------------

    fn eval(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Const(value) => Ok(value.clone()),
            Expr::Name(name) => self.lookup(name),
            Expr::List(items) => {
                let list = Value::List(self.eval_all(items)?);
                check_nesting(&list, 0)?;
                Ok(list)
            }
            Expr::Dict(pairs) => {
                let mut entries = Vec::with_capacity(pairs.len());
                for (k, v) in pairs {
                    let key = self.eval(k)?;
                    let value = self.eval(v)?;
                    dict_insert(&mut entries, key, value)?;
                }
                let dict = Value::Dict(entries);
                check_nesting(&dict, 0)?;
                Ok(dict)
            }
            Expr::Unary { op, operand } => {
                let operand = self.eval(operand)?;
                ops::unary_op(*op, operand)
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                self.binary(*op, left, right)
            }
            Expr::And(left, right) => {
                let left = self.eval(left)?;
                if left.is_truthy() {
                    self.eval(right)
                } else {
                    Ok(left)
                }
            }
            Expr::Or(left, right) => {
                let left = self.eval(left)?;
                if left.is_truthy() {
                    Ok(left)
                } else {
                    self.eval(right)
                }
            }
            Expr::Call { callee, args } => {
                let result = self.call(callee, args)?;
                check_nesting(&result, 0)?;
                Ok(result)
            }
            Expr::Attribute { object, name } => {
                let object = self.eval(object)?;
                builtins::attribute(&object, name)
            }
            Expr::Index { object, index } => {
                if expr.is_place() {
                    // Read through the binding instead of cloning the container.
                    let place = self.resolve(expr)?;
                    return self.load(&place);
                }
                let object = self.eval(object)?;
                let key = self.eval(index)?;
                builtins::get_item(&object, &key)
            }
            Expr::Slice { object, start, end } => {
                let object = self.eval(object)?;
                let start = self.slice_index(start.as_deref())?;
                let end = self.slice_index(end.as_deref())?;
                slice(&object, start, end)
            }
        }
    }

    fn eval_all(&mut self, exprs: &[Expr]) -> Result<Vec<Value>> {
        exprs.iter().map(|e| self.eval(e)).collect()
    }

    fn slice_index(&mut self, expr: Option<&Expr>) -> Result<Option<i64>> {
        let Some(expr) = expr else {
            return Ok(None);
        };
        match self.eval(expr)? {
            Value::None => Ok(None),
            other => other.as_i64().map(Some).ok_or_else(|| {
                Fault::type_error("slice indices must be integers or None")
            }),
        }
    }

    /// Read a binding.  Copying a container costs fuel in proportion to
    /// its size.
    fn lookup(&mut self, name: &str) -> Result<Value> {
        if let Some(value) = self.ns.get(name) {
            let value = value.clone();
            self.charge(clone_cost(&value))?;
            return Ok(value);
        }
        if builtins::is_builtin(name) {
            return Ok(Value::Function(NativeFn::builtin(name)));
        }
        Err(Fault::name(name))
    }

    fn binary(&mut self, op: BinOp, left: Value, right: Value) -> Result<Value> {
        if op == BinOp::Mul {
            if let Some(len) = ops::repetition_len(&left, &right) {
                self.charge(len as u64)?;
            }
        }
        ops::binary_op(op, left, right)
    }

    fn call(&mut self, callee: &Expr, args: &[Expr]) -> Result<Value> {
        if let Expr::Attribute { object, name } = callee {
            if object.is_place() {
                // Methods run against the stored value so mutations stick.
                let Place { root, keys } = self.resolve(object)?;
                let args = self.eval_all(args)?;
                self.charge(weight(&args))?;
                // An argument may end up one level inside the receiver.
                for arg in &args {
                    check_nesting(arg, keys.len() + 1)?;
                }
                let receiver = self.place_mut(&root, &keys)?;
                return builtins::call_method(receiver, name, args);
            }
            let mut receiver = self.eval(object)?;
            let args = self.eval_all(args)?;
            self.charge(weight(&args))?;
            for arg in &args {
                check_nesting(arg, 1)?;
            }
            return builtins::call_method(&mut receiver, name, args);
        }

        let function = self.eval(callee)?;
        let args = self.eval_all(args)?;
        match function {
            Value::Function(NativeFn { module: None, name }) => self.call_builtin(&name, args),
            Value::Function(NativeFn {
                module: Some(module),
                name,
            }) => {
                self.charge(weight(&args))?;
                modules::call(&module, &name, args)
            }
            other => Err(Fault::type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }

    fn call_builtin(&mut self, name: &str, args: Vec<Value>) -> Result<Value> {
        match name {
            "print" => {
                let line = args
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" ");
                self.out.write(&line);
                self.out.write("\n");
                Ok(Value::None)
            }
            "range" => {
                let spec = RangeSpec::from_args(&args)?;
                self.charge(spec.len())?;
                Ok(Value::List(spec.values()))
            }
            _ => {
                self.charge(weight(&args))?;
                builtins::call(name, args)
            }
        }
    }
}

/// Approximate work needed to process `values`: one unit per nested item.
fn weight(values: &[Value]) -> u64 {
    values
        .iter()
        .map(|value| match value {
            Value::List(items) => 1 + weight(items),
            Value::Dict(entries) => entries
                .iter()
                .map(|(k, v)| weight(std::slice::from_ref(k)) + weight(std::slice::from_ref(v)))
                .sum::<u64>()
                .saturating_add(1),
            Value::Str(s) => 1 + s.len() as u64 / 64,
            _ => 1,
        })
        .sum()
}

/// Fuel charged for copying a value out of the namespace.
fn clone_cost(value: &Value) -> u64 {
    match value {
        Value::List(_) | Value::Dict(_) => weight(std::slice::from_ref(value)),
        Value::Str(s) => s.len() as u64 / 64,
        _ => 0,
    }
}

fn item_ref<'v>(container: &'v Value, key: &Value) -> Result<&'v Value> {
    match container {
        Value::List(items) => Ok(&items[builtins::list_index(items.len(), key)?]),
        Value::Dict(entries) => dict_get(entries, key).ok_or_else(|| Fault::key(key.repr())),
        other => Err(builtins::not_subscriptable(other)),
    }
}

fn item_mut<'v>(container: &'v mut Value, key: &Value) -> Result<&'v mut Value> {
    match container {
        Value::List(items) => {
            let index = builtins::list_index(items.len(), key)?;
            Ok(&mut items[index])
        }
        Value::Dict(entries) => dict_get_mut(entries, key).ok_or_else(|| Fault::key(key.repr())),
        other => Err(builtins::not_subscriptable(other)),
    }
}

fn set_item(container: &mut Value, key: Value, value: Value) -> Result<()> {
    match container {
        Value::List(items) => {
            let index = builtins::list_index(items.len(), &key).map_err(|e| match e.kind {
                FaultKind::Index => Fault::index("list assignment index out of range"),
                _ => e,
            })?;
            items[index] = value;
            Ok(())
        }
        Value::Dict(entries) => dict_insert(entries, key, value),
        other => Err(Fault::type_error(format!(
            "'{}' object does not support item assignment",
            other.type_name()
        ))),
    }
}

fn slice(object: &Value, start: Option<i64>, end: Option<i64>) -> Result<Value> {
    match object {
        Value::List(items) => {
            let (from, to) = builtins::slice_bounds(items.len(), start, end);
            Ok(Value::List(items[from..to].to_vec()))
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let (from, to) = builtins::slice_bounds(chars.len(), start, end);
            Ok(Value::Str(chars[from..to].iter().collect()))
        }
        other => Err(builtins::not_subscriptable(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_program;

    fn run(src: &str) -> (Namespace, String, Result<()>) {
        let mut ns = Namespace::new();
        ns.insert("math", Value::Module("math".into()));
        let mut out = Output::new(1024);
        let result = {
            let program = parse_program(src).unwrap();
            let mut interp = Interpreter::new(&mut ns, &mut out, 10_000);
            interp.run(&program)
        };
        (ns, out.finish(), result)
    }

    #[test]
    fn arithmetic_and_print() {
        let (_, stdout, result) = run("x = 7 // 2\nprint(x, 7 / 2, 2 ** 10)");
        result.unwrap();
        assert_eq!(stdout, "3 3.5 1024\n");
    }

    #[test]
    fn nested_item_assignment() {
        let (ns, _, result) = run("d = {'a': [1, 2]}\nd['a'][0] = 9\nd['b'] = 3");
        result.unwrap();
        assert_eq!(ns.get("d").unwrap().to_string(), "{'a': [9, 2], 'b': 3}");
    }

    #[test]
    fn augmented_assignment_on_items() {
        let (ns, _, result) = run("counts = {'a': 1}\ncounts['a'] += 4\nn = 1\nn *= 3");
        result.unwrap();
        assert_eq!(ns.get("counts").unwrap().to_string(), "{'a': 5}");
        assert_eq!(ns.get("n"), Some(&Value::Int(3)));
    }

    #[test]
    fn methods_mutate_bindings() {
        let (ns, _, result) = run("xs = [3, 1]\nxs.append(2)\nxs.sort()");
        result.unwrap();
        assert_eq!(ns.get("xs").unwrap().to_string(), "[1, 2, 3]");
    }

    #[test]
    fn loops_with_break_and_continue() {
        let src = "total = 0\nfor i in range(10) {\n  if i % 2 == 0 { continue }\n  if i > 7 { break }\n  total += i\n}\nprint(total)";
        let (_, stdout, result) = run(src);
        result.unwrap();
        assert_eq!(stdout, "16\n");
    }

    #[test]
    fn while_loop_runs_out_of_fuel() {
        let (_, _, result) = run("while True { pass }");
        let err = result.unwrap_err();
        assert_eq!(err.kind, FaultKind::Timeout);
        assert_eq!(err.message, "execution budget of 10000 steps exhausted");
    }

    #[test]
    fn huge_range_is_charged_up_front() {
        let (ns, _, result) = run("xs = range(1000000000)");
        assert_eq!(result.unwrap_err().kind, FaultKind::Timeout);
        assert!(ns.get("xs").is_none());
    }

    #[test]
    fn short_circuit_returns_operand() {
        let (ns, _, result) = run("a = 0 or 'fallback'\nb = 1 and 2\nc = [] and undefined");
        result.unwrap();
        assert_eq!(ns.get("a"), Some(&Value::str("fallback")));
        assert_eq!(ns.get("b"), Some(&Value::Int(2)));
        assert_eq!(ns.get("c"), Some(&Value::List(vec![])));
    }

    #[test]
    fn slices_and_negative_indices() {
        let (_, stdout, result) = run("s = 'hello'\nxs = [1, 2, 3, 4]\nprint(s[1:3], s[-1], xs[:-1], xs[-2])");
        result.unwrap();
        assert_eq!(stdout, "el o [1, 2, 3] 3\n");
    }

    #[test]
    fn module_member_calls() {
        let (_, stdout, result) = run("print(math.sqrt(9))\nf = math.floor\nprint(f(2.7))");
        result.unwrap();
        assert_eq!(stdout, "3.0\n2\n");
    }

    #[test]
    fn undefined_name_is_name_error() {
        let (ns, _, result) = run("a = 1\nb = missing + 1\nc = 2");
        assert_eq!(result.unwrap_err().to_string(), "NameError: name 'missing' is not defined");
        assert!(ns.contains("a"));
        assert!(!ns.contains("c"));
    }

    #[test]
    fn index_errors() {
        let (_, _, result) = run("xs = [1]\nxs[5] = 0");
        assert_eq!(
            result.unwrap_err().to_string(),
            "IndexError: list assignment index out of range"
        );
        let (_, _, result) = run("d = {}\nd['k']");
        assert_eq!(result.unwrap_err().to_string(), "KeyError: 'k'");
        let (_, _, result) = run("s = 'ab'\ns[0] = 'x'");
        assert_eq!(
            result.unwrap_err().to_string(),
            "TypeError: 'str' object does not support item assignment"
        );
    }

    #[test]
    fn calling_a_non_function_fails() {
        let (_, _, result) = run("x = 3\nx()");
        assert_eq!(result.unwrap_err().to_string(), "TypeError: 'int' object is not callable");
    }

    #[test]
    fn builtins_can_be_shadowed() {
        let (ns, _, result) = run("len = 5\ny = len + 1");
        result.unwrap();
        assert_eq!(ns.get("y"), Some(&Value::Int(6)));
    }

    #[test]
    fn output_is_truncated_with_marker() {
        let mut out = Output::new(8);
        out.write("0123456789");
        out.write("more");
        assert_eq!(out.finish(), format!("01234567\n{TRUNCATION_MARKER}\n"));
    }
}

use std::collections::HashMap;

use tracing::info;

use crate::document::ScrollDirection;
use crate::script::ast::{BinOp, CmpOp, Expr, Stmt, StmtKind};
use crate::script::compiler::CompiledScript;
use crate::script::error::RunError;
use crate::script::runtime::{MatchQuery, Runtime};
use crate::script::value::{ElementHandle, Value};

/// Iterations a single loop may run before the run is aborted.
pub const MAX_LOOP_ITERATIONS: usize = 10_000;

/// Longest string `str * int` may build, in bytes.
const MAX_STRING_LEN: usize = 1 << 20;

enum Flow {
    Next,
    Break,
    Continue,
}

/// Tree-walking evaluator for compiled scripts.
pub struct Interpreter<'r, 'a> {
    runtime: &'r mut Runtime<'a>,
    script: &'r CompiledScript,
    vars: HashMap<String, Value>,
}

impl<'r, 'a> Interpreter<'r, 'a> {
    pub fn new(runtime: &'r mut Runtime<'a>, script: &'r CompiledScript) -> Self {
        Self {
            runtime,
            script,
            vars: HashMap::new(),
        }
    }

    pub fn run(mut self) -> Result<(), RunError> {
        let script = self.script;
        match self.exec_block(&script.program)? {
            Flow::Next => Ok(()),
            Flow::Break => Err(RunError::script("'break' outside loop")),
            Flow::Continue => Err(RunError::script("'continue' not properly in loop")),
        }
    }

    fn enter(&mut self, line: usize) {
        let statement = self.script.statement_ref(line);
        self.runtime.context_mut().set_statement(Some(statement));
    }

    fn exec_block(&mut self, stmts: &[Stmt]) -> Result<Flow, RunError> {
        for stmt in stmts {
            match self.exec(stmt)? {
                Flow::Next => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Next)
    }

    fn exec(&mut self, stmt: &Stmt) -> Result<Flow, RunError> {
        self.enter(stmt.line);

        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.eval(expr)?;
            }
            StmtKind::Assign { target, value } => {
                let value = self.eval(value)?;
                self.vars.insert(target.clone(), value);
            }
            StmtKind::AugAssign { target, op, value } => {
                let current = self.lookup(target)?;
                let rhs = self.eval(value)?;
                let updated = binary(*op, current, rhs)?;
                self.vars.insert(target.clone(), updated);
            }
            StmtKind::If { branches, orelse } => {
                for (cond, body) in branches {
                    if self.eval(cond)?.truthy() {
                        return self.exec_block(body);
                    }
                }
                return self.exec_block(orelse);
            }
            StmtKind::For { var, iter, body } => {
                let iterable = self.eval(iter)?;
                let items = self.iterate(iterable)?;
                for (count, item) in items.into_iter().enumerate() {
                    check_iterations(count + 1)?;
                    self.vars.insert(var.clone(), item);
                    if let Flow::Break = self.exec_block(body)? {
                        break;
                    }
                }
            }
            StmtKind::While { cond, body } => {
                let mut count = 0;
                loop {
                    self.enter(stmt.line);
                    if !self.eval(cond)?.truthy() {
                        break;
                    }
                    count += 1;
                    check_iterations(count)?;
                    if let Flow::Break = self.exec_block(body)? {
                        break;
                    }
                }
            }
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
            StmtKind::Pass => {}
        }
        Ok(Flow::Next)
    }

    fn lookup(&self, name: &str) -> Result<Value, RunError> {
        self.vars
            .get(name)
            .cloned()
            .ok_or_else(|| RunError::script(format!("name '{}' is not defined", name)))
    }

    fn iterate(&mut self, value: Value) -> Result<Vec<Value>, RunError> {
        match value {
            Value::List(items) => Ok(items),
            Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
            Value::Dict(entries) => Ok(entries.into_iter().map(|(k, _)| Value::Str(k)).collect()),
            Value::Element(handle) => Ok(self
                .runtime
                .children(&handle)?
                .into_iter()
                .map(Value::Element)
                .collect()),
            other => Err(RunError::script(format!(
                "'{}' object is not iterable",
                other.type_name()
            ))),
        }
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, RunError> {
        match expr {
            Expr::Int(i) => Ok(Value::Int(*i)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::NoneLit => Ok(Value::None),
            Expr::Name(name) => self.lookup(name),
            Expr::List(items) => Ok(Value::List(
                items.iter().map(|e| self.eval(e)).collect::<Result<_, _>>()?,
            )),
            Expr::Dict(entries) => {
                let mut out = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    let Value::Str(key) = self.eval(key)? else {
                        return Err(RunError::script("dict keys must be strings"));
                    };
                    let value = self.eval(value)?;
                    match out.iter_mut().find(|entry: &&mut (String, Value)| entry.0 == key) {
                        Some(slot) => slot.1 = value,
                        None => out.push((key, value)),
                    }
                }
                Ok(Value::Dict(out))
            }
            Expr::Neg(inner) => match self.eval(inner)? {
                Value::Int(i) => i
                    .checked_neg()
                    .map(Value::Int)
                    .ok_or_else(|| RunError::script("integer overflow")),
                other => Err(RunError::script(format!(
                    "bad operand type for unary -: '{}'",
                    other.type_name()
                ))),
            },
            Expr::Not(inner) => Ok(Value::Bool(!self.eval(inner)?.truthy())),
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                binary(*op, lhs, rhs)
            }
            Expr::Compare { op, lhs, rhs } => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                compare(*op, &lhs, &rhs).map(Value::Bool)
            }
            Expr::And(lhs, rhs) => {
                let lhs = self.eval(lhs)?;
                if !lhs.truthy() {
                    return Ok(lhs);
                }
                self.eval(rhs)
            }
            Expr::Or(lhs, rhs) => {
                let lhs = self.eval(lhs)?;
                if lhs.truthy() {
                    return Ok(lhs);
                }
                self.eval(rhs)
            }
            Expr::Call { name, args } => {
                let args = self.eval_args(args)?;
                self.call(name, args)
            }
            Expr::Method {
                receiver,
                name,
                args,
            } => {
                let target = self.eval(receiver)?;
                let args = self.eval_args(args)?;
                let (result, mutated) = self.method(target, name, args)?;
                if let (Some(updated), Expr::Name(var)) = (mutated, &**receiver) {
                    self.vars.insert(var.clone(), updated);
                }
                Ok(result)
            }
            Expr::Index { target, index } => {
                let target = self.eval(target)?;
                let index = self.eval(index)?;
                self.index(target, index)
            }
        }
    }

    fn eval_args(&mut self, args: &[Expr]) -> Result<Vec<Value>, RunError> {
        args.iter().map(|a| self.eval(a)).collect()
    }

    // ------------------------------------------------------------------------
    // Functions
    // ------------------------------------------------------------------------

    fn call(&mut self, name: &str, args: Vec<Value>) -> Result<Value, RunError> {
        match name {
            "element" => {
                let [Value::Str(element)] = args.as_slice() else {
                    return Err(RunError::script("element() takes one string"));
                };
                self.runtime.element(element).map(Value::Element)
            }
            "len" => {
                let [value] = args.as_slice() else {
                    return Err(arity(name, "exactly one argument", args.len()));
                };
                let n = match value {
                    Value::Str(s) => s.chars().count(),
                    Value::List(items) => items.len(),
                    Value::Dict(entries) => entries.len(),
                    Value::Element(handle) => self.runtime.len(handle)?,
                    other => {
                        return Err(RunError::script(format!(
                            "object of type '{}' has no len()",
                            other.type_name()
                        )));
                    }
                };
                Ok(Value::Int(n as i64))
            }
            "range" => {
                let bounds = args
                    .iter()
                    .map(|a| match a {
                        Value::Int(i) => Ok(*i),
                        other => Err(RunError::script(format!(
                            "range() takes integers, not '{}'",
                            other.type_name()
                        ))),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let (start, stop, step) = match bounds.as_slice() {
                    [stop] => (0, *stop, 1),
                    [start, stop] => (*start, *stop, 1),
                    [start, stop, step] => (*start, *stop, *step),
                    _ => return Err(arity(name, "1 to 3 arguments", args.len())),
                };
                if step == 0 {
                    return Err(RunError::script("range() step must not be zero"));
                }
                let mut items = Vec::new();
                let mut i = start;
                while (step > 0 && i < stop) || (step < 0 && i > stop) {
                    check_iterations(items.len() + 1)?;
                    items.push(Value::Int(i));
                    match i.checked_add(step) {
                        Some(next) => i = next,
                        None => break,
                    }
                }
                Ok(Value::List(items))
            }
            "str" => match args.as_slice() {
                [] => Ok(Value::Str(String::new())),
                [value] => Ok(Value::Str(value.to_string())),
                _ => Err(arity(name, "at most one argument", args.len())),
            },
            "int" => match args.as_slice() {
                [Value::Int(i)] => Ok(Value::Int(*i)),
                [Value::Bool(b)] => Ok(Value::Int(i64::from(*b))),
                [Value::Str(s)] => s.trim().parse().map(Value::Int).map_err(|_| {
                    RunError::script(format!("invalid literal for int(): '{}'", s))
                }),
                [other] => Err(RunError::script(format!(
                    "int() argument must be a string or a number, not '{}'",
                    other.type_name()
                ))),
                _ => Err(arity(name, "exactly one argument", args.len())),
            },
            "print" => {
                let line: Vec<String> = args.iter().map(Value::to_string).collect();
                info!(target: "script", "{}", line.join(" "));
                Ok(Value::None)
            }
            "back" | "enter" => {
                if !args.is_empty() {
                    return Err(arity(name, "no arguments", args.len()));
                }
                if name == "back" {
                    self.runtime.back()?;
                } else {
                    self.runtime.enter()?;
                }
                Ok(Value::None)
            }
            "tap" | "long_tap" | "set_text" | "scroll" | "get_text" | "get_attributes" => {
                let mut args = args.into_iter();
                let Some(Value::Element(handle)) = args.next() else {
                    return Err(RunError::script(format!(
                        "{}() takes an element as its first argument",
                        name
                    )));
                };
                self.element_method(&handle, name, args.collect())
            }
            _ => Err(RunError::script(format!("name '{}' is not defined", name))),
        }
    }

    // ------------------------------------------------------------------------
    // Methods
    // ------------------------------------------------------------------------

    /// Calls a method; the second value is the updated receiver for mutating
    /// list methods.
    fn method(
        &mut self,
        target: Value,
        name: &str,
        args: Vec<Value>,
    ) -> Result<(Value, Option<Value>), RunError> {
        match target {
            Value::Element(handle) => Ok((self.element_method(&handle, name, args)?, None)),
            Value::Str(s) => Ok((str_method(&s, name, &args)?, None)),
            Value::List(mut items) => match (name, args.as_slice()) {
                ("append", [item]) => {
                    items.push(item.clone());
                    Ok((Value::None, Some(Value::List(items))))
                }
                _ => Err(no_attribute("list", name)),
            },
            Value::Dict(entries) => {
                let dict = Value::Dict(entries);
                match (name, args.as_slice()) {
                    ("get", [Value::Str(key)]) => {
                        Ok((dict.dict_get(key).cloned().unwrap_or(Value::None), None))
                    }
                    ("get", [Value::Str(key), fallback]) => Ok((
                        dict.dict_get(key).cloned().unwrap_or_else(|| fallback.clone()),
                        None,
                    )),
                    ("keys", []) => {
                        let Value::Dict(entries) = dict else {
                            return Err(no_attribute("dict", name));
                        };
                        Ok((
                            Value::List(entries.into_iter().map(|(k, _)| Value::Str(k)).collect()),
                            None,
                        ))
                    }
                    _ => Err(no_attribute("dict", name)),
                }
            }
            other => Err(no_attribute(other.type_name(), name)),
        }
    }

    fn element_method(
        &mut self,
        handle: &ElementHandle,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Value, RunError> {
        match (name, args.as_slice()) {
            ("tap", rest) => {
                let inner = inner_handle(name, rest)?;
                self.runtime.tap(handle, inner).map(|_| Value::None)
            }
            ("long_tap", rest) => {
                let inner = inner_handle(name, rest)?;
                self.runtime.long_tap(handle, inner).map(|_| Value::None)
            }
            ("set_text", [text, rest @ ..]) => {
                let inner = inner_handle(name, rest)?;
                let text = match text {
                    Value::Str(s) => s.clone(),
                    other => other.to_string(),
                };
                self.runtime
                    .set_text(handle, &text, inner)
                    .map(|_| Value::None)
            }
            ("scroll", [Value::Str(direction)]) => {
                let direction: ScrollDirection = direction.parse().map_err(RunError::script)?;
                self.runtime.scroll(handle, direction).map(Value::Bool)
            }
            ("get_text", rest) => {
                let inner = inner_handle(name, rest)?;
                self.runtime.get_text(handle, inner).map(Value::Str)
            }
            ("get_attributes", rest) => {
                let inner = inner_handle(name, rest)?;
                self.runtime.get_attributes(handle, inner)
            }
            ("match", [query]) => {
                let query = MatchQuery::from_value(query)?;
                self.runtime
                    .match_element(handle, &query)
                    .map(Value::Element)
            }
            ("set_text" | "scroll" | "match", _) => Err(RunError::script(format!(
                "wrong arguments for {}.{}()",
                handle.name, name
            ))),
            _ => Err(no_attribute("element", name)),
        }
    }

    fn index(&mut self, target: Value, index: Value) -> Result<Value, RunError> {
        match (target, index) {
            (Value::Element(handle), Value::Int(n)) => {
                self.runtime.index(&handle, n).map(Value::Element)
            }
            (Value::List(items), Value::Int(n)) => {
                sequence_get(&items, n).cloned().ok_or_else(|| RunError::script("list index out of range"))
            }
            (Value::Str(s), Value::Int(n)) => {
                let chars: Vec<Value> = s.chars().map(|c| Value::Str(c.to_string())).collect();
                sequence_get(&chars, n)
                    .cloned()
                    .ok_or_else(|| RunError::script("string index out of range"))
            }
            (dict @ Value::Dict(_), Value::Str(key)) => dict
                .dict_get(&key)
                .cloned()
                .ok_or_else(|| RunError::script(format!("KeyError: '{}'", key))),
            (target, index) => Err(RunError::script(format!(
                "'{}' object cannot be indexed by '{}'",
                target.type_name(),
                index.type_name()
            ))),
        }
    }
}

fn check_iterations(count: usize) -> Result<(), RunError> {
    if count > MAX_LOOP_ITERATIONS {
        return Err(RunError::script(format!(
            "loop exceeded {} iterations",
            MAX_LOOP_ITERATIONS
        )));
    }
    Ok(())
}

fn arity(name: &str, expected: &str, given: usize) -> RunError {
    RunError::script(format!("{}() takes {} ({} given)", name, expected, given))
}

fn no_attribute(type_name: &str, name: &str) -> RunError {
    RunError::script(format!("'{}' object has no attribute '{}'", type_name, name))
}

fn inner_handle<'v>(name: &str, rest: &'v [Value]) -> Result<Option<&'v ElementHandle>, RunError> {
    match rest {
        [] => Ok(None),
        [Value::Element(inner)] => Ok(Some(inner)),
        _ => Err(RunError::script(format!(
            "{}() takes an optional inner element",
            name
        ))),
    }
}

fn sequence_get(items: &[Value], n: i64) -> Option<&Value> {
    let position = if n < 0 { items.len() as i64 + n } else { n };
    usize::try_from(position).ok().and_then(|p| items.get(p))
}

fn str_method(s: &str, name: &str, args: &[Value]) -> Result<Value, RunError> {
    let string_arg = |i: usize| match args.get(i) {
        Some(Value::Str(a)) => Ok(a.as_str()),
        _ => Err(RunError::script(format!("str.{}() takes string arguments", name))),
    };

    match name {
        "lower" => Ok(Value::Str(s.to_lowercase())),
        "upper" => Ok(Value::Str(s.to_uppercase())),
        "strip" => Ok(Value::Str(s.trim().to_string())),
        "startswith" => Ok(Value::Bool(s.starts_with(string_arg(0)?))),
        "endswith" => Ok(Value::Bool(s.ends_with(string_arg(0)?))),
        "replace" => Ok(Value::Str(s.replace(string_arg(0)?, string_arg(1)?))),
        "split" => {
            let parts: Vec<Value> = if args.is_empty() {
                s.split_whitespace().map(|p| Value::Str(p.to_string())).collect()
            } else {
                s.split(string_arg(0)?).map(|p| Value::Str(p.to_string())).collect()
            };
            Ok(Value::List(parts))
        }
        _ => Err(no_attribute("str", name)),
    }
}

fn type_error(op: &str, lhs: &Value, rhs: &Value) -> RunError {
    RunError::script(format!(
        "unsupported operand types for {}: '{}' and '{}'",
        op,
        lhs.type_name(),
        rhs.type_name()
    ))
}

fn overflow() -> RunError {
    RunError::script("integer overflow")
}

fn binary(op: BinOp, lhs: Value, rhs: Value) -> Result<Value, RunError> {
    match (op, &lhs, &rhs) {
        (_, Value::Int(a), Value::Int(b)) => int_binary(op, *a, *b).map(Value::Int),
        (BinOp::Add, Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{}{}", a, b))),
        (BinOp::Add, Value::List(a), Value::List(b)) => {
            Ok(Value::List(a.iter().chain(b.iter()).cloned().collect()))
        }
        (BinOp::Mul, Value::Str(s), Value::Int(n)) | (BinOp::Mul, Value::Int(n), Value::Str(s)) => {
            let count = usize::try_from(*n).unwrap_or(0);
            match s.len().checked_mul(count) {
                Some(len) if len <= MAX_STRING_LEN => Ok(Value::Str(s.repeat(count))),
                _ => Err(RunError::script("repeated string is too long")),
            }
        }
        (BinOp::Add, Value::Str(_), other) => Err(RunError::script(format!(
            "can only concatenate str (not \"{}\") to str",
            other.type_name()
        ))),
        _ => Err(type_error(op_symbol(op), &lhs, &rhs)),
    }
}

fn op_symbol(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::FloorDiv => "//",
        BinOp::Mod => "%",
    }
}

/// Integer arithmetic with floor division and divisor-signed modulo.
fn int_binary(op: BinOp, a: i64, b: i64) -> Result<i64, RunError> {
    let nonzero = || {
        if b == 0 {
            Err(RunError::script("division by zero"))
        } else {
            Ok(())
        }
    };
    match op {
        BinOp::Add => a.checked_add(b).ok_or_else(overflow),
        BinOp::Sub => a.checked_sub(b).ok_or_else(overflow),
        BinOp::Mul => a.checked_mul(b).ok_or_else(overflow),
        BinOp::Div => {
            nonzero()?;
            if a % b != 0 {
                return Err(RunError::script(
                    "'/' would produce a fraction; use '//' for integer division",
                ));
            }
            a.checked_div(b).ok_or_else(overflow)
        }
        BinOp::FloorDiv => {
            nonzero()?;
            let q = a.checked_div(b).ok_or_else(overflow)?;
            Ok(if a % b != 0 && ((a < 0) != (b < 0)) { q - 1 } else { q })
        }
        BinOp::Mod => {
            nonzero()?;
            let r = a.checked_rem(b).ok_or_else(overflow)?;
            Ok(if r != 0 && ((r < 0) != (b < 0)) { r + b } else { r })
        }
    }
}

fn compare(op: CmpOp, lhs: &Value, rhs: &Value) -> Result<bool, RunError> {
    use std::cmp::Ordering;

    let ordering = |lhs: &Value, rhs: &Value| -> Result<Ordering, RunError> {
        match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
            (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
            _ => Err(RunError::script(format!(
                "ordering not supported between '{}' and '{}'",
                lhs.type_name(),
                rhs.type_name()
            ))),
        }
    };

    match op {
        CmpOp::Eq => Ok(lhs == rhs),
        CmpOp::NotEq => Ok(lhs != rhs),
        CmpOp::Lt => Ok(ordering(lhs, rhs)? == Ordering::Less),
        CmpOp::Le => Ok(ordering(lhs, rhs)? != Ordering::Greater),
        CmpOp::Gt => Ok(ordering(lhs, rhs)? == Ordering::Greater),
        CmpOp::Ge => Ok(ordering(lhs, rhs)? != Ordering::Less),
        CmpOp::In => contains(rhs, lhs),
        CmpOp::NotIn => contains(rhs, lhs).map(|found| !found),
    }
}

fn contains(container: &Value, item: &Value) -> Result<bool, RunError> {
    match (container, item) {
        (Value::Str(haystack), Value::Str(needle)) => Ok(haystack.contains(needle.as_str())),
        (Value::List(items), item) => Ok(items.contains(item)),
        (Value::Dict(entries), Value::Str(key)) => Ok(entries.iter().any(|(k, _)| k == key)),
        _ => Err(RunError::script(format!(
            "'in' not supported between '{}' and '{}'",
            item.type_name(),
            container.type_name()
        ))),
    }
}

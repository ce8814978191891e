//! Interpreter for synthesized programs.
//!
//! The context's variables are implicitly in scope, as if the whole body ran
//! inside `with (context)`. Writes never reach the caller's [`Context`]: a
//! context variable that is assigned to is copied into the function scope
//! and shadowed there for the rest of the render.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::ast::*;
use crate::error::{InternalError, RenderError};
use crate::html::{add_slashes, escape_html, object_to_css_string};
use crate::synth::Program;
use crate::value::{format_number, Context, Value};

/// Run `program` against `context` and return the produced text.
pub fn render(program: &Program, context: &Context) -> Result<String, RenderError> {
    Evaluator::new(program, context).render()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Normal,
    Break,
    Continue,
}

#[derive(Debug)]
struct Binding {
    value: Value,
    constant: bool,
}

type EvalResult<T> = Result<T, RenderError>;

/// How far past its end an index assignment may grow an array.
const MAX_ARRAY_GAP: usize = 1 << 16;

/// Longest string `repeat` may build, in bytes.
const MAX_STRING_LEN: usize = 1 << 28;

pub struct Evaluator<'a> {
    program: &'a Program,
    context: &'a Context,
    // scopes[0] is the function scope: `var` and undeclared assignments.
    scopes: Vec<HashMap<String, Binding>>,
    output: String,
}

impl<'a> Evaluator<'a> {
    pub fn new(program: &'a Program, context: &'a Context) -> Self {
        Self {
            program,
            context,
            scopes: vec![HashMap::new()],
            output: String::new(),
        }
    }

    pub fn render(mut self) -> EvalResult<String> {
        let program = self.program;
        self.exec_block(&program.body)?;
        Ok(self.output)
    }

    // -----------------------------------------------------------------------
    // Scopes
    // -----------------------------------------------------------------------

    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, kind: DeclKind, name: &str, value: Option<Value>) {
        let constant = kind == DeclKind::Const;
        let scope = match kind {
            DeclKind::Var => self.scopes.first_mut(),
            DeclKind::Let | DeclKind::Const => self.scopes.last_mut(),
        };
        let Some(scope) = scope else {
            return;
        };
        // `var x;` keeps an existing value.
        if kind == DeclKind::Var && value.is_none() && scope.contains_key(name) {
            return;
        }
        scope.insert(
            name.to_string(),
            Binding {
                value: value.unwrap_or_default(),
                constant,
            },
        );
    }

    fn is_bound(&self, name: &str) -> bool {
        self.scopes.iter().any(|s| s.contains_key(name)) || self.context.contains(name)
    }

    fn get_var(&self, name: &str) -> EvalResult<Value> {
        for scope in self.scopes.iter().rev() {
            if let Some(binding) = scope.get(name) {
                return Ok(binding.value.clone());
            }
        }
        if let Some(value) = self.context.get(name) {
            return Ok(value.clone());
        }
        match name {
            "NaN" => Ok(Value::Number(f64::NAN)),
            "Infinity" => Ok(Value::Number(f64::INFINITY)),
            _ => Err(RenderError::Reference(name.to_string())),
        }
    }

    /// Mutable slot for `root` followed by `keys`, creating what assignment
    /// would create on the way. `rebind` marks a write to the variable itself.
    fn place_mut(&mut self, root: &str, keys: &[Value], rebind: bool) -> EvalResult<&mut Value> {
        let index = match self.scopes.iter().rposition(|s| s.contains_key(root)) {
            Some(index) => index,
            None => {
                let value = match self.context.get(root) {
                    Some(value) => value.clone(),
                    None if keys.is_empty() => Value::Undefined,
                    None => return Err(RenderError::Reference(root.to_string())),
                };
                self.scopes[0].insert(
                    root.to_string(),
                    Binding {
                        value,
                        constant: false,
                    },
                );
                0
            }
        };
        let Some(binding) = self.scopes[index].get_mut(root) else {
            return Err(RenderError::Reference(root.to_string()));
        };
        if binding.constant && rebind && keys.is_empty() {
            return Err(RenderError::Type("Assignment to constant variable.".into()));
        }

        let mut slot = &mut binding.value;
        for key in keys {
            slot = match slot {
                Value::Object(map) => map.entry(key.to_key()).or_insert(Value::Undefined),
                Value::Array(items) => match key.as_index() {
                    Some(i) if i.saturating_sub(items.len()) > MAX_ARRAY_GAP => {
                        return Err(RenderError::Range("Invalid array length".into()))
                    }
                    Some(i) => {
                        if i >= items.len() {
                            items.resize(i + 1, Value::Undefined);
                        }
                        &mut items[i]
                    }
                    None => {
                        return Err(RenderError::Type(format!(
                            "Cannot set property '{key}' of an array"
                        )))
                    }
                },
                other => {
                    return Err(RenderError::Type(format!(
                        "Cannot set properties of {other} (setting '{key}')"
                    )))
                }
            };
        }
        Ok(slot)
    }

    /// Root variable and evaluated keys of an assignable expression.
    fn resolve_place(&mut self, expr: &Expr) -> EvalResult<(String, Vec<Value>)> {
        match expr {
            Expr::Var(name) => Ok((name.clone(), Vec::new())),
            Expr::Member(base, name) => {
                let (root, mut keys) = self.resolve_place(base)?;
                keys.push(Value::String(name.clone()));
                Ok((root, keys))
            }
            Expr::Index(base, index) => {
                let (root, mut keys) = self.resolve_place(base)?;
                keys.push(self.eval(index)?);
                Ok((root, keys))
            }
            _ => Err(RenderError::Type("invalid assignment target".into())),
        }
    }

    fn read_place(&self, root: &str, keys: &[Value]) -> EvalResult<Value> {
        let mut value = self.get_var(root)?;
        for key in keys {
            value = get_member(&value, key)?;
        }
        Ok(value)
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    fn exec_block(&mut self, stmts: &[Stmt]) -> EvalResult<Flow> {
        for stmt in stmts {
            let flow = self.exec(stmt)?;
            if flow != Flow::Normal {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    fn scoped<T>(&mut self, f: impl FnOnce(&mut Self) -> EvalResult<T>) -> EvalResult<T> {
        self.push_scope();
        let result = f(self);
        self.pop_scope();
        result
    }

    fn exec(&mut self, stmt: &Stmt) -> EvalResult<Flow> {
        match stmt {
            Stmt::Emit(slot) => self.emit(*slot)?,
            Stmt::Expr(expr) => {
                self.eval(expr)?;
            }
            Stmt::Declare(kind, bindings) => {
                for (name, init) in bindings {
                    let value = init.as_ref().map(|e| self.eval(e)).transpose()?;
                    self.declare(*kind, name, value);
                }
            }
            Stmt::Block(stmts) => return self.scoped(|this| this.exec_block(stmts)),
            Stmt::If(cond, then, otherwise) => {
                if self.eval(cond)?.is_truthy() {
                    return self.exec(then);
                } else if let Some(otherwise) = otherwise {
                    return self.exec(otherwise);
                }
            }
            Stmt::While(cond, body) => {
                while self.eval(cond)?.is_truthy() {
                    if self.exec(body)? == Flow::Break {
                        break;
                    }
                }
            }
            Stmt::For {
                init,
                cond,
                update,
                body,
            } => {
                self.scoped(|this| {
                    if let Some(init) = init {
                        this.exec(init)?;
                    }
                    loop {
                        if let Some(cond) = cond {
                            if !this.eval(cond)?.is_truthy() {
                                break;
                            }
                        }
                        if this.exec(body)? == Flow::Break {
                            break;
                        }
                        if let Some(update) = update {
                            this.eval(update)?;
                        }
                    }
                    Ok(())
                })?;
            }
            Stmt::ForEach {
                kind,
                decl,
                name,
                iterable,
                body,
            } => {
                let items = iteration_items(*kind, self.eval(iterable)?)?;
                for item in items {
                    let flow = self.scoped(|this| {
                        match decl {
                            Some(decl) => this.declare(*decl, name, Some(item)),
                            None => *this.place_mut(name, &[], true)? = item,
                        }
                        this.exec(body)
                    })?;
                    if flow == Flow::Break {
                        break;
                    }
                }
            }
            Stmt::Break => return Ok(Flow::Break),
            Stmt::Continue => return Ok(Flow::Continue),
            Stmt::Empty => {}
        }
        Ok(Flow::Normal)
    }

    fn emit(&mut self, slot: usize) -> EvalResult<()> {
        let program = self.program;
        let Some(output) = program.outputs.get(slot) else {
            let err = InternalError(format!(
                "output slot {slot} out of range ({} slots)",
                program.outputs.len()
            ));
            tracing::error!(%err, "corrupt program");
            return Err(err.into());
        };
        match output {
            Output::Literal(text) => self.output.push_str(text),
            Output::Escaped(expr) => {
                let text = self.guarded(expr)?;
                self.output.push_str(&escape_html(&text));
            }
            Output::Raw(expr) => {
                let text = self.guarded(expr)?;
                self.output.push_str(&text);
            }
            Output::Unguarded(expr) => {
                let text = self.eval(expr)?.to_string();
                self.output.push_str(&text);
            }
        }
        Ok(())
    }

    /// String form of `expr`, or `undefined` when it names something unbound.
    fn guarded(&mut self, expr: &Expr) -> EvalResult<String> {
        match self.eval(expr) {
            Ok(value) => Ok(value.to_string()),
            Err(RenderError::Reference(_)) => Ok("undefined".to_string()),
            Err(err) => Err(err),
        }
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    fn eval(&mut self, expr: &Expr) -> EvalResult<Value> {
        Ok(match expr {
            Expr::Number(n) => Value::Number(*n),
            Expr::Str(s) => Value::String(s.clone()),
            Expr::Bool(b) => Value::Bool(*b),
            Expr::Null => Value::Null,
            Expr::Undefined => Value::Undefined,
            Expr::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.eval(item))
                    .collect::<EvalResult<_>>()?,
            ),
            Expr::Object(props) => {
                let mut map = IndexMap::with_capacity(props.len());
                for (key, value) in props {
                    let value = self.eval(value)?;
                    map.insert(key.clone(), value);
                }
                Value::Object(map)
            }
            Expr::Var(name) => self.get_var(name)?,
            Expr::Member(base, name) => {
                let base = self.eval(base)?;
                get_member(&base, &Value::String(name.clone()))?
            }
            Expr::Index(base, index) => {
                let base = self.eval(base)?;
                let index = self.eval(index)?;
                get_member(&base, &index)?
            }
            Expr::Call(callee, args) => self.call(callee, args)?,
            Expr::Unary(UnaryOp::Typeof, operand) => Value::from(self.type_of(operand)?),
            Expr::Unary(op, operand) => {
                let value = self.eval(operand)?;
                match op {
                    UnaryOp::Not => Value::Bool(!value.is_truthy()),
                    UnaryOp::Neg => Value::Number(-value.to_number()),
                    UnaryOp::Plus | UnaryOp::Typeof => Value::Number(value.to_number()),
                }
            }
            Expr::Binary(lhs, BinOp::And, rhs) => {
                let lhs = self.eval(lhs)?;
                if lhs.is_truthy() {
                    self.eval(rhs)?
                } else {
                    lhs
                }
            }
            Expr::Binary(lhs, BinOp::Or, rhs) => {
                let lhs = self.eval(lhs)?;
                if lhs.is_truthy() {
                    lhs
                } else {
                    self.eval(rhs)?
                }
            }
            Expr::Binary(lhs, op, rhs) => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                binary(*op, &lhs, &rhs)
            }
            Expr::Conditional(cond, then, otherwise) => {
                if self.eval(cond)?.is_truthy() {
                    self.eval(then)?
                } else {
                    self.eval(otherwise)?
                }
            }
            Expr::Assign(target, op, rhs) => {
                let (root, keys) = self.resolve_place(target)?;
                let value = match op {
                    AssignOp::Set => self.eval(rhs)?,
                    op => {
                        let current = self.read_place(&root, &keys)?;
                        let rhs = self.eval(rhs)?;
                        let op = match op {
                            AssignOp::Add => BinOp::Add,
                            AssignOp::Sub => BinOp::Sub,
                            AssignOp::Mul => BinOp::Mul,
                            AssignOp::Div | AssignOp::Set => BinOp::Div,
                        };
                        binary(op, &current, &rhs)
                    }
                };
                *self.place_mut(&root, &keys, true)? = value.clone();
                value
            }
            Expr::Update {
                target,
                increment,
                prefix,
            } => {
                let (root, keys) = self.resolve_place(target)?;
                let old = self.read_place(&root, &keys)?.to_number();
                let new = if *increment { old + 1.0 } else { old - 1.0 };
                *self.place_mut(&root, &keys, true)? = Value::Number(new);
                Value::Number(if *prefix { new } else { old })
            }
        })
    }

    /// `typeof`, which never fails on an unbound name.
    fn type_of(&mut self, operand: &Expr) -> EvalResult<&'static str> {
        if let Expr::Var(name) = operand {
            if !self.is_bound(name)
                && (self.context.function(name).is_some() || is_builtin_function(name))
            {
                return Ok("function");
            }
        }
        match self.eval(operand) {
            Ok(value) => Ok(value.type_of()),
            Err(RenderError::Reference(_)) => Ok("undefined"),
            Err(err) => Err(err),
        }
    }

    fn eval_args(&mut self, args: &[Expr]) -> EvalResult<Vec<Value>> {
        args.iter().map(|arg| self.eval(arg)).collect()
    }

    fn call(&mut self, callee: &Expr, args: &[Expr]) -> EvalResult<Value> {
        match callee {
            Expr::Var(name) => {
                let args = self.eval_args(args)?;
                if let Some(function) = self.context.function(name) {
                    return function(&args);
                }
                if let Some(result) = call_builtin(name, &args) {
                    return result;
                }
                if self.is_bound(name) {
                    Err(RenderError::Type(format!("{name} is not a function")))
                } else {
                    Err(RenderError::Reference(name.clone()))
                }
            }
            Expr::Member(base, method) => {
                if let Expr::Var(namespace) = base.as_ref() {
                    if !self.is_bound(namespace) {
                        let args = self.eval_args(args)?;
                        if let Some(result) = call_namespaced(namespace, method, &args) {
                            return result;
                        }
                        return Err(RenderError::Reference(namespace.clone()));
                    }
                }
                if is_mutating_method(method) && base.is_place() {
                    let args = self.eval_args(args)?;
                    let (root, keys) = self.resolve_place(base)?;
                    if let Value::Array(items) = self.place_mut(&root, &keys, false)? {
                        return Ok(mutate_array(items, method, args));
                    }
                    let receiver = self.read_place(&root, &keys)?;
                    return call_method(&receiver, method, &args);
                }
                let receiver = self.eval(base)?;
                let args = self.eval_args(args)?;
                call_method(&receiver, method, &args)
            }
            other => {
                let value = self.eval(other)?;
                Err(RenderError::Type(format!(
                    "{} is not a function",
                    describe(&value)
                )))
            }
        }
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", add_slashes(s)),
        other => other.to_string(),
    }
}

fn binary(op: BinOp, lhs: &Value, rhs: &Value) -> Value {
    let num = |f: fn(f64, f64) -> f64| Value::Number(f(lhs.to_number(), rhs.to_number()));
    let cmp = |accept: fn(std::cmp::Ordering) -> bool| {
        Value::Bool(lhs.compare(rhs).is_some_and(accept))
    };
    match op {
        BinOp::Add => lhs.add(rhs),
        BinOp::Sub => num(|a, b| a - b),
        BinOp::Mul => num(|a, b| a * b),
        BinOp::Div => num(|a, b| a / b),
        BinOp::Rem => num(|a, b| a % b),
        BinOp::Eq => Value::Bool(lhs.loose_eq(rhs)),
        BinOp::NotEq => Value::Bool(!lhs.loose_eq(rhs)),
        BinOp::StrictEq => Value::Bool(lhs.strict_eq(rhs)),
        BinOp::StrictNotEq => Value::Bool(!lhs.strict_eq(rhs)),
        BinOp::Lt => cmp(|o| o.is_lt()),
        BinOp::Le => cmp(|o| o.is_le()),
        BinOp::Gt => cmp(|o| o.is_gt()),
        BinOp::Ge => cmp(|o| o.is_ge()),
        // Short-circuiting operators are handled before both sides are evaluated.
        BinOp::And => {
            if lhs.is_truthy() {
                rhs.clone()
            } else {
                lhs.clone()
            }
        }
        BinOp::Or => {
            if lhs.is_truthy() {
                lhs.clone()
            } else {
                rhs.clone()
            }
        }
    }
}

fn get_member(value: &Value, key: &Value) -> EvalResult<Value> {
    let is_length = matches!(key, Value::String(k) if k == "length");
    Ok(match value {
        Value::Undefined | Value::Null => {
            return Err(RenderError::Type(format!(
                "Cannot read properties of {value} (reading '{key}')"
            )))
        }
        Value::Object(map) => map.get(&key.to_key()).cloned().unwrap_or_default(),
        Value::Array(items) if is_length => Value::from(items.len()),
        Value::Array(items) => key
            .as_index()
            .and_then(|i| items.get(i).cloned())
            .unwrap_or_default(),
        Value::String(s) if is_length => Value::from(s.chars().count()),
        Value::String(s) => key
            .as_index()
            .and_then(|i| s.chars().nth(i))
            .map(|c| Value::String(c.to_string()))
            .unwrap_or_default(),
        Value::Bool(_) | Value::Number(_) => Value::Undefined,
    })
}

fn iteration_items(kind: ForEachKind, value: Value) -> EvalResult<Vec<Value>> {
    let indices = |len: usize| -> Vec<Value> { (0..len).map(|i| Value::String(i.to_string())).collect() };
    Ok(match (kind, value) {
        (ForEachKind::In, Value::Object(map)) => map.into_keys().map(Value::String).collect(),
        (ForEachKind::In, Value::Array(items)) => indices(items.len()),
        (ForEachKind::In, Value::String(s)) => indices(s.chars().count()),
        (ForEachKind::In, _) => Vec::new(),
        (ForEachKind::Of, Value::Array(items)) => items,
        (ForEachKind::Of, Value::String(s)) => {
            s.chars().map(|c| Value::String(c.to_string())).collect()
        }
        (ForEachKind::Of, other) => {
            return Err(RenderError::Type(format!("{} is not iterable", describe(&other))))
        }
    })
}

// ---------------------------------------------------------------------------
// Built-ins
// ---------------------------------------------------------------------------

const BUILTIN_FUNCTIONS: &[&str] = &[
    "escapeHtml",
    "addSlashes",
    "objectToCssString",
    "String",
    "Number",
    "Boolean",
    "parseInt",
    "parseFloat",
    "isNaN",
    "$attr",
];

fn is_builtin_function(name: &str) -> bool {
    BUILTIN_FUNCTIONS.contains(&name)
}

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or_default()
}

fn call_builtin(name: &str, args: &[Value]) -> Option<EvalResult<Value>> {
    let first = arg(args, 0);
    Some(Ok(match name {
        "escapeHtml" => Value::String(escape_html(&first.to_string())),
        "addSlashes" => Value::String(add_slashes(&first.to_string())),
        "objectToCssString" => Value::String(object_to_css_string(&first)),
        "String" if args.is_empty() => Value::from(""),
        "String" => Value::String(first.to_string()),
        "Number" if args.is_empty() => Value::from(0),
        "Number" => Value::Number(first.to_number()),
        "Boolean" => Value::Bool(first.is_truthy()),
        "parseInt" => {
            let radix = args.get(1).map(|r| r.to_number());
            Value::Number(parse_int(&first.to_string(), radix))
        }
        "parseFloat" => Value::Number(parse_float(&first.to_string())),
        "isNaN" => Value::Bool(first.to_number().is_nan()),
        "$attr" => Value::String(render_attribute(&first.to_string(), &arg(args, 1))),
        _ => return None,
    }))
}

/// ` name="value"`, ` name` or nothing, depending on the bound value.
fn render_attribute(name: &str, value: &Value) -> String {
    match value {
        Value::Undefined | Value::Null | Value::Bool(false) => String::new(),
        Value::Bool(true) => format!(" {name}"),
        Value::Array(items) => {
            let joined: Vec<String> = items.iter().map(ToString::to_string).collect();
            format!(" {name}=\"{}\"", escape_html(&joined.join(" ")))
        }
        Value::Object(_) if name == "style" => {
            format!(" {name}=\"{}\"", escape_html(&object_to_css_string(value)))
        }
        other => format!(" {name}=\"{}\"", escape_html(&other.to_string())),
    }
}

fn call_namespaced(namespace: &str, name: &str, args: &[Value]) -> Option<EvalResult<Value>> {
    let first = arg(args, 0);
    let numbers = || args.iter().map(Value::to_number);
    let n = first.to_number();
    Some(Ok(match (namespace, name) {
        ("Math", "floor") => Value::Number(n.floor()),
        ("Math", "ceil") => Value::Number(n.ceil()),
        ("Math", "round") => Value::Number((n + 0.5).floor()),
        ("Math", "abs") => Value::Number(n.abs()),
        ("Math", "sqrt") => Value::Number(n.sqrt()),
        ("Math", "pow") => Value::Number(n.powf(arg(args, 1).to_number())),
        ("Math", "min") => Value::Number(numbers().fold(f64::INFINITY, |a, b| {
            if a.is_nan() || b.is_nan() {
                f64::NAN
            } else {
                a.min(b)
            }
        })),
        ("Math", "max") => Value::Number(numbers().fold(f64::NEG_INFINITY, |a, b| {
            if a.is_nan() || b.is_nan() {
                f64::NAN
            } else {
                a.max(b)
            }
        })),
        ("JSON", "stringify") => match first {
            Value::Undefined => Value::Undefined,
            value => match serde_json::to_string(&value.into_json()) {
                Ok(json) => Value::String(json),
                Err(err) => return Some(Err(RenderError::function("JSON.stringify", err.to_string()))),
            },
        },
        ("Object", "keys") => match first {
            Value::Object(map) => Value::Array(map.into_keys().map(Value::String).collect()),
            Value::Array(items) => Value::Array(
                (0..items.len()).map(|i| Value::String(i.to_string())).collect(),
            ),
            Value::Undefined | Value::Null => {
                return Some(Err(RenderError::Type(
                    "Cannot convert undefined or null to object".into(),
                )))
            }
            _ => Value::Array(Vec::new()),
        },
        ("Array", "isArray") => Value::Bool(matches!(first, Value::Array(_))),
        ("Math" | "JSON" | "Object" | "Array", _) => {
            return Some(Err(RenderError::Type(format!(
                "{namespace}.{name} is not a function"
            ))))
        }
        _ => return None,
    }))
}

fn is_mutating_method(name: &str) -> bool {
    matches!(name, "push" | "pop" | "reverse")
}

fn mutate_array(items: &mut Vec<Value>, method: &str, args: Vec<Value>) -> Value {
    match method {
        "push" => {
            items.extend(args);
            Value::from(items.len())
        }
        "pop" => items.pop().unwrap_or_default(),
        _ => {
            items.reverse();
            Value::Array(items.clone())
        }
    }
}

/// Resolve a possibly negative, possibly fractional position against `len`.
fn relative_index(position: &Value, len: usize, default: usize) -> usize {
    if matches!(position, Value::Undefined) {
        return default;
    }
    let n = position.to_number();
    if n.is_nan() {
        0
    } else if n < 0.0 {
        (len as f64 + n.trunc()).max(0.0) as usize
    } else {
        (n.trunc() as usize).min(len)
    }
}

fn call_method(receiver: &Value, method: &str, args: &[Value]) -> EvalResult<Value> {
    let first = arg(args, 0);
    let result = match receiver {
        Value::String(s) if method == "repeat" => Some(repeat(s, &first)?),
        Value::String(s) => string_method(s, method, &first, args),
        Value::Array(items) => array_method(items, method, &first, args),
        Value::Number(n) => match method {
            "toFixed" if !n.is_finite() || n.abs() >= 1e21 => Some(Value::String(format_number(*n))),
            "toFixed" => {
                let digits = first.to_number();
                let digits = if digits.is_nan() { 0 } else { digits.clamp(0.0, 100.0) as usize };
                Some(Value::String(format!("{n:.digits$}")))
            }
            "toString" => Some(Value::String(format_number(*n))),
            _ => None,
        },
        Value::Bool(b) if method == "toString" => Some(Value::String(b.to_string())),
        Value::Undefined | Value::Null => {
            return Err(RenderError::Type(format!(
                "Cannot read properties of {receiver} (reading '{method}')"
            )))
        }
        _ => None,
    };
    result.ok_or_else(|| {
        RenderError::Type(format!("{}.{method} is not a function", describe(receiver)))
    })
}

fn string_method(s: &str, method: &str, first: &Value, args: &[Value]) -> Option<Value> {
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len();
    let char_index = |byte: usize| s[..byte].chars().count();
    let needle = first.to_string();
    Some(match method {
        "toUpperCase" => Value::String(s.to_uppercase()),
        "toLowerCase" => Value::String(s.to_lowercase()),
        "trim" => Value::String(s.trim().to_string()),
        "toString" => Value::String(s.to_string()),
        "indexOf" => Value::Number(s.find(&needle).map_or(-1.0, |b| char_index(b) as f64)),
        "includes" => Value::Bool(s.contains(&needle)),
        "startsWith" => Value::Bool(s.starts_with(&needle)),
        "endsWith" => Value::Bool(s.ends_with(&needle)),
        "charAt" => Value::String(
            first
                .as_index()
                .and_then(|i| chars.get(i))
                .map(|c| c.to_string())
                .unwrap_or_default(),
        ),
        "slice" => {
            let start = relative_index(first, len, 0);
            let end = relative_index(&arg(args, 1), len, len);
            Value::String(chars[start..end.max(start)].iter().collect())
        }
        "substring" => {
            let clamp = |v: &Value, default: usize| {
                if matches!(v, Value::Undefined) {
                    return default;
                }
                let n = v.to_number();
                if n.is_nan() || n < 0.0 {
                    0
                } else {
                    (n as usize).min(len)
                }
            };
            let a = clamp(first, 0);
            let b = clamp(&arg(args, 1), len);
            Value::String(chars[a.min(b)..a.max(b)].iter().collect())
        }
        "split" => match first {
            Value::Undefined => Value::Array(vec![Value::from(s)]),
            _ if needle.is_empty() => {
                Value::Array(chars.iter().map(|c| Value::String(c.to_string())).collect())
            }
            _ => Value::Array(s.split(needle.as_str()).map(Value::from).collect()),
        },
        "replace" => Value::String(s.replacen(&needle, &arg(args, 1).to_string(), 1)),
        "concat" => Value::String(args.iter().fold(s.to_string(), |mut acc, v| {
            acc.push_str(&v.to_string());
            acc
        })),
        _ => return None,
    })
}

fn repeat(s: &str, count: &Value) -> EvalResult<Value> {
    let n = count.to_number();
    let n = if n.is_nan() { 0.0 } else { n.trunc() };
    if n < 0.0 || n.is_infinite() {
        return Err(RenderError::Range(format!("Invalid count value: {}", format_number(n))));
    }
    if s.is_empty() {
        return Ok(Value::String(String::new()));
    }
    if n * s.len() as f64 > MAX_STRING_LEN as f64 {
        return Err(RenderError::Range("Invalid string length".into()));
    }
    Ok(Value::String(s.repeat(n as usize)))
}

fn array_method(items: &[Value], method: &str, first: &Value, args: &[Value]) -> Option<Value> {
    let len = items.len();
    Some(match method {
        "join" => {
            let sep = match first {
                Value::Undefined => ",".to_string(),
                other => other.to_string(),
            };
            let parts: Vec<String> = items
                .iter()
                .map(|v| if v.is_nullish() { String::new() } else { v.to_string() })
                .collect();
            Value::String(parts.join(&sep))
        }
        "toString" => Value::String(Value::Array(items.to_vec()).to_string()),
        "indexOf" => Value::Number(
            items
                .iter()
                .position(|v| v.strict_eq(first))
                .map_or(-1.0, |i| i as f64),
        ),
        "includes" => Value::Bool(items.iter().any(|v| v.strict_eq(first))),
        "slice" => {
            let start = relative_index(first, len, 0);
            let end = relative_index(&arg(args, 1), len, len);
            Value::Array(items[start..end.max(start)].to_vec())
        }
        "concat" => {
            let mut out = items.to_vec();
            for value in args {
                match value {
                    Value::Array(more) => out.extend(more.iter().cloned()),
                    other => out.push(other.clone()),
                }
            }
            Value::Array(out)
        }
        "push" | "pop" | "reverse" => {
            let mut copy = items.to_vec();
            mutate_array(&mut copy, method, args.to_vec())
        }
        _ => return None,
    })
}

fn parse_int(text: &str, radix: Option<f64>) -> f64 {
    let text = text.trim_start();
    let (negative, text) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let hex = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"));
    let radix = radix.filter(|r| !r.is_nan() && *r != 0.0).map(|r| r.trunc() as u32);
    let (radix, digits) = match (radix, hex) {
        (None, Some(rest)) | (Some(16), Some(rest)) => (16, rest),
        (None, None) => (10, text),
        (Some(r), _) if (2..=36).contains(&r) => (r, text),
        _ => return f64::NAN,
    };
    let valid: Vec<u32> = digits.chars().map_while(|c| c.to_digit(radix)).collect();
    if valid.is_empty() {
        return f64::NAN;
    }
    let value = valid
        .iter()
        .fold(0.0, |acc, d| acc * f64::from(radix) + f64::from(*d));
    if negative {
        -value
    } else {
        value
    }
}

fn parse_float(text: &str) -> f64 {
    let text = text.trim_start();
    for prefix in ["Infinity", "+Infinity"] {
        if text.starts_with(prefix) {
            return f64::INFINITY;
        }
    }
    if text.starts_with("-Infinity") {
        return f64::NEG_INFINITY;
    }
    let candidate_len = text
        .find(|c: char| !(c.is_ascii_digit() || "+-.eE".contains(c)))
        .unwrap_or(text.len());
    (1..=candidate_len)
        .rev()
        .find_map(|len| text[..len].parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}

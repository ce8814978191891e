//! Runtime values and the render context.
//!
//! Values follow JavaScript's coercion rules closely enough that existing
//! Jade templates render the same strings they would in a browser. This
//! covers truthiness, `+` concatenation, loose equality and number
//! formatting.

use crate::error::RenderError;
use indexmap::IndexMap;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// The result of the `typeof` operator.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Null | Value::Array(_) | Value::Object(_) => "object",
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => parse_number(s),
            Value::Array(items) => match items.as_slice() {
                [] => 0.0,
                [single] => single.to_number(),
                _ => f64::NAN,
            },
            Value::Object(_) => f64::NAN,
        }
    }

    /// Index of `self` when used as an array subscript.
    pub fn as_index(&self) -> Option<usize> {
        let n = self.to_number();
        (n.fract() == 0.0 && n >= 0.0 && n < usize::MAX as f64).then_some(n as usize)
    }

    /// Key of `self` when used as an object property name.
    pub fn to_key(&self) -> String {
        self.to_string()
    }

    /// `==`
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Value::Number(_), Value::String(_))
            | (Value::String(_), Value::Number(_))
            | (Value::Bool(_), _)
            | (_, Value::Bool(_)) => self.to_number() == other.to_number(),
            (Value::Array(_) | Value::Object(_), Value::String(s))
            | (Value::String(s), Value::Array(_) | Value::Object(_)) => {
                let compound = if matches!(self, Value::String(_)) { other } else { self };
                compound.to_string() == *s
            }
            _ => self.strict_eq(other),
        }
    }

    /// `===`; compound values compare structurally.
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            _ => self == other,
        }
    }

    /// Ordering for `<`, `<=`, `>`, `>=`; `None` when either side is `NaN`.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => self.to_number().partial_cmp(&other.to_number()),
        }
    }

    /// Binary `+`.
    pub fn add(&self, other: &Value) -> Value {
        let stringy = |v: &Value| matches!(v, Value::String(_) | Value::Array(_) | Value::Object(_));
        if stringy(self) || stringy(other) {
            Value::String(format!("{self}{other}"))
        } else {
            Value::Number(self.to_number() + other.to_number())
        }
    }

    pub fn into_json(self) -> serde_json::Value {
        match self {
            Value::Undefined | Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => {
                serde_json::Value::Number((n as i64).into())
            }
            Value::Number(n) => serde_json::Number::from_f64(n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s),
            Value::Array(items) => {
                serde_json::Value::Array(items.into_iter().map(Value::into_json).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.into_iter()
                    .filter(|(_, v)| !matches!(v, Value::Undefined))
                    .map(|(k, v)| (k, v.into_json()))
                    .collect(),
            ),
        }
    }
}

fn parse_number(s: &str) -> f64 {
    let s = s.trim();
    if s.is_empty() {
        return 0.0;
    }
    match s {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ if s.contains(|c: char| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => f64::NAN,
        _ => s.parse().unwrap_or(f64::NAN),
    }
}

pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let sign = if n > 0.0 { "" } else { "-" };
        format!("{sign}Infinity")
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{n:.0}")
    } else {
        n.to_string()
    }
}

/// JavaScript `String(value)`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::String(s) => f.write_str(s),
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    if !item.is_nullish() {
                        write!(f, "{item}")?;
                    }
                }
                Ok(())
            }
            Value::Object(_) => f.write_str("[object Object]"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(map: IndexMap<String, Value>) -> Self {
        Value::Object(map)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

/// A host function callable from template scripts.
pub type NativeFn = dyn Fn(&[Value]) -> Result<Value, RenderError> + Send + Sync;

/// Variables (and native functions) visible to a template while it renders.
///
/// Every member is implicitly in scope inside the template, so `name`
/// resolves to `context["name"]` without qualification.
#[derive(Clone, Default)]
pub struct Context {
    vars: IndexMap<String, Value>,
    functions: Arc<HashMap<String, Arc<NativeFn>>>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("vars", &self.vars)
            .field("functions", &format!("<{} functions>", self.functions.len()))
            .finish()
    }
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from a JSON object. Non-object JSON yields `None`.
    pub fn from_json(json: serde_json::Value) -> Option<Self> {
        match Value::from(json) {
            Value::Object(vars) => Some(Self {
                vars,
                ..Self::default()
            }),
            _ => None,
        }
    }

    pub fn set_var(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.vars.insert(name.into(), value.into());
    }

    /// Builder form of [`Context::set_var`].
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_var(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn register_fn<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&[Value]) -> Result<Value, RenderError> + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.functions).insert(name.into(), Arc::new(f));
    }

    pub(crate) fn function(&self, name: &str) -> Option<&Arc<NativeFn>> {
        self.functions.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_format_like_javascript() {
        assert_eq!(Value::from(3.0).to_string(), "3");
        assert_eq!(Value::from(-0.5).to_string(), "-0.5");
        assert_eq!(Value::Number(f64::NAN).to_string(), "NaN");
        assert_eq!(Value::Number(f64::INFINITY).to_string(), "Infinity");
    }

    #[test]
    fn arrays_and_objects_stringify() {
        let arr = Value::from(vec![Value::from(1), Value::Null, Value::from("x")]);
        assert_eq!(arr.to_string(), "1,,x");
        assert_eq!(Value::Object(IndexMap::new()).to_string(), "[object Object]");
    }

    #[test]
    fn plus_concatenates_when_either_side_is_a_string() {
        assert_eq!(Value::from(1).add(&Value::from("2")), Value::from("12"));
        assert_eq!(Value::from(1).add(&Value::from(true)), Value::from(2));
    }

    #[test]
    fn loose_equality() {
        assert!(Value::Null.loose_eq(&Value::Undefined));
        assert!(Value::from("1").loose_eq(&Value::from(1)));
        assert!(Value::from(true).loose_eq(&Value::from(1)));
        assert!(!Value::from(0).loose_eq(&Value::Null));
        assert!(!Value::from("1").strict_eq(&Value::from(1)));
    }

    #[test]
    fn truthiness() {
        assert!(!Value::from("").is_truthy());
        assert!(!Value::Number(f64::NAN).is_truthy());
        assert!(Value::Array(vec![]).is_truthy());
        assert!(!Value::Undefined.is_truthy());
    }

    #[test]
    fn context_from_json() {
        let ctx = Context::from_json(serde_json::json!({"name": "x", "n": 2})).unwrap();
        assert_eq!(ctx.get("name"), Some(&Value::from("x")));
        assert_eq!(ctx.get("n"), Some(&Value::from(2)));
        assert!(Context::from_json(serde_json::json!([1])).is_none());
    }
}

//! Runtime values

use crate::errors::RuntimeError;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// A value manipulated by a scoring body.
///
/// All numbers are `f64`; JSON integers convert losslessly up to 2^53.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Number(f64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "NoneType",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Map(_) => "dict",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::List(items) => !items.is_empty(),
            Self::Map(entries) => !entries.is_empty(),
        }
    }

    /// Numeric view: numbers and booleans
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub(crate) fn expect_number(&self, context: &str) -> Result<f64, RuntimeError> {
        self.as_number().ok_or_else(|| {
            RuntimeError::TypeError(format!(
                "{} expects a number, got '{}'",
                context,
                self.type_name()
            ))
        })
    }

    /// Equality with `True == 1` and `1 == 1.0`
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::List(a), Self::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            (Self::Map(a), Self::Map(b)) => {
                a.len() == b.len()
                    && a
                        .iter()
                        .all(|(k, v)| b.get(k).is_some_and(|other| v.loose_eq(other)))
            }
            _ => match (self.as_number(), other.as_number()) {
                (Some(a), Some(b)) => a == b,
                _ => self == other,
            },
        }
    }

    /// Ordering for `<`, `min`, `max`; only like-typed values compare
    pub fn try_cmp(&self, other: &Value) -> Result<Ordering, RuntimeError> {
        let unsupported = || {
            RuntimeError::TypeError(format!(
                "ordering not supported between '{}' and '{}'",
                self.type_name(),
                other.type_name()
            ))
        };

        match (self, other) {
            (Self::Str(a), Self::Str(b)) => Ok(a.cmp(b)),
            (Self::List(a), Self::List(b)) => {
                for (x, y) in a.iter().zip(b) {
                    match x.try_cmp(y)? {
                        Ordering::Equal => continue,
                        unequal => return Ok(unequal),
                    }
                }
                Ok(a.len().cmp(&b.len()))
            }
            _ => match (self.as_number(), other.as_number()) {
                (Some(a), Some(b)) => a.partial_cmp(&b).ok_or_else(unsupported),
                _ => Err(unsupported()),
            },
        }
    }

    /// `needle in self`
    pub fn contains(&self, needle: &Value) -> Result<bool, RuntimeError> {
        match self {
            Self::List(items) => Ok(items.iter().any(|item| item.loose_eq(needle))),
            Self::Map(entries) => Ok(match needle {
                Self::Str(key) => entries.contains_key(key),
                _ => false,
            }),
            Self::Str(haystack) => match needle {
                Self::Str(sub) => Ok(haystack.contains(sub.as_str())),
                other => Err(RuntimeError::TypeError(format!(
                    "'in <str>' requires string as left operand, not '{}'",
                    other.type_name()
                ))),
            },
            other => Err(RuntimeError::TypeError(format!(
                "argument of type '{}' is not iterable",
                other.type_name()
            ))),
        }
    }

    /// Python-style `repr`, used in error messages and `str()` of containers
    pub fn repr(&self) -> String {
        match self {
            Self::Str(s) => format!("'{}'", s),
            other => other.to_string(),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e16 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Number(n) => f.write_str(&format_number(*n)),
            Self::Str(s) => f.write_str(s),
            Self::List(items) => {
                let inner: Vec<String> = items.iter().map(Value::repr).collect();
                write!(f, "[{}]", inner.join(", "))
            }
            Self::Map(entries) => {
                let inner: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("'{}': {}", k, v.repr()))
                    .collect();
                write!(f, "{{{}}}", inner.join(", "))
            }
        }
    }
}

impl From<&serde_json::Value> for Value {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::None,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::Str(s.clone()),
            serde_json::Value::Array(items) => Self::List(items.iter().map(Value::from).collect()),
            serde_json::Value::Object(entries) => Self::from(entries),
        }
    }
}

impl From<&serde_json::Map<String, serde_json::Value>> for Value {
    fn from(entries: &serde_json::Map<String, serde_json::Value>) -> Self {
        Self::Map(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), Value::from(v)))
                .collect(),
        )
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

//! Tree-walking interpreter for compiled scoring bodies
//!
//! A body runs as the body of a two-argument function `(attrs, params)`.
//! There are no loops and no user-defined functions, so every run
//! terminates in time linear in the size of the body and its inputs.

use crate::ast::{BinaryOp, Builtin, CompareOp, Expr, Method, Stmt, StmtKind, UnaryOp};
use crate::errors::{DslResult, RuntimeError};
use crate::parser::Parser;
use crate::value::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// Name bound to the element's effective attributes
pub const ATTRS: &str = "attrs";
/// Name bound to the merged rule parameters
pub const PARAMS: &str = "params";

type Json = serde_json::Map<String, serde_json::Value>;

/// A compiled scoring body
#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    body: Vec<Stmt>,
}

enum Flow {
    Continue,
    Return(Value),
}

impl Program {
    /// Compile source text. Syntax errors and calls outside the whitelist
    /// are reported with their position.
    pub fn compile(source: &str) -> DslResult<Self> {
        let body = Parser::parse(source)?;
        Ok(Self { body })
    }

    /// `true` when the source held no statements (blank or comments only)
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Run with `attrs` and `params` bound and coerce the result to a score
    pub fn run(&self, attrs: &Json, params: &Json) -> Result<f64, RuntimeError> {
        match self.evaluate(attrs, params)? {
            Value::Number(n) => Ok(n),
            Value::Bool(b) => Ok(if b { 1.0 } else { 0.0 }),
            other => Err(RuntimeError::NonNumericResult(other.repr())),
        }
    }

    /// Run and return the raw returned value
    pub fn evaluate(&self, attrs: &Json, params: &Json) -> Result<Value, RuntimeError> {
        let mut scope = Scope::default();
        scope.vars.insert(ATTRS.to_string(), Value::from(attrs));
        scope.vars.insert(PARAMS.to_string(), Value::from(params));

        match scope.exec_block(&self.body)? {
            Flow::Return(value) => Ok(value),
            Flow::Continue => Err(RuntimeError::NoResult),
        }
    }
}

#[derive(Default)]
struct Scope {
    vars: HashMap<String, Value>,
}

impl Scope {
    fn exec_block(&mut self, block: &[Stmt]) -> Result<Flow, RuntimeError> {
        for stmt in block {
            if let Flow::Return(value) = self.exec(stmt)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Continue)
    }

    fn exec(&mut self, stmt: &Stmt) -> Result<Flow, RuntimeError> {
        match &stmt.kind {
            StmtKind::Assign { target, value } => {
                let value = self.eval(value)?;
                self.vars.insert(target.clone(), value);
                Ok(Flow::Continue)
            }
            StmtKind::Return(None) => Ok(Flow::Return(Value::None)),
            StmtKind::Return(Some(expr)) => Ok(Flow::Return(self.eval(expr)?)),
            StmtKind::If { branches, orelse } => {
                for (condition, block) in branches {
                    if self.eval(condition)?.is_truthy() {
                        return self.exec_block(block);
                    }
                }
                self.exec_block(orelse)
            }
            StmtKind::Pass => Ok(Flow::Continue),
            StmtKind::Expr(expr) => {
                self.eval(expr)?;
                Ok(Flow::Continue)
            }
        }
    }

    fn eval(&self, expr: &Expr) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Name(name) => self
                .vars
                .get(name)
                .cloned()
                .ok_or_else(|| RuntimeError::NameError(name.clone())),
            Expr::List(items) => items
                .iter()
                .map(|item| self.eval(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            Expr::Map(entries) => {
                let mut map = BTreeMap::new();
                for (key, value) in entries {
                    let key = match self.eval(key)? {
                        Value::Str(key) => key,
                        other => {
                            return Err(RuntimeError::TypeError(format!(
                                "dict keys must be strings, not '{}'",
                                other.type_name()
                            )))
                        }
                    };
                    map.insert(key, self.eval(value)?);
                }
                Ok(Value::Map(map))
            }
            Expr::Subscript { target, index } => {
                subscript(&self.eval(target)?, &self.eval(index)?)
            }
            Expr::Call { function, args } => {
                let args = self.eval_args(args)?;
                call_builtin(*function, args)
            }
            Expr::MethodCall {
                receiver,
                method,
                args,
            } => {
                let receiver = self.eval(receiver)?;
                let args = self.eval_args(args)?;
                call_method(receiver, *method, args)
            }
            Expr::Unary { op, operand } => {
                let operand = self.eval(operand)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!operand.is_truthy())),
                    UnaryOp::Neg => Ok(Value::Number(-operand.expect_number("unary '-'")?)),
                    UnaryOp::Pos => Ok(Value::Number(operand.expect_number("unary '+'")?)),
                }
            }
            Expr::Binary { op, left, right } => {
                binary(*op, self.eval(left)?, self.eval(right)?)
            }
            Expr::Compare { first, rest } => {
                let mut left = self.eval(first)?;
                for (op, right) in rest {
                    let right = self.eval(right)?;
                    if !compare(*op, &left, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
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
            Expr::Conditional {
                condition,
                then,
                orelse,
            } => {
                if self.eval(condition)?.is_truthy() {
                    self.eval(then)
                } else {
                    self.eval(orelse)
                }
            }
        }
    }

    fn eval_args(&self, args: &[Expr]) -> Result<Vec<Value>, RuntimeError> {
        args.iter().map(|arg| self.eval(arg)).collect()
    }
}

fn index_of(index: f64, len: usize) -> Result<usize, RuntimeError> {
    if index.fract() != 0.0 {
        return Err(RuntimeError::TypeError(format!(
            "indices must be integers, not {}",
            index
        )));
    }
    let resolved = if index < 0.0 { index + len as f64 } else { index };
    if resolved < 0.0 || resolved >= len as f64 {
        return Err(RuntimeError::IndexError(format!(
            "index {} out of range",
            index
        )));
    }
    Ok(resolved as usize)
}

fn subscript(target: &Value, index: &Value) -> Result<Value, RuntimeError> {
    match (target, index) {
        (Value::Map(entries), Value::Str(key)) => entries
            .get(key)
            .cloned()
            .ok_or_else(|| RuntimeError::KeyError(index.repr())),
        (Value::Map(_), other) => Err(RuntimeError::KeyError(other.repr())),
        (Value::List(items), Value::Number(n)) => Ok(items[index_of(*n, items.len())?].clone()),
        (Value::Str(s), Value::Number(n)) => {
            let chars: Vec<char> = s.chars().collect();
            Ok(Value::Str(chars[index_of(*n, chars.len())?].to_string()))
        }
        (Value::List(_) | Value::Str(_), other) => Err(RuntimeError::TypeError(format!(
            "indices must be integers, not '{}'",
            other.type_name()
        ))),
        (other, _) => Err(RuntimeError::TypeError(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

fn binary(op: BinaryOp, left: Value, right: Value) -> Result<Value, RuntimeError> {
    match (op, &left, &right) {
        (BinaryOp::Add, Value::Str(a), Value::Str(b)) => return Ok(Value::Str(format!("{}{}", a, b))),
        (BinaryOp::Add, Value::List(a), Value::List(b)) => {
            return Ok(Value::List(a.iter().chain(b).cloned().collect()))
        }
        _ => {}
    }

    let (Some(a), Some(b)) = (left.as_number(), right.as_number()) else {
        return Err(RuntimeError::TypeError(format!(
            "unsupported operand types for {}: '{}' and '{}'",
            op.symbol(),
            left.type_name(),
            right.type_name()
        )));
    };

    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b == 0.0 {
                return Err(RuntimeError::ZeroDivision("division by zero"));
            }
            a / b
        }
        BinaryOp::FloorDiv => {
            if b == 0.0 {
                return Err(RuntimeError::ZeroDivision("integer division by zero"));
            }
            (a / b).floor()
        }
        BinaryOp::Mod => {
            if b == 0.0 {
                return Err(RuntimeError::ZeroDivision("modulo by zero"));
            }
            // Result takes the sign of the divisor
            a - b * (a / b).floor()
        }
    };
    Ok(Value::Number(result))
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<bool, RuntimeError> {
    Ok(match op {
        CompareOp::Eq => left.loose_eq(right),
        CompareOp::NotEq => !left.loose_eq(right),
        CompareOp::Lt => left.try_cmp(right)? == Ordering::Less,
        CompareOp::Le => left.try_cmp(right)? != Ordering::Greater,
        CompareOp::Gt => left.try_cmp(right)? == Ordering::Greater,
        CompareOp::Ge => left.try_cmp(right)? != Ordering::Less,
        CompareOp::In => right.contains(left)?,
        CompareOp::NotIn => !right.contains(left)?,
    })
}

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<(), RuntimeError> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            format!("{}", min)
        } else {
            format!("{} to {}", min, max)
        };
        return Err(RuntimeError::TypeError(format!(
            "{}() takes {} argument(s), got {}",
            name,
            expected,
            args.len()
        )));
    }
    Ok(())
}

fn parse_number(text: &str, context: &str) -> Result<f64, RuntimeError> {
    text.trim().parse::<f64>().map_err(|_| {
        RuntimeError::ValueError(format!("could not convert '{}' with {}()", text, context))
    })
}

/// Round half to even, as Python's `round` does
fn round_half_even(x: f64) -> f64 {
    let rounded = x.round();
    if (x - x.trunc()).abs() == 0.5 && rounded % 2.0 != 0.0 {
        rounded - x.signum()
    } else {
        rounded
    }
}

fn extremum(name: &str, args: Vec<Value>, pick: Ordering) -> Result<Value, RuntimeError> {
    let candidates = if args.len() == 1 {
        match args.into_iter().next() {
            Some(Value::List(items)) => items,
            _ => {
                return Err(RuntimeError::TypeError(format!(
                    "{}() with one argument expects a list",
                    name
                )))
            }
        }
    } else {
        args
    };

    let mut iter = candidates.into_iter();
    let Some(mut best) = iter.next() else {
        return Err(RuntimeError::ValueError(format!(
            "{}() arg is an empty sequence",
            name
        )));
    };
    for candidate in iter {
        if candidate.try_cmp(&best)? == pick {
            best = candidate;
        }
    }
    Ok(best)
}

fn call_builtin(function: Builtin, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let name = function.name();
    match function {
        Builtin::Len => {
            arity(name, &args, 1, 1)?;
            let len = match &args[0] {
                Value::Str(s) => s.chars().count(),
                Value::List(items) => items.len(),
                Value::Map(entries) => entries.len(),
                other => {
                    return Err(RuntimeError::TypeError(format!(
                        "object of type '{}' has no len()",
                        other.type_name()
                    )))
                }
            };
            Ok(Value::Number(len as f64))
        }
        Builtin::Min => {
            arity(name, &args, 1, usize::MAX)?;
            extremum(name, args, Ordering::Less)
        }
        Builtin::Max => {
            arity(name, &args, 1, usize::MAX)?;
            extremum(name, args, Ordering::Greater)
        }
        Builtin::Abs => {
            arity(name, &args, 1, 1)?;
            Ok(Value::Number(args[0].expect_number(name)?.abs()))
        }
        Builtin::Float => {
            arity(name, &args, 0, 1)?;
            match args.first() {
                None => Ok(Value::Number(0.0)),
                Some(Value::Str(s)) => parse_number(s, name).map(Value::Number),
                Some(other) => Ok(Value::Number(other.expect_number(name)?)),
            }
        }
        Builtin::Int => {
            arity(name, &args, 0, 1)?;
            let n = match args.first() {
                None => 0.0,
                Some(Value::Str(s)) => parse_number(s, name)?,
                Some(other) => other.expect_number(name)?,
            };
            Ok(Value::Number(n.trunc()))
        }
        Builtin::Round => {
            arity(name, &args, 1, 2)?;
            let x = args[0].expect_number(name)?;
            let digits = match args.get(1) {
                None | Some(Value::None) => 0.0,
                Some(other) => other.expect_number(name)?.trunc(),
            };
            let scale = 10f64.powf(digits);
            Ok(Value::Number(round_half_even(x * scale) / scale))
        }
        Builtin::Sum => {
            arity(name, &args, 1, 2)?;
            let start = match args.get(1) {
                Some(value) => value.expect_number(name)?,
                None => 0.0,
            };
            let Value::List(items) = &args[0] else {
                return Err(RuntimeError::TypeError(format!(
                    "'{}' object is not iterable",
                    args[0].type_name()
                )));
            };
            items
                .iter()
                .try_fold(start, |acc, item| -> Result<f64, RuntimeError> {
                    Ok(acc + item.expect_number(name)?)
                })
                .map(Value::Number)
        }
        Builtin::Bool => {
            arity(name, &args, 0, 1)?;
            Ok(Value::Bool(args.first().is_some_and(Value::is_truthy)))
        }
        Builtin::Str => {
            arity(name, &args, 0, 1)?;
            Ok(Value::Str(
                args.first().map(ToString::to_string).unwrap_or_default(),
            ))
        }
    }
}

fn call_method(receiver: Value, method: Method, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let name = method.name();
    let no_such_method = |receiver: &Value| {
        RuntimeError::TypeError(format!(
            "'{}' object has no method '{}'",
            receiver.type_name(),
            name
        ))
    };

    match (&receiver, method) {
        (Value::Map(entries), Method::Get) => {
            arity(name, &args, 1, 2)?;
            let found = match &args[0] {
                Value::Str(key) => entries.get(key).cloned(),
                _ => None,
            };
            Ok(found.unwrap_or_else(|| args.get(1).cloned().unwrap_or_default()))
        }
        (Value::Map(entries), Method::Keys) => {
            arity(name, &args, 0, 0)?;
            Ok(Value::List(
                entries.keys().map(|k| Value::Str(k.clone())).collect(),
            ))
        }
        (Value::Map(entries), Method::Values) => {
            arity(name, &args, 0, 0)?;
            Ok(Value::List(entries.values().cloned().collect()))
        }
        (Value::Str(s), Method::Lower) => {
            arity(name, &args, 0, 0)?;
            Ok(Value::Str(s.to_lowercase()))
        }
        (Value::Str(s), Method::Upper) => {
            arity(name, &args, 0, 0)?;
            Ok(Value::Str(s.to_uppercase()))
        }
        (Value::Str(s), Method::Strip) => {
            arity(name, &args, 0, 0)?;
            Ok(Value::Str(s.trim().to_string()))
        }
        (Value::Str(s), Method::StartsWith | Method::EndsWith) => {
            arity(name, &args, 1, 1)?;
            let Value::Str(affix) = &args[0] else {
                return Err(RuntimeError::TypeError(format!(
                    "{}() argument must be str, not '{}'",
                    name,
                    args[0].type_name()
                )));
            };
            Ok(Value::Bool(if method == Method::StartsWith {
                s.starts_with(affix.as_str())
            } else {
                s.ends_with(affix.as_str())
            }))
        }
        (other, _) => Err(no_such_method(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(value: serde_json::Value) -> Json {
        value.as_object().cloned().unwrap_or_default()
    }

    fn run(src: &str, attributes: serde_json::Value) -> Result<f64, RuntimeError> {
        Program::compile(src)
            .unwrap()
            .run(&attrs(attributes), &Json::new())
    }

    #[test]
    fn test_season_rule() {
        let src = "if '秋' in attrs.get('季节', []):\n    return 1.0\nreturn 0.0";
        assert_eq!(run(src, json!({"季节": ["春", "秋"]})), Ok(1.0));
        assert_eq!(run(src, json!({"季节": ["春", "夏"]})), Ok(0.0));
        assert_eq!(run(src, json!({})), Ok(0.0));
    }

    #[test]
    fn test_rating_rule_returns_attribute() {
        let src = "rating = attrs.get('评分', 0)\nif rating >= 4.5:\n    return rating\nreturn 0.0";
        assert_eq!(run(src, json!({"评分": 4.8})), Ok(4.8));
        assert_eq!(run(src, json!({"评分": 4.4})), Ok(0.0));
    }

    #[test]
    fn test_conditional_expression_body() {
        let src = "return 1.0 if '秋' in attrs['季节'] else 0.0";
        assert_eq!(run(src, json!({"季节": ["秋"]})), Ok(1.0));
    }

    #[test]
    fn test_params_are_bound() {
        let program = Program::compile("return 1 if attrs['价格'] < params['limit'] else 0").unwrap();
        let params = attrs(json!({"limit": 500}));
        assert_eq!(program.run(&attrs(json!({"价格": 300})), &params), Ok(1.0));
        assert_eq!(program.run(&attrs(json!({"价格": 600})), &params), Ok(0.0));
    }

    #[test]
    fn test_bool_result_coercion() {
        assert_eq!(run("return attrs['x'] > 1", json!({"x": 2})), Ok(1.0));
        assert_eq!(run("return False", json!({})), Ok(0.0));
    }

    #[test]
    fn test_non_numeric_result() {
        assert_eq!(
            run("return 'high'", json!({})),
            Err(RuntimeError::NonNumericResult("'high'".into()))
        );
        assert!(matches!(
            run("return", json!({})),
            Err(RuntimeError::NonNumericResult(_))
        ));
    }

    #[test]
    fn test_falling_off_the_end() {
        assert_eq!(run("x = 1", json!({})), Err(RuntimeError::NoResult));
        assert_eq!(run("if False:\n    return 1", json!({})), Err(RuntimeError::NoResult));
    }

    #[test]
    fn test_runtime_errors() {
        assert!(matches!(
            run("return attrs['missing']", json!({})),
            Err(RuntimeError::KeyError(_))
        ));
        assert!(matches!(
            run("return attrs['s'] + 1", json!({"s": "a"})),
            Err(RuntimeError::TypeError(_))
        ));
        assert!(matches!(
            run("return 1 / attrs['n']", json!({"n": 0})),
            Err(RuntimeError::ZeroDivision(_))
        ));
        assert_eq!(
            run("return rating", json!({})),
            Err(RuntimeError::NameError("rating".into()))
        );
        assert!(matches!(
            run("return attrs['l'][5]", json!({"l": [1]})),
            Err(RuntimeError::IndexError(_))
        ));
    }

    #[test]
    fn test_python_style_arithmetic() {
        assert_eq!(run("return -7 % 3", json!({})), Ok(2.0));
        assert_eq!(run("return 7 // 2", json!({})), Ok(3.0));
        assert_eq!(run("return True + 1", json!({})), Ok(2.0));
        assert_eq!(run("return 2 + 3 * 4 - 1", json!({})), Ok(13.0));
    }

    #[test]
    fn test_boolean_operators_short_circuit() {
        // The right operand would raise if evaluated
        assert_eq!(run("return 0 and attrs['missing']", json!({})), Ok(0.0));
        assert_eq!(run("return 3 or attrs['missing']", json!({})), Ok(3.0));
        assert_eq!(run("return not attrs.get('x')", json!({})), Ok(1.0));
    }

    #[test]
    fn test_chained_comparison() {
        let src = "return 1 if 100 <= attrs['p'] < 500 else 0";
        assert_eq!(run(src, json!({"p": 300})), Ok(1.0));
        assert_eq!(run(src, json!({"p": 500})), Ok(0.0));
    }

    #[test]
    fn test_not_in() {
        let src = "return 1 if '辣' not in attrs['标签'] else 0";
        assert_eq!(run(src, json!({"标签": ["本地特色"]})), Ok(1.0));
        assert_eq!(run(src, json!({"标签": ["辣"]})), Ok(0.0));
    }

    #[test]
    fn test_builtins() {
        assert_eq!(run("return len(attrs['l'])", json!({"l": [1, 2, 3]})), Ok(3.0));
        assert_eq!(run("return max(attrs['l'])", json!({"l": [1, 7, 3]})), Ok(7.0));
        assert_eq!(run("return min(4, 2, 9)", json!({})), Ok(2.0));
        assert_eq!(run("return abs(-2.5)", json!({})), Ok(2.5));
        assert_eq!(run("return float('4.5')", json!({})), Ok(4.5));
        assert_eq!(run("return int(4.9)", json!({})), Ok(4.0));
        assert_eq!(run("return round(2.5)", json!({})), Ok(2.0));
        assert_eq!(run("return round(3.5)", json!({})), Ok(4.0));
        assert_eq!(run("return round(4.567, 2)", json!({})), Ok(4.57));
        assert_eq!(run("return sum([1, 2, 3], 10)", json!({})), Ok(16.0));
        assert_eq!(run("return bool([])", json!({})), Ok(0.0));
        assert_eq!(run("return len(str(60))", json!({})), Ok(2.0));
    }

    #[test]
    fn test_builtin_arity() {
        assert!(matches!(
            run("return len()", json!({})),
            Err(RuntimeError::TypeError(_))
        ));
        assert!(matches!(
            run("return max([])", json!({})),
            Err(RuntimeError::ValueError(_))
        ));
    }

    #[test]
    fn test_methods() {
        let a = json!({"name": "  Hotel ", "nested": {"k": 1}});
        assert_eq!(run("return attrs['name'].strip().lower() == 'hotel'", a.clone()), Ok(1.0));
        assert_eq!(run("return attrs['name'].strip().startswith('Ho')", a.clone()), Ok(1.0));
        assert_eq!(run("return attrs['name'].strip().endswith('x')", a.clone()), Ok(0.0));
        assert_eq!(run("return len(attrs['nested'].keys())", a.clone()), Ok(1.0));
        assert_eq!(run("return sum(attrs['nested'].values())", a.clone()), Ok(1.0));
        assert_eq!(run("return 'k' in attrs['nested']", a.clone()), Ok(1.0));
        assert!(matches!(
            run("return attrs['name'].keys()", a),
            Err(RuntimeError::TypeError(_))
        ));
    }

    #[test]
    fn test_get_default() {
        assert_eq!(run("return attrs.get('距离地铁', 10000)", json!({})), Ok(10000.0));
        assert!(matches!(
            run("return attrs.get('x')", json!({})),
            Err(RuntimeError::NonNumericResult(_))
        ));
    }

    #[test]
    fn test_literals_and_subscripts() {
        assert_eq!(run("return {'a': [1, 2]}['a'][-1]", json!({})), Ok(2.0));
        assert_eq!(run("return len('故宫'[0])", json!({})), Ok(1.0));
    }

    #[test]
    fn test_empty_program() {
        let program = Program::compile("# nothing\n\n").unwrap();
        assert!(program.is_empty());
        assert_eq!(
            program.run(&Json::new(), &Json::new()),
            Err(RuntimeError::NoResult)
        );
    }

    #[test]
    fn test_assignment_shadows_binding() {
        let src = "attrs = {'x': 2}\nreturn attrs['x']";
        assert_eq!(run(src, json!({"x": 1})), Ok(2.0));
    }
}

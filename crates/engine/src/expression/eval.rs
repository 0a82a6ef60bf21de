//! Evaluation of parsed expressions against an environment.

use std::cmp::Ordering;

use formflow_types::Environment;
use regex::Regex;
use serde_json::{Number, Value};

use super::EvaluationError;
use super::parser::{BinaryOp, Expr, UnaryOp};

/// Truthiness shared by predicates and the logical operators.
///
/// `false`, `null`, zero, the empty string, and the empty list are false.
/// Everything else, including every object, is true.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

/// Renders a value for string concatenation and interpolation.
pub fn format_json_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// JSON equality that treats `1` and `1.0` as the same number.
pub fn json_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => a == b,
            _ => a.as_f64() == b.as_f64(),
        },
        (Value::Array(a), Value::Array(b)) => a.len() == b.len() && a.iter().zip(b).all(|(x, y)| json_equals(x, y)),
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len() && a.iter().all(|(key, x)| b.get(key).is_some_and(|y| json_equals(x, y)))
        }
        _ => left == right,
    }
}

pub(crate) fn evaluate(expression: &Expr, environment: &Environment) -> Result<Value, EvaluationError> {
    match expression {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::List(items) => items
            .iter()
            .map(|item| evaluate(item, environment))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Expr::Variable(name) => environment
            .get(name)
            .cloned()
            .ok_or_else(|| EvaluationError::UndefinedVariable(name.clone())),
        Expr::Member(target, field) => member(evaluate(target, environment)?, field),
        Expr::Index(target, index) => {
            let target = evaluate(target, environment)?;
            let index = evaluate(index, environment)?;
            index_into(target, &index)
        }
        Expr::Call {
            target,
            method,
            arguments,
        } => {
            let target = evaluate(target, environment)?;
            let arguments = arguments
                .iter()
                .map(|argument| evaluate(argument, environment))
                .collect::<Result<Vec<_>, _>>()?;
            call(target, method, &arguments)
        }
        Expr::Unary(UnaryOp::Not, operand) => Ok(Value::Bool(!is_truthy(&evaluate(operand, environment)?))),
        Expr::Unary(UnaryOp::Negate, operand) => match evaluate(operand, environment)? {
            Value::Number(number) => {
                if let Some(integer) = number.as_i64().and_then(i64::checked_neg) {
                    Ok(Value::from(integer))
                } else {
                    float(-number.as_f64().unwrap_or_default())
                }
            }
            other => Err(type_error(format!("cannot negate {}", kind_name(&other)))),
        },
        Expr::Binary(BinaryOp::And, left, right) => {
            if !is_truthy(&evaluate(left, environment)?) {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(is_truthy(&evaluate(right, environment)?)))
        }
        Expr::Binary(BinaryOp::Or, left, right) => {
            if is_truthy(&evaluate(left, environment)?) {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(is_truthy(&evaluate(right, environment)?)))
        }
        Expr::Binary(operator, left, right) => {
            let left = evaluate(left, environment)?;
            let right = evaluate(right, environment)?;
            binary(*operator, left, right)
        }
    }
}

fn member(target: Value, field: &str) -> Result<Value, EvaluationError> {
    match target {
        Value::Object(mut map) => Ok(map.remove(field).unwrap_or(Value::Null)),
        Value::Array(items) if field == "length" => Ok(Value::from(items.len())),
        Value::String(text) if field == "length" => Ok(Value::from(text.chars().count())),
        Value::Null => Ok(Value::Null),
        other => Err(type_error(format!("cannot read field '{field}' of {}", kind_name(&other)))),
    }
}

fn index_into(target: Value, index: &Value) -> Result<Value, EvaluationError> {
    match (target, index) {
        (Value::Array(mut items), Value::Number(number)) => {
            let position = number
                .as_u64()
                .ok_or_else(|| type_error(format!("list index must be a non-negative integer, got {number}")))?;
            let position = usize::try_from(position).unwrap_or(usize::MAX);
            if position < items.len() {
                Ok(items.swap_remove(position))
            } else {
                Ok(Value::Null)
            }
        }
        (Value::Object(mut map), Value::String(key)) => Ok(map.remove(key).unwrap_or(Value::Null)),
        (Value::String(text), Value::Number(number)) => {
            let position = number
                .as_u64()
                .ok_or_else(|| type_error(format!("string index must be a non-negative integer, got {number}")))?;
            Ok(usize::try_from(position)
                .ok()
                .and_then(|position| text.chars().nth(position))
                .map(|character| Value::String(character.to_string()))
                .unwrap_or(Value::Null))
        }
        (Value::Null, _) => Ok(Value::Null),
        (target, index) => Err(type_error(format!(
            "cannot index {} with {}",
            kind_name(&target),
            kind_name(index)
        ))),
    }
}

fn call(target: Value, method: &str, arguments: &[Value]) -> Result<Value, EvaluationError> {
    match (method, &target, arguments) {
        ("includes", Value::Array(items), [needle]) => Ok(Value::Bool(items.iter().any(|item| json_equals(item, needle)))),
        ("includes", Value::String(text), [needle]) => Ok(Value::Bool(text.contains(&format_json_value(needle)))),
        ("matches", Value::String(text), [Value::String(pattern)]) => {
            let regex = Regex::new(pattern).map_err(|error| type_error(format!("invalid pattern '{pattern}': {error}")))?;
            Ok(Value::Bool(regex.is_match(text)))
        }
        ("trim", Value::String(text), []) => Ok(Value::String(text.trim().to_string())),
        ("lower", Value::String(text), []) => Ok(Value::String(text.to_lowercase())),
        ("upper", Value::String(text), []) => Ok(Value::String(text.to_uppercase())),
        _ => Err(type_error(format!(
            "unsupported call {}.{method}() with {} argument(s)",
            kind_name(&target),
            arguments.len()
        ))),
    }
}

fn binary(operator: BinaryOp, left: Value, right: Value) -> Result<Value, EvaluationError> {
    match operator {
        BinaryOp::Equal => Ok(Value::Bool(json_equals(&left, &right))),
        BinaryOp::NotEqual => Ok(Value::Bool(!json_equals(&left, &right))),
        BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual => {
            let ordering = compare(&left, &right)?;
            Ok(Value::Bool(match operator {
                BinaryOp::Less => ordering == Ordering::Less,
                BinaryOp::LessEqual => ordering != Ordering::Greater,
                BinaryOp::Greater => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        }
        BinaryOp::Add => match (left, right) {
            (Value::Number(a), Value::Number(b)) => arithmetic(&a, &b, i64::checked_add, |x, y| x + y),
            (Value::Array(mut a), Value::Array(b)) => {
                a.extend(b);
                Ok(Value::Array(a))
            }
            (left @ Value::String(_), right) | (left, right @ Value::String(_)) => {
                Ok(Value::String(format_json_value(&left) + &format_json_value(&right)))
            }
            (left, right) => Err(type_error(format!("cannot add {} and {}", kind_name(&left), kind_name(&right)))),
        },
        BinaryOp::Subtract => numeric(operator, &left, &right, |a, b| arithmetic(a, b, i64::checked_sub, |x, y| x - y)),
        BinaryOp::Multiply => numeric(operator, &left, &right, |a, b| arithmetic(a, b, i64::checked_mul, |x, y| x * y)),
        BinaryOp::Divide => numeric(operator, &left, &right, |a, b| {
            if b.as_f64() == Some(0.0) {
                return Err(EvaluationError::DivisionByZero);
            }
            if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64())
                && x.checked_rem(y) == Some(0)
                && let Some(quotient) = x.checked_div(y)
            {
                return Ok(Value::from(quotient));
            }
            float(a.as_f64().unwrap_or_default() / b.as_f64().unwrap_or_default())
        }),
        BinaryOp::Remainder => numeric(operator, &left, &right, |a, b| {
            if b.as_f64() == Some(0.0) {
                return Err(EvaluationError::DivisionByZero);
            }
            arithmetic(a, b, i64::checked_rem, |x, y| x % y)
        }),
        BinaryOp::And | BinaryOp::Or => Ok(Value::Bool(match operator {
            BinaryOp::And => is_truthy(&left) && is_truthy(&right),
            _ => is_truthy(&left) || is_truthy(&right),
        })),
    }
}

fn numeric<F>(operator: BinaryOp, left: &Value, right: &Value, apply: F) -> Result<Value, EvaluationError>
where
    F: FnOnce(&Number, &Number) -> Result<Value, EvaluationError>,
{
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => apply(a, b),
        _ => Err(type_error(format!(
            "operator {operator:?} expects numbers, got {} and {}",
            kind_name(left),
            kind_name(right)
        ))),
    }
}

fn arithmetic(
    left: &Number,
    right: &Number,
    integer: fn(i64, i64) -> Option<i64>,
    floating: fn(f64, f64) -> f64,
) -> Result<Value, EvaluationError> {
    if let (Some(a), Some(b)) = (left.as_i64(), right.as_i64())
        && let Some(result) = integer(a, b)
    {
        return Ok(Value::from(result));
    }
    float(floating(left.as_f64().unwrap_or_default(), right.as_f64().unwrap_or_default()))
}

fn float(value: f64) -> Result<Value, EvaluationError> {
    Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| type_error(format!("arithmetic produced a non-finite number ({value})")))
}

fn compare(left: &Value, right: &Value) -> Result<Ordering, EvaluationError> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => {
            if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
                return Ok(a.cmp(&b));
            }
            let (a, b) = (a.as_f64().unwrap_or_default(), b.as_f64().unwrap_or_default());
            a.partial_cmp(&b)
                .ok_or_else(|| type_error("numbers are not comparable".to_string()))
        }
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        _ => Err(type_error(format!("cannot compare {} with {}", kind_name(left), kind_name(right)))),
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

fn type_error(reason: String) -> EvaluationError {
    EvaluationError::Type(reason)
}

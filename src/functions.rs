// Built-in function implementations
//
// Handlers receive arguments that already passed signature resolution, but
// they still re-check what they destructure and report a TypeError instead of
// panicking. Variadic tails are only validated here.

use thiserror::Error;

use crate::evaluator::{Evaluator, EvaluatorError, ExpressionRef};
use crate::signature::SignatureError;
use crate::value::{JValue, Map};

/// Function errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FunctionError {
    #[error("Arity error: {name}() expects {}{expected} argument(s), got {actual}", at_least(.variadic))]
    Arity {
        name: String,
        expected: usize,
        actual: usize,
        variadic: bool,
    },

    #[error("Type error: {0}")]
    TypeError(String),

    #[error("Unknown function: {0}()")]
    UnknownFunction(String),

    #[error("Duplicate function: {0}() is already defined")]
    DuplicateFunction(String),

    #[error("Registry frozen: cannot register {0}() once searches may run")]
    RegistryFrozen(String),

    #[error("Invalid signature for {name}(): {reason}")]
    InvalidSignature { name: String, reason: String },

    #[error(transparent)]
    Evaluation(#[from] EvaluatorError),

    #[error("Conversion error: {0}")]
    ConversionError(String),
}

fn at_least(variadic: &bool) -> &'static str {
    if *variadic {
        "at least "
    } else {
        ""
    }
}

impl FunctionError {
    /// Attach the function name to a signature failure.
    pub fn from_signature(name: &str, err: SignatureError) -> Self {
        match err {
            SignatureError::ArgumentCountMismatch {
                expected,
                actual,
                variadic,
            } => FunctionError::Arity {
                name: name.to_string(),
                expected,
                actual,
                variadic,
            },
            SignatureError::TypeMismatch { .. } => {
                FunctionError::TypeError(format!("{}(): {}", name, err))
            }
            SignatureError::InvalidSignature(reason) => FunctionError::InvalidSignature {
                name: name.to_string(),
                reason,
            },
        }
    }
}

// ── Argument accessors ──────────────────────────────────────────────────────

fn arg<'a>(name: &str, args: &'a [JValue], i: usize) -> Result<&'a JValue, FunctionError> {
    args.get(i).ok_or_else(|| FunctionError::Arity {
        name: name.to_string(),
        expected: i + 1,
        actual: args.len(),
        variadic: false,
    })
}

fn mismatch(name: &str, value: &JValue, expected: &str) -> FunctionError {
    FunctionError::TypeError(format!(
        "{}(): invalid type for {}, expected {}",
        name, value, expected
    ))
}

fn number_arg(name: &str, args: &[JValue], i: usize) -> Result<f64, FunctionError> {
    let value = arg(name, args, i)?;
    value.as_f64().ok_or_else(|| mismatch(name, value, "number"))
}

fn string_arg<'a>(name: &str, args: &'a [JValue], i: usize) -> Result<&'a str, FunctionError> {
    let value = arg(name, args, i)?;
    value.as_str().ok_or_else(|| mismatch(name, value, "string"))
}

fn array_arg<'a>(name: &str, args: &'a [JValue], i: usize) -> Result<&'a Vec<JValue>, FunctionError> {
    let value = arg(name, args, i)?;
    value.as_array().ok_or_else(|| mismatch(name, value, "array"))
}

fn object_arg<'a>(name: &str, args: &'a [JValue], i: usize) -> Result<&'a Map, FunctionError> {
    let value = arg(name, args, i)?;
    value.as_object().ok_or_else(|| mismatch(name, value, "object"))
}

fn expref_arg<'a>(
    name: &str,
    args: &'a [JValue],
    i: usize,
) -> Result<&'a ExpressionRef, FunctionError> {
    let value = arg(name, args, i)?;
    value.as_expref().ok_or_else(|| mismatch(name, value, "expref"))
}

/// Built-in string functions
pub mod string {
    use super::*;

    /// starts_with(string, string)
    pub fn starts_with(args: &[JValue]) -> Result<JValue, FunctionError> {
        let subject = string_arg("starts_with", args, 0)?;
        let prefix = string_arg("starts_with", args, 1)?;
        Ok(JValue::Bool(subject.starts_with(prefix)))
    }

    /// ends_with(string, string)
    pub fn ends_with(args: &[JValue]) -> Result<JValue, FunctionError> {
        let subject = string_arg("ends_with", args, 0)?;
        let suffix = string_arg("ends_with", args, 1)?;
        Ok(JValue::Bool(subject.ends_with(suffix)))
    }

    /// join(string, array[string]) - no coercion of non-string elements
    pub fn join(args: &[JValue]) -> Result<JValue, FunctionError> {
        let separator = string_arg("join", args, 0)?;
        let items = array_arg("join", args, 1)?;
        let mut parts = Vec::with_capacity(items.len());
        for item in items.iter() {
            parts.push(item.as_str().ok_or_else(|| mismatch("join", item, "string"))?);
        }
        Ok(JValue::from(parts.join(separator)))
    }
}

/// Built-in numeric functions
pub mod numeric {
    use super::*;
    use crate::ordering::{Extreme, Keys};

    pub fn abs(args: &[JValue]) -> Result<JValue, FunctionError> {
        Ok(JValue::Number(number_arg("abs", args, 0)?.abs()))
    }

    pub fn ceil(args: &[JValue]) -> Result<JValue, FunctionError> {
        Ok(JValue::Number(number_arg("ceil", args, 0)?.ceil()))
    }

    pub fn floor(args: &[JValue]) -> Result<JValue, FunctionError> {
        Ok(JValue::Number(number_arg("floor", args, 0)?.floor()))
    }

    fn numbers(name: &str, args: &[JValue]) -> Result<Vec<f64>, FunctionError> {
        array_arg(name, args, 0)?
            .iter()
            .map(|item| item.as_f64().ok_or_else(|| mismatch(name, item, "number")))
            .collect()
    }

    /// sum(array[number]) - empty input sums to 0
    pub fn sum(args: &[JValue]) -> Result<JValue, FunctionError> {
        Ok(JValue::Number(numbers("sum", args)?.iter().sum()))
    }

    /// avg(array[number])
    ///
    /// An empty array divides zero by zero and yields NaN.
    pub fn avg(args: &[JValue]) -> Result<JValue, FunctionError> {
        let items = numbers("avg", args)?;
        let total: f64 = items.iter().sum();
        Ok(JValue::Number(total / items.len() as f64))
    }

    fn extreme(name: &str, args: &[JValue], which: Extreme) -> Result<JValue, FunctionError> {
        let items = array_arg(name, args, 0)?;
        let keys = Keys::collect(name, items.iter().cloned().map(Ok))?;
        Ok(keys
            .extreme_index(which)
            .map(|i| items[i].clone())
            .unwrap_or(JValue::Null))
    }

    /// max(array[number] | array[string]) - null for an empty array
    pub fn max(args: &[JValue]) -> Result<JValue, FunctionError> {
        extreme("max", args, Extreme::Max)
    }

    /// min(array[number] | array[string]) - null for an empty array
    pub fn min(args: &[JValue]) -> Result<JValue, FunctionError> {
        extreme("min", args, Extreme::Min)
    }
}

/// Built-in array functions
pub mod array {
    use super::*;
    use crate::ordering::{reorder, Keys};

    /// length(string | array | object); strings count code points
    pub fn length(args: &[JValue]) -> Result<JValue, FunctionError> {
        match arg("length", args, 0)? {
            JValue::String(s) => Ok(JValue::from(s.chars().count())),
            JValue::Array(items) => Ok(JValue::from(items.len())),
            JValue::Object(map) => Ok(JValue::from(map.len())),
            other => Err(mismatch("length", other, "one of [string, array, object]")),
        }
    }

    /// contains(array | string, any)
    pub fn contains(args: &[JValue]) -> Result<JValue, FunctionError> {
        let needle = arg("contains", args, 1)?;
        match arg("contains", args, 0)? {
            JValue::String(haystack) => Ok(JValue::Bool(
                needle.as_str().is_some_and(|n| haystack.contains(n)),
            )),
            JValue::Array(items) => Ok(JValue::Bool(items.iter().any(|item| item == needle))),
            other => Err(mismatch("contains", other, "one of [array, string]")),
        }
    }

    /// reverse(string | array); strings reverse by code point
    pub fn reverse(args: &[JValue]) -> Result<JValue, FunctionError> {
        match arg("reverse", args, 0)? {
            JValue::String(s) => Ok(JValue::from(s.chars().rev().collect::<String>())),
            JValue::Array(items) => Ok(JValue::array(items.iter().rev().cloned().collect())),
            other => Err(mismatch("reverse", other, "one of [array, string]")),
        }
    }

    /// sort(array[number] | array[string]) - stable ascending
    pub fn sort(args: &[JValue]) -> Result<JValue, FunctionError> {
        let items = array_arg("sort", args, 0)?;
        let keys = Keys::collect("sort", items.iter().cloned().map(Ok))?;
        Ok(JValue::array(reorder(items, &keys)))
    }
}

/// Built-in object functions
pub mod object {
    use super::*;

    /// keys(object)
    pub fn keys(args: &[JValue]) -> Result<JValue, FunctionError> {
        let map = object_arg("keys", args, 0)?;
        Ok(JValue::array(map.keys().map(|k| JValue::from(k.as_str())).collect()))
    }

    /// values(object)
    pub fn values(args: &[JValue]) -> Result<JValue, FunctionError> {
        let map = object_arg("values", args, 0)?;
        Ok(JValue::array(map.values().cloned().collect()))
    }

    /// merge(object, object...) - later keys overwrite earlier ones
    pub fn merge(args: &[JValue]) -> Result<JValue, FunctionError> {
        let mut merged = Map::new();
        for i in 0..args.len() {
            for (key, value) in object_arg("merge", args, i)? {
                merged.insert(key.clone(), value.clone());
            }
        }
        Ok(JValue::object(merged))
    }
}

/// Conversions and type inspection
pub mod conversion {
    use super::*;

    /// to_array(any)
    pub fn to_array(args: &[JValue]) -> Result<JValue, FunctionError> {
        match arg("to_array", args, 0)? {
            value @ JValue::Array(_) => Ok(value.clone()),
            value => Ok(JValue::array(vec![value.clone()])),
        }
    }

    /// to_string(any) - strings pass through, everything else is JSON-encoded
    pub fn to_string(args: &[JValue]) -> Result<JValue, FunctionError> {
        match arg("to_string", args, 0)? {
            value @ JValue::String(_) => Ok(value.clone()),
            value => value
                .to_json_string()
                .map(JValue::from)
                .map_err(|e| FunctionError::ConversionError(e.to_string())),
        }
    }

    /// to_number(any) - never fails; unconvertible input gives null
    pub fn to_number(args: &[JValue]) -> Result<JValue, FunctionError> {
        Ok(match arg("to_number", args, 0)? {
            JValue::Number(n) => JValue::Number(*n),
            JValue::String(s) => match s.parse::<f64>() {
                // Out-of-range literals overflow to infinity; only "inf" spelled out means it
                Ok(n) if n.is_infinite() && s.bytes().any(|b| b.is_ascii_digit()) => JValue::Null,
                Ok(n) => JValue::Number(n),
                Err(_) => JValue::Null,
            },
            _ => JValue::Null,
        })
    }

    /// type(any)
    pub fn type_of(args: &[JValue]) -> Result<JValue, FunctionError> {
        match arg("type", args, 0)? {
            JValue::ExpRef(_) => Err(FunctionError::ConversionError(
                "type(): expression references have no JSON type".to_string(),
            )),
            value => Ok(JValue::from(value.kind())),
        }
    }

    /// not_null(any...) - first non-null argument, else null
    pub fn not_null(args: &[JValue]) -> Result<JValue, FunctionError> {
        Ok(args
            .iter()
            .find(|v| !v.is_null())
            .cloned()
            .unwrap_or(JValue::Null))
    }
}

/// Functions that evaluate an expression reference per element
pub mod higher_order {
    use super::*;
    use crate::ordering::{reorder, Extreme, Keys};

    /// map(&expr, array) - one projection per element, order kept, nothing dropped
    pub fn map(evaluator: &dyn Evaluator, args: &[JValue]) -> Result<JValue, FunctionError> {
        let expression = expref_arg("map", args, 0)?;
        let items = array_arg("map", args, 1)?;
        let mapped = items
            .iter()
            .map(|item| evaluator.evaluate(expression, item))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(JValue::array(mapped))
    }

    /// sort_by(array, &expr) - stable sort on the projected key
    pub fn sort_by(evaluator: &dyn Evaluator, args: &[JValue]) -> Result<JValue, FunctionError> {
        let items = array_arg("sort_by", args, 0)?;
        let expression = expref_arg("sort_by", args, 1)?;
        if items.len() < 2 {
            return Ok(args[0].clone());
        }
        let keys = Keys::project("sort_by", evaluator, expression, items)?;
        Ok(JValue::array(reorder(items, &keys)))
    }

    fn extreme_by(
        name: &str,
        which: Extreme,
        evaluator: &dyn Evaluator,
        args: &[JValue],
    ) -> Result<JValue, FunctionError> {
        let items = array_arg(name, args, 0)?;
        let expression = expref_arg(name, args, 1)?;
        match items.len() {
            0 => Ok(JValue::Null),
            1 => Ok(items[0].clone()),
            _ => {
                let keys = Keys::project(name, evaluator, expression, items)?;
                Ok(keys
                    .extreme_index(which)
                    .map(|i| items[i].clone())
                    .unwrap_or(JValue::Null))
            }
        }
    }

    /// max_by(array, &expr)
    pub fn max_by(evaluator: &dyn Evaluator, args: &[JValue]) -> Result<JValue, FunctionError> {
        extreme_by("max_by", Extreme::Max, evaluator, args)
    }

    /// min_by(array, &expr)
    pub fn min_by(evaluator: &dyn Evaluator, args: &[JValue]) -> Result<JValue, FunctionError> {
        extreme_by("min_by", Extreme::Min, evaluator, args)
    }
}

// Evaluation capability handed to higher-order built-ins
//
// The function registry never sees the expression tree or the evaluator's
// state. It only gets something that can evaluate an opaque expression
// reference against a value.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::value::JValue;

/// Errors raised by an evaluator while projecting a value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluatorError {
    #[error("Type error: {0}")]
    TypeError(String),

    #[error("Reference error: {0}")]
    ReferenceError(String),

    #[error("Evaluation error: {0}")]
    EvaluationError(String),
}

/// An unevaluated sub-expression captured by `&expr` syntax.
///
/// The handle is type-erased: whichever evaluator built it stores its own
/// node type inside and recovers it with [`ExpressionRef::downcast_ref`].
/// Cloning shares the node.
#[derive(Clone)]
pub struct ExpressionRef {
    node: Arc<dyn Any + Send + Sync>,
}

impl ExpressionRef {
    pub fn new<T: Any + Send + Sync>(node: T) -> Self {
        ExpressionRef {
            node: Arc::new(node),
        }
    }

    /// Borrow the wrapped node if it is a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.node.downcast_ref::<T>()
    }
}

impl PartialEq for ExpressionRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }
}

impl fmt::Debug for ExpressionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ExpressionRef(..)")
    }
}

/// The single re-entry point from built-in functions into the evaluator.
///
/// Implementations must be pure with respect to the caller: `sort_by`,
/// `max_by` and `min_by` project each element once and cache the key.
pub trait Evaluator {
    fn evaluate(&self, expression: &ExpressionRef, input: &JValue)
        -> Result<JValue, EvaluatorError>;
}

impl<F> Evaluator for F
where
    F: Fn(&ExpressionRef, &JValue) -> Result<JValue, EvaluatorError>,
{
    fn evaluate(
        &self,
        expression: &ExpressionRef,
        input: &JValue,
    ) -> Result<JValue, EvaluatorError> {
        self(expression, input)
    }
}

/// Evaluator for call sites that never pass an expression reference.
///
/// Any attempt to evaluate through it is reported as an evaluation error.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEvaluator;

impl Evaluator for NoEvaluator {
    fn evaluate(&self, _: &ExpressionRef, _: &JValue) -> Result<JValue, EvaluatorError> {
        Err(EvaluatorError::EvaluationError(
            "no evaluator available for expression reference".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downcast_recovers_node() {
        let e = ExpressionRef::new(String::from("price"));
        assert_eq!(e.downcast_ref::<String>().map(String::as_str), Some("price"));
        assert!(e.downcast_ref::<u32>().is_none());
    }

    #[test]
    fn test_closure_is_an_evaluator() {
        let field = |expr: &ExpressionRef, input: &JValue| -> Result<JValue, EvaluatorError> {
            let name = expr
                .downcast_ref::<&'static str>()
                .ok_or_else(|| EvaluatorError::TypeError("bad node".to_string()))?;
            Ok(input.get(name).cloned().unwrap_or(JValue::Null))
        };
        let data = crate::jvalue!({"a": 1i64});
        let result = field.evaluate(&ExpressionRef::new("a"), &data).unwrap();
        assert_eq!(result, JValue::Number(1.0));
    }

    #[test]
    fn test_no_evaluator_fails() {
        let err = NoEvaluator
            .evaluate(&ExpressionRef::new(()), &JValue::Null)
            .unwrap_err();
        assert!(matches!(err, EvaluatorError::EvaluationError(_)));
    }
}

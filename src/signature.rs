// Function signature validation and type checking

use std::fmt;

use thiserror::Error;

use crate::value::JValue;

/// Signature validation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignatureError {
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Argument count mismatch: expected {}{expected}, got {actual}", at_least(.variadic))]
    ArgumentCountMismatch {
        expected: usize,
        actual: usize,
        variadic: bool,
    },

    #[error("invalid type for {value}, expected one of {}", TypeList(.expected))]
    TypeMismatch {
        value: JValue,
        expected: Vec<ParamType>,
    },
}

fn at_least(variadic: &bool) -> &'static str {
    if *variadic {
        "at least "
    } else {
        ""
    }
}

/// Parameter type tags a signature slot can accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamType {
    Number,
    String,
    /// Any array, no constraint on the elements.
    Array,
    Object,
    /// Array whose elements are all numbers (an empty array qualifies).
    ArrayOfNumber,
    /// Array whose elements are all strings (an empty array qualifies).
    ArrayOfString,
    /// Expression reference produced by `&expr`.
    ExpRef,
    Any,
}

impl ParamType {
    /// Whether `value` satisfies this single tag.
    pub fn matches(self, value: &JValue) -> bool {
        match self {
            ParamType::Number => value.is_number(),
            ParamType::String => value.is_string(),
            ParamType::Array => value.is_array(),
            ParamType::Object => value.is_object(),
            ParamType::ArrayOfNumber => all_elements(value, JValue::is_number),
            ParamType::ArrayOfString => all_elements(value, JValue::is_string),
            ParamType::ExpRef => value.is_expref(),
            ParamType::Any => true,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ParamType::Number => "number",
            ParamType::String => "string",
            ParamType::Array => "array",
            ParamType::Object => "object",
            ParamType::ArrayOfNumber => "array[number]",
            ParamType::ArrayOfString => "array[string]",
            ParamType::ExpRef => "expref",
            ParamType::Any => "any",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn all_elements(value: &JValue, pred: fn(&JValue) -> bool) -> bool {
    match value {
        JValue::Array(items) => items.iter().all(pred),
        _ => false,
    }
}

/// Formats `[number, string]` for error messages.
pub(crate) struct TypeList<'a>(pub &'a [ParamType]);

impl fmt::Display for TypeList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, t) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", t)?;
        }
        write!(f, "]")
    }
}

/// One positional slot of a signature.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    /// Accepted tags; a value matching any of them is accepted.
    pub types: Vec<ParamType>,
    /// A variadic slot takes zero or more trailing arguments.
    pub variadic: bool,
}

impl ParamSpec {
    pub fn new(types: &[ParamType]) -> Self {
        ParamSpec {
            types: types.to_vec(),
            variadic: false,
        }
    }

    pub fn variadic(types: &[ParamType]) -> Self {
        ParamSpec {
            types: types.to_vec(),
            variadic: true,
        }
    }

    /// Accept `arg` if it matches any listed tag.
    pub fn type_check(&self, arg: &JValue) -> Result<(), SignatureError> {
        if self.types.iter().any(|t| t.matches(arg)) {
            return Ok(());
        }
        Err(SignatureError::TypeMismatch {
            value: arg.clone(),
            expected: self.types.clone(),
        })
    }
}

/// Function signature
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Signature {
    pub params: Vec<ParamSpec>,
}

impl Signature {
    pub fn new(params: Vec<ParamSpec>) -> Self {
        Signature { params }
    }

    pub fn is_variadic(&self) -> bool {
        self.params.last().is_some_and(|p| p.variadic)
    }

    /// Fewest arguments a call may pass.
    ///
    /// A variadic slot may receive zero arguments, so only the slots before
    /// it count. `not_null()` is therefore legal, and so is `merge` with a
    /// single object.
    pub fn min_arity(&self) -> usize {
        if self.is_variadic() {
            self.params.len() - 1
        } else {
            self.params.len()
        }
    }

    /// Check the structural rules: no empty slot and only the last slot variadic.
    pub fn validate(&self) -> Result<(), SignatureError> {
        for (i, param) in self.params.iter().enumerate() {
            if param.types.is_empty() {
                return Err(SignatureError::InvalidSignature(format!(
                    "parameter {} accepts no types",
                    i
                )));
            }
            if param.variadic && i + 1 != self.params.len() {
                return Err(SignatureError::InvalidSignature(format!(
                    "parameter {} is variadic but not last",
                    i
                )));
            }
        }
        Ok(())
    }

    /// Validate a call's arguments against this signature.
    ///
    /// Fixed-arity signatures get an exact count check and a positional type
    /// check. Variadic signatures only get a minimum count check; the handler
    /// validates the arguments it consumes. An empty signature passes
    /// everything through.
    pub fn resolve_args<'a>(&self, args: &'a [JValue]) -> Result<&'a [JValue], SignatureError> {
        if self.params.is_empty() {
            return Ok(args);
        }

        if !self.is_variadic() {
            if args.len() != self.params.len() {
                return Err(SignatureError::ArgumentCountMismatch {
                    expected: self.params.len(),
                    actual: args.len(),
                    variadic: false,
                });
            }
            for (spec, arg) in self.params.iter().zip(args) {
                spec.type_check(arg)?;
            }
            return Ok(args);
        }

        if args.len() < self.min_arity() {
            return Err(SignatureError::ArgumentCountMismatch {
                expected: self.min_arity(),
                actual: args.len(),
                variadic: true,
            });
        }
        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::ExpressionRef;
    use serde_json::json;

    fn v(j: serde_json::Value) -> JValue {
        JValue::from(j)
    }

    #[test]
    fn test_type_tags() {
        assert!(ParamType::Number.matches(&v(json!(1.5))));
        assert!(!ParamType::Number.matches(&v(json!("1.5"))));
        assert!(ParamType::String.matches(&v(json!("x"))));
        assert!(ParamType::Array.matches(&v(json!([1, "a", null]))));
        assert!(ParamType::Object.matches(&v(json!({"a": 1}))));
        assert!(ParamType::ArrayOfNumber.matches(&v(json!([1, 2]))));
        assert!(!ParamType::ArrayOfNumber.matches(&v(json!([1, "2"]))));
        assert!(ParamType::ArrayOfString.matches(&v(json!(["a"]))));
        assert!(!ParamType::ArrayOfString.matches(&v(json!("a"))));
        assert!(ParamType::ExpRef.matches(&JValue::expref(ExpressionRef::new(()))));
        assert!(!ParamType::ExpRef.matches(&v(json!("&foo"))));
        assert!(ParamType::Any.matches(&JValue::Null));
    }

    #[test]
    fn test_empty_array_satisfies_homogeneous_tags() {
        let empty = v(json!([]));
        assert!(ParamType::ArrayOfNumber.matches(&empty));
        assert!(ParamType::ArrayOfString.matches(&empty));
    }

    #[test]
    fn test_booleans_only_satisfy_any() {
        let b = JValue::Bool(true);
        for t in [
            ParamType::Number,
            ParamType::String,
            ParamType::Array,
            ParamType::Object,
            ParamType::ArrayOfNumber,
            ParamType::ArrayOfString,
            ParamType::ExpRef,
        ] {
            assert!(!t.matches(&b), "{} should reject booleans", t);
        }
        assert!(ParamType::Any.matches(&b));
    }

    #[test]
    fn test_type_check_matches_any_listed_tag() {
        let spec = ParamSpec::new(&[ParamType::Array, ParamType::String]);
        assert!(spec.type_check(&v(json!("abc"))).is_ok());
        assert!(spec.type_check(&v(json!([]))).is_ok());

        let err = spec.type_check(&v(json!(3))).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid type for 3, expected one of [array, string]"
        );
    }

    #[test]
    fn test_fixed_arity() {
        let sig = Signature::new(vec![
            ParamSpec::new(&[ParamType::String]),
            ParamSpec::new(&[ParamType::String]),
        ]);
        assert!(sig.resolve_args(&[v(json!("a")), v(json!("b"))]).is_ok());
        assert_eq!(
            sig.resolve_args(&[v(json!("a"))]).unwrap_err(),
            SignatureError::ArgumentCountMismatch {
                expected: 2,
                actual: 1,
                variadic: false
            }
        );
        assert!(matches!(
            sig.resolve_args(&[v(json!("a")), v(json!(2))]),
            Err(SignatureError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_variadic_only_checks_minimum() {
        let sig = Signature::new(vec![
            ParamSpec::new(&[ParamType::Object]),
            ParamSpec::variadic(&[ParamType::Object]),
        ]);
        assert_eq!(sig.min_arity(), 1);
        assert!(sig.resolve_args(&[]).is_err());
        // tail types are left to the handler
        assert!(sig.resolve_args(&[v(json!(1)), v(json!("x"))]).is_ok());

        let any = Signature::new(vec![ParamSpec::variadic(&[ParamType::Any])]);
        assert!(any.resolve_args(&[]).is_ok());
    }

    #[test]
    fn test_empty_signature_passes_through() {
        let sig = Signature::default();
        let args = [v(json!(1)), v(json!("x"))];
        assert_eq!(sig.resolve_args(&args).unwrap().len(), 2);
    }

    #[test]
    fn test_validate() {
        assert!(Signature::new(vec![ParamSpec::variadic(&[ParamType::Any])])
            .validate()
            .is_ok());
        assert!(Signature::new(vec![
            ParamSpec::variadic(&[ParamType::Any]),
            ParamSpec::new(&[ParamType::Any]),
        ])
        .validate()
        .is_err());
        assert!(Signature::new(vec![ParamSpec::new(&[])]).validate().is_err());
    }
}

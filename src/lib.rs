// jmespath-core - function subsystem of a JMESPath-style query engine
// Licensed under the MIT License

//! # jmespath_core
//!
//! The built-in function layer of a JMESPath-style JSON query language: a
//! registry of named functions, the signature checks applied to every call,
//! and the bridge that lets `map`, `sort_by`, `max_by` and `min_by` evaluate
//! an expression reference against each element of an array.
//!
//! Parsing and tree evaluation live elsewhere. The evaluator reaches this
//! crate through [`FunctionRegistry::call_function`] and lends it an
//! [`Evaluator`] for the duration of the call.
//!
//! ## Architecture
//!
//! - `value` - `JValue`, the JSON value model plus expression references
//! - `evaluator` - the `Evaluator` capability and `ExpressionRef` handles
//! - `signature` - parameter types, signatures, argument resolution
//! - `functions` - built-in function implementations and `FunctionError`
//! - `ordering` - key projection and comparison for sorting and extremes
//! - `registry` - name → function table and call dispatch
//!
//! ## Example
//!
//! ```
//! use jmespath_core::{FunctionRegistry, JValue, NoEvaluator};
//!
//! let registry = FunctionRegistry::new().freeze();
//! let data = JValue::from_json_str(r#"[3, 1, 2]"#).unwrap();
//! let max = registry.call_function("max", &[data], &NoEvaluator).unwrap();
//! assert_eq!(max, JValue::Number(3.0));
//! ```

pub mod value;
pub mod evaluator;
pub mod signature;
pub mod functions;
pub mod ordering;
pub mod registry;

pub use evaluator::{Evaluator, EvaluatorError, ExpressionRef, NoEvaluator};
pub use functions::FunctionError;
pub use registry::{FunctionEntry, FunctionRegistry, Handler};
pub use signature::{ParamSpec, ParamType, Signature, SignatureError};
pub use value::{JValue, Map};

#[cfg(test)]
mod tests {
    #[test]
    fn test_crate_version() {
        assert_eq!(env!("CARGO_PKG_VERSION"), "0.1.0");
    }
}

//! Function registry and call dispatch.
//!
//! A [`FunctionRegistry`] maps names to [`FunctionEntry`] records. It is
//! seeded with the built-ins, may take custom registrations while it is
//! still exclusively owned, and is then frozen into an `Arc` that any number
//! of search threads can dispatch through concurrently.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::{debug, trace};

use crate::evaluator::Evaluator;
use crate::functions::{array, conversion, higher_order, numeric, object, string, FunctionError};
use crate::signature::{ParamSpec, ParamType, Signature};
use crate::value::JValue;

/// Handler that only needs its arguments.
pub type PureFn = dyn Fn(&[JValue]) -> Result<JValue, FunctionError> + Send + Sync;

/// Handler that evaluates expression references through the caller's evaluator.
pub type HigherOrderFn =
    dyn Fn(&dyn Evaluator, &[JValue]) -> Result<JValue, FunctionError> + Send + Sync;

/// How a function is invoked once its arguments are resolved.
#[derive(Clone)]
pub enum Handler {
    Pure(Arc<PureFn>),
    /// Receives the evaluator ahead of its arguments.
    HigherOrder(Arc<HigherOrderFn>),
}

impl Handler {
    pub fn pure<F>(f: F) -> Self
    where
        F: Fn(&[JValue]) -> Result<JValue, FunctionError> + Send + Sync + 'static,
    {
        Handler::Pure(Arc::new(f))
    }

    pub fn higher_order<F>(f: F) -> Self
    where
        F: Fn(&dyn Evaluator, &[JValue]) -> Result<JValue, FunctionError> + Send + Sync + 'static,
    {
        Handler::HigherOrder(Arc::new(f))
    }

    pub fn needs_evaluator(&self) -> bool {
        matches!(self, Handler::HigherOrder(_))
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Pure(_) => f.write_str("Handler::Pure"),
            Handler::HigherOrder(_) => f.write_str("Handler::HigherOrder"),
        }
    }
}

/// A named function: its signature plus the handler that runs it.
#[derive(Debug, Clone)]
pub struct FunctionEntry {
    pub name: String,
    pub signature: Signature,
    pub handler: Handler,
}

impl FunctionEntry {
    pub fn new(name: impl Into<String>, params: Vec<ParamSpec>, handler: Handler) -> Self {
        FunctionEntry {
            name: name.into(),
            signature: Signature::new(params),
            handler,
        }
    }

    pub fn needs_evaluator(&self) -> bool {
        self.handler.needs_evaluator()
    }

    /// Resolve `args` against the signature and run the handler.
    pub fn call(&self, args: &[JValue], evaluator: &dyn Evaluator) -> Result<JValue, FunctionError> {
        let resolved = self
            .signature
            .resolve_args(args)
            .map_err(|e| FunctionError::from_signature(&self.name, e))?;
        match &self.handler {
            Handler::Pure(f) => f(resolved),
            Handler::HigherOrder(f) => f(evaluator, resolved),
        }
    }
}

/// Name → function table used by the evaluator for every call node.
#[derive(Debug, Clone)]
pub struct FunctionRegistry {
    functions: HashMap<String, FunctionEntry>,
    frozen: bool,
}

impl FunctionRegistry {
    /// A registry seeded with every built-in function.
    pub fn new() -> Self {
        let mut registry = FunctionRegistry::empty();
        for entry in builtins() {
            registry.functions.insert(entry.name.clone(), entry);
        }
        debug!("function registry created with {} built-ins", registry.len());
        registry
    }

    /// A registry with no functions at all.
    pub fn empty() -> Self {
        FunctionRegistry {
            functions: HashMap::new(),
            frozen: false,
        }
    }

    /// Register a custom function.
    ///
    /// Names are never shadowed or replaced: a name that already exists,
    /// built-in or custom, is rejected. Registration must happen before the
    /// registry is frozen.
    pub fn add_custom_function(&mut self, entry: FunctionEntry) -> Result<(), FunctionError> {
        if self.frozen {
            debug!("rejected registration of {}(): registry is frozen", entry.name);
            return Err(FunctionError::RegistryFrozen(entry.name));
        }
        entry
            .signature
            .validate()
            .map_err(|e| FunctionError::from_signature(&entry.name, e))?;
        if self.functions.contains_key(&entry.name) {
            debug!("rejected registration of {}(): name already defined", entry.name);
            return Err(FunctionError::DuplicateFunction(entry.name));
        }
        debug!(
            "registered custom function {}() with {} parameter(s)",
            entry.name,
            entry.signature.params.len()
        );
        self.functions.insert(entry.name.clone(), entry);
        Ok(())
    }

    /// Stop accepting registrations and share the registry.
    pub fn freeze(mut self) -> Arc<FunctionRegistry> {
        self.frozen = true;
        debug!("function registry frozen with {} function(s)", self.len());
        Arc::new(self)
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Dispatch a call: look up `name`, validate `args`, run the handler.
    ///
    /// Higher-order functions get `evaluator` for projecting elements; other
    /// handlers never see it. Handler errors are returned unchanged.
    pub fn call_function(
        &self,
        name: &str,
        args: &[JValue],
        evaluator: &dyn Evaluator,
    ) -> Result<JValue, FunctionError> {
        let entry = self.functions.get(name).ok_or_else(|| {
            debug!("call to unknown function {}()", name);
            FunctionError::UnknownFunction(name.to_string())
        })?;
        trace!("calling {}() with {} argument(s)", name, args.len());
        entry.call(args, evaluator)
    }

    pub fn get(&self, name: &str) -> Option<&FunctionEntry> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        FunctionRegistry::new()
    }
}

// ── Built-in table ──────────────────────────────────────────────────────────

fn fixed(types: &[ParamType]) -> ParamSpec {
    ParamSpec::new(types)
}

fn pure(
    name: &str,
    params: Vec<ParamSpec>,
    f: fn(&[JValue]) -> Result<JValue, FunctionError>,
) -> FunctionEntry {
    FunctionEntry::new(name, params, Handler::pure(f))
}

fn higher(
    name: &str,
    params: Vec<ParamSpec>,
    f: fn(&dyn Evaluator, &[JValue]) -> Result<JValue, FunctionError>,
) -> FunctionEntry {
    FunctionEntry::new(name, params, Handler::higher_order(f))
}

fn builtins() -> Vec<FunctionEntry> {
    use ParamType::*;

    vec![
        pure("abs", vec![fixed(&[Number])], numeric::abs),
        pure("avg", vec![fixed(&[ArrayOfNumber])], numeric::avg),
        pure("ceil", vec![fixed(&[Number])], numeric::ceil),
        pure("contains", vec![fixed(&[Array, String]), fixed(&[Any])], array::contains),
        pure("ends_with", vec![fixed(&[String]), fixed(&[String])], string::ends_with),
        pure("floor", vec![fixed(&[Number])], numeric::floor),
        pure("join", vec![fixed(&[String]), fixed(&[ArrayOfString])], string::join),
        pure("keys", vec![fixed(&[Object])], object::keys),
        pure("length", vec![fixed(&[String, Array, Object])], array::length),
        higher("map", vec![fixed(&[ExpRef]), fixed(&[Array])], higher_order::map),
        pure("max", vec![fixed(&[ArrayOfNumber, ArrayOfString])], numeric::max),
        higher("max_by", vec![fixed(&[Array]), fixed(&[ExpRef])], higher_order::max_by),
        pure(
            "merge",
            vec![fixed(&[Object]), ParamSpec::variadic(&[Object])],
            object::merge,
        ),
        pure("min", vec![fixed(&[ArrayOfNumber, ArrayOfString])], numeric::min),
        higher("min_by", vec![fixed(&[Array]), fixed(&[ExpRef])], higher_order::min_by),
        pure("not_null", vec![ParamSpec::variadic(&[Any])], conversion::not_null),
        pure("reverse", vec![fixed(&[Array, String])], array::reverse),
        pure("sort", vec![fixed(&[ArrayOfNumber, ArrayOfString])], array::sort),
        higher("sort_by", vec![fixed(&[Array]), fixed(&[ExpRef])], higher_order::sort_by),
        pure("starts_with", vec![fixed(&[String]), fixed(&[String])], string::starts_with),
        pure("sum", vec![fixed(&[ArrayOfNumber])], numeric::sum),
        pure("to_array", vec![fixed(&[Any])], conversion::to_array),
        pure("to_number", vec![fixed(&[Any])], conversion::to_number),
        pure("to_string", vec![fixed(&[Any])], conversion::to_string),
        pure("type", vec![fixed(&[Any])], conversion::type_of),
        pure("values", vec![fixed(&[Object])], object::values),
    ]
}

//! Ordered comparators for `sort`, `max`, `min` and their `_by` variants.
//!
//! Every element is turned into a comparison key exactly once. The first key
//! decides whether the run compares numbers or strings; each later key must be
//! the same kind. Sorting is done on an index permutation with a stable sort,
//! so equal keys keep their original relative order.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::evaluator::{Evaluator, ExpressionRef};
use crate::functions::FunctionError;
use crate::signature::{ParamType, TypeList};
use crate::value::JValue;

/// Which end of the ordering a scan looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extreme {
    Max,
    Min,
}

/// Homogeneous comparison keys, one per input element.
#[derive(Debug, Clone, PartialEq)]
pub enum Keys {
    Numbers(Vec<f64>),
    Strings(Vec<Arc<str>>),
}

impl Keys {
    pub fn len(&self) -> usize {
        match self {
            Keys::Numbers(v) => v.len(),
            Keys::Strings(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Gather keys from already-computed values.
    ///
    /// The first value fixes the key kind. Errors in the iterator are returned
    /// as soon as they are reached, so nothing after a failing element runs.
    pub fn collect<I>(name: &str, values: I) -> Result<Keys, FunctionError>
    where
        I: IntoIterator<Item = Result<JValue, FunctionError>>,
    {
        let mut values = values.into_iter();
        let mut keys = match values.next().transpose()? {
            None => return Ok(Keys::Numbers(Vec::new())),
            Some(JValue::Number(n)) => Keys::Numbers(vec![n]),
            Some(JValue::String(s)) => Keys::Strings(vec![s]),
            Some(other) => {
                return Err(FunctionError::TypeError(format!(
                    "{}(): invalid type for {}, expected one of {}",
                    name,
                    other,
                    TypeList(&[ParamType::Number, ParamType::String])
                )))
            }
        };

        for value in values {
            match (&mut keys, value?) {
                (Keys::Numbers(v), JValue::Number(n)) => v.push(n),
                (Keys::Strings(v), JValue::String(s)) => v.push(s),
                (keys, other) => {
                    let expected = match keys {
                        Keys::Numbers(_) => ParamType::Number,
                        Keys::Strings(_) => ParamType::String,
                    };
                    return Err(FunctionError::TypeError(format!(
                        "{}(): invalid type for {}, expected {}",
                        name, other, expected
                    )));
                }
            }
        }
        Ok(keys)
    }

    /// Project every item through `expression` and gather the results as keys.
    pub fn project(
        name: &str,
        evaluator: &dyn Evaluator,
        expression: &ExpressionRef,
        items: &[JValue],
    ) -> Result<Keys, FunctionError> {
        Keys::collect(
            name,
            items
                .iter()
                .map(|item| evaluator.evaluate(expression, item).map_err(FunctionError::from)),
        )
    }

    /// Indices of the keys in ascending order; ties keep input order.
    pub fn sorted_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.len()).collect();
        match self {
            Keys::Numbers(v) => indices.sort_by(|&a, &b| compare_numbers(v[a], v[b])),
            Keys::Strings(v) => indices.sort_by(|&a, &b| v[a].cmp(&v[b])),
        }
        indices
    }

    /// Index of the largest or smallest key, `None` when there are no keys.
    ///
    /// Uses strict comparison, so the first of several equal extremes wins.
    pub fn extreme_index(&self, extreme: Extreme) -> Option<usize> {
        match self {
            Keys::Numbers(v) => scan(v, extreme),
            Keys::Strings(v) => scan(v, extreme),
        }
    }
}

fn scan<T: PartialOrd>(values: &[T], extreme: Extreme) -> Option<usize> {
    if values.is_empty() {
        return None;
    }
    let mut best = 0;
    for i in 1..values.len() {
        let better = match extreme {
            Extreme::Max => values[i] > values[best],
            Extreme::Min => values[i] < values[best],
        };
        if better {
            best = i;
        }
    }
    Some(best)
}

/// Total order for sorting numbers; NaN sorts before everything else.
pub fn compare_numbers(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b)
        .unwrap_or_else(|| b.is_nan().cmp(&a.is_nan()))
}

/// Reorder `items` by ascending key.
pub fn reorder(items: &[JValue], keys: &Keys) -> Vec<JValue> {
    keys.sorted_indices()
        .into_iter()
        .map(|i| items[i].clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::EvaluatorError;
    use serde_json::json;

    fn values(j: serde_json::Value) -> Vec<Result<JValue, FunctionError>> {
        match JValue::from(j) {
            JValue::Array(items) => items.iter().cloned().map(Ok).collect(),
            _ => panic!("expected array"),
        }
    }

    #[test]
    fn test_collect_discovers_kind() {
        let keys = Keys::collect("t", values(json!([3, 1, 2]))).unwrap();
        assert_eq!(keys, Keys::Numbers(vec![3.0, 1.0, 2.0]));

        let keys = Keys::collect("t", values(json!(["b", "a"]))).unwrap();
        assert!(matches!(keys, Keys::Strings(ref v) if v.len() == 2));
    }

    #[test]
    fn test_collect_rejects_mixed_kinds() {
        let err = Keys::collect("sort_by", values(json!([1, "a"]))).unwrap_err();
        assert_eq!(
            err,
            FunctionError::TypeError(
                "sort_by(): invalid type for \"a\", expected number".to_string()
            )
        );
    }

    #[test]
    fn test_collect_rejects_non_comparable_first_key() {
        let err = Keys::collect("max_by", values(json!([true, 1]))).unwrap_err();
        assert!(matches!(err, FunctionError::TypeError(msg) if msg.contains("[number, string]")));
    }

    #[test]
    fn test_collect_stops_at_first_error() {
        let mut seen = 0;
        let input = (0..5).map(|i| {
            seen += 1;
            if i == 2 {
                Err(FunctionError::from(EvaluatorError::EvaluationError("boom".into())))
            } else {
                Ok(JValue::from(i as f64))
            }
        });
        assert!(Keys::collect("t", input).is_err());
        assert_eq!(seen, 3);
    }

    #[test]
    fn test_sorted_indices_are_stable() {
        let keys = Keys::Numbers(vec![2.0, 1.0, 2.0, 1.0]);
        assert_eq!(keys.sorted_indices(), vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_extreme_first_wins_ties() {
        let keys = Keys::Numbers(vec![1.0, 5.0, 5.0, 0.0, 0.0]);
        assert_eq!(keys.extreme_index(Extreme::Max), Some(1));
        assert_eq!(keys.extreme_index(Extreme::Min), Some(3));
        assert_eq!(Keys::Numbers(vec![]).extreme_index(Extreme::Max), None);
    }

    #[test]
    fn test_nan_sorts_first() {
        assert_eq!(compare_numbers(f64::NAN, 1.0), Ordering::Less);
        assert_eq!(compare_numbers(1.0, f64::NAN), Ordering::Greater);
        assert_eq!(compare_numbers(f64::NAN, f64::NAN), Ordering::Equal);
        assert_eq!(compare_numbers(1.0, 2.0), Ordering::Less);
    }
}

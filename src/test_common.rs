#![cfg(test)]

use crate::condition::{Condition, Predicate};
use crate::condition_value::ConditionValue;
use crate::eval::{Error, EvaluationContext};
use crate::feature::Feature;
use crate::store::Store;
use maplit::hashmap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub struct TestStore {
    features: HashMap<String, Arc<Feature>>,
}

impl TestStore {
    pub fn new() -> Self {
        Self {
            features: hashmap! {
                "true".to_string() => Arc::new(Feature::new("true", [true])),
                "false".to_string() => Arc::new(Feature::new("false", [false])),
                "nested".to_string() => Arc::new(Feature::new(
                    "nested",
                    [Condition::reference("true"), Condition::reference("false")],
                )),
            },
        }
    }
}

impl Store for TestStore {
    fn feature(&self, name: &str) -> Option<Arc<Feature>> {
        self.features.get(name).cloned()
    }
}

/// A predicate object which returns a fixed value and counts how often it was asked.
pub struct CountingPredicate {
    value: ConditionValue,
    pub calls: AtomicUsize,
}

impl CountingPredicate {
    pub fn returning(value: impl Into<ConditionValue>) -> Self {
        Self {
            value: value.into(),
            calls: AtomicUsize::new(0),
        }
    }
}

impl Predicate for CountingPredicate {
    fn call(&self, _context: &EvaluationContext<'_>) -> Result<ConditionValue, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.value.clone())
    }
}

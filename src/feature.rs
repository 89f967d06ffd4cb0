use crate::condition::Condition;
use crate::eval::{self, EvaluationStack};
use crate::store::Store;

/// A named feature guarded by a list of conditions.
///
/// A feature is active when every one of its conditions is met. Its conditions are normalized
/// once, when it is created, and never change afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct Feature {
    name: String,
    conditions: Vec<Condition>,
}

impl Feature {
    /// Create a feature named `name`.
    ///
    /// Conditions may be nested with [Condition::list] or given as static arrays; both are
    /// flattened into a single ordered list. Null values contribute nothing and are dropped.
    pub fn new<N, I, C>(name: N, conditions: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = C>,
        C: Into<Condition>,
    {
        let mut normalized = Vec::new();
        for condition in conditions {
            condition.into().normalize_into(&mut normalized);
        }

        Self {
            name: name.into(),
            conditions: normalized,
        }
    }

    /// Create a feature with no conditions. Such a feature is always active.
    pub fn without_conditions(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            conditions: Vec::new(),
        }
    }

    /// The name this feature was created with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The normalized conditions, in the order they were given.
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Returns whether every condition of this feature is met.
    ///
    /// Conditions are checked left to right and checking stops at the first one that is not met.
    /// References and predicates may look up other features in `store`; the first [eval::Error]
    /// encountered is returned as is.
    pub fn is_active(&self, store: &dyn Store) -> Result<bool, eval::Error> {
        let evaluation_stack = EvaluationStack::default();
        self.is_active_internal(store, &evaluation_stack)
    }

    pub(crate) fn is_active_internal(
        &self,
        store: &dyn Store,
        evaluation_stack: &EvaluationStack,
    ) -> Result<bool, eval::Error> {
        evaluation_stack.with_feature(self, || {
            // a feature is active if _all_ of its conditions are met
            for condition in &self.conditions {
                if !eval::condition_met_internal(
                    condition,
                    store,
                    Some(self.name.as_str()),
                    evaluation_stack,
                )? {
                    return Ok(false);
                }
            }
            Ok(true)
        })
    }
}

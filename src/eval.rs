use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use log::{debug, warn};
use serde::Serialize;

use crate::condition::Condition;
use crate::feature::Feature;
use crate::store::Store;

const PREALLOCATED_FEATURE_CHAIN_SIZE: usize = 20;

/// Tracks the features currently being evaluated by one query so that reference cycles are
/// reported instead of recursing forever.
///
/// Features are tracked by address rather than name: a feature built outside a store may share
/// its name with the stored feature it references without that being a cycle.
pub(crate) struct EvaluationStack {
    feature_chain: RefCell<HashSet<usize>>,
}

impl EvaluationStack {
    fn new() -> Self {
        Self {
            feature_chain: RefCell::new(HashSet::with_capacity(PREALLOCATED_FEATURE_CHAIN_SIZE)),
        }
    }

    /// Runs `f` with `feature` on the stack. The feature is popped again whatever `f` returns, so
    /// a feature reached twice through different paths is not mistaken for a cycle.
    pub(crate) fn with_feature<T>(
        &self,
        feature: &Feature,
        f: impl FnOnce() -> Result<T, Error>,
    ) -> Result<T, Error> {
        let id = feature as *const Feature as usize;
        if !self.feature_chain.borrow_mut().insert(id) {
            warn!(
                "feature {} depends on itself through a chain of references",
                feature.name()
            );
            return Err(Error::CircularReference {
                name: feature.name().to_owned(),
            });
        }

        let result = f();
        self.feature_chain.borrow_mut().remove(&id);
        result
    }
}

impl Default for EvaluationStack {
    fn default() -> Self {
        Self::new()
    }
}

/// The view of the world a [crate::Predicate] gets while it is being evaluated.
///
/// A context is created fresh for every predicate invocation and only lives as long as that
/// invocation.
pub struct EvaluationContext<'a> {
    store: &'a dyn Store,
    feature_name: Option<&'a str>,
    evaluation_stack: &'a EvaluationStack,
}

impl<'a> EvaluationContext<'a> {
    /// Returns whether the feature named `name` is active.
    ///
    /// Fails with [Error::FeatureNotFound] if no such feature exists.
    pub fn is_active(&self, name: &str) -> Result<bool, Error> {
        reference_met(name, self.store, self.evaluation_stack)
    }

    /// The name of the feature whose condition is being evaluated, if the predicate is being
    /// evaluated on behalf of a feature rather than directly through [condition_met].
    pub fn feature_name(&self) -> Option<&str> {
        self.feature_name
    }
}

/// Decide whether a single condition is met.
///
/// Static values are judged by [crate::ConditionValue::is_met]. References are looked up in
/// `store` and are met when the referenced feature is active. Predicates are invoked with a fresh
/// [EvaluationContext] and their result is judged like a static value.
///
/// Any [Error] raised while resolving a reference, whether directly or from inside a predicate,
/// is returned unchanged.
pub fn condition_met(condition: &Condition, store: &dyn Store) -> Result<bool, Error> {
    let evaluation_stack = EvaluationStack::default();
    condition_met_internal(condition, store, None, &evaluation_stack)
}

pub(crate) fn condition_met_internal(
    condition: &Condition,
    store: &dyn Store,
    feature_name: Option<&str>,
    evaluation_stack: &EvaluationStack,
) -> Result<bool, Error> {
    match condition {
        Condition::Static(value) => Ok(value.is_met()),
        Condition::Reference(name) => reference_met(name, store, evaluation_stack),
        Condition::Predicate(predicate) => {
            let context = EvaluationContext {
                store,
                feature_name,
                evaluation_stack,
            };
            Ok(predicate.call(&context)?.is_met())
        }
        // only reachable when a group is passed in directly; a group is a value, and values other
        // than false and null are met
        Condition::List(_) => Ok(true),
    }
}

fn reference_met(
    name: &str,
    store: &dyn Store,
    evaluation_stack: &EvaluationStack,
) -> Result<bool, Error> {
    let feature = lookup(store, name)?;
    feature.is_active_internal(store, evaluation_stack)
}

pub(crate) fn lookup(store: &dyn Store, name: &str) -> Result<Arc<Feature>, Error> {
    store.feature(name).ok_or_else(|| {
        debug!("feature {} was referenced but is not defined", name);
        Error::FeatureNotFound {
            name: name.to_owned(),
        }
    })
}

/// Error describes why a feature could not be evaluated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "kind")]
pub enum Error {
    /// FeatureNotFound indicates that a feature was looked up by a name that was never
    /// registered.
    FeatureNotFound {
        /// The name that could not be found.
        name: String,
    },
    /// CircularReference indicates that a feature depends on itself, directly or through other
    /// features.
    CircularReference {
        /// The feature that was reached a second time.
        name: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::FeatureNotFound { name } => write!(f, "feature {} is not defined", name),
            Error::CircularReference { name } => {
                write!(f, "feature {} references itself", name)
            }
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition_value::ConditionValue;
    use crate::test_common::{CountingPredicate, TestStore};
    use crate::Registry;
    use spectral::prelude::*;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use test_case::test_case;

    #[test_case(ConditionValue::Bool(true), true)]
    #[test_case(ConditionValue::from("anything"), true)]
    #[test_case(ConditionValue::Bool(false), false)]
    #[test_case(ConditionValue::Null, false)]
    fn truthiness_is_identical_for_values_and_callables(value: ConditionValue, expected: bool) {
        let store = TestStore::new();

        assert_eq!(
            condition_met(&Condition::Static(value.clone()), &store),
            Ok(expected),
            "bare value"
        );

        let returned = value.clone();
        let closure = Condition::predicate(move |_| Ok(returned.clone()));
        assert_eq!(
            condition_met(&closure, &store),
            Ok(expected),
            "closure returning the value"
        );

        let callable = Condition::callable(CountingPredicate::returning(value));
        assert_eq!(
            condition_met(&callable, &store),
            Ok(expected),
            "callable object returning the value"
        );
    }

    #[test]
    fn reference_resolves_to_referenced_feature() {
        let registry = Registry::new();
        registry.add("referenced", [true]);
        registry.add("disabled", [false]);

        assert_eq!(
            condition_met(&Condition::reference("referenced"), &registry),
            Ok(true)
        );
        assert_eq!(
            condition_met(&Condition::reference("disabled"), &registry),
            Ok(false)
        );
    }

    #[test]
    fn missing_reference_is_an_error() {
        let store = TestStore::new();
        let result = condition_met(&Condition::reference("missing"), &store);

        assert_eq!(
            result,
            Err(Error::FeatureNotFound {
                name: "missing".to_string(),
            })
        );
        assert_eq!(
            result.unwrap_err().to_string(),
            "feature missing is not defined"
        );
    }

    #[test]
    fn predicate_combines_referenced_features() {
        let store = TestStore::new();

        let either =
            Condition::predicate(|ctx| Ok(ctx.is_active("true")? || ctx.is_active("false")?));
        let both =
            Condition::predicate(|ctx| Ok(ctx.is_active("true")? && ctx.is_active("false")?));

        assert_eq!(condition_met(&either, &store), Ok(true));
        assert_eq!(condition_met(&both, &store), Ok(false));
    }

    #[test]
    fn predicate_propagates_missing_feature() {
        let store = TestStore::new();
        let predicate = Condition::predicate(|ctx| ctx.is_active("missing"));

        assert_eq!(
            condition_met(&predicate, &store),
            Err(Error::FeatureNotFound {
                name: "missing".to_string(),
            })
        );
    }

    #[test]
    fn predicate_is_invoked_on_every_evaluation() {
        let store = TestStore::new();
        let predicate = Arc::new(CountingPredicate::returning(true));
        let condition = Condition::Predicate(predicate.clone());

        for _ in 0..3 {
            assert_eq!(condition_met(&condition, &store), Ok(true));
        }
        assert_that!(predicate.calls.load(Ordering::SeqCst)).is_equal_to(3);
    }

    #[test]
    fn feature_name_is_only_known_inside_a_feature() {
        let registry = Registry::new();
        let named = Condition::predicate(|ctx| Ok(ctx.feature_name() == Some("named")));
        registry.add("named", [named.clone()]);

        assert_eq!(registry.is_active("named"), Ok(true));
        assert_eq!(condition_met(&named, &registry), Ok(false));
    }

    #[test]
    fn group_passed_directly_is_met() {
        let store = TestStore::new();
        let group = Condition::list(vec![false, false]);
        assert_eq!(condition_met(&group, &store), Ok(true));
    }

    #[test]
    fn self_reference_is_detected() {
        let registry = Registry::new();
        registry.add("loop", [Condition::reference("loop")]);

        assert_eq!(
            registry.is_active("loop"),
            Err(Error::CircularReference {
                name: "loop".to_string(),
            })
        );
    }

    #[test]
    fn mutual_reference_through_predicate_is_detected() {
        let registry = Registry::new();
        registry.add("a", [Condition::reference("b")]);
        registry.add("b", [Condition::predicate(|ctx| ctx.is_active("a"))]);

        let result = registry.is_active("a");
        assert_eq!(
            result,
            Err(Error::CircularReference {
                name: "a".to_string(),
            })
        );
        asserting!("cycle error names the repeated feature")
            .that(&result.unwrap_err().to_string())
            .is_equal_to("feature a references itself".to_string());
    }

    #[test]
    fn unregistered_feature_may_reference_its_namesake() {
        let registry = Registry::new();
        registry.add("a", [true]);

        let shadow = Feature::new("a", [Condition::reference("a")]);
        assert_eq!(shadow.is_active(&registry), Ok(true));
    }

    #[test]
    fn redefined_feature_may_reference_its_replacement() {
        let registry = Registry::new();
        let old = registry.add("a", [Condition::reference("a")]);
        registry.add("a", [false]);

        assert_eq!(old.is_active(&registry), Ok(false));
        assert_eq!(registry.is_active("a"), Ok(false));
    }

    #[test]
    fn shared_dependency_is_not_a_cycle() {
        let registry = Registry::new();
        registry.add("base", [true]);
        registry.add("left", [Condition::reference("base")]);
        registry.add("right", [Condition::reference("base")]);
        registry.add(
            "top",
            [Condition::reference("left"), Condition::reference("right")],
        );

        assert_eq!(registry.is_active("top"), Ok(true));
    }

    #[test]
    fn recovered_error_does_not_poison_the_stack() {
        let registry = Registry::new();
        registry.add("base", [true]);
        registry.add(
            "tolerant",
            [Condition::predicate(|ctx| {
                Ok(ctx.is_active("missing").unwrap_or(false) || ctx.is_active("base")?)
            })],
        );
        registry.add(
            "top",
            [Condition::reference("tolerant"), Condition::reference("base")],
        );

        assert_eq!(registry.is_active("top"), Ok(true));
    }

    #[test]
    fn error_serializes_with_kind() {
        let json = serde_json::to_value(Error::FeatureNotFound {
            name: "missing".to_string(),
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"kind": "FEATURE_NOT_FOUND", "name": "missing"})
        );
    }
}

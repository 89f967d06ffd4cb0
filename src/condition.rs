use std::fmt;
use std::sync::Arc;

use crate::condition_value::ConditionValue;
use crate::eval::{EvaluationContext, Error};

/// Predicate is implemented by anything that can be invoked to decide a condition at query time.
///
/// The returned value is judged with [ConditionValue::is_met], exactly as a static value would be.
/// Errors returned from [EvaluationContext::is_active] should be propagated, not swallowed, so
/// that a missing feature reaches the caller of the original query.
pub trait Predicate: Send + Sync {
    /// Evaluate the predicate.
    fn call(&self, context: &EvaluationContext<'_>) -> Result<ConditionValue, Error>;
}

struct FnPredicate<F>(F);

impl<F, V> Predicate for FnPredicate<F>
where
    F: Fn(&EvaluationContext<'_>) -> Result<V, Error> + Send + Sync,
    V: Into<ConditionValue>,
{
    fn call(&self, context: &EvaluationContext<'_>) -> Result<ConditionValue, Error> {
        (self.0)(context).map(Into::into)
    }
}

/// A single condition guarding a [crate::Feature].
///
/// After a feature normalizes its conditions, only [Condition::Static], [Condition::Reference]
/// and [Condition::Predicate] remain, and no static condition holds [ConditionValue::Null] or
/// [ConditionValue::Array].
#[derive(Clone)]
pub enum Condition {
    /// A fixed value, met unless it is `false` or null.
    Static(ConditionValue),
    /// The name of another feature; met when that feature is active.
    Reference(String),
    /// Evaluated each time the condition is checked.
    Predicate(Arc<dyn Predicate>),
    /// A nested group of conditions, flattened into the enclosing feature.
    List(Vec<Condition>),
}

impl Condition {
    /// Create a static condition from anything convertible into a [ConditionValue].
    pub fn value(value: impl Into<ConditionValue>) -> Self {
        Condition::Static(value.into())
    }

    /// Create a condition which is met when the feature named `name` is active.
    pub fn reference(name: impl Into<String>) -> Self {
        Condition::Reference(name.into())
    }

    /// Create a predicate condition from a closure.
    ///
    /// The closure receives an [EvaluationContext] through which it may check other features:
    ///
    /// ```
    /// # use feature_toggle_evaluation::Condition;
    /// let either = Condition::predicate(|ctx| Ok(ctx.is_active("beta")? || ctx.is_active("staff")?));
    /// ```
    pub fn predicate<F, V>(f: F) -> Self
    where
        F: Fn(&EvaluationContext<'_>) -> Result<V, Error> + Send + Sync + 'static,
        V: Into<ConditionValue>,
    {
        Condition::Predicate(Arc::new(FnPredicate(f)))
    }

    /// Create a predicate condition from any [Predicate] implementation.
    pub fn callable<P: Predicate + 'static>(predicate: P) -> Self {
        Condition::Predicate(Arc::new(predicate))
    }

    /// Create a nested group of conditions.
    pub fn list<I, C>(conditions: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Condition>,
    {
        Condition::List(conditions.into_iter().map(Into::into).collect())
    }

    /// Flattens nested groups and arrays into `out`, dropping null values.
    pub(crate) fn normalize_into(self, out: &mut Vec<Condition>) {
        match self {
            Condition::Static(ConditionValue::Null) => (),
            Condition::Static(ConditionValue::Array(values)) => {
                for value in values {
                    Condition::Static(value).normalize_into(out);
                }
            }
            Condition::List(conditions) => {
                for condition in conditions {
                    condition.normalize_into(out);
                }
            }
            other => out.push(other),
        }
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Static(value) => f.debug_tuple("Static").field(value).finish(),
            Condition::Reference(name) => f.debug_tuple("Reference").field(name).finish(),
            Condition::Predicate(p) => write!(f, "Predicate({:p})", Arc::as_ptr(p) as *const ()),
            Condition::List(conditions) => f.debug_tuple("List").field(conditions).finish(),
        }
    }
}

/// Predicates compare by identity: two predicate conditions are equal only when they share the
/// same underlying predicate.
impl PartialEq for Condition {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Condition::Static(a), Condition::Static(b)) => a == b,
            (Condition::Reference(a), Condition::Reference(b)) => a == b,
            (Condition::Predicate(a), Condition::Predicate(b)) => {
                Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
            }
            (Condition::List(a), Condition::List(b)) => a == b,
            _ => false,
        }
    }
}

impl From<ConditionValue> for Condition {
    fn from(value: ConditionValue) -> Self {
        Condition::Static(value)
    }
}

impl From<bool> for Condition {
    fn from(b: bool) -> Self {
        Condition::Static(b.into())
    }
}

impl From<i32> for Condition {
    fn from(i: i32) -> Self {
        Condition::Static(i.into())
    }
}

impl From<i64> for Condition {
    fn from(i: i64) -> Self {
        Condition::Static(i.into())
    }
}

impl From<f64> for Condition {
    fn from(f: f64) -> Self {
        Condition::Static(f.into())
    }
}

impl<T> From<Option<T>> for Condition
where
    Condition: From<T>,
{
    fn from(o: Option<T>) -> Self {
        o.map(Condition::from)
            .unwrap_or(Condition::Static(ConditionValue::Null))
    }
}

impl<T> From<Vec<T>> for Condition
where
    Condition: From<T>,
{
    fn from(v: Vec<T>) -> Self {
        Condition::list(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectral::prelude::*;

    fn normalize(condition: Condition) -> Vec<Condition> {
        let mut out = Vec::new();
        condition.normalize_into(&mut out);
        out
    }

    #[test]
    fn null_is_dropped() {
        assert_that!(normalize(ConditionValue::Null.into())).is_empty();
        assert_that!(normalize(None::<bool>.into())).is_empty();
    }

    #[test]
    fn nested_lists_are_flattened_in_order() {
        let nested = Condition::list(vec![
            Condition::from(true),
            Condition::list(vec![
                Condition::reference("a"),
                Condition::list(vec![Condition::from(false), None::<bool>.into()]),
            ]),
            Condition::reference("b"),
        ]);
        assert_that!(normalize(nested)).is_equal_to(vec![
            Condition::from(true),
            Condition::reference("a"),
            Condition::from(false),
            Condition::reference("b"),
        ]);
    }

    #[test]
    fn static_arrays_are_flattened() {
        let array = Condition::value(vec![
            ConditionValue::from(1),
            ConditionValue::Null,
            ConditionValue::from(vec!["x"]),
        ]);
        assert_that!(normalize(array))
            .is_equal_to(vec![Condition::value(1), Condition::value("x")]);
    }

    #[test]
    fn predicates_compare_by_identity() {
        let p = Condition::predicate(|_| Ok(true));
        let q = Condition::predicate(|_| Ok(true));
        assert_eq!(p, p.clone());
        assert_ne!(p, q);
    }

    #[test]
    fn references_are_not_static_strings() {
        assert_ne!(Condition::reference("live"), Condition::value("live"));
    }
}

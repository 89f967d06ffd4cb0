use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::debug;

use crate::condition::Condition;
use crate::eval::{self, Error};
use crate::feature::Feature;
use crate::store::Store;

/// Registry holds every known [Feature] by name.
///
/// A registry is usually populated once at startup and then queried for the lifetime of the
/// process. It can be shared between threads; lookups hand out an [Arc] to the feature and release
/// the lock before anything is evaluated, so predicates are free to query (or even modify) the
/// registry themselves.
#[derive(Default)]
pub struct Registry {
    features: RwLock<HashMap<String, Arc<Feature>>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a feature from `name` and `conditions`, register it, and return it.
    ///
    /// Registering a name a second time replaces the earlier feature.
    pub fn add<N, I, C>(&self, name: N, conditions: I) -> Arc<Feature>
    where
        N: Into<String>,
        I: IntoIterator<Item = C>,
        C: Into<Condition>,
    {
        self.insert(Feature::new(name, conditions))
    }

    /// Register an already built feature under its own name.
    pub fn insert(&self, feature: Feature) -> Arc<Feature> {
        let feature = Arc::new(feature);
        if self
            .write()
            .insert(feature.name().to_owned(), feature.clone())
            .is_some()
        {
            debug!("feature {} was redefined", feature.name());
        }
        feature
    }

    /// Retrieve the feature registered under `name`.
    ///
    /// Fails with [Error::FeatureNotFound] if `name` was never added.
    pub fn get(&self, name: &str) -> Result<Arc<Feature>, Error> {
        eval::lookup(self, name)
    }

    /// Shorthand for looking up the feature named `name` and checking whether it is active.
    pub fn is_active(&self, name: &str) -> Result<bool, Error> {
        self.get(name)?.is_active(self)
    }

    /// Decide whether `condition` is met, resolving references against this registry.
    pub fn condition_met(&self, condition: &Condition) -> Result<bool, Error> {
        eval::condition_met(condition, self)
    }

    /// Returns true if a feature is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// The names of every registered feature, in no particular order.
    pub fn names(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    /// The number of registered features.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns true if no feature is registered.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Remove every feature.
    pub fn clear(&self) {
        self.write().clear();
    }

    // poisoning is ignored: every write is a single map operation
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<Feature>>> {
        self.features.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<Feature>>> {
        self.features.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Store for Registry {
    fn feature(&self, name: &str) -> Option<Arc<Feature>> {
        self.read().get(name).cloned()
    }
}

use std::sync::Arc;

use crate::feature::Feature;

/// Store is an interface for looking up features by name while conditions are evaluated.
///
/// Ordinarily, the only implementation of this interface is [crate::Registry]; evaluation only
/// ever reads from it.
pub trait Store {
    /// Retrieve the feature registered under `name`.
    fn feature(&self, name: &str) -> Option<Arc<Feature>>;
}

mod condition;
mod condition_value;
mod eval;
mod feature;
mod registry;
mod store;
mod test_common;

pub use condition::*;
pub use condition_value::*;
pub use eval::*;
pub use feature::*;
pub use registry::*;
pub use store::*;

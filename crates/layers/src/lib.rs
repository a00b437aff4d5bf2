pub mod feature;
pub mod layer;
pub mod slot;
pub mod store;

pub use feature::*;
pub use layer::*;
pub use slot::*;
pub use store::*;

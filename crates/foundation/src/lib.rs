pub mod buffer;
pub mod geometry;
pub mod ids;
pub mod math;

// Foundation crate: small, well-tested primitives only.
pub use buffer::*;
pub use geometry::*;
pub use ids::*;

pub mod ids;
pub mod math;
pub mod viewpoint;

// Foundation crate: small, well-tested value types only.
pub use ids::*;
pub use math::*;
pub use viewpoint::*;

//! In-memory host for the side view engine.
//!
//! Maps record what they were told to do and never render. Async operations
//! yield once to the executor so concurrent callers interleave like they do
//! against real views.

pub mod collections;
pub mod factory;
pub mod map;
pub mod registry;
pub mod scene;

pub use collections::SimCollections;
pub use factory::SimFactory;
pub use map::{SimMap, SimTerrain};
pub use registry::SimRegistry;
pub use scene::SimHost;

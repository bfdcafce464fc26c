//! Side-view synchronization engine.
//!
//! Keeps secondary map views (oblique directions, alternate 2D/3D maps,
//! panoramas) geometrically consistent with the host's primary map.

pub mod cache;
pub mod config;
pub mod error;
pub mod host;
pub mod kind;
pub mod manager;
pub mod primary;
pub mod quad;
pub mod selection;
pub mod side_view;
pub mod sync;
pub mod tracker;

pub use cache::*;
pub use config::*;
pub use error::*;
pub use host::*;
pub use kind::*;
pub use manager::*;
pub use primary::*;
pub use quad::*;
pub use selection::*;
pub use side_view::*;
pub use sync::*;
pub use tracker::*;

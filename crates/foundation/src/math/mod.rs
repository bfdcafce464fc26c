pub mod heading;
pub mod position;

pub use heading::*;
pub use position::*;

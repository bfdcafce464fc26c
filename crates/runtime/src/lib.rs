pub mod guard;
pub mod metrics;
pub mod signal;
pub mod subject;
pub mod task;

pub use guard::*;
pub use metrics::*;
pub use signal::*;
pub use subject::*;
pub use task::*;

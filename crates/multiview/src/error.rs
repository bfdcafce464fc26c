use std::path::PathBuf;

use foundation::MapName;
use runtime::TeardownError;
use thiserror::Error;

use crate::kind::SideViewKind;

/// Failure reported by a host view operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ViewError {
    #[error("{kind} does not support {operation}")]
    Unsupported {
        kind: &'static str,
        operation: &'static str,
    },
    #[error("view `{view}` failed: {message}")]
    Failed { view: MapName, message: String },
    #[error("terrain lookup failed: {0}")]
    Terrain(String),
    #[error("view has been destroyed")]
    Destroyed,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum MultiViewError {
    /// The slot names a view kind the engine cannot build. Should have been
    /// caught when the configuration was validated.
    #[error("unsupported side view kind `{0}`")]
    UnsupportedKind(String),
    #[error("oblique view in slot {slot} has no direction")]
    MissingDirection { slot: usize },
    #[error("oblique collection `{0}` does not exist")]
    UnknownCollection(String),
    #[error("no oblique collection available")]
    NoCollection,
    #[error("no viewpoint available")]
    NoViewpoint,
    #[error("side view for slot {slot} could not be constructed")]
    Construction { slot: usize },
    #[error("no side view in slot {0}")]
    UnknownSlot(usize),
    #[error("side view {0} is not available")]
    Unavailable(SideViewKind),
    #[error(transparent)]
    View(#[from] ViewError),
    #[error(transparent)]
    Teardown(#[from] TeardownError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

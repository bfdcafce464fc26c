use std::fmt;
use std::sync::Arc;

/// Name of a map registered with the host application.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MapName(Arc<str>);

impl MapName {
    pub fn new(name: impl AsRef<str>) -> Self {
        MapName(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MapName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MapName {
    fn from(name: &str) -> Self {
        MapName::new(name)
    }
}

/// Shared background dataset (e.g. an oblique imagery set).
///
/// The host owns the dataset; this is only the handle views compare and pass around.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CollectionId(Arc<str>);

impl CollectionId {
    pub fn new(name: impl AsRef<str>) -> Self {
        CollectionId(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CollectionId {
    fn from(name: &str) -> Self {
        CollectionId::new(name)
    }
}

/// Opaque render surface a view draws into. The host owns the surface.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RenderTarget(Arc<str>);

impl RenderTarget {
    pub fn new(id: impl AsRef<str>) -> Self {
        RenderTarget(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Target for one cell of a grid laid out inside this target (1-based area).
    pub fn grid_area(&self, area: u8) -> Self {
        RenderTarget::new(format!("{}/grid-area-{area}", self.0))
    }
}

impl fmt::Display for RenderTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle of the layer set shared by the primary map and all side views.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LayerSetId(pub u64);

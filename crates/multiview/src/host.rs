//! Contracts the host application fulfils.
//!
//! The engine never owns the primary map, the map registry or the datasets;
//! it reaches them only through these traits. Everything runs on one thread,
//! so the traits take `&self` and implementations use interior mutability.

use std::rc::Rc;

use async_trait::async_trait;
use foundation::{CollectionId, LayerSetId, MapName, Position, RenderTarget, Viewpoint};
use runtime::{Signal, Spawner};

use crate::error::ViewError;
use crate::kind::MapKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEventKind {
    Click,
    Move,
    DragStart,
    DragEnd,
}

/// Pointer interaction raised by a rendered view.
#[derive(Debug, Clone, PartialEq)]
pub struct PointerEvent {
    pub map: MapName,
    pub kind: PointerEventKind,
    pub position: Option<Position>,
}

/// Construction options for a side view.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ViewOptions {
    pub name: String,
    /// Oblique views may switch to the image of the neighbouring direction
    /// when panned past an edge. Direction-locked views turn this off.
    pub switch_on_edge: bool,
    /// Settings copied from the host's map of the same kind.
    pub settings: serde_json::Map<String, serde_json::Value>,
}

impl ViewOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            switch_on_edge: true,
            settings: serde_json::Map::new(),
        }
    }
}

#[async_trait(?Send)]
pub trait TerrainSource {
    /// Terrain height at `position`, `None` outside the terrain's coverage.
    async fn sample_height(&self, position: &Position) -> Result<Option<f64>, ViewError>;
}

/// Fills in a missing elevation from `terrain`.
///
/// Returns `true` if the position was changed.
pub async fn enrich_elevation(
    terrain: &dyn TerrainSource,
    position: &mut Position,
) -> Result<bool, ViewError> {
    if position.has_elevation() {
        return Ok(false);
    }
    match terrain.sample_height(position).await? {
        Some(height) => {
            position.z = Some(height);
            Ok(true)
        }
        None => Ok(false),
    }
}

#[async_trait(?Send)]
pub trait MapView {
    fn name(&self) -> MapName;
    fn kind(&self) -> MapKind;

    /// Current viewpoint, `None` while the view is not ready.
    async fn viewpoint(&self) -> Option<Viewpoint>;
    async fn goto_viewpoint(&self, viewpoint: Viewpoint) -> Result<(), ViewError>;

    async fn activate(&self) -> Result<(), ViewError>;
    fn deactivate(&self);
    fn destroy(&self);
    fn is_active(&self) -> bool;

    /// Raised on every render tick or camera move.
    fn render_changed(&self) -> Signal<()>;
    fn pointer_events(&self) -> Signal<PointerEvent>;

    fn set_target(&self, target: Option<RenderTarget>);
    fn set_layer_set(&self, layers: Option<LayerSetId>);

    fn collection(&self) -> Option<CollectionId> {
        None
    }

    async fn set_collection(&self, _collection: CollectionId) -> Result<(), ViewError> {
        Err(ViewError::Unsupported {
            kind: self.kind().class_name(),
            operation: "collections",
        })
    }

    fn collection_changed(&self) -> Option<Signal<CollectionId>> {
        None
    }

    fn terrain(&self) -> Option<Rc<dyn TerrainSource>> {
        None
    }

    /// Panorama views are only ready with an image loaded.
    fn has_content(&self) -> bool {
        true
    }

    fn is_initialized(&self) -> bool {
        true
    }
}

#[async_trait(?Send)]
pub trait MapRegistry {
    fn active_map(&self) -> Option<Rc<dyn MapView>>;

    /// All registered maps in registry order.
    fn maps(&self) -> Vec<Rc<dyn MapView>>;

    fn maps_of_kind(&self, kind: MapKind) -> Vec<Rc<dyn MapView>> {
        self.maps().into_iter().filter(|m| m.kind() == kind).collect()
    }

    /// Raised when another map becomes primary.
    fn map_activated(&self) -> Signal<Option<Rc<dyn MapView>>>;
    /// Raised after a map joined the registry.
    fn added(&self) -> Signal<Rc<dyn MapView>>;
    /// Raised after a map left the registry.
    fn removed(&self) -> Signal<Rc<dyn MapView>>;

    /// Layer set rendered by the primary map; side views render the same one.
    fn layer_set(&self) -> LayerSetId;

    async fn set_active_map(&self, name: &MapName) -> Result<(), ViewError>;

    /// Settings of the first registered map of `kind`, used to build side
    /// views that look like the primary ones.
    fn map_options(&self, _kind: MapKind) -> serde_json::Map<String, serde_json::Value> {
        serde_json::Map::new()
    }
}

pub trait CollectionRegistry {
    fn get(&self, name: &str) -> Option<CollectionId>;
    fn all(&self) -> Vec<CollectionId>;

    /// Collection the application was configured to start with.
    fn starting_collection(&self) -> Option<String> {
        None
    }

    fn has_panorama_dataset(&self) -> bool {
        false
    }
}

pub trait ViewFactory {
    fn create(&self, kind: MapKind, options: ViewOptions) -> Result<Rc<dyn MapView>, ViewError>;
}

/// Everything the engine needs from the host, passed by the embedding code.
#[derive(Clone)]
pub struct Host {
    pub maps: Rc<dyn MapRegistry>,
    pub collections: Rc<dyn CollectionRegistry>,
    pub factory: Rc<dyn ViewFactory>,
    pub spawner: Rc<dyn Spawner>,
}

use std::fmt;
use std::rc::Rc;

use foundation::{CollectionId, LayerSetId, RenderTarget, Viewpoint};
use runtime::{Signal, TeardownError};

use crate::error::ViewError;
use crate::host::{MapView, PointerEvent, TerrainSource};
use crate::kind::SideViewKind;
use crate::quad::ObliqueQuadView;

/// A live side view: either a single host map or a directional quad.
#[derive(Clone)]
pub enum SideView {
    Map(Rc<dyn MapView>),
    Quad(Rc<ObliqueQuadView>),
}

impl SideView {
    pub fn kind(&self) -> SideViewKind {
        match self {
            SideView::Map(map) => SideViewKind::Map(map.kind()),
            SideView::Quad(_) => SideViewKind::ObliqueQuad,
        }
    }

    pub fn as_map(&self) -> Option<&Rc<dyn MapView>> {
        match self {
            SideView::Map(map) => Some(map),
            SideView::Quad(_) => None,
        }
    }

    pub fn as_quad(&self) -> Option<&Rc<ObliqueQuadView>> {
        match self {
            SideView::Quad(quad) => Some(quad),
            SideView::Map(_) => None,
        }
    }

    pub async fn viewpoint(&self) -> Option<Viewpoint> {
        match self {
            SideView::Map(map) => map.viewpoint().await,
            SideView::Quad(quad) => quad.viewpoint().await,
        }
    }

    pub async fn goto_viewpoint(&self, viewpoint: Viewpoint) -> Result<(), ViewError> {
        match self {
            SideView::Map(map) => map.goto_viewpoint(viewpoint).await,
            SideView::Quad(quad) => quad.goto_viewpoint(&viewpoint).await,
        }
    }

    pub async fn activate(&self) -> Result<(), ViewError> {
        match self {
            SideView::Map(map) => map.activate().await,
            SideView::Quad(quad) => quad.activate().await,
        }
    }

    pub fn deactivate(&self) {
        match self {
            SideView::Map(map) => map.deactivate(),
            SideView::Quad(quad) => quad.deactivate(),
        }
    }

    pub fn is_active(&self) -> bool {
        match self {
            SideView::Map(map) => map.is_active(),
            SideView::Quad(quad) => quad.is_active(),
        }
    }

    pub fn destroy(&self) -> Result<(), TeardownError> {
        match self {
            SideView::Map(map) => {
                map.destroy();
                Ok(())
            }
            SideView::Quad(quad) => quad.destroy(),
        }
    }

    pub fn collection(&self) -> Option<CollectionId> {
        match self {
            SideView::Map(map) => map.collection(),
            SideView::Quad(quad) => quad.collection(),
        }
    }

    pub async fn set_collection(&self, collection: CollectionId) -> Result<(), ViewError> {
        match self {
            SideView::Map(map) => map.set_collection(collection).await,
            SideView::Quad(quad) => quad.set_collection(collection).await,
        }
    }

    pub fn terrain(&self) -> Option<Rc<dyn TerrainSource>> {
        match self {
            SideView::Map(map) => map.terrain(),
            SideView::Quad(quad) => quad.terrain(),
        }
    }

    pub fn set_target(&self, target: Option<RenderTarget>) {
        match self {
            SideView::Map(map) => map.set_target(target),
            SideView::Quad(quad) => quad.set_target(target),
        }
    }

    pub fn set_layer_set(&self, layers: Option<LayerSetId>) {
        match self {
            SideView::Map(map) => map.set_layer_set(layers),
            SideView::Quad(quad) => quad.set_layer_set(layers),
        }
    }

    pub fn pointer_events(&self) -> Signal<PointerEvent> {
        match self {
            SideView::Map(map) => map.pointer_events(),
            SideView::Quad(quad) => quad.pointer_events(),
        }
    }

    /// Same underlying instance.
    pub fn ptr_eq(&self, other: &SideView) -> bool {
        match (self, other) {
            (SideView::Map(a), SideView::Map(b)) => std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b)),
            (SideView::Quad(a), SideView::Quad(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for SideView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SideView::Map(map) => f
                .debug_tuple("Map")
                .field(&map.name())
                .field(&map.kind())
                .finish(),
            SideView::Quad(quad) => f
                .debug_struct("Quad")
                .field("collection", &quad.collection())
                .field("destroyed", &quad.is_destroyed())
                .finish(),
        }
    }
}

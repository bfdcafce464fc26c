use std::cell::RefCell;
use std::rc::Rc;

use foundation::{CollectionId, LayerSetId, RenderTarget, Viewpoint};
use futures_util::future::join_all;
use runtime::{Signal, Subscription, TeardownError};
use tracing::warn;

use crate::error::ViewError;
use crate::host::{MapView, PointerEvent, TerrainSource, ViewFactory, ViewOptions, enrich_elevation};
use crate::kind::{Direction, MapKind};

/// Four oblique views of one anchor point, locked to north, east, south and west.
///
/// The sub-views never pick their own heading; every viewpoint they receive
/// comes from [`ObliqueQuadView::goto_viewpoint`].
pub struct ObliqueQuadView {
    /// Ordered like [`Direction::ALL`]. Empty once destroyed.
    views: RefCell<Vec<Rc<dyn MapView>>>,
    collection: RefCell<Option<CollectionId>>,
    container: RefCell<Option<RenderTarget>>,
    pointer_events: Signal<PointerEvent>,
    forwards: RefCell<Vec<Subscription>>,
}

impl ObliqueQuadView {
    pub fn new(factory: &dyn ViewFactory, options: &ViewOptions) -> Result<Self, ViewError> {
        let mut views = Vec::with_capacity(Direction::ALL.len());
        for direction in Direction::ALL {
            let sub_options = ViewOptions {
                name: format!("{}-{}", options.name, direction.name()),
                switch_on_edge: false,
                settings: options.settings.clone(),
            };
            match factory.create(MapKind::Oblique, sub_options) {
                Ok(view) => views.push(view),
                Err(err) => {
                    views.iter().for_each(|v| v.destroy());
                    return Err(err);
                }
            }
        }

        let pointer_events = Signal::new();
        let forwards = views
            .iter()
            .map(|view| {
                let router = pointer_events.clone();
                view.pointer_events().subscribe(move |event| {
                    router.emit(event);
                })
            })
            .collect();

        Ok(Self {
            views: RefCell::new(views),
            collection: RefCell::new(None),
            container: RefCell::new(None),
            pointer_events,
            forwards: RefCell::new(forwards),
        })
    }

    pub fn views(&self) -> Vec<Rc<dyn MapView>> {
        self.views.borrow().clone()
    }

    pub fn view(&self, direction: Direction) -> Option<Rc<dyn MapView>> {
        let index = usize::from(direction.index() - 1);
        self.views.borrow().get(index).cloned()
    }

    pub fn is_destroyed(&self) -> bool {
        self.views.borrow().is_empty()
    }

    pub fn collection(&self) -> Option<CollectionId> {
        self.collection.borrow().clone()
    }

    /// Applies `collection` to all four views.
    ///
    /// Waits for every view. On failure the views that accepted the new
    /// collection are put back on their previous one, the first error is
    /// reported and the previously shared collection is kept.
    pub async fn set_collection(&self, collection: CollectionId) -> Result<(), ViewError> {
        let views = self.views();
        let previous: Vec<Option<CollectionId>> = views.iter().map(|v| v.collection()).collect();
        let results = join_all(views.iter().map(|v| v.set_collection(collection.clone()))).await;
        if results.iter().all(Result::is_ok) {
            *self.collection.borrow_mut() = Some(collection);
            return Ok(());
        }

        let rollbacks = views
            .iter()
            .zip(previous)
            .zip(&results)
            .filter_map(|((view, prev), result)| match (prev, result) {
                (Some(prev), Ok(())) => Some(view.set_collection(prev)),
                _ => None,
            });
        for result in join_all(rollbacks).await {
            if let Err(err) = result {
                warn!(%err, "quad view kept the rejected collection");
            }
        }
        results.into_iter().collect::<Result<Vec<()>, _>>().map(|_| ())
    }

    /// Terrain of the north view, used for all four.
    pub fn terrain(&self) -> Option<Rc<dyn TerrainSource>> {
        self.view(Direction::North).and_then(|v| v.terrain())
    }

    /// Points all four views at the anchor of `viewpoint`.
    ///
    /// A missing elevation is looked up once and shared. Without an anchor
    /// this does nothing.
    pub async fn goto_viewpoint(&self, viewpoint: &Viewpoint) -> Result<(), ViewError> {
        let Some(mut anchor) = viewpoint.anchor() else {
            return Ok(());
        };
        if !anchor.has_elevation() {
            if let Some(terrain) = self.terrain() {
                if let Err(err) = enrich_elevation(terrain.as_ref(), &mut anchor).await {
                    warn!(%err, "quad view elevation lookup failed");
                }
            }
        }

        let views = self.views();
        let dispatches = views.iter().zip(Direction::ALL).map(|(view, direction)| {
            view.goto_viewpoint(Viewpoint::looking_at(anchor, viewpoint.distance, direction.heading()))
        });
        let results = join_all(dispatches).await;
        results.into_iter().collect::<Result<Vec<()>, _>>()?;
        Ok(())
    }

    /// Viewpoint of the north view.
    pub async fn viewpoint(&self) -> Option<Viewpoint> {
        let north = self.view(Direction::North)?;
        north.viewpoint().await
    }

    pub async fn activate(&self) -> Result<(), ViewError> {
        let views = self.views();
        let results = join_all(views.iter().map(|v| v.activate())).await;
        results.into_iter().collect::<Result<Vec<()>, _>>()?;
        Ok(())
    }

    pub fn deactivate(&self) {
        self.views().iter().for_each(|v| v.deactivate());
    }

    pub fn is_active(&self) -> bool {
        let views = self.views();
        !views.is_empty() && views.iter().all(|v| v.is_active())
    }

    /// Lays the four views out as a grid inside `target`.
    pub fn set_target(&self, target: Option<RenderTarget>) {
        for (area, view) in (1u8..).zip(self.views()) {
            view.set_target(target.as_ref().map(|t| t.grid_area(area)));
        }
        *self.container.borrow_mut() = target;
    }

    pub fn target(&self) -> Option<RenderTarget> {
        self.container.borrow().clone()
    }

    pub fn set_layer_set(&self, layers: Option<LayerSetId>) {
        self.views().iter().for_each(|v| v.set_layer_set(layers));
    }

    /// Pointer events of all four views.
    pub fn pointer_events(&self) -> Signal<PointerEvent> {
        self.pointer_events.clone()
    }

    /// Destroys the four views and detaches from their events.
    ///
    /// Nothing is dispatched to the sub-views afterwards.
    pub fn destroy(&self) -> Result<(), TeardownError> {
        let forwards = std::mem::take(&mut *self.forwards.borrow_mut());
        let teardown = runtime::teardown(forwards);
        let views = std::mem::take(&mut *self.views.borrow_mut());
        views.iter().for_each(|v| v.destroy());
        *self.container.borrow_mut() = None;
        self.pointer_events.destroy();
        teardown
    }
}

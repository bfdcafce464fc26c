use std::cell::{Cell, RefCell};
use std::rc::Rc;

use async_trait::async_trait;
use foundation::{CollectionId, LayerSetId, MapName, Position, RenderTarget, Viewpoint};
use multiview::{
    MapKind, MapView, PointerEvent, PointerEventKind, TerrainSource, ViewError, ViewOptions,
};
use runtime::Signal;

/// Terrain with one constant height.
#[derive(Debug)]
pub struct SimTerrain {
    height: Cell<Option<f64>>,
    fail: Cell<bool>,
    lookups: Cell<usize>,
}

impl SimTerrain {
    pub fn new(height: Option<f64>) -> Rc<Self> {
        Rc::new(Self {
            height: Cell::new(height),
            fail: Cell::new(false),
            lookups: Cell::new(0),
        })
    }

    pub fn lookups(&self) -> usize {
        self.lookups.get()
    }

    pub fn set_height(&self, height: Option<f64>) {
        self.height.set(height);
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.set(fail);
    }
}

#[async_trait(?Send)]
impl TerrainSource for SimTerrain {
    async fn sample_height(&self, _position: &Position) -> Result<Option<f64>, ViewError> {
        self.lookups.set(self.lookups.get() + 1);
        tokio::task::yield_now().await;
        if self.fail.get() {
            return Err(ViewError::Terrain("terrain tiles unavailable".into()));
        }
        Ok(self.height.get())
    }
}

#[derive(Debug, Default)]
struct SimMapState {
    options: ViewOptions,
    viewpoint: Option<Viewpoint>,
    collection: Option<CollectionId>,
    active: bool,
    destroyed: bool,
    target: Option<RenderTarget>,
    layer_set: Option<LayerSetId>,
    has_content: bool,
    initialized: bool,
    fail_goto: bool,
    fail_collection: bool,
    gotos: Vec<Viewpoint>,
}

/// A map that keeps whatever it is told.
pub struct SimMap {
    name: MapName,
    kind: MapKind,
    terrain: Option<Rc<SimTerrain>>,
    state: RefCell<SimMapState>,
    render: Signal<()>,
    pointer: Signal<PointerEvent>,
    collection_changed: Signal<CollectionId>,
}

impl SimMap {
    pub fn new(name: &str, kind: MapKind) -> Self {
        Self::with_options(kind, ViewOptions::named(name))
    }

    pub fn with_options(kind: MapKind, options: ViewOptions) -> Self {
        Self {
            name: MapName::new(&options.name),
            kind,
            terrain: None,
            state: RefCell::new(SimMapState {
                options,
                has_content: true,
                initialized: true,
                ..SimMapState::default()
            }),
            render: Signal::new(),
            pointer: Signal::new(),
            collection_changed: Signal::new(),
        }
    }

    pub fn with_viewpoint(self, viewpoint: Viewpoint) -> Self {
        self.state.borrow_mut().viewpoint = Some(viewpoint);
        self
    }

    pub fn with_collection(self, collection: &str) -> Self {
        self.state.borrow_mut().collection = Some(CollectionId::new(collection));
        self
    }

    pub fn with_terrain(mut self, terrain: Rc<SimTerrain>) -> Self {
        self.terrain = Some(terrain);
        self
    }

    pub fn with_content(self, has_content: bool) -> Self {
        self.state.borrow_mut().has_content = has_content;
        self
    }

    pub fn uninitialized(self) -> Self {
        self.state.borrow_mut().initialized = false;
        self
    }

    /// Moves the camera like a user would and raises a render tick.
    pub fn move_to(&self, viewpoint: Viewpoint) {
        self.state.borrow_mut().viewpoint = Some(viewpoint);
        self.render.emit(&());
    }

    pub fn render(&self) {
        self.render.emit(&());
    }

    /// Switches collection from the host side, as a user picking another
    /// imagery set would.
    pub fn switch_collection(&self, collection: &str) {
        let collection = CollectionId::new(collection);
        self.state.borrow_mut().collection = Some(collection.clone());
        self.collection_changed.emit(&collection);
    }

    pub fn set_has_content(&self, has_content: bool) {
        self.state.borrow_mut().has_content = has_content;
    }

    pub fn set_fail_goto(&self, fail: bool) {
        self.state.borrow_mut().fail_goto = fail;
    }

    pub fn set_fail_collection(&self, fail: bool) {
        self.state.borrow_mut().fail_collection = fail;
    }

    pub fn click(&self, position: Position) {
        self.pointer.emit(&PointerEvent {
            map: self.name.clone(),
            kind: PointerEventKind::Click,
            position: Some(position),
        });
    }

    pub fn current_viewpoint(&self) -> Option<Viewpoint> {
        self.state.borrow().viewpoint.clone()
    }

    /// Every viewpoint received through [`MapView::goto_viewpoint`].
    pub fn gotos(&self) -> Vec<Viewpoint> {
        self.state.borrow().gotos.clone()
    }

    pub fn last_goto(&self) -> Option<Viewpoint> {
        self.state.borrow().gotos.last().cloned()
    }

    pub fn options(&self) -> ViewOptions {
        self.state.borrow().options.clone()
    }

    pub fn target(&self) -> Option<RenderTarget> {
        self.state.borrow().target.clone()
    }

    pub fn layer_set(&self) -> Option<LayerSetId> {
        self.state.borrow().layer_set
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.borrow().destroyed
    }

    pub fn render_listeners(&self) -> usize {
        self.render.listener_count()
    }

    pub fn collection_listeners(&self) -> usize {
        self.collection_changed.listener_count()
    }

    fn check_alive(&self) -> Result<(), ViewError> {
        if self.state.borrow().destroyed {
            return Err(ViewError::Destroyed);
        }
        Ok(())
    }

    fn failure(&self, message: &str) -> ViewError {
        ViewError::Failed {
            view: self.name.clone(),
            message: message.to_owned(),
        }
    }
}

#[async_trait(?Send)]
impl MapView for SimMap {
    fn name(&self) -> MapName {
        self.name.clone()
    }

    fn kind(&self) -> MapKind {
        self.kind
    }

    async fn viewpoint(&self) -> Option<Viewpoint> {
        self.current_viewpoint()
    }

    async fn goto_viewpoint(&self, viewpoint: Viewpoint) -> Result<(), ViewError> {
        self.check_alive()?;
        tokio::task::yield_now().await;
        if self.state.borrow().fail_goto {
            return Err(self.failure("camera rejected the viewpoint"));
        }
        let mut state = self.state.borrow_mut();
        state.gotos.push(viewpoint.clone());
        state.viewpoint = Some(viewpoint);
        Ok(())
    }

    async fn activate(&self) -> Result<(), ViewError> {
        self.check_alive()?;
        tokio::task::yield_now().await;
        self.state.borrow_mut().active = true;
        Ok(())
    }

    fn deactivate(&self) {
        self.state.borrow_mut().active = false;
    }

    fn destroy(&self) {
        {
            let mut state = self.state.borrow_mut();
            state.active = false;
            state.destroyed = true;
            state.target = None;
        }
        self.render.destroy();
        self.pointer.destroy();
        self.collection_changed.destroy();
    }

    fn is_active(&self) -> bool {
        self.state.borrow().active
    }

    fn render_changed(&self) -> Signal<()> {
        self.render.clone()
    }

    fn pointer_events(&self) -> Signal<PointerEvent> {
        self.pointer.clone()
    }

    fn set_target(&self, target: Option<RenderTarget>) {
        self.state.borrow_mut().target = target;
    }

    fn set_layer_set(&self, layers: Option<LayerSetId>) {
        self.state.borrow_mut().layer_set = layers;
    }

    fn collection(&self) -> Option<CollectionId> {
        self.state.borrow().collection.clone()
    }

    async fn set_collection(&self, collection: CollectionId) -> Result<(), ViewError> {
        if self.kind != MapKind::Oblique {
            return Err(ViewError::Unsupported {
                kind: self.kind.class_name(),
                operation: "collections",
            });
        }
        self.check_alive()?;
        tokio::task::yield_now().await;
        if self.state.borrow().fail_collection {
            return Err(self.failure("collection could not be loaded"));
        }
        self.state.borrow_mut().collection = Some(collection.clone());
        self.collection_changed.emit(&collection);
        Ok(())
    }

    fn collection_changed(&self) -> Option<Signal<CollectionId>> {
        (self.kind == MapKind::Oblique).then(|| self.collection_changed.clone())
    }

    fn terrain(&self) -> Option<Rc<dyn TerrainSource>> {
        self.terrain
            .as_ref()
            .map(|t| Rc::clone(t) as Rc<dyn TerrainSource>)
    }

    fn has_content(&self) -> bool {
        self.state.borrow().has_content
    }

    fn is_initialized(&self) -> bool {
        self.state.borrow().initialized
    }
}

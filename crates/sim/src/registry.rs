use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use async_trait::async_trait;
use foundation::{LayerSetId, MapName};
use multiview::{MapKind, MapRegistry, MapView, ViewError};
use runtime::Signal;
use tracing::debug;

use crate::map::SimMap;

/// Registry of the host's primary-capable maps, in insertion order.
pub struct SimRegistry {
    maps: RefCell<Vec<Rc<SimMap>>>,
    active: RefCell<Option<Rc<SimMap>>>,
    layer_set: LayerSetId,
    options: RefCell<BTreeMap<MapKind, serde_json::Map<String, serde_json::Value>>>,
    activated: Signal<Option<Rc<dyn MapView>>>,
    added: Signal<Rc<dyn MapView>>,
    removed: Signal<Rc<dyn MapView>>,
}

impl SimRegistry {
    pub fn new(layer_set: LayerSetId) -> Rc<Self> {
        Rc::new(Self {
            maps: RefCell::new(Vec::new()),
            active: RefCell::new(None),
            layer_set,
            options: RefCell::new(BTreeMap::new()),
            activated: Signal::new(),
            added: Signal::new(),
            removed: Signal::new(),
        })
    }

    pub fn add(&self, map: Rc<SimMap>) {
        debug!(map = %map.name(), "map added");
        self.maps.borrow_mut().push(Rc::clone(&map));
        self.added.emit(&(map as Rc<dyn MapView>));
    }

    /// Removes `name`, raising `removed` once it is gone.
    pub fn remove(&self, name: &str) -> Option<Rc<SimMap>> {
        let map = {
            let mut maps = self.maps.borrow_mut();
            let index = maps.iter().position(|m| m.name().as_str() == name)?;
            maps.remove(index)
        };
        debug!(map = %map.name(), "map removed");
        self.removed.emit(&(Rc::clone(&map) as Rc<dyn MapView>));
        Some(map)
    }

    pub fn get(&self, name: &str) -> Option<Rc<SimMap>> {
        self.maps
            .borrow()
            .iter()
            .find(|m| m.name().as_str() == name)
            .cloned()
    }

    /// Makes `name` primary right away.
    pub fn make_active(&self, name: &str) -> bool {
        let Some(map) = self.get(name) else {
            return false;
        };
        *self.active.borrow_mut() = Some(Rc::clone(&map));
        self.activated.emit(&Some(map as Rc<dyn MapView>));
        true
    }

    pub fn active(&self) -> Option<Rc<SimMap>> {
        self.active.borrow().clone()
    }

    pub fn set_map_options(&self, kind: MapKind, options: serde_json::Map<String, serde_json::Value>) {
        self.options.borrow_mut().insert(kind, options);
    }
}

#[async_trait(?Send)]
impl MapRegistry for SimRegistry {
    fn active_map(&self) -> Option<Rc<dyn MapView>> {
        self.active().map(|m| m as Rc<dyn MapView>)
    }

    fn maps(&self) -> Vec<Rc<dyn MapView>> {
        self.maps
            .borrow()
            .iter()
            .map(|m| Rc::clone(m) as Rc<dyn MapView>)
            .collect()
    }

    fn map_activated(&self) -> Signal<Option<Rc<dyn MapView>>> {
        self.activated.clone()
    }

    fn added(&self) -> Signal<Rc<dyn MapView>> {
        self.added.clone()
    }

    fn removed(&self) -> Signal<Rc<dyn MapView>> {
        self.removed.clone()
    }

    fn layer_set(&self) -> LayerSetId {
        self.layer_set
    }

    async fn set_active_map(&self, name: &MapName) -> Result<(), ViewError> {
        tokio::task::yield_now().await;
        if self.make_active(name.as_str()) {
            Ok(())
        } else {
            Err(ViewError::Failed {
                view: name.clone(),
                message: "not registered".into(),
            })
        }
    }

    fn map_options(&self, kind: MapKind) -> serde_json::Map<String, serde_json::Value> {
        self.options.borrow().get(&kind).cloned().unwrap_or_default()
    }
}

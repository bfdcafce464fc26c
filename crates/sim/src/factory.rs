use std::cell::RefCell;
use std::rc::Rc;

use multiview::{MapKind, MapView, ViewError, ViewFactory, ViewOptions};
use tracing::trace;

use crate::map::{SimMap, SimTerrain};

/// Builds [`SimMap`]s and keeps every one it built.
pub struct SimFactory {
    terrain: Rc<SimTerrain>,
    created: RefCell<Vec<Rc<SimMap>>>,
    failing: RefCell<Vec<MapKind>>,
}

impl SimFactory {
    /// Oblique maps share `terrain`.
    pub fn new(terrain: Rc<SimTerrain>) -> Self {
        Self {
            terrain,
            created: RefCell::new(Vec::new()),
            failing: RefCell::new(Vec::new()),
        }
    }

    pub fn created(&self) -> Vec<Rc<SimMap>> {
        self.created.borrow().clone()
    }

    pub fn created_of_kind(&self, kind: MapKind) -> Vec<Rc<SimMap>> {
        self.created
            .borrow()
            .iter()
            .filter(|m| m.kind() == kind)
            .cloned()
            .collect()
    }

    pub fn find(&self, name: &str) -> Option<Rc<SimMap>> {
        self.created
            .borrow()
            .iter()
            .find(|m| m.name().as_str() == name)
            .cloned()
    }

    /// Makes every later request for `kind` fail.
    pub fn fail_on(&self, kind: MapKind) {
        self.failing.borrow_mut().push(kind);
    }
}

impl ViewFactory for SimFactory {
    fn create(&self, kind: MapKind, options: ViewOptions) -> Result<Rc<dyn MapView>, ViewError> {
        if self.failing.borrow().contains(&kind) {
            return Err(ViewError::Unsupported {
                kind: kind.class_name(),
                operation: "construction",
            });
        }
        trace!(name = %options.name, %kind, "creating view");
        let mut map = SimMap::with_options(kind, options);
        if kind == MapKind::Oblique {
            map = map.with_terrain(Rc::clone(&self.terrain));
        }
        let map = Rc::new(map);
        self.created.borrow_mut().push(Rc::clone(&map));
        Ok(map as Rc<dyn MapView>)
    }
}

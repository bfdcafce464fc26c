use std::cell::{Cell, RefCell};

use foundation::CollectionId;
use multiview::CollectionRegistry;

#[derive(Debug, Default)]
pub struct SimCollections {
    names: RefCell<Vec<String>>,
    starting: RefCell<Option<String>>,
    panoramas: Cell<bool>,
}

impl SimCollections {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: RefCell::new(names.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn with_starting(self, name: &str) -> Self {
        *self.starting.borrow_mut() = Some(name.to_owned());
        self
    }

    pub fn with_panoramas(self, panoramas: bool) -> Self {
        self.panoramas.set(panoramas);
        self
    }

    pub fn clear(&self) {
        self.names.borrow_mut().clear();
    }
}

impl CollectionRegistry for SimCollections {
    fn get(&self, name: &str) -> Option<CollectionId> {
        self.names
            .borrow()
            .iter()
            .any(|n| n == name)
            .then(|| CollectionId::new(name))
    }

    fn all(&self) -> Vec<CollectionId> {
        self.names.borrow().iter().map(CollectionId::new).collect()
    }

    fn starting_collection(&self) -> Option<String> {
        self.starting.borrow().clone()
    }

    fn has_panorama_dataset(&self) -> bool {
        self.panoramas.get()
    }
}

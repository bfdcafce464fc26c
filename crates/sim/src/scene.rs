use std::rc::Rc;

use foundation::{LayerSetId, Position, Viewpoint};
use multiview::{CollectionRegistry, Host, MapKind, MapRegistry, ViewFactory};
use runtime::TaskQueue;

use crate::collections::SimCollections;
use crate::factory::SimFactory;
use crate::map::{SimMap, SimTerrain};
use crate::registry::SimRegistry;

/// Terrain height of the simulated city.
pub const CITY_HEIGHT: f64 = 42.0;

/// Everything a test needs to drive the engine.
///
/// Work the engine schedules from signal listeners is queued on `tasks` and
/// runs on [`SimHost::settle`].
pub struct SimHost {
    pub registry: Rc<SimRegistry>,
    pub collections: Rc<SimCollections>,
    pub factory: Rc<SimFactory>,
    pub terrain: Rc<SimTerrain>,
    pub tasks: TaskQueue,
}

impl SimHost {
    pub fn new(collections: SimCollections) -> Self {
        let terrain = SimTerrain::new(Some(CITY_HEIGHT));
        Self {
            registry: SimRegistry::new(LayerSetId(1)),
            collections: Rc::new(collections),
            factory: Rc::new(SimFactory::new(Rc::clone(&terrain))),
            terrain,
            tasks: TaskQueue::new(),
        }
    }

    /// A globe primary map over a city with one oblique collection source,
    /// plus a flat map and a panorama map.
    pub fn city() -> Self {
        let collections = SimCollections::new(["city-2024", "city-2019"])
            .with_starting("city-2024")
            .with_panoramas(true);
        let sim = Self::new(collections);
        let ground = Position::flat(10.0, 20.0);
        let globe = SimMap::new("globe", MapKind::Globe).with_viewpoint(Viewpoint {
            camera_position: Some(Position::new(10.0, 19.5, 480.0)),
            pitch: Some(-60.0),
            ..Viewpoint::looking_at(ground, 500.0, 45.0)
        });
        let oblique = SimMap::new("oblique", MapKind::Oblique)
            .with_collection("city-2024")
            .with_terrain(Rc::clone(&sim.terrain))
            .with_viewpoint(Viewpoint::looking_at(ground, 300.0, 0.0));
        let flat = SimMap::new("flat", MapKind::Flat).with_viewpoint(Viewpoint::looking_at(ground, 800.0, 0.0));
        let panorama = SimMap::new("panorama", MapKind::Panorama);

        for map in [globe, oblique, flat, panorama] {
            sim.registry.add(Rc::new(map));
        }
        sim.registry.make_active("globe");
        sim
    }

    pub fn host(&self) -> Host {
        Host {
            maps: Rc::clone(&self.registry) as Rc<dyn MapRegistry>,
            collections: Rc::clone(&self.collections) as Rc<dyn CollectionRegistry>,
            factory: Rc::clone(&self.factory) as Rc<dyn ViewFactory>,
            spawner: Rc::new(self.tasks.clone()),
        }
    }

    /// Moves the primary map and raises its render tick.
    pub fn move_primary(&self, viewpoint: Viewpoint) {
        if let Some(map) = self.registry.active() {
            map.move_to(viewpoint);
        }
    }

    /// Runs queued engine work to completion.
    pub async fn settle(&self) -> usize {
        self.tasks.run_until_idle().await
    }
}

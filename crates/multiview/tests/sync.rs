use std::cell::Cell;
use std::rc::Rc;

use foundation::{Position, Viewpoint};
use multiview::{
    CollectionPolicy, DefaultCollectionTracker, Direction, MapKind, MapRegistry,
    PrimaryViewWatcher, SideViewCache, SideViewKey, SideViewKind, SyncSlot, UpdateOutcome,
    ViewSynchronizer,
};
use pretty_assertions::assert_eq;
use sim::{SimHost, SimMap};

const OBLIQUE: SideViewKind = SideViewKind::Map(MapKind::Oblique);

/// Four oblique slots looking north, east, south and west.
async fn four_directions(sim: &SimHost) -> (ViewSynchronizer, Vec<Rc<SimMap>>) {
    let maps = Rc::clone(&sim.registry) as Rc<dyn MapRegistry>;
    let tracker = DefaultCollectionTracker::start(Rc::clone(&maps), MapKind::Oblique);
    let cache = Rc::new(SideViewCache::new(sim.host(), CollectionPolicy::Tracked(tracker)));
    let mut slots = Vec::new();
    for direction in Direction::ALL {
        let key = SideViewKey::slot(OBLIQUE, u16::from(direction.index() - 1));
        cache.get_or_create(key).await.unwrap();
        slots.push(SyncSlot::new(key, Some(direction)));
    }
    let sync = ViewSynchronizer::new(maps, cache);
    sync.set_slots(slots);
    let views = (0..4)
        .map(|i| sim.factory.find(&format!("multi-view-map-{i}")).unwrap())
        .collect();
    (sync, views)
}

#[tokio::test]
async fn one_elevation_lookup_feeds_four_directions() {
    let sim = SimHost::city();
    let (sync, views) = four_directions(&sim).await;

    let outcome = sync.update().await;
    assert_eq!(outcome, UpdateOutcome::Synced { dispatched: 4, failed: 0 });
    assert_eq!(sim.terrain.lookups(), 1);

    let headings: Vec<f64> = views.iter().map(|v| v.last_goto().unwrap().heading).collect();
    assert_eq!(headings, vec![0.0, 90.0, 180.0, 270.0]);
    for view in &views {
        let vp = view.last_goto().unwrap();
        assert_eq!(vp.ground_position, Some(Position::new(10.0, 20.0, 42.0)));
        assert_eq!(vp.distance, 500.0);
    }
    assert_eq!(sync.active_view(), Some(0));
    assert_eq!(
        sync.last_viewpoint().and_then(|vp| vp.ground_position),
        Some(Position::new(10.0, 20.0, 42.0))
    );
}

#[tokio::test]
async fn active_view_tracks_the_heading_bucket() {
    let sim = SimHost::city();
    let (sync, _) = four_directions(&sim).await;
    let ground = Position::new(10.0, 20.0, 5.0);

    for (heading, expected) in [(135.0, 1), (200.0, 2), (300.0, 3), (359.0, 0)] {
        sim.move_primary(Viewpoint::looking_at(ground, 500.0, heading));
        sync.update().await;
        assert_eq!(sync.active_view(), Some(expected), "heading {heading}");
    }
    assert_eq!(sim.terrain.lookups(), 0);
    assert_eq!(sync.metrics().gauge("sync.active_view"), Some(0));
}

#[tokio::test]
async fn flat_primary_has_no_active_view() {
    let sim = SimHost::city();
    let (sync, _) = four_directions(&sim).await;
    sim.registry.make_active("flat");
    assert_eq!(
        sync.update().await,
        UpdateOutcome::Synced { dispatched: 4, failed: 0 }
    );
    assert_eq!(sync.active_view(), None);
}

#[tokio::test]
async fn panorama_primary_needs_an_image() {
    let sim = SimHost::city();
    let (sync, views) = four_directions(&sim).await;
    let panorama = sim.registry.get("panorama").unwrap();
    panorama.move_to(Viewpoint::from_camera(Position::new(10.0, 20.0, 3.0), 100.0, 0.0));
    panorama.set_has_content(false);
    sim.registry.make_active("panorama");

    assert_eq!(sync.update().await, UpdateOutcome::Idle);
    assert_eq!(sync.active_view(), None);
    assert!(views.iter().all(|v| v.gotos().is_empty()));

    panorama.set_has_content(true);
    sync.update().await;
    assert_eq!(sync.active_view(), Some(1));
}

#[tokio::test]
async fn camera_only_panorama_anchors_every_direction() {
    let sim = SimHost::city();
    let (sync, views) = four_directions(&sim).await;
    let camera = Position::new(10.0, 20.0, 3.0);
    let panorama = sim.registry.get("panorama").unwrap();
    panorama.move_to(Viewpoint::from_camera(camera, 100.0, 0.0));
    panorama.set_has_content(true);
    sim.registry.make_active("panorama");

    assert_eq!(
        sync.update().await,
        UpdateOutcome::Synced { dispatched: 4, failed: 0 }
    );
    for (view, heading) in views.iter().zip([0.0, 90.0, 180.0, 270.0]) {
        let vp = view.last_goto().unwrap();
        assert!(vp.is_valid());
        assert_eq!(vp.ground_position, Some(camera));
        assert_eq!(vp.heading, heading);
    }
    assert_eq!(sync.active_view(), Some(1));
    assert_eq!(sync.metrics().counter("sync.skipped"), 0);
}

#[tokio::test]
async fn missing_primary_viewpoint_is_idle() {
    let sim = SimHost::city();
    let (sync, views) = four_directions(&sim).await;
    sim.registry.make_active("panorama");
    assert_eq!(sync.update().await, UpdateOutcome::Idle);
    assert!(views.iter().all(|v| v.gotos().is_empty()));
    assert_eq!(sync.metrics().counter("sync.idle"), 1);
}

#[tokio::test]
async fn overlapping_update_is_dropped() {
    let sim = SimHost::city();
    let (sync, _) = four_directions(&sim).await;

    let (first, second) = tokio::join!(sync.update(), sync.update());
    assert_eq!(first, UpdateOutcome::Synced { dispatched: 4, failed: 0 });
    assert_eq!(second, UpdateOutcome::Dropped);
    assert!(!sync.is_updating());

    let metrics = sync.metrics();
    assert_eq!(metrics.counter("sync.updates"), 1);
    assert_eq!(metrics.counter("sync.dropped"), 1);
    assert_eq!(metrics.histograms[0].1.count, 1);
    assert!(matches!(sync.update().await, UpdateOutcome::Synced { .. }));
}

#[tokio::test]
async fn suspended_synchronizer_drops_updates() {
    let sim = SimHost::city();
    let (sync, views) = four_directions(&sim).await;
    let token = sync.suspend().unwrap();
    assert_eq!(sync.update().await, UpdateOutcome::Dropped);
    drop(token);
    sync.update().await;
    assert!(views.iter().all(|v| v.gotos().len() == 1));
}

#[tokio::test]
async fn one_failing_view_does_not_stop_the_others() {
    let sim = SimHost::city();
    let (sync, views) = four_directions(&sim).await;
    views[1].set_fail_goto(true);

    assert_eq!(
        sync.update().await,
        UpdateOutcome::Synced { dispatched: 4, failed: 1 }
    );
    assert!(views[1].gotos().is_empty());
    assert!([0, 2, 3].iter().all(|&i| views[i].gotos().len() == 1));
    assert_eq!(sync.metrics().counter("sync.dispatch_failures"), 1);
    assert!(!sync.is_updating());
}

#[tokio::test]
async fn failed_elevation_lookup_still_dispatches() {
    let sim = SimHost::city();
    sim.terrain.set_fail(true);
    let (sync, views) = four_directions(&sim).await;
    sync.update().await;
    let vp = views[0].last_goto().unwrap();
    assert_eq!(vp.ground_position, Some(Position::flat(10.0, 20.0)));
}

#[tokio::test]
async fn panorama_side_view_follows_globe_camera() {
    let sim = SimHost::city();
    let maps = Rc::clone(&sim.registry) as Rc<dyn MapRegistry>;
    let cache = Rc::new(SideViewCache::new(
        sim.host(),
        CollectionPolicy::Registry { configured: None },
    ));
    let key = SideViewKey::of_kind(SideViewKind::Map(MapKind::Panorama));
    cache.get_or_create(key).await.unwrap();
    let sync = ViewSynchronizer::new(maps, cache);
    sync.set_slots(vec![SyncSlot::new(key, None)]);

    sync.update().await;
    let panorama = sim.factory.created_of_kind(MapKind::Panorama).remove(0);
    let vp = panorama.last_goto().unwrap();
    assert_eq!(vp.ground_position, None);
    assert_eq!(vp.camera_position, Some(Position::new(10.0, 19.5, 480.0)));
    assert_eq!(vp.heading, 45.0);
    assert_eq!(sim.terrain.lookups(), 0);
}

#[tokio::test]
async fn unanchored_target_is_skipped() {
    let sim = SimHost::city();
    let maps = Rc::clone(&sim.registry) as Rc<dyn MapRegistry>;
    let cache = Rc::new(SideViewCache::new(
        sim.host(),
        CollectionPolicy::Registry { configured: None },
    ));
    let key = SideViewKey::of_kind(SideViewKind::Map(MapKind::Panorama));
    cache.get_or_create(key).await.unwrap();
    let sync = ViewSynchronizer::new(maps, cache);
    sync.set_slots(vec![SyncSlot::new(key, None)]);
    sim.move_primary(Viewpoint::looking_at(Position::new(10.0, 20.0, 5.0), 500.0, 45.0));

    assert_eq!(
        sync.update().await,
        UpdateOutcome::Synced { dispatched: 0, failed: 0 }
    );
    let panorama = sim.factory.created_of_kind(MapKind::Panorama).remove(0);
    assert!(panorama.gotos().is_empty());
    assert_eq!(sync.metrics().counter("sync.skipped"), 1);
    assert!(!sync.is_updating());
}

#[test]
fn watcher_follows_the_primary_map() {
    let sim = SimHost::city();
    let watcher = PrimaryViewWatcher::attach(sim.registry.as_ref());
    let ticks = Rc::new(Cell::new(0));
    let _counter = {
        let ticks = Rc::clone(&ticks);
        watcher.changed().subscribe(move |_| ticks.set(ticks.get() + 1))
    };
    let globe = sim.registry.get("globe").unwrap();
    let flat = sim.registry.get("flat").unwrap();

    globe.render();
    assert_eq!(ticks.get(), 1);
    sim.registry.make_active("flat");
    assert_eq!(ticks.get(), 2);
    assert_eq!(watcher.primary().map(|m| m.to_string()), Some("flat".to_owned()));
    globe.render();
    flat.render();
    assert_eq!(ticks.get(), 3);
    assert_eq!(globe.render_listeners(), 0);

    watcher.detach().unwrap();
    assert_eq!(flat.render_listeners(), 0);
    flat.render();
    assert_eq!(ticks.get(), 3);
}

use std::rc::Rc;

use foundation::CollectionId;
use multiview::{DefaultCollectionTracker, MapKind, MapRegistry};
use sim::{SimHost, SimMap};

fn tracker(sim: &SimHost) -> DefaultCollectionTracker {
    DefaultCollectionTracker::start(Rc::clone(&sim.registry) as Rc<dyn MapRegistry>, MapKind::Oblique)
}

#[test]
fn adopts_first_map_of_kind_on_start() {
    let sim = SimHost::city();
    let tracker = tracker(&sim);
    assert_eq!(tracker.collection(), Some(CollectionId::new("city-2024")));
    assert_eq!(tracker.source().map(|m| m.to_string()), Some("oblique".to_owned()));
    assert!(!tracker.disabled());
}

#[test]
fn removing_the_only_source_disables_until_readded() {
    let sim = SimHost::city();
    let tracker = tracker(&sim);

    sim.registry.remove("oblique");
    assert!(tracker.disabled());
    assert_eq!(tracker.collection(), None);
    assert_eq!(tracker.source(), None);

    sim.registry
        .add(Rc::new(SimMap::new("oblique-2", MapKind::Oblique).with_collection("city-2019")));
    assert!(!tracker.disabled());
    assert_eq!(tracker.collection(), Some(CollectionId::new("city-2019")));
}

#[test]
fn added_map_wins_and_removal_reverts_to_first_remaining() {
    let sim = SimHost::city();
    let tracker = tracker(&sim);

    sim.registry
        .add(Rc::new(SimMap::new("oblique-b", MapKind::Oblique).with_collection("city-2019")));
    assert_eq!(tracker.collection(), Some(CollectionId::new("city-2019")));

    sim.registry
        .add(Rc::new(SimMap::new("oblique-c", MapKind::Oblique).with_collection("harbour")));
    assert_eq!(tracker.collection(), Some(CollectionId::new("harbour")));

    sim.registry.remove("oblique-c");
    assert_eq!(tracker.source().map(|m| m.to_string()), Some("oblique".to_owned()));
    assert_eq!(tracker.collection(), Some(CollectionId::new("city-2024")));
}

#[test]
fn follows_collection_changes_of_the_source_only() {
    let sim = SimHost::city();
    let tracker = tracker(&sim);
    let first = sim.registry.get("oblique").unwrap();

    first.switch_collection("city-2019");
    assert_eq!(tracker.collection(), Some(CollectionId::new("city-2019")));

    sim.registry
        .add(Rc::new(SimMap::new("oblique-b", MapKind::Oblique).with_collection("harbour")));
    assert_eq!(first.collection_listeners(), 0);
    first.switch_collection("city-2024");
    assert_eq!(tracker.collection(), Some(CollectionId::new("harbour")));
}

#[test]
fn ignores_maps_of_other_kinds() {
    let sim = SimHost::city();
    let tracker = tracker(&sim);
    sim.registry.add(Rc::new(SimMap::new("flat-2", MapKind::Flat)));
    sim.registry.remove("flat");
    assert_eq!(tracker.source().map(|m| m.to_string()), Some("oblique".to_owned()));
}

#[test]
fn disabled_subject_publishes_transitions() {
    let sim = SimHost::city();
    let tracker = tracker(&sim);
    let seen = Rc::new(std::cell::RefCell::new(Vec::new()));
    let subscription = {
        let seen = Rc::clone(&seen);
        tracker
            .disabled_subject()
            .subscribe(move |disabled| seen.borrow_mut().push(*disabled))
    };

    sim.registry.remove("oblique");
    sim.registry
        .add(Rc::new(SimMap::new("oblique-2", MapKind::Oblique).with_collection("city-2024")));
    assert_eq!(*seen.borrow(), vec![true, false]);
    subscription.unsubscribe().unwrap();
}

#[test]
fn destroy_releases_every_listener() {
    let sim = SimHost::city();
    let tracker = tracker(&sim);
    let source = sim.registry.get("oblique").unwrap();
    assert_eq!(source.collection_listeners(), 1);

    tracker.destroy().unwrap();
    assert_eq!(source.collection_listeners(), 0);
    sim.registry.remove("oblique");
    assert_eq!(tracker.collection(), Some(CollectionId::new("city-2024")));
}

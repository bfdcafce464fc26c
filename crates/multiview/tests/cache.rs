use std::cell::RefCell;
use std::rc::Rc;

use foundation::{CollectionId, LayerSetId, Position, RenderTarget};
use multiview::{
    CollectionPolicy, MapKind, MapView, SideViewCache, SideViewKey, SideViewKind,
};
use pretty_assertions::assert_eq;
use sim::{SimCollections, SimHost, SimMap};

const OBLIQUE: SideViewKind = SideViewKind::Map(MapKind::Oblique);
const PANORAMA: SideViewKind = SideViewKind::Map(MapKind::Panorama);
const FLAT: SideViewKind = SideViewKind::Map(MapKind::Flat);

fn registry_cache(sim: &SimHost, configured: Option<&str>) -> SideViewCache {
    SideViewCache::new(
        sim.host(),
        CollectionPolicy::Registry {
            configured: configured.map(str::to_owned),
        },
    )
    .with_target(RenderTarget::new("side-panel"))
}

#[tokio::test]
async fn returns_the_same_instance_until_destroyed() {
    let sim = SimHost::city();
    let cache = registry_cache(&sim, None);
    let first = cache.get_or_create(SideViewKey::of_kind(PANORAMA)).await.unwrap();
    let second = cache.get_or_create(SideViewKey::of_kind(PANORAMA)).await.unwrap();
    assert!(first.ptr_eq(&second));
    assert_eq!(sim.factory.created_of_kind(MapKind::Panorama).len(), 1);

    cache.destroy_all().unwrap();
    let third = cache.get_or_create(SideViewKey::of_kind(PANORAMA)).await.unwrap();
    assert!(!first.ptr_eq(&third));
}

#[tokio::test]
async fn new_views_share_layers_and_target() {
    let sim = SimHost::city();
    let cache = registry_cache(&sim, None);
    cache.get_or_create(SideViewKey::of_kind(FLAT)).await.unwrap();
    let map = sim.factory.created_of_kind(MapKind::Flat).pop().unwrap();
    assert_eq!(map.layer_set(), Some(LayerSetId(1)));
    assert_eq!(map.target(), Some(RenderTarget::new("side-panel")));
    assert_eq!(map.name().to_string(), "OpenlayersMap-side-view");
}

#[tokio::test]
async fn oblique_without_any_collection_is_not_built() {
    let sim = SimHost::new(SimCollections::new(Vec::<String>::new()));
    let cache = registry_cache(&sim, None);
    assert!(cache.get_or_create(SideViewKey::of_kind(OBLIQUE)).await.is_none());
    assert!(cache.get_or_create(SideViewKey::of_kind(SideViewKind::ObliqueQuad)).await.is_none());
    assert!(sim.factory.created().is_empty());
    assert!(cache.is_empty());
}

#[tokio::test]
async fn collection_resolution_order() {
    let sim = SimHost::city();
    let configured = registry_cache(&sim, Some("city-2019"));
    assert_eq!(configured.resolve_collection(), Some(CollectionId::new("city-2019")));
    let derived = registry_cache(&sim, Some("missing"));
    assert_eq!(derived.resolve_collection(), Some(CollectionId::new("city-2024")));

    let sim = SimHost::new(SimCollections::new(["a", "b"]).with_starting("b"));
    sim.registry
        .add(Rc::new(SimMap::new("oblique", MapKind::Oblique).with_collection("a").uninitialized()));
    assert_eq!(registry_cache(&sim, None).resolve_collection(), Some(CollectionId::new("b")));

    let sim = SimHost::new(SimCollections::new(["a", "b"]));
    assert_eq!(registry_cache(&sim, None).resolve_collection(), Some(CollectionId::new("a")));
}

#[tokio::test]
async fn cached_oblique_follows_an_oblique_primary() {
    let sim = SimHost::city();
    sim.registry.make_active("oblique");
    let cache = registry_cache(&sim, None);
    let key = SideViewKey::of_kind(OBLIQUE);
    let view = cache.get_or_create(key).await.unwrap();
    assert_eq!(view.collection(), Some(CollectionId::new("city-2024")));

    sim.registry.get("oblique").unwrap().switch_collection("city-2019");
    let view = cache.get_or_create(key).await.unwrap();
    assert_eq!(view.collection(), Some(CollectionId::new("city-2019")));
}

#[tokio::test]
async fn configured_and_pinned_views_keep_their_collection() {
    let sim = SimHost::city();
    sim.registry.make_active("oblique");
    let configured = registry_cache(&sim, Some("city-2024"));
    let key = SideViewKey::of_kind(OBLIQUE);
    configured.get_or_create(key).await.unwrap();

    let pinned = registry_cache(&sim, None);
    let slot = SideViewKey::slot(OBLIQUE, 0);
    pinned
        .get_or_create_with(slot, Some(CollectionId::new("city-2024")))
        .await
        .unwrap();

    sim.registry.get("oblique").unwrap().switch_collection("city-2019");
    let view = configured.get_or_create(key).await.unwrap();
    assert_eq!(view.collection(), Some(CollectionId::new("city-2024")));
    let view = pinned.get_or_create(slot).await.unwrap();
    assert_eq!(view.collection(), Some(CollectionId::new("city-2024")));
    assert_eq!(pinned.retarget(&CollectionId::new("city-2019")).await, 0);
}

#[tokio::test]
async fn retarget_moves_unpinned_oblique_views() {
    let sim = SimHost::city();
    let cache = registry_cache(&sim, None);
    cache.get_or_create(SideViewKey::of_kind(OBLIQUE)).await.unwrap();
    cache.get_or_create(SideViewKey::of_kind(SideViewKind::ObliqueQuad)).await.unwrap();
    cache.get_or_create(SideViewKey::of_kind(FLAT)).await.unwrap();

    assert_eq!(cache.retarget(&CollectionId::new("city-2019")).await, 2);
    for (key, view) in cache.views() {
        if key.kind.is_oblique() {
            assert_eq!(view.collection(), Some(CollectionId::new("city-2019")));
        }
    }
}

#[tokio::test]
async fn failed_construction_leaves_nothing_behind() {
    let sim = SimHost::city();
    sim.factory.fail_on(MapKind::Oblique);
    let cache = registry_cache(&sim, None);
    assert!(cache.get_or_create(SideViewKey::of_kind(SideViewKind::ObliqueQuad)).await.is_none());
    assert!(cache.is_empty());
}

#[tokio::test]
async fn pointer_events_reach_the_router() {
    let sim = SimHost::city();
    let cache = registry_cache(&sim, None);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let _route = {
        let seen = Rc::clone(&seen);
        cache
            .router()
            .subscribe(move |event| seen.borrow_mut().push(event.map.to_string()))
    };
    cache.get_or_create(SideViewKey::of_kind(SideViewKind::ObliqueQuad)).await.unwrap();
    cache.get_or_create(SideViewKey::of_kind(FLAT)).await.unwrap();

    sim.factory.find("ObliqueMultiView-side-view-south").unwrap().click(Position::flat(0.0, 0.0));
    sim.factory.find("OpenlayersMap-side-view").unwrap().click(Position::flat(0.0, 0.0));
    assert_eq!(
        *seen.borrow(),
        vec!["ObliqueMultiView-side-view-south", "OpenlayersMap-side-view"]
    );
}

#[tokio::test]
async fn retain_and_destroy_all_tear_views_down() {
    let sim = SimHost::city();
    let cache = registry_cache(&sim, None);
    let flat = cache.get_or_create(SideViewKey::of_kind(FLAT)).await.unwrap();
    flat.activate().await.unwrap();
    cache.get_or_create(SideViewKey::of_kind(PANORAMA)).await.unwrap();

    cache.retain(|kind| kind != PANORAMA).unwrap();
    assert_eq!(cache.keys(), vec![SideViewKey::of_kind(FLAT)]);
    assert!(sim.factory.created_of_kind(MapKind::Panorama)[0].is_destroyed());

    cache.destroy_all().unwrap();
    cache.destroy_all().unwrap();
    assert!(cache.is_empty());
    let flat_map = sim.factory.created_of_kind(MapKind::Flat).remove(0);
    assert!(flat_map.is_destroyed());
    assert!(!flat_map.is_active());
}

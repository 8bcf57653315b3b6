//! Store and style working together through the public API.

use std::sync::Arc;

use ringmap_core::{
    Feature, FeatureCollection, FeatureStore, StyleSpec, StyleValue, KRING_PROPERTY,
    PRECISION_PROPERTY,
};

fn feature(kring: i64, precision: i64) -> Feature {
    Feature::polygon(vec![vec![2.0, 48.0], vec![2.5, 48.0], vec![2.0, 48.5], vec![2.0, 48.0]])
        .with_property(KRING_PROPERTY, kring)
        .with_property(PRECISION_PROPERTY, precision)
}

#[tokio::test]
async fn test_subscriber_sees_latest_collection_only() {
    let store: FeatureStore<Arc<str>> = FeatureStore::new();
    let mut subscription = store.subscribe();

    store.set_feature_collection(FeatureCollection::new(vec![feature(0, 5)]));
    store.set_feature_collection(FeatureCollection::new(vec![feature(1, 5), feature(2, 5)]));

    subscription.changed().await.unwrap();
    let (map, collection) = subscription.snapshot();
    assert!(map.is_none());
    assert_eq!(collection.rings(), vec![1, 2]);

    store.register_map(Arc::from("surface")).unwrap();
    subscription.changed().await.unwrap();
    let (map, _) = subscription.snapshot();
    assert_eq!(map.as_deref(), Some("surface"));
}

#[test]
fn test_stored_features_resolve_against_style() {
    let style = StyleSpec::rings().unwrap();
    let fc = style.layer("fc").unwrap().compile().unwrap();
    let low_res = style.layer("fc-low-res").unwrap().compile().unwrap();

    let store: FeatureStore<()> = FeatureStore::new();
    store.set_feature_collection(FeatureCollection::new(vec![feature(0, 5), feature(2, 3)]));
    let collection = store.feature_collection();

    let detailed = &collection.features[0];
    let simplified = &collection.features[1];
    assert!(fc.admits(detailed, 5.0).unwrap());
    assert!(!low_res.admits(detailed, 5.0).unwrap());
    assert!(low_res.admits(simplified, 5.0).unwrap());

    let paint = low_res.paint(simplified, 11.0).unwrap();
    assert_eq!(paint.get("fill-opacity"), Some(&StyleValue::Number(0.0)));
    assert!(paint.get("fill-color").and_then(StyleValue::as_color).is_some());
}

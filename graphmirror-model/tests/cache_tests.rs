mod common;

use pretty_assertions::assert_eq;

use common::{doc, store, store_with};
use graphmirror_model::mock::MockBackend;
use graphmirror_model::StoreConfig;
use graphmirror_types::Value;

// ── Identity preservation ────────────────────────────────────────

#[tokio::test]
async fn entity_returns_the_same_live_instance() {
    let t = store();
    let first = t.store.entity("d:doc1");
    let second = t.store.entity("d:doc1");

    first.set("v-s:title", vec![Value::string("x")]).await.unwrap();
    assert_eq!(second.get("v-s:title"), vec![Value::string("x")]);
}

#[tokio::test]
async fn from_wire_merges_into_cached_unloaded_instance() {
    let t = store();
    let placeholder = t.store.entity("d:doc1");
    assert!(!placeholder.is_loaded());

    let merged = t.store.from_wire(doc("d:doc1", "Hello"));
    assert!(merged.is_loaded());
    assert!(merged.is_sync());
    // Same instance: the placeholder observes the merge.
    assert_eq!(placeholder.get("v-s:title"), vec![Value::string("Hello")]);
}

#[tokio::test]
async fn from_wire_leaves_loaded_instance_untouched() {
    let t = store();
    let entity = t.store.from_wire(doc("d:doc1", "Hello"));
    let again = t.store.from_wire(doc("d:doc1", "Overwritten"));
    assert_eq!(again.get("v-s:title"), vec![Value::string("Hello")]);
    assert_eq!(entity.get("v-s:title"), vec![Value::string("Hello")]);
}

// ── Subscription hooks ───────────────────────────────────────────

#[test]
fn registration_subscribes_the_id() {
    let t = store();
    t.store.entity("d:doc1");
    assert_eq!(t.subscription.active(), vec!["d:doc1".to_string()]);
}

#[test]
fn permanent_entities_are_not_subscribed() {
    let t = store();
    t.store.entity_permanent("v-s:Document");
    assert!(t.subscription.active().is_empty());
}

#[test]
fn cache_remove_unsubscribes() {
    let t = store();
    let entity = t.store.entity("d:doc1");
    t.store.cache().remove(&entity.id());
    assert!(t.subscription.active().is_empty());
    assert!(t.store.cached("d:doc1").is_none());
}

#[test]
fn clear_tears_down_all_subscriptions() {
    let t = store();
    t.store.entity("d:doc1");
    t.store.entity("d:doc2");
    t.store.cache().clear();
    assert!(t.subscription.active().is_empty());
    assert_eq!(t.store.cache().len(), 0);
}

// ── Eviction ─────────────────────────────────────────────────────

#[test]
fn eviction_frees_capacity_but_spares_the_permanent_bucket() {
    let t = store_with(
        MockBackend::new(),
        StoreConfig {
            cache_limit: 10,
            ..StoreConfig::default()
        },
    );
    let ontology = t.store.entity_permanent("v-s:Document");

    for i in 0..9 {
        t.store.entity(&format!("d:doc{i}"));
    }
    assert_eq!(t.store.cache().len(), 10);

    // Reaching the limit evicts the oldest non-permanent bucket.
    t.store.entity("d:late");

    assert!(t.store.cache().len() <= 10);
    assert!(t.store.cached("d:doc0").is_none());
    assert!(t.store.cached("d:late").is_some());
    assert!(t.store.cached(&ontology.id()).is_some());
}

#[test]
fn refreshed_entries_survive_eviction_of_their_old_bucket() {
    let t = store_with(
        MockBackend::new(),
        StoreConfig {
            cache_limit: 4,
            ..StoreConfig::default()
        },
    );
    let kept = t.store.entity("d:kept");
    t.store.entity("d:doc1");
    t.store.entity("d:doc2");

    // Refresh into a much later bucket; the old bucket entry must not
    // linger and drag the entity out when its old bucket is reclaimed.
    t.store.cache().set_in_bucket(&kept, i64::MAX);

    t.store.entity("d:doc3");
    t.store.entity("d:doc4");

    assert!(t.store.cached("d:kept").is_some());
    assert!(t.store.cached("d:doc4").is_some());
    assert!(t.subscription.active().contains(&"d:kept".to_string()));
}

#[test]
fn evicted_ids_are_unsubscribed() {
    let t = store_with(
        MockBackend::new(),
        StoreConfig {
            cache_limit: 4,
            ..StoreConfig::default()
        },
    );
    for i in 0..5 {
        t.store.entity(&format!("d:doc{i}"));
    }
    assert!(!t
        .subscription
        .active()
        .contains(&"d:doc0".to_string()));
}

// ── Re-identification ────────────────────────────────────────────

#[tokio::test]
async fn reassign_id_rekeys_cache_membership() {
    let t = store();
    let entity = t.store.create();
    let old_id = entity.id();
    entity.set("v-s:title", vec![Value::string("x")]).await.unwrap();

    t.store.reassign_id(&entity, "d:chosen");

    assert_eq!(entity.id(), "d:chosen");
    assert!(t.store.cached(&old_id).is_none());
    assert_eq!(
        t.store.cached("d:chosen").unwrap().get("v-s:title"),
        vec![Value::string("x")]
    );
}

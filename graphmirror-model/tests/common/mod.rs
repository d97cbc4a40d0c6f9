#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use graphmirror_model::mock::{MockBackend, RecordingSubscription};
use graphmirror_model::{ChangeListener, Entity, Session, Store, StoreConfig};
use graphmirror_types::{Value, WireEntity, WireValue};

pub struct TestStore {
    pub store: Store,
    pub backend: Arc<MockBackend>,
    pub subscription: Arc<RecordingSubscription>,
}

pub fn store() -> TestStore {
    store_with(MockBackend::new(), StoreConfig::default())
}

pub fn store_with(backend: MockBackend, config: StoreConfig) -> TestStore {
    let backend = Arc::new(backend);
    let subscription = Arc::new(RecordingSubscription::new());
    let store = Store::with_config(
        backend.clone(),
        subscription.clone(),
        Session::new("ticket-1", "d:user1"),
        config,
    );
    TestStore {
        store,
        backend,
        subscription,
    }
}

pub fn uri(id: &str) -> WireValue {
    WireValue::Uri {
        data: id.to_string(),
    }
}

pub fn text(s: &str) -> WireValue {
    WireValue::String {
        data: s.to_string(),
        lang: None,
    }
}

/// A document-shaped wire entity with one title value.
pub fn doc(id: &str, title: &str) -> WireEntity {
    WireEntity::new(id)
        .set("rdf:type", vec![uri("v-s:Document")])
        .set("v-s:title", vec![text(title)])
}

/// Records every notification it receives.
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<(String, Vec<Value>)>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<(String, Vec<Value>)> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChangeListener for RecordingListener {
    async fn property_changed(&self, _entity: &Entity, property: &str, values: &[Value]) {
        self.events
            .lock()
            .unwrap()
            .push((property.to_string(), values.to_vec()));
    }
}

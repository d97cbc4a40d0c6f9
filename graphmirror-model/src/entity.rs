//! The entity: an id plus typed, multi-valued properties, with lifecycle
//! flags and change notification.
//!
//! `Entity` is a cheap-clone handle over shared state, so every holder of
//! an id obtained through the cache observes the same live instance. All
//! mutation goes through the mutator methods here; replacing fields
//! directly would bypass dirty tracking and notification ordering.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use tracing::warn;

use graphmirror_types::{
    dedup, gen_id, parse, serialize, vocab, PropMap, Value, WireEntity, WireValue,
};

use crate::error::StoreResult;
use crate::events::ChangeListener;

/// Lifecycle operation kinds, used as single-flight keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Load,
    Save,
    Reset,
    Delete,
    Remove,
    Recover,
}

pub(crate) type OpFuture = Shared<BoxFuture<'static, StoreResult<()>>>;

pub(crate) struct EntityState {
    pub id: String,
    pub props: PropMap,
    /// Frozen snapshot of the last state known identical to the server's.
    /// Absent while the entity is new.
    pub original: Option<PropMap>,
    /// No server copy exists yet.
    pub is_new: bool,
    /// Matches the last fetched/saved server snapshot.
    pub is_sync: bool,
    /// Has been populated at least once.
    pub is_loaded: bool,
    /// Class-specific initializers have been applied.
    pub is_inited: bool,
}

#[derive(Default)]
struct Listeners {
    any: Vec<Arc<dyn ChangeListener>>,
    by_property: HashMap<String, Vec<Arc<dyn ChangeListener>>>,
}

pub(crate) struct EntityInner {
    state: RwLock<EntityState>,
    pending: Mutex<HashMap<Op, OpFuture>>,
    listeners: RwLock<Listeners>,
}

/// A live entity handle. Clone is cheap (inner `Arc`).
#[derive(Clone)]
pub struct Entity {
    inner: Arc<EntityInner>,
}

impl Entity {
    fn with_state(state: EntityState) -> Self {
        Self {
            inner: Arc::new(EntityInner {
                state: RwLock::new(state),
                pending: Mutex::new(HashMap::new()),
                listeners: RwLock::new(Listeners::default()),
            }),
        }
    }

    /// An entity referenced by id but not yet populated.
    pub(crate) fn unloaded(id: impl Into<String>) -> Self {
        Self::with_state(EntityState {
            id: id.into(),
            props: PropMap::new(),
            original: None,
            is_new: false,
            is_sync: false,
            is_loaded: false,
            is_inited: false,
        })
    }

    /// A freshly generated entity with no server copy.
    pub(crate) fn fresh() -> Self {
        Self::with_state(EntityState {
            id: gen_id(),
            props: PropMap::new(),
            original: None,
            is_new: true,
            is_sync: false,
            is_loaded: false,
            is_inited: false,
        })
    }

    /// An entity constructed directly from wire data: already loaded and
    /// in sync with the snapshot it carries.
    pub(crate) fn from_wire(wire: WireEntity) -> Self {
        Self::with_state(EntityState {
            id: wire.id,
            original: Some(wire.props.clone()),
            props: wire.props,
            is_new: false,
            is_sync: true,
            is_loaded: true,
            is_inited: false,
        })
    }

    // ── Identity & flags ─────────────────────────────────────────

    pub fn id(&self) -> String {
        self.state().id.clone()
    }

    pub fn is_new(&self) -> bool {
        self.state().is_new
    }

    /// Whether the entity matches the last known server snapshot
    /// (no pending local edits).
    pub fn is_sync(&self) -> bool {
        self.state().is_sync
    }

    pub fn is_loaded(&self) -> bool {
        self.state().is_loaded
    }

    pub fn is_inited(&self) -> bool {
        self.state().is_inited
    }

    /// Whether an operation of the given kind is currently in flight.
    pub fn is_pending(&self, op: Op) -> bool {
        self.inner.pending.lock().unwrap().contains_key(&op)
    }

    fn state(&self) -> std::sync::RwLockReadGuard<'_, EntityState> {
        self.inner.state.read().unwrap()
    }

    pub(crate) fn with_state_mut<R>(&self, f: impl FnOnce(&mut EntityState) -> R) -> R {
        f(&mut self.inner.state.write().unwrap())
    }

    // ── Accessors ────────────────────────────────────────────────

    /// Parsed values of a property, in stored order. Undecodable values
    /// are reported and skipped, never surfaced as holes.
    pub fn get(&self, property: &str) -> Vec<Value> {
        let state = self.state();
        let Some(values) = state.props.get(property) else {
            return Vec::new();
        };
        values
            .iter()
            .filter_map(|wire| match parse(wire) {
                Ok(value) => Some(value),
                Err(err) => {
                    warn!(id = %state.id, property, %err, "dropping undecodable value");
                    None
                }
            })
            .collect()
    }

    pub fn get_first(&self, property: &str) -> Option<Value> {
        self.get(property).into_iter().next()
    }

    /// Raw wire values of a property.
    pub fn get_wire(&self, property: &str) -> Vec<WireValue> {
        self.state().props.get(property).cloned().unwrap_or_default()
    }

    /// All property URIs currently carrying values.
    pub fn property_names(&self) -> Vec<String> {
        self.state().props.keys().cloned().collect()
    }

    /// Whether the property carries at least one value.
    pub fn has_property(&self, property: &str) -> bool {
        self.state()
            .props
            .get(property)
            .is_some_and(|v| !v.is_empty())
    }

    /// Whether the property contains this value, compared on the
    /// serialized (kind, data, lang) triple.
    pub fn has_value(&self, property: &str, value: &Value) -> bool {
        let Some(wire) = serialize(value) else {
            return false;
        };
        self.state()
            .props
            .get(property)
            .is_some_and(|values| values.contains(&wire))
    }

    /// Whether any property contains this value.
    pub fn has_value_anywhere(&self, value: &Value) -> bool {
        let Some(wire) = serialize(value) else {
            return false;
        };
        self.state()
            .props
            .values()
            .any(|values| values.contains(&wire))
    }

    /// A snapshot of the entity in wire form.
    pub fn to_wire(&self) -> WireEntity {
        let state = self.state();
        WireEntity {
            id: state.id.clone(),
            props: state.props.clone(),
        }
    }

    // ── Mutators ─────────────────────────────────────────────────
    //
    // Every mutator serializes and de-duplicates its input, decides
    // whether anything actually changed, and only then flips `is_sync`
    // and emits notifications, after the mutation is committed.

    /// Replaces a property's value list. An empty (post-filter) list
    /// removes the property.
    pub async fn set(&self, property: &str, values: Vec<Value>) -> StoreResult<()> {
        if let Some(current) = self.set_inner(property, values) {
            self.notify(property, &current).await;
        }
        Ok(())
    }

    /// `set` without notification. The dirty flag still flips.
    pub fn set_silent(&self, property: &str, values: Vec<Value>) {
        self.set_inner(property, values);
    }

    fn set_inner(&self, property: &str, values: Vec<Value>) -> Option<Vec<Value>> {
        let unique = dedup(values.iter().filter_map(serialize).collect());
        self.with_state_mut(|state| {
            // Ordered comparison: the same values in a new order is a
            // real change and must be committed and notified.
            let previous = state.props.get(property);
            let changed = match previous {
                Some(previous) => previous != &unique,
                None => !unique.is_empty(),
            };
            if !changed {
                return None;
            }
            if unique.is_empty() {
                state.props.remove(property);
            } else {
                state.props.insert(property.to_string(), unique);
            }
            state.is_sync = false;
            Some(())
        })?;
        Some(self.get(property))
    }

    /// Adds values not already present.
    pub async fn add_values(&self, property: &str, values: Vec<Value>) -> StoreResult<()> {
        if let Some(current) = self.add_inner(property, values) {
            self.notify(property, &current).await;
        }
        Ok(())
    }

    pub async fn add_value(&self, property: &str, value: Value) -> StoreResult<()> {
        self.add_values(property, vec![value]).await
    }

    fn add_inner(&self, property: &str, values: Vec<Value>) -> Option<Vec<Value>> {
        let incoming: Vec<WireValue> = values.iter().filter_map(serialize).collect();
        if incoming.is_empty() {
            return None;
        }
        self.with_state_mut(|state| {
            let slot = state.props.entry(property.to_string()).or_default();
            let mut changed = false;
            for value in incoming {
                if !slot.contains(&value) {
                    slot.push(value);
                    changed = true;
                }
            }
            if !changed {
                // Entry may have been freshly created above.
                if slot.is_empty() {
                    state.props.remove(property);
                }
                return None;
            }
            state.is_sync = false;
            Some(())
        })?;
        Some(self.get(property))
    }

    /// Removes values matching on the serialized triple. A property left
    /// empty is removed entirely.
    pub async fn remove_values(&self, property: &str, values: Vec<Value>) -> StoreResult<()> {
        if let Some(current) = self.remove_inner(property, values) {
            self.notify(property, &current).await;
        }
        Ok(())
    }

    pub async fn remove_value(&self, property: &str, value: Value) -> StoreResult<()> {
        self.remove_values(property, vec![value]).await
    }

    fn remove_inner(&self, property: &str, values: Vec<Value>) -> Option<Vec<Value>> {
        let outgoing: Vec<WireValue> = values.iter().filter_map(serialize).collect();
        if outgoing.is_empty() {
            return None;
        }
        self.with_state_mut(|state| {
            let slot = state.props.get_mut(property)?;
            let before = slot.len();
            slot.retain(|value| !outgoing.contains(value));
            if slot.len() == before {
                return None;
            }
            if slot.is_empty() {
                state.props.remove(property);
            }
            state.is_sync = false;
            Some(())
        })?;
        Some(self.get(property))
    }

    /// Removes each value if present, adds it if absent. Presence is
    /// decided once, when the call is made.
    pub async fn toggle_value(&self, property: &str, value: Value) -> StoreResult<()> {
        if self.has_value(property, &value) {
            self.remove_value(property, value).await
        } else {
            self.add_value(property, value).await
        }
    }

    /// Removes the property entirely. Idempotent: clearing an absent
    /// property neither marks the entity dirty nor notifies.
    pub async fn clear_value(&self, property: &str) -> StoreResult<()> {
        let removed = self.with_state_mut(|state| {
            if state.props.remove(property).is_some() {
                state.is_sync = false;
                true
            } else {
                false
            }
        });
        if removed {
            self.notify(property, &[]).await;
        }
        Ok(())
    }

    // ── Notification ─────────────────────────────────────────────

    /// Registers a listener for every property change on this entity.
    pub fn on_change(&self, listener: Arc<dyn ChangeListener>) {
        self.inner.listeners.write().unwrap().any.push(listener);
    }

    /// Registers a listener for changes to one named property.
    pub fn on_property(&self, property: &str, listener: Arc<dyn ChangeListener>) {
        self.inner
            .listeners
            .write()
            .unwrap()
            .by_property
            .entry(property.to_string())
            .or_default()
            .push(listener);
    }

    /// Delivers change notifications, in registration order, awaiting
    /// each handler. Called after the mutation is committed.
    pub(crate) async fn notify(&self, property: &str, values: &[Value]) {
        let targets: Vec<Arc<dyn ChangeListener>> = {
            let listeners = self.inner.listeners.read().unwrap();
            listeners
                .any
                .iter()
                .chain(listeners.by_property.get(property).into_iter().flatten())
                .cloned()
                .collect()
        };
        for listener in targets {
            listener.property_changed(self, property, values).await;
        }
    }

    // ── Single-flight ────────────────────────────────────────────

    /// Runs `fut` under the single-flight guard for `op`: if an operation
    /// of the same kind is already in flight on this entity, the caller
    /// awaits its shared outcome instead of starting a duplicate. The
    /// guard entry is cleared on completion, success or failure.
    pub(crate) async fn single_flight<F>(&self, op: Op, fut: F) -> StoreResult<()>
    where
        F: std::future::Future<Output = StoreResult<()>> + Send + 'static,
    {
        let shared = {
            let mut pending = self.inner.pending.lock().unwrap();
            match pending.get(&op) {
                Some(existing) => existing.clone(),
                None => {
                    let entity = self.clone();
                    let wrapped = async move {
                        let result = fut.await;
                        entity.inner.pending.lock().unwrap().remove(&op);
                        result
                    }
                    .boxed()
                    .shared();
                    pending.insert(op, wrapped.clone());
                    wrapped
                }
            }
        };
        shared.await
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("Entity")
            .field("id", &state.id)
            .field("is_new", &state.is_new)
            .field("is_sync", &state.is_sync)
            .field("is_loaded", &state.is_loaded)
            .field("properties", &state.props.len())
            .finish()
    }
}

impl fmt::Display for Entity {
    /// Label values joined with spaces; else first type and id; else id.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels = self.get(vocab::LABEL);
        if !labels.is_empty() {
            let rendered: Vec<String> = labels.iter().map(render_value).collect();
            return write!(f, "{}", rendered.join(" "));
        }
        match self.get_first(vocab::TYPE) {
            Some(Value::Ref(type_id)) => write!(f, "{}: {}", type_id, self.state().id),
            _ => write!(f, "{}", self.state().id),
        }
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String { text, .. } => text.clone(),
        Value::Ref(id) => id.clone(),
        Value::Integer(n) => n.to_string(),
        Value::Decimal(n) => n.to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Datetime(dt) => graphmirror_types::format_datetime(*dt),
    }
}

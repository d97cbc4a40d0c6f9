//! The store: cache, backend facade, session and configuration in one
//! explicitly-passed handle.

use std::sync::{Arc, RwLock};

use tracing::debug;

use graphmirror_types::WireEntity;

use crate::backend::{Backend, ChangeSubscription, QueryRequest};
use crate::cache::{Cache, PERMANENT};
use crate::entity::Entity;
use crate::error::StoreResult;
use crate::events::SaveHook;
use crate::init::TypeInitRegistry;
use crate::session::{ConnectionStatus, Session, StoreConfig};

pub(crate) struct StoreInner {
    pub backend: Arc<dyn Backend>,
    pub cache: Cache,
    pub session: Session,
    pub config: StoreConfig,
    pub status: RwLock<ConnectionStatus>,
    pub types: TypeInitRegistry,
    pub save_hooks: RwLock<Vec<Arc<dyn SaveHook>>>,
}

/// Handle over the client-resident mirror of the remote graph store.
///
/// Clone is cheap; all clones share the same cache and session.
#[derive(Clone)]
pub struct Store {
    pub(crate) inner: Arc<StoreInner>,
}

impl Store {
    pub fn new(
        backend: Arc<dyn Backend>,
        subscription: Arc<dyn ChangeSubscription>,
        session: Session,
    ) -> Self {
        Self::with_config(backend, subscription, session, StoreConfig::default())
    }

    pub fn with_config(
        backend: Arc<dyn Backend>,
        subscription: Arc<dyn ChangeSubscription>,
        session: Session,
        config: StoreConfig,
    ) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                backend,
                cache: Cache::new(config.cache_limit, subscription),
                session,
                config,
                status: RwLock::new(ConnectionStatus::default()),
                types: TypeInitRegistry::new(),
                save_hooks: RwLock::new(Vec::new()),
            }),
        }
    }

    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub fn cache(&self) -> &Cache {
        &self.inner.cache
    }

    /// Registry of class-specific initializers applied after `load`.
    pub fn types(&self) -> &TypeInitRegistry {
        &self.inner.types
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.inner.status.read().unwrap()
    }

    pub fn set_status(&self, status: ConnectionStatus) {
        *self.inner.status.write().unwrap() = status;
    }

    /// Registers a hook run before every save, in registration order.
    pub fn add_save_hook(&self, hook: Arc<dyn SaveHook>) {
        self.inner.save_hooks.write().unwrap().push(hook);
    }

    // ── Entity construction ──────────────────────────────────────

    /// The live cached entity for `id`, or a new unloaded one registered
    /// under the current-time bucket.
    pub fn entity(&self, id: &str) -> Entity {
        if let Some(existing) = self.inner.cache.get(id) {
            return existing;
        }
        let entity = Entity::unloaded(id);
        self.inner.cache.set(&entity);
        entity
    }

    /// Like [`Store::entity`], but registered in the permanent bucket:
    /// never evicted, never subscribed. For ontology-class objects.
    pub fn entity_permanent(&self, id: &str) -> Entity {
        if let Some(existing) = self.inner.cache.get(id) {
            return existing;
        }
        let entity = Entity::unloaded(id);
        self.inner.cache.set_in_bucket(&entity, PERMANENT);
        entity
    }

    /// A fresh entity with a generated id and no server copy.
    pub fn create(&self) -> Entity {
        let entity = Entity::fresh();
        self.inner.cache.set(&entity);
        entity
    }

    /// Builds an entity from already-resolved wire data.
    ///
    /// If the id is cached but not yet loaded, the snapshot is merged
    /// into the live instance so attached observers keep their handle.
    /// An already-loaded cached instance is returned untouched.
    pub fn from_wire(&self, wire: WireEntity) -> Entity {
        if let Some(existing) = self.inner.cache.get(&wire.id) {
            if !existing.is_loaded() {
                existing.with_state_mut(|state| {
                    state.original = Some(wire.props.clone());
                    state.props = wire.props;
                    state.is_new = false;
                    state.is_sync = true;
                    state.is_loaded = true;
                });
            }
            return existing;
        }
        let entity = Entity::from_wire(wire);
        self.inner.cache.set(&entity);
        entity
    }

    /// Pure cache lookup.
    pub fn cached(&self, id: &str) -> Option<Entity> {
        self.inner.cache.get(id)
    }

    /// Re-ids an entity, re-keying its cache membership. The old id is
    /// deregistered even if the entity was never cached.
    pub fn reassign_id(&self, entity: &Entity, new_id: impl Into<String>) {
        let old_id = entity.id();
        let new_id = new_id.into();
        debug!(%old_id, %new_id, "reassigning entity id");
        self.inner.cache.remove(&old_id);
        entity.with_state_mut(|state| state.id = new_id);
        self.inner.cache.set(entity);
    }

    // ── Query driver ─────────────────────────────────────────────

    /// Runs a compiled query to exhaustion, paging with the configured
    /// page size, and returns all matching ids.
    pub async fn query_all(
        &self,
        query: &str,
        sort: Option<&str>,
    ) -> StoreResult<Vec<String>> {
        let page = self.inner.config.query_page;
        let mut from = 0u64;
        let mut ids = Vec::new();
        loop {
            let request = QueryRequest {
                query: query.to_string(),
                sort: sort.map(str::to_string),
                from,
                top: page,
                limit: 0,
            };
            let result = self
                .inner
                .backend
                .query(&self.inner.session, &request)
                .await?;
            let fetched = result.result.len() as u64;
            ids.extend(result.result);
            from += fetched;
            if fetched < page || (result.estimated > 0 && from >= result.estimated) {
                break;
            }
        }
        Ok(ids)
    }
}

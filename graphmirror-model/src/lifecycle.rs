//! Entity lifecycle operations.
//!
//! Every operation here is single-flight per entity and operation kind:
//! concurrent callers of the same operation on the same entity await one
//! shared outcome instead of duplicating in-flight work.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, warn};

use graphmirror_types::{vocab, PropMap, Value, WireEntity, WireValue};

use crate::backend::{BackendError, BackendErrorKind};
use crate::diff::diff;
use crate::entity::{Entity, Op};
use crate::error::StoreResult;
use crate::events::SaveHook;
use crate::session::ConnectionStatus;
use crate::store::Store;

impl Store {
    // ── load ─────────────────────────────────────────────────────

    /// Loads the entity from the remote store.
    ///
    /// Already-loaded entities resolve immediately while fully online or
    /// fully offline; in limited connectivity the cached copy may have
    /// silently diverged, so the call defers to [`Store::reset`]. Fetch
    /// failures are absorbed into a sentinel record keyed by error class
    /// so presentation code never sees a completely empty entity.
    pub async fn load(&self, entity: &Entity) -> StoreResult<()> {
        let store = self.clone();
        let target = entity.clone();
        entity
            .single_flight(Op::Load, async move { store.do_load(target).await })
            .await
    }

    async fn do_load(&self, entity: Entity) -> StoreResult<()> {
        if entity.is_new() {
            return Ok(());
        }
        if entity.is_loaded() {
            match self.status() {
                ConnectionStatus::Online | ConnectionStatus::Offline => {
                    if !entity.is_inited() {
                        self.init(&entity).await;
                    }
                    return Ok(());
                }
                ConnectionStatus::Limited => return self.do_reset(entity, false).await,
            }
        }
        let id = entity.id();
        match self.fetch(&entity).await {
            Ok(()) => {}
            Err(err) => {
                warn!(%id, %err, "load failed, installing sentinel");
                install_sentinel(&entity, &err);
            }
        }
        self.init(&entity).await;
        Ok(())
    }

    /// Fetches the entity's wire snapshot and replaces local state with
    /// it. No class initialization, no sentinel handling.
    async fn fetch(&self, entity: &Entity) -> Result<(), BackendError> {
        let id = entity.id();
        let wire = self.inner.backend.get(&self.inner.session, &id).await?;
        apply_snapshot(entity, wire.props);
        debug!(%id, "fetched");
        Ok(())
    }

    /// Applies class-specific initializers for each declared type.
    ///
    /// Type entities are loaded shallowly (fetch only) to avoid
    /// recursing into their own initialization.
    async fn init(&self, entity: &Entity) {
        let type_ids: Vec<String> = entity
            .get(vocab::TYPE)
            .into_iter()
            .filter_map(|value| value.as_id().map(str::to_string))
            .collect();
        for type_id in type_ids {
            let type_entity = self.entity_permanent(&type_id);
            if !type_entity.is_loaded() {
                if let Err(err) = self.fetch(&type_entity).await {
                    warn!(%type_id, %err, "type entity unavailable");
                }
            }
            self.inner.types.apply(&type_id, entity);
        }
        entity.with_state_mut(|state| state.is_inited = true);
    }

    // ── save ─────────────────────────────────────────────────────

    /// Persists the entity's local edits using the configured save mode.
    pub async fn save(&self, entity: &Entity) -> StoreResult<()> {
        self.save_with(entity, self.inner.config.atomic_save).await
    }

    /// Persists the entity. `atomic` sends the whole property set as one
    /// upsert; otherwise up to three partial patches carry the diff
    /// buckets. New entities are always sent whole.
    ///
    /// Save failures are returned to the caller. A mutation committed
    /// while a save is in flight is not retroactively included; the
    /// entity stays dirty and a second save is required.
    pub async fn save_with(&self, entity: &Entity, atomic: bool) -> StoreResult<()> {
        let store = self.clone();
        let target = entity.clone();
        entity
            .single_flight(Op::Save, async move {
                store.do_save(target, atomic).await
            })
            .await
    }

    async fn do_save(&self, entity: Entity, atomic: bool) -> StoreResult<()> {
        if entity.is_sync() {
            return Ok(());
        }
        let hooks: Vec<Arc<dyn SaveHook>> =
            self.inner.save_hooks.read().unwrap().clone();
        for hook in hooks {
            hook.before_save(&entity, &self.inner.session).await?;
        }

        // Diff against the snapshot taken here; edits landing after this
        // point stay dirty for the next save.
        let (id, snapshot, original, is_new) = entity.with_state_mut(|state| {
            state.props.retain(|_, values| !values.is_empty());
            (
                state.id.clone(),
                state.props.clone(),
                state.original.clone(),
                state.is_new,
            )
        });

        let backend = &self.inner.backend;
        let session = &self.inner.session;
        if is_new || atomic {
            let wire = WireEntity {
                id: id.clone(),
                props: snapshot.clone(),
            };
            backend.put(session, &wire).await?;
        } else {
            let delta = diff(&snapshot, original.as_ref().unwrap_or(&PropMap::new()));
            if delta.is_empty() {
                finish_save(&entity, snapshot);
                return Ok(());
            }
            let bucket = |props: &PropMap| {
                (!props.is_empty()).then(|| WireEntity {
                    id: id.clone(),
                    props: props.clone(),
                })
            };
            let added = bucket(&delta.added);
            let differ = bucket(&delta.differ);
            let missing = bucket(&delta.missing);
            tokio::try_join!(
                async {
                    match &added {
                        Some(delta) => backend.patch_add(session, delta).await,
                        None => Ok(()),
                    }
                },
                async {
                    match &differ {
                        Some(delta) => backend.patch_set(session, delta).await,
                        None => Ok(()),
                    }
                },
                async {
                    match &missing {
                        Some(delta) => backend.patch_remove(session, delta).await,
                        None => Ok(()),
                    }
                },
            )?;
        }

        debug!(%id, atomic, "saved");
        finish_save(&entity, snapshot);
        Ok(())
    }

    // ── reset ────────────────────────────────────────────────────

    /// Re-fetches the server snapshot and merges it into local state.
    ///
    /// If `forced`, or the entity is clean or was never fully loaded,
    /// the server wins outright. With local edits present, only
    /// server-side additions are merged: whole properties missing
    /// locally, and reference values absent from a locally-edited
    /// property. Server literal edits never overwrite a concurrent
    /// local edit.
    pub async fn reset(&self, entity: &Entity, forced: bool) -> StoreResult<()> {
        let store = self.clone();
        let target = entity.clone();
        entity
            .single_flight(Op::Reset, async move {
                store.do_reset(target, forced).await
            })
            .await
    }

    async fn do_reset(&self, entity: Entity, forced: bool) -> StoreResult<()> {
        if entity.is_new() {
            return Ok(());
        }
        let id = entity.id();
        let wire = self.inner.backend.get(&self.inner.session, &id).await?;
        let server = wire.props;

        let (was_sync, was_loaded) =
            entity.with_state_mut(|state| (state.is_sync, state.is_loaded));

        let changed: Vec<String> = if forced || was_sync || !was_loaded {
            let local = entity.to_wire().props;
            let changed = diff(&server, &local).property_names();
            apply_snapshot(&entity, server);
            changed
        } else {
            entity.with_state_mut(|state| {
                let delta = diff(&server, &state.props);
                let mut changed = Vec::new();
                for (property, values) in &delta.added {
                    state.props.insert(property.clone(), values.clone());
                    changed.push(property.clone());
                }
                for (property, server_values) in &delta.differ {
                    let slot = state.props.entry(property.clone()).or_default();
                    let mut merged = false;
                    for value in server_values {
                        if value.is_ref() && !slot.contains(value) {
                            slot.push(value.clone());
                            merged = true;
                        }
                    }
                    if merged {
                        changed.push(property.clone());
                    }
                }
                state.is_sync = state.props == server;
                state.is_loaded = true;
                state.original = Some(server);
                changed
            })
        };

        debug!(%id, forced, properties = changed.len(), "reset");
        for property in changed {
            let values = entity.get(&property);
            entity.notify(&property, &values).await;
        }
        Ok(())
    }

    // ── delete / recover / remove ────────────────────────────────

    /// Soft-deletes: flags the entity deleted, tags the deletable type
    /// marker and persists through the normal save path. A
    /// never-persisted entity has no server record to flag; the call is
    /// a no-op.
    pub async fn delete(&self, entity: &Entity) -> StoreResult<()> {
        let store = self.clone();
        let target = entity.clone();
        entity
            .single_flight(Op::Delete, async move {
                if target.is_new() {
                    return Ok(());
                }
                target.set(vocab::DELETED, vec![Value::Boolean(true)]).await?;
                target
                    .add_value(vocab::TYPE, Value::reference(vocab::DELETABLE))
                    .await?;
                store.save(&target).await
            })
            .await
    }

    /// Reverses a soft-delete and persists.
    pub async fn recover(&self, entity: &Entity) -> StoreResult<()> {
        let store = self.clone();
        let target = entity.clone();
        entity
            .single_flight(Op::Recover, async move {
                target.clear_value(vocab::DELETED).await?;
                target
                    .remove_value(vocab::TYPE, Value::reference(vocab::DELETABLE))
                    .await?;
                store.save(&target).await
            })
            .await
    }

    /// Hard removal: deregisters from the cache immediately, then asks
    /// the remote store to drop the record if one was ever persisted.
    /// Never-persisted entities just vanish locally.
    pub async fn remove(&self, entity: &Entity) -> StoreResult<()> {
        let store = self.clone();
        let target = entity.clone();
        entity
            .single_flight(Op::Remove, async move {
                let id = target.id();
                store.inner.cache.remove(&id);
                if !target.is_new() {
                    store.inner.backend.remove(&store.inner.session, &id).await?;
                }
                debug!(%id, "removed");
                Ok(())
            })
            .await
    }

    // ── derived operations ───────────────────────────────────────

    /// Deep-copies the entity under a fresh id: new, dirty, with any
    /// update counter stripped, registered in the cache and re-inited.
    pub async fn clone_entity(&self, entity: &Entity) -> StoreResult<Entity> {
        let mut props = entity.to_wire().props;
        props.remove(vocab::UPDATE_COUNTER);
        let clone = Entity::fresh();
        clone.with_state_mut(|state| {
            state.props = props;
            state.is_loaded = true;
        });
        self.inner.cache.set(&clone);
        self.init(&clone).await;
        Ok(clone)
    }

    /// Class-membership test walking the (possibly multi-parent) type
    /// hierarchy, short-circuiting on the first match.
    pub async fn is_a(&self, entity: &Entity, type_id: &str) -> StoreResult<bool> {
        let declared: Vec<String> = entity
            .get(vocab::TYPE)
            .into_iter()
            .filter_map(|value| value.as_id().map(str::to_string))
            .collect();
        let mut visited = HashSet::new();
        for current in declared {
            if self.type_extends(current, type_id, &mut visited).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn type_extends<'a>(
        &'a self,
        current: String,
        target: &'a str,
        visited: &'a mut HashSet<String>,
    ) -> BoxFuture<'a, StoreResult<bool>> {
        async move {
            if current == target {
                return Ok(true);
            }
            if !visited.insert(current.clone()) {
                return Ok(false);
            }
            let type_entity = self.entity_permanent(&current);
            if !type_entity.is_loaded() {
                if let Err(err) = self.fetch(&type_entity).await {
                    warn!(type_id = %current, %err, "type entity unavailable");
                    return Ok(false);
                }
            }
            let parents: Vec<String> = type_entity
                .get(vocab::SUB_CLASS_OF)
                .into_iter()
                .filter_map(|value| value.as_id().map(str::to_string))
                .collect();
            for parent in parents {
                if self.type_extends(parent, target, visited).await? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        .boxed()
    }

    /// Bulk-loads the entities referenced by `entity`, breadth-first up
    /// to `depth` hops, one batched fetch per hop. Returns the entities
    /// materialized along the way.
    pub async fn prefetch(&self, entity: &Entity, depth: usize) -> StoreResult<Vec<Entity>> {
        self.prefetch_along(entity, depth, &[]).await
    }

    /// Like [`Store::prefetch`], but only follows references held by the
    /// named properties. An empty list follows every property.
    pub async fn prefetch_along(
        &self,
        entity: &Entity,
        depth: usize,
        properties: &[&str],
    ) -> StoreResult<Vec<Entity>> {
        self.load(entity).await?;
        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(entity.id());
        let mut frontier = referenced_ids(&entity.to_wire().props, properties);
        let mut materialized = Vec::new();

        for _ in 0..depth {
            frontier.retain(|id| seen.insert(id.clone()));
            frontier.retain(|id| {
                self.cached(id).map_or(true, |cached| !cached.is_loaded())
            });
            if frontier.is_empty() {
                break;
            }
            let fetched = self
                .inner
                .backend
                .get_many(&self.inner.session, &frontier)
                .await?;
            let mut next = Vec::new();
            for wire in fetched.into_iter().flatten() {
                next.extend(referenced_ids(&wire.props, properties));
                materialized.push(self.from_wire(wire));
            }
            frontier = next;
        }
        Ok(materialized)
    }

    /// Follows a property chain across references, loading each hop, and
    /// returns the values at the final property.
    pub async fn get_chain(&self, entity: &Entity, path: &[&str]) -> StoreResult<Vec<Value>> {
        let Some((last, steps)) = path.split_last() else {
            return Ok(Vec::new());
        };
        self.load(entity).await?;
        let mut current = vec![entity.clone()];
        for step in steps {
            let mut next = Vec::new();
            for hop in current {
                for value in hop.get(step) {
                    if let Value::Ref(id) = value {
                        let referenced = self.entity(&id);
                        self.load(&referenced).await?;
                        next.push(referenced);
                    }
                }
            }
            current = next;
        }
        let mut values = Vec::new();
        for hop in current {
            values.extend(hop.get(last));
        }
        Ok(values)
    }

    // ── rights & membership ──────────────────────────────────────

    /// The session user's effective rights record for the entity, as a
    /// detached (uncached) entity.
    ///
    /// Never-persisted entities have no server record to check rights
    /// against; their author holds every right locally. A failed lookup
    /// degrades to an empty record, so every right reads as denied.
    pub async fn rights(&self, entity: &Entity) -> StoreResult<Entity> {
        let id = entity.id();
        if entity.is_new() {
            let mut wire = WireEntity::new(format!("{id}-rights"));
            for right in [
                vocab::CAN_CREATE,
                vocab::CAN_READ,
                vocab::CAN_UPDATE,
                vocab::CAN_DELETE,
            ] {
                wire.props
                    .insert(right.to_string(), vec![WireValue::Boolean { data: true }]);
            }
            return Ok(Entity::from_wire(wire));
        }
        match self.inner.backend.get_rights(&self.inner.session, &id).await {
            Ok(wire) => Ok(Entity::from_wire(wire)),
            Err(err) => {
                warn!(%id, %err, "rights unavailable");
                Ok(Entity::from_wire(WireEntity::new(format!("{id}-rights"))))
            }
        }
    }

    /// The entity's group-membership record, detached from the cache.
    /// A failed lookup degrades to an empty record.
    pub async fn membership(&self, entity: &Entity) -> StoreResult<Entity> {
        let id = entity.id();
        match self
            .inner
            .backend
            .get_membership(&self.inner.session, &id)
            .await
        {
            Ok(wire) => Ok(Entity::from_wire(wire)),
            Err(err) => {
                warn!(%id, %err, "membership unavailable");
                Ok(Entity::from_wire(WireEntity::new(format!("{id}-membership"))))
            }
        }
    }

    /// Whether the membership record lists `group_id`.
    pub async fn is_member_of(&self, entity: &Entity, group_id: &str) -> StoreResult<bool> {
        let membership = self.membership(entity).await?;
        Ok(membership.has_value(vocab::MEMBER_OF, &Value::reference(group_id)))
    }

    pub async fn can_create(&self, entity: &Entity) -> StoreResult<bool> {
        self.can(entity, vocab::CAN_CREATE).await
    }

    pub async fn can_read(&self, entity: &Entity) -> StoreResult<bool> {
        self.can(entity, vocab::CAN_READ).await
    }

    pub async fn can_update(&self, entity: &Entity) -> StoreResult<bool> {
        self.can(entity, vocab::CAN_UPDATE).await
    }

    pub async fn can_delete(&self, entity: &Entity) -> StoreResult<bool> {
        self.can(entity, vocab::CAN_DELETE).await
    }

    async fn can(&self, entity: &Entity, right: &str) -> StoreResult<bool> {
        let rights = self.rights(entity).await?;
        Ok(rights
            .get_first(right)
            .and_then(|value| value.as_bool())
            .unwrap_or(false))
    }
}

fn apply_snapshot(entity: &Entity, props: PropMap) {
    entity.with_state_mut(|state| {
        state.original = Some(props.clone());
        state.props = props;
        state.is_new = false;
        state.is_sync = true;
        state.is_loaded = true;
    });
}

/// Marks a successful save: the persisted snapshot becomes the new
/// original, and the entity is clean only if nothing changed since the
/// snapshot was taken.
fn finish_save(entity: &Entity, snapshot: PropMap) {
    entity.with_state_mut(|state| {
        state.is_new = false;
        state.is_loaded = true;
        state.is_sync = state.props == snapshot;
        state.original = Some(snapshot);
    });
}

fn install_sentinel(entity: &Entity, err: &BackendError) {
    let (type_id, label) = match err.kind {
        BackendErrorKind::NotFound => {
            (vocab::sentinel::NOT_FOUND_TYPE, vocab::sentinel::NOT_FOUND_LABEL)
        }
        BackendErrorKind::Forbidden => {
            (vocab::sentinel::FORBIDDEN_TYPE, vocab::sentinel::FORBIDDEN_LABEL)
        }
        BackendErrorKind::Failure => {
            (vocab::sentinel::FETCH_ERROR_TYPE, vocab::sentinel::FETCH_ERROR_LABEL)
        }
    };
    let mut props = PropMap::new();
    props.insert(
        vocab::TYPE.to_string(),
        vec![WireValue::Uri {
            data: type_id.to_string(),
        }],
    );
    props.insert(
        vocab::LABEL.to_string(),
        vec![WireValue::String {
            data: label.to_string(),
            lang: None,
        }],
    );
    apply_snapshot(entity, props);
}

fn referenced_ids(props: &PropMap, allowed: &[&str]) -> Vec<String> {
    let mut ids = Vec::new();
    for (property, values) in props {
        if !allowed.is_empty() && !allowed.contains(&property.as_str()) {
            continue;
        }
        for value in values {
            if let Some(id) = value.ref_id() {
                if !ids.iter().any(|existing| existing == id) {
                    ids.push(id.to_string());
                }
            }
        }
    }
    ids
}

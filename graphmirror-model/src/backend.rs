//! Remote-store facades.
//!
//! The network transport is out of scope for this layer: the store is
//! consumed through the [`Backend`] trait with fixed request/response
//! shapes, and remote-update subscriptions through [`ChangeSubscription`].
//! The [`mock`] module provides in-memory implementations for tests.

use async_trait::async_trait;
use thiserror::Error;

use graphmirror_types::WireEntity;

use crate::session::Session;

/// Error classes reported by the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    NotFound,
    Forbidden,
    /// Anything else: transport failure, server error, malformed reply.
    Failure,
}

/// An error from the remote-store facade.
#[derive(Debug, Clone, Error)]
#[error("backend error ({kind:?}): {message}")]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub message: String,
}

impl BackendError {
    pub fn not_found(id: &str) -> Self {
        Self {
            kind: BackendErrorKind::NotFound,
            message: format!("not found: {id}"),
        }
    }

    pub fn forbidden(id: &str) -> Self {
        Self {
            kind: BackendErrorKind::Forbidden,
            message: format!("forbidden: {id}"),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            kind: BackendErrorKind::Failure,
            message: message.into(),
        }
    }
}

/// A query request against the remote store's filter engine.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    /// Compiled filter expression (see the query crate).
    pub query: String,
    pub sort: Option<String>,
    /// Cursor to resume from.
    pub from: u64,
    /// Page size for this request.
    pub top: u64,
    /// Hard cap on total results.
    pub limit: u64,
}

/// One page of query results.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    /// Matching entity ids.
    pub result: Vec<String>,
    /// Cursor position after this page.
    pub cursor: u64,
    /// Estimated total match count.
    pub estimated: u64,
}

/// The remote-store RPC facade.
///
/// `put` is a full upsert; the three `patch_*` calls are the partial
/// persistence primitives used by non-atomic saves, each carrying only
/// one diff bucket.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn get(&self, session: &Session, id: &str) -> Result<WireEntity, BackendError>;

    /// Bulk fetch; absent ids yield `None` rather than failing the batch.
    async fn get_many(
        &self,
        session: &Session,
        ids: &[String],
    ) -> Result<Vec<Option<WireEntity>>, BackendError>;

    async fn put(&self, session: &Session, entity: &WireEntity) -> Result<(), BackendError>;

    async fn patch_add(&self, session: &Session, delta: &WireEntity) -> Result<(), BackendError>;

    async fn patch_set(&self, session: &Session, delta: &WireEntity) -> Result<(), BackendError>;

    async fn patch_remove(&self, session: &Session, delta: &WireEntity)
        -> Result<(), BackendError>;

    async fn remove(&self, session: &Session, id: &str) -> Result<(), BackendError>;

    async fn query(
        &self,
        session: &Session,
        request: &QueryRequest,
    ) -> Result<QueryResult, BackendError>;

    /// Effective rights of the session user on an entity, as a rights
    /// record (see `vocab::CAN_*`).
    async fn get_rights(&self, session: &Session, id: &str) -> Result<WireEntity, BackendError>;

    /// Group memberships of an entity, as a membership record
    /// (see `vocab::MEMBER_OF`).
    async fn get_membership(&self, session: &Session, id: &str)
        -> Result<WireEntity, BackendError>;
}

/// Fire-and-forget hooks the cache invokes so remote edits to watched ids
/// reach this client. The push channel itself is out of scope.
pub trait ChangeSubscription: Send + Sync {
    fn subscribe(&self, id: &str);
    fn unsubscribe(&self, id: &str);
    fn unsubscribe_all(&self);
}

/// In-memory facades for testing.
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Which patch primitive a recorded call used.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum PatchKind {
        Add,
        Set,
        Remove,
    }

    /// An in-memory backend that records every write for assertions.
    #[derive(Default)]
    pub struct MockBackend {
        entities: Mutex<HashMap<String, WireEntity>>,
        failures: Mutex<HashMap<String, BackendErrorKind>>,
        fetch_counts: Mutex<HashMap<String, usize>>,
        puts: Mutex<Vec<WireEntity>>,
        patches: Mutex<Vec<(PatchKind, WireEntity)>>,
        removed: Mutex<Vec<String>>,
        rights: Mutex<HashMap<String, WireEntity>>,
        memberships: Mutex<HashMap<String, WireEntity>>,
        query_pages: Mutex<Vec<QueryResult>>,
        /// Artificial latency on `get`, to widen single-flight windows.
        pub get_delay: Option<Duration>,
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        /// Seeds an entity into the remote store.
        pub fn insert(&self, entity: WireEntity) {
            self.entities
                .lock()
                .unwrap()
                .insert(entity.id.clone(), entity);
        }

        /// Makes every `get` of `id` fail with the given error class.
        pub fn fail_get(&self, id: &str, kind: BackendErrorKind) {
            self.failures.lock().unwrap().insert(id.to_string(), kind);
        }

        /// How many `get` calls were made for `id`.
        pub fn fetch_count(&self, id: &str) -> usize {
            self.fetch_counts
                .lock()
                .unwrap()
                .get(id)
                .copied()
                .unwrap_or(0)
        }

        /// The current remote copy of `id`, if any.
        pub fn stored(&self, id: &str) -> Option<WireEntity> {
            self.entities.lock().unwrap().get(id).cloned()
        }

        /// All full upserts, in order.
        pub fn puts(&self) -> Vec<WireEntity> {
            self.puts.lock().unwrap().clone()
        }

        /// All partial patches, in order.
        pub fn patches(&self) -> Vec<(PatchKind, WireEntity)> {
            self.patches.lock().unwrap().clone()
        }

        /// Ids removed from the store.
        pub fn removed(&self) -> Vec<String> {
            self.removed.lock().unwrap().clone()
        }

        pub fn set_rights(&self, id: &str, record: WireEntity) {
            self.rights.lock().unwrap().insert(id.to_string(), record);
        }

        pub fn set_membership(&self, id: &str, record: WireEntity) {
            self.memberships
                .lock()
                .unwrap()
                .insert(id.to_string(), record);
        }

        /// Queues pages returned by successive `query` calls.
        pub fn push_query_page(&self, page: QueryResult) {
            self.query_pages.lock().unwrap().push(page);
        }

        fn check_failure(&self, id: &str) -> Result<(), BackendError> {
            if let Some(kind) = self.failures.lock().unwrap().get(id) {
                return Err(match kind {
                    BackendErrorKind::NotFound => BackendError::not_found(id),
                    BackendErrorKind::Forbidden => BackendError::forbidden(id),
                    BackendErrorKind::Failure => BackendError::failure(format!("boom: {id}")),
                });
            }
            Ok(())
        }

        fn apply_patch(
            &self,
            kind: PatchKind,
            delta: &WireEntity,
        ) -> Result<(), BackendError> {
            let mut entities = self.entities.lock().unwrap();
            let target = entities
                .entry(delta.id.clone())
                .or_insert_with(|| WireEntity::new(delta.id.clone()));
            for (property, values) in &delta.props {
                match kind {
                    PatchKind::Add => {
                        let slot = target.props.entry(property.clone()).or_default();
                        for value in values {
                            if !slot.contains(value) {
                                slot.push(value.clone());
                            }
                        }
                    }
                    PatchKind::Set => {
                        target.props.insert(property.clone(), values.clone());
                    }
                    PatchKind::Remove => {
                        target.props.remove(property);
                    }
                }
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Backend for MockBackend {
        async fn get(&self, _session: &Session, id: &str) -> Result<WireEntity, BackendError> {
            if let Some(delay) = self.get_delay {
                tokio::time::sleep(delay).await;
            }
            *self
                .fetch_counts
                .lock()
                .unwrap()
                .entry(id.to_string())
                .or_insert(0) += 1;
            self.check_failure(id)?;
            self.entities
                .lock()
                .unwrap()
                .get(id)
                .cloned()
                .ok_or_else(|| BackendError::not_found(id))
        }

        async fn get_many(
            &self,
            _session: &Session,
            ids: &[String],
        ) -> Result<Vec<Option<WireEntity>>, BackendError> {
            let entities = self.entities.lock().unwrap();
            Ok(ids.iter().map(|id| entities.get(id).cloned()).collect())
        }

        async fn put(&self, _session: &Session, entity: &WireEntity) -> Result<(), BackendError> {
            self.check_failure(&entity.id)?;
            self.puts.lock().unwrap().push(entity.clone());
            self.entities
                .lock()
                .unwrap()
                .insert(entity.id.clone(), entity.clone());
            Ok(())
        }

        async fn patch_add(
            &self,
            _session: &Session,
            delta: &WireEntity,
        ) -> Result<(), BackendError> {
            self.check_failure(&delta.id)?;
            self.patches
                .lock()
                .unwrap()
                .push((PatchKind::Add, delta.clone()));
            self.apply_patch(PatchKind::Add, delta)
        }

        async fn patch_set(
            &self,
            _session: &Session,
            delta: &WireEntity,
        ) -> Result<(), BackendError> {
            self.check_failure(&delta.id)?;
            self.patches
                .lock()
                .unwrap()
                .push((PatchKind::Set, delta.clone()));
            self.apply_patch(PatchKind::Set, delta)
        }

        async fn patch_remove(
            &self,
            _session: &Session,
            delta: &WireEntity,
        ) -> Result<(), BackendError> {
            self.check_failure(&delta.id)?;
            self.patches
                .lock()
                .unwrap()
                .push((PatchKind::Remove, delta.clone()));
            self.apply_patch(PatchKind::Remove, delta)
        }

        async fn remove(&self, _session: &Session, id: &str) -> Result<(), BackendError> {
            self.check_failure(id)?;
            self.removed.lock().unwrap().push(id.to_string());
            self.entities.lock().unwrap().remove(id);
            Ok(())
        }

        async fn query(
            &self,
            _session: &Session,
            _request: &QueryRequest,
        ) -> Result<QueryResult, BackendError> {
            let mut pages = self.query_pages.lock().unwrap();
            if pages.is_empty() {
                return Ok(QueryResult::default());
            }
            Ok(pages.remove(0))
        }

        async fn get_rights(
            &self,
            _session: &Session,
            id: &str,
        ) -> Result<WireEntity, BackendError> {
            self.rights
                .lock()
                .unwrap()
                .get(id)
                .cloned()
                .ok_or_else(|| BackendError::not_found(id))
        }

        async fn get_membership(
            &self,
            _session: &Session,
            id: &str,
        ) -> Result<WireEntity, BackendError> {
            self.memberships
                .lock()
                .unwrap()
                .get(id)
                .cloned()
                .ok_or_else(|| BackendError::not_found(id))
        }
    }

    /// A subscription service that records every call.
    #[derive(Default)]
    pub struct RecordingSubscription {
        log: Mutex<Vec<String>>,
    }

    impl RecordingSubscription {
        pub fn new() -> Self {
            Self::default()
        }

        /// The call log: `"+id"` for subscribe, `"-id"` for unsubscribe,
        /// `"-*"` for unsubscribe-all.
        pub fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }

        /// Ids currently subscribed (subscribes minus unsubscribes).
        pub fn active(&self) -> Vec<String> {
            let mut active: Vec<String> = Vec::new();
            for item in self.log.lock().unwrap().iter() {
                if let Some(id) = item.strip_prefix('+') {
                    active.push(id.to_string());
                } else if item == "-*" {
                    active.clear();
                } else if let Some(id) = item.strip_prefix('-') {
                    active.retain(|a| a != id);
                }
            }
            active
        }
    }

    impl ChangeSubscription for RecordingSubscription {
        fn subscribe(&self, id: &str) {
            self.log.lock().unwrap().push(format!("+{id}"));
        }

        fn unsubscribe(&self, id: &str) {
            self.log.lock().unwrap().push(format!("-{id}"));
        }

        fn unsubscribe_all(&self) {
            self.log.lock().unwrap().push("-*".to_string());
        }
    }
}

//! Process-wide entity registry with bucketed eviction.
//!
//! Entities are grouped into eviction buckets keyed by insertion time in
//! milliseconds. Evicting whole buckets oldest-first approximates
//! recency without per-entity bookkeeping. Bucket [`PERMANENT`] is
//! reserved for ontology objects and is never evicted or subscribed.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::debug;

use crate::backend::ChangeSubscription;
use crate::entity::Entity;

/// Reserved bucket key for entities that must never be evicted.
pub const PERMANENT: i64 = 1;

struct CacheInner {
    entities: HashMap<String, Entity>,
    buckets: BTreeMap<i64, Vec<String>>,
    count: usize,
}

/// Id → live entity registry.
///
/// All holders of an id obtained through the cache share one entity
/// instance, so observers stay attached across lookups.
pub struct Cache {
    inner: Mutex<CacheInner>,
    limit: usize,
    subscription: Arc<dyn ChangeSubscription>,
}

impl Cache {
    pub fn new(limit: usize, subscription: Arc<dyn ChangeSubscription>) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entities: HashMap::new(),
                buckets: BTreeMap::new(),
                count: 0,
            }),
            limit,
            subscription,
        }
    }

    /// Pure lookup, no side effects.
    pub fn get(&self, id: &str) -> Option<Entity> {
        self.inner.lock().unwrap().entities.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registers the entity under the current-time bucket.
    pub fn set(&self, entity: &Entity) {
        self.set_in_bucket(entity, Utc::now().timestamp_millis());
    }

    /// Registers the entity in an explicit bucket. Reaching the size
    /// limit triggers eviction before the insert. Re-registering a
    /// cached id moves it out of its previous bucket, so a refresh
    /// restarts its eviction clock.
    pub fn set_in_bucket(&self, entity: &Entity, bucket: i64) {
        let id = entity.id();
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.count >= self.limit {
                self.evict(&mut inner);
            }
            if inner.entities.insert(id.clone(), entity.clone()).is_none() {
                inner.count += 1;
            } else {
                drop_from_bucket(&mut inner.buckets, &id);
            }
            inner.buckets.entry(bucket).or_default().push(id.clone());
        }
        if bucket != PERMANENT {
            self.subscription.subscribe(&id);
        }
    }

    /// Deregisters the id, unsubscribes it and drops it from its bucket.
    pub fn remove(&self, id: &str) {
        let removed = {
            let mut inner = self.inner.lock().unwrap();
            let removed = inner.entities.remove(id).is_some();
            if removed {
                inner.count -= 1;
            }
            drop_from_bucket(&mut inner.buckets, id);
            removed
        };
        if removed {
            self.subscription.unsubscribe(id);
        }
    }

    /// Empties the cache and tears down every subscription.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.entities.clear();
        inner.buckets.clear();
        inner.count = 0;
        self.subscription.unsubscribe_all();
    }

    /// Evicts whole buckets in ascending key order, skipping the
    /// permanent bucket, until at least 10% of capacity is freed or no
    /// evictable buckets remain.
    fn evict(&self, inner: &mut CacheInner) {
        let goal = (self.limit / 10).max(1);
        let mut freed = 0usize;
        let mut evicted_ids = Vec::new();

        let keys: Vec<i64> = inner
            .buckets
            .keys()
            .copied()
            .filter(|key| *key != PERMANENT)
            .collect();
        for key in keys {
            if freed >= goal {
                break;
            }
            if let Some(ids) = inner.buckets.remove(&key) {
                for id in ids {
                    if inner.entities.remove(&id).is_some() {
                        inner.count -= 1;
                        freed += 1;
                    }
                    evicted_ids.push(id);
                }
            }
        }

        debug!(freed, remaining = inner.count, "cache eviction pass");
        for id in &evicted_ids {
            self.subscription.unsubscribe(id);
        }
    }
}

/// Drops `id` from whichever bucket holds it, pruning the bucket if it
/// empties. Each id appears in at most one bucket.
fn drop_from_bucket(buckets: &mut BTreeMap<i64, Vec<String>>, id: &str) {
    let mut emptied = None;
    for (key, ids) in buckets.iter_mut() {
        if let Some(pos) = ids.iter().position(|bucket_id| bucket_id == id) {
            ids.remove(pos);
            if ids.is_empty() {
                emptied = Some(*key);
            }
            break;
        }
    }
    if let Some(key) = emptied {
        buckets.remove(&key);
    }
}

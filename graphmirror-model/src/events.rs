//! Change notification and save hooks.

use async_trait::async_trait;
use chrono::Utc;

use graphmirror_types::{vocab, Value};

use crate::entity::Entity;
use crate::error::StoreResult;
use crate::session::Session;

/// Receives property-change notifications from an [`Entity`].
///
/// Handlers are awaited one at a time in registration order, after the
/// mutation is committed. `values` is the property's parsed value list
/// after the change (empty when the property was cleared).
#[async_trait]
pub trait ChangeListener: Send + Sync {
    async fn property_changed(&self, entity: &Entity, property: &str, values: &[Value]);
}

/// Runs just before an entity is persisted by `save`.
///
/// Hooks run before the save diff is computed, so anything they stamp
/// onto the entity is included in the persisted slice.
#[async_trait]
pub trait SaveHook: Send + Sync {
    async fn before_save(&self, entity: &Entity, session: &Session) -> StoreResult<()>;
}

/// Stamps authorship metadata on save: creator and creation time once
/// for never-persisted entities; last editor and edit time when the
/// editor changed or the previous stamp is more than a second old, so
/// rapid save bursts by one user keep a stable edit time.
pub struct EditStamp;

#[async_trait]
impl SaveHook for EditStamp {
    async fn before_save(&self, entity: &Entity, session: &Session) -> StoreResult<()> {
        let now = Utc::now();
        let user = Value::reference(&session.user);
        if entity.is_new() {
            if !entity.has_property(vocab::CREATOR) {
                entity.set_silent(vocab::CREATOR, vec![user.clone()]);
            }
            if !entity.has_property(vocab::CREATED) {
                entity.set_silent(vocab::CREATED, vec![Value::from(now)]);
            }
        }
        let same_editor = entity
            .get_first(vocab::LAST_EDITOR)
            .and_then(|value| value.as_id().map(str::to_string))
            .map_or(false, |editor| editor == session.user);
        // Stamps are second-precision on the wire, so compare whole
        // seconds.
        let fresh = entity
            .get_first(vocab::EDITED)
            .and_then(|value| value.as_datetime())
            .map_or(false, |edited| now.timestamp() - edited.timestamp() <= 1);
        if !(same_editor && fresh) {
            entity.set_silent(vocab::LAST_EDITOR, vec![user]);
            entity.set_silent(vocab::EDITED, vec![Value::from(now)]);
        }
        Ok(())
    }
}

//! Well-known vocabulary URIs and id generation.
//!
//! Property and type URIs with fixed meaning across the system. Everything
//! else in a property map is ontology-defined and opaque to this layer.

use uuid::Uuid;

/// Declared type(s) of an entity.
pub const TYPE: &str = "rdf:type";

/// Supertype link, walked by class-membership tests.
pub const SUB_CLASS_OF: &str = "rdfs:subClassOf";

/// Human-readable label.
pub const LABEL: &str = "rdfs:label";

/// Soft-delete flag. `true` marks the entity deleted without removing its
/// record.
pub const DELETED: &str = "gm:deleted";

/// Type marker added alongside the soft-delete flag so downstream filters
/// can tell "soft-deleted" from merely absent.
pub const DELETABLE: &str = "gm:Deletable";

/// Server-maintained revision counter, stripped when cloning.
pub const UPDATE_COUNTER: &str = "gm:updateCounter";

/// Marks a client-local draft; excluded from compiled filter queries.
pub const IS_DRAFT: &str = "gm:isDraft";

// Audit-trail properties stamped on save.
pub const CREATOR: &str = "gm:creator";
pub const CREATED: &str = "gm:created";
pub const LAST_EDITOR: &str = "gm:lastEditor";
pub const EDITED: &str = "gm:edited";

// Rights-record properties returned by the access-control lookup.
pub const CAN_CREATE: &str = "gm:canCreate";
pub const CAN_READ: &str = "gm:canRead";
pub const CAN_UPDATE: &str = "gm:canUpdate";
pub const CAN_DELETE: &str = "gm:canDelete";

/// Group membership link in a membership record.
pub const MEMBER_OF: &str = "gm:memberOf";

/// Reserved wildcard property on pattern entities: a value that already
/// looks like a complete filter expression is passed through verbatim.
pub const WILDCARD: &str = "*";

/// Sentinel records installed by `load` when a fetch fails, so presentation
/// code never sees a completely empty entity.
pub mod sentinel {
    pub const NOT_FOUND_TYPE: &str = "gm:NotFoundObject";
    pub const NOT_FOUND_LABEL: &str = "Object not found";

    pub const FORBIDDEN_TYPE: &str = "gm:ForbiddenObject";
    pub const FORBIDDEN_LABEL: &str = "Access denied";

    pub const FETCH_ERROR_TYPE: &str = "gm:FetchError";
    pub const FETCH_ERROR_LABEL: &str = "Failed to load object";
}

/// Generates a fresh entity id in the client's reserved namespace.
///
/// UUID v7 keeps generated ids time-ordered, which groups freshly created
/// entities together in store-side scans.
pub fn gen_id() -> String {
    format!("d:{}", Uuid::now_v7().simple())
}

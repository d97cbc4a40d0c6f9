//! Session context, connection status and store configuration.

/// Credentials and identity for remote-store calls.
///
/// Passed explicitly into every operation that talks to the backend;
/// the store owns one, nothing reads it from a global.
#[derive(Debug, Clone)]
pub struct Session {
    /// Opaque authentication ticket presented to the remote store.
    pub ticket: String,
    /// Id of the entity representing the current user.
    pub user: String,
}

impl Session {
    pub fn new(ticket: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            ticket: ticket.into(),
            user: user.into(),
        }
    }
}

/// Connectivity as seen by the client.
///
/// `load` trusts a cached snapshot while fully online or fully offline;
/// in `Limited` mode it re-fetches through `reset` instead, since the
/// cached copy may have silently diverged while notifications were down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    #[default]
    Online,
    Offline,
    Limited,
}

/// Configuration for a [`crate::Store`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Cache capacity; reaching it triggers bucket eviction.
    pub cache_limit: usize,
    /// Whether `save` sends the whole property set in one upsert by
    /// default, rather than per-bucket partial patches.
    pub atomic_save: bool,
    /// Page size used by the paged query driver.
    pub query_page: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cache_limit: 10_000,
            atomic_save: true,
            query_page: 100,
        }
    }
}

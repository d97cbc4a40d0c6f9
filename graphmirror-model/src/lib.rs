//! Entity model, process-wide cache and lifecycle state machine for
//! GraphMirror.
//!
//! The model crate is the client-resident mirror of the remote graph
//! store. A [`Store`] owns the remote-store facade, the change
//! subscription service, the entity cache and the session context; every
//! operation that needs them takes the store explicitly; there are no
//! ambient globals.
//!
//! [`Entity`] is a cheap-clone handle: all observers of an id share one
//! live instance through the cache, so dirty tracking and change
//! notifications stay coherent. Mutation goes exclusively through the
//! mutator methods; lifecycle transitions (`load`, `save`, `reset`,
//! `delete`, `remove`, `recover`) are single-flight per entity and
//! operation kind.

mod backend;
mod cache;
mod diff;
mod entity;
mod error;
mod events;
mod init;
mod lifecycle;
mod session;
mod store;

pub use backend::{
    mock, Backend, BackendError, BackendErrorKind, ChangeSubscription, QueryRequest, QueryResult,
};
pub use cache::{Cache, PERMANENT};
pub use diff::{diff, Delta};
pub use entity::{Entity, Op};
pub use error::{StoreError, StoreResult};
pub use events::{ChangeListener, EditStamp, SaveHook};
pub use init::TypeInitRegistry;
pub use session::{ConnectionStatus, Session, StoreConfig};
pub use store::Store;

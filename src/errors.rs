//! Coordination-layer error hierarchy.
//!
//! Errors here are fatal to the calling operation. Expected service
//! responses (already-exists, no-node, stale-version) travel as
//! [`crate::reply::ReplyCode`] branches and never appear in this hierarchy.

use std::time::Duration;

use config::ConfigError;

use crate::reply::ReplyCode;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Session cannot be established or died mid-operation.
    #[error(transparent)]
    Connectivity(#[from] ConnectivityError),

    /// Lock acquisition failures.
    #[error(transparent)]
    Lock(#[from] LockError),

    /// Ancestor materialization failures.
    #[error(transparent)]
    Ancestor(#[from] AncestorError),

    /// Configuration channel failures.
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// Payload could not be interpreted. Carried in listener results rather
    /// than aborting the watch.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Session settings validation failures.
    #[error(transparent)]
    Settings(#[from] ConfigError),
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectivityError {
    /// The service refused or could not accept the connection.
    #[error("coordination service unreachable: {0}")]
    Unreachable(String),

    /// The bounded connect wait elapsed.
    #[error("connect under {root} timed out after {waited:?}")]
    ConnectTimeout { root: String, waited: Duration },

    /// The session handle was closed before the pending operation resolved.
    /// Closing the session is the only cancellation mechanism.
    #[error("session closed before the operation completed")]
    SessionClosed,
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// Ticket creation failed after the ancestor-creation retry.
    #[error("failed to acquire lock at {path} ({code:?})")]
    Acquisition { path: String, code: ReplyCode },
}

#[derive(Debug, thiserror::Error)]
pub enum AncestorError {
    /// The recursion walked past the namespace root without finding it.
    #[error("namespace root missing while creating ancestors of {path}")]
    RootMissing { path: String },

    /// An ancestor create failed with a non-race code.
    #[error("failed to create ancestor {path} ({code:?})")]
    Create { path: String, code: ReplyCode },
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("failed to encode configuration payload")]
    Encode(#[source] bincode::Error),

    /// Create-or-update terminated with an unexpected code. Publishing does
    /// not create ancestors; a missing parent surfaces here as `NoParent`.
    #[error("publish to {path} failed ({code:?})")]
    Publish { path: String, code: ReplyCode },
}

#[derive(Debug, thiserror::Error)]
#[error("payload at {path} could not be decoded")]
pub struct DecodeError {
    pub path: String,
    #[source]
    pub source: bincode::Error,
}

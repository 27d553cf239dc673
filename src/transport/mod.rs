//! External boundary to the coordination service.
//!
//! The service itself (consensus, replication, session timeouts) is not part
//! of this crate; it is consumed through two traits. [`Connector`] opens
//! logical sessions scoped under a chroot-style namespace root.
//! [`Transport`] exposes the service's primitive async node operations: each
//! call returns a [`ResultFuture`] immediately and the outcome arrives when
//! the service responds.
//!
//! Watches are one-shot. Arming one means handing a [`WatchSlot`] to
//! `exists` or `get_data`; the slot is consumed by the first matching event
//! and any later change is invisible until a new registration is armed.
//! Exists-watches fire on create, delete and data change; data-watches on
//! delete and data change. Events for a path arrive in the order the
//! underlying changes occurred.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
#[cfg(test)]
use mockall::automock;

use crate::config::SessionSettings;
use crate::errors::Result;
use crate::future::{ResultFuture, WatchSlot};
use crate::reply::{NodeKind, Version};

/// Factory for logical sessions.
///
/// A fresh transport per call: nested blocking waits must run on their own
/// session handle, because a logical connection supports only one in-flight
/// synchronous wait (see [`crate::session::CoordinationSession::auxiliary`]).
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a new session whose paths resolve under `root`.
    async fn open(&self, root: &str, settings: &SessionSettings) -> Result<Arc<dyn Transport>>;
}

/// Primitive async operations of one live session handle.
pub trait Transport: Send + Sync {
    /// Create a node. `Ok` carries the real path, including any
    /// service-assigned sequence suffix. Expected non-fatal codes:
    /// `AlreadyExists`, `NoParent`.
    fn create(&self, path: &str, data: Bytes, kind: NodeKind) -> ResultFuture<String>;

    /// Existence check. `Ok` with stat when present, `NoNode` when absent.
    /// A supplied watch is armed atomically with the check.
    fn exists(&self, path: &str, watch: Option<WatchSlot>) -> ResultFuture<()>;

    /// Read node data. `NoNode` when absent, in which case no watch is armed.
    fn get_data(&self, path: &str, watch: Option<WatchSlot>) -> ResultFuture<Bytes>;

    /// Conditional update. Expected non-fatal codes: `NoNode`, `BadVersion`.
    fn set_data(&self, path: &str, data: Bytes, version: Version) -> ResultFuture<()>;

    /// Child leaf names of a directory node, in no guaranteed order; callers
    /// sort. Always a fresh snapshot, never cached.
    fn get_children(&self, path: &str) -> ResultFuture<Vec<String>>;

    /// Conditional delete. Expected non-fatal codes: `NoNode`, `BadVersion`.
    fn delete(&self, path: &str, version: Version) -> ResultFuture<()>;

    /// Whether this handle can still reach the service.
    fn is_alive(&self) -> bool;

    /// Tear the session down. Ephemeral nodes owned by it are reclaimed by
    /// the service; pending waits resolve with `SessionClosed`.
    fn close(&self);
}

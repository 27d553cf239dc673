//! Configuration publish/listen channel.
//!
//! [`ConfigPublisher`] writes a versioned value to a node (create, or
//! unconditional update when the node exists). [`ConfigListener`] watches a
//! node and drives user reactions through [`ChannelHooks`] as the node is
//! created, changed and deleted, re-arming its one-shot watches between
//! deliveries.
//!
//! Payloads on the wire are opaque bytes; this channel encodes and decodes
//! them with `bincode`, and publisher and listener must agree on the value
//! type out of band.

mod listener;
mod publisher;

pub use listener::*;
pub use publisher::*;


use crate::errors::Error;
use crate::reply::{NodeStat, ReplyCode};

/// One delivery to a listener: the decoded value on success, or the reply
/// code and error that prevented it. Decode failures keep `code == Ok` with
/// the error field populated, so "service error" and "payload decode error"
/// stay distinguishable.
#[derive(Debug)]
pub struct ChannelUpdate<T> {
    pub path: String,
    pub code: ReplyCode,
    pub value: Option<T>,
    pub error: Option<Error>,
    pub stat: Option<NodeStat>,
}

/// Reactions a listener drives as the watched node evolves.
///
/// The boolean hooks gate whether a confirmed existence or creation leads to
/// a read; both default to reading. A data-change on an already-confirmed
/// watcher always propagates regardless of these gates.
pub trait ChannelHooks<T>: Send + Sync + 'static {
    /// A read completed: success, service error, or decode error.
    fn on_change(&self, update: ChannelUpdate<T>);

    /// The node was absent at the initial existence check.
    fn on_not_exist(&self, _path: &str) {}

    /// The node disappeared while being watched.
    fn on_delete(&self, _path: &str) {}

    /// The node was present at the initial existence check. Return false to
    /// decline: the listen ends without reading and without a watch.
    fn on_exists(&self, _path: &str) -> bool {
        true
    }

    /// The node appeared while awaiting creation. Return false to skip the
    /// read and fall back to a fresh existence check.
    fn on_create(&self, _path: &str) -> bool {
        true
    }
}

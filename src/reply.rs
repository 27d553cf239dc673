//! Shared vocabulary for coordination-service replies.
//!
//! Every primitive operation resolves to an [`Outcome`]: a tagged union of
//! {code, value, error, stat}. Expected service responses such as
//! [`ReplyCode::AlreadyExists`] or [`ReplyCode::NoNode`] are control-flow
//! branches carried in the code, never surfaced as Rust errors.

use crate::errors::Error;

/// Enumerated outcome of a primitive node operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyCode {
    /// Operation applied.
    Ok,
    /// Create target already present.
    AlreadyExists,
    /// Target node absent.
    NoNode,
    /// Create failed because the parent node is absent.
    NoParent,
    /// Conditional update against a stale version.
    BadVersion,
    /// The session handle died while the operation was in flight.
    ConnectionLoss,
}

/// Node lifetime and naming behaviour, chosen at create time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Survives the creating session.
    Persistent,
    /// Survives the creating session; the service appends a unique
    /// monotonically increasing suffix to the requested name.
    PersistentSequential,
    /// Deleted automatically when the owning session ends.
    Ephemeral,
    /// Ephemeral with a sequential suffix. Lock tickets use this kind.
    EphemeralSequential,
}

impl NodeKind {
    pub fn is_ephemeral(&self) -> bool {
        matches!(self, NodeKind::Ephemeral | NodeKind::EphemeralSequential)
    }

    pub fn is_sequential(&self) -> bool {
        matches!(
            self,
            NodeKind::PersistentSequential | NodeKind::EphemeralSequential
        )
    }
}

/// Version stamp returned alongside node data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeStat {
    /// Data version, incremented on every update.
    pub version: u32,
    /// Payload size in bytes.
    pub data_length: usize,
    /// Owning session id for ephemeral nodes.
    pub ephemeral_owner: Option<u64>,
}

/// Expected-version guard for conditional writes and deletes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    /// Unconditional: apply regardless of the current version.
    Any,
    /// Apply only if the current data version matches.
    Exact(u32),
}

impl Version {
    pub(crate) fn admits(&self, current: u32) -> bool {
        match self {
            Version::Any => true,
            Version::Exact(v) => *v == current,
        }
    }
}

/// One-shot watch notification, keyed by the path the watch was armed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub path: String,
    pub kind: WatchEventKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Created,
    Deleted,
    DataChanged,
}

/// Terminal result of an asynchronous operation.
///
/// Exactly one of these is written per issued operation; see
/// [`crate::future::OutcomeSlot`] for the single-assignment discipline.
#[derive(Debug)]
pub struct Outcome<T> {
    pub code: ReplyCode,
    pub value: Option<T>,
    pub error: Option<Error>,
    pub stat: Option<NodeStat>,
}

impl<T> Outcome<T> {
    pub fn ok(value: T) -> Self {
        Self {
            code: ReplyCode::Ok,
            value: Some(value),
            error: None,
            stat: None,
        }
    }

    pub fn ok_with_stat(value: T, stat: NodeStat) -> Self {
        Self {
            code: ReplyCode::Ok,
            value: Some(value),
            error: None,
            stat: Some(stat),
        }
    }

    /// A terminal, valueless outcome such as `NoNode` or `AlreadyExists`.
    pub fn code(code: ReplyCode) -> Self {
        Self {
            code,
            value: None,
            error: None,
            stat: None,
        }
    }

    pub fn failed(code: ReplyCode, error: Error) -> Self {
        Self {
            code,
            value: None,
            error: Some(error),
            stat: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == ReplyCode::Ok
    }
}

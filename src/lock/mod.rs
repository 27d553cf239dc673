//! Fair distributed mutual exclusion.
//!
//! Each waiter creates an ephemeral sequential ticket under
//! `/<name>/<name>`; the service's sequence assignment is the only
//! serialization point, so queue order is decided by suffix, never by
//! arrival time. The holder is whichever live ticket sorts first. Everyone
//! else watches the ticket immediately ahead of it and re-derives its
//! position from a fresh child snapshot whenever that watch fires; the
//! predecessor is recomputed every pass, never memoized, because the set
//! can change between snapshot and watch registration.
//!
//! Losing the session while holding the lock releases it implicitly (the
//! ticket is ephemeral) but is not reported to the holder.

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::ancestors::AncestorCreator;
use crate::errors::{LockError, Result};
use crate::future::outcome_pair;
use crate::paths::{join, leaf_of};
use crate::reply::{NodeKind, ReplyCode, Version, WatchEventKind};
use crate::session::CoordinationSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Idle,
    Requesting,
    Queued,
    Held,
    Released,
    Failed,
}

pub struct FairLock {
    session: CoordinationSession,
    name: String,
    /// Real path of this holder's sequential ticket, suffix included.
    ticket: Option<String>,
    state: LockState,
}

impl FairLock {
    pub fn new(session: CoordinationSession, name: impl Into<String>) -> Self {
        Self {
            session,
            name: name.into(),
            ticket: None,
            state: LockState::Idle,
        }
    }

    pub fn state(&self) -> LockState {
        self.state
    }

    /// Ticket path for this holder, once queued.
    pub fn ticket(&self) -> Option<&str> {
        self.ticket.as_deref()
    }

    /// Acquire the lock, blocking until this waiter's ticket is first in
    /// queue order.
    pub async fn lock(&mut self) -> Result<()> {
        self.state = LockState::Requesting;
        let node = format!("/{}/{}", self.name, self.name);

        let out = match self
            .session
            .create(&node, Bytes::new(), NodeKind::EphemeralSequential)
        {
            Ok(fut) => fut.recv().await,
            Err(e) => Err(e),
        };
        let out = match out {
            Ok(out) => out,
            Err(e) => {
                self.state = LockState::Failed;
                return Err(e);
            }
        };

        let ticket = match out.code {
            ReplyCode::Ok => out.value.unwrap_or(node),
            ReplyCode::NoParent => match self.create_queue_dir_and_retry(&node).await {
                Ok(ticket) => ticket,
                Err(e) => {
                    self.state = LockState::Failed;
                    return Err(e);
                }
            },
            code => {
                self.state = LockState::Failed;
                return Err(LockError::Acquisition { path: node, code }.into());
            }
        };

        debug!(ticket = %ticket, "ticket created");
        self.ticket = Some(ticket);
        self.state = LockState::Queued;
        self.wait_until_first().await
    }

    /// The queue directory was missing; materialize it and retry the ticket
    /// create once. Concurrent waiters may be doing the same thing.
    async fn create_queue_dir_and_retry(&self, node: &str) -> Result<String> {
        AncestorCreator::new(&self.session)
            .ensure_ancestors(node)
            .await?;
        debug!(name = %self.name, "queue directory ready, recreating ticket");
        let retry = self
            .session
            .create(node, Bytes::new(), NodeKind::EphemeralSequential)?
            .recv()
            .await?;
        match retry.code {
            ReplyCode::Ok => Ok(retry.value.unwrap_or_else(|| node.to_string())),
            code => Err(LockError::Acquisition {
                path: node.to_string(),
                code,
            }
            .into()),
        }
    }

    /// The ordering check. Entered whenever a ticket exists and the lock is
    /// not yet held; re-entered every time the predecessor watch fires.
    async fn wait_until_first(&mut self) -> Result<()> {
        let dir = format!("/{}", self.name);
        let ticket = match self.ticket.as_deref() {
            Some(t) => t.to_string(),
            None => {
                self.state = LockState::Failed;
                return Err(LockError::Acquisition {
                    path: dir,
                    code: ReplyCode::NoNode,
                }
                .into());
            }
        };
        let leaf = leaf_of(&ticket).to_string();

        loop {
            // Fresh snapshot on an independent handle; the main session is
            // reserved for the exists/watch wait below.
            let aux = self.session.auxiliary().await?;
            let out = aux.get_children(&dir)?.recv().await?;
            if out.code != ReplyCode::Ok {
                self.state = LockState::Failed;
                return Err(LockError::Acquisition {
                    path: dir,
                    code: out.code,
                }
                .into());
            }
            let mut children = out.value.unwrap_or_default();
            children.sort();

            let position = match children.iter().position(|c| *c == leaf) {
                Some(p) => p,
                None => {
                    // Our ticket vanished under us, e.g. session loss pruned
                    // the ephemeral node while we queued.
                    self.state = LockState::Failed;
                    return Err(LockError::Acquisition {
                        path: ticket,
                        code: ReplyCode::NoNode,
                    }
                    .into());
                }
            };
            debug!(ticket = %leaf, position, waiters = children.len(), "ordering check");

            if position == 0 {
                info!(ticket = %ticket, "lock held");
                self.state = LockState::Held;
                return Ok(());
            }

            let predecessor = join(&dir, &children[position - 1]);
            let (slot, armed) = outcome_pair();
            let out = self.session.exists(&predecessor, Some(slot))?.recv().await?;
            match out.code {
                ReplyCode::NoNode => {
                    // Predecessor gone between snapshot and watch; it may or
                    // may not have been the last one ahead of us, so rerun
                    // the check instead of assuming we are first.
                    debug!(predecessor = %predecessor, "predecessor already gone");
                    continue;
                }
                ReplyCode::Ok => {
                    debug!(predecessor = %predecessor, "waiting for predecessor release");
                    let event = armed.recv().await?;
                    match event.value.map(|e| e.kind) {
                        Some(WatchEventKind::Deleted) => continue,
                        // Any other firing leaves the queue unchanged; rerun
                        // the check, which re-arms from live state.
                        _ => continue,
                    }
                }
                code => {
                    self.state = LockState::Failed;
                    return Err(LockError::Acquisition {
                        path: predecessor,
                        code,
                    }
                    .into());
                }
            }
        }
    }

    /// Release the lock by deleting this holder's ticket. Best-effort:
    /// an already-gone ticket is success, anything else is logged and
    /// swallowed, since an undeleted ephemeral node heals itself once the
    /// session ends.
    pub async fn unlock(&mut self) {
        let ticket = match self.ticket.take() {
            Some(t) => t,
            None => {
                self.state = LockState::Released;
                return;
            }
        };

        match self.session.delete(&ticket, Version::Any) {
            Ok(fut) => match fut.recv().await {
                Ok(out) if matches!(out.code, ReplyCode::Ok | ReplyCode::NoNode) => {
                    info!(ticket = %ticket, "unlocked");
                }
                Ok(out) => {
                    warn!(ticket = %ticket, code = ?out.code, "unlock delete failed");
                }
                Err(e) => {
                    warn!(ticket = %ticket, error = %e, "unlock delete failed");
                }
            },
            Err(e) => {
                warn!(ticket = %ticket, error = %e, "unlock on a dead session");
            }
        }
        self.state = LockState::Released;
    }
}

use std::marker::PhantomData;
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{ChannelHooks, ChannelUpdate};
use crate::errors::{DecodeError, Result};
use crate::future::{outcome_pair, ResultFuture};
use crate::reply::{Outcome, ReplyCode, WatchEventKind};
use crate::session::CoordinationSession;

/// Watches configuration nodes and drives [`ChannelHooks`] reactions.
///
/// One listener can watch multiple paths; each `listen` call runs its own
/// worker task. A second listen on the same path supersedes the first.
pub struct ConfigListener {
    session: Arc<CoordinationSession>,
    active: DashMap<String, CancellationToken>,
}

/// Handle to one running listen worker.
pub struct ListenerHandle {
    path: String,
    token: CancellationToken,
    join: JoinHandle<()>,
}

impl ListenerHandle {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Stop the worker. Idempotent; the worker exits at its next await point.
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Wait for the worker to finish, after `stop` or a natural end (a
    /// non-rearming delivery, a declined existence check, session loss).
    pub async fn join(self) {
        let _ = self.join.await;
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

impl ConfigListener {
    pub fn new(session: CoordinationSession) -> Self {
        Self {
            session: Arc::new(session),
            active: DashMap::new(),
        }
    }

    /// Start watching `path`. The worker checks existence first (arming a
    /// creation watch atomically with the check), then follows the node
    /// through creations, data changes and deletions, invoking `hooks` at
    /// each step. With `rearm_on_change` false, a single delivery is made
    /// and watching stops until `listen` is called again.
    pub async fn listen<T, H>(
        &self,
        path: &str,
        hooks: H,
        rearm_on_change: bool,
    ) -> Result<ListenerHandle>
    where
        T: DeserializeOwned + Send + 'static,
        H: ChannelHooks<T>,
    {
        self.session.ensure_connected().await?;

        let token = CancellationToken::new();
        if let Some(previous) = self.active.insert(path.to_string(), token.clone()) {
            // One worker per path; a replacement listen supersedes the old.
            previous.cancel();
        }

        let worker = ListenWorker {
            session: self.session.clone(),
            path: path.to_string(),
            hooks,
            rearm_on_change,
            token: token.clone(),
            _value: PhantomData,
        };
        let join = tokio::spawn(worker.run());
        info!(path = %path, rearm_on_change, "listening");
        Ok(ListenerHandle {
            path: path.to_string(),
            token,
            join,
        })
    }

    /// Cancel every active listen started through this listener.
    pub fn stop_all(&self) {
        for entry in self.active.iter() {
            entry.value().cancel();
        }
        self.active.clear();
    }
}

/// Whether a delivery cycle ended because the node went away (re-enter the
/// existence check) or because the worker is done.
enum Flow {
    Recheck,
    Stop,
}

struct ListenWorker<T, H> {
    session: Arc<CoordinationSession>,
    path: String,
    hooks: H,
    rearm_on_change: bool,
    token: CancellationToken,
    _value: PhantomData<fn() -> T>,
}

impl<T, H> ListenWorker<T, H>
where
    T: DeserializeOwned + Send + 'static,
    H: ChannelHooks<T>,
{
    async fn run(self) {
        loop {
            // CheckingExistence. The creation watch is armed atomically with
            // the check so a create racing the check cannot slip through
            // unobserved.
            let (slot, armed) = outcome_pair();
            let issued = match self.session.exists(&self.path, Some(slot)) {
                Ok(fut) => fut,
                Err(e) => {
                    warn!(path = %self.path, error = %e, "existence check failed to issue");
                    break;
                }
            };
            let Some(reply) = self.outcome_or_cancelled(issued).await else {
                break;
            };

            match reply.code {
                ReplyCode::NoNode => {
                    debug!(path = %self.path, "node absent, awaiting creation");
                    self.hooks.on_not_exist(&self.path);
                    // AwaitingCreate
                    let Some(event) = self.outcome_or_cancelled(armed).await else {
                        break;
                    };
                    match event.value.map(|e| e.kind) {
                        Some(WatchEventKind::Created) => {
                            if self.hooks.on_create(&self.path) {
                                match self.deliver().await {
                                    Flow::Recheck => continue,
                                    Flow::Stop => break,
                                }
                            } else {
                                // Declined; fall back to a fresh existence
                                // check, which re-arms the creation watch.
                                continue;
                            }
                        }
                        _ => continue,
                    }
                }
                ReplyCode::Ok => {
                    if self.hooks.on_exists(&self.path) {
                        // Reads arm their own watch; the check's is surplus.
                        drop(armed);
                        match self.deliver().await {
                            Flow::Recheck => continue,
                            Flow::Stop => break,
                        }
                    } else {
                        debug!(path = %self.path, "caller declined, nothing left armed");
                        break;
                    }
                }
                code => {
                    warn!(path = %self.path, ?code, "unexpected code on existence check");
                    break;
                }
            }
        }
        debug!(path = %self.path, "listen worker stopped");
    }

    /// Read the node and emit, re-arming and re-reading for as long as
    /// change events keep arriving.
    async fn deliver(&self) -> Flow {
        loop {
            if !self.rearm_on_change {
                let issued = match self.session.get_data(&self.path, None) {
                    Ok(fut) => fut,
                    Err(e) => {
                        warn!(path = %self.path, error = %e, "read failed to issue");
                        return Flow::Stop;
                    }
                };
                let Some(out) = self.outcome_or_cancelled(issued).await else {
                    return Flow::Stop;
                };
                self.emit(out);
                // No watch re-armed; resuming requires a new listen call.
                return Flow::Stop;
            }

            let (slot, armed) = outcome_pair();
            let issued = match self.session.get_data(&self.path, Some(slot)) {
                Ok(fut) => fut,
                Err(e) => {
                    warn!(path = %self.path, error = %e, "read failed to issue");
                    return Flow::Stop;
                }
            };
            let Some(out) = self.outcome_or_cancelled(issued).await else {
                return Flow::Stop;
            };
            let code = out.code;
            self.emit(out);
            if code == ReplyCode::NoNode {
                // Vanished between event and read; nothing was armed.
                return Flow::Recheck;
            }

            let Some(event) = self.outcome_or_cancelled(armed).await else {
                return Flow::Stop;
            };
            match event.value.map(|e| e.kind) {
                // A confirmed watcher always propagates changes; the
                // on_create/on_exists gates do not apply here.
                Some(WatchEventKind::DataChanged) => continue,
                Some(WatchEventKind::Deleted) => {
                    self.hooks.on_delete(&self.path);
                    return Flow::Recheck;
                }
                _ => continue,
            }
        }
    }

    /// Decode and deliver one read outcome. Service errors and decode
    /// failures are delivered too; the status/error split keeps them apart.
    fn emit(&self, out: Outcome<Bytes>) {
        let update = match (out.code, out.value) {
            (ReplyCode::Ok, Some(bytes)) => match bincode::deserialize::<T>(&bytes) {
                Ok(value) => ChannelUpdate {
                    path: self.path.clone(),
                    code: ReplyCode::Ok,
                    value: Some(value),
                    error: None,
                    stat: out.stat,
                },
                Err(source) => {
                    warn!(path = %self.path, "payload decode failed");
                    ChannelUpdate {
                        path: self.path.clone(),
                        code: ReplyCode::Ok,
                        value: None,
                        error: Some(
                            DecodeError {
                                path: self.path.clone(),
                                source,
                            }
                            .into(),
                        ),
                        stat: out.stat,
                    }
                }
            },
            (code, _) => ChannelUpdate {
                path: self.path.clone(),
                code,
                value: None,
                error: out.error,
                stat: out.stat,
            },
        };
        self.hooks.on_change(update);
    }

    async fn outcome_or_cancelled<V>(&self, fut: ResultFuture<V>) -> Option<Outcome<V>> {
        tokio::select! {
            _ = self.token.cancelled() => None,
            out = fut.recv() => match out {
                Ok(out) => Some(out),
                Err(e) => {
                    warn!(path = %self.path, error = %e, "listen interrupted");
                    None
                }
            },
        }
    }
}

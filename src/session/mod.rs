//! Logical session over a [`Connector`].
//!
//! A [`CoordinationSession`] owns at most one live transport handle at a
//! time and scopes every path under its namespace root. All node operations
//! follow the issue-then-await shape: the method returns a [`ResultFuture`]
//! and the caller blocks on [`ResultFuture::recv`] when it needs the
//! outcome.
//!
//! One handle supports one in-flight synchronous wait. Code that must block
//! on a second operation while the first is pending (the lock's ordering
//! check, ancestor creation) opens an independent handle via [`auxiliary`].
//!
//! [`auxiliary`]: CoordinationSession::auxiliary

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::config::SessionSettings;
use crate::errors::{ConnectivityError, Result};
use crate::future::{ResultFuture, WatchSlot};
use crate::reply::{NodeKind, Version};
use crate::transport::{Connector, Transport};

pub struct CoordinationSession {
    connector: Arc<dyn Connector>,
    root: String,
    settings: SessionSettings,
    transport: RwLock<Option<Arc<dyn Transport>>>,
}

impl CoordinationSession {
    /// Open a session scoped under `root`, blocking until the transport
    /// reports connected or the bounded wait elapses.
    pub async fn connect(
        connector: Arc<dyn Connector>,
        root: impl Into<String>,
        settings: SessionSettings,
    ) -> Result<Self> {
        let session = Self {
            connector,
            root: root.into(),
            settings,
            transport: RwLock::new(None),
        };
        session.reconnect().await?;
        Ok(session)
    }

    /// Close any prior handle, then open a fresh one. At most one live
    /// handle exists per session object.
    pub async fn reconnect(&self) -> Result<()> {
        if let Some(old) = self.transport.write().take() {
            debug!(root = %self.root, "closing previous session handle");
            old.close();
        }

        let waited = self.settings.connect_timeout();
        let opened = tokio::time::timeout(waited, self.connector.open(&self.root, &self.settings))
            .await
            .map_err(|_| ConnectivityError::ConnectTimeout {
                root: self.root.clone(),
                waited,
            })??;

        info!(root = %self.root, "session connected");
        *self.transport.write() = Some(opened);
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.transport
            .read()
            .as_ref()
            .map(|t| t.is_alive())
            .unwrap_or(false)
    }

    /// Reconnect if the current handle is dead or absent.
    pub async fn ensure_connected(&self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }
        self.reconnect().await
    }

    /// Open an independent session under the same root, for nested blocking
    /// waits. The transport supports one in-flight synchronous wait per
    /// logical connection; blocking twice on the same handle deadlocks its
    /// delivery path.
    pub async fn auxiliary(&self) -> Result<CoordinationSession> {
        CoordinationSession::connect(
            self.connector.clone(),
            self.root.clone(),
            self.settings.clone(),
        )
        .await
    }

    pub fn close(&self) {
        if let Some(t) = self.transport.write().take() {
            t.close();
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    fn transport(&self) -> Result<Arc<dyn Transport>> {
        self.transport
            .read()
            .clone()
            .ok_or_else(|| ConnectivityError::SessionClosed.into())
    }

    // Node operations. Each issues immediately and returns the pending
    // outcome; callers await `recv()` when they need the result.

    pub fn create(&self, path: &str, data: Bytes, kind: NodeKind) -> Result<ResultFuture<String>> {
        Ok(self.transport()?.create(path, data, kind))
    }

    pub fn exists(&self, path: &str, watch: Option<WatchSlot>) -> Result<ResultFuture<()>> {
        Ok(self.transport()?.exists(path, watch))
    }

    pub fn get_data(&self, path: &str, watch: Option<WatchSlot>) -> Result<ResultFuture<Bytes>> {
        Ok(self.transport()?.get_data(path, watch))
    }

    pub fn set_data(&self, path: &str, data: Bytes, version: Version) -> Result<ResultFuture<()>> {
        Ok(self.transport()?.set_data(path, data, version))
    }

    pub fn get_children(&self, path: &str) -> Result<ResultFuture<Vec<String>>> {
        Ok(self.transport()?.get_children(path))
    }

    pub fn delete(&self, path: &str, version: Version) -> Result<ResultFuture<()>> {
        Ok(self.transport()?.delete(path, version))
    }
}

impl std::fmt::Debug for CoordinationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinationSession")
            .field("root", &self.root)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl Drop for CoordinationSession {
    fn drop(&mut self) {
        self.close();
    }
}

//! Recursive ancestor-path materialization.
//!
//! `ensure_ancestors("/mylock1/mylock1")` creates `/mylock1` (and anything
//! above it, bottom of the recursion first) as persistent empty nodes.
//! Concurrent creation by another actor is not an error: whichever side
//! loses the create race observes `AlreadyExists` and treats the level as
//! done.
//!
//! Every recursion level blocks on its own auxiliary session. The level
//! that triggered the recursion is itself awaiting a create on another
//! handle, and a logical connection supports only one blocked wait.

use bytes::Bytes;
use futures::future::BoxFuture;
use tracing::{debug, info};

use crate::errors::{AncestorError, Result};
use crate::paths::parent_of;
use crate::reply::{NodeKind, ReplyCode};
use crate::session::CoordinationSession;

pub struct AncestorCreator<'a> {
    session: &'a CoordinationSession,
}

impl<'a> AncestorCreator<'a> {
    pub fn new(session: &'a CoordinationSession) -> Self {
        Self { session }
    }

    /// Create every missing ancestor of `path`, from the highest missing
    /// level down to the direct parent. Returns the parent path.
    pub async fn ensure_ancestors(&self, path: &str) -> Result<String> {
        let parent = parent_of(path);
        if parent.is_empty() {
            // Nothing between the node and the namespace root; if the caller
            // still saw NoParent, the root itself does not exist and this
            // session cannot create it.
            return Err(AncestorError::RootMissing {
                path: path.to_string(),
            }
            .into());
        }
        debug!(path = %path, parent = %parent, "materializing ancestors");
        self.create_level(parent.to_string()).await
    }

    fn create_level(&self, path: String) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            let aux = self.session.auxiliary().await?;
            let out = aux
                .create(&path, Bytes::new(), NodeKind::Persistent)?
                .recv()
                .await?;
            match out.code {
                ReplyCode::Ok => {
                    info!(path = %path, "ancestor created");
                    Ok(out.value.unwrap_or(path))
                }
                ReplyCode::AlreadyExists => {
                    // Another actor won the race; the level exists either way.
                    debug!(path = %path, "ancestor already present");
                    Ok(path)
                }
                ReplyCode::NoParent => {
                    let parent = parent_of(&path);
                    if parent.is_empty() {
                        return Err(AncestorError::RootMissing { path }.into());
                    }
                    self.create_level(parent.to_string()).await?;
                    // Grandparents are in place now; retry this level once.
                    let retry = aux
                        .create(&path, Bytes::new(), NodeKind::Persistent)?
                        .recv()
                        .await?;
                    match retry.code {
                        ReplyCode::Ok | ReplyCode::AlreadyExists => Ok(path),
                        code => Err(AncestorError::Create { path, code }.into()),
                    }
                }
                code => Err(AncestorError::Create { path, code }.into()),
            }
        })
    }
}

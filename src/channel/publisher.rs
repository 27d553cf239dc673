use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, info};

use crate::errors::{ChannelError, Result};
use crate::reply::{NodeKind, NodeStat, ReplyCode, Version};
use crate::session::CoordinationSession;

/// Publishes configuration values as create-or-update, last writer wins.
///
/// Structural parents are the caller's responsibility; publishing under a
/// missing parent fails with `NoParent` rather than materializing ancestors.
pub struct ConfigPublisher {
    session: CoordinationSession,
}

/// What a publish did to the node.
#[derive(Debug)]
pub struct PublishReceipt {
    pub path: String,
    /// True when the node was created, false when an existing node was
    /// updated in place.
    pub created: bool,
    pub stat: Option<NodeStat>,
}

impl ConfigPublisher {
    pub fn new(session: CoordinationSession) -> Self {
        Self { session }
    }

    pub async fn publish<T: Serialize>(&self, value: &T, path: &str) -> Result<PublishReceipt> {
        self.session.ensure_connected().await?;
        let payload = Bytes::from(bincode::serialize(value).map_err(ChannelError::Encode)?);

        let out = self
            .session
            .create(path, payload.clone(), NodeKind::Persistent)?
            .recv()
            .await?;
        match out.code {
            ReplyCode::Ok => {
                info!(path = %path, bytes = payload.len(), "configuration node created");
                Ok(PublishReceipt {
                    path: out.value.unwrap_or_else(|| path.to_string()),
                    created: true,
                    stat: out.stat,
                })
            }
            ReplyCode::AlreadyExists => {
                debug!(path = %path, "node exists, updating");
                let updated = self
                    .session
                    .set_data(path, payload, Version::Any)?
                    .recv()
                    .await?;
                match updated.code {
                    ReplyCode::Ok => {
                        info!(path = %path, stat = ?updated.stat, "configuration updated");
                        Ok(PublishReceipt {
                            path: path.to_string(),
                            created: false,
                            stat: updated.stat,
                        })
                    }
                    code => Err(ChannelError::Publish {
                        path: path.to_string(),
                        code,
                    }
                    .into()),
                }
            }
            code => Err(ChannelError::Publish {
                path: path.to_string(),
                code,
            }
            .into()),
        }
    }
}

//! Control messages posted to the worker by pages.
//!
//! Wire format is JSON tagged by `type`:
//! `{"type":"GET_CACHE_SIZE"}` → `{"type":"CACHE_SIZE","size":3}`.

use std::sync::atomic::Ordering;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use leumas_core::Error;

use crate::manager::CacheManager;
use crate::state::WorkerState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Activate a waiting worker now, or as soon as a running install
    /// finishes. No reply.
    SkipWaiting,
    /// Count entries in the current store.
    GetCacheSize,
    /// Delete the current store.
    ClearCache,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlReply {
    CacheSize { size: usize },
    CacheCleared,
}

impl ControlMessage {
    pub fn parse(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| Error::InvalidInput(format!("unknown control message: {e}")))
    }

    pub fn expects_reply(&self) -> bool {
        !matches!(self, ControlMessage::SkipWaiting)
    }
}

impl CacheManager {
    /// Handle a control message, replying on `reply` when the message calls for it.
    ///
    /// Failures are logged and leave the port unanswered.
    pub async fn handle_message(&self, message: ControlMessage, reply: Option<oneshot::Sender<ControlReply>>) {
        tracing::debug!("control message {:?}", message);

        if message.expects_reply() && reply.is_none() {
            tracing::warn!("{:?} arrived without a reply port, ignoring", message);
            return;
        }

        let answer = match message {
            ControlMessage::SkipWaiting => {
                self.skip_waiting().await;
                return;
            }
            ControlMessage::GetCacheSize => self
                .storage
                .entry_count(&self.config.cache_version)
                .await
                .map(|size| ControlReply::CacheSize { size }),
            ControlMessage::ClearCache => self
                .storage
                .delete(&self.config.cache_version)
                .await
                .map(|_| ControlReply::CacheCleared),
        };

        match (answer, reply) {
            (Ok(answer), Some(port)) => {
                if port.send(answer).is_err() {
                    tracing::debug!("reply port for {:?} closed", message);
                }
            }
            (Ok(_), None) => {}
            (Err(e), _) => tracing::warn!("{:?} failed: {}", message, e),
        }
    }

    async fn skip_waiting(&self) {
        // set before reading the state so an install finishing in between sees it
        self.skip_requested.store(true, Ordering::SeqCst);
        match self.state().await {
            WorkerState::Installed => match self.activate().await {
                Ok(_) => {}
                // install activated first
                Err(Error::InvalidState(e)) => tracing::debug!("skip waiting: {}", e),
                Err(e) => tracing::warn!("skip waiting failed: {}", e),
            },
            WorkerState::Parsed | WorkerState::Installing => {
                tracing::debug!("skip waiting deferred until install completes");
            }
            _ => self.skip_requested.store(false, Ordering::SeqCst),
        }
    }

    /// Post a message and wait for its reply, if it has one.
    pub async fn post_message(&self, message: ControlMessage) -> Result<Option<ControlReply>, Error> {
        if !message.expects_reply() {
            self.handle_message(message, None).await;
            return Ok(None);
        }

        let (tx, rx) = oneshot::channel();
        self.handle_message(message, Some(tx)).await;
        rx.await
            .map(Some)
            .map_err(|_| Error::ReplyDropped(format!("{message:?} produced no reply")))
    }
}

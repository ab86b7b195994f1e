//! Progress reporting bound to in-flight requests.
//!
//! A tracker is started when a request carries `params._meta.progressToken`
//! and lives until the request finishes. Updates emit `$/progress`
//! notifications through the connection's outgoing sender; the writer task
//! serializes them with every other outbound frame. Tokens are unique per
//! `(connection, token)` while a tracker is alive.

use crate::connection::ConnectionId;
use crate::errors::ProgressError;
use crate::outgoing_message::OutgoingMessageSender;
use mcp_types::ModelContextProtocolNotification;
use mcp_types::ProgressNotification;
use mcp_types::ProgressNotificationParams;
use mcp_types::ProgressToken;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use tracing::debug;

/// Process-wide table of active progress tokens.
#[derive(Debug, Default)]
pub struct ProgressRegistry {
    active: Mutex<HashSet<(ConnectionId, ProgressToken)>>,
}

impl ProgressRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Claims `token` for the sender's connection and returns a tracker at
    /// progress 0.0. Re-using a token that is still in flight fails with
    /// [`ProgressError::TokenInUse`].
    pub fn start(
        self: &Arc<Self>,
        outgoing: Arc<OutgoingMessageSender>,
        token: ProgressToken,
        total: Option<f64>,
    ) -> Result<ProgressTracker, ProgressError> {
        let key = (outgoing.connection(), token.clone());
        if !self.lock_active().insert(key) {
            return Err(ProgressError::TokenInUse(token.to_string()));
        }
        Ok(ProgressTracker {
            registry: Arc::clone(self),
            outgoing,
            token,
            state: Mutex::new(TrackerState {
                progress: 0.0,
                total,
                closed: false,
            }),
        })
    }

    pub fn active_count(&self) -> usize {
        self.lock_active().len()
    }

    fn finish(&self, connection: ConnectionId, token: &ProgressToken) {
        self.lock_active().remove(&(connection, token.clone()));
    }

    fn lock_active(&self) -> MutexGuard<'_, HashSet<(ConnectionId, ProgressToken)>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug)]
struct TrackerState {
    progress: f64,
    total: Option<f64>,
    closed: bool,
}

/// Emits `$/progress` notifications for one token. Progress is
/// monotonically non-decreasing; `complete` emits a terminal notification
/// and closes the tracker.
#[derive(Debug)]
pub struct ProgressTracker {
    registry: Arc<ProgressRegistry>,
    outgoing: Arc<OutgoingMessageSender>,
    token: ProgressToken,
    state: Mutex<TrackerState>,
}

impl ProgressTracker {
    pub fn token(&self) -> &ProgressToken {
        &self.token
    }

    pub fn update(
        &self,
        progress: f64,
        message: Option<String>,
        total: Option<f64>,
    ) -> Result<(), ProgressError> {
        let params = {
            let mut state = self.lock_state();
            if state.closed {
                return Err(ProgressError::Closed);
            }
            if progress < state.progress {
                return Err(ProgressError::NonMonotonic {
                    previous: state.progress,
                    proposed: progress,
                });
            }
            if let Some(total) = total {
                state.total = Some(total);
            }
            if let Some(total) = state.total
                && progress > total
            {
                return Err(ProgressError::ExceedsTotal { progress, total });
            }
            state.progress = progress;
            ProgressNotificationParams {
                progress_token: self.token.clone(),
                progress,
                total: state.total,
                message,
            }
        };
        self.emit(&params);
        Ok(())
    }

    /// Emits a terminal notification and closes the tracker. Subsequent
    /// updates fail with [`ProgressError::Closed`].
    pub fn complete(&self) -> Result<(), ProgressError> {
        let params = {
            let mut state = self.lock_state();
            if state.closed {
                return Err(ProgressError::Closed);
            }
            state.closed = true;
            if let Some(total) = state.total {
                state.progress = total;
            }
            ProgressNotificationParams {
                progress_token: self.token.clone(),
                progress: state.progress,
                total: state.total,
                message: None,
            }
        };
        self.emit(&params);
        self.registry.finish(self.outgoing.connection(), &self.token);
        Ok(())
    }

    fn emit(&self, params: &ProgressNotificationParams) {
        match serde_json::to_value(params) {
            Ok(params) => {
                self.outgoing
                    .send_notification(ProgressNotification::METHOD, Some(params));
            }
            Err(err) => debug!("failed to serialize progress params: {err}"),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ProgressTracker {
    fn drop(&mut self) {
        // Frees the token even when the request ends without `complete`.
        self.registry.finish(self.outgoing.connection(), &self.token);
    }
}

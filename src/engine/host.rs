//! Control protocol between the hosting application and the engine.
//!
//! The host drives the engine through a cloneable [`EngineHandle`]:
//! requests travel over an mpsc channel into the engine loop, replies come
//! back on per-request oneshot channels. Shutdown is a cancellation token
//! rather than a message, so it cuts through a busy loop.

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::stats::StatsSnapshot;
use crate::settings::{SettingsError, UserSettings};

/// Requests the engine loop answers between turns.
pub(crate) enum HostMessage {
    Ping(oneshot::Sender<()>),
    GetStats(oneshot::Sender<StatsSnapshot>),
    SetEnabled(bool, oneshot::Sender<()>),
    UpdateSettings(UserSettings, oneshot::Sender<Result<(), SettingsError>>),
    Restart(oneshot::Sender<()>),
}

/// Errors talking to the engine.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// The engine loop has exited; no further requests will be answered.
    #[error("engine is no longer running")]
    EngineGone,

    /// The submitted settings failed validation and were not applied.
    #[error(transparent)]
    InvalidSettings(#[from] SettingsError),
}

/// Cloneable handle for controlling a running engine.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<HostMessage>,
    cancel: CancellationToken,
}

impl EngineHandle {
    pub(crate) fn new(tx: mpsc::Sender<HostMessage>, cancel: CancellationToken) -> Self {
        Self { tx, cancel }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> HostMessage,
    ) -> Result<T, HostError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| HostError::EngineGone)?;
        reply_rx.await.map_err(|_| HostError::EngineGone)
    }

    /// Liveness probe; resolves once the loop has taken a turn.
    pub async fn ping(&self) -> Result<(), HostError> {
        self.request(HostMessage::Ping).await
    }

    /// Snapshot of pipeline state and lifetime counters.
    pub async fn stats(&self) -> Result<StatsSnapshot, HostError> {
        self.request(HostMessage::GetStats).await
    }

    /// Enables or disables filtering.
    ///
    /// Disabling tears down overlays, clears the queue, and stops
    /// scanning; enabling starts from a fresh page scan.
    pub async fn set_enabled(&self, enabled: bool) -> Result<(), HostError> {
        self.request(|tx| HostMessage::SetEnabled(enabled, tx)).await
    }

    /// Replaces the user settings after validation.
    pub async fn update_settings(&self, settings: UserSettings) -> Result<(), HostError> {
        self.request(|tx| HostMessage::UpdateSettings(settings, tx))
            .await?
            .map_err(HostError::from)
    }

    /// Resets page-scoped state, as on a navigation.
    pub async fn restart(&self) -> Result<(), HostError> {
        self.request(HostMessage::Restart).await
    }

    /// Asks the engine loop to exit.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

use retrace_pacing::PacingError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    #[error(transparent)]
    Pacing(#[from] PacingError),

    #[error("failed to spawn frame worker: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("frame worker panicked: {0}")]
    WorkerPanicked(String),

    /// The worker's channels closed before it reported ready.
    #[error("frame worker exited before becoming ready")]
    WorkerUnavailable,

    #[error("failed to join frame worker thread")]
    Join,
}

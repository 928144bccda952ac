use thiserror::Error;

/// Failures raised while publishing a capture event.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("publish queue full, dropped message for {topic}")]
    QueueFull { topic: String },
    #[error("publisher already disconnected")]
    Disconnected,
    #[error("mqtt client error: {0}")]
    Client(String),
    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Per-tick failure taxonomy of the capture loop.
///
/// Only `SourceUnavailable` can end the loop, and only once the retry budget
/// is spent. Every other variant is logged and the loop moves on.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("image source unavailable: {0:#}")]
    SourceUnavailable(anyhow::Error),
    #[error("inference failed: {0:#}")]
    Inference(anyhow::Error),
    #[error(transparent)]
    Publish(#[from] PublishError),
    #[error("failed to persist frame: {0:#}")]
    Persistence(anyhow::Error),
}

impl PipelineError {
    /// True when the failure should trigger capture backoff.
    pub fn is_source_failure(&self) -> bool {
        matches!(self, PipelineError::SourceUnavailable(_))
    }
}

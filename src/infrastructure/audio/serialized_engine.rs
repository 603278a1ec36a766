use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{Semaphore, SemaphorePermit};

use crate::application::ports::{TranscriptionEngine, TranscriptionError};

/// Single-flight gate in front of the shared engine.
///
/// At most one inference is in flight; later callers queue in arrival order.
/// The inference deadline starts once the slot is held. Waiting for the slot
/// has its own, optional, deadline.
pub struct SerializedEngine {
    inner: Arc<dyn TranscriptionEngine>,
    slot: Semaphore,
    inference_timeout: Duration,
    queue_timeout: Option<Duration>,
}

impl SerializedEngine {
    pub fn new(inner: Arc<dyn TranscriptionEngine>, inference_timeout: Duration) -> Self {
        Self {
            inner,
            slot: Semaphore::new(1),
            inference_timeout,
            queue_timeout: None,
        }
    }

    /// Gives up with [`TranscriptionError::Timeout`] when the slot is not
    /// free within `queue_timeout`.
    pub fn with_queue_timeout(mut self, queue_timeout: Duration) -> Self {
        self.queue_timeout = Some(queue_timeout);
        self
    }

    async fn acquire_slot(&self) -> Result<SemaphorePermit<'_>, TranscriptionError> {
        let closed =
            |_| TranscriptionError::TranscriptionFailed("inference slot closed".to_string());

        let Some(queue_timeout) = self.queue_timeout else {
            return self.slot.acquire().await.map_err(closed);
        };

        match tokio::time::timeout(queue_timeout, self.slot.acquire()).await {
            Ok(permit) => permit.map_err(closed),
            Err(_) => {
                tracing::warn!(
                    engine = self.inner.name(),
                    queue_timeout_ms = queue_timeout.as_millis() as u64,
                    "Gave up waiting for inference slot"
                );
                Err(TranscriptionError::Timeout(queue_timeout))
            }
        }
    }
}

#[async_trait]
impl TranscriptionEngine for SerializedEngine {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn transcribe(
        &self,
        audio_path: &Path,
        language: &str,
    ) -> Result<String, TranscriptionError> {
        let queued_at = Instant::now();
        let _permit = self.acquire_slot().await?;

        tracing::debug!(
            engine = self.inner.name(),
            waited_ms = queued_at.elapsed().as_millis() as u64,
            "Acquired inference slot"
        );

        let started = Instant::now();
        let result = tokio::time::timeout(
            self.inference_timeout,
            self.inner.transcribe(audio_path, language),
        )
        .await;

        match result {
            Ok(outcome) => {
                tracing::debug!(
                    inference_ms = started.elapsed().as_millis() as u64,
                    ok = outcome.is_ok(),
                    "Inference finished"
                );
                outcome
            }
            Err(_) => {
                tracing::warn!(
                    engine = self.inner.name(),
                    timeout_ms = self.inference_timeout.as_millis() as u64,
                    "Inference deadline exceeded"
                );
                Err(TranscriptionError::Timeout(self.inference_timeout))
            }
        }
    }
}

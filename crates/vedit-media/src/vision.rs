//! Vision model capabilities.
//!
//! Embedding, detection and styling are external, possibly slow and fallible.
//! Implementations sit behind these traits; [`VisionModels`] bounds every call
//! with a timeout and turns failures into [`MediaError`]s.

use async_trait::async_trait;
use image::RgbImage;
use std::future::Future;
use std::sync::Arc;
use tracing::warn;

use vedit_models::Detection;

use crate::config::ModelConfig;
use crate::error::{MediaError, MediaResult};

/// Frame to fixed-length feature vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Deterministic for a given frame and model version.
    async fn embed(&self, frame: &RgbImage) -> MediaResult<Vec<f64>>;

    /// Provider name for logging.
    fn name(&self) -> &'static str;
}

/// Frame to object detections.
#[async_trait]
pub trait ObjectDetector: Send + Sync {
    async fn detect(&self, frame: &RgbImage) -> MediaResult<Vec<Detection>>;

    fn name(&self) -> &'static str;
}

/// Frame restyling, blended with the original by `strength`.
#[async_trait]
pub trait Stylizer: Send + Sync {
    async fn stylize(&self, frame: RgbImage, style: &str, strength: f64) -> MediaResult<RgbImage>;

    fn name(&self) -> &'static str;
}

/// The three capabilities, each call bounded by [`ModelConfig::call_timeout`].
#[derive(Clone)]
pub struct VisionModels {
    embedder: Arc<dyn Embedder>,
    detector: Arc<dyn ObjectDetector>,
    stylizer: Arc<dyn Stylizer>,
    config: ModelConfig,
}

impl VisionModels {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        detector: Arc<dyn ObjectDetector>,
        stylizer: Arc<dyn Stylizer>,
        config: ModelConfig,
    ) -> Self {
        Self {
            embedder,
            detector,
            stylizer,
            config,
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub async fn embed(&self, frame: &RgbImage) -> MediaResult<Vec<f64>> {
        let embedding = self
            .bounded("embedding", self.embedder.name(), self.embedder.embed(frame))
            .await?;
        if embedding.iter().any(|v| !v.is_finite()) {
            return Err(MediaError::model_failed(
                "embedding",
                format!("{} returned a non-finite embedding", self.embedder.name()),
            ));
        }
        Ok(embedding)
    }

    /// Detections strictly above the configured confidence.
    pub async fn detect(&self, frame: &RgbImage) -> MediaResult<Vec<Detection>> {
        let mut detections = self
            .bounded("detection", self.detector.name(), self.detector.detect(frame))
            .await?;
        let min_confidence = self.config.detection_confidence;
        detections.retain(|d| d.confidence > min_confidence);
        Ok(detections)
    }

    pub async fn stylize(&self, frame: RgbImage, style: &str, strength: f64) -> MediaResult<RgbImage> {
        let (width, height) = frame.dimensions();
        let styled = self
            .bounded(
                "style",
                self.stylizer.name(),
                self.stylizer.stylize(frame, style, strength.clamp(0.0, 1.0)),
            )
            .await?;
        if styled.dimensions() != (width, height) {
            return Err(MediaError::model_failed(
                "style",
                format!(
                    "{} changed frame size from {}x{} to {}x{}",
                    self.stylizer.name(),
                    width,
                    height,
                    styled.width(),
                    styled.height()
                ),
            ));
        }
        Ok(styled)
    }

    async fn bounded<T, F>(
        &self,
        capability: &'static str,
        provider: &'static str,
        call: F,
    ) -> MediaResult<T>
    where
        F: Future<Output = MediaResult<T>>,
    {
        let timeout = self.config.call_timeout;
        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(MediaError::ModelFailed { message, .. })) => {
                Err(MediaError::model_failed(capability, format!("{provider}: {message}")))
            }
            Ok(Err(e)) => Err(MediaError::model_failed(capability, format!("{provider}: {e}"))),
            Err(_) => {
                warn!(
                    capability,
                    provider,
                    timeout_secs = timeout.as_secs(),
                    "Vision model call timed out"
                );
                Err(MediaError::ModelTimeout {
                    capability,
                    secs: timeout.as_secs(),
                })
            }
        }
    }
}

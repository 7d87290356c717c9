//! Async facade over the diagnosis engine
//!
//! Feature extraction and inference are CPU-bound, so each request runs on
//! tokio's blocking pool and the async caller only awaits the result. The
//! engine, and with it every cached artifact, is shared across requests.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::config::DiagnosisConfig;
use crate::diagnosis::{DiagnosisEngine, DiagnosisResponse};
use crate::inference::TierStatus;
use crate::preprocess::RawImage;
use crate::utils::error::{DiagnosisError, Result};

/// Cloneable handle to a shared engine
#[derive(Clone)]
pub struct DiagnosisService {
    engine: Arc<DiagnosisEngine>,
}

impl DiagnosisService {
    pub fn new(engine: DiagnosisEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    pub fn from_config(config: &DiagnosisConfig) -> Result<Self> {
        Ok(Self::new(DiagnosisEngine::from_config(config)?))
    }

    pub fn engine(&self) -> &DiagnosisEngine {
        &self.engine
    }

    /// Diagnose one image on a blocking worker thread
    pub async fn diagnose(&self, bytes: Vec<u8>) -> Result<DiagnosisResponse> {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || {
            let image = RawImage::new(bytes);
            engine.diagnose(&image)
        })
        .await
        .map_err(|e| DiagnosisError::DiagnosisFailed(format!("Diagnosis task failed: {:?}", e)))?
    }

    /// Like `diagnose`, but stop waiting after `limit`
    ///
    /// The worker is not interrupted; its eventual result is discarded.
    pub async fn diagnose_with_timeout(
        &self,
        bytes: Vec<u8>,
        limit: Duration,
    ) -> Result<DiagnosisResponse> {
        match tokio::time::timeout(limit, self.diagnose(bytes)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Diagnosis timed out after {:?}", limit);
                Err(DiagnosisError::DiagnosisFailed(format!(
                    "timed out after {} ms",
                    limit.as_millis()
                )))
            }
        }
    }

    pub fn availability(&self) -> Vec<TierStatus> {
        self.engine.availability()
    }
}

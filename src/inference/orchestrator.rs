//! Inference Orchestrator
//!
//! Tries classifier tiers in priority order and returns the first success.
//! Each tier gets its own normalized image at its own input size, and each
//! tier is attempted at most once per request.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::DiagnosisConfig;
use crate::preprocess::{self, DecodedImage};
use crate::utils::error::{DiagnosisError, Result};
use crate::utils::StageTimer;

use super::{ClassifierTier, DeepTier, LightweightTier, PredictionResult, Tier};

/// Availability report for one tier
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierStatus {
    pub tier: Tier,
    pub available: bool,
    pub loaded: bool,
    pub input_size: u32,
}

/// Ordered fallback chain over classifier tiers
pub struct InferenceOrchestrator {
    tiers: Vec<Box<dyn ClassifierTier>>,
}

impl InferenceOrchestrator {
    /// Deep tier first, then lightweight
    pub fn from_config(config: &DiagnosisConfig) -> Self {
        Self::with_tiers(vec![
            Box::new(DeepTier::new(config.deep.clone())),
            Box::new(LightweightTier::new(config.lightweight.clone())),
        ])
    }

    /// Custom chain, tried in the given order
    pub fn with_tiers(tiers: Vec<Box<dyn ClassifierTier>>) -> Self {
        Self { tiers }
    }

    pub fn tiers(&self) -> impl Iterator<Item = &dyn ClassifierTier> {
        self.tiers.iter().map(|t| t.as_ref())
    }

    /// Per-tier availability, in priority order
    pub fn availability(&self) -> Vec<TierStatus> {
        self.tiers
            .iter()
            .map(|tier| TierStatus {
                tier: tier.tier(),
                available: tier.is_available(),
                loaded: tier.is_loaded(),
                input_size: tier.input_size(),
            })
            .collect()
    }

    /// Run the fallback chain on a decoded image
    ///
    /// Unavailable tiers are skipped and a failing tier falls through to the
    /// next one. Fails with `ModelUnavailable` when no tier was available and
    /// `DiagnosisFailed` when every available tier failed.
    pub fn classify(&self, image: &DecodedImage) -> Result<PredictionResult> {
        let mut failures = Vec::new();

        for tier in &self.tiers {
            let name = tier.tier();
            if !tier.is_available() {
                debug!("Skipping {} tier: artifacts not available", name);
                continue;
            }

            let size = tier.input_size();
            let normalized = preprocess::normalize(image, size, size)?;

            let timer = StageTimer::start("classify");
            match tier.classify(&normalized) {
                Ok(prediction) if !prediction.label.is_empty() => {
                    let elapsed = timer.finish();
                    info!(
                        "{} tier predicted {} ({:.3}) in {:.1}ms",
                        name, prediction.label, prediction.confidence, elapsed
                    );
                    return Ok(PredictionResult {
                        tier: name,
                        ..prediction
                    });
                }
                Ok(_) => {
                    warn!("{} tier returned an empty label, falling back", name);
                    failures.push(format!("{}: empty label", name));
                }
                Err(e) => {
                    warn!("{}, falling back", e);
                    failures.push(e.to_string());
                }
            }
        }

        if failures.is_empty() {
            Err(DiagnosisError::ModelUnavailable(
                "no classifier artifacts found".to_string(),
            ))
        } else {
            Err(DiagnosisError::DiagnosisFailed(failures.join("; ")))
        }
    }
}

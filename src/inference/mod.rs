//! Inference: classifier tiers and the fallback chain over them
//!
//! - [`deep`]: CNN over a 224x224 image
//! - [`lightweight`]: random forest over the 219-value feature vector
//! - [`orchestrator`]: tries tiers in priority order, first success wins
//! - [`artifact`]: lazy, once-only artifact loading shared across requests

pub mod artifact;
pub mod deep;
pub mod lightweight;
pub mod orchestrator;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::preprocess::NormalizedImage;
use crate::utils::error::Result;

pub use artifact::{ArtifactPaths, LazyArtifact};
pub use deep::{DeepModel, DeepTier};
pub use lightweight::{LightweightModel, LightweightTier};
pub use orchestrator::{InferenceOrchestrator, TierStatus};

/// Which classification strategy produced a prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Deep,
    Lightweight,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Deep => "deep",
            Tier::Lightweight => "lightweight",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one successful tier classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Predicted class label
    pub label: String,

    /// Probability of the predicted class, in [0, 1]
    pub confidence: f64,

    /// Provenance tag
    pub tier: Tier,
}

impl PredictionResult {
    pub fn new(label: impl Into<String>, confidence: f64, tier: Tier) -> Self {
        Self {
            label: label.into(),
            confidence,
            tier,
        }
    }
}

/// A classification strategy the orchestrator can fall back through
///
/// Implementations must be cheap to query for availability; loading the
/// actual artifact happens on the first `classify` call.
pub trait ClassifierTier: Send + Sync {
    /// Provenance tag for results of this tier
    fn tier(&self) -> Tier;

    /// Square input resolution this tier expects
    fn input_size(&self) -> u32;

    /// Whether the tier's artifacts are resolvable
    fn is_available(&self) -> bool;

    /// Whether the artifact has already been loaded into memory
    fn is_loaded(&self) -> bool {
        false
    }

    /// Classify an image already normalized to `input_size()`
    ///
    /// Any failure is reported as `DiagnosisError::InferenceFailure`.
    fn classify(&self, image: &NormalizedImage) -> Result<PredictionResult>;
}

//! Error Handling Module
//!
//! Defines the error taxonomy for plant disease diagnosis.
//! Uses thiserror for ergonomic error definitions.
//!
//! Only three variants ever leave the diagnosis pipeline: `ImageDecode`,
//! `ModelUnavailable` and `DiagnosisFailed`. `InferenceFailure` belongs to a
//! single classifier tier and is absorbed by the orchestrator.

use thiserror::Error;

use crate::inference::Tier;

/// Main error type for diagnosis operations
#[derive(Error, Debug)]
pub enum DiagnosisError {
    /// Input bytes are not a decodable image, or decode to zero area
    #[error("Failed to decode image: {0}")]
    ImageDecode(String),

    /// No classifier artifact is present at all
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// One tier failed internally (missing/broken artifact, malformed input, runtime error)
    #[error("{tier} tier inference failed: {reason}")]
    InferenceFailure { tier: Tier, reason: String },

    /// Artifacts were present but every tier failed
    #[error("Diagnosis failed: {0}")]
    DiagnosisFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// How an error should be surfaced to whoever called the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed request; retrying the same input will not help
    Client,
    /// No usable model is installed
    Unavailable,
    /// Internal failure
    Server,
}

impl DiagnosisError {
    /// Shorthand for building an `InferenceFailure`
    pub fn inference(tier: Tier, reason: impl Into<String>) -> Self {
        DiagnosisError::InferenceFailure {
            tier,
            reason: reason.into(),
        }
    }

    /// Classify the error for the caller
    pub fn category(&self) -> ErrorCategory {
        match self {
            DiagnosisError::ImageDecode(_) => ErrorCategory::Client,
            DiagnosisError::ModelUnavailable(_) => ErrorCategory::Unavailable,
            _ => ErrorCategory::Server,
        }
    }
}

impl From<serde_json::Error> for DiagnosisError {
    fn from(err: serde_json::Error) -> Self {
        DiagnosisError::Serialization(err.to_string())
    }
}

/// Convenience Result type for diagnosis operations
pub type Result<T> = std::result::Result<T, DiagnosisError>;

/// Extension trait for attributing errors to a classifier tier
pub trait ResultExt<T> {
    /// Convert the error into an `InferenceFailure` of `tier`
    fn tier_context(self, tier: Tier, msg: &str) -> Result<T>;

    /// Same as `tier_context`, with a lazily built message
    fn with_tier_context<F: FnOnce() -> String>(self, tier: Tier, f: F) -> Result<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for std::result::Result<T, E> {
    fn tier_context(self, tier: Tier, msg: &str) -> Result<T> {
        self.map_err(|e| DiagnosisError::inference(tier, format!("{}: {}", msg, e)))
    }

    fn with_tier_context<F: FnOnce() -> String>(self, tier: Tier, f: F) -> Result<T> {
        self.map_err(|e| DiagnosisError::inference(tier, format!("{}: {}", f(), e)))
    }
}

impl<T> ResultExt<T> for Option<T> {
    fn tier_context(self, tier: Tier, msg: &str) -> Result<T> {
        self.ok_or_else(|| DiagnosisError::inference(tier, msg))
    }

    fn with_tier_context<F: FnOnce() -> String>(self, tier: Tier, f: F) -> Result<T> {
        self.ok_or_else(|| DiagnosisError::inference(tier, f()))
    }
}

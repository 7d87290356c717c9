//! # Plant Diagnosis
//!
//! Plant disease diagnosis from a single leaf photograph.
//!
//! ## Features
//!
//! - **Two classifier tiers** tried in priority order: a Burn CNN over the
//!   224x224 image, then a random forest over a 219-value hand-crafted
//!   feature vector computed from a 128x128 image
//! - **Lazy artifact loading**: each tier loads its model on first use and
//!   shares it across concurrent requests
//! - **Advisory lookup** with treatment, symptoms, prevention and economic
//!   impact for every label, and a generic record for unknown ones
//! - **Severity** derived from confidence (`> 0.8` high, `> 0.6` medium)
//!
//! ## Modules
//!
//! - `preprocess`: decode and resize uploaded bytes
//! - `features`: the lightweight tier's feature vector
//! - `model`: CNN architecture, random forest, label files
//! - `inference`: classifier tiers and the fallback orchestrator
//! - `advisory`: label -> guidance table
//! - `diagnosis`: severity, result assembly, the end-to-end engine
//! - `service`: async wrapper running diagnoses on worker threads
//! - `config`, `backend`, `utils`: configuration, Burn backend, errors and logging
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use plant_diagnosis::{DiagnosisConfig, DiagnosisEngine};
//!
//! let engine = DiagnosisEngine::from_config(&DiagnosisConfig::from_models_dir("models"))?;
//! let response = engine.diagnose_bytes(std::fs::read("leaf.jpg")?)?;
//! println!("{} ({})", response.disease, response.severity);
//! ```

pub mod advisory;
pub mod backend;
pub mod config;
pub mod diagnosis;
pub mod features;
pub mod inference;
pub mod model;
pub mod preprocess;
pub mod service;
pub mod utils;

// Re-export commonly used items for convenience
pub use advisory::{AdvisoryMatch, AdvisoryRecord, AdvisoryTable};
pub use config::{DeepTierConfig, DiagnosisConfig, LightweightTierConfig};
pub use diagnosis::{assemble, DiagnosisEngine, DiagnosisResponse, Severity};
pub use features::{FeatureVector, FEATURE_VECTOR_LEN};
pub use inference::{ClassifierTier, InferenceOrchestrator, PredictionResult, Tier};
pub use preprocess::{NormalizedImage, RawImage};
pub use service::DiagnosisService;
pub use utils::error::{DiagnosisError, ErrorCategory, Result};

/// Input resolution of the deep tier
pub const DEEP_INPUT_SIZE: u32 = 224;

/// Input resolution of the lightweight tier
pub const LIGHTWEIGHT_INPUT_SIZE: u32 = 128;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

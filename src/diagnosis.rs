//! Result Assembler and the end-to-end diagnosis engine
//!
//! `DiagnosisEngine` owns the process-lifetime state (tier chain with its
//! lazily loaded artifacts, advisory table) and turns raw bytes into a
//! `DiagnosisResponse`.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::advisory::{AdvisoryRecord, AdvisoryTable};
use crate::config::DiagnosisConfig;
use crate::inference::{InferenceOrchestrator, PredictionResult, Tier, TierStatus};
use crate::preprocess::RawImage;
use crate::utils::error::Result;
use crate::utils::StageTimer;

/// Above this confidence a diagnosis is high severity
pub const HIGH_SEVERITY_THRESHOLD: f64 = 0.8;

/// Above this confidence (and up to the high threshold) it is medium
pub const MEDIUM_SEVERITY_THRESHOLD: f64 = 0.6;

/// Categorical bucket derived from confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// `> 0.8` high, `> 0.6` medium, anything else (including NaN) low
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence > HIGH_SEVERITY_THRESHOLD {
            Severity::High
        } else if confidence > MEDIUM_SEVERITY_THRESHOLD {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The externally observable result of one diagnosis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisResponse {
    /// Predicted label
    pub disease: String,
    pub confidence: f64,
    pub severity: Severity,
    #[serde(flatten)]
    pub advisory: AdvisoryRecord,
    /// Tier that produced the prediction
    pub model: Tier,
    /// False when the label had no table entry and the fallback was used
    pub advisory_matched: bool,
}

/// Combine a prediction with its severity and advisory record
pub fn assemble(prediction: PredictionResult, table: &AdvisoryTable) -> DiagnosisResponse {
    let found = table.lookup(&prediction.label);
    DiagnosisResponse {
        severity: Severity::from_confidence(prediction.confidence),
        advisory: found.record().clone(),
        advisory_matched: found.is_known(),
        model: prediction.tier,
        confidence: prediction.confidence,
        disease: prediction.label,
    }
}

/// Bytes-to-diagnosis pipeline with process-lifetime state
pub struct DiagnosisEngine {
    orchestrator: InferenceOrchestrator,
    advisory: AdvisoryTable,
}

impl DiagnosisEngine {
    pub fn new(orchestrator: InferenceOrchestrator, advisory: AdvisoryTable) -> Self {
        Self {
            orchestrator,
            advisory,
        }
    }

    /// Build the standard tier chain and advisory table from `config`
    ///
    /// Missing model artifacts are not an error here; they surface per
    /// request as fallback or `ModelUnavailable`.
    pub fn from_config(config: &DiagnosisConfig) -> Result<Self> {
        config.validate()?;

        let advisory = match &config.advisory_path {
            Some(path) => AdvisoryTable::load(path)?,
            None => AdvisoryTable::builtin(),
        };
        let orchestrator = InferenceOrchestrator::from_config(config);

        for status in orchestrator.availability() {
            info!(
                "{} tier: {}",
                status.tier,
                if status.available { "available" } else { "not installed" }
            );
        }
        Ok(Self::new(orchestrator, advisory))
    }

    /// Decode, classify and assemble
    ///
    /// Decoding happens before any tier runs, so undecodable input fails
    /// with `ImageDecode` even when no model is installed.
    #[instrument(skip_all, fields(bytes = image.len()))]
    pub fn diagnose(&self, image: &RawImage) -> Result<DiagnosisResponse> {
        let timer = StageTimer::start("decode");
        let decoded = image.decode()?;
        timer.finish();

        let prediction = self.orchestrator.classify(&decoded)?;
        let response = assemble(prediction, &self.advisory);

        info!(
            "Diagnosis: {} ({:.1}%, {} severity, {} tier)",
            response.disease,
            response.confidence * 100.0,
            response.severity,
            response.model
        );
        Ok(response)
    }

    pub fn diagnose_bytes(&self, bytes: Vec<u8>) -> Result<DiagnosisResponse> {
        self.diagnose(&RawImage::new(bytes))
    }

    pub fn availability(&self) -> Vec<TierStatus> {
        self.orchestrator.availability()
    }

    pub fn advisory(&self) -> &AdvisoryTable {
        &self.advisory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::lightweight::tests::install_forest;
    use crate::preprocess::encode_png;
    use crate::utils::error::DiagnosisError;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_severity_mapping() {
        assert_eq!(Severity::from_confidence(0.85), Severity::High);
        assert_eq!(Severity::from_confidence(0.70), Severity::Medium);
        assert_eq!(Severity::from_confidence(0.50), Severity::Low);
    }

    #[test]
    fn test_severity_boundaries_are_exclusive() {
        assert_eq!(Severity::from_confidence(0.8), Severity::Medium);
        assert_eq!(Severity::from_confidence(0.6), Severity::Low);
        assert_eq!(Severity::from_confidence(1.0), Severity::High);
        assert_eq!(Severity::from_confidence(0.0), Severity::Low);
        assert_eq!(Severity::from_confidence(f64::NAN), Severity::Low);
    }

    #[test]
    fn test_widened_single_precision_confidence() {
        // The deep tier's f32 probabilities sit just above the f64 cuts
        assert_eq!(Severity::from_confidence(0.8f32 as f64), Severity::High);
        assert_eq!(Severity::from_confidence(0.6f32 as f64), Severity::Medium);
    }

    #[test]
    fn test_severity_is_monotonic() {
        let mut previous = Severity::Low;
        for step in 0..=100 {
            let severity = Severity::from_confidence(step as f64 / 100.0);
            assert!(severity >= previous);
            previous = severity;
        }
    }

    #[test]
    fn test_assemble_known_label() {
        let prediction = PredictionResult::new("leaf_blight", 0.90, Tier::Deep);
        let response = assemble(prediction, &AdvisoryTable::builtin());

        assert_eq!(response.severity, Severity::High);
        assert!(response.advisory.treatment.starts_with("Apply copper-based fungicide"));
        assert_eq!(response.advisory.affected_part, "leaf");
        assert!(response.advisory_matched);
        assert_eq!(response.model, Tier::Deep);
    }

    #[test]
    fn test_assemble_unknown_label() {
        let prediction = PredictionResult::new("made_up_disease", 0.65, Tier::Lightweight);
        let response = assemble(prediction, &AdvisoryTable::builtin());

        assert_eq!(response.disease, "made_up_disease");
        assert_eq!(response.severity, Severity::Medium);
        assert_eq!(response.advisory.treatment, "Consult agricultural expert");
        assert_eq!(response.advisory.affected_part, "unknown");
        assert_eq!(response.advisory.symptoms, vec!["Symptoms not specified"]);
        assert!(!response.advisory_matched);
    }

    #[test]
    fn test_response_wire_shape() {
        let prediction = PredictionResult::new("scab", 0.5, Tier::Lightweight);
        let json = serde_json::to_value(assemble(prediction, &AdvisoryTable::builtin())).unwrap();

        assert_eq!(json["disease"], "scab");
        assert_eq!(json["severity"], "low");
        assert_eq!(json["model"], "lightweight");
        assert_eq!(json["affectedPart"], "fruit_leaf");
        assert_eq!(json["advisoryMatched"], true);
        assert!(json["preventiveMeasures"].is_array());
        assert!(json["economicImpact"].is_string());
    }

    fn png(color: [u8; 3]) -> Vec<u8> {
        encode_png(&RgbImage::from_pixel(320, 240, Rgb(color))).unwrap()
    }

    #[test]
    fn test_engine_without_models() {
        let dir = tempfile::tempdir().unwrap();
        let engine = DiagnosisEngine::from_config(&DiagnosisConfig::from_models_dir(dir.path())).unwrap();

        let err = engine.diagnose_bytes(png([30, 150, 40])).unwrap_err();
        assert!(matches!(err, DiagnosisError::ModelUnavailable(_)));
    }

    #[test]
    fn test_engine_rejects_undecodable_bytes_first() {
        let dir = tempfile::tempdir().unwrap();
        let engine = DiagnosisEngine::from_config(&DiagnosisConfig::from_models_dir(dir.path())).unwrap();

        let err = engine.diagnose_bytes(b"not an image".to_vec()).unwrap_err();
        assert!(matches!(err, DiagnosisError::ImageDecode(_)));
    }

    #[test]
    fn test_engine_lightweight_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        install_forest(dir.path());
        let engine = DiagnosisEngine::from_config(&DiagnosisConfig::from_models_dir(dir.path())).unwrap();

        let response = engine.diagnose_bytes(png([210, 190, 30])).unwrap();
        assert_eq!(response.disease, "leaf_spot");
        assert_eq!(response.model, Tier::Lightweight);
        assert_eq!(response.severity, Severity::Medium);
        assert_eq!(response.advisory.affected_part, "leaf");
        assert!(response.advisory_matched);
    }

    #[test]
    fn test_engine_with_advisory_override() {
        let dir = tempfile::tempdir().unwrap();
        install_forest(dir.path());
        let advisory_path = dir.path().join("advisory.json");
        std::fs::write(
            &advisory_path,
            r#"{"leaf_spot": {"treatment": "Local advice", "affectedPart": "leaf",
                "symptoms": [], "preventiveMeasures": [], "economicImpact": "Low"}}"#,
        )
        .unwrap();

        let config = DiagnosisConfig::from_models_dir(dir.path()).with_advisory_path(&advisory_path);
        let engine = DiagnosisEngine::from_config(&config).unwrap();

        let response = engine.diagnose_bytes(png([210, 190, 30])).unwrap();
        assert_eq!(response.advisory.treatment, "Local advice");
    }
}

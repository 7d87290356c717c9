//! Lightweight tier: random forest over the extracted feature vector

use tracing::{debug, info};

use crate::config::LightweightTierConfig;
use crate::features::{self, FEATURE_VECTOR_LEN};
use crate::model::{LabelMap, RandomForest};
use crate::preprocess::NormalizedImage;
use crate::utils::argmax;
use crate::utils::error::{DiagnosisError, Result, ResultExt};
use crate::LIGHTWEIGHT_INPUT_SIZE;

use super::{ArtifactPaths, ClassifierTier, LazyArtifact, PredictionResult, Tier};

/// Loaded forest plus its parallel label list
#[derive(Debug, Clone)]
pub struct LightweightModel {
    forest: RandomForest,
    labels: LabelMap,
}

impl LightweightModel {
    /// Pair a forest with its labels, checking they agree
    pub fn new(forest: RandomForest, labels: LabelMap) -> Result<Self> {
        if forest.n_features() != FEATURE_VECTOR_LEN {
            return Err(DiagnosisError::inference(
                Tier::Lightweight,
                format!(
                    "forest expects {} features, extractor produces {}",
                    forest.n_features(),
                    FEATURE_VECTOR_LEN
                ),
            ));
        }
        if let Some(&bad) = forest.classes().iter().find(|&&c| c >= labels.len()) {
            return Err(DiagnosisError::inference(
                Tier::Lightweight,
                format!("class {} has no entry in a {}-label list", bad, labels.len()),
            ));
        }
        Ok(Self { forest, labels })
    }

    pub fn load(paths: &ArtifactPaths) -> Result<Self> {
        let weights = paths.resolved_weights().ok_or_else(|| {
            DiagnosisError::inference(
                Tier::Lightweight,
                format!("forest not found at {:?}", paths.weights),
            )
        })?;

        let forest = RandomForest::load(&weights)
            .tier_context(Tier::Lightweight, "Failed to load forest")?;
        let labels = LabelMap::load(paths.labels())
            .tier_context(Tier::Lightweight, "Failed to load label list")?;

        let model = Self::new(forest, labels)?;
        info!(
            "Loaded lightweight model from {:?} ({} labels)",
            weights,
            model.labels.len()
        );
        Ok(model)
    }

    pub fn labels(&self) -> &LabelMap {
        &self.labels
    }

    /// Hard prediction, with confidence read from the probability of that
    /// same class
    pub fn predict(&self, image: &NormalizedImage) -> Result<PredictionResult> {
        let features = features::extract(image);

        let proba = self
            .forest
            .predict_proba(features.as_slice())
            .tier_context(Tier::Lightweight, "Prediction failed")?;

        let column = argmax(&proba);
        let class_index = self.forest.classes()[column];
        let confidence = proba[column];

        let label = self
            .labels
            .get(class_index)
            .filter(|label| !label.is_empty())
            .with_tier_context(Tier::Lightweight, || {
                format!("no label for class index {}", class_index)
            })?;

        debug!(
            "Lightweight tier: class {} ({}) p={:.4}",
            class_index, label, confidence
        );
        Ok(PredictionResult::new(label, confidence, Tier::Lightweight))
    }
}

/// Lightweight classifier tier with a lazily loaded forest
pub struct LightweightTier {
    config: LightweightTierConfig,
    model: LazyArtifact<LightweightModel>,
}

impl LightweightTier {
    pub fn new(config: LightweightTierConfig) -> Self {
        Self {
            config,
            model: LazyArtifact::new(),
        }
    }

    pub fn with_model(config: LightweightTierConfig, model: LightweightModel) -> Self {
        Self {
            config,
            model: LazyArtifact::loaded(model),
        }
    }

    pub fn paths(&self) -> &ArtifactPaths {
        &self.config.paths
    }
}

impl ClassifierTier for LightweightTier {
    fn tier(&self) -> Tier {
        Tier::Lightweight
    }

    fn input_size(&self) -> u32 {
        LIGHTWEIGHT_INPUT_SIZE
    }

    fn is_available(&self) -> bool {
        self.config.enabled && (self.model.is_loaded() || self.config.paths.is_present())
    }

    fn is_loaded(&self) -> bool {
        self.model.is_loaded()
    }

    fn classify(&self, image: &NormalizedImage) -> Result<PredictionResult> {
        let model = self
            .model
            .get_or_try_load(|| LightweightModel::load(&self.config.paths))?;
        model.predict(image)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::advisory::AdvisoryTable;
    use crate::config::DiagnosisConfig;
    use crate::diagnosis::{assemble, Severity};
    use crate::features::layout;
    use crate::model::DecisionTree;
    use image::{Rgb, RgbImage};
    use std::path::Path;

    /// One-split forest: yellow_ratio <= 0.5 -> "healthy", else "leaf_spot"
    /// Split on yellow_ratio <= 0.5 with the given leaf weights
    fn yellow_stump(healthy_leaf: [f64; 2], yellow_leaf: [f64; 2]) -> DecisionTree {
        DecisionTree {
            children_left: vec![1, -1, -1],
            children_right: vec![2, -1, -1],
            feature: vec![layout::YELLOW_RATIO as i64, -2, -2],
            threshold: vec![0.5, -2.0, -2.0],
            value: vec![vec![5.0, 5.0], healthy_leaf.to_vec(), yellow_leaf.to_vec()],
        }
    }

    pub(crate) fn yellow_forest() -> RandomForest {
        RandomForest::new(
            FEATURE_VECTOR_LEN,
            vec![0, 1],
            vec![yellow_stump([9.0, 1.0], [2.0, 8.0])],
        )
        .unwrap()
    }

    pub(crate) fn install_forest(dir: &Path) -> LightweightTierConfig {
        let config = DiagnosisConfig::from_models_dir(dir).lightweight;
        std::fs::create_dir_all(dir.join("lightweight")).unwrap();
        std::fs::write(
            &config.paths.weights,
            serde_json::to_string(&yellow_forest()).unwrap(),
        )
        .unwrap();
        std::fs::write(&config.paths.labels, r#"["healthy", "leaf_spot"]"#).unwrap();
        config
    }

    fn uniform(color: [u8; 3]) -> NormalizedImage {
        NormalizedImage::from_rgb(RgbImage::from_pixel(128, 128, Rgb(color)))
    }

    fn labels() -> LabelMap {
        LabelMap::new(vec!["healthy".into(), "leaf_spot".into()])
    }

    #[test]
    fn test_predict_green_and_yellow() {
        let model = LightweightModel::new(yellow_forest(), labels()).unwrap();

        let green = model.predict(&uniform([40, 160, 40])).unwrap();
        assert_eq!(green.label, "healthy");
        assert!((green.confidence - 0.9).abs() < 1e-6);
        assert_eq!(green.tier, Tier::Lightweight);

        let yellow = model.predict(&uniform([200, 200, 40])).unwrap();
        assert_eq!(yellow.label, "leaf_spot");
        assert!((yellow.confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_averaged_confidence_keeps_double_precision() {
        // 3 * 0.8 / 3 lands just above 0.8 in f64; narrowing to f32 would
        // round it back onto the threshold and drop it to medium
        let stump = yellow_stump([8.0, 2.0], [8.0, 2.0]);
        let forest =
            RandomForest::new(FEATURE_VECTOR_LEN, vec![0, 1], vec![stump.clone(), stump.clone(), stump])
                .unwrap();
        let model = LightweightModel::new(forest, labels()).unwrap();

        let prediction = model.predict(&uniform([40, 160, 40])).unwrap();
        assert_eq!(prediction.label, "healthy");
        assert_eq!(prediction.confidence, (0.8 + 0.8 + 0.8) / 3.0);
        assert!(prediction.confidence > 0.8);

        let response = assemble(prediction, &AdvisoryTable::builtin());
        assert_eq!(response.severity, Severity::High);
    }

    #[test]
    fn test_rejects_feature_count_mismatch() {
        let forest = RandomForest::new(10, vec![0, 1], vec![{
            let mut stump = yellow_stump([9.0, 1.0], [2.0, 8.0]);
            stump.feature[0] = 3;
            stump
        }])
        .unwrap();
        assert!(LightweightModel::new(forest, labels()).is_err());
    }

    #[test]
    fn test_rejects_class_outside_label_list() {
        let forest = RandomForest::new(
            FEATURE_VECTOR_LEN,
            vec![0, 4],
            vec![yellow_stump([9.0, 1.0], [2.0, 8.0])],
        )
        .unwrap();
        assert!(LightweightModel::new(forest, labels()).is_err());
    }

    #[test]
    fn test_empty_label_is_a_failure() {
        let labels = LabelMap::new(vec!["healthy".into(), String::new()]);
        let model = LightweightModel::new(yellow_forest(), labels).unwrap();
        let err = model.predict(&uniform([200, 200, 40])).unwrap_err();
        assert!(matches!(
            err,
            DiagnosisError::InferenceFailure { tier: Tier::Lightweight, .. }
        ));
    }

    #[test]
    fn test_tier_loads_lazily_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let tier = LightweightTier::new(install_forest(dir.path()));

        assert!(tier.is_available());
        assert!(!tier.is_loaded());

        let prediction = tier.classify(&uniform([200, 200, 40])).unwrap();
        assert_eq!(prediction.label, "leaf_spot");
        assert!(tier.is_loaded());
    }

    #[test]
    fn test_tier_unavailable_without_files() {
        let dir = tempfile::tempdir().unwrap();
        let tier = LightweightTier::new(DiagnosisConfig::from_models_dir(dir.path()).lightweight);
        assert!(!tier.is_available());
        assert!(tier.classify(&uniform([0, 0, 0])).is_err());
    }
}

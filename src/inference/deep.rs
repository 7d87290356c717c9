//! Deep tier: CNN over the 224x224 image
//!
//! Pixels are scaled to [0, 1] with no further normalization and laid out
//! channel-first as `[1, 3, 224, 224]`. The prediction is the arg-max of the
//! softmax output, mapped through the label file.

use std::path::Path;
use std::sync::Mutex;

use burn::{module::Module, record::CompactRecorder, tensor::backend::Backend, tensor::Tensor};
use tracing::{debug, info};

use crate::backend::{default_device, DefaultBackend};
use crate::config::DeepTierConfig;
use crate::model::{LabelMap, LeafDiseaseNet, LeafDiseaseNetConfig};
use crate::preprocess::NormalizedImage;
use crate::utils::argmax;
use crate::utils::error::{DiagnosisError, Result, ResultExt};
use crate::DEEP_INPUT_SIZE;

use super::{ArtifactPaths, ClassifierTier, LazyArtifact, PredictionResult, Tier};

/// Loaded network plus its label mapping
pub struct DeepModel<B: Backend> {
    // Modules are Send but not Sync; forward passes run on a clone
    network: Mutex<LeafDiseaseNet<B>>,
    labels: LabelMap,
    device: B::Device,
}

impl<B: Backend> DeepModel<B> {
    pub fn new(network: LeafDiseaseNet<B>, labels: LabelMap, device: B::Device) -> Self {
        Self {
            network: Mutex::new(network),
            labels,
            device,
        }
    }

    /// Rebuild the architecture from `config` and load the trained record
    pub fn load(config: &DeepTierConfig, device: &B::Device) -> Result<Self> {
        let paths = &config.paths;
        let weights = paths.resolved_weights().ok_or_else(|| {
            DiagnosisError::inference(
                Tier::Deep,
                format!("weights not found at {:?}", paths.weights),
            )
        })?;

        let labels = LabelMap::load(paths.labels())
            .tier_context(Tier::Deep, "Failed to load label mapping")?;

        let network = LeafDiseaseNetConfig::new(labels.len())
            .with_base_filters(config.base_filters)
            .with_hidden_units(config.hidden_units)
            .with_dropout_rate(config.dropout_rate)
            .init::<B>(device);

        let recorder = CompactRecorder::new();
        let network = network
            .load_file(&weights, &recorder, device)
            .map_err(|e| DiagnosisError::inference(Tier::Deep, format!("Failed to load model: {:?}", e)))?;

        info!("Loaded deep model from {:?} ({} classes)", weights, labels.len());
        Ok(Self::new(network, labels, device.clone()))
    }

    pub fn labels(&self) -> &LabelMap {
        &self.labels
    }

    /// Softmax distribution over the label mapping
    pub fn probabilities(&self, image: &NormalizedImage) -> Result<Vec<f32>> {
        let (width, height) = image.dimensions();
        let data = image.to_chw_unit();
        let input = Tensor::<B, 1>::from_floats(&data[..], &self.device).reshape([
            1,
            3,
            height as usize,
            width as usize,
        ]);

        let network = self
            .network
            .lock()
            .map_err(|_| DiagnosisError::inference(Tier::Deep, "model lock poisoned"))?
            .clone();

        let probs: Vec<f32> = network
            .forward_softmax(input)
            .into_data()
            .to_vec()
            .map_err(|e| DiagnosisError::inference(Tier::Deep, format!("{:?}", e)))?;

        if probs.len() != self.labels.len() {
            return Err(DiagnosisError::inference(
                Tier::Deep,
                format!(
                    "model produced {} scores for {} labels",
                    probs.len(),
                    self.labels.len()
                ),
            ));
        }
        Ok(probs)
    }

    /// Arg-max label and its probability
    pub fn predict(&self, image: &NormalizedImage) -> Result<PredictionResult> {
        let probs = self.probabilities(image)?;
        let index = argmax(&probs);
        // Widened so severity cuts compare in double precision
        let confidence = probs[index] as f64;

        if !confidence.is_finite() {
            return Err(DiagnosisError::inference(Tier::Deep, "non-finite model output"));
        }

        let label = self
            .labels
            .get(index)
            .filter(|label| !label.is_empty())
            .with_tier_context(Tier::Deep, || format!("no label for class index {}", index))?;

        debug!("Deep tier: class {} ({}) p={:.4}", index, label, confidence);
        Ok(PredictionResult::new(label, confidence, Tier::Deep))
    }
}

/// Deep classifier tier with lazily loaded weights
pub struct DeepTier {
    config: DeepTierConfig,
    model: LazyArtifact<DeepModel<DefaultBackend>>,
}

impl DeepTier {
    pub fn new(config: DeepTierConfig) -> Self {
        Self {
            config,
            model: LazyArtifact::new(),
        }
    }

    /// Tier around an already loaded model
    pub fn with_model(config: DeepTierConfig, model: DeepModel<DefaultBackend>) -> Self {
        Self {
            config,
            model: LazyArtifact::loaded(model),
        }
    }

    pub fn paths(&self) -> &ArtifactPaths {
        &self.config.paths
    }
}

impl ClassifierTier for DeepTier {
    fn tier(&self) -> Tier {
        Tier::Deep
    }

    fn input_size(&self) -> u32 {
        DEEP_INPUT_SIZE
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
            .get_or_try_load(|| DeepModel::load(&self.config, &default_device()))?;
        model.predict(image)
    }
}

/// Persist a network in the record format `DeepModel::load` reads
pub fn save_network<B: Backend>(network: LeafDiseaseNet<B>, path: &Path) -> Result<()> {
    network
        .save_file(path, &CompactRecorder::new())
        .map_err(|e| DiagnosisError::Io(std::io::Error::other(format!("{:?}", e))))
}

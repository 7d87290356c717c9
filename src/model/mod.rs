//! Model artifacts for both classifier tiers
//!
//! - [`cnn`]: the deep-tier network rebuilt before its weights are loaded
//! - [`forest`]: the lightweight-tier random forest
//! - [`labels`]: index -> label tables shared by both

pub mod cnn;
pub mod forest;
pub mod labels;

pub use cnn::{LeafDiseaseNet, LeafDiseaseNetConfig};
pub use forest::{DecisionTree, RandomForest};
pub use labels::LabelMap;

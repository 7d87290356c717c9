//! Advisory Lookup
//!
//! A read-only table of agronomic guidance keyed by class label. Lookup is
//! total: a label with no entry resolves to the generic fallback record, and
//! the result says which of the two happened.
//!
//! The built-in records cover the labels the bundled models emit. A JSON file
//! of the form `{"label": {treatment, affectedPart, ...}}` can add labels or
//! replace built-in records without code changes.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::utils::error::Result;

/// Guidance for one disease label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvisoryRecord {
    pub treatment: String,
    pub affected_part: String,
    pub symptoms: Vec<String>,
    pub preventive_measures: Vec<String>,
    pub economic_impact: String,
}

impl AdvisoryRecord {
    fn from_static(
        treatment: &str,
        affected_part: &str,
        symptoms: &[&str],
        preventive_measures: &[&str],
        economic_impact: &str,
    ) -> Self {
        Self {
            treatment: treatment.to_string(),
            affected_part: affected_part.to_string(),
            symptoms: symptoms.iter().map(|s| s.to_string()).collect(),
            preventive_measures: preventive_measures.iter().map(|s| s.to_string()).collect(),
            economic_impact: economic_impact.to_string(),
        }
    }

    /// Record returned for labels the table does not know
    pub fn fallback() -> Self {
        Self::from_static(
            "Consult agricultural expert",
            "unknown",
            &["Symptoms not specified"],
            &["Follow good agricultural practices"],
            "Economic impact varies",
        )
    }
}

/// Outcome of a lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvisoryMatch<'a> {
    Known(&'a AdvisoryRecord),
    Fallback(&'a AdvisoryRecord),
}

impl<'a> AdvisoryMatch<'a> {
    pub fn record(&self) -> &'a AdvisoryRecord {
        match *self {
            AdvisoryMatch::Known(record) | AdvisoryMatch::Fallback(record) => record,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, AdvisoryMatch::Known(_))
    }
}

/// Label -> record mapping with a defined fallback
#[derive(Debug, Clone)]
pub struct AdvisoryTable {
    records: HashMap<String, AdvisoryRecord>,
    fallback: AdvisoryRecord,
}

impl AdvisoryTable {
    /// Table with no entries; every lookup falls back
    pub fn empty() -> Self {
        Self {
            records: HashMap::new(),
            fallback: AdvisoryRecord::fallback(),
        }
    }

    /// The built-in records
    pub fn builtin() -> Self {
        let mut table = Self::empty();
        for (label, record) in builtin_records() {
            table.insert(label, record);
        }
        table
    }

    /// Built-in records with the entries of a JSON file layered on top
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let overrides: HashMap<String, AdvisoryRecord> = serde_json::from_str(&contents)?;

        let mut table = Self::builtin();
        let count = overrides.len();
        table.extend(overrides);
        info!(
            "Loaded {} advisory records from {:?} ({} total)",
            count,
            path,
            table.len()
        );
        Ok(table)
    }

    pub fn insert(&mut self, label: impl Into<String>, record: AdvisoryRecord) {
        self.records.insert(label.into(), record);
    }

    pub fn extend<I: IntoIterator<Item = (String, AdvisoryRecord)>>(&mut self, records: I) {
        self.records.extend(records);
    }

    /// Exact-match lookup; never fails
    pub fn lookup(&self, label: &str) -> AdvisoryMatch<'_> {
        match self.records.get(label) {
            Some(record) => AdvisoryMatch::Known(record),
            None => AdvisoryMatch::Fallback(&self.fallback),
        }
    }

    pub fn contains(&self, label: &str) -> bool {
        self.records.contains_key(label)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Known labels, sorted
    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self.records.keys().map(String::as_str).collect();
        labels.sort_unstable();
        labels
    }
}

impl Default for AdvisoryTable {
    fn default() -> Self {
        Self::builtin()
    }
}

fn builtin_records() -> Vec<(&'static str, AdvisoryRecord)> {
    vec![
        (
            "healthy",
            AdvisoryRecord::from_static(
                "No treatment needed - plant is healthy",
                "none",
                &["No visible symptoms"],
                &["Continue good agricultural practices"],
                "No economic impact",
            ),
        ),
        (
            "leaf_blight",
            AdvisoryRecord::from_static(
                "Apply copper-based fungicide every 7-10 days, improve air circulation",
                "leaf",
                &["Brown spots with yellow halos", "Wilting leaves", "Premature leaf drop"],
                &["Avoid overhead watering", "Remove infected debris", "Plant resistant varieties"],
                "Can reduce yield by 20-40% if untreated",
            ),
        ),
        (
            "leaf_rust",
            AdvisoryRecord::from_static(
                "Apply systemic fungicide, remove infected leaves",
                "leaf",
                &["Orange-red pustules on leaf undersides", "Yellow spots on upper surface"],
                &["Ensure good air circulation", "Avoid high humidity", "Use resistant cultivars"],
                "Yield loss of 15-30% in severe cases",
            ),
        ),
        (
            "leaf_spot",
            AdvisoryRecord::from_static(
                "Apply fungicide spray, ensure proper plant spacing",
                "leaf",
                &["Circular spots on leaves", "Spots may have dark borders"],
                &["Avoid overhead watering", "Ensure proper plant spacing", "Remove infected leaves"],
                "Yield reduction of 10-25% depending on severity",
            ),
        ),
        (
            "nutrient_deficiency",
            AdvisoryRecord::from_static(
                "Apply appropriate fertilizer based on soil test",
                "whole_plant",
                &["Yellowing of older leaves", "Stunted growth", "Poor fruit development"],
                &["Regular soil testing", "Balanced fertilization", "Proper irrigation"],
                "Reduced yield and quality, increased input costs",
            ),
        ),
        (
            "pest_infected",
            AdvisoryRecord::from_static(
                "Use integrated pest management - beneficial insects and organic sprays",
                "multiple",
                &["Holes in leaves", "Sticky residue", "Distorted growth"],
                &["Crop rotation", "Beneficial insects", "Regular monitoring"],
                "Yield loss varies by pest type and infestation level",
            ),
        ),
        (
            "stem_rot",
            AdvisoryRecord::from_static(
                "Remove infected plants, apply fungicide to healthy plants",
                "stem",
                &["Dark, water-soaked lesions on stem", "Soft, mushy tissue"],
                &["Improve drainage", "Avoid overwatering", "Use pathogen-free seeds"],
                "Complete plant loss in severe infections",
            ),
        ),
        (
            "rot",
            AdvisoryRecord::from_static(
                "Remove infected parts, improve drainage, apply fungicide",
                "fruit_stem",
                &["Soft, decaying tissue", "Foul odor", "Discoloration"],
                &["Proper storage conditions", "Avoid mechanical damage", "Good sanitation"],
                "Post-harvest losses of 30-50%, reduced market value",
            ),
        ),
        (
            "viral_disease",
            AdvisoryRecord::from_static(
                "Remove infected plants, control insect vectors, use resistant varieties",
                "whole_plant",
                &[
                    "Mosaic patterns on leaves",
                    "Stunted growth",
                    "Leaf curling",
                    "Yellow streaks",
                ],
                &[
                    "Control insect vectors",
                    "Use virus-free planting material",
                    "Remove infected plants",
                ],
                "Severe yield loss 40-100%, no cure available",
            ),
        ),
        (
            "powdery_mildew",
            AdvisoryRecord::from_static(
                "Apply sulfur-based fungicide, improve air circulation",
                "leaf",
                &["White powdery coating on leaves", "Distorted leaves", "Reduced growth"],
                &["Reduce humidity", "Improve air circulation", "Avoid dense planting"],
                "Yield reduction of 10-30%, quality degradation",
            ),
        ),
        (
            "scab",
            AdvisoryRecord::from_static(
                "Apply fungicide spray, remove fallen leaves, prune for air circulation",
                "fruit_leaf",
                &["Dark, rough lesions on fruit", "Corky spots on leaves"],
                &["Remove fallen leaves", "Prune for air flow", "Apply preventive fungicides"],
                "Reduced fruit quality and marketability, 20-40% loss",
            ),
        ),
        (
            "anthracnose",
            AdvisoryRecord::from_static(
                "Apply copper fungicide, remove infected debris, avoid overhead watering",
                "fruit_leaf",
                &["Dark sunken lesions", "Fruit rot", "Leaf spots with dark margins"],
                &["Crop rotation", "Remove plant debris", "Avoid overhead irrigation"],
                "Significant fruit losses 30-60%, quality issues",
            ),
        ),
        (
            "downy_mildew",
            AdvisoryRecord::from_static(
                "Apply systemic fungicide, reduce humidity, improve drainage",
                "leaf",
                &["Yellow patches on upper leaf surface", "Gray fuzzy growth on undersides"],
                &["Improve drainage", "Reduce leaf wetness", "Use resistant varieties"],
                "Yield loss of 20-50% in favorable conditions",
            ),
        ),
    ]
}

//! Index -> label mapping files shipped next to each tier's weights

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::utils::error::{DiagnosisError, Result};

/// Accepted on-disk shapes: `["healthy", ...]` or `{"0": "healthy", ...}`
#[derive(Deserialize)]
#[serde(untagged)]
enum LabelFile {
    List(Vec<String>),
    Map(BTreeMap<String, String>),
}

/// Dense index -> label table
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMap {
    labels: Vec<String>,
}

impl LabelMap {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let map = Self::from_json(&contents)?;
        debug!("Loaded {} labels from {:?}", map.len(), path);
        Ok(map)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let labels = match serde_json::from_str::<LabelFile>(json)? {
            LabelFile::List(labels) => labels,
            LabelFile::Map(entries) => {
                let mut indexed = Vec::with_capacity(entries.len());
                for (key, label) in entries {
                    let index: usize = key.parse().map_err(|_| {
                        DiagnosisError::Serialization(format!("label key {:?} is not an index", key))
                    })?;
                    indexed.push((index, label));
                }
                indexed.sort_by_key(|(i, _)| *i);

                // Keys must cover 0..n with no gaps
                for (expected, (index, _)) in indexed.iter().enumerate() {
                    if *index != expected {
                        return Err(DiagnosisError::Serialization(format!(
                            "label indices are not contiguous: missing {}",
                            expected
                        )));
                    }
                }
                indexed.into_iter().map(|(_, label)| label).collect()
            }
        };

        if labels.is_empty() {
            return Err(DiagnosisError::Serialization("label file is empty".into()));
        }
        Ok(Self { labels })
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

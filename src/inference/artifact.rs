//! Artifact resolution and lazy, once-only loading
//!
//! Artifacts are expensive to load, so each tier owns a [`LazyArtifact`]
//! that loads on first use and then hands out shared read-only handles.
//! Concurrent first callers serialize on an init guard so exactly one of
//! them performs the load; the rest observe its result. A failed load is not
//! cached, so an artifact installed later is picked up by the next request.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::utils::error::Result;

/// Weights file plus its parallel label file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    pub weights: PathBuf,
    pub labels: PathBuf,

    /// Extension a record loader appends when the path has none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_extension: Option<String>,
}

impl ArtifactPaths {
    pub fn new(weights: impl Into<PathBuf>, labels: impl Into<PathBuf>) -> Self {
        Self {
            weights: weights.into(),
            labels: labels.into(),
            record_extension: None,
        }
    }

    pub fn with_record_extension(mut self, extension: &str) -> Self {
        self.record_extension = Some(extension.to_string());
        self
    }

    /// The weights file as it exists on disk, if it does
    pub fn resolved_weights(&self) -> Option<PathBuf> {
        if self.weights.is_file() {
            return Some(self.weights.clone());
        }
        let extension = self.record_extension.as_deref()?;
        let candidate = self.weights.with_extension(extension);
        candidate.is_file().then_some(candidate)
    }

    /// Both files are resolvable
    pub fn is_present(&self) -> bool {
        self.resolved_weights().is_some() && self.labels.is_file()
    }

    pub fn labels(&self) -> &Path {
        &self.labels
    }
}

/// A value loaded at most once per process (per owner)
pub struct LazyArtifact<T> {
    cell: OnceLock<Arc<T>>,
    init_guard: Mutex<()>,
}

impl<T> LazyArtifact<T> {
    pub fn new() -> Self {
        Self {
            cell: OnceLock::new(),
            init_guard: Mutex::new(()),
        }
    }

    /// Pre-populated cell, for injecting an already loaded artifact
    pub fn loaded(value: T) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(Arc::new(value));
        Self {
            cell,
            init_guard: Mutex::new(()),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }

    pub fn get(&self) -> Option<Arc<T>> {
        self.cell.get().cloned()
    }

    /// Return the cached value, running `load` if nothing is cached yet
    pub fn get_or_try_load<F>(&self, load: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Result<T>,
    {
        if let Some(value) = self.cell.get() {
            return Ok(Arc::clone(value));
        }

        // Poisoned only if a loader panicked, and nothing was published then
        let _guard = self
            .init_guard
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(value) = self.cell.get() {
            return Ok(Arc::clone(value));
        }

        debug!("Loading artifact on first use");
        let value = Arc::new(load()?);
        let _ = self.cell.set(Arc::clone(&value));
        Ok(value)
    }
}

impl<T> Default for LazyArtifact<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for LazyArtifact<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyArtifact")
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

//! Utilities module for logging and error handling
//!
//! This module provides:
//! - Structured logging with tracing
//! - The diagnosis error taxonomy

pub mod error;
pub mod logging;

// Re-export main types for convenience
pub use error::{DiagnosisError, ErrorCategory, Result, ResultExt};
pub use logging::{init_logging, LogConfig, LogLevel, StageTimer};

/// Index of the largest value; the earliest index wins ties
pub fn argmax<T: PartialOrd + Copy>(values: &[T]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}

/// Format a probability as a percentage string
pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

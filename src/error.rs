//! Error types for score analysis
//!
//! Every variant carries enough context (part, time, parameter) to be
//! logged without re-deriving the score. Variants are `Clone` because a
//! cached computation's failure is delivered to every waiting caller.

use thiserror::Error;

/// Errors that can occur while building the score model or running analyses
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// No resolvable timeline exists for the score
    #[error("malformed score in part '{part}': {reason}")]
    MalformedScore {
        /// Identifier of the offending part
        part: String,
        /// What could not be resolved
        reason: String,
    },

    /// The score contains zero notes
    #[error("score contains no notes")]
    EmptyScore,

    /// A caller-supplied interval is out of range
    #[error("invalid interval {interval}: must be a positive, finite duration")]
    InvalidInterval {
        /// The rejected interval value, in seconds
        interval: f64,
    },

    /// Caller-supplied analyzer options are out of range
    #[error("invalid options: {reason}")]
    InvalidOptions {
        /// Which option was rejected and why
        reason: String,
    },

    /// A computation routed through the cache failed; re-raised to every
    /// waiter and never stored
    #[error("cached computation failed: {message}")]
    CacheComputation {
        /// Rendered failure of the underlying analyzer
        message: String,
    },
}

impl AnalysisError {
    /// Wrap an analyzer failure for delivery through the cache
    pub fn cache_wrap(self) -> Self {
        match self {
            // Don't double-wrap when a waiter's error is itself re-raised
            AnalysisError::CacheComputation { .. } => self,
            other => AnalysisError::CacheComputation {
                message: other.to_string(),
            },
        }
    }
}

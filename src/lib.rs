//! Score Analyzer - musical score analysis core
//!
//! Resolves parsed score data into one unified temporal model, then runs
//! independent analyses over it: dynamic-marking intensity curves,
//! note-onset density, and a pitch/time spectral view. Results are
//! memoized in a bounded, concurrency-safe cache keyed on score content
//! and analyzer parameters.

pub mod analysis;
pub mod cache;
pub mod error;
pub mod model;
pub mod pipeline;

pub use cache::AnalysisCache;
pub use error::AnalysisError;
pub use model::UnifiedScoreModel;
pub use pipeline::{AnalysisBundle, AnalysisPipeline, ProcessOptions};

//! Score analysis layer
//!
//! Three independent analyzers, each a pure function of the shared
//! [`UnifiedScoreModel`](crate::model::UnifiedScoreModel) and its own
//! options. None depends on another's output, so the orchestrator may run
//! them in parallel without coordination.

pub mod density;
pub mod dynamics;
pub mod result;
pub mod spectrum;

pub use density::{DensityBin, DensityResult};
pub use dynamics::{Aggregation, DynamicsCurve, DynamicsOptions, DynamicsResult};
pub use result::{AnalysisResult, AnalyzerKind, Sample};
pub use spectrum::{HeatMapEntry, PianoRollCell, SpectrumOptions, SpectrumResult, Weighting};

//! Shared analysis result types

use serde::{Deserialize, Serialize};

use super::density::DensityResult;
use super::dynamics::DynamicsResult;
use super::spectrum::SpectrumResult;

/// Which analyzer produced a result or failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzerKind {
    /// Dynamic-marking intensity curve
    Dynamics,
    /// Note-onset density curve
    Density,
    /// Piano roll + pitch heat map
    Spectrum,
}

impl std::fmt::Display for AnalyzerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AnalyzerKind::Dynamics => "dynamics",
            AnalyzerKind::Density => "density",
            AnalyzerKind::Spectrum => "spectrum",
        };
        f.write_str(name)
    }
}

/// One (time, value) point of a sampled curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Time in score-relative seconds
    pub time: f64,
    /// Sampled value
    pub value: f64,
}

/// Tagged result of any single analyzer
///
/// Equality is content-based, which underlies cache-entry comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "analyzer", rename_all = "lowercase")]
pub enum AnalysisResult {
    /// Output of the dynamics analyzer
    Dynamics(DynamicsResult),
    /// Output of the density analyzer
    Density(DensityResult),
    /// Output of the spectrum analyzer
    Spectrum(SpectrumResult),
}

impl AnalysisResult {
    /// The analyzer that produced this result
    pub fn kind(&self) -> AnalyzerKind {
        match self {
            AnalysisResult::Dynamics(_) => AnalyzerKind::Dynamics,
            AnalysisResult::Density(_) => AnalyzerKind::Density,
            AnalysisResult::Spectrum(_) => AnalyzerKind::Spectrum,
        }
    }
}

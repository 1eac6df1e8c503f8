//! Analysis orchestration
//!
//! Builds exactly one [`UnifiedScoreModel`] per invocation, runs the
//! enabled analyzers against it on parallel rayon tasks, optionally
//! routes each through the [`AnalysisCache`], and assembles one result
//! bundle. Analyzer failures are independent: by default the bundle
//! carries the completed results alongside the recorded failures, unless
//! the caller opts into fail-fast semantics.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::analysis::{
    density, dynamics, spectrum, AnalysisResult, AnalyzerKind, DensityResult, DynamicsOptions,
    DynamicsResult, SpectrumOptions, SpectrumResult,
};
use crate::cache::{AnalysisCache, CacheKey};
use crate::error::AnalysisError;
use crate::model::{ParsedScore, UnifiedScoreModel};

/// Options controlling which analyses run and how
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessOptions {
    /// Run the dynamics analyzer
    pub dynamics: bool,

    /// Run the density analyzer
    pub density: bool,

    /// Run the spectrum analyzer
    pub spectrum: bool,

    /// Options forwarded to the dynamics analyzer
    pub dynamics_options: DynamicsOptions,

    /// Density bin width in seconds
    pub density_interval: f64,

    /// Options forwarded to the spectrum analyzer
    pub spectrum_options: SpectrumOptions,

    /// Abort on the first analyzer failure instead of recording it
    pub fail_fast: bool,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            dynamics: true,
            density: true,
            spectrum: true,
            dynamics_options: DynamicsOptions::default(),
            density_interval: 0.1,
            spectrum_options: SpectrumOptions::default(),
            fail_fast: false,
        }
    }
}

impl ProcessOptions {
    /// Disable the dynamics analysis
    pub fn without_dynamics(mut self) -> Self {
        self.dynamics = false;
        self
    }

    /// Disable the density analysis
    pub fn without_density(mut self) -> Self {
        self.density = false;
        self
    }

    /// Disable the spectrum analysis
    pub fn without_spectrum(mut self) -> Self {
        self.spectrum = false;
        self
    }

    /// Use one interval, in seconds, for all three analyzers
    pub fn with_interval(mut self, interval: f64) -> Self {
        self.density_interval = interval;
        self.dynamics_options.sample_interval = interval;
        self.spectrum_options.time_interval = interval;
        self
    }

    /// Replace the dynamics analyzer options
    pub fn with_dynamics_options(mut self, options: DynamicsOptions) -> Self {
        self.dynamics_options = options;
        self
    }

    /// Replace the spectrum analyzer options
    pub fn with_spectrum_options(mut self, options: SpectrumOptions) -> Self {
        self.spectrum_options = options;
        self
    }

    /// Abort processing on the first analyzer failure
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }
}

/// A recorded analyzer failure in a partial-success bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisFailure {
    /// Which analyzer failed
    pub analyzer: AnalyzerKind,

    /// Rendered failure, with part/time/parameter context
    pub message: String,
}

/// The assembled outputs of one `process` call
///
/// The shape is stable regardless of which analyses were disabled:
/// disabled or failed analyses are simply absent, never partial.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisBundle {
    /// Dynamics curves, when enabled and successful
    pub dynamics: Option<DynamicsResult>,

    /// Density bins, when enabled and successful
    pub density: Option<DensityResult>,

    /// Piano roll and heat map, when enabled and successful
    pub spectrum: Option<SpectrumResult>,

    /// Failures recorded in partial-success mode
    pub failures: Vec<AnalysisFailure>,
}

impl AnalysisBundle {
    /// Whether every requested analysis completed
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Orchestrates the analyzers over one shared score model
pub struct AnalysisPipeline {
    options: ProcessOptions,
    cache: Option<Arc<AnalysisCache>>,
}

impl AnalysisPipeline {
    /// Create a pipeline with the given options and no cache
    pub fn new(options: ProcessOptions) -> Self {
        Self {
            options,
            cache: None,
        }
    }

    /// Route analyses through the given cache
    pub fn with_cache(mut self, cache: Arc<AnalysisCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// The options this pipeline runs with
    pub fn options(&self) -> &ProcessOptions {
        &self.options
    }

    /// Analyze a parsed score into a result bundle
    ///
    /// Model construction fails fast: a malformed or empty score aborts
    /// the whole call and no analyzer runs.
    pub fn process(&self, parsed: &ParsedScore) -> Result<AnalysisBundle, AnalysisError> {
        let model = UnifiedScoreModel::build(parsed)?;

        log::info!(
            "Processing score: {} notes, {} parts, {:.2}s",
            model.notes().len(),
            model.part_ids().len(),
            model.total_duration()
        );

        let (dynamics_out, (density_out, spectrum_out)) = rayon::join(
            || self.options.dynamics.then(|| self.run_dynamics(&model)),
            || {
                rayon::join(
                    || self.options.density.then(|| self.run_density(&model)),
                    || self.options.spectrum.then(|| self.run_spectrum(&model)),
                )
            },
        );

        let mut bundle = AnalysisBundle::default();
        bundle.dynamics = self.settle(AnalyzerKind::Dynamics, dynamics_out, &mut bundle.failures)?;
        bundle.density = self.settle(AnalyzerKind::Density, density_out, &mut bundle.failures)?;
        bundle.spectrum = self.settle(AnalyzerKind::Spectrum, spectrum_out, &mut bundle.failures)?;

        log::info!(
            "Processing complete: {} failure(s)",
            bundle.failures.len()
        );
        Ok(bundle)
    }

    /// Fold one analyzer outcome into the bundle per the failure policy
    fn settle<T>(
        &self,
        analyzer: AnalyzerKind,
        outcome: Option<Result<T, AnalysisError>>,
        failures: &mut Vec<AnalysisFailure>,
    ) -> Result<Option<T>, AnalysisError> {
        match outcome {
            None => Ok(None),
            Some(Ok(result)) => Ok(Some(result)),
            Some(Err(err)) if self.options.fail_fast => Err(err),
            Some(Err(err)) => {
                log::warn!("{} analysis failed: {}", analyzer, err);
                failures.push(AnalysisFailure {
                    analyzer,
                    message: err.to_string(),
                });
                Ok(None)
            }
        }
    }

    fn run_dynamics(&self, model: &UnifiedScoreModel) -> Result<DynamicsResult, AnalysisError> {
        let options = &self.options.dynamics_options;
        match &self.cache {
            Some(cache) => {
                let key = CacheKey::new(model.fingerprint(), AnalyzerKind::Dynamics, options);
                let result = cache.get_or_compute(key, || {
                    dynamics::analyze(model, options).map(AnalysisResult::Dynamics)
                })?;
                expect_variant(result, |r| match r {
                    AnalysisResult::Dynamics(inner) => Some(inner),
                    _ => None,
                })
            }
            None => dynamics::analyze(model, options),
        }
    }

    fn run_density(&self, model: &UnifiedScoreModel) -> Result<DensityResult, AnalysisError> {
        let interval = self.options.density_interval;
        match &self.cache {
            Some(cache) => {
                let key = CacheKey::new(model.fingerprint(), AnalyzerKind::Density, &interval);
                let result = cache.get_or_compute(key, || {
                    density::analyze(model, interval).map(AnalysisResult::Density)
                })?;
                expect_variant(result, |r| match r {
                    AnalysisResult::Density(inner) => Some(inner),
                    _ => None,
                })
            }
            None => density::analyze(model, interval),
        }
    }

    fn run_spectrum(&self, model: &UnifiedScoreModel) -> Result<SpectrumResult, AnalysisError> {
        let options = &self.options.spectrum_options;
        match &self.cache {
            Some(cache) => {
                let key = CacheKey::new(model.fingerprint(), AnalyzerKind::Spectrum, options);
                let result = cache.get_or_compute(key, || {
                    spectrum::analyze(model, options).map(AnalysisResult::Spectrum)
                })?;
                expect_variant(result, |r| match r {
                    AnalysisResult::Spectrum(inner) => Some(inner),
                    _ => None,
                })
            }
            None => spectrum::analyze(model, options),
        }
    }
}

/// Unpack the expected result variant; keys carry the analyzer kind, so a
/// mismatch indicates cache corruption rather than a caller error
fn expect_variant<T>(
    result: AnalysisResult,
    unpack: impl FnOnce(AnalysisResult) -> Option<T>,
) -> Result<T, AnalysisError> {
    let kind = result.kind();
    unpack(result).ok_or_else(|| AnalysisError::CacheComputation {
        message: format!("cache returned mismatched {} result", kind),
    })
}

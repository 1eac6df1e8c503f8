use anyhow::{bail, Context, Result};
use clap::Parser;
use score_analyzer::analysis::{Aggregation, Weighting};
use score_analyzer::model::ParsedScore;
use score_analyzer::{AnalysisCache, AnalysisPipeline, ProcessOptions};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "score-analyzer")]
#[command(about = "Analyze a parsed musical score: dynamics, density, spectrum", long_about = None)]
struct Args {
    /// Path to the parsed score (JSON)
    input: PathBuf,

    /// Skip the dynamics intensity analysis
    #[arg(long)]
    no_dynamics: bool,

    /// Skip the note-onset density analysis
    #[arg(long)]
    no_density: bool,

    /// Skip the spectral (piano roll / heat map) analysis
    #[arg(long)]
    no_spectral: bool,

    /// Sampling and binning interval in centiseconds (default: 10 = 0.1s)
    #[arg(short = 'i', long, default_value = "10")]
    interval: u32,

    /// Write results to this file instead of stdout
    #[arg(short = 's', long)]
    save_path: Option<PathBuf>,

    /// Dynamics curve aggregation: per-part, max or mean
    #[arg(long, default_value = "per-part")]
    aggregation: String,

    /// Fold the heat map onto the 12 pitch classes
    #[arg(long)]
    pitch_class: bool,

    /// Weight the heat map by sounding duration instead of onset count
    #[arg(long)]
    duration_weighted: bool,

    /// Abort on the first analyzer failure instead of recording it
    #[arg(long)]
    fail_fast: bool,

    /// Result cache capacity in entries (0 disables caching)
    #[arg(long, default_value = "32")]
    cache_capacity: usize,

    /// Verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let aggregation = match args.aggregation.as_str() {
        "per-part" => Aggregation::PerPart,
        "max" => Aggregation::Max,
        "mean" => Aggregation::Mean,
        other => bail!("unknown aggregation '{other}': expected per-part, max or mean"),
    };
    if args.interval == 0 {
        bail!("interval must be at least 1 centisecond");
    }
    let interval = f64::from(args.interval) / 100.0;

    log::info!("Loading score from {:?}", args.input);
    let raw = std::fs::read_to_string(&args.input)
        .with_context(|| format!("reading {:?}", args.input))?;
    let parsed: ParsedScore =
        serde_json::from_str(&raw).with_context(|| format!("parsing {:?}", args.input))?;

    let mut options = ProcessOptions::default()
        .with_interval(interval)
        .with_fail_fast(args.fail_fast);
    options.dynamics = !args.no_dynamics;
    options.density = !args.no_density;
    options.spectrum = !args.no_spectral;
    options.dynamics_options.aggregation = aggregation;
    options.spectrum_options.pitch_class = args.pitch_class;
    options.spectrum_options.weighting = if args.duration_weighted {
        Weighting::Duration
    } else {
        Weighting::Count
    };

    let mut pipeline = AnalysisPipeline::new(options);
    if args.cache_capacity > 0 {
        pipeline = pipeline.with_cache(Arc::new(AnalysisCache::with_capacity(args.cache_capacity)));
    }

    let bundle = pipeline.process(&parsed)?;

    for failure in &bundle.failures {
        log::warn!("{} analysis failed: {}", failure.analyzer, failure.message);
    }

    let rendered = serde_json::to_string_pretty(&bundle)?;
    match &args.save_path {
        Some(path) => {
            std::fs::write(path, rendered).with_context(|| format!("writing {path:?}"))?;
            log::info!("Results written to {path:?}");
        }
        None => println!("{rendered}"),
    }

    if bundle.is_complete() {
        log::info!("Analysis completed successfully");
    } else {
        log::warn!(
            "Analysis completed with {} failure(s)",
            bundle.failures.len()
        );
    }

    Ok(())
}

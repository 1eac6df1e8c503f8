//! Note density analysis
//!
//! Bins note onsets into consecutive half-open intervals of a fixed width.
//! A note counts only in the bin containing its onset; sustaining through
//! a bin does not count. The final bin keeps its proportionally smaller
//! width when the total duration is not an exact multiple of the interval,
//! so consumers can normalize by width instead of silently biasing it.

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::model::{TimedEvent, UnifiedScoreModel};

/// One half-open time bin and its onset count
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DensityBin {
    /// Bin start in seconds
    pub start: f64,

    /// Bin width in seconds; shorter than the interval only for the final
    /// partial bin
    pub width: f64,

    /// Number of note onsets falling in `[start, start + width)`
    pub count: usize,
}

/// Output of the density analyzer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DensityResult {
    /// Bins covering `[0, total_duration]` in order
    pub bins: Vec<DensityBin>,

    /// The interval that produced this result, in seconds
    pub interval: f64,
}

impl DensityResult {
    /// Total number of onsets across all bins
    pub fn total_count(&self) -> usize {
        self.bins.iter().map(|b| b.count).sum()
    }
}

/// Count note onsets per `interval`-wide bin over `[0, total_duration]`
pub fn analyze(model: &UnifiedScoreModel, interval: f64) -> Result<DensityResult, AnalysisError> {
    if !interval.is_finite() || interval <= 0.0 {
        return Err(AnalysisError::InvalidInterval { interval });
    }

    let total = model.total_duration();

    let mut bins = Vec::with_capacity((total / interval).ceil() as usize);
    let mut k = 0u64;
    loop {
        let start = k as f64 * interval;
        // total_duration is strictly positive, so at least one bin exists
        if start >= total {
            break;
        }
        let end = ((k + 1) as f64 * interval).min(total);

        let count = model
            .events_in_range(start, end)
            .iter()
            .filter(|event| matches!(event, TimedEvent::Note(_)))
            .count();

        bins.push(DensityBin {
            start,
            width: end - start,
            count,
        });
        k += 1;
    }

    // A note whose onset coincides with the very end of the timeline is
    // impossible (durations are strictly positive), so the half-open bins
    // cover every onset.
    log::debug!(
        "Density analysis: {} notes over {} bin(s) of {}s",
        model.notes().len(),
        bins.len(),
        interval
    );

    Ok(DensityResult { bins, interval })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ParsedMeasure, ParsedNote, ParsedPart, ParsedScore};

    fn model_with_onsets(onsets: &[(f64, f64)]) -> UnifiedScoreModel {
        let notes = onsets
            .iter()
            .map(|&(time, duration)| ParsedNote {
                time: Some(time),
                offset: 0.0,
                duration,
                pitch: 60,
                velocity: None,
            })
            .collect();
        let score = ParsedScore {
            parts: vec![ParsedPart {
                id: "A".to_string(),
                measures: vec![ParsedMeasure {
                    number: 1,
                    offset: Some(0.0),
                    duration: None,
                    notes,
                }],
                dynamics: Vec::new(),
            }],
        };
        UnifiedScoreModel::build(&score).unwrap()
    }

    #[test]
    fn counts_onsets_per_bin() {
        // The two-part scenario's note side: onsets at 0 and 1, 1s each
        let model = model_with_onsets(&[(0.0, 1.0), (1.0, 1.0)]);
        let result = analyze(&model, 1.0).unwrap();

        assert_eq!(result.bins.len(), 2);
        assert_eq!(result.bins[0].count, 1);
        assert_eq!(result.bins[1].count, 1);
        assert_eq!(result.bins[0].width, 1.0);
    }

    #[test]
    fn sustained_notes_count_once() {
        // A 10s pedal note spans many bins but has one onset
        let model = model_with_onsets(&[(0.0, 10.0), (4.0, 1.0)]);
        let result = analyze(&model, 2.0).unwrap();

        assert_eq!(result.total_count(), 2);
        assert_eq!(result.bins[0].count, 1);
        assert_eq!(result.bins[2].count, 1);
    }

    #[test]
    fn final_partial_bin_keeps_its_width() {
        // total duration 2.5s with 1s bins: widths 1, 1, 0.5
        let model = model_with_onsets(&[(0.0, 1.0), (2.25, 0.25)]);
        let result = analyze(&model, 1.0).unwrap();

        assert_eq!(result.bins.len(), 3);
        assert_eq!(result.bins[2].start, 2.0);
        assert_eq!(result.bins[2].width, 0.5);
        assert_eq!(result.bins[2].count, 1);
    }

    #[test]
    fn bin_counts_conserve_note_count() {
        let onsets: Vec<(f64, f64)> = (0..37).map(|i| (i as f64 * 0.31, 0.7)).collect();
        let model = model_with_onsets(&onsets);

        for interval in [0.1, 0.5, 1.0, 3.0, 100.0] {
            let result = analyze(&model, interval).unwrap();
            assert_eq!(result.total_count(), 37, "interval {}", interval);
        }
    }

    #[test]
    fn rejects_non_positive_interval() {
        let model = model_with_onsets(&[(0.0, 1.0)]);
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                analyze(&model, bad),
                Err(AnalysisError::InvalidInterval { .. })
            ));
        }
    }
}

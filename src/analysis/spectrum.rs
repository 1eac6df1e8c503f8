//! Pitch-spectral analysis
//!
//! "Spectral" here is symbolic: the distribution of notated pitches over
//! time, not an FFT over audio. One pass over the note sequence yields two
//! logically independent representations: a sparse piano roll (how long
//! each pitch sounds in each time bin) and a pitch heat map (how much each
//! pitch occurs, weighted by count or by sounding duration).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::model::UnifiedScoreModel;

/// How heat-map weights accumulate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weighting {
    /// Each note contributes 1; surfaces pitches that appear often
    Count,
    /// Each note contributes its duration; surfaces pitches that sound long
    Duration,
}

/// Options for the spectrum analyzer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpectrumOptions {
    /// Width of the piano-roll time bins, in seconds
    pub time_interval: f64,

    /// Fold the heat map onto the twelve pitch classes instead of MIDI
    /// pitches
    pub pitch_class: bool,

    /// Heat-map weighting
    pub weighting: Weighting,
}

impl Default for SpectrumOptions {
    fn default() -> Self {
        Self {
            time_interval: 0.1,
            pitch_class: false,
            weighting: Weighting::Count,
        }
    }
}

impl SpectrumOptions {
    /// Set the piano-roll bin width in seconds
    pub fn with_time_interval(mut self, interval: f64) -> Self {
        self.time_interval = interval;
        self
    }

    /// Fold heat-map pitches onto pitch classes
    pub fn with_pitch_class(mut self, pitch_class: bool) -> Self {
        self.pitch_class = pitch_class;
        self
    }

    /// Set the heat-map weighting
    pub fn with_weighting(mut self, weighting: Weighting) -> Self {
        self.weighting = weighting;
        self
    }
}

/// One occupied piano-roll cell
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PianoRollCell {
    /// MIDI pitch
    pub pitch: u8,

    /// Time-bin index (bin k covers `[k*interval, (k+1)*interval)`)
    pub bin: usize,

    /// Seconds this pitch sounds within the bin
    pub sounding: f64,
}

/// One heat-map entry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeatMapEntry {
    /// MIDI pitch, or pitch class 0-11 when folded
    pub pitch: u8,

    /// Accumulated weight
    pub weight: f64,
}

/// Output of the spectrum analyzer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumResult {
    /// Occupied piano-roll cells, ordered by (pitch, bin)
    pub piano_roll: Vec<PianoRollCell>,

    /// Pitch histogram, ordered by pitch
    pub heat_map: Vec<HeatMapEntry>,

    /// The options that produced this result
    pub options: SpectrumOptions,
}

impl SpectrumResult {
    /// Total heat-map mass
    ///
    /// Equals the note count under [`Weighting::Count`] and the summed
    /// note durations under [`Weighting::Duration`].
    pub fn heat_map_mass(&self) -> f64 {
        self.heat_map.iter().map(|e| e.weight).sum()
    }
}

/// Derive piano roll and heat map from the model's notes in one pass
pub fn analyze(
    model: &UnifiedScoreModel,
    options: &SpectrumOptions,
) -> Result<SpectrumResult, AnalysisError> {
    let interval = options.time_interval;
    if !interval.is_finite() || interval <= 0.0 {
        return Err(AnalysisError::InvalidInterval { interval });
    }

    let mut roll: BTreeMap<(u8, usize), f64> = BTreeMap::new();
    let mut histogram: BTreeMap<u8, f64> = BTreeMap::new();

    for note in model.notes() {
        let end = note.end_time();

        // Spread the note over every bin it sounds through
        let first_bin = (note.time / interval).floor() as usize;
        let mut bin = first_bin;
        loop {
            let bin_start = bin as f64 * interval;
            if bin_start >= end {
                break;
            }
            let bin_end = bin_start + interval;
            let overlap = end.min(bin_end) - note.time.max(bin_start);
            if overlap > 0.0 {
                *roll.entry((note.pitch, bin)).or_insert(0.0) += overlap;
            }
            bin += 1;
        }

        let key = if options.pitch_class {
            note.pitch_class()
        } else {
            note.pitch
        };
        let weight = match options.weighting {
            Weighting::Count => 1.0,
            Weighting::Duration => note.duration,
        };
        *histogram.entry(key).or_insert(0.0) += weight;
    }

    log::debug!(
        "Spectrum analysis: {} notes -> {} roll cell(s), {} histogram entr(ies)",
        model.notes().len(),
        roll.len(),
        histogram.len()
    );

    Ok(SpectrumResult {
        piano_roll: roll
            .into_iter()
            .map(|((pitch, bin), sounding)| PianoRollCell {
                pitch,
                bin,
                sounding,
            })
            .collect(),
        heat_map: histogram
            .into_iter()
            .map(|(pitch, weight)| HeatMapEntry { pitch, weight })
            .collect(),
        options: *options,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ParsedMeasure, ParsedNote, ParsedPart, ParsedScore};

    fn model_with_notes(notes: &[(f64, f64, u8)]) -> UnifiedScoreModel {
        let notes = notes
            .iter()
            .map(|&(time, duration, pitch)| ParsedNote {
                time: Some(time),
                offset: 0.0,
                duration,
                pitch,
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

    fn cell(result: &SpectrumResult, pitch: u8, bin: usize) -> Option<f64> {
        result
            .piano_roll
            .iter()
            .find(|c| c.pitch == pitch && c.bin == bin)
            .map(|c| c.sounding)
    }

    #[test]
    fn piano_roll_spreads_sustained_notes_across_bins() {
        // C4 sounding [0.5, 2.5) with 1s bins: 0.5s, 1s, 0.5s
        let model = model_with_notes(&[(0.5, 2.0, 60)]);
        let options = SpectrumOptions::default().with_time_interval(1.0);
        let result = analyze(&model, &options).unwrap();

        assert_eq!(cell(&result, 60, 0), Some(0.5));
        assert_eq!(cell(&result, 60, 1), Some(1.0));
        assert_eq!(cell(&result, 60, 2), Some(0.5));
        assert_eq!(cell(&result, 60, 3), None);
    }

    #[test]
    fn count_weighted_mass_equals_note_count() {
        let model = model_with_notes(&[(0.0, 1.0, 60), (0.0, 2.0, 64), (1.0, 0.5, 60)]);
        let result = analyze(&model, &SpectrumOptions::default()).unwrap();
        assert_eq!(result.heat_map_mass(), 3.0);
    }

    #[test]
    fn duration_weighted_mass_equals_summed_durations() {
        let model = model_with_notes(&[(0.0, 1.0, 60), (0.0, 2.0, 64), (1.0, 0.5, 60)]);
        let options = SpectrumOptions::default().with_weighting(Weighting::Duration);
        let result = analyze(&model, &options).unwrap();
        assert!((result.heat_map_mass() - 3.5).abs() < 1e-12);

        // duration-weighting distinguishes the long 64 from the frequent 60
        let e60 = result.heat_map.iter().find(|e| e.pitch == 60).unwrap();
        let e64 = result.heat_map.iter().find(|e| e.pitch == 64).unwrap();
        assert!((e60.weight - 1.5).abs() < 1e-12);
        assert!((e64.weight - 2.0).abs() < 1e-12);
    }

    #[test]
    fn pitch_class_folds_octaves() {
        // C4, C5 and E4: classes 0 and 4
        let model = model_with_notes(&[(0.0, 1.0, 60), (1.0, 1.0, 72), (0.0, 1.0, 64)]);
        let options = SpectrumOptions::default().with_pitch_class(true);
        let result = analyze(&model, &options).unwrap();

        let classes: Vec<(u8, f64)> = result.heat_map.iter().map(|e| (e.pitch, e.weight)).collect();
        assert_eq!(classes, vec![(0, 2.0), (4, 1.0)]);
    }

    #[test]
    fn rejects_non_positive_interval() {
        let model = model_with_notes(&[(0.0, 1.0, 60)]);
        let options = SpectrumOptions::default().with_time_interval(-0.5);
        assert!(matches!(
            analyze(&model, &options),
            Err(AnalysisError::InvalidInterval { .. })
        ));
    }
}

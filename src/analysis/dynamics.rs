//! Dynamics analysis
//!
//! Converts the discrete dynamic markings of each part into a continuous
//! intensity curve. Ordinary markings hold their level until the next
//! marking (step function); crescendo/diminuendo spans interpolate
//! linearly between their start and end intensity. A span without an
//! explicit end extends to the next marking on its part or to the end of
//! the score, whichever is sooner, and its end intensity falls back to the
//! next marking's intensity, else holds the start intensity.

use serde::{Deserialize, Serialize};

use super::result::Sample;
use crate::error::AnalysisError;
use crate::model::{DynamicMarking, DynamicMarkingEvent, TimedEvent, UnifiedScoreModel};

/// Intensity assumed before any marking appears (mf, mid-scale)
pub const UNMARKED_INTENSITY: f64 = 70.0;

/// How multi-part scores are reduced to curves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    /// One curve per part
    PerPart,
    /// One merged curve, pointwise maximum over parts
    Max,
    /// One merged curve, pointwise mean over parts
    Mean,
}

/// Options for the dynamics analyzer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DynamicsOptions {
    /// Regular sampling interval in seconds; marking times are always
    /// sampled in addition to the grid
    pub sample_interval: f64,

    /// Multi-part aggregation policy
    pub aggregation: Aggregation,
}

impl Default for DynamicsOptions {
    fn default() -> Self {
        Self {
            sample_interval: 0.1,
            aggregation: Aggregation::PerPart,
        }
    }
}

impl DynamicsOptions {
    /// Set the sampling interval in seconds
    pub fn with_sample_interval(mut self, interval: f64) -> Self {
        self.sample_interval = interval;
        self
    }

    /// Set the aggregation policy
    pub fn with_aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = aggregation;
        self
    }
}

/// A sampled intensity curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicsCurve {
    /// Part this curve belongs to; `None` for a merged curve
    pub part: Option<String>,

    /// (time, intensity) samples ordered by time
    pub samples: Vec<Sample>,
}

/// Output of the dynamics analyzer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicsResult {
    /// One curve per part, or a single merged curve
    pub curves: Vec<DynamicsCurve>,

    /// The options that produced this result
    pub options: DynamicsOptions,
}

/// Analyze the model's dynamic markings into intensity curves
pub fn analyze(
    model: &UnifiedScoreModel,
    options: &DynamicsOptions,
) -> Result<DynamicsResult, AnalysisError> {
    if !options.sample_interval.is_finite() || options.sample_interval <= 0.0 {
        return Err(AnalysisError::InvalidOptions {
            reason: format!(
                "dynamics sample_interval must be positive, got {}",
                options.sample_interval
            ),
        });
    }

    let total = model.total_duration();
    let markings = markings_by_part(model);

    let curves = match options.aggregation {
        Aggregation::PerPart => model
            .part_ids()
            .iter()
            .map(|part| {
                let part_markings = part_slice(&markings, part);
                let grid = sample_grid(options.sample_interval, total, &part_markings);
                let envelope = Envelope::build(part_markings, total);
                DynamicsCurve {
                    part: Some(part.clone()),
                    samples: envelope.sample(&grid),
                }
            })
            .collect(),
        Aggregation::Max | Aggregation::Mean => {
            let envelopes: Vec<Envelope> = model
                .part_ids()
                .iter()
                .map(|part| Envelope::build(part_slice(&markings, part), total))
                .collect();
            let grid = sample_grid(options.sample_interval, total, &markings);

            let samples = grid
                .iter()
                .map(|&time| {
                    let value = match options.aggregation {
                        Aggregation::Max => envelopes
                            .iter()
                            .map(|e| e.intensity_at(time))
                            .fold(f64::NEG_INFINITY, f64::max),
                        _ => {
                            let sum: f64 = envelopes.iter().map(|e| e.intensity_at(time)).sum();
                            sum / envelopes.len() as f64
                        }
                    };
                    Sample { time, value }
                })
                .collect();

            vec![DynamicsCurve {
                part: None,
                samples,
            }]
        }
    };

    log::debug!(
        "Dynamics analysis: {} marking(s) -> {} curve(s)",
        markings.len(),
        curves.len()
    );

    Ok(DynamicsResult {
        curves,
        options: *options,
    })
}

/// All markings with onset within the score, via the shared range query
fn markings_by_part(model: &UnifiedScoreModel) -> Vec<DynamicMarkingEvent> {
    model
        .events_in_range(0.0, f64::INFINITY)
        .into_iter()
        .filter_map(|event| match event {
            TimedEvent::Dynamic(d) if d.time <= model.total_duration() => Some(d),
            _ => None,
        })
        .collect()
}

fn part_slice<'a>(markings: &'a [DynamicMarkingEvent], part: &str) -> Vec<&'a DynamicMarkingEvent> {
    markings.iter().filter(|m| m.part == part).collect()
}

/// The regular grid over `[0, total]` plus every marking time
fn sample_grid<M: std::borrow::Borrow<DynamicMarkingEvent>>(
    interval: f64,
    total: f64,
    markings: &[M],
) -> Vec<f64> {
    let mut times = Vec::new();
    let mut k = 0u64;
    loop {
        let t = k as f64 * interval;
        if t > total {
            break;
        }
        times.push(t);
        k += 1;
    }
    times.push(total);
    times.extend(markings.iter().map(|m| m.borrow().time));

    times.sort_by(f64::total_cmp);
    times.dedup();
    times
}

/// Piecewise-linear intensity envelope covering `[0, total]`
struct Envelope {
    segments: Vec<Segment>,
}

struct Segment {
    start: f64,
    end: f64,
    v0: f64,
    v1: f64,
}

impl Envelope {
    fn build<M: std::borrow::Borrow<DynamicMarkingEvent>>(markings: Vec<M>, total: f64) -> Self {
        let mut segments = Vec::with_capacity(markings.len() + 1);
        let mut cursor = 0.0;
        let mut current = UNMARKED_INTENSITY;

        for (i, marking) in markings.iter().enumerate() {
            let marking = marking.borrow();
            let t = marking.time;
            if t > cursor {
                segments.push(Segment {
                    start: cursor,
                    end: t,
                    v0: current,
                    v1: current,
                });
            }

            match marking.marking {
                DynamicMarking::Level { level } => {
                    current = level.intensity();
                    cursor = t;
                }
                DynamicMarking::Span { from, to, .. } => {
                    let next_limit = markings
                        .get(i + 1)
                        .map(|n| n.borrow().time)
                        .unwrap_or(total)
                        .min(total);
                    let end = marking
                        .end_time
                        .map(|e| e.min(next_limit))
                        .unwrap_or(next_limit)
                        .max(t);

                    let start_v = from.map(|l| l.intensity()).unwrap_or(current);
                    let end_v = to
                        .map(|l| l.intensity())
                        .or_else(|| {
                            markings
                                .get(i + 1)
                                .and_then(|n| marking_start_intensity(n.borrow()))
                        })
                        .unwrap_or(start_v);

                    segments.push(Segment {
                        start: t,
                        end,
                        v0: start_v,
                        v1: end_v,
                    });
                    current = end_v;
                    cursor = end;
                }
            }
        }

        // Tail after the last marking; zero-width when a marking sits at
        // the score end so evaluation there yields its level
        segments.push(Segment {
            start: cursor,
            end: total,
            v0: current,
            v1: current,
        });

        Self { segments }
    }

    fn intensity_at(&self, time: f64) -> f64 {
        let t = time.max(0.0);
        let idx = self.segments.partition_point(|s| s.start <= t);
        // idx >= 1: the first segment starts at 0 and t >= 0
        let seg = &self.segments[idx.saturating_sub(1)];
        if t >= seg.end || seg.end <= seg.start {
            seg.v1
        } else {
            seg.v0 + (seg.v1 - seg.v0) * (t - seg.start) / (seg.end - seg.start)
        }
    }

    fn sample(&self, grid: &[f64]) -> Vec<Sample> {
        grid.iter()
            .map(|&time| Sample {
                time,
                value: self.intensity_at(time),
            })
            .collect()
    }
}

/// The intensity a marking opens with, when determinable
fn marking_start_intensity(marking: &DynamicMarkingEvent) -> Option<f64> {
    match marking.marking {
        DynamicMarking::Level { level } => Some(level.intensity()),
        DynamicMarking::Span { from, .. } => from.map(|l| l.intensity()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        DynamicLevel, ParsedDynamic, ParsedMeasure, ParsedNote, ParsedPart, ParsedScore,
        SpanDirection,
    };

    fn level(time: f64, level: DynamicLevel) -> ParsedDynamic {
        ParsedDynamic {
            time,
            marking: DynamicMarking::Level { level },
            end_time: None,
        }
    }

    fn span(
        time: f64,
        from: Option<DynamicLevel>,
        to: Option<DynamicLevel>,
        end_time: Option<f64>,
    ) -> ParsedDynamic {
        ParsedDynamic {
            time,
            marking: DynamicMarking::Span {
                direction: SpanDirection::Crescendo,
                from,
                to,
            },
            end_time,
        }
    }

    /// One part holding notes spanning [0, total), one part carrying markings
    fn two_part_model(total: f64, dynamics: Vec<ParsedDynamic>) -> UnifiedScoreModel {
        let notes = (0..total.ceil() as u32)
            .map(|i| ParsedNote {
                time: None,
                offset: i as f64,
                duration: 1.0,
                pitch: 60 + (i % 12) as u8,
                velocity: None,
            })
            .collect();
        let score = ParsedScore {
            parts: vec![
                ParsedPart {
                    id: "A".to_string(),
                    measures: vec![ParsedMeasure {
                        number: 1,
                        offset: Some(0.0),
                        duration: Some(total),
                        notes,
                    }],
                    dynamics: Vec::new(),
                },
                ParsedPart {
                    id: "B".to_string(),
                    measures: Vec::new(),
                    dynamics,
                },
            ],
        };
        UnifiedScoreModel::build(&score).unwrap()
    }

    fn curve_for<'a>(result: &'a DynamicsResult, part: &str) -> &'a DynamicsCurve {
        result
            .curves
            .iter()
            .find(|c| c.part.as_deref() == Some(part))
            .unwrap()
    }

    fn value_at(curve: &DynamicsCurve, time: f64) -> f64 {
        curve
            .samples
            .iter()
            .find(|s| s.time == time)
            .unwrap_or_else(|| panic!("no sample at {}", time))
            .value
    }

    #[test]
    fn step_function_between_plain_markings() {
        // p at 0, f at 2, no span declared: a step at 2
        let model = two_part_model(
            2.0,
            vec![level(0.0, DynamicLevel::P), level(2.0, DynamicLevel::F)],
        );
        let options = DynamicsOptions::default().with_sample_interval(0.25);
        let result = analyze(&model, &options).unwrap();

        let b = curve_for(&result, "B");
        assert_eq!(value_at(b, 0.0), 50.0);
        assert_eq!(value_at(b, 1.75), 50.0);
        assert_eq!(value_at(b, 2.0), 80.0);

        // The unmarked part holds the documented default
        let a = curve_for(&result, "A");
        assert!(a.samples.iter().all(|s| s.value == UNMARKED_INTENSITY));
    }

    #[test]
    fn marking_time_is_sampled_exactly_regardless_of_interval() {
        let model = two_part_model(2.0, vec![level(0.37, DynamicLevel::Ff)]);
        let options = DynamicsOptions::default().with_sample_interval(0.25);
        let result = analyze(&model, &options).unwrap();

        let b = curve_for(&result, "B");
        assert_eq!(value_at(b, 0.37), 90.0);
        // before the marking the default applies
        assert_eq!(value_at(b, 0.25), UNMARKED_INTENSITY);
    }

    #[test]
    fn span_interpolates_between_explicit_endpoints() {
        let model = two_part_model(
            4.0,
            vec![span(
                0.0,
                Some(DynamicLevel::P),
                Some(DynamicLevel::F),
                Some(4.0),
            )],
        );
        let options = DynamicsOptions::default().with_sample_interval(1.0);
        let result = analyze(&model, &options).unwrap();

        let b = curve_for(&result, "B");
        assert_eq!(value_at(b, 0.0), 50.0);
        assert_eq!(value_at(b, 1.0), 57.5);
        assert_eq!(value_at(b, 2.0), 65.0);
        assert_eq!(value_at(b, 4.0), 80.0);
    }

    #[test]
    fn unterminated_span_ends_at_next_marking_intensity() {
        // cresc from p with no end: runs to the f at t=2, reaching 80
        let model = two_part_model(
            4.0,
            vec![
                span(0.0, Some(DynamicLevel::P), None, None),
                level(2.0, DynamicLevel::F),
            ],
        );
        let options = DynamicsOptions::default().with_sample_interval(1.0);
        let result = analyze(&model, &options).unwrap();

        let b = curve_for(&result, "B");
        assert_eq!(value_at(b, 0.0), 50.0);
        assert_eq!(value_at(b, 1.0), 65.0);
        assert_eq!(value_at(b, 2.0), 80.0);
        assert_eq!(value_at(b, 3.0), 80.0);
    }

    #[test]
    fn unterminated_span_with_no_neighbor_holds_start_intensity() {
        let model = two_part_model(4.0, vec![span(1.0, Some(DynamicLevel::P), None, None)]);
        let options = DynamicsOptions::default().with_sample_interval(1.0);
        let result = analyze(&model, &options).unwrap();

        let b = curve_for(&result, "B");
        assert_eq!(value_at(b, 0.0), UNMARKED_INTENSITY);
        assert_eq!(value_at(b, 1.0), 50.0);
        assert_eq!(value_at(b, 4.0), 50.0);
    }

    #[test]
    fn merged_aggregation_is_deterministic() {
        let model = two_part_model(2.0, vec![level(0.0, DynamicLevel::Ff)]);

        let max = analyze(
            &model,
            &DynamicsOptions::default().with_aggregation(Aggregation::Max),
        )
        .unwrap();
        assert_eq!(max.curves.len(), 1);
        assert_eq!(max.curves[0].part, None);
        // max(unmarked A = 70, B = 90)
        assert_eq!(value_at(&max.curves[0], 0.0), 90.0);

        let mean = analyze(
            &model,
            &DynamicsOptions::default().with_aggregation(Aggregation::Mean),
        )
        .unwrap();
        assert_eq!(value_at(&mean.curves[0], 0.0), 80.0);
    }

    #[test]
    fn rejects_non_positive_sample_interval() {
        let model = two_part_model(2.0, Vec::new());
        let options = DynamicsOptions::default().with_sample_interval(0.0);
        assert!(matches!(
            analyze(&model, &options),
            Err(AnalysisError::InvalidOptions { .. })
        ));
    }
}

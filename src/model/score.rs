//! Unified score model
//!
//! Normalizes a parsed score into one flat, time-ordered event
//! representation shared by all analyses. The model is built once and is
//! read-only afterwards; no analyzer mutates it.

use serde::{Deserialize, Serialize};

use super::events::{DynamicMarkingEvent, MeasureBoundary, NoteEvent, TimedEvent};
use super::parsed::{ParsedPart, ParsedScore};
use crate::error::AnalysisError;

/// Stable content hash of a model's event sequence
///
/// Derived from the resolved notes and markings rather than the source file
/// bytes, so two encodings of an identical score fingerprint equally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Hex digest string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
impl Fingerprint {
    /// Synthetic fingerprint for unit tests that only need key identity
    pub(crate) fn from_raw(tag: &str) -> Self {
        Fingerprint(tag.to_string())
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Flat, time-ordered representation of a score
#[derive(Debug, Clone)]
pub struct UnifiedScoreModel {
    notes: Vec<NoteEvent>,
    dynamics: Vec<DynamicMarkingEvent>,
    measures: Vec<MeasureBoundary>,
    part_ids: Vec<String>,
    total_duration: f64,
    fingerprint: Fingerprint,
}

impl UnifiedScoreModel {
    /// Build the model from a parsed score
    ///
    /// Fails with [`AnalysisError::MalformedScore`] when no resolvable
    /// timeline exists and with [`AnalysisError::EmptyScore`] when the
    /// score contains zero notes.
    pub fn build(parsed: &ParsedScore) -> Result<Self, AnalysisError> {
        let mut notes = Vec::new();
        let mut dynamics = Vec::new();
        let mut measures = Vec::new();
        let mut part_ids = Vec::new();

        for part in &parsed.parts {
            part_ids.push(part.id.clone());
            resolve_part(part, &mut notes, &mut dynamics, &mut measures)?;
        }

        if notes.is_empty() {
            return Err(AnalysisError::EmptyScore);
        }

        // Stable sorts preserve source encounter order on full ties
        notes.sort_by(|a, b| {
            a.time
                .total_cmp(&b.time)
                .then_with(|| a.part.cmp(&b.part))
                .then_with(|| a.pitch.cmp(&b.pitch))
        });
        dynamics.sort_by(|a, b| a.time.total_cmp(&b.time).then_with(|| a.part.cmp(&b.part)));
        measures.sort_by(|a, b| a.time.total_cmp(&b.time).then_with(|| a.part.cmp(&b.part)));

        let total_duration = notes.iter().map(NoteEvent::end_time).fold(0.0, f64::max);
        let fingerprint = fingerprint_events(&notes, &dynamics);

        log::debug!(
            "Built score model: {} notes, {} markings, {} parts, {:.2}s, fingerprint {}",
            notes.len(),
            dynamics.len(),
            part_ids.len(),
            total_duration,
            fingerprint
        );

        Ok(Self {
            notes,
            dynamics,
            measures,
            part_ids,
            total_duration,
            fingerprint,
        })
    }

    /// All events whose onset lies in `[start, end)`, ordered by onset
    /// (boundaries before markings before notes on ties)
    ///
    /// Pure query shared by the analyzers; no side effects.
    pub fn events_in_range(&self, start: f64, end: f64) -> Vec<TimedEvent> {
        let in_range = |t: f64| t >= start && t < end;

        let mut events: Vec<TimedEvent> = Vec::new();
        events.extend(
            self.measures
                .iter()
                .filter(|m| in_range(m.time))
                .cloned()
                .map(TimedEvent::Measure),
        );
        events.extend(
            self.dynamics
                .iter()
                .filter(|d| in_range(d.time))
                .cloned()
                .map(TimedEvent::Dynamic),
        );
        events.extend(
            self.notes
                .iter()
                .filter(|n| in_range(n.time))
                .cloned()
                .map(TimedEvent::Note),
        );

        events.sort_by(|a, b| a.time().total_cmp(&b.time()).then_with(|| a.rank().cmp(&b.rank())));
        events
    }

    /// Notes ordered by (onset, part, pitch)
    pub fn notes(&self) -> &[NoteEvent] {
        &self.notes
    }

    /// Dynamic markings ordered by (onset, part)
    pub fn dynamics(&self) -> &[DynamicMarkingEvent] {
        &self.dynamics
    }

    /// Measure boundaries ordered by (time, part)
    pub fn measures(&self) -> &[MeasureBoundary] {
        &self.measures
    }

    /// Part identifiers in score order
    pub fn part_ids(&self) -> &[String] {
        &self.part_ids
    }

    /// End of the last sounding note, in seconds
    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    /// Lowest and highest MIDI pitch in the score
    pub fn pitch_range(&self) -> (u8, u8) {
        let mut lo = u8::MAX;
        let mut hi = u8::MIN;
        for note in &self.notes {
            lo = lo.min(note.pitch);
            hi = hi.max(note.pitch);
        }
        (lo, hi)
    }

    /// Content fingerprint used for cache keying
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }
}

/// Resolve one part's events onto the absolute timeline
///
/// A note's onset is its explicit time when present, otherwise the
/// enclosing measure's start plus the note's offset. Measure starts come
/// from an order-preserving fold: explicit offset, else the accumulated
/// end of the previous measure.
fn resolve_part(
    part: &ParsedPart,
    notes: &mut Vec<NoteEvent>,
    dynamics: &mut Vec<DynamicMarkingEvent>,
    measures: &mut Vec<MeasureBoundary>,
) -> Result<(), AnalysisError> {
    let malformed = |reason: String| AnalysisError::MalformedScore {
        part: part.id.clone(),
        reason,
    };

    // End of the previous measure, when derivable
    let mut cursor: Option<f64> = Some(0.0);
    let mut prev_start = f64::NEG_INFINITY;

    for measure in &part.measures {
        let start = measure
            .offset
            .or(cursor)
            .ok_or_else(|| {
                malformed(format!(
                    "measure {} has no offset and the previous measure has no duration",
                    measure.number
                ))
            })?;

        if !start.is_finite() || start < 0.0 {
            return Err(malformed(format!(
                "measure {} resolves to invalid start time {}",
                measure.number, start
            )));
        }
        if start < prev_start {
            return Err(malformed(format!(
                "measure {} starts at {}s, before the preceding measure at {}s",
                measure.number, start, prev_start
            )));
        }
        prev_start = start;

        measures.push(MeasureBoundary {
            part: part.id.clone(),
            time: start,
            number: measure.number,
        });

        for note in &measure.notes {
            let onset = note.time.unwrap_or(start + note.offset);
            if !onset.is_finite() || onset < 0.0 {
                return Err(malformed(format!(
                    "note in measure {} resolves to invalid onset {}",
                    measure.number, onset
                )));
            }
            if !note.duration.is_finite() || note.duration <= 0.0 {
                return Err(malformed(format!(
                    "note at {}s has non-positive duration {}",
                    onset, note.duration
                )));
            }
            notes.push(NoteEvent {
                part: part.id.clone(),
                time: onset,
                duration: note.duration,
                pitch: note.pitch,
                velocity: note.velocity,
            });
        }

        cursor = measure.duration.map(|d| start + d);
    }

    for marking in &part.dynamics {
        if !marking.time.is_finite() || marking.time < 0.0 {
            return Err(malformed(format!(
                "dynamic marking at invalid time {}",
                marking.time
            )));
        }
        if let Some(end) = marking.end_time {
            if !end.is_finite() || end < marking.time {
                return Err(malformed(format!(
                    "dynamic marking at {}s has invalid end time {}",
                    marking.time, end
                )));
            }
        }
        dynamics.push(DynamicMarkingEvent {
            part: part.id.clone(),
            time: marking.time,
            marking: marking.marking,
            end_time: marking.end_time,
        });
    }

    Ok(())
}

/// Canonical byte encoding of the event sequence, hashed with md5
fn fingerprint_events(notes: &[NoteEvent], dynamics: &[DynamicMarkingEvent]) -> Fingerprint {
    let mut bytes = Vec::with_capacity(notes.len() * 32 + dynamics.len() * 32);

    for note in notes {
        bytes.extend_from_slice(b"n:");
        bytes.extend_from_slice(note.part.as_bytes());
        bytes.push(0);
        bytes.extend_from_slice(&note.time.to_bits().to_le_bytes());
        bytes.extend_from_slice(&note.duration.to_bits().to_le_bytes());
        bytes.push(note.pitch);
        match note.velocity {
            Some(v) => {
                bytes.push(1);
                bytes.extend_from_slice(&v.to_bits().to_le_bytes());
            }
            None => bytes.push(0),
        }
    }

    for marking in dynamics {
        bytes.extend_from_slice(b"d:");
        bytes.extend_from_slice(marking.part.as_bytes());
        bytes.push(0);
        bytes.extend_from_slice(&marking.time.to_bits().to_le_bytes());
        // The serde encoding of a marking is canonical for a fixed variant
        let tag = serde_json::to_string(&marking.marking).unwrap_or_default();
        bytes.extend_from_slice(tag.as_bytes());
        match marking.end_time {
            Some(end) => {
                bytes.push(1);
                bytes.extend_from_slice(&end.to_bits().to_le_bytes());
            }
            None => bytes.push(0),
        }
    }

    Fingerprint(format!("{:x}", md5::compute(&bytes)))
}

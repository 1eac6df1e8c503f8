//! Timed score events
//!
//! The unified timeline is a closed set of tagged variants: notes, dynamic
//! markings and measure boundaries. Analyzers dispatch over [`TimedEvent`]
//! with exhaustive matching rather than probing attributes.

use serde::{Deserialize, Serialize};

/// A single sounding note, immutable once built from the source score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    /// Identifier of the part this note belongs to
    pub part: String,

    /// Onset time in score-relative seconds
    pub time: f64,

    /// Sounding duration in seconds, strictly positive
    pub duration: f64,

    /// MIDI pitch (0-127)
    pub pitch: u8,

    /// Loudness hint in [0, 1] when the source score provides one
    pub velocity: Option<f64>,
}

impl NoteEvent {
    /// Time at which the note stops sounding
    pub fn end_time(&self) -> f64 {
        self.time + self.duration
    }

    /// Pitch class (0 = C .. 11 = B)
    pub fn pitch_class(&self) -> u8 {
        self.pitch % 12
    }
}

/// The notated dynamic ladder, from softest to loudest
///
/// Intensity values follow the conventional 20-115 mapping so that the
/// unmarked default (mf = 70) sits mid-scale. Sforzando accents slot in
/// between the plain steps, so variant order matches intensity order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DynamicLevel {
    Pppp,
    Ppp,
    Pp,
    P,
    Mp,
    Mf,
    F,
    Sf,
    Ff,
    Sff,
    Fff,
    Sfff,
    Ffff,
    Sffff,
}

impl DynamicLevel {
    /// Numeric intensity on the monotone 20-115 scale
    pub fn intensity(&self) -> f64 {
        match self {
            DynamicLevel::Pppp => 20.0,
            DynamicLevel::Ppp => 30.0,
            DynamicLevel::Pp => 40.0,
            DynamicLevel::P => 50.0,
            DynamicLevel::Mp => 60.0,
            DynamicLevel::Mf => 70.0,
            DynamicLevel::F => 80.0,
            DynamicLevel::Sf => 85.0,
            DynamicLevel::Ff => 90.0,
            DynamicLevel::Sff => 95.0,
            DynamicLevel::Fff => 100.0,
            DynamicLevel::Sfff => 105.0,
            DynamicLevel::Ffff => 110.0,
            DynamicLevel::Sffff => 115.0,
        }
    }

    /// Parse a textual marking as it appears in the source score
    pub fn from_marking(text: &str) -> Option<Self> {
        match text.trim().to_lowercase().as_str() {
            "pppp" => Some(DynamicLevel::Pppp),
            "ppp" => Some(DynamicLevel::Ppp),
            "pp" => Some(DynamicLevel::Pp),
            "p" => Some(DynamicLevel::P),
            "mp" => Some(DynamicLevel::Mp),
            "mf" => Some(DynamicLevel::Mf),
            "f" => Some(DynamicLevel::F),
            "sf" => Some(DynamicLevel::Sf),
            "ff" => Some(DynamicLevel::Ff),
            "sff" => Some(DynamicLevel::Sff),
            "fff" => Some(DynamicLevel::Fff),
            "sfff" => Some(DynamicLevel::Sfff),
            "ffff" => Some(DynamicLevel::Ffff),
            "sffff" => Some(DynamicLevel::Sffff),
            _ => None,
        }
    }

    /// Conventional marking text
    pub fn name(&self) -> &'static str {
        match self {
            DynamicLevel::Pppp => "pppp",
            DynamicLevel::Ppp => "ppp",
            DynamicLevel::Pp => "pp",
            DynamicLevel::P => "p",
            DynamicLevel::Mp => "mp",
            DynamicLevel::Mf => "mf",
            DynamicLevel::F => "f",
            DynamicLevel::Sf => "sf",
            DynamicLevel::Ff => "ff",
            DynamicLevel::Sff => "sff",
            DynamicLevel::Fff => "fff",
            DynamicLevel::Sfff => "sfff",
            DynamicLevel::Ffff => "ffff",
            DynamicLevel::Sffff => "sffff",
        }
    }
}

/// Direction of a spanning dynamic marking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanDirection {
    Crescendo,
    Diminuendo,
}

/// What a dynamic marking denotes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DynamicMarking {
    /// An ordinary marking: intensity holds at this level until the next one
    Level {
        /// The notated level
        level: DynamicLevel,
    },

    /// A crescendo/diminuendo between two intensities
    ///
    /// Either endpoint may be omitted in the source; resolution falls back
    /// to the surrounding markings (see the dynamics analyzer).
    Span {
        /// Hairpin direction
        direction: SpanDirection,
        /// Level at span start, if notated
        from: Option<DynamicLevel>,
        /// Level at span end, if notated
        to: Option<DynamicLevel>,
    },
}

/// A dynamic marking placed on a part's timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicMarkingEvent {
    /// Identifier of the part carrying the marking
    pub part: String,

    /// Onset time in score-relative seconds
    pub time: f64,

    /// What the marking denotes
    pub marking: DynamicMarking,

    /// Explicit end for spanning markings, when the source notates one
    pub end_time: Option<f64>,
}

/// Start of a measure on a part's timeline
///
/// Boundaries align per-part timelines and back the fallback time
/// resolution when notes lack explicit timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasureBoundary {
    /// Identifier of the part
    pub part: String,

    /// Start time of the measure in score-relative seconds
    pub time: f64,

    /// Measure number as printed in the score
    pub number: u32,
}

/// Any event on the unified timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TimedEvent {
    /// A measure boundary
    Measure(MeasureBoundary),
    /// A dynamic marking
    Dynamic(DynamicMarkingEvent),
    /// A note onset
    Note(NoteEvent),
}

impl TimedEvent {
    /// Onset time of the event
    pub fn time(&self) -> f64 {
        match self {
            TimedEvent::Measure(m) => m.time,
            TimedEvent::Dynamic(d) => d.time,
            TimedEvent::Note(n) => n.time,
        }
    }

    /// Ordering rank for events sharing an onset: boundaries, then
    /// markings, then notes
    pub(crate) fn rank(&self) -> u8 {
        match self {
            TimedEvent::Measure(_) => 0,
            TimedEvent::Dynamic(_) => 1,
            TimedEvent::Note(_) => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intensity_scale_is_monotone() {
        let ladder = [
            DynamicLevel::Pppp,
            DynamicLevel::Ppp,
            DynamicLevel::Pp,
            DynamicLevel::P,
            DynamicLevel::Mp,
            DynamicLevel::Mf,
            DynamicLevel::F,
            DynamicLevel::Sf,
            DynamicLevel::Ff,
            DynamicLevel::Sff,
            DynamicLevel::Fff,
            DynamicLevel::Sfff,
            DynamicLevel::Ffff,
            DynamicLevel::Sffff,
        ];
        for pair in ladder.windows(2) {
            assert!(pair[0].intensity() < pair[1].intensity());
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn marking_text_round_trips() {
        for text in ["pp", "p", "mp", "mf", "f", "sf", "ff", "sff"] {
            let level = DynamicLevel::from_marking(text).unwrap();
            assert_eq!(level.name(), text);
        }
        assert_eq!(DynamicLevel::from_marking(" F "), Some(DynamicLevel::F));
        assert_eq!(DynamicLevel::from_marking("fp"), None);
    }

    #[test]
    fn sforzando_accents_sit_between_plain_steps() {
        assert_eq!(DynamicLevel::Sf.intensity(), 85.0);
        assert_eq!(DynamicLevel::Sff.intensity(), 95.0);
        assert_eq!(DynamicLevel::Sfff.intensity(), 105.0);
        assert_eq!(DynamicLevel::Sffff.intensity(), 115.0);
    }

    #[test]
    fn note_end_time_and_pitch_class() {
        let note = NoteEvent {
            part: "Piano".to_string(),
            time: 1.5,
            duration: 0.5,
            pitch: 61,
            velocity: None,
        };
        assert_eq!(note.end_time(), 2.0);
        assert_eq!(note.pitch_class(), 1);
    }
}

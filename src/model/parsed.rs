//! Parsed-score input types
//!
//! This is the surface the external music-representation collaborator fills
//! in: part list, per-part measures, per-measure notes, per-part dynamic
//! markings. The types are serde round-trippable so the CLI can consume a
//! JSON dump produced by the parser. Raw MusicXML never reaches this crate.

use serde::{Deserialize, Serialize};

use super::events::DynamicMarking;

/// A parsed score as handed over by the external parser
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedScore {
    /// Instrumental parts in score order
    pub parts: Vec<ParsedPart>,
}

/// One instrumental part
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedPart {
    /// Part identifier (instrument name or generated label)
    pub id: String,

    /// Measures in score order
    pub measures: Vec<ParsedMeasure>,

    /// Dynamic markings on this part's timeline
    #[serde(default)]
    pub dynamics: Vec<ParsedDynamic>,
}

/// One measure of a part
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedMeasure {
    /// Measure number as printed
    pub number: u32,

    /// Absolute start time in seconds, when the parser resolved one
    #[serde(default)]
    pub offset: Option<f64>,

    /// Measure length in seconds, used to place the following measure
    #[serde(default)]
    pub duration: Option<f64>,

    /// Notes sounding in this measure
    #[serde(default)]
    pub notes: Vec<ParsedNote>,
}

/// One note of a measure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedNote {
    /// Absolute onset in seconds, when the parser resolved one
    #[serde(default)]
    pub time: Option<f64>,

    /// Onset relative to the measure start, in seconds
    #[serde(default)]
    pub offset: f64,

    /// Sounding duration in seconds
    pub duration: f64,

    /// MIDI pitch (0-127)
    pub pitch: u8,

    /// Loudness hint in [0, 1]
    #[serde(default)]
    pub velocity: Option<f64>,
}

/// One dynamic marking of a part
///
/// Marking offsets are absolute: the external parser flattens each part
/// before handing annotations over, so no measure fallback applies here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedDynamic {
    /// Absolute onset in seconds
    pub time: f64,

    /// What the marking denotes
    pub marking: DynamicMarking,

    /// Explicit end for spanning markings
    #[serde(default)]
    pub end_time: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::events::DynamicLevel;

    #[test]
    fn parsed_score_deserializes_from_minimal_json() {
        let json = r#"{
            "parts": [{
                "id": "Flute",
                "measures": [{
                    "number": 1,
                    "duration": 2.0,
                    "notes": [{"offset": 0.0, "duration": 1.0, "pitch": 60}]
                }],
                "dynamics": [{"time": 0.0, "marking": {"kind": "level", "level": "p"}}]
            }]
        }"#;

        let score: ParsedScore = serde_json::from_str(json).unwrap();
        assert_eq!(score.parts.len(), 1);
        let part = &score.parts[0];
        assert_eq!(part.measures[0].notes[0].pitch, 60);
        assert_eq!(part.measures[0].notes[0].time, None);
        assert_eq!(
            part.dynamics[0].marking,
            DynamicMarking::Level {
                level: DynamicLevel::P
            }
        );
    }
}

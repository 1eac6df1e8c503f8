//! Score data model
//!
//! [`parsed`] holds the input surface filled in by the external parser,
//! [`events`] the closed set of timed event variants, and [`score`] the
//! unified, read-only model all analyzers share.

pub mod events;
pub mod parsed;
pub mod score;

pub use events::{
    DynamicLevel, DynamicMarking, DynamicMarkingEvent, MeasureBoundary, NoteEvent, SpanDirection,
    TimedEvent,
};
pub use parsed::{ParsedDynamic, ParsedMeasure, ParsedNote, ParsedPart, ParsedScore};
pub use score::{Fingerprint, UnifiedScoreModel};

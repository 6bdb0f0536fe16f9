//! # lammas-types
//!
//! Data model for the Lammas sequencer: temperaments, scales, chords,
//! keyboard mappings, timed events, sorted sequences, patterns, tracks and
//! the project aggregate. Everything here is plain data with serde support;
//! the undo stack, version control and persistence live in lammas-core.
//!
//! Ownership is a strict tree: a `Project` owns its tracks, a track owns one
//! `MidiSequence` and one `Pattern`, a sequence owns its events. There are
//! no parent pointers; anything that needs to walk back up does so through a
//! `TrackId` lookup on the project.

mod ids;
pub mod music;
pub mod events;
mod notify;
mod pattern;
mod project;
mod sequence;
pub mod timebase;
mod track;

pub use ids::{EventId, TrackId};
pub use notify::ProjectEvent;
pub use pattern::{Clip, Pattern};
pub use project::{Project, ProjectInfo};
pub use sequence::MidiSequence;
pub use track::{MidiTrack, TrackKind, SUSTAIN_PEDAL_CC, TEMPO_CC};

// Re-export the model types at crate root for convenience
pub use events::{
    AnnotationEvent, AutomationEvent, EventKind, KeySignatureEvent, MidiEvent, Note,
    TimeSignatureEvent,
};
pub use music::{
    Chord, KeyChannel, KeyboardMapping, Scale, ScaleKeyAlignment, Semitones, Temperament,
};

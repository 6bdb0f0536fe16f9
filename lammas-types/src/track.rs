//! Tracks: a sequence plus a pattern plus the mutable track properties.

use serde::{Deserialize, Serialize};

use crate::events::TimeSignatureEvent;
use crate::ids::TrackId;
use crate::pattern::Pattern;
use crate::sequence::MidiSequence;

/// Controller numbers with a built-in meaning.
pub const SUSTAIN_PEDAL_CC: i32 = 64;
pub const TEMPO_CC: i32 = 81;

/// What a track's sequence holds; one kind per track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackKind {
    Piano,
    Automation,
    Annotations,
    KeySignatures,
    TimeSignatures,
}

/// A project track. The id is assigned at creation and preserved across
/// undo/redo and checkouts; version control tracks each track as one
/// tracked item under this id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MidiTrack {
    id: TrackId,
    kind: TrackKind,
    name: String,
    #[serde(default)]
    colour: String,
    #[serde(default = "default_channel")]
    channel: u8,
    #[serde(default, skip_serializing_if = "is_zero")]
    controller_number: i32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    instrument_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time_signature_override: Option<TimeSignatureEvent>,
    sequence: MidiSequence,
    pattern: Pattern,
}

fn default_channel() -> u8 {
    1
}

fn is_zero(v: &i32) -> bool {
    *v == 0
}

impl MidiTrack {
    pub fn new(kind: TrackKind, name: impl Into<String>) -> Self {
        Self {
            id: TrackId::random(),
            kind,
            name: name.into(),
            colour: String::new(),
            channel: 1,
            controller_number: 0,
            instrument_id: String::new(),
            time_signature_override: None,
            sequence: MidiSequence::new(),
            pattern: Pattern::new(),
        }
    }

    /// Rebuilds a track under a known id, e.g. on checkout.
    pub fn with_id(kind: TrackKind, name: impl Into<String>, id: TrackId) -> Self {
        Self {
            id,
            ..Self::new(kind, name)
        }
    }

    pub fn id(&self) -> TrackId {
        self.id
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn colour(&self) -> &str {
        &self.colour
    }

    pub fn set_colour(&mut self, colour: impl Into<String>) {
        self.colour = colour.into();
    }

    /// MIDI channel in [1, 16]; out-of-range values clamp.
    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn set_channel(&mut self, channel: u8) {
        self.channel = channel.clamp(1, 16);
    }

    /// Meaningful for automation tracks only.
    pub fn controller_number(&self) -> i32 {
        self.controller_number
    }

    pub fn set_controller_number(&mut self, controller_number: i32) {
        self.controller_number = controller_number.clamp(0, 127);
    }

    pub fn instrument_id(&self) -> &str {
        &self.instrument_id
    }

    pub fn set_instrument_id(&mut self, instrument_id: impl Into<String>) {
        self.instrument_id = instrument_id.into();
    }

    pub fn time_signature_override(&self) -> Option<&TimeSignatureEvent> {
        self.time_signature_override.as_ref()
    }

    pub fn set_time_signature_override(&mut self, meter: Option<TimeSignatureEvent>) {
        self.time_signature_override = meter;
    }

    pub fn is_tempo_track(&self) -> bool {
        self.kind == TrackKind::Automation && self.controller_number == TEMPO_CC
    }

    pub fn sequence(&self) -> &MidiSequence {
        &self.sequence
    }

    pub fn sequence_mut(&mut self) -> &mut MidiSequence {
        &mut self.sequence
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn pattern_mut(&mut self) -> &mut Pattern {
        &mut self.pattern
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setters_clamp() {
        let mut track = MidiTrack::new(TrackKind::Piano, "Melody");
        track.set_channel(0);
        assert_eq!(1, track.channel());
        track.set_channel(40);
        assert_eq!(16, track.channel());
        track.set_controller_number(300);
        assert_eq!(127, track.controller_number());
    }

    #[test]
    fn tempo_track_detection() {
        let mut track = MidiTrack::new(TrackKind::Automation, "Tempo");
        assert!(!track.is_tempo_track());
        track.set_controller_number(TEMPO_CC);
        assert!(track.is_tempo_track());
    }
}

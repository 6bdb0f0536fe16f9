use serde::{Deserialize, Serialize};

use crate::ids::EventId;
use crate::timebase::{
    beat_to_ticks, round_beat, ticks_to_beat, velocity_from_wire, velocity_to_wire,
    MAX_TUPLET, MIN_NOTE_LENGTH, MIN_TUPLET,
};

/// A note: key index in the current temperament, grid-aligned beat and
/// length, velocity in [0, 1] and a tuplet count that subdivides the note
/// into evenly spaced sub-events at export time.
///
/// Notes are value objects: editing goes through the `with_*` builders,
/// which clamp at the boundary, and the id never changes along the way.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "NoteWire", into = "NoteWire")]
pub struct Note {
    id: EventId,
    key: i32,
    beat: f32,
    length: f32,
    velocity: f32,
    tuplet: u8,
}

impl Note {
    pub fn new(id: EventId, key: i32, beat: f32, length: f32, velocity: f32) -> Self {
        Self {
            id,
            key: key.max(0),
            beat: round_beat(beat),
            length: round_beat(length.max(MIN_NOTE_LENGTH)),
            velocity: velocity.clamp(0.0, 1.0),
            tuplet: MIN_TUPLET,
        }
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: EventId) {
        self.id = id;
    }

    pub fn key(&self) -> i32 {
        self.key
    }

    pub fn beat(&self) -> f32 {
        self.beat
    }

    pub fn length(&self) -> f32 {
        self.length
    }

    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    pub fn tuplet(&self) -> u8 {
        self.tuplet
    }

    pub fn with_key(&self, key: i32) -> Self {
        Self {
            key: key.max(0),
            ..*self
        }
    }

    pub fn with_delta_key(&self, delta: i32) -> Self {
        self.with_key(self.key + delta)
    }

    pub fn with_beat(&self, beat: f32) -> Self {
        Self {
            beat: round_beat(beat),
            ..*self
        }
    }

    pub fn with_delta_beat(&self, delta: f32) -> Self {
        self.with_beat(self.beat + delta)
    }

    pub fn with_key_beat(&self, key: i32, beat: f32) -> Self {
        self.with_key(key).with_beat(beat)
    }

    pub fn with_length(&self, length: f32) -> Self {
        Self {
            length: round_beat(length.max(MIN_NOTE_LENGTH)),
            ..*self
        }
    }

    pub fn with_delta_length(&self, delta: f32) -> Self {
        self.with_length(self.length + delta)
    }

    pub fn with_key_length(&self, key: i32, length: f32) -> Self {
        self.with_key(key).with_length(length)
    }

    pub fn with_velocity(&self, velocity: f32) -> Self {
        Self {
            velocity: velocity.clamp(0.0, 1.0),
            ..*self
        }
    }

    pub fn with_delta_velocity(&self, delta: f32) -> Self {
        self.with_velocity(self.velocity + delta)
    }

    pub fn with_tuplet(&self, tuplet: u8) -> Self {
        Self {
            tuplet: tuplet.clamp(MIN_TUPLET, MAX_TUPLET),
            ..*self
        }
    }
}

#[derive(Serialize, Deserialize)]
struct NoteWire {
    id: EventId,
    key: i32,
    at: i32,
    len: i32,
    vol: i32,
    #[serde(default = "no_tuplet", skip_serializing_if = "is_no_tuplet")]
    tuplet: u8,
}

fn no_tuplet() -> u8 {
    MIN_TUPLET
}

fn is_no_tuplet(tuplet: &u8) -> bool {
    *tuplet == MIN_TUPLET
}

impl From<NoteWire> for Note {
    fn from(wire: NoteWire) -> Self {
        Note::new(
            wire.id,
            wire.key,
            ticks_to_beat(wire.at),
            ticks_to_beat(wire.len),
            velocity_from_wire(wire.vol),
        )
        .with_tuplet(wire.tuplet)
    }
}

impl From<Note> for NoteWire {
    fn from(note: Note) -> Self {
        Self {
            id: note.id,
            key: note.key,
            at: beat_to_ticks(note.beat),
            len: beat_to_ticks(note.length),
            vol: velocity_to_wire(note.velocity),
            tuplet: note.tuplet,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_clamps() {
        let note = Note::new(EventId::new(1), -5, 0.1234, 0.0001, 7.0);
        assert_eq!(0, note.key());
        assert_eq!(round_beat(0.1234), note.beat());
        assert_eq!(round_beat(MIN_NOTE_LENGTH), note.length());
        assert_eq!(1.0, note.velocity());
        assert_eq!(1, note.tuplet());
    }

    #[test]
    fn builders_clamp_and_keep_id() {
        let note = Note::new(EventId::new(7), 60, 0.0, 1.0, 0.5);
        assert_eq!(EventId::new(7), note.with_delta_key(1).id());
        assert_eq!(0, note.with_key(-3).key());
        assert_eq!(0, note.with_delta_key(-100).key());
        assert_eq!(1, note.with_tuplet(0).tuplet());
        assert_eq!(9, note.with_tuplet(200).tuplet());
        assert_eq!(0.0, note.with_delta_velocity(-2.0).velocity());
        // the minimum length lands between grid steps and rounds up
        assert_eq!(
            round_beat(MIN_NOTE_LENGTH),
            note.with_delta_length(-5.0).length()
        );
    }

    #[test]
    fn wire_form_is_integer_ticks() {
        let note = Note::new(EventId::new(3), 60, 1.25, 0.5, 0.5).with_tuplet(3);
        let wire = NoteWire::from(note);
        assert_eq!(600, wire.at);
        assert_eq!(240, wire.len);
        assert_eq!(64, wire.vol);
        assert_eq!(note, Note::from(NoteWire::from(note)));
    }
}

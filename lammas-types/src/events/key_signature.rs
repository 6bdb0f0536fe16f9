use serde::{Deserialize, Serialize};

use crate::ids::EventId;
use crate::music::Scale;
use crate::timebase::{beat_to_ticks, round_beat, ticks_to_beat};

/// A key signature: the root key (a step of the current temperament's
/// period) and a scale. Version control compares the scale by equivalence,
/// so renaming a scale alone never shows up as a change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "KeySignatureWire", into = "KeySignatureWire")]
pub struct KeySignatureEvent {
    id: EventId,
    beat: f32,
    root_key: i32,
    scale: Scale,
}

impl KeySignatureEvent {
    pub fn new(id: EventId, beat: f32, root_key: i32, scale: Scale) -> Self {
        Self {
            id,
            beat: round_beat(beat),
            root_key: root_key.max(0),
            scale,
        }
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: EventId) {
        self.id = id;
    }

    pub fn beat(&self) -> f32 {
        self.beat
    }

    pub fn root_key(&self) -> i32 {
        self.root_key
    }

    pub fn scale(&self) -> &Scale {
        &self.scale
    }

    pub fn with_beat(&self, beat: f32) -> Self {
        Self {
            beat: round_beat(beat),
            ..self.clone()
        }
    }

    pub fn with_delta_beat(&self, delta: f32) -> Self {
        self.with_beat(self.beat + delta)
    }

    pub fn with_root_key(&self, root_key: i32) -> Self {
        Self {
            root_key: root_key.max(0),
            ..self.clone()
        }
    }

    pub fn with_scale(&self, scale: Scale) -> Self {
        Self {
            scale,
            ..self.clone()
        }
    }
}

#[derive(Serialize, Deserialize)]
struct KeySignatureWire {
    id: EventId,
    at: i32,
    root: i32,
    scale: Scale,
}

impl From<KeySignatureWire> for KeySignatureEvent {
    fn from(wire: KeySignatureWire) -> Self {
        KeySignatureEvent::new(wire.id, ticks_to_beat(wire.at), wire.root, wire.scale)
    }
}

impl From<KeySignatureEvent> for KeySignatureWire {
    fn from(e: KeySignatureEvent) -> Self {
        Self {
            id: e.id,
            at: beat_to_ticks(e.beat),
            root: e.root_key,
            scale: e.scale,
        }
    }
}

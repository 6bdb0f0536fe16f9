use serde::{Deserialize, Serialize};

use crate::ids::EventId;
use crate::timebase::{beat_to_ticks, round_beat, ticks_to_beat};

/// A timeline annotation: free text with a colour and an optional extent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "AnnotationWire", into = "AnnotationWire")]
pub struct AnnotationEvent {
    id: EventId,
    beat: f32,
    length: f32,
    description: String,
    colour: String,
}

impl AnnotationEvent {
    pub fn new(
        id: EventId,
        beat: f32,
        description: impl Into<String>,
        colour: impl Into<String>,
    ) -> Self {
        Self {
            id,
            beat: round_beat(beat),
            length: 0.0,
            description: description.into(),
            colour: colour.into(),
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

    pub fn length(&self) -> f32 {
        self.length
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn colour(&self) -> &str {
        &self.colour
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

    pub fn with_length(&self, length: f32) -> Self {
        Self {
            length: round_beat(length.max(0.0)),
            ..self.clone()
        }
    }

    pub fn with_description(&self, description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..self.clone()
        }
    }

    pub fn with_colour(&self, colour: impl Into<String>) -> Self {
        Self {
            colour: colour.into(),
            ..self.clone()
        }
    }
}

#[derive(Serialize, Deserialize)]
struct AnnotationWire {
    id: EventId,
    at: i32,
    #[serde(default, skip_serializing_if = "is_zero")]
    len: i32,
    text: String,
    #[serde(default)]
    colour: String,
}

fn is_zero(len: &i32) -> bool {
    *len == 0
}

impl From<AnnotationWire> for AnnotationEvent {
    fn from(wire: AnnotationWire) -> Self {
        AnnotationEvent::new(wire.id, ticks_to_beat(wire.at), wire.text, wire.colour)
            .with_length(ticks_to_beat(wire.len))
    }
}

impl From<AnnotationEvent> for AnnotationWire {
    fn from(e: AnnotationEvent) -> Self {
        Self {
            id: e.id,
            at: beat_to_ticks(e.beat),
            len: beat_to_ticks(e.length),
            text: e.description,
            colour: e.colour,
        }
    }
}

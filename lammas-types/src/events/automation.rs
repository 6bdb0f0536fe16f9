use serde::{Deserialize, Serialize};

use crate::ids::EventId;
use crate::timebase::{beat_to_ticks, round_beat, ticks_to_beat};

/// BPM mapped from a controller value of 1.0.
pub const MIN_BPM: f64 = 10.0;

/// BPM span of the tempo controller: value 0.0 maps to `MIN_BPM + BPM_RANGE`.
pub const BPM_RANGE: f64 = 230.0;

/// A point on an automation curve: normalized value plus a curvature
/// parameter shaping the segment towards the next point. On a tempo track
/// the value encodes BPM (see [`AutomationEvent::bpm`]).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "AutomationWire", into = "AutomationWire")]
pub struct AutomationEvent {
    id: EventId,
    beat: f32,
    value: f32,
    curvature: f32,
}

pub const DEFAULT_CURVATURE: f32 = 0.5;

impl AutomationEvent {
    pub fn new(id: EventId, beat: f32, value: f32) -> Self {
        Self {
            id,
            beat: round_beat(beat),
            value: value.clamp(0.0, 1.0),
            curvature: DEFAULT_CURVATURE,
        }
    }

    /// A tempo-track event pinned to the given BPM.
    pub fn tempo(id: EventId, beat: f32, bpm: f64) -> Self {
        let value = 1.0 - (bpm - MIN_BPM) / BPM_RANGE;
        Self::new(id, beat, value as f32)
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

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn curvature(&self) -> f32 {
        self.curvature
    }

    /// The controller value read as a tempo.
    pub fn bpm(&self) -> f64 {
        (1.0 - self.value as f64) * BPM_RANGE + MIN_BPM
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

    pub fn with_value(&self, value: f32) -> Self {
        Self {
            value: value.clamp(0.0, 1.0),
            ..*self
        }
    }

    pub fn with_delta_value(&self, delta: f32) -> Self {
        self.with_value(self.value + delta)
    }

    pub fn with_curvature(&self, curvature: f32) -> Self {
        Self {
            curvature: curvature.clamp(0.0, 1.0),
            ..*self
        }
    }
}

#[derive(Serialize, Deserialize)]
struct AutomationWire {
    id: EventId,
    at: i32,
    // the value keeps full float precision on the wire: automation drives
    // tempo, where 1/128 steps would be audible
    value: f32,
    #[serde(default = "default_curvature", skip_serializing_if = "is_default_curvature")]
    curve: f32,
}

fn default_curvature() -> f32 {
    DEFAULT_CURVATURE
}

fn is_default_curvature(curve: &f32) -> bool {
    *curve == DEFAULT_CURVATURE
}

impl From<AutomationWire> for AutomationEvent {
    fn from(wire: AutomationWire) -> Self {
        AutomationEvent::new(wire.id, ticks_to_beat(wire.at), wire.value)
            .with_curvature(wire.curve)
    }
}

impl From<AutomationEvent> for AutomationWire {
    fn from(e: AutomationEvent) -> Self {
        Self {
            id: e.id,
            at: beat_to_ticks(e.beat),
            value: e.value,
            curve: e.curvature,
        }
    }
}

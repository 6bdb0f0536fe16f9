use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::EventId;
use crate::timebase::{beat_to_ticks, round_beat, ticks_to_beat};

pub const MIN_NUMERATOR: u8 = 1;
pub const MAX_NUMERATOR: u8 = 64;

/// A meter change. The denominator is clamped to a power of two in
/// [1, 32]; the numerator to [1, 64].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "TimeSignatureWire", into = "TimeSignatureWire")]
pub struct TimeSignatureEvent {
    id: EventId,
    beat: f32,
    numerator: u8,
    denominator: u8,
}

impl TimeSignatureEvent {
    pub fn new(id: EventId, beat: f32, numerator: u8, denominator: u8) -> Self {
        Self {
            id,
            beat: round_beat(beat),
            numerator: numerator.clamp(MIN_NUMERATOR, MAX_NUMERATOR),
            denominator: clamp_denominator(denominator),
        }
    }

    pub fn common_time(id: EventId, beat: f32) -> Self {
        Self::new(id, beat, 4, 4)
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

    pub fn numerator(&self) -> u8 {
        self.numerator
    }

    pub fn denominator(&self) -> u8 {
        self.denominator
    }

    /// Length of one bar in beats under this meter.
    pub fn bar_length_in_beats(&self) -> f32 {
        self.numerator as f32 * 4.0 / self.denominator as f32
    }

    pub fn with_beat(&self, beat: f32) -> Self {
        Self {
            beat: round_beat(beat),
            ..*self
        }
    }

    pub fn with_delta_beat(&self, delta: f32) -> Self {
        self.with_beat(self.beat() + delta)
    }

    pub fn with_meter(&self, numerator: u8, denominator: u8) -> Self {
        Self {
            numerator: numerator.clamp(MIN_NUMERATOR, MAX_NUMERATOR),
            denominator: clamp_denominator(denominator),
            ..*self
        }
    }

    /// Parses "n/d"; None on malformed input.
    pub fn parse_meter(text: &str) -> Option<(u8, u8)> {
        let (n, d) = text.split_once('/')?;
        let numerator: u8 = n.trim().parse().ok()?;
        let denominator: u8 = d.trim().parse().ok()?;
        if numerator == 0 || denominator == 0 {
            return None;
        }
        Some((
            numerator.clamp(MIN_NUMERATOR, MAX_NUMERATOR),
            clamp_denominator(denominator),
        ))
    }
}

impl fmt::Display for TimeSignatureEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

fn clamp_denominator(denominator: u8) -> u8 {
    let clamped = denominator.clamp(1, 32);
    // round down to a power of two
    let mut power = 1u8;
    while power * 2 <= clamped {
        power *= 2;
    }
    power
}

#[derive(Serialize, Deserialize)]
struct TimeSignatureWire {
    id: EventId,
    at: i32,
    num: u8,
    denom: u8,
}

impl From<TimeSignatureWire> for TimeSignatureEvent {
    fn from(wire: TimeSignatureWire) -> Self {
        TimeSignatureEvent::new(wire.id, ticks_to_beat(wire.at), wire.num, wire.denom)
    }
}

impl From<TimeSignatureEvent> for TimeSignatureWire {
    fn from(e: TimeSignatureEvent) -> Self {
        Self {
            id: e.id,
            at: beat_to_ticks(e.beat()),
            num: e.numerator,
            denom: e.denominator,
        }
    }
}

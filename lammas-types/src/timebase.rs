//! Grid constants and beat rounding.
//!
//! All musical time in the model is measured in beats, snapped to a fixed
//! grid of `TICKS_PER_BEAT` subdivisions. Serialization stores integer
//! ticks, so a stored beat always survives a round-trip exactly, and two
//! grid-aligned `f32` beats can be compared with plain equality.

/// Subdivisions of one beat. Governs beat rounding, on-wire timestamps and
/// the MIDI export pulse resolution. Must never change once projects exist.
pub const TICKS_PER_BEAT: i32 = 480;

/// Integer scale used to persist velocities: files store
/// `round(velocity * VELOCITY_SAVE_RESOLUTION)`.
pub const VELOCITY_SAVE_RESOLUTION: f32 = 128.0;

/// The shortest note the model will store; shorter lengths clamp up.
pub const MIN_NOTE_LENGTH: f32 = 1.0 / 64.0;

pub const MIN_TUPLET: u8 = 1;
pub const MAX_TUPLET: u8 = 9;

pub const NUM_CHANNELS: usize = 16;
pub const KEYS_PER_CHANNEL: usize = 128;

/// Tempo assumed when the tempo track has no events.
pub const DEFAULT_BPM: f64 = 120.0;

/// Snap a beat position to the nearest grid step.
#[inline]
pub fn round_beat(beat: f32) -> f32 {
    (beat * TICKS_PER_BEAT as f32).round() / TICKS_PER_BEAT as f32
}

/// Beats to integer ticks, for serialization and MIDI export.
#[inline]
pub fn beat_to_ticks(beat: f32) -> i32 {
    (beat * TICKS_PER_BEAT as f32).round() as i32
}

#[inline]
pub fn ticks_to_beat(ticks: i32) -> f32 {
    ticks as f32 / TICKS_PER_BEAT as f32
}

/// Velocity in [0, 1] to its integer wire form.
#[inline]
pub fn velocity_to_wire(velocity: f32) -> i32 {
    (velocity * VELOCITY_SAVE_RESOLUTION).round() as i32
}

#[inline]
pub fn velocity_from_wire(wire: i32) -> f32 {
    (wire as f32 / VELOCITY_SAVE_RESOLUTION).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding_is_idempotent() {
        for raw in [0.0, 0.1234, 1.0 / 3.0, 17.333, -2.71] {
            let once = round_beat(raw);
            assert_eq!(once, round_beat(once));
        }
    }

    #[test]
    fn ticks_round_trip() {
        for raw in [0.0, 0.25, 1.5, 33.0 + 7.0 / 480.0, -4.0] {
            let beat = round_beat(raw);
            assert_eq!(beat, ticks_to_beat(beat_to_ticks(beat)));
        }
    }

    #[test]
    fn velocity_wire_round_trip() {
        for wire in [0, 1, 64, 100, 128] {
            assert_eq!(wire, velocity_to_wire(velocity_from_wire(wire)));
        }
    }
}

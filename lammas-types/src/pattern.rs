//! Clips and the per-track pattern that owns them.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::ids::EventId;
use crate::timebase::{beat_to_ticks, round_beat, ticks_to_beat, velocity_from_wire, velocity_to_wire};

/// One placement of a track's content on the timeline, with per-instance
/// transforms: key offset, velocity multiplier, mute flag and an optional
/// colour override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ClipWire", into = "ClipWire")]
pub struct Clip {
    id: EventId,
    beat: f32,
    key: i32,
    velocity: f32,
    mute: bool,
    colour: Option<String>,
}

impl Clip {
    pub fn new(id: EventId, beat: f32) -> Self {
        Self {
            id,
            beat: round_beat(beat),
            key: 0,
            velocity: 1.0,
            mute: false,
            colour: None,
        }
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    fn set_id(&mut self, id: EventId) {
        self.id = id;
    }

    pub fn beat(&self) -> f32 {
        self.beat
    }

    pub fn key(&self) -> i32 {
        self.key
    }

    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    pub fn is_muted(&self) -> bool {
        self.mute
    }

    pub fn colour(&self) -> Option<&str> {
        self.colour.as_deref()
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

    pub fn with_key(&self, key: i32) -> Self {
        Self {
            key,
            ..self.clone()
        }
    }

    pub fn with_velocity(&self, velocity: f32) -> Self {
        Self {
            velocity: velocity.clamp(0.0, 1.0),
            ..self.clone()
        }
    }

    pub fn with_mute(&self, mute: bool) -> Self {
        Self {
            mute,
            ..self.clone()
        }
    }

    pub fn with_colour(&self, colour: Option<String>) -> Self {
        Self {
            colour,
            ..self.clone()
        }
    }

    pub fn cmp_order(&self, other: &Self) -> Ordering {
        let beats = self
            .beat
            .partial_cmp(&other.beat)
            .unwrap_or(Ordering::Equal);
        beats.then(self.id.cmp(&other.id))
    }
}

/// A track's clips, sorted by (beat, id). Every track keeps at least one
/// clip; a freshly created pattern has one at beat 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "PatternWire", into = "PatternWire")]
pub struct Pattern {
    clips: Vec<Clip>,
    next_id: u32,
}

// equality is over the clips; the id counter is session state
impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.clips == other.clips
    }
}

impl Pattern {
    pub fn new() -> Self {
        let mut pattern = Self {
            clips: Vec::new(),
            next_id: 1,
        };
        let id = pattern.new_clip_id();
        pattern.insert(Clip::new(id, 0.0));
        pattern
    }

    pub fn new_clip_id(&mut self) -> EventId {
        let id = EventId::new(self.next_id);
        self.next_id = self.next_id.wrapping_add(1).max(1);
        id
    }

    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn index_of_sorted(&self, target: &Clip) -> Option<usize> {
        self.clips
            .binary_search_by(|probe| probe.cmp_order(target))
            .ok()
    }

    pub fn find_by_id(&self, id: EventId) -> Option<&Clip> {
        self.clips.iter().find(|c| c.id() == id)
    }

    pub fn insert(&mut self, clip: Clip) -> bool {
        self.next_id = self.next_id.max(clip.id().raw().wrapping_add(1).max(1));
        match self.clips.binary_search_by(|probe| probe.cmp_order(&clip)) {
            Ok(_) => false,
            Err(at) => {
                self.clips.insert(at, clip);
                true
            }
        }
    }

    /// Removes by sorted lookup. The last clip of a pattern cannot be
    /// removed.
    pub fn remove(&mut self, target: &Clip) -> bool {
        if self.clips.len() <= 1 {
            return false;
        }
        match self.index_of_sorted(target) {
            Some(at) => {
                self.clips.remove(at);
                true
            }
            None => false,
        }
    }

    pub fn change(&mut self, before: &Clip, after: &Clip) -> bool {
        if before.id() != after.id() {
            debug_assert!(false, "change must preserve the clip id");
            return false;
        }
        let Some(at) = self.index_of_sorted(before) else {
            return false;
        };
        if before.cmp_order(after) == Ordering::Equal {
            self.clips[at] = after.clone();
        } else {
            self.clips.remove(at);
            let to = self
                .clips
                .binary_search_by(|probe| probe.cmp_order(after))
                .unwrap_err();
            self.clips.insert(to, after.clone());
        }
        true
    }

    /// Swaps in a whole new clip list (checkout, stash restore), keeping
    /// the id counter ahead of everything ever seen here.
    pub fn replace_clips(&mut self, clips: Vec<Clip>) {
        self.clips = clips;
        self.clips.sort_by(|a, b| a.cmp_order(b));
        for clip in &self.clips {
            self.next_id = self.next_id.max(clip.id().raw().wrapping_add(1).max(1));
        }
        if self.clips.is_empty() {
            let id = self.new_clip_id();
            self.clips.push(Clip::new(id, 0.0));
        }
    }

    /// Post-deserialization cleanup: sort, re-identify colliding clip ids,
    /// and make sure at least one clip exists.
    pub fn normalize(&mut self) -> usize {
        self.clips.sort_by(|a, b| a.cmp_order(b));
        let mut max_id = 0u32;
        for clip in &self.clips {
            max_id = max_id.max(clip.id().raw());
        }
        self.next_id = max_id.wrapping_add(1).max(1);

        let mut seen = std::collections::HashSet::new();
        let mut repaired = 0;
        for at in 0..self.clips.len() {
            if !seen.insert(self.clips[at].id().raw()) {
                let fresh = self.new_clip_id();
                self.clips[at].set_id(fresh);
                seen.insert(fresh.raw());
                repaired += 1;
            }
        }
        if repaired > 0 {
            self.clips.sort_by(|a, b| a.cmp_order(b));
        }
        if self.clips.is_empty() {
            let id = self.new_clip_id();
            self.clips.push(Clip::new(id, 0.0));
        }
        repaired
    }
}

impl Default for Pattern {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize, Deserialize)]
struct ClipWire {
    id: EventId,
    at: i32,
    #[serde(default, skip_serializing_if = "is_zero")]
    key: i32,
    #[serde(default = "full_velocity", skip_serializing_if = "is_full_velocity")]
    vol: i32,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    mute: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    colour: Option<String>,
}

fn is_zero(key: &i32) -> bool {
    *key == 0
}

fn full_velocity() -> i32 {
    velocity_to_wire(1.0)
}

fn is_full_velocity(vol: &i32) -> bool {
    *vol == full_velocity()
}

impl From<ClipWire> for Clip {
    fn from(wire: ClipWire) -> Self {
        Clip::new(wire.id, ticks_to_beat(wire.at))
            .with_key(wire.key)
            .with_velocity(velocity_from_wire(wire.vol))
            .with_mute(wire.mute)
            .with_colour(wire.colour)
    }
}

impl From<Clip> for ClipWire {
    fn from(clip: Clip) -> Self {
        Self {
            id: clip.id,
            at: beat_to_ticks(clip.beat),
            key: clip.key,
            vol: velocity_to_wire(clip.velocity),
            mute: clip.mute,
            colour: clip.colour,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(transparent)]
struct PatternWire {
    clips: Vec<Clip>,
}

impl From<PatternWire> for Pattern {
    fn from(wire: PatternWire) -> Self {
        let mut pattern = Pattern {
            clips: wire.clips,
            next_id: 1,
        };
        pattern.normalize();
        pattern
    }
}

impl From<Pattern> for PatternWire {
    fn from(pattern: Pattern) -> Self {
        Self {
            clips: pattern.clips,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_pattern_has_one_clip_at_zero() {
        let pattern = Pattern::new();
        assert_eq!(1, pattern.len());
        assert_eq!(0.0, pattern.clips()[0].beat());
    }

    #[test]
    fn clips_stay_sorted_and_last_clip_stays() {
        let mut pattern = Pattern::new();
        let id = pattern.new_clip_id();
        assert!(pattern.insert(Clip::new(id, 4.0).with_key(-12)));
        let id = pattern.new_clip_id();
        assert!(pattern.insert(Clip::new(id, 2.0)));

        let beats: Vec<f32> = pattern.clips().iter().map(|c| c.beat()).collect();
        assert_eq!(vec![0.0, 2.0, 4.0], beats);

        let clips: Vec<Clip> = pattern.clips().to_vec();
        assert!(pattern.remove(&clips[2]));
        assert!(pattern.remove(&clips[1]));
        assert!(!pattern.remove(&clips[0]), "the last clip must stay");
    }

    #[test]
    fn change_moves_clip() {
        let mut pattern = Pattern::new();
        let id = pattern.new_clip_id();
        let late = Clip::new(id, 8.0);
        assert!(pattern.insert(late.clone()));
        let earlier = late.with_beat(0.5);
        assert!(pattern.change(&late, &earlier));
        assert_eq!(0.5, pattern.clips()[1].beat());
    }
}

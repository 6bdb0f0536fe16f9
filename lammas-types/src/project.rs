//! The top-level aggregate: project metadata, the active temperament and
//! keyboard mapping, and the ordered track list.

use serde::{Deserialize, Serialize};

use crate::ids::TrackId;
use crate::music::{KeyboardMapping, Temperament};
use crate::track::MidiTrack;

/// Project metadata. Tracked by version control as a pseudo-item under its
/// own id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub id: TrackId,
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub license: String,
    /// Creation time, seconds since the epoch.
    pub created_at: i64,
}

impl ProjectInfo {
    pub fn new(title: impl Into<String>, created_at: i64) -> Self {
        Self {
            id: TrackId::random(),
            title: title.into(),
            author: String::new(),
            description: String::new(),
            license: String::new(),
            created_at,
        }
    }
}

/// The in-memory project: uniquely owns its tracks, which own their
/// sequences and patterns. Everything below reaches back up through id
/// lookups, never through parent pointers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub info: ProjectInfo,
    pub temperament: Temperament,
    #[serde(default)]
    pub keyboard_mapping: KeyboardMapping,
    tracks: Vec<MidiTrack>,
}

impl Project {
    pub fn new(title: impl Into<String>, created_at: i64) -> Self {
        Self {
            info: ProjectInfo::new(title, created_at),
            temperament: Temperament::default(),
            keyboard_mapping: KeyboardMapping::default(),
            tracks: Vec::new(),
        }
    }

    pub fn tracks(&self) -> &[MidiTrack] {
        &self.tracks
    }

    pub fn tracks_mut(&mut self) -> &mut [MidiTrack] {
        &mut self.tracks
    }

    pub fn track(&self, id: TrackId) -> Option<&MidiTrack> {
        self.tracks.iter().find(|t| t.id() == id)
    }

    pub fn track_mut(&mut self, id: TrackId) -> Option<&mut MidiTrack> {
        self.tracks.iter_mut().find(|t| t.id() == id)
    }

    pub fn position_of(&self, id: TrackId) -> Option<usize> {
        self.tracks.iter().position(|t| t.id() == id)
    }

    /// Inserts at the given position (clamped to the end). False when a
    /// track with the same id is already here.
    pub fn add_track(&mut self, track: MidiTrack, position: usize) -> bool {
        if self.track(track.id()).is_some() {
            debug_assert!(false, "duplicate track id: {}", track.id());
            return false;
        }
        let at = position.min(self.tracks.len());
        self.tracks.insert(at, track);
        true
    }

    pub fn remove_track(&mut self, id: TrackId) -> Option<MidiTrack> {
        let at = self.position_of(id)?;
        Some(self.tracks.remove(at))
    }

    pub fn clear_tracks(&mut self) {
        self.tracks.clear();
    }

    /// Moves all tracks out, leaving the project empty; used by checkout to
    /// rebuild the track list while keeping the surviving track objects
    /// (and their id history) alive.
    pub fn take_tracks(&mut self) -> Vec<MidiTrack> {
        std::mem::take(&mut self.tracks)
    }

    /// Repairs event and clip id collisions in every sequence; returns how
    /// many ids had to be reassigned.
    pub fn repair_ids(&mut self) -> usize {
        let mut repaired = 0;
        for track in &mut self.tracks {
            repaired += track.sequence_mut().normalize();
            repaired += track.pattern_mut().normalize();
        }
        repaired
    }

    /// End of the last event over all tracks, in beats.
    pub fn last_beat(&self) -> f32 {
        self.tracks
            .iter()
            .filter_map(|t| {
                let events_end = t.sequence().last_beat()?;
                let clips_start = t.pattern().clips().last().map_or(0.0, |c| c.beat());
                Some(events_end + clips_start)
            })
            .fold(0.0, f32::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::TrackKind;

    #[test]
    fn track_ordering_and_lookup() {
        let mut project = Project::new("Test", 0);
        let first = MidiTrack::new(TrackKind::Piano, "One");
        let second = MidiTrack::new(TrackKind::Piano, "Two");
        let first_id = first.id();
        let second_id = second.id();

        assert!(project.add_track(first, usize::MAX));
        assert!(project.add_track(second, 0));
        assert_eq!(Some(1), project.position_of(first_id));
        assert_eq!(Some(0), project.position_of(second_id));
        assert_eq!("One", project.track(first_id).unwrap().name());

        let removed = project.remove_track(second_id).unwrap();
        assert_eq!("Two", removed.name());
        assert_eq!(None, project.track(second_id));
    }
}

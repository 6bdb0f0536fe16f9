//! Change notifications emitted by the editing layer.

use crate::events::MidiEvent;
use crate::ids::TrackId;
use crate::pattern::Clip;

/// What just changed in the project. The editing layer appends these to a
/// change log in operation order; consumers (rolls, the VCS dirty flag)
/// drain the log after each editing call. Consumers never mutate the
/// project while reacting.
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectEvent {
    EventAdded {
        track: TrackId,
        event: MidiEvent,
    },
    EventChanged {
        track: TrackId,
        before: MidiEvent,
        after: MidiEvent,
    },
    EventRemoved {
        track: TrackId,
        event: MidiEvent,
    },
    /// Sent once after a removal batch, when the sequence is settled.
    EventsRemoveFinished {
        track: TrackId,
    },
    ClipAdded {
        track: TrackId,
        clip: Clip,
    },
    ClipChanged {
        track: TrackId,
        before: Clip,
        after: Clip,
    },
    ClipRemoved {
        track: TrackId,
        clip: Clip,
    },
    TrackAdded(TrackId),
    TrackRemoved(TrackId),
    /// A track property (name, colour, channel...) changed.
    TrackChanged(TrackId),
    InfoChanged,
}

impl ProjectEvent {
    /// The track the notification concerns, if any.
    pub fn track(&self) -> Option<TrackId> {
        match self {
            Self::EventAdded { track, .. }
            | Self::EventChanged { track, .. }
            | Self::EventRemoved { track, .. }
            | Self::EventsRemoveFinished { track }
            | Self::ClipAdded { track, .. }
            | Self::ClipChanged { track, .. }
            | Self::ClipRemoved { track, .. } => Some(*track),
            Self::TrackAdded(track) | Self::TrackRemoved(track) | Self::TrackChanged(track) => {
                Some(*track)
            }
            Self::InfoChanged => None,
        }
    }
}

//! The reversible action kinds.
//!
//! Every edit is one of these variants; `perform` applies it to the project
//! and `undo` is its exact inverse. Actions find their sequence through a
//! track-id lookup at call time, so they stay valid across undo/redo of
//! track insertions and removals. All variants serialize: the undo history
//! is part of the project file.

use serde::{Deserialize, Serialize};

use lammas_types::{Clip, MidiEvent, MidiTrack, Project, ProjectEvent, TrackId};

/// The mutable scalar properties of a track, captured as one value so a
/// property edit is a single reversible action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackProperties {
    pub name: String,
    pub colour: String,
    pub channel: u8,
    pub controller_number: i32,
    pub instrument_id: String,
}

impl TrackProperties {
    pub fn of(track: &MidiTrack) -> Self {
        Self {
            name: track.name().to_string(),
            colour: track.colour().to_string(),
            channel: track.channel(),
            controller_number: track.controller_number(),
            instrument_id: track.instrument_id().to_string(),
        }
    }

    fn apply_to(&self, track: &mut MidiTrack) {
        track.set_name(self.name.clone());
        track.set_colour(self.colour.clone());
        track.set_channel(self.channel);
        track.set_controller_number(self.controller_number);
        track.set_instrument_id(self.instrument_id.clone());
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum UndoAction {
    EventInsert {
        track: TrackId,
        event: MidiEvent,
    },
    EventRemove {
        track: TrackId,
        event: MidiEvent,
    },
    EventChange {
        track: TrackId,
        before: MidiEvent,
        after: MidiEvent,
    },
    EventsGroupInsert {
        track: TrackId,
        events: Vec<MidiEvent>,
    },
    EventsGroupRemove {
        track: TrackId,
        events: Vec<MidiEvent>,
    },
    EventsGroupChange {
        track: TrackId,
        before: Vec<MidiEvent>,
        after: Vec<MidiEvent>,
    },
    ClipInsert {
        track: TrackId,
        clip: Clip,
    },
    ClipRemove {
        track: TrackId,
        clip: Clip,
    },
    ClipChange {
        track: TrackId,
        before: Clip,
        after: Clip,
    },
    TrackInsert {
        track: Box<MidiTrack>,
        position: usize,
    },
    TrackRemove {
        track: Box<MidiTrack>,
        position: usize,
    },
    TrackChangeProperties {
        track: TrackId,
        before: TrackProperties,
        after: TrackProperties,
    },
}

impl UndoAction {
    pub fn perform(&self, project: &mut Project, changes: &mut Vec<ProjectEvent>) -> bool {
        match self {
            Self::EventInsert { track, event } => insert_event(project, *track, event, changes),
            Self::EventRemove { track, event } => remove_event(project, *track, event, changes),
            Self::EventChange {
                track,
                before,
                after,
            } => change_event(project, *track, before, after, changes),
            Self::EventsGroupInsert { track, events } => {
                insert_event_group(project, *track, events, changes)
            }
            Self::EventsGroupRemove { track, events } => {
                remove_event_group(project, *track, events, changes)
            }
            Self::EventsGroupChange {
                track,
                before,
                after,
            } => change_event_group(project, *track, before, after, changes),
            Self::ClipInsert { track, clip } => insert_clip(project, *track, clip, changes),
            Self::ClipRemove { track, clip } => remove_clip(project, *track, clip, changes),
            Self::ClipChange {
                track,
                before,
                after,
            } => change_clip(project, *track, before, after, changes),
            Self::TrackInsert { track, position } => {
                insert_track(project, track, *position, changes)
            }
            Self::TrackRemove { track, .. } => remove_track(project, track.id(), changes),
            Self::TrackChangeProperties { track, after, .. } => {
                change_track_properties(project, *track, after, changes)
            }
        }
    }

    pub fn undo(&self, project: &mut Project, changes: &mut Vec<ProjectEvent>) -> bool {
        match self {
            Self::EventInsert { track, event } => remove_event(project, *track, event, changes),
            Self::EventRemove { track, event } => insert_event(project, *track, event, changes),
            Self::EventChange {
                track,
                before,
                after,
            } => change_event(project, *track, after, before, changes),
            Self::EventsGroupInsert { track, events } => {
                remove_event_group(project, *track, events, changes)
            }
            Self::EventsGroupRemove { track, events } => {
                insert_event_group(project, *track, events, changes)
            }
            Self::EventsGroupChange {
                track,
                before,
                after,
            } => change_event_group(project, *track, after, before, changes),
            Self::ClipInsert { track, clip } => remove_clip(project, *track, clip, changes),
            Self::ClipRemove { track, clip } => insert_clip(project, *track, clip, changes),
            Self::ClipChange {
                track,
                before,
                after,
            } => change_clip(project, *track, after, before, changes),
            Self::TrackInsert { track, .. } => remove_track(project, track.id(), changes),
            Self::TrackRemove { track, position } => {
                insert_track(project, track, *position, changes)
            }
            Self::TrackChangeProperties { track, before, .. } => {
                change_track_properties(project, *track, before, changes)
            }
        }
    }

    /// Rough memory weight used for the stack budget.
    pub fn size_in_units(&self) -> usize {
        match self {
            Self::EventInsert { .. } | Self::EventRemove { .. } => 1,
            Self::EventChange { .. } => 2,
            Self::EventsGroupInsert { events, .. } | Self::EventsGroupRemove { events, .. } => {
                events.len()
            }
            Self::EventsGroupChange { before, .. } => before.len() * 2,
            Self::ClipInsert { .. } | Self::ClipRemove { .. } => 1,
            Self::ClipChange { .. } => 2,
            Self::TrackInsert { track, .. } | Self::TrackRemove { track, .. } => {
                8 + track.sequence().len() + track.pattern().len()
            }
            Self::TrackChangeProperties { .. } => 2,
        }
    }

    /// Merges this action with the one performed right after it, when both
    /// target the same thing. The merged action keeps the original
    /// before-image and the newest after-image. Group actions never
    /// coalesce.
    pub fn coalesced_with(&self, next: &UndoAction) -> Option<UndoAction> {
        match (self, next) {
            (
                Self::EventChange { track, before, .. },
                Self::EventChange {
                    track: next_track,
                    before: next_before,
                    after,
                },
            ) if track == next_track && before.id() == next_before.id() => {
                Some(Self::EventChange {
                    track: *track,
                    before: before.clone(),
                    after: after.clone(),
                })
            }
            (
                Self::ClipChange { track, before, .. },
                Self::ClipChange {
                    track: next_track,
                    before: next_before,
                    after,
                },
            ) if track == next_track && before.id() == next_before.id() => {
                Some(Self::ClipChange {
                    track: *track,
                    before: before.clone(),
                    after: after.clone(),
                })
            }
            (
                Self::TrackChangeProperties { track, before, .. },
                Self::TrackChangeProperties {
                    track: next_track,
                    after,
                    ..
                },
            ) if track == next_track => Some(Self::TrackChangeProperties {
                track: *track,
                before: before.clone(),
                after: after.clone(),
            }),
            _ => None,
        }
    }
}

//===----------------------------------------------------------------===//
// The non-undoable primitives; the document uses these directly when
// an edit is performed with undoable = false
//===----------------------------------------------------------------===//

pub(crate) fn insert_event(
    project: &mut Project,
    track: TrackId,
    event: &MidiEvent,
    changes: &mut Vec<ProjectEvent>,
) -> bool {
    let Some(t) = project.track_mut(track) else {
        return false;
    };
    if t.sequence_mut().insert(event.clone()) {
        changes.push(ProjectEvent::EventAdded {
            track,
            event: event.clone(),
        });
        true
    } else {
        false
    }
}

pub(crate) fn remove_event(
    project: &mut Project,
    track: TrackId,
    event: &MidiEvent,
    changes: &mut Vec<ProjectEvent>,
) -> bool {
    let Some(t) = project.track_mut(track) else {
        return false;
    };
    if t.sequence_mut().remove(event) {
        changes.push(ProjectEvent::EventRemoved {
            track,
            event: event.clone(),
        });
        changes.push(ProjectEvent::EventsRemoveFinished { track });
        true
    } else {
        false
    }
}

pub(crate) fn change_event(
    project: &mut Project,
    track: TrackId,
    before: &MidiEvent,
    after: &MidiEvent,
    changes: &mut Vec<ProjectEvent>,
) -> bool {
    let Some(t) = project.track_mut(track) else {
        return false;
    };
    if t.sequence_mut().change(before, after) {
        changes.push(ProjectEvent::EventChanged {
            track,
            before: before.clone(),
            after: after.clone(),
        });
        true
    } else {
        false
    }
}

pub(crate) fn insert_event_group(
    project: &mut Project,
    track: TrackId,
    events: &[MidiEvent],
    changes: &mut Vec<ProjectEvent>,
) -> bool {
    let Some(t) = project.track_mut(track) else {
        return false;
    };
    // the sequence validates the whole batch before touching anything, so
    // a false return here means no mutation happened
    if !t.sequence_mut().insert_group(events.to_vec()) {
        return false;
    }
    for event in events {
        changes.push(ProjectEvent::EventAdded {
            track,
            event: event.clone(),
        });
    }
    true
}

pub(crate) fn remove_event_group(
    project: &mut Project,
    track: TrackId,
    events: &[MidiEvent],
    changes: &mut Vec<ProjectEvent>,
) -> bool {
    let Some(t) = project.track_mut(track) else {
        return false;
    };
    if !t.sequence_mut().remove_group(events) {
        return false;
    }
    for event in events {
        changes.push(ProjectEvent::EventRemoved {
            track,
            event: event.clone(),
        });
    }
    changes.push(ProjectEvent::EventsRemoveFinished { track });
    true
}

pub(crate) fn change_event_group(
    project: &mut Project,
    track: TrackId,
    before: &[MidiEvent],
    after: &[MidiEvent],
    changes: &mut Vec<ProjectEvent>,
) -> bool {
    let Some(t) = project.track_mut(track) else {
        return false;
    };
    if !t.sequence_mut().change_group(before, after) {
        return false;
    }
    for (b, a) in before.iter().zip(after.iter()) {
        changes.push(ProjectEvent::EventChanged {
            track,
            before: b.clone(),
            after: a.clone(),
        });
    }
    true
}

pub(crate) fn insert_clip(
    project: &mut Project,
    track: TrackId,
    clip: &Clip,
    changes: &mut Vec<ProjectEvent>,
) -> bool {
    let Some(t) = project.track_mut(track) else {
        return false;
    };
    if t.pattern_mut().insert(clip.clone()) {
        changes.push(ProjectEvent::ClipAdded {
            track,
            clip: clip.clone(),
        });
        true
    } else {
        false
    }
}

pub(crate) fn remove_clip(
    project: &mut Project,
    track: TrackId,
    clip: &Clip,
    changes: &mut Vec<ProjectEvent>,
) -> bool {
    let Some(t) = project.track_mut(track) else {
        return false;
    };
    if t.pattern_mut().remove(clip) {
        changes.push(ProjectEvent::ClipRemoved {
            track,
            clip: clip.clone(),
        });
        true
    } else {
        false
    }
}

pub(crate) fn change_clip(
    project: &mut Project,
    track: TrackId,
    before: &Clip,
    after: &Clip,
    changes: &mut Vec<ProjectEvent>,
) -> bool {
    let Some(t) = project.track_mut(track) else {
        return false;
    };
    if t.pattern_mut().change(before, after) {
        changes.push(ProjectEvent::ClipChanged {
            track,
            before: before.clone(),
            after: after.clone(),
        });
        true
    } else {
        false
    }
}

pub(crate) fn insert_track(
    project: &mut Project,
    track: &MidiTrack,
    position: usize,
    changes: &mut Vec<ProjectEvent>,
) -> bool {
    let id = track.id();
    if project.add_track(track.clone(), position) {
        changes.push(ProjectEvent::TrackAdded(id));
        true
    } else {
        false
    }
}

pub(crate) fn remove_track(
    project: &mut Project,
    track: TrackId,
    changes: &mut Vec<ProjectEvent>,
) -> bool {
    if project.remove_track(track).is_some() {
        changes.push(ProjectEvent::TrackRemoved(track));
        true
    } else {
        false
    }
}

pub(crate) fn change_track_properties(
    project: &mut Project,
    track: TrackId,
    properties: &TrackProperties,
    changes: &mut Vec<ProjectEvent>,
) -> bool {
    let Some(t) = project.track_mut(track) else {
        return false;
    };
    properties.apply_to(t);
    changes.push(ProjectEvent::TrackChanged(track));
    true
}

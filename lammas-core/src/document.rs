//! The project document: the data model plus its undo stack and version
//! control, behind one editing API.
//!
//! Every mutation flows the same way: the call builds an `UndoAction`,
//! the stack performs it, the sequence mutates and appends change
//! notifications, and the VCS diff flag goes stale. Passing
//! `undoable = false` skips the stack (used by import and checkout code)
//! but keeps the notifications and the dirty flag honest.

use std::time::{SystemTime, UNIX_EPOCH};

use lammas_types::{
    AnnotationEvent, AutomationEvent, Clip, EventKind, KeySignatureEvent, MidiEvent, MidiTrack,
    Note, Project, ProjectEvent, Scale, TimeSignatureEvent, TrackId, TrackKind,
    TEMPO_CC,
};

use crate::config::Config;
use crate::undo::{actions, TrackProperties, UndoAction, UndoStack};
use crate::vcs::{RevisionId, VersionControl};

pub struct ProjectDocument {
    pub project: Project,
    pub undo: UndoStack,
    pub vcs: VersionControl,
    changes: Vec<ProjectEvent>,
}

impl ProjectDocument {
    pub fn new(title: &str) -> Self {
        Self::with_config(title, &Config::default())
    }

    /// A fresh project seeded the usual way: one piano track, a tempo
    /// track at 120 BPM, default key and time signatures and an empty
    /// annotations track, all recorded as the initial commit.
    pub fn with_config(title: &str, config: &Config) -> Self {
        let mut project = Project::new(title, unix_timestamp());
        project.temperament = config.default_temperament();

        let mut piano = MidiTrack::new(TrackKind::Piano, "Piano");
        piano.set_colour("#f5a623");
        project.add_track(piano, usize::MAX);

        let mut tempo = MidiTrack::new(TrackKind::Automation, "Tempo");
        tempo.set_controller_number(TEMPO_CC);
        {
            let seq = tempo.sequence_mut();
            let id = seq.new_event_id();
            seq.insert(AutomationEvent::tempo(id, 0.0, 120.0).into());
        }
        project.add_track(tempo, usize::MAX);

        let mut key_signatures = MidiTrack::new(TrackKind::KeySignatures, "Key signatures");
        {
            let seq = key_signatures.sequence_mut();
            let id = seq.new_event_id();
            seq.insert(KeySignatureEvent::new(id, 0.0, 0, Scale::natural_major()).into());
        }
        project.add_track(key_signatures, usize::MAX);

        let mut time_signatures = MidiTrack::new(TrackKind::TimeSignatures, "Time signatures");
        {
            let seq = time_signatures.sequence_mut();
            let id = seq.new_event_id();
            seq.insert(TimeSignatureEvent::common_time(id, 0.0).into());
        }
        project.add_track(time_signatures, usize::MAX);

        project.add_track(
            MidiTrack::new(TrackKind::Annotations, "Annotations"),
            usize::MAX,
        );

        let vcs = VersionControl::new(&project);
        Self {
            project,
            undo: UndoStack::new(config.undo_max_units()),
            vcs,
            changes: Vec::new(),
        }
    }

    /// Reassembles a document from deserialized parts (see persistence).
    pub(crate) fn from_parts(project: Project, undo: UndoStack, vcs: VersionControl) -> Self {
        Self {
            project,
            undo,
            vcs,
            changes: Vec::new(),
        }
    }

    /// Change notifications accumulated since the last drain, in operation
    /// order.
    pub fn drain_changes(&mut self) -> Vec<ProjectEvent> {
        std::mem::take(&mut self.changes)
    }

    //===------------------------------------------------------------===//
    // Undo plumbing
    //===------------------------------------------------------------===//

    /// Starts a new undo step; edits performed after this group together
    /// until the next checkpoint.
    pub fn checkpoint(&mut self) {
        self.undo.checkpoint();
    }

    pub fn undo(&mut self) -> bool {
        let done = self.undo.undo(&mut self.project, &mut self.changes);
        if done {
            self.vcs.on_project_changed();
        }
        done
    }

    pub fn redo(&mut self) -> bool {
        let done = self.undo.redo(&mut self.project, &mut self.changes);
        if done {
            self.vcs.on_project_changed();
        }
        done
    }

    fn run(&mut self, action: UndoAction, undoable: bool) -> bool {
        let done = if undoable {
            self.undo
                .perform(action, &mut self.project, &mut self.changes)
        } else {
            action.perform(&mut self.project, &mut self.changes)
        };
        if done {
            self.vcs.on_project_changed();
        }
        done
    }

    //===------------------------------------------------------------===//
    // Event editing
    //===------------------------------------------------------------===//

    /// Creates a note on a piano track, drawing a fresh id from the
    /// track's sequence.
    pub fn add_note(
        &mut self,
        track: TrackId,
        key: i32,
        beat: f32,
        length: f32,
        velocity: f32,
    ) -> Option<Note> {
        let t = self.project.track_mut(track)?;
        if t.kind() != TrackKind::Piano {
            return None;
        }
        let id = t.sequence_mut().new_event_id();
        let note = Note::new(id, key, beat, length, velocity);
        self.insert_event(track, note.into(), true).then_some(note)
    }

    pub fn add_annotation(
        &mut self,
        track: TrackId,
        beat: f32,
        description: &str,
        colour: &str,
    ) -> Option<AnnotationEvent> {
        let t = self.project.track_mut(track)?;
        if t.kind() != TrackKind::Annotations {
            return None;
        }
        let id = t.sequence_mut().new_event_id();
        let event = AnnotationEvent::new(id, beat, description, colour);
        self.insert_event(track, event.clone().into(), true)
            .then_some(event)
    }

    pub fn add_key_signature(
        &mut self,
        track: TrackId,
        beat: f32,
        root_key: i32,
        scale: Scale,
    ) -> Option<KeySignatureEvent> {
        let t = self.project.track_mut(track)?;
        if t.kind() != TrackKind::KeySignatures {
            return None;
        }
        let id = t.sequence_mut().new_event_id();
        let event = KeySignatureEvent::new(id, beat, root_key, scale);
        self.insert_event(track, event.clone().into(), true)
            .then_some(event)
    }

    pub fn add_time_signature(
        &mut self,
        track: TrackId,
        beat: f32,
        numerator: u8,
        denominator: u8,
    ) -> Option<TimeSignatureEvent> {
        let t = self.project.track_mut(track)?;
        if t.kind() != TrackKind::TimeSignatures {
            return None;
        }
        let id = t.sequence_mut().new_event_id();
        let event = TimeSignatureEvent::new(id, beat, numerator, denominator);
        self.insert_event(track, event.into(), true).then_some(event)
    }

    pub fn add_automation_event(
        &mut self,
        track: TrackId,
        beat: f32,
        value: f32,
    ) -> Option<AutomationEvent> {
        let t = self.project.track_mut(track)?;
        if t.kind() != TrackKind::Automation {
            return None;
        }
        let id = t.sequence_mut().new_event_id();
        let event = AutomationEvent::new(id, beat, value);
        self.insert_event(track, event.into(), true).then_some(event)
    }

    pub fn insert_event(&mut self, track: TrackId, event: MidiEvent, undoable: bool) -> bool {
        if !self.event_fits(track, &event) {
            return false;
        }
        self.run(UndoAction::EventInsert { track, event }, undoable)
    }

    pub fn remove_event(&mut self, track: TrackId, event: MidiEvent, undoable: bool) -> bool {
        self.run(UndoAction::EventRemove { track, event }, undoable)
    }

    /// Replaces `before` with `after` (same id). Passing an unchanged
    /// event is a successful no-op that leaves the undo stack alone.
    pub fn change_event(
        &mut self,
        track: TrackId,
        before: MidiEvent,
        after: MidiEvent,
        undoable: bool,
    ) -> bool {
        if before == after {
            return true;
        }
        self.run(
            UndoAction::EventChange {
                track,
                before,
                after,
            },
            undoable,
        )
    }

    pub fn insert_event_group(
        &mut self,
        track: TrackId,
        events: Vec<MidiEvent>,
        undoable: bool,
    ) -> bool {
        if events.is_empty() || !events.iter().all(|e| self.event_fits(track, e)) {
            return false;
        }
        self.run(UndoAction::EventsGroupInsert { track, events }, undoable)
    }

    pub fn remove_event_group(
        &mut self,
        track: TrackId,
        events: Vec<MidiEvent>,
        undoable: bool,
    ) -> bool {
        if events.is_empty() {
            return false;
        }
        self.run(UndoAction::EventsGroupRemove { track, events }, undoable)
    }

    pub fn change_event_group(
        &mut self,
        track: TrackId,
        before: Vec<MidiEvent>,
        after: Vec<MidiEvent>,
        undoable: bool,
    ) -> bool {
        if before.len() != after.len() || before.is_empty() {
            return false;
        }
        if before == after {
            return true;
        }
        self.run(
            UndoAction::EventsGroupChange {
                track,
                before,
                after,
            },
            undoable,
        )
    }

    fn event_fits(&self, track: TrackId, event: &MidiEvent) -> bool {
        let Some(t) = self.project.track(track) else {
            return false;
        };
        matches!(
            (t.kind(), event.kind()),
            (TrackKind::Piano, EventKind::Note)
                | (TrackKind::Automation, EventKind::Auto)
                | (TrackKind::Annotations, EventKind::Annotation)
                | (TrackKind::KeySignatures, EventKind::KeySignature)
                | (TrackKind::TimeSignatures, EventKind::TimeSignature)
        )
    }

    //===------------------------------------------------------------===//
    // Clip editing
    //===------------------------------------------------------------===//

    pub fn add_clip(&mut self, track: TrackId, beat: f32) -> Option<Clip> {
        let t = self.project.track_mut(track)?;
        let id = t.pattern_mut().new_clip_id();
        let clip = Clip::new(id, beat);
        self.insert_clip(track, clip.clone(), true).then_some(clip)
    }

    pub fn insert_clip(&mut self, track: TrackId, clip: Clip, undoable: bool) -> bool {
        self.run(UndoAction::ClipInsert { track, clip }, undoable)
    }

    pub fn remove_clip(&mut self, track: TrackId, clip: Clip, undoable: bool) -> bool {
        self.run(UndoAction::ClipRemove { track, clip }, undoable)
    }

    pub fn change_clip(
        &mut self,
        track: TrackId,
        before: Clip,
        after: Clip,
        undoable: bool,
    ) -> bool {
        if before == after {
            return true;
        }
        self.run(
            UndoAction::ClipChange {
                track,
                before,
                after,
            },
            undoable,
        )
    }

    //===------------------------------------------------------------===//
    // Track editing
    //===------------------------------------------------------------===//

    pub fn add_track(&mut self, kind: TrackKind, name: &str, undoable: bool) -> Option<TrackId> {
        let track = MidiTrack::new(kind, name);
        let id = track.id();
        let position = self.project.tracks().len();
        self.run(
            UndoAction::TrackInsert {
                track: Box::new(track),
                position,
            },
            undoable,
        )
        .then_some(id)
    }

    pub fn remove_track(&mut self, track: TrackId, undoable: bool) -> bool {
        let Some(position) = self.project.position_of(track) else {
            return false;
        };
        let snapshot = self.project.tracks()[position].clone();
        self.run(
            UndoAction::TrackRemove {
                track: Box::new(snapshot),
                position,
            },
            undoable,
        )
    }

    pub fn change_track_properties(
        &mut self,
        track: TrackId,
        after: TrackProperties,
        undoable: bool,
    ) -> bool {
        let Some(t) = self.project.track(track) else {
            return false;
        };
        let before = TrackProperties::of(t);
        if before == after {
            return true;
        }
        self.run(
            UndoAction::TrackChangeProperties {
                track,
                before,
                after,
            },
            undoable,
        )
    }

    pub fn rename_track(&mut self, track: TrackId, name: &str, undoable: bool) -> bool {
        let Some(t) = self.project.track(track) else {
            return false;
        };
        let mut after = TrackProperties::of(t);
        after.name = name.to_string();
        self.change_track_properties(track, after, undoable)
    }

    //===------------------------------------------------------------===//
    // Version control entry points that touch the whole document
    //===------------------------------------------------------------===//

    /// Checks out a revision and drops the local editing state: undo
    /// history and pending changes make no sense across a checkout.
    pub fn checkout(&mut self, revision: RevisionId) -> bool {
        if !self.vcs.checkout(&mut self.project, revision, None) {
            return false;
        }
        self.undo.clear();
        self.changes.clear();
        true
    }

    /// Convenience passthrough used by hosts that only ever commit
    /// everything at once.
    pub fn commit_all(&mut self, message: &str) -> bool {
        self.vcs.commit_all(&self.project, message)
    }

    /// Imports an event bypassing undo and the usual notifications; for
    /// deserialization and bulk import paths. The event must already carry
    /// an id owned by the target sequence.
    pub fn silent_import(&mut self, track: TrackId, event: MidiEvent) -> bool {
        let done = actions::insert_event(&mut self.project, track, &event, &mut Vec::new());
        if done {
            self.vcs.on_project_changed();
        }
        done
    }

    /// First piano track, where most hosts start editing.
    pub fn default_piano_track(&self) -> Option<TrackId> {
        self.project
            .tracks()
            .iter()
            .find(|t| t.kind() == TrackKind::Piano)
            .map(|t| t.id())
    }
}

fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

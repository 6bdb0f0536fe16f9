//! Version control: a revision tree over the project's tracked items.
//!
//! Every commit stores per-item deltas; the head keeps a snapshot of the
//! committed state so diffs against the live project are cheap. Stashes are
//! detached revisions. The whole subsystem serializes into the project
//! file, snapshot included (rebuilding it from the root is the slow path,
//! taken only when the stored diff format version is stale).

pub mod delta;
pub mod diff;
pub mod head;
pub mod revision;
pub mod snapshot;
pub mod stashes;

use serde::{Deserialize, Serialize};

use lammas_types::{Project, TrackId};

pub use delta::Delta;
pub use head::{Head, ProgressFn};
pub use revision::{Revision, RevisionId, RevisionItem, RevisionItemKind};
pub use snapshot::{Snapshot, SnapshotItem};
pub use stashes::StashesRepository;

/// Bumped when the delta schema changes; a mismatch on load forces a
/// snapshot rebuild so new diffs use the new schema.
pub const DIFF_FORMAT_VERSION: u32 = 1;

pub const INITIAL_COMMIT_MESSAGE: &str = "Project started";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionControl {
    root: Revision,
    head: Head,
    #[serde(default)]
    stashes: StashesRepository,
    diff_format_version: u32,
}

impl VersionControl {
    /// Sets up the tree for a fresh project: a single root revision whose
    /// items record everything the project starts with.
    pub fn new(project: &Project) -> Self {
        let root = Revision::new(INITIAL_COMMIT_MESSAGE);
        let mut vcs = Self {
            head: Head::new(root.id),
            root,
            stashes: StashesRepository::default(),
            diff_format_version: DIFF_FORMAT_VERSION,
        };
        vcs.root.items = diff::diff(vcs.head.snapshot(), project);
        // revision trees are tiny next to snapshots; cloning the root for
        // the walk sidesteps aliasing between the head and the tree
        let root = vcs.root.clone();
        vcs.head.move_to(&root, root.id, None);
        vcs
    }

    pub fn root(&self) -> &Revision {
        &self.root
    }

    pub fn head(&self) -> &Head {
        &self.head
    }

    pub fn heading_revision(&self) -> RevisionId {
        self.head.heading()
    }

    pub fn find_revision(&self, id: RevisionId) -> Option<&Revision> {
        self.root.find(id)
    }

    /// Mutable access to a revision, for amending and for sync code that
    /// fills in shallow revisions later.
    pub fn find_revision_mut(&mut self, id: RevisionId) -> Option<&mut Revision> {
        self.root.find_mut(id)
    }

    /// The project changed; the next diff request recomputes.
    pub fn on_project_changed(&mut self) {
        self.head.set_diff_outdated(true);
    }

    /// The current uncommitted changes, as a revision.
    pub fn diff(&mut self, project: &Project) -> &Revision {
        self.head.diff(project)
    }

    pub fn has_changes(&mut self, project: &Project) -> bool {
        self.head.has_changes(project)
    }

    //===------------------------------------------------------------===//
    // Revisions
    //===------------------------------------------------------------===//

    /// Commits the selected diff items as a child of the heading revision
    /// and moves the head onto it. The project state itself is untouched:
    /// after a full commit the snapshot equals the project. False with
    /// nothing selected, an out-of-range index, or a detached head.
    pub fn commit(&mut self, project: &Project, indices: &[usize], message: &str) -> bool {
        if indices.is_empty() {
            return false;
        }
        let all = self.head.diff(project).items.clone();
        let mut revision = Revision::new(message);
        for &index in indices {
            let Some(item) = all.get(index) else {
                return false;
            };
            revision.add_item(item.clone());
        }

        let heading = self.head.heading();
        let Some(parent) = self.root.find_mut(heading) else {
            log::error!(target: "vcs", "heading revision {} is not in the tree", heading);
            return false;
        };
        parent.add_child(revision.clone());
        self.head.apply_commit(&revision);
        true
    }

    /// Commits every uncommitted change.
    pub fn commit_all(&mut self, project: &Project, message: &str) -> bool {
        let count = self.head.diff(project).items.len();
        let indices: Vec<usize> = (0..count).collect();
        self.commit(project, &indices, message)
    }

    /// Moves the head without touching the project.
    pub fn move_head(&mut self, revision: RevisionId) -> bool {
        let root = self.root.clone();
        self.head.move_to(&root, revision, None)
    }

    /// Checks out a revision: rebuilds the head snapshot, overwrites the
    /// project with it and discards all local changes. The caller is
    /// responsible for clearing the undo history.
    pub fn checkout(
        &mut self,
        project: &mut Project,
        revision: RevisionId,
        progress: Option<&mut ProgressFn<'_>>,
    ) -> bool {
        let root = self.root.clone();
        if !self.head.move_to(&root, revision, progress) {
            return false;
        }
        let ok = self.head.checkout(project);
        self.head.set_diff_outdated(true);
        ok
    }

    /// Applies the selected items of any revision onto the project as
    /// uncommitted changes; the head itself stays where it was.
    pub fn cherry_pick(
        &mut self,
        project: &mut Project,
        revision: RevisionId,
        item_ids: &[TrackId],
    ) -> bool {
        let Some(revision) = self.root.find(revision) else {
            return false;
        };
        let items: Vec<RevisionItem> = revision
            .items
            .iter()
            .filter(|i| item_ids.contains(&i.item_id))
            .cloned()
            .collect();
        if items.is_empty() {
            return false;
        }
        let ok = diff::apply_items(project, &items);
        self.head.set_diff_outdated(true);
        ok
    }

    /// Folds another branch's tip into the working state: every item of
    /// `revision` lands in the project as an uncommitted change.
    pub fn merge(&mut self, project: &mut Project, revision: RevisionId) -> bool {
        let Some(revision) = self.root.find(revision) else {
            return false;
        };
        let item_ids: Vec<TrackId> = revision.items.iter().map(|i| i.item_id).collect();
        let id = revision.id;
        self.cherry_pick(project, id, &item_ids)
    }

    /// Reverse-applies the selected diff items: those parts of the project
    /// return to the snapshot state exactly.
    pub fn reset_changes(&mut self, project: &mut Project, indices: &[usize]) -> bool {
        if indices.is_empty() {
            return false;
        }
        let all = self.head.diff(project).items.clone();
        let mut selected = Vec::new();
        for &index in indices {
            let Some(item) = all.get(index) else {
                return false;
            };
            selected.push(item.clone());
        }
        let ok = diff::reset_items(self.head.snapshot(), project, &selected);
        self.head.set_diff_outdated(true);
        ok
    }

    pub fn reset_all_changes(&mut self, project: &mut Project) -> bool {
        let all = self.head.diff(project).items.clone();
        let ok = diff::reset_items(self.head.snapshot(), project, &all);
        self.head.set_diff_outdated(true);
        ok
    }

    //===------------------------------------------------------------===//
    // Stashes
    //===------------------------------------------------------------===//

    pub fn stashes(&self) -> &StashesRepository {
        &self.stashes
    }

    /// Stores the selected diff items as a named stash; unless
    /// `keep_changes`, also resets them in the project.
    pub fn stash(
        &mut self,
        project: &mut Project,
        indices: &[usize],
        message: &str,
        keep_changes: bool,
    ) -> bool {
        if indices.is_empty() {
            return false;
        }
        let all = self.head.diff(project).items.clone();
        let mut stash = Revision::new(message);
        for &index in indices {
            let Some(item) = all.get(index) else {
                return false;
            };
            stash.add_item(item.clone());
        }
        let items = stash.items.clone();
        self.stashes.add_stash(stash);
        if !keep_changes {
            diff::reset_items(self.head.snapshot(), project, &items);
        }
        self.head.set_diff_outdated(true);
        true
    }

    /// Re-applies a named stash onto the project; unless `keep_stash`, the
    /// stash is dropped afterwards.
    pub fn apply_stash(&mut self, project: &mut Project, name: &str, keep_stash: bool) -> bool {
        let Some(stash) = self.stashes.user_stash_with_name(name) else {
            return false;
        };
        if stash.is_empty() {
            return false;
        }
        let items = stash.items.clone();
        let ok = diff::apply_items(project, &items);
        if !keep_stash {
            self.stashes.remove_stash(name);
        }
        self.head.set_diff_outdated(true);
        ok
    }

    pub fn has_quick_stash(&self) -> bool {
        self.stashes.has_quick_stash()
    }

    /// Captures the entire current diff into the quick-stash slot and
    /// resets all changes. False when the slot is already taken.
    pub fn quick_stash_all(&mut self, project: &mut Project) -> bool {
        if self.stashes.has_quick_stash() {
            return false;
        }
        let mut stash = Revision::new("quick stash");
        stash.items = self.head.diff(project).items.clone();
        self.stashes.store_quick_stash(stash);
        self.reset_all_changes(project)
    }

    /// Re-applies the quick stash and clears the slot.
    pub fn restore_quick_stash(&mut self, project: &mut Project) -> bool {
        let Some(quick) = self.stashes.quick_stash() else {
            return false;
        };
        // merge the stashed items into a scratch head, then check the
        // merged state out wholesale: items untouched by the stash are
        // already identical, stashed ones come back exactly
        let mut scratch = self.head.clone();
        scratch.merge_state_with(quick);
        let ok = scratch.checkout(project);
        self.stashes.reset_quick_stash();
        self.head.set_diff_outdated(true);
        ok
    }

    //===------------------------------------------------------------===//
    // Load-time repair
    //===------------------------------------------------------------===//

    /// Revalidates the deserialized state. The stored snapshot is used
    /// verbatim when the diff format version matches; otherwise (or when
    /// the head reference is unknown) the snapshot is rebuilt from the
    /// root. False means the tree itself is unusable.
    pub fn after_load(&mut self) -> bool {
        let heading = self.head.heading();
        let known = self.root.find(heading).is_some();
        if !known {
            log::error!(target: "vcs", "head revision {} unknown, falling back to root", heading);
        }
        let target = if known { heading } else { self.root.id };

        if self.diff_format_version == DIFF_FORMAT_VERSION && known {
            self.head.point_to(target);
            return true;
        }

        log::debug!(target: "vcs", "rebuilding head snapshot (stored diff format {})",
            self.diff_format_version);
        let root = self.root.clone();
        if !self.head.move_to(&root, target, None) {
            return false;
        }
        self.diff_format_version = DIFF_FORMAT_VERSION;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lammas_types::{MidiEvent, MidiTrack, Note, TrackKind};

    fn project_with_piano() -> (Project, TrackId) {
        let mut project = Project::new("VCS test", 0);
        let track = MidiTrack::new(TrackKind::Piano, "Piano");
        let id = track.id();
        project.add_track(track, 0);
        (project, id)
    }

    fn add_note(project: &mut Project, track: TrackId, key: i32, beat: f32) -> MidiEvent {
        let seq = project.track_mut(track).unwrap().sequence_mut();
        let note = MidiEvent::from(Note::new(seq.new_event_id(), key, beat, 1.0, 0.5));
        assert!(seq.insert(note.clone()));
        note
    }

    #[test]
    fn fresh_project_has_clean_diff() {
        let (project, _) = project_with_piano();
        let mut vcs = VersionControl::new(&project);
        assert!(!vcs.has_changes(&project));
        assert_eq!(INITIAL_COMMIT_MESSAGE, vcs.root().message);
        assert!(!vcs.root().is_empty());
    }

    #[test]
    fn commit_then_reset() {
        let (mut project, track) = project_with_piano();
        let mut vcs = VersionControl::new(&project);

        add_note(&mut project, track, 60, 0.0);
        add_note(&mut project, track, 64, 1.0);
        add_note(&mut project, track, 67, 2.0);
        vcs.on_project_changed();
        assert!(vcs.commit_all(&project, "add chord"));
        assert!(!vcs.has_changes(&project));

        add_note(&mut project, track, 72, 3.0);
        vcs.on_project_changed();
        assert!(vcs.has_changes(&project));
        assert!(vcs.reset_all_changes(&mut project));
        assert_eq!(3, project.track(track).unwrap().sequence().len());
        assert!(!vcs.has_changes(&project));
    }

    #[test]
    fn empty_commit_is_refused() {
        let (project, _) = project_with_piano();
        let mut vcs = VersionControl::new(&project);
        assert!(!vcs.commit_all(&project, "nothing to commit"));
    }

    #[test]
    fn checkout_restores_committed_state() {
        let (mut project, track) = project_with_piano();
        let mut vcs = VersionControl::new(&project);
        let before = vcs.heading_revision();

        let note = add_note(&mut project, track, 60, 0.0);
        vcs.on_project_changed();
        assert!(vcs.commit_all(&project, "one note"));
        let after = vcs.heading_revision();

        assert!(vcs.checkout(&mut project, before, None));
        assert!(project.track(track).unwrap().sequence().is_empty());

        assert!(vcs.checkout(&mut project, after, None));
        let events = project.track(track).unwrap().sequence().events();
        assert_eq!(1, events.len());
        assert_eq!(note.id(), events[0].id());
    }

    #[test]
    fn branch_and_merge_keeps_both_changes() {
        let (mut project, track) = project_with_piano();
        let mut vcs = VersionControl::new(&project);
        let r0 = vcs.heading_revision();

        let a = add_note(&mut project, track, 60, 0.0);
        vcs.on_project_changed();
        assert!(vcs.commit_all(&project, "add A"));
        let c1 = vcs.heading_revision();

        assert!(vcs.checkout(&mut project, r0, None));
        let b = add_note(&mut project, track, 64, 1.0);
        vcs.on_project_changed();
        assert!(vcs.commit_all(&project, "add B"));
        let c2 = vcs.heading_revision();
        assert_ne!(a.id(), b.id());

        // merge C2's changes into the C1 line
        assert!(vcs.checkout(&mut project, c1, None));
        assert!(vcs.merge(&mut project, c2));

        let events = project.track(track).unwrap().sequence().events();
        assert_eq!(2, events.len());
        let ids: Vec<_> = events.iter().map(|e| e.id()).collect();
        assert!(ids.contains(&a.id()));
        assert!(ids.contains(&b.id()));
    }

    #[test]
    fn checkout_reports_progress_and_honours_cancellation() {
        let (mut project, track) = project_with_piano();
        let mut vcs = VersionControl::new(&project);
        let r0 = vcs.heading_revision();

        add_note(&mut project, track, 60, 0.0);
        vcs.on_project_changed();
        assert!(vcs.commit_all(&project, "one note"));
        let c1 = vcs.heading_revision();

        let mut seen = Vec::new();
        let mut report = |done: usize, total: usize| {
            seen.push((done, total));
            true
        };
        assert!(vcs.checkout(&mut project, r0, Some(&mut report)));
        assert_eq!(vec![(1, 1)], seen);

        // a cancelled walk leaves the head (and the project) alone
        let mut cancel = |_: usize, _: usize| false;
        assert!(!vcs.checkout(&mut project, c1, Some(&mut cancel)));
        assert_eq!(r0, vcs.heading_revision());
        assert!(project.track(track).unwrap().sequence().is_empty());
    }

    #[test]
    fn quick_stash_round_trip() {
        let (mut project, track) = project_with_piano();
        let mut vcs = VersionControl::new(&project);

        let committed = add_note(&mut project, track, 60, 0.0);
        vcs.on_project_changed();
        assert!(vcs.commit_all(&project, "baseline"));

        // uncommitted set: one added, one changed, one removed
        let added = add_note(&mut project, track, 72, 2.0);
        let changed = match &committed {
            MidiEvent::Note(n) => MidiEvent::from(n.with_velocity(0.9)),
            _ => unreachable!(),
        };
        {
            let seq = project.track_mut(track).unwrap().sequence_mut();
            assert!(seq.change(&committed, &changed));
        }
        vcs.on_project_changed();
        let expected = project.clone();

        assert!(!vcs.has_quick_stash());
        assert!(vcs.quick_stash_all(&mut project));
        assert!(vcs.has_quick_stash());
        assert!(!vcs.has_changes(&project));
        assert!(!vcs.quick_stash_all(&mut project), "slot is exclusive");

        assert!(vcs.restore_quick_stash(&mut project));
        assert!(!vcs.has_quick_stash());
        assert_eq!(
            expected.track(track).unwrap().sequence().events(),
            project.track(track).unwrap().sequence().events()
        );
        let ids: Vec<_> = project
            .track(track)
            .unwrap()
            .sequence()
            .events()
            .iter()
            .map(|e| e.id())
            .collect();
        assert!(ids.contains(&added.id()));
    }

    #[test]
    fn named_stash_apply() {
        let (mut project, track) = project_with_piano();
        let mut vcs = VersionControl::new(&project);

        add_note(&mut project, track, 60, 0.0);
        vcs.on_project_changed();
        let count = vcs.diff(&project).items.len();
        let indices: Vec<usize> = (0..count).collect();
        assert!(vcs.stash(&mut project, &indices, "wip", false));
        assert!(project.track(track).unwrap().sequence().is_empty());
        assert_eq!(1, vcs.stashes().user_stashes().len());

        assert!(vcs.apply_stash(&mut project, "wip", false));
        assert_eq!(1, project.track(track).unwrap().sequence().len());
        assert!(vcs.stashes().user_stashes().is_empty());
    }

    #[test]
    fn cherry_pick_selects_by_item() {
        let (mut project, piano) = project_with_piano();
        let annotations = MidiTrack::new(TrackKind::Annotations, "Notes");
        let annotations_id = annotations.id();
        project.add_track(annotations, 1);
        let mut vcs = VersionControl::new(&project);
        let r0 = vcs.heading_revision();

        add_note(&mut project, piano, 60, 0.0);
        {
            let seq = project.track_mut(annotations_id).unwrap().sequence_mut();
            let id = seq.new_event_id();
            let event =
                MidiEvent::from(lammas_types::AnnotationEvent::new(id, 0.0, "Intro", "#ff0000"));
            assert!(seq.insert(event));
        }
        vcs.on_project_changed();
        assert!(vcs.commit_all(&project, "both tracks"));
        let c1 = vcs.heading_revision();

        assert!(vcs.checkout(&mut project, r0, None));
        assert!(vcs.cherry_pick(&mut project, c1, &[piano]));
        assert_eq!(1, project.track(piano).unwrap().sequence().len());
        assert!(project.track(annotations_id).unwrap().sequence().is_empty());
        assert!(vcs.has_changes(&project));
    }
}

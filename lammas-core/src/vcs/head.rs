//! The checkout position: a heading revision plus the snapshot of its
//! state, with a lazily rebuilt diff against the live project.

use serde::{Deserialize, Serialize};

use lammas_types::Project;

use super::diff;
use super::revision::{Revision, RevisionId};
use super::snapshot::Snapshot;

/// Progress callback for long tree walks: (done, total). Returning false
/// cancels the operation.
pub type ProgressFn<'a> = dyn FnMut(usize, usize) -> bool + 'a;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Head {
    heading: RevisionId,
    snapshot: Snapshot,
    #[serde(skip, default = "default_true")]
    diff_outdated: bool,
    #[serde(skip)]
    cached_diff: Option<Revision>,
}

fn default_true() -> bool {
    true
}

impl Head {
    pub fn new(heading: RevisionId) -> Self {
        Self {
            heading,
            snapshot: Snapshot::default(),
            diff_outdated: true,
            cached_diff: None,
        }
    }

    pub fn heading(&self) -> RevisionId {
        self.heading
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn set_diff_outdated(&mut self, outdated: bool) {
        self.diff_outdated = outdated;
        if outdated {
            self.cached_diff = None;
        }
    }

    pub fn is_diff_outdated(&self) -> bool {
        self.diff_outdated
    }

    /// Rebuilds the snapshot by applying every revision from the root down
    /// to `target`; pure with respect to the project. False when the target
    /// is not in the tree or the progress callback cancels; the head is
    /// left unchanged then.
    pub fn move_to(
        &mut self,
        root: &Revision,
        target: RevisionId,
        mut progress: Option<&mut ProgressFn<'_>>,
    ) -> bool {
        let Some(path) = root.path_to(target) else {
            log::error!(target: "vcs", "revision {} is not in the tree", target);
            return false;
        };
        let mut snapshot = Snapshot::default();
        let total = path.len();
        for (done, revision) in path.iter().enumerate() {
            snapshot.apply_all(&revision.items);
            if let Some(report) = progress.as_mut() {
                if !report(done + 1, total) {
                    return false;
                }
            }
        }
        self.heading = target;
        self.snapshot = snapshot;
        self.set_diff_outdated(true);
        true
    }

    /// Trusts an already-loaded snapshot and only repoints the head; used
    /// on load when the stored diff format version is current.
    pub fn point_to(&mut self, target: RevisionId) {
        self.heading = target;
        self.set_diff_outdated(true);
    }

    /// Advances onto a fresh child commit: the new items fold into the
    /// current snapshot, which is equivalent to (and much cheaper than)
    /// replaying from the root.
    pub fn apply_commit(&mut self, revision: &Revision) {
        self.snapshot.apply_all(&revision.items);
        self.heading = revision.id;
        self.set_diff_outdated(true);
    }

    /// Folds a foreign revision's items into the snapshot, keyed by
    /// (item, category).
    pub fn merge_state_with(&mut self, revision: &Revision) {
        self.snapshot.apply_all(&revision.items);
        self.set_diff_outdated(true);
    }

    /// The current diff (snapshot vs. project) as a revision; cached until
    /// the project changes.
    pub fn diff(&mut self, project: &Project) -> &Revision {
        if self.diff_outdated || self.cached_diff.is_none() {
            let mut revision = Revision::new("");
            revision.items = diff::diff(&self.snapshot, project);
            self.cached_diff = Some(revision);
            self.diff_outdated = false;
        }
        self.cached_diff.as_ref().unwrap()
    }

    pub fn has_changes(&mut self, project: &Project) -> bool {
        !self.diff(project).is_empty()
    }

    /// Overwrites the project with the snapshot's state.
    pub fn checkout(&self, project: &mut Project) -> bool {
        diff::checkout_project(&self.snapshot, project)
    }
}

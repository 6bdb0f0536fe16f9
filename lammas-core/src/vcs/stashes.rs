//! Named user stashes plus the single quick-stash slot.

use serde::{Deserialize, Serialize};

use super::revision::Revision;

/// Stashes are revisions detached from the main tree. The quick-stash slot
/// is exclusive: it must be restored (or dropped) before the next
/// quick-stash, which is what lets the UI toggle all uncommitted changes
/// on and off with one key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StashesRepository {
    user_stashes: Vec<Revision>,
    quick_stash: Option<Revision>,
}

impl StashesRepository {
    pub fn user_stashes(&self) -> &[Revision] {
        &self.user_stashes
    }

    pub fn user_stash_with_name(&self, name: &str) -> Option<&Revision> {
        self.user_stashes.iter().find(|s| s.message == name)
    }

    pub fn add_stash(&mut self, stash: Revision) {
        self.user_stashes.push(stash);
    }

    pub fn remove_stash(&mut self, name: &str) -> bool {
        let before = self.user_stashes.len();
        self.user_stashes.retain(|s| s.message != name);
        self.user_stashes.len() != before
    }

    pub fn has_quick_stash(&self) -> bool {
        self.quick_stash.is_some()
    }

    pub fn quick_stash(&self) -> Option<&Revision> {
        self.quick_stash.as_ref()
    }

    pub fn store_quick_stash(&mut self, stash: Revision) {
        self.quick_stash = Some(stash);
    }

    pub fn reset_quick_stash(&mut self) {
        self.quick_stash = None;
    }
}

//! The revision tree.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use lammas_types::TrackId;

use super::delta::Delta;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionId(Uuid);

impl RevisionId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RevisionItemKind {
    Added,
    Changed,
    Removed,
}

/// One tracked change inside a revision: which item it concerns, what
/// happened to it, and the category deltas carrying the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionItem {
    pub kind: RevisionItemKind,
    pub item_id: TrackId,
    pub item_type: String,
    pub deltas: Vec<Delta>,
}

impl RevisionItem {
    pub fn delta(&self, tag: &str) -> Option<&Delta> {
        self.deltas.iter().find(|d| d.tag == tag)
    }
}

/// A node of the version-control tree. Children are owned and ordered;
/// navigation back towards the root goes through id searches from the root
/// node. A revision marked `shallow` is a remote-only node whose payload
/// has not been fetched yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    pub id: RevisionId,
    pub message: String,
    pub timestamp: i64,
    #[serde(default)]
    pub items: Vec<RevisionItem>,
    #[serde(default)]
    pub children: Vec<Revision>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub shallow: bool,
}

impl Revision {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            id: RevisionId::random(),
            message: message.into(),
            timestamp: unix_timestamp(),
            items: Vec::new(),
            children: Vec::new(),
            shallow: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn add_item(&mut self, item: RevisionItem) {
        self.items.push(item);
    }

    pub fn add_child(&mut self, child: Revision) {
        self.children.push(child);
    }

    pub fn find(&self, id: RevisionId) -> Option<&Revision> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    pub fn find_mut(&mut self, id: RevisionId) -> Option<&mut Revision> {
        if self.id == id {
            return Some(self);
        }
        self.children
            .iter_mut()
            .find_map(|child| child.find_mut(id))
    }

    /// The chain of revisions from this node down to `id`, both inclusive.
    pub fn path_to(&self, id: RevisionId) -> Option<Vec<&Revision>> {
        if self.id == id {
            return Some(vec![self]);
        }
        for child in &self.children {
            if let Some(mut path) = child.path_to(id) {
                path.insert(0, self);
                return Some(path);
            }
        }
        None
    }

    pub fn parent_of(&self, id: RevisionId) -> Option<RevisionId> {
        let path = self.path_to(id)?;
        if path.len() < 2 {
            return None;
        }
        Some(path[path.len() - 2].id)
    }
}

fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_navigation() {
        let mut root = Revision::new("root");
        let mut branch = Revision::new("branch");
        let leaf = Revision::new("leaf");
        let (root_id, branch_id, leaf_id) = (root.id, branch.id, leaf.id);
        branch.add_child(leaf);
        root.add_child(branch);
        root.add_child(Revision::new("other"));

        assert_eq!("leaf", root.find(leaf_id).unwrap().message);
        let path: Vec<RevisionId> = root
            .path_to(leaf_id)
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(vec![root_id, branch_id, leaf_id], path);
        assert_eq!(Some(branch_id), root.parent_of(leaf_id));
        assert_eq!(None, root.parent_of(root_id));
        assert_eq!(None, root.find(RevisionId::random()));
    }
}

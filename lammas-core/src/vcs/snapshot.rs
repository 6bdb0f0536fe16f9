//! The head snapshot: per-item full state, reconstructed by folding
//! revision items together.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use lammas_types::TrackId;

use super::delta::{classify_collection_tag, CollectionOp, Delta};
use super::revision::{RevisionItem, RevisionItemKind};

/// The full state of one tracked item, held as deltas: scalar categories
/// plus one `*Added` list per collection category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotItem {
    pub item_id: TrackId,
    pub item_type: String,
    pub deltas: Vec<Delta>,
}

impl SnapshotItem {
    pub fn delta(&self, tag: &str) -> Option<&Delta> {
        self.deltas.iter().find(|d| d.tag == tag)
    }

    pub fn payload(&self, tag: &str) -> Option<&Value> {
        self.delta(tag).map(|d| &d.payload)
    }

    fn set_delta(&mut self, tag: &str, payload: Value) {
        match self.deltas.iter_mut().find(|d| d.tag == tag) {
            Some(delta) => delta.payload = payload,
            None => self.deltas.push(Delta::new(tag, payload)),
        }
    }

    fn list_mut(&mut self, tag: &str) -> &mut Vec<Value> {
        if self.delta(tag).is_none() {
            self.deltas.push(Delta::new(tag, Value::Array(Vec::new())));
        }
        let delta = self.deltas.iter_mut().find(|d| d.tag == tag).unwrap();
        if !delta.payload.is_array() {
            delta.payload = Value::Array(Vec::new());
        }
        delta.payload.as_array_mut().unwrap()
    }
}

/// The state at the head's position: what `apply(root -> ... -> head)`
/// produces. Used as the baseline for diffs and as the source of truth on
/// checkout. Items keep the order in which they first appeared.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub items: Vec<SnapshotItem>,
}

impl Snapshot {
    pub fn item(&self, id: TrackId) -> Option<&SnapshotItem> {
        self.items.iter().find(|i| i.item_id == id)
    }

    fn item_mut(&mut self, id: TrackId) -> Option<&mut SnapshotItem> {
        self.items.iter_mut().find(|i| i.item_id == id)
    }

    /// Folds one revision item in. Additions replace wholesale, removals
    /// delete, changes merge per category. Applying the same item twice
    /// yields the same state.
    pub fn apply(&mut self, item: &RevisionItem) {
        match item.kind {
            RevisionItemKind::Added => {
                self.items.retain(|i| i.item_id != item.item_id);
                self.items.push(SnapshotItem {
                    item_id: item.item_id,
                    item_type: item.item_type.clone(),
                    deltas: item.deltas.clone(),
                });
            }
            RevisionItemKind::Removed => {
                self.items.retain(|i| i.item_id != item.item_id);
            }
            RevisionItemKind::Changed => {
                if self.item(item.item_id).is_none() {
                    // change to an unknown item: treat as an addition so a
                    // merge of foreign history still converges
                    log::warn!(target: "vcs", "changed item {} not in snapshot", item.item_id);
                    self.items.push(SnapshotItem {
                        item_id: item.item_id,
                        item_type: item.item_type.clone(),
                        deltas: Vec::new(),
                    });
                }
                let state = self.item_mut(item.item_id).unwrap();
                for delta in &item.deltas {
                    match classify_collection_tag(&delta.tag) {
                        Some((state_tag, op)) => {
                            let incoming = delta.payload.as_array().cloned().unwrap_or_default();
                            merge_list(state.list_mut(&state_tag), &incoming, op);
                        }
                        None => state.set_delta(&delta.tag, delta.payload.clone()),
                    }
                }
            }
        }
    }

    pub fn apply_all(&mut self, items: &[RevisionItem]) {
        for item in items {
            self.apply(item);
        }
    }
}

/// The id of a serialized event or clip inside a collection payload.
pub(crate) fn value_id(value: &Value) -> Option<&str> {
    value.get("id").and_then(Value::as_str)
}

fn merge_list(state: &mut Vec<Value>, incoming: &[Value], op: CollectionOp) {
    match op {
        CollectionOp::Add | CollectionOp::Change => {
            for value in incoming {
                let id = value_id(value);
                match state.iter_mut().find(|v| value_id(v) == id && id.is_some()) {
                    Some(slot) => *slot = value.clone(),
                    None => state.push(value.clone()),
                }
            }
        }
        CollectionOp::Remove => {
            let removed: Vec<&str> = incoming.iter().filter_map(value_id).collect();
            state.retain(|v| match value_id(v) {
                Some(id) => !removed.contains(&id),
                None => true,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcs::delta::tags;
    use serde_json::json;

    fn added_item(id: TrackId, notes: Value) -> RevisionItem {
        RevisionItem {
            kind: RevisionItemKind::Added,
            item_id: id,
            item_type: "pianoTrack".into(),
            deltas: vec![
                Delta::new(tags::TRACK_PATH, json!({"name": "Piano", "position": 0})),
                Delta::new(tags::NOTES_ADDED, notes),
            ],
        }
    }

    #[test]
    fn change_merges_collections_idempotently() {
        let id = TrackId::random();
        let mut snapshot = Snapshot::default();
        snapshot.apply(&added_item(
            id,
            json!([{"id": "1", "key": 60}, {"id": "2", "key": 62}]),
        ));

        let change = RevisionItem {
            kind: RevisionItemKind::Changed,
            item_id: id,
            item_type: "pianoTrack".into(),
            deltas: vec![
                Delta::new("notesAdded", json!([{"id": "3", "key": 64}])),
                Delta::new("notesRemoved", json!([{"id": "1"}])),
                Delta::new("notesChanged", json!([{"id": "2", "key": 70}])),
            ],
        };
        snapshot.apply(&change);
        snapshot.apply(&change); // idempotent

        let notes = snapshot.item(id).unwrap().payload(tags::NOTES_ADDED).unwrap();
        assert_eq!(
            &json!([{"id": "2", "key": 70}, {"id": "3", "key": 64}]),
            notes
        );
    }

    #[test]
    fn unknown_scalar_tags_are_kept() {
        let id = TrackId::random();
        let mut snapshot = Snapshot::default();
        snapshot.apply(&added_item(id, json!([])));
        let change = RevisionItem {
            kind: RevisionItemKind::Changed,
            item_id: id,
            item_type: "pianoTrack".into(),
            deltas: vec![Delta::new("futureTag", json!({"whatever": true}))],
        };
        snapshot.apply(&change);
        assert_eq!(
            Some(&json!({"whatever": true})),
            snapshot.item(id).unwrap().payload("futureTag")
        );
    }

    #[test]
    fn removal_deletes_the_item() {
        let id = TrackId::random();
        let mut snapshot = Snapshot::default();
        snapshot.apply(&added_item(id, json!([])));
        snapshot.apply(&RevisionItem {
            kind: RevisionItemKind::Removed,
            item_id: id,
            item_type: "pianoTrack".into(),
            deltas: Vec::new(),
        });
        assert!(snapshot.item(id).is_none());
    }
}

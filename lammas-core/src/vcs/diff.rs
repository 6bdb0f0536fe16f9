//! Per-category diff and apply logic.
//!
//! Everything here works on the delta representation: the project is
//! serialized into full-state snapshot items, diffed generically per
//! category, and rebuilt from items on checkout. Collection categories
//! (notes, automation events, annotations, signatures, clips) diff as
//! id-keyed added/removed/changed sets; everything else compares as opaque
//! scalars.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use lammas_types::{
    Clip, MidiEvent, MidiTrack, Project, TrackId, TrackKind,
};

use super::delta::{
    added_tag, changed_tag, classify_collection_tag, is_collection_tag, item_type_for,
    item_types, kind_for_item_type, removed_tag, tags, CollectionOp, Delta,
};
use super::revision::{RevisionItem, RevisionItemKind};
use super::snapshot::{value_id, Snapshot, SnapshotItem};

fn to_json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        debug_assert!(false, "model type failed to serialize: {e}");
        Value::Null
    })
}

fn from_json<T: DeserializeOwned>(value: &Value) -> Option<T> {
    serde_json::from_value(value.clone()).ok()
}

//===----------------------------------------------------------------===//
// Full-state serialization
//===----------------------------------------------------------------===//

pub fn info_state(project: &Project) -> SnapshotItem {
    SnapshotItem {
        item_id: project.info.id,
        item_type: item_types::PROJECT_INFO.to_string(),
        deltas: vec![
            Delta::new(tags::PROJECT_TITLE, json!(project.info.title)),
            Delta::new(tags::PROJECT_AUTHOR, json!(project.info.author)),
            Delta::new(tags::PROJECT_DESCRIPTION, json!(project.info.description)),
            Delta::new(tags::PROJECT_LICENSE, json!(project.info.license)),
            Delta::new(tags::PROJECT_TEMPERAMENT, to_json(&project.temperament)),
        ],
    }
}

pub fn track_state(track: &MidiTrack, position: usize) -> SnapshotItem {
    let mut deltas = vec![
        Delta::new(
            tags::TRACK_PATH,
            json!({"name": track.name(), "position": position}),
        ),
        Delta::new(tags::TRACK_COLOUR, json!(track.colour())),
        Delta::new(tags::TRACK_CHANNEL, json!(track.channel())),
        Delta::new(tags::TRACK_INSTRUMENT, json!(track.instrument_id())),
    ];
    if track.kind() == TrackKind::Automation {
        deltas.push(Delta::new(
            tags::TRACK_CONTROLLER,
            json!(track.controller_number()),
        ));
    }
    deltas.push(Delta::new(
        added_tag(track.kind()),
        to_json(&track.sequence().events()),
    ));
    deltas.push(Delta::new(tags::CLIPS_ADDED, to_json(&track.pattern().clips())));
    SnapshotItem {
        item_id: track.id(),
        item_type: item_type_for(track.kind()).to_string(),
        deltas,
    }
}

/// The whole project as a snapshot: the baseline a commit freezes.
pub fn project_state(project: &Project) -> Snapshot {
    let mut items = vec![info_state(project)];
    for (position, track) in project.tracks().iter().enumerate() {
        items.push(track_state(track, position));
    }
    Snapshot { items }
}

//===----------------------------------------------------------------===//
// Diff
//===----------------------------------------------------------------===//

/// Diffs the committed baseline against the live project. Result items
/// carry exactly what changed: full state for additions and removals,
/// per-category deltas for changes.
pub fn diff(snapshot: &Snapshot, project: &Project) -> Vec<RevisionItem> {
    let current = project_state(project);
    let mut items = Vec::new();

    for cur in &current.items {
        match snapshot.item(cur.item_id) {
            None => items.push(RevisionItem {
                kind: RevisionItemKind::Added,
                item_id: cur.item_id,
                item_type: cur.item_type.clone(),
                deltas: cur.deltas.clone(),
            }),
            Some(base) => {
                if let Some(item) = diff_item(base, cur) {
                    items.push(item);
                }
            }
        }
    }

    for base in &snapshot.items {
        if current.item(base.item_id).is_none() {
            items.push(RevisionItem {
                kind: RevisionItemKind::Removed,
                item_id: base.item_id,
                item_type: base.item_type.clone(),
                deltas: base.deltas.clone(),
            });
        }
    }

    items
}

fn diff_item(base: &SnapshotItem, cur: &SnapshotItem) -> Option<RevisionItem> {
    let mut deltas = Vec::new();

    for delta in &cur.deltas {
        if is_collection_tag(&delta.tag) {
            let empty = Vec::new();
            let base_list = base
                .payload(&delta.tag)
                .and_then(Value::as_array)
                .unwrap_or(&empty);
            let cur_list = delta.payload.as_array().unwrap_or(&empty);
            let (added, removed, changed) = diff_lists(base_list, cur_list);
            if !added.is_empty() {
                deltas.push(Delta::new(delta.tag.clone(), Value::Array(added)));
            }
            if !removed.is_empty() {
                deltas.push(Delta::new(removed_tag(&delta.tag), Value::Array(removed)));
            }
            if !changed.is_empty() {
                deltas.push(Delta::new(changed_tag(&delta.tag), Value::Array(changed)));
            }
        } else {
            match base.payload(&delta.tag) {
                Some(payload) if scalars_equal(payload, &delta.payload) => {}
                _ => deltas.push(delta.clone()),
            }
        }
    }

    if deltas.is_empty() {
        None
    } else {
        Some(RevisionItem {
            kind: RevisionItemKind::Changed,
            item_id: cur.item_id,
            item_type: cur.item_type.clone(),
            deltas,
        })
    }
}

fn diff_lists(base: &[Value], cur: &[Value]) -> (Vec<Value>, Vec<Value>, Vec<Value>) {
    let base_by_id: HashMap<&str, &Value> =
        base.iter().filter_map(|v| Some((value_id(v)?, v))).collect();
    let cur_by_id: HashMap<&str, &Value> =
        cur.iter().filter_map(|v| Some((value_id(v)?, v))).collect();

    let mut added = Vec::new();
    let mut changed = Vec::new();
    for value in cur {
        let Some(id) = value_id(value) else {
            continue;
        };
        match base_by_id.get(id) {
            None => added.push(value.clone()),
            Some(before) if !events_equal(before, value) => changed.push(value.clone()),
            Some(_) => {}
        }
    }

    let mut removed = Vec::new();
    for value in base {
        let Some(id) = value_id(value) else {
            continue;
        };
        if !cur_by_id.contains_key(id) {
            removed.push(value.clone());
        }
    }

    (added, removed, changed)
}

fn scalars_equal(a: &Value, b: &Value) -> bool {
    a == b
}

/// Event equality for diffing. Key signatures compare their scale by
/// equivalence: two names for the same step set are the same signature.
fn events_equal(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    let kind = a.get("type").and_then(Value::as_str);
    if kind != b.get("type").and_then(Value::as_str) || kind != Some("keySignature") {
        return false;
    }
    let (mut a, mut b) = (a.clone(), b.clone());
    for value in [&mut a, &mut b] {
        if let Some(scale) = value.get_mut("scale").and_then(Value::as_object_mut) {
            scale.remove("name");
        }
    }
    a == b
}

//===----------------------------------------------------------------===//
// Checkout: snapshot -> project
//===----------------------------------------------------------------===//

fn recorded_position(item: &SnapshotItem) -> usize {
    item.payload(tags::TRACK_PATH)
        .and_then(|p| p.get("position"))
        .and_then(Value::as_u64)
        .map(|p| p as usize)
        .unwrap_or(usize::MAX)
}

/// Overwrites the whole project with the snapshot's state. Surviving
/// tracks are rebuilt in place so their id history carries over. False on
/// a malformed snapshot; the project may be partially rebuilt then and the
/// caller is expected to fall back to a fresh state.
pub fn checkout_project(snapshot: &Snapshot, project: &mut Project) -> bool {
    let mut ok = true;

    if let Some(info) = snapshot
        .items
        .iter()
        .find(|i| i.item_type == item_types::PROJECT_INFO)
    {
        apply_info_item(project, &info.deltas, info.item_id);
    }

    let mut track_items: Vec<&SnapshotItem> = snapshot
        .items
        .iter()
        .filter(|i| i.item_type != item_types::PROJECT_INFO)
        .collect();
    track_items.sort_by_key(|i| recorded_position(i));

    let mut old = project.take_tracks();
    for item in track_items {
        let existing = old
            .iter()
            .position(|t| t.id() == item.item_id)
            .map(|at| old.remove(at));
        match rebuild_track(existing, item) {
            Some(track) => {
                project.add_track(track, usize::MAX);
            }
            None => {
                log::error!(target: "vcs", "cannot rebuild track {} from snapshot", item.item_id);
                ok = false;
            }
        }
    }

    ok
}

/// Partial checkout: restores only the given item ids from the snapshot.
/// Project items absent from the snapshot are removed; snapshot items
/// absent from the project are recreated.
pub fn checkout_items(snapshot: &Snapshot, project: &mut Project, ids: &[TrackId]) -> bool {
    let mut ok = true;
    for &id in ids {
        if id == project.info.id {
            if let Some(info) = snapshot.item(id) {
                apply_info_item(project, &info.deltas, info.item_id);
            }
            continue;
        }
        match snapshot.item(id) {
            None => {
                project.remove_track(id);
            }
            Some(item) => {
                let existing = project.remove_track(id);
                let position = recorded_position(item).min(project.tracks().len());
                match rebuild_track(existing, item) {
                    Some(track) => {
                        project.add_track(track, position);
                    }
                    None => {
                        log::error!(target: "vcs", "cannot rebuild track {} from snapshot", id);
                        ok = false;
                    }
                }
            }
        }
    }
    ok
}

fn rebuild_track(existing: Option<MidiTrack>, item: &SnapshotItem) -> Option<MidiTrack> {
    let kind = kind_for_item_type(&item.item_type)?;
    let mut track = match existing {
        Some(track) if track.kind() == kind => track,
        _ => MidiTrack::with_id(kind, "", item.item_id),
    };
    for delta in &item.deltas {
        match classify_collection_tag(&delta.tag) {
            Some(_) if delta.tag == tags::CLIPS_ADDED => {
                let clips: Vec<Clip> = from_json(&delta.payload)?;
                track.pattern_mut().replace_clips(clips);
            }
            Some(_) if delta.tag == added_tag(kind) => {
                let events: Vec<MidiEvent> = from_json(&delta.payload)?;
                track.sequence_mut().replace_events(events);
            }
            Some(_) => {} // a collection this track kind does not own
            None => apply_track_scalar(&mut track, delta),
        }
    }
    Some(track)
}

fn apply_track_scalar(track: &mut MidiTrack, delta: &Delta) {
    match delta.tag.as_str() {
        tags::TRACK_PATH => {
            if let Some(name) = delta.payload.get("name").and_then(Value::as_str) {
                track.set_name(name);
            }
        }
        tags::TRACK_COLOUR => {
            if let Some(colour) = delta.payload.as_str() {
                track.set_colour(colour);
            }
        }
        tags::TRACK_CHANNEL => {
            if let Some(channel) = delta.payload.as_u64() {
                track.set_channel(channel as u8);
            }
        }
        tags::TRACK_INSTRUMENT => {
            if let Some(instrument) = delta.payload.as_str() {
                track.set_instrument_id(instrument);
            }
        }
        tags::TRACK_CONTROLLER => {
            if let Some(controller) = delta.payload.as_i64() {
                track.set_controller_number(controller as i32);
            }
        }
        // tags from a newer build: carried along, nothing to apply
        _ => {}
    }
}

fn apply_info_item(project: &mut Project, deltas: &[Delta], item_id: TrackId) {
    project.info.id = item_id;
    for delta in deltas {
        match delta.tag.as_str() {
            tags::PROJECT_TITLE => {
                if let Some(title) = delta.payload.as_str() {
                    project.info.title = title.to_string();
                }
            }
            tags::PROJECT_AUTHOR => {
                if let Some(author) = delta.payload.as_str() {
                    project.info.author = author.to_string();
                }
            }
            tags::PROJECT_DESCRIPTION => {
                if let Some(description) = delta.payload.as_str() {
                    project.info.description = description.to_string();
                }
            }
            tags::PROJECT_LICENSE => {
                if let Some(license) = delta.payload.as_str() {
                    project.info.license = license.to_string();
                }
            }
            tags::PROJECT_TEMPERAMENT => {
                if let Some(temperament) = from_json(&delta.payload) {
                    project.temperament = temperament;
                }
            }
            _ => {}
        }
    }
}

//===----------------------------------------------------------------===//
// Forward application: cherry-pick
//===----------------------------------------------------------------===//

/// Applies revision items onto the live project as uncommitted changes.
/// Additions materialize missing items, removals delete, changes merge
/// per category with events keyed by id.
pub fn apply_items(project: &mut Project, items: &[RevisionItem]) -> bool {
    let mut ok = true;
    for item in items {
        match item.kind {
            RevisionItemKind::Removed => {
                if item.item_type != item_types::PROJECT_INFO {
                    project.remove_track(item.item_id);
                }
            }
            RevisionItemKind::Added => {
                if item.item_type == item_types::PROJECT_INFO {
                    apply_info_item(project, &item.deltas, item.item_id);
                } else if project.track(item.item_id).is_some() {
                    ok &= apply_changed_item(project, item);
                } else {
                    let state = SnapshotItem {
                        item_id: item.item_id,
                        item_type: item.item_type.clone(),
                        deltas: item.deltas.clone(),
                    };
                    let position = recorded_position(&state).min(project.tracks().len());
                    match rebuild_track(None, &state) {
                        Some(track) => {
                            project.add_track(track, position);
                        }
                        None => ok = false,
                    }
                }
            }
            RevisionItemKind::Changed => ok &= apply_changed_item(project, item),
        }
    }
    ok
}

fn apply_changed_item(project: &mut Project, item: &RevisionItem) -> bool {
    if item.item_type == item_types::PROJECT_INFO {
        apply_info_item(project, &item.deltas, item.item_id);
        return true;
    }
    let Some(track) = project.track_mut(item.item_id) else {
        log::warn!(target: "vcs", "cherry-picked item {} has no track here", item.item_id);
        return false;
    };
    let mut ok = true;
    for delta in &item.deltas {
        match classify_collection_tag(&delta.tag) {
            Some((state_tag, op)) if state_tag == tags::CLIPS_ADDED => {
                let Some(clips) = from_json::<Vec<Clip>>(&delta.payload) else {
                    ok = false;
                    continue;
                };
                apply_clips_op(track, clips, op);
            }
            Some((_, op)) => {
                let Some(events) = from_json::<Vec<MidiEvent>>(&delta.payload) else {
                    ok = false;
                    continue;
                };
                apply_events_op(track, events, op);
            }
            None => apply_track_scalar(track, delta),
        }
    }
    ok
}

fn apply_events_op(track: &mut MidiTrack, events: Vec<MidiEvent>, op: CollectionOp) {
    let sequence = track.sequence_mut();
    for event in events {
        let existing = sequence.find_by_id(event.id()).cloned();
        match op {
            CollectionOp::Add | CollectionOp::Change => match existing {
                Some(before) => {
                    sequence.change(&before, &event);
                }
                None => {
                    sequence.insert(event);
                }
            },
            CollectionOp::Remove => {
                if let Some(before) = existing {
                    sequence.remove(&before);
                }
            }
        }
    }
}

fn apply_clips_op(track: &mut MidiTrack, clips: Vec<Clip>, op: CollectionOp) {
    let pattern = track.pattern_mut();
    for clip in clips {
        let existing = pattern.find_by_id(clip.id()).cloned();
        match op {
            CollectionOp::Add | CollectionOp::Change => match existing {
                Some(before) => {
                    pattern.change(&before, &clip);
                }
                None => {
                    pattern.insert(clip);
                }
            },
            CollectionOp::Remove => {
                if let Some(before) = existing {
                    pattern.remove(&before);
                }
            }
        }
    }
}

//===----------------------------------------------------------------===//
// Reset
//===----------------------------------------------------------------===//

/// Reverse-applies diff items: the touched items return to the snapshot's
/// state exactly.
pub fn reset_items(snapshot: &Snapshot, project: &mut Project, items: &[RevisionItem]) -> bool {
    let ids: Vec<TrackId> = items.iter().map(|i| i.item_id).collect();
    checkout_items(snapshot, project, &ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lammas_types::Note;

    fn piano_project() -> (Project, TrackId) {
        let mut project = Project::new("Diff test", 0);
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
    fn clean_project_has_empty_diff() {
        let (project, _) = piano_project();
        let snapshot = project_state(&project);
        assert!(diff(&snapshot, &project).is_empty());
    }

    #[test]
    fn note_edits_show_as_collection_deltas() {
        let (mut project, track) = piano_project();
        let keep = add_note(&mut project, track, 60, 0.0);
        let gone = add_note(&mut project, track, 62, 1.0);
        let snapshot = project_state(&project);

        // one added, one changed, one removed
        add_note(&mut project, track, 64, 2.0);
        let keep_after = match &keep {
            MidiEvent::Note(n) => MidiEvent::from(n.with_key(61)),
            _ => unreachable!(),
        };
        let seq = project.track_mut(track).unwrap().sequence_mut();
        assert!(seq.change(&keep, &keep_after));
        assert!(seq.remove(&gone));

        let items = diff(&snapshot, &project);
        assert_eq!(1, items.len());
        let item = &items[0];
        assert_eq!(RevisionItemKind::Changed, item.kind);
        assert_eq!(1, item.delta("notesAdded").unwrap().payload.as_array().unwrap().len());
        assert_eq!(1, item.delta("notesRemoved").unwrap().payload.as_array().unwrap().len());
        assert_eq!(1, item.delta("notesChanged").unwrap().payload.as_array().unwrap().len());
    }

    #[test]
    fn reset_restores_the_snapshot_state() {
        let (mut project, track) = piano_project();
        add_note(&mut project, track, 60, 0.0);
        let snapshot = project_state(&project);
        let before = project.clone();

        add_note(&mut project, track, 72, 4.0);
        project.track_mut(track).unwrap().set_name("Renamed");

        let items = diff(&snapshot, &project);
        assert!(reset_items(&snapshot, &mut project, &items));
        assert_eq!(
            before.track(track).unwrap().sequence().events(),
            project.track(track).unwrap().sequence().events()
        );
        assert_eq!("Piano", project.track(track).unwrap().name());
        assert!(diff(&snapshot, &project).is_empty());
    }

    #[test]
    fn checkout_preserves_track_order_and_ids() {
        let mut project = Project::new("Order", 0);
        let first = MidiTrack::new(TrackKind::Piano, "First");
        let second = MidiTrack::new(TrackKind::Annotations, "Second");
        let (first_id, second_id) = (first.id(), second.id());
        project.add_track(first, 0);
        project.add_track(second, 1);
        let note = add_note(&mut project, first_id, 60, 0.0);
        let snapshot = project_state(&project);

        let mut other = Project::new("Other", 0);
        assert!(checkout_project(&snapshot, &mut other));
        assert_eq!(Some(0), other.position_of(first_id));
        assert_eq!(Some(1), other.position_of(second_id));
        assert_eq!(
            note.id(),
            other.track(first_id).unwrap().sequence().events()[0].id()
        );
    }

    #[test]
    fn key_signature_rename_is_not_a_change() {
        use lammas_types::{KeySignatureEvent, Scale};
        let mut project = Project::new("Keys", 0);
        let track = MidiTrack::new(TrackKind::KeySignatures, "Keys");
        let id = track.id();
        project.add_track(track, 0);
        let seq = project.track_mut(id).unwrap().sequence_mut();
        let event_id = seq.new_event_id();
        let phrygian = Scale::from_intervals("Phrygian", "1 2 2 2 1 2 2");
        let event = MidiEvent::from(KeySignatureEvent::new(event_id, 0.0, 0, phrygian));
        assert!(seq.insert(event.clone()));

        let snapshot = project_state(&project);

        let renamed = match &event {
            MidiEvent::KeySignature(e) => MidiEvent::from(
                e.with_scale(Scale::from_intervals("Ousak", "1 2 2 2 1 2 2")),
            ),
            _ => unreachable!(),
        };
        let seq = project.track_mut(id).unwrap().sequence_mut();
        assert!(seq.change(&event, &renamed));

        assert!(diff(&snapshot, &project).is_empty());
    }
}

//! Deltas: named serialized changes attached to revision items.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use lammas_types::TrackKind;

/// Delta category tags. A tracked item's full state is a set of deltas
/// under the scalar tags plus the `*Added` collection tags; a diff may
/// additionally carry `*Removed` and `*Changed` collection deltas.
pub mod tags {
    pub const PROJECT_TITLE: &str = "projectTitle";
    pub const PROJECT_AUTHOR: &str = "projectAuthor";
    pub const PROJECT_DESCRIPTION: &str = "projectDescription";
    pub const PROJECT_LICENSE: &str = "projectLicense";
    pub const PROJECT_TEMPERAMENT: &str = "projectTemperament";

    pub const TRACK_PATH: &str = "trackPath";
    pub const TRACK_COLOUR: &str = "trackColour";
    pub const TRACK_CHANNEL: &str = "trackChannel";
    pub const TRACK_INSTRUMENT: &str = "trackInstrument";
    pub const TRACK_CONTROLLER: &str = "trackController";

    pub const NOTES_ADDED: &str = "notesAdded";
    pub const EVENTS_ADDED: &str = "eventsAdded";
    pub const ANNOTATIONS_ADDED: &str = "annotationsAdded";
    pub const KEY_SIGNATURES_ADDED: &str = "keySignaturesAdded";
    pub const TIME_SIGNATURES_ADDED: &str = "timeSignaturesAdded";
    pub const CLIPS_ADDED: &str = "clipsAdded";
}

/// Type tags identifying which subsystem a tracked item belongs to.
pub mod item_types {
    pub const PROJECT_INFO: &str = "projectInfo";
    pub const PIANO_TRACK: &str = "pianoTrack";
    pub const AUTOMATION_TRACK: &str = "automationTrack";
    pub const ANNOTATIONS_TRACK: &str = "annotationsTrack";
    pub const KEY_SIGNATURES_TRACK: &str = "keySignaturesTrack";
    pub const TIME_SIGNATURES_TRACK: &str = "timeSignaturesTrack";
}

/// A category tag paired with its serialized payload. Payloads are opaque
/// JSON so tags this build does not know still round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    pub tag: String,
    pub payload: Value,
}

impl Delta {
    pub fn new(tag: impl Into<String>, payload: Value) -> Self {
        Self {
            tag: tag.into(),
            payload,
        }
    }
}

/// How a collection delta mutates the stored full list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionOp {
    Add,
    Remove,
    Change,
}

const COLLECTION_PREFIXES: &[&str] = &[
    "notes",
    "events",
    "annotations",
    "keySignatures",
    "timeSignatures",
    "clips",
];

/// Splits a collection tag into its full-state tag and the operation, e.g.
/// "notesRemoved" -> ("notesAdded", Remove). None for scalar and unknown
/// tags.
pub fn classify_collection_tag(tag: &str) -> Option<(String, CollectionOp)> {
    for prefix in COLLECTION_PREFIXES {
        if let Some(rest) = tag.strip_prefix(prefix) {
            let op = match rest {
                "Added" => CollectionOp::Add,
                "Removed" => CollectionOp::Remove,
                "Changed" => CollectionOp::Change,
                _ => continue,
            };
            return Some((format!("{prefix}Added"), op));
        }
    }
    None
}

pub fn is_collection_tag(tag: &str) -> bool {
    classify_collection_tag(tag).is_some()
}

/// The full-state collection tag for a track kind's events.
pub fn added_tag(kind: TrackKind) -> &'static str {
    match kind {
        TrackKind::Piano => tags::NOTES_ADDED,
        TrackKind::Automation => tags::EVENTS_ADDED,
        TrackKind::Annotations => tags::ANNOTATIONS_ADDED,
        TrackKind::KeySignatures => tags::KEY_SIGNATURES_ADDED,
        TrackKind::TimeSignatures => tags::TIME_SIGNATURES_ADDED,
    }
}

/// The corresponding removed/changed tags.
pub fn removed_tag(added: &str) -> String {
    added.replace("Added", "Removed")
}

pub fn changed_tag(added: &str) -> String {
    added.replace("Added", "Changed")
}

pub fn item_type_for(kind: TrackKind) -> &'static str {
    match kind {
        TrackKind::Piano => item_types::PIANO_TRACK,
        TrackKind::Automation => item_types::AUTOMATION_TRACK,
        TrackKind::Annotations => item_types::ANNOTATIONS_TRACK,
        TrackKind::KeySignatures => item_types::KEY_SIGNATURES_TRACK,
        TrackKind::TimeSignatures => item_types::TIME_SIGNATURES_TRACK,
    }
}

pub fn kind_for_item_type(item_type: &str) -> Option<TrackKind> {
    match item_type {
        item_types::PIANO_TRACK => Some(TrackKind::Piano),
        item_types::AUTOMATION_TRACK => Some(TrackKind::Automation),
        item_types::ANNOTATIONS_TRACK => Some(TrackKind::Annotations),
        item_types::KEY_SIGNATURES_TRACK => Some(TrackKind::KeySignatures),
        item_types::TIME_SIGNATURES_TRACK => Some(TrackKind::TimeSignatures),
        _ => None,
    }
}

//! Timed events and the tagged variant that sequences store.
//!
//! The model keeps one event enum instead of a class hierarchy: the sort
//! comparator and serialization dispatch on the tag. Events carry their id
//! and beat themselves; the owning sequence is found through the track.

mod annotation;
mod automation;
mod key_signature;
mod note;
mod time_signature;

pub use annotation::AnnotationEvent;
pub use automation::{AutomationEvent, BPM_RANGE, MIN_BPM};
pub use key_signature::KeySignatureEvent;
pub use note::Note;
pub use time_signature::TimeSignatureEvent;

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::ids::EventId;

/// Event type tag, also the discriminator on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    Note,
    Annotation,
    KeySignature,
    TimeSignature,
    Auto,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MidiEvent {
    Note(Note),
    Annotation(AnnotationEvent),
    KeySignature(KeySignatureEvent),
    TimeSignature(TimeSignatureEvent),
    Auto(AutomationEvent),
}

impl MidiEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Note(_) => EventKind::Note,
            Self::Annotation(_) => EventKind::Annotation,
            Self::KeySignature(_) => EventKind::KeySignature,
            Self::TimeSignature(_) => EventKind::TimeSignature,
            Self::Auto(_) => EventKind::Auto,
        }
    }

    pub fn id(&self) -> EventId {
        match self {
            Self::Note(e) => e.id(),
            Self::Annotation(e) => e.id(),
            Self::KeySignature(e) => e.id(),
            Self::TimeSignature(e) => e.id(),
            Self::Auto(e) => e.id(),
        }
    }

    pub fn beat(&self) -> f32 {
        match self {
            Self::Note(e) => e.beat(),
            Self::Annotation(e) => e.beat(),
            Self::KeySignature(e) => e.beat(),
            Self::TimeSignature(e) => e.beat(),
            Self::Auto(e) => e.beat(),
        }
    }

    /// End of the event on the timeline; for lengthless kinds this is the
    /// beat itself.
    pub fn end_beat(&self) -> f32 {
        match self {
            Self::Note(e) => e.beat() + e.length(),
            Self::Annotation(e) => e.beat() + e.length(),
            _ => self.beat(),
        }
    }

    /// A copy carrying the given id; used by sequences when adopting an
    /// event, never by editing code.
    pub(crate) fn with_id(&self, id: EventId) -> Self {
        let mut copy = self.clone();
        match &mut copy {
            Self::Note(e) => e.set_id(id),
            Self::Annotation(e) => e.set_id(id),
            Self::KeySignature(e) => e.set_id(id),
            Self::TimeSignature(e) => e.set_id(id),
            Self::Auto(e) => e.set_id(id),
        }
        copy
    }

    /// The total order sequences maintain: beat, then key for notes, then
    /// id. Distinct events of one sequence never compare equal.
    pub fn cmp_order(&self, other: &Self) -> Ordering {
        // stored beats are grid-aligned, so the comparison is exact
        let beats = self
            .beat()
            .partial_cmp(&other.beat())
            .unwrap_or(Ordering::Equal);
        if beats != Ordering::Equal {
            return beats;
        }
        if let (Self::Note(a), Self::Note(b)) = (self, other) {
            let keys = a.key().cmp(&b.key());
            if keys != Ordering::Equal {
                return keys;
            }
        }
        self.id().cmp(&other.id())
    }
}

impl From<Note> for MidiEvent {
    fn from(e: Note) -> Self {
        Self::Note(e)
    }
}

impl From<AnnotationEvent> for MidiEvent {
    fn from(e: AnnotationEvent) -> Self {
        Self::Annotation(e)
    }
}

impl From<KeySignatureEvent> for MidiEvent {
    fn from(e: KeySignatureEvent) -> Self {
        Self::KeySignature(e)
    }
}

impl From<TimeSignatureEvent> for MidiEvent {
    fn from(e: TimeSignatureEvent) -> Self {
        Self::TimeSignature(e)
    }
}

impl From<AutomationEvent> for MidiEvent {
    fn from(e: AutomationEvent) -> Self {
        Self::Auto(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_beat_key_id() {
        let a = MidiEvent::from(Note::new(EventId::new(2), 60, 1.0, 1.0, 0.5));
        let b = MidiEvent::from(Note::new(EventId::new(1), 62, 1.0, 1.0, 0.5));
        let c = MidiEvent::from(Note::new(EventId::new(3), 60, 0.0, 1.0, 0.5));
        assert_eq!(Ordering::Less, a.cmp_order(&b)); // same beat, lower key
        assert_eq!(Ordering::Greater, a.cmp_order(&c)); // later beat
        let d = MidiEvent::from(Note::new(EventId::new(9), 60, 1.0, 4.0, 0.9));
        assert_eq!(Ordering::Less, a.cmp_order(&d)); // ids break the tie
    }
}

//! The sorted event container owned by every track.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::events::MidiEvent;
use crate::ids::EventId;

/// A track's events, kept in the total order (beat, note key, id) at all
/// times. The sequence owns a monotonic id counter; every event it stores
/// carries an id unique within the sequence.
///
/// `used_ids` only grows while the sequence lives: removing an event (or
/// replacing the whole content on a checkout) never returns its id to the
/// pool, so ids minted on different version-control branches of one session
/// stay distinct and survive a merge. The set is rebuilt from the stored
/// events on load, which is where collisions from older sessions get
/// repaired.
///
/// The operations here are the non-undoable primitives: they mutate
/// directly and report success. The undoable layer in lammas-core wraps
/// them in actions and reaches back in through a track-id lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "SequenceWire", into = "SequenceWire")]
pub struct MidiSequence {
    events: Vec<MidiEvent>,
    next_id: u32,
    used_ids: HashSet<u32>,
    live_ids: HashSet<u32>,
}

// two sequences are equal when they hold the same events; the id
// bookkeeping is session state and not part of the persisted model
impl PartialEq for MidiSequence {
    fn eq(&self, other: &Self) -> bool {
        self.events == other.events
    }
}

impl MidiSequence {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            next_id: 1,
            used_ids: HashSet::new(),
            live_ids: HashSet::new(),
        }
    }

    /// Draws a fresh id for an event that is about to join this sequence.
    pub fn new_event_id(&mut self) -> EventId {
        loop {
            let id = self.next_id;
            self.next_id = self.next_id.wrapping_add(1).max(1);
            if self.used_ids.insert(id) {
                return EventId::new(id);
            }
        }
    }

    /// A copy of the event re-identified for this sequence; the only way an
    /// event legally crosses from one sequence to another (paste, track
    /// split).
    pub fn adopt(&mut self, event: &MidiEvent) -> MidiEvent {
        let id = self.new_event_id();
        event.with_id(id)
    }

    pub fn events(&self) -> &[MidiEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// True if an event with this id is currently present.
    pub fn contains_id(&self, id: EventId) -> bool {
        self.live_ids.contains(&id.raw())
    }

    /// Position of an event equal to `target` in the sort key (beat, note
    /// key, id).
    pub fn index_of_sorted(&self, target: &MidiEvent) -> Option<usize> {
        self.events
            .binary_search_by(|probe| probe.cmp_order(target))
            .ok()
    }

    pub fn find_by_id(&self, id: EventId) -> Option<&MidiEvent> {
        // ids are unique, but their order is unrelated to the sort order
        self.events.iter().find(|e| e.id() == id)
    }

    /// Inserts a fully-formed event (its id must come from this sequence's
    /// counter or from deserialization). False on an id collision.
    pub fn insert(&mut self, event: MidiEvent) -> bool {
        if !self.live_ids.insert(event.id().raw()) {
            debug_assert!(false, "event id collision on insert: {}", event.id());
            return false;
        }
        self.used_ids.insert(event.id().raw());
        self.next_id = self.next_id.max(event.id().raw().wrapping_add(1).max(1));
        match self.events.binary_search_by(|probe| probe.cmp_order(&event)) {
            Ok(_) => {
                self.live_ids.remove(&event.id().raw());
                false
            }
            Err(at) => {
                self.events.insert(at, event);
                true
            }
        }
    }

    /// Removes the event found by sorted lookup; false if absent. The id
    /// stays burned in `used_ids`.
    pub fn remove(&mut self, target: &MidiEvent) -> bool {
        match self.index_of_sorted(target) {
            Some(at) => {
                let removed = self.events.remove(at);
                self.live_ids.remove(&removed.id().raw());
                true
            }
            None => {
                debug_assert!(false, "removing an event that is not here: {}", target.id());
                false
            }
        }
    }

    /// Replaces `before` with `after`, preserving the id. When the sort key
    /// is unchanged the storage slot is reused; otherwise the event moves to
    /// its new position. False if `before` is absent or the ids differ.
    pub fn change(&mut self, before: &MidiEvent, after: &MidiEvent) -> bool {
        if before.id() != after.id() {
            debug_assert!(false, "change must preserve the event id");
            return false;
        }
        let Some(at) = self.index_of_sorted(before) else {
            debug_assert!(false, "changing an event that is not here: {}", before.id());
            return false;
        };
        if before.cmp_order(after) == std::cmp::Ordering::Equal {
            self.events[at] = after.clone();
        } else {
            self.events.remove(at);
            let to = self
                .events
                .binary_search_by(|probe| probe.cmp_order(after))
                .unwrap_err();
            self.events.insert(to, after.clone());
        }
        true
    }

    /// All-or-nothing batch insert: every id is checked before anything
    /// mutates, so a false return means the sequence was not touched.
    pub fn insert_group(&mut self, group: Vec<MidiEvent>) -> bool {
        let mut incoming = HashSet::new();
        for event in &group {
            if self.live_ids.contains(&event.id().raw()) || !incoming.insert(event.id().raw()) {
                debug_assert!(false, "event id collision on group insert: {}", event.id());
                return false;
            }
        }
        for event in group {
            let inserted = self.insert(event);
            debug_assert!(inserted);
        }
        true
    }

    /// All-or-nothing batch removal; false (and no mutation) when any
    /// target is absent or listed twice.
    pub fn remove_group(&mut self, group: &[MidiEvent]) -> bool {
        let mut targets = HashSet::new();
        for event in group {
            if self.index_of_sorted(event).is_none() || !targets.insert(event.id().raw()) {
                debug_assert!(false, "group remove target is not here: {}", event.id());
                return false;
            }
        }
        for event in group {
            let removed = self.remove(event);
            debug_assert!(removed);
        }
        true
    }

    /// All-or-nothing batch change. Targets are distinct by id, so the
    /// per-pair changes cannot invalidate each other's lookups once the
    /// whole batch has been verified.
    pub fn change_group(&mut self, before: &[MidiEvent], after: &[MidiEvent]) -> bool {
        if before.len() != after.len() {
            debug_assert!(false, "group change arity mismatch");
            return false;
        }
        let mut targets = HashSet::new();
        for (b, a) in before.iter().zip(after.iter()) {
            if b.id() != a.id()
                || self.index_of_sorted(b).is_none()
                || !targets.insert(b.id().raw())
            {
                debug_assert!(false, "group change target is not here: {}", b.id());
                return false;
            }
        }
        for (b, a) in before.iter().zip(after.iter()) {
            let changed = self.change(b, a);
            debug_assert!(changed);
        }
        true
    }

    /// Swaps in a whole new event list (checkout, stash restore), keeping
    /// the id history so future ids never collide with what was here
    /// before.
    pub fn replace_events(&mut self, events: Vec<MidiEvent>) {
        self.events = events;
        self.events.sort_by(|a, b| a.cmp_order(b));
        self.live_ids.clear();
        for event in &self.events {
            let id = event.id().raw();
            debug_assert!(!self.live_ids.contains(&id));
            self.live_ids.insert(id);
            self.used_ids.insert(id);
            self.next_id = self.next_id.max(id.wrapping_add(1).max(1));
        }
    }

    pub fn first_beat(&self) -> Option<f32> {
        self.events.first().map(|e| e.beat())
    }

    pub fn last_beat(&self) -> Option<f32> {
        // events are sorted by start beat; the longest tail may be anywhere
        self.events
            .iter()
            .map(|e| e.end_beat())
            .fold(None, |acc, b| Some(acc.map_or(b, |a: f32| a.max(b))))
    }

    /// Restores the invariants after deserialization: sorts, rebuilds the
    /// id bookkeeping, and re-identifies any event whose id collides with
    /// an earlier one. Returns the number of repaired events.
    pub fn normalize(&mut self) -> usize {
        self.events.sort_by(|a, b| a.cmp_order(b));
        self.live_ids.clear();
        self.used_ids.clear();
        let mut max_id = 0u32;
        for event in &self.events {
            max_id = max_id.max(event.id().raw());
        }
        self.next_id = max_id.wrapping_add(1).max(1);
        let mut repaired = 0;
        for at in 0..self.events.len() {
            let id = self.events[at].id().raw();
            if self.live_ids.insert(id) {
                self.used_ids.insert(id);
            } else {
                debug_assert!(false, "duplicate event id on load: {}", self.events[at].id());
                let fresh = self.new_event_id();
                self.events[at] = self.events[at].with_id(fresh);
                self.live_ids.insert(fresh.raw());
                repaired += 1;
            }
        }
        if repaired > 0 {
            self.events.sort_by(|a, b| a.cmp_order(b));
        }
        repaired
    }
}

impl Default for MidiSequence {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize, Deserialize)]
#[serde(transparent)]
struct SequenceWire {
    events: Vec<MidiEvent>,
}

impl From<SequenceWire> for MidiSequence {
    fn from(wire: SequenceWire) -> Self {
        let mut sequence = MidiSequence::new();
        sequence.events = wire.events;
        sequence.normalize();
        sequence
    }
}

impl From<MidiSequence> for SequenceWire {
    fn from(sequence: MidiSequence) -> Self {
        Self {
            events: sequence.events,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Note;

    fn note(seq: &mut MidiSequence, key: i32, beat: f32) -> MidiEvent {
        let id = seq.new_event_id();
        MidiEvent::from(Note::new(id, key, beat, 1.0, 0.5))
    }

    fn assert_sorted(seq: &MidiSequence) {
        for pair in seq.events().windows(2) {
            assert_eq!(std::cmp::Ordering::Less, pair[0].cmp_order(&pair[1]));
        }
    }

    #[test]
    fn inserts_stay_sorted() {
        let mut seq = MidiSequence::new();
        for (key, beat) in [(60, 2.0), (72, 0.0), (60, 0.0), (48, 1.0), (60, 1.0)] {
            let e = note(&mut seq, key, beat);
            assert!(seq.insert(e));
        }
        assert_eq!(5, seq.len());
        assert_sorted(&seq);
        assert_eq!(Some(0.0), seq.first_beat());
        assert_eq!(Some(3.0), seq.last_beat());
    }

    #[test]
    fn ids_are_unique_and_tracked() {
        let mut seq = MidiSequence::new();
        let a = note(&mut seq, 60, 0.0);
        let b = note(&mut seq, 60, 0.0);
        assert_ne!(a.id(), b.id());
        assert!(seq.insert(a.clone()));
        assert!(seq.insert(b));
        for e in seq.events() {
            assert!(seq.contains_id(e.id()));
        }
        assert!(seq.remove(&a));
        assert!(!seq.contains_id(a.id()));
    }

    #[test]
    fn removed_ids_are_never_reissued() {
        let mut seq = MidiSequence::new();
        let a = note(&mut seq, 60, 0.0);
        assert!(seq.insert(a.clone()));
        assert!(seq.remove(&a));
        let b = note(&mut seq, 60, 0.0);
        assert_ne!(a.id(), b.id());
        // replacing all content keeps the history as well
        seq.replace_events(Vec::new());
        let c = note(&mut seq, 60, 0.0);
        assert_ne!(a.id(), c.id());
        assert_ne!(b.id(), c.id());
    }

    #[test]
    fn change_preserves_id_and_resorts() {
        let mut seq = MidiSequence::new();
        let a = note(&mut seq, 60, 0.0);
        let b = note(&mut seq, 61, 1.0);
        assert!(seq.insert(a.clone()));
        assert!(seq.insert(b));

        let MidiEvent::Note(before) = a.clone() else {
            unreachable!()
        };
        let after = MidiEvent::from(before.with_key_beat(70, 2.0));
        assert!(seq.change(&a, &after));
        assert_eq!(2, seq.len());
        assert_sorted(&seq);
        assert_eq!(a.id(), seq.events().last().unwrap().id());
    }

    #[test]
    fn change_reuses_slot_for_same_sort_key() {
        let mut seq = MidiSequence::new();
        let a = note(&mut seq, 60, 0.0);
        assert!(seq.insert(a.clone()));
        let MidiEvent::Note(before) = a.clone() else {
            unreachable!()
        };
        let after = MidiEvent::from(before.with_velocity(0.9));
        assert!(seq.change(&a, &after));
        assert_eq!(after, seq.events()[0]);
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic)]
    fn remove_of_absent_event_fails() {
        let mut seq = MidiSequence::new();
        let a = note(&mut seq, 60, 0.0);
        assert!(!seq.remove(&a));
    }

    #[test]
    fn group_operations_round_trip() {
        let mut seq = MidiSequence::new();
        let group: Vec<MidiEvent> = [(60, 2.0), (64, 0.0), (67, 1.0)]
            .iter()
            .map(|&(key, beat)| note(&mut seq, key, beat))
            .collect();
        assert!(seq.insert_group(group.clone()));
        assert_eq!(3, seq.len());
        assert_sorted(&seq);

        // transpose the whole group up an octave
        let transposed: Vec<MidiEvent> = group
            .iter()
            .map(|e| match e {
                MidiEvent::Note(n) => MidiEvent::from(n.with_delta_key(12)),
                _ => unreachable!(),
            })
            .collect();
        assert!(seq.change_group(&group, &transposed));
        assert_sorted(&seq);
        for (e, t) in seq.events().iter().zip([76, 79, 72]) {
            let MidiEvent::Note(n) = e else { unreachable!() };
            assert_eq!(t, n.key());
        }

        assert!(seq.remove_group(&transposed));
        assert!(seq.is_empty());
    }

    #[test]
    fn group_operations_are_atomic() {
        // precondition violations trip debug assertions by design, so the
        // no-partial-mutation guarantee is exercised in release semantics
        if cfg!(debug_assertions) {
            return;
        }
        let mut seq = MidiSequence::new();
        let present = note(&mut seq, 60, 0.0);
        assert!(seq.insert(present.clone()));
        let fresh = note(&mut seq, 64, 1.0);

        // one colliding id refuses the whole batch
        assert!(!seq.insert_group(vec![fresh.clone(), present.clone()]));
        assert_eq!(1, seq.len());
        assert!(!seq.contains_id(fresh.id()));

        // one absent target refuses the whole removal
        assert!(!seq.remove_group(&[present.clone(), fresh.clone()]));
        assert_eq!(1, seq.len());

        // and the whole change
        let MidiEvent::Note(n) = &present else {
            unreachable!()
        };
        let moved = MidiEvent::from(n.with_delta_key(1));
        assert!(!seq.change_group(
            &[present.clone(), fresh.clone()],
            &[moved, fresh.clone()]
        ));
        assert_eq!(present, seq.events()[0]);
    }

    #[test]
    fn adoption_assigns_fresh_ids() {
        let mut source = MidiSequence::new();
        let a = note(&mut source, 60, 0.0);
        assert!(source.insert(a.clone()));

        let mut target = MidiSequence::new();
        let adopted = target.adopt(&a);
        assert!(target.insert(adopted.clone()));
        assert_eq!(a.beat(), adopted.beat());
        assert!(target.contains_id(adopted.id()));
    }

    #[test]
    fn normalize_repairs_colliding_ids() {
        // normalize() trips a debug assertion on the collision by design,
        // so exercise the repair path in release-mode semantics only
        if cfg!(debug_assertions) {
            return;
        }
        let duplicate = EventId::new(5);
        let mut seq = MidiSequence::new();
        seq.events = vec![
            MidiEvent::from(Note::new(duplicate, 60, 0.0, 1.0, 0.5)),
            MidiEvent::from(Note::new(duplicate, 64, 1.0, 1.0, 0.5)),
        ];
        assert_eq!(1, seq.normalize());
        assert_eq!(2, seq.len());
        assert_ne!(seq.events()[0].id(), seq.events()[1].id());
    }
}

//! The undo stack: transactions of reversible actions with coalescing and
//! a total-size budget.

pub mod actions;

use serde::{Deserialize, Serialize};

use lammas_types::{Project, ProjectEvent};

pub use actions::{TrackProperties, UndoAction};

/// Fallback history budget, in action size units.
pub const DEFAULT_MAX_UNITS: usize = 32768;

/// Actions performed between two checkpoints; undone and redone as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Transaction {
    actions: Vec<UndoAction>,
}

/// A bounded undo history.
///
/// `cursor` counts the transactions currently applied to the project;
/// everything past it is the redo tail, dropped as soon as a new action is
/// performed. When the summed `size_in_units` of the history exceeds the
/// budget, the oldest transactions fall off the far end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UndoStack {
    transactions: Vec<Transaction>,
    cursor: usize,
    #[serde(default = "default_max_units")]
    max_units: usize,
    #[serde(skip, default = "default_true")]
    start_new_transaction: bool,
}

// the transaction-grouping flag is transient, so it stays out of equality
impl PartialEq for UndoStack {
    fn eq(&self, other: &Self) -> bool {
        self.transactions == other.transactions
            && self.cursor == other.cursor
            && self.max_units == other.max_units
    }
}

fn default_max_units() -> usize {
    DEFAULT_MAX_UNITS
}

fn default_true() -> bool {
    true
}

impl UndoStack {
    pub fn new(max_units: usize) -> Self {
        Self {
            transactions: Vec::new(),
            cursor: 0,
            max_units: max_units.max(1),
            start_new_transaction: true,
        }
    }

    /// Starts a new transaction: the next performed action opens a fresh
    /// undo step instead of joining (or coalescing into) the current one.
    pub fn checkpoint(&mut self) {
        self.start_new_transaction = true;
    }

    /// Performs the action and records it. A false return means the action
    /// itself failed, which is a programmer error: the stack gives up its
    /// history rather than hold a sequence it can no longer replay.
    pub fn perform(
        &mut self,
        action: UndoAction,
        project: &mut Project,
        changes: &mut Vec<ProjectEvent>,
    ) -> bool {
        if !action.perform(project, changes) {
            debug_assert!(false, "undoable action failed to perform");
            log::error!(target: "undo", "action failed to perform, clearing history");
            self.clear();
            return false;
        }

        // performing anything new drops the redo tail
        self.transactions.truncate(self.cursor);

        let coalesced = if self.start_new_transaction {
            None
        } else {
            self.transactions
                .last()
                .and_then(|tx| tx.actions.last())
                .and_then(|last| last.coalesced_with(&action))
        };

        match coalesced {
            Some(merged) => {
                let tx = self.transactions.last_mut().unwrap();
                *tx.actions.last_mut().unwrap() = merged;
            }
            None => {
                if self.start_new_transaction || self.transactions.is_empty() {
                    self.transactions.push(Transaction {
                        actions: vec![action],
                    });
                } else {
                    self.transactions.last_mut().unwrap().actions.push(action);
                }
            }
        }

        self.start_new_transaction = false;
        self.cursor = self.transactions.len();
        self.enforce_budget();
        true
    }

    /// Undoes one transaction; a no-op returning false when exhausted.
    pub fn undo(&mut self, project: &mut Project, changes: &mut Vec<ProjectEvent>) -> bool {
        if self.cursor == 0 {
            return false;
        }
        let tx = self.transactions[self.cursor - 1].clone();
        for action in tx.actions.iter().rev() {
            if !action.undo(project, changes) {
                debug_assert!(false, "undoable action failed to undo");
                log::error!(target: "undo", "action failed to undo, clearing history");
                self.clear();
                return false;
            }
        }
        self.cursor -= 1;
        self.start_new_transaction = true;
        true
    }

    /// Redoes one transaction; a no-op returning false when exhausted.
    pub fn redo(&mut self, project: &mut Project, changes: &mut Vec<ProjectEvent>) -> bool {
        if self.cursor == self.transactions.len() {
            return false;
        }
        let tx = self.transactions[self.cursor].clone();
        for action in &tx.actions {
            if !action.perform(project, changes) {
                debug_assert!(false, "undoable action failed to redo");
                log::error!(target: "undo", "action failed to redo, clearing history");
                self.clear();
                return false;
            }
        }
        self.cursor += 1;
        self.start_new_transaction = true;
        true
    }

    /// Truncates the whole history, e.g. after a checkout.
    pub fn clear(&mut self) {
        self.transactions.clear();
        self.cursor = 0;
        self.start_new_transaction = true;
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.transactions.len()
    }

    pub fn total_units(&self) -> usize {
        self.transactions
            .iter()
            .flat_map(|tx| tx.actions.iter())
            .map(|a| a.size_in_units())
            .sum()
    }

    fn enforce_budget(&mut self) {
        while self.total_units() > self.max_units && self.transactions.len() > 1 && self.cursor > 0
        {
            self.transactions.remove(0);
            self.cursor -= 1;
        }
    }

    #[cfg(test)]
    fn depth(&self) -> usize {
        self.transactions.len()
    }
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UNITS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lammas_types::{MidiEvent, MidiTrack, Note, TrackKind};

    fn project_with_track() -> (Project, lammas_types::TrackId) {
        let mut project = Project::new("Test", 0);
        let track = MidiTrack::new(TrackKind::Piano, "Piano");
        let id = track.id();
        project.add_track(track, 0);
        (project, id)
    }

    fn draw_note(project: &mut Project, track: lammas_types::TrackId, key: i32) -> MidiEvent {
        let seq = project.track_mut(track).unwrap().sequence_mut();
        MidiEvent::from(Note::new(seq.new_event_id(), key, 0.0, 1.0, 0.5))
    }

    #[test]
    fn undo_inverts_perform() {
        let (mut project, track) = project_with_track();
        let mut stack = UndoStack::default();
        let mut changes = Vec::new();

        let note = draw_note(&mut project, track, 60);
        stack.checkpoint();
        assert!(stack.perform(
            UndoAction::EventInsert {
                track,
                event: note.clone()
            },
            &mut project,
            &mut changes,
        ));
        assert_eq!(1, project.track(track).unwrap().sequence().len());

        assert!(stack.undo(&mut project, &mut changes));
        assert_eq!(0, project.track(track).unwrap().sequence().len());

        // the note comes back under the same id
        assert!(stack.redo(&mut project, &mut changes));
        assert_eq!(
            note.id(),
            project.track(track).unwrap().sequence().events()[0].id()
        );
    }

    #[test]
    fn exhausted_stack_is_a_no_op() {
        let (mut project, _) = project_with_track();
        let mut stack = UndoStack::default();
        let mut changes = Vec::new();
        assert!(!stack.undo(&mut project, &mut changes));
        assert!(!stack.redo(&mut project, &mut changes));
    }

    #[test]
    fn consecutive_changes_coalesce() {
        let (mut project, track) = project_with_track();
        let mut stack = UndoStack::default();
        let mut changes = Vec::new();

        let e0 = draw_note(&mut project, track, 60);
        stack.checkpoint();
        assert!(stack.perform(
            UndoAction::EventInsert {
                track,
                event: e0.clone()
            },
            &mut project,
            &mut changes,
        ));

        let MidiEvent::Note(n0) = e0.clone() else {
            unreachable!()
        };
        let e1 = MidiEvent::from(n0.with_key(61));
        let e2 = MidiEvent::from(n0.with_key(62));

        stack.checkpoint();
        assert!(stack.perform(
            UndoAction::EventChange {
                track,
                before: e0.clone(),
                after: e1.clone()
            },
            &mut project,
            &mut changes,
        ));
        assert!(stack.perform(
            UndoAction::EventChange {
                track,
                before: e1,
                after: e2
            },
            &mut project,
            &mut changes,
        ));

        // one undo jumps all the way back to the original key
        assert!(stack.undo(&mut project, &mut changes));
        let events = project.track(track).unwrap().sequence().events();
        let MidiEvent::Note(current) = &events[0] else {
            unreachable!()
        };
        assert_eq!(60, current.key());
        assert_eq!(2, stack.depth());
    }

    #[test]
    fn redo_tail_drops_on_new_action() {
        let (mut project, track) = project_with_track();
        let mut stack = UndoStack::default();
        let mut changes = Vec::new();

        let a = draw_note(&mut project, track, 60);
        let b = draw_note(&mut project, track, 64);
        stack.checkpoint();
        assert!(stack.perform(
            UndoAction::EventInsert { track, event: a },
            &mut project,
            &mut changes
        ));
        assert!(stack.undo(&mut project, &mut changes));
        assert!(stack.can_redo());

        stack.checkpoint();
        assert!(stack.perform(
            UndoAction::EventInsert { track, event: b },
            &mut project,
            &mut changes
        ));
        assert!(!stack.can_redo());
        assert_eq!(1, stack.depth());
    }

    #[test]
    fn budget_drops_oldest_transactions() {
        let (mut project, track) = project_with_track();
        let mut stack = UndoStack::new(4);
        let mut changes = Vec::new();

        for i in 0..8 {
            let e = draw_note(&mut project, track, 60 + i);
            stack.checkpoint();
            assert!(stack.perform(
                UndoAction::EventInsert { track, event: e },
                &mut project,
                &mut changes
            ));
        }
        assert!(stack.total_units() <= 4);
        assert!(stack.depth() < 8);
        // what remains is still undoable
        while stack.can_undo() {
            assert!(stack.undo(&mut project, &mut changes));
        }
        assert!(!project.track(track).unwrap().sequence().is_empty());
    }
}

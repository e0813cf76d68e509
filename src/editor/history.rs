//! Undo/redo history.
//!
//! A transaction is opened with [`EditorHistory::new_action`], which snapshots
//! the pathway. Every mutation until the next `new_action` (or an explicit
//! [`EditorHistory::commit`]) belongs to it. Committing records the snapshot
//! taken after the mutations, so undo and redo restore whole states: derived
//! bounds and connector shapes come back exactly as they were.
//!
//! Each recorded transaction remembers the pathway revision it expects to
//! find when it is applied. If the pathway was changed outside any
//! transaction since, undo and redo refuse with
//! [`HistoryError::StateDiverged`] instead of overwriting those changes.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut history = EditorHistory::new(100);
//! history.new_action(&model, "Move");
//! model.move_by(&id, 10.0, 0.0)?;
//! history.commit(&model);
//! history.undo(&mut model)?; // reverts the move
//! history.redo(&mut model)?; // re-applies the move
//! ```

use tracing::{debug, warn};

use crate::error::HistoryError;
use crate::pathway::{PathwayModel, PathwaySnapshot};

/// A recorded, invertible transaction.
#[derive(Debug, Clone)]
pub struct Transaction {
    label: String,
    before: PathwaySnapshot,
    after: PathwaySnapshot,
    /// Revision the pathway must be at for this transaction to be undone
    /// (on the undo stack) or redone (on the redo stack).
    expected_revision: u64,
}

impl Transaction {
    pub fn label(&self) -> &str {
        &self.label
    }
}

#[derive(Debug, Clone)]
struct OpenAction {
    label: String,
    before: PathwaySnapshot,
    revision: u64,
}

#[derive(Debug, Clone)]
pub struct EditorHistory {
    undo_stack: Vec<Transaction>,
    redo_stack: Vec<Transaction>,
    open: Option<OpenAction>,
    max_size: usize,
}

impl Default for EditorHistory {
    fn default() -> Self {
        Self::new(200)
    }
}

impl EditorHistory {
    /// Create a new history with the given maximum undo depth.
    pub fn new(max_size: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            open: None,
            max_size: max_size.max(1),
        }
    }

    /// Open a transaction, committing the previous one if still open.
    pub fn new_action(&mut self, model: &PathwayModel, label: &str) {
        self.commit(model);
        self.open = Some(OpenAction {
            label: label.to_string(),
            before: model.snapshot(),
            revision: model.revision(),
        });
    }

    /// Whether a transaction is open.
    pub fn is_recording(&self) -> bool {
        self.open.is_some()
    }

    /// Close the open transaction. Returns true if it changed the pathway and
    /// was recorded; transactions that changed nothing are discarded.
    pub fn commit(&mut self, model: &PathwayModel) -> bool {
        let Some(action) = self.open.take() else {
            return false;
        };
        if model.revision() == action.revision {
            return false;
        }
        debug!(label = %action.label, "committing transaction");
        self.undo_stack.push(Transaction {
            label: action.label,
            before: action.before,
            after: model.snapshot(),
            expected_revision: model.revision(),
        });
        self.redo_stack.clear();
        if self.undo_stack.len() > self.max_size {
            self.undo_stack.remove(0);
        }
        true
    }

    /// Close the open transaction and put the pathway back the way it was
    /// when the transaction was opened.
    pub fn rollback(&mut self, model: &mut PathwayModel) {
        let Some(action) = self.open.take() else {
            return;
        };
        if model.revision() != action.revision {
            debug!(label = %action.label, "rolling back transaction");
            model.restore(&action.before);
        }
    }

    /// Undo the most recent transaction, returning its label.
    pub fn undo(&mut self, model: &mut PathwayModel) -> Result<String, HistoryError> {
        self.commit(model);
        let Some(mut tx) = self.undo_stack.pop() else {
            return Err(HistoryError::NothingToUndo);
        };
        if model.revision() != tx.expected_revision {
            warn!(label = %tx.label, "refusing to undo: pathway changed outside the history");
            let label = tx.label.clone();
            self.undo_stack.push(tx);
            return Err(HistoryError::StateDiverged { label });
        }
        model.restore(&tx.before);
        tx.expected_revision = model.revision();
        let label = tx.label.clone();
        self.redo_stack.push(tx);
        Ok(label)
    }

    /// Redo the most recently undone transaction, returning its label.
    pub fn redo(&mut self, model: &mut PathwayModel) -> Result<String, HistoryError> {
        self.commit(model);
        let Some(mut tx) = self.redo_stack.pop() else {
            return Err(HistoryError::NothingToRedo);
        };
        if model.revision() != tx.expected_revision {
            warn!(label = %tx.label, "refusing to redo: pathway changed outside the history");
            let label = tx.label.clone();
            self.redo_stack.push(tx);
            return Err(HistoryError::StateDiverged { label });
        }
        model.restore(&tx.after);
        tx.expected_revision = model.revision();
        let label = tx.label.clone();
        self.undo_stack.push(tx);
        Ok(label)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Label of the transaction `undo` would revert.
    pub fn undo_label(&self) -> Option<&str> {
        self.undo_stack.last().map(Transaction::label)
    }

    pub fn redo_label(&self) -> Option<&str> {
        self.redo_stack.last().map(Transaction::label)
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Clear all history, dropping any open transaction.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.open = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DataNodeType, PathwayElement, Rect};

    fn model() -> PathwayModel {
        let mut p = PathwayModel::new();
        p.add(PathwayElement::data_node("A", DataNodeType::GeneProduct, Rect::new(0.0, 0.0, 80.0, 20.0)).with_id("a"))
            .unwrap();
        p
    }

    fn left(p: &PathwayModel) -> f64 {
        p.element_bounds(&"a".into()).unwrap().left
    }

    #[test]
    fn test_undo_redo_move() {
        let mut p = model();
        let mut h = EditorHistory::new(10);
        h.new_action(&p, "Move");
        p.move_by(&"a".into(), 30.0, 0.0).unwrap();
        assert!(h.commit(&p));
        assert_eq!(h.undo_label(), Some("Move"));

        assert_eq!(h.undo(&mut p).unwrap(), "Move");
        assert_eq!(left(&p), 0.0);
        assert!(h.can_redo());

        assert_eq!(h.redo(&mut p).unwrap(), "Move");
        assert_eq!(left(&p), 30.0);
    }

    #[test]
    fn test_empty_transaction_is_discarded() {
        let p = model();
        let mut h = EditorHistory::new(10);
        h.new_action(&p, "Nothing");
        assert!(!h.commit(&p));
        assert!(!h.can_undo());
    }

    #[test]
    fn test_new_action_commits_previous() {
        let mut p = model();
        let mut h = EditorHistory::new(10);
        h.new_action(&p, "First");
        p.move_by(&"a".into(), 10.0, 0.0).unwrap();
        h.new_action(&p, "Second");
        p.move_by(&"a".into(), 10.0, 0.0).unwrap();
        h.undo(&mut p).unwrap();
        assert_eq!(left(&p), 10.0);
        h.undo(&mut p).unwrap();
        assert_eq!(left(&p), 0.0);
        assert!(matches!(h.undo(&mut p), Err(HistoryError::NothingToUndo)));
    }

    #[test]
    fn test_refuses_after_outside_change() {
        let mut p = model();
        let mut h = EditorHistory::new(10);
        h.new_action(&p, "Move");
        p.move_by(&"a".into(), 10.0, 0.0).unwrap();
        h.commit(&p);

        p.move_by(&"a".into(), 5.0, 0.0).unwrap();
        let err = h.undo(&mut p).unwrap_err();
        assert!(matches!(err, HistoryError::StateDiverged { ref label } if label == "Move"));
        // nothing applied, stack intact
        assert_eq!(left(&p), 15.0);
        assert!(h.can_undo());
    }

    #[test]
    fn test_new_commit_clears_redo() {
        let mut p = model();
        let mut h = EditorHistory::new(10);
        h.new_action(&p, "Move");
        p.move_by(&"a".into(), 10.0, 0.0).unwrap();
        h.undo(&mut p).unwrap();
        h.new_action(&p, "Other");
        p.move_by(&"a".into(), 0.0, 10.0).unwrap();
        h.commit(&p);
        assert!(!h.can_redo());
    }

    #[test]
    fn test_rollback_restores() {
        let mut p = model();
        let mut h = EditorHistory::new(10);
        h.new_action(&p, "Move");
        p.move_by(&"a".into(), 10.0, 0.0).unwrap();
        h.rollback(&mut p);
        assert_eq!(left(&p), 0.0);
        assert!(!h.is_recording());
        assert!(!h.can_undo());
    }

    #[test]
    fn test_history_max_size() {
        let mut p = model();
        let mut h = EditorHistory::new(3);
        for _ in 0..5 {
            h.new_action(&p, "Move");
            p.move_by(&"a".into(), 1.0, 0.0).unwrap();
            h.commit(&p);
        }
        assert_eq!(h.undo_depth(), 3);
    }
}

//! Editor state management.
//!
//! [`EditorState`] ties one pathway to its view and adds the editing state
//! around them: undo/redo history, clipboard, the pointer gesture in
//! progress and the dirty flag. Every editing command runs as one
//! transaction and leaves the view synchronized.

use anyhow::Context;
use camino::Utf8Path;
use tracing::{debug, info};

use crate::config::EditorConfig;
use crate::error::{HistoryError, ModelError, Result};
use crate::model::{ElementId, Point};
use crate::pathway::PathwayModel;
use crate::view::{HandlePosition, VKey, VPathway};
use crate::{generator, parser};

use super::clipboard::EditorClipboard;
use super::history::EditorHistory;
use super::operations::{self, GroupToggle, LayoutType};

// ────────────────────────────────────────────────────────────────────────────
// Drag state
// ────────────────────────────────────────────────────────────────────────────

/// What the pointer is currently dragging.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DragMode {
    /// Not dragging anything.
    #[default]
    None,
    /// Moving the selection.
    Selection {
        /// Delta already applied to the pathway, in model coordinates.
        applied_x: f64,
        applied_y: f64,
    },
    /// Dragging a selection handle.
    Handle {
        owner: ElementId,
        position: HandlePosition,
    },
    /// Drawing the rubber band.
    SelectionRect,
}

// ────────────────────────────────────────────────────────────────────────────
// EditorState
// ────────────────────────────────────────────────────────────────────────────

/// The complete state of one editing session.
///
/// # Example
///
/// ```rust,ignore
/// use pathweaver::editor::EditorState;
///
/// let mut state = EditorState::new(model, EditorConfig::default());
/// state.view.select_only(&id);
/// state.delete_selection()?;
/// state.undo()?;
/// ```
#[derive(Debug, Clone)]
pub struct EditorState {
    pub model: PathwayModel,
    pub view: VPathway,
    pub history: EditorHistory,
    pub clipboard: EditorClipboard,
    pub drag_mode: DragMode,
    /// Whether the pathway has been modified since it was last saved.
    pub dirty: bool,
    /// View-space point where the current gesture started.
    press_origin: Option<Point>,
    config: EditorConfig,
}

impl EditorState {
    pub fn new(mut model: PathwayModel, config: EditorConfig) -> Self {
        model.drain_events();
        let view = VPathway::from_model(&model, &config);
        Self {
            model,
            view,
            history: EditorHistory::new(config.undo_depth),
            clipboard: EditorClipboard::new(config.paste_offset),
            drag_mode: DragMode::None,
            dirty: false,
            press_origin: None,
            config,
        }
    }

    /// Read a pathway document and open it.
    pub fn open(path: &Utf8Path, config: EditorConfig) -> anyhow::Result<Self> {
        let model = parser::read_from_file(path, &config)?;
        info!(path = %path, elements = model.len(), "opened pathway");
        Ok(Self::new(model, config))
    }

    /// Write the pathway to `path` and clear the dirty flag.
    pub fn save(&mut self, path: &Utf8Path) -> anyhow::Result<()> {
        self.history.commit(&self.model);
        generator::write_to_file(&self.model, path)
            .with_context(|| format!("Failed to save pathway to {}", path))?;
        self.clear_dirty();
        Ok(())
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Snap a model coordinate to the grid if snapping is enabled.
    pub fn snap(&self, value: f64) -> f64 {
        self.config.snap(value)
    }

    pub fn set_snap_to_grid(&mut self, on: bool) {
        self.config.snap_to_grid = on;
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Bring the view up to date with pending pathway events.
    pub fn sync(&mut self) {
        self.view.sync(&mut self.model);
    }

    /// Run `f` as one undoable transaction. On error every change `f` made
    /// is rolled back and nothing is recorded.
    pub fn transact<T>(
        &mut self,
        label: &str,
        f: impl FnOnce(&mut PathwayModel) -> Result<T>,
    ) -> Result<T> {
        self.history.new_action(&self.model, label);
        let result = f(&mut self.model);
        match &result {
            Ok(_) => {
                if self.history.commit(&self.model) {
                    self.dirty = true;
                }
            }
            Err(e) => {
                debug!(label, error = %e, "transaction failed, rolling back");
                self.history.rollback(&mut self.model);
            }
        }
        self.sync();
        result
    }

    fn reselect(&mut self, ids: &[ElementId]) {
        self.view.clear_selection();
        for id in operations::outermost(&self.model, ids) {
            self.view.add_to_selection(&id);
        }
    }

    // ──────────────────────────────────────────────────────────────────────
    // Commands on the selection
    // ──────────────────────────────────────────────────────────────────────

    /// Copy the selection to the clipboard.
    pub fn copy_selection(&mut self) -> usize {
        let ids = self.view.selected_ids();
        if ids.is_empty() {
            return 0;
        }
        self.clipboard.copy(&self.model, &ids)
    }

    pub fn cut_selection(&mut self) -> Result<usize> {
        let copied = self.copy_selection();
        if copied > 0 {
            self.delete_selection()?;
        }
        Ok(copied)
    }

    /// Paste the clipboard and select what was pasted.
    pub fn paste(&mut self) -> Result<Vec<ElementId>> {
        if !self.clipboard.has_content() {
            return Ok(Vec::new());
        }
        self.history.new_action(&self.model, "Paste");
        let pasted = match self.clipboard.paste(&mut self.model) {
            Ok(ids) => ids,
            Err(e) => {
                self.history.rollback(&mut self.model);
                self.sync();
                return Err(e);
            }
        };
        if self.history.commit(&self.model) {
            self.dirty = true;
        }
        self.sync();
        self.reselect(&pasted);
        Ok(pasted)
    }

    /// Delete the selected elements. Returns how many elements went away.
    pub fn delete_selection(&mut self) -> Result<usize> {
        let ids = self.view.selected_ids();
        if ids.is_empty() {
            return Ok(0);
        }
        self.view.clear_selection();
        self.transact("Delete", |model| Ok(operations::delete_elements(model, &ids).len()))
    }

    /// Group the selection, or ungroup it if it is a single group.
    pub fn toggle_group_selection(&mut self) -> Result<GroupToggle> {
        let ids = self.view.selected_ids();
        if ids.is_empty() {
            return Err(ModelError::EmptySelection);
        }
        let outcome = self.transact("Group", |model| operations::toggle_group(model, &ids))?;
        match &outcome {
            GroupToggle::Grouped(g) => self.reselect(std::slice::from_ref(g)),
            GroupToggle::Ungrouped(members) => self.reselect(members),
        }
        Ok(outcome)
    }

    pub fn layout_selection(&mut self, layout: LayoutType) -> Result<()> {
        let ids = self.view.selected_ids();
        self.transact(layout.label(), |model| operations::layout(model, &ids, layout))
    }

    pub fn bring_selection_to_front(&mut self) -> Result<()> {
        let ids = self.view.selected_ids();
        self.transact("Bring to front", |model| operations::bring_to_front(model, &ids))
    }

    pub fn send_selection_to_back(&mut self) -> Result<()> {
        let ids = self.view.selected_ids();
        self.transact("Send to back", |model| operations::send_to_back(model, &ids))
    }

    /// Move the selection by a model-space delta, as one transaction.
    pub fn nudge_selection(&mut self, dx: f64, dy: f64) -> Result<()> {
        let ids = self.view.selected_ids();
        self.transact("Move", |model| model.move_elements(&ids, dx, dy))
    }

    /// Undo the last transaction, returning its label.
    pub fn undo(&mut self) -> std::result::Result<String, HistoryError> {
        self.cancel_gesture();
        let result = self.history.undo(&mut self.model);
        if result.is_ok() {
            self.dirty = true;
        }
        self.sync();
        result
    }

    /// Redo the last undone transaction, returning its label.
    pub fn redo(&mut self) -> std::result::Result<String, HistoryError> {
        self.cancel_gesture();
        let result = self.history.redo(&mut self.model);
        if result.is_ok() {
            self.dirty = true;
        }
        self.sync();
        result
    }

    // ──────────────────────────────────────────────────────────────────────
    // Pointer gestures
    // ──────────────────────────────────────────────────────────────────────

    /// Pointer pressed at a view-space point. With `extend` the clicked
    /// element is toggled into the selection instead of replacing it.
    pub fn press(&mut self, p: Point, extend: bool) {
        self.cancel_gesture();
        self.press_origin = Some(p);

        let hit = self.view.element_at(p).map(|v| v.key().clone());
        match hit {
            Some(VKey::Handle { owner, position }) => {
                self.history.new_action(&self.model, "Resize");
                self.drag_mode = DragMode::Handle { owner, position };
            }
            Some(VKey::Element(id)) => {
                let id = self.model.top_level(&id);
                if extend {
                    self.view.toggle_selection(&id);
                } else if !self.view.selection().contains(&id) {
                    self.view.select_only(&id);
                }
                if self.view.start_drag() {
                    self.history.new_action(&self.model, "Move");
                    self.drag_mode = DragMode::Selection {
                        applied_x: 0.0,
                        applied_y: 0.0,
                    };
                }
            }
            None => {
                if !extend {
                    self.view.clear_selection();
                }
                self.view.start_rect(p);
                self.drag_mode = DragMode::SelectionRect;
            }
        }
    }

    /// Pointer moved to a view-space point while pressed. Moves are snapped
    /// to the grid on the total displacement of the gesture.
    pub fn drag_to(&mut self, p: Point) -> Result<()> {
        let Some(origin) = self.press_origin else {
            return Ok(());
        };
        let zoom = self.view.zoom();
        match self.drag_mode.clone() {
            DragMode::None => Ok(()),
            DragMode::Selection { applied_x, applied_y } => {
                let total_x = self.snap((p.x - origin.x) / zoom);
                let total_y = self.snap((p.y - origin.y) / zoom);
                let (dx, dy) = (total_x - applied_x, total_y - applied_y);
                if dx != 0.0 || dy != 0.0 {
                    self.view.drag_by(&mut self.model, dx * zoom, dy * zoom)?;
                    self.drag_mode = DragMode::Selection {
                        applied_x: total_x,
                        applied_y: total_y,
                    };
                }
                Ok(())
            }
            DragMode::Handle { owner, position } => {
                let delta = (p.x - origin.x, p.y - origin.y);
                self.press_origin = Some(p);
                self.view
                    .drag_handle(&mut self.model, &owner, position, delta.0, delta.1)
            }
            DragMode::SelectionRect => {
                self.view.update_rect(p);
                Ok(())
            }
        }
    }

    /// Pointer released: finish the gesture. A move or resize becomes one
    /// undoable transaction however many steps it took.
    pub fn release(&mut self) {
        match std::mem::take(&mut self.drag_mode) {
            DragMode::Selection { .. } | DragMode::Handle { .. } => {
                self.view.end_drag();
                if self.history.commit(&self.model) {
                    self.dirty = true;
                }
            }
            DragMode::SelectionRect => self.view.finish_rect(&self.model),
            DragMode::None => {}
        }
        self.press_origin = None;
        self.sync();
    }

    fn cancel_gesture(&mut self) {
        if self.drag_mode != DragMode::None {
            self.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DataNodeType, PathwayElement, Rect};

    fn state() -> EditorState {
        let mut p = PathwayModel::new();
        p.add(PathwayElement::data_node("A", DataNodeType::Protein, Rect::new(100.0, 100.0, 80.0, 20.0)).with_id("a"))
            .unwrap();
        p.add(PathwayElement::data_node("B", DataNodeType::Protein, Rect::new(300.0, 100.0, 80.0, 20.0)).with_id("b"))
            .unwrap();
        EditorState::new(p, EditorConfig::default())
    }

    #[test]
    fn test_editor_state_new() {
        let state = state();
        assert!(!state.dirty);
        assert!(state.view.selection().is_empty());
        assert!(!state.history.can_undo());
        assert_eq!(state.view.len(), 2);
    }

    #[test]
    fn test_editor_state_snap() {
        let mut state = state();
        assert_eq!(state.snap(12.0), 12.0);
        state.set_snap_to_grid(true);
        assert_eq!(state.snap(12.0), 10.0);
        assert_eq!(state.snap(13.0), 15.0);
    }

    #[test]
    fn test_editor_state_dirty() {
        let mut state = state();
        state.mark_dirty();
        assert!(state.dirty);
        state.clear_dirty();
        assert!(!state.dirty);
    }

    #[test]
    fn test_drag_gesture_is_one_transaction() {
        let mut state = state();
        state.set_snap_to_grid(true);
        state.press(Point::new(110.0, 110.0), false);
        assert!(state.view.get(&"a".into()).unwrap().is_selected());
        for step in 1..=4 {
            state.drag_to(Point::new(110.0 + 3.0 * step as f64, 110.0)).unwrap();
        }
        state.release();
        // 12 px snapped to the 5 px grid
        assert_eq!(state.model.element_bounds(&"a".into()).unwrap().left, 110.0);
        assert_eq!(state.history.undo_depth(), 1);
        assert!(state.dirty);

        assert_eq!(state.undo().unwrap(), "Move");
        assert_eq!(state.model.element_bounds(&"a".into()).unwrap().left, 100.0);
        assert_eq!(state.view.get(&"a".into()).unwrap().bounds().left, 100.0);
    }

    #[test]
    fn test_rubber_band_gesture() {
        let mut state = state();
        state.press(Point::new(0.0, 0.0), false);
        state.drag_to(Point::new(500.0, 200.0)).unwrap();
        state.release();
        assert_eq!(state.view.selected_ids().len(), 2);
        assert!(!state.history.can_undo());
    }

    #[test]
    fn test_delete_selection_and_undo() {
        let mut state = state();
        state.view.select_only(&"a".into());
        assert_eq!(state.delete_selection().unwrap(), 1);
        assert!(!state.model.contains(&"a".into()));
        assert!(state.view.get(&"a".into()).is_none());
        assert!(state.view.selection().is_empty());
        assert!(state.dirty);

        state.undo().unwrap();
        assert!(state.model.contains(&"a".into()));
        assert!(state.view.get(&"a".into()).is_some());
    }

    #[test]
    fn test_copy_paste_selects_pasted() {
        let mut state = state();
        state.view.select_only(&"a".into());
        assert_eq!(state.copy_selection(), 1);
        let pasted = state.paste().unwrap();
        assert_eq!(pasted.len(), 1);
        assert_eq!(state.view.selected_ids(), pasted);
        assert_eq!(
            state.model.element_bounds(&pasted[0]),
            Some(Rect::new(120.0, 120.0, 80.0, 20.0))
        );
        assert_eq!(state.history.undo_label(), Some("Paste"));
    }

    #[test]
    fn test_failed_command_rolls_back() {
        let mut state = state();
        let err = state.transact("Broken", |model| {
            model.move_by(&"a".into(), 50.0, 0.0)?;
            model.move_by(&"missing".into(), 50.0, 0.0)
        });
        assert!(err.is_err());
        assert_eq!(state.model.element_bounds(&"a".into()).unwrap().left, 100.0);
        assert!(!state.history.can_undo());
        assert!(!state.dirty);
    }

    #[test]
    fn test_toggle_group_selection() {
        let mut state = state();
        state.view.select_only(&"a".into());
        state.view.add_to_selection(&"b".into());
        let GroupToggle::Grouped(g) = state.toggle_group_selection().unwrap() else {
            panic!("expected a group");
        };
        assert_eq!(state.view.selected_ids(), vec![g.clone()]);
        assert!(state.view.get(&g).is_some());

        state.toggle_group_selection().unwrap();
        assert!(state.view.get(&g).is_none());
        assert_eq!(state.view.selected_ids().len(), 2);
    }
}

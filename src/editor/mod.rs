//! Pathway editor.
//!
//! This module provides the editing layer on top of a pathway and its view:
//!
//! - **Operations**: grouping, ungrouping, deletion, z-order and layout
//! - **History**: transactional undo/redo with snapshot restore
//! - **Clipboard**: closed-fragment copy, offset paste and a text form
//! - **State**: one editing session, pointer gestures and the dirty flag

pub mod clipboard;
pub mod history;
pub mod operations;
pub mod state;

pub use clipboard::{COPIED_SOURCE, ClipboardContent, EditorClipboard, IdMap, expand_selection, remap_references};
pub use history::{EditorHistory, Transaction};
pub use operations::{
    GroupToggle, LayoutType, bring_to_front, delete_elements, group_elements, layout, outermost,
    send_to_back, toggle_group, ungroup,
};
pub use state::{DragMode, EditorState};

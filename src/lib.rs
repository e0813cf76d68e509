//! Pathway diagram engine.
//!
//! This crate keeps a typed pathway graph (data nodes, interactions, groups,
//! anchors, literature references) consistent with an interactive view of
//! it: selection, dragging, grouping, routed connectors, undo/redo and a
//! clipboard that preserves internal references.
//!
//! The binary `pathweaver` reads pathway XML documents and prints summaries,
//! JSON dumps or re-written XML.

pub mod config;
pub mod connector;
pub mod editor;
pub mod error;
pub mod generator;
pub mod loader;
pub mod lookup;
pub mod model;
pub mod parser;
pub mod pathway;
pub mod view;

pub use config::EditorConfig;
pub use editor::EditorState;
pub use error::{HistoryError, LookupError, ModelError};
pub use model::{ElementId, ElementKind, ObjectType, PathwayElement};
pub use pathway::PathwayModel;
pub use view::VPathway;

use crate::model::{ElementId, ObjectType};

/// Errors returned by pathway mutators.
///
/// Dangling references are never reported here: removing an element heals
/// every reference that pointed at it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("element id {0} is already used in this pathway")]
    DuplicateId(ElementId),
    #[error("no element with id {0} in this pathway")]
    UnknownElement(ElementId),
    #[error("{object_type:?} element {id} cannot {capability}")]
    Capability {
        id: ElementId,
        object_type: ObjectType,
        capability: &'static str,
    },
    #[error("putting {member} into group {group} would make a group contain itself")]
    CyclicGroup { member: ElementId, group: ElementId },
    #[error("line {line} cannot attach to its own anchor {anchor}")]
    SelfAnchor { line: ElementId, anchor: ElementId },
    #[error("{child:?} needs a parent element that exists in this pathway")]
    MissingParent { child: ObjectType },
    #[error("a pathway holds at most one pathway info element")]
    DuplicatePathwayInfo,
    #[error("a line needs at least two points")]
    TooFewPoints,
    #[error("nothing selected that this operation applies to")]
    EmptySelection,
}

impl ModelError {
    pub(crate) fn capability(id: &ElementId, object_type: ObjectType, capability: &'static str) -> Self {
        ModelError::Capability {
            id: id.clone(),
            object_type,
            capability,
        }
    }
}

/// Errors returned by the undo/redo engine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HistoryError {
    #[error("nothing to undo")]
    NothingToUndo,
    #[error("nothing to redo")]
    NothingToRedo,
    /// The pathway was changed outside any recorded action after `label`
    /// was recorded; reverting would discard or corrupt those changes.
    #[error("cannot revert \"{label}\": the pathway changed outside the undo history")]
    StateDiverged { label: String },
}

/// Errors returned by an identifier resolver.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LookupError {
    #[error("no record found for {0}")]
    NotFound(String),
    #[error("lookup of {identifier} failed: {message}")]
    Network { identifier: String, message: String },
    #[error("malformed record for {identifier}: {message}")]
    Malformed { identifier: String, message: String },
    /// The lookup worker stopped before answering.
    #[error("lookup service is shut down")]
    Disconnected,
}

pub type Result<T, E = ModelError> = std::result::Result<T, E>;

//! Change notifications emitted by the pathway.
//!
//! Every mutator pushes [`ModelEvent`]s onto the pathway's [`EventQueue`]. A
//! view drains the queue once per turn of the UI loop and mirrors the changes,
//! so dependents always see a mutation before the next frame is drawn.

use std::collections::VecDeque;

use crate::model::{ElementId, ObjectType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelEvent {
    ElementAdded(ElementId),
    ElementRemoved {
        id: ElementId,
        object_type: ObjectType,
    },
    /// A non-geometric property changed (label, z-order, references, ...).
    ElementChanged(ElementId),
    /// Position, size or routed path changed, directly or as a consequence
    /// of a dependency moving.
    GeometryChanged(ElementId),
    /// The member set of a group changed.
    MembershipChanged { group: ElementId },
    /// Too many events piled up; listeners must rebuild from the pathway.
    Resync,
}

impl ModelEvent {
    /// Element the event is about, if any.
    pub fn element(&self) -> Option<&ElementId> {
        match self {
            ModelEvent::ElementAdded(id)
            | ModelEvent::ElementChanged(id)
            | ModelEvent::GeometryChanged(id) => Some(id),
            ModelEvent::ElementRemoved { id, .. } => Some(id),
            ModelEvent::MembershipChanged { group } => Some(group),
            ModelEvent::Resync => None,
        }
    }
}

/// Bounded FIFO of pending events.
///
/// When `capacity` is reached the queue collapses into a single
/// [`ModelEvent::Resync`] and drops further events until drained.
#[derive(Debug, Clone)]
pub struct EventQueue {
    events: VecDeque<ModelEvent>,
    capacity: usize,
    overflowed: bool,
}

impl EventQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::new(),
            capacity: capacity.max(1),
            overflowed: false,
        }
    }

    pub fn push(&mut self, event: ModelEvent) {
        if self.overflowed {
            return;
        }
        // consecutive duplicates carry no extra information
        if self.events.back() == Some(&event) {
            return;
        }
        if self.events.len() >= self.capacity {
            tracing::debug!(capacity = self.capacity, "event queue overflow, collapsing to resync");
            self.events.clear();
            self.events.push_back(ModelEvent::Resync);
            self.overflowed = true;
            return;
        }
        self.events.push_back(event);
    }

    pub fn drain(&mut self) -> Vec<ModelEvent> {
        self.overflowed = false;
        self.events.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consecutive_duplicates_coalesce() {
        let mut q = EventQueue::new(16);
        q.push(ModelEvent::GeometryChanged("a".into()));
        q.push(ModelEvent::GeometryChanged("a".into()));
        q.push(ModelEvent::GeometryChanged("b".into()));
        q.push(ModelEvent::GeometryChanged("a".into()));
        assert_eq!(q.len(), 3);
    }

    #[test]
    fn test_overflow_collapses_to_resync() {
        let mut q = EventQueue::new(2);
        q.push(ModelEvent::ElementAdded("a".into()));
        q.push(ModelEvent::ElementAdded("b".into()));
        q.push(ModelEvent::ElementAdded("c".into()));
        q.push(ModelEvent::ElementAdded("d".into()));
        assert_eq!(q.drain(), vec![ModelEvent::Resync]);

        q.push(ModelEvent::ElementAdded("e".into()));
        assert_eq!(q.drain(), vec![ModelEvent::ElementAdded("e".into())]);
    }
}

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::config::EditorConfig;
use crate::model::{ElementId, PathwayElement};

use super::{ModelEvent, PathwayModel};

// ────────────────────────────────────────────────────────────────────────────
// PathwaySnapshot – the data part of a pathway, derived values included
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathwaySnapshot {
    pub elements: Vec<PathwayElement>,
    pub next_id: u64,
}

impl PathwaySnapshot {
    /// Canonical JSON form, used to compare pathway states.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl PathwayModel {
    pub fn snapshot(&self) -> PathwaySnapshot {
        PathwaySnapshot {
            elements: self.elements.values().cloned().collect(),
            next_id: self.next_id,
        }
    }

    /// Build a pathway from a snapshot without emitting events.
    pub fn from_snapshot(snapshot: PathwaySnapshot, config: EditorConfig) -> Self {
        let mut model = PathwayModel::with_config(config);
        model.elements = snapshot
            .elements
            .into_iter()
            .filter_map(|e| e.id().cloned().map(|id| (id, e)))
            .collect();
        model.next_id = snapshot.next_id;
        model.rebuild_indices();
        model
    }

    /// Replace the pathway's content with `snapshot`.
    ///
    /// Listeners are told about the difference as if it had been edited in:
    /// removals first, then additions and changes.
    pub fn restore(&mut self, snapshot: &PathwaySnapshot) {
        let incoming: IndexMap<ElementId, PathwayElement> = snapshot
            .elements
            .iter()
            .filter_map(|e| e.id().cloned().map(|id| (id, e.clone())))
            .collect();

        for (id, old) in &self.elements {
            if !incoming.contains_key(id) {
                self.events.push(ModelEvent::ElementRemoved {
                    id: id.clone(),
                    object_type: old.object_type(),
                });
            }
        }
        for (id, new) in &incoming {
            match self.elements.get(id) {
                None => self.events.push(ModelEvent::ElementAdded(id.clone())),
                Some(old) if old != new => {
                    if old.kind != new.kind {
                        self.events.push(ModelEvent::GeometryChanged(id.clone()));
                    }
                    let members_changed = match (old.as_group(), new.as_group()) {
                        (Some(a), Some(b)) => a.members != b.members,
                        _ => false,
                    };
                    if members_changed {
                        self.events
                            .push(ModelEvent::MembershipChanged { group: id.clone() });
                    }
                    self.events.push(ModelEvent::ElementChanged(id.clone()));
                }
                Some(_) => {}
            }
        }

        self.elements = incoming;
        self.next_id = snapshot.next_id;
        self.rebuild_indices();
        self.revision += 1;
    }
}

// ────────────────────────────────────────────────────────────────────────────
// PathwayDoc – binary serialization wrapper
// ────────────────────────────────────────────────────────────────────────────

const MAGIC: &[u8; 9] = b"PATHWEAVE";
const VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathwayDoc {
    pub pathway: PathwaySnapshot,
}

impl PathwayDoc {
    pub fn from_model(model: &PathwayModel) -> Self {
        Self {
            pathway: model.snapshot(),
        }
    }

    /// Save the PathwayDoc to a binary file with magic bytes and versioning.
    pub fn save_to_binary<P: AsRef<std::path::Path>>(&self, path: P) -> anyhow::Result<()> {
        let file = std::fs::File::create(path)?;
        let mut writer = std::io::BufWriter::new(file);
        std::io::Write::write_all(&mut writer, MAGIC)?;
        std::io::Write::write_all(&mut writer, &VERSION.to_le_bytes())?;
        bincode::serde::encode_into_std_write(self, &mut writer, bincode::config::standard())?;
        Ok(())
    }

    /// Load a PathwayDoc from a binary file, checking magic bytes and version.
    pub fn load_from_binary<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Self> {
        let file = std::fs::File::open(path)?;
        let mut reader = std::io::BufReader::new(file);
        let mut magic = [0u8; 9];
        std::io::Read::read_exact(&mut reader, &mut magic)?;
        if &magic != MAGIC {
            anyhow::bail!("Invalid magic bytes: expected 'PATHWEAVE'");
        }
        let mut version_bytes = [0u8; 4];
        std::io::Read::read_exact(&mut reader, &mut version_bytes)?;
        let version = u32::from_le_bytes(version_bytes);
        if version != VERSION {
            anyhow::bail!("Unsupported version: {}", version);
        }
        let doc: PathwayDoc =
            bincode::serde::decode_from_std_read(&mut reader, bincode::config::standard())?;
        Ok(doc)
    }

    /// Rebuild a live pathway, rejecting documents that break its invariants.
    pub fn into_model(self, config: EditorConfig) -> anyhow::Result<PathwayModel> {
        let model = PathwayModel::from_snapshot(self.pathway, config);
        let problems = model.validate();
        if let Some(first) = problems.first() {
            anyhow::bail!(
                "Inconsistent pathway document ({} problems), first: {}",
                problems.len(),
                first
            );
        }
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DataNodeType, Rect};

    #[test]
    fn test_restore_emits_diff_events() {
        let mut p = PathwayModel::new();
        let a = p
            .add(PathwayElement::data_node("A", DataNodeType::Protein, Rect::new(0.0, 0.0, 80.0, 20.0)))
            .unwrap();
        let before = p.snapshot();
        let b = p.add(PathwayElement::label("B", Rect::new(0.0, 50.0, 80.0, 20.0))).unwrap();
        p.move_by(&a, 10.0, 0.0).unwrap();
        p.drain_events();

        p.restore(&before);
        let events = p.drain_events();
        assert_eq!(
            events[0],
            ModelEvent::ElementRemoved {
                id: b,
                object_type: crate::model::ObjectType::Label
            }
        );
        assert!(events.contains(&ModelEvent::GeometryChanged(a.clone())));
        assert_eq!(p.snapshot(), before);
        assert!(p.validate().is_empty());
    }
}

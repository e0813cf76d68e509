//! Bibliographic identifier resolution off the editing thread.
//!
//! A [`LookupService`] owns one worker thread and an [`IdentifierResolver`].
//! Requests name the citation element that wants the result; answers come
//! back over a channel and are applied on the editing thread by
//! [`LookupService::deliver`]. A citation removed while its lookup was in
//! flight simply drops the answer.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut lookups = LookupService::spawn(StaticResolver::new().with("PMID:1", record));
//! lookups.request("c1".into(), "PMID:1");
//! // later, from the event loop
//! let applied = lookups.deliver(&mut editor);
//! ```

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::JoinHandle;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::editor::EditorState;
use crate::error::LookupError;
use crate::model::{Citation, ElementId};

/// What a resolver knows about a publication.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BibRecord {
    pub title: String,
    pub source: Option<String>,
    pub year: Option<i32>,
    #[serde(default)]
    pub authors: Vec<String>,
}

impl BibRecord {
    /// Copy the record into a citation, keeping its xref and url.
    pub fn merge_into(&self, citation: &mut Citation) {
        citation.title = Some(self.title.clone());
        if self.source.is_some() {
            citation.source = self.source.clone();
        }
        if self.year.is_some() {
            citation.year = self.year;
        }
        if !self.authors.is_empty() {
            citation.authors = self.authors.clone();
        }
    }
}

/// Resolves a plain identifier (PubMed id, DOI, ...) to a record.
///
/// Implementations run on the lookup worker and must not touch any pathway.
pub trait IdentifierResolver: Send + 'static {
    fn resolve(&self, identifier: &str) -> Result<BibRecord, LookupError>;
}

impl<F> IdentifierResolver for F
where
    F: Fn(&str) -> Result<BibRecord, LookupError> + Send + 'static,
{
    fn resolve(&self, identifier: &str) -> Result<BibRecord, LookupError> {
        self(identifier)
    }
}

/// Resolver backed by a fixed table; used offline and in tests.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    records: HashMap<String, BibRecord>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, identifier: &str, record: BibRecord) -> Self {
        self.records.insert(identifier.to_string(), record);
        self
    }

    /// Load a table from JSON of the form `{"PMID:1": {"title": ..}}`.
    pub fn from_json_str(text: &str) -> anyhow::Result<Self> {
        let records = serde_json::from_str(text)?;
        Ok(Self { records })
    }
}

impl IdentifierResolver for StaticResolver {
    fn resolve(&self, identifier: &str) -> Result<BibRecord, LookupError> {
        let record = self
            .records
            .get(identifier)
            .ok_or_else(|| LookupError::NotFound(identifier.to_string()))?;
        if record.title.trim().is_empty() {
            return Err(LookupError::Malformed {
                identifier: identifier.to_string(),
                message: "record has no title".to_string(),
            });
        }
        Ok(record.clone())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Service
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct LookupRequest {
    ticket: u64,
    target: ElementId,
    identifier: String,
}

/// Answer to one request, as handed back to the editing thread.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupOutcome {
    pub ticket: u64,
    pub target: ElementId,
    pub identifier: String,
    pub result: Result<BibRecord, LookupError>,
}

/// What [`LookupService::deliver`] did with one outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Applied(ElementId),
    /// The target citation no longer exists.
    Discarded(ElementId),
    Failed(ElementId, LookupError),
}

pub struct LookupService {
    requests: Option<Sender<LookupRequest>>,
    outcomes: Receiver<LookupOutcome>,
    worker: Option<JoinHandle<()>>,
    next_ticket: u64,
    in_flight: usize,
}

impl LookupService {
    /// Start the worker thread.
    pub fn spawn<R: IdentifierResolver>(resolver: R) -> Self {
        let (request_tx, request_rx) = mpsc::channel::<LookupRequest>();
        let (outcome_tx, outcome_rx) = mpsc::channel();
        let worker = std::thread::spawn(move || {
            for request in request_rx {
                let result = resolver.resolve(&request.identifier);
                let outcome = LookupOutcome {
                    ticket: request.ticket,
                    target: request.target,
                    identifier: request.identifier,
                    result,
                };
                if outcome_tx.send(outcome).is_err() {
                    break;
                }
            }
        });
        Self {
            requests: Some(request_tx),
            outcomes: outcome_rx,
            worker: Some(worker),
            next_ticket: 0,
            in_flight: 0,
        }
    }

    /// Queue a lookup whose result is meant for citation `target`.
    pub fn request(&mut self, target: ElementId, identifier: &str) -> Result<u64, LookupError> {
        let ticket = self.next_ticket;
        let sender = self.requests.as_ref().ok_or(LookupError::Disconnected)?;
        sender
            .send(LookupRequest {
                ticket,
                target,
                identifier: identifier.to_string(),
            })
            .map_err(|_| LookupError::Disconnected)?;
        self.next_ticket += 1;
        self.in_flight += 1;
        Ok(ticket)
    }

    /// Number of requests not yet collected.
    pub fn pending(&self) -> usize {
        self.in_flight
    }

    /// Collect finished lookups without blocking.
    pub fn poll(&mut self) -> Vec<LookupOutcome> {
        let mut ready = Vec::new();
        loop {
            match self.outcomes.try_recv() {
                Ok(outcome) => ready.push(outcome),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if self.in_flight > ready.len() {
                        warn!(lost = self.in_flight - ready.len(), "lookup worker stopped");
                    }
                    self.in_flight = ready.len();
                    break;
                }
            }
        }
        self.in_flight -= ready.len();
        ready
    }

    /// Block until the next outcome arrives.
    pub fn wait(&mut self) -> Result<LookupOutcome, LookupError> {
        if self.in_flight == 0 {
            return Err(LookupError::Disconnected);
        }
        let outcome = self.outcomes.recv().map_err(|_| LookupError::Disconnected)?;
        self.in_flight -= 1;
        Ok(outcome)
    }

    /// Apply every finished lookup to the editor, each as its own undoable
    /// action.
    pub fn deliver(&mut self, editor: &mut EditorState) -> Vec<Delivery> {
        self.poll()
            .into_iter()
            .map(|outcome| apply_outcome(editor, outcome))
            .collect()
    }

    /// Stop accepting requests and wait for the worker to finish.
    pub fn shutdown(&mut self) {
        self.requests = None;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("lookup worker panicked");
            }
        }
    }
}

impl Drop for LookupService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Apply one outcome on the editing thread.
pub fn apply_outcome(editor: &mut EditorState, outcome: LookupOutcome) -> Delivery {
    let LookupOutcome {
        target,
        identifier,
        result,
        ..
    } = outcome;
    let Some(existing) = editor.model.get_element(&target).and_then(|e| e.as_citation()) else {
        debug!(citation = %target, identifier = %identifier, "lookup target is gone, dropping result");
        return Delivery::Discarded(target);
    };
    let record = match result {
        Ok(record) => record,
        Err(e) => {
            warn!(citation = %target, error = %e, "lookup failed");
            return Delivery::Failed(target, e);
        }
    };
    let mut citation = existing.clone();
    record.merge_into(&mut citation);
    match editor.transact("Update citation", |model| model.update_citation(&target, citation)) {
        Ok(()) => Delivery::Applied(target),
        Err(e) => {
            warn!(citation = %target, error = %e, "could not apply lookup result");
            Delivery::Discarded(target)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EditorConfig;
    use crate::model::PathwayElement;
    use crate::pathway::PathwayModel;

    fn record() -> BibRecord {
        BibRecord {
            title: "Hexokinase kinetics".to_string(),
            source: Some("J Biol Chem".to_string()),
            year: Some(1999),
            authors: vec!["Smith J".to_string()],
        }
    }

    fn editor_with_citation() -> EditorState {
        let mut model = PathwayModel::new();
        model
            .add(PathwayElement::citation(Citation::default()).with_id("c1"))
            .unwrap();
        EditorState::new(model, EditorConfig::default())
    }

    #[test]
    fn test_lookup_is_applied_and_undoable() {
        let mut editor = editor_with_citation();
        let mut lookups = LookupService::spawn(StaticResolver::new().with("PMID:1", record()));
        lookups.request("c1".into(), "PMID:1").unwrap();
        let outcome = lookups.wait().unwrap();
        assert_eq!(apply_outcome(&mut editor, outcome), Delivery::Applied("c1".into()));

        let c = editor.model.get_element(&"c1".into()).unwrap().as_citation().unwrap();
        assert_eq!(c.title.as_deref(), Some("Hexokinase kinetics"));
        assert_eq!(c.year, Some(1999));
        assert!(editor.dirty);

        editor.undo().unwrap();
        let c = editor.model.get_element(&"c1".into()).unwrap().as_citation().unwrap();
        assert!(c.title.is_none());
    }

    #[test]
    fn test_result_for_removed_target_is_dropped() {
        let mut editor = editor_with_citation();
        let mut lookups = LookupService::spawn(StaticResolver::new().with("PMID:1", record()));
        lookups.request("c1".into(), "PMID:1").unwrap();
        editor.model.remove(&"c1".into()).unwrap();
        let outcome = lookups.wait().unwrap();
        assert_eq!(apply_outcome(&mut editor, outcome), Delivery::Discarded("c1".into()));
        assert!(!editor.history.can_undo());
    }

    #[test]
    fn test_failures_are_reported() {
        let mut editor = editor_with_citation();
        let resolver = |id: &str| -> Result<BibRecord, LookupError> {
            Err(LookupError::Network {
                identifier: id.to_string(),
                message: "timed out".to_string(),
            })
        };
        let mut lookups = LookupService::spawn(resolver);
        lookups.request("c1".into(), "doi:10/x").unwrap();
        let outcome = lookups.wait().unwrap();
        assert!(matches!(
            apply_outcome(&mut editor, outcome),
            Delivery::Failed(_, LookupError::Network { .. })
        ));
        assert_eq!(lookups.pending(), 0);
        assert!(matches!(lookups.wait(), Err(LookupError::Disconnected)));
    }

    #[test]
    fn test_static_resolver_from_json() {
        let resolver = StaticResolver::from_json_str(r#"{"PMID:2": {"title": ""}}"#).unwrap();
        assert!(matches!(resolver.resolve("PMID:2"), Err(LookupError::Malformed { .. })));
        assert_eq!(resolver.resolve("PMID:3"), Err(LookupError::NotFound("PMID:3".to_string())));
    }

    #[test]
    fn test_shutdown_refuses_new_requests() {
        let mut lookups = LookupService::spawn(StaticResolver::new());
        lookups.shutdown();
        assert_eq!(lookups.request("c1".into(), "x"), Err(LookupError::Disconnected));
    }
}

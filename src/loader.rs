//! Background document loading.
//!
//! Parsing runs on a worker thread and produces a bare [`PathwayModel`].
//! The view is only built once the model has been handed back to the thread
//! that polls [`PendingLoad`], so no view element ever observes a model that
//! is still being filled.

use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread::JoinHandle;

use anyhow::{Result, anyhow};
use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info};

use crate::config::EditorConfig;
use crate::editor::EditorState;
use crate::parser::{ContentSource, read_from_source};
use crate::pathway::PathwayModel;

/// A load in progress.
pub struct PendingLoad {
    path: Utf8PathBuf,
    config: EditorConfig,
    result: Receiver<Result<PathwayModel>>,
    worker: Option<JoinHandle<()>>,
}

/// Start reading `path` from the filesystem on a worker thread.
pub fn load_in_background(path: impl Into<Utf8PathBuf>, config: EditorConfig) -> PendingLoad {
    load_from_source_in_background(crate::parser::FsSource, path, config)
}

/// Start reading `path` through `source` on a worker thread.
pub fn load_from_source_in_background<S>(
    mut source: S,
    path: impl Into<Utf8PathBuf>,
    config: EditorConfig,
) -> PendingLoad
where
    S: ContentSource + Send + 'static,
{
    let path = path.into();
    let (tx, rx) = mpsc::channel();
    let worker_path = path.clone();
    let worker_config = config.clone();
    let worker = std::thread::spawn(move || {
        debug!(path = %worker_path, "parsing in background");
        let result = read_from_source(&mut source, &worker_path, &worker_config);
        // The receiver may already be gone if the load was abandoned.
        let _ = tx.send(result);
    });
    PendingLoad {
        path,
        config,
        result: rx,
        worker: Some(worker),
    }
}

impl PendingLoad {
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Non-blocking check. Returns the editor once parsing has finished.
    pub fn try_finish(&mut self) -> Option<Result<EditorState>> {
        let model = match self.result.try_recv() {
            Ok(model) => model,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(anyhow!("loader for {} stopped without a result", self.path)),
        };
        self.join();
        Some(model.map(|m| self.attach(m)))
    }

    /// Block until parsing has finished.
    pub fn wait(mut self) -> Result<EditorState> {
        let model = self
            .result
            .recv()
            .map_err(|_| anyhow!("loader for {} stopped without a result", self.path))
            .and_then(|r| r);
        self.join();
        model.map(|m| self.attach(m))
    }

    /// Build the view on the calling thread.
    fn attach(&self, model: PathwayModel) -> EditorState {
        info!(path = %self.path, elements = model.len(), "pathway loaded");
        EditorState::new(model, self.config.clone())
    }

    fn join(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::MemorySource;

    const DOC: &str = r#"<Pathway Name="Loaded">
  <DataNode GraphId="a" TextLabel="A"><Graphics CenterX="40" CenterY="10" Width="80" Height="20"/></DataNode>
  <Label GraphId="b" TextLabel="note"/>
</Pathway>"#;

    #[test]
    fn test_background_load_hands_off_model() {
        let mut source = MemorySource::new();
        source.insert("a.xml", DOC);
        let mut pending = load_from_source_in_background(source, "a.xml", EditorConfig::default());
        let editor = loop {
            if let Some(result) = pending.try_finish() {
                break result.unwrap();
            }
            std::thread::yield_now();
        };
        assert_eq!(editor.model.len(), 3);
        assert_eq!(editor.view.len(), 2);
        assert!(!editor.dirty);
    }

    #[test]
    fn test_background_load_reports_errors() {
        let pending = load_from_source_in_background(MemorySource::new(), "missing.xml", EditorConfig::default());
        assert_eq!(pending.path(), "missing.xml");
        let err = pending.wait().err().unwrap();
        assert!(format!("{:#}", err).contains("missing.xml"));
    }
}

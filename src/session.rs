//! Run-scoped state shared by every node of one run.

use indexmap::IndexMap;
use std::path::PathBuf;

use crate::documents::{DocumentStore, NullDocumentStore};
use crate::images::{ImageRegistry, ImageStore};

/// Ambient values visible to condition expressions.
pub type Variables = IndexMap<String, serde_json::Value>;

/// Caller-constructed context for one run of an action tree.
#[derive(Debug)]
pub struct Session {
    pub variables: Variables,
    pub documents: Box<dyn DocumentStore>,
    pub images: Box<dyn ImageStore>,
    /// Most recent working path a `Batch` validated. Nodes without a working
    /// path of their own fall back to it.
    pub last_working_path: Option<PathBuf>,
    failures: usize,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            variables: Variables::new(),
            documents: Box::new(NullDocumentStore::new()),
            images: Box::new(ImageRegistry::new()),
            last_working_path: None,
            failures: 0,
        }
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failures(&self) -> usize {
        self.failures
    }

    pub fn record_failure(&mut self) {
        self.failures += 1;
    }
}

/// Outcome of [`Engine::run`](crate::engine::Engine::run).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Nodes whose action returned an error.
    pub failures: usize,
    /// Whether a stop request reached the root.
    pub stopped: bool,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures == 0
    }
}

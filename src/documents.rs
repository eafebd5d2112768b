//! Working-document collaborator.
//!
//! The engine never looks inside a document. It asks a [`DocumentStore`] to
//! open the resolved input file, hands the returned [`DocumentHandle`] to
//! descendants through the scope chain, and asks the store to save it.

use log::debug;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Opaque reference to a document opened by a [`DocumentStore`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentHandle {
    pub id: i32,
    pub source: PathBuf,
}

/// A handle as seen from a particular node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingDocument {
    pub handle: DocumentHandle,
    /// True when the node asking holds the handle itself rather than
    /// inheriting it from an ancestor.
    pub is_local: bool,
}

/// Opens and saves documents on behalf of the built-in document actions.
pub trait DocumentStore: std::fmt::Debug {
    fn open(&mut self, path: &Path) -> Result<DocumentHandle>;

    fn save(&mut self, handle: &DocumentHandle, path: &Path) -> Result<()>;
}

/// Store that hands out handles and never touches the file system.
#[derive(Debug, Default)]
pub struct NullDocumentStore {
    next_id: i32,
}

impl NullDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for NullDocumentStore {
    fn open(&mut self, path: &Path) -> Result<DocumentHandle> {
        let handle = DocumentHandle { id: self.next_id, source: path.to_path_buf() };
        self.next_id += 1;
        debug!("Opened document {} from '{}'", handle.id, path.display());
        Ok(handle)
    }

    fn save(&mut self, handle: &DocumentHandle, path: &Path) -> Result<()> {
        debug!("Ignoring save of document {} to '{}'", handle.id, path.display());
        Ok(())
    }
}

//! Error handling for the batchwork engine.
//! Defines the crate-wide error type and result alias.

use std::io;
use thiserror::Error;

use crate::loader::ParseError;

/// Errors produced while loading, resolving and running an action tree.
///
/// None of these abort a run on their own: the engine logs them at the node
/// that produced them and carries on with the next sibling.
#[derive(Error, Debug)]
pub enum Error {
    /// Represents errors that occur during file system operations
    #[error("IO error: {0}.")]
    IoError(#[from] io::Error),

    /// A configuration document could not be parsed
    #[error("{0}")]
    ParseError(#[from] ParseError),

    /// Represents errors in a node's configuration values
    #[error("Configuration error: {0}.")]
    ConfigError(String),

    /// One or more required elements of a node were not satisfiable
    #[error("Missing elements for '{action}': {elements}.")]
    MissingElements { action: String, elements: String },

    /// A condition or assignment expression failed to compile or evaluate
    #[error("Expression error: {0}.")]
    MinijinjaError(#[from] minijinja::Error),

    /// A wildcard segment is not a valid glob
    #[error("Pattern error: {0}.")]
    GlobError(#[from] globset::Error),

    /// Represents errors raised by the image store
    #[error("Image error: {0}.")]
    ImageError(String),

    /// Represents errors raised by the document store
    #[error("Document error: {0}.")]
    DocumentError(String),

    #[error("JSON error: {0}.")]
    JsonError(#[from] serde_json::Error),

    /// Failure reported by a caller-supplied action
    #[error("{0}")]
    Custom(#[from] anyhow::Error),
}

/// Convenience type alias for Results with batchwork's Error as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Default error handler that prints the error and exits the program.
///
/// # Arguments
/// * `err` - The Error to handle
///
/// # Behavior
/// Prints the error message to stderr and exits with status code 1
pub fn default_error_handler(err: Error) {
    eprintln!("{}", err);
    std::process::exit(1);
}

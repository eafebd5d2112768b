//! batchwork is an engine for batch file-processing tools.
//! A tree of action nodes, loaded from JSON/YAML or built in code, is walked
//! node by node: inherited settings are resolved along the scope chain, files
//! are matched, and each node runs a built-in or a caller-registered action.

/// Validation and defaulting of a node's required elements
pub mod checker;

/// Command-line interface module for the batchwork binary
pub mod cli;

/// Condition and assignment evaluation for `If` branches
pub mod condition;

/// Common constants used throughout batchwork
pub mod constants;

/// Working-document store interface
pub mod documents;

/// The interpreter that runs an action tree
pub mod engine;

/// Error types and handling for batchwork
pub mod error;

/// Name-to-accessor registry of the built-in node fields
pub mod fields;

/// Named image store interface and default registry
pub mod images;

/// Configuration loading (JSON, YAML) and batch merge
pub mod loader;

/// Log setup for the binary
pub mod logger;

/// Serialized form of action trees
pub mod model;

/// `{Name}` token substitution
mod normalize;

/// Path, wildcard and numeric-range resolution
pub mod paths;

/// Recognized action names and custom action handlers
pub mod registry;

/// Per-node file resolution
mod resolve;

/// Run-scoped state and run reports
pub mod session;

/// The live action tree and its scope chain
pub mod tree;

//! Configuration loading and batch merge.
//!
//! A configuration file holds one action object. When that object is a
//! `Batch` its settings are merged into the node that loaded it; anything
//! else is attached below that node as a new child. Reloading replaces what
//! the previous load put there.

use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::YAML_EXTENSIONS;
use crate::error::Result;
use crate::model::ActionItem;
use crate::tree::{ActionNode, ActionTree, NodeId};

/// A configuration document that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub path: PathBuf,
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub message: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to parse '{}'", self.path.display())?;
        if let (Some(line), Some(column)) = (self.line, self.column) {
            write!(f, " at line {}, column {}", line, column)?;
        }
        write!(f, ": {}", self.message)
    }
}

impl std::error::Error for ParseError {}

/// What loading a configuration did to the invoking node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Merged,
    Attached(NodeId),
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| YAML_EXTENSIONS.iter().any(|y| ext.eq_ignore_ascii_case(y)))
}

/// Parses configuration text; `path` picks the format and labels errors.
pub fn parse_config(content: &str, path: &Path) -> std::result::Result<ActionItem, ParseError> {
    if is_yaml(path) {
        serde_yaml::from_str(content).map_err(|e| {
            let location = e.location();
            ParseError {
                path: path.to_path_buf(),
                line: location.as_ref().map(|l| l.line()),
                column: location.as_ref().map(|l| l.column()),
                message: e.to_string(),
            }
        })
    } else {
        serde_json::from_str(content).map_err(|e| ParseError {
            path: path.to_path_buf(),
            line: Some(e.line()).filter(|l| *l > 0),
            column: Some(e.column()).filter(|_| e.line() > 0),
            message: e.to_string(),
        })
    }
}

/// Reads and parses a configuration file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ActionItem> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    Ok(parse_config(&content, path)?)
}

fn take_text(target: &mut String, value: &str) {
    if !value.is_empty() {
        *target = value.to_string();
    }
}

fn take<T: Clone>(target: &mut Option<T>, value: &Option<T>) {
    if value.is_some() {
        *target = value.clone();
    }
}

fn take_list<T>(target: &mut Vec<T>, value: Vec<T>) {
    if !value.is_empty() {
        *target = value;
    }
}

impl ActionTree {
    /// Loads the configuration at `path` into `id`.
    pub fn load_into<P: AsRef<Path>>(&mut self, id: NodeId, path: P) -> Result<LoadOutcome> {
        let item = load_config(path.as_ref())?;
        debug!("Loaded '{}' ({})", path.as_ref().display(), item.action);
        Ok(self.merge_or_attach(id, &item))
    }

    /// Merges a `Batch` item into `id`, or attaches any other item as a
    /// child of `id`.
    ///
    /// Loading the same document again leaves the tree as the first load
    /// did: a merge overwrites what it merged before, and an attached child
    /// is swapped for a fresh copy in place.
    ///
    /// # Arguments
    /// * `id` - The node that named the configuration file
    /// * `item` - The parsed document
    ///
    /// # Returns
    /// * `LoadOutcome` - Whether the item was merged or attached, and where
    pub fn merge_or_attach(&mut self, id: NodeId, item: &ActionItem) -> LoadOutcome {
        if item.action.trim().eq_ignore_ascii_case("Batch") {
            self.merge_item(id, item);
            return LoadOutcome::Merged;
        }
        let child = match self.node(id).loaded_child {
            Some(previous) => self.replace_child(id, previous, item),
            None => self.instantiate(id, item),
        };
        self.node_mut(id).loaded_child = Some(child);
        LoadOutcome::Attached(child)
    }

    /// Copies every setting `item` carries into `id`.
    ///
    /// The node keeps its own action and config filename, and its working
    /// path when that is already set. Options and properties are set by
    /// name. Conditions and name lists replace the node's own, as do the
    /// children when the item has any. Sequences are set by name.
    pub fn merge_item(&mut self, id: NodeId, item: &ActionItem) {
        let source = ActionNode::from_item(item);
        let node = self.node_mut(id);

        take_text(&mut node.message, &source.message);
        take(&mut node.base, &source.base);
        take(&mut node.count, &source.count);
        take_text(&mut node.data_filename, &source.data_filename);
        take(&mut node.date_time_value, &source.date_time_value);
        take(&mut node.digits, &source.digits);
        take_text(&mut node.input_filename, &source.input_filename);
        take_text(&mut node.input_folder_name, &source.input_folder_name);
        take_text(&mut node.output_filename, &source.output_filename);
        take_text(&mut node.output_folder_name, &source.output_folder_name);
        take_text(&mut node.output_name, &source.output_name);
        take_text(&mut node.pattern, &source.pattern);
        take(&mut node.range, &source.range);
        take_text(&mut node.source_folder_name, &source.source_folder_name);
        take_text(&mut node.text, &source.text);
        take(&mut node.working_document_index, &source.working_document_index);
        if node.working_path.trim().is_empty() {
            take_text(&mut node.working_path, &source.working_path);
        }

        take_list(&mut node.conditions, source.conditions);
        take_list(&mut node.data_names, source.data_names);
        take_list(&mut node.input_names, source.input_names);
        for option in source.options {
            match node.options.iter_mut().find(|o| o.name.eq_ignore_ascii_case(&option.name)) {
                Some(existing) => *existing = option,
                None => node.options.push(option),
            }
        }
        for property in source.properties {
            match node.properties.iter_mut().find(|p| p.name.eq_ignore_ascii_case(&property.name)) {
                Some(existing) => *existing = property,
                None => node.properties.push(property),
            }
        }
        node.sequences.extend(source.sequences);

        if !item.actions.is_empty() {
            self.replace_children(id, &item.actions);
        }
    }
}

//! Per-node file resolution.
//!
//! Turns a node's inherited folder and file settings into concrete
//! directories and file lists, stored on the node as [`ResolvedFiles`].

use log::{debug, error, warn};
use std::path::{Path, PathBuf};

use crate::constants::RANGE_TOKEN;
use crate::error::Result;
use crate::paths::{absolute_path, enumerate_files_and_directories, enumerate_range, resolve_wildcards};
use crate::tree::{ActionTree, NodeId, ResolvedFiles};

impl ActionTree {
    /// Normalizes `value` at `id`, falling back to the raw text on failure.
    pub fn normalized(&self, id: NodeId, value: &str) -> String {
        match self.normalize_value(id, value) {
            Ok(normalized) => normalized,
            Err(err) => {
                warn!("{} {}: {}", self.node(id).label(), id, err);
                value.to_string()
            }
        }
    }

    /// Resolves and stores the directories and files `id` works on.
    ///
    /// `fallback_working` is used when no working path is set anywhere on
    /// the scope chain.
    pub fn resolve_files(&mut self, id: NodeId, fallback_working: Option<&Path>) -> &ResolvedFiles {
        let resolved = self.compute_resolved(id, fallback_working);
        debug!(
            "{} {}: {} input file(s), {} data file(s)",
            self.node(id).label(),
            id,
            resolved.input_files.len(),
            resolved.data_files.len()
        );
        let node = self.node_mut(id);
        node.resolved = resolved;
        &node.resolved
    }

    fn compute_resolved(&self, id: NodeId, fallback_working: Option<&Path>) -> ResolvedFiles {
        let working_path = self.normalized(id, &self.working_path(id));
        let working_dir = if working_path.is_empty() {
            fallback_working.map(Path::to_path_buf)
        } else {
            Some(PathBuf::from(working_path))
        };
        let working = working_dir.clone().unwrap_or_default();

        let input_folder = self.normalized(id, &self.input_folder_name(id));
        let input_dir = if input_folder.is_empty() {
            working_dir.clone()
        } else {
            Some(absolute_path(&working, &input_folder))
        };

        let source_folder = self.normalized(id, &self.source_folder_name(id));
        let source_dir =
            Some(source_folder).filter(|s| !s.is_empty()).map(|s| absolute_path(&working, &s));
        let data_dir = source_dir.clone().or_else(|| working_dir.clone());

        let output_folder = self.normalized(id, &self.output_folder_name(id));
        let output_dir =
            Some(output_folder).filter(|s| !s.is_empty()).map(|s| absolute_path(&working, &s));
        let output_filename = self.normalized(id, &self.output_filename(id));
        let output_file = Some(output_filename)
            .filter(|s| !s.is_empty())
            .map(|s| absolute_path(output_dir.as_deref().unwrap_or(working.as_path()), &s));

        let input_files = self.resolve_inputs(id, input_dir.as_deref().unwrap_or(working.as_path()));
        let data_files = self.resolve_data(id, data_dir.as_deref().unwrap_or(working.as_path()));

        ResolvedFiles {
            working_dir,
            data_dir,
            input_dir,
            output_dir,
            output_file,
            source_dir,
            input_files,
            data_files,
        }
    }

    /// Input names after range expansion, not yet normalized.
    ///
    /// # Errors
    ///
    /// Fails when the inherited range is too large to expand.
    pub fn input_patterns(&self, id: NodeId) -> Result<Vec<String>> {
        let mut names = self.input_names(id);
        if names.is_empty() {
            let filename = self.input_filename(id);
            if !filename.is_empty() {
                names.push(filename);
            }
        }

        let range = self.range(id);
        if range.is_empty() {
            return Ok(names);
        }
        let digits = usize::try_from(self.digits(id)).unwrap_or(0);
        let entries = enumerate_range(&range, digits)?;
        if names.is_empty() {
            return Ok(entries);
        }
        let names: Vec<String> = names
            .into_iter()
            .flat_map(|name| {
                if name.contains(RANGE_TOKEN) {
                    entries.iter().map(|e| name.replace(RANGE_TOKEN, e)).collect()
                } else {
                    vec![name]
                }
            })
            .collect();
        Ok(names)
    }

    fn resolve_inputs(&self, id: NodeId, input_dir: &Path) -> Vec<PathBuf> {
        if !self.node(id).has_local_input() {
            if let Some(current) = self.current_file(id) {
                return vec![current];
            }
        }

        let patterns = match self.input_patterns(id) {
            Ok(patterns) => patterns,
            Err(err) => {
                error!("{} {}: {}", self.node(id).label(), id, err);
                return Vec::new();
            }
        };
        let mut files: Vec<PathBuf> = Vec::new();
        for pattern in patterns {
            let pattern = self.normalized(id, &pattern);
            if pattern.is_empty() {
                continue;
            }
            match enumerate_files_and_directories(input_dir, &pattern) {
                Ok(found) => {
                    for file in found {
                        if !files.contains(&file) {
                            files.push(file);
                        }
                    }
                }
                Err(err) => warn!("{} {}: cannot expand '{}': {}", self.node(id).label(), id, pattern, err),
            }
        }
        files
    }

    fn resolve_data(&self, id: NodeId, data_dir: &Path) -> Vec<PathBuf> {
        let mut names = self.data_names(id);
        if names.is_empty() {
            let filename = self.data_filename(id);
            if !filename.is_empty() {
                names.push(filename);
            }
        }

        let mut files: Vec<PathBuf> = Vec::new();
        for name in names {
            let name = self.normalized(id, &name);
            if name.is_empty() {
                continue;
            }
            match resolve_wildcards(data_dir, &name) {
                Ok(found) => {
                    for file in found {
                        if !files.contains(&file) {
                            files.push(file);
                        }
                    }
                }
                Err(err) => warn!("{} {}: cannot resolve '{}': {}", self.node(id).label(), id, name, err),
            }
        }
        files
    }
}

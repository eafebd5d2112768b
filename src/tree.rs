//! The live action tree and its scope chain.
//!
//! Nodes live in an arena owned by [`ActionTree`] and are addressed by
//! [`NodeId`]. Every node keeps a single back-reference to the node that owns
//! it; reads of inheritable fields walk that chain until they find a set
//! value and fall back to the field's zero value at the root.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

use crate::constants::OPTION_OFF_VALUES;
use crate::documents::{DocumentHandle, WorkingDocument};
use crate::model::{
    ActionItem, ConditionItem, OptionItem, PropertyItem, Range, SequenceDefinition,
};

/// Index of a node inside its [`ActionTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Directories and files a node resolved right before it ran.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedFiles {
    pub working_dir: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub input_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub output_file: Option<PathBuf>,
    pub source_dir: Option<PathBuf>,
    pub input_files: Vec<PathBuf>,
    pub data_files: Vec<PathBuf>,
}

/// One configured step of a pipeline.
///
/// String fields use the empty string as "unset"; every other inheritable
/// field uses `None`.
#[derive(Debug, Clone, Default)]
pub struct ActionNode {
    pub action: String,
    pub config_filename: String,
    pub message: String,

    pub base: Option<i32>,
    pub count: Option<i32>,
    pub current_file: Option<PathBuf>,
    pub data_filename: String,
    pub date_time_value: Option<DateTime<Utc>>,
    pub digits: Option<i32>,
    pub input_filename: String,
    pub input_folder_name: String,
    pub output_filename: String,
    pub output_folder_name: String,
    pub output_name: String,
    pub pattern: String,
    pub range: Option<Range>,
    pub source_folder_name: String,
    pub text: String,
    pub working_document: Option<DocumentHandle>,
    pub working_document_index: Option<i32>,
    pub working_path: String,

    pub conditions: Vec<ConditionItem>,
    pub options: Vec<OptionItem>,
    pub properties: Vec<PropertyItem>,
    pub data_names: Vec<String>,
    pub input_names: Vec<String>,
    pub sequences: IndexMap<String, SequenceDefinition>,

    pub resolved: ResolvedFiles,

    stop: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// Child attached by the last configuration load, replaced on reload.
    pub(crate) loaded_child: Option<NodeId>,
}

impl ActionNode {
    /// Creates a node with only its action name set.
    pub fn new<S: Into<String>>(action: S) -> Self {
        Self { action: action.into(), ..Default::default() }
    }

    /// Builds an unlinked node from a serialized item, ignoring its children.
    pub fn from_item(item: &ActionItem) -> Self {
        let mut properties = item.properties.clone();
        properties.extend(item.extra_properties());

        Self {
            action: item.action.clone(),
            config_filename: item.config_filename.clone(),
            message: item.message.clone(),
            base: item.base,
            count: item.count,
            data_filename: item.data_filename.clone(),
            date_time_value: item.date_time_value,
            digits: item.digits,
            input_filename: item.input_filename.clone(),
            input_folder_name: item.input_folder_name.clone(),
            output_filename: item.output_filename.clone(),
            output_folder_name: item.output_folder_name.clone(),
            output_name: item.output_name.clone(),
            pattern: item.pattern.clone(),
            range: item.range.clone().filter(|r| !r.is_empty()),
            source_folder_name: item.source_folder_name.clone(),
            text: item.text.clone(),
            working_document_index: item.working_document_index.filter(|i| *i >= 0),
            working_path: item.working_path.clone(),
            conditions: item.conditions.clone(),
            options: item.options.clone(),
            properties,
            data_names: item.data_names.clone(),
            input_names: item.input_names.clone(),
            sequences: item
                .sequences
                .iter()
                .map(|seq| (seq.name.clone(), seq.clone()))
                .collect(),
            ..Default::default()
        }
    }

    /// Serializes the node's own configuration, without children.
    pub fn to_item(&self) -> ActionItem {
        ActionItem {
            action: self.action.clone(),
            actions: Vec::new(),
            base: self.base,
            conditions: self.conditions.clone(),
            config_filename: self.config_filename.clone(),
            count: self.count,
            data_filename: self.data_filename.clone(),
            data_names: self.data_names.clone(),
            date_time_value: self.date_time_value,
            digits: self.digits,
            input_filename: self.input_filename.clone(),
            input_folder_name: self.input_folder_name.clone(),
            input_names: self.input_names.clone(),
            message: self.message.clone(),
            options: self.options.clone(),
            output_filename: self.output_filename.clone(),
            output_folder_name: self.output_folder_name.clone(),
            output_name: self.output_name.clone(),
            pattern: self.pattern.clone(),
            properties: self.properties.clone(),
            range: self.range.clone(),
            sequences: self.sequences.values().cloned().collect(),
            source_folder_name: self.source_folder_name.clone(),
            text: self.text.clone(),
            working_path: self.working_path.clone(),
            working_document_index: self.working_document_index,
            extra: IndexMap::new(),
        }
    }

    /// Local stop flag. Never consults ancestors.
    pub fn stop(&self) -> bool {
        self.stop
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Whether a local option with this name is switched on.
    pub fn has_option(&self, name: &str) -> bool {
        self.options.iter().any(|option| {
            option.name.eq_ignore_ascii_case(name)
                && !OPTION_OFF_VALUES
                    .iter()
                    .any(|off| option.value.trim().eq_ignore_ascii_case(off))
        })
    }

    pub fn local_property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| p.value.as_str())
    }

    /// Whether this node names its own inputs rather than inheriting them.
    pub fn has_local_input(&self) -> bool {
        !self.input_filename.is_empty() || !self.input_names.is_empty() || self.range.is_some()
    }

    /// Short label used in log lines.
    pub fn label(&self) -> &str {
        if self.action.is_empty() {
            "None"
        } else {
            &self.action
        }
    }
}

fn non_empty(value: &String) -> Option<&String> {
    Some(value).filter(|v| !v.is_empty())
}

/// Iterator over a node's ancestors, nearest first.
#[derive(Debug)]
pub struct Ancestors<'a> {
    tree: &'a ActionTree,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.node(current).parent;
        Some(current)
    }
}

/// Arena of linked action nodes with a single root.
///
/// Slots of removed subtrees go on a free list and are handed out again by
/// [`add_child`](Self::add_child), so replaying a sequence does not grow the
/// arena.
#[derive(Debug, Clone)]
pub struct ActionTree {
    nodes: Vec<ActionNode>,
    free: Vec<NodeId>,
    root: NodeId,
}

impl Default for ActionTree {
    fn default() -> Self {
        Self::new(ActionNode::default())
    }
}

impl ActionTree {
    /// Creates a tree holding only `root`. Any links `root` carries are
    /// dropped.
    pub fn new(root: ActionNode) -> Self {
        let mut root = root;
        root.parent = None;
        root.children.clear();
        Self { nodes: vec![root], free: Vec::new(), root: NodeId(0) }
    }

    /// Links a whole serialized tree.
    pub fn from_item(item: &ActionItem) -> Self {
        let mut tree = Self::new(ActionNode::from_item(item));
        let root = tree.root;
        for child in &item.actions {
            tree.instantiate(root, child);
        }
        tree
    }

    /// Id of the root node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of slots in the arena, free ones included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Number of nodes currently in use.
    pub fn live_len(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The node at `id`.
    ///
    /// # Panics
    /// * When `id` does not belong to this tree
    pub fn node(&self, id: NodeId) -> &ActionNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut ActionNode {
        &mut self.nodes[id.0]
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// Ancestors of `id`, nearest first. The node itself is not included.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors { tree: self, next: self.node(id).parent }
    }

    /// The node itself followed by its ancestors.
    pub(crate) fn scope(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::once(id).chain(self.ancestors(id))
    }

    /// Appends `node` as the last child of `parent`, reusing a free slot when
    /// there is one.
    ///
    /// # Arguments
    /// * `parent` - Node that receives the child
    /// * `node` - The new node; its links are reset
    ///
    /// # Returns
    /// * `NodeId` - Id of the new child
    pub fn add_child(&mut self, parent: NodeId, node: ActionNode) -> NodeId {
        let mut node = node;
        node.parent = Some(parent);
        node.children.clear();
        node.loaded_child = None;
        let id = match self.free.pop() {
            Some(id) => {
                self.nodes[id.0] = node;
                id
            }
            None => {
                self.nodes.push(node);
                NodeId(self.nodes.len() - 1)
            }
        };
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Deep-copies a serialized subtree under `parent`. The copy shares no
    /// state with `item`.
    pub fn instantiate(&mut self, parent: NodeId, item: &ActionItem) -> NodeId {
        let id = self.add_child(parent, ActionNode::from_item(item));
        for child in &item.actions {
            self.instantiate(id, child);
        }
        id
    }

    /// Frees the subtree under `id`. Its ids must not be used afterwards.
    fn release(&mut self, id: NodeId) {
        let mut pending = vec![id];
        while let Some(n) = pending.pop() {
            let node = std::mem::take(&mut self.nodes[n.0]);
            pending.extend(node.children);
            self.free.push(n);
        }
    }

    /// Removes and frees every child of `parent`.
    pub fn remove_children(&mut self, parent: NodeId) {
        let node = &mut self.nodes[parent.0];
        node.loaded_child = None;
        let children = std::mem::take(&mut node.children);
        for old in children {
            self.release(old);
        }
    }

    /// Replaces the children of `parent` with fresh copies of `items`.
    ///
    /// The previous children are freed and their slots reused; only the new
    /// subtrees are linked, the rest of the tree is left alone.
    ///
    /// # Returns
    /// * `Vec<NodeId>` - Ids of the new children, in order
    pub fn replace_children(&mut self, parent: NodeId, items: &[ActionItem]) -> Vec<NodeId> {
        self.remove_children(parent);
        items.iter().map(|item| self.instantiate(parent, item)).collect()
    }

    /// Swaps the child `old` of `parent` for a fresh copy of `item`, keeping
    /// its position. Appends the copy when `old` is no longer a child.
    pub fn replace_child(&mut self, parent: NodeId, old: NodeId, item: &ActionItem) -> NodeId {
        let position = self.children(parent).iter().position(|c| *c == old);
        let new = self.instantiate(parent, item);
        if let Some(position) = position {
            let children = &mut self.nodes[parent.0].children;
            children.pop();
            children[position] = new;
            self.release(old);
        }
        new
    }

    /// Re-derives every parent link from the child lists.
    pub fn rewire(&mut self) {
        for node in &mut self.nodes {
            node.parent = None;
        }
        for index in 0..self.nodes.len() {
            let children = self.nodes[index].children.clone();
            for child in children {
                self.nodes[child.0].parent = Some(NodeId(index));
            }
        }
    }

    /// Serializes the subtree rooted at `id`.
    pub fn to_item(&self, id: NodeId) -> ActionItem {
        let mut item = self.node(id).to_item();
        item.actions = self.children(id).iter().map(|c| self.to_item(*c)).collect();
        item
    }

    // --- Scope chain ---

    /// Nearest set value of a field, searching the node then its ancestors.
    ///
    /// # Arguments
    /// * `id` - Node the lookup starts at
    /// * `get` - Returns the field of one node, or `None` when it is unset
    ///
    /// # Returns
    /// * `Option<T>` - The nearest set value, `None` when no node sets it
    pub fn inherit<T, F>(&self, id: NodeId, get: F) -> Option<T>
    where
        T: Clone,
        F: Fn(&ActionNode) -> Option<&T>,
    {
        self.scope(id).find_map(|n| get(self.node(n)).cloned())
    }

    fn inherit_text<F>(&self, id: NodeId, get: F) -> String
    where
        F: Fn(&ActionNode) -> &String,
    {
        self.inherit(id, |n| non_empty(get(n))).unwrap_or_default()
    }

    pub fn base(&self, id: NodeId) -> i32 {
        self.inherit(id, |n| n.base.as_ref()).unwrap_or_default()
    }

    /// Inherited `Count`, 0 when unset.
    pub fn count(&self, id: NodeId) -> i32 {
        self.inherit(id, |n| n.count.as_ref()).unwrap_or_default()
    }

    pub fn digits(&self, id: NodeId) -> i32 {
        self.inherit(id, |n| n.digits.as_ref()).unwrap_or_default()
    }

    pub fn date_time_value(&self, id: NodeId) -> DateTime<Utc> {
        self.inherit(id, |n| n.date_time_value.as_ref()).unwrap_or_default()
    }

    /// Inherited `WorkingDocumentIndex`, -1 when no document is open.
    pub fn working_document_index(&self, id: NodeId) -> i32 {
        self.inherit(id, |n| n.working_document_index.as_ref()).unwrap_or(-1)
    }

    pub fn range(&self, id: NodeId) -> Range {
        self.inherit(id, |n| n.range.as_ref()).unwrap_or_default()
    }

    /// File the nearest enclosing `ForEachFile` is visiting.
    pub fn current_file(&self, id: NodeId) -> Option<PathBuf> {
        self.inherit(id, |n| n.current_file.as_ref())
    }

    pub fn data_filename(&self, id: NodeId) -> String {
        self.inherit_text(id, |n| &n.data_filename)
    }

    pub fn input_filename(&self, id: NodeId) -> String {
        self.inherit_text(id, |n| &n.input_filename)
    }

    pub fn input_folder_name(&self, id: NodeId) -> String {
        self.inherit_text(id, |n| &n.input_folder_name)
    }

    pub fn output_filename(&self, id: NodeId) -> String {
        self.inherit_text(id, |n| &n.output_filename)
    }

    pub fn output_folder_name(&self, id: NodeId) -> String {
        self.inherit_text(id, |n| &n.output_folder_name)
    }

    pub fn output_name(&self, id: NodeId) -> String {
        self.inherit_text(id, |n| &n.output_name)
    }

    pub fn pattern(&self, id: NodeId) -> String {
        self.inherit_text(id, |n| &n.pattern)
    }

    pub fn source_folder_name(&self, id: NodeId) -> String {
        self.inherit_text(id, |n| &n.source_folder_name)
    }

    pub fn text(&self, id: NodeId) -> String {
        self.inherit_text(id, |n| &n.text)
    }

    /// Inherited `WorkingPath`, not yet normalized.
    pub fn working_path(&self, id: NodeId) -> String {
        self.inherit_text(id, |n| &n.working_path)
    }

    /// The working document visible at `id`, flagged local when `id` holds it.
    pub fn working_document(&self, id: NodeId) -> Option<WorkingDocument> {
        self.scope(id).find_map(|n| {
            self.node(n).working_document.as_ref().map(|handle| WorkingDocument {
                handle: handle.clone(),
                is_local: n == id,
            })
        })
    }

    /// The node that owns a working document opened at `id`: the nearest
    /// node with a local input filename, else the root.
    pub fn document_owner(&self, id: NodeId) -> NodeId {
        self.scope(id)
            .find(|n| !self.node(*n).input_filename.is_empty())
            .unwrap_or(self.root)
    }

    /// Sequences visible at `id`; an empty local map defers to the ancestor.
    pub fn sequences(&self, id: NodeId) -> Option<&IndexMap<String, SequenceDefinition>> {
        self.scope(id)
            .map(|n| &self.node(n).sequences)
            .find(|seqs| !seqs.is_empty())
    }

    /// Visible sequence named `name`, matched case-insensitively.
    pub fn find_sequence(&self, id: NodeId, name: &str) -> Option<&SequenceDefinition> {
        self.sequences(id)?
            .values()
            .find(|seq| seq.name.eq_ignore_ascii_case(name))
    }

    pub fn data_names(&self, id: NodeId) -> Vec<String> {
        self.inherit(id, |n| Some(&n.data_names).filter(|v| !v.is_empty()))
            .unwrap_or_default()
    }

    pub fn input_names(&self, id: NodeId) -> Vec<String> {
        self.inherit(id, |n| Some(&n.input_names).filter(|v| !v.is_empty()))
            .unwrap_or_default()
    }

    /// Ancestor conditions, oldest first, followed by the node's own.
    pub fn effective_conditions(&self, id: NodeId) -> Vec<ConditionItem> {
        let mut chain: Vec<NodeId> = self.scope(id).collect();
        chain.reverse();
        chain
            .into_iter()
            .flat_map(|n| self.node(n).conditions.iter().cloned())
            .collect()
    }

    /// Ancestor properties, oldest first, followed by the node's own.
    pub fn effective_properties(&self, id: NodeId) -> Vec<PropertyItem> {
        let mut chain: Vec<NodeId> = self.scope(id).collect();
        chain.reverse();
        chain
            .into_iter()
            .flat_map(|n| self.node(n).properties.iter().cloned())
            .collect()
    }

    /// Raw value of a user property, searching the node then its ancestors.
    pub fn property(&self, id: NodeId, name: &str) -> Option<&str> {
        self.scope(id).find_map(|n| self.node(n).local_property(name))
    }

    // --- Stop cascade ---

    /// Sets the stop flag on `id` and on every ancestor up to the root.
    pub fn request_stop(&mut self, id: NodeId) {
        let chain: Vec<NodeId> = self.scope(id).collect();
        for n in chain {
            self.nodes[n.0].stop = true;
        }
    }

    /// Local stop flag of `id`.
    pub fn is_stopped(&self, id: NodeId) -> bool {
        self.node(id).stop
    }

    /// Clears the stop flag of every node.
    pub fn clear_stops(&mut self) {
        for node in &mut self.nodes {
            node.stop = false;
        }
    }

    /// Working directory resolved for `id`, if any.
    pub fn working_dir(&self, id: NodeId) -> Option<&Path> {
        self.node(id).resolved.working_dir.as_deref()
    }
}

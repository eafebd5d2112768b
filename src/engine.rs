//! The action-tree interpreter.
//!
//! [`Engine`] owns a tree, the run's [`Session`] and the registered custom
//! actions. Running a node resolves its files, then dispatches it to a
//! built-in or to the handler registered for its action name. Errors never
//! unwind past the node that raised them: they are logged, counted, and the
//! next sibling runs.

use log::{debug, error, info};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::checker::Elements;
use crate::condition::ConditionEvaluator;
use crate::constants::{
    image_props, CURRENT_FILENAME_VAR, CURRENT_FILE_NUMBER_VAR, OPTION_MUTE, OPTION_SOLO,
    SEQUENCE_NAME_PROPERTY,
};
use crate::documents::DocumentStore;
use crate::error::{Error, Result};
use crate::fields::Field;
use crate::images::{ImageStore, Point, Size};
use crate::paths::{absolute_path, file_number};
use crate::registry::{ActionRegistry, BuiltinAction, CustomAction};
use crate::session::{RunReport, Session};
use crate::tree::{ActionTree, NodeId};

/// Interpreter for one action tree.
///
/// The engine is single-threaded: a run is a depth-first walk and every
/// node finishes before its next sibling starts.
pub struct Engine {
    tree: ActionTree,
    session: Session,
    registry: ActionRegistry,
    conditions: ConditionEvaluator,
    output_hook: Option<Rc<dyn CustomAction>>,
}

impl Engine {
    /// Creates an engine over `tree` with a default session and only the
    /// built-in actions registered.
    ///
    /// # Arguments
    /// * `tree` - The tree to run; its root is the first node executed
    ///
    /// # Returns
    /// * `Engine` - Ready to [`run`](Self::run)
    pub fn new(tree: ActionTree) -> Self {
        Self {
            tree,
            session: Session::default(),
            registry: ActionRegistry::new(),
            conditions: ConditionEvaluator::new(),
            output_hook: None,
        }
    }

    /// Replaces the default session with one built by the caller.
    pub fn with_session(mut self, session: Session) -> Self {
        self.session = session;
        self
    }

    /// Uses `documents` to open and save working documents.
    pub fn with_documents<D: DocumentStore + 'static>(mut self, documents: D) -> Self {
        self.session.documents = Box::new(documents);
        self
    }

    /// Uses `images` for the image actions.
    pub fn with_images<I: ImageStore + 'static>(mut self, images: I) -> Self {
        self.session.images = Box::new(images);
        self
    }

    /// Registers a handler for a custom action name.
    ///
    /// # Arguments
    /// * `name` - Action name, matched case-insensitively
    /// * `action` - Handler called with the engine and the node being run
    pub fn register_action<S, A>(&mut self, name: S, action: A)
    where
        S: Into<String>,
        A: CustomAction + 'static,
    {
        self.registry.register(name, Rc::new(action));
    }

    /// Installs the hook a `Batch` calls after its children when it carries
    /// its own `OutputName`.
    pub fn on_local_output<F>(&mut self, hook: F)
    where
        F: Fn(&mut Engine, NodeId) -> Result<()> + 'static,
    {
        let hook: Rc<dyn CustomAction> = Rc::new(hook);
        self.output_hook = Some(hook);
    }

    /// Sets a session variable visible to every condition.
    pub fn set_variable<S: Into<String>>(&mut self, name: S, value: serde_json::Value) {
        self.session.variables.insert(name.into(), value);
    }

    pub fn tree(&self) -> &ActionTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut ActionTree {
        &mut self.tree
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Starts over with a fresh session. Registered actions and the output
    /// hook are kept.
    pub fn reset(&mut self) {
        self.session = Session::default();
        self.tree.clear_stops();
    }

    /// Asks the tree to stop at `id` and every ancestor.
    pub fn request_stop(&mut self, id: NodeId) {
        self.tree.request_stop(id);
    }

    /// Runs the whole tree from its root.
    ///
    /// Stop flags left by a previous run are cleared first.
    ///
    /// # Returns
    /// * `RunReport` - Failures counted during this run and whether a stop
    ///   reached the root
    pub fn run(&mut self) -> RunReport {
        self.tree.clear_stops();
        self.tree.rewire();
        let before = self.session.failures();
        let root = self.tree.root();
        self.run_node(root);
        let report = RunReport {
            failures: self.session.failures() - before,
            stopped: self.tree.is_stopped(root),
        };
        debug!("Run finished: {:?}", report);
        report
    }

    /// Runs one node, logging and counting any error it raises.
    pub fn run_node(&mut self, id: NodeId) {
        let message = self.tree.node(id).message.clone();
        if !message.is_empty() {
            info!("{}", self.tree.normalized(id, &message));
        }
        debug!("Running {} {}", self.tree.node(id).label(), id);
        if let Err(err) = self.dispatch(id) {
            error!("{} {} failed: {}", self.tree.node(id).label(), id, err);
            self.session.record_failure();
        }
    }

    /// Runs `ids` in order, skipping muted ones.
    ///
    /// # Arguments
    /// * `ids` - Nodes to run, usually the children of one node
    ///
    /// # Returns
    /// * `bool` - false when a node that ran left its stop flag set; the
    ///   nodes after it were not run
    pub fn run_actions(&mut self, ids: &[NodeId]) -> bool {
        for &id in ids {
            if self.tree.node(id).has_option(OPTION_MUTE) {
                info!("Skipping muted {} {}", self.tree.node(id).label(), id);
                continue;
            }
            self.run_node(id);
            if self.tree.is_stopped(id) {
                debug!("Stop requested at {}", id);
                return false;
            }
        }
        true
    }

    /// Resolves the node's files against the session's fallback working path.
    pub fn prepare(&mut self, id: NodeId) {
        let fallback = self.session.last_working_path.clone();
        self.tree.resolve_files(id, fallback.as_deref());
    }

    fn dispatch(&mut self, id: NodeId) -> Result<()> {
        let name = self.tree.node(id).action.clone();
        let builtin = match BuiltinAction::from_name(&name) {
            Some(builtin) => builtin,
            None => return self.run_custom(id, name.trim()),
        };
        match builtin {
            BuiltinAction::None => return Ok(()),
            BuiltinAction::Batch => return self.run_batch(id),
            _ => self.prepare(id),
        }
        match builtin {
            BuiltinAction::ForEachFile => self.run_for_each_file(id),
            BuiltinAction::If => self.run_if(id),
            BuiltinAction::RunSequence => self.run_sequence(id),
            BuiltinAction::OpenWorkingDocument => self.open_working_document(id),
            BuiltinAction::SaveWorkingDocument => self.save_working_document(id),
            BuiltinAction::DrawImage => self.draw_image(id),
            BuiltinAction::FileOpenImage => self.file_open_image(id),
            BuiltinAction::FileOverlayImage => self.file_overlay_image(id),
            BuiltinAction::FileSaveImage => self.file_save_image(id),
            BuiltinAction::ImageBackground => self.image_background(id),
            BuiltinAction::ImagesClear => {
                self.session.images.clear();
                info!("Cleared all images");
                Ok(())
            }
            BuiltinAction::SetWorkingImage => self.set_working_image(id),
            BuiltinAction::SizeImage => self.size_image(id),
            BuiltinAction::None | BuiltinAction::Batch => Ok(()),
        }
    }

    fn run_custom(&mut self, id: NodeId, name: &str) -> Result<()> {
        self.prepare(id);
        match self.registry.handler(name) {
            Some(handler) => handler.run(self, id),
            None => {
                debug!("Ignoring unrecognized action '{}' at {}", name, id);
                Ok(())
            }
        }
    }

    // --- Control flow ---

    fn run_batch(&mut self, id: NodeId) -> Result<()> {
        let config = self.tree.node(id).config_filename.clone();
        if !config.trim().is_empty() {
            let path = self.config_path(id, &config);
            match self.tree.load_into(id, &path) {
                Ok(outcome) => debug!("{}: {:?} '{}'", id, outcome, path.display()),
                Err(err) => {
                    error!("Batch {}: cannot load '{}': {}", id, path.display(), err);
                    self.session.record_failure();
                }
            }
        }

        self.prepare(id);
        if self.tree.check_elements(id, Elements::WORKING_PATH, false, true) {
            self.session.last_working_path = self.tree.working_dir(id).map(Path::to_path_buf);
        }
        self.tree.check_elements(id, Elements::SOURCE_FOLDER_NAME, false, true);
        self.tree.check_elements(id, Elements::OUTPUT_FOLDER_NAME, false, true);

        let children = self.tree.children(id).to_vec();
        let solo: Vec<NodeId> = children
            .iter()
            .copied()
            .filter(|child| self.tree.node(*child).has_option(OPTION_SOLO))
            .collect();
        if solo.is_empty() {
            self.run_actions(&children);
        } else {
            debug!("Batch {}: running {} solo child(ren)", id, solo.len());
            self.run_actions(&solo);
        }

        if !self.tree.node(id).output_name.is_empty() {
            if let Some(hook) = self.output_hook.clone() {
                hook.run(self, id)?;
            }
        }
        Ok(())
    }

    fn config_path(&self, id: NodeId, config: &str) -> PathBuf {
        let config = self.tree.normalized(id, config);
        let working = self.tree.normalized(id, &self.tree.working_path(id));
        if working.is_empty() {
            let fallback = self.session.last_working_path.clone().unwrap_or_default();
            absolute_path(fallback, &config)
        } else {
            absolute_path(working, &config)
        }
    }

    fn run_for_each_file(&mut self, id: NodeId) -> Result<()> {
        self.tree.require_elements(id, Elements::INPUTS)?;
        let files = self.tree.node(id).resolved.input_files.clone();
        let children = self.tree.children(id).to_vec();
        for file in files {
            debug!("ForEachFile {}: '{}'", id, file.display());
            self.tree.node_mut(id).current_file = Some(file);
            if !self.run_actions(&children) {
                break;
            }
        }
        self.tree.node_mut(id).current_file = None;
        Ok(())
    }

    fn run_if(&mut self, id: NodeId) -> Result<()> {
        let branches = self.tree.children(id).to_vec();
        for branch in branches {
            if self.tree.node(branch).has_option(OPTION_MUTE) {
                info!("Skipping muted {} {}", self.tree.node(branch).label(), branch);
                continue;
            }
            if !self.conditions_hold(branch) {
                continue;
            }
            let actions = self.tree.children(branch).to_vec();
            if !self.run_actions(&actions) {
                break;
            }
        }
        Ok(())
    }

    /// Evaluates the effective conditions of `id` with the session variables
    /// and the current file in scope.
    pub fn conditions_hold(&self, id: NodeId) -> bool {
        let mut context = self.session.variables.clone();
        let current = self.tree.current_file(id);
        let number = current
            .as_deref()
            .and_then(Path::file_name)
            .map(|name| file_number(&name.to_string_lossy()))
            .unwrap_or(0);
        context.insert(
            CURRENT_FILENAME_VAR.to_string(),
            json!(self.tree.field_text(id, Field::CurrentFilename)),
        );
        context.insert(CURRENT_FILE_NUMBER_VAR.to_string(), json!(number));
        self.conditions.conditions_hold(&self.tree, id, &mut context)
    }

    fn run_sequence(&mut self, id: NodeId) -> Result<()> {
        let name = self.tree.property_by_name(id, SEQUENCE_NAME_PROPERTY, true)?;
        if name.trim().is_empty() {
            return Err(Error::ConfigError(format!(
                "RunSequence needs a '{}' property",
                SEQUENCE_NAME_PROPERTY
            )));
        }
        let actions = self
            .tree
            .find_sequence(id, name.trim())
            .map(|sequence| sequence.actions.clone())
            .ok_or_else(|| Error::ConfigError(format!("no sequence named '{}'", name)))?;

        let children = self.tree.replace_children(id, &actions);
        debug!("RunSequence {}: '{}' with {} action(s)", id, name, children.len());
        self.run_actions(&children);
        Ok(())
    }

    // --- Documents ---

    fn first_input_file(&self, id: NodeId) -> Result<PathBuf> {
        self.tree
            .node(id)
            .resolved
            .input_files
            .iter()
            .find(|f| f.is_file())
            .cloned()
            .ok_or_else(|| Error::MissingElements {
                action: self.tree.node(id).label().to_string(),
                elements: "InputFilename".to_string(),
            })
    }

    fn output_file(&self, id: NodeId) -> Result<PathBuf> {
        self.tree
            .node(id)
            .resolved
            .output_file
            .clone()
            .ok_or_else(|| Error::MissingElements {
                action: self.tree.node(id).label().to_string(),
                elements: "OutputFilename".to_string(),
            })
    }

    fn open_working_document(&mut self, id: NodeId) -> Result<()> {
        self.tree.require_elements(id, Elements::INPUT_FILENAME)?;
        let input = self.first_input_file(id)?;
        let handle = self.session.documents.open(&input)?;
        let owner = self.tree.document_owner(id);
        info!("Opened working document '{}'", input.display());
        let node = self.tree.node_mut(owner);
        node.working_document_index = Some(handle.id);
        node.working_document = Some(handle);
        Ok(())
    }

    fn save_working_document(&mut self, id: NodeId) -> Result<()> {
        let mut required = Elements::OUTPUT_FILENAME;
        if self.tree.node(id).resolved.output_file.is_none() {
            required |= Elements::INPUT_FILENAME;
        }
        self.tree.require_elements(id, required)?;
        let document = self
            .tree
            .working_document(id)
            .ok_or_else(|| Error::DocumentError("no working document is open".to_string()))?;
        let output = self.output_file(id)?;
        self.session.documents.save(&document.handle, &output)?;
        info!("Saved working document to '{}'", output.display());
        Ok(())
    }

    // --- Images ---

    fn text_property(&self, id: NodeId, name: &str) -> Result<String> {
        Ok(self.tree.property_by_name(id, name, true)?.trim().to_string())
    }

    fn number_property<T>(&self, id: NodeId, name: &str) -> Result<T>
    where
        T: std::str::FromStr + Default,
        T::Err: std::fmt::Display,
    {
        let value = self.text_property(id, name)?;
        if value.is_empty() {
            return Ok(T::default());
        }
        value
            .parse()
            .map_err(|e| Error::ConfigError(format!("{} '{}' is not a number: {}", name, value, e)))
    }

    fn point(&self, id: NodeId) -> Result<Point> {
        Ok(Point {
            x: self.number_property(id, image_props::X)?,
            y: self.number_property(id, image_props::Y)?,
        })
    }

    fn size(&self, id: NodeId) -> Result<Size> {
        let size = Size {
            width: self.number_property(id, image_props::WIDTH)?,
            height: self.number_property(id, image_props::HEIGHT)?,
        };
        if size.width == 0 || size.height == 0 {
            return Err(Error::ConfigError("Width and Height must be positive".to_string()));
        }
        Ok(size)
    }

    /// `ImageName` when set, else the working image.
    fn target_image(&self, id: NodeId) -> Result<String> {
        let name = self.text_property(id, image_props::NAME)?;
        if !name.is_empty() {
            return Ok(name);
        }
        self.session
            .images
            .working()
            .ok_or_else(|| Error::ImageError("no working image".to_string()))
    }

    fn working_image(&self) -> Result<String> {
        self.session
            .images
            .working()
            .ok_or_else(|| Error::ImageError("no working image".to_string()))
    }

    fn required_image_name(&self, id: NodeId) -> Result<String> {
        let name = self.text_property(id, image_props::NAME)?;
        if name.is_empty() {
            return Err(Error::ConfigError(format!("'{}' property is required", image_props::NAME)));
        }
        Ok(name)
    }

    fn file_open_image(&mut self, id: NodeId) -> Result<()> {
        self.tree.require_elements(id, Elements::INPUT_FILENAME)?;
        let name = self.text_property(id, image_props::NAME)?;
        let files: Vec<PathBuf> = self
            .tree
            .node(id)
            .resolved
            .input_files
            .iter()
            .filter(|f| f.is_file())
            .cloned()
            .collect();
        for file in files {
            let key = if name.is_empty() {
                file.file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_default()
            } else {
                name.clone()
            };
            self.session.images.load(&key, &file)?;
            info!("Opened image '{}' from '{}'", key, file.display());
        }
        Ok(())
    }

    fn file_overlay_image(&mut self, id: NodeId) -> Result<()> {
        self.tree.require_elements(id, Elements::INPUT_FILENAME)?;
        let target = self.working_image()?;
        let at = self.point(id)?;
        let files: Vec<PathBuf> = self
            .tree
            .node(id)
            .resolved
            .input_files
            .iter()
            .filter(|f| f.is_file())
            .cloned()
            .collect();
        for file in files {
            self.session.images.overlay(&target, &file, at)?;
            info!("Overlaid '{}' onto '{}'", file.display(), target);
        }
        Ok(())
    }

    fn file_save_image(&mut self, id: NodeId) -> Result<()> {
        self.tree.require_elements(id, Elements::OUTPUT_FILENAME)?;
        let name = self.target_image(id)?;
        let output = self.output_file(id)?;
        self.session.images.save(&name, &output)?;
        info!("Saved image '{}' to '{}'", name, output.display());
        Ok(())
    }

    fn image_background(&mut self, id: NodeId) -> Result<()> {
        let name = self.text_property(id, image_props::NAME)?;
        let name = if name.is_empty() { "background".to_string() } else { name };
        let color = self.text_property(id, image_props::COLOR)?;
        let color = if color.is_empty() { "white".to_string() } else { color };
        let size = self.size(id)?;
        self.session.images.background(&name, &color, size)?;
        info!("Created {}x{} '{}' image '{}'", size.width, size.height, color, name);
        Ok(())
    }

    fn size_image(&mut self, id: NodeId) -> Result<()> {
        let name = self.target_image(id)?;
        let size = self.size(id)?;
        self.session.images.resize(&name, size)?;
        info!("Resized '{}' to {}x{}", name, size.width, size.height);
        Ok(())
    }

    fn draw_image(&mut self, id: NodeId) -> Result<()> {
        let source = self.required_image_name(id)?;
        let target = self.working_image()?;
        let at = self.point(id)?;
        self.session.images.draw(&target, &source, at)?;
        info!("Drew '{}' onto '{}'", source, target);
        Ok(())
    }

    fn set_working_image(&mut self, id: NodeId) -> Result<()> {
        let name = self.required_image_name(id)?;
        self.session.images.set_working(&name)?;
        debug!("Working image is now '{}'", name);
        Ok(())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("tree", &self.tree)
            .field("session", &self.session)
            .field("registry", &self.registry)
            .field("output_hook", &self.output_hook.is_some())
            .finish()
    }
}

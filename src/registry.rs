//! Recognized action names and caller-supplied action handlers.

use std::collections::HashMap;
use std::rc::Rc;

use crate::constants::BUILTIN_ACTIONS;
use crate::engine::Engine;
use crate::error::Result;
use crate::tree::NodeId;

/// Actions the engine dispatches itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinAction {
    None,
    Batch,
    DrawImage,
    FileOpenImage,
    FileOverlayImage,
    FileSaveImage,
    ForEachFile,
    If,
    ImageBackground,
    ImagesClear,
    OpenWorkingDocument,
    RunSequence,
    SaveWorkingDocument,
    SetWorkingImage,
    SizeImage,
}

impl BuiltinAction {
    /// Case-insensitive lookup. A blank name is a `None` placeholder.
    pub fn from_name(name: &str) -> Option<BuiltinAction> {
        let name = name.trim();
        if name.is_empty() {
            return Some(BuiltinAction::None);
        }
        let action = match name.to_ascii_lowercase().as_str() {
            "none" => BuiltinAction::None,
            "batch" => BuiltinAction::Batch,
            "drawimage" => BuiltinAction::DrawImage,
            "fileopenimage" => BuiltinAction::FileOpenImage,
            "fileoverlayimage" => BuiltinAction::FileOverlayImage,
            "filesaveimage" => BuiltinAction::FileSaveImage,
            "foreachfile" => BuiltinAction::ForEachFile,
            "if" => BuiltinAction::If,
            "imagebackground" => BuiltinAction::ImageBackground,
            "imagesclear" => BuiltinAction::ImagesClear,
            "openworkingdocument" => BuiltinAction::OpenWorkingDocument,
            "runsequence" => BuiltinAction::RunSequence,
            "saveworkingdocument" => BuiltinAction::SaveWorkingDocument,
            "setworkingimage" => BuiltinAction::SetWorkingImage,
            "sizeimage" => BuiltinAction::SizeImage,
            _ => return None,
        };
        Some(action)
    }
}

/// Handler for an action name the engine does not know.
///
/// Implemented for every `Fn(&mut Engine, NodeId) -> Result<()>`, so a
/// closure with annotated arguments can be registered directly. Handlers are
/// shared, so one may dispatch nodes of its own action name while it runs.
/// State a handler mutates goes behind a `Cell` or `RefCell`.
pub trait CustomAction {
    fn run(&self, engine: &mut Engine, id: NodeId) -> Result<()>;
}

impl<F> CustomAction for F
where
    F: Fn(&mut Engine, NodeId) -> Result<()>,
{
    fn run(&self, engine: &mut Engine, id: NodeId) -> Result<()> {
        self(engine, id)
    }
}

/// Recognized action names, seeded with the built-ins, and the handlers of
/// the custom ones.
pub struct ActionRegistry {
    names: Vec<String>,
    handlers: HashMap<String, Rc<dyn CustomAction>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self {
            names: BUILTIN_ACTIONS.iter().map(|name| name.to_string()).collect(),
            handlers: HashMap::new(),
        }
    }

    /// Adds `name` to the recognized names and installs its handler,
    /// replacing any previous one.
    ///
    /// # Arguments
    /// * `name` - Action name, matched case-insensitively
    /// * `handler` - Handler run for every node with that action
    pub fn register<S: Into<String>>(&mut self, name: S, handler: Rc<dyn CustomAction>) {
        let name = name.into();
        if !self.is_recognized(&name) {
            self.names.push(name.clone());
        }
        self.handlers.insert(name.to_ascii_lowercase(), handler);
    }

    pub fn is_recognized(&self, name: &str) -> bool {
        self.names.iter().any(|n| n.eq_ignore_ascii_case(name))
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// The handler registered for `name`, shared so the caller can run it
    /// with mutable access to the engine.
    pub fn handler(&self, name: &str) -> Option<Rc<dyn CustomAction>> {
        self.handlers.get(&name.to_ascii_lowercase()).cloned()
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        ActionRegistry::new()
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("names", &self.names)
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

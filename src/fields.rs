//! Name-to-accessor registry for the built-in fields of an action node.
//!
//! Token substitution and the element checker look fields up by name. The
//! table here maps each name to the node storage that backs it, so no
//! reflection is involved.

use std::path::Path;

use crate::paths::file_number;
use crate::tree::{ActionNode, ActionTree, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Action,
    Base,
    ConfigFilename,
    Count,
    CurrentFilename,
    CurrentFileNumber,
    CurrentFileStem,
    DataFilename,
    DateTimeValue,
    Digits,
    InputFilename,
    InputFolderName,
    Message,
    OutputFilename,
    OutputFolderName,
    OutputName,
    Pattern,
    Range,
    SourceFolderName,
    Text,
    WorkingDocumentIndex,
    WorkingPath,
}

impl Field {
    pub const ALL: [Field; 22] = [
        Field::Action,
        Field::Base,
        Field::ConfigFilename,
        Field::Count,
        Field::CurrentFilename,
        Field::CurrentFileNumber,
        Field::CurrentFileStem,
        Field::DataFilename,
        Field::DateTimeValue,
        Field::Digits,
        Field::InputFilename,
        Field::InputFolderName,
        Field::Message,
        Field::OutputFilename,
        Field::OutputFolderName,
        Field::OutputName,
        Field::Pattern,
        Field::Range,
        Field::SourceFolderName,
        Field::Text,
        Field::WorkingDocumentIndex,
        Field::WorkingPath,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Field::Action => "Action",
            Field::Base => "Base",
            Field::ConfigFilename => "ConfigFilename",
            Field::Count => "Count",
            Field::CurrentFilename => "CurrentFilename",
            Field::CurrentFileNumber => "CurrentFileNumber",
            Field::CurrentFileStem => "CurrentFileStem",
            Field::DataFilename => "DataFilename",
            Field::DateTimeValue => "DateTimeValue",
            Field::Digits => "Digits",
            Field::InputFilename => "InputFilename",
            Field::InputFolderName => "InputFolderName",
            Field::Message => "Message",
            Field::OutputFilename => "OutputFilename",
            Field::OutputFolderName => "OutputFolderName",
            Field::OutputName => "OutputName",
            Field::Pattern => "Pattern",
            Field::Range => "Range",
            Field::SourceFolderName => "SourceFolderName",
            Field::Text => "Text",
            Field::WorkingDocumentIndex => "WorkingDocumentIndex",
            Field::WorkingPath => "WorkingPath",
        }
    }

    /// Case-insensitive lookup by field name.
    pub fn from_name(name: &str) -> Option<Field> {
        Field::ALL
            .iter()
            .copied()
            .find(|field| field.name().eq_ignore_ascii_case(name))
    }

    /// Fields that only ever describe the node that carries them.
    pub fn is_local_only(self) -> bool {
        matches!(self, Field::Action | Field::ConfigFilename | Field::Message)
    }

    /// Fields computed from the inherited current file.
    pub fn is_derived(self) -> bool {
        matches!(
            self,
            Field::CurrentFilename | Field::CurrentFileNumber | Field::CurrentFileStem
        )
    }

    /// Text of the field's zero value.
    pub fn zero_text(self) -> String {
        match self {
            Field::Base | Field::Count | Field::Digits | Field::CurrentFileNumber => "0".into(),
            Field::WorkingDocumentIndex => "-1".into(),
            Field::DateTimeValue => chrono::DateTime::<chrono::Utc>::default().to_rfc3339(),
            _ => String::new(),
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn text(value: &str) -> Option<String> {
    Some(value).filter(|v| !v.is_empty()).map(str::to_string)
}

fn derived_text(field: Field, current: &Path) -> Option<String> {
    let name = current.file_name()?.to_string_lossy().into_owned();
    match field {
        Field::CurrentFilename => Some(name),
        Field::CurrentFileStem => current
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned()),
        Field::CurrentFileNumber => Some(file_number(&name).to_string()),
        _ => None,
    }
}

/// Text of a stored field on one node, `None` when it holds the sentinel.
fn stored_text(node: &ActionNode, field: Field) -> Option<String> {
    match field {
        Field::Action => text(&node.action),
        Field::Base => node.base.map(|v| v.to_string()),
        Field::ConfigFilename => text(&node.config_filename),
        Field::Count => node.count.map(|v| v.to_string()),
        Field::DataFilename => text(&node.data_filename),
        Field::DateTimeValue => node.date_time_value.map(|v| v.to_rfc3339()),
        Field::Digits => node.digits.map(|v| v.to_string()),
        Field::InputFilename => text(&node.input_filename),
        Field::InputFolderName => text(&node.input_folder_name),
        Field::Message => text(&node.message),
        Field::OutputFilename => text(&node.output_filename),
        Field::OutputFolderName => text(&node.output_folder_name),
        Field::OutputName => text(&node.output_name),
        Field::Pattern => text(&node.pattern),
        Field::Range => node.range.as_ref().map(|r| r.to_string()),
        Field::SourceFolderName => text(&node.source_folder_name),
        Field::Text => text(&node.text),
        Field::WorkingDocumentIndex => node.working_document_index.map(|v| v.to_string()),
        Field::WorkingPath => text(&node.working_path),
        Field::CurrentFilename | Field::CurrentFileNumber | Field::CurrentFileStem => node
            .current_file
            .as_deref()
            .and_then(|current| derived_text(field, current)),
    }
}

impl ActionTree {
    /// The field as set on `id` itself.
    pub fn local_field_text(&self, id: NodeId, field: Field) -> Option<String> {
        stored_text(self.node(id), field)
    }

    /// The nearest set value of the field along the scope chain.
    pub fn inherited_field_text(&self, id: NodeId, field: Field) -> Option<String> {
        if field.is_local_only() {
            return self.local_field_text(id, field);
        }
        if field.is_derived() {
            return self
                .current_file(id)
                .and_then(|current| derived_text(field, &current));
        }
        self.scope(id).find_map(|n| stored_text(self.node(n), field))
    }

    /// Inherited value of the field, or its zero value.
    pub fn field_text(&self, id: NodeId, field: Field) -> String {
        self.inherited_field_text(id, field)
            .unwrap_or_else(|| field.zero_text())
    }
}

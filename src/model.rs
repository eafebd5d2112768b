//! Serialized form of an action tree.
//!
//! These are the shapes read from and written to configuration files. The
//! live, linked tree is [`crate::tree::ActionTree`]; an [`ActionItem`] is a
//! detached subtree, which is also how sequence templates are stored.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One action object of a configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActionItem {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub action: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<ActionItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<ConditionItem>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub config_filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i32>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub data_filename: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time_value: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digits: Option<i32>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub input_filename: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub input_folder_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub input_names: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionItem>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub output_filename: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub output_folder_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub output_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pattern: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<PropertyItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<Range>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sequences: Vec<SequenceDefinition>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source_folder_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub working_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_document_index: Option<i32>,

    /// Keys this schema does not know. They become properties when the item
    /// is linked into a tree.
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
}

impl ActionItem {
    /// Creates an item with only its action name set.
    pub fn new<S: Into<String>>(action: S) -> Self {
        Self { action: action.into(), ..Default::default() }
    }

    /// Unknown keys rendered as properties; strings stay verbatim.
    pub fn extra_properties(&self) -> Vec<PropertyItem> {
        self.extra
            .iter()
            .map(|(name, value)| PropertyItem {
                name: name.clone(),
                value: match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                },
            })
            .collect()
    }
}

/// A boolean expression, optionally preceded by a variable binding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConditionItem {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub assignment: String,
    #[serde(default)]
    pub condition: String,
}

impl ConditionItem {
    pub fn new<S: Into<String>>(condition: S) -> Self {
        Self { assignment: String::new(), condition: condition.into() }
    }
}

/// A free-form flag such as `mute` or `solo`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OptionItem {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
}

impl OptionItem {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into(), value: String::new() }
    }
}

/// A user-defined name/value pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PropertyItem {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

impl PropertyItem {
    pub fn new<N: Into<String>, V: Into<String>>(name: N, value: V) -> Self {
        Self { name: name.into(), value: value.into() }
    }
}

/// A named, reusable list of action templates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SequenceDefinition {
    #[serde(alias = "SequenceName")]
    pub name: String,
    #[serde(default)]
    pub actions: Vec<ActionItem>,
}

/// A closed, string-encoded interval such as `img001`..`img040`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Range {
    #[serde(default)]
    pub start_value: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub end_value: String,
}

impl Range {
    pub fn new<S: Into<String>, E: Into<String>>(start: S, end: E) -> Self {
        Self { start_value: start.into(), end_value: end.into() }
    }

    /// A range with no start value is treated as unset.
    pub fn is_empty(&self) -> bool {
        self.start_value.is_empty()
    }
}

impl std::fmt::Display for Range {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.end_value.is_empty() {
            write!(f, "{}", self.start_value)
        } else {
            write!(f, "{}-{}", self.start_value, self.end_value)
        }
    }
}

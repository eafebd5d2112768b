//! Validation and defaulting of a node's required elements.
//!
//! A built-in names the elements it needs as an [`Elements`] mask. The
//! checker evaluates every requested element, fills in the ones that can be
//! inferred (the output file from a single input, the output folder from the
//! working directory) and reports whether all of them were satisfied.

use log::warn;
use std::fs;
use std::ops::{BitOr, BitOrAssign};

use crate::error::{Error, Result};
use crate::fields::Field;
use crate::tree::{ActionTree, NodeId};

/// Bit set of configuration elements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Elements(u32);

impl Elements {
    pub const NONE: Elements = Elements(0);
    pub const ACTION: Elements = Elements(1 << 0);
    pub const BASE: Elements = Elements(1 << 1);
    pub const COUNT: Elements = Elements(1 << 2);
    pub const DATE_TIME_VALUE: Elements = Elements(1 << 3);
    pub const DIGITS: Elements = Elements(1 << 4);
    pub const DATA_FILENAME: Elements = Elements(1 << 5);
    pub const INPUT_FILENAME: Elements = Elements(1 << 6);
    pub const INPUT_FOLDER_NAME: Elements = Elements(1 << 7);
    pub const INPUTS: Elements = Elements(1 << 8);
    pub const OUTPUT_FILENAME: Elements = Elements(1 << 9);
    pub const OUTPUT_FOLDER_NAME: Elements = Elements(1 << 10);
    pub const OUTPUT_NAME: Elements = Elements(1 << 11);
    pub const PATTERN: Elements = Elements(1 << 12);
    pub const RANGE: Elements = Elements(1 << 13);
    pub const SOURCE_FOLDER_NAME: Elements = Elements(1 << 14);
    pub const TEXT: Elements = Elements(1 << 15);
    pub const WORKING_PATH: Elements = Elements(1 << 16);

    /// Evaluation order.
    const ORDERED: [(Elements, &'static str); 17] = [
        (Elements::ACTION, "Action"),
        (Elements::BASE, "Base"),
        (Elements::COUNT, "Count"),
        (Elements::DATE_TIME_VALUE, "DateTimeValue"),
        (Elements::DIGITS, "Digits"),
        (Elements::DATA_FILENAME, "DataFilename"),
        (Elements::INPUT_FILENAME, "InputFilename"),
        (Elements::INPUT_FOLDER_NAME, "InputFolderName"),
        (Elements::INPUTS, "Inputs"),
        (Elements::OUTPUT_FILENAME, "OutputFilename"),
        (Elements::OUTPUT_FOLDER_NAME, "OutputFolderName"),
        (Elements::OUTPUT_NAME, "OutputName"),
        (Elements::PATTERN, "Pattern"),
        (Elements::RANGE, "Range"),
        (Elements::SOURCE_FOLDER_NAME, "SourceFolderName"),
        (Elements::TEXT, "Text"),
        (Elements::WORKING_PATH, "WorkingPath"),
    ];

    pub fn contains(self, other: Elements) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Names of the set elements in evaluation order.
    pub fn names(self) -> Vec<&'static str> {
        Self::ORDERED
            .iter()
            .filter(|(element, _)| self.contains(*element))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl BitOr for Elements {
    type Output = Elements;

    fn bitor(self, rhs: Elements) -> Elements {
        Elements(self.0 | rhs.0)
    }
}

impl BitOrAssign for Elements {
    fn bitor_assign(&mut self, rhs: Elements) {
        self.0 |= rhs.0;
    }
}

impl std::fmt::Display for Elements {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.names().join(", "))
    }
}

impl ActionTree {
    /// Checks every element in `elements` and returns true only when all of
    /// them are satisfied.
    ///
    /// With `inherited` false an element counts only when it is set on the
    /// node itself. `quiet` suppresses the per-element warnings.
    pub fn check_elements(
        &mut self,
        id: NodeId,
        elements: Elements,
        inherited: bool,
        quiet: bool,
    ) -> bool {
        let failed = self.failed_elements(id, elements, inherited);
        if !quiet {
            for name in failed.names() {
                warn!("{} {}: {} is missing or invalid", self.node(id).label(), id, name);
            }
        }
        failed.is_empty()
    }

    /// Like [`check_elements`](Self::check_elements) with inherited values,
    /// turning a failed check into an error.
    pub fn require_elements(&mut self, id: NodeId, elements: Elements) -> Result<()> {
        let failed = self.failed_elements(id, elements, true);
        if failed.is_empty() {
            return Ok(());
        }
        Err(Error::MissingElements {
            action: self.node(id).label().to_string(),
            elements: failed.to_string(),
        })
    }

    fn failed_elements(&mut self, id: NodeId, elements: Elements, inherited: bool) -> Elements {
        let mut failed = Elements::NONE;
        for (element, _) in Elements::ORDERED {
            if elements.contains(element) && !self.check_element(id, element, elements, inherited) {
                failed |= element;
            }
        }
        failed
    }

    fn has_field(&self, id: NodeId, field: Field, inherited: bool) -> bool {
        if inherited {
            self.inherited_field_text(id, field).is_some()
        } else {
            self.local_field_text(id, field).is_some()
        }
    }

    fn check_element(
        &mut self,
        id: NodeId,
        element: Elements,
        requested: Elements,
        inherited: bool,
    ) -> bool {
        if element == Elements::OUTPUT_FILENAME {
            return self.check_output_file(id, requested, inherited);
        }
        if element == Elements::OUTPUT_FOLDER_NAME {
            return self.check_output_folder(id, inherited);
        }

        let resolved = &self.node(id).resolved;
        match element {
            Elements::ACTION => self.has_field(id, Field::Action, false),
            Elements::BASE => self.has_field(id, Field::Base, inherited),
            Elements::COUNT => self.has_field(id, Field::Count, inherited),
            Elements::DATE_TIME_VALUE => self.has_field(id, Field::DateTimeValue, inherited),
            Elements::DIGITS => self.has_field(id, Field::Digits, inherited),
            Elements::DATA_FILENAME => {
                (inherited || self.has_field(id, Field::DataFilename, false)
                    || !self.node(id).data_names.is_empty())
                    && resolved.data_files.iter().any(|f| f.is_file())
            }
            Elements::INPUT_FILENAME => {
                (inherited || self.node(id).has_local_input())
                    && resolved.input_files.iter().any(|f| f.is_file())
            }
            Elements::INPUT_FOLDER_NAME => {
                self.has_field(id, Field::InputFolderName, inherited)
                    && resolved.input_dir.as_deref().is_some_and(|d| d.is_dir())
            }
            Elements::INPUTS => {
                (inherited || self.node(id).has_local_input())
                    && resolved.input_files.iter().any(|f| f.exists())
            }
            Elements::OUTPUT_NAME => self.has_field(id, Field::OutputName, inherited),
            Elements::PATTERN => self.has_field(id, Field::Pattern, inherited),
            Elements::RANGE => self.has_field(id, Field::Range, inherited),
            Elements::SOURCE_FOLDER_NAME => {
                self.has_field(id, Field::SourceFolderName, inherited)
                    && resolved.source_dir.as_deref().is_some_and(|d| d.is_dir())
            }
            Elements::TEXT => self.has_field(id, Field::Text, inherited),
            Elements::WORKING_PATH => {
                (inherited || self.has_field(id, Field::WorkingPath, false))
                    && resolved.working_dir.as_deref().is_some_and(|d| d.is_dir())
            }
            _ => true,
        }
    }

    fn check_output_file(&mut self, id: NodeId, requested: Elements, inherited: bool) -> bool {
        if !inherited && !self.has_field(id, Field::OutputFilename, false) {
            return false;
        }
        let resolved = &mut self.node_mut(id).resolved;
        if resolved.output_file.is_none() && requested.contains(Elements::INPUT_FILENAME) {
            let inputs: Vec<_> = resolved.input_files.iter().filter(|f| f.is_file()).collect();
            if let [single] = inputs.as_slice() {
                resolved.output_file = Some(single.to_path_buf());
            }
        }
        let output = match &resolved.output_file {
            Some(output) => output.clone(),
            None => return false,
        };
        match output.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => match fs::create_dir_all(parent) {
                Ok(()) => true,
                Err(err) => {
                    warn!("Cannot create '{}': {}", parent.display(), err);
                    false
                }
            },
            None => true,
        }
    }

    fn check_output_folder(&mut self, id: NodeId, inherited: bool) -> bool {
        if !inherited && !self.has_field(id, Field::OutputFolderName, false) {
            return false;
        }
        let resolved = &mut self.node_mut(id).resolved;
        if resolved.output_dir.is_none() {
            resolved.output_dir = resolved.working_dir.clone();
        }
        let output_dir = match &resolved.output_dir {
            Some(dir) => dir.clone(),
            None => return false,
        };
        match fs::create_dir_all(&output_dir) {
            Ok(()) => true,
            Err(err) => {
                warn!("Cannot create '{}': {}", output_dir.display(), err);
                false
            }
        }
    }
}

//! `{Name}` token substitution.
//!
//! Any string value may embed tokens naming a built-in field or a user
//! property. Substitution repeats until a pass changes nothing, with a hard
//! cap on the number of passes so self-referencing properties fail instead
//! of looping.

use lazy_static::lazy_static;
use regex::Regex;

use crate::constants::MAX_NORMALIZE_PASSES;
use crate::error::{Error, Result};
use crate::fields::Field;
use crate::tree::{ActionTree, NodeId};

lazy_static! {
    static ref FIELD_TOKEN_RE: Regex = Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();
}

/// Distinct token names in `value`, in order of first appearance.
pub fn token_names(value: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in FIELD_TOKEN_RE.captures_iter(value) {
        let name = &caps[1];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

impl ActionTree {
    /// Expands every known token in `value` as seen from `id`.
    ///
    /// Tokens that name neither a field nor a property are left in place.
    pub fn normalize_value(&self, id: NodeId, value: &str) -> Result<String> {
        let mut current = value.to_string();
        for _ in 0..MAX_NORMALIZE_PASSES {
            let mut next = current.clone();
            for name in token_names(&current) {
                if let Some(replacement) = self.lookup_token(id, &name) {
                    next = next.replace(&format!("{{{}}}", name), &replacement);
                }
            }
            if next == current {
                return Ok(current);
            }
            current = next;
        }
        Err(Error::ConfigError(format!(
            "'{}' still has tokens to expand after {} passes",
            value, MAX_NORMALIZE_PASSES
        )))
    }

    /// Value behind `name` at `id`: a set built-in field first, then the
    /// property chain, then the field's zero value. Unknown names give an
    /// empty string.
    pub fn property_by_name(&self, id: NodeId, name: &str, normalize: bool) -> Result<String> {
        let raw = self.lookup_token(id, name).unwrap_or_default();
        if normalize {
            self.normalize_value(id, &raw)
        } else {
            Ok(raw)
        }
    }

    fn lookup_token(&self, id: NodeId, name: &str) -> Option<String> {
        let field = Field::from_name(name);
        if let Some(value) = field.and_then(|f| self.inherited_field_text(id, f)) {
            return Some(value);
        }
        if let Some(value) = self.property(id, name) {
            return Some(value.to_string());
        }
        field.map(Field::zero_text)
    }
}

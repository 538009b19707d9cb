//! Schema mapping from a JSON document to catalog fields.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{Result, TransferError};

/// Where each catalog field is found in an import document.
///
/// Every field is an RFC 6901 JSON pointer. `records` is resolved against the
/// document root. When `cards` is set, each record is a set and `cards`
/// points at its item array; `set_name` is then read from the set record and
/// the remaining fields from each item. Without `cards`, each record is an
/// item and every field is read from it.
///
/// A flat document of `{"card": "Charizard #4", "series": "Base Set", ...}`
/// objects maps as:
///
/// ```json
/// { "records": "", "set_name": "/series", "label": "/card", "key": "/id", "price": "/price" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FieldMapping {
    /// Pointer to the record array.
    pub records: String,
    /// Pointer, within a set record, to its item array.
    pub cards: Option<String>,
    /// Set name.
    pub set_name: Option<String>,
    /// Combined `"Name #Number"` label.
    pub label: Option<String>,
    /// Item name, used when `label` is absent.
    pub name: Option<String>,
    /// Serial number, used when `label` is absent.
    pub number: Option<String>,
    /// Stable item key.
    pub key: Option<String>,
    /// Product page URL.
    pub source_url: Option<String>,
    /// Reference price.
    pub price: Option<String>,
}

impl Default for FieldMapping {
    fn default() -> Self {
        Self {
            records: String::new(),
            cards: Some("/cards".to_string()),
            set_name: Some("/name".to_string()),
            label: Some("/card".to_string()),
            name: None,
            number: None,
            key: Some("/id".to_string()),
            source_url: None,
            price: Some("/price".to_string()),
        }
    }
}

impl FieldMapping {
    /// Checks that the mapping can produce an item name.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Mapping`] when neither `label` nor `name` is
    /// set, or when a pointer is malformed.
    pub fn validate(&self) -> Result<()> {
        if self.label.is_none() && self.name.is_none() {
            return Err(TransferError::Mapping(
                "one of `label` or `name` is required".to_string(),
            ));
        }
        let pointers = [
            ("records", Some(&self.records)),
            ("cards", self.cards.as_ref()),
            ("set_name", self.set_name.as_ref()),
            ("label", self.label.as_ref()),
            ("name", self.name.as_ref()),
            ("number", self.number.as_ref()),
            ("key", self.key.as_ref()),
            ("source_url", self.source_url.as_ref()),
            ("price", self.price.as_ref()),
        ];
        for (field, pointer) in pointers {
            if let Some(pointer) = pointer
                && !pointer.is_empty()
                && !pointer.starts_with('/')
            {
                return Err(TransferError::Mapping(format!(
                    "`{field}` pointer '{pointer}' must be empty or start with '/'"
                )));
            }
        }
        Ok(())
    }
}

/// Reads and validates a mapping file.
///
/// # Errors
///
/// Returns [`TransferError::Io`], [`TransferError::Json`] or
/// [`TransferError::Mapping`].
pub fn load_mapping(path: &Path) -> Result<FieldMapping> {
    let raw = std::fs::read_to_string(path).map_err(|e| TransferError::io(path, &e))?;
    let mapping: FieldMapping =
        serde_json::from_str(&raw).map_err(|e| TransferError::json(path, &e))?;
    mapping.validate()?;
    Ok(mapping)
}

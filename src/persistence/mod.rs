//! Local draft persistence
//!
//! Features:
//! - One JSON record per entity, keyed by the entity id
//! - Sequence-token invalidation: a draft only counts while its stored token
//!   matches the entity's live token; a mismatch discards the whole record
//! - Typed read results, so callers decide what a corrupt record means
//!
//! Stored format (stable across reloads):
//! `{ "sequencecheck": "<token>", "fields": { "<field-id>": "<value>" | 1 | true } }`

pub mod storage;

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::field::editor_field_id;
use crate::form::FieldKind;
pub use storage::{MemoryStorage, Storage, StorageError};

#[derive(Debug, Error)]
pub enum DraftError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("malformed draft for entity {entity}: {source}")]
    Parse {
        entity: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("could not serialize draft for entity {entity}: {source}")]
    Serialize {
        entity: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A cached field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl FieldValue {
    pub fn text(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }

    /// Checkbox encoding: 1 when checked, 0 otherwise
    pub fn flag(checked: bool) -> Self {
        FieldValue::Number(u8::from(checked).into())
    }

    /// Value as it would appear in a form control
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            FieldValue::Text(s) => Cow::Borrowed(s),
            FieldValue::Number(n) => Cow::Owned(n.to_string()),
            FieldValue::Bool(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
        }
    }

    /// Checked state when replayed into a checkbox
    pub fn is_truthy(&self) -> bool {
        match self {
            FieldValue::Bool(b) => *b,
            FieldValue::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
            FieldValue::Text(s) => !s.is_empty(),
        }
    }
}

/// Cached answers for one entity, valid for one sequence token
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Draft {
    /// Token the draft was recorded against (absent if the form had none)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequencecheck: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl Draft {
    pub fn new(token: Option<&str>) -> Self {
        Self {
            sequencecheck: token.map(str::to_string),
            fields: BTreeMap::new(),
        }
    }

    /// Whether this draft was recorded against `token`
    pub fn is_current(&self, token: Option<&str>) -> bool {
        self.sequencecheck.as_deref() == token
    }
}

/// Normalize a changed control into the (field id, value) pair to cache.
///
/// Checkboxes store their live checked state, not their `value` attribute.
/// Editors are stored under their companion textarea's field id.
pub fn normalize<'a>(
    kind: FieldKind,
    field_id: &'a str,
    raw: &str,
    checked: bool,
) -> (&'a str, FieldValue) {
    match kind {
        FieldKind::Checkbox => (field_id, FieldValue::flag(checked)),
        FieldKind::Editor => (editor_field_id(field_id), FieldValue::text(raw)),
        _ => (field_id, FieldValue::text(raw)),
    }
}

/// Per-entity draft cache over a key/value storage
#[derive(Debug)]
pub struct DraftStore<S: Storage> {
    storage: S,
}

impl<S: Storage> DraftStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Load the stored draft for an entity
    pub fn read(&self, entity_id: &str) -> Result<Option<Draft>, DraftError> {
        let Some(json) = self.storage.get_item(entity_id)? else {
            log::debug!("No local draft for entity {}", entity_id);
            return Ok(None);
        };
        let draft = serde_json::from_str(&json).map_err(|source| DraftError::Parse {
            entity: entity_id.to_string(),
            source,
        })?;
        log::debug!("Loaded local draft for entity {}", entity_id);
        Ok(Some(draft))
    }

    /// Load the draft for an entity if it is readable and matches `token`.
    ///
    /// Unreadable records are logged and treated as absent.
    pub fn read_current(&self, entity_id: &str, token: Option<&str>) -> Option<Draft> {
        match self.read(entity_id) {
            Ok(Some(draft)) if draft.is_current(token) => Some(draft),
            Ok(Some(_)) => {
                log::debug!("Local draft for entity {} is stale", entity_id);
                None
            }
            Ok(None) => None,
            Err(e) => {
                log::warn!("Ignoring local draft: {}", e);
                None
            }
        }
    }

    /// Merge one field into the entity's draft for `token`.
    ///
    /// A stored draft recorded against another token is replaced wholesale.
    pub fn write(
        &mut self,
        entity_id: &str,
        token: Option<&str>,
        field_id: &str,
        value: FieldValue,
    ) -> Result<(), DraftError> {
        let mut draft = match self.read(entity_id) {
            Ok(Some(draft)) if draft.is_current(token) => draft,
            Ok(Some(_)) => {
                log::debug!("Clearing stale draft for entity {}", entity_id);
                Draft::new(token)
            }
            Ok(None) => Draft::new(token),
            Err(DraftError::Parse { .. }) => {
                log::warn!("Replacing malformed draft for entity {}", entity_id);
                Draft::new(token)
            }
            Err(e) => return Err(e),
        };

        draft.fields.insert(field_id.to_string(), value);

        let json = serde_json::to_string(&draft).map_err(|source| DraftError::Serialize {
            entity: entity_id.to_string(),
            source,
        })?;
        self.storage.set_item(entity_id, &json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn store() -> DraftStore<MemoryStorage> {
        DraftStore::new(MemoryStorage::new())
    }

    #[test]
    fn test_write_creates_and_merges() {
        let mut store = store();
        store.write("q1", Some("abc"), "answer", FieldValue::text("42")).unwrap();
        store.write("q1", Some("abc"), "other", FieldValue::flag(true)).unwrap();

        let draft = store.read("q1").unwrap().unwrap();
        assert_eq!(draft.sequencecheck.as_deref(), Some("abc"));
        assert_eq!(draft.fields.len(), 2);
        assert_eq!(draft.fields["answer"], FieldValue::text("42"));
        assert_eq!(draft.fields["other"], FieldValue::flag(true));
    }

    #[test]
    fn test_token_change_discards_previous_fields() {
        let mut store = store();
        store.write("q1", Some("T1"), "a", FieldValue::text("x")).unwrap();
        store.write("q1", Some("T2"), "b", FieldValue::text("y")).unwrap();

        let draft = store.read("q1").unwrap().unwrap();
        assert_eq!(draft.sequencecheck.as_deref(), Some("T2"));
        assert!(!draft.fields.contains_key("a"));
        assert_eq!(draft.fields["b"], FieldValue::text("y"));
    }

    #[test]
    fn test_entities_are_partitioned() {
        let mut store = store();
        store.write("q1", Some("1"), "answer", FieldValue::text("a")).unwrap();
        store.write("q2", Some("9"), "answer", FieldValue::text("b")).unwrap();
        assert_eq!(store.read_current("q1", Some("1")).unwrap().fields["answer"], FieldValue::text("a"));
        assert_eq!(store.read_current("q2", Some("9")).unwrap().fields["answer"], FieldValue::text("b"));
        assert_eq!(store.storage().len(), 2);
    }

    #[test]
    fn test_malformed_record_reads_as_parse_error() {
        let mut storage = MemoryStorage::new();
        storage.set_item("q1", "{not json").unwrap();
        let mut store = DraftStore::new(storage);

        assert!(matches!(store.read("q1"), Err(DraftError::Parse { .. })));
        assert_eq!(store.read_current("q1", Some("abc")), None);

        // A write recovers the key
        store.write("q1", Some("abc"), "answer", FieldValue::text("1")).unwrap();
        assert!(store.read_current("q1", Some("abc")).is_some());
    }

    #[test]
    fn test_stored_format_is_stable() {
        let mut store = store();
        store.write("q5", Some("7"), "choice0", FieldValue::flag(false)).unwrap();
        let json = store.storage().get_item("q5").unwrap().unwrap();
        assert_eq!(json, r#"{"sequencecheck":"7","fields":{"choice0":0}}"#);

        let parsed: Draft =
            serde_json::from_str(r#"{"sequencecheck":"7","fields":{"a":"x","b":1,"c":true}}"#).unwrap();
        assert_eq!(parsed.fields["a"], FieldValue::text("x"));
        assert_eq!(parsed.fields["b"], FieldValue::flag(true));
        assert_eq!(parsed.fields["c"], FieldValue::Bool(true));
    }

    #[test]
    fn test_missing_token_matches_missing_token() {
        let mut store = store();
        store.write("q1", None, "answer", FieldValue::text("a")).unwrap();
        assert!(store.read_current("q1", None).is_some());
        assert!(store.read_current("q1", Some("1")).is_none());
    }

    #[test]
    fn test_normalize() {
        assert_eq!(
            normalize(FieldKind::Checkbox, "choice0", "on", true),
            ("choice0", FieldValue::flag(true))
        );
        assert_eq!(
            normalize(FieldKind::Checkbox, "choice0", "on", false),
            ("choice0", FieldValue::flag(false))
        );
        assert_eq!(
            normalize(FieldKind::Editor, "answer_id", "<p>hi</p>", false),
            ("answer", FieldValue::text("<p>hi</p>"))
        );
        assert_eq!(
            normalize(FieldKind::Text, "answer", "42", true),
            ("answer", FieldValue::text("42"))
        );
    }

    #[test]
    fn test_truthiness() {
        assert!(FieldValue::flag(true).is_truthy());
        assert!(!FieldValue::flag(false).is_truthy());
        assert!(!FieldValue::text("").is_truthy());
        assert!(FieldValue::Bool(true).is_truthy());
        assert_eq!(FieldValue::flag(true).as_text(), "1");
    }

    proptest! {
        #[test]
        fn prop_no_field_leaks_across_tokens(
            old_fields in proptest::collection::btree_map("[a-z]{1,6}", "[a-z0-9]{0,6}", 1..6),
            new_field in "[A-Z]{1,6}",
            t1 in "[0-9]{1,4}",
            t2 in "[0-9]{1,4}",
        ) {
            prop_assume!(t1 != t2);
            let mut store = store();
            for (k, v) in &old_fields {
                store.write("q1", Some(&t1), k, FieldValue::text(v)).unwrap();
            }

            prop_assert!(store.read_current("q1", Some(&t2)).is_none());

            store.write("q1", Some(&t2), &new_field, FieldValue::text("v")).unwrap();
            let draft = store.read_current("q1", Some(&t2)).unwrap();
            prop_assert_eq!(draft.fields.len(), 1);
            prop_assert!(draft.fields.contains_key(&new_field));
        }
    }
}

//! Hidden-field snapshot
//!
//! Server-rendered script sometimes rewrites hidden inputs after load
//! (sequence counters in particular). The poller compares the live hidden
//! inputs against the last values it saw and reports the ones that moved, so
//! they go through the same draft/dirty path as user edits.

use std::collections::HashMap;

use crate::field::{entity_id_of, is_sequence_check};

/// Last-seen value of every named hidden input
#[derive(Debug, Clone, Default)]
pub struct HiddenFieldSnapshot {
    values: HashMap<String, String>,
}

impl HiddenFieldSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current hidden fields without reporting anything
    pub fn capture<I>(&mut self, fields: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in fields {
            if name.is_empty() {
                continue;
            }
            self.values.insert(name, value);
        }
    }

    /// Update from the current hidden fields, returning the names that are new
    /// or whose value changed, in input order
    pub fn detect_changes<I>(&mut self, fields: I) -> Vec<String>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut changed = Vec::new();
        for (name, value) in fields {
            if name.is_empty() {
                continue;
            }
            if self.values.get(&name) != Some(&value) {
                self.values.insert(name.clone(), value);
                changed.push(name);
            }
        }
        changed
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Current sequence token for an entity
    pub fn token_for(&self, entity_id: &str) -> Option<&str> {
        self.get(&crate::field::sequence_check_name(entity_id))
    }

    /// (entity id, token) for every sequence-check field seen, sorted by entity
    pub fn sequence_tokens(&self) -> Vec<(&str, &str)> {
        let mut tokens: Vec<_> = self
            .values
            .iter()
            .filter(|(name, _)| is_sequence_check(name))
            .map(|(name, value)| (entity_id_of(name), value.as_str()))
            .collect();
        tokens.sort_unstable();
        tokens
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

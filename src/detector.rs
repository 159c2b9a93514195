//! Change events and the noise filter

use crate::field::{entity_id_of, field_id_of, is_bookkeeping};
use crate::form::{Control, FieldKind};

/// A field edit as reported by the form, the hidden-field poller or an editor
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub name: String,
    pub kind: FieldKind,
    pub value: String,
}

impl ChangeEvent {
    pub fn new(name: &str, kind: FieldKind, value: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            value: value.to_string(),
        }
    }

    /// Change reported by a rich-text editor instance
    pub fn editor(editor_id: &str, content: &str) -> Self {
        Self::new(editor_id, FieldKind::Editor, content)
    }

    pub fn from_control(control: &Control) -> Self {
        Self::new(&control.name, control.kind, &control.value)
    }

    pub fn entity_id(&self) -> &str {
        entity_id_of(&self.name)
    }

    pub fn field_id(&self) -> &str {
        field_id_of(&self.name)
    }

    /// Whether this change carries answer data worth autosaving
    pub fn is_interesting(&self) -> bool {
        !is_bookkeeping(&self.name)
    }
}

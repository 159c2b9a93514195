//! Replay of cached drafts into the live form after a reload
//!
//! Only drafts whose token exactly matches the entity's live sequence token
//! are replayed. Anything else is stale (the question was saved, regraded or
//! re-sequenced since) and left alone.

use crate::field::{entity_id_of, field_id_of};
use crate::form::{FieldKind, Form};
use crate::hidden::HiddenFieldSnapshot;
use crate::persistence::{Draft, DraftStore, FieldValue, Storage};

/// Counts from one restore pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RestoreReport {
    /// Entities with a current draft
    pub entities: usize,
    /// Controls written
    pub fields: usize,
}

/// Replay every current draft into `form`
pub fn restore_drafts<F: Form, S: Storage>(
    form: &mut F,
    store: &DraftStore<S>,
    snapshot: &HiddenFieldSnapshot,
) -> RestoreReport {
    let mut report = RestoreReport::default();
    for (entity_id, token) in snapshot.sequence_tokens() {
        log::debug!("Restoring data for entity {}", entity_id);
        let Some(draft) = store.read_current(entity_id, Some(token)) else {
            continue;
        };
        report.entities += 1;
        report.fields += apply_draft(form, entity_id, &draft);
    }
    if report.entities > 0 {
        log::info!(
            "Restored {} fields across {} entities from local drafts",
            report.fields,
            report.entities
        );
    }
    report
}

/// Write one entity's cached fields into the form. Returns controls written.
pub fn apply_draft<F: Form>(form: &mut F, entity_id: &str, draft: &Draft) -> usize {
    let mut written = 0;
    for control in form.controls() {
        if entity_id_of(&control.name) != entity_id {
            continue;
        }
        let Some(value) = draft.fields.get(field_id_of(&control.name)) else {
            continue;
        };
        if apply_value(form, &control.name, control.kind, &control.value, value) {
            written += 1;
        }
    }
    written
}

fn apply_value<F: Form>(
    form: &mut F,
    name: &str,
    kind: FieldKind,
    control_value: &str,
    value: &FieldValue,
) -> bool {
    match kind {
        FieldKind::Text | FieldKind::TextArea => {
            form.set_value(name, &value.as_text());
            true
        }
        // One control per option; only the matching option is touched
        FieldKind::Radio => control_value == value.as_text() && form.check_radio(name, control_value),
        FieldKind::Checkbox => {
            form.set_checked(name, value.is_truthy());
            true
        }
        FieldKind::SelectOne => form.select_option(name, &value.as_text()),
        _ => false,
    }
}

//! Field key codec
//!
//! Every answer input in the attempt form is named `<entity>_<field>`, where
//! the entity prefix is shared by all inputs of one question. The split is on
//! the FIRST underscore; anything after it (including further underscores)
//! belongs to the field id.

/// Suffix of the hidden input carrying an entity's sequence token
pub const SEQUENCE_CHECK_SUFFIX: &str = "_:sequencecheck";

/// Suffix of the per-question "flag for review" toggle
pub const FLAGGED_SUFFIX: &str = "_:flagged";

/// Navigation/bookkeeping inputs that never carry answer data
pub const BOOKKEEPING_FIELDS: [&str; 2] = ["thispage", "scrollpos"];

/// Entity prefix of a field name (empty when the name has no `_`)
pub fn entity_id_of(field_name: &str) -> &str {
    field_name
        .split_once('_')
        .map(|(entity, _)| entity)
        .unwrap_or("")
}

/// Field id of a field name (empty when the name has no `_`)
pub fn field_id_of(field_name: &str) -> &str {
    field_name
        .split_once('_')
        .map(|(_, field)| field)
        .unwrap_or("")
}

/// Rebuild a full field name from its parts
pub fn field_name(entity_id: &str, field_id: &str) -> String {
    format!("{entity_id}_{field_id}")
}

/// Name of the hidden sequence-token input for an entity
pub fn sequence_check_name(entity_id: &str) -> String {
    format!("{entity_id}{SEQUENCE_CHECK_SUFFIX}")
}

/// Whether a field name is an entity's sequence-token input
pub fn is_sequence_check(field_name: &str) -> bool {
    field_name.ends_with(SEQUENCE_CHECK_SUFFIX)
}

/// Whether changes to this field are UI bookkeeping rather than answers
pub fn is_bookkeeping(field_name: &str) -> bool {
    BOOKKEEPING_FIELDS.contains(&field_name) || field_name.ends_with(FLAGGED_SUFFIX)
}

/// Map a rich-text editor id onto the field id of its companion textarea.
///
/// Editors are registered as `<entity>_<field>_id`; the textarea that is
/// actually submitted drops the `_id`.
pub fn editor_field_id(field_id: &str) -> &str {
    field_id.strip_suffix("_id").unwrap_or(field_id)
}

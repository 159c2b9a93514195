//! Live form model
//!
//! The form is the source of truth for current answers. `Form` is the seam
//! between the autosave logic and whatever holds the controls: the DOM on web
//! (see `platform::web`), or `MemoryForm` for native use and tests.

use serde::{Deserialize, Serialize};

/// Control type, as reported by the DOM `type` property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    Text,
    TextArea,
    Hidden,
    Radio,
    Checkbox,
    SelectOne,
    /// Submits every selected option under the same name
    SelectMultiple,
    /// Rich-text editor instance (not a DOM control; reported by the editor host)
    Editor,
    /// submit/reset/button/file: never serialized
    Button,
    Other,
}

impl FieldKind {
    pub fn from_dom_type(ty: &str) -> Self {
        match ty.to_ascii_lowercase().as_str() {
            "text" => FieldKind::Text,
            "textarea" => FieldKind::TextArea,
            "hidden" => FieldKind::Hidden,
            "radio" => FieldKind::Radio,
            "checkbox" => FieldKind::Checkbox,
            "select-one" => FieldKind::SelectOne,
            "select-multiple" => FieldKind::SelectMultiple,
            "editor" => FieldKind::Editor,
            "submit" | "reset" | "button" | "image" | "file" => FieldKind::Button,
            _ => FieldKind::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::TextArea => "textarea",
            FieldKind::Hidden => "hidden",
            FieldKind::Radio => "radio",
            FieldKind::Checkbox => "checkbox",
            FieldKind::SelectOne => "select-one",
            FieldKind::SelectMultiple => "select-multiple",
            FieldKind::Editor => "editor",
            FieldKind::Button => "button",
            FieldKind::Other => "other",
        }
    }

    /// Radios and checkboxes only submit when checked
    pub fn is_checkable(&self) -> bool {
        matches!(self, FieldKind::Radio | FieldKind::Checkbox)
    }

    /// Controls whose value is typed in: the targets of `Form::set_value`
    pub fn is_text_like(&self) -> bool {
        matches!(self, FieldKind::Text | FieldKind::TextArea | FieldKind::Other)
    }
}

/// Snapshot of one form control
#[derive(Debug, Clone, PartialEq)]
pub struct Control {
    pub name: String,
    pub kind: FieldKind,
    /// Current value (for selects: the selected option's value)
    pub value: String,
    /// Checked state, meaningful for radios/checkboxes only
    pub checked: bool,
    /// Option values, selects only
    pub options: Vec<String>,
    /// Selected option values, multi-selects only
    pub selected: Vec<String>,
    /// Disabled controls never submit
    pub disabled: bool,
}

impl Control {
    pub fn new(name: &str, kind: FieldKind, value: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            value: value.to_string(),
            checked: false,
            options: Vec::new(),
            selected: Vec::new(),
            disabled: false,
        }
    }

    /// Whether this control contributes to a form submission
    pub fn is_successful(&self) -> bool {
        if self.name.is_empty() || self.disabled || self.kind == FieldKind::Button {
            return false;
        }
        !self.kind.is_checkable() || self.checked
    }

    /// Values this control submits (one per selected option for multi-selects)
    pub fn submitted_values(&self) -> Vec<&str> {
        if !self.is_successful() {
            return Vec::new();
        }
        match self.kind {
            FieldKind::SelectMultiple => self.selected.iter().map(String::as_str).collect(),
            _ => vec![self.value.as_str()],
        }
    }
}

/// Form-encoded body of a remote save: every successful control, in order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormPayload {
    pairs: Vec<(String, String)>,
}

impl FormPayload {
    pub fn from_controls<'a>(controls: impl IntoIterator<Item = &'a Control>) -> Self {
        let pairs = controls
            .into_iter()
            .flat_map(|c| {
                c.submitted_values()
                    .into_iter()
                    .map(|value| (c.name.clone(), value.to_string()))
            })
            .collect();
        Self { pairs }
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// First value submitted under `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Access to the live attempt form
pub trait Form {
    /// All controls in document order
    fn controls(&self) -> Vec<Control>;

    /// Live checked state of the checkbox `name`
    fn is_checked(&self, name: &str) -> bool;

    /// Set the value of the text-like control `name`, or of the hidden input
    /// `name` when there is no text-like one
    fn set_value(&mut self, name: &str, value: &str);

    /// Set checked on the checkbox `name`
    fn set_checked(&mut self, name: &str, checked: bool);

    /// Check the radio `name` whose value is `value`. Returns false if no such option.
    fn check_radio(&mut self, name: &str, value: &str) -> bool;

    /// Select `value` in the select `name`. Returns false (selection unchanged) if absent.
    fn select_option(&mut self, name: &str, value: &str) -> bool;

    /// Named hidden inputs as (name, value)
    fn hidden_fields(&self) -> Vec<(String, String)> {
        self.controls()
            .into_iter()
            .filter(|c| c.kind == FieldKind::Hidden && !c.name.is_empty())
            .map(|c| (c.name, c.value))
            .collect()
    }

    /// Serialize the live form the way a browser submission would
    fn payload(&self) -> FormPayload {
        FormPayload::from_controls(&self.controls())
    }
}

/// In-memory form with browser-like control semantics
#[derive(Debug, Clone, Default)]
pub struct MemoryForm {
    controls: Vec<Control>,
}

impl MemoryForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, control: Control) -> &mut Self {
        self.controls.push(control);
        self
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.push(Control::new(name, FieldKind::Text, value));
        self
    }

    pub fn textarea(mut self, name: &str, value: &str) -> Self {
        self.push(Control::new(name, FieldKind::TextArea, value));
        self
    }

    pub fn hidden(mut self, name: &str, value: &str) -> Self {
        self.push(Control::new(name, FieldKind::Hidden, value));
        self
    }

    pub fn radio(mut self, name: &str, value: &str, checked: bool) -> Self {
        let mut control = Control::new(name, FieldKind::Radio, value);
        control.checked = checked;
        self.push(control);
        self
    }

    pub fn checkbox(mut self, name: &str, value: &str, checked: bool) -> Self {
        let mut control = Control::new(name, FieldKind::Checkbox, value);
        control.checked = checked;
        self.push(control);
        self
    }

    pub fn select(mut self, name: &str, options: &[&str], selected: &str) -> Self {
        let mut control = Control::new(name, FieldKind::SelectOne, selected);
        control.options = options.iter().map(|o| o.to_string()).collect();
        self.push(control);
        self
    }

    pub fn select_multiple(mut self, name: &str, options: &[&str], selected: &[&str]) -> Self {
        let first = selected.first().copied().unwrap_or("");
        let mut control = Control::new(name, FieldKind::SelectMultiple, first);
        control.options = options.iter().map(|o| o.to_string()).collect();
        control.selected = selected.iter().map(|o| o.to_string()).collect();
        self.push(control);
        self
    }

    /// Disable the control added last
    pub fn disabled(mut self) -> Self {
        if let Some(control) = self.controls.last_mut() {
            control.disabled = true;
        }
        self
    }

    pub fn control(&self, name: &str) -> Option<&Control> {
        self.controls.iter().find(|c| c.name == name)
    }

    /// Value of `name`: the checked option for radios, the value otherwise
    pub fn value(&self, name: &str) -> Option<&str> {
        self.controls
            .iter()
            .filter(|c| c.name == name)
            .find(|c| c.kind != FieldKind::Radio || c.checked)
            .map(|c| c.value.as_str())
    }
}

impl Form for MemoryForm {
    fn controls(&self) -> Vec<Control> {
        self.controls.clone()
    }

    fn is_checked(&self, name: &str) -> bool {
        self.control(name).map(|c| c.checked).unwrap_or(false)
    }

    fn set_value(&mut self, name: &str, value: &str) {
        let target = self
            .controls
            .iter()
            .position(|c| c.name == name && c.kind.is_text_like())
            .or_else(|| {
                self.controls
                    .iter()
                    .position(|c| c.name == name && c.kind == FieldKind::Hidden)
            });
        if let Some(index) = target {
            self.controls[index].value = value.to_string();
        }
    }

    fn set_checked(&mut self, name: &str, checked: bool) {
        if let Some(control) = self
            .controls
            .iter_mut()
            .find(|c| c.name == name && c.kind == FieldKind::Checkbox)
        {
            control.checked = checked;
        }
    }

    fn check_radio(&mut self, name: &str, value: &str) -> bool {
        let exists = self
            .controls
            .iter()
            .any(|c| c.name == name && c.kind == FieldKind::Radio && c.value == value);
        if !exists {
            return false;
        }
        // Radio groups are exclusive
        for control in self
            .controls
            .iter_mut()
            .filter(|c| c.name == name && c.kind == FieldKind::Radio)
        {
            control.checked = control.value == value;
        }
        true
    }

    fn select_option(&mut self, name: &str, value: &str) -> bool {
        match self
            .controls
            .iter_mut()
            .find(|c| c.name == name && c.kind == FieldKind::SelectOne)
        {
            Some(control) if control.options.iter().any(|o| o == value) => {
                control.value = value.to_string();
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MemoryForm {
        MemoryForm::new()
            .hidden("q1_:sequencecheck", "3")
            .text("q1_answer", "hello")
            .radio("q2_answer", "0", false)
            .radio("q2_answer", "1", true)
            .checkbox("q3_choice0", "1", false)
            .select("q4_sub0", &["", "a", "b"], "a")
            .push_button()
            .hidden("", "anonymous")
    }

    impl MemoryForm {
        fn push_button(mut self) -> Self {
            self.push(Control::new("next", FieldKind::Button, "Next page"));
            self
        }
    }

    #[test]
    fn test_kind_from_dom_type() {
        assert_eq!(FieldKind::from_dom_type("select-one"), FieldKind::SelectOne);
        assert_eq!(FieldKind::from_dom_type("CHECKBOX"), FieldKind::Checkbox);
        assert_eq!(FieldKind::from_dom_type("submit"), FieldKind::Button);
        assert_eq!(FieldKind::from_dom_type("number"), FieldKind::Other);
    }

    #[test]
    fn test_payload_skips_unchecked_and_unnamed() {
        let payload = sample().payload();
        assert_eq!(payload.get("q1_:sequencecheck"), Some("3"));
        assert_eq!(payload.get("q1_answer"), Some("hello"));
        assert_eq!(payload.get("q2_answer"), Some("1"));
        assert_eq!(payload.get("q3_choice0"), None);
        assert_eq!(payload.get("q4_sub0"), Some("a"));
        assert_eq!(payload.get("next"), None);
        assert_eq!(payload.len(), 4);
    }

    #[test]
    fn test_hidden_fields_require_name() {
        let hidden = sample().hidden_fields();
        assert_eq!(hidden, vec![("q1_:sequencecheck".to_string(), "3".to_string())]);
    }

    #[test]
    fn test_radio_group_is_exclusive() {
        let mut form = sample();
        assert!(form.check_radio("q2_answer", "0"));
        assert_eq!(form.value("q2_answer"), Some("0"));
        assert!(!form.check_radio("q2_answer", "7"));
        assert_eq!(form.value("q2_answer"), Some("0"));
    }

    #[test]
    fn test_select_missing_option_leaves_selection() {
        let mut form = sample();
        assert!(!form.select_option("q4_sub0", "zzz"));
        assert_eq!(form.value("q4_sub0"), Some("a"));
        assert!(form.select_option("q4_sub0", "b"));
        assert_eq!(form.value("q4_sub0"), Some("b"));
    }

    #[test]
    fn test_disabled_controls_not_submitted() {
        let form = MemoryForm::new()
            .text("q1_answer", "kept")
            .text("q2_answer", "greyed out")
            .disabled()
            .checkbox("q3_choice0", "1", true)
            .disabled();
        let payload = form.payload();
        assert_eq!(payload.get("q1_answer"), Some("kept"));
        assert_eq!(payload.get("q2_answer"), None);
        assert_eq!(payload.get("q3_choice0"), None);
        assert_eq!(payload.len(), 1);
    }

    #[test]
    fn test_multi_select_submits_every_selection() {
        assert_eq!(FieldKind::from_dom_type("select-multiple"), FieldKind::SelectMultiple);
        let form = MemoryForm::new()
            .select_multiple("q5_answer", &["a", "b", "c"], &["a", "c"])
            .select_multiple("q6_answer", &["x", "y"], &[]);
        let payload = form.payload();
        assert_eq!(
            payload.pairs(),
            &[
                ("q5_answer".to_string(), "a".to_string()),
                ("q5_answer".to_string(), "c".to_string()),
            ]
        );
    }

    #[test]
    fn test_set_value_prefers_typed_control_over_hidden() {
        let mut form = MemoryForm::new()
            .hidden("q1_answer", "stale")
            .radio("q1_answer", "x", false)
            .textarea("q1_answer", "");
        form.set_value("q1_answer", "restored");
        let values: Vec<(FieldKind, &str)> = form
            .controls
            .iter()
            .map(|c| (c.kind, c.value.as_str()))
            .collect();
        assert_eq!(
            values,
            [
                (FieldKind::Hidden, "stale"),
                (FieldKind::Radio, "x"),
                (FieldKind::TextArea, "restored"),
            ]
        );

        // Hidden-only names can still be written
        let mut hidden_only = MemoryForm::new().hidden("q1_:sequencecheck", "1");
        hidden_only.set_value("q1_:sequencecheck", "2");
        assert_eq!(hidden_only.value("q1_:sequencecheck"), Some("2"));
    }
}

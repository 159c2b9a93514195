//! Autosave controller
//!
//! One `Autosave` per attempt form. It owns the draft store, the hidden-field
//! snapshot, the save scheduler and the editor watch, and is driven entirely
//! by callbacks from its host: field changes, editor changes, the hidden-field
//! poll tick, timer expiry and save completion. Every callback runs to
//! completion; nothing here blocks.

use crate::config::AutosaveConfig;
use crate::detector::ChangeEvent;
use crate::editor::EditorWatch;
use crate::form::{FieldKind, Form};
use crate::hidden::HiddenFieldSnapshot;
use crate::persistence::{normalize, DraftStore, Storage};
use crate::platform::{Clock, EditorHost, SaveId, SaveTimer, SaveTransport, TimerId};
use crate::restore::{restore_drafts, RestoreReport};
use crate::scheduler::{FireOutcome, SaveScheduler, SaveState};

pub struct Autosave<F, S, H>
where
    F: Form,
    S: Storage,
{
    config: AutosaveConfig,
    form: F,
    drafts: DraftStore<S>,
    host: H,
    snapshot: HiddenFieldSnapshot,
    scheduler: SaveScheduler,
    editors: EditorWatch,
}

impl<F, S, H> Autosave<F, S, H>
where
    F: Form,
    S: Storage,
    H: Clock + SaveTimer + SaveTransport + EditorHost,
{
    pub fn new(config: AutosaveConfig, form: F, storage: S, host: H) -> Self {
        let editors = EditorWatch::new(host.now_ms(), config.editor_detection_timeout_ms());
        Self {
            scheduler: SaveScheduler::new(config.delay_ms),
            config,
            form,
            drafts: DraftStore::new(storage),
            host,
            snapshot: HiddenFieldSnapshot::new(),
            editors,
        }
    }

    /// Snapshot the hidden fields, then replay any current drafts into the form
    pub fn start(&mut self) -> RestoreReport {
        self.snapshot.capture(self.form.hidden_fields());
        log::info!(
            "Autosave started ({} hidden fields, delay {} ms)",
            self.snapshot.len(),
            self.config.delay_ms
        );
        restore_drafts(&mut self.form, &self.drafts, &self.snapshot)
    }

    /// A form control changed. Returns false if the change was filtered out.
    pub fn value_changed(&mut self, event: &ChangeEvent) -> bool {
        if !event.is_interesting() {
            return false;
        }
        log::debug!(
            "Detected a value change in {} element {}",
            event.kind.as_str(),
            event.name
        );
        self.save_locally(event);
        self.scheduler.mark_dirty(&mut self.host);
        true
    }

    /// A rich-text editor reported new content
    pub fn editor_changed(&mut self, editor_id: &str, content: &str) -> bool {
        log::debug!("Detected a value change in editor {}", editor_id);
        self.value_changed(&ChangeEvent::editor(editor_id, content))
    }

    fn save_locally(&mut self, event: &ChangeEvent) {
        let entity_id = event.entity_id();
        let token = self.snapshot.token_for(entity_id);
        let checked = event.kind == FieldKind::Checkbox && self.form.is_checked(&event.name);
        let (field_id, value) = normalize(event.kind, event.field_id(), &event.value, checked);

        if let Err(e) = self.drafts.write(entity_id, token, field_id, value) {
            log::warn!("Could not save draft for {}: {}", event.name, e);
        }
    }

    /// Poll tick: feed hidden fields changed since the last tick through the
    /// normal change path. Returns how many changed.
    pub fn detect_hidden_field_changes(&mut self) -> usize {
        let changed = self.snapshot.detect_changes(self.form.hidden_fields());
        for name in &changed {
            let value = self.snapshot.get(name).unwrap_or_default().to_string();
            self.value_changed(&ChangeEvent::new(name, FieldKind::Hidden, &value));
        }
        changed.len()
    }

    /// The debounce timer `id` elapsed
    pub fn save_timer_fired(&mut self, id: TimerId) -> FireOutcome {
        let form = &self.form;
        self.scheduler.fire(id, &mut self.host, || form.payload())
    }

    /// Remote save `id` finished (either way)
    pub fn save_completed(&mut self, id: SaveId) -> bool {
        self.scheduler.completed(id, &mut self.host)
    }

    /// Stop autosaving for good (form submitted)
    pub fn stop(&mut self) {
        self.scheduler.stop(&mut self.host);
    }

    /// The editor library announced itself
    pub fn editor_library_ready(&mut self) -> bool {
        let now = self.host.now_ms();
        self.editors.library_ready(now)
    }

    /// Give up on the editor library if its deadline passed
    pub fn check_editor_deadline(&mut self) -> bool {
        let now = self.host.now_ms();
        self.editors.check_deadline(now)
    }

    /// The host looked for the editor library as often as configured
    pub fn editor_detection_finished(&mut self) -> bool {
        self.editors.stop_waiting()
    }

    /// A new editor instance was created. Returns true if the host should
    /// subscribe to its change notifications.
    pub fn register_editor(&mut self, editor_id: &str) -> bool {
        self.editors.register(editor_id)
    }

    pub fn config(&self) -> &AutosaveConfig {
        &self.config
    }

    pub fn save_state(&self) -> SaveState {
        self.scheduler.state()
    }

    pub fn is_dirty(&self) -> bool {
        self.scheduler.is_dirty()
    }

    pub fn editors(&self) -> &EditorWatch {
        &self.editors
    }

    pub fn snapshot(&self) -> &HiddenFieldSnapshot {
        &self.snapshot
    }

    pub fn drafts(&self) -> &DraftStore<S> {
        &self.drafts
    }

    pub fn form(&self) -> &F {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut F {
        &mut self.form
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }
}

//! Rich-text editor readiness
//!
//! The editor library may load after the form. The host looks for it a fixed
//! number of times; the watch resolves either `Ready` (found before the
//! deadline) or `GaveUp`, after which autosave runs on plain fields only. A
//! library that shows up after giving up is ignored.
//!
//! Once ready, every new editor instance is registered once and subscribed to
//! the notifications in `EDITOR_CHANGE_EVENTS`.

use std::collections::BTreeSet;

/// Editor notifications that mean "content may have changed", as
/// (event name, per-editor dispatcher property on older editor versions)
pub const EDITOR_CHANGE_EVENTS: [(&str, &str); 4] = [
    ("change", "onChange"),
    ("undo", "onUndo"),
    ("redo", "onRedo"),
    ("keydown", "onKeyDown"),
];

/// Library hook announcing new editor instances: (dispatcher property, event name)
pub const ADD_EDITOR_HOOK: (&str, &str) = ("onAddEditor", "AddEditor");

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EditorReadiness {
    Waiting { deadline_ms: f64 },
    Ready,
    GaveUp,
}

#[derive(Debug, Clone)]
pub struct EditorWatch {
    readiness: EditorReadiness,
    /// Editor instances already subscribed
    editors: BTreeSet<String>,
}

impl EditorWatch {
    pub fn new(now_ms: f64, timeout_ms: u64) -> Self {
        Self {
            readiness: EditorReadiness::Waiting {
                deadline_ms: now_ms + timeout_ms as f64,
            },
            editors: BTreeSet::new(),
        }
    }

    pub fn readiness(&self) -> EditorReadiness {
        self.readiness
    }

    pub fn is_ready(&self) -> bool {
        self.readiness == EditorReadiness::Ready
    }

    /// The library signalled readiness. Returns true if this resolved the watch.
    pub fn library_ready(&mut self, now_ms: f64) -> bool {
        match self.readiness {
            EditorReadiness::Waiting { deadline_ms } if now_ms <= deadline_ms => {
                log::info!("Found editor library");
                self.readiness = EditorReadiness::Ready;
                true
            }
            EditorReadiness::Waiting { .. } => {
                self.give_up();
                false
            }
            EditorReadiness::Ready | EditorReadiness::GaveUp => false,
        }
    }

    /// Resolve the watch as failed if the deadline has passed
    pub fn check_deadline(&mut self, now_ms: f64) -> bool {
        match self.readiness {
            EditorReadiness::Waiting { deadline_ms } if now_ms > deadline_ms => {
                self.give_up();
                true
            }
            _ => false,
        }
    }

    /// The host ran out of tries. Returns true if this resolved the watch.
    pub fn stop_waiting(&mut self) -> bool {
        match self.readiness {
            EditorReadiness::Waiting { .. } => {
                self.give_up();
                true
            }
            EditorReadiness::Ready | EditorReadiness::GaveUp => false,
        }
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self.readiness, EditorReadiness::Waiting { .. })
    }

    fn give_up(&mut self) {
        log::info!("Gave up looking for editor library");
        self.readiness = EditorReadiness::GaveUp;
    }

    /// Record a newly created editor instance. Returns true if it should be
    /// subscribed (library ready and not seen before).
    pub fn register(&mut self, editor_id: &str) -> bool {
        if !self.is_ready() {
            return false;
        }
        let added = self.editors.insert(editor_id.to_string());
        if added {
            log::info!("Found editor {}", editor_id);
        }
        added
    }

    pub fn editors(&self) -> impl Iterator<Item = &str> {
        self.editors.iter().map(String::as_str)
    }
}

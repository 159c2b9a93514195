//! Quiz Autosave - local drafts and debounced saving for quiz attempts
//!
//! Core modules:
//! - `field`: Field-name codec (`<entity>_<field>`)
//! - `persistence`: Per-entity drafts with sequence-token invalidation
//! - `form`: Live form model
//! - `detector`: Change events and the noise filter
//! - `hidden`: Hidden-field snapshot for out-of-band changes
//! - `scheduler`: Debounced, single-flight save state machine
//! - `editor`: Rich-text editor readiness
//! - `restore`: Replay of drafts after reload
//! - `autosave`: The controller tying it together
//! - `platform`: Host abstraction (browser implementation on wasm32)

pub mod autosave;
pub mod config;
pub mod detector;
pub mod editor;
pub mod field;
pub mod form;
pub mod hidden;
pub mod persistence;
pub mod platform;
pub mod restore;
pub mod scheduler;

pub use autosave::Autosave;
pub use config::{AutosaveConfig, ConfigError};
pub use detector::ChangeEvent;
pub use form::{FieldKind, Form, FormPayload, MemoryForm};
pub use persistence::{Draft, DraftError, DraftStore, FieldValue, MemoryStorage, Storage};
pub use scheduler::{FireOutcome, SaveScheduler, SaveState};

//! Platform abstraction layer
//!
//! Collaborators the autosave controller is constructed with:
//! - Time (`Clock`) and the attempt's end time
//! - The debounce timer (`SaveTimer`)
//! - The remote save endpoint (`SaveTransport`)
//! - The rich-text editor library (`EditorHost`)
//!
//! Browser implementations live in `web` (wasm32 only).

#[cfg(target_arch = "wasm32")]
pub mod web;

use std::cell::RefCell;

use thiserror::Error;

use crate::form::FormPayload;

/// Handle of an armed debounce timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub u32);

/// Handle of an in-flight remote save
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SaveId(pub u32);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("could not open save request: {0}")]
    Open(String),
    #[error("could not send save request: {0}")]
    Send(String),
}

pub trait Clock {
    /// Wall-clock time in epoch milliseconds
    fn now_ms(&self) -> f64;

    /// End of the attempt in epoch milliseconds, if the attempt is timed
    fn attempt_end_ms(&self) -> Option<f64>;
}

/// One-shot timers; firing is reported back via `Autosave::save_timer_fired`
pub trait SaveTimer {
    fn arm(&mut self, delay_ms: u64) -> TimerId;
    fn cancel(&mut self, id: TimerId);
}

/// Fire-and-forget form POST; completion is reported via `Autosave::save_completed`
pub trait SaveTransport {
    fn submit(&mut self, payload: &FormPayload) -> Result<SaveId, TransportError>;
    fn abort(&mut self, id: SaveId);
}

/// The rich-text editor library, once it has been detected
pub trait EditorHost {
    /// Copy every editor's pending content into its underlying textarea
    fn flush_editors(&mut self);
}

/// Host with no editor library
impl EditorHost for () {
    fn flush_editors(&mut self) {}
}

/// Run `f` on a shared instance unless it is already borrowed.
///
/// Browser callbacks and page calls can re-enter while the instance is busy
/// (an editor flush running page hooks, for example); those are dropped.
#[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
pub(crate) fn with_unborrowed<T, R>(cell: &RefCell<T>, f: impl FnOnce(&mut T) -> R) -> Option<R> {
    match cell.try_borrow_mut() {
        Ok(mut inner) => Some(f(&mut *inner)),
        Err(_) => {
            log::warn!("Autosave busy, dropping callback");
            None
        }
    }
}

/// Recording doubles for controller tests
#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    #[derive(Debug, Default)]
    pub struct FakeHost {
        pub now: f64,
        pub end_time: Option<f64>,
        next_id: u32,
        /// Timers armed and not cancelled, with their delay
        pub armed: Vec<(TimerId, u64)>,
        pub arm_count: usize,
        pub cancelled: Vec<TimerId>,
        pub submitted: Vec<(SaveId, FormPayload)>,
        pub aborted: Vec<SaveId>,
        pub flushes: usize,
        pub fail_submit: bool,
    }

    impl FakeHost {
        pub fn new(now: f64) -> Self {
            Self {
                now,
                ..Self::default()
            }
        }

        pub fn pending_timer(&self) -> Option<TimerId> {
            self.armed.last().map(|(id, _)| *id)
        }

        /// Simulate the pending timer elapsing: it is no longer armed
        pub fn take_timer(&mut self) -> Option<TimerId> {
            self.armed.pop().map(|(id, _)| id)
        }

        pub fn last_save(&self) -> Option<SaveId> {
            self.submitted.last().map(|(id, _)| *id)
        }

        fn next(&mut self) -> u32 {
            self.next_id += 1;
            self.next_id
        }
    }

    impl Clock for FakeHost {
        fn now_ms(&self) -> f64 {
            self.now
        }

        fn attempt_end_ms(&self) -> Option<f64> {
            self.end_time
        }
    }

    impl SaveTimer for FakeHost {
        fn arm(&mut self, delay_ms: u64) -> TimerId {
            let id = TimerId(self.next());
            self.armed.push((id, delay_ms));
            self.arm_count += 1;
            id
        }

        fn cancel(&mut self, id: TimerId) {
            self.armed.retain(|(t, _)| *t != id);
            self.cancelled.push(id);
        }
    }

    impl SaveTransport for FakeHost {
        fn submit(&mut self, payload: &FormPayload) -> Result<SaveId, TransportError> {
            if self.fail_submit {
                return Err(TransportError::Send("offline".to_string()));
            }
            let id = SaveId(self.next());
            self.submitted.push((id, payload.clone()));
            Ok(id)
        }

        fn abort(&mut self, id: SaveId) {
            self.aborted.push(id);
        }
    }

    impl EditorHost for FakeHost {
        fn flush_editors(&mut self) {
            self.flushes += 1;
        }
    }
}

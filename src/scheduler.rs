//! Debounced, single-flight save scheduling
//!
//! ```text
//!   Idle ──dirty──▶ Countdown ──timer──▶ Saving ──complete──▶ Idle
//!                      │  ▲                 │                   │
//!                      │  └──────dirty during save (re-arm)─────┘
//!                      └──cutoff──▶ Stopped ◀──stop── (any state)
//! ```
//!
//! A dirty signal during Countdown does not reset the timer: the save happens
//! `delay` after the FIRST unsaved change. Stopped is terminal.

use crate::form::FormPayload;
use crate::platform::{Clock, EditorHost, SaveId, SaveTimer, SaveTransport, TimerId};

/// Default debounce delay (2 minutes)
pub const DEFAULT_DELAY_MS: u64 = 120_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveState {
    /// Nothing pending
    Idle,
    /// Debounce timer armed
    Countdown(TimerId),
    /// Remote save in flight
    Saving(SaveId),
    /// Autosave permanently off (form submitted or attempt nearly over)
    Stopped,
}

/// What happened when the debounce timer fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    /// Not the active timer
    Ignored,
    /// A remote save was issued
    Saving(SaveId),
    /// The transport refused the request; treated as an immediate completion
    SendFailed,
    /// Too close to the end of the attempt; autosave stopped without saving
    CutOff,
}

#[derive(Debug, Clone)]
pub struct SaveScheduler {
    state: SaveState,
    /// Modified since the last save started
    dirty: bool,
    delay_ms: u64,
}

impl Default for SaveScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_DELAY_MS)
    }
}

impl SaveScheduler {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            state: SaveState::Idle,
            dirty: false,
            delay_ms,
        }
    }

    pub fn state(&self) -> SaveState {
        self.state
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_stopped(&self) -> bool {
        self.state == SaveState::Stopped
    }

    pub fn delay_ms(&self) -> u64 {
        self.delay_ms
    }

    /// Record a change; arms the timer only from Idle.
    /// Returns true if a timer was armed.
    pub fn mark_dirty<T: SaveTimer>(&mut self, timer: &mut T) -> bool {
        self.dirty = true;
        if self.state != SaveState::Idle {
            return false;
        }
        self.arm(timer);
        true
    }

    fn arm<T: SaveTimer>(&mut self, timer: &mut T) {
        let id = timer.arm(self.delay_ms);
        log::debug!("Save timer armed for {} ms", self.delay_ms);
        self.state = SaveState::Countdown(id);
    }

    /// Whether a save started now could still be running when the attempt ends
    pub fn is_time_nearly_over(&self, now_ms: f64, end_ms: Option<f64>) -> bool {
        match end_ms {
            Some(end) if end > 0.0 => now_ms + 2.0 * self.delay_ms as f64 > end,
            _ => false,
        }
    }

    /// Handle the debounce timer `id` elapsing.
    ///
    /// `payload` is read after editors have been flushed into the form.
    pub fn fire<H, P>(&mut self, id: TimerId, host: &mut H, payload: P) -> FireOutcome
    where
        H: Clock + SaveTimer + SaveTransport + EditorHost,
        P: FnOnce() -> FormPayload,
    {
        if self.state != SaveState::Countdown(id) {
            log::debug!("Ignoring stale save timer {:?}", id);
            return FireOutcome::Ignored;
        }
        self.state = SaveState::Idle;
        self.dirty = false;

        if self.is_time_nearly_over(host.now_ms(), host.attempt_end_ms()) {
            log::info!("No more saving, time is nearly over");
            self.stop(host);
            return FireOutcome::CutOff;
        }

        log::info!("Doing a save");
        host.flush_editors();
        match host.submit(&payload()) {
            Ok(save) => {
                self.state = SaveState::Saving(save);
                FireOutcome::Saving(save)
            }
            Err(e) => {
                log::warn!("Autosave request failed: {}", e);
                self.rearm_if_dirty(host);
                FireOutcome::SendFailed
            }
        }
    }

    /// Handle completion (success or failure alike) of save `id`.
    /// Returns true if a new countdown was armed.
    pub fn completed<T: SaveTimer>(&mut self, id: SaveId, timer: &mut T) -> bool {
        if self.state != SaveState::Saving(id) {
            log::debug!("Ignoring completion of stale save {:?}", id);
            return false;
        }
        log::info!("Save completed");
        self.state = SaveState::Idle;
        self.rearm_if_dirty(timer)
    }

    fn rearm_if_dirty<T: SaveTimer>(&mut self, timer: &mut T) -> bool {
        if !self.dirty || self.state != SaveState::Idle {
            return false;
        }
        log::debug!("Dirty after save");
        self.arm(timer);
        true
    }

    /// Stop autosaving for good: cancel the timer, abort any in-flight save
    pub fn stop<H: SaveTimer + SaveTransport>(&mut self, host: &mut H) {
        match self.state {
            SaveState::Countdown(timer) => host.cancel(timer),
            SaveState::Saving(save) => host.abort(save),
            SaveState::Idle | SaveState::Stopped => {}
        }
        if self.state != SaveState::Stopped {
            log::info!("Autosave stopped");
        }
        self.state = SaveState::Stopped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::testing::FakeHost;

    const NOW: f64 = 1_700_000_000_000.0;

    fn payload() -> FormPayload {
        FormPayload::default()
    }

    #[test]
    fn test_debounce_arms_once_from_first_signal() {
        let mut host = FakeHost::new(NOW);
        let mut scheduler = SaveScheduler::new(120_000);

        assert!(scheduler.mark_dirty(&mut host));
        assert!(!scheduler.mark_dirty(&mut host));
        assert!(!scheduler.mark_dirty(&mut host));

        assert_eq!(host.arm_count, 1);
        assert_eq!(host.armed[0].1, 120_000);
        assert!(host.cancelled.is_empty());
        assert_eq!(scheduler.state(), SaveState::Countdown(host.armed[0].0));
    }

    #[test]
    fn test_fire_issues_one_save_and_clears_dirty() {
        let mut host = FakeHost::new(NOW);
        let mut scheduler = SaveScheduler::new(1_000);
        scheduler.mark_dirty(&mut host);

        let timer = host.take_timer().unwrap();
        let outcome = scheduler.fire(timer, &mut host, payload);

        let save = host.last_save().unwrap();
        assert_eq!(outcome, FireOutcome::Saving(save));
        assert_eq!(scheduler.state(), SaveState::Saving(save));
        assert!(!scheduler.is_dirty());
        assert_eq!(host.flushes, 1);
        assert_eq!(host.submitted.len(), 1);
    }

    #[test]
    fn test_dirty_while_saving_rearms_once_after_completion() {
        let mut host = FakeHost::new(NOW);
        let mut scheduler = SaveScheduler::new(1_000);
        scheduler.mark_dirty(&mut host);
        let timer = host.take_timer().unwrap();
        scheduler.fire(timer, &mut host, payload);
        let save = host.last_save().unwrap();

        assert!(!scheduler.mark_dirty(&mut host));
        assert!(!scheduler.mark_dirty(&mut host));
        assert_eq!(host.arm_count, 1);

        assert!(scheduler.completed(save, &mut host));
        assert_eq!(host.arm_count, 2);
        assert!(matches!(scheduler.state(), SaveState::Countdown(_)));
    }

    #[test]
    fn test_clean_completion_goes_idle() {
        let mut host = FakeHost::new(NOW);
        let mut scheduler = SaveScheduler::new(1_000);
        scheduler.mark_dirty(&mut host);
        let timer = host.take_timer().unwrap();
        scheduler.fire(timer, &mut host, payload);

        assert!(!scheduler.completed(host.last_save().unwrap(), &mut host));
        assert_eq!(scheduler.state(), SaveState::Idle);
        assert_eq!(host.arm_count, 1);
    }

    #[test]
    fn test_cutoff_stops_without_request() {
        let mut host = FakeHost::new(NOW);
        host.end_time = Some(NOW + 100_000.0);
        let mut scheduler = SaveScheduler::new(120_000);
        scheduler.mark_dirty(&mut host);

        let timer = host.take_timer().unwrap();
        assert_eq!(scheduler.fire(timer, &mut host, payload), FireOutcome::CutOff);
        assert!(scheduler.is_stopped());
        assert!(host.submitted.is_empty());
        assert_eq!(host.flushes, 0);

        // Terminal: later changes never arm
        assert!(!scheduler.mark_dirty(&mut host));
        assert_eq!(host.arm_count, 1);
    }

    #[test]
    fn test_cutoff_disabled_without_end_time() {
        let scheduler = SaveScheduler::new(120_000);
        assert!(!scheduler.is_time_nearly_over(NOW, None));
        assert!(!scheduler.is_time_nearly_over(NOW, Some(0.0)));
        assert!(!scheduler.is_time_nearly_over(NOW, Some(NOW + 240_001.0)));
        assert!(scheduler.is_time_nearly_over(NOW, Some(NOW + 239_999.0)));
    }

    #[test]
    fn test_stop_cancels_countdown() {
        let mut host = FakeHost::new(NOW);
        let mut scheduler = SaveScheduler::new(1_000);
        scheduler.mark_dirty(&mut host);
        let timer = host.pending_timer().unwrap();

        scheduler.stop(&mut host);
        assert_eq!(host.cancelled, vec![timer]);
        assert!(scheduler.is_stopped());

        // A timer callback that slipped through is ignored
        assert_eq!(scheduler.fire(timer, &mut host, payload), FireOutcome::Ignored);
        assert!(host.submitted.is_empty());
    }

    #[test]
    fn test_stop_aborts_in_flight_save() {
        let mut host = FakeHost::new(NOW);
        let mut scheduler = SaveScheduler::new(1_000);
        scheduler.mark_dirty(&mut host);
        let timer = host.take_timer().unwrap();
        scheduler.fire(timer, &mut host, payload);
        let save = host.last_save().unwrap();
        scheduler.mark_dirty(&mut host);

        scheduler.stop(&mut host);
        assert_eq!(host.aborted, vec![save]);

        // Completion after abort does not re-arm
        assert!(!scheduler.completed(save, &mut host));
        assert!(scheduler.is_stopped());
        assert_eq!(host.arm_count, 1);
    }

    #[test]
    fn test_send_failure_returns_to_idle() {
        let mut host = FakeHost::new(NOW);
        host.fail_submit = true;
        let mut scheduler = SaveScheduler::new(1_000);
        scheduler.mark_dirty(&mut host);
        let timer = host.take_timer().unwrap();

        assert_eq!(scheduler.fire(timer, &mut host, payload), FireOutcome::SendFailed);
        assert_eq!(scheduler.state(), SaveState::Idle);

        // Next change starts a fresh countdown
        assert!(scheduler.mark_dirty(&mut host));
    }
}

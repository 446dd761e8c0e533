//! Frame admission control.
//!
//! A cooperative rate limiter in front of the analysis path: at most one frame
//! in flight, and at least `min_interval_ms` between admissions. It only
//! advises the caller; nothing is queued or dropped here.
//!
//! Prefer `try_admit()`, which checks and begins under one lock and returns an
//! `AdmissionGuard` that ends processing when dropped, including on error and
//! task cancellation. The split `should_process` / `begin_processing` /
//! `end_processing` calls remain for callers that manage the flag by hand.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::clock::{MonotonicClock, SystemClock};

/// Reference minimum interval between admitted frames (~10 fps).
pub const DEFAULT_MIN_INTERVAL_MS: u64 = 100;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct ThrottleState {
    /// `None` until the first admission and after `reset()`.
    last_admitted_ms: Option<u64>,
    in_flight: bool,
    /// Bumped by `reset()`; guards from an earlier generation are inert.
    generation: u64,
}

pub struct AdmissionController {
    min_interval_ms: u64,
    clock: Arc<dyn MonotonicClock>,
    state: Mutex<ThrottleState>,
}

impl AdmissionController {
    pub fn new(min_interval_ms: u64, clock: Arc<dyn MonotonicClock>) -> Self {
        Self {
            min_interval_ms,
            clock,
            state: Mutex::new(ThrottleState::default()),
        }
    }

    pub fn with_system_clock(min_interval_ms: u64) -> Self {
        Self::new(min_interval_ms, Arc::new(SystemClock::new()))
    }

    pub fn min_interval_ms(&self) -> u64 {
        self.min_interval_ms
    }

    /// Pure query: may a new frame be processed now?
    pub fn should_process(&self) -> bool {
        let state = self.lock();
        self.admissible(&state)
    }

    /// Mark a frame in flight and stamp the admission time.
    ///
    /// Call directly after `should_process()` returned true, before any await.
    pub fn begin_processing(&self) {
        let mut state = self.lock();
        state.in_flight = true;
        state.last_admitted_ms = Some(self.clock.now_ms());
    }

    /// Clear the in-flight flag. Must run on every exit path of admitted work.
    pub fn end_processing(&self) {
        self.lock().in_flight = false;
    }

    /// Forget all throttling state, e.g. on a mode switch.
    ///
    /// Guards issued before the reset no longer touch the in-flight flag.
    pub fn reset(&self) {
        let mut state = self.lock();
        let generation = state.generation.wrapping_add(1);
        *state = ThrottleState {
            generation,
            ..ThrottleState::default()
        };
    }

    pub fn is_in_flight(&self) -> bool {
        self.lock().in_flight
    }

    /// Atomic check-and-begin. The returned guard ends processing on drop.
    pub fn try_admit(self: &Arc<Self>) -> Option<AdmissionGuard> {
        let mut state = self.lock();
        if !self.admissible(&state) {
            log::debug!(
                "admission denied (in_flight={}, last={:?})",
                state.in_flight,
                state.last_admitted_ms
            );
            return None;
        }
        state.in_flight = true;
        state.last_admitted_ms = Some(self.clock.now_ms());
        Some(AdmissionGuard {
            controller: Arc::clone(self),
            generation: state.generation,
        })
    }

    fn release(&self, generation: u64) {
        let mut state = self.lock();
        if state.generation == generation {
            state.in_flight = false;
        } else {
            log::debug!("ignoring release from admission generation {}", generation);
        }
    }

    fn admissible(&self, state: &ThrottleState) -> bool {
        if state.in_flight {
            return false;
        }
        match state.last_admitted_ms {
            None => true,
            Some(last) => self.clock.now_ms().saturating_sub(last) >= self.min_interval_ms,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ThrottleState> {
        // The state is two plain fields; a panic elsewhere cannot leave it torn.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Holds one admission. Dropping it clears the in-flight flag.
#[must_use = "dropping the guard immediately ends processing"]
pub struct AdmissionGuard {
    controller: Arc<AdmissionController>,
    generation: u64,
}

impl AdmissionGuard {
    /// End processing now. Equivalent to dropping the guard.
    pub fn finish(self) {}
}

impl Drop for AdmissionGuard {
    fn drop(&mut self) {
        self.controller.release(self.generation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn controller(clock: &ManualClock) -> Arc<AdmissionController> {
        Arc::new(AdmissionController::new(
            DEFAULT_MIN_INTERVAL_MS,
            Arc::new(clock.clone()),
        ))
    }

    #[test]
    fn first_frame_is_admitted_even_at_time_zero() {
        let clock = ManualClock::new(0);
        let admission = controller(&clock);
        assert!(admission.should_process());
    }

    #[test]
    fn requires_both_interval_and_end_processing() {
        let clock = ManualClock::new(1_000);
        let admission = controller(&clock);

        assert!(admission.should_process());
        admission.begin_processing();
        assert!(!admission.should_process());

        // Interval elapsed but still in flight.
        clock.advance(150);
        assert!(!admission.should_process());

        admission.end_processing();
        assert!(admission.should_process());
    }

    #[test]
    fn end_processing_before_interval_still_throttles() {
        let clock = ManualClock::new(1_000);
        let admission = controller(&clock);

        admission.begin_processing();
        admission.end_processing();
        clock.advance(99);
        assert!(!admission.should_process());
        clock.advance(1);
        assert!(admission.should_process());
    }

    #[test]
    fn should_process_has_no_side_effects() {
        let clock = ManualClock::new(500);
        let admission = controller(&clock);
        assert!(admission.should_process());
        assert!(admission.should_process());
        assert!(!admission.is_in_flight());
    }

    #[test]
    fn reset_clears_flight_and_throttle() {
        let clock = ManualClock::new(1_000);
        let admission = controller(&clock);
        admission.begin_processing();
        admission.reset();
        assert!(!admission.is_in_flight());
        assert!(admission.should_process());
    }

    #[test]
    fn guard_from_before_reset_does_not_release_new_admission() {
        let clock = ManualClock::new(1_000);
        let admission = controller(&clock);

        let stale = admission.try_admit().expect("first admission");
        admission.reset();
        let current = admission.try_admit().expect("admission after reset");

        drop(stale);
        assert!(admission.is_in_flight());
        assert!(admission.try_admit().is_none());

        drop(current);
        assert!(!admission.is_in_flight());
    }

    #[test]
    fn guard_releases_on_drop() {
        let clock = ManualClock::new(1_000);
        let admission = controller(&clock);

        let guard = admission.try_admit().expect("first admission");
        assert!(admission.is_in_flight());
        assert!(admission.try_admit().is_none());
        drop(guard);
        assert!(!admission.is_in_flight());

        // Throttled until the interval passes.
        assert!(admission.try_admit().is_none());
        clock.advance(100);
        admission.try_admit().expect("second admission").finish();
        assert!(!admission.is_in_flight());
    }

    #[test]
    fn guard_releases_on_panic() {
        let clock = ManualClock::new(1_000);
        let admission = controller(&clock);
        let inner = Arc::clone(&admission);

        let result = std::thread::spawn(move || {
            let _guard = inner.try_admit().expect("admission");
            panic!("analysis blew up");
        })
        .join();

        assert!(result.is_err());
        assert!(!admission.is_in_flight());
    }
}

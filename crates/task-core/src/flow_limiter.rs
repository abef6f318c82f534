//! Admission control for live input
//!
//! The flow limiter bounds how many ticks may be inside the graph at once.
//! It is decided on the submitting thread, before a tick is queued, and
//! released on the executor thread when the limited node reports it is done
//! with the tick (its output on the `FINISHED` back edge, or the end of the
//! tick if that output never arrives).

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowLimiterOptions {
    /// Maximum ticks in flight; new input is dropped beyond this
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

fn default_max_in_flight() -> usize {
    1
}

impl Default for FlowLimiterOptions {
    fn default() -> Self {
        Self {
            max_in_flight: default_max_in_flight(),
        }
    }
}

#[derive(Debug)]
pub struct FlowLimiter {
    max_in_flight: usize,
    in_flight: AtomicUsize,
}

impl FlowLimiter {
    pub fn new(options: FlowLimiterOptions) -> Self {
        Self {
            max_in_flight: options.max_in_flight.max(1),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Claim a slot; `false` means the tick must be dropped
    pub fn try_admit(&self) -> bool {
        let admitted = self
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.max_in_flight).then_some(n + 1)
            })
            .is_ok();
        if !admitted {
            debug!("Flow limiter full ({} in flight)", self.max_in_flight);
        }
        admitted
    }

    /// Return a slot claimed by `try_admit`
    pub fn release(&self) {
        let _ = self
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_slot() {
        let limiter = FlowLimiter::new(FlowLimiterOptions::default());
        assert!(limiter.try_admit());
        assert!(!limiter.try_admit());
        assert_eq!(limiter.in_flight(), 1);

        limiter.release();
        assert_eq!(limiter.in_flight(), 0);
        assert!(limiter.try_admit());
    }

    #[test]
    fn test_release_never_underflows() {
        let limiter = FlowLimiter::new(FlowLimiterOptions { max_in_flight: 2 });
        limiter.release();
        assert_eq!(limiter.in_flight(), 0);
        assert!(limiter.try_admit());
        assert!(limiter.try_admit());
        assert!(!limiter.try_admit());
    }

    #[test]
    fn test_options_default_from_empty_json() {
        let options: FlowLimiterOptions = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(options.max_in_flight, 1);
    }
}

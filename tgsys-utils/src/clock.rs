//! Process-local monotonic clock.
//!
//! Timers and timeouts in tgsys are expressed as monotonic seconds since
//! an arbitrary process-local origin; wall-clock time never reaches the
//! scheduling layer.

// Layer 1: Standard library
use std::sync::OnceLock;
use std::time::{Duration, Instant};

static ORIGIN: OnceLock<Instant> = OnceLock::new();

fn origin() -> Instant {
    *ORIGIN.get_or_init(Instant::now)
}

/// Monotonic seconds since the process-local origin.
pub fn now_secs() -> f64 {
    origin().elapsed().as_secs_f64()
}

/// Convert a relative timeout in seconds to an absolute `Instant`.
///
/// Negative and non-finite values clamp to "now".
pub fn deadline_in(secs: f64) -> Instant {
    Instant::now() + duration_from_secs(secs)
}

/// Convert user-supplied seconds to a `Duration`, clamping negative and
/// non-finite values to zero.
pub fn duration_from_secs(secs: f64) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::from_secs_f64(secs)
    } else {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic() {
        let a = now_secs();
        let b = now_secs();
        assert!(b >= a);
    }

    #[test]
    fn test_duration_clamping() {
        assert_eq!(duration_from_secs(-1.0), Duration::ZERO);
        assert_eq!(duration_from_secs(f64::NAN), Duration::ZERO);
        assert_eq!(duration_from_secs(f64::INFINITY), Duration::ZERO);
        assert_eq!(duration_from_secs(0.5), Duration::from_millis(500));
    }

    #[test]
    fn test_deadline_in_is_future() {
        let d = deadline_in(0.05);
        assert!(d >= Instant::now() - Duration::from_millis(1));
    }
}

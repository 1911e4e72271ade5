use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastDecision {
    Allowed,
    Denied { retry_after: Duration },
}

/// Sliding-window limiter for the privileged broadcast command.
///
/// The window map is owned here, not stashed in a global, so it can be
/// swapped for a persistent store later and exercised directly in tests.
/// State is in-memory only: a process restart resets every window.
///
/// Callers must confirm the principal is on the broadcast allow-list BEFORE
/// calling in; unauthorized principals must never consume budget or learn
/// anything about window timing.
pub struct BroadcastLimiter {
    window: Duration,
    max_uses: usize,
    used: Mutex<HashMap<String, Vec<SystemTime>>>,
}

impl BroadcastLimiter {
    pub fn new(window: Duration, max_uses: usize) -> Self {
        BroadcastLimiter {
            window,
            max_uses,
            used: Mutex::new(HashMap::new()),
        }
    }

    pub fn check_and_record(&self, principal: &str) -> BroadcastDecision {
        self.check_and_record_at(principal, SystemTime::now())
    }

    /// Purge-then-count-then-record as one critical section, so two
    /// near-simultaneous uses by the same principal cannot both pass on the
    /// same remaining budget.
    pub fn check_and_record_at(&self, principal: &str, now: SystemTime) -> BroadcastDecision {
        let mut used = self.used.lock().unwrap();
        let timestamps = used.entry(principal.to_string()).or_default();
        timestamps.retain(|t| match now.duration_since(*t) {
            Ok(age) => age < self.window,
            // Clock skew produced a future timestamp; keep it, it is
            // certainly inside the window.
            Err(_) => true,
        });

        if timestamps.len() < self.max_uses {
            timestamps.push(now);
            log::debug!(
                "Broadcast use recorded for {principal} ({}/{} in window)",
                timestamps.len(),
                self.max_uses
            );
            return BroadcastDecision::Allowed;
        }

        let oldest = timestamps.iter().min().copied().unwrap_or(now);
        let age = now.duration_since(oldest).unwrap_or(Duration::ZERO);
        let retry_after = self.window.saturating_sub(age);
        log::info!("Broadcast denied for {principal}; retry in {retry_after:?}");
        BroadcastDecision::Denied { retry_after }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn three_uses_then_denied_within_window() {
        let limiter = BroadcastLimiter::new(Duration::from_secs(24 * 60 * 60), 3);
        assert_eq!(limiter.check_and_record_at("p", at(1_000)), BroadcastDecision::Allowed);
        assert_eq!(limiter.check_and_record_at("p", at(2_000)), BroadcastDecision::Allowed);
        assert_eq!(limiter.check_and_record_at("p", at(3_000)), BroadcastDecision::Allowed);
        match limiter.check_and_record_at("p", at(4_000)) {
            BroadcastDecision::Denied { retry_after } => {
                // Oldest use was 3000s ago; window is 86400s.
                assert_eq!(retry_after, Duration::from_secs(86_400 - 3_000));
            }
            other => panic!("expected Denied, got {other:?}"),
        }
    }

    #[test]
    fn allowed_again_after_oldest_use_ages_out() {
        let limiter = BroadcastLimiter::new(Duration::from_secs(100), 3);
        for t in [0, 10, 20] {
            assert_eq!(limiter.check_and_record_at("p", at(t)), BroadcastDecision::Allowed);
        }
        assert!(matches!(
            limiter.check_and_record_at("p", at(50)),
            BroadcastDecision::Denied { .. }
        ));
        // t=0 use has aged out at t=101.
        assert_eq!(limiter.check_and_record_at("p", at(101)), BroadcastDecision::Allowed);
    }

    #[test]
    fn principals_have_independent_windows() {
        let limiter = BroadcastLimiter::new(Duration::from_secs(100), 1);
        assert_eq!(limiter.check_and_record_at("a", at(0)), BroadcastDecision::Allowed);
        assert_eq!(limiter.check_and_record_at("b", at(1)), BroadcastDecision::Allowed);
        assert!(matches!(
            limiter.check_and_record_at("a", at(2)),
            BroadcastDecision::Denied { .. }
        ));
    }
}

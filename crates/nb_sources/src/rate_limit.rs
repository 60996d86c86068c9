use chrono::{DateTime, Utc};
use nb_core::Clock;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// Per-source minimum-interval gate.
///
/// Each source tag keeps the instant its latest request was (or will be)
/// issued. Gating one tag never delays another.
pub struct RateGate {
    clock: Arc<dyn Clock>,
    slots: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl RateGate {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Claims the next request slot for `tag` and returns how long the caller
    /// must wait before using it. The slot is claimed immediately, so a second
    /// caller queues behind the first instead of racing it.
    pub fn reserve(&self, tag: &str, min_interval: Duration) -> Duration {
        let now = self.clock.now();
        let interval = chrono::Duration::from_std(min_interval).unwrap_or_else(|_| chrono::Duration::zero());
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());

        let issue_at = match slots.get(tag) {
            Some(previous) if *previous + interval > now => *previous + interval,
            _ => now,
        };
        slots.insert(tag.to_string(), issue_at);
        (issue_at - now).to_std().unwrap_or(Duration::ZERO)
    }

    /// Waits out the remainder of `tag`'s interval. Returns the time waited.
    pub async fn acquire(&self, tag: &str, min_interval: Duration) -> Duration {
        let wait = self.reserve(tag, min_interval);
        if !wait.is_zero() {
            debug!(source = %tag, wait_ms = wait.as_millis() as u64, "rate limit: waiting");
            self.clock.sleep(wait).await;
        }
        wait
    }
}

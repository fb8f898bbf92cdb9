use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::stats::Clock;

/// Per-address spacing for outgoing account emails.
///
/// Advisory only: it lives in this process and is lost on restart.
pub struct EmailCooldown {
    window: Duration,
    clock: Arc<dyn Clock>,
    last_sent: DashMap<(String, &'static str), chrono::DateTime<chrono::Utc>>,
}

impl EmailCooldown {
    pub fn new(window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            window,
            clock,
            last_sent: DashMap::new(),
        }
    }

    /// Records a send for `(email, kind)` unless one happened inside the
    /// window. On refusal returns the seconds left to wait.
    pub fn try_acquire(&self, email: &str, kind: &'static str) -> Result<(), u64> {
        let now = self.clock.now();
        match self.last_sent.entry((email.to_lowercase(), kind)) {
            Entry::Occupied(mut last) => {
                let elapsed = (now - *last.get()).to_std().unwrap_or(Duration::ZERO);
                if elapsed < self.window {
                    return Err((self.window - elapsed).as_secs().max(1));
                }
                last.insert(now);
            }
            Entry::Vacant(slot) => {
                slot.insert(now);
            }
        }
        Ok(())
    }
}

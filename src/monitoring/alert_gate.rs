//! Per-kind alert cooldown

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::monitoring::alert::AlertKind;

/// One-slot cooldown per [`AlertKind`].
///
/// Suppressed alerts are dropped, never queued. A kind that has never fired
/// always passes.
#[derive(Debug, Clone)]
pub struct AlertGate {
    cooldown: Duration,
    last_fired: HashMap<AlertKind, DateTime<Utc>>,
}

impl AlertGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_fired: HashMap::new(),
        }
    }

    /// Pass and record `now` iff the cooldown for `kind` has elapsed
    pub fn try_acquire(&mut self, kind: AlertKind, now: DateTime<Utc>) -> bool {
        let remaining = self.remaining(kind, now);
        if !remaining.is_zero() {
            debug!(
                alert = %kind,
                remaining_secs = remaining.as_secs(),
                "Alert on cooldown"
            );
            return false;
        }

        self.last_fired.insert(kind, now);
        true
    }

    /// Time left before `kind` may fire again; zero when it may fire now
    pub fn remaining(&self, kind: AlertKind, now: DateTime<Utc>) -> Duration {
        let Some(last) = self.last_fired.get(&kind) else {
            return Duration::ZERO;
        };

        // A clock that stepped backwards counts as no time elapsed
        let elapsed = (now - *last).to_std().unwrap_or(Duration::ZERO);
        self.cooldown.saturating_sub(elapsed)
    }

    pub fn last_fired(&self, kind: AlertKind) -> Option<DateTime<Utc>> {
        self.last_fired.get(&kind).copied()
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }
}

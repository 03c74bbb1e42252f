//! Withdrawal cooldown gate.
//!
//! When a run fails, a withdrawal is attempted at most once per cooldown.
//! The gate only moves forward on a successful attempt.

use chrono::{DateTime, Duration, Utc};

use crate::config::MAX_INTERVAL_SECS;

#[derive(Debug, Clone)]
pub struct WithdrawGate {
    last_withdraw: DateTime<Utc>,
    cooldown: Duration,
}

impl WithdrawGate {
    pub fn new(last_withdraw: DateTime<Utc>, cooldown: Duration) -> Self {
        Self { last_withdraw, cooldown }
    }

    pub fn from_secs(last_withdraw: DateTime<Utc>, cooldown_secs: u64) -> Self {
        let secs = cooldown_secs.min(MAX_INTERVAL_SECS) as i64;
        let cooldown = Duration::seconds(secs);
        Self::new(last_withdraw, cooldown)
    }

    /// True once the cooldown has fully elapsed.
    pub fn should_attempt(&self, now: DateTime<Utc>) -> bool {
        now - self.last_withdraw >= self.cooldown
    }

    pub fn record_success(&mut self, now: DateTime<Utc>) {
        self.last_withdraw = now;
    }

    pub fn last_withdraw(&self) -> DateTime<Utc> {
        self.last_withdraw
    }

    /// Saturates at the latest representable time.
    pub fn next_eligible(&self) -> DateTime<Utc> {
        self.last_withdraw
            .checked_add_signed(self.cooldown)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

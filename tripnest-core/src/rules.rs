use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Whether `cancelled` reservations still block availability.
///
/// `Block` reproduces the behaviour the calendar has always had (every row
/// for the destination is scanned). `Ignore` drops cancelled rows first.
///
/// Under `Block`, reservations cancelled by the pending-expiry sweep keep
/// their dates unavailable in the calendar and in `create`, although the
/// database exclusion constraint only covers pending and confirmed rows.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CancelledPolicy {
    #[default]
    Block,
    Ignore,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BookingRules {
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub cancelled_reservations: CancelledPolicy,
    /// Pending reservations older than this are expired by the sweeper.
    #[serde(default = "default_pending_ttl")]
    pub pending_ttl_seconds: u64,
}

fn default_currency() -> String {
    "usd".to_string()
}

fn default_pending_ttl() -> u64 {
    30 * 60
}

impl BookingRules {
    pub fn pending_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_ttl_seconds)
    }
}

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            currency: default_currency(),
            cancelled_reservations: CancelledPolicy::default(),
            pending_ttl_seconds: default_pending_ttl(),
        }
    }
}

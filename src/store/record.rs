use crate::canister::CanisterId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The outcome of one definitive lookup for a hostname.
///
/// `canister_id == None` records an ordinary web resource. Records are
/// replaced wholesale, never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRecord {
    pub hostname: String,
    pub canister_id: Option<CanisterId>,
    /// Origin that answered the probe when a canister was found.
    pub gateway_hint: Option<String>,
    pub resolved_at_epoch_millis: i64,
}

impl HostRecord {
    pub fn new(
        hostname: impl Into<String>,
        canister_id: Option<CanisterId>,
        gateway_hint: Option<String>,
        resolved_at_epoch_millis: i64,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            canister_id,
            gateway_hint,
            resolved_at_epoch_millis,
        }
    }

    /// Age in milliseconds at `now`. Clamped at zero if the clock went backwards.
    pub fn age_millis(&self, now_millis: i64) -> i64 {
        now_millis.saturating_sub(self.resolved_at_epoch_millis).max(0)
    }

    /// A record is served only while strictly younger than `ttl`.
    pub fn is_fresh(&self, now_millis: i64, ttl: Duration) -> bool {
        (self.age_millis(now_millis) as u128) < ttl.as_millis()
    }

    pub fn is_canister(&self) -> bool {
        self.canister_id.is_some()
    }
}

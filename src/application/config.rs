use crate::error::{Result, SyncError};
use crate::infrastructure::lock_registry::DEFAULT_LOCK_TTL;
use std::time::Duration;

pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(100);
pub const DEFAULT_LOCK_PREFIX: &str = "payment-sync";

/// Tuning for payment mirroring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Hard upper bound a lock may stay held if it is never released.
    pub lock_ttl: Duration,
    /// Delay between a propagation finishing and its lock being released.
    pub cooldown: Duration,
    /// Namespace for lock keys.
    pub lock_prefix: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            lock_ttl: DEFAULT_LOCK_TTL,
            cooldown: DEFAULT_COOLDOWN,
            lock_prefix: DEFAULT_LOCK_PREFIX.to_owned(),
        }
    }
}

impl SyncConfig {
    /// Lock key shared by both directions for one business key.
    pub fn lock_key(&self, business_key: &str) -> String {
        format!("{}:{}", self.lock_prefix, business_key)
    }

    /// Rejects timings under which a lock could lapse before its own
    /// cool-down release.
    pub fn validate(&self) -> Result<()> {
        if self.lock_ttl.is_zero() {
            return Err(SyncError::ValidationError(
                "lock TTL must be greater than zero".to_owned(),
            ));
        }
        if self.lock_ttl <= self.cooldown {
            return Err(SyncError::ValidationError(format!(
                "lock TTL ({:?}) must be longer than the cool-down ({:?})",
                self.lock_ttl, self.cooldown
            )));
        }
        if self.lock_prefix.is_empty() {
            return Err(SyncError::ValidationError(
                "lock prefix must not be empty".to_owned(),
            ));
        }
        Ok(())
    }
}

//! Vault configuration.

use anyhow::{bail, Context};
use chrono::{FixedOffset, Offset, Utc};
use codecapsule_core::Limits;
use codecapsule_crypto::SecretSource;

/// Environment variable overriding [`VaultConfig::feed_page_size`].
pub const FEED_PAGE_SIZE_VAR: &str = "CODECAPSULE_FEED_PAGE_SIZE";

/// Environment variable holding the reference UTC offset, in minutes.
pub const UTC_OFFSET_VAR: &str = "CODECAPSULE_UTC_OFFSET_MINUTES";

/// Configuration for the [`Vault`](crate::Vault).
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Capsules per public feed page.
    pub feed_page_size: usize,
    /// Timezone whose calendar day bounds the earliest unlock date.
    pub reference_offset: FixedOffset,
    /// Where the server re-encryption secret comes from.
    pub secret: SecretSource,
    /// Field length bounds for new capsules.
    pub limits: Limits,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            feed_page_size: 12,
            reference_offset: Utc.fix(),
            secret: SecretSource::default(),
            limits: Limits::default(),
        }
    }
}

impl VaultConfig {
    /// Defaults, overridden by whatever is set in the environment.
    ///
    /// The server secret itself is not read here; it is resolved at first
    /// use from `ENCRYPTION_SECRET`.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var(FEED_PAGE_SIZE_VAR) {
            let size: usize = raw
                .trim()
                .parse()
                .with_context(|| format!("{FEED_PAGE_SIZE_VAR} must be a positive integer"))?;
            if size == 0 {
                bail!("{FEED_PAGE_SIZE_VAR} must be a positive integer");
            }
            config.feed_page_size = size;
        }

        if let Ok(raw) = std::env::var(UTC_OFFSET_VAR) {
            let minutes: i32 = raw
                .trim()
                .parse()
                .with_context(|| format!("{UTC_OFFSET_VAR} must be a whole number of minutes"))?;
            config.reference_offset = minutes
                .checked_mul(60)
                .and_then(FixedOffset::east_opt)
                .with_context(|| format!("{UTC_OFFSET_VAR} out of range: {minutes}"))?;
        }

        Ok(config)
    }

    pub fn with_secret(mut self, secret: SecretSource) -> Self {
        self.secret = secret;
        self
    }

    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.reference_offset = offset;
        self
    }

    pub fn with_feed_page_size(mut self, size: usize) -> Self {
        self.feed_page_size = size.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = VaultConfig::default();
        assert_eq!(config.feed_page_size, 12);
        assert_eq!(config.reference_offset.local_minus_utc(), 0);
        assert_eq!(config.limits, Limits::default());
        assert!(matches!(config.secret, SecretSource::Env(ref var) if var == "ENCRYPTION_SECRET"));
    }

    #[test]
    fn test_page_size_never_zero() {
        assert_eq!(VaultConfig::default().with_feed_page_size(0).feed_page_size, 1);
    }
}

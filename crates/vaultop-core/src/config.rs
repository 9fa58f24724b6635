//! Operator configuration.

use crate::error::OperatorError;

/// Configuration of the Vault initialization and root-token handling.
///
/// Immutable after construction; validated by [`OperatorConfig::new`].
#[derive(Debug, Clone)]
pub struct OperatorConfig {
    /// How many key shares Vault should produce at init.
    pub secret_shares: usize,
    /// How many of those shares are needed to unseal
    /// (`secret_threshold <= secret_shares`).
    pub secret_threshold: usize,
    /// If set, the dynamically generated root token is revoked after init
    /// and an orphan root token with this ID is created instead.
    pub init_root_token: Option<String>,
    /// Whether the root token should be written to the keystore.
    pub store_root_token: bool,
    /// Whether the keystore should be probed for read+write access before
    /// Vault state is mutated.
    pub pre_flight_checks: bool,
}

impl OperatorConfig {
    /// Validate and build a config.
    ///
    /// # Errors
    ///
    /// [`OperatorError::Config`] if the threshold exceeds the share count.
    pub fn new(secret_shares: usize, secret_threshold: usize) -> Result<Self, OperatorError> {
        if secret_shares < secret_threshold {
            return Err(OperatorError::Config {
                reason: format!(
                    "the secret threshold can't be bigger than the shares [{secret_shares} < {secret_threshold}]"
                ),
            });
        }

        Ok(Self {
            secret_shares,
            secret_threshold,
            init_root_token: None,
            store_root_token: false,
            pre_flight_checks: false,
        })
    }

    /// Set the predefined root token installed after init.
    #[must_use]
    pub fn with_init_root_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.init_root_token = (!token.is_empty()).then_some(token);
        self
    }

    /// Persist the root token to the keystore after init.
    #[must_use]
    pub fn with_store_root_token(mut self, store: bool) -> Self {
        self.store_root_token = store;
        self
    }

    /// Probe the keystore for read+write access before init.
    #[must_use]
    pub fn with_pre_flight_checks(mut self, check: bool) -> Self {
        self.pre_flight_checks = check;
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn threshold_must_not_exceed_shares() {
        let err = OperatorConfig::new(2, 3).unwrap_err();
        assert!(matches!(err, OperatorError::Config { .. }));
    }

    #[test]
    fn threshold_equal_to_shares_is_valid() {
        let cfg = OperatorConfig::new(3, 3).unwrap();
        assert_eq!(cfg.secret_shares, 3);
        assert_eq!(cfg.secret_threshold, 3);
    }

    #[test]
    fn defaults_are_off() {
        let cfg = OperatorConfig::new(5, 3).unwrap();
        assert!(cfg.init_root_token.is_none());
        assert!(!cfg.store_root_token);
        assert!(!cfg.pre_flight_checks);
    }

    #[test]
    fn empty_init_root_token_means_unset() {
        let cfg = OperatorConfig::new(5, 3).unwrap().with_init_root_token("");
        assert!(cfg.init_root_token.is_none());
    }
}

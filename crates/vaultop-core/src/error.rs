//! Error types for `vaultop-core`.
//!
//! Each variant carries the operation context (key ID, stage name) needed
//! to diagnose a failed lifecycle run from logs alone. Key material never
//! appears in error messages, only key identifiers.

use vaultop_store::StoreError;

use crate::keybase::KeybaseError;
use crate::xor::XorError;

/// Errors from the Vault HTTP client.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// Vault returned a non-2xx status.
    #[error("vault API error {status} on {path}: {message}")]
    Api {
        status: u16,
        path: String,
        message: String,
    },

    /// Client construction or address configuration failed.
    #[error("vault client config error: {0}")]
    Config(String),

    /// Network or transport error.
    #[error("vault network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A response body failed to deserialize.
    #[error("vault response decode error on {path}: {reason}")]
    Decode { path: String, reason: String },
}

/// Errors from the operator orchestrators.
#[derive(Debug, thiserror::Error)]
pub enum OperatorError {
    /// Invalid operator configuration, recipients, or external config.
    /// Non-retryable.
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// A keystore operation failed for a reason other than absence.
    #[error("key store error on '{key}': {source}")]
    Store {
        key: String,
        #[source]
        source: StoreError,
    },

    /// A reserved key already holds a value. Indicates operator
    /// misconfiguration or a cross-cluster collision.
    #[error("value for key '{key}' already exists")]
    AlreadyExists { key: String },

    /// The Vault API rejected or failed a request.
    #[error(transparent)]
    Vault(#[from] VaultError),

    /// Vault reset unseal progress to zero: a submitted share was invalid.
    #[error("failed to unseal vault, are you using the right unseal keys?")]
    UnsealFailed,

    /// A multi-round protocol session went off the rails: empty nonce,
    /// incomplete generate-root, mismatched rekey result.
    #[error("vault protocol error: {reason}")]
    Protocol { reason: String },

    /// The Keybase fetch failed.
    #[error(transparent)]
    Keybase(#[from] KeybaseError),

    /// Recovering the root token from its OTP-masked encoding failed.
    #[error("error decoding root token: {0}")]
    Xor(#[from] XorError),

    /// Reading the raft CA certificate failed.
    #[error("error reading raft CA certificate '{path}': {source}")]
    CaRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl OperatorError {
    pub(crate) fn store(key: impl Into<String>, source: StoreError) -> Self {
        OperatorError::Store {
            key: key.into(),
            source,
        }
    }

    pub(crate) fn protocol(reason: impl Into<String>) -> Self {
        OperatorError::Protocol {
            reason: reason.into(),
        }
    }
}

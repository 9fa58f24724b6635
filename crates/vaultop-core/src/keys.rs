//! Key-name scheme for the external keystore.
//!
//! These names are the persisted layout shared with every other tool that
//! reads the keystore; changing them orphans existing key material.

/// Keystore name of the root token.
pub const KEY_ROOT_TOKEN: &str = "vault-root";

/// Keystore name of the pre-flight write probe.
pub const KEY_TEST: &str = "vault-test";

/// Keystore name of unseal share `i` (zero-based).
#[must_use]
pub fn unseal_key_for(i: usize) -> String {
    format!("vault-unseal-{i}")
}

/// Keystore name of recovery share `i` (zero-based). Used when Vault runs
/// with an auto-unseal (recovery) seal.
#[must_use]
pub fn recovery_key_for(i: usize) -> String {
    format!("vault-recovery-{i}")
}

/// Keystore name of the rekey output for `recipient`, share `i`. The
/// recipient keeps its `keybase:` prefix.
#[must_use]
pub fn rekey_key_for(recipient: &str, i: usize) -> String {
    format!("{recipient}-{}", unseal_key_for(i))
}

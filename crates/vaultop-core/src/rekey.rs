//! Rekey orchestration: rotate Vault's unseal shares, encrypting the new
//! set per recipient with Keybase-held PGP keys.
//!
//! A rekey session is stateful server-side under a nonce. Once a nonce
//! exists, freshly initialized or adopted from an in-progress session,
//! any failure cancels the session before surfacing, so Vault is never
//! left half-rekeyed.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tracing::{debug, info, warn};

use crate::error::OperatorError;
use crate::keys::{rekey_key_for, unseal_key_for};
use crate::operator::Operator;
use crate::types::{RekeyInitRequest, RekeyUpdateResponse};

impl Operator {
    /// Whether the rekeyed shares for these recipients already exist.
    ///
    /// Presence of the first recipient's share 0 stands for the whole
    /// set: results are persisted in recipient order starting at share 0,
    /// so it is written first and a later rekey regenerates everything.
    ///
    /// # Errors
    ///
    /// Surfaces keystore failures other than NotFound.
    pub async fn new_unseal_keys_exist(
        &self,
        recipients: &[String],
    ) -> Result<bool, OperatorError> {
        let Some(first) = recipients.first() else {
            return Ok(false);
        };

        let key_id = rekey_key_for(first, 0);
        debug!(key = %key_id, "checking if rekeyed unseal key exists");
        Ok(!self.key_store_not_found(&key_id).await?)
    }

    /// Rotate the unseal shares, one PGP-encrypted share per recipient.
    ///
    /// Fetches the recipients' public keys, initializes (or resumes) the
    /// server-side rekey session, submits the current shares serially
    /// under the session nonce, and persists the returned ciphertexts
    /// under recipient-tagged names.
    ///
    /// # Errors
    ///
    /// - [`OperatorError::Config`] on an empty recipient list or when the
    ///   fetch yields no usable keys.
    /// - [`OperatorError::Keybase`] when any recipient is missing a key.
    /// - Any Vault or keystore failure; once a session nonce exists the
    ///   session is cancelled first (the cancel's own failure is logged,
    ///   never masks the original error).
    pub async fn rekey(&self, recipients: &[String]) -> Result<(), OperatorError> {
        if recipients.is_empty() {
            return Err(OperatorError::Config {
                reason: "no PGP recipients provided for rekey operation".to_owned(),
            });
        }

        info!("starting rekey process");

        let pgp_keys = self.pgp_source.fetch(recipients).await?;
        if pgp_keys.is_empty() {
            return Err(OperatorError::Config {
                reason: "recipient list produced no usable Keybase keys".to_owned(),
            });
        }

        debug!("checking rekey status");
        let status = self.vault.rekey_status().await?;

        let nonce = if status.started {
            info!(nonce = %status.nonce, "resuming existing rekey operation");
            status.nonce
        } else {
            self.initialize_rekey(pgp_keys).await?
        };

        match self.run_rekey_session(&nonce, recipients).await {
            Ok(()) => Ok(()),
            Err(err) => {
                // Cancel so the server is not left mid-session; the
                // original error is the one worth surfacing.
                if let Err(cancel_err) = self.vault.rekey_cancel().await {
                    warn!(error = %cancel_err, "failed to cancel rekey operation after error");
                }
                Err(err)
            }
        }
    }

    /// Start a new server-side rekey session and return its nonce.
    async fn initialize_rekey(&self, pgp_keys: Vec<String>) -> Result<String, OperatorError> {
        let request = RekeyInitRequest {
            secret_shares: self.config.secret_shares,
            secret_threshold: self.config.secret_threshold,
            pgp_keys,
            backup: false,
        };

        info!(
            shares = self.config.secret_shares,
            threshold = self.config.secret_threshold,
            "initializing rekey operation"
        );

        let resp = self.vault.rekey_init(&request).await?;

        if resp.nonce.is_empty() {
            // A session may have started regardless; clean it up.
            if let Err(cancel_err) = self.vault.rekey_cancel().await {
                warn!(error = %cancel_err, "failed to cancel rekey operation after error");
            }
            return Err(OperatorError::protocol(
                "failed to init rekey operation: empty nonce returned, vault auth token may be incorrect",
            ));
        }

        info!(nonce = %resp.nonce, "rekey operation initialized");
        Ok(resp.nonce)
    }

    /// Submit existing shares under `nonce` until complete, then persist
    /// the results. Callers cancel the session if this fails.
    async fn run_rekey_session(
        &self,
        nonce: &str,
        recipients: &[String],
    ) -> Result<(), OperatorError> {
        let resp = self.send_rekey_updates(nonce).await?;
        self.finish_rekey(&resp, recipients).await
    }

    /// The serial share-submission loop.
    async fn send_rekey_updates(&self, nonce: &str) -> Result<RekeyUpdateResponse, OperatorError> {
        let mut i = 0;
        loop {
            let key_id = unseal_key_for(i);

            debug!(key = %key_id, "retrieving unseal key from key store");
            let share = self.key_store_get_string(&key_id).await?;

            debug!("sending rekey update request to vault");
            let resp = self.vault.rekey_update(&share, nonce).await?;

            info!(current = i, "rekey progress");

            if resp.complete {
                return Ok(resp);
            }

            i += 1;
        }
    }

    /// Persist one PGP-encrypted share per recipient, in recipient order.
    /// Plain overwriting writes: a rerun regenerates the whole set.
    async fn finish_rekey(
        &self,
        resp: &RekeyUpdateResponse,
        recipients: &[String],
    ) -> Result<(), OperatorError> {
        info!(total_keys = resp.keys_base64.len(), "rekey operation completed");

        if resp.keys_base64.len() > recipients.len() {
            return Err(OperatorError::protocol(format!(
                "rekey returned {} keys for {} recipients",
                resp.keys_base64.len(),
                recipients.len()
            )));
        }

        for (i, encoded) in resp.keys_base64.iter().enumerate() {
            let key_id = rekey_key_for(&recipients[i], i);

            let ciphertext = BASE64.decode(encoded).map_err(|err| {
                OperatorError::protocol(format!(
                    "error decoding rekeyed share for '{key_id}': {err}"
                ))
            })?;

            self.key_store
                .set(&key_id, &ciphertext)
                .await
                .map_err(|err| OperatorError::store(&key_id, err))?;

            info!(key = %key_id, "unseal key stored in key store");
        }

        Ok(())
    }
}

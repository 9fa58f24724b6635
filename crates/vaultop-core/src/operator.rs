//! The Vault lifecycle operator.
//!
//! One [`Operator`] instance drives one Vault server through its life:
//! init, unseal, rekey, generate-root, and declarative configuration.
//! Every verb is reentrant (external schedulers retry them freely) and
//! all key material lands in the external keystore, never on local disk.
//!
//! The per-share submission loops are strictly serial: Vault's unseal,
//! generate-root, and rekey protocols are stateful under a nonce and do
//! not tolerate concurrent updates.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use vaultop_store::KeyStore;

use crate::api::VaultApi;
use crate::config::OperatorConfig;
use crate::error::OperatorError;
use crate::external::ExternalConfig;
use crate::keybase::{KeybaseClient, PgpKeySource};
use crate::keys::{recovery_key_for, unseal_key_for, KEY_ROOT_TOKEN, KEY_TEST};
use crate::types::{InitRequest, RaftJoinRequest, TokenCreateRequest};

/// How long to wait between seal-status polls while waiting for an
/// external unsealer after init.
const UNSEAL_POLL_PERIOD: Duration = Duration::from_secs(2);

/// Drives the lifecycle of a single Vault server.
pub struct Operator {
    pub(crate) key_store: Arc<dyn KeyStore>,
    pub(crate) vault: Arc<dyn VaultApi>,
    pub(crate) pgp_source: Arc<dyn PgpKeySource>,
    pub(crate) config: OperatorConfig,
}

impl Operator {
    /// Build an operator over the given keystore and Vault client.
    ///
    /// # Errors
    ///
    /// [`OperatorError::Config`] if the threshold exceeds the share count.
    pub fn new(
        key_store: Arc<dyn KeyStore>,
        vault: Arc<dyn VaultApi>,
        config: OperatorConfig,
    ) -> Result<Self, OperatorError> {
        if config.secret_shares < config.secret_threshold {
            return Err(OperatorError::Config {
                reason: format!(
                    "the secret threshold can't be bigger than the shares [{} < {}]",
                    config.secret_shares, config.secret_threshold
                ),
            });
        }

        Ok(Self {
            key_store,
            vault,
            pgp_source: Arc::new(KeybaseClient::new()),
            config,
        })
    }

    /// Replace the PGP key source (tests, alternate key servers).
    #[must_use]
    pub fn with_pgp_source(mut self, source: Arc<dyn PgpKeySource>) -> Self {
        self.pgp_source = source;
        self
    }

    // ── status helpers ───────────────────────────────────────────────

    /// Whether the server is currently sealed.
    ///
    /// # Errors
    ///
    /// Surfaces any Vault API failure.
    pub async fn sealed(&self) -> Result<bool, OperatorError> {
        Ok(self.vault.seal_status().await?.sealed)
    }

    /// Whether this node is the active one (health endpoint answers 200).
    ///
    /// # Errors
    ///
    /// Surfaces any Vault API failure.
    pub async fn active(&self) -> Result<bool, OperatorError> {
        Ok(self.vault.health_active().await?)
    }

    /// Whether this node is the cluster leader.
    ///
    /// # Errors
    ///
    /// Surfaces any Vault API failure.
    pub async fn leader(&self) -> Result<bool, OperatorError> {
        Ok(self.vault.leader().await?.is_self)
    }

    /// Address of the current cluster leader.
    ///
    /// # Errors
    ///
    /// Surfaces any Vault API failure.
    pub async fn leader_address(&self) -> Result<String, OperatorError> {
        Ok(self.vault.leader().await?.leader_address)
    }

    // ── keystore helpers ─────────────────────────────────────────────

    /// `Ok(true)` when `key` is absent, `Ok(false)` on a hit; any backend
    /// error other than NotFound surfaces.
    pub(crate) async fn key_store_not_found(&self, key: &str) -> Result<bool, OperatorError> {
        match self.key_store.get(key).await {
            Ok(_) => Ok(false),
            Err(err) if err.is_not_found() => Ok(true),
            Err(err) => Err(OperatorError::store(key, err)),
        }
    }

    /// Write-once set: fails with `AlreadyExists` if the key holds a value.
    pub(crate) async fn key_store_set(&self, key: &str, value: &[u8]) -> Result<(), OperatorError> {
        if self.key_store_not_found(key).await? {
            self.key_store
                .set(key, value)
                .await
                .map_err(|err| OperatorError::store(key, err))
        } else {
            Err(OperatorError::AlreadyExists {
                key: key.to_owned(),
            })
        }
    }

    /// Fetch a share from the keystore as a string.
    pub(crate) async fn key_store_get_string(&self, key: &str) -> Result<String, OperatorError> {
        let bytes = self
            .key_store
            .get(key)
            .await
            .map_err(|err| OperatorError::store(key, err))?;
        String::from_utf8(bytes).map_err(|_| {
            OperatorError::protocol(format!("value for key '{key}' is not valid UTF-8"))
        })
    }

    // ── init ─────────────────────────────────────────────────────────

    /// Initialize Vault if it is not initialized already.
    ///
    /// Produces the configured number of shares, stores unseal keys, then
    /// recovery keys, then the root token, in that order. Rerunning
    /// against an initialized server is a successful no-op.
    ///
    /// # Errors
    ///
    /// - [`OperatorError::AlreadyExists`] if a reserved keystore name
    ///   already holds a value while Vault is uninitialized.
    /// - Any keystore or Vault API failure; a store failure after Vault
    ///   has initialized is fatal and does not unwind Vault.
    pub async fn init(&self) -> Result<(), OperatorError> {
        if self.vault.init_status().await? {
            info!("vault is already initialized");
            return Ok(());
        }

        info!("initializing vault");

        if self.config.pre_flight_checks {
            self.pre_flight_check().await?;
        }

        // Probe every reserved name before touching Vault. The unseal
        // probe range is inclusive of the share count, matching the
        // layout probed by earlier releases.
        let mut reserved = vec![KEY_ROOT_TOKEN.to_owned()];
        reserved.extend((0..=self.config.secret_shares).map(unseal_key_for));

        for key in &reserved {
            if !self.key_store_not_found(key).await? {
                return Err(OperatorError::AlreadyExists { key: key.clone() });
            }
        }

        let seal = self.vault.seal_status().await?;

        let request = if seal.recovery_seal {
            InitRequest {
                recovery_shares: Some(self.config.secret_shares),
                recovery_threshold: Some(self.config.secret_threshold),
                ..Default::default()
            }
        } else {
            InitRequest {
                secret_shares: Some(self.config.secret_shares),
                secret_threshold: Some(self.config.secret_threshold),
                ..Default::default()
            }
        };

        let resp = self.vault.init(&request).await?;

        for (i, share) in resp.keys.iter().enumerate() {
            let key_id = unseal_key_for(i);
            self.key_store_set(&key_id, share.as_bytes()).await?;
            info!(key = %key_id, "unseal key stored in key store");
        }

        for (i, share) in resp.recovery_keys.iter().enumerate() {
            let key_id = recovery_key_for(i);
            self.key_store_set(&key_id, share.as_bytes()).await?;
            info!(key = %key_id, "recovery key stored in key store");
        }

        if let Some(init_root_token) = self.config.init_root_token.clone() {
            self.install_init_root_token(&init_root_token, &resp.root_token)
                .await?;
        }

        if self.config.store_root_token {
            self.key_store_set(KEY_ROOT_TOKEN, resp.root_token.as_bytes())
                .await?;
            info!(key = KEY_ROOT_TOKEN, "root token stored in key store");
        } else if self.config.init_root_token.is_none() {
            warn!(
                root_token = %resp.root_token,
                "won't store root token in key store, this token grants full privileges to vault, so keep this secret"
            );
        }

        Ok(())
    }

    /// Validate read+write access to the keystore before mutating Vault
    /// state: probe the test key, then write it.
    async fn pre_flight_check(&self) -> Result<(), OperatorError> {
        match self.key_store.get(KEY_TEST).await {
            Ok(_) | Err(vaultop_store::StoreError::NotFound { .. }) => {}
            Err(err) => return Err(OperatorError::store(KEY_TEST, err)),
        }

        self.key_store
            .set(KEY_TEST, KEY_TEST.as_bytes())
            .await
            .map_err(|err| OperatorError::store(KEY_TEST, err))
    }

    /// Replace the freshly generated root token with a predefined one:
    /// wait for an external unsealer, create an orphan root token with the
    /// configured ID, then revoke the temporary root.
    async fn install_init_root_token(
        &self,
        init_root_token: &str,
        temporary_root: &str,
    ) -> Result<(), OperatorError> {
        info!("setting up init root token, waiting for vault to be unsealed");

        loop {
            match self.sealed().await {
                Ok(false) => break,
                Ok(true) => info!("vault still sealed, waiting for unsealing"),
                Err(err) => info!(error = %err, "vault not reachable"),
            }
            tokio::time::sleep(UNSEAL_POLL_PERIOD).await;
        }

        self.vault.set_token(temporary_root);

        let request = TokenCreateRequest {
            id: Some(init_root_token.to_owned()),
            policies: vec!["root".to_owned()],
            display_name: Some("root-token".to_owned()),
            no_parent: true,
        };
        self.vault.create_orphan_token(&request).await?;
        self.vault.revoke_self().await?;
        self.vault.clear_token();

        Ok(())
    }

    // ── unseal ───────────────────────────────────────────────────────

    /// Submit stored shares until Vault reports unsealed.
    ///
    /// Relies on Vault's threshold logic to converge; a progress reset to
    /// zero means a submitted share was invalid.
    ///
    /// # Errors
    ///
    /// - [`OperatorError::UnsealFailed`] when Vault resets progress.
    /// - Any keystore or Vault API failure, wrapped with the share name.
    pub async fn unseal(&self) -> Result<(), OperatorError> {
        let mut i = 0;
        loop {
            let key_id = unseal_key_for(i);

            debug!(key = %key_id, "retrieving unseal key from key store");
            let share = self.key_store_get_string(&key_id).await?;

            debug!("sending unseal request to vault");
            let resp = self.vault.unseal(&share).await?;

            debug!(sealed = resp.sealed, progress = resp.progress, "got unseal response");

            if !resp.sealed {
                return Ok(());
            }

            if resp.progress == 0 {
                return Err(OperatorError::UnsealFailed);
            }

            i += 1;
        }
    }

    // ── raft ─────────────────────────────────────────────────────────

    /// Whether this Vault's init material exists: the root token is
    /// present (and non-empty) in the keystore.
    ///
    /// # Errors
    ///
    /// Surfaces keystore failures other than NotFound.
    pub async fn raft_initialized(&self) -> Result<bool, OperatorError> {
        match self.key_store.get(KEY_ROOT_TOKEN).await {
            Ok(token) => Ok(!token.is_empty()),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(OperatorError::store(KEY_ROOT_TOKEN, err)),
        }
    }

    /// Join this node to a raft cluster, best effort.
    ///
    /// With a leader address: no-op if the server is already initialized.
    /// Without one: no-op on replica 0 (`POD_NAME` ending in `-0`), which
    /// bootstraps the cluster instead of joining it.
    ///
    /// # Errors
    ///
    /// - [`OperatorError::CaRead`] if the configured CA file is unreadable.
    /// - [`OperatorError::Protocol`] if the server refuses the join.
    pub async fn raft_join(&self, leader_api_addr: &str) -> Result<(), OperatorError> {
        if !leader_api_addr.is_empty() {
            if self.vault.init_status().await? {
                info!("vault is already initialized, skipping raft join");
                return Ok(());
            }
        } else if std::env::var("POD_NAME")
            .unwrap_or_default()
            .ends_with("-0")
        {
            // raft ha_storage mode: replica 0 bootstraps, nothing to join
            return Ok(());
        }

        let mut request = RaftJoinRequest {
            leader_api_addr: leader_api_addr.to_owned(),
            leader_ca_cert: None,
        };

        let ca_path = std::env::var("VAULT_RAFT_CACERT")
            .or_else(|_| std::env::var("VAULT_CACERT"))
            .unwrap_or_default();

        if !ca_path.is_empty() {
            let pem = tokio::fs::read_to_string(&ca_path)
                .await
                .map_err(|source| OperatorError::CaRead {
                    path: ca_path.clone(),
                    source,
                })?;
            request.leader_ca_cert = Some(pem);
        }

        let response = self.vault.raft_join(&request).await?;

        if response.joined {
            info!("vault joined raft cluster");
            return Ok(());
        }

        Err(OperatorError::protocol("vault hasn't joined raft cluster"))
    }

    /// Decode an external config document without applying it. Exposed so
    /// callers can validate documents up front.
    ///
    /// # Errors
    ///
    /// [`OperatorError::Config`] on unknown fields.
    pub fn decode_external_config(
        document: serde_json::Value,
    ) -> Result<ExternalConfig, OperatorError> {
        ExternalConfig::decode(document)
    }
}

impl std::fmt::Debug for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

//! The Vault port: everything the orchestrators need from a Vault server.
//!
//! [`crate::client::VaultHttpClient`] is the production implementation;
//! tests substitute scripted mocks. Token accessors are synchronous so a
//! drop guard can clear the token on any exit path, including unwinds.

use crate::error::VaultError;
use crate::types::{
    GenerateRootStatusResponse, InitRequest, InitResponse, LeaderResponse, RaftJoinRequest,
    RaftJoinResponse, RekeyInitRequest, RekeyStatusResponse, RekeyUpdateResponse, Secret,
    SealStatusResponse, TokenCreateRequest,
};

/// Abstract capability over the Vault HTTP API.
///
/// One instance per operator; the client token is process-wide state that
/// belongs to this instance, mutated only around Configure.
#[async_trait::async_trait]
pub trait VaultApi: Send + Sync {
    /// `GET /v1/sys/init`: whether the server has been initialized.
    async fn init_status(&self) -> Result<bool, VaultError>;

    /// `GET /v1/sys/seal-status`.
    async fn seal_status(&self) -> Result<SealStatusResponse, VaultError>;

    /// `PUT /v1/sys/init`.
    async fn init(&self, request: &InitRequest) -> Result<InitResponse, VaultError>;

    /// `PUT /v1/sys/unseal`: submit one share.
    async fn unseal(&self, share: &str) -> Result<SealStatusResponse, VaultError>;

    /// `GET /v1/sys/health`: true iff the node answers 200 (active).
    async fn health_active(&self) -> Result<bool, VaultError>;

    /// `GET /v1/sys/leader`.
    async fn leader(&self) -> Result<LeaderResponse, VaultError>;

    /// `POST /v1/sys/storage/raft/join`.
    async fn raft_join(&self, request: &RaftJoinRequest) -> Result<RaftJoinResponse, VaultError>;

    /// `PUT /v1/sys/generate-root/attempt` with an empty OTP and PGP key.
    async fn generate_root_init(&self) -> Result<GenerateRootStatusResponse, VaultError>;

    /// `PUT /v1/sys/generate-root/update`.
    async fn generate_root_update(
        &self,
        key: &str,
        nonce: &str,
    ) -> Result<GenerateRootStatusResponse, VaultError>;

    /// `DELETE /v1/sys/generate-root/attempt`.
    async fn generate_root_cancel(&self) -> Result<(), VaultError>;

    /// `GET /v1/sys/rekey/init`.
    async fn rekey_status(&self) -> Result<RekeyStatusResponse, VaultError>;

    /// `PUT /v1/sys/rekey/init`.
    async fn rekey_init(&self, request: &RekeyInitRequest)
        -> Result<RekeyStatusResponse, VaultError>;

    /// `PUT /v1/sys/rekey/update`: submit one existing share under the
    /// session nonce.
    async fn rekey_update(&self, key: &str, nonce: &str)
        -> Result<RekeyUpdateResponse, VaultError>;

    /// `DELETE /v1/sys/rekey/init`.
    async fn rekey_cancel(&self) -> Result<(), VaultError>;

    /// `GET /v1/<path>`.
    async fn logical_read(&self, path: &str) -> Result<Option<Secret>, VaultError>;

    /// `PUT /v1/<path>`.
    async fn logical_write(
        &self,
        path: &str,
        data: &serde_json::Value,
    ) -> Result<Option<Secret>, VaultError>;

    /// `POST /v1/auth/token/create-orphan`.
    async fn create_orphan_token(
        &self,
        request: &TokenCreateRequest,
    ) -> Result<Secret, VaultError>;

    /// `POST /v1/auth/token/revoke-self`: revoke the current client token.
    async fn revoke_self(&self) -> Result<(), VaultError>;

    /// Replace the client token used for authenticated requests.
    fn set_token(&self, token: &str);

    /// Clear the client token.
    fn clear_token(&self) {
        self.set_token("");
    }

    /// Current client token (empty when unset).
    fn token(&self) -> String;
}

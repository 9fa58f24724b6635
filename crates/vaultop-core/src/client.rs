//! Reqwest-backed implementation of the Vault port.
//!
//! Speaks the standard Vault v1 HTTP API and is configured the way the
//! official clients are: `VAULT_ADDR`, `VAULT_TOKEN`, `VAULT_CACERT`,
//! `VAULT_SKIP_VERIFY`. Non-2xx responses are turned into
//! [`VaultError::Api`] with the message pulled from Vault's
//! `{"errors": [...]}` body.

use std::sync::RwLock;
use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::api::VaultApi;
use crate::error::VaultError;
use crate::types::{
    GenerateRootStatusResponse, InitRequest, InitResponse, LeaderResponse, RaftJoinRequest,
    RaftJoinResponse, RekeyInitRequest, RekeyStatusResponse, RekeyUpdateResponse, Secret,
    SealStatusResponse, TokenCreateRequest,
};

const DEFAULT_ADDR: &str = "https://127.0.0.1:8200";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for a single Vault server.
pub struct VaultHttpClient {
    address: String,
    token: RwLock<String>,
    http: reqwest::Client,
}

impl VaultHttpClient {
    /// Build a client from the standard Vault environment variables.
    ///
    /// - `VAULT_ADDR`: server address (default `https://127.0.0.1:8200`)
    /// - `VAULT_TOKEN`: initial client token
    /// - `VAULT_CACERT`: path to a PEM CA certificate to trust
    /// - `VAULT_SKIP_VERIFY`: disable TLS verification (development only)
    /// - `VAULT_CLIENT_TIMEOUT`: request timeout in seconds (default 30)
    ///
    /// # Errors
    ///
    /// [`VaultError::Config`] if the CA certificate cannot be read or the
    /// HTTP client cannot be constructed.
    pub fn from_env() -> Result<Self, VaultError> {
        let address = std::env::var("VAULT_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_owned());
        let token = std::env::var("VAULT_TOKEN").unwrap_or_default();

        let timeout = std::env::var("VAULT_CLIENT_TIMEOUT")
            .ok()
            .and_then(|v| v.parse().ok())
            .map_or(DEFAULT_TIMEOUT, Duration::from_secs);

        let mut builder = reqwest::Client::builder().timeout(timeout);

        if let Ok(ca_path) = std::env::var("VAULT_CACERT") {
            if !ca_path.is_empty() {
                let pem = std::fs::read(&ca_path).map_err(|err| {
                    VaultError::Config(format!("reading VAULT_CACERT '{ca_path}': {err}"))
                })?;
                let cert = reqwest::Certificate::from_pem(&pem).map_err(|err| {
                    VaultError::Config(format!("parsing VAULT_CACERT '{ca_path}': {err}"))
                })?;
                builder = builder.add_root_certificate(cert);
            }
        }

        if matches!(
            std::env::var("VAULT_SKIP_VERIFY").as_deref(),
            Ok("1") | Ok("true")
        ) {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let http = builder
            .build()
            .map_err(|err| VaultError::Config(format!("building http client: {err}")))?;

        Ok(Self::with_http(address, token, http))
    }

    /// Build a client against an explicit address, for tests and embedding.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self::with_http(address.into(), String::new(), reqwest::Client::new())
    }

    fn with_http(address: String, token: String, http: reqwest::Client) -> Self {
        Self {
            address: address.trim_end_matches('/').to_owned(),
            token: RwLock::new(token),
            http,
        }
    }

    /// Issue a request against `/v1/<path>` and decode a JSON response.
    ///
    /// Returns `Ok(None)` on 204/empty bodies and on 404 (logical reads of
    /// missing paths).
    async fn request<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Option<T>, VaultError>
    where
        T: DeserializeOwned,
        B: Serialize + Sync,
    {
        let url = format!("{}/v1/{}", self.address, path);
        debug!(%method, path, "vault request");

        let mut req = self.http.request(method, &url);

        let token = self.token();
        if !token.is_empty() {
            req = req.header("X-Vault-Token", token);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req.send().await?;
        let status = resp.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(VaultError::Api {
                status: status.as_u16(),
                path: path.to_owned(),
                message: error_message(&text, status),
            });
        }

        let text = resp.text().await?;
        if text.is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&text)
            .map(Some)
            .map_err(|err| VaultError::Decode {
                path: path.to_owned(),
                reason: err.to_string(),
            })
    }

    /// Like [`Self::request`], but an empty response body is an error.
    async fn request_required<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, VaultError>
    where
        T: DeserializeOwned,
        B: Serialize + Sync,
    {
        self.request(method, path, body)
            .await?
            .ok_or_else(|| VaultError::Decode {
                path: path.to_owned(),
                reason: "empty response body".to_owned(),
            })
    }
}

/// Pull a human-readable message out of Vault's error body.
fn error_message(body: &str, status: StatusCode) -> String {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        #[serde(default)]
        errors: Vec<String>,
    }

    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .filter(|b| !b.errors.is_empty())
        .map_or_else(|| format!("HTTP {}", status.as_u16()), |b| b.errors.join("; "))
}

const NO_BODY: Option<&()> = None;

#[async_trait::async_trait]
impl VaultApi for VaultHttpClient {
    async fn init_status(&self) -> Result<bool, VaultError> {
        let resp: crate::types::InitStatusResponse = self
            .request_required(Method::GET, "sys/init", NO_BODY)
            .await?;
        Ok(resp.initialized)
    }

    async fn seal_status(&self) -> Result<SealStatusResponse, VaultError> {
        self.request_required(Method::GET, "sys/seal-status", NO_BODY)
            .await
    }

    async fn init(&self, request: &InitRequest) -> Result<InitResponse, VaultError> {
        self.request_required(Method::PUT, "sys/init", Some(request))
            .await
    }

    async fn unseal(&self, share: &str) -> Result<SealStatusResponse, VaultError> {
        let body = serde_json::json!({ "key": share });
        self.request_required(Method::PUT, "sys/unseal", Some(&body))
            .await
    }

    async fn health_active(&self) -> Result<bool, VaultError> {
        // Health has per-state status codes (200 active, 429 standby,
        // 503 sealed, 501 uninitialized); only 200 counts as active.
        let url = format!("{}/v1/sys/health", self.address);
        let resp = self.http.get(&url).send().await?;
        Ok(resp.status() == StatusCode::OK)
    }

    async fn leader(&self) -> Result<LeaderResponse, VaultError> {
        self.request_required(Method::GET, "sys/leader", NO_BODY)
            .await
    }

    async fn raft_join(&self, request: &RaftJoinRequest) -> Result<RaftJoinResponse, VaultError> {
        self.request_required(Method::POST, "sys/storage/raft/join", Some(request))
            .await
    }

    async fn generate_root_init(&self) -> Result<GenerateRootStatusResponse, VaultError> {
        let body = serde_json::json!({ "otp": "", "pgp_key": "" });
        self.request_required(Method::PUT, "sys/generate-root/attempt", Some(&body))
            .await
    }

    async fn generate_root_update(
        &self,
        key: &str,
        nonce: &str,
    ) -> Result<GenerateRootStatusResponse, VaultError> {
        let body = serde_json::json!({ "key": key, "nonce": nonce });
        self.request_required(Method::PUT, "sys/generate-root/update", Some(&body))
            .await
    }

    async fn generate_root_cancel(&self) -> Result<(), VaultError> {
        self.request::<serde_json::Value, ()>(Method::DELETE, "sys/generate-root/attempt", NO_BODY)
            .await?;
        Ok(())
    }

    async fn rekey_status(&self) -> Result<RekeyStatusResponse, VaultError> {
        self.request_required(Method::GET, "sys/rekey/init", NO_BODY)
            .await
    }

    async fn rekey_init(
        &self,
        request: &RekeyInitRequest,
    ) -> Result<RekeyStatusResponse, VaultError> {
        self.request_required(Method::PUT, "sys/rekey/init", Some(request))
            .await
    }

    async fn rekey_update(
        &self,
        key: &str,
        nonce: &str,
    ) -> Result<RekeyUpdateResponse, VaultError> {
        let body = serde_json::json!({ "key": key, "nonce": nonce });
        self.request_required(Method::PUT, "sys/rekey/update", Some(&body))
            .await
    }

    async fn rekey_cancel(&self) -> Result<(), VaultError> {
        self.request::<serde_json::Value, ()>(Method::DELETE, "sys/rekey/init", NO_BODY)
            .await?;
        Ok(())
    }

    async fn logical_read(&self, path: &str) -> Result<Option<Secret>, VaultError> {
        self.request(Method::GET, path, NO_BODY).await
    }

    async fn logical_write(
        &self,
        path: &str,
        data: &serde_json::Value,
    ) -> Result<Option<Secret>, VaultError> {
        self.request(Method::PUT, path, Some(data)).await
    }

    async fn create_orphan_token(
        &self,
        request: &TokenCreateRequest,
    ) -> Result<Secret, VaultError> {
        self.request_required(Method::POST, "auth/token/create-orphan", Some(request))
            .await
    }

    async fn revoke_self(&self) -> Result<(), VaultError> {
        self.request::<serde_json::Value, _>(
            Method::POST,
            "auth/token/revoke-self",
            Some(&serde_json::json!({})),
        )
        .await?;
        Ok(())
    }

    fn set_token(&self, token: &str) {
        if let Ok(mut guard) = self.token.write() {
            *guard = token.to_owned();
        }
    }

    fn token(&self) -> String {
        self.token.read().map(|t| t.clone()).unwrap_or_default()
    }
}

impl std::fmt::Debug for VaultHttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultHttpClient")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn address_trailing_slash_is_trimmed() {
        let client = VaultHttpClient::new("http://127.0.0.1:8200/");
        assert_eq!(client.address, "http://127.0.0.1:8200");
    }

    #[test]
    fn token_roundtrip_and_clear() {
        let client = VaultHttpClient::new("http://127.0.0.1:8200");
        assert_eq!(client.token(), "");
        client.set_token("s.abc123");
        assert_eq!(client.token(), "s.abc123");
        client.clear_token();
        assert_eq!(client.token(), "");
    }

    #[test]
    fn error_message_prefers_vault_errors_array() {
        let msg = error_message(
            r#"{"errors": ["permission denied", "bad nonce"]}"#,
            StatusCode::FORBIDDEN,
        );
        assert_eq!(msg, "permission denied; bad nonce");
    }

    #[test]
    fn error_message_falls_back_to_status() {
        assert_eq!(
            error_message("not json", StatusCode::INTERNAL_SERVER_ERROR),
            "HTTP 500"
        );
        assert_eq!(error_message(r#"{"errors": []}"#, StatusCode::BAD_REQUEST), "HTTP 400");
    }
}

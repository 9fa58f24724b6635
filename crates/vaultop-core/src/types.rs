//! Wire types for the Vault v1 HTTP API.
//!
//! Only the fields the operator reads are modeled; everything else in a
//! response is ignored. All response types default missing fields so the
//! client keeps working across Vault versions.

use serde::{Deserialize, Serialize};

/// `GET /v1/sys/init`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InitStatusResponse {
    #[serde(default)]
    pub initialized: bool,
}

/// `GET /v1/sys/seal-status`, also the shape of unseal responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SealStatusResponse {
    #[serde(default)]
    pub sealed: bool,
    /// Threshold of shares required to unseal.
    #[serde(default)]
    pub t: usize,
    /// Total number of shares.
    #[serde(default)]
    pub n: usize,
    /// Shares submitted so far in the current unseal attempt.
    #[serde(default)]
    pub progress: usize,
    #[serde(default)]
    pub initialized: bool,
    /// True when Vault runs with an auto-unseal (recovery) seal.
    #[serde(default)]
    pub recovery_seal: bool,
}

/// `PUT /v1/sys/init`
#[derive(Debug, Clone, Default, Serialize)]
pub struct InitRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_shares: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_threshold: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery_shares: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery_threshold: Option<usize>,
}

/// Response to `PUT /v1/sys/init`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InitResponse {
    /// Unseal key shares (hex form). Absent under a recovery seal.
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub keys_base64: Vec<String>,
    /// Recovery key shares, present only under a recovery seal.
    #[serde(default)]
    pub recovery_keys: Vec<String>,
    #[serde(default)]
    pub recovery_keys_base64: Vec<String>,
    #[serde(default)]
    pub root_token: String,
}

/// `GET /v1/sys/leader`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeaderResponse {
    #[serde(default)]
    pub ha_enabled: bool,
    #[serde(default)]
    pub is_self: bool,
    #[serde(default)]
    pub leader_address: String,
}

/// `POST /v1/sys/storage/raft/join`
#[derive(Debug, Clone, Default, Serialize)]
pub struct RaftJoinRequest {
    pub leader_api_addr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leader_ca_cert: Option<String>,
}

/// Response to a raft join request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RaftJoinResponse {
    #[serde(default)]
    pub joined: bool,
}

/// Status shape shared by generate-root attempt, init, and update calls.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateRootStatusResponse {
    #[serde(default)]
    pub started: bool,
    #[serde(default)]
    pub nonce: String,
    #[serde(default)]
    pub progress: usize,
    #[serde(default)]
    pub required: usize,
    #[serde(default)]
    pub complete: bool,
    /// One-time pad handed out at init time.
    #[serde(default)]
    pub otp: String,
    /// Zero on legacy servers, which signals the base64+UUID token shape.
    #[serde(default)]
    pub otp_length: usize,
    /// Modern field name for the masked token.
    #[serde(default)]
    pub encoded_token: String,
    /// Deprecated alias still emitted by Vault; some servers only fill
    /// this one.
    #[serde(default)]
    pub encoded_root_token: String,
}

impl GenerateRootStatusResponse {
    /// The OTP-masked root token, whichever field the server filled.
    #[must_use]
    pub fn encoded(&self) -> &str {
        if self.encoded_root_token.is_empty() {
            &self.encoded_token
        } else {
            &self.encoded_root_token
        }
    }
}

/// `GET /v1/sys/rekey/init`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RekeyStatusResponse {
    #[serde(default)]
    pub started: bool,
    #[serde(default)]
    pub nonce: String,
    #[serde(default)]
    pub t: usize,
    #[serde(default)]
    pub n: usize,
    #[serde(default)]
    pub progress: usize,
    #[serde(default)]
    pub required: usize,
}

/// `PUT /v1/sys/rekey/init`
#[derive(Debug, Clone, Default, Serialize)]
pub struct RekeyInitRequest {
    pub secret_shares: usize,
    pub secret_threshold: usize,
    /// Base64-encoded binary PGP public keys, one per new share.
    pub pgp_keys: Vec<String>,
    pub backup: bool,
}

/// Response to `PUT /v1/sys/rekey/update`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RekeyUpdateResponse {
    #[serde(default)]
    pub nonce: String,
    #[serde(default)]
    pub complete: bool,
    /// New shares; PGP-encrypted then base64-encoded when `pgp_keys` were
    /// supplied at init.
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub keys_base64: Vec<String>,
    #[serde(default)]
    pub pgp_fingerprints: Vec<String>,
}

/// `POST /v1/auth/token/create-orphan`
#[derive(Debug, Clone, Default, Serialize)]
pub struct TokenCreateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub policies: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub no_parent: bool,
}

/// Generic logical response: `{"data": ..., "auth": ..., "warnings": ...}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secret {
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub auth: Option<SecretAuth>,
    #[serde(default)]
    pub warnings: Option<Vec<String>>,
}

/// Auth block of a logical response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecretAuth {
    #[serde(default)]
    pub client_token: String,
    #[serde(default)]
    pub policies: Vec<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn seal_status_decodes_with_missing_fields() {
        let status: SealStatusResponse = serde_json::from_str(r#"{"sealed": true}"#).unwrap();
        assert!(status.sealed);
        assert!(!status.recovery_seal);
        assert_eq!(status.progress, 0);
    }

    #[test]
    fn generate_root_encoded_prefers_legacy_field() {
        let resp = GenerateRootStatusResponse {
            encoded_root_token: "legacy".to_owned(),
            encoded_token: "modern".to_owned(),
            ..Default::default()
        };
        assert_eq!(resp.encoded(), "legacy");

        let resp = GenerateRootStatusResponse {
            encoded_token: "modern".to_owned(),
            ..Default::default()
        };
        assert_eq!(resp.encoded(), "modern");
    }

    #[test]
    fn init_request_omits_unset_sides() {
        let req = InitRequest {
            recovery_shares: Some(5),
            recovery_threshold: Some(3),
            ..Default::default()
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("secret_shares").is_none());
        assert_eq!(json["recovery_shares"], 5);
    }

    #[test]
    fn rekey_update_response_decodes_keys() {
        let resp: RekeyUpdateResponse = serde_json::from_str(
            r#"{"complete": true, "keys_base64": ["RTA=", "RTE="], "nonce": "n"}"#,
        )
        .unwrap();
        assert!(resp.complete);
        assert_eq!(resp.keys_base64, vec!["RTA=", "RTE="]);
    }
}

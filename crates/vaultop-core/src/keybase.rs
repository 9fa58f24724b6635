//! Keybase public-key fetcher.
//!
//! Resolves `keybase:<user>` identifiers to base64-encoded binary OpenPGP
//! public keys via Keybase's public lookup API. Vault's rekey endpoint
//! accepts the keys in exactly that form.
//!
//! The fetch is all-or-nothing: if any requested user is missing a primary
//! key, the whole call fails so a rekey never runs with a partial
//! recipient set.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use pgp::ser::Serialize as _;
use pgp::{Deserializable, SignedPublicKey};
use serde::Deserialize;
use tracing::debug;

/// Identifier prefix marking a Keybase recipient.
pub const KEYBASE_PREFIX: &str = "keybase:";

const KEYBASE_BASE_URL: &str = "https://keybase.io";

/// Errors from the Keybase fetcher.
#[derive(Debug, thiserror::Error)]
pub enum KeybaseError {
    /// Transport failure talking to the Keybase API.
    #[error("keybase request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Keybase answered with a non-OK status object.
    #[error("got non-OK response from keybase: '{name}'")]
    Status { name: String },

    /// One or more requested users have no primary public key.
    #[error("unable to fetch keys for user(s) '{}' from keybase", names.join(","))]
    MissingKeys { names: Vec<String> },

    /// A returned bundle failed to parse or reserialize.
    #[error("primary key could not be processed for user '{user}': {reason}")]
    Pgp { user: String, reason: String },
}

/// Source of PGP public keys for rekey recipients.
#[async_trait::async_trait]
pub trait PgpKeySource: Send + Sync {
    /// Resolve identifiers to base64-encoded binary public keys,
    /// preserving input order. Entries without the `keybase:` prefix are
    /// dropped, not errors.
    async fn fetch(&self, identifiers: &[String]) -> Result<Vec<String>, KeybaseError>;
}

/// HTTP client for the Keybase user lookup API.
#[derive(Debug, Clone)]
pub struct KeybaseClient {
    base_url: String,
    http: reqwest::Client,
}

impl Default for KeybaseClient {
    fn default() -> Self {
        Self::new()
    }
}

impl KeybaseClient {
    /// Client against the public `keybase.io` endpoint.
    #[must_use]
    pub fn new() -> Self {
        Self::with_base_url(KEYBASE_BASE_URL)
    }

    /// Client against an alternative endpoint, for tests.
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            http: reqwest::Client::new(),
        }
    }

    fn lookup_url(&self, usernames: &[String]) -> String {
        let csv = usernames
            .iter()
            .map(|u| urlencoding::encode(u).into_owned())
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "{}/_/api/1.0/user/lookup.json?usernames={csv}&fields=public_keys",
            self.base_url
        )
    }
}

/// Keep only `keybase:`-prefixed entries, stripped of the prefix.
fn usernames_of(identifiers: &[String]) -> Vec<String> {
    identifiers
        .iter()
        .filter_map(|id| id.strip_prefix(KEYBASE_PREFIX))
        .map(str::to_owned)
        .collect()
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    status: LookupStatus,
    #[serde(default)]
    them: Vec<Option<LookupUser>>,
}

#[derive(Debug, Deserialize)]
struct LookupStatus {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct LookupUser {
    #[serde(default)]
    public_keys: PublicKeys,
}

#[derive(Debug, Default, Deserialize)]
struct PublicKeys {
    #[serde(default)]
    primary: PrimaryKey,
}

#[derive(Debug, Default, Deserialize)]
struct PrimaryKey {
    #[serde(default)]
    bundle: String,
}

/// Parse an armored bundle, require exactly one entity, and reserialize it
/// to base64-encoded binary form.
fn encode_bundle(user: &str, bundle: &str) -> Result<String, KeybaseError> {
    let pgp_err = |reason: String| KeybaseError::Pgp {
        user: user.to_owned(),
        reason,
    };

    let (entities, _headers) =
        SignedPublicKey::from_string_many(bundle).map_err(|err| pgp_err(err.to_string()))?;
    let entities: Vec<SignedPublicKey> = entities
        .collect::<Result<_, _>>()
        .map_err(|err| pgp_err(err.to_string()))?;

    if entities.len() != 1 {
        return Err(pgp_err(format!(
            "expected exactly one key entity, found {}",
            entities.len()
        )));
    }

    let binary = entities[0]
        .to_bytes()
        .map_err(|err| pgp_err(format!("serializing entity: {err}")))?;

    Ok(BASE64.encode(binary))
}

#[async_trait::async_trait]
impl PgpKeySource for KeybaseClient {
    async fn fetch(&self, identifiers: &[String]) -> Result<Vec<String>, KeybaseError> {
        let usernames = usernames_of(identifiers);
        if usernames.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.lookup_url(&usernames);
        debug!(users = usernames.len(), "fetching keybase public keys");

        let resp: LookupResponse = self.http.get(&url).send().await?.json().await?;

        if resp.status.name != "OK" {
            return Err(KeybaseError::Status {
                name: resp.status.name,
            });
        }

        let mut keys = Vec::with_capacity(usernames.len());
        let mut missing = Vec::new();

        // The API answers in request order; a user without a primary key
        // shows up as a null entry or an empty bundle.
        for (i, username) in usernames.iter().enumerate() {
            let bundle = resp
                .them
                .get(i)
                .and_then(Option::as_ref)
                .map(|user| user.public_keys.primary.bundle.as_str())
                .unwrap_or_default();

            if bundle.is_empty() {
                missing.push(username.clone());
                continue;
            }

            keys.push(encode_bundle(username, bundle)?);
        }

        if !missing.is_empty() {
            return Err(KeybaseError::MissingKeys { names: missing });
        }

        Ok(keys)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn usernames_drop_unprefixed_entries() {
        let ids = vec![
            "keybase:alice".to_owned(),
            "bob".to_owned(),
            "keybase:carol".to_owned(),
        ];
        assert_eq!(usernames_of(&ids), vec!["alice", "carol"]);
    }

    #[test]
    fn usernames_all_dropped_is_empty_not_error() {
        let ids = vec!["gpg:dave".to_owned(), "erin".to_owned()];
        assert!(usernames_of(&ids).is_empty());
    }

    #[test]
    fn lookup_url_joins_usernames_csv() {
        let client = KeybaseClient::with_base_url("https://keybase.example");
        let url = client.lookup_url(&["alice".to_owned(), "bob".to_owned()]);
        assert_eq!(
            url,
            "https://keybase.example/_/api/1.0/user/lookup.json?usernames=alice,bob&fields=public_keys"
        );
    }

    #[test]
    fn lookup_response_decodes_null_users() {
        let resp: LookupResponse = serde_json::from_str(
            r#"{
                "status": {"name": "OK"},
                "them": [
                    {"public_keys": {"primary": {"bundle": "-----BEGIN..."}}},
                    null
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(resp.status.name, "OK");
        assert_eq!(resp.them.len(), 2);
        assert!(resp.them[1].is_none());
        assert_eq!(
            resp.them[0].as_ref().unwrap().public_keys.primary.bundle,
            "-----BEGIN..."
        );
    }

    #[test]
    fn encode_bundle_rejects_garbage() {
        let err = encode_bundle("alice", "not an armored key").unwrap_err();
        assert!(matches!(err, KeybaseError::Pgp { .. }));
    }
}

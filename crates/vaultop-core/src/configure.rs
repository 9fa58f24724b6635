//! Declarative configuration of an unsealed Vault.
//!
//! Configure acquires a root token (from the keystore, or by running the
//! generate-root protocol against the stored shares), applies the external
//! configuration stage by stage, and guarantees on every exit path that
//! the client token is cleared and the root-token buffer zeroized.

use serde_json::Value;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::api::VaultApi;
use crate::error::OperatorError;
use crate::external::ExternalConfig;
use crate::keys::{recovery_key_for, unseal_key_for, KEY_ROOT_TOKEN};
use crate::operator::Operator;
use crate::xor::{format_uuid, xor_base64, xor_bytes};

/// Clears the Vault client token when dropped, so no exit path of
/// Configure leaves a root token on the client.
struct TokenScope<'a> {
    vault: &'a dyn VaultApi,
}

impl Drop for TokenScope<'_> {
    fn drop(&mut self) {
        self.vault.clear_token();
    }
}

impl Operator {
    /// Apply a declarative configuration document to Vault.
    ///
    /// Acquires a root token (from the keystore, or via generate-root),
    /// sets it on the client, decodes the document strictly (unknown
    /// fields are errors) onto a fresh instance, then applies it in fixed
    /// stage order: audit devices, auth methods, identity groups, plugins,
    /// policies, secret engines, startup secrets. Earlier stages complete
    /// fully before later stages begin; a failure aborts the remainder.
    ///
    /// # Errors
    ///
    /// - [`OperatorError::Config`] on decode failure.
    /// - Any keystore, Vault, or protocol failure from token acquisition
    ///   or a configuration stage.
    pub async fn configure(&self, document: Value) -> Result<(), OperatorError> {
        let _token_scope = TokenScope {
            vault: self.vault.as_ref(),
        };

        let root_token: Zeroizing<Vec<u8>> = if self.config.store_root_token {
            debug!(key = KEY_ROOT_TOKEN, "retrieving root token from key store");
            Zeroizing::new(
                self.key_store
                    .get(KEY_ROOT_TOKEN)
                    .await
                    .map_err(|err| OperatorError::store(KEY_ROOT_TOKEN, err))?,
            )
        } else {
            self.generate_root_token().await?
        };

        let token_str = std::str::from_utf8(&root_token)
            .map_err(|_| OperatorError::protocol("root token is not valid UTF-8"))?;
        self.vault.set_token(token_str.trim());

        let config = ExternalConfig::decode(document)?;

        self.apply_external_config(&config).await
    }

    /// Run the generate-root protocol and recover the new root token from
    /// its OTP-masked encoding.
    async fn generate_root_token(&self) -> Result<Zeroizing<Vec<u8>>, OperatorError> {
        info!("initiating generate-root token process");

        // Clear any in-flight session left over from a previous attempt.
        if let Err(err) = self.vault.generate_root_cancel().await {
            warn!(error = %err, "failed to cancel stale generate-root session");
        }

        let init = self.vault.generate_root_init().await?;
        let nonce = init.nonce;
        let otp = init.otp;
        let otp_length = init.otp_length;

        let seal = self.vault.seal_status().await?;

        for i in 0..init.required {
            let key_id = if seal.recovery_seal {
                recovery_key_for(i)
            } else {
                unseal_key_for(i)
            };

            debug!(key = %key_id, "retrieving key from key store");
            let share = self.key_store_get_string(&key_id).await?;

            let resp = self.vault.generate_root_update(&share, &nonce).await?;

            if resp.complete {
                let token = decode_root_token(resp.encoded(), &otp, otp_length)?;
                return Ok(token);
            }
        }

        Err(OperatorError::protocol(
            "generate-root did not complete after submitting all required keys",
        ))
    }

    /// Apply the decoded config, stage by stage, in fixed order.
    async fn apply_external_config(&self, config: &ExternalConfig) -> Result<(), OperatorError> {
        self.configure_audit_devices(&config.audit).await?;
        self.configure_auth_methods(&config.auth).await?;
        self.configure_identity_groups(&config.groups, &config.group_aliases)
            .await?;
        self.configure_plugins(&config.plugins).await?;
        self.configure_policies(&config.policies).await?;
        self.configure_secrets_engines(&config.secrets).await?;
        self.configure_startup_secrets(&config.startup_secrets).await
    }

    /// Enable audit devices that are not already mounted.
    async fn configure_audit_devices(&self, audit: &[Value]) -> Result<(), OperatorError> {
        if audit.is_empty() {
            return Ok(());
        }

        let mounted = self.vault.logical_read("sys/audit").await?;

        for device in audit {
            let path = element_path(device, "type", "audit device")?;

            let already = mounted
                .as_ref()
                .and_then(|secret| secret.data.as_ref())
                .and_then(|data| data.get(format!("{path}/")))
                .is_some();
            if already {
                debug!(path = %path, "audit device already enabled");
                continue;
            }

            self.vault
                .logical_write(&format!("sys/audit/{path}"), device)
                .await?;
            info!(path = %path, "audit device enabled");
        }

        Ok(())
    }

    /// Enable and configure auth methods.
    async fn configure_auth_methods(&self, auth: &[Value]) -> Result<(), OperatorError> {
        for method in auth {
            let path = element_path(method, "type", "auth method")?;
            self.vault
                .logical_write(&format!("sys/auth/{path}"), method)
                .await?;
            info!(path = %path, "auth method configured");
        }
        Ok(())
    }

    /// Write identity groups, then group aliases.
    async fn configure_identity_groups(
        &self,
        groups: &[Value],
        aliases: &[Value],
    ) -> Result<(), OperatorError> {
        for group in groups {
            let name = element_field(group, "name", "identity group")?;
            self.vault.logical_write("identity/group", group).await?;
            info!(group = %name, "identity group written");
        }

        for alias in aliases {
            let name = element_field(alias, "name", "group alias")?;
            self.vault
                .logical_write("identity/group-alias", alias)
                .await?;
            info!(alias = %name, "group alias written");
        }

        Ok(())
    }

    /// Register plugins in the catalog.
    async fn configure_plugins(&self, plugins: &[Value]) -> Result<(), OperatorError> {
        for plugin in plugins {
            let name = element_field(plugin, "plugin_name", "plugin")?;
            let kind = element_field(plugin, "type", "plugin")?;
            self.vault
                .logical_write(&format!("sys/plugins/catalog/{kind}/{name}"), plugin)
                .await?;
            info!(plugin = %name, "plugin registered");
        }
        Ok(())
    }

    /// Write ACL policies.
    async fn configure_policies(&self, policies: &[Value]) -> Result<(), OperatorError> {
        for policy in policies {
            let name = element_field(policy, "name", "policy")?;
            let rules = element_field(policy, "rules", "policy")?;
            let body = serde_json::json!({ "policy": rules });
            self.vault
                .logical_write(&format!("sys/policies/acl/{name}"), &body)
                .await?;
            info!(policy = %name, "policy written");
        }
        Ok(())
    }

    /// Mount secret engines.
    async fn configure_secrets_engines(&self, secrets: &[Value]) -> Result<(), OperatorError> {
        for engine in secrets {
            let path = element_path(engine, "type", "secrets engine")?;
            self.vault
                .logical_write(&format!("sys/mounts/{path}"), engine)
                .await?;
            info!(path = %path, "secrets engine mounted");
        }
        Ok(())
    }

    /// Write startup secrets to their logical paths.
    async fn configure_startup_secrets(&self, secrets: &[Value]) -> Result<(), OperatorError> {
        for secret in secrets {
            let path = element_field(secret, "path", "startup secret")?;
            let data = secret.get("data").cloned().unwrap_or(Value::Null);
            if data.is_null() {
                return Err(OperatorError::Config {
                    reason: format!("startup secret '{path}' has no data"),
                });
            }
            self.vault.logical_write(&path, &data).await?;
            info!(path = %path, "startup secret written");
        }
        Ok(())
    }
}

/// Recover the plain root token from the OTP-masked encoding.
///
/// Legacy servers (OTP length 0) base64 both sides and the result is a
/// 16-byte UUID; modern servers raw-base64 the token and hand out an
/// OTP of matching length.
fn decode_root_token(
    encoded: &str,
    otp: &str,
    otp_length: usize,
) -> Result<Zeroizing<Vec<u8>>, OperatorError> {
    use base64::engine::general_purpose::STANDARD_NO_PAD as BASE64_RAW;
    use base64::Engine as _;

    if otp_length == 0 {
        let token_bytes = Zeroizing::new(xor_base64(encoded, otp)?);
        let uuid = format_uuid(&token_bytes)?;
        return Ok(Zeroizing::new(uuid.trim().as_bytes().to_vec()));
    }

    let masked = Zeroizing::new(BASE64_RAW.decode(encoded).map_err(|err| {
        OperatorError::protocol(format!("error decoding base64 encoded root token: {err}"))
    })?);

    Ok(Zeroizing::new(xor_bytes(&masked, otp.as_bytes())?))
}

/// The mount path of a config element: explicit `path`, or its `type`.
fn element_path(element: &Value, type_field: &str, what: &str) -> Result<String, OperatorError> {
    if let Some(path) = element.get("path").and_then(Value::as_str) {
        return Ok(path.trim_matches('/').to_owned());
    }
    element_field(element, type_field, what)
}

/// A required string field of a config element.
fn element_field(element: &Value, field: &str, what: &str) -> Result<String, OperatorError> {
    element
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| OperatorError::Config {
            reason: format!("{what} element is missing required field '{field}'"),
        })
}

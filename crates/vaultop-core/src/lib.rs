//! Core of the `vaultop` Vault lifecycle operator.
//!
//! Brings a HashiCorp-Vault-compatible server from uninitialized to
//! initialized, unsealed, and configured, and rotates unseal material
//! with Keybase-held PGP keys. All key material lives in an external
//! keystore behind the [`vaultop_store::KeyStore`] port.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use vaultop_core::{Operator, OperatorConfig, VaultHttpClient};
//! use vaultop_store::MemoryStore;
//!
//! # async fn example() -> Result<(), vaultop_core::OperatorError> {
//! let vault = Arc::new(VaultHttpClient::from_env()?);
//! let config = OperatorConfig::new(5, 3)?.with_store_root_token(true);
//! let operator = Operator::new(Arc::new(MemoryStore::new()), vault, config)?;
//!
//! operator.init().await?;
//! operator.unseal().await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod client;
pub mod config;
mod configure;
pub mod error;
pub mod external;
pub mod keybase;
pub mod keys;
mod operator;
mod rekey;
pub mod types;
pub mod xor;

#[cfg(test)]
mod testing;

pub use api::VaultApi;
pub use client::VaultHttpClient;
pub use config::OperatorConfig;
pub use error::{OperatorError, VaultError};
pub use external::ExternalConfig;
pub use keybase::{KeybaseClient, KeybaseError, PgpKeySource};
pub use operator::Operator;

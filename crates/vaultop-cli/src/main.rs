//! `vaultop` CLI: lifecycle operator for a Vault server.
//!
//! Each verb maps to one operator operation. `init`, `unseal`,
//! `configure`, and `raft-join` are one-shot and reentrant; external
//! schedulers rerun them freely. `rekey` runs an infinite control loop
//! and never exits normally.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{debug, info};
use vaultop_core::{Operator, OperatorConfig, VaultHttpClient};
use vaultop_store::{FileStore, KeyStore, MemoryStore};

/// vaultop: bring a Vault server to initialized, unsealed, configured.
#[derive(Parser)]
#[command(
    name = "vaultop",
    version,
    about = "Vault lifecycle operator: init, unseal, rekey, configure, raft-join",
    long_about = None,
    after_help = "Environment variables:\n  \
        VAULT_ADDR           Vault server address (default: https://127.0.0.1:8200)\n  \
        VAULT_TOKEN          Client token\n  \
        VAULT_CACERT         Path to a PEM CA certificate\n  \
        VAULT_SKIP_VERIFY    Disable TLS verification (development only)\n  \
        VAULT_RAFT_CACERT    CA certificate for raft join (falls back to VAULT_CACERT)\n  \
        POD_NAME             Replica name; a -0 suffix marks the bootstrap node"
)]
struct Cli {
    #[command(flatten)]
    store: StoreArgs,

    #[command(flatten)]
    operator: OperatorArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct StoreArgs {
    /// Keystore backend holding unseal shares and the root token.
    #[arg(long, global = true, value_enum, default_value = "file")]
    key_store: StoreBackend,

    /// Root directory of the file keystore backend.
    #[arg(long, global = true, default_value = "./vaultop-keys")]
    key_store_path: PathBuf,
}

#[derive(Args)]
struct OperatorArgs {
    /// How many key shares to generate at init.
    #[arg(long, global = true, default_value_t = 5)]
    secret_shares: usize,

    /// How many shares are needed to unseal.
    #[arg(long, global = true, default_value_t = 3)]
    secret_threshold: usize,

    /// Replace the generated root token with this predefined one at init.
    #[arg(long, global = true, env = "VAULT_INIT_ROOT_TOKEN", default_value = "")]
    init_root_token: String,

    /// Store the root token in the keystore.
    #[arg(long, global = true)]
    store_root_token: bool,

    /// Probe the keystore for read+write access before init.
    #[arg(long, global = true)]
    pre_flight_checks: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum StoreBackend {
    /// One file per key under --key-store-path. Development only.
    File,
    /// In-process map, lost at exit. Only useful with the rekey loop.
    Memory,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize Vault and store the produced key material.
    Init,
    /// Unseal Vault from the stored key shares.
    Unseal,
    /// Continuously rekey Vault, encrypting new shares with Keybase PGP keys.
    Rekey {
        /// Comma-separated recipients, each of the form keybase:<user>.
        #[arg(long, required = true)]
        pgp_keys: String,

        /// Seconds to wait between rekey attempts.
        #[arg(long, default_value_t = 10)]
        retry_period: u64,
    },
    /// Apply a declarative configuration document to Vault.
    Configure {
        /// Path to the YAML configuration document.
        #[arg(long, default_value = "vault-config.yml")]
        vault_config: PathBuf,
    },
    /// Join this node to a raft cluster.
    RaftJoin {
        /// API address of the raft leader. Empty on the bootstrap node.
        #[arg(long, default_value = "")]
        leader_address: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let key_store: Arc<dyn KeyStore> = match cli.store.key_store {
        StoreBackend::File => Arc::new(FileStore::new(cli.store.key_store_path.clone())),
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
    };
    debug!("created key store");

    let vault = Arc::new(VaultHttpClient::from_env().context("error connecting to vault")?);
    debug!("connected to vault");

    let config = OperatorConfig::new(cli.operator.secret_shares, cli.operator.secret_threshold)
        .context("invalid operator configuration")?
        .with_init_root_token(cli.operator.init_root_token.clone())
        .with_store_root_token(cli.operator.store_root_token)
        .with_pre_flight_checks(cli.operator.pre_flight_checks);

    let operator =
        Operator::new(key_store, vault, config).context("error creating vault operator")?;

    match cli.command {
        Commands::Init => operator.init().await.context("error initializing vault")?,
        Commands::Unseal => operator.unseal().await.context("error unsealing vault")?,
        Commands::Rekey {
            pgp_keys,
            retry_period,
        } => rekey_loop(&operator, &pgp_keys, Duration::from_secs(retry_period)).await?,
        Commands::Configure { vault_config } => {
            let document = load_config_document(&vault_config)?;
            operator
                .configure(document)
                .await
                .context("error configuring vault")?;
            info!("successfully configured vault");
        }
        Commands::RaftJoin { leader_address } => operator
            .raft_join(&leader_address)
            .await
            .context("error joining raft cluster")?,
    }

    Ok(())
}

/// The rekey control loop: on each tick, rekey unless the new shares
/// already exist or Vault is sealed. Never returns Ok.
async fn rekey_loop(operator: &Operator, pgp_keys: &str, retry_period: Duration) -> Result<()> {
    let recipients: Vec<String> = pgp_keys
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_owned)
        .collect();

    if recipients.is_empty() {
        bail!("no PGP recipients provided, pass --pgp-keys keybase:<user>[,keybase:<user>...]");
    }

    loop {
        debug!("checking if rekeyed unseal keys already exist");
        let exists = operator
            .new_unseal_keys_exist(&recipients)
            .await
            .context("error checking if unseal keys already exist")?;

        if exists {
            debug!("rekeyed unseal keys already exist");
        } else {
            let sealed = operator
                .sealed()
                .await
                .context("error checking if vault is sealed")?;

            if sealed {
                debug!("vault is sealed, waiting before rekeying");
            } else {
                operator
                    .rekey(&recipients)
                    .await
                    .context("error rekeying vault")?;
                info!("successfully rekeyed vault");
            }
        }

        debug!(retry_period_secs = retry_period.as_secs(), "waiting for retry period");
        tokio::time::sleep(retry_period).await;
    }
}

/// Load the YAML configuration document as JSON for the operator.
fn load_config_document(path: &std::path::Path) -> Result<serde_json::Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("error reading vault config '{}'", path.display()))?;
    let document: serde_json::Value = serde_yaml::from_str(&raw)
        .with_context(|| format!("error parsing vault config '{}'", path.display()))?;
    Ok(document)
}

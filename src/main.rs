//! Deposit Wallet Sweeper
//!
//! Polls custodial deposit wallets for stablecoin balances and sweeps them
//! to an omnibus address through a remote custody signer.
//! Subcommands:
//! - `watch`: run the sweep loop (default)
//! - `provision <userId>`: create a deposit wallet and record it
//! - `apply-policy deposit|omnibus`: expand a policy template and submit it

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sweeper_api::CustodyClient;
use sweeper_chain::ChainClient;
use sweeper_core::config::registry_path_from_env;
use sweeper_core::{
    apply_policy, provision_user, CustodySettings, CustodySignerBinder, PolicyError, PolicyKind,
    PolicySettings, RegistryError, Scanner, ScannerConfig, SweeperConfig, Sweeper, Tuning,
    WalletRegistry,
};

const DEFAULT_LOG_FILTER: &str = "info,sweeper_core=debug,sweeper_chain=debug";

/// Deposit wallet sweeper
#[derive(Parser)]
#[command(name = "sweeper")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan deposit wallets and sweep balances to the omnibus address
    Watch {
        /// Run a single pass and exit
        #[arg(long)]
        once: bool,
    },

    /// Create a custody wallet for a user and append it to the registry
    Provision {
        /// User identifier (unique in the registry)
        user_id: String,
    },

    /// Expand a policy template and create it in ORG_ID / OMNIBUS_ORG_ID
    ApplyPolicy {
        /// deposit or omnibus
        kind: PolicyKind,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Watch { once: false }) {
        Commands::Watch { once } => watch(once).await,
        Commands::Provision { user_id } => provision(&user_id).await,
        Commands::ApplyPolicy { kind } => apply(kind).await,
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var("LOG_FORMAT")
        .map(|f| f.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

async fn watch(once: bool) -> Result<()> {
    // Registry first: with nothing to sweep there is nothing to connect to.
    let registry = WalletRegistry::new(registry_path_from_env());
    let wallets = match registry.load() {
        Ok(wallets) => wallets,
        Err(RegistryError::Empty(path)) => {
            info!(
                registry = %path.display(),
                "No users in registry. Run: sweeper provision <userId>"
            );
            return Ok(());
        }
        Err(e) => return Err(e).context("Failed to load wallet registry"),
    };
    info!(registry = %registry.path().display(), wallets = wallets.len(), "Loaded wallet registry");

    let mut config = SweeperConfig::from_env().context("Invalid configuration")?;
    if once {
        config.tuning.max_iterations = Some(1);
    }
    config.log_config();

    let chain = ChainClient::new(
        &config.rpc_url,
        config.network.clone(),
        config.tuning.gas.clone(),
        config.tuning.rpc_timeout(),
    )
    .context("Failed to create chain client")?;
    chain.verify().await.context("RPC endpoint check failed")?;

    let custody = Arc::new(
        CustodyClient::new(config.custody.client_config(config.tuning.custody_timeout()))
            .context("Failed to create custody client")?,
    );

    let sweeper = Sweeper::new(
        Arc::new(chain.clone()),
        Arc::new(CustodySignerBinder::new(chain, custody)),
        config.omnibus,
        config.threshold,
        config.network.chain_id,
    );
    let scanner = Scanner::new(
        Arc::new(sweeper),
        wallets,
        config.tokens.clone(),
        ScannerConfig::from_config(&config),
    );

    let passes = scanner.run(shutdown_signal()).await;
    info!(passes = passes, "Sweeper stopped");
    Ok(())
}

async fn provision(user_id: &str) -> Result<()> {
    let settings = CustodySettings::from_env().context("Invalid custody configuration")?;
    let custody = CustodyClient::new(settings.client_config(Tuning::default().custody_timeout()))
        .context("Failed to create custody client")?;
    let registry = WalletRegistry::new(registry_path_from_env());

    let wallet = provision_user(&custody, &registry, user_id)
        .await
        .with_context(|| format!("Provisioning failed for user {user_id}"))?;

    println!("{}", serde_json::to_string_pretty(&wallet)?);
    Ok(())
}

async fn apply(kind: PolicyKind) -> Result<()> {
    let settings = PolicySettings::from_env().context("Invalid policy configuration")?;
    let custody_settings = CustodySettings::from_env().context("Invalid custody configuration")?;
    let custody = CustodyClient::new(custody_settings.client_config(Tuning::default().custody_timeout()))
        .context("Failed to create custody client")?;

    match apply_policy(&custody, kind, &settings).await {
        Ok(policy_id) => {
            info!(org_id = %settings.org_id, policy_id = %policy_id, "Applied policy");
            Ok(())
        }
        Err(PolicyError::Submit { source, expanded }) => {
            error!(error = %source, "Policy apply failed");
            eprintln!(
                "If the endpoint path differs, set TURNKEY_POLICY_CREATE_PATH, or paste the expanded policy into the custody dashboard:"
            );
            println!("{}", serde_json::to_string_pretty(&expanded)?);
            Err(source).context("Policy apply failed")
        }
        Err(e) => Err(e).context("Policy apply failed"),
    }
}

/// Resolves on Ctrl-C. If the handler cannot be installed, never resolves.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Ctrl-C received, shutting down");
}

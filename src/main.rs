//! pump-bundler command line
//!
//! Wallet setup, the three-phase launch, liquidation and a balance report.
//! Every run loads `config.toml` (or defaults), then `.env` and environment
//! overrides for the RPC endpoint and relay token.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use solana_sdk::{pubkey::Pubkey, signature::Keypair, signer::Signer};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pump_bundler::config::Config;
use pump_bundler::metadata::PumpIpfsClient;
use pump_bundler::metrics::metrics;
use pump_bundler::retry::{cancellation, CancelHandle};
use pump_bundler::rpc_manager::{ChainReader, RpcChainReader};
use pump_bundler::tx_builder::{BloxrouteRelay, BundleBuilder, RelaySubmitter, TxBuilder};
use pump_bundler::wallet::{
    create_mint, save_new_wallet, FileWalletStore, WalletError, WalletRole, WalletStore,
};
use pump_bundler::workflow::{
    balance_report, create_and_fund_wallet, LaunchIdentities, LaunchSettings, LaunchWorkflow,
    SellAllOutcome, SellAllWorkflow,
};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate the mint keypair for the next launch
    CreateMint,

    /// Generate a wallet for a role; non-creator wallets are funded by the creator
    CreateWallet {
        /// creator, second or third
        role: WalletRole,

        /// Save the keypair without funding it
        #[arg(long)]
        no_fund: bool,
    },

    /// Create the token, seed it and run the secondary sell and rebuy
    Launch,

    /// Sell every wallet's balance of a mint in one bundle
    SellAll {
        /// Mint to liquidate; defaults to the saved mint keypair
        #[arg(long)]
        mint: Option<Pubkey>,
    },

    /// Print the SOL balance of every saved wallet
    Balances,
}

/// Shared clients built once per invocation
struct Services {
    reader: Arc<dyn ChainReader>,
    builder: Arc<TxBuilder>,
}

impl Services {
    fn new(config: &Config) -> Result<Self> {
        let commitment = RpcChainReader::parse_commitment(&config.rpc.commitment)?;
        let reader: Arc<dyn ChainReader> = Arc::new(RpcChainReader::new(
            config.rpc.endpoint.clone(),
            commitment,
            config.rpc_timeout(),
        ));
        let builder = Arc::new(TxBuilder::new(reader.clone(), config.tx_builder_config()));
        Ok(Self { reader, builder })
    }

    fn submitter(&self, config: &Config) -> Result<Arc<RelaySubmitter>> {
        let relay = BloxrouteRelay::new(
            config.relay.submit_batch_url.clone(),
            config.relay.auth_token.clone(),
            config.relay_timeout(),
        )?;
        Ok(Arc::new(RelaySubmitter::new(
            self.reader.clone(),
            BundleBuilder::new(self.reader.clone(), config.tip_config()?),
            Arc::new(relay),
            config.simulation_policy(),
        )))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.json_logs);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting pump-bundler");
    let config = Config::from_file_with_env(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    let store = FileWalletStore::new(&config.wallets.dir);

    let (cancel, token) = cancellation();
    spawn_shutdown_listener(cancel);

    let result: Result<()> = async {
        match args.command {
            Command::CreateMint => {
                let mint = create_mint(&store)?;
                println!("{}", mint.pubkey());
                Ok(())
            }
            Command::CreateWallet { role, no_fund } => {
                create_wallet(&config, &store, role, no_fund).await
            }
            Command::Launch => {
                let services = Services::new(&config)?;
                let ids = LaunchIdentities::load(&store)?;
                let metadata = PumpIpfsClient::new(
                    config.metadata.api_url.clone(),
                    config.metadata.image_path.clone(),
                    config.metadata_timeout(),
                )?;
                let workflow = LaunchWorkflow::new(
                    services.reader.clone(),
                    services.builder.clone(),
                    services.submitter(&config)?,
                    Arc::new(metadata),
                    LaunchSettings::from_config(&config),
                );

                let report = workflow.run(&ids, &config.token, &token).await?;
                info!(
                    mint = %report.mint,
                    uri = %report.metadata_uri,
                    secondary_balance = report.secondary_balance,
                    first_bundle = %report.first_bundle.span_id,
                    second_bundle = %report.second_bundle.span_id,
                    "Launch complete"
                );
                println!("{}", report.mint);
                Ok(())
            }
            Command::SellAll { mint } => sell_all(&config, &store, mint).await,
            Command::Balances => {
                let services = Services::new(&config)?;
                let wallets: Vec<(WalletRole, Pubkey)> = load_existing(&store, &WalletRole::ALL)?
                    .into_iter()
                    .map(|(role, keypair)| (role, keypair.pubkey()))
                    .collect();
                for balance in balance_report(services.reader.as_ref(), &wallets).await? {
                    println!("{balance}");
                }
                Ok(())
            }
        }
    }
    .await;

    debug!(metrics = %metrics().render(), "Final metrics");
    if let Err(e) = &result {
        error!(error = %e, "Command failed");
    }
    result
}

/// Initialize logging subsystem
fn init_logging(verbose: bool, json: bool) {
    let default_filter = if verbose {
        "pump_bundler=debug,info"
    } else {
        "pump_bundler=info,warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    }
}

/// Cancels in-flight work on ctrl-c.
fn spawn_shutdown_listener(cancel: CancelHandle) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received shutdown signal, cancelling");
            cancel.cancel();
        }
    });
}

async fn create_wallet(
    config: &Config,
    store: &FileWalletStore,
    role: WalletRole,
    no_fund: bool,
) -> Result<()> {
    if role == WalletRole::Mint {
        anyhow::bail!("use create-mint for the mint keypair");
    }
    if role == WalletRole::Creator || no_fund {
        let wallet = save_new_wallet(store, role)?;
        println!("{}", wallet.pubkey());
        return Ok(());
    }

    let services = Services::new(config)?;
    let funder = store
        .load(WalletRole::Creator)
        .context("the creator wallet funds new wallets")?;
    let (wallet, signature) = create_and_fund_wallet(
        store,
        role,
        services.reader.as_ref(),
        &services.builder,
        &funder,
        config.funding_lamports(),
        &config.funding_retry(),
    )
    .await?;
    info!(role = %role, signature = %signature, "Wallet funded");
    println!("{}", wallet.pubkey());
    Ok(())
}

async fn sell_all(config: &Config, store: &FileWalletStore, mint: Option<Pubkey>) -> Result<()> {
    let mint = match mint {
        Some(mint) => mint,
        None => store
            .load(WalletRole::Mint)
            .context("no --mint given and no saved mint keypair")?
            .pubkey(),
    };
    let creator = store.load(WalletRole::Creator)?;
    let others = load_existing(store, &[WalletRole::Second, WalletRole::Third])?;

    let mut holders: Vec<&Keypair> = vec![&creator];
    holders.extend(others.iter().map(|(_, keypair)| keypair));

    let services = Services::new(config)?;
    let workflow = SellAllWorkflow::new(
        services.reader.clone(),
        services.builder.clone(),
        services.submitter(config)?,
    );

    match workflow.run(&mint, &creator, &holders).await? {
        SellAllOutcome::NothingToSell => info!(mint = %mint, "Nothing to sell"),
        SellAllOutcome::Submitted {
            sellers,
            payer,
            receipt,
        } => info!(
            mint = %mint,
            sellers = sellers.len(),
            payer = %payer,
            entries = receipt.entries,
            "Sell-all bundle submitted"
        ),
    }
    Ok(())
}

/// Loads the wallets that exist on disk, skipping roles that were never created.
fn load_existing(
    store: &FileWalletStore,
    roles: &[WalletRole],
) -> Result<Vec<(WalletRole, Keypair)>> {
    let mut wallets = Vec::with_capacity(roles.len());
    for &role in roles {
        match store.load(role) {
            Ok(keypair) => wallets.push((role, keypair)),
            Err(WalletError::NotFound { path, .. }) => {
                debug!(role = %role, path = %path.display(), "Wallet not created, skipping")
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(wallets)
}

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;

use tracked_wallet::config::{self, Config};
use tracked_wallet::discovery::{HdSequentialDiscovery, WatchOnlyKeyAgent};
use tracked_wallet::provider::{ConnectionStatusTracker, HttpProvider};
use tracked_wallet::store::{Database, WalletStores};
use tracked_wallet::tracker::Shutdown;
use tracked_wallet::utils::{format_address, format_tx_id, lovelace_to_ada};
use tracked_wallet::wallet::{Wallet, WalletDependencies, WalletProps, WalletProviders};

#[derive(Parser)]
#[command(author, version, about = "Watch-only wallet kept in sync with a provider backend")]
struct Cli {
    /// Overrides PROVIDER_URL
    #[arg(long, global = true)]
    provider_url: Option<String>,
    /// Overrides WALLET_NAME
    #[arg(long, global = true)]
    wallet_name: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synchronize the wallet until interrupted
    Run,
    /// Print what the database holds for the wallet, without syncing
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    init_logger();

    let cli = Cli::parse();
    let mut config = config::load_config()?;
    if let Some(url) = cli.provider_url {
        config.provider_url = url;
    }
    if let Some(name) = cli.wallet_name {
        config.wallet_name = name;
    }

    match cli.command {
        Commands::Run => run(config).await,
        Commands::Status => status(config).await,
    }
}

async fn run(config: Config) -> Result<()> {
    info!("Starting wallet '{}' against {}", config.wallet_name, config.provider_url);

    let provider = Arc::new(HttpProvider::new(&config.provider_url)?);
    let database = Arc::new(Database::new(&config.database_url).await?);
    info!("Database initialized");

    let key_agent = Arc::new(
        WatchOnlyKeyAgent::from_file(&config.account_path)
            .with_context(|| format!("Failed to load account from {}", config.account_path))?,
    );

    let connection = Arc::new(ConnectionStatusTracker::new());
    connection.start_health_check_task(provider.clone(), config.health_check_interval());

    let mut dependencies = WalletDependencies::new(
        WalletProviders::from_backend(provider.clone()),
        key_agent,
        WalletStores::sqlite(database.clone(), &config.wallet_name),
    );
    dependencies.discovery = Some(Arc::new(HdSequentialDiscovery::new(
        provider.clone(),
        config.look_ahead,
    )));
    dependencies.connection = Some(connection.clone());

    let props = WalletProps {
        name: config.wallet_name.clone(),
        polling: config.polling(),
    };
    let wallet = Wallet::new(props, dependencies).await;

    let mut tip = wallet.tip().subscribe();
    let tip_printer = tokio::spawn(async move {
        while let Some(tip) = tip.next().await {
            info!("Tip: slot {} block {}", tip.slot, tip.block_no);
        }
    });

    let mut balance = wallet.balance().subscribe();
    let balance_printer = tokio::spawn(async move {
        while let Some(balance) = balance.next().await {
            info!(
                "Balance: {} ADA total, {} ADA available, {} ADA rewards",
                lovelace_to_ada(balance.utxo.total.coins),
                lovelace_to_ada(balance.utxo.available.coins),
                lovelace_to_ada(balance.rewards)
            );
        }
    });

    let mut lost = wallet.lost_transactions();
    let lost_printer = tokio::spawn(async move {
        while let Some(lost) = lost.next().await {
            warn!(
                "Transaction {} looks lost (submitted at slot {}), resubmitted",
                format_tx_id(&lost.tx.id),
                lost.submitted_at
            );
        }
    });

    let mut fatal = wallet.fatal_errors();
    let fatal_printer = tokio::spawn(async move {
        while let Some(fatal) = fatal.next().await {
            error!("Synchronization stopped: {}", fatal);
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    wallet.shutdown();
    connection.shutdown();
    for printer in [tip_printer, balance_printer, lost_printer, fatal_printer] {
        let _ = tokio::time::timeout(Duration::from_secs(5), printer).await;
    }
    database.close().await;

    info!("Shutting down...");
    Ok(())
}

async fn status(config: Config) -> Result<()> {
    let database = Arc::new(Database::new(&config.database_url).await?);
    let stores = WalletStores::sqlite(database.clone(), &config.wallet_name);

    println!("Wallet: {}", config.wallet_name);
    match stores.tip.get().await? {
        Some(tip) => println!("Tip: slot {} block {} ({})", tip.slot, tip.block_no, tip.hash),
        None => println!("Tip: never synced"),
    }

    let addresses = stores.addresses.get().await?.unwrap_or_default();
    println!("Addresses: {}", addresses.len());
    for address in &addresses {
        println!("  {:?} #{} {}", address.kind, address.index, format_address(&address.address));
    }

    let utxo = stores.utxo.get().await?.unwrap_or_default();
    let coins: u64 = utxo.iter().map(|u| u.output.value.coins).sum();
    println!("UTxO: {} outputs, {} ADA", utxo.len(), lovelace_to_ada(coins));

    let history = stores.transactions.get().await?.unwrap_or_default();
    println!("Confirmed transactions: {}", history.len());

    let in_flight = stores.in_flight.get().await?.unwrap_or_default();
    println!("In flight: {}", in_flight.len());
    for entry in &in_flight {
        match entry.submitted_at {
            Some(slot) => println!("  {} submitted at slot {}", format_tx_id(&entry.tx.id), slot),
            None => println!("  {} submission interrupted", format_tx_id(&entry.tx.id)),
        }
    }

    database.close().await;
    Ok(())
}

fn init_logger() {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or("RUST_LOG", "info")
    );
}

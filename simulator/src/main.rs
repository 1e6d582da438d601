//! PayGate Simulator
//!
//! Runs pay-for-access scenarios and random payment traffic against an
//! in-process host.

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use paygate_host::HostConfig;

mod accounts;
mod controller;
mod metrics;
mod scenario;

use controller::SimulationController;
use scenario::Scenario;

/// PayGate Simulator CLI
#[derive(Parser, Debug)]
#[command(name = "paygate-sim")]
#[command(about = "PayGate scenario runner and traffic simulator")]
struct Args {
    /// Number of development accounts (account 0 deploys and owns the ledger)
    #[arg(short, long)]
    accounts: Option<usize>,

    /// Ledger price in whole native units, e.g. 0.0001
    #[arg(short, long)]
    price: Option<String>,

    /// Built-in scenario name or path to a JSON scenario file
    #[arg(short, long)]
    scenario: Option<String>,

    /// Number of random payments to submit when no scenario is given
    #[arg(long, default_value = "100")]
    payments: usize,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Emit logs as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut config = HostConfig::from_env();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone()),
    );
    if args.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    if let Some(accounts) = args.accounts {
        config.dev_accounts = accounts;
    }
    if let Some(price) = &args.price {
        config.default_price = config.native.parse(price)?;
    }

    info!("Starting PayGate Simulator");
    info!(
        chain_id = config.chain_id,
        accounts = config.dev_accounts,
        price = %config.default_price.display_in(&config.native),
        "Host configuration"
    );

    let mut controller = SimulationController::new(config, args.seed)?;

    let outcome = match &args.scenario {
        Some(name) => {
            let scenario = Scenario::load(name)?;
            controller.run_scenario(&scenario).await
        }
        None => controller.run_traffic(args.payments).await,
    };

    // Print metrics
    let simulation = controller.metrics().await;
    let metrics = simulation.summary();
    let host_metrics = controller.host().metrics().snapshot();
    info!("Simulation complete");
    info!("Transactions: {}", metrics.total_transactions);
    info!("Accepted: {}", metrics.accepted);
    info!("Reverted: {}", simulation.total_reverted());
    for (code, count) in &metrics.reverted {
        info!("Reverted with {}: {}", code, count);
    }
    info!("Blocks mined: {}", host_metrics.blocks_mined);
    info!("Access grants: {}", host_metrics.access_grants);
    info!(
        "Latency: avg {}µs, p50 {}µs, p99 {}µs",
        metrics.average_latency_us, metrics.p50_latency_us, metrics.p99_latency_us
    );
    if args.json {
        info!(summary = %serde_json::to_string(&metrics)?, "Metrics summary");
    }

    controller.shutdown().await?;
    outcome.map(|_| ())
}

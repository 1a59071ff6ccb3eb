use crate::errors::AppResult;
use clap::{Parser, Subcommand};

pub mod commands;

/// Bitcoin UTXO Privacy Trace Engine
#[derive(Parser)]
#[command(name = "utxo-tracer")]
#[command(about = "Bitcoin UTXO privacy trace engine")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Trace a UTXO forward through subsequent spends
    TraceForward(commands::trace::TraceForwardCommand),
    /// Trace a transaction backward to its origins
    TraceBackward(commands::trace::TraceBackwardCommand),
    /// Trace a KYC exchange withdrawal to probable current holdings
    KycTrace(commands::kyc::KycTraceCommand),
    /// Analyze how close an address is to known exchanges
    Proximity(commands::proximity::ProximityCommand),
    /// Classify one or more transactions for CoinJoin patterns
    Classify(commands::classify::ClassifyCommand),
    /// Test Bitcoin RPC connectivity
    TestRpc(commands::test_rpc::TestRpcCommand),
}

pub async fn run() -> AppResult<()> {
    // Initialise tracing subscriber to capture info!() macros
    // Uses RUST_LOG environment variable (defaults to "error" if not set)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("error")),
        )
        .try_init();

    let cli = Cli::parse();

    match cli.command {
        Commands::TraceForward(command) => command.run().await,
        Commands::TraceBackward(command) => command.run().await,
        Commands::KycTrace(command) => command.run().await,
        Commands::Proximity(command) => command.run().await,
        Commands::Classify(command) => command.run().await,
        Commands::TestRpc(command) => command.run().await,
    }
}

use crate::cli::commands::load_config;
use crate::errors::AppResult;
use crate::rpc::BitcoinRpcClient;
use crate::traits::NodeQuery;
use clap::Args;

/// Test Bitcoin RPC connectivity
#[derive(Args)]
pub struct TestRpcCommand {}

impl TestRpcCommand {
    pub async fn run(&self) -> AppResult<()> {
        let config = load_config()?;
        let client = BitcoinRpcClient::new(config.bitcoin_rpc.clone())?;

        client.test_connection().await?;
        let height = client.get_block_height().await?;

        println!("Bitcoin RPC connection OK - chain tip at height {}", height);
        Ok(())
    }
}

use crate::cli::commands::{load_config, print_json};
use crate::config::AppConfig;
use crate::detection::classify_coinjoin;
use crate::errors::{validate_txid, AppError, AppResult};
use crate::rpc::BitcoinRpcClient;
use clap::Args;

/// Classify one or more transactions for CoinJoin patterns
#[derive(Args)]
pub struct ClassifyCommand {
    /// Transaction ids to classify
    #[arg(required = true)]
    pub txids: Vec<String>,
}

impl ClassifyCommand {
    pub async fn run(&self) -> AppResult<()> {
        for txid in &self.txids {
            validate_txid(txid)?;
        }

        let config: AppConfig = load_config()?;
        let client = BitcoinRpcClient::new(config.bitcoin_rpc.clone())?;

        let records = client.batch_get_transactions(&self.txids).await;

        let mut results = Vec::new();
        for (txid, record) in self.txids.iter().zip(records) {
            match record {
                Some(tx) => results.push(classify_coinjoin(&tx)),
                None => {
                    return Err(AppError::InvalidInput(format!(
                        "transaction not found: {}",
                        txid
                    )))
                }
            }
        }

        print_json(&results)
    }
}

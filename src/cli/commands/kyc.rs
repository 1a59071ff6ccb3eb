use crate::cli::commands::{build_index, build_node, load_config, print_json, validate_address};
use crate::errors::AppResult;
use crate::tracer::{DepthPreset, KycPrivacyTracer};
use clap::Args;

/// Trace a KYC exchange withdrawal to probable current holdings
#[derive(Args)]
pub struct KycTraceCommand {
    /// Transaction id of the exchange withdrawal
    pub exchange_txid: String,

    /// Address that received the withdrawal
    pub destination_address: String,

    /// Depth preset: quick, standard, deep or thorough
    #[arg(long, default_value = "standard")]
    pub depth: String,
}

impl KycTraceCommand {
    pub async fn run(&self) -> AppResult<()> {
        validate_address(&self.destination_address)?;

        let config = load_config()?;
        let node = build_node(&config)?;
        let index = build_index(&config);

        let tracer = KycPrivacyTracer::new(node, index).with_policy(config.trace.clone());
        let result = tracer
            .trace_kyc_withdrawal(
                &self.exchange_txid,
                &self.destination_address,
                DepthPreset::parse(&self.depth),
                None,
            )
            .await?;

        print_json(&result)
    }
}

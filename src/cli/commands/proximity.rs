use crate::cli::commands::{
    build_index, build_node, build_registry, load_config, print_json, validate_address,
};
use crate::errors::AppResult;
use crate::tracer::ExchangeProximityAnalyzer;
use clap::Args;

/// Analyze how close an address is to known exchanges
#[derive(Args)]
pub struct ProximityCommand {
    /// Address to analyze
    pub address: String,

    /// Maximum hop radius
    #[arg(long)]
    pub max_hops: Option<u32>,
}

impl ProximityCommand {
    pub async fn run(&self) -> AppResult<()> {
        validate_address(&self.address)?;

        let config = load_config()?;
        let node = build_node(&config)?;
        let index = build_index(&config);
        let registry = build_registry(&config)?;

        let analyzer = ExchangeProximityAnalyzer::new(node, index, registry)
            .with_policy(config.trace.clone());
        let result = analyzer
            .analyze_exchange_proximity(&self.address, self.max_hops)
            .await?;

        print_json(&result)
    }
}

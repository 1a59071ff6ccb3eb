use crate::cli::commands::{build_index, build_node, load_config, print_json};
use crate::detection::detect_peeling_chain;
use crate::errors::AppResult;
use crate::tracer::{BackwardTracer, ForwardTracer};
use clap::Args;
use serde_json::json;

/// Trace a UTXO forward through subsequent spends
#[derive(Args)]
pub struct TraceForwardCommand {
    /// Transaction id of the starting output
    pub txid: String,

    /// Output index within the transaction
    #[arg(long, default_value_t = 0)]
    pub vout: u32,

    /// Maximum traversal depth
    #[arg(long, default_value_t = 10)]
    pub max_depth: u32,

    /// Also run peeling-chain detection over the trace
    #[arg(long)]
    pub detect_peeling: bool,
}

impl TraceForwardCommand {
    pub async fn run(&self) -> AppResult<()> {
        let config = load_config()?;
        let node = build_node(&config)?;
        let index = build_index(&config);

        let tracer = ForwardTracer::new(node, index).with_policy(config.trace.clone());
        let result = tracer
            .trace_forward(&self.txid, self.vout, self.max_depth, None)
            .await?;

        if self.detect_peeling {
            let peeling = detect_peeling_chain(&result);
            return print_json(&json!({
                "trace": result,
                "peeling_chain": peeling,
            }));
        }

        print_json(&result)
    }
}

/// Trace a transaction backward to its origins
#[derive(Args)]
pub struct TraceBackwardCommand {
    /// Transaction id to trace backward from
    pub txid: String,

    /// Maximum traversal depth
    #[arg(long, default_value_t = 10)]
    pub max_depth: u32,
}

impl TraceBackwardCommand {
    pub async fn run(&self) -> AppResult<()> {
        let config = load_config()?;
        let node = build_node(&config)?;

        let tracer = BackwardTracer::new(node).with_policy(config.trace.clone());
        let result = tracer
            .trace_backward(&self.txid, self.max_depth, None)
            .await?;

        print_json(&result)
    }
}

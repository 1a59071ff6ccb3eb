#[tokio::main]
async fn main() {
    if let Err(e) = utxo_tracer::cli::run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

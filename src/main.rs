use indykite_provider::{init_logging, serve, IndykiteProvider};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting IndyKite provider");
    serve(IndykiteProvider::new()).await
}

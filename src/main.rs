/// Apiloom: chat-driven API workflow engine
///
/// Main entry point. Loads configuration from the environment and starts
/// the HTTP server with the builder and execution endpoints:
/// - Workflow builder API at /api/workflows/*
/// - Execution at /api/workflows/{id}/execute
/// - Health check at /healthz

use apiloom::{config::Config, server::start_server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    start_server(config).await?;
    Ok(())
}

//! `agentchain server`: start the HTTP trigger server.

use std::path::PathBuf;

use agentchain_core::EngineConfig;

pub async fn run(
    host: String,
    port: u16,
    db_path: String,
    engine: EngineConfig,
    output_log_dir: Option<PathBuf>,
) -> Result<(), String> {
    let config = agentchain_server::ServerConfig {
        host: host.clone(),
        port,
        db_path,
        engine,
        output_log_dir,
    };

    println!("Starting agentchain server on {}:{}...", host, port);

    let addr = agentchain_server::start_server(config).await?;
    println!("agentchain server listening on http://{}", addr);

    // Keep the process running until interrupted
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("Failed to listen for Ctrl+C: {}", e))?;

    println!("\nShutting down...");
    Ok(())
}

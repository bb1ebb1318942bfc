//! Main application entry point for the Murmur server
//!
//! Loads configuration, applies CLI overrides, starts the broadcast server
//! and waits for a shutdown signal.

mod cli;
mod config;
mod logging;
mod signals;

use cli::CliArgs;
use config::AppConfig;
use murmur_proximity::IndexKind;
use murmur_server::MurmurServer;
use std::sync::Arc;
use tracing::{error, info};

pub struct Application {
    config: AppConfig,
    server: Arc<MurmurServer>,
}

impl Application {
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        // Load configuration first (before logging setup)
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        if let Some(bind_address) = args.bind_address {
            config.server.bind_address = bind_address;
        }
        if let Some(index) = args.index {
            config.proximity.index = index.parse::<IndexKind>()?;
        }
        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }
        if args.json_logs {
            config.logging.json_format = true;
        }

        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        }

        logging::setup_logging(&config.logging)?;

        let server = Arc::new(MurmurServer::new(config.to_server_config()?));
        info!(
            "🚀 Murmur v{} | Config: {}",
            env!("CARGO_PKG_VERSION"),
            args.config_path.display()
        );

        Ok(Self { config, server })
    }

    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!("📋 Configuration Summary:");
        info!("  🌐 Bind address: {}", self.config.server.bind_address);
        info!("  👥 Max connections: {}", self.config.server.max_connections);
        info!(
            "  📏 Range: {} m | Update threshold: {} m | Index: {}",
            self.config.proximity.range_m, self.config.proximity.update_range_m, self.config.proximity.index
        );

        let mut server_handle = {
            let server = self.server.clone();
            tokio::spawn(async move { server.start().await })
        };

        let monitoring_handle = {
            let state = self.server.state();
            let connection_manager = self.server.connection_manager();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(60));
                loop {
                    interval.tick().await;
                    info!(
                        "📊 System Health - {} connections | {} clients | {} indexed",
                        connection_manager.connection_count().await,
                        state.client_count().await,
                        state.indexed_count().await
                    );
                }
            })
        };

        info!("🛑 Press Ctrl+C to gracefully shutdown");

        let finished = tokio::select! {
            signal = signals::wait_for_shutdown() => {
                signal?;
                None
            }
            // Only reached when binding fails or the loop stops by itself.
            result = &mut server_handle => Some(result),
        };

        let outcome = match finished {
            Some(result) => result,
            None => {
                info!("🛑 Shutdown signal received, initiating graceful shutdown...");
                self.server.shutdown().await?;
                server_handle.await
            }
        };

        monitoring_handle.abort();
        match outcome {
            Ok(Ok(())) => info!("✅ Server completed successfully"),
            Ok(Err(e)) => {
                error!("❌ Server error: {}", e);
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        }

        info!("👋 Murmur shutdown complete");
        Ok(())
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    match Application::new(args).await {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("❌ Application error: {}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("❌ Failed to start application: {e}");
            std::process::exit(1);
        }
    }

    Ok(())
}

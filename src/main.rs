mod config;
mod db;
mod error;
mod handlers;
mod models;
mod services;

use config::Config;
use error::{ChatError, ChatResult};
use log::{error, info, LevelFilter};
use services::ChatService;
use std::str::FromStr;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("chat-ledger: {e}");
            std::process::exit(1);
        }
    };
    init_logging(&config.log_level);

    if let Err(e) = run(config).await {
        error!("chat-ledger stopped: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(level: &str) {
    let level = LevelFilter::from_str(level).unwrap_or(LevelFilter::Info);
    let _ = env_logger::Builder::from_default_env()
        .filter_level(level)
        .try_init();
}

async fn run(config: Config) -> ChatResult<()> {
    let store = db::open(&config).await?;
    let service = Arc::new(ChatService::new(store.clone(), &config));
    let addr = config.bind_addr()?;

    let (bound, server) = warp::serve(handlers::routes(service))
        .try_bind_with_graceful_shutdown(addr, async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("shutdown requested"),
                Err(e) => {
                    error!("cannot listen for ctrl-c: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        })
        .map_err(|e| ChatError::Config(format!("bind {addr}: {e}")))?;

    info!("listening on http://{}", bound);
    server.await;

    store.close().await;
    info!("store closed");
    Ok(())
}

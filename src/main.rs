//! Entry point for the kvemberd server binary.

use std::env;

use kvemberd::config::Config;
use kvemberd::server;
use tracing::error;

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();

    let config_path = args
        .iter()
        .position(|arg| arg == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let mut config = match Config::load(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Some(port_index) = args.iter().position(|arg| arg == "--port") {
        match args.get(port_index + 1).map(|s| s.parse::<u16>()) {
            Some(Ok(port)) => config.port = port,
            Some(Err(_)) => {
                eprintln!("invalid port number");
                std::process::exit(1);
            }
            None => {
                eprintln!("--port flag requires a value");
                std::process::exit(1);
            }
        }
    }

    let log_level = env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());
    tracing_subscriber::fmt().with_env_filter(log_level).compact().init();

    if let Err(e) = server::run(config).await {
        error!("server error: {e}");
        std::process::exit(1);
    }
}

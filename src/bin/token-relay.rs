use anyhow::Result;
use clap::Parser;
use token_relay::config::proc_loader::load_env_file;
use token_relay::config::settings::CredentialsMode;
use token_relay::server;
use token_relay::utils::config_loader;
use token_relay::utils::logging;
use token_relay::utils::logging::LogLevel;
use tracing::{debug, info};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML config; without it credentials come from VITE_API_URL / VITE_SF_CLIENT_ID / VITE_SF_CLIENT_SECRET
    #[arg(short, long, env = "CONFIG")]
    config: Option<String>,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
    #[arg(short, long)]
    port: Option<u16>,
    #[arg(long, value_enum)]
    mode: Option<CredentialsMode>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // -------------------------------
    // 1. Load YAML config
    // -------------------------------

    let args = Args::parse();
    let env_file = load_env_file(None);
    let service_config = config_loader::run(args.config.as_deref())?;
    let service_config = config_loader::apply_overrides(service_config, args.port, args.mode)?;

    // -------------------------------
    // 2. Logging
    // -------------------------------

    logging::run(&service_config, args.log_level);
    match env_file {
        Ok(path) => info!("loaded environment from {}", path.display()),
        Err(e) => debug!("no .env file loaded: {}", e),
    }

    // -------------------------------
    // 3. Start http server
    // -------------------------------

    info!("Service starting...");
    server::server::start(&service_config).await
}

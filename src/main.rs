use anyhow::Result;
use clap::{Arg, Command};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use text_to_learn::{ApiServer, AppState, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("Text-to-Learn")
        .version(env!("CARGO_PKG_VERSION"))
        .author("TigreRoll")
        .about("AI course generator backend")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file (defaults to text-to-learn.toml)")
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Port to listen on")
                .value_parser(clap::value_parser!(u16))
        )
        .arg(
            Arg::new("data-dir")
                .short('d')
                .long("data-dir")
                .value_name("DIR")
                .help("Directory for courses and accounts")
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue)
        )
        .get_matches();

    let mut config = match matches.get_one::<String>("config") {
        Some(path) => Config::from_file(&PathBuf::from(path))?,
        None => Config::load()?,
    };
    config.apply_env();

    if let Some(port) = matches.get_one::<u16>("port") {
        config.server.port = *port;
    }
    if let Some(dir) = matches.get_one::<String>("data-dir") {
        config.storage.data_dir = PathBuf::from(dir);
    }

    let filter = if matches.get_flag("verbose") {
        EnvFilter::new("text_to_learn=debug,tower_http=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🚀 Text-to-Learn starting...");
    config.validate()?;
    info!("{}", config.summary());

    let state = AppState::from_config(config).await?;
    ApiServer::new(state).run().await
}

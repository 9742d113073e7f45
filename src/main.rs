use std::path::PathBuf;

use clap::Parser;
use student_tutor::{config::Config, server::Server, utils::init_log};
use tracing::info;

#[derive(Parser)]
#[command(author, version, about = "Student tutor web server", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "tutor.toml")]
    config: PathBuf,

    /// Path to database file, overrides the configuration
    #[arg(short, long)]
    database: Option<PathBuf>,

    #[arg(short = 'H', long)]
    host: Option<String>,

    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let mut config = Config::load(Some(&args.config))?;
    if let Some(database) = args.database {
        config.database = database;
    }
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    let _guard = init_log(config.log_dir.clone())?;
    info!("starting with {:?}", config);

    Server::new(config).await?.run().await
}

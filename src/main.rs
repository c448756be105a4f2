use clap::Parser;
use log::{error, info};

use cloudkeep::{App, Cli, Config, Result};

pub fn initialize_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .format_module_path(true)
        .init();

    info!("Logger initialized");
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    initialize_logger();
    info!("Application starting up");

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    info!("Application shutting down");
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_ref())?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(flags_source) = cli.flags_source {
        config.flags_source = Some(flags_source);
    }

    let app = App::new(config, cli.verbose).await?;
    let result = app.run(cli.command).await;
    app.shutdown().await;
    result
}

//! pixiv-mirror CLI binary

use std::process;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use pixiv_mirror::cli::{handle_download, handle_info, Cli, Commands};
use pixiv_mirror::errors::Result;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse_args();
    init_logging(&cli);

    info!("pixiv-mirror v{} starting", pixiv_mirror::VERSION);

    match &cli.command {
        Commands::Download(args) => handle_download(&cli, args).await,
        Commands::Info(command) => handle_info(&cli, command).await,
    }
}

fn init_logging(cli: &Cli) {
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("pixiv_mirror={}", cli.log_level()).parse().unwrap());

    fmt().with_env_filter(filter).with_target(false).init();
}

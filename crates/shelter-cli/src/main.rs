use clap::Parser;
use shelter_cli::{Cli, run};
use shelter_core::{LoggingDestination, init_logging};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = init_logging(LoggingDestination::FileAndStderr) {
        eprintln!("Warning: logging unavailable: {err}");
    }

    if let Err(err) = run(cli).await {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

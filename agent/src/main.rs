//! websoft9-agent: validated task execution and host monitoring

use clap::Parser;
use websoft9_agent::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = cli.run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

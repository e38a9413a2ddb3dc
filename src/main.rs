use std::time::Duration;

use clap::{Parser, Subcommand};
use growlink::{init_logger, Engine};

#[derive(Parser)]
#[command(name = "growlink-cli")]
#[command(about = "Demonstration CLI for the growlink fixture fleet engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Seconds to let discovery settle before running the command.
    #[arg(long, default_value = "10")]
    settle: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// List every serial seen across all discovered gateways.
    ListSerials,
    /// Dispatch a named command with a JSON `{serial, payload}` body.
    Dispatch {
        name: String,
        json_arguments: String,
    },
}

#[tokio::main]
async fn main() -> growlink::Result<()> {
    init_logger();

    let cli = Cli::parse();
    let engine = Engine::start(true).await?;
    tokio::time::sleep(Duration::from_secs(cli.settle)).await;

    match cli.command {
        Commands::ListSerials => {
            for serial in engine.get_serials() {
                println!("{serial}");
            }
        }
        Commands::Dispatch { name, json_arguments } => {
            let replies = engine.dispatch(&name, json_arguments.as_bytes()).await?;
            for reply in replies {
                println!("{reply:?}");
            }
        }
    }

    engine.shutdown();
    Ok(())
}

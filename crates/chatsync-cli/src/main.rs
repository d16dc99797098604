//! CLI entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use chatsync_cli::{Cli, CliError, Commands, handlers};
use chatsync_core::ConversationFilters;

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Replay { script, compact } => handlers::replay::execute(&script, compact).await,
        Commands::History {
            participant,
            pages,
            remote,
        } => handlers::remote::history(&participant, pages, &remote).await,
        Commands::Conversations {
            role,
            search,
            unread_only,
            remote,
        } => {
            let filters = ConversationFilters {
                role: role.map(Into::into),
                search,
                unread_only,
            };
            handlers::remote::conversations(&filters, &remote).await
        }
        Commands::Send {
            participant,
            body,
            remote,
        } => handlers::remote::send(&participant, &body, &remote).await,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables before clap reads env-backed args
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = dispatch(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(e.exit_code());
    }
    Ok(())
}

//! zcrm CLI binary entry point.

use zcrm_auth::cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    let result = match &cli.command {
        Commands::Records(args) => zcrm_auth::cli::commands::handle_records(args).await,
        Commands::Token(args) => zcrm_auth::cli::commands::handle_token(&args.command).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

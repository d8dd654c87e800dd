use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use horde_cli::cli::{Cli, Commands};
use horde_cli::config::ClientConfig;
use horde_cli::context::AppContext;
use horde_cli::handlers;
use horde_pipeline::workers::WorkerFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "horde_cli=info,horde_pipeline=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // Commands that need neither the network nor storage.
    match &cli.command {
        Commands::Share { form, base_url } => return handlers::generate::share(form, base_url),
        Commands::Mask(args) => return handlers::mask::execute(args),
        _ => {}
    }

    // --- Configuration ---
    let config = ClientConfig::from_env()?;
    tracing::debug!(api_url = %config.api_url, db = %config.database_path.display(), "Loaded configuration");

    let mut ctx = AppContext::bootstrap(config).await?;

    match &cli.command {
        Commands::Generate(form) => handlers::generate::execute(&ctx, form).await,
        Commands::Interrogate { source, forms } => {
            handlers::interrogate::execute(&ctx, source, forms).await
        }
        Commands::Rate(command) => handlers::rate::execute(&ctx, command).await,
        Commands::Outputs(command) => handlers::outputs::execute(&ctx, command).await,
        Commands::Dashboard { watch } => handlers::account::dashboard(&ctx, *watch).await,
        Commands::Leaderboard { key, ascending } => {
            handlers::account::leaderboard(&ctx, key.as_deref(), *ascending).await
        }
        Commands::Workers {
            online,
            trusted,
            model,
            sort,
            watch,
        } => {
            let filter = WorkerFilter {
                online_only: *online,
                trusted_only: *trusted,
                model: model.clone(),
            };
            handlers::account::workers(&ctx, filter, sort, *watch).await
        }
        Commands::Settings(command) => handlers::settings::execute(&mut ctx, command).await,
        Commands::Share { .. } | Commands::Mask(_) => Ok(()),
    }
}

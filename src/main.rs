//! Scorecast - Main Entry Point

use clap::Parser;
use scorecast::cli::{cmd_info, cmd_predict, cmd_train, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scorecast=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train {
            config,
            train,
            test,
            output,
            min_score,
            failure_policy,
            models,
            seed,
            sequential,
        } => {
            cmd_train(
                config.as_deref(),
                train,
                test,
                output,
                min_score,
                failure_policy,
                models,
                seed,
                sequential,
            )?;
        }
        Commands::Predict { transformer, model, data, output } => {
            cmd_predict(&transformer, &model, &data, output.as_deref())?;
        }
        Commands::Info { data } => {
            cmd_info(&data)?;
        }
    }

    Ok(())
}

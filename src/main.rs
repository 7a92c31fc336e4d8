//! Kolosal Encrypted - Main Entry Point

use clap::Parser;
use kolosal_encrypted::cli::{cmd_info, cmd_keygen, cmd_materialize, cmd_predict, cmd_train, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kolosal_encrypted=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Keygen { encryption, seed, output, eval_output } => {
            cmd_keygen(&encryption, seed, &output, eval_output.as_deref())?;
        }
        Commands::Train {
            data,
            features,
            label,
            weight,
            keys,
            encryption,
            options,
            l2,
            l1,
            iterations,
            output,
            model_output,
        } => {
            cmd_train(
                &data,
                &features,
                &label,
                weight.as_deref(),
                &keys,
                &encryption,
                options.as_deref(),
                l2,
                l1,
                iterations,
                &output,
                model_output.as_deref(),
            )?;
        }
        Commands::Materialize { model, keys, encryption, output } => {
            cmd_materialize(&model, &keys, &encryption, &output)?;
        }
        Commands::Predict { model, data, features, label, output } => {
            cmd_predict(&model, &data, &features, &label, output.as_deref())?;
        }
        Commands::Info { data } => {
            cmd_info(&data)?;
        }
    }

    Ok(())
}

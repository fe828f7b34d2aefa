//! Multimpute CLI - multiple imputation from the command line.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "multimpute=info" } else { "multimpute=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Patterns { file, json } => commands::patterns::run(file, json, cli.verbose),

        Commands::Impute {
            file,
            n,
            iterations,
            strategy,
            config,
            seed,
            parallel,
            output_dir,
            format,
        } => commands::impute::run(
            commands::impute::ImputeArgs {
                file,
                n,
                iterations,
                strategy,
                config,
                seed,
                parallel,
                output_dir,
                format,
            },
            cli.verbose,
        ),

        Commands::Pool {
            file,
            response,
            predictors,
            model,
            n,
            config,
            seed,
            alpha,
            json,
        } => commands::pool::run(
            commands::pool::PoolArgs {
                file,
                response,
                predictors,
                model,
                n,
                config,
                seed,
                alpha,
                json,
            },
            cli.verbose,
        ),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

use clap::Parser;
use sports_edge::cli::{self, Cli, Commands, OutputMode};
use sports_edge::config::AppConfig;
use sports_edge::error::{EdgeError, Result};
use tracing::{error, warn};

mod main_runtime;

use main_runtime::{init_logging, init_logging_simple};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mode = OutputMode::from_json_flag(cli.json);

    let mut config = match AppConfig::load_from(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", cli.config.display(), e);
            return Err(e.into());
        }
    };

    if cli.verbose {
        init_logging(&config.logging);
    } else {
        init_logging_simple();
    }

    match cli.command {
        Commands::Devig { home, away, draw } => cli::run_devig(home, away, draw, mode)?,
        Commands::Ev {
            sharp,
            books,
            sport,
            league,
            min_ev,
            sharp_book,
            save,
        } => {
            if let Some(min_ev) = min_ev {
                config.ev.min_ev = min_ev;
            }
            if let Some(book) = sharp_book {
                config.ev.sharp_book = book;
            }
            validate(&config)?;
            cli::run_ev(&config, sharp, books, &sport, league.as_deref(), save, mode).await?;
        }
        Commands::Value {
            stats,
            features,
            models,
            books,
            sport,
            league,
            threshold,
            save,
        } => {
            if let Some(t) = threshold {
                config.value.confidence_threshold = t;
            }
            validate(&config)?;
            cli::run_value(
                &config,
                stats,
                features,
                models,
                books,
                &sport,
                league.as_deref(),
                save,
                mode,
            )
            .await?;
        }
    }

    Ok(())
}

fn validate(config: &AppConfig) -> Result<()> {
    if let Err(errors) = config.validate() {
        for e in &errors {
            error!("Config: {}", e);
        }
        warn!("Refusing to run with {} config problem(s)", errors.len());
        return Err(EdgeError::Validation(errors.join("; ")));
    }
    Ok(())
}

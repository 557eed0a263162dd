use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio_rusqlite::Connection;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::core::AppConfig;
use crate::health::{DataType, FetchCoordinator, RangeCache, SharedCoordinator, SourceRegistry};
use crate::openai::OpenAiClient;

pub mod ask;
pub mod chat;
pub mod fetch;
pub mod init;
pub mod reset;
pub mod status;

#[derive(Subcommand)]
enum Command {
    /// Create the storage directory and database tables
    Init {},
    /// Ask a single question about your health data
    Ask {
        #[arg(long)]
        query: String,
    },
    /// Start a chat session
    Chat {
        /// Resume an earlier session
        #[arg(long)]
        session: Option<String>,
    },
    /// Fetch health data through the cache and print it
    Fetch {
        #[arg(long, value_enum)]
        data_type: DataType,
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        days: u32,
        /// Drop cached data for the type before fetching
        #[arg(long, action, default_value = "false")]
        refresh: bool,
    },
    /// Clear the cache for a data type
    Reset {
        #[arg(long, value_enum)]
        data_type: DataType,
    },
    /// Show how far back each data type is cached
    Status {},
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=debug", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

pub fn coordinator(config: &AppConfig, db: &Connection) -> SharedCoordinator {
    Arc::new(FetchCoordinator::new(
        RangeCache::new(db.clone()),
        SourceRegistry::http(&config.health_api_url),
        config.source_timeout,
    ))
}

pub fn llm_client(config: &AppConfig) -> OpenAiClient {
    OpenAiClient::new(
        &config.openai_api_hostname,
        &config.openai_api_key,
        &config.openai_model,
    )
    .temperature(config.temperature)
    .timeout(config.llm_timeout)
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();

    init_tracing();
    let config = AppConfig::default();

    // Handle each sub command
    match args.command {
        Some(Command::Init {}) => {
            init::run(&config).await?;
        }
        Some(Command::Ask { query }) => {
            ask::run(&config, &query).await?;
        }
        Some(Command::Chat { session }) => {
            chat::run(&config, session.as_deref()).await?;
        }
        Some(Command::Fetch {
            data_type,
            days,
            refresh,
        }) => {
            fetch::run(&config, data_type, days, refresh).await?;
        }
        Some(Command::Reset { data_type }) => {
            reset::run(&config, data_type).await?;
        }
        Some(Command::Status {}) => {
            status::run(&config).await?;
        }
        None => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_parses_data_type_and_days() {
        let cli = Cli::try_parse_from([
            "healthgpt",
            "fetch",
            "--data-type",
            "SleepData",
            "--days",
            "7",
        ])
        .unwrap();

        assert!(matches!(
            cli.command,
            Some(Command::Fetch {
                data_type: DataType::Sleep,
                days: 7,
                refresh: false,
            })
        ));
    }

    #[test]
    fn test_fetch_rejects_zero_days() {
        let result = Cli::try_parse_from([
            "healthgpt",
            "fetch",
            "--data-type",
            "StepData",
            "--days",
            "0",
        ]);
        assert!(result.is_err());
    }
}

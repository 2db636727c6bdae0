#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hotelprobe::config::LoggingConfig;
use hotelprobe::debug::{clickable_elements, context_info, describe_element, save_page_source};
use hotelprobe::{
    Config, Driver, DriverManager, FlowError, InteractionExecutor, Locator, WaitMode, WaitOutcome,
    exit_code_for, hotel_search,
};

const EXIT_SUCCESS: i32 = 0;

#[derive(Parser)]
#[command(name = "hotelprobe")]
#[command(about = "Resilient element resolution for WebDriver/Appium flows", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: ./configs/config.yaml, then ~/.hotelprobe/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Capabilities file in the configured capabilities directory
    #[arg(long, global = true)]
    capabilities: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the hotel search flow
    Search {
        /// City to search hotels for
        #[arg(long)]
        city: String,

        /// Page to open first (default: configured base URL)
        #[arg(long)]
        url: Option<String>,
    },

    /// Resolve one locator and report the outcome
    Locate {
        /// Strategy tag: id, xpath, css_selector, class_name, tag_name, name,
        /// link_text, partial_link_text, accessibility_id
        #[arg(long)]
        strategy: String,

        /// Locator value
        #[arg(long)]
        locator: String,

        /// State the element must reach
        #[arg(long, value_enum, default_value = "visible")]
        mode: WaitMode,

        /// Budget in seconds (default: configured resolve timeout)
        #[arg(long)]
        timeout: Option<u64>,

        /// Page to open first
        #[arg(long)]
        url: Option<String>,
    },

    /// Describe an element and the session's contexts
    Inspect {
        /// Strategy tag
        #[arg(long)]
        strategy: String,

        /// Locator value
        #[arg(long)]
        locator: String,

        /// Page to open first
        #[arg(long)]
        url: Option<String>,

        /// Also list up to this many clickable elements
        #[arg(long)]
        clickable: Option<usize>,

        /// Save the page source to this file
        #[arg(long)]
        source: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load_default(),
    };
    let logging = config
        .as_ref()
        .map(|c| c.logging().clone())
        .unwrap_or_default();
    init_tracing(&logging);

    let result = match config {
        Ok(config) => run(cli, config).await,
        Err(err) => Err(FlowError::from(err).into()),
    };

    match result {
        Ok(()) => std::process::exit(EXIT_SUCCESS),
        Err(err) => {
            let exit_code = exit_code_for(&err);

            // Output JSON error to stdout for programmatic consumption
            let error_json = json!({
                "error": true,
                "message": format!("{:#}", err),
                "exit_code": exit_code
            });
            println!(
                "{}",
                serde_json::to_string(&error_json).unwrap_or_else(|_| "{}".to_string())
            );

            eprintln!("Error: {:#}", err);
            std::process::exit(exit_code);
        }
    }
}

/// Logs go to stderr (stdout carries JSON output) and are appended to the
/// run log file when it can be opened
fn init_tracing(logging: &LoggingConfig) {
    let file_layer = std::fs::create_dir_all(&logging.directory)
        .and_then(|_| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(logging.file_path())
        })
        .ok()
        .map(|file| {
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
        });

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hotelprobe=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(file_layer)
        .init();
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    if let Some(source) = config.source() {
        info!("Using configuration from {}", source.display());
    }
    let manager = DriverManager::from_config(&config, cli.capabilities.as_deref())
        .map_err(FlowError::from)?;
    let settings = config.wait_settings();

    match cli.command {
        Commands::Search { city, url } => {
            let start_url = url.unwrap_or_else(|| config.base_url().to_string());
            let report = manager
                .with_session(async |session| {
                    session.goto(&start_url).await.map_err(FlowError::from)?;
                    let exec = InteractionExecutor::new(session, settings.clone());
                    Ok(hotel_search(&exec, &city).await?)
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Locate {
            strategy,
            locator,
            mode,
            timeout,
            url,
        } => {
            let locator = Locator::from_tag(&strategy, locator);
            let budget = timeout.map(Duration::from_secs).unwrap_or(settings.resolve_budget);
            let output = manager
                .with_session(async |session| {
                    if let Some(url) = &url {
                        session.goto(url).await.map_err(FlowError::from)?;
                    }
                    let exec = InteractionExecutor::new(session, settings.clone());
                    let started = Instant::now();
                    match exec.resolver().locate(&locator, budget, mode).await {
                        WaitOutcome::Found(located) => {
                            let text = session.text(&located.element).await.unwrap_or_default();
                            Ok(json!({
                                "found": true,
                                "locator": located.locator,
                                "token": located.locator.token().as_str(),
                                "mode": mode.to_string(),
                                "elapsed_ms": started.elapsed().as_millis() as u64,
                                "text": text,
                            }))
                        }
                        WaitOutcome::TimedOut(attempts) => Err(FlowError::NotFound {
                            target: locator.to_string(),
                            attempts,
                        }
                        .into()),
                        WaitOutcome::Error(err) => Err(FlowError::from(err).into()),
                    }
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Commands::Inspect {
            strategy,
            locator,
            url,
            clickable,
            source,
        } => {
            let locator = Locator::from_tag(&strategy, locator);
            let output = manager
                .with_session(async |session| {
                    if let Some(url) = &url {
                        session.goto(url).await.map_err(FlowError::from)?;
                    }
                    if let Some(path) = &source {
                        save_page_source(session, path).await?;
                    }
                    let element = describe_element(session, &locator)
                        .await
                        .map_err(FlowError::from)?
                        .ok_or_else(|| FlowError::NotFound {
                            target: locator.to_string(),
                            attempts: Vec::new(),
                        })?;
                    let clickable = match clickable {
                        Some(limit) => Some(
                            clickable_elements(session, limit)
                                .await
                                .map_err(FlowError::from)?,
                        ),
                        None => None,
                    };
                    Ok(json!({
                        "element": element,
                        "contexts": context_info(session).await,
                        "clickable": clickable,
                    }))
                })
                .await
                .context("Inspection failed")?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

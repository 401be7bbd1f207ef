//! Till - point-of-sale cart & catalog terminal.
//!
//! # Usage
//!
//! ```bash
//! # Start a session and list category 1
//! TILL_BASE_URL=http://pos.local:5000 till --category 1
//!
//! # Without live stock notifications
//! till --no-push
//! ```
//!
//! Configuration is read from the environment (see [`till_register::config`]).
//! Logs go to stderr so they never interleave with the cashier's screen.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use sentry::integrations::tracing as sentry_tracing;
use till_core::CategoryId;
use till_register::backend::HttpBackend;
use till_register::push::PushSubscriber;
use till_register::terminal::{self, Command, CommandError, Flow, TerminalHost};
use till_register::{Register, TillConfig, TillError};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "till")]
#[command(author, version, about = "Point-of-sale cart & catalog terminal")]
struct Cli {
    /// Category to list at startup
    #[arg(short, long)]
    category: Option<i32>,

    /// Do not subscribe to live stock notifications
    #[arg(long)]
    no_push: bool,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &TillConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "till_register=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Before any TLS connection (push channel over wss)
    till_register::push::install_crypto_provider();

    let config = match TillConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            let _ = writeln!(std::io::stderr(), "Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Sentry before the subscriber so its layer has a client
    let _sentry_guard = init_sentry(&config);
    init_tracing();

    match run(cli, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            e.report();
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: &TillConfig) -> Result<(), TillError> {
    tracing::info!(base_url = %config.base_url, "Starting till");

    let backend = HttpBackend::new(config)?;
    let shared = Arc::new(Register::new(backend, TerminalHost::new()));
    let register = &*shared;
    let host = register.host();

    let push = if cli.no_push {
        None
    } else {
        let subscriber = PushSubscriber::new(config)?;
        tracing::info!(url = %subscriber.url(), "Subscribing to stock notifications");
        Some(subscriber.spawn(Arc::clone(&shared)))
    };

    host.print(terminal::HELP);
    if let Some(category) = cli.category {
        terminal::execute(register, Command::Category(CategoryId::new(category))).await;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            () = host.reload_requested() => {
                // Failure is logged by the register; the empty screen stays.
                let _ = register.reload().await;
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match line.parse::<Command>() {
                    Ok(command) => {
                        if terminal::execute(register, command).await == Flow::Quit {
                            break;
                        }
                    }
                    Err(CommandError::Empty) => {}
                    Err(e) => host.print(&e.to_string()),
                }
            }
        }
    }

    if let Some(handle) = push {
        handle.abort();
    }
    tracing::info!("Till closed");
    Ok(())
}

//! `MailPane` - a terminal email client over a REST mail store.
//!
//! The screen is redrawn after every command and whenever a subscribed view
//! changes in the background.

mod app;
mod display;
mod message;
mod settings;
mod view;

use std::io::Write;
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use mailpane_api::ApiClient;
use mailpane_core::{MailAuthority, MailClient};

use crate::app::{App, Flow};
use crate::message::{Message, ParseMessageError};
use crate::settings::{
    SERVER_URL_ENV, load_settings, save_settings, settings_exist, settings_path,
};

const DEFAULT_LOG_FILTER: &str = "mailpane=info,mailpane_core=info,mailpane_api=info";

/// How often cache entries nobody looks at are dropped.
const EVICT_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = settings_path();
    let first_run = !settings_exist(&path).await?;
    let settings = load_settings(&path).await?;

    // Initialize logging
    let default_filter = settings
        .log_filter
        .clone()
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting MailPane");

    if first_run {
        match save_settings(&path, &settings).await {
            Ok(()) => info!(path = %path.display(), "Wrote default settings"),
            Err(e) => warn!(error = %e, "Failed to save default settings"),
        }
    }
    let settings = settings.with_env_override(std::env::var(SERVER_URL_ENV).ok());

    let config = settings.api_config()?;
    info!(server = %config.base_url, "Connecting to mail store");
    let client = MailClient::new(ApiClient::new(config).context("failed to create HTTP client")?);

    let (redraw_tx, redraw_rx) = mpsc::unbounded_channel();
    let app = App::new(client, settings.identity.clone(), redraw_tx);
    run(app, redraw_rx).await?;

    info!("Shutting down");
    Ok(())
}

/// Reads commands from stdin until `quit` or end of input.
async fn run<A: MailAuthority>(
    mut app: App<A>,
    mut redraw: mpsc::UnboundedReceiver<mailpane_core::CacheKey>,
) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut evict = tokio::time::interval(EVICT_INTERVAL);
    evict.tick().await;

    draw(&app, None)?;
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let error = match line.parse::<Message>() {
                    Ok(message) => {
                        if app.update(message).await == Flow::Quit {
                            break;
                        }
                        None
                    }
                    Err(ParseMessageError::Empty) => None,
                    Err(e) => Some(e),
                };
                draw(&app, error.as_ref())?;
            }
            Some(key) = redraw.recv() => {
                // Collapse a burst of changes into one redraw.
                let mut changed = 1;
                while redraw.try_recv().is_ok() {
                    changed += 1;
                }
                debug!(%key, changed, "redraw");
                draw(&app, None)?;
            }
            _ = evict.tick() => {
                let evicted = app.client().evict_idle();
                if evicted > 0 {
                    debug!(evicted, "Evicted idle cache entries");
                }
            }
        }
    }
    Ok(())
}

fn draw<A: MailAuthority>(app: &App<A>, error: Option<&ParseMessageError>) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    write!(stdout, "\x1b[2J\x1b[H{}", view::render(app, chrono::Utc::now()))?;
    if let Some(error) = error {
        writeln!(stdout, "{error}")?;
    }
    write!(stdout, "> ")?;
    stdout.flush()?;
    Ok(())
}

//! gemini-chat: terminal chat client for the Gemini API.
//!
//! Startup order:
//! 1. Parse CLI flags and load the config file.
//! 2. Initialise tracing into a log file (the terminal belongs to the UI).
//! 3. Restore the saved transcript and theme.
//! 4. Run the terminal event loop until the user quits.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use clap::Parser;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

mod app;
mod clipboard;
mod config;
mod error;
mod gemini;
mod handler;
mod reveal;
mod session;
mod store;
mod theme;
mod transcript;
mod tui;
mod ui;

use app::App;
use clipboard::SystemClipboard;
use config::Config;
use gemini::GeminiClient;
use session::{ChatSession, SessionEvent};
use store::FileStore;
use tui::{EventHandler, Tui};

const LOG_ENV: &str = "GEMINI_CHAT_LOG";

#[derive(Parser)]
#[command(name = "gemini-chat", version)]
#[command(about = "Chat with Gemini from the terminal")]
struct Cli {
    /// Config file (defaults to <config dir>/gemini-chat/config.json)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Model to use instead of the configured one
    #[arg(short, long)]
    model: Option<String>,
    /// Where the transcript, theme and log are kept
    #[arg(long, env = "GEMINI_CHAT_DATA_DIR")]
    data_dir: Option<PathBuf>,
    /// Write the effective config (with defaults filled in) to the config path and exit
    #[arg(long)]
    write_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── 1. Configuration ───────────────────────────────────────────────────────
    let config_path = match cli.config {
        Some(path) => path,
        None => Config::get_config_path()?,
    };
    let config = Config::load_from(&config_path).unwrap_or_else(|e| {
        eprintln!("WARN: could not read {} ({}); using defaults", config_path.display(), e);
        Config::new()
    });
    if cli.write_config {
        let mut effective = config.clone();
        effective.model = Some(cli.model.unwrap_or_else(|| config.model().to_string()));
        effective.base_url = Some(config.base_url().to_string());
        let timing = config.timing();
        effective.response_delay_ms = Some(timing.response_delay.as_millis() as u64);
        effective.reveal_interval_ms = Some(timing.reveal_interval.as_millis() as u64);
        effective.copy_feedback_ms = Some(timing.copy_feedback.as_millis() as u64);
        effective.save_to(&config_path)?;
        println!("Wrote {}", config_path.display());
        return Ok(());
    }

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => store::default_data_dir()?,
    };

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    init_logging(&data_dir, config.log_filter.as_deref())?;
    info!(version = env!("CARGO_PKG_VERSION"), "gemini-chat starting");

    // ── 3. Session ─────────────────────────────────────────────────────────────
    let model = cli.model.unwrap_or_else(|| config.model().to_string());
    let api_key = config.api_key();
    if api_key.is_none() {
        warn!(
            config = %config_path.display(),
            "no API key found; set {} or api_key in the config file",
            config::API_KEY_ENV
        );
    }
    let client = GeminiClient::new(config.base_url(), &model, api_key);
    info!(model = client.model(), data_dir = %data_dir.display(), "session configured");

    let (session, session_events) = ChatSession::restore(
        Box::new(FileStore::new(&data_dir)),
        Arc::new(client),
        Box::new(SystemClipboard),
        config.timing(),
    );
    let mut app = App::new(session, model);

    // ── 4. Terminal loop ───────────────────────────────────────────────────────
    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run(&mut terminal, &mut app, session_events).await;
    tui::restore()?;

    app.session.shutdown();
    info!("gemini-chat exiting");
    result
}

async fn run(
    terminal: &mut Tui,
    app: &mut App,
    mut session_events: UnboundedReceiver<SessionEvent>,
) -> Result<()> {
    let mut events = EventHandler::new();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        tokio::select! {
            Some(event) = events.next() => handler::handle_event(app, event)?,
            Some(event) = session_events.recv() => app.on_session_event(event),
            else => break,
        }
    }
    Ok(())
}

fn init_logging(data_dir: &Path, configured: Option<&str>) -> Result<()> {
    fs::create_dir_all(data_dir)?;
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(data_dir.join("gemini-chat.log"))?;

    // GEMINI_CHAT_LOG wins over the config file; a bad expression falls back to info.
    let env_filter = match tracing_subscriber::EnvFilter::try_from_env(LOG_ENV) {
        Ok(f) => f,
        Err(_) => {
            let configured = configured.unwrap_or("info");
            match configured.parse::<tracing_subscriber::EnvFilter>() {
                Ok(f) => f,
                Err(e) => {
                    eprintln!(
                        "WARN: log filter '{}' is not a valid tracing filter ({}); \
                         falling back to 'info'",
                        configured, e
                    );
                    tracing_subscriber::EnvFilter::new("info")
                }
            }
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .with_target(true)
        .init();
    Ok(())
}

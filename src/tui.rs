//! Terminal lifecycle and the input pump feeding [`AppEvent`]s to the main loop.

use std::io::{self, Stderr};
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{
    DisableMouseCapture, EnableMouseCapture, Event, EventStream, KeyEvent, KeyEventKind,
    MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use futures_util::{Stream, StreamExt};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

pub type Tui = Terminal<CrosstermBackend<Stderr>>;

/// Drives the loading ellipsis.
pub const TICK: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize,
    Tick,
}

/// Map a raw terminal event to what the chat cares about. Key releases and pointer motion are
/// dropped; every event that reaches the loop costs a redraw.
pub fn translate(event: Event) -> Option<AppEvent> {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => Some(AppEvent::Key(key)),
        Event::Mouse(mouse) => match mouse.kind {
            MouseEventKind::Moved | MouseEventKind::Drag(_) => None,
            _ => Some(AppEvent::Mouse(mouse)),
        },
        Event::Resize(..) => Some(AppEvent::Resize),
        _ => None,
    }
}

pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<AppEvent>,
}

impl EventHandler {
    /// Read the real terminal.
    pub fn new() -> Self {
        Self::from_stream(EventStream::new(), TICK)
    }

    /// Pump `input` and a `tick` timer into one queue until the receiver goes away.
    pub fn from_stream<S>(mut input: S, tick: Duration) -> Self
    where
        S: Stream<Item = io::Result<Event>> + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                let event = tokio::select! {
                    biased;
                    read = input.next() => match read {
                        Some(Ok(raw)) => match translate(raw) {
                            Some(event) => event,
                            None => continue,
                        },
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "terminal event stream error");
                            continue;
                        }
                        None => {
                            tracing::debug!("terminal event stream closed");
                            return;
                        }
                    },
                    _ = ticker.tick() => AppEvent::Tick,
                };
                if tx.send(event).is_err() {
                    return;
                }
            }
        });

        Self { rx }
    }

    pub async fn next(&mut self) -> Option<AppEvent> {
        self.rx.recv().await
    }
}

/// Switch stderr to raw mode on the alternate screen with mouse reporting.
pub fn init() -> Result<Tui> {
    enable_raw_mode()?;
    execute!(io::stderr(), EnterAlternateScreen, EnableMouseCapture)?;
    Ok(Terminal::new(CrosstermBackend::new(io::stderr()))?)
}

pub fn restore() -> Result<()> {
    execute!(io::stderr(), DisableMouseCapture, LeaveAlternateScreen)?;
    disable_raw_mode()?;
    Ok(())
}

/// Put the terminal back before the default hook prints the panic.
pub fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = restore();
        previous(info);
    }));
}

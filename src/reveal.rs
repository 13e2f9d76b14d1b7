use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};

use crate::session::{FlowId, SessionEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealState {
    Idle,
    Revealing,
    Done,
}

/// Word-by-word reveal of a response.
///
/// Words are split on single spaces so line breaks stay attached to their word and the
/// concatenated chunks equal the original text. An empty response is one empty word.
#[derive(Debug)]
pub struct TypingReveal {
    words: Vec<String>,
    next: usize,
    state: RevealState,
}

impl TypingReveal {
    pub fn new(text: &str) -> Self {
        Self {
            words: text.split(' ').map(str::to_string).collect(),
            next: 0,
            state: RevealState::Idle,
        }
    }

    pub fn state(&self) -> RevealState {
        self.state
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// Next chunk to append, or `None` once every word has been handed out.
    pub fn next_chunk(&mut self) -> Option<String> {
        if self.state == RevealState::Done {
            return None;
        }
        self.state = RevealState::Revealing;

        let word = &self.words[self.next];
        let chunk = if self.next == 0 {
            word.clone()
        } else {
            format!(" {}", word)
        };
        self.next += 1;

        if self.next == self.words.len() {
            self.state = RevealState::Done;
        }
        Some(chunk)
    }
}

/// Spawn the timer task that feeds a reveal into the session one word per tick.
///
/// The first word lands one `cadence` after spawning. Aborting the returned handle stops
/// the reveal; nothing else is sent afterwards.
pub fn spawn(
    flow: FlowId,
    text: String,
    cadence: Duration,
    events: UnboundedSender<SessionEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut reveal = TypingReveal::new(&text);
        let mut ticker = interval_at(Instant::now() + cadence, cadence);

        loop {
            ticker.tick().await;
            let Some(chunk) = reveal.next_chunk() else {
                return;
            };
            if events.send(SessionEvent::RevealChunk(flow, chunk)).is_err() {
                return;
            }
            if reveal.state() == RevealState::Done {
                let _ = events.send(SessionEvent::RevealDone(flow));
                return;
            }
        }
    })
}

//! Chat session controller.
//!
//! Owns the transcript and theme, and runs one response flow at a time:
//!
//! 1. `submit` appends the outgoing message and spawns the flow task.
//! 2. After the response delay the task asks for a loading placeholder, then calls the
//!    generator and reports the outcome.
//! 3. A successful response is revealed into the placeholder by a timer task
//!    (see [`crate::reveal`]); when the reveal completes the transcript is persisted.
//!
//! Tasks report back through [`SessionEvent`]s that the owner feeds into
//! [`ChatSession::handle`]. Every event carries the [`FlowId`] it belongs to, so events from
//! a flow that has since been cancelled are dropped.

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::clipboard::Clipboard;
use crate::config::Timing;
use crate::error::GenerateError;
use crate::gemini::Generator;
use crate::reveal;
use crate::store::{Store, SAVED_CHATS_KEY, THEME_KEY};
use crate::theme::Theme;
use crate::transcript::{Entry, MessageClass, MessageId, Role, Transcript};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowId(u64);

impl FlowId {
    pub(crate) fn first() -> Self {
        FlowId(1)
    }

    fn next(self) -> Self {
        FlowId(self.0 + 1)
    }
}

#[derive(Debug)]
pub enum SessionEvent {
    ShowLoading(FlowId),
    Response(FlowId, Result<String, GenerateError>),
    RevealChunk(FlowId, String),
    RevealDone(FlowId),
    CopyExpired(MessageId, u64),
}

#[derive(Debug)]
enum FlowPhase {
    Waiting,
    Loading(MessageId),
    Revealing { message: MessageId, full_text: String },
}

struct ActiveFlow {
    id: FlowId,
    phase: FlowPhase,
    task: JoinHandle<()>,
}

fn matching(active: &mut Option<ActiveFlow>, flow: FlowId) -> Option<&mut ActiveFlow> {
    active.as_mut().filter(|a| a.id == flow)
}

pub struct ChatSession {
    transcript: Transcript,
    theme: Theme,
    store: Box<dyn Store>,
    generator: Arc<dyn Generator>,
    clipboard: Box<dyn Clipboard>,
    timing: Timing,
    events: UnboundedSender<SessionEvent>,
    last_flow: Option<FlowId>,
    active: Option<ActiveFlow>,
}

impl ChatSession {
    /// Start a session from whatever the store holds. Nothing is fetched.
    pub fn restore(
        store: Box<dyn Store>,
        generator: Arc<dyn Generator>,
        clipboard: Box<dyn Clipboard>,
        timing: Timing,
    ) -> (Self, UnboundedReceiver<SessionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();

        let transcript = load_transcript(store.as_ref());
        let theme = match store.get(THEME_KEY) {
            Ok(value) => Theme::from_stored(value.as_deref()),
            Err(e) => {
                warn!(error = %e, "failed to read theme, using default");
                Theme::default()
            }
        };
        info!(messages = transcript.len(), theme = theme.as_stored(), "session restored");

        let session = Self {
            transcript,
            theme,
            store,
            generator,
            clipboard,
            timing,
            events,
            last_flow: None,
            active: None,
        };
        (session, rx)
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    /// True while a response flow is waiting, loading or revealing.
    pub fn is_busy(&self) -> bool {
        self.active.is_some()
    }

    /// Submit user input. Blank input is ignored and returns `None`.
    ///
    /// A flow still in progress is superseded: its pending request is abandoned, or its
    /// reveal is completed immediately.
    pub fn submit(&mut self, input: &str) -> Option<MessageId> {
        let text = input.trim();
        if text.is_empty() {
            return None;
        }

        if self.cancel_active() {
            self.persist();
        }

        let message = self.transcript.push(Role::User, text, MessageClass::Outgoing);
        let flow = self.last_flow.map(FlowId::next).unwrap_or_else(FlowId::first);
        self.last_flow = Some(flow);

        let task = spawn_response_flow(
            flow,
            text.to_string(),
            Arc::clone(&self.generator),
            self.timing.response_delay,
            self.events.clone(),
        );
        self.active = Some(ActiveFlow {
            id: flow,
            phase: FlowPhase::Waiting,
            task,
        });

        info!(flow = flow.0, chars = text.chars().count(), "message submitted");
        Some(message)
    }

    pub fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::ShowLoading(flow) => self.show_loading(flow),
            SessionEvent::Response(flow, result) => self.apply_response(flow, result),
            SessionEvent::RevealChunk(flow, chunk) => self.append_chunk(flow, &chunk),
            SessionEvent::RevealDone(flow) => self.finish_reveal(flow),
            SessionEvent::CopyExpired(id, generation) => {
                // A newer copy restarted the feedback; its own timer reverts the icon.
                if let Some(msg) = self.transcript.get_mut(id) {
                    if msg.copy_generation == generation {
                        msg.copied = false;
                    }
                }
            }
        }
    }

    fn show_loading(&mut self, flow: FlowId) {
        let Some(active) = matching(&mut self.active, flow) else {
            debug!(flow = flow.0, "ignoring loading event from a superseded flow");
            return;
        };
        let placeholder = self.transcript.push(Role::Model, "", MessageClass::Loading);
        active.phase = FlowPhase::Loading(placeholder);
    }

    fn apply_response(&mut self, flow: FlowId, result: Result<String, GenerateError>) {
        let Some(active) = matching(&mut self.active, flow) else {
            debug!(flow = flow.0, "ignoring response from a superseded flow");
            return;
        };

        let placeholder = match active.phase {
            FlowPhase::Loading(id) => Some(id),
            _ => None,
        };
        // The loading class goes away whatever the outcome.
        if let Some(msg) = placeholder.and_then(|id| self.transcript.get_mut(id)) {
            msg.class = MessageClass::Incoming;
        }

        match result {
            Ok(text) => {
                let Some(message) = placeholder.filter(|id| self.transcript.get(*id).is_some())
                else {
                    warn!(flow = flow.0, "response has no message to reveal into; skipping reveal");
                    self.active = None;
                    return;
                };
                if let Some(msg) = self.transcript.get_mut(message) {
                    msg.revealing = true;
                }
                debug!(flow = flow.0, chars = text.chars().count(), "response received, revealing");
                active.task = reveal::spawn(
                    flow,
                    text.clone(),
                    self.timing.reveal_interval,
                    self.events.clone(),
                );
                active.phase = FlowPhase::Revealing {
                    message,
                    full_text: text,
                };
            }
            Err(e) => {
                error!(flow = flow.0, error = %e, "generation request failed");
                if let Some(id) = placeholder {
                    self.transcript.remove(id);
                }
                self.active = None;
            }
        }
    }

    fn append_chunk(&mut self, flow: FlowId, chunk: &str) {
        let Some(active) = matching(&mut self.active, flow) else {
            return;
        };
        if let FlowPhase::Revealing { message, .. } = active.phase {
            match self.transcript.get_mut(message) {
                Some(msg) => msg.text.push_str(chunk),
                None => warn!(flow = flow.0, "reveal target disappeared"),
            }
        }
    }

    fn finish_reveal(&mut self, flow: FlowId) {
        if matching(&mut self.active, flow).is_none() {
            return;
        }
        let Some(active) = self.active.take() else {
            return;
        };
        if let FlowPhase::Revealing { message, .. } = active.phase {
            if let Some(msg) = self.transcript.get_mut(message) {
                msg.revealing = false;
            }
        }
        self.persist();
        info!(flow = flow.0, "reveal complete");
    }

    /// Stop the active flow. A running reveal is completed in place; returns whether that
    /// settled a message.
    fn cancel_active(&mut self) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };
        active.task.abort();
        info!(flow = active.id.0, "superseding active flow");

        match active.phase {
            FlowPhase::Waiting => false,
            FlowPhase::Loading(id) => {
                self.transcript.remove(id);
                false
            }
            FlowPhase::Revealing { message, full_text } => {
                match self.transcript.get_mut(message) {
                    Some(msg) => {
                        msg.text = full_text;
                        msg.revealing = false;
                        true
                    }
                    None => false,
                }
            }
        }
    }

    /// Abort any running flow without settling it. A partial reveal is never persisted.
    pub fn shutdown(&mut self) {
        if let Some(active) = self.active.take() {
            active.task.abort();
            debug!(flow = active.id.0, "flow aborted on shutdown");
        }
    }

    /// Drop every message and persist the empty transcript.
    pub fn clear(&mut self) {
        self.cancel_active();
        self.transcript.clear();
        self.persist();
        info!("transcript cleared");
    }

    pub fn toggle_theme(&mut self) -> Theme {
        self.theme = self.theme.toggled();
        if let Err(e) = self.store.set(THEME_KEY, self.theme.as_stored()) {
            warn!(error = %e, "failed to persist theme");
        }
        info!(theme = self.theme.as_stored(), "theme toggled");
        self.theme
    }

    /// Copy an incoming message's text to the clipboard and flash the confirmation icon.
    /// Returns false when nothing was copied.
    pub fn copy(&mut self, id: MessageId) -> bool {
        let Some(msg) = self.transcript.get(id) else {
            return false;
        };
        if msg.class != MessageClass::Incoming || msg.revealing || msg.text.is_empty() {
            return false;
        }

        let text = msg.text.clone();
        if let Err(e) = self.clipboard.write_text(&text) {
            warn!(error = %e, "copy to clipboard failed");
            return false;
        }
        let Some(msg) = self.transcript.get_mut(id) else {
            return false;
        };
        msg.copied = true;
        msg.copy_generation += 1;
        let generation = msg.copy_generation;

        let events = self.events.clone();
        let feedback = self.timing.copy_feedback;
        tokio::spawn(async move {
            tokio::time::sleep(feedback).await;
            let _ = events.send(SessionEvent::CopyExpired(id, generation));
        });
        true
    }

    fn persist(&mut self) {
        let entries = self.transcript.settled_entries();
        let result = serde_json::to_string(&entries)
            .map_err(anyhow::Error::from)
            .and_then(|json| self.store.set(SAVED_CHATS_KEY, &json));
        match result {
            Ok(()) => debug!(messages = entries.len(), "transcript persisted"),
            Err(e) => warn!(error = %e, "failed to persist transcript"),
        }
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn load_transcript(store: &dyn Store) -> Transcript {
    match store.get(SAVED_CHATS_KEY) {
        Ok(Some(raw)) => match serde_json::from_str::<Vec<Entry>>(&raw) {
            Ok(entries) => Transcript::from_entries(entries),
            Err(e) => {
                warn!(error = %e, "saved transcript is unreadable, starting empty");
                Transcript::new()
            }
        },
        Ok(None) => Transcript::new(),
        Err(e) => {
            warn!(error = %e, "failed to read saved transcript, starting empty");
            Transcript::new()
        }
    }
}

fn spawn_response_flow(
    flow: FlowId,
    text: String,
    generator: Arc<dyn Generator>,
    delay: std::time::Duration,
    events: UnboundedSender<SessionEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if events.send(SessionEvent::ShowLoading(flow)).is_err() {
            return;
        }
        let result = generator.generate(&text).await;
        let _ = events.send(SessionEvent::Response(flow, result));
    })
}

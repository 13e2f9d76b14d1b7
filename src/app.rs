use ratatui::layout::Rect;

use crate::session::{ChatSession, SessionEvent};
use crate::transcript::MessageId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// Terminal-side state around a [`ChatSession`].
pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub session: ChatSession,
    pub model: String,

    // Input line
    pub input: String,
    pub cursor: usize, // cursor position in input, in chars

    // Chat list
    pub selected: Option<MessageId>,
    pub scroll: u16,
    pub follow_tail: bool,
    pub chat_height: u16,
    pub total_lines: u16,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Areas for mouse hit-testing (updated during render)
    pub chat_area: Option<Rect>,
    pub theme_button_area: Option<Rect>,
    pub icon_areas: Vec<(Rect, MessageId)>,
}

impl App {
    pub fn new(session: ChatSession, model: impl Into<String>) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            session,
            model: model.into(),

            input: String::new(),
            cursor: 0,

            selected: None,
            scroll: 0,
            follow_tail: true,
            chat_height: 0,
            total_lines: 0,

            animation_frame: 0,

            chat_area: None,
            theme_button_area: None,
            icon_areas: Vec::new(),
        }
    }

    /// Send the input line. The line is cleared only when something was sent.
    pub fn submit_input(&mut self) {
        if self.session.submit(&self.input).is_some() {
            self.input.clear();
            self.cursor = 0;
            self.follow_tail = true;
        }
    }

    pub fn on_session_event(&mut self, event: SessionEvent) {
        self.session.handle(event);
        if let Some(id) = self.selected {
            if self.session.transcript().get(id).is_none() {
                self.selected = None;
            }
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.session.is_busy() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn toggle_theme(&mut self) {
        self.session.toggle_theme();
    }

    pub fn clear_transcript(&mut self) {
        self.session.clear();
        self.selected = None;
        self.scroll = 0;
        self.follow_tail = true;
    }

    // Incoming-message selection (for copy)
    pub fn select_next(&mut self) {
        let ids = self.session.transcript().incoming_ids();
        self.selected = match self.selected.and_then(|s| ids.iter().position(|id| *id == s)) {
            Some(i) => ids.get(i + 1).or(ids.last()).copied(),
            None => ids.first().copied(),
        };
    }

    pub fn select_prev(&mut self) {
        let ids = self.session.transcript().incoming_ids();
        self.selected = match self.selected.and_then(|s| ids.iter().position(|id| *id == s)) {
            Some(i) => ids.get(i.saturating_sub(1)).copied(),
            None => ids.last().copied(),
        };
    }

    pub fn copy_selected(&mut self) -> bool {
        match self.selected {
            Some(id) => self.session.copy(id),
            None => false,
        }
    }

    pub fn copy_message(&mut self, id: MessageId) -> bool {
        self.selected = Some(id);
        self.session.copy(id)
    }

    // Chat scrolling
    fn max_scroll(&self) -> u16 {
        self.total_lines.saturating_sub(self.chat_height)
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_add(lines).min(self.max_scroll());
        self.follow_tail = self.scroll >= self.max_scroll();
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_sub(lines);
        self.follow_tail = self.scroll >= self.max_scroll();
    }

    pub fn scroll_half_page_down(&mut self) {
        self.scroll_down((self.chat_height / 2).max(1));
    }

    pub fn scroll_half_page_up(&mut self) {
        self.scroll_up((self.chat_height / 2).max(1));
    }

    pub fn scroll_to_top(&mut self) {
        self.scroll = 0;
        self.follow_tail = self.max_scroll() == 0;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll = self.max_scroll();
        self.follow_tail = true;
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
        self.session.shutdown();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;
    use crate::clipboard::MemoryClipboard;
    use crate::config::Timing;
    use crate::error::GenerateError;
    use crate::gemini::Generator;
    use crate::store::{MemoryStore, SAVED_CHATS_KEY};
    use crate::transcript::{Entry, Role};

    pub struct EchoGenerator;

    #[async_trait]
    impl Generator for EchoGenerator {
        async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
            Ok(format!("you said {}", prompt))
        }
    }

    pub fn test_app(store: MemoryStore) -> (App, UnboundedReceiver<SessionEvent>, MemoryClipboard) {
        let clipboard = MemoryClipboard::new();
        let (session, rx) = ChatSession::restore(
            Box::new(store),
            Arc::new(EchoGenerator),
            Box::new(clipboard.clone()),
            Timing::default(),
        );
        (App::new(session, "gemini-pro"), rx, clipboard)
    }

    pub fn store_with(entries: &[(Role, &str)]) -> MemoryStore {
        let entries: Vec<Entry> = entries
            .iter()
            .map(|(role, text)| Entry { role: *role, text: text.to_string() })
            .collect();
        MemoryStore::with(SAVED_CHATS_KEY, &serde_json::to_string(&entries).unwrap())
    }

    #[tokio::test]
    async fn blank_input_is_kept_and_not_sent() {
        let (mut app, _rx, _) = test_app(MemoryStore::new());
        app.input = "   ".into();
        app.cursor = 3;
        app.submit_input();
        assert_eq!(app.input, "   ");
        assert!(app.session.transcript().is_empty());
    }

    #[tokio::test]
    async fn selection_walks_incoming_messages_only() {
        let store = store_with(&[
            (Role::User, "a"),
            (Role::Model, "b"),
            (Role::User, "c"),
            (Role::Model, "d"),
        ]);
        let (mut app, _rx, _) = test_app(store);
        let incoming = app.session.transcript().incoming_ids();

        app.select_prev();
        assert_eq!(app.selected, Some(incoming[1]));
        app.select_prev();
        assert_eq!(app.selected, Some(incoming[0]));
        app.select_prev();
        assert_eq!(app.selected, Some(incoming[0]));
        app.select_next();
        app.select_next();
        assert_eq!(app.selected, Some(incoming[1]));
    }

    #[tokio::test]
    async fn scrolling_is_clamped_and_tracks_the_tail() {
        let (mut app, _rx, _) = test_app(MemoryStore::new());
        app.total_lines = 50;
        app.chat_height = 10;

        app.scroll_to_bottom();
        assert_eq!(app.scroll, 40);
        app.scroll_up(5);
        assert_eq!(app.scroll, 35);
        assert!(!app.follow_tail);
        app.scroll_down(100);
        assert_eq!(app.scroll, 40);
        assert!(app.follow_tail);
    }
}

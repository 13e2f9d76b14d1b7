use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use crate::app::{App, InputMode};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize => {}
        AppEvent::Tick => app.tick_animation(),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.quit();
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.quit(),

        KeyCode::Char('i') | KeyCode::Char('a') | KeyCode::Enter => {
            app.input_mode = InputMode::Editing;
        }

        KeyCode::Char('t') => app.toggle_theme(),

        // Message selection and actions
        KeyCode::Char('j') | KeyCode::Down => app.select_next(),
        KeyCode::Char('k') | KeyCode::Up => app.select_prev(),
        KeyCode::Char('c') | KeyCode::Char('y') => {
            app.copy_selected();
        }
        KeyCode::Char('D') => app.clear_transcript(),

        // Scrolling
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_half_page_down();
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_half_page_up();
        }
        KeyCode::PageDown => app.scroll_down(app.chat_height.max(1)),
        KeyCode::PageUp => app.scroll_up(app.chat_height.max(1)),
        KeyCode::Char('g') => app.scroll_to_top(),
        KeyCode::Char('G') => app.scroll_to_bottom(),

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => app.submit_input(),
        KeyCode::Backspace => {
            if app.cursor > 0 {
                app.cursor -= 1;
                let byte_pos = char_to_byte_index(&app.input, app.cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.input.chars().count();
            if app.cursor < char_count {
                let byte_pos = char_to_byte_index(&app.input, app.cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.cursor = app.cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.input.chars().count();
            app.cursor = (app.cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.cursor = 0;
        }
        KeyCode::End => {
            app.cursor = app.input.chars().count();
        }
        KeyCode::PageDown => app.scroll_down(app.chat_height.max(1)),
        KeyCode::PageUp => app.scroll_up(app.chat_height.max(1)),
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.input, app.cursor);
            app.input.insert(byte_pos, c);
            app.cursor += 1;
        }
        _ => {}
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let x = mouse.column;
    let y = mouse.row;
    let in_chat = app.chat_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);

    match mouse.kind {
        MouseEventKind::ScrollDown if in_chat => app.scroll_down(3),
        MouseEventKind::ScrollUp if in_chat => app.scroll_up(3),
        MouseEventKind::Down(MouseButton::Left) => {
            if app.theme_button_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false) {
                app.toggle_theme();
                return;
            }
            let hit = app
                .icon_areas
                .iter()
                .find(|(rect, _)| point_in_rect(x, y, *rect))
                .map(|(_, id)| *id);
            if let Some(id) = hit {
                app.copy_message(id);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEventKind, KeyEventState};
    use crate::app::tests::{store_with, test_app};
    use crate::store::{MemoryStore, Store, THEME_KEY};
    use crate::theme::Theme;
    use crate::transcript::{CopyIcon, MessageClass, Role};

    fn key(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    fn click(column: u16, row: u16) -> AppEvent {
        AppEvent::Mouse(MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column,
            row,
            modifiers: KeyModifiers::NONE,
        })
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            handle_event(app, key(KeyCode::Char(c))).unwrap();
        }
    }

    #[tokio::test]
    async fn typing_and_enter_submits_and_clears_input() {
        let (mut app, _rx, _) = test_app(MemoryStore::new());
        type_text(&mut app, "héllo");
        handle_event(&mut app, key(KeyCode::Left)).unwrap();
        handle_event(&mut app, key(KeyCode::Backspace)).unwrap();
        assert_eq!(app.input, "hélo");

        handle_event(&mut app, key(KeyCode::Enter)).unwrap();
        assert!(app.input.is_empty());
        assert_eq!(app.cursor, 0);
        let messages = app.session.transcript().messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].class, MessageClass::Outgoing);
        assert_eq!(messages[0].text, "hélo");
    }

    #[tokio::test]
    async fn normal_mode_keys_toggle_theme_and_quit() {
        let store = MemoryStore::new();
        let (mut app, _rx, _) = test_app(store.clone());
        handle_event(&mut app, key(KeyCode::Esc)).unwrap();
        assert_eq!(app.input_mode, InputMode::Normal);

        handle_event(&mut app, key(KeyCode::Char('t'))).unwrap();
        assert_eq!(app.session.theme(), Theme::Light);
        assert_eq!(store.get(THEME_KEY).unwrap().as_deref(), Some("light_mode"));

        handle_event(&mut app, key(KeyCode::Char('q'))).unwrap();
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn copy_key_copies_selected_reply() {
        let (mut app, _rx, clipboard) =
            test_app(store_with(&[(Role::User, "q"), (Role::Model, "the answer")]));
        handle_event(&mut app, key(KeyCode::Esc)).unwrap();
        handle_event(&mut app, key(KeyCode::Char('k'))).unwrap();
        handle_event(&mut app, key(KeyCode::Char('c'))).unwrap();

        assert_eq!(clipboard.contents(), vec!["the answer"]);
        let id = app.selected.unwrap();
        assert_eq!(app.session.transcript().get(id).unwrap().icon(), Some(CopyIcon::Done));
    }

    #[tokio::test]
    async fn clicks_hit_theme_button_and_copy_icon() {
        let (mut app, _rx, clipboard) =
            test_app(store_with(&[(Role::User, "q"), (Role::Model, "clicked text")]));
        let reply = app.session.transcript().incoming_ids()[0];
        app.theme_button_area = Some(Rect::new(60, 0, 14, 1));
        app.icon_areas = vec![(Rect::new(2, 7, 16, 1), reply)];

        handle_event(&mut app, click(65, 0)).unwrap();
        assert_eq!(app.session.theme(), Theme::Light);

        handle_event(&mut app, click(30, 7)).unwrap();
        assert!(clipboard.contents().is_empty());

        handle_event(&mut app, click(5, 7)).unwrap();
        assert_eq!(clipboard.contents(), vec!["clicked text"]);
        assert_eq!(app.selected, Some(reply));
    }
}

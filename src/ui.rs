use ratatui::{
    Frame,
    layout::{Constraint, Layout, Margin, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::app::{App, InputMode};
use crate::theme::Palette;
use crate::transcript::{CopyIcon, MessageClass, MessageId};

/// Render `**bold**` spans of a line; an unclosed marker is kept literally.
fn markdown_line(text: &str, base: Style) -> Line<'static> {
    let segments: Vec<&str> = text.split("**").collect();
    let closed = segments.len() % 2 == 1;

    let mut spans: Vec<Span<'static>> = Vec::new();
    for (i, segment) in segments.iter().enumerate() {
        if !closed && i == segments.len() - 1 {
            spans.push(Span::styled(format!("**{}", segment), base));
            continue;
        }
        if segment.is_empty() {
            continue;
        }
        let style = if i % 2 == 1 { base.add_modifier(Modifier::BOLD) } else { base };
        spans.push(Span::styled(segment.to_string(), style));
    }
    Line::from(spans)
}

/// Word-wrap text to `width` display columns, splitting words wider than a row.
/// Every input line yields at least one row, so blank lines survive. Spaces inside a line
/// are kept; the one space at a wrap point is dropped.
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut rows = Vec::new();

    for line in text.split('\n') {
        let mut current = String::new();
        let mut current_width = 0;
        let mut wrapped = false;

        for (i, word) in line.split(' ').enumerate() {
            let word_width = UnicodeWidthStr::width(word);
            if i > 0 {
                if current_width > 0 && current_width + 1 + word_width > width {
                    if word.is_empty() {
                        continue;
                    }
                    rows.push(std::mem::take(&mut current));
                    current_width = 0;
                    wrapped = true;
                } else if !(current_width == 0 && wrapped) {
                    current.push(' ');
                    current_width += 1;
                }
            }

            for c in word.chars() {
                let char_width = UnicodeWidthChar::width(c).unwrap_or(0);
                if current_width > 0 && current_width + char_width > width {
                    rows.push(std::mem::take(&mut current));
                    current_width = 0;
                    wrapped = true;
                }
                current.push(c);
                current_width += char_width;
            }
        }
        rows.push(current);
    }
    rows
}

struct ChatRows {
    lines: Vec<Line<'static>>,
    // (row, message, clickable width)
    icons: Vec<(usize, MessageId, u16)>,
}

fn chat_rows(app: &App, width: usize, palette: &Palette) -> ChatRows {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut icons = Vec::new();
    let transcript = app.session.transcript();

    if transcript.is_empty() {
        lines.push(Line::from(Span::styled(
            "Ask Gemini anything...",
            Style::default().fg(palette.muted),
        )));
        return ChatRows { lines, icons };
    }

    let text_style = Style::default().fg(palette.fg);
    for msg in transcript.messages() {
        let selected = app.selected == Some(msg.id);
        let (name, color) = match msg.class {
            MessageClass::Outgoing => ("You", palette.user),
            MessageClass::Incoming | MessageClass::Loading => ("Gemini", palette.model),
        };
        let mut name_line = vec![Span::styled(
            name,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )];
        if selected {
            name_line.insert(0, Span::styled("▶ ", Style::default().fg(palette.highlight)));
        }
        lines.push(Line::from(name_line));

        match msg.class {
            MessageClass::Loading => {
                // Animated ellipsis: cycles through ".", "..", "..."
                let dots = ".".repeat((app.animation_frame as usize) + 1);
                lines.push(Line::from(Span::styled(
                    format!("Thinking{}", dots),
                    Style::default().fg(palette.muted).add_modifier(Modifier::ITALIC),
                )));
            }
            MessageClass::Outgoing => {
                for row in wrap_text(&msg.text, width) {
                    lines.push(Line::styled(row, text_style));
                }
            }
            MessageClass::Incoming => {
                for row in wrap_text(&msg.text, width) {
                    lines.push(markdown_line(&row, text_style));
                }
            }
        }

        if let Some(icon) = msg.icon() {
            let label = match icon {
                CopyIcon::Hidden => String::new(),
                other => format!("[{}]", other.glyph()),
            };
            let style = match icon {
                CopyIcon::Done => Style::default().fg(Color::Green),
                _ => Style::default().fg(palette.muted),
            };
            if matches!(icon, CopyIcon::Copy | CopyIcon::Done) {
                icons.push((lines.len(), msg.id, label.chars().count() as u16));
            }
            lines.push(Line::from(Span::styled(label, style)));
        }
        lines.push(Line::default());
    }

    ChatRows { lines, icons }
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    let palette = app.session.theme().palette();

    frame.render_widget(
        Block::default().style(Style::default().bg(palette.bg).fg(palette.fg)),
        area,
    );

    // Main layout: header, chat, input, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area, &palette);
    render_chat(app, frame, chat_area, &palette);
    render_input(app, frame, input_area, &palette);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &mut App, frame: &mut Frame, area: Rect, palette: &Palette) {
    // The button names the theme it switches to.
    let button = format!(" [{}] ", app.session.theme().toggle_label());
    let [title_area, button_area] = Layout::horizontal([
        Constraint::Min(0),
        Constraint::Length(button.chars().count() as u16),
    ])
    .areas(area);
    app.theme_button_area = Some(button_area);

    let title = Line::from(vec![
        Span::styled(" Gemini Chat ", Style::default().fg(palette.model).bold()),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(palette.muted),
        ),
    ]);

    frame.render_widget(
        Paragraph::new(title).style(Style::default().bg(palette.bar)),
        title_area,
    );
    frame.render_widget(
        Paragraph::new(Span::styled(
            button,
            Style::default().fg(Color::Black).bg(palette.highlight).bold(),
        )),
        button_area,
    );
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect, palette: &Palette) {
    app.chat_area = Some(area);

    let border_color = if app.input_mode == InputMode::Normal {
        palette.highlight
    } else {
        palette.border
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(format!(" {} ", app.model));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    // One column is left free for the scrollbar.
    let width = inner.width.saturating_sub(1) as usize;
    let rows = chat_rows(app, width, palette);

    app.chat_height = inner.height;
    app.total_lines = rows.lines.len().min(u16::MAX as usize) as u16;
    let max_scroll = app.total_lines.saturating_sub(app.chat_height);
    app.scroll = if app.follow_tail { max_scroll } else { app.scroll.min(max_scroll) };

    app.icon_areas = rows
        .icons
        .iter()
        .filter_map(|&(row, id, icon_width)| {
            let row = u16::try_from(row).ok()?;
            let visible = row >= app.scroll && row - app.scroll < inner.height;
            visible.then(|| {
                (
                    Rect::new(inner.x, inner.y + row - app.scroll, icon_width.min(inner.width), 1),
                    id,
                )
            })
        })
        .collect();

    let chat = Paragraph::new(Text::from(rows.lines)).scroll((app.scroll, 0));
    frame.render_widget(chat, inner);

    if max_scroll > 0 {
        let mut scrollbar_state = ScrollbarState::new(max_scroll as usize).position(app.scroll as usize);
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            area.inner(Margin { vertical: 1, horizontal: 0 }),
            &mut scrollbar_state,
        );
    }
}

fn render_input(app: &App, frame: &mut Frame, area: Rect, palette: &Palette) {
    let editing = app.input_mode == InputMode::Editing;
    let border_color = if editing { Color::Yellow } else { palette.border };
    let title = if app.session.is_busy() {
        " Message (Gemini is answering) "
    } else {
        " Message "
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Horizontal scrolling keeps the cursor inside the box
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.cursor;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app.input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(palette.user))
        .block(input_block);
    frame.render_widget(input, area);

    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = match app.input_mode {
        InputMode::Normal => (" NORMAL ", Style::default().bg(Color::Blue).fg(Color::White)),
        InputMode::Editing => (" INSERT ", Style::default().bg(Color::Yellow).fg(Color::Black)),
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let bindings: &[(&str, &str)] = match app.input_mode {
        InputMode::Editing => &[("Enter", "send"), ("Esc", "stop typing"), ("PgUp/PgDn", "scroll")],
        InputMode::Normal => &[
            ("i", "type"),
            ("j/k", "select"),
            ("c", "copy"),
            ("t", "theme"),
            ("D", "clear"),
            ("q", "quit"),
        ],
    };

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::styled(" ", label_style)];
    for (key, label) in bindings {
        spans.push(Span::styled(format!(" {} ", key), key_style));
        spans.push(Span::styled(format!(" {} ", label), label_style));
    }

    let footer = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

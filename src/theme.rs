use ratatui::style::Color;

const LIGHT_SENTINEL: &str = "light_mode";
const DARK_SENTINEL: &str = "dark_mode";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

/// Colors used to draw the chat in a given theme.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub bg: Color,
    pub fg: Color,
    pub muted: Color,
    pub user: Color,
    pub model: Color,
    pub border: Color,
    pub highlight: Color,
    pub bar: Color,
}

impl Theme {
    /// Parse the stored flag. Only the light sentinel means light.
    pub fn from_stored(value: Option<&str>) -> Self {
        match value {
            Some(LIGHT_SENTINEL) => Theme::Light,
            _ => Theme::Dark,
        }
    }

    pub fn as_stored(&self) -> &'static str {
        match self {
            Theme::Light => LIGHT_SENTINEL,
            Theme::Dark => DARK_SENTINEL,
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    /// Label for the toggle control: it names the action, i.e. the other theme.
    pub fn toggle_label(&self) -> &'static str {
        self.toggled().as_stored()
    }

    pub fn palette(&self) -> Palette {
        match self {
            Theme::Light => Palette {
                bg: Color::White,
                fg: Color::Black,
                muted: Color::Gray,
                user: Color::Blue,
                model: Color::Magenta,
                border: Color::Gray,
                highlight: Color::LightBlue,
                bar: Color::Gray,
            },
            Theme::Dark => Palette {
                bg: Color::Reset,
                fg: Color::White,
                muted: Color::DarkGray,
                user: Color::Cyan,
                model: Color::Yellow,
                border: Color::DarkGray,
                highlight: Color::Blue,
                bar: Color::DarkGray,
            },
        }
    }
}

use ratatui::style::{Color, Modifier, Style};
use serde::Deserialize;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Light,
    #[default]
    Dark,
}

#[derive(Clone, Debug)]
pub struct Theme {
    pub mode: ThemeMode,
    pub bg: Color,
    pub fg: Color,
    pub primary: Color,
    pub accent: Color,
    pub frame: Color,
    pub selected: Color,
    pub success: Color,
    pub error: Color,
    pub muted: Color,
}

impl Theme {
    pub fn synthwave_dark() -> Self {
        Self {
            mode: ThemeMode::Dark,
            bg: Color::Rgb(24, 24, 26),
            fg: Color::White,
            primary: Color::Rgb(255, 0, 153),
            accent: Color::Rgb(64, 160, 255),
            frame: Color::Rgb(90, 90, 100),
            selected: Color::Rgb(255, 120, 0),
            success: Color::Green,
            error: Color::Red,
            muted: Color::DarkGray,
        }
    }

    pub fn synthwave_light() -> Self {
        Self {
            mode: ThemeMode::Light,
            bg: Color::Rgb(245, 245, 247),
            fg: Color::Rgb(20, 20, 22),
            primary: Color::Rgb(200, 0, 120),
            accent: Color::Rgb(40, 120, 220),
            frame: Color::Rgb(200, 200, 210),
            selected: Color::Rgb(220, 100, 0),
            success: Color::Rgb(0, 150, 0),
            error: Color::Rgb(200, 0, 0),
            muted: Color::Rgb(120, 120, 130),
        }
    }

    pub fn from_mode(mode: ThemeMode) -> Self {
        match mode {
            ThemeMode::Dark => Self::synthwave_dark(),
            ThemeMode::Light => Self::synthwave_light(),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::synthwave_dark()
    }
}

// Style helpers that use the theme
impl Theme {
    pub fn border_focused(&self) -> Style {
        Style::default().fg(self.selected)
    }

    pub fn border_unfocused(&self) -> Style {
        Style::default().fg(self.frame)
    }

    pub fn text_active_bold(&self) -> Style {
        Style::default()
            .fg(self.accent)
            .add_modifier(Modifier::BOLD)
    }

    pub fn text_editing_bold(&self) -> Style {
        Style::default()
            .fg(self.selected)
            .add_modifier(Modifier::BOLD)
    }

    pub fn text_muted(&self) -> Style {
        Style::default().fg(self.muted)
    }

    pub fn text_help(&self) -> Style {
        Style::default()
            .fg(self.muted)
            .add_modifier(Modifier::ITALIC)
    }

    pub fn text_error(&self) -> Style {
        Style::default().fg(self.error)
    }

    pub fn mandatory_marker(&self) -> Style {
        Style::default().fg(self.primary)
    }

    pub fn section_title(&self) -> Style {
        Style::default()
            .fg(self.primary)
            .add_modifier(Modifier::BOLD)
    }

    pub fn list_cursor_style(&self) -> Style {
        Style::default()
            .fg(self.bg)
            .bg(self.selected)
            .add_modifier(Modifier::BOLD)
    }

    pub fn button(&self, enabled: bool, focused: bool) -> Style {
        match (enabled, focused) {
            (true, true) => self.list_cursor_style(),
            (true, false) => self.text_active_bold(),
            (false, true) => Style::default().fg(self.muted).bg(self.accent),
            (false, false) => self.text_muted(),
        }
    }

    pub fn title_style(&self) -> Style {
        Style::default().fg(self.accent)
    }

    pub fn base_style(&self) -> Style {
        Style::default().bg(self.bg).fg(self.fg)
    }

    pub fn toast_color(&self, level: crate::ui::ToastLevel) -> Color {
        match level {
            crate::ui::ToastLevel::Success => self.success,
            crate::ui::ToastLevel::Error => self.error,
            crate::ui::ToastLevel::Info => self.accent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_selects_palette() {
        assert_eq!(Theme::from_mode(ThemeMode::Light).mode, ThemeMode::Light);
        assert_eq!(Theme::default().mode, ThemeMode::Dark);
        let mode: ThemeMode = serde_yaml::from_str("light").unwrap();
        assert_eq!(mode, ThemeMode::Light);
    }

    #[test]
    fn disabled_buttons_never_use_cursor_style() {
        let t = Theme::default();
        assert_ne!(t.button(false, true), t.list_cursor_style());
        assert_eq!(t.button(true, true), t.list_cursor_style());
    }
}

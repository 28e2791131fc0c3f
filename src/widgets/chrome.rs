use crate::theme::Theme;
use ratatui::widgets::{Block, Borders};

pub fn panel_block_themed<'a>(title: &'a str, focused: bool, theme: &Theme) -> Block<'a> {
    let border = if focused {
        theme.border_focused()
    } else {
        theme.border_unfocused()
    };
    Block::default()
        .borders(Borders::ALL)
        .title(title)
        .title_style(theme.title_style())
        .border_style(border)
}

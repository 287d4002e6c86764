// TUI widget modules for each dashboard panel.

pub mod candidates;
pub mod fatal_error;
pub mod help_bar;
pub mod phrase_input;
pub mod quit_confirm;
pub mod status_bar;
pub mod story;

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Span;
use ratatui::widgets::{Block, Borders, Clear};
use ratatui::Frame;

use crate::tui::layout::centered_rect;

/// Bordered panel block; the border is highlighted when the panel has focus.
pub(crate) fn panel_block(title: &str, focused: bool) -> Block<'static> {
    let color = if focused { Color::Cyan } else { Color::DarkGray };
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
        .title(format!(" {} ", title))
}

/// Clear a centered `width` x `height` box and return it with its bordered
/// block. Used by the modal overlays.
pub(crate) fn overlay(
    frame: &mut Frame,
    area: Rect,
    (width, height): (u16, u16),
    title: &str,
    color: Color,
) -> (Rect, Block<'static>) {
    let dialog_area = centered_rect(width, height, area);
    frame.render_widget(Clear, dialog_area);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
        .title(Span::styled(
            format!(" {} ", title),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ));
    (dialog_area, block)
}

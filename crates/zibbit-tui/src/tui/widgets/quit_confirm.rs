// Leave-game confirmation, drawn over the dashboard while
// `ViewState::confirm_quit` is set.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use super::overlay;
use crate::tui::ViewState;

const DIALOG_SIZE: (u16, u16) = (36, 5);

pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let (dialog_area, block) = overlay(frame, area, DIALOG_SIZE, "Leave Zibbit?", Color::Yellow);
    let paragraph = Paragraph::new(dialog_lines(state))
        .block(block)
        .style(Style::default().bg(Color::Black));
    frame.render_widget(paragraph, dialog_area);
}

/// The y/n prompt, plus a warning when a typed phrase would be lost.
pub fn dialog_lines(state: &ViewState) -> Vec<Line<'static>> {
    let key = |c: &'static str, color: Color| {
        Span::styled(c, Style::default().fg(color).add_modifier(Modifier::BOLD))
    };
    let mut lines = vec![Line::from(vec![
        Span::raw(" Leave the game? ("),
        key("y", Color::Green),
        Span::raw("/"),
        key("n", Color::Red),
        Span::raw(")"),
    ])];
    if !state.input.trim().is_empty() {
        lines.push(Line::from(Span::styled(
            " Your unsent phrase will be lost.",
            Style::default().fg(Color::Gray),
        )));
    }
    lines
}

// Phrase input box.

use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use super::panel_block;
use crate::tui::{Focus, ViewState};

pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let focused = state.focus == Focus::Input;
    let block = panel_block("Your phrase", focused);
    frame.render_widget(Paragraph::new(input_line(state)).block(block), area);
}

/// The typed text with a cursor when focused; a hint while submissions are
/// closed and nothing has been typed.
pub fn input_line(state: &ViewState) -> Line<'static> {
    let focused = state.focus == Focus::Input;
    if state.input.is_empty() && !state.input_enabled() {
        return Line::from(Span::styled(
            "Submissions are closed",
            Style::default().fg(Color::DarkGray),
        ));
    }
    let text_color = if state.input_enabled() {
        Color::White
    } else {
        Color::DarkGray
    };
    let mut spans = vec![Span::styled(
        state.input.clone(),
        Style::default().fg(text_color),
    )];
    if focused {
        spans.push(Span::styled("_", Style::default().fg(Color::Cyan)));
    }
    Line::from(spans)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::tests::{sample_view, state_with};

    #[test]
    fn focused_input_shows_cursor() {
        let mut state = state_with(sample_view());
        state.input.push_str("off on a");
        let line = input_line(&state);
        assert_eq!(line.spans[0].content, "off on a");
        assert_eq!(line.spans[1].content, "_");
    }

    #[test]
    fn unfocused_input_has_no_cursor() {
        let mut state = state_with(sample_view());
        state.focus = Focus::Story;
        assert_eq!(input_line(&state).spans.len(), 1);
    }

    #[test]
    fn closed_submissions_show_hint() {
        let mut view = sample_view();
        view.phase.input_enabled = false;
        let state = state_with(view);
        assert_eq!(input_line(&state).spans[0].content, "Submissions are closed");
    }

    #[test]
    fn closed_submissions_keep_typed_text_dimmed() {
        let mut view = sample_view();
        view.phase.input_enabled = false;
        let mut state = state_with(view);
        state.input.push_str("later");
        let line = input_line(&state);
        assert_eq!(line.spans[0].content, "later");
        assert_eq!(line.spans[0].style.fg, Some(Color::DarkGray));
    }
}

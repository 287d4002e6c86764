// Help bar: key hints for the focused panel.

use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::tui::{Focus, ViewState};

pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let paragraph = Paragraph::new(Line::from(Span::styled(
        hint(state.focus),
        Style::default().fg(Color::Gray),
    )))
    .style(Style::default().bg(Color::Black));
    frame.render_widget(paragraph, area);
}

pub fn hint(focus: Focus) -> &'static str {
    match focus {
        Focus::Input => " Enter: submit  Esc: clear  Tab: candidates  Ctrl+C: quit",
        Focus::Candidates => " ↑/↓: select  Enter: vote  Tab: story  q: quit",
        Focus::Story => " ←/→: select  Enter: flag word  Tab: input  q: quit",
    }
}

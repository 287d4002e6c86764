// Story panel: the words so far, with flag bubbles on flagged words.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Paragraph, Wrap};
use ratatui::Frame;

use zibbit_core::render::WordUnit;

use super::panel_block;
use crate::tui::{Focus, ViewState};

pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let focused = state.focus == Focus::Story;
    let block = panel_block("Story", focused);

    let words = state.view.as_ref().map(|v| v.words.as_slice()).unwrap_or(&[]);
    let line = if words.is_empty() {
        Line::from(Span::styled(
            "Nothing written yet.",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let selected = focused.then_some(state.selected_word);
        Line::from(word_spans(words, selected))
    };

    let paragraph = Paragraph::new(line).block(block).wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

/// One span per word, each followed by its flag bubble when flagged.
/// `selected` is highlighted.
pub fn word_spans(words: &[WordUnit], selected: Option<usize>) -> Vec<Span<'static>> {
    let mut spans = Vec::with_capacity(words.len() * 2);
    for (i, word) in words.iter().enumerate() {
        let style = if selected == Some(i) {
            Style::default()
                .fg(Color::Black)
                .bg(Color::White)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White)
        };
        spans.push(Span::styled(word.text.clone(), style));
        if let Some(bubble) = &word.flag {
            spans.push(Span::styled(
                bubble.marks.clone(),
                Style::default().fg(Color::Red),
            ));
        }
        spans.push(Span::raw(" "));
    }
    spans
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

// Candidate panel: live phrases on their decaying highlight.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use zibbit_core::color::Rgb;
use zibbit_core::render::CandidateUnit;

use super::panel_block;
use crate::tui::{Focus, ViewState};

pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let focused = state.focus == Focus::Candidates;
    let block = panel_block("Candidates", focused);

    let candidates = state
        .view
        .as_ref()
        .map(|v| v.candidates.as_slice())
        .unwrap_or(&[]);

    let lines: Vec<Line> = if candidates.is_empty() {
        vec![Line::from(Span::styled(
            "No candidates yet.",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        candidates
            .iter()
            .enumerate()
            .map(|(i, c)| candidate_line(c, focused && i == state.selected_candidate))
            .collect()
    };

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// `▶ phrase  votes  remaining` on the candidate's background color.
pub fn candidate_line(candidate: &CandidateUnit, selected: bool) -> Line<'static> {
    let bg = to_color(candidate.background);
    let mut style = Style::default().fg(text_color(candidate.background)).bg(bg);
    if selected {
        style = style.add_modifier(Modifier::BOLD);
    }
    let marker = if selected { "▶ " } else { "  " };
    Line::from(vec![
        Span::styled(format!("{}{}", marker, candidate.phrase), style),
        Span::styled(format!("  {} ", candidate.votes_label), style),
        Span::styled(
            format!("{} ", candidate.remaining_label),
            style.add_modifier(Modifier::DIM),
        ),
    ])
}

pub fn to_color(rgb: Rgb) -> Color {
    Color::Rgb(rgb.r, rgb.g, rgb.b)
}

/// Black on light backgrounds, white on dark ones.
pub fn text_color(bg: Rgb) -> Color {
    let luma = 299 * u32::from(bg.r) + 587 * u32::from(bg.g) + 114 * u32::from(bg.b);
    if luma >= 128_000 {
        Color::Black
    } else {
        Color::White
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

// Status bar widget: connection status, game phase and countdown.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use zibbit_core::protocol::ConnectionStatus;
use zibbit_core::render::PhaseView;

use crate::tui::ViewState;

/// Render the status bar into the given area.
///
/// Layout: [connection indicator] | [phase] [countdown] [resync] [winner]
pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let connection = state
        .view
        .as_ref()
        .map_or(ConnectionStatus::default(), |v| v.connection);

    let mut spans = Vec::new();

    let (dot, dot_color) = connection_indicator(connection);
    spans.push(Span::styled(format!(" {} ", dot), Style::default().fg(dot_color)));
    spans.push(Span::styled(
        connection_label(connection),
        Style::default().fg(Color::White),
    ));

    if let Some(view) = &state.view {
        spans.push(Span::styled(" | ", Style::default().fg(Color::Gray)));
        spans.extend(phase_spans(&view.phase));

        if view.resyncing {
            spans.push(Span::styled(
                "  resyncing...",
                Style::default().fg(Color::Yellow),
            ));
        }
        if let Some(phrase) = &view.winner {
            spans.push(Span::styled(
                format!("  ★ {}", phrase),
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ));
        }
    }

    let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
    frame.render_widget(paragraph, area);
}

/// Return the connection dot character and its color.
pub fn connection_indicator(status: ConnectionStatus) -> (&'static str, Color) {
    match status {
        ConnectionStatus::Connected => ("●", Color::Green),
        ConnectionStatus::Connecting | ConnectionStatus::Reconnecting => ("●", Color::Yellow),
        ConnectionStatus::Lost => ("●", Color::Red),
    }
}

pub fn connection_label(status: ConnectionStatus) -> &'static str {
    match status {
        ConnectionStatus::Connecting => "Connecting",
        ConnectionStatus::Connected => "Live",
        ConnectionStatus::Reconnecting => "Reconnecting",
        ConnectionStatus::Lost => "Connection lost",
    }
}

/// Phase label plus countdown. A countdown that hit zero before the server
/// moved the game on is dimmed.
pub fn phase_spans(phase: &PhaseView) -> Vec<Span<'static>> {
    let mut spans = vec![Span::styled(
        phase.label,
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
    )];
    if let Some(countdown) = &phase.countdown {
        let style = if phase.likely_expired {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default().fg(Color::Cyan)
        };
        spans.push(Span::styled(format!(" {}", countdown), style));
    }
    spans
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

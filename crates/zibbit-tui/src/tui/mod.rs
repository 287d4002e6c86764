// TUI dashboard: layout, input handling, and widget rendering.
//
// The TUI owns a `ViewState` holding the latest rendered view from the
// session plus purely local concerns (focus, selection, the phrase being
// typed). The session pushes `UiUpdate` frames over an mpsc channel; the
// TUI stores them and re-draws at ~30 fps.

pub mod input;
pub mod layout;
pub mod widgets;

use std::time::Duration;

use crossterm::event::{Event, EventStream};
use futures_util::StreamExt;
use ratatui::Frame;
use tokio::sync::mpsc;

use zibbit_core::protocol::{UiUpdate, UserCommand};
use zibbit_core::render::RenderedView;

use layout::{build_layout, AppLayout};

// ---------------------------------------------------------------------------
// Focus
// ---------------------------------------------------------------------------

/// Which panel receives navigation and `Enter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Input,
    Candidates,
    Story,
}

impl Focus {
    /// Next panel in `Tab` order.
    pub fn next(self) -> Focus {
        match self {
            Focus::Input => Focus::Candidates,
            Focus::Candidates => Focus::Story,
            Focus::Story => Focus::Input,
        }
    }
}

// ---------------------------------------------------------------------------
// ViewState
// ---------------------------------------------------------------------------

/// TUI-local state.
///
/// `view` is replaced wholesale by every `UiUpdate::Frame`; the rest is
/// owned by the frontend and survives frames.
#[derive(Debug, Default)]
pub struct ViewState {
    /// Latest frame from the session. `None` until the first one arrives.
    pub view: Option<RenderedView>,
    pub focus: Focus,
    /// Index into `view.candidates`.
    pub selected_candidate: usize,
    /// Index into `view.words`.
    pub selected_word: usize,
    /// Phrase being typed.
    pub input: String,
    /// Whether the quit confirmation dialog is showing.
    pub confirm_quit: bool,
}

impl ViewState {
    fn candidate_count(&self) -> usize {
        self.view.as_ref().map_or(0, |v| v.candidates.len())
    }

    fn word_count(&self) -> usize {
        self.view.as_ref().map_or(0, |v| v.words.len())
    }

    /// Keep selections inside the current lists.
    fn clamp_selection(&mut self) {
        self.selected_candidate = self
            .selected_candidate
            .min(self.candidate_count().saturating_sub(1));
        self.selected_word = self.selected_word.min(self.word_count().saturating_sub(1));
    }

    /// Whether the session currently accepts phrase submissions.
    pub fn input_enabled(&self) -> bool {
        self.view.as_ref().is_some_and(|v| v.phase.input_enabled)
    }
}

/// Apply a single `UiUpdate` to the view state.
pub fn apply_ui_update(state: &mut ViewState, update: UiUpdate) {
    match update {
        UiUpdate::Frame(view) => {
            state.view = Some(*view);
            state.clamp_selection();
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Draw the whole dashboard for one frame.
pub fn render_frame(frame: &mut Frame, state: &ViewState) {
    let AppLayout {
        status_bar,
        story,
        candidates,
        phrase_input,
        help_bar,
    } = build_layout(frame.area());

    widgets::status_bar::render(frame, status_bar, state);
    widgets::story::render(frame, story, state);
    widgets::candidates::render(frame, candidates, state);
    widgets::phrase_input::render(frame, phrase_input, state);
    widgets::help_bar::render(frame, help_bar, state);

    if let Some(message) = state.view.as_ref().and_then(|v| v.fatal.as_deref()) {
        widgets::fatal_error::render(frame, frame.area(), message);
    }
    if state.confirm_quit {
        widgets::quit_confirm::render(frame, frame.area(), state);
    }
}

// ---------------------------------------------------------------------------
// Run loop
// ---------------------------------------------------------------------------

/// Run the TUI event loop.
///
/// Blocks until the user quits or the session closes the update channel.
/// The terminal is restored on exit and on panic.
pub async fn run(
    mut ui_rx: mpsc::Receiver<UiUpdate>,
    cmd_tx: mpsc::Sender<UserCommand>,
) -> anyhow::Result<()> {
    let mut terminal = ratatui::init();

    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        ratatui::restore();
        original_hook(panic_info);
    }));

    let mut view_state = ViewState::default();
    let mut event_stream = EventStream::new();

    let mut render_tick = tokio::time::interval(Duration::from_millis(33));
    render_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            update = ui_rx.recv() => {
                match update {
                    Some(ui_update) => apply_ui_update(&mut view_state, ui_update),
                    // Session is shutting down
                    None => break,
                }
            }

            maybe_event = event_stream.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key_event))) => {
                        if let Some(cmd) = input::handle_key(key_event, &mut view_state) {
                            let quit = cmd == UserCommand::Quit;
                            let _ = cmd_tx.send(cmd).await;
                            if quit {
                                break;
                            }
                        }
                    }
                    // Mouse and resize events; resize is picked up on the next draw
                    Some(Ok(_)) => {}
                    Some(Err(_)) | None => break,
                }
            }

            _ = render_tick.tick() => {
                terminal.draw(|frame| render_frame(frame, &view_state))?;
            }
        }
    }

    ratatui::restore();

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

// Keyboard input handling.
//
// Translates crossterm key events into `UserCommand`s for the session, or
// into local `ViewState` changes (focus, selection, the phrase being typed).

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use zibbit_core::protocol::UserCommand;

use super::{Focus, ViewState};

/// Handle a keyboard event.
///
/// Returns `Some(UserCommand)` when the key should reach the session and
/// `None` when it was handled locally.
pub fn handle_key(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    // Windows reports both press and release.
    if key_event.kind != KeyEventKind::Press {
        return None;
    }

    // Ctrl+C always quits immediately regardless of mode
    if key_event.modifiers.contains(KeyModifiers::CONTROL)
        && key_event.code == KeyCode::Char('c')
    {
        return Some(UserCommand::Quit);
    }

    if view_state.confirm_quit {
        return handle_confirm_quit(key_event, view_state);
    }

    if key_event.code == KeyCode::Tab {
        view_state.focus = view_state.focus.next();
        return None;
    }

    match view_state.focus {
        Focus::Input => handle_input(key_event, view_state),
        Focus::Candidates => handle_candidates(key_event, view_state),
        Focus::Story => handle_story(key_event, view_state),
    }
}

/// In quit confirmation mode `y`/`q` confirm, `n`/`Esc` cancel and every
/// other key is swallowed.
fn handle_confirm_quit(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    match key_event.code {
        KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Char('q') | KeyCode::Char('Q') => {
            Some(UserCommand::Quit)
        }
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
            view_state.confirm_quit = false;
            None
        }
        _ => None,
    }
}

/// Phrase input: every printable key is text, including `q`.
fn handle_input(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    match key_event.code {
        KeyCode::Enter => submit(view_state),
        KeyCode::Esc => {
            view_state.input.clear();
            None
        }
        KeyCode::Backspace => {
            view_state.input.pop();
            None
        }
        KeyCode::Char(c) if !key_event.modifiers.contains(KeyModifiers::CONTROL) => {
            view_state.input.push(c);
            None
        }
        _ => None,
    }
}

/// Send the typed phrase. The text stays in the box when the game is not
/// accepting submissions or the phrase is blank.
fn submit(view_state: &mut ViewState) -> Option<UserCommand> {
    if !view_state.input_enabled() || view_state.input.trim().is_empty() {
        return None;
    }
    let phrase = std::mem::take(&mut view_state.input);
    Some(UserCommand::SubmitPhrase(phrase.trim().to_string()))
}

fn handle_candidates(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    let count = view_state.candidate_count();
    match key_event.code {
        KeyCode::Up | KeyCode::Char('k') => {
            view_state.selected_candidate = view_state.selected_candidate.saturating_sub(1);
            None
        }
        KeyCode::Down | KeyCode::Char('j') => {
            if view_state.selected_candidate + 1 < count {
                view_state.selected_candidate += 1;
            }
            None
        }
        KeyCode::Enter => view_state
            .view
            .as_ref()?
            .candidates
            .get(view_state.selected_candidate)
            .map(|c| c.on_select.clone()),
        KeyCode::Char('q') => {
            view_state.confirm_quit = true;
            None
        }
        _ => None,
    }
}

fn handle_story(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    let count = view_state.word_count();
    match key_event.code {
        KeyCode::Left | KeyCode::Up | KeyCode::Char('h') | KeyCode::Char('k') => {
            view_state.selected_word = view_state.selected_word.saturating_sub(1);
            None
        }
        KeyCode::Right | KeyCode::Down | KeyCode::Char('l') | KeyCode::Char('j') => {
            if view_state.selected_word + 1 < count {
                view_state.selected_word += 1;
            }
            None
        }
        KeyCode::Home => {
            view_state.selected_word = 0;
            None
        }
        KeyCode::End => {
            view_state.selected_word = count.saturating_sub(1);
            None
        }
        KeyCode::Enter => view_state
            .view
            .as_ref()?
            .words
            .get(view_state.selected_word)
            .map(|w| w.on_select.clone()),
        KeyCode::Char('q') => {
            view_state.confirm_quit = true;
            None
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

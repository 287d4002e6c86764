// Renderer: derives the complete visual description of a session from the
// local state plus a handful of session-level facts.
//
// `render` is pure. The same state and context always produce the same
// `RenderedView`, and nothing is accumulated between calls.

use serde::Deserialize;

use crate::color::{interpolate, Rgb};
use crate::protocol::{ConnectionStatus, UserCommand};
use crate::state::{Candidate, GamePhase, LocalState};
use crate::time::{format_duration, remaining};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const FLAG_MARK: char = '⚑';

/// Bubbles show one mark per flag up to this many, then switch to `⚑×N`.
pub const MAX_FLAG_MARKS: u32 = 5;

pub const LABEL_IN_PLAY: &str = "In play";
pub const LABEL_COOLDOWN: &str = "Cooldown";
pub const LABEL_WAITING: &str = "Waiting for game";

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Highlight colours for candidate decay: fresh candidates start at
/// `highlight_start` and fade to `highlight_end` as they expire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub highlight_start: Rgb,
    pub highlight_end: Rgb,
}

impl Default for Palette {
    fn default() -> Self {
        Palette {
            highlight_start: Rgb::new(0xff, 0xd5, 0x4f),
            highlight_end: Rgb::new(0x3a, 0x3a, 0x3a),
        }
    }
}

/// Session-level facts the renderer needs besides `LocalState`.
#[derive(Debug, Clone, Default)]
pub struct RenderContext<'a> {
    /// Current time on the server's clock, in milliseconds.
    pub now_ms: i64,
    /// Total candidate lifetime used for decay progress.
    pub window_ms: i64,
    pub palette: Palette,
    pub connection: ConnectionStatus,
    /// Set after a reconnect until the next snapshot arrives.
    pub resyncing: bool,
    /// Whether the session currently accepts phrase submissions.
    pub input_open: bool,
    /// The phase countdown reached zero without a server transition.
    pub phase_expired: bool,
    pub fatal: Option<&'a str>,
    pub winner: Option<&'a str>,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagBubble {
    pub count: u32,
    pub marks: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordUnit {
    pub text: String,
    pub flag: Option<FlagBubble>,
    /// Command sent when the player selects this word.
    pub on_select: UserCommand,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateUnit {
    pub phrase: String,
    pub votes: u32,
    pub votes_label: String,
    pub background: Rgb,
    pub remaining_label: String,
    /// Command sent when the player selects this candidate.
    pub on_select: UserCommand,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseView {
    pub label: &'static str,
    pub countdown: Option<String>,
    pub input_enabled: bool,
    /// Advisory: the local countdown ran out but the server has not yet
    /// announced the next phase.
    pub likely_expired: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedView {
    pub words: Vec<WordUnit>,
    pub candidates: Vec<CandidateUnit>,
    pub phase: PhaseView,
    pub connection: ConnectionStatus,
    pub resyncing: bool,
    pub fatal: Option<String>,
    pub winner: Option<String>,
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

pub fn render(state: &LocalState, ctx: &RenderContext<'_>) -> RenderedView {
    let words = state
        .story()
        .iter()
        .map(|w| WordUnit {
            text: w.text.clone(),
            flag: flag_bubble(w.flag_count),
            on_select: UserCommand::FlagWord(w.id.clone()),
        })
        .collect();

    let candidates = state
        .candidates()
        .iter()
        .filter(|c| is_visible(c, ctx.now_ms))
        .map(|c| candidate_unit(c, ctx))
        .collect();

    RenderedView {
        words,
        candidates,
        phase: phase_view(state.phase(), ctx),
        connection: ctx.connection,
        resyncing: ctx.resyncing,
        fatal: ctx.fatal.map(str::to_string),
        winner: ctx.winner.map(str::to_string),
    }
}

fn candidate_unit(c: &Candidate, ctx: &RenderContext<'_>) -> CandidateUnit {
    let left = remaining(c.expires_at.as_millis(), ctx.now_ms);
    CandidateUnit {
        phrase: c.phrase.clone(),
        votes: c.votes,
        votes_label: c.votes.to_string(),
        background: decay_color(left, ctx.window_ms, &ctx.palette),
        remaining_label: format_duration(left),
        on_select: UserCommand::CastVote(c.id.clone()),
    }
}

fn phase_view(phase: GamePhase, ctx: &RenderContext<'_>) -> PhaseView {
    let label = match phase {
        GamePhase::InPlay { .. } => LABEL_IN_PLAY,
        GamePhase::Cooldown { .. } => LABEL_COOLDOWN,
        GamePhase::Unknown => LABEL_WAITING,
    };
    let countdown = phase
        .deadline()
        .map(|deadline| format_duration(remaining(deadline.as_millis(), ctx.now_ms)));
    PhaseView {
        label,
        countdown,
        input_enabled: phase.is_in_play() && ctx.input_open && ctx.fatal.is_none(),
        likely_expired: ctx.phase_expired,
    }
}

/// The bubble shown next to a flagged word; `None` when unflagged.
pub fn flag_bubble(count: u32) -> Option<FlagBubble> {
    if count == 0 {
        return None;
    }
    let marks = if count <= MAX_FLAG_MARKS {
        std::iter::repeat(FLAG_MARK).take(count as usize).collect()
    } else {
        format!("{FLAG_MARK}×{count}")
    };
    Some(FlagBubble { count, marks })
}

/// How far through its lifetime a candidate is, in [0, 1].
pub fn decay_progress(remaining_ms: i64, window_ms: i64) -> f64 {
    if window_ms <= 0 {
        return 1.0;
    }
    ((window_ms - remaining_ms) as f64 / window_ms as f64).clamp(0.0, 1.0)
}

pub fn decay_color(remaining_ms: i64, window_ms: i64, palette: &Palette) -> Rgb {
    interpolate(
        palette.highlight_start,
        palette.highlight_end,
        decay_progress(remaining_ms, window_ms),
    )
}

/// A candidate stays on screen until its local countdown runs out. Its data
/// is only removed by a server event.
pub fn is_visible(candidate: &Candidate, now_ms: i64) -> bool {
    remaining(candidate.expires_at.as_millis(), now_ms) > 0
}

pub fn visible_count(state: &LocalState, now_ms: i64) -> usize {
    state
        .candidates()
        .iter()
        .filter(|c| is_visible(c, now_ms))
        .count()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{CandidateId, Word, WordId};
    use crate::time::{Timestamp, EXPIRED_LABEL};

    const NOW: i64 = 1_000_000;
    const WINDOW: i64 = 10_000;

    fn ctx() -> RenderContext<'static> {
        RenderContext {
            now_ms: NOW,
            window_ms: WINDOW,
            input_open: true,
            ..RenderContext::default()
        }
    }

    fn candidate(id: i64, phrase: &str, votes: u32, expires: i64) -> Candidate {
        Candidate {
            id: id.into(),
            phrase: phrase.into(),
            votes,
            expires_at: Timestamp::from_millis(expires),
        }
    }

    fn state_with(words: &[(i64, &str, u32)], candidates: Vec<Candidate>) -> LocalState {
        let mut state = LocalState::new();
        state.replace_snapshot(
            words
                .iter()
                .map(|&(id, text, flags)| Word {
                    id: id.into(),
                    text: text.into(),
                    flag_count: flags,
                })
                .collect(),
            candidates,
            GamePhase::InPlay {
                game_end_at: Timestamp::from_millis(NOW + 65_000),
                server_time: Timestamp::from_millis(NOW),
            },
        );
        state
    }

    #[test]
    fn words_keep_order_and_flag_bubbles() {
        let state = state_with(&[(1, "The", 0), (2, "story", 2)], vec![]);
        let view = render(&state, &ctx());
        assert_eq!(view.words.len(), 2);
        assert_eq!(view.words[0].text, "The");
        assert!(view.words[0].flag.is_none());
        let bubble = view.words[1].flag.as_ref().unwrap();
        assert_eq!(bubble.count, 2);
        assert_eq!(bubble.marks, "⚑⚑");
        assert_eq!(view.words[1].on_select, UserCommand::FlagWord(WordId::from(2)));
    }

    #[test]
    fn flag_bubble_caps_marks() {
        assert_eq!(flag_bubble(5).unwrap().marks, "⚑⚑⚑⚑⚑");
        assert_eq!(flag_bubble(12).unwrap().marks, "⚑×12");
        assert!(flag_bubble(0).is_none());
    }

    #[test]
    fn fresh_candidate_has_start_color() {
        let state = state_with(&[], vec![candidate(7, "begins", 1, NOW + WINDOW)]);
        let view = render(&state, &ctx());
        let unit = &view.candidates[0];
        assert_eq!(unit.phrase, "begins");
        assert_eq!(unit.votes_label, "1");
        assert_eq!(unit.background, Palette::default().highlight_start);
        assert_eq!(unit.remaining_label, "10s");
        assert_eq!(unit.on_select, UserCommand::CastVote(CandidateId::from(7)));
    }

    #[test]
    fn candidate_color_decays_towards_end() {
        let palette = Palette::default();
        assert_eq!(decay_color(WINDOW, WINDOW, &palette), palette.highlight_start);
        assert_eq!(decay_color(0, WINDOW, &palette), palette.highlight_end);
        let halfway = decay_color(WINDOW / 2, WINDOW, &palette);
        assert_eq!(
            halfway,
            interpolate(palette.highlight_start, palette.highlight_end, 0.5)
        );
    }

    #[test]
    fn progress_is_clamped() {
        assert_eq!(decay_progress(WINDOW * 2, WINDOW), 0.0);
        assert_eq!(decay_progress(-5, WINDOW), 1.0);
        assert_eq!(decay_progress(100, 0), 1.0);
    }

    #[test]
    fn expired_candidates_are_hidden_not_removed() {
        let state = state_with(
            &[],
            vec![candidate(1, "gone", 1, NOW), candidate(2, "here", 1, NOW + 1)],
        );
        let view = render(&state, &ctx());
        let phrases: Vec<&str> = view.candidates.iter().map(|c| c.phrase.as_str()).collect();
        assert_eq!(phrases, vec!["here"]);
        assert_eq!(state.candidates().len(), 2);
        assert_eq!(visible_count(&state, NOW), 1);
    }

    #[test]
    fn render_is_idempotent() {
        let state = state_with(&[(1, "The", 1)], vec![candidate(7, "begins", 3, NOW + 4_000)]);
        let first = render(&state, &ctx());
        let second = render(&state, &ctx());
        assert_eq!(first, second);
        assert_eq!(second.words.len(), 1);
        assert_eq!(second.candidates.len(), 1);
    }

    #[test]
    fn phase_view_labels() {
        let state = state_with(&[], vec![]);
        let view = render(&state, &ctx());
        assert_eq!(view.phase.label, LABEL_IN_PLAY);
        assert_eq!(view.phase.countdown.as_deref(), Some("1m 5s"));
        assert!(view.phase.input_enabled);

        let mut cooldown = LocalState::new();
        cooldown.set_phase(GamePhase::Cooldown {
            next_game_start_at: Timestamp::from_millis(NOW - 1),
            server_time: Timestamp::from_millis(NOW - 60_000),
        });
        let view = render(&cooldown, &ctx());
        assert_eq!(view.phase.label, LABEL_COOLDOWN);
        assert_eq!(view.phase.countdown.as_deref(), Some(EXPIRED_LABEL));
        assert!(!view.phase.input_enabled);

        let view = render(&LocalState::new(), &ctx());
        assert_eq!(view.phase.label, LABEL_WAITING);
        assert_eq!(view.phase.countdown, None);
    }

    #[test]
    fn fatal_error_disables_input() {
        let state = state_with(&[], vec![]);
        let ctx = RenderContext {
            fatal: Some("unknown game status \"ERROR\""),
            ..ctx()
        };
        let view = render(&state, &ctx);
        assert!(!view.phase.input_enabled);
        assert_eq!(view.fatal.as_deref(), Some("unknown game status \"ERROR\""));
    }

    #[test]
    fn closed_input_stays_closed_in_play() {
        let state = state_with(&[], vec![]);
        let ctx = RenderContext {
            input_open: false,
            phase_expired: true,
            ..ctx()
        };
        let view = render(&state, &ctx);
        assert!(!view.phase.input_enabled);
        assert!(view.phase.likely_expired);
    }
}

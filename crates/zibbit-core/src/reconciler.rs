// Reconciler: applies server events to the local state mirror.
//
// The reconciler is the only writer of `LocalState`. It knows nothing about
// timers or rendering; `apply` reports what changed as a list of `Effect`s
// and the session loop decides what to do with them.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::protocol::{GameStatePayload, ServerEvent};
use crate::state::{Candidate, GamePhase, LocalState, VoteOutcome, Word};
use crate::time::{ClockSkew, Timestamp};

pub const STATUS_IN_PLAY: &str = "IN_PLAY";
pub const STATUS_COOLDOWN: &str = "COOLDOWN";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReconcileError {
    /// The snapshot named a phase this client does not understand. The
    /// client and server protocols have diverged.
    #[error("unknown game status {0:?}")]
    UnknownPhase(String),

    #[error("{status} snapshot is missing {field}")]
    MissingDeadline {
        status: &'static str,
        field: &'static str,
    },
}

/// Connection state of the push channel as seen by the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    /// No connection has been opened yet.
    #[default]
    Idle,
    Connected,
    /// The transport failed and is retrying.
    Reconnecting,
}

/// A consequence of applying an event that the session loop must act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// The phase deadline changed; (re)start the phase countdown.
    StartPhaseCountdown,
    /// The candidate set was replaced or changed membership.
    CandidatesChanged,
    /// The candidate input should accept submissions again.
    EnableInput,
    /// A candidate crossed the win threshold.
    WinnerFlash { phrase: String },
    /// A full snapshot with a recognized phase was applied.
    SnapshotApplied,
    /// The snapshot that ended a reconnect was applied.
    ResyncComplete,
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct Reconciler {
    state: LocalState,
    link: LinkState,
    awaiting_resync: bool,
    skew: ClockSkew,
}

impl Reconciler {
    pub fn new(skew: ClockSkew) -> Self {
        Reconciler {
            skew,
            ..Reconciler::default()
        }
    }

    pub fn state(&self) -> &LocalState {
        &self.state
    }

    pub fn link(&self) -> LinkState {
        self.link
    }

    /// True between a reconnect and the next `game_state` snapshot. Events
    /// applied meanwhile are best-effort.
    pub fn awaiting_resync(&self) -> bool {
        self.awaiting_resync
    }

    /// The current local time translated to the server's clock.
    pub fn server_now(&self, local_now_ms: i64) -> i64 {
        self.skew.server_now(local_now_ms)
    }

    /// The push channel opened (first connect or reconnect).
    pub fn on_open(&mut self) {
        match self.link {
            LinkState::Idle => info!("push channel connected"),
            LinkState::Reconnecting => {
                info!("push channel reconnected, awaiting snapshot");
                self.awaiting_resync = true;
            }
            LinkState::Connected => debug!("duplicate open notification"),
        }
        self.link = LinkState::Connected;
    }

    /// The push channel dropped. The transport retries on its own.
    pub fn on_lost(&mut self) {
        if self.link != LinkState::Reconnecting {
            warn!("push channel lost, reconnecting");
        }
        self.link = LinkState::Reconnecting;
    }

    /// Apply one server event observed at local time `local_now_ms`.
    ///
    /// On error the state is left untouched.
    pub fn apply(
        &mut self,
        event: ServerEvent,
        local_now_ms: i64,
    ) -> Result<Vec<Effect>, ReconcileError> {
        if let Some(server_time) = event.server_time() {
            self.skew.observe(server_time, local_now_ms);
        }
        let stamp = event
            .server_time()
            .unwrap_or_else(|| Timestamp::from_millis(self.skew.server_now(local_now_ms)));

        let effects = match event {
            ServerEvent::GameState(payload) => self.apply_snapshot(payload, stamp)?,

            ServerEvent::GameStart(p) => {
                self.state.set_phase(GamePhase::InPlay {
                    game_end_at: p.game_end_utc_time,
                    server_time: stamp,
                });
                vec![Effect::StartPhaseCountdown, Effect::EnableInput]
            }

            ServerEvent::GameEnd(p) => {
                self.state.set_phase(GamePhase::Cooldown {
                    next_game_start_at: p.next_game_start_utc_time,
                    server_time: stamp,
                });
                self.state.clear_story_and_candidates();
                vec![Effect::CandidatesChanged, Effect::StartPhaseCountdown]
            }

            ServerEvent::StoryUpdate(p) => {
                self.state
                    .replace_story(p.story.into_iter().map(Word::from).collect());
                Vec::new()
            }

            ServerEvent::CandidateUpdate(c) => {
                let candidate = Candidate::from(c);
                debug!(candidate = %candidate.id, votes = candidate.votes, "candidate update");
                if self.state.append_or_upsert_candidate(candidate) {
                    vec![Effect::CandidatesChanged]
                } else {
                    Vec::new()
                }
            }

            ServerEvent::CandidateVote(p) => {
                match self
                    .state
                    .update_candidate_vote(&p.candidate_id, p.votes, p.expiration_utc_time)
                {
                    VoteOutcome::Updated | VoteOutcome::Stale => Vec::new(),
                    VoteOutcome::Created => vec![Effect::CandidatesChanged],
                    VoteOutcome::Won(winner) => {
                        info!(candidate = %p.candidate_id, votes = p.votes, "candidate won");
                        let mut effects = vec![Effect::CandidatesChanged];
                        if let Some(winner) = winner {
                            effects.push(Effect::WinnerFlash {
                                phrase: winner.phrase,
                            });
                        }
                        effects
                    }
                }
            }

            ServerEvent::WordFlag(p) => {
                if !self.state.set_word_flag_count(&p.word_id, p.flags) {
                    debug!(word = %p.word_id, "flag for unknown word ignored");
                }
                Vec::new()
            }
        };
        Ok(effects)
    }

    fn apply_snapshot(
        &mut self,
        p: GameStatePayload,
        stamp: Timestamp,
    ) -> Result<Vec<Effect>, ReconcileError> {
        let mut effects = match p.game_status.as_str() {
            STATUS_IN_PLAY => {
                let game_end_at = p.game_end_utc_time.ok_or(ReconcileError::MissingDeadline {
                    status: STATUS_IN_PLAY,
                    field: "game_end_utc_time",
                })?;
                let story = p.story.into_iter().map(Word::from).collect();
                let candidates = p.candidates.into_iter().map(Candidate::from).collect();
                self.state.replace_snapshot(
                    story,
                    candidates,
                    GamePhase::InPlay {
                        game_end_at,
                        server_time: stamp,
                    },
                );
                vec![
                    Effect::CandidatesChanged,
                    Effect::StartPhaseCountdown,
                    Effect::EnableInput,
                ]
            }
            STATUS_COOLDOWN => {
                let next_game_start_at =
                    p.next_game_start_utc_time
                        .ok_or(ReconcileError::MissingDeadline {
                            status: STATUS_COOLDOWN,
                            field: "next_game_start_utc_time",
                        })?;
                self.state.clear_story_and_candidates();
                self.state.set_phase(GamePhase::Cooldown {
                    next_game_start_at,
                    server_time: stamp,
                });
                vec![Effect::CandidatesChanged, Effect::StartPhaseCountdown]
            }
            other => return Err(ReconcileError::UnknownPhase(other.to_string())),
        };

        info!(
            status = %p.game_status,
            words = self.state.story().len(),
            candidates = self.state.candidates().len(),
            "snapshot applied"
        );
        effects.push(Effect::SnapshotApplied);
        if self.awaiting_resync {
            self.awaiting_resync = false;
            effects.push(Effect::ResyncComplete);
        }
        Ok(effects)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{self, ServerEvent};

    const NOW: i64 = 1_744_051_800_000;

    fn event(name: &str, data: &str) -> ServerEvent {
        ServerEvent::parse(name, data).unwrap()
    }

    fn in_play_snapshot() -> ServerEvent {
        event(
            protocol::GAME_STATE,
            r#"{"game_status": "IN_PLAY", "game_end_utc_time": 1744051920, "server_time": 1744051800,
                "story": [{"word_id": 1, "word": "The", "flags": 0}],
                "candidates": [{"candidate_id": 7, "phrase": "begins", "votes": 1, "expiration_utc_time": 1744051810}]}"#,
        )
    }

    fn connected() -> Reconciler {
        let mut r = Reconciler::default();
        r.on_open();
        r
    }

    #[test]
    fn in_play_snapshot_replaces_state() {
        let mut r = connected();
        let effects = r.apply(in_play_snapshot(), NOW).unwrap();
        assert!(effects.contains(&Effect::StartPhaseCountdown));
        assert!(effects.contains(&Effect::EnableInput));
        assert!(effects.contains(&Effect::SnapshotApplied));
        assert!(!effects.contains(&Effect::ResyncComplete));
        assert_eq!(r.state().story()[0].text, "The");
        assert_eq!(r.state().candidates().len(), 1);
        assert!(r.state().phase().is_in_play());
    }

    #[test]
    fn cooldown_snapshot_empties_story_and_candidates() {
        let mut r = connected();
        r.apply(in_play_snapshot(), NOW).unwrap();
        let effects = r
            .apply(
                event(
                    protocol::GAME_STATE,
                    r#"{"game_status": "COOLDOWN", "next_game_start_utc_time": 1744051860,
                        "story": [{"word_id": 9, "word": "ignored"}]}"#,
                ),
                NOW,
            )
            .unwrap();
        assert!(effects.contains(&Effect::StartPhaseCountdown));
        assert!(r.state().story().is_empty());
        assert!(r.state().candidates().is_empty());
        assert_eq!(
            r.state().phase().deadline(),
            Some(Timestamp::from_millis(1_744_051_860_000))
        );
    }

    #[test]
    fn unknown_status_is_an_error_and_leaves_state() {
        let mut r = connected();
        r.apply(in_play_snapshot(), NOW).unwrap();
        let before = r.state().clone();
        let err = r
            .apply(event(protocol::GAME_STATE, r#"{"game_status": "ERROR"}"#), NOW)
            .unwrap_err();
        assert_eq!(err, ReconcileError::UnknownPhase("ERROR".into()));
        assert_eq!(r.state(), &before);
    }

    #[test]
    fn in_play_without_end_time_is_rejected() {
        let mut r = connected();
        let err = r
            .apply(event(protocol::GAME_STATE, r#"{"game_status": "IN_PLAY"}"#), NOW)
            .unwrap_err();
        assert!(matches!(err, ReconcileError::MissingDeadline { status: STATUS_IN_PLAY, .. }));
        assert_eq!(r.state().phase(), GamePhase::Unknown);
    }

    #[test]
    fn reconnect_awaits_snapshot() {
        let mut r = connected();
        r.apply(in_play_snapshot(), NOW).unwrap();
        r.on_lost();
        assert_eq!(r.link(), LinkState::Reconnecting);
        r.on_open();
        assert_eq!(r.link(), LinkState::Connected);
        assert!(r.awaiting_resync());

        // Incremental events still apply while awaiting resync.
        r.apply(
            event(protocol::WORD_FLAG, r#"{"word_id": 1, "flags": 1}"#),
            NOW,
        )
        .unwrap();
        assert_eq!(r.state().story()[0].flag_count, 1);
        assert!(r.awaiting_resync());

        let effects = r.apply(in_play_snapshot(), NOW).unwrap();
        assert!(effects.contains(&Effect::ResyncComplete));
        assert!(!r.awaiting_resync());
    }

    #[test]
    fn vote_sequence_keeps_last_values() {
        let mut r = connected();
        r.apply(in_play_snapshot(), NOW).unwrap();
        for (votes, exp) in [(2, 1744051812), (3, 1744051815), (4, 1744051818)] {
            let data = format!(
                r#"{{"candidate_id": 7, "votes": {votes}, "expiration_utc_time": {exp}}}"#
            );
            assert!(r.apply(event(protocol::CANDIDATE_VOTE, &data), NOW).unwrap().is_empty());
        }
        let c = r.state().candidates().get(&7.into()).unwrap();
        assert_eq!(c.votes, 4);
        assert_eq!(c.expires_at.as_millis(), 1_744_051_818_000);
    }

    #[test]
    fn winning_vote_removes_and_flashes() {
        let mut r = connected();
        r.apply(in_play_snapshot(), NOW).unwrap();
        let effects = r
            .apply(event(protocol::CANDIDATE_VOTE, r#"{"candidate_id": 7, "votes": 5}"#), NOW)
            .unwrap();
        assert_eq!(
            effects,
            vec![
                Effect::CandidatesChanged,
                Effect::WinnerFlash {
                    phrase: "begins".into()
                }
            ]
        );
        assert!(r.state().candidates().get(&7.into()).is_none());
    }

    #[test]
    fn winning_vote_for_unknown_candidate_has_no_flash() {
        let mut r = connected();
        let effects = r
            .apply(event(protocol::CANDIDATE_VOTE, r#"{"candidate_id": 3, "votes": 5}"#), NOW)
            .unwrap();
        assert_eq!(effects, vec![Effect::CandidatesChanged]);
    }

    #[test]
    fn candidate_update_reports_new_members_only() {
        let mut r = connected();
        let data = r#"{"candidate_id": 8, "phrase": "off on a", "votes": 0, "expiration_utc_time": 1744051810}"#;
        assert_eq!(
            r.apply(event(protocol::CANDIDATE_UPDATE, data), NOW).unwrap(),
            vec![Effect::CandidatesChanged]
        );
        assert!(r.apply(event(protocol::CANDIDATE_UPDATE, data), NOW).unwrap().is_empty());
        assert_eq!(r.state().candidates().len(), 1);
    }

    #[test]
    fn game_end_clears_and_game_start_enables_input() {
        let mut r = connected();
        r.apply(in_play_snapshot(), NOW).unwrap();
        r.apply(
            event(protocol::GAME_END, r#"{"next_game_start_utc_time": 1744051980}"#),
            NOW,
        )
        .unwrap();
        assert!(r.state().story().is_empty());
        assert!(!r.state().phase().is_in_play());

        let effects = r
            .apply(
                event(protocol::GAME_START, r#"{"game_end_utc_time": 1744052100}"#),
                NOW,
            )
            .unwrap();
        assert_eq!(effects, vec![Effect::StartPhaseCountdown, Effect::EnableInput]);
        assert_eq!(
            r.state().phase().deadline(),
            Some(Timestamp::from_millis(1_744_052_100_000))
        );
    }

    #[test]
    fn story_update_replaces_words() {
        let mut r = connected();
        r.apply(in_play_snapshot(), NOW).unwrap();
        r.apply(
            event(
                protocol::STORY_UPDATE,
                r#"{"story": [{"word_id": 1, "word": "The"}, {"word_id": 2, "word": "cat"}]}"#,
            ),
            NOW,
        )
        .unwrap();
        let words: Vec<&str> = r.state().story().iter().map(|w| w.text.as_str()).collect();
        assert_eq!(words, vec!["The", "cat"]);
    }

    #[test]
    fn server_time_updates_clock_skew() {
        let mut r = connected();
        r.apply(in_play_snapshot(), NOW - 2_000).unwrap();
        assert_eq!(r.server_now(NOW), NOW + 2_000);
    }

    #[test]
    fn disabled_skew_keeps_local_clock() {
        let mut r = Reconciler::new(ClockSkew::new(false));
        r.on_open();
        r.apply(in_play_snapshot(), NOW - 2_000).unwrap();
        assert_eq!(r.server_now(NOW), NOW);
    }
}

// Message types: server-pushed events (SSE wire format) and the
// session <-> frontend channel types.

use serde::Deserialize;
use thiserror::Error;

use crate::render::RenderedView;
use crate::state::{Candidate, CandidateId, Word, WordId};
use crate::time::Timestamp;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown event type {name:?}")]
    UnknownEvent { name: String },

    #[error("malformed {event} payload: {source}")]
    Malformed {
        event: String,
        source: serde_json::Error,
    },
}

// ---------------------------------------------------------------------------
// Event names
// ---------------------------------------------------------------------------

pub const GAME_STATE: &str = "game_state";
pub const GAME_START: &str = "game_start";
pub const GAME_END: &str = "game_end";
pub const STORY_UPDATE: &str = "story_update";
pub const CANDIDATE_UPDATE: &str = "candidate_update";
pub const CANDIDATE_VOTE: &str = "candidate_vote";
pub const WORD_FLAG: &str = "word_flag";

/// Every event type the client subscribes to.
pub const SUBSCRIBED_EVENTS: &[&str] = &[
    GAME_STATE,
    GAME_START,
    GAME_END,
    STORY_UPDATE,
    CANDIDATE_UPDATE,
    CANDIDATE_VOTE,
    WORD_FLAG,
];

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// A story word as sent by the server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WireWord {
    pub word_id: WordId,
    pub word: String,
    #[serde(default)]
    pub flags: u32,
}

impl From<WireWord> for Word {
    fn from(w: WireWord) -> Self {
        Word {
            id: w.word_id,
            text: w.word,
            flag_count: w.flags,
        }
    }
}

/// A candidate as sent by the server, inside snapshots and as the body of
/// `candidate_update`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WireCandidate {
    pub candidate_id: CandidateId,
    #[serde(default)]
    pub phrase: String,
    #[serde(default)]
    pub votes: u32,
    pub expiration_utc_time: Timestamp,
    #[serde(default)]
    pub server_time: Option<Timestamp>,
}

impl From<WireCandidate> for Candidate {
    fn from(c: WireCandidate) -> Self {
        Candidate {
            id: c.candidate_id,
            phrase: c.phrase,
            votes: c.votes,
            expires_at: c.expiration_utc_time,
        }
    }
}

/// Full snapshot, sent on every (re)connect.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GameStatePayload {
    pub game_status: String,
    #[serde(default)]
    pub game_end_utc_time: Option<Timestamp>,
    #[serde(default)]
    pub next_game_start_utc_time: Option<Timestamp>,
    #[serde(default)]
    pub server_time: Option<Timestamp>,
    #[serde(default)]
    pub story: Vec<WireWord>,
    #[serde(default)]
    pub candidates: Vec<WireCandidate>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GameStartPayload {
    pub game_end_utc_time: Timestamp,
    #[serde(default)]
    pub server_time: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GameEndPayload {
    pub next_game_start_utc_time: Timestamp,
    #[serde(default)]
    pub server_time: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StoryUpdatePayload {
    pub story: Vec<WireWord>,
    #[serde(default)]
    pub server_time: Option<Timestamp>,
}

/// A vote tally change. A missing (or null) expiration means the candidate
/// crossed the win threshold.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CandidateVotePayload {
    pub candidate_id: CandidateId,
    pub votes: u32,
    #[serde(default)]
    pub expiration_utc_time: Option<Timestamp>,
    #[serde(default)]
    pub server_time: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WordFlagPayload {
    pub word_id: WordId,
    pub flags: u32,
    #[serde(default)]
    pub server_time: Option<Timestamp>,
}

// ---------------------------------------------------------------------------
// ServerEvent
// ---------------------------------------------------------------------------

/// A decoded server-pushed event.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    GameState(GameStatePayload),
    GameStart(GameStartPayload),
    GameEnd(GameEndPayload),
    StoryUpdate(StoryUpdatePayload),
    CandidateUpdate(WireCandidate),
    CandidateVote(CandidateVotePayload),
    WordFlag(WordFlagPayload),
}

impl ServerEvent {
    /// Decode an SSE message from its `event:` name and `data:` body.
    pub fn parse(name: &str, data: &str) -> Result<Self, ProtocolError> {
        fn decode<'a, T: Deserialize<'a>>(name: &str, data: &'a str) -> Result<T, ProtocolError> {
            serde_json::from_str(data).map_err(|source| ProtocolError::Malformed {
                event: name.to_string(),
                source,
            })
        }

        let event = match name {
            GAME_STATE => ServerEvent::GameState(decode(name, data)?),
            GAME_START => ServerEvent::GameStart(decode(name, data)?),
            GAME_END => ServerEvent::GameEnd(decode(name, data)?),
            STORY_UPDATE => ServerEvent::StoryUpdate(decode(name, data)?),
            CANDIDATE_UPDATE => ServerEvent::CandidateUpdate(decode(name, data)?),
            CANDIDATE_VOTE => ServerEvent::CandidateVote(decode(name, data)?),
            WORD_FLAG => ServerEvent::WordFlag(decode(name, data)?),
            other => {
                return Err(ProtocolError::UnknownEvent {
                    name: other.to_string(),
                })
            }
        };
        Ok(event)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::GameState(_) => GAME_STATE,
            ServerEvent::GameStart(_) => GAME_START,
            ServerEvent::GameEnd(_) => GAME_END,
            ServerEvent::StoryUpdate(_) => STORY_UPDATE,
            ServerEvent::CandidateUpdate(_) => CANDIDATE_UPDATE,
            ServerEvent::CandidateVote(_) => CANDIDATE_VOTE,
            ServerEvent::WordFlag(_) => WORD_FLAG,
        }
    }

    /// The server clock reading attached to the event, if any.
    pub fn server_time(&self) -> Option<Timestamp> {
        match self {
            ServerEvent::GameState(p) => p.server_time,
            ServerEvent::GameStart(p) => p.server_time,
            ServerEvent::GameEnd(p) => p.server_time,
            ServerEvent::StoryUpdate(p) => p.server_time,
            ServerEvent::CandidateUpdate(p) => p.server_time,
            ServerEvent::CandidateVote(p) => p.server_time,
            ServerEvent::WordFlag(p) => p.server_time,
        }
    }
}

// ---------------------------------------------------------------------------
// Session <-> frontend
// ---------------------------------------------------------------------------

/// Connection health as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    /// No stream has opened yet.
    #[default]
    Connecting,
    Connected,
    /// The stream dropped recently; the transport is retrying.
    Reconnecting,
    /// The stream has been down longer than the grace period.
    Lost,
}

/// An intent the frontend sends to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    SubmitPhrase(String),
    CastVote(CandidateId),
    FlagWord(WordId),
    Quit,
}

/// Updates pushed from the session to the frontend.
#[derive(Debug, Clone, PartialEq)]
pub enum UiUpdate {
    /// A freshly rendered view of the whole session.
    Frame(Box<RenderedView>),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

// Local state store: the client's mirror of story, candidates and phase.
//
// Every mutation goes through one of the methods below and leaves the store
// consistent. The reconciler owns the only `LocalState` of a session, so the
// renderer can only ever see it through a shared reference.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::time::Timestamp;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Wire form of an entity id. The server emits integers for words and may
/// emit either integers or strings for candidates; the original form is kept
/// so outbound requests echo it unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Int(i64),
    Text(String),
}

impl fmt::Display for RawId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawId::Int(n) => write!(f, "{n}"),
            RawId::Text(s) => f.write_str(s),
        }
    }
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub RawId);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<i64> for $name {
            fn from(n: i64) -> Self {
                $name(RawId::Int(n))
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(RawId::Text(s.to_string()))
            }
        }
    };
}

entity_id!(
    /// Identifies one word of the story.
    WordId
);
entity_id!(
    /// Identifies one candidate phrase.
    CandidateId
);

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// One accepted word of the story.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    pub id: WordId,
    pub text: String,
    pub flag_count: u32,
}

/// A phrase proposed as the story's next words, open for voting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: CandidateId,
    pub phrase: String,
    pub votes: u32,
    pub expires_at: Timestamp,
}

/// The game's current mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GamePhase {
    InPlay {
        game_end_at: Timestamp,
        server_time: Timestamp,
    },
    Cooldown {
        next_game_start_at: Timestamp,
        server_time: Timestamp,
    },
    #[default]
    Unknown,
}

impl GamePhase {
    /// The instant the phase is expected to end, if known.
    pub fn deadline(&self) -> Option<Timestamp> {
        match self {
            GamePhase::InPlay { game_end_at, .. } => Some(*game_end_at),
            GamePhase::Cooldown {
                next_game_start_at, ..
            } => Some(*next_game_start_at),
            GamePhase::Unknown => None,
        }
    }

    pub fn is_in_play(&self) -> bool {
        matches!(self, GamePhase::InPlay { .. })
    }
}

// ---------------------------------------------------------------------------
// CandidateSet
// ---------------------------------------------------------------------------

/// What a vote update did to the candidate set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    /// Votes and expiration were replaced in place.
    Updated,
    /// The id was unknown; a record was created from the partial payload.
    Created,
    /// The update carried fewer votes than already recorded. The count was
    /// kept; only the expiration was taken from the update.
    Stale,
    /// The vote crossed the win threshold; the candidate (if it was known)
    /// has been removed.
    Won(Option<Candidate>),
}

/// Candidates keyed by id, kept in arrival order. At most one entry per id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateSet {
    entries: Vec<Candidate>,
}

impl CandidateSet {
    pub fn from_candidates(candidates: Vec<Candidate>) -> Self {
        let mut set = CandidateSet::default();
        for candidate in candidates {
            set.upsert(candidate);
        }
        set
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
        self.entries.iter()
    }

    pub fn get(&self, id: &CandidateId) -> Option<&Candidate> {
        self.entries.iter().find(|c| &c.id == id)
    }

    fn get_mut(&mut self, id: &CandidateId) -> Option<&mut Candidate> {
        self.entries.iter_mut().find(|c| &c.id == id)
    }

    /// Insert or replace by id. Returns `true` when the id was new.
    ///
    /// A replacement never lowers the recorded vote count.
    pub fn upsert(&mut self, candidate: Candidate) -> bool {
        match self.get_mut(&candidate.id) {
            Some(existing) => {
                let votes = existing.votes.max(candidate.votes);
                *existing = Candidate { votes, ..candidate };
                false
            }
            None => {
                self.entries.push(candidate);
                true
            }
        }
    }

    pub fn remove(&mut self, id: &CandidateId) -> Option<Candidate> {
        let idx = self.entries.iter().position(|c| &c.id == id)?;
        Some(self.entries.remove(idx))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

// ---------------------------------------------------------------------------
// LocalState
// ---------------------------------------------------------------------------

/// Aggregate root for everything the client mirrors from the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalState {
    story: Vec<Word>,
    candidates: CandidateSet,
    phase: GamePhase,
}

impl LocalState {
    pub fn new() -> Self {
        LocalState::default()
    }

    pub fn story(&self) -> &[Word] {
        &self.story
    }

    pub fn candidates(&self) -> &CandidateSet {
        &self.candidates
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    /// Replace the whole state (full resync).
    pub fn replace_snapshot(
        &mut self,
        story: Vec<Word>,
        candidates: Vec<Candidate>,
        phase: GamePhase,
    ) {
        self.story = story;
        self.candidates = CandidateSet::from_candidates(candidates);
        self.phase = phase;
    }

    /// Replace only the story sequence.
    pub fn replace_story(&mut self, story: Vec<Word>) {
        self.story = story;
    }

    /// Insert a candidate, or replace the record with the same id.
    /// Returns `true` when the id was new.
    pub fn append_or_upsert_candidate(&mut self, candidate: Candidate) -> bool {
        self.candidates.upsert(candidate)
    }

    /// Apply a vote event.
    ///
    /// `expires_at == None` means the vote crossed the win threshold: the
    /// candidate is removed instead of updated. An unknown id with an
    /// expiration creates a record with an empty phrase; a later snapshot
    /// supplies the rest.
    pub fn update_candidate_vote(
        &mut self,
        id: &CandidateId,
        votes: u32,
        expires_at: Option<Timestamp>,
    ) -> VoteOutcome {
        let Some(expires_at) = expires_at else {
            return VoteOutcome::Won(self.candidates.remove(id));
        };

        match self.candidates.get_mut(id) {
            Some(existing) if votes < existing.votes => {
                debug!(
                    candidate = %id,
                    stored = existing.votes,
                    incoming = votes,
                    "keeping higher vote count from earlier update"
                );
                existing.expires_at = expires_at;
                VoteOutcome::Stale
            }
            Some(existing) => {
                existing.votes = votes;
                existing.expires_at = expires_at;
                VoteOutcome::Updated
            }
            None => {
                self.candidates.upsert(Candidate {
                    id: id.clone(),
                    phrase: String::new(),
                    votes,
                    expires_at,
                });
                VoteOutcome::Created
            }
        }
    }

    pub fn remove_candidate(&mut self, id: &CandidateId) -> Option<Candidate> {
        self.candidates.remove(id)
    }

    /// Set the flag count of a word. Returns `false` when no word has `id`.
    pub fn set_word_flag_count(&mut self, id: &WordId, count: u32) -> bool {
        match self.story.iter_mut().find(|w| &w.id == id) {
            Some(word) => {
                word.flag_count = count;
                true
            }
            None => false,
        }
    }

    pub fn set_phase(&mut self, phase: GamePhase) {
        self.phase = phase;
    }

    pub fn clear_story_and_candidates(&mut self) {
        self.story.clear();
        self.candidates.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

// ── Constants ──────────────────────────────────────────────────────────

pub const MIN_PARTICIPANTS: usize = 2;
pub const MAX_GROUPS: usize = 4;
pub const PLAYERS_PER_GROUP: usize = 3;
pub const BYE_SCORE: (u32, u32) = (1, 0);
pub const WIN_POINTS: u32 = 2;
pub const LOSS_POINTS: u32 = 1;

// ── Ids ────────────────────────────────────────────────────────────────

pub type TournamentId = u64;
pub type MatchId = u64;
pub type ParticipantId = u32;

pub type TournamentLocks = Arc<Mutex<HashMap<TournamentId, Arc<Mutex<()>>>>>;

// ── Tournament ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    RoundRobin,
    Group,
    SingleElimination,
    DoubleElimination,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TournamentStatus {
    Pending,
    Active,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tournament {
    pub id: TournamentId,
    pub name: String,
    pub format: Format,
    pub status: TournamentStatus,
    pub participants: Vec<ParticipantId>,
    pub champion_id: Option<ParticipantId>,
    pub created_at: DateTime<Utc>,
}

impl Tournament {
    pub fn new(id: TournamentId, name: String, format: Format, participants: Vec<ParticipantId>) -> Self {
        Tournament {
            id,
            name,
            format,
            status: TournamentStatus::Pending,
            participants,
            champion_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == TournamentStatus::Completed
    }
}

// ── Match ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BracketTag {
    #[default]
    None,
    Winners,
    Losers,
    Final,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Pending,
    Scheduled,
    Completed,
}

/// Points scored by each side within a single set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SetScore {
    pub player1: u32,
    pub player2: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: MatchId,
    pub tournament_id: TournamentId,
    pub round: u32,
    pub match_number: u32,
    #[serde(default)]
    pub bracket: BracketTag,
    #[serde(default)]
    pub group: Option<u32>,
    pub player1_id: Option<ParticipantId>,
    pub player2_id: Option<ParticipantId>,
    pub score1: Option<u32>,
    pub score2: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sets: Option<Vec<SetScore>>,
    pub winner_id: Option<ParticipantId>,
    pub status: MatchStatus,
    pub next_match_id: Option<MatchId>,
    pub loser_next_match_id: Option<MatchId>,
    #[serde(default)]
    pub true_final: bool,
}

impl Match {
    pub fn slots(&self) -> [Option<ParticipantId>; 2] {
        [self.player1_id, self.player2_id]
    }

    pub fn participant_count(&self) -> usize {
        self.slots().iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_completed(&self) -> bool {
        self.status == MatchStatus::Completed
    }

    /// Completed with a single real participant.
    pub fn is_bye(&self) -> bool {
        self.is_completed() && self.participant_count() == 1
    }

    /// Completed without any participant ever arriving.
    pub fn is_void(&self) -> bool {
        self.is_completed() && self.participant_count() == 0
    }

    /// Completed between two real participants.
    pub fn is_contested(&self) -> bool {
        self.is_completed() && self.participant_count() == 2 && self.winner_id.is_some()
    }

    pub fn loser_id(&self) -> Option<ParticipantId> {
        let winner = self.winner_id?;
        let [a, b] = self.slots();
        match (a, b) {
            (Some(a), Some(b)) if a == winner => Some(b),
            (Some(a), Some(b)) if b == winner => Some(a),
            _ => None,
        }
    }

    pub fn has_outgoing_edge(&self) -> bool {
        self.next_match_id.is_some() || self.loser_next_match_id.is_some()
    }
}

// ── Results ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub score1: u32,
    pub score2: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sets: Option<Vec<SetScore>>,
}

impl MatchResult {
    pub fn new(score1: u32, score2: u32) -> Self {
        MatchResult { score1, score2, sets: None }
    }

    pub fn with_sets(score1: u32, score2: u32, sets: Vec<SetScore>) -> Self {
        MatchResult { score1, score2, sets: Some(sets) }
    }
}

// ── Views ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TournamentView {
    pub tournament: Tournament,
    pub matches: Vec<Match>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResultView {
    pub tournament: Tournament,
    pub recorded: Match,
    pub updated: Vec<Match>,
    pub created: Vec<Match>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateTournamentRequest {
    #[serde(default)]
    pub name: String,
    pub format: Format,
    pub participants: Vec<ParticipantId>,
}

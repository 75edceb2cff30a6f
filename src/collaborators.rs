use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard},
};
use tracing::info;

use crate::error::{Collaborator, EngineError, EngineResult};
use crate::rating::{self, Outcome, DEFAULT_RATING, K_FACTOR};
use crate::types::*;

fn lock<'a, T>(mutex: &'a Mutex<T>, collaborator: Collaborator) -> EngineResult<MutexGuard<'a, T>> {
    mutex
        .lock()
        .map_err(|_| EngineError::collaborator(collaborator, "state lock poisoned"))
}

// ── Rating ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RatingEntry {
    pub participant_id: ParticipantId,
    pub rating: f64,
    pub games_played: u32,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RatingUpdate {
    pub winner: RatingEntry,
    pub loser: RatingEntry,
}

pub trait RatingService: Send + Sync {
    fn record_match_outcome(
        &self,
        winner: ParticipantId,
        loser: ParticipantId,
        at: DateTime<Utc>,
    ) -> EngineResult<RatingUpdate>;

    fn ratings(&self) -> EngineResult<Vec<RatingEntry>>;
}

/// In-process ELO table. Unknown participants start at the default rating.
pub struct EloLedger {
    k_factor: f64,
    default_rating: f64,
    entries: Mutex<BTreeMap<ParticipantId, RatingEntry>>,
}

impl EloLedger {
    pub fn new(k_factor: f64, default_rating: f64) -> Self {
        EloLedger {
            k_factor,
            default_rating,
            entries: Mutex::new(BTreeMap::new()),
        }
    }
}

impl Default for EloLedger {
    fn default() -> Self {
        EloLedger::new(K_FACTOR, DEFAULT_RATING)
    }
}

impl RatingService for EloLedger {
    fn record_match_outcome(
        &self,
        winner: ParticipantId,
        loser: ParticipantId,
        at: DateTime<Utc>,
    ) -> EngineResult<RatingUpdate> {
        if winner == loser {
            return Err(EngineError::collaborator(
                Collaborator::Rating,
                format!("participant {winner} cannot be rated against itself"),
            ));
        }
        let mut entries = lock(&self.entries, Collaborator::Rating)?;
        let current = |id: ParticipantId, entries: &BTreeMap<ParticipantId, RatingEntry>| {
            entries.get(&id).map(|e| e.rating).unwrap_or(self.default_rating)
        };
        let (winner_rating, loser_rating) = rating::rate(
            current(winner, &entries),
            current(loser, &entries),
            Outcome::AWins,
            self.k_factor,
        );

        let mut apply = |id: ParticipantId, value: f64| -> RatingEntry {
            let entry = entries.entry(id).or_insert_with(|| RatingEntry {
                participant_id: id,
                rating: value,
                games_played: 0,
                updated_at: None,
            });
            entry.rating = value;
            entry.games_played += 1;
            entry.updated_at = Some(at);
            entry.clone()
        };
        let update = RatingUpdate {
            winner: apply(winner, winner_rating),
            loser: apply(loser, loser_rating),
        };
        Ok(update)
    }

    fn ratings(&self) -> EngineResult<Vec<RatingEntry>> {
        let entries = lock(&self.entries, Collaborator::Rating)?;
        let mut rows: Vec<RatingEntry> = entries.values().cloned().collect();
        rows.sort_by(|a, b| b.rating.total_cmp(&a.rating));
        Ok(rows)
    }
}

// ── History ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    pub id: u64,
    pub tournament_id: TournamentId,
    pub player1_id: ParticipantId,
    pub player2_id: ParticipantId,
    pub score1: u32,
    pub score2: u32,
    pub sets: Option<Vec<SetScore>>,
    pub logged_at: DateTime<Utc>,
}

pub trait HistoryLedger: Send + Sync {
    fn log_match(
        &self,
        player1: ParticipantId,
        player2: ParticipantId,
        score1: u32,
        score2: u32,
        sets: Option<&[SetScore]>,
        tournament: TournamentId,
    ) -> EngineResult<u64>;
}

#[derive(Default)]
pub struct InMemoryHistory {
    records: Mutex<Vec<MatchRecord>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        InMemoryHistory::default()
    }

    pub fn records(&self) -> EngineResult<Vec<MatchRecord>> {
        Ok(lock(&self.records, Collaborator::History)?.clone())
    }
}

impl HistoryLedger for InMemoryHistory {
    fn log_match(
        &self,
        player1: ParticipantId,
        player2: ParticipantId,
        score1: u32,
        score2: u32,
        sets: Option<&[SetScore]>,
        tournament: TournamentId,
    ) -> EngineResult<u64> {
        let mut records = lock(&self.records, Collaborator::History)?;
        let id = records.len() as u64 + 1;
        records.push(MatchRecord {
            id,
            tournament_id: tournament,
            player1_id: player1,
            player2_id: player2,
            score1,
            score2,
            sets: sets.map(<[SetScore]>::to_vec),
            logged_at: Utc::now(),
        });
        Ok(id)
    }
}

// ── Notification ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ChampionDeclared,
    Qualified,
    TrueFinalCreated,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::ChampionDeclared => "champion_declared",
            EventKind::Qualified => "qualified",
            EventKind::TrueFinalCreated => "true_final_created",
        }
    }
}

/// Fire-and-forget event sink.
pub trait Notifier: Send + Sync {
    fn notify(&self, kind: EventKind, payload: Value) -> EngineResult<()>;
}

/// Emits every event as a structured log line.
#[derive(Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, kind: EventKind, payload: Value) -> EngineResult<()> {
        info!(event = kind.as_str(), %payload, "notification");
        Ok(())
    }
}

use crate::collaborators::*;
use crate::error::{EngineError, EngineResult};
use crate::generator::{validate_participants, Seeding};
use crate::progression::{Bracket, ChangeSet, PhaseEvent, Progress};
use crate::repository::Repository;
use crate::standings::GroupStanding;
use crate::types::*;
use chrono::Utc;
use rand::{rngs::StdRng, SeedableRng};
use serde_json::json;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tracing::{error, info, warn};

/// Entry point for every tournament operation. Mutations on one tournament
/// are serialized; different tournaments proceed independently.
pub struct TournamentService {
    repo: Arc<dyn Repository>,
    ratings: Arc<dyn RatingService>,
    history: Arc<dyn HistoryLedger>,
    notifier: Arc<dyn Notifier>,
    locks: TournamentLocks,
    seeding: Seeding,
    rng: Mutex<StdRng>,
}

impl TournamentService {
    pub fn new(
        repo: Arc<dyn Repository>,
        ratings: Arc<dyn RatingService>,
        history: Arc<dyn HistoryLedger>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        TournamentService {
            repo,
            ratings,
            history,
            notifier,
            locks: Arc::new(Mutex::new(HashMap::new())),
            seeding: Seeding::Shuffled,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn with_seeding(mut self, seeding: Seeding) -> Self {
        self.seeding = seeding;
        self
    }

    /// Fixes the shuffle so brackets are reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    // ── Helpers ─────────────────────────────────────────────────────────

    /// Holds the tournament's lock for the duration of `f`. The table entry
    /// is dropped again once no caller holds or waits on it.
    fn with_tournament_lock<F, R>(&self, id: TournamentId, f: F) -> EngineResult<R>
    where
        F: FnOnce() -> EngineResult<R>,
    {
        let lock = {
            let mut table = self
                .locks
                .lock()
                .map_err(|_| EngineError::inconsistent("tournament lock table poisoned"))?;
            table.entry(id).or_default().clone()
        };
        let result = match lock.lock() {
            Ok(_guard) => f(),
            Err(_) => Err(EngineError::inconsistent(format!("lock for tournament {id} poisoned"))),
        };
        drop(lock);
        self.release_lock(id);
        result
    }

    fn release_lock(&self, id: TournamentId) {
        let Ok(mut table) = self.locks.lock() else {
            return;
        };
        if table.get(&id).is_some_and(|entry| Arc::strong_count(entry) == 1) {
            table.remove(&id);
        }
    }

    fn with_rng<F, R>(&self, f: F) -> EngineResult<R>
    where
        F: FnOnce(&mut StdRng) -> EngineResult<R>,
    {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| EngineError::inconsistent("shuffle state poisoned"))?;
        f(&mut rng)
    }

    fn require_tournament(&self, id: TournamentId) -> EngineResult<Tournament> {
        self.repo
            .fetch_tournament(id)?
            .ok_or_else(|| EngineError::validation(format!("tournament {id} does not exist")))
    }

    fn load_bracket(&self, id: TournamentId) -> EngineResult<Bracket> {
        let tournament = self.require_tournament(id)?;
        let matches = self.repo.fetch_matches(id)?;
        Bracket::load(tournament, matches)
    }

    fn commit(&self, bracket: &mut Bracket) -> EngineResult<ChangeSet> {
        let changes = bracket.take_changes();
        if let Err(e) = self.repo.commit(&changes) {
            error!(tournament_id = changes.tournament.id, "commit failed: {e}");
            return Err(e);
        }
        Ok(changes)
    }

    // ── Operations ──────────────────────────────────────────────────────

    pub fn create_tournament(&self, request: CreateTournamentRequest) -> EngineResult<Tournament> {
        validate_participants(&request.participants)?;
        let name = if request.name.trim().is_empty() {
            "Tournament".to_string()
        } else {
            request.name.trim().to_string()
        };
        let tournament = self.repo.create_tournament(&name, request.format, &request.participants)?;
        info!(
            tournament_id = tournament.id,
            format = ?tournament.format,
            participants = tournament.participants.len(),
            "created tournament"
        );
        Ok(tournament)
    }

    pub fn tournament(&self, id: TournamentId) -> EngineResult<TournamentView> {
        let tournament = self.require_tournament(id)?;
        let matches = self.repo.fetch_matches(id)?;
        Ok(TournamentView { tournament, matches })
    }

    pub fn list_tournaments(&self) -> EngineResult<Vec<Tournament>> {
        self.repo.list_tournaments()
    }

    /// Generates and stores the whole first match batch, or nothing.
    pub fn generate_bracket(&self, id: TournamentId) -> EngineResult<TournamentView> {
        self.with_tournament_lock(id, || {
            let mut tournament = self.require_tournament(id)?;
            if !self.repo.fetch_matches(id)?.is_empty() {
                return Err(EngineError::validation(format!("tournament {id} already has a bracket")));
            }
            tournament.participants = self.repo.fetch_participants(id)?;
            let mut bracket = self.with_rng(|rng| Bracket::generate(tournament, self.seeding, rng))?;
            self.commit(&mut bracket)?;
            Ok(bracket.view())
        })
    }

    /// Records one result and everything it sets in motion, committed once.
    /// Rating, history and notification run after the commit and never undo it.
    pub fn record_result(
        &self,
        id: TournamentId,
        match_id: MatchId,
        result: MatchResult,
    ) -> EngineResult<ResultView> {
        let (progress, changes) = self.with_tournament_lock(id, || {
            let mut bracket = self.load_bracket(id)?;
            let progress = bracket.record_result(match_id, &result)?;
            if let Some(PhaseEvent::GroupStageComplete { qualifiers, .. }) = &progress.event {
                self.with_rng(|rng| bracket.start_knockout(qualifiers, self.seeding, rng))?;
            }
            let changes = self.commit(&mut bracket)?;
            Ok((progress, changes))
        })?;

        let recorded = changes
            .updated
            .iter()
            .find(|m| m.id == match_id)
            .cloned()
            .ok_or_else(|| EngineError::inconsistent(format!("match {match_id} missing from its own change set")))?;
        self.after_commit(&changes.tournament, &recorded, &progress);

        Ok(ResultView {
            tournament: changes.tournament,
            recorded,
            updated: changes.updated,
            created: changes.inserted,
        })
    }

    fn after_commit(&self, tournament: &Tournament, recorded: &Match, progress: &Progress) {
        if let Err(e) = self
            .ratings
            .record_match_outcome(progress.winner, progress.loser, Utc::now())
        {
            warn!(tournament_id = tournament.id, match_id = recorded.id, "rating update failed: {e}");
        }

        if let (Some(p1), Some(p2), Some(s1), Some(s2)) =
            (recorded.player1_id, recorded.player2_id, recorded.score1, recorded.score2)
        {
            if let Err(e) = self
                .history
                .log_match(p1, p2, s1, s2, recorded.sets.as_deref(), tournament.id)
            {
                warn!(tournament_id = tournament.id, match_id = recorded.id, "history log failed: {e}");
            }
        }

        for (kind, payload) in notifications(tournament, progress) {
            if let Err(e) = self.notifier.notify(kind, payload) {
                warn!(tournament_id = tournament.id, event = kind.as_str(), "notification failed: {e}");
            }
        }
    }

    pub fn standings(&self, id: TournamentId) -> EngineResult<Vec<GroupStanding>> {
        self.load_bracket(id)?.standings()
    }

    pub fn ratings(&self) -> EngineResult<Vec<RatingEntry>> {
        self.ratings.ratings()
    }
}

fn notifications(tournament: &Tournament, progress: &Progress) -> Vec<(EventKind, serde_json::Value)> {
    match &progress.event {
        Some(PhaseEvent::Champion(champion)) => vec![(
            EventKind::ChampionDeclared,
            json!({
                "tournamentId": tournament.id,
                "tournamentName": tournament.name,
                "championId": champion,
            }),
        )],
        Some(PhaseEvent::TrueFinalCreated(match_id)) => vec![(
            EventKind::TrueFinalCreated,
            json!({
                "tournamentId": tournament.id,
                "matchId": match_id,
                "incumbentId": progress.loser,
                "challengerId": progress.winner,
            }),
        )],
        Some(PhaseEvent::GroupStageComplete { standings, qualifiers }) => qualifiers
            .iter()
            .map(|participant| {
                let group = standings
                    .iter()
                    .find(|g| g.rows.iter().any(|row| row.participant_id == *participant))
                    .and_then(|g| g.group);
                (
                    EventKind::Qualified,
                    json!({
                        "tournamentId": tournament.id,
                        "participantId": participant,
                        "group": group,
                    }),
                )
            })
            .collect(),
        None => Vec::new(),
    }
}

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{EngineError, EngineResult};
use crate::progression::ChangeSet;
use crate::types::*;

pub const STORE_FILE: &str = "tournaments.json";

/// Tournament-keyed storage. Every mutating call is all-or-nothing.
pub trait Repository: Send + Sync {
  fn create_tournament(&self, name: &str, format: Format, participants: &[ParticipantId]) -> EngineResult<Tournament>;
  fn fetch_tournament(&self, id: TournamentId) -> EngineResult<Option<Tournament>>;
  fn list_tournaments(&self) -> EngineResult<Vec<Tournament>>;
  fn fetch_participants(&self, id: TournamentId) -> EngineResult<Vec<ParticipantId>>;
  fn fetch_matches(&self, id: TournamentId) -> EngineResult<Vec<Match>>;
  fn insert_matches(&self, id: TournamentId, matches: &[Match]) -> EngineResult<()>;
  fn update_match(&self, id: TournamentId, m: &Match) -> EngineResult<()>;
  /// Writes the tournament row, the updated matches and the inserted
  /// matches together.
  fn commit(&self, changes: &ChangeSet) -> EngineResult<()>;
}

// ── Store ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Store {
  next_tournament_id: TournamentId,
  tournaments: BTreeMap<TournamentId, Tournament>,
  matches: BTreeMap<TournamentId, Vec<Match>>,
}

impl Store {
  fn tournament(&self, id: TournamentId) -> EngineResult<&Tournament> {
    self
      .tournaments
      .get(&id)
      .ok_or_else(|| EngineError::persistence(format!("tournament {id} is not stored")))
  }

  fn create_tournament(&mut self, name: &str, format: Format, participants: &[ParticipantId]) -> Tournament {
    self.next_tournament_id = self.next_tournament_id.max(1);
    let id = self.next_tournament_id;
    self.next_tournament_id += 1;
    let tournament = Tournament::new(id, name.to_string(), format, participants.to_vec());
    self.tournaments.insert(id, tournament.clone());
    self.matches.insert(id, Vec::new());
    tournament
  }

  fn insert_matches(&mut self, id: TournamentId, batch: &[Match]) -> EngineResult<()> {
    self.tournament(id)?;
    let rows = self.matches.entry(id).or_default();
    let mut seen: HashSet<MatchId> = rows.iter().map(|m| m.id).collect();
    for m in batch {
      if m.tournament_id != id {
        return Err(EngineError::persistence(format!(
          "match {} belongs to tournament {}, not {id}",
          m.id, m.tournament_id
        )));
      }
      if !seen.insert(m.id) {
        return Err(EngineError::persistence(format!("match {} is already stored", m.id)));
      }
    }
    rows.extend(batch.iter().cloned());
    Ok(())
  }

  fn update_match(&mut self, id: TournamentId, m: &Match) -> EngineResult<()> {
    let slot = self
      .matches
      .get_mut(&id)
      .and_then(|rows| rows.iter_mut().find(|row| row.id == m.id))
      .ok_or_else(|| EngineError::persistence(format!("match {} is not stored for tournament {id}", m.id)))?;
    *slot = m.clone();
    Ok(())
  }

  fn commit(&mut self, changes: &ChangeSet) -> EngineResult<()> {
    let id = changes.tournament.id;
    self.tournament(id)?;
    if changes.tournament_changed {
      self.tournaments.insert(id, changes.tournament.clone());
    }
    for m in &changes.updated {
      self.update_match(id, m)?;
    }
    self.insert_matches(id, &changes.inserted)
  }
}

/// Storage that keeps a [`Store`] behind a lock and can persist it.
/// Mutations run on a copy that replaces the live store only once it has
/// been applied and persisted.
pub trait StoreBacked: Send + Sync {
  fn store(&self) -> &Mutex<Store>;

  fn persist(&self, store: &Store) -> EngineResult<()>;

  fn read(&self) -> EngineResult<MutexGuard<'_, Store>> {
    self
      .store()
      .lock()
      .map_err(|_| EngineError::persistence("store lock poisoned"))
  }

  fn mutate<T>(&self, op: impl FnOnce(&mut Store) -> EngineResult<T>) -> EngineResult<T> {
    let mut live = self.read()?;
    let mut draft = live.clone();
    let out = op(&mut draft)?;
    self.persist(&draft)?;
    *live = draft;
    Ok(out)
  }
}

impl<S: StoreBacked> Repository for S {
  fn create_tournament(&self, name: &str, format: Format, participants: &[ParticipantId]) -> EngineResult<Tournament> {
    self.mutate(|store| Ok(store.create_tournament(name, format, participants)))
  }

  fn fetch_tournament(&self, id: TournamentId) -> EngineResult<Option<Tournament>> {
    Ok(self.read()?.tournaments.get(&id).cloned())
  }

  fn list_tournaments(&self) -> EngineResult<Vec<Tournament>> {
    Ok(self.read()?.tournaments.values().cloned().collect())
  }

  fn fetch_participants(&self, id: TournamentId) -> EngineResult<Vec<ParticipantId>> {
    Ok(self.read()?.tournament(id)?.participants.clone())
  }

  fn fetch_matches(&self, id: TournamentId) -> EngineResult<Vec<Match>> {
    Ok(self.read()?.matches.get(&id).cloned().unwrap_or_default())
  }

  fn insert_matches(&self, id: TournamentId, matches: &[Match]) -> EngineResult<()> {
    self.mutate(|store| store.insert_matches(id, matches))
  }

  fn update_match(&self, id: TournamentId, m: &Match) -> EngineResult<()> {
    self.mutate(|store| store.update_match(id, m))
  }

  fn commit(&self, changes: &ChangeSet) -> EngineResult<()> {
    self.mutate(|store| store.commit(changes))?;
    debug!(
      tournament_id = changes.tournament.id,
      updated = changes.updated.len(),
      inserted = changes.inserted.len(),
      "committed changes"
    );
    Ok(())
  }
}

// ── Backends ───────────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryRepository {
  store: Mutex<Store>,
}

impl InMemoryRepository {
  pub fn new() -> Self {
    InMemoryRepository::default()
  }
}

impl StoreBacked for InMemoryRepository {
  fn store(&self) -> &Mutex<Store> {
    &self.store
  }

  fn persist(&self, _store: &Store) -> EngineResult<()> {
    Ok(())
  }
}

/// Whole-store JSON snapshot, rewritten through a temp file on every change.
pub struct JsonFileRepository {
  path: PathBuf,
  store: Mutex<Store>,
}

impl JsonFileRepository {
  pub fn open(dir: &Path) -> EngineResult<Self> {
    fs::create_dir_all(dir).map_err(|e| EngineError::persistence(format!("create data dir {}: {e}", dir.display())))?;
    let path = dir.join(STORE_FILE);
    let store = if path.is_file() {
      let raw = fs::read_to_string(&path)
        .map_err(|e| EngineError::persistence(format!("read store {}: {e}", path.display())))?;
      serde_json::from_str(&raw)
        .map_err(|e| EngineError::persistence(format!("parse store {}: {e}", path.display())))?
    } else {
      Store::default()
    };
    Ok(JsonFileRepository {
      path,
      store: Mutex::new(store),
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl StoreBacked for JsonFileRepository {
  fn store(&self) -> &Mutex<Store> {
    &self.store
  }

  fn persist(&self, store: &Store) -> EngineResult<()> {
    let body = serde_json::to_string_pretty(store)
      .map_err(|e| EngineError::persistence(format!("serialize store: {e}")))?;
    let tmp = self.path.with_extension("json.tmp");
    fs::write(&tmp, body)
      .and_then(|_| fs::rename(&tmp, &self.path))
      .map_err(|e| {
        error!("write store {}: {e}", self.path.display());
        EngineError::persistence(format!("write store {}: {e}", self.path.display()))
      })
  }
}

use std::cmp::Ordering;
use std::collections::BTreeSet;

use rand::Rng;
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};
use crate::generator::{self, GenerateOptions, Seeding};
use crate::graph::MatchGraph;
use crate::standings::{self, GroupStanding};
use crate::types::*;

/// What a recorded result finished, if anything.
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseEvent {
  Champion(ParticipantId),
  TrueFinalCreated(MatchId),
  GroupStageComplete {
    standings: Vec<GroupStanding>,
    qualifiers: Vec<ParticipantId>,
  },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
  pub recorded: MatchId,
  pub winner: ParticipantId,
  pub loser: ParticipantId,
  pub event: Option<PhaseEvent>,
}

/// Everything one operation changed, written back in a single commit.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSet {
  pub tournament: Tournament,
  pub tournament_changed: bool,
  pub updated: Vec<Match>,
  pub inserted: Vec<Match>,
}

impl ChangeSet {
  pub fn is_empty(&self) -> bool {
    !self.tournament_changed && self.updated.is_empty() && self.inserted.is_empty()
  }
}

/// One tournament's match set, loaded once per operation and mutated in
/// memory. Changes are tracked until [`Bracket::take_changes`].
#[derive(Debug, Clone)]
pub struct Bracket {
  tournament: Tournament,
  graph: MatchGraph,
  updated: BTreeSet<MatchId>,
  created: BTreeSet<MatchId>,
  tournament_changed: bool,
}

impl Bracket {
  pub fn load(tournament: Tournament, matches: Vec<Match>) -> EngineResult<Self> {
    if let Some(stray) = matches.iter().find(|m| m.tournament_id != tournament.id) {
      return Err(EngineError::inconsistent(format!(
        "match {} belongs to tournament {}, not {}",
        stray.id, stray.tournament_id, tournament.id
      )));
    }
    Ok(Bracket {
      tournament,
      graph: MatchGraph::from_matches(matches)?,
      updated: BTreeSet::new(),
      created: BTreeSet::new(),
      tournament_changed: false,
    })
  }

  /// Builds the first match batch of a pending tournament.
  pub fn generate<R: Rng + ?Sized>(mut tournament: Tournament, seeding: Seeding, rng: &mut R) -> EngineResult<Self> {
    if tournament.status != TournamentStatus::Pending {
      return Err(EngineError::validation(format!(
        "tournament {} already has a bracket",
        tournament.id
      )));
    }
    let options = GenerateOptions {
      seeding,
      ..GenerateOptions::default()
    };
    let matches = generator::generate(tournament.id, tournament.format, &tournament.participants, options, rng)?;
    let created = matches.iter().map(|m| m.id).collect();
    tournament.status = TournamentStatus::Active;
    Ok(Bracket {
      tournament,
      graph: MatchGraph::from_matches(matches)?,
      updated: BTreeSet::new(),
      created,
      tournament_changed: true,
    })
  }

  pub fn tournament(&self) -> &Tournament {
    &self.tournament
  }

  pub fn matches(&self) -> &[Match] {
    self.graph.matches()
  }

  pub fn get(&self, id: MatchId) -> Option<&Match> {
    self.graph.get(id)
  }

  pub fn view(&self) -> TournamentView {
    TournamentView {
      tournament: self.tournament.clone(),
      matches: self.graph.matches().to_vec(),
    }
  }

  /// Applies a result, pushes participants downstream and reports any phase
  /// it completes. Every check runs before the first mutation.
  pub fn record_result(&mut self, match_id: MatchId, result: &MatchResult) -> EngineResult<Progress> {
    if self.tournament.is_completed() {
      return Err(EngineError::invalid_result(format!(
        "tournament {} is already completed",
        self.tournament.id
      )));
    }
    let m = self
      .graph
      .get(match_id)
      .ok_or_else(|| EngineError::invalid_result(format!("match {match_id} does not exist")))?;
    if m.is_completed() {
      return Err(EngineError::invalid_result(format!("match {match_id} is already completed")));
    }
    let (Some(player1), Some(player2)) = (m.player1_id, m.player2_id) else {
      return Err(EngineError::invalid_result(format!(
        "match {match_id} is not scheduled, both slots must be filled"
      )));
    };
    let player1_wins = decide_winner(result)?;
    let (winner, loser) = if player1_wins { (player1, player2) } else { (player2, player1) };

    let m = self
      .graph
      .get_mut(match_id)
      .ok_or_else(|| EngineError::inconsistent(format!("match {match_id} vanished")))?;
    m.score1 = Some(result.score1);
    m.score2 = Some(result.score2);
    m.sets = result.sets.clone();
    m.winner_id = Some(winner);
    m.status = MatchStatus::Completed;
    let recorded = m.clone();
    self.updated.insert(match_id);
    debug!(
      tournament_id = self.tournament.id,
      match_id,
      winner,
      loser,
      score1 = result.score1,
      score2 = result.score2,
      "recorded result"
    );

    let touched = self.graph.propagate(match_id)?;
    self.updated.extend(touched);

    let event = self.detect_phase_end(&recorded)?;
    Ok(Progress {
      recorded: match_id,
      winner,
      loser,
      event,
    })
  }

  fn detect_phase_end(&mut self, recorded: &Match) -> EngineResult<Option<PhaseEvent>> {
    match self.tournament.format {
      Format::RoundRobin => {
        if !self.graph.matches().iter().all(Match::is_completed) {
          return Ok(None);
        }
        let rows = standings::standings(&self.tournament.participants, self.graph.matches());
        match rows.first() {
          Some(top) => Ok(Some(self.declare_champion(top.participant_id))),
          None => Err(EngineError::inconsistent("round-robin finished without standings")),
        }
      }
      Format::Group if recorded.group.is_some() => {
        let stage_done = self
          .graph
          .matches()
          .iter()
          .filter(|m| m.group.is_some())
          .all(Match::is_completed);
        if !stage_done {
          return Ok(None);
        }
        let groups = standings::group_standings(&self.tournament.participants, self.graph.matches());
        let qualifiers = standings::qualifiers(&groups);
        info!(
          tournament_id = self.tournament.id,
          ?qualifiers,
          "group stage complete"
        );
        Ok(Some(PhaseEvent::GroupStageComplete {
          standings: groups,
          qualifiers,
        }))
      }
      Format::Group | Format::SingleElimination => match (recorded.has_outgoing_edge(), recorded.winner_id) {
        (false, Some(winner)) => Ok(Some(self.declare_champion(winner))),
        _ => Ok(None),
      },
      Format::DoubleElimination if recorded.bracket == BracketTag::Final => self.resolve_final(recorded).map(Some),
      Format::DoubleElimination => Ok(None),
    }
  }

  /// Grand Final outcome: the winners-bracket incumbent takes the title, the
  /// challenger forces a True Final. The True Final always decides it.
  fn resolve_final(&mut self, grand_final: &Match) -> EngineResult<PhaseEvent> {
    let winner = grand_final
      .winner_id
      .ok_or_else(|| EngineError::inconsistent(format!("final {} completed without a winner", grand_final.id)))?;
    if grand_final.true_final {
      return Ok(self.declare_champion(winner));
    }

    let incumbent = self
      .graph
      .feeders_of(grand_final.id)
      .into_iter()
      .find(|feeder| feeder.bracket == BracketTag::Winners && feeder.next_match_id == Some(grand_final.id))
      .and_then(|feeder| feeder.winner_id)
      .ok_or_else(|| EngineError::inconsistent(format!("final {} has no winners-bracket feeder", grand_final.id)))?;
    if winner == incumbent {
      return Ok(self.declare_champion(winner));
    }

    if self.graph.matches().iter().any(|m| m.true_final) {
      return Err(EngineError::inconsistent(format!(
        "tournament {} already has a true final",
        self.tournament.id
      )));
    }
    let id = self.graph.next_match_id();
    let true_final = Match {
      id,
      tournament_id: self.tournament.id,
      round: grand_final.round + 1,
      match_number: self.graph.next_match_number(),
      bracket: BracketTag::Final,
      group: None,
      player1_id: Some(incumbent),
      player2_id: Some(winner),
      score1: None,
      score2: None,
      sets: None,
      winner_id: None,
      status: MatchStatus::Scheduled,
      next_match_id: None,
      loser_next_match_id: None,
      true_final: true,
    };
    self.graph.insert(true_final)?;
    self.created.insert(id);
    info!(
      tournament_id = self.tournament.id,
      match_id = id,
      incumbent,
      challenger = winner,
      "created true final"
    );
    Ok(PhaseEvent::TrueFinalCreated(id))
  }

  fn declare_champion(&mut self, champion: ParticipantId) -> PhaseEvent {
    self.tournament.champion_id = Some(champion);
    self.tournament.status = TournamentStatus::Completed;
    self.tournament_changed = true;
    info!(tournament_id = self.tournament.id, champion, "champion declared");
    PhaseEvent::Champion(champion)
  }

  /// Appends the knockout phase of a group tournament, seeded with the
  /// qualifiers and numbered after the group stage.
  pub fn start_knockout<R: Rng + ?Sized>(
    &mut self,
    qualifiers: &[ParticipantId],
    seeding: Seeding,
    rng: &mut R,
  ) -> EngineResult<Vec<MatchId>> {
    if self.tournament.format != Format::Group {
      return Err(EngineError::validation(format!(
        "tournament {} has no group stage",
        self.tournament.id
      )));
    }
    if self.graph.matches().iter().any(|m| m.group.is_none()) {
      return Err(EngineError::validation(format!(
        "tournament {} already has a knockout phase",
        self.tournament.id
      )));
    }
    let options = GenerateOptions {
      starting_round: self.graph.max_round() + 1,
      first_match_id: self.graph.next_match_id(),
      first_match_number: self.graph.next_match_number(),
      seeding,
    };
    let knockout = generator::generate(self.tournament.id, Format::SingleElimination, qualifiers, options, rng)?;
    let ids: Vec<MatchId> = knockout.iter().map(|m| m.id).collect();
    for m in knockout {
      self.graph.insert(m)?;
    }
    self.graph.validate()?;
    self.created.extend(ids.iter().copied());
    info!(
      tournament_id = self.tournament.id,
      qualifiers = qualifiers.len(),
      matches = ids.len(),
      "generated knockout phase"
    );
    Ok(ids)
  }

  /// Current standings: one table for round-robin, one per group otherwise.
  pub fn standings(&self) -> EngineResult<Vec<GroupStanding>> {
    match self.tournament.format {
      Format::RoundRobin => Ok(vec![GroupStanding {
        group: None,
        rows: standings::standings(&self.tournament.participants, self.graph.matches()),
      }]),
      Format::Group => Ok(standings::group_standings(
        &self.tournament.participants,
        self.graph.matches(),
      )),
      Format::SingleElimination | Format::DoubleElimination => Err(EngineError::validation(format!(
        "tournament {} is an elimination bracket and keeps no standings",
        self.tournament.id
      ))),
    }
  }

  /// Drains the tracked changes. Matches created in this operation are
  /// reported as inserts only.
  pub fn take_changes(&mut self) -> ChangeSet {
    let updated = std::mem::take(&mut self.updated);
    let created = std::mem::take(&mut self.created);
    let rows_for = |ids: &BTreeSet<MatchId>| -> Vec<Match> {
      ids.iter().filter_map(|id| self.graph.get(*id)).cloned().collect()
    };
    let changes = ChangeSet {
      tournament: self.tournament.clone(),
      tournament_changed: self.tournament_changed,
      updated: rows_for(&updated.difference(&created).copied().collect()),
      inserted: rows_for(&created),
    };
    self.tournament_changed = false;
    changes
  }
}

/// True when player1 wins. Set detail, when given, decides by strict set
/// majority; the score pair must never be level.
pub fn decide_winner(result: &MatchResult) -> EngineResult<bool> {
  if result.score1 == result.score2 {
    return Err(EngineError::invalid_result(format!(
      "draws are not allowed ({}-{})",
      result.score1, result.score2
    )));
  }
  let Some(sets) = &result.sets else {
    return Ok(result.score1 > result.score2);
  };
  if sets.is_empty() {
    return Err(EngineError::invalid_result("set detail is empty"));
  }
  let mut won = (0u32, 0u32);
  for (i, set) in sets.iter().enumerate() {
    match set.player1.cmp(&set.player2) {
      Ordering::Greater => won.0 += 1,
      Ordering::Less => won.1 += 1,
      Ordering::Equal => {
        return Err(EngineError::invalid_result(format!(
          "set {} is level at {}-{}",
          i + 1,
          set.player1,
          set.player2
        )))
      }
    }
  }
  if won.0 == won.1 {
    return Err(EngineError::invalid_result(format!(
      "sets are split {}-{}, no majority",
      won.0, won.1
    )));
  }
  Ok(won.0 > won.1)
}

#[cfg(test)]
mod tests {
  use super::*;
  use rand::rngs::StdRng;
  use rand::SeedableRng;

  fn bracket(format: Format, participants: &[ParticipantId]) -> Bracket {
    let tournament = Tournament::new(1, "cup".to_string(), format, participants.to_vec());
    Bracket::generate(tournament, Seeding::AsListed, &mut StdRng::seed_from_u64(1)).unwrap()
  }

  fn win(score1: u32, score2: u32) -> MatchResult {
    MatchResult::new(score1, score2)
  }

  fn set(player1: u32, player2: u32) -> SetScore {
    SetScore { player1, player2 }
  }

  #[test]
  fn test_four_player_knockout_schedules_final() {
    let mut b = bracket(Format::SingleElimination, &[10, 20, 30, 40]);
    assert_eq!(b.tournament().status, TournamentStatus::Active);

    let progress = b.record_result(1, &win(11, 5)).unwrap();
    assert_eq!((progress.winner, progress.loser), (10, 20));
    assert_eq!(progress.event, None);
    assert_eq!(b.get(3).unwrap().status, MatchStatus::Pending);

    b.record_result(2, &win(11, 9)).unwrap();
    let final_match = b.get(3).unwrap();
    assert_eq!(final_match.status, MatchStatus::Scheduled);
    assert_eq!((final_match.player1_id, final_match.player2_id), (Some(10), Some(30)));

    let progress = b.record_result(3, &win(4, 11)).unwrap();
    assert_eq!(progress.event, Some(PhaseEvent::Champion(30)));
    assert_eq!(b.tournament().champion_id, Some(30));
    assert!(b.tournament().is_completed());
  }

  #[test]
  fn test_invalid_results_mutate_nothing() {
    let mut b = bracket(Format::SingleElimination, &[1, 2, 3, 4]);
    b.take_changes();
    let before = b.view();

    let cases = [
      (1, win(3, 3)),
      (3, win(2, 1)),
      (99, win(2, 1)),
      (1, MatchResult::with_sets(2, 1, vec![set(11, 11), set(11, 5)])),
      (1, MatchResult::with_sets(2, 1, vec![set(11, 5), set(5, 11)])),
      (1, MatchResult::with_sets(2, 1, vec![])),
    ];
    for (id, result) in cases {
      let err = b.record_result(id, &result).unwrap_err();
      assert!(matches!(err, EngineError::InvalidResult(_)), "{err}");
    }
    assert_eq!(b.view(), before);
    assert!(b.take_changes().is_empty());

    b.record_result(1, &win(2, 0)).unwrap();
    let err = b.record_result(1, &win(2, 0)).unwrap_err();
    assert_eq!(err, EngineError::invalid_result("match 1 is already completed"));
  }

  #[test]
  fn test_set_majority_overrides_raw_totals() {
    let mut b = bracket(Format::SingleElimination, &[1, 2]);
    let result = MatchResult::with_sets(25, 29, vec![set(11, 9), set(11, 9), set(3, 11)]);
    let progress = b.record_result(1, &result).unwrap();
    assert_eq!(progress.winner, 1);
    assert_eq!(progress.event, Some(PhaseEvent::Champion(1)));
    assert_eq!(b.get(1).unwrap().sets.as_ref().map(Vec::len), Some(3));
  }

  #[test]
  fn test_round_robin_crowns_undefeated_player() {
    let mut b = bracket(Format::RoundRobin, &[1, 2, 3]);
    let ids: Vec<MatchId> = b.matches().iter().map(|m| m.id).collect();
    // as listed: 1v2, 1v3, 2v3; player1 always wins
    let mut last = None;
    for id in ids {
      let progress = b
        .record_result(id, &MatchResult::with_sets(2, 0, vec![set(11, 3), set(11, 4)]))
        .unwrap();
      last = progress.event;
    }
    assert_eq!(last, Some(PhaseEvent::Champion(1)));
    let table = b.standings().unwrap();
    assert_eq!(table[0].rows[0].participant_id, 1);
    assert_eq!(table[0].rows[0].main_points, 4);
  }

  #[test]
  fn test_round_robin_cycle_with_extreme_score_finishes() {
    let mut b = bracket(Format::RoundRobin, &[1, 2, 3]);
    // 1 beats 2, 3 beats 1, 2 beats 3: level on points, split by sets
    b.record_result(1, &win(u32::MAX, 1)).unwrap();
    b.record_result(2, &win(0, 1)).unwrap();
    let progress = b.record_result(3, &win(1, 0)).unwrap();
    assert_eq!(progress.event, Some(PhaseEvent::Champion(1)));

    let table = b.standings().unwrap();
    let order: Vec<ParticipantId> = table[0].rows.iter().map(|row| row.participant_id).collect();
    assert_eq!(order, vec![1, 3, 2]);
  }

  /// Plays every scheduled match until a champion is declared. The
  /// losers-bracket side takes the first Grand Final so a True Final is
  /// always needed.
  fn play_double_elimination(b: &mut Bracket) -> ParticipantId {
    for _ in 0..b.matches().len() + 1 {
      let next = b
        .matches()
        .iter()
        .find(|m| m.status == MatchStatus::Scheduled)
        .map(|m| (m.id, m.bracket == BracketTag::Final && !m.true_final));
      let Some((id, grand_final)) = next else {
        break;
      };
      let result = if grand_final { win(0, 2) } else { win(2, 0) };
      if let Some(PhaseEvent::Champion(champion)) = b.record_result(id, &result).unwrap().event {
        return champion;
      }
    }
    panic!("double elimination stalled without a champion");
  }

  #[test]
  fn test_uneven_double_elimination_plays_to_champion() {
    for n in [3u32, 5, 6, 7, 11] {
      let participants: Vec<ParticipantId> = (1..=n).collect();
      let mut b = bracket(Format::DoubleElimination, &participants);
      let champion = play_double_elimination(&mut b);

      assert!(b.tournament().is_completed(), "n={n}");
      assert_eq!(b.tournament().champion_id, Some(champion));
      assert!(b.matches().iter().all(Match::is_completed), "n={n}");
      assert_eq!(b.matches().iter().filter(|m| m.true_final).count(), 1, "n={n}");
      // every participant but the champion is eliminated twice, the
      // incumbent only in the true final
      let losses = |p: ParticipantId| b.matches().iter().filter(|m| m.loser_id() == Some(p)).count();
      for p in participants.iter().copied().filter(|p| *p != champion) {
        assert_eq!(losses(p), 2, "n={n} participant {p}");
      }
      assert_eq!(losses(champion), 1, "n={n}");
    }

    let mut b = bracket(Format::DoubleElimination, &[1, 2, 3, 4, 5]);
    play_double_elimination(&mut b);
    assert!(b.matches().iter().any(Match::is_void));
    assert!(b.matches().iter().any(|m| m.bracket == BracketTag::Losers && m.is_bye()));
  }

  #[test]
  fn test_incumbent_wins_grand_final() {
    let mut b = bracket(Format::DoubleElimination, &[1, 2, 3]);
    // 1 has a bye; 2 beats 3 and drops 3 into the losers bracket
    b.record_result(2, &win(2, 1)).unwrap();
    assert_eq!(b.get(5).unwrap().player1_id, Some(3));
    b.record_result(3, &win(2, 0)).unwrap();
    b.record_result(5, &win(2, 1)).unwrap();

    let grand_final = b.get(6).unwrap();
    assert_eq!(grand_final.bracket, BracketTag::Final);
    assert_eq!((grand_final.player1_id, grand_final.player2_id), (Some(1), Some(3)));

    let progress = b.record_result(6, &win(3, 0)).unwrap();
    assert_eq!(progress.event, Some(PhaseEvent::Champion(1)));
    assert!(b.matches().iter().all(|m| !m.true_final));
  }

  #[test]
  fn test_challenger_forces_true_final_once() {
    let mut b = bracket(Format::DoubleElimination, &[1, 2, 3]);
    for id in [2, 3, 5] {
      b.record_result(id, &win(2, 1)).unwrap();
    }
    b.take_changes();

    let progress = b.record_result(6, &win(1, 3)).unwrap();
    assert_eq!(progress.event, Some(PhaseEvent::TrueFinalCreated(7)));
    assert!(!b.tournament().is_completed());

    let true_final = b.get(7).unwrap().clone();
    assert!(true_final.true_final);
    assert_eq!(true_final.round, b.get(6).unwrap().round + 1);
    assert_eq!((true_final.player1_id, true_final.player2_id), (Some(1), Some(3)));
    assert_eq!(true_final.status, MatchStatus::Scheduled);

    let changes = b.take_changes();
    assert_eq!(changes.inserted, vec![true_final]);
    assert_eq!(changes.updated.iter().map(|m| m.id).collect::<Vec<_>>(), vec![6]);

    let progress = b.record_result(7, &win(0, 3)).unwrap();
    assert_eq!(progress.event, Some(PhaseEvent::Champion(3)));
    assert_eq!(b.matches().iter().filter(|m| m.true_final).count(), 1);
  }

  #[test]
  fn test_two_player_double_elimination_drops_loser_into_final() {
    let mut b = bracket(Format::DoubleElimination, &[8, 9]);
    b.record_result(1, &win(2, 0)).unwrap();
    let grand_final = b.get(2).unwrap();
    assert_eq!((grand_final.player1_id, grand_final.player2_id), (Some(8), Some(9)));

    let progress = b.record_result(2, &win(0, 2)).unwrap();
    assert_eq!(progress.event, Some(PhaseEvent::TrueFinalCreated(3)));
    assert_eq!(b.get(3).unwrap().player1_id, Some(8));
  }

  #[test]
  fn test_group_stage_hands_qualifiers_to_knockout() {
    let mut b = bracket(Format::Group, &[1, 2, 3, 4]);
    assert_eq!(b.matches().len(), 2);

    assert_eq!(b.record_result(1, &win(2, 0)).unwrap().event, None);
    let progress = b.record_result(2, &win(2, 1)).unwrap();
    let Some(PhaseEvent::GroupStageComplete { standings, qualifiers }) = progress.event else {
      panic!("expected group stage completion");
    };
    assert_eq!(standings.len(), 2);
    assert_eq!(qualifiers, vec![1, 2]);

    let ids = b
      .start_knockout(&qualifiers, Seeding::AsListed, &mut StdRng::seed_from_u64(3))
      .unwrap();
    assert_eq!(ids, vec![3]);
    let knockout = b.get(3).unwrap();
    assert_eq!(knockout.round, 2);
    assert_eq!(knockout.group, None);
    assert_eq!(knockout.status, MatchStatus::Scheduled);

    let err = b
      .start_knockout(&qualifiers, Seeding::AsListed, &mut StdRng::seed_from_u64(3))
      .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let progress = b.record_result(3, &win(1, 2)).unwrap();
    assert_eq!(progress.event, Some(PhaseEvent::Champion(2)));
  }

  #[test]
  fn test_changes_track_generation_then_updates() {
    let mut b = bracket(Format::SingleElimination, &[1, 2, 3, 4]);
    let generated = b.take_changes();
    assert!(generated.tournament_changed);
    assert_eq!(generated.inserted.len(), 3);
    assert!(generated.updated.is_empty());

    b.record_result(1, &win(2, 0)).unwrap();
    let changes = b.take_changes();
    assert!(!changes.tournament_changed);
    assert!(changes.inserted.is_empty());
    assert_eq!(changes.updated.iter().map(|m| m.id).collect::<Vec<_>>(), vec![1, 3]);
  }

  #[test]
  fn test_load_rejects_foreign_matches() {
    let b = bracket(Format::SingleElimination, &[1, 2]);
    let other = Tournament::new(2, "other".to_string(), Format::SingleElimination, vec![1, 2]);
    let err = Bracket::load(other, b.matches().to_vec()).unwrap_err();
    assert!(matches!(err, EngineError::InconsistentBracket(_)));
  }

  #[test]
  fn test_generate_twice_is_rejected() {
    let b = bracket(Format::RoundRobin, &[1, 2]);
    let err = Bracket::generate(b.tournament().clone(), Seeding::AsListed, &mut StdRng::seed_from_u64(1)).unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
  }
}

use std::collections::{HashMap, VecDeque};

use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::types::*;

/// Id-indexed match storage with the reverse feeder index kept alongside.
///
/// Feed edges point forward (`next_match_id`, `loser_next_match_id`); the
/// feeder index answers "who can still send a participant here".
#[derive(Clone, Debug, Default)]
pub struct MatchGraph {
  matches: Vec<Match>,
  index: HashMap<MatchId, usize>,
  feeders: HashMap<MatchId, Vec<MatchId>>,
}

impl MatchGraph {
  pub fn new() -> Self {
    MatchGraph::default()
  }

  pub fn from_matches(matches: Vec<Match>) -> EngineResult<Self> {
    let mut graph = MatchGraph::new();
    for m in matches {
      graph.insert(m)?;
    }
    graph.validate()?;
    Ok(graph)
  }

  pub fn insert(&mut self, m: Match) -> EngineResult<()> {
    if self.index.contains_key(&m.id) {
      return Err(EngineError::inconsistent(format!("match {} appears twice", m.id)));
    }
    for target in [m.next_match_id, m.loser_next_match_id].into_iter().flatten() {
      self.feeders.entry(target).or_default().push(m.id);
    }
    self.index.insert(m.id, self.matches.len());
    self.matches.push(m);
    Ok(())
  }

  pub fn get(&self, id: MatchId) -> Option<&Match> {
    self.index.get(&id).and_then(|idx| self.matches.get(*idx))
  }

  pub fn get_mut(&mut self, id: MatchId) -> Option<&mut Match> {
    let idx = *self.index.get(&id)?;
    self.matches.get_mut(idx)
  }

  fn edge_target_mut(&mut self, id: MatchId) -> EngineResult<&mut Match> {
    self
      .get_mut(id)
      .ok_or_else(|| EngineError::inconsistent(format!("feed edge references missing match {id}")))
  }

  pub fn matches(&self) -> &[Match] {
    &self.matches
  }

  pub fn into_matches(self) -> Vec<Match> {
    self.matches
  }

  pub fn len(&self) -> usize {
    self.matches.len()
  }

  pub fn is_empty(&self) -> bool {
    self.matches.is_empty()
  }

  pub fn feeders_of(&self, id: MatchId) -> Vec<&Match> {
    self
      .feeders
      .get(&id)
      .map(|ids| ids.iter().filter_map(|feeder| self.get(*feeder)).collect())
      .unwrap_or_default()
  }

  pub fn next_match_id(&self) -> MatchId {
    self.matches.iter().map(|m| m.id).max().map_or(1, |id| id + 1)
  }

  pub fn next_match_number(&self) -> u32 {
    self.matches.iter().map(|m| m.match_number).max().map_or(1, |n| n + 1)
  }

  pub fn max_round(&self) -> u32 {
    self.matches.iter().map(|m| m.round).max().unwrap_or(0)
  }

  /// Checks edge targets exist, no match has more than two incoming edges,
  /// and the edges form a DAG.
  pub fn validate(&self) -> EngineResult<()> {
    let mut indegree: HashMap<MatchId, usize> = self.matches.iter().map(|m| (m.id, 0)).collect();
    for m in &self.matches {
      for target in [m.next_match_id, m.loser_next_match_id].into_iter().flatten() {
        if target == m.id {
          return Err(EngineError::inconsistent(format!("match {} feeds itself", m.id)));
        }
        let Some(count) = indegree.get_mut(&target) else {
          return Err(EngineError::inconsistent(format!(
            "match {} feeds missing match {target}",
            m.id
          )));
        };
        *count += 1;
      }
    }
    if let Some((id, count)) = indegree.iter().find(|(_, count)| **count > 2) {
      return Err(EngineError::inconsistent(format!(
        "match {id} has {count} incoming edges"
      )));
    }

    let mut queue: VecDeque<MatchId> = indegree
      .iter()
      .filter(|(_, count)| **count == 0)
      .map(|(id, _)| *id)
      .collect();
    let mut visited = 0usize;
    while let Some(id) = queue.pop_front() {
      visited += 1;
      let Some(m) = self.get(id) else {
        continue;
      };
      for target in [m.next_match_id, m.loser_next_match_id].into_iter().flatten() {
        if let Some(count) = indegree.get_mut(&target) {
          *count -= 1;
          if *count == 0 {
            queue.push_back(target);
          }
        }
      }
    }
    if visited != self.matches.len() {
      return Err(EngineError::inconsistent("match graph contains a cycle"));
    }
    Ok(())
  }

  /// Puts `participant` in the first open slot and flips the match to
  /// scheduled once both slots are taken.
  pub fn fill_slot(&mut self, target: MatchId, participant: ParticipantId) -> EngineResult<()> {
    let m = self.edge_target_mut(target)?;
    if m.is_completed() {
      return Err(EngineError::inconsistent(format!(
        "match {target} is completed and cannot take participant {participant}"
      )));
    }
    if m.player1_id.is_none() {
      m.player1_id = Some(participant);
    } else if m.player2_id.is_none() {
      m.player2_id = Some(participant);
    } else {
      return Err(EngineError::inconsistent(format!(
        "match {target} has no open slot for participant {participant}"
      )));
    }
    if m.player1_id.is_some() && m.player2_id.is_some() && m.status == MatchStatus::Pending {
      m.status = MatchStatus::Scheduled;
    }
    debug!(match_id = target, participant, status = ?m.status, "filled slot");
    Ok(())
  }

  /// Completes a match that can never be contested: one participant makes it
  /// a bye, none makes it void. Returns whether anything changed.
  fn complete_uncontested(&mut self, id: MatchId) -> EngineResult<bool> {
    let m = self.edge_target_mut(id)?;
    if m.is_completed() {
      return Ok(false);
    }
    match (m.player1_id, m.player2_id) {
      (Some(p), None) => {
        m.winner_id = Some(p);
        m.score1 = Some(BYE_SCORE.0);
        m.score2 = Some(BYE_SCORE.1);
      }
      (None, Some(p)) => {
        m.winner_id = Some(p);
        m.score1 = Some(BYE_SCORE.1);
        m.score2 = Some(BYE_SCORE.0);
      }
      (None, None) => {
        m.winner_id = None;
      }
      (Some(_), Some(_)) => return Ok(false),
    }
    m.status = MatchStatus::Completed;
    debug!(match_id = id, winner = ?m.winner_id, "settled uncontested match");
    Ok(true)
  }

  /// Settles a downstream match once every feeder has completed and it still
  /// lacks a participant.
  fn settle(&mut self, id: MatchId) -> EngineResult<bool> {
    let Some(m) = self.get(id) else {
      return Err(EngineError::inconsistent(format!("feed edge references missing match {id}")));
    };
    if m.is_completed() || m.participant_count() == 2 {
      return Ok(false);
    }
    let Some(feeders) = self.feeders.get(&id) else {
      return Ok(false);
    };
    let all_done = feeders
      .iter()
      .all(|feeder| self.get(*feeder).map(Match::is_completed).unwrap_or(false));
    if !all_done {
      return Ok(false);
    }
    self.complete_uncontested(id)
  }

  /// Sends the winner and loser of a completed match along its edges and
  /// cascades through any match that settles as a result. Returns the ids
  /// of every match touched downstream.
  pub fn propagate(&mut self, from: MatchId) -> EngineResult<Vec<MatchId>> {
    let mut touched = Vec::new();
    let mut queue = VecDeque::from([from]);
    while let Some(current) = queue.pop_front() {
      let (winner, loser, next, loser_next) = {
        let m = self
          .get(current)
          .ok_or_else(|| EngineError::inconsistent(format!("missing match {current}")))?;
        (m.winner_id, m.loser_id(), m.next_match_id, m.loser_next_match_id)
      };

      for (target, participant) in [(next, winner), (loser_next, loser)] {
        if let (Some(target), Some(participant)) = (target, participant) {
          self.fill_slot(target, participant)?;
          touched.push(target);
        }
      }

      let mut targets: Vec<MatchId> = [next, loser_next].into_iter().flatten().collect();
      targets.dedup();
      for target in targets {
        if self.settle(target)? {
          touched.push(target);
          queue.push_back(target);
        }
      }
    }
    touched.sort_unstable();
    touched.dedup();
    Ok(touched)
  }

  /// Completes round-one byes and voids right after generation and pushes
  /// their winners forward.
  pub fn settle_byes(&mut self) -> EngineResult<()> {
    let roots: Vec<MatchId> = self
      .matches
      .iter()
      .filter(|m| !m.is_completed() && m.participant_count() < 2 && !self.feeders.contains_key(&m.id))
      .map(|m| m.id)
      .collect();
    for id in roots {
      if self.complete_uncontested(id)? {
        self.propagate(id)?;
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn bare_match(id: MatchId, next: Option<MatchId>, players: [Option<ParticipantId>; 2]) -> Match {
    let status = if players.iter().all(Option::is_some) {
      MatchStatus::Scheduled
    } else {
      MatchStatus::Pending
    };
    Match {
      id,
      tournament_id: 1,
      round: 1,
      match_number: id as u32,
      bracket: BracketTag::None,
      group: None,
      player1_id: players[0],
      player2_id: players[1],
      score1: None,
      score2: None,
      sets: None,
      winner_id: None,
      status,
      next_match_id: next,
      loser_next_match_id: None,
      true_final: false,
    }
  }

  #[test]
  fn test_fill_slot_flips_to_scheduled_on_second_participant() {
    let mut graph = MatchGraph::from_matches(vec![bare_match(1, None, [None, None])]).unwrap();

    graph.fill_slot(1, 10).unwrap();
    assert_eq!(graph.get(1).unwrap().status, MatchStatus::Pending);
    assert_eq!(graph.get(1).unwrap().player1_id, Some(10));

    graph.fill_slot(1, 20).unwrap();
    let m = graph.get(1).unwrap();
    assert_eq!(m.player2_id, Some(20));
    assert_eq!(m.status, MatchStatus::Scheduled);
  }

  #[test]
  fn test_fill_slot_rejects_third_participant() {
    let mut graph = MatchGraph::from_matches(vec![bare_match(1, None, [Some(1), Some(2)])]).unwrap();
    let err = graph.fill_slot(1, 3).unwrap_err();
    assert!(matches!(err, EngineError::InconsistentBracket(_)));
  }

  #[test]
  fn test_validate_rejects_missing_target() {
    let err = MatchGraph::from_matches(vec![bare_match(1, Some(99), [Some(1), Some(2)])]).unwrap_err();
    assert!(matches!(err, EngineError::InconsistentBracket(_)));
  }

  #[test]
  fn test_validate_rejects_cycle() {
    let err = MatchGraph::from_matches(vec![
      bare_match(1, Some(2), [None, None]),
      bare_match(2, Some(1), [None, None]),
    ])
    .unwrap_err();
    assert_eq!(err, EngineError::inconsistent("match graph contains a cycle"));
  }

  #[test]
  fn test_settle_byes_pushes_bye_winner_downstream() {
    let mut graph = MatchGraph::from_matches(vec![
      bare_match(1, Some(3), [Some(7), None]),
      bare_match(2, Some(3), [Some(8), Some(9)]),
      bare_match(3, None, [None, None]),
    ])
    .unwrap();

    graph.settle_byes().unwrap();

    let bye = graph.get(1).unwrap();
    assert!(bye.is_bye());
    assert_eq!(bye.winner_id, Some(7));
    assert_eq!((bye.score1, bye.score2), (Some(1), Some(0)));
    assert_eq!(graph.get(3).unwrap().player1_id, Some(7));
    assert_eq!(graph.get(3).unwrap().status, MatchStatus::Pending);
    assert!(!graph.get(2).unwrap().is_completed());
  }

  #[test]
  fn test_next_ids_continue_after_existing_matches() {
    let graph = MatchGraph::from_matches(vec![
      bare_match(4, None, [None, None]),
      bare_match(9, None, [None, None]),
    ])
    .unwrap();
    assert_eq!(graph.next_match_id(), 10);
    assert_eq!(graph.next_match_number(), 10);
    assert_eq!(MatchGraph::new().next_match_id(), 1);
  }
}

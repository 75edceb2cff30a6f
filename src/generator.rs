use std::collections::{HashMap, HashSet};

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{EngineError, EngineResult};
use crate::graph::MatchGraph;
use crate::types::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Seeding {
  #[default]
  Shuffled,
  AsListed,
}

#[derive(Clone, Copy, Debug)]
pub struct GenerateOptions {
  pub starting_round: u32,
  pub first_match_id: MatchId,
  pub first_match_number: u32,
  pub seeding: Seeding,
}

impl Default for GenerateOptions {
  fn default() -> Self {
    GenerateOptions {
      starting_round: 1,
      first_match_id: 1,
      first_match_number: 1,
      seeding: Seeding::Shuffled,
    }
  }
}

/// Builds the full, wired match batch for `format`. Round-one byes are
/// already completed in the returned list.
///
/// Elimination formats pad the field to the next power of two `P`, and
/// every bye is stored as a completed match. A single-elimination batch
/// therefore holds `P - 1` matches, of which only `n - 1` are contested.
/// Double elimination stores `2P - 2` matches before any True Final, with
/// void losers matches settled the same way.
pub fn generate<R: Rng + ?Sized>(
  tournament_id: TournamentId,
  format: Format,
  participants: &[ParticipantId],
  options: GenerateOptions,
  rng: &mut R,
) -> EngineResult<Vec<Match>> {
  validate_participants(participants)?;

  let mut builder = MatchBuilder::new(tournament_id, &options);
  match format {
    Format::RoundRobin => {
      build_round_robin(&mut builder, participants, options.starting_round, None);
    }
    Format::Group => {
      build_groups(&mut builder, participants, options, rng);
    }
    Format::SingleElimination => {
      let slots = seeded_slots(participants, options.seeding, rng);
      build_knockout(&mut builder, &slots, options.starting_round, BracketTag::None)?;
    }
    Format::DoubleElimination => {
      let slots = seeded_slots(participants, options.seeding, rng);
      build_double_elimination(&mut builder, &slots, options.starting_round)?;
    }
  }

  let mut graph = MatchGraph::from_matches(builder.matches)?;
  graph.settle_byes()?;
  info!(
    tournament_id,
    ?format,
    participants = participants.len(),
    matches = graph.len(),
    "generated bracket"
  );
  Ok(graph.into_matches())
}

pub fn validate_participants(participants: &[ParticipantId]) -> EngineResult<()> {
  if participants.len() < MIN_PARTICIPANTS {
    return Err(EngineError::validation(format!(
      "at least {MIN_PARTICIPANTS} participants are required, got {}",
      participants.len()
    )));
  }
  let mut seen = HashSet::new();
  for participant in participants {
    if !seen.insert(*participant) {
      return Err(EngineError::validation(format!(
        "participant {participant} is listed more than once"
      )));
    }
  }
  Ok(())
}

pub fn group_count(participants: usize) -> usize {
  participants.div_ceil(PLAYERS_PER_GROUP).clamp(1, MAX_GROUPS)
}

pub fn next_power_of_two(n: usize) -> usize {
  n.max(1).next_power_of_two()
}

struct MatchBuilder {
  tournament_id: TournamentId,
  matches: Vec<Match>,
  index: HashMap<MatchId, usize>,
  next_id: MatchId,
  next_number: u32,
}

impl MatchBuilder {
  fn new(tournament_id: TournamentId, options: &GenerateOptions) -> Self {
    MatchBuilder {
      tournament_id,
      matches: Vec::new(),
      index: HashMap::new(),
      next_id: options.first_match_id,
      next_number: options.first_match_number,
    }
  }

  fn push_match(
    &mut self,
    round: u32,
    bracket: BracketTag,
    group: Option<u32>,
    player1_id: Option<ParticipantId>,
    player2_id: Option<ParticipantId>,
  ) -> MatchId {
    let id = self.next_id;
    self.next_id += 1;
    let match_number = self.next_number;
    self.next_number += 1;
    let status = if player1_id.is_some() && player2_id.is_some() {
      MatchStatus::Scheduled
    } else {
      MatchStatus::Pending
    };
    self.matches.push(Match {
      id,
      tournament_id: self.tournament_id,
      round,
      match_number,
      bracket,
      group,
      player1_id,
      player2_id,
      score1: None,
      score2: None,
      sets: None,
      winner_id: None,
      status,
      next_match_id: None,
      loser_next_match_id: None,
      true_final: false,
    });
    self.index.insert(id, self.matches.len() - 1);
    id
  }

  fn get_mut(&mut self, id: MatchId) -> EngineResult<&mut Match> {
    let idx = *self
      .index
      .get(&id)
      .ok_or_else(|| EngineError::inconsistent(format!("missing match {id} while wiring")))?;
    Ok(&mut self.matches[idx])
  }

  fn link_winner(&mut self, from: MatchId, to: MatchId) -> EngineResult<()> {
    let m = self.get_mut(from)?;
    if m.next_match_id.is_some() {
      return Err(EngineError::inconsistent(format!("match {from} already has a winner edge")));
    }
    m.next_match_id = Some(to);
    Ok(())
  }

  fn link_loser(&mut self, from: MatchId, to: MatchId) -> EngineResult<()> {
    let m = self.get_mut(from)?;
    if m.loser_next_match_id.is_some() {
      return Err(EngineError::inconsistent(format!("match {from} already has a loser edge")));
    }
    m.loser_next_match_id = Some(to);
    Ok(())
  }
}

fn build_round_robin(
  builder: &mut MatchBuilder,
  participants: &[ParticipantId],
  round: u32,
  group: Option<u32>,
) {
  for (i, a) in participants.iter().enumerate() {
    for b in &participants[i + 1..] {
      builder.push_match(round, BracketTag::None, group, Some(*a), Some(*b));
    }
  }
}

fn build_groups<R: Rng + ?Sized>(
  builder: &mut MatchBuilder,
  participants: &[ParticipantId],
  options: GenerateOptions,
  rng: &mut R,
) {
  let mut order = participants.to_vec();
  if options.seeding == Seeding::Shuffled {
    order.shuffle(rng);
  }
  let count = group_count(order.len());
  let mut groups: Vec<Vec<ParticipantId>> = vec![Vec::new(); count];
  for (i, participant) in order.into_iter().enumerate() {
    groups[i % count].push(participant);
  }
  for (i, members) in groups.iter().enumerate() {
    build_round_robin(builder, members, options.starting_round, Some(i as u32 + 1));
  }
}

/// Lays participants out over a power-of-two field. Byes fill the second
/// slot of the leading pairs so no two byes ever meet.
fn seeded_slots<R: Rng + ?Sized>(
  participants: &[ParticipantId],
  seeding: Seeding,
  rng: &mut R,
) -> Vec<Option<ParticipantId>> {
  let mut order = participants.to_vec();
  if seeding == Seeding::Shuffled {
    order.shuffle(rng);
  }
  let size = next_power_of_two(order.len());
  let byes = size - order.len();
  let mut players = order.into_iter();
  let mut slots = Vec::with_capacity(size);
  for pair in 0..size / 2 {
    slots.push(players.next());
    slots.push(if pair < byes { None } else { players.next() });
  }
  debug_assert!(players.next().is_none());
  slots
}

/// Pairs the slots into a first round, then halves until one match is left.
/// Returns the match ids of every round in order.
fn build_knockout(
  builder: &mut MatchBuilder,
  slots: &[Option<ParticipantId>],
  starting_round: u32,
  bracket: BracketTag,
) -> EngineResult<Vec<Vec<MatchId>>> {
  let first = slots
    .chunks(2)
    .map(|pair| builder.push_match(starting_round, bracket, None, pair[0], pair.get(1).copied().flatten()))
    .collect::<Vec<_>>();
  let mut rounds = vec![first];
  let mut round = starting_round;

  loop {
    let prev = match rounds.last() {
      Some(prev) if prev.len() > 1 => prev.clone(),
      _ => break,
    };
    debug_assert!(prev.len() % 2 == 0);
    round += 1;
    let mut ids = Vec::with_capacity(prev.len() / 2);
    for pair in prev.chunks(2) {
      let id = builder.push_match(round, bracket, None, None, None);
      builder.link_winner(pair[0], id)?;
      builder.link_winner(pair[1], id)?;
      ids.push(id);
    }
    rounds.push(ids);
  }
  Ok(rounds)
}

fn build_double_elimination(
  builder: &mut MatchBuilder,
  slots: &[Option<ParticipantId>],
  starting_round: u32,
) -> EngineResult<()> {
  let winners = build_knockout(builder, slots, starting_round, BracketTag::Winners)?;
  let winners_rounds = winners.len();

  let mut losers: Vec<Vec<MatchId>> = Vec::new();
  let mut losers_round = starting_round;
  for i in 1..winners_rounds {
    let count = winners[i].len();

    let mut merged = Vec::with_capacity(count);
    for j in 0..count {
      let id = builder.push_match(losers_round, BracketTag::Losers, None, None, None);
      if i == 1 {
        builder.link_loser(winners[0][j * 2], id)?;
        builder.link_loser(winners[0][j * 2 + 1], id)?;
      } else {
        let prev = losers
          .last()
          .ok_or_else(|| EngineError::inconsistent("missing losers round"))?;
        let (a, b) = (prev[j * 2], prev[j * 2 + 1]);
        builder.link_winner(a, id)?;
        builder.link_winner(b, id)?;
      }
      merged.push(id);
    }
    losers_round += 1;

    let mut dropped = Vec::with_capacity(count);
    for j in 0..count {
      let id = builder.push_match(losers_round, BracketTag::Losers, None, None, None);
      builder.link_winner(merged[j], id)?;
      builder.link_loser(winners[i][j], id)?;
      dropped.push(id);
    }
    losers_round += 1;

    losers.push(merged);
    losers.push(dropped);
  }

  let winners_final = *winners
    .last()
    .and_then(|round| round.first())
    .ok_or_else(|| EngineError::inconsistent("missing winners final"))?;
  let grand_final_round = starting_round + winners_rounds as u32;
  let grand_final = builder.push_match(grand_final_round, BracketTag::Final, None, None, None);
  builder.link_winner(winners_final, grand_final)?;
  match losers.last().and_then(|round| round.first()) {
    Some(losers_final) => builder.link_winner(*losers_final, grand_final)?,
    None => builder.link_loser(winners_final, grand_final)?,
  }
  Ok(())
}

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::types::*;

/// Accumulated record of one participant over a round-robin or one group.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Standing {
  pub participant_id: ParticipantId,
  pub main_points: u32,
  pub matches_played: u32,
  pub matches_won: u32,
  pub sets_won: u64,
  pub sets_lost: u64,
  pub small_points_won: u64,
  pub small_points_lost: u64,
  /// Net result against each opponent, +1 per win and -1 per loss.
  pub head_to_head: BTreeMap<ParticipantId, i32>,
}

impl Standing {
  pub fn new(participant_id: ParticipantId) -> Self {
    Standing {
      participant_id,
      ..Standing::default()
    }
  }

  fn record(&mut self, opponent: ParticipantId, won: bool, sets: (u64, u64), small: (u64, u64)) {
    self.matches_played += 1;
    if won {
      self.matches_won += 1;
      self.main_points += WIN_POINTS;
    } else {
      self.main_points += LOSS_POINTS;
    }
    self.sets_won += sets.0;
    self.sets_lost += sets.1;
    self.small_points_won += small.0;
    self.small_points_lost += small.1;
    *self.head_to_head.entry(opponent).or_insert(0) += if won { 1 } else { -1 };
  }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GroupStanding {
  pub group: Option<u32>,
  pub rows: Vec<Standing>,
}

// ── Comparator chain ───────────────────────────────────────────────────

type CmpFunc = fn(&Standing, &Standing) -> Ordering;

/// `won / (won + lost)`, with an empty denominator counting as zero.
/// Cross products are taken in u128 so no accepted score can overflow.
#[derive(Clone, Copy, Debug)]
struct Ratio {
  num: u64,
  den: u64,
}

impl Ratio {
  fn new(num: u64, den: u64) -> Self {
    if den == 0 {
      Ratio { num: 0, den: 1 }
    } else {
      Ratio { num, den }
    }
  }

  fn of(won: u64, lost: u64) -> Self {
    Ratio::new(won, won.saturating_add(lost))
  }

  fn compare(self, other: Ratio) -> Ordering {
    (u128::from(self.num) * u128::from(other.den)).cmp(&(u128::from(other.num) * u128::from(self.den)))
  }
}

fn compare_main_points(a: &Standing, b: &Standing) -> Ordering {
  b.main_points.cmp(&a.main_points)
}

fn compare_match_ratio(a: &Standing, b: &Standing) -> Ordering {
  let ra = Ratio::new(a.matches_won.into(), a.matches_played.into());
  let rb = Ratio::new(b.matches_won.into(), b.matches_played.into());
  rb.compare(ra)
}

fn compare_set_ratio(a: &Standing, b: &Standing) -> Ordering {
  let ra = Ratio::of(a.sets_won, a.sets_lost);
  let rb = Ratio::of(b.sets_won, b.sets_lost);
  rb.compare(ra)
}

fn compare_small_point_ratio(a: &Standing, b: &Standing) -> Ordering {
  let ra = Ratio::of(a.small_points_won, a.small_points_lost);
  let rb = Ratio::of(b.small_points_won, b.small_points_lost);
  rb.compare(ra)
}

const TIE_BREAKS: [CmpFunc; 4] = [
  compare_main_points,
  compare_match_ratio,
  compare_set_ratio,
  compare_small_point_ratio,
];

/// Orders two rows by the statistical tie-breaks. Head-to-head is resolved
/// afterwards over each block of rows this leaves equal.
pub fn compare(a: &Standing, b: &Standing) -> Ordering {
  TIE_BREAKS
    .iter()
    .map(|cmp| cmp(a, b))
    .find(|ordering| ordering.is_ne())
    .unwrap_or(Ordering::Equal)
}

// ── Accumulation and ranking ───────────────────────────────────────────

/// Builds one row per participant, in the order given, from the contested
/// matches among them. Byes, voids and unfinished matches are skipped.
pub fn accumulate<'a>(
  participants: &[ParticipantId],
  matches: impl IntoIterator<Item = &'a Match>,
) -> Vec<Standing> {
  let mut rows: Vec<Standing> = participants.iter().map(|p| Standing::new(*p)).collect();
  let position: BTreeMap<ParticipantId, usize> = participants
    .iter()
    .enumerate()
    .map(|(i, p)| (*p, i))
    .collect();

  for m in matches {
    if !m.is_contested() {
      continue;
    }
    let (Some(p1), Some(p2), Some(winner)) = (m.player1_id, m.player2_id, m.winner_id) else {
      continue;
    };
    let (Some(&i1), Some(&i2)) = (position.get(&p1), position.get(&p2)) else {
      continue;
    };
    let (sets, small) = match &m.sets {
      Some(detail) => {
        let sets = detail.iter().fold((0u64, 0u64), |(a, b), set| match set.player1.cmp(&set.player2) {
          Ordering::Greater => (a + 1, b),
          Ordering::Less => (a, b + 1),
          Ordering::Equal => (a, b),
        });
        let small = detail
          .iter()
          .fold((0u64, 0u64), |(a, b), set| {
            (a + u64::from(set.player1), b + u64::from(set.player2))
          });
        (sets, small)
      }
      None => (
        (u64::from(m.score1.unwrap_or(0)), u64::from(m.score2.unwrap_or(0))),
        (0, 0),
      ),
    };
    rows[i1].record(p2, winner == p1, sets, small);
    rows[i2].record(p1, winner == p2, (sets.1, sets.0), (small.1, small.0));
  }
  rows
}

/// Sorts rows best to worst. Rows still level after the statistical
/// tie-breaks are reordered by their net head-to-head record inside the
/// level block; anything left equal keeps its input order.
pub fn rank(mut rows: Vec<Standing>) -> Vec<Standing> {
  rows.sort_by(compare);

  let mut start = 0;
  while start < rows.len() {
    let mut end = start + 1;
    while end < rows.len() && compare(&rows[start], &rows[end]).is_eq() {
      end += 1;
    }
    if end - start > 1 {
      resolve_head_to_head(&mut rows[start..end]);
    }
    start = end;
  }
  rows
}

fn resolve_head_to_head(block: &mut [Standing]) {
  let members: HashSet<ParticipantId> = block.iter().map(|row| row.participant_id).collect();
  let net = |row: &Standing| -> i32 {
    row
      .head_to_head
      .iter()
      .filter(|(opponent, _)| members.contains(opponent))
      .map(|(_, result)| *result)
      .sum()
  };
  let mut keyed: Vec<(i32, Standing)> = block.iter().map(|row| (net(row), row.clone())).collect();
  keyed.sort_by(|a, b| b.0.cmp(&a.0));
  for (slot, (_, row)) in block.iter_mut().zip(keyed) {
    *slot = row;
  }
}

pub fn standings<'a>(
  participants: &[ParticipantId],
  matches: impl IntoIterator<Item = &'a Match>,
) -> Vec<Standing> {
  rank(accumulate(participants, matches))
}

/// Ranks every group separately. Group members are taken from the group's
/// matches, ordered as they appear in `participants`.
pub fn group_standings(participants: &[ParticipantId], matches: &[Match]) -> Vec<GroupStanding> {
  let mut groups: BTreeMap<u32, HashSet<ParticipantId>> = BTreeMap::new();
  for m in matches {
    if let Some(group) = m.group {
      let members = groups.entry(group).or_default();
      members.extend(m.slots().into_iter().flatten());
    }
  }

  groups
    .into_iter()
    .map(|(group, members)| {
      let ordered: Vec<ParticipantId> = participants
        .iter()
        .copied()
        .filter(|p| members.contains(p))
        .collect();
      let rows = standings(&ordered, matches.iter().filter(|m| m.group == Some(group)));
      GroupStanding {
        group: Some(group),
        rows,
      }
    })
    .collect()
}

/// Smallest field the knockout phase can seed without a second layer of byes.
pub fn qualifier_target(groups: usize) -> usize {
  groups.next_power_of_two().max(2)
}

/// Group winners in group order, topped up with the best-ranked runners-up
/// (then third places, and so on) until the knockout field is full.
pub fn qualifiers(groups: &[GroupStanding]) -> Vec<ParticipantId> {
  let target = qualifier_target(groups.len());
  let mut picked: Vec<ParticipantId> = groups
    .iter()
    .filter_map(|group| group.rows.first())
    .map(|row| row.participant_id)
    .collect();

  let deepest = groups.iter().map(|group| group.rows.len()).max().unwrap_or(0);
  for place in 1..deepest {
    if picked.len() >= target {
      break;
    }
    let mut candidates: Vec<Standing> = groups
      .iter()
      .filter_map(|group| group.rows.get(place))
      .cloned()
      .collect();
    candidates.sort_by(compare);
    let missing = target - picked.len();
    picked.extend(candidates.into_iter().take(missing).map(|row| row.participant_id));
  }
  picked.truncate(target);
  picked
}

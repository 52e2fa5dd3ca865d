use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{TournamentError, TournamentResult};
use crate::types::{BYE_LABEL, MIN_PARTICIPANTS};

// ── Data model ─────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Match {
  pub p1: Option<String>,
  pub p2: Option<String>,
  pub winner: Option<String>,
}

impl Match {
  pub fn new(p1: Option<String>, p2: Option<String>) -> Self {
    Match { p1, p2, winner: None }
  }

  pub fn has_assignment(&self) -> bool {
    self.p1.is_some() || self.p2.is_some()
  }

  pub fn slot(&self, slot: Slot) -> Option<&str> {
    match slot {
      Slot::P1 => self.p1.as_deref(),
      Slot::P2 => self.p2.as_deref(),
    }
  }

  fn slot_mut(&mut self, slot: Slot) -> &mut Option<String> {
    match slot {
      Slot::P1 => &mut self.p1,
      Slot::P2 => &mut self.p2,
    }
  }

  fn contains(&self, name: &str) -> bool {
    self.p1.as_deref() == Some(name) || self.p2.as_deref() == Some(name)
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Slot {
  P1,
  P2,
}

impl Slot {
  pub fn from_index(index: usize) -> Option<Slot> {
    match index {
      0 => Some(Slot::P1),
      1 => Some(Slot::P2),
      _ => None,
    }
  }

  pub fn index(self) -> usize {
    match self {
      Slot::P1 => 0,
      Slot::P2 => 1,
    }
  }

  /// Slot in the next round that match `match_index` feeds.
  pub fn fed_by(match_index: usize) -> Slot {
    if match_index % 2 == 0 {
      Slot::P1
    } else {
      Slot::P2
    }
  }
}

pub type Round = Vec<Match>;

/// Rounds in play order; round 0 is the opening round and the last round
/// holds the final. Serializes as a bare nested array.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bracket {
  rounds: Vec<Round>,
}

impl Bracket {
  pub fn from_rounds(rounds: Vec<Round>) -> Self {
    Bracket { rounds }
  }

  pub fn rounds(&self) -> &[Round] {
    &self.rounds
  }

  pub fn round_count(&self) -> usize {
    self.rounds.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rounds.is_empty()
  }

  pub fn get(&self, round_index: usize, match_index: usize) -> Option<&Match> {
    self.rounds.get(round_index)?.get(match_index)
  }

  /// Names currently seated in round 0, bye markers excluded.
  pub fn opening_players(&self) -> Vec<&str> {
    self
      .rounds
      .first()
      .map(|round| {
        round
          .iter()
          .flat_map(|m| [m.p1.as_deref(), m.p2.as_deref()])
          .flatten()
          .filter(|name| *name != BYE_LABEL)
          .collect()
      })
      .unwrap_or_default()
  }

  fn opening_slot_count(&self) -> usize {
    self
      .rounds
      .first()
      .map(|round| {
        round
          .iter()
          .map(|m| m.p1.is_some() as usize + m.p2.is_some() as usize)
          .sum()
      })
      .unwrap_or(0)
  }
}

/// `ceil(log2(max(2, n)))`
pub fn rounds_for(participant_count: usize) -> usize {
  participant_count.max(2).next_power_of_two().trailing_zeros() as usize
}

// ── Round generator ────────────────────────────────────────────────────

pub fn create(participants: &[String], max_participants: usize) -> TournamentResult<Bracket> {
  create_with_rng(participants, max_participants, &mut rand::thread_rng())
}

pub fn create_with_rng<R: Rng + ?Sized>(
  participants: &[String],
  max_participants: usize,
  rng: &mut R,
) -> TournamentResult<Bracket> {
  let count = participants.len();
  if count < MIN_PARTICIPANTS {
    return Err(TournamentError::Validation(
      "You need at least 2 participants.".to_string(),
    ));
  }
  if count > max_participants {
    return Err(TournamentError::Validation(format!(
      "Max {max_participants} participants supported."
    )));
  }
  if participants.iter().any(|name| name.trim().is_empty()) {
    return Err(TournamentError::Validation(
      "Participant names must not be empty.".to_string(),
    ));
  }

  let rounds = rounds_for(count);
  let bracket_size = 1usize << rounds;
  let matches_count = bracket_size / 2;

  let mut seeded = participants.to_vec();
  seeded.shuffle(rng);

  // Interleave: k-th seed goes to match k/2, so byes spread across the round.
  let mut opening: Round = vec![Match::default(); matches_count];
  for (k, name) in seeded.into_iter().enumerate() {
    let target = &mut opening[k / 2];
    if k % 2 == 0 {
      target.p1 = Some(name);
    } else {
      target.p2 = Some(name);
    }
  }

  let mut bracket = Bracket::from_rounds(vec![opening]);
  ensure_rounds(&mut bracket, rounds);
  Ok(bracket)
}

// ── Mutations ──────────────────────────────────────────────────────────

/// Records `player` as the winner of the match and seats them in the next
/// round. Overwriting an earlier, different winner is allowed and does not
/// retract anything already propagated further downstream.
pub fn advance_winner(
  bracket: &mut Bracket,
  round_index: usize,
  match_index: usize,
  player: &str,
) -> TournamentResult<()> {
  if player.is_empty() || player == BYE_LABEL {
    return Err(TournamentError::invalid_move("A bye cannot win a match."));
  }
  let current = bracket
    .get(round_index, match_index)
    .ok_or_else(|| {
      if round_index >= bracket.rounds.len() {
        TournamentError::invalid_move(format!("Round {} does not exist.", round_index + 1))
      } else {
        TournamentError::invalid_move(format!("Match {} does not exist.", match_index + 1))
      }
    })?;
  if !current.contains(player) {
    return Err(TournamentError::invalid_move(format!(
      "{player} is not playing in this match."
    )));
  }

  // Everything is checked before the first write.
  let next_round = round_index + 1;
  let next_match = match_index / 2;
  let has_next_round = next_round < bracket.rounds.len();
  if has_next_round && bracket.get(next_round, next_match).is_none() {
    return Err(TournamentError::invalid_move("Next round is missing the receiving match."));
  }

  bracket.rounds[round_index][match_index].winner = Some(player.to_string());
  if has_next_round {
    *bracket.rounds[next_round][next_match].slot_mut(Slot::fed_by(match_index)) = Some(player.to_string());
  }
  Ok(())
}

/// Appends trailing empty matches to every round after the first until
/// each holds `ceil(previous / 2)`, so every match has a receiving match.
/// Existing matches are left alone.
pub fn pad_later_rounds(bracket: &mut Bracket) {
  for r in 1..bracket.rounds.len() {
    let needed = bracket.rounds[r - 1].len().div_ceil(2);
    while bracket.rounds[r].len() < needed {
      bracket.rounds[r].push(Match::default());
    }
  }
}

/// Appends empty rounds, each half the size of the one before (rounded up),
/// until the bracket has `required` rounds. Never removes rounds.
pub fn ensure_rounds(bracket: &mut Bracket, required: usize) {
  while bracket.rounds.len() < required {
    let previous = bracket.rounds.last().map(|round| round.len()).unwrap_or(2);
    let count = previous.div_ceil(2).max(1);
    bracket.rounds.push(vec![Match::default(); count]);
  }
}

/// Seats everyone in `all_participants` who is not already in round 0.
/// Empty round-0 slots are filled first, then new matches are appended.
/// Existing matches are never reshuffled. Returns how many were added.
pub fn add_late_entrants(bracket: &mut Bracket, all_participants: &[String]) -> TournamentResult<usize> {
  add_late_entrants_with_rng(bracket, all_participants, &mut rand::thread_rng())
}

pub fn add_late_entrants_with_rng<R: Rng + ?Sized>(
  bracket: &mut Bracket,
  all_participants: &[String],
  rng: &mut R,
) -> TournamentResult<usize> {
  let current: HashSet<String> = bracket
    .opening_players()
    .into_iter()
    .map(|name| name.to_string())
    .collect();
  let mut newcomers: Vec<String> = all_participants
    .iter()
    .filter(|name| !current.contains(name.as_str()))
    .cloned()
    .collect();
  if newcomers.is_empty() {
    return Err(TournamentError::NothingToAdd);
  }
  let added = newcomers.len();
  newcomers.shuffle(rng);
  let mut pending = newcomers.into_iter().peekable();

  if bracket.rounds.is_empty() {
    bracket.rounds.push(Vec::new());
  }
  let opening = &mut bracket.rounds[0];
  // Decided matches keep their slots, even a bye whose winner is recorded.
  for m in opening.iter_mut().filter(|m| m.winner.is_none()) {
    if pending.peek().is_none() {
      break;
    }
    if m.p1.is_none() {
      m.p1 = pending.next();
    }
    if m.p2.is_none() {
      m.p2 = pending.next();
    }
  }
  while let Some(p1) = pending.next() {
    opening.push(Match::new(Some(p1), pending.next()));
  }

  pad_later_rounds(bracket);

  let by_players = rounds_for(bracket.opening_slot_count());
  let by_matches = rounds_for(bracket.rounds[0].len() * 2);
  ensure_rounds(bracket, by_players.max(by_matches));
  Ok(added)
}

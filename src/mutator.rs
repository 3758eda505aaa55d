use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bracket::{BracketTree, GAMES_TO_WIN};
use crate::types::{Matchup, MatchupId, Slot};

/// A single +1 / -1 adjustment to one side of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum ScoreDelta {
  Increment,
  Decrement,
}

impl TryFrom<i8> for ScoreDelta {
  type Error = String;

  fn try_from(value: i8) -> Result<Self, Self::Error> {
    match value {
      1 => Ok(ScoreDelta::Increment),
      -1 => Ok(ScoreDelta::Decrement),
      other => Err(format!("Score direction must be 1 or -1, got {other}.")),
    }
  }
}

impl From<ScoreDelta> for i8 {
  fn from(delta: ScoreDelta) -> i8 {
    match delta {
      ScoreDelta::Increment => 1,
      ScoreDelta::Decrement => -1,
    }
  }
}

/// Persistence seam used by [`BracketDraft::commit`].
pub trait BracketStore {
  fn save_bracket(&self, matchups: &[Matchup]) -> Result<(), String>;
}

/// Adds one win to `slot`. Returns whether the bracket changed.
///
/// Reaching the clinching count completes the series, flags the loser on every
/// appearance and writes the winner into the next round's slot.
pub fn increment(bracket: &mut BracketTree, matchup_id: MatchupId, slot: Slot) -> bool {
  let Some(idx) = bracket.index_of(matchup_id) else {
    return false;
  };
  let matchup = bracket.matchup_at(idx);
  if !matchup.has_both_teams() {
    return false;
  }
  let current = matchup.score(slot);
  if current >= GAMES_TO_WIN {
    return false;
  }
  if current + 1 == GAMES_TO_WIN && matchup.score(slot.other()) >= GAMES_TO_WIN {
    return false;
  }

  let matchup = bracket.matchup_mut(idx);
  matchup.set_score(slot, current + 1);
  if current + 1 < GAMES_TO_WIN {
    return true;
  }

  let (Some(winner), Some(loser)) = (matchup.team(slot), matchup.team(slot.other())) else {
    return true;
  };
  matchup.is_completed = true;
  matchup.winner_id = Some(winner);
  debug!("Matchup {matchup_id} decided: team {winner} eliminates team {loser}");

  bracket.mark_team_eliminated(loser, true);
  if let Some((next_idx, next_slot)) = bracket.next_slot_of(idx) {
    let next = bracket.matchup_mut(next_idx);
    next.set_team(next_slot, Some(winner));
    next.set_eliminated(next_slot, false);
  }
  true
}

/// Removes one win from `slot`. Returns whether the bracket changed.
///
/// Taking a win away from the recorded winner reopens the series and clears
/// everything downstream that was built on it.
pub fn decrement(bracket: &mut BracketTree, matchup_id: MatchupId, slot: Slot) -> bool {
  let Some(idx) = bracket.index_of(matchup_id) else {
    return false;
  };
  let matchup = bracket.matchup_mut(idx);
  let current = matchup.score(slot);
  if current == 0 {
    return false;
  }

  let team = matchup.team(slot);
  let was_winner = matchup.is_completed && team.is_some() && matchup.winner_id == team;
  matchup.set_score(slot, current - 1);
  if !was_winner {
    return true;
  }

  matchup.is_completed = false;
  matchup.winner_id = None;
  let opponent = matchup.team(slot.other());
  debug!("Matchup {matchup_id} reopened; resetting dependent rounds");

  if let Some(opponent) = opponent {
    bracket.mark_team_eliminated(opponent, false);
  }
  reset_dependents(bracket, idx);
  true
}

pub fn apply_score_delta(
  bracket: &mut BracketTree,
  matchup_id: MatchupId,
  slot: Slot,
  delta: ScoreDelta,
) -> bool {
  match delta {
    ScoreDelta::Increment => increment(bracket, matchup_id, slot),
    ScoreDelta::Decrement => decrement(bracket, matchup_id, slot),
  }
}

/// Walks forward from `start`, clearing the advanced team in each next slot and
/// undoing any series that had been decided with it.
fn reset_dependents(bracket: &mut BracketTree, start: usize) {
  let mut current = start;
  for _ in 0..bracket.round_count() {
    let Some((next_idx, slot)) = bracket.next_slot_of(current) else {
      break;
    };
    let next = bracket.matchup_mut(next_idx);
    let loser = next
      .winner_id
      .and_then(|winner| next.slot_of(winner))
      .and_then(|winner_slot| next.team(winner_slot.other()));
    let was_completed = next.is_completed;

    next.set_team(slot, None);
    next.set_eliminated(slot, false);
    if !was_completed {
      break;
    }
    next.is_completed = false;
    next.winner_id = None;
    next.score1 = 0;
    next.score2 = 0;
    if let Some(loser) = loser {
      bracket.mark_team_eliminated(loser, false);
    }
    current = next_idx;
  }
}

pub fn reset_to_baseline(baseline: &BracketTree) -> BracketTree {
  baseline.clone()
}

/// Working copy edited interactively, plus the committed state it started from.
#[derive(Debug, Clone)]
pub struct BracketDraft {
  baseline: BracketTree,
  working: BracketTree,
}

impl BracketDraft {
  pub fn new(baseline: BracketTree) -> Self {
    let working = reset_to_baseline(&baseline);
    BracketDraft { baseline, working }
  }

  pub fn working(&self) -> &BracketTree {
    &self.working
  }

  pub fn baseline(&self) -> &BracketTree {
    &self.baseline
  }

  pub fn is_dirty(&self) -> bool {
    self.working != self.baseline
  }

  pub fn apply_score_delta(&mut self, matchup_id: MatchupId, slot: Slot, delta: ScoreDelta) -> bool {
    apply_score_delta(&mut self.working, matchup_id, slot, delta)
  }

  pub fn reset(&mut self) {
    self.working = reset_to_baseline(&self.baseline);
  }

  /// Persists the working copy and adopts it as the new baseline.
  pub fn commit(&mut self, store: &dyn BracketStore) -> Result<(), String> {
    store.save_bracket(self.working.matchups())?;
    self.baseline = self.working.clone();
    Ok(())
  }
}

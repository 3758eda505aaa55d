use std::collections::{HashMap, HashSet};

use crate::error::EngineError;
use crate::types::{Matchup, MatchupId, Slot, TeamId, SERIES_BEST_OF};

pub const fn games_to_win(best_of: u8) -> u8 {
  (best_of / 2) + 1
}

pub const GAMES_TO_WIN: u8 = games_to_win(SERIES_BEST_OF);

/// Single-elimination bracket stored as a flat arena of matchups.
///
/// `rounds[r]` lists arena indices of round `r + 1` ordered by position, so
/// `(round, position)` resolves in constant time and the slot mapping
/// `(r, p) -> (r + 1, ceil(p / 2))` never depends on insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct BracketTree {
  matchups: Vec<Matchup>,
  rounds: Vec<Vec<usize>>,
  index: HashMap<MatchupId, usize>,
}

impl BracketTree {
  pub fn new(matchups: Vec<Matchup>) -> Result<Self, EngineError> {
    if matchups.is_empty() {
      return Err(EngineError::malformed("bracket has no matchups"));
    }

    let mut index = HashMap::with_capacity(matchups.len());
    for (idx, matchup) in matchups.iter().enumerate() {
      if matchup.round == 0 {
        return Err(EngineError::malformed(format!(
          "matchup {} has round 0; rounds start at 1",
          matchup.id
        )));
      }
      // Every round holds at least one matchup.
      if matchup.round as usize > matchups.len() {
        return Err(EngineError::malformed(format!(
          "matchup {} is in round {} but the bracket has only {} matchups",
          matchup.id,
          matchup.round,
          matchups.len()
        )));
      }
      if index.insert(matchup.id, idx).is_some() {
        return Err(EngineError::malformed(format!("duplicate matchup id {}", matchup.id)));
      }
    }

    let round_count = matchups.iter().map(|m| m.round).max().unwrap_or(0) as usize;
    let mut rounds: Vec<Vec<usize>> = vec![Vec::new(); round_count];
    for (idx, matchup) in matchups.iter().enumerate() {
      rounds[(matchup.round - 1) as usize].push(idx);
    }

    for (r, ids) in rounds.iter_mut().enumerate() {
      if ids.is_empty() {
        return Err(EngineError::malformed(format!("round {} is missing", r + 1)));
      }
      ids.sort_by_key(|idx| matchups[*idx].position);
      for (expected, idx) in ids.iter().enumerate() {
        if matchups[*idx].position != expected as u32 + 1 {
          return Err(EngineError::malformed(format!(
            "round {} positions must run 1..={} without gaps or repeats",
            r + 1,
            ids.len()
          )));
        }
      }
    }

    for (r, pair) in rounds.windows(2).enumerate() {
      if pair[0].len() != pair[1].len() * 2 {
        return Err(EngineError::malformed(format!(
          "round {} has {} matchups but round {} has {}",
          r + 1,
          pair[0].len(),
          r + 2,
          pair[1].len()
        )));
      }
    }

    let final_size = rounds.last().map(|ids| ids.len()).unwrap_or(0);
    if final_size != 1 {
      return Err(EngineError::malformed(format!(
        "final round must hold exactly one matchup, found {final_size}"
      )));
    }

    let mut tree = BracketTree { matchups, rounds, index };
    for matchup in &tree.matchups {
      check_matchup(matchup)?;
    }
    tree.check_slot_mapping()?;
    tree.refresh_eliminations();
    Ok(tree)
  }

  fn check_slot_mapping(&self) -> Result<(), EngineError> {
    for ids in self.rounds.iter().skip(1) {
      for idx in ids {
        let matchup = &self.matchups[*idx];
        for slot in [Slot::Team1, Slot::Team2] {
          let Some(team) = matchup.team(slot) else {
            continue;
          };
          let feeder_position = matchup.position * 2 - 1 + slot.index() as u32;
          let feeder = self
            .index_at(matchup.round - 1, feeder_position)
            .map(|feeder_idx| &self.matchups[feeder_idx]);
          let fed = feeder.map(|f| f.is_completed && f.winner_id == Some(team)).unwrap_or(false);
          if !fed {
            return Err(EngineError::malformed(format!(
              "matchup {} holds team {} but its feeding matchup (round {}, position {}) did not send it",
              matchup.id,
              team,
              matchup.round - 1,
              feeder_position
            )));
          }
        }
      }
    }
    Ok(())
  }

  pub fn matchups(&self) -> &[Matchup] {
    &self.matchups
  }

  pub fn len(&self) -> usize {
    self.matchups.len()
  }

  pub fn is_empty(&self) -> bool {
    self.matchups.is_empty()
  }

  pub fn round_count(&self) -> usize {
    self.rounds.len()
  }

  /// Arena indices per round, each ordered by position.
  pub fn round_indices(&self) -> &[Vec<usize>] {
    &self.rounds
  }

  /// Matchups of `round` ordered by position; empty for unknown rounds.
  pub fn round(&self, round: u32) -> impl Iterator<Item = &Matchup> + '_ {
    self
      .rounds
      .get((round as usize).wrapping_sub(1))
      .into_iter()
      .flatten()
      .map(move |idx| &self.matchups[*idx])
  }

  pub fn get(&self, id: MatchupId) -> Option<&Matchup> {
    self.index.get(&id).map(|idx| &self.matchups[*idx])
  }

  pub fn index_of(&self, id: MatchupId) -> Option<usize> {
    self.index.get(&id).copied()
  }

  pub fn index_at(&self, round: u32, position: u32) -> Option<usize> {
    if round == 0 || position == 0 {
      return None;
    }
    self
      .rounds
      .get(round as usize - 1)?
      .get(position as usize - 1)
      .copied()
  }

  /// Arena index and slot receiving the winner of the matchup at `idx`; `None` for the final.
  pub fn next_slot_of(&self, idx: usize) -> Option<(usize, Slot)> {
    let matchup = self.matchups.get(idx)?;
    let next_position = (matchup.position + 1) / 2;
    self
      .index_at(matchup.round + 1, next_position)
      .map(|next_idx| (next_idx, Slot::for_position(matchup.position)))
  }

  pub fn champion(&self) -> Option<TeamId> {
    let final_idx = *self.rounds.last()?.first()?;
    self.matchups[final_idx].winner_id
  }

  /// Losers of every completed series.
  pub fn eliminated_teams(&self) -> HashSet<TeamId> {
    self
      .matchups
      .iter()
      .filter(|m| m.is_completed)
      .filter_map(|m| {
        let winner_slot = m.winner_id.and_then(|winner| m.slot_of(winner))?;
        m.team(winner_slot.other())
      })
      .collect()
  }

  pub fn is_eliminated(&self, team: TeamId) -> bool {
    self.eliminated_teams().contains(&team)
  }

  /// Recomputes every per-appearance elimination flag from completed series.
  pub fn refresh_eliminations(&mut self) {
    let eliminated = self.eliminated_teams();
    for matchup in &mut self.matchups {
      matchup.team1_eliminated = matchup.team1_id.map(|t| eliminated.contains(&t)).unwrap_or(false);
      matchup.team2_eliminated = matchup.team2_id.map(|t| eliminated.contains(&t)).unwrap_or(false);
    }
  }

  /// Flags (or clears) `team` on every bracket appearance, in both slots.
  pub(crate) fn mark_team_eliminated(&mut self, team: TeamId, eliminated: bool) {
    for matchup in &mut self.matchups {
      if let Some(slot) = matchup.slot_of(team) {
        matchup.set_eliminated(slot, eliminated);
      }
    }
  }

  pub(crate) fn matchup_mut(&mut self, idx: usize) -> &mut Matchup {
    &mut self.matchups[idx]
  }

  pub(crate) fn matchup_at(&self, idx: usize) -> &Matchup {
    &self.matchups[idx]
  }
}

fn check_matchup(matchup: &Matchup) -> Result<(), EngineError> {
  if matchup.score1 > GAMES_TO_WIN || matchup.score2 > GAMES_TO_WIN {
    return Err(EngineError::corrupt(
      matchup.id,
      format!("scores {}-{} exceed {GAMES_TO_WIN}", matchup.score1, matchup.score2),
    ));
  }
  if matchup.score1 == GAMES_TO_WIN && matchup.score2 == GAMES_TO_WIN {
    return Err(EngineError::corrupt(matchup.id, "both scores are 4"));
  }
  match matchup.decided_slot(GAMES_TO_WIN) {
    Some(slot) => {
      let Some(winner) = matchup.team(slot) else {
        return Err(EngineError::corrupt(matchup.id, "winning slot has no team"));
      };
      if !matchup.is_completed || matchup.winner_id != Some(winner) {
        return Err(EngineError::corrupt(
          matchup.id,
          "completion state disagrees with the series score",
        ));
      }
    }
    None => {
      if matchup.is_completed || matchup.winner_id.is_some() {
        return Err(EngineError::corrupt(
          matchup.id,
          "marked completed without a series win",
        ));
      }
    }
  }
  Ok(())
}

use rand::Rng;
use std::collections::HashMap;

use crate::bracket::{BracketTree, GAMES_TO_WIN};
use crate::error::EngineError;
use crate::series::simulate_series;
use crate::types::{Matchup, Slot, TeamId};

/// Games won per team.
pub type TeamWins = HashMap<TeamId, u32>;

/// Credits every recorded game to the team holding that slot.
pub fn tally_recorded_wins(matchups: &[Matchup]) -> TeamWins {
  let mut wins = TeamWins::new();
  for matchup in matchups {
    for slot in [Slot::Team1, Slot::Team2] {
      if let Some(team) = matchup.team(slot) {
        *wins.entry(team).or_insert(0) += matchup.score(slot) as u32;
      }
    }
  }
  wins
}

/// Plays one full tournament from the current bracket state.
///
/// Recorded games are credited verbatim, decided series keep their winner, and
/// open series are finished by [`simulate_series`]. Winners are written into a
/// private copy of the matchups round by round; `bracket` is left untouched.
pub fn simulate_tournament<R: Rng + ?Sized>(
  bracket: &BracketTree,
  rng: &mut R,
) -> Result<TeamWins, EngineError> {
  let mut working: Vec<Matchup> = bracket.matchups().to_vec();
  let mut wins = tally_recorded_wins(&working);

  for round in bracket.round_indices() {
    let mut advanced: Vec<(usize, TeamId)> = Vec::with_capacity(round.len());
    for idx in round {
      let matchup = &working[*idx];
      let (Some(team1), Some(team2)) = (matchup.team1_id, matchup.team2_id) else {
        continue;
      };
      let winner = match matchup.decided_slot(GAMES_TO_WIN) {
        Some(Slot::Team1) => team1,
        Some(Slot::Team2) => team2,
        None => {
          let outcome = simulate_series(
            rng,
            matchup.id,
            [team1, team2],
            [matchup.score1, matchup.score2],
          )?;
          *wins.entry(team1).or_insert(0) += outcome.added[0] as u32;
          *wins.entry(team2).or_insert(0) += outcome.added[1] as u32;
          outcome.winner
        }
      };
      advanced.push((*idx, winner));
    }

    for (idx, winner) in advanced {
      if let Some((next_idx, slot)) = bracket.next_slot_of(idx) {
        working[next_idx].set_team(slot, Some(winner));
      }
    }
  }

  Ok(wins)
}

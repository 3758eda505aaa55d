use rand::Rng;

use crate::bracket::GAMES_TO_WIN;
use crate::error::EngineError;
use crate::types::{MatchupId, Slot, TeamId};

/// Result of playing out the rest of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesOutcome {
  pub winner: TeamId,
  pub winner_slot: Slot,
  /// Wins simulated beyond the starting counts, per slot.
  pub added: [u8; 2],
}

/// Plays the unresolved remainder of a best-of-seven series with a fair coin per game.
///
/// `scores` are the real wins so far and must both be below the clinching count;
/// only the simulated games are reported in `added`.
pub fn simulate_series<R: Rng + ?Sized>(
  rng: &mut R,
  matchup_id: MatchupId,
  teams: [TeamId; 2],
  scores: [u8; 2],
) -> Result<SeriesOutcome, EngineError> {
  if scores.iter().any(|score| *score >= GAMES_TO_WIN) {
    return Err(EngineError::corrupt(
      matchup_id,
      format!("cannot simulate a series already at {}-{}", scores[0], scores[1]),
    ));
  }

  let mut wins = scores;
  while wins[0] < GAMES_TO_WIN && wins[1] < GAMES_TO_WIN {
    let side = if rng.gen_bool(0.5) { 0 } else { 1 };
    wins[side] += 1;
  }

  let winner_slot = if wins[0] == GAMES_TO_WIN { Slot::Team1 } else { Slot::Team2 };
  Ok(SeriesOutcome {
    winner: teams[winner_slot.index()],
    winner_slot,
    added: [wins[0] - scores[0], wins[1] - scores[1]],
  })
}

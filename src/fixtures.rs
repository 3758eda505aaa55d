//! Shared bracket fixtures for unit tests.

use crate::bracket::BracketTree;
use crate::scoring::ConfidenceTable;
use crate::types::{ConfidenceRating, Matchup, Participant};

/// Eight teams, seeds as ids: 1v8, 4v5, 3v6, 2v7; later rounds empty.
pub fn eight_team_matchups() -> Vec<Matchup> {
  vec![
    Matchup::new(1, 1, 1).with_teams(1, 8),
    Matchup::new(2, 1, 2).with_teams(4, 5),
    Matchup::new(3, 1, 3).with_teams(3, 6),
    Matchup::new(4, 1, 4).with_teams(2, 7),
    Matchup::new(5, 2, 1),
    Matchup::new(6, 2, 2),
    Matchup::new(7, 3, 1),
  ]
}

/// Records a finished series; the side at 4 wins.
pub fn finish(matchup: &mut Matchup, score1: u8, score2: u8) {
  matchup.score1 = score1;
  matchup.score2 = score2;
  matchup.is_completed = true;
  matchup.winner_id = if score1 == 4 { matchup.team1_id } else { matchup.team2_id };
}

/// Every series played; team 1 wins the final 4-3 over team 2.
pub fn decided_bracket() -> BracketTree {
  let mut matchups = eight_team_matchups();
  finish(&mut matchups[0], 4, 0);
  finish(&mut matchups[1], 4, 3);
  finish(&mut matchups[2], 4, 2);
  finish(&mut matchups[3], 4, 1);
  matchups[4].team1_id = Some(1);
  matchups[4].team2_id = Some(4);
  matchups[5].team1_id = Some(3);
  matchups[5].team2_id = Some(2);
  finish(&mut matchups[4], 4, 2);
  finish(&mut matchups[5], 1, 4);
  matchups[6].team1_id = Some(1);
  matchups[6].team2_id = Some(2);
  finish(&mut matchups[6], 4, 3);
  BracketTree::new(matchups).expect("fixture bracket is valid")
}

pub fn open_bracket() -> BracketTree {
  BracketTree::new(eight_team_matchups()).expect("fixture bracket is valid")
}

/// Single series, team 10 vs team 20, feeding nothing.
pub fn single_series(score1: u8, score2: u8) -> BracketTree {
  let mut matchup = Matchup::new(1, 1, 1).with_teams(10, 20).with_scores(score1, score2);
  if score1 == 4 || score2 == 4 {
    matchup.is_completed = true;
    matchup.winner_id = if score1 == 4 { Some(10) } else { Some(20) };
  }
  BracketTree::new(vec![matchup]).expect("fixture series is valid")
}

pub fn participant(id: &str, name: &str) -> Participant {
  Participant {
    id: id.to_string(),
    name: name.to_string(),
  }
}

pub fn rating(participant_id: &str, team_id: u32, rating: u32) -> ConfidenceRating {
  ConfidenceRating {
    participant_id: participant_id.to_string(),
    team_id,
    rating,
  }
}

pub fn table(participants: &[Participant], ratings: &[ConfidenceRating]) -> ConfidenceTable {
  ConfidenceTable::from_ratings(participants, ratings)
}

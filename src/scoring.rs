use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;

use crate::bracket::BracketTree;
use crate::propagate::{tally_recorded_wins, TeamWins};
use crate::types::{
    ConfidenceRating, Participant, ParticipantId, TeamId, MAX_CONFIDENCE, MIN_CONFIDENCE,
};

/// One participant's confidence weights keyed by team.
pub type TeamWeights = HashMap<TeamId, u32>;

/// Confidence weights for every known participant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfidenceTable {
    weights: HashMap<ParticipantId, TeamWeights>,
}

impl ConfidenceTable {
    /// Folds flat rating rows into per-participant weights.
    ///
    /// Every participant gets an entry, even without ratings. Rows for unknown
    /// participants are dropped silently; out-of-range ratings are dropped with a warning.
    pub fn from_ratings(participants: &[Participant], ratings: &[ConfidenceRating]) -> Self {
        let mut weights: HashMap<ParticipantId, TeamWeights> = participants
            .iter()
            .map(|p| (p.id.clone(), TeamWeights::new()))
            .collect();

        for row in ratings {
            let Some(entry) = weights.get_mut(&row.participant_id) else {
                continue;
            };
            if !(MIN_CONFIDENCE..=MAX_CONFIDENCE).contains(&row.rating) {
                warn!(
                    "Ignoring rating {} for participant {} on team {}: outside {}..={}",
                    row.rating, row.participant_id, row.team_id, MIN_CONFIDENCE, MAX_CONFIDENCE
                );
                continue;
            }
            entry.insert(row.team_id, row.rating);
        }

        ConfidenceTable { weights }
    }

    pub fn weights_for(&self, participant_id: &str) -> Option<&TeamWeights> {
        self.weights.get(participant_id)
    }

    pub fn weight(&self, participant_id: &str, team: TeamId) -> u32 {
        self.weights_for(participant_id)
            .and_then(|w| w.get(&team).copied())
            .unwrap_or(0)
    }
}

/// Leaderboard row.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantScore {
    #[serde(rename = "id")]
    pub participant_id: ParticipantId,
    pub name: String,
    pub score: u64,
}

/// Σ weight × wins over teams with a nonzero tally; unrated teams contribute nothing.
pub fn participant_score(wins: &TeamWins, weights: Option<&TeamWeights>) -> u64 {
    let Some(weights) = weights else {
        return 0;
    };
    wins.iter()
        .filter(|(_, w)| **w > 0)
        .map(|(team, w)| weights.get(team).copied().unwrap_or(0) as u64 * *w as u64)
        .sum()
}

/// Scores in participant order.
pub fn score_all(wins: &TeamWins, participants: &[Participant], table: &ConfidenceTable) -> Vec<u64> {
    participants
        .iter()
        .map(|p| participant_score(wins, table.weights_for(&p.id)))
        .collect()
}

/// Indices of every participant tied at the maximum score, each with an equal share of one.
pub fn leader_shares(scores: &[u64]) -> Vec<(usize, f64)> {
    let Some(max) = scores.iter().copied().max() else {
        return Vec::new();
    };
    let leaders: Vec<usize> = scores
        .iter()
        .enumerate()
        .filter(|(_, score)| **score == max)
        .map(|(idx, _)| idx)
        .collect();
    let share = 1.0 / leaders.len() as f64;
    leaders.into_iter().map(|idx| (idx, share)).collect()
}

/// Wins already recorded in the bracket.
pub fn tally_actual_wins(bracket: &BracketTree) -> TeamWins {
    tally_recorded_wins(bracket.matchups())
}

/// Live leaderboard, highest score first; ties keep participant order.
pub fn compute_scores(
    bracket: &BracketTree,
    participants: &[Participant],
    table: &ConfidenceTable,
) -> Vec<ParticipantScore> {
    let wins = tally_actual_wins(bracket);
    let mut rows: Vec<ParticipantScore> = participants
        .iter()
        .zip(score_all(&wins, participants, table))
        .map(|(p, score)| ParticipantScore {
            participant_id: p.id.clone(),
            name: p.name.clone(),
            score,
        })
        .collect();
    rows.sort_by(|a, b| b.score.cmp(&a.score));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{eight_team_matchups, participant, rating, table};

    fn two_wins_each() -> BracketTree {
        let mut matchups = eight_team_matchups();
        matchups[0].score1 = 2;
        matchups[0].score2 = 1;
        matchups[1].score1 = 2;
        BracketTree::new(matchups).unwrap()
    }

    #[test]
    fn test_table_ignores_unknown_and_out_of_range() {
        let people = vec![participant("1", "Ann"), participant("2", "Bo")];
        let t = table(
            &people,
            &[
                rating("1", 1, 7),
                rating("1", 4, 11),
                rating("9", 1, 3),
                rating("2", 4, 0),
            ],
        );
        assert_eq!(t.weight("1", 1), 7);
        assert_eq!(t.weight("1", 4), 0);
        assert_eq!(t.weight("2", 4), 0);
        assert!(t.weights_for("2").unwrap().is_empty());
        assert!(t.weights_for("9").is_none());
    }

    #[test]
    fn test_disjoint_weights_score_weight_times_wins() {
        let people = vec![participant("1", "Ann"), participant("2", "Bo")];
        let t = table(&people, &[rating("1", 1, 3), rating("2", 4, 5)]);
        let scores = compute_scores(&two_wins_each(), &people, &t);
        assert_eq!(scores[0].participant_id, "2");
        assert_eq!(scores[0].score, 10);
        assert_eq!(scores[1].score, 6);
    }

    #[test]
    fn test_equal_products_split_the_lead() {
        let people = vec![participant("1", "Ann"), participant("2", "Bo")];
        let t = table(&people, &[rating("1", 1, 4), rating("2", 4, 4)]);
        let wins = tally_actual_wins(&two_wins_each());
        let scores = score_all(&wins, &people, &t);
        assert_eq!(scores, vec![8, 8]);
        assert_eq!(leader_shares(&scores), vec![(0, 0.5), (1, 0.5)]);
    }

    #[test]
    fn test_leader_shares_sum_to_one() {
        assert_eq!(leader_shares(&[3, 9, 1]), vec![(1, 1.0)]);
        let shares = leader_shares(&[0, 0, 0]);
        let total: f64 = shares.iter().map(|(_, s)| s).sum();
        assert_eq!(shares.len(), 3);
        assert!((total - 1.0).abs() < 1e-12);
        assert!(leader_shares(&[]).is_empty());
    }

    #[test]
    fn test_ties_keep_participant_order() {
        let people = vec![
            participant("1", "Ann"),
            participant("2", "Bo"),
            participant("3", "Cy"),
        ];
        let t = table(&people, &[rating("3", 1, 1)]);
        let ids: Vec<String> = compute_scores(&two_wins_each(), &people, &t)
            .into_iter()
            .map(|row| row.participant_id)
            .collect();
        assert_eq!(ids, vec!["3", "1", "2"]);
    }

    #[test]
    fn test_participant_without_ratings_scores_zero() {
        let people = vec![participant("1", "Ann"), participant("2", "Bo")];
        let t = table(&people, &[rating("1", 1, 2)]);
        let rows = compute_scores(&two_wins_each(), &people, &t);
        let scores: Vec<(&str, u64)> = rows
            .iter()
            .map(|row| (row.participant_id.as_str(), row.score))
            .collect();
        assert_eq!(scores, vec![("1", 4), ("2", 0)]);
    }
}

use rand::rngs::SmallRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Instant;
use tracing::debug;

use crate::bracket::{BracketTree, GAMES_TO_WIN};
use crate::error::EngineError;
use crate::mutator::{decrement, increment};
use crate::propagate::simulate_tournament;
use crate::scoring::{leader_shares, score_all, ConfidenceTable};
use crate::types::{
    MatchupId, Participant, ParticipantId, TeamId, AUTHORITATIVE_TRIALS, INTERACTIVE_TRIALS,
};

/// Number of Monte Carlo trials for one estimation; always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrialBudget(usize);

impl TrialBudget {
    pub const AUTHORITATIVE: TrialBudget = TrialBudget(AUTHORITATIVE_TRIALS);
    pub const INTERACTIVE: TrialBudget = TrialBudget(INTERACTIVE_TRIALS);

    pub fn new(trials: i64) -> Result<Self, EngineError> {
        if trials <= 0 {
            return Err(EngineError::InvalidTrialCount(trials));
        }
        Ok(TrialBudget(trials as usize))
    }

    /// Caller-requested budget, rejected when it exceeds `limit`.
    pub fn at_most(trials: i64, limit: TrialBudget) -> Result<Self, EngineError> {
        let budget = TrialBudget::new(trials)?;
        if budget.0 > limit.0 {
            return Err(EngineError::TrialCountAboveLimit {
                requested: trials,
                limit: limit.0,
            });
        }
        Ok(budget)
    }

    pub fn get(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantOdds {
    #[serde(rename = "familyMemberId")]
    pub participant_id: ParticipantId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Rounded for display.
    pub odds: f64,
    /// Unrounded share of trials led, in percent.
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OddsReport {
    pub trials: usize,
    pub odds: Vec<ParticipantOdds>,
}

impl OddsReport {
    pub fn without_names(mut self) -> Self {
        for row in &mut self.odds {
            row.name = None;
        }
        self
    }

    pub fn for_participant(&self, participant_id: &str) -> Option<&ParticipantOdds> {
        self.odds.iter().find(|row| row.participant_id == participant_id)
    }
}

/// Below 10% keep one decimal place, otherwise round to a whole percent.
pub fn display_percentage(percentage: f64) -> f64 {
    if percentage < 10.0 {
        (percentage * 10.0).round() / 10.0
    } else {
        percentage.round()
    }
}

/// Estimates each participant's chance of finishing with the top score.
pub fn compute_odds(
    bracket: &BracketTree,
    participants: &[Participant],
    table: &ConfidenceTable,
    budget: TrialBudget,
) -> Result<OddsReport, EngineError> {
    compute_odds_seeded(bracket, participants, table, budget, rand::random())
}

/// Same as [`compute_odds`], with trial `i` seeded from `seed + i`.
pub fn compute_odds_seeded(
    bracket: &BracketTree,
    participants: &[Participant],
    table: &ConfidenceTable,
    budget: TrialBudget,
    seed: u64,
) -> Result<OddsReport, EngineError> {
    let start = Instant::now();
    let width = participants.len();

    let shares = (0..budget.get())
        .into_par_iter()
        .try_fold(
            || vec![0.0f64; width],
            |mut acc, i| {
                let mut rng = SmallRng::seed_from_u64(seed.wrapping_add(i as u64));
                let wins = simulate_tournament(bracket, &mut rng)?;
                let scores = score_all(&wins, participants, table);
                for (idx, share) in leader_shares(&scores) {
                    acc[idx] += share;
                }
                Ok::<_, EngineError>(acc)
            },
        )
        .try_reduce(
            || vec![0.0f64; width],
            |mut left, right| {
                for (l, r) in left.iter_mut().zip(right) {
                    *l += r;
                }
                Ok(left)
            },
        )?;

    let trials = budget.get() as f64;
    let odds = participants
        .iter()
        .zip(shares)
        .map(|(participant, share)| {
            let percentage = 100.0 * share / trials;
            ParticipantOdds {
                participant_id: participant.id.clone(),
                name: Some(participant.name.clone()),
                odds: display_percentage(percentage),
                percentage,
            }
        })
        .collect();

    debug!(
        "Odds over {} trials for {} participants took {} ms",
        budget.get(),
        width,
        start.elapsed().as_millis()
    );
    Ok(OddsReport {
        trials: budget.get(),
        odds,
    })
}

/// Copy of `bracket` with `winner_id` forced to win matchup `matchup_id`.
///
/// Returns `None` when the matchup is unknown or `winner_id` is not playing in it.
pub fn what_if_bracket(
    bracket: &BracketTree,
    matchup_id: MatchupId,
    winner_id: TeamId,
) -> Option<BracketTree> {
    let matchup = bracket.get(matchup_id)?;
    if !matchup.has_both_teams() {
        return None;
    }
    let slot = matchup.slot_of(winner_id)?;
    if matchup.winner_id == Some(winner_id) {
        return Some(bracket.clone());
    }

    let mut forced = bracket.clone();
    if matchup.is_completed {
        decrement(&mut forced, matchup_id, slot.other());
    }
    for _ in 0..GAMES_TO_WIN {
        if !increment(&mut forced, matchup_id, slot) {
            break;
        }
    }
    Some(forced)
}

/// Memoized what-if reports keyed by `(matchup, forced winner)`.
///
/// Entries belong to one committed-bracket generation; moving to another
/// generation drops them.
#[derive(Debug, Default)]
pub struct WhatIfCache {
    generation: u64,
    reports: HashMap<(MatchupId, TeamId), OddsReport>,
}

impl WhatIfCache {
    pub fn sync(&mut self, generation: u64) {
        if self.generation != generation {
            self.reports.clear();
            self.generation = generation;
        }
    }

    pub fn lookup(
        &mut self,
        generation: u64,
        matchup_id: MatchupId,
        winner_id: TeamId,
    ) -> Option<OddsReport> {
        self.sync(generation);
        self.reports.get(&(matchup_id, winner_id)).cloned()
    }

    /// Stores a report computed against `generation`; stale reports are discarded.
    pub fn store(
        &mut self,
        generation: u64,
        matchup_id: MatchupId,
        winner_id: TeamId,
        report: OddsReport,
    ) {
        if generation == self.generation {
            self.reports.insert((matchup_id, winner_id), report);
        }
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}

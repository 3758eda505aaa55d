use serde::{Deserialize, Deserializer, Serialize};
use std::sync::{Arc, Mutex};

use crate::mutator::BracketDraft;
use crate::odds::WhatIfCache;

// ── Constants ──────────────────────────────────────────────────────────

pub const SERIES_BEST_OF: u8 = 7;
pub const AUTHORITATIVE_TRIALS: usize = 100_000;
pub const INTERACTIVE_TRIALS: usize = 10_000;
pub const MIN_CONFIDENCE: u32 = 1;
pub const MAX_CONFIDENCE: u32 = 10;
pub const DEFAULT_CONFIDENCE: u32 = 5;

pub type TeamId = u32;
pub type MatchupId = u32;
pub type ParticipantId = String;

// ── Shared state type aliases ──────────────────────────────────────────

pub type SharedDraftSession = Arc<Mutex<DraftSession>>;

/// Interactive editing state held by the server between requests.
#[derive(Default)]
pub struct DraftSession {
    /// Lazily created from the committed bracket on first use.
    pub draft: Option<BracketDraft>,
    /// Bumped every time the committed bracket changes.
    pub generation: u64,
    pub what_if: WhatIfCache,
}

// ── Bracket domain types ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Slot {
    Team1,
    Team2,
}

impl Slot {
    pub fn index(self) -> usize {
        match self {
            Slot::Team1 => 0,
            Slot::Team2 => 1,
        }
    }

    pub fn other(self) -> Slot {
        match self {
            Slot::Team1 => Slot::Team2,
            Slot::Team2 => Slot::Team1,
        }
    }

    /// Slot a winner from `position` occupies in the next round.
    pub fn for_position(position: u32) -> Slot {
        if position % 2 == 1 {
            Slot::Team1
        } else {
            Slot::Team2
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub conference: String,
    pub division: String,
    pub seed: u32,
    #[serde(default)]
    pub is_eliminated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Matchup {
    pub id: MatchupId,
    pub round: u32,
    pub position: u32,
    pub team1_id: Option<TeamId>,
    pub team2_id: Option<TeamId>,
    #[serde(default, deserialize_with = "nullable_score")]
    pub score1: u8,
    #[serde(default, deserialize_with = "nullable_score")]
    pub score2: u8,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub winner_id: Option<TeamId>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub team1_eliminated: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub team2_eliminated: bool,
}

impl Matchup {
    pub fn new(id: MatchupId, round: u32, position: u32) -> Self {
        Matchup {
            id,
            round,
            position,
            team1_id: None,
            team2_id: None,
            score1: 0,
            score2: 0,
            is_completed: false,
            winner_id: None,
            team1_eliminated: false,
            team2_eliminated: false,
        }
    }

    pub fn with_teams(mut self, team1: TeamId, team2: TeamId) -> Self {
        self.team1_id = Some(team1);
        self.team2_id = Some(team2);
        self
    }

    pub fn with_scores(mut self, score1: u8, score2: u8) -> Self {
        self.score1 = score1;
        self.score2 = score2;
        self
    }

    pub fn team(&self, slot: Slot) -> Option<TeamId> {
        match slot {
            Slot::Team1 => self.team1_id,
            Slot::Team2 => self.team2_id,
        }
    }

    pub fn set_team(&mut self, slot: Slot, team: Option<TeamId>) {
        match slot {
            Slot::Team1 => self.team1_id = team,
            Slot::Team2 => self.team2_id = team,
        }
    }

    pub fn score(&self, slot: Slot) -> u8 {
        match slot {
            Slot::Team1 => self.score1,
            Slot::Team2 => self.score2,
        }
    }

    pub fn set_score(&mut self, slot: Slot, score: u8) {
        match slot {
            Slot::Team1 => self.score1 = score,
            Slot::Team2 => self.score2 = score,
        }
    }

    pub fn set_eliminated(&mut self, slot: Slot, eliminated: bool) {
        match slot {
            Slot::Team1 => self.team1_eliminated = eliminated,
            Slot::Team2 => self.team2_eliminated = eliminated,
        }
    }

    pub fn slot_of(&self, team: TeamId) -> Option<Slot> {
        if self.team1_id == Some(team) {
            Some(Slot::Team1)
        } else if self.team2_id == Some(team) {
            Some(Slot::Team2)
        } else {
            None
        }
    }

    pub fn has_both_teams(&self) -> bool {
        self.team1_id.is_some() && self.team2_id.is_some()
    }

    /// Side holding the series-clinching score, if any.
    pub fn decided_slot(&self, games_to_win: u8) -> Option<Slot> {
        if self.score1 >= games_to_win {
            Some(Slot::Team1)
        } else if self.score2 >= games_to_win {
            Some(Slot::Team2)
        } else {
            None
        }
    }
}

fn nullable_score<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u8>::deserialize(deserializer)?.unwrap_or(0))
}

fn is_false(value: &bool) -> bool {
    !*value
}

// ── Pool domain types ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceRating {
    #[serde(rename = "familyMemberId")]
    pub participant_id: ParticipantId,
    pub team_id: TeamId,
    pub rating: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Live,
    Upcoming,
    Final,
}

impl GameStatus {
    /// Parses the schedule filter used by the transport; "completed" is an alias for final.
    pub fn from_filter(raw: &str) -> Option<GameStatus> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "live" => Some(GameStatus::Live),
            "upcoming" => Some(GameStatus::Upcoming),
            "final" | "completed" => Some(GameStatus::Final),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub id: u32,
    pub home_team_id: TeamId,
    pub away_team_id: TeamId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub away_score: Option<u32>,
    pub status: GameStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_remaining: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

// ── Config types ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub data_dir: String,
    pub static_dir: String,
    pub log_dir: String,
    pub bind_addr: String,
    pub authoritative_trials: i64,
    pub interactive_trials: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: String::new(),
            static_dir: String::new(),
            log_dir: String::new(),
            bind_addr: String::new(),
            authoritative_trials: AUTHORITATIVE_TRIALS as i64,
            interactive_trials: INTERACTIVE_TRIALS as i64,
        }
    }
}

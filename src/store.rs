use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};
use tracing::info;

use crate::bracket::BracketTree;
use crate::mutator::BracketStore;
use crate::participants;
use crate::scoring::ConfidenceTable;
use crate::types::{ConfidenceRating, Game, Matchup, Participant, Team};

pub const TEAMS_FILE: &str = "teams.json";
pub const PARTICIPANTS_FILE: &str = "family-members.json";
pub const RATINGS_FILE: &str = "confidence-ratings.json";
pub const MATCHUPS_FILE: &str = "bracket-matchups.json";
pub const GAMES_FILE: &str = "games.json";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Flat-file JSON store: one array per file inside `dir`.
#[derive(Debug, Clone)]
pub struct DataStore {
  dir: PathBuf,
}

impl DataStore {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    DataStore { dir: dir.into() }
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  /// Reads a JSON array; a missing file is an empty list.
  fn read_list<T: DeserializeOwned>(&self, file: &str) -> Result<Vec<T>, String> {
    let path = self.dir.join(file);
    if !path.is_file() {
      return Ok(Vec::new());
    }
    let data = fs::read_to_string(&path).map_err(|e| format!("read {}: {e}", path.display()))?;
    serde_json::from_str::<Vec<T>>(&data).map_err(|e| format!("parse {}: {e}", path.display()))
  }

  /// Writes a JSON array through a sibling temp file so readers never see a partial file.
  fn write_list<T: Serialize>(&self, file: &str, rows: &[T]) -> Result<(), String> {
    fs::create_dir_all(&self.dir).map_err(|e| format!("create {}: {e}", self.dir.display()))?;
    let path = self.dir.join(file);
    let payload = serde_json::to_string_pretty(rows).map_err(|e| e.to_string())?;
    let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp = self.dir.join(format!(".{file}.{}.{n}.tmp", std::process::id()));
    fs::write(&tmp, payload).map_err(|e| format!("write {}: {e}", tmp.display()))?;
    fs::rename(&tmp, &path).map_err(|e| {
      let _ = fs::remove_file(&tmp);
      format!("replace {}: {e}", path.display())
    })
  }

  pub fn load_teams(&self) -> Result<Vec<Team>, String> {
    self.read_list(TEAMS_FILE)
  }

  pub fn load_participants(&self) -> Result<Vec<Participant>, String> {
    self.read_list(PARTICIPANTS_FILE)
  }

  pub fn load_ratings(&self) -> Result<Vec<ConfidenceRating>, String> {
    self.read_list(RATINGS_FILE)
  }

  pub fn load_matchups(&self) -> Result<Vec<Matchup>, String> {
    self.read_list(MATCHUPS_FILE)
  }

  pub fn load_games(&self) -> Result<Vec<Game>, String> {
    self.read_list(GAMES_FILE)
  }

  /// Committed bracket, validated.
  pub fn load_bracket(&self) -> Result<BracketTree, String> {
    let matchups = self.load_matchups()?;
    BracketTree::new(matchups).map_err(|e| format!("load bracket {}: {e}", self.dir.join(MATCHUPS_FILE).display()))
  }

  /// Participants in file order plus their folded confidence weights.
  pub fn load_pool(&self) -> Result<(Vec<Participant>, ConfidenceTable), String> {
    let participants = self.load_participants()?;
    let ratings = self.load_ratings()?;
    let table = ConfidenceTable::from_ratings(&participants, &ratings);
    Ok((participants, table))
  }

  pub fn save_matchups(&self, matchups: &[Matchup]) -> Result<(), String> {
    self.write_list(MATCHUPS_FILE, matchups)?;
    info!("Saved {} bracket matchups", matchups.len());
    Ok(())
  }

  /// Creates a participant with the default weight on every team.
  pub fn add_participant(&self, name: &str) -> Result<Participant, String> {
    let mut roster = self.load_participants()?;
    let participant = participants::new_participant(&roster, name)?;
    roster.push(participant.clone());
    self.write_list(PARTICIPANTS_FILE, &roster)?;

    let teams = self.load_teams()?;
    let mut ratings = self.load_ratings()?;
    ratings.extend(participants::default_ratings(&participant.id, &teams));
    self.write_list(RATINGS_FILE, &ratings)?;

    info!("Added participant {} ({})", participant.id, participant.name);
    Ok(participant)
  }

  /// Removes the participant and every rating they own. Returns whether they existed.
  pub fn remove_participant(&self, id: &str) -> Result<bool, String> {
    let mut roster = self.load_participants()?;
    let before = roster.len();
    roster.retain(|p| p.id != id);
    let removed = roster.len() != before;
    self.write_list(PARTICIPANTS_FILE, &roster)?;
    self.remove_ratings_for(id)?;
    if removed {
      info!("Removed participant {id}");
    }
    Ok(removed)
  }

  pub fn upsert_rating(&self, rating: ConfidenceRating) -> Result<(), String> {
    let mut ratings = self.load_ratings()?;
    participants::upsert_rating(&mut ratings, rating);
    self.write_list(RATINGS_FILE, &ratings)
  }

  pub fn remove_ratings_for(&self, participant_id: &str) -> Result<usize, String> {
    let mut ratings = self.load_ratings()?;
    let removed = participants::remove_ratings_for(&mut ratings, participant_id);
    if removed > 0 {
      self.write_list(RATINGS_FILE, &ratings)?;
    }
    Ok(removed)
  }
}

impl BracketStore for DataStore {
  fn save_bracket(&self, matchups: &[Matchup]) -> Result<(), String> {
    self.save_matchups(matchups)
  }
}

use crate::types::{
    ConfidenceRating, Participant, ParticipantId, Team, TeamId, DEFAULT_CONFIDENCE,
    MAX_CONFIDENCE, MIN_CONFIDENCE,
};

/// One past the highest numeric participant id; non-numeric ids are skipped.
pub fn next_participant_id(participants: &[Participant]) -> ParticipantId {
    let max = participants
        .iter()
        .filter_map(|p| p.id.trim().parse::<u64>().ok())
        .max()
        .unwrap_or(0);
    (max + 1).to_string()
}

/// Builds a participant from a display name, assigning the next free id.
pub fn new_participant(participants: &[Participant], name: &str) -> Result<Participant, String> {
    let name = name.trim();
    if name.is_empty() {
        return Err("Name is required and must be a string.".to_string());
    }
    Ok(Participant {
        id: next_participant_id(participants),
        name: name.to_string(),
    })
}

/// Starting weight of 5 on every team for a new participant.
pub fn default_ratings(participant_id: &str, teams: &[Team]) -> Vec<ConfidenceRating> {
    teams
        .iter()
        .map(|team| ConfidenceRating {
            participant_id: participant_id.to_string(),
            team_id: team.id,
            rating: DEFAULT_CONFIDENCE,
        })
        .collect()
}

pub fn validate_rating(rating: i64) -> Result<u32, String> {
    if rating < MIN_CONFIDENCE as i64 || rating > MAX_CONFIDENCE as i64 {
        return Err(format!(
            "Rating must be a number between {} and {}, got {}.",
            MIN_CONFIDENCE, MAX_CONFIDENCE, rating
        ));
    }
    Ok(rating as u32)
}

/// Replaces the participant's rating for the team, or appends a new row.
pub fn upsert_rating(ratings: &mut Vec<ConfidenceRating>, update: ConfidenceRating) {
    match ratings
        .iter_mut()
        .find(|r| r.participant_id == update.participant_id && r.team_id == update.team_id)
    {
        Some(existing) => existing.rating = update.rating,
        None => ratings.push(update),
    }
}

pub fn ratings_for_team(ratings: &[ConfidenceRating], team_id: TeamId) -> Vec<ConfidenceRating> {
    ratings.iter().filter(|r| r.team_id == team_id).cloned().collect()
}

pub fn ratings_for_participant(
    ratings: &[ConfidenceRating],
    participant_id: &str,
) -> Vec<ConfidenceRating> {
    ratings
        .iter()
        .filter(|r| r.participant_id == participant_id)
        .cloned()
        .collect()
}

/// Drops every rating row owned by the participant; returns how many were removed.
pub fn remove_ratings_for(ratings: &mut Vec<ConfidenceRating>, participant_id: &str) -> usize {
    let before = ratings.len();
    ratings.retain(|r| r.participant_id != participant_id);
    before - ratings.len()
}

use crate::error::{TournamentError, TournamentResult};
use crate::types::{Notice, MIN_PARTICIPANTS, SAMPLE_PARTICIPANT_COUNT};

/// One name per line, trimmed, blank lines dropped. Duplicates are kept.
pub fn parse_participants(raw: &str) -> Vec<String> {
    raw.lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .map(|line| line.to_string())
        .collect()
}

/// Checks the count bounds. An odd count is accepted with a warning.
pub fn validate_participant_count(count: usize, max: usize) -> TournamentResult<Option<Notice>> {
    if count < MIN_PARTICIPANTS {
        return Err(TournamentError::Validation(
            "You need at least 2 participants.".to_string(),
        ));
    }
    if count > max {
        return Err(TournamentError::Validation(format!(
            "Max {max} participants supported."
        )));
    }
    if count % 2 != 0 {
        return Ok(Some(Notice::OddParticipantCount));
    }
    Ok(None)
}

pub fn sample_participants() -> Vec<String> {
    (1..=SAMPLE_PARTICIPANT_COUNT)
        .map(|i| format!("Participant {i}"))
        .collect()
}

pub fn sample_participants_text() -> String {
    sample_participants().join("\n")
}

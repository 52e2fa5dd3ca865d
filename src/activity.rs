use crate::bracket::Bracket;

/// `active[round][match]`: a round-0 match is active when it has a player;
/// a later match is active when it has a player or either feeder is active.
pub fn compute_active(bracket: &Bracket) -> Vec<Vec<bool>> {
    let mut active: Vec<Vec<bool>> = Vec::with_capacity(bracket.round_count());
    for (r, round) in bracket.rounds().iter().enumerate() {
        let row = round
            .iter()
            .enumerate()
            .map(|(m, current)| {
                if current.has_assignment() {
                    return true;
                }
                match r.checked_sub(1).and_then(|prev| active.get(prev)) {
                    Some(feeders) => {
                        feeders.get(2 * m).copied().unwrap_or(false)
                            || feeders.get(2 * m + 1).copied().unwrap_or(false)
                    }
                    None => false,
                }
            })
            .collect();
        active.push(row);
    }
    active
}

/// Indices of rounds holding at least one active match.
pub fn visible_rounds(active: &[Vec<bool>]) -> Vec<usize> {
    active
        .iter()
        .enumerate()
        .filter(|(_, row)| row.iter().any(|flag| *flag))
        .map(|(r, _)| r)
        .collect()
}

/// Names counted back from the last round: Final, Semi-finals,
/// Quarter-finals, then "Round N" by position.
pub fn round_names(rounds_count: usize) -> Vec<String> {
    (0..rounds_count)
        .map(|i| match rounds_count - i {
            1 => "Final".to_string(),
            2 => "Semi-finals".to_string(),
            3 => "Quarter-finals".to_string(),
            _ => format!("Round {}", i + 1),
        })
        .collect()
}

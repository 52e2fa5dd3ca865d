use serde::Serialize;

use crate::activity::{compute_active, round_names, visible_rounds};
use crate::bracket::{Bracket, Match, Slot};
use crate::types::{BYE_LABEL, WAITING_LABEL};

// ── View model ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BracketView {
    pub is_empty: bool,
    pub column_count: usize,
    pub rounds: Vec<RoundView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundView {
    pub round_index: usize,
    pub title: String,
    pub matches: Vec<MatchView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchView {
    pub round_index: usize,
    pub match_index: usize,
    pub label: String,
    pub is_final: bool,
    pub best_of_three: bool,
    pub slots: Vec<SlotView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotView {
    pub slot_index: usize,
    pub player: Option<String>,
    pub text: String,
    pub placeholder: bool,
    pub clickable: bool,
    pub badge: Option<String>,
}

// ── Builders ───────────────────────────────────────────────────────────

/// Only rounds with an active match are shown, and within them only the
/// active matches. Titles count back from the last shown round.
pub fn build_view(bracket: Option<&Bracket>) -> BracketView {
    let bracket = match bracket {
        Some(b) if !b.is_empty() => b,
        _ => return empty_view(),
    };

    let active = compute_active(bracket);
    let shown = visible_rounds(&active);
    if shown.is_empty() {
        return empty_view();
    }

    let titles = round_names(shown.len());
    let rounds_count = bracket.round_count();
    let rounds = shown
        .iter()
        .enumerate()
        .map(|(column, &r)| {
            let matches = bracket.rounds()[r]
                .iter()
                .enumerate()
                .filter(|(m, _)| active[r][*m])
                .map(|(m, current)| match_view(current, r, m, rounds_count))
                .collect();
            RoundView {
                round_index: r,
                title: titles
                    .get(column)
                    .cloned()
                    .unwrap_or_else(|| format!("Round {}", column + 1)),
                matches,
            }
        })
        .collect();

    BracketView {
        is_empty: false,
        column_count: shown.len(),
        rounds,
    }
}

fn empty_view() -> BracketView {
    BracketView {
        is_empty: true,
        column_count: 0,
        rounds: Vec::new(),
    }
}

fn match_view(current: &Match, round_index: usize, match_index: usize, rounds_count: usize) -> MatchView {
    let is_final = round_index + 1 == rounds_count;
    let is_semi_final = round_index + 2 == rounds_count;
    let slots = [Slot::P1, Slot::P2]
        .into_iter()
        .map(|slot| slot_view(current, slot, round_index, is_final))
        .collect();
    MatchView {
        round_index,
        match_index,
        label: format!("Match {}", match_index + 1),
        is_final,
        best_of_three: is_final || is_semi_final,
        slots,
    }
}

fn slot_view(current: &Match, slot: Slot, round_index: usize, is_final: bool) -> SlotView {
    let player = current.slot(slot).map(|name| name.to_string());
    let badge = match (&player, &current.winner) {
        (Some(name), Some(winner)) if name == winner => {
            Some(if is_final { "Champion" } else { "Winner" }.to_string())
        }
        _ => None,
    };
    match player {
        Some(name) => SlotView {
            slot_index: slot.index(),
            clickable: name != BYE_LABEL,
            text: name.clone(),
            player: Some(name),
            placeholder: false,
            badge,
        },
        None => SlotView {
            slot_index: slot.index(),
            player: None,
            text: if round_index == 0 { BYE_LABEL } else { WAITING_LABEL }.to_string(),
            placeholder: true,
            clickable: false,
            badge: None,
        },
    }
}

/// "<round name> • Match <n>" using the bracket's full round count, for
/// confirmation prompts.
pub fn describe_match(bracket: &Bracket, round_index: usize, match_index: usize) -> Option<String> {
    bracket.get(round_index, match_index)?;
    let names = round_names(bracket.round_count());
    let round_name = names
        .get(round_index)
        .cloned()
        .unwrap_or_else(|| format!("Round {}", round_index + 1));
    Some(format!("{round_name} • Match {}", match_index + 1))
}

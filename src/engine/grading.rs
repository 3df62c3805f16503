//! Spread grading of picks against final scores, straight and teased.

use serde::Serialize;
use tracing::warn;

use super::odds::win_profit;
use crate::config::WagerConfig;
use crate::db::models::{GradeStatus, GradedResult, Matchup, Pick, Side};
use crate::error::{Diagnostic, SkipReason};

/// Result of grading one side of a matchup under one line adjustment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grading {
    pub status: GradeStatus,
    pub effective_line: Option<f64>,
    pub adjusted_margin: Option<f64>,
}

/// Grade `side` of `matchup` with `line_adjustment` points added to its line.
///
/// Missing scores → `Pending`; no line on either side → `NotApplicable`.
pub fn grade(matchup: &Matchup, side: Side, line_adjustment: f64) -> Grading {
    let effective_line = matchup.line(side).map(|l| l + line_adjustment);

    let (Some(picked_score), Some(opponent_score)) =
        (matchup.score(side), matchup.score(side.opposite()))
    else {
        return Grading {
            status: GradeStatus::Pending,
            effective_line,
            adjusted_margin: None,
        };
    };

    let Some(line) = effective_line else {
        return Grading {
            status: GradeStatus::NotApplicable,
            effective_line: None,
            adjusted_margin: None,
        };
    };

    let adjusted = picked_score as f64 + line;
    let opponent = opponent_score as f64;
    let status = if adjusted == opponent {
        GradeStatus::Push
    } else if adjusted > opponent {
        GradeStatus::Win
    } else {
        GradeStatus::Loss
    };
    Grading {
        status,
        effective_line: Some(line),
        adjusted_margin: Some(adjusted - opponent),
    }
}

pub fn grade_pick(pick: &Pick, matchup: &Matchup, line_adjustment: f64) -> GradedResult {
    let g = grade(matchup, pick.picked_side, line_adjustment);
    GradedResult {
        week: pick.week,
        home_team: pick.home_team.clone(),
        away_team: pick.away_team.clone(),
        picked_side: pick.picked_side,
        line_adjustment,
        status: g.status,
        effective_line: g.effective_line,
        adjusted_margin: g.adjusted_margin,
    }
}

/// Grade each pick twice: straight (0) and teased (`wagers.teaser_points`).
pub fn grade_picks(
    picks: &[Pick],
    matchups: &[Matchup],
    wagers: &WagerConfig,
) -> (Vec<GradedResult>, Vec<Diagnostic>) {
    let mut results = Vec::with_capacity(picks.len() * 2);
    let mut diagnostics = Vec::new();

    for pick in picks {
        let Some(matchup) = matchups.iter().find(|m| {
            m.week == pick.week && m.home_team == pick.home_team && m.away_team == pick.away_team
        }) else {
            diagnostics.push(
                Diagnostic::new(
                    Some(pick.week),
                    format!("{}@{}", pick.away_team, pick.home_team),
                    SkipReason::InsufficientData("matchup not found".into()),
                )
                .logged(),
            );
            continue;
        };

        for adjustment in [0.0, wagers.teaser_points] {
            let result = grade_pick(pick, matchup, adjustment);
            if result.status == GradeStatus::NotApplicable && adjustment == 0.0 {
                diagnostics.push(
                    Diagnostic::new(Some(pick.week), matchup.key(), SkipReason::GradingAmbiguity)
                        .logged(),
                );
            }
            results.push(result);
        }
    }
    (results, diagnostics)
}

/// Net profit of a single settled wager; `None` while unsettled.
pub fn settle_profit(status: GradeStatus, stake: f64, odds: i32) -> Option<f64> {
    match status {
        GradeStatus::Win => Some(win_profit(stake, odds)),
        GradeStatus::Loss => Some(-stake),
        GradeStatus::Push => Some(0.0),
        GradeStatus::Pending | GradeStatus::NotApplicable => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComboOutcome {
    Win,
    Loss,
    Pending,
}

/// Win-only aggregation: every leg must be a WIN; any settled non-win (or an
/// ungradable leg) loses the whole stake; otherwise the combo is still open.
pub fn settle_combo(leg_statuses: &[GradeStatus]) -> ComboOutcome {
    if leg_statuses.iter().any(|s| {
        matches!(
            s,
            GradeStatus::Loss | GradeStatus::Push | GradeStatus::NotApplicable
        )
    }) {
        return ComboOutcome::Loss;
    }
    if leg_statuses.iter().any(|s| *s == GradeStatus::Pending) {
        return ComboOutcome::Pending;
    }
    if leg_statuses.is_empty() {
        warn!("Settling an empty combo");
        return ComboOutcome::Pending;
    }
    ComboOutcome::Win
}

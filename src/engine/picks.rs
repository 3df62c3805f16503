//! Signal classification, side decision, edge filter and weekly ranking.
//!
//! Per matchup the signals move through
//! `NoSignal → SignificantHome | SignificantAway → Pick | NoPick`:
//! each defined differential (overall, offense, defense and the blended
//! composite when present) is tagged against its threshold, and the tags are
//! folded into one [`SignalState`] that the decision rule reads.

use std::cmp::Ordering;

use tracing::debug;

use super::kelly::kelly_stake;
use super::odds::expected_value;
use super::pipeline::MatchupEvaluation;
use super::win_probability::{pick_edge, side_probability};
use crate::config::{DecisionRule, ModelConfig, Thresholds};
use crate::db::models::{Metric, Pick, Side, SignalTags, Significance};

/// Tag a differential; undefined differentials are not votes.
pub fn classify(value: Option<f64>, threshold: f64) -> Option<Significance> {
    let v = value?;
    Some(if v >= threshold {
        Significance::HomeSignificant
    } else if v <= -threshold {
        Significance::AwaySignificant
    } else {
        Significance::Insignificant
    })
}

pub fn tag_signals(eval: &MatchupEvaluation, thresholds: &Thresholds) -> SignalTags {
    SignalTags {
        overall: classify(eval.advantages.get(Metric::Overall), thresholds.threshold_overall),
        offense: classify(eval.advantages.get(Metric::Offense), thresholds.threshold_offense),
        defense: classify(eval.advantages.get(Metric::Defense), thresholds.threshold_defense),
        blended: classify(eval.blended_advantage, thresholds.threshold_blended),
    }
}

/// Aggregate of all votes for one matchup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalState {
    /// No defined signal crossed its threshold.
    NoSignal,
    SignificantHome { unanimous: bool },
    SignificantAway { unanimous: bool },
    /// Signals fired for both sides.
    Conflicted,
}

pub fn signal_state(tags: &SignalTags) -> SignalState {
    let mut home = 0usize;
    let mut away = 0usize;
    let mut total = 0usize;
    for vote in tags.votes() {
        total += 1;
        match vote {
            Significance::HomeSignificant => home += 1,
            Significance::AwaySignificant => away += 1,
            Significance::Insignificant => {}
        }
    }
    match (home, away) {
        (0, 0) => SignalState::NoSignal,
        (h, 0) => SignalState::SignificantHome {
            unanimous: h == total,
        },
        (0, a) => SignalState::SignificantAway {
            unanimous: a == total,
        },
        _ => SignalState::Conflicted,
    }
}

/// Side to back, or `None` for no pick.
pub fn decide(tags: &SignalTags, rule: DecisionRule) -> Option<Side> {
    match (signal_state(tags), rule) {
        (SignalState::SignificantHome { .. }, DecisionRule::Disjunctive) => Some(Side::Home),
        (SignalState::SignificantAway { .. }, DecisionRule::Disjunctive) => Some(Side::Away),
        (SignalState::SignificantHome { unanimous: true }, DecisionRule::Conjunctive) => {
            Some(Side::Home)
        }
        (SignalState::SignificantAway { unanimous: true }, DecisionRule::Conjunctive) => {
            Some(Side::Away)
        }
        _ => None,
    }
}

/// Outcome of the weekly selection, with counts of what the filters removed.
#[derive(Debug, Clone, Default)]
pub struct PickSelection {
    pub picks: Vec<Pick>,
    pub no_pick: usize,
    pub dropped_by_edge: usize,
    pub dropped_by_cap: usize,
}

fn ranking_magnitude(pick: &Pick) -> f64 {
    pick.blended_advantage
        .or(pick.advantages.get(Metric::Overall))
        .map(f64::abs)
        .unwrap_or(0.0)
}

/// Edge desc (undefined last), then advantage magnitude desc, then matchup name.
fn rank_order(a: &Pick, b: &Pick) -> Ordering {
    let by_edge = match (a.pick_edge, b.pick_edge) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_edge
        .then_with(|| ranking_magnitude(b).total_cmp(&ranking_magnitude(a)))
        .then_with(|| a.home_team.cmp(&b.home_team))
        .then_with(|| a.away_team.cmp(&b.away_team))
}

fn build_pick(eval: &MatchupEvaluation, tags: SignalTags, side: Side, cfg: &ModelConfig) -> Pick {
    let m = &eval.matchup;
    let side_prob = side_probability(eval.home_win_prob, side);
    let odds = m.odds(side);
    Pick {
        week: m.week,
        home_team: m.home_team.clone(),
        away_team: m.away_team.clone(),
        picked_side: side,
        picked_team: m.team(side).to_string(),
        advantages: eval.advantages,
        significance: tags,
        blended_advantage: eval.blended_advantage,
        home_win_prob: eval.home_win_prob,
        pick_edge: pick_edge(eval.home_win_prob, side, m, &cfg.probability),
        kelly_stake: odds.map(|o| kelly_stake(side_prob, o, cfg.picks.kelly_fraction)),
        expected_value: odds.map(|o| expected_value(side_prob, o)),
        rank: 0,
    }
}

/// Classify every evaluated matchup, filter by edge, rank and cap.
///
/// Never returns more than `cfg.picks.max_picks` picks.
pub fn select_picks(evaluations: &[MatchupEvaluation], cfg: &ModelConfig) -> PickSelection {
    let mut selection = PickSelection::default();
    let mut candidates = Vec::new();

    for eval in evaluations {
        let tags = tag_signals(eval, &cfg.picks.thresholds);
        let Some(side) = decide(&tags, cfg.picks.decision_rule) else {
            debug!("No pick for {}: {:?}", eval.matchup.key(), signal_state(&tags));
            selection.no_pick += 1;
            continue;
        };
        let pick = build_pick(eval, tags, side, cfg);

        if let Some(min_edge) = cfg.picks.min_edge {
            let passes = pick.pick_edge.is_some_and(|e| e.abs() >= min_edge);
            if !passes {
                debug!(
                    "Edge filter dropped {} ({:?} < {:.3})",
                    eval.matchup.key(),
                    pick.pick_edge,
                    min_edge
                );
                selection.dropped_by_edge += 1;
                continue;
            }
        }
        candidates.push(pick);
    }

    candidates.sort_by(rank_order);
    if candidates.len() > cfg.picks.max_picks {
        selection.dropped_by_cap = candidates.len() - cfg.picks.max_picks;
        candidates.truncate(cfg.picks.max_picks);
    }
    for (i, pick) in candidates.iter_mut().enumerate() {
        pick.rank = i as u32 + 1;
    }
    selection.picks = candidates;
    selection
}

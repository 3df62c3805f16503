//! Threshold grid search over completed weeks.
//!
//! Each candidate (overall, offense, defense) re-runs classification and the
//! side decision against stored evaluations, grades straight up and scores
//! the resulting record. Results are a report only; nothing is written back
//! into the live configuration.

use std::cmp::Ordering;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::grading::{grade, settle_profit};
use super::picks::{decide, tag_signals};
use super::pipeline::MatchupEvaluation;
use crate::config::{ModelConfig, Thresholds};
use crate::db::models::GradeStatus;
use crate::error::ConfigError;

/// Refuse grids larger than this many candidates.
const MAX_GRID_SIZE: usize = 250_000;

/// Inclusive `start:end:step` range of threshold values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridAxis {
    pub start: f64,
    pub end: f64,
    pub step: f64,
}

impl GridAxis {
    pub fn new(start: f64, end: f64, step: f64) -> Result<Self, ConfigError> {
        let valid = start.is_finite()
            && end.is_finite()
            && step.is_finite()
            && start >= 0.0
            && step > 0.0
            && start <= end;
        if !valid {
            return Err(ConfigError::InvalidAxis(format!("{}:{}:{}", start, end, step)));
        }
        Ok(GridAxis { start, end, step })
    }

    /// A single fixed value.
    pub fn point(value: f64) -> Result<Self, ConfigError> {
        GridAxis::new(value, value, 1.0)
    }

    fn last_index(&self) -> f64 {
        ((self.end - self.start) / self.step + 1e-9).floor()
    }

    /// Number of values on the axis, computed without enumerating them.
    pub fn count(&self) -> f64 {
        self.last_index() + 1.0
    }

    /// `start + i·step` for every i that stays within `end` (small float slack).
    pub fn values(&self) -> Vec<f64> {
        let n = self.last_index() as usize;
        (0..=n).map(|i| self.start + i as f64 * self.step).collect()
    }
}

impl FromStr for GridAxis {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidAxis(s.to_string());
        let parts: Vec<f64> = s
            .split(':')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|_| invalid())?;
        match parts.as_slice() {
            [value] => GridAxis::point(*value).map_err(|_| invalid()),
            [start, end, step] => GridAxis::new(*start, *end, *step).map_err(|_| invalid()),
            _ => Err(invalid()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GridSpec {
    pub overall: GridAxis,
    pub offense: GridAxis,
    pub defense: GridAxis,
    pub min_picks: usize,
}

impl GridSpec {
    /// Candidate thresholds; the blended threshold stays at the base value.
    pub fn candidates(&self, base: &Thresholds) -> Vec<Thresholds> {
        let mut out = Vec::new();
        for overall in self.overall.values() {
            for offense in self.offense.values() {
                for defense in self.defense.values() {
                    out.push(Thresholds {
                        threshold_overall: overall,
                        threshold_offense: offense,
                        threshold_defense: defense,
                        ..*base
                    });
                }
            }
        }
        out
    }

    /// Candidate count as a float so oversized grids are measured, not built.
    pub fn size(&self) -> f64 {
        self.overall.count() * self.offense.count() * self.defense.count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateResult {
    pub threshold_overall: f64,
    pub threshold_offense: f64,
    pub threshold_defense: f64,
    pub threshold_blended: f64,
    pub picks: usize,
    pub wins: usize,
    pub losses: usize,
    pub pushes: usize,
    /// Picks not gradable yet (pending or no line).
    pub ungraded: usize,
    /// wins / (wins + losses)
    pub accuracy: Option<f64>,
    pub profit: f64,
    /// profit / total stake risked on settled picks
    pub roi: Option<f64>,
}

impl CandidateResult {
    pub fn graded(&self) -> usize {
        self.wins + self.losses + self.pushes
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TuningReport {
    pub evaluated: usize,
    pub discarded: usize,
    pub min_picks: usize,
    pub candidates: Vec<CandidateResult>,
}

/// Replay one threshold candidate across every evaluation.
pub fn evaluate_candidate(
    evaluations: &[MatchupEvaluation],
    thresholds: Thresholds,
    base: &ModelConfig,
) -> CandidateResult {
    let stake = base.wagers.stake;
    let mut result = CandidateResult {
        threshold_overall: thresholds.threshold_overall,
        threshold_offense: thresholds.threshold_offense,
        threshold_defense: thresholds.threshold_defense,
        threshold_blended: thresholds.threshold_blended,
        picks: 0,
        wins: 0,
        losses: 0,
        pushes: 0,
        ungraded: 0,
        accuracy: None,
        profit: 0.0,
        roi: None,
    };

    for eval in evaluations {
        let tags = tag_signals(eval, &thresholds);
        let Some(side) = decide(&tags, base.picks.decision_rule) else {
            continue;
        };
        result.picks += 1;
        let status = grade(&eval.matchup, side, 0.0).status;
        match status {
            GradeStatus::Win => result.wins += 1,
            GradeStatus::Loss => result.losses += 1,
            GradeStatus::Push => result.pushes += 1,
            GradeStatus::Pending | GradeStatus::NotApplicable => result.ungraded += 1,
        }
        let odds = eval.matchup.odds(side).unwrap_or(base.wagers.fallback_odds);
        if let Some(profit) = settle_profit(status, stake, odds) {
            result.profit += profit;
        }
    }

    let decided = result.wins + result.losses;
    if decided > 0 {
        result.accuracy = Some(result.wins as f64 / decided as f64);
    }
    let risked = result.graded() as f64 * stake;
    if risked > 0.0 {
        result.roi = Some(result.profit / risked);
    }
    result
}

fn desc(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// ROI desc, accuracy desc, pick count desc, then lower thresholds first.
fn rank_order(a: &CandidateResult, b: &CandidateResult) -> Ordering {
    desc(a.roi, b.roi)
        .then_with(|| desc(a.accuracy, b.accuracy))
        .then_with(|| b.picks.cmp(&a.picks))
        .then_with(|| a.threshold_overall.total_cmp(&b.threshold_overall))
        .then_with(|| a.threshold_offense.total_cmp(&b.threshold_offense))
        .then_with(|| a.threshold_defense.total_cmp(&b.threshold_defense))
}

fn finish(results: Vec<CandidateResult>, min_picks: usize) -> TuningReport {
    let evaluated = results.len();
    let mut candidates: Vec<CandidateResult> = results
        .into_iter()
        .filter(|c| {
            let keep = c.picks >= min_picks;
            if !keep {
                debug!(
                    "Discarding ({}, {}, {}): {} pick(s)",
                    c.threshold_overall,
                    c.threshold_offense,
                    c.threshold_defense,
                    c.picks
                );
            }
            keep
        })
        .collect();
    let discarded = evaluated - candidates.len();
    if discarded > 0 {
        warn!(
            "{} of {} threshold candidate(s) produced fewer than {} picks",
            discarded, evaluated, min_picks
        );
    }
    candidates.sort_by(rank_order);
    TuningReport {
        evaluated,
        discarded,
        min_picks,
        candidates,
    }
}

fn check_size(grid: &GridSpec) -> Result<()> {
    let size = grid.size();
    if size > MAX_GRID_SIZE as f64 {
        anyhow::bail!(
            "threshold grid has {:.0} candidates, limit is {}",
            size,
            MAX_GRID_SIZE
        );
    }
    Ok(())
}

/// Sequential grid search.
pub fn run_grid(
    evaluations: &[MatchupEvaluation],
    grid: &GridSpec,
    base: &ModelConfig,
) -> Result<TuningReport> {
    check_size(grid)?;
    let results = grid
        .candidates(&base.picks.thresholds)
        .into_iter()
        .map(|t| evaluate_candidate(evaluations, t, base))
        .collect();
    Ok(finish(results, grid.min_picks))
}

/// Grid search split across blocking tasks; same ranking as [`run_grid`].
pub async fn run_grid_parallel(
    evaluations: Arc<Vec<MatchupEvaluation>>,
    grid: &GridSpec,
    base: &ModelConfig,
) -> Result<TuningReport> {
    check_size(grid)?;
    let candidates = grid.candidates(&base.picks.thresholds);
    let workers = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    let chunk_size = candidates.len().div_ceil(workers).max(1);
    info!(
        "Tuning {} candidate(s) over {} matchup(s) in chunks of {}",
        candidates.len(),
        evaluations.len(),
        chunk_size
    );

    let tasks = candidates.chunks(chunk_size).map(|chunk| {
        let chunk = chunk.to_vec();
        let evaluations = Arc::clone(&evaluations);
        let base = base.clone();
        tokio::task::spawn_blocking(move || {
            chunk
                .into_iter()
                .map(|t| evaluate_candidate(&evaluations, t, &base))
                .collect::<Vec<_>>()
        })
    });

    let mut results = Vec::with_capacity(candidates.len());
    for joined in futures_util::future::join_all(tasks).await {
        results.extend(joined?);
    }
    Ok(finish(results, grid.min_picks))
}

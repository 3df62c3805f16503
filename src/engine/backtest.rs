//! Season backtest over stored picks and graded results.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::combos::{combinations, ComboBet, MAX_COMBO_SIZE, MIN_COMBO_SIZE};
use super::grading::{settle_combo, settle_profit, ComboOutcome};
use super::odds::{payout, to_decimal};
use crate::config::WagerConfig;
use crate::db::models::{GradeStatus, GradedResult, Matchup, Pick};

const ADJUSTMENT_EPS: f64 = 1e-9;

/// Win / loss / push tally for single legs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Record {
    pub wins: usize,
    pub losses: usize,
    pub pushes: usize,
    pub pending: usize,
    pub not_applicable: usize,
}

impl Record {
    pub fn add(&mut self, status: GradeStatus) {
        match status {
            GradeStatus::Win => self.wins += 1,
            GradeStatus::Loss => self.losses += 1,
            GradeStatus::Push => self.pushes += 1,
            GradeStatus::Pending => self.pending += 1,
            GradeStatus::NotApplicable => self.not_applicable += 1,
        }
    }

    pub fn merge(&mut self, other: &Record) {
        self.wins += other.wins;
        self.losses += other.losses;
        self.pushes += other.pushes;
        self.pending += other.pending;
        self.not_applicable += other.not_applicable;
    }

    pub fn settled(&self) -> usize {
        self.wins + self.losses + self.pushes
    }

    /// wins / (wins + losses); pushes excluded.
    pub fn accuracy(&self) -> Option<f64> {
        let decided = self.wins + self.losses;
        (decided > 0).then(|| self.wins as f64 / decided as f64)
    }
}

/// Teaser combination results for one combo size.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComboSizeSummary {
    pub size: usize,
    pub combos: usize,
    pub wins: usize,
    pub losses: usize,
    pub pending: usize,
    pub profit: f64,
}

impl ComboSizeSummary {
    fn merge(&mut self, other: &ComboSizeSummary) {
        self.combos += other.combos;
        self.wins += other.wins;
        self.losses += other.losses;
        self.pending += other.pending;
        self.profit += other.profit;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekSummary {
    pub week: u32,
    pub picks: usize,
    pub straight: Record,
    pub teased: Record,
    pub straight_profit: f64,
    pub teaser_combos: Vec<ComboSizeSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonSummary {
    pub stake: f64,
    pub teaser_points: f64,
    pub picks: usize,
    pub straight: Record,
    pub teased: Record,
    pub straight_accuracy: Option<f64>,
    pub teased_accuracy: Option<f64>,
    pub straight_profit: f64,
    /// Profit in units of the configured stake.
    pub straight_units: f64,
    pub straight_roi: Option<f64>,
    pub teaser_combos: Vec<ComboSizeSummary>,
    pub teaser_profit: f64,
    pub teaser_roi: Option<f64>,
    pub weeks: Vec<WeekSummary>,
}

fn find_result<'a>(
    results: &'a [GradedResult],
    week: u32,
    home: &str,
    away: &str,
    adjustment: f64,
) -> Option<&'a GradedResult> {
    results.iter().find(|r| {
        r.week == week
            && r.home_team == home
            && r.away_team == away
            && (r.line_adjustment - adjustment).abs() < ADJUSTMENT_EPS
    })
}

fn status_for(results: &[GradedResult], pick: &Pick, adjustment: f64) -> GradeStatus {
    find_result(results, pick.week, &pick.home_team, &pick.away_team, adjustment)
        .map(|r| r.status)
        .unwrap_or(GradeStatus::Pending)
}

/// Outcome of a combo from its legs' teased results; ungraded legs count as pending.
pub fn combo_outcome(bet: &ComboBet, results: &[GradedResult], teaser_points: f64) -> ComboOutcome {
    let statuses: Vec<GradeStatus> = bet
        .legs
        .iter()
        .map(|leg| {
            find_result(results, bet.week, &leg.home_team, &leg.away_team, teaser_points)
                .map(|r| r.status)
                .unwrap_or(GradeStatus::Pending)
        })
        .collect();
    settle_combo(&statuses)
}

/// Every 2..=5 leg teaser over the week's picks at the fixed house prices.
pub fn settle_teaser_combos(
    picks: &[&Pick],
    results: &[GradedResult],
    wagers: &WagerConfig,
) -> Vec<ComboSizeSummary> {
    let statuses: Vec<GradeStatus> = picks
        .iter()
        .map(|p| status_for(results, p, wagers.teaser_points))
        .collect();
    let max = MAX_COMBO_SIZE.min(picks.len());
    let mut out = Vec::new();

    for size in MIN_COMBO_SIZE..=max {
        let Some(price) = wagers.teaser_price(size) else {
            continue;
        };
        let mut summary = ComboSizeSummary {
            size,
            ..Default::default()
        };
        for subset in combinations(picks.len(), size) {
            let legs: Vec<GradeStatus> = subset.iter().map(|&i| statuses[i]).collect();
            summary.combos += 1;
            match settle_combo(&legs) {
                ComboOutcome::Win => {
                    summary.wins += 1;
                    summary.profit += payout(wagers.stake, to_decimal(price));
                }
                ComboOutcome::Loss => {
                    summary.losses += 1;
                    summary.profit -= wagers.stake;
                }
                ComboOutcome::Pending => summary.pending += 1,
            }
        }
        out.push(summary);
    }
    out
}

/// Straight and teased records, units and teaser-combo results per week and
/// for the whole season.
pub fn summarize_season(
    picks: &[Pick],
    results: &[GradedResult],
    matchups: &[Matchup],
    wagers: &WagerConfig,
) -> SeasonSummary {
    let weeks: BTreeSet<u32> = picks.iter().map(|p| p.week).collect();
    let mut week_rows = Vec::with_capacity(weeks.len());
    let mut straight = Record::default();
    let mut teased = Record::default();
    let mut straight_profit = 0.0;
    let mut combos_by_size: BTreeMap<usize, ComboSizeSummary> = BTreeMap::new();

    for week in weeks {
        let mut week_picks: Vec<&Pick> = picks.iter().filter(|p| p.week == week).collect();
        week_picks.sort_by_key(|p| p.rank);

        let mut row = WeekSummary {
            week,
            picks: week_picks.len(),
            straight: Record::default(),
            teased: Record::default(),
            straight_profit: 0.0,
            teaser_combos: Vec::new(),
        };
        for pick in &week_picks {
            let status = status_for(results, pick, 0.0);
            row.straight.add(status);
            row.teased.add(status_for(results, pick, wagers.teaser_points));

            let odds = matchups
                .iter()
                .find(|m| {
                    m.week == week && m.home_team == pick.home_team && m.away_team == pick.away_team
                })
                .and_then(|m| m.odds(pick.picked_side))
                .unwrap_or(wagers.fallback_odds);
            if let Some(profit) = settle_profit(status, wagers.stake, odds) {
                row.straight_profit += profit;
            }
        }
        row.teaser_combos = settle_teaser_combos(&week_picks, results, wagers);

        straight.merge(&row.straight);
        teased.merge(&row.teased);
        straight_profit += row.straight_profit;
        for summary in &row.teaser_combos {
            combos_by_size
                .entry(summary.size)
                .or_insert_with(|| ComboSizeSummary {
                    size: summary.size,
                    ..Default::default()
                })
                .merge(summary);
        }
        week_rows.push(row);
    }

    let teaser_combos: Vec<ComboSizeSummary> = combos_by_size.into_values().collect();
    let teaser_profit: f64 = teaser_combos.iter().map(|c| c.profit).sum();
    let teaser_risked: f64 = teaser_combos
        .iter()
        .map(|c| (c.wins + c.losses) as f64 * wagers.stake)
        .sum();
    let straight_risked = straight.settled() as f64 * wagers.stake;

    SeasonSummary {
        stake: wagers.stake,
        teaser_points: wagers.teaser_points,
        picks: picks.len(),
        straight,
        teased,
        straight_accuracy: straight.accuracy(),
        teased_accuracy: teased.accuracy(),
        straight_profit,
        straight_units: straight_profit / wagers.stake,
        straight_roi: (straight_risked > 0.0).then(|| straight_profit / straight_risked),
        teaser_combos,
        teaser_profit,
        teaser_roi: (teaser_risked > 0.0).then(|| teaser_profit / teaser_risked),
        weeks: week_rows,
    }
}

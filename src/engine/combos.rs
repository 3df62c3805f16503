//! Parlay / teaser combinations over a week's picks.
//!
//! Every k-subset (k = 2..=5) of the picks becomes a [`ComboBet`]. The parlay
//! price multiplies the legs' decimal prices; teasers of a supported size use
//! the house's fixed price instead.

use serde::Serialize;

use super::odds::{payout, to_decimal};
use crate::config::WagerConfig;
use crate::db::models::{Matchup, Pick, Side};

pub const MIN_COMBO_SIZE: usize = 2;
pub const MAX_COMBO_SIZE: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComboLeg {
    pub home_team: String,
    pub away_team: String,
    pub picked_side: Side,
    pub picked_team: String,
    /// Model probability for the picked side.
    pub probability: Option<f64>,
    pub odds: Option<i32>,
    pub line: Option<f64>,
    /// Line after the teaser points are added.
    pub teased_line: Option<f64>,
}

impl ComboLeg {
    pub fn decimal_price(&self) -> Option<f64> {
        self.odds.map(to_decimal)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComboBet {
    pub week: u32,
    pub size: usize,
    pub legs: Vec<ComboLeg>,
    pub combined_probability: Option<f64>,
    /// Product of the legs' decimal prices (straight parlay).
    pub combined_decimal_price: Option<f64>,
    pub fair_decimal_price: Option<f64>,
    /// combined probability − 1 / combined decimal price.
    pub edge: Option<f64>,
    /// Fixed house price for a teaser of this size (American odds).
    pub static_teaser_price: Option<i32>,
    pub parlay_payout: Option<f64>,
    pub teaser_payout: Option<f64>,
}

impl ComboBet {
    /// Teaser price when one is offered for this size, else the parlay price.
    pub fn effective_decimal_price(&self) -> Option<f64> {
        self.static_teaser_price
            .map(to_decimal)
            .or(self.combined_decimal_price)
    }

    pub fn members(&self) -> Vec<String> {
        self.legs.iter().map(|l| l.picked_team.clone()).collect()
    }
}

/// Flat report row for a combination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComboReport {
    pub week: u32,
    pub size: usize,
    pub members: Vec<String>,
    pub combined_probability: Option<f64>,
    pub combined_price: Option<f64>,
    pub payout_per_stake_unit: Option<f64>,
}

impl From<&ComboBet> for ComboReport {
    fn from(bet: &ComboBet) -> Self {
        let price = bet.effective_decimal_price();
        ComboReport {
            week: bet.week,
            size: bet.size,
            members: bet.members(),
            combined_probability: bet.combined_probability,
            combined_price: price,
            payout_per_stake_unit: price.map(|p| payout(1.0, p)),
        }
    }
}

/// Attach market data and teased lines to each pick.
pub fn build_legs(picks: &[Pick], matchups: &[Matchup], wagers: &WagerConfig) -> Vec<ComboLeg> {
    picks
        .iter()
        .map(|pick| {
            let matchup = matchups.iter().find(|m| {
                m.week == pick.week
                    && m.home_team == pick.home_team
                    && m.away_team == pick.away_team
            });
            let line = matchup.and_then(|m| m.line(pick.picked_side));
            let probability = Some(pick.side_probability()).filter(|p| (0.0..=1.0).contains(p));
            ComboLeg {
                home_team: pick.home_team.clone(),
                away_team: pick.away_team.clone(),
                picked_side: pick.picked_side,
                picked_team: pick.picked_team.clone(),
                probability,
                odds: matchup.and_then(|m| m.odds(pick.picked_side)),
                line,
                teased_line: line.map(|l| l + wagers.teaser_points),
            }
        })
        .collect()
}

/// All k-element index subsets of `0..n` in lexicographic order.
pub fn combinations(n: usize, k: usize) -> Vec<Vec<usize>> {
    if k == 0 || k > n {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut idx: Vec<usize> = (0..k).collect();
    loop {
        out.push(idx.clone());
        // rightmost index that can still advance
        let Some(i) = (0..k).rev().find(|&i| idx[i] < n - k + i) else {
            break;
        };
        idx[i] += 1;
        for j in i + 1..k {
            idx[j] = idx[j - 1] + 1;
        }
    }
    out
}

fn product(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    values.fold(Some(1.0), |acc, v| Some(acc? * v?))
}

pub fn price_combo(week: u32, legs: Vec<ComboLeg>, wagers: &WagerConfig) -> ComboBet {
    let size = legs.len();
    let combined_probability = product(legs.iter().map(|l| l.probability));
    let combined_decimal_price = product(legs.iter().map(ComboLeg::decimal_price));
    let fair_decimal_price = combined_probability.filter(|p| *p > 0.0).map(|p| 1.0 / p);
    let edge = match (combined_probability, combined_decimal_price) {
        (Some(p), Some(price)) if price > 0.0 => Some(p - 1.0 / price),
        _ => None,
    };
    let static_teaser_price = wagers.teaser_price(size);
    ComboBet {
        week,
        size,
        legs,
        combined_probability,
        combined_decimal_price,
        fair_decimal_price,
        edge,
        static_teaser_price,
        parlay_payout: combined_decimal_price.map(|d| payout(wagers.stake, d)),
        teaser_payout: static_teaser_price.map(|o| payout(wagers.stake, to_decimal(o))),
    }
}

/// Every combination of 2..=5 legs (bounded by the number of legs).
pub fn generate_combos(week: u32, legs: &[ComboLeg], wagers: &WagerConfig) -> Vec<ComboBet> {
    let max = MAX_COMBO_SIZE.min(legs.len());
    let mut out = Vec::new();
    for k in MIN_COMBO_SIZE..=max {
        for subset in combinations(legs.len(), k) {
            let members = subset.iter().map(|&i| legs[i].clone()).collect();
            out.push(price_combo(week, members, wagers));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn leg(team: &str, probability: Option<f64>, odds: Option<i32>, line: Option<f64>) -> ComboLeg {
        ComboLeg {
            home_team: team.into(),
            away_team: format!("{}-opp", team),
            picked_side: Side::Home,
            picked_team: team.into(),
            probability,
            odds,
            line,
            teased_line: line.map(|l| l + 6.0),
        }
    }

    fn binomial(n: usize, k: usize) -> usize {
        (0..k).fold(1, |acc, i| acc * (n - i) / (i + 1))
    }

    #[test]
    fn combinations_enumerate_all_subsets() {
        assert_eq!(
            combinations(4, 2),
            vec![
                vec![0, 1],
                vec![0, 2],
                vec![0, 3],
                vec![1, 2],
                vec![1, 3],
                vec![2, 3]
            ]
        );
        for n in 0..=8 {
            for k in 1..=5 {
                assert_eq!(combinations(n, k).len(), if k > n { 0 } else { binomial(n, k) });
            }
        }
    }

    #[test]
    fn combo_counts_by_week_size() {
        let w = WagerConfig::default();
        let legs: Vec<_> = (0..8)
            .map(|i| leg(&format!("T{}", i), Some(0.6), Some(-110), Some(-2.5)))
            .collect();
        assert_eq!(generate_combos(1, &legs, &w).len(), 28 + 56 + 70 + 56);
        assert_eq!(generate_combos(1, &legs[..3], &w).len(), 3 + 1);
        assert!(generate_combos(1, &legs[..1], &w).is_empty());
    }

    #[test]
    fn combined_values_are_leg_products() {
        let w = WagerConfig::default();
        let legs = vec![
            leg("A", Some(0.6), Some(-110), Some(-3.0)),
            leg("B", Some(0.55), Some(120), Some(2.5)),
            leg("C", Some(0.7), Some(-200), None),
        ];
        let bet = price_combo(4, legs, &w);
        assert_relative_eq!(bet.combined_probability.unwrap(), 0.6 * 0.55 * 0.7, epsilon = 1e-12);
        let price = to_decimal(-110) * to_decimal(120) * to_decimal(-200);
        assert_relative_eq!(bet.combined_decimal_price.unwrap(), price, epsilon = 1e-12);
        assert_relative_eq!(bet.fair_decimal_price.unwrap(), 1.0 / (0.6 * 0.55 * 0.7), epsilon = 1e-9);
        assert_relative_eq!(bet.edge.unwrap(), 0.6 * 0.55 * 0.7 - 1.0 / price, epsilon = 1e-12);
    }

    #[test]
    fn undefined_leg_makes_product_undefined() {
        let w = WagerConfig::default();
        let bet = price_combo(
            4,
            vec![leg("A", Some(0.6), None, None), leg("B", None, Some(-110), None)],
            &w,
        );
        assert_eq!(bet.combined_probability, None);
        assert_eq!(bet.combined_decimal_price, None);
        assert_eq!(bet.edge, None);
        // fixed teaser price still applies
        assert_eq!(bet.static_teaser_price, Some(-135));
    }

    #[test]
    fn three_leg_teaser_uses_fixed_price() {
        let w = WagerConfig::default();
        let legs: Vec<_> = ["A", "B", "C"]
            .iter()
            .map(|t| leg(t, Some(0.6), Some(-135), Some(-1.5)))
            .collect();
        let bet = price_combo(2, legs, &w);
        assert_eq!(bet.static_teaser_price, Some(140));
        assert_relative_eq!(bet.teaser_payout.unwrap(), 14.0, epsilon = 1e-12);
        let report = ComboReport::from(&bet);
        assert_relative_eq!(report.combined_price.unwrap(), 2.4, epsilon = 1e-12);
        assert_relative_eq!(report.payout_per_stake_unit.unwrap(), 1.4, epsilon = 1e-12);
        assert_eq!(report.members, vec!["A", "B", "C"]);
    }

    #[test]
    fn teased_line_carried_per_leg() {
        use crate::db::models::{MetricValues, SignalTags};
        let pick = Pick {
            week: 9,
            home_team: "NO".into(),
            away_team: "ATL".into(),
            picked_side: Side::Away,
            picked_team: "ATL".into(),
            advantages: MetricValues::default(),
            significance: SignalTags::default(),
            blended_advantage: None,
            home_win_prob: 0.4,
            pick_edge: None,
            kelly_stake: None,
            expected_value: None,
            rank: 1,
        };
        let m = Matchup {
            week: 9,
            home_team: "NO".into(),
            away_team: "ATL".into(),
            home_line: Some(-2.5),
            away_line: None,
            home_odds: None,
            away_odds: Some(115),
            home_score: None,
            away_score: None,
        };
        let legs = build_legs(&[pick], &[m], &WagerConfig::default());
        assert_eq!(legs[0].line, Some(2.5));
        assert_eq!(legs[0].teased_line, Some(8.5));
        assert_eq!(legs[0].odds, Some(115));
        assert_relative_eq!(legs[0].probability.unwrap(), 0.6, epsilon = 1e-12);
    }
}

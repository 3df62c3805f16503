//! Advantage → win probability, and market-implied probabilities.
//!
//! The model is a single logistic on the (optionally composite-blended)
//! overall advantage:
//!
//!   P(home wins) = 1 / (1 + exp(−K · advantage))
//!
//! Market probabilities come from American moneyline odds when posted, and
//! otherwise from the spread by treating the final margin as
//! Normal(−home_line, σ).

use serde::Serialize;

use super::odds::implied_probability;
use crate::config::ProbabilityConfig;
use crate::db::models::{Matchup, Side};

/// Below this the composite spread is treated as zero.
const STDEV_EPSILON: f64 = 1e-9;

pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Model probability that the home team wins given its advantage.
pub fn win_probability(advantage: f64, scale: f64) -> f64 {
    sigmoid(scale * advantage).clamp(0.0, 1.0)
}

/// Standard normal CDF (Abramowitz & Stegun 7.1.26, |error| < 1.5e-7).
pub fn normal_cdf(x: f64) -> f64 {
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let z = x.abs() / std::f64::consts::SQRT_2;

    let t = 1.0 / (1.0 + p * z);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-z * z).exp();

    (0.5 * (1.0 + sign * y)).clamp(0.0, 1.0)
}

/// P(home margin > 0) when the margin is Normal(−home_line, σ).
pub fn spread_probability(home_line: f64, stddev: f64) -> f64 {
    normal_cdf(-home_line / stddev)
}

/// Z-score the defined values (population σ).
///
/// Returns `None` when fewer than two values are defined or they do not vary,
/// in which case the composite cannot be put on a comparable scale.
pub fn standardize(values: &[Option<f64>]) -> Option<Vec<Option<f64>>> {
    let defined: Vec<f64> = values.iter().flatten().copied().collect();
    if defined.len() < 2 {
        return None;
    }
    let n = defined.len() as f64;
    let mean = defined.iter().sum::<f64>() / n;
    let variance = defined.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let stdev = variance.sqrt();
    if stdev < STDEV_EPSILON {
        return None;
    }
    Some(values.iter().map(|v| v.map(|x| (x - mean) / stdev)).collect())
}

/// α·overall + (1 − α)·normalized composite.
pub fn blended_advantage(overall: f64, normalized_composite: f64, alpha: f64) -> f64 {
    alpha * overall + (1.0 - alpha) * normalized_composite
}

pub fn side_probability(home_win_prob: f64, side: Side) -> f64 {
    match side {
        Side::Home => home_win_prob,
        Side::Away => 1.0 - home_win_prob,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketSource {
    Moneyline,
    Spread,
}

/// Market-implied probability for `side`: its own odds, else the spread.
pub fn market_probability(
    matchup: &Matchup,
    side: Side,
    cfg: &ProbabilityConfig,
) -> Option<(f64, MarketSource)> {
    if let Some(odds) = matchup.odds(side) {
        return Some((implied_probability(odds), MarketSource::Moneyline));
    }
    let home_line = matchup.line(Side::Home)?;
    let home = spread_probability(home_line, cfg.spread_stddev);
    Some((side_probability(home, side), MarketSource::Spread))
}

/// Model probability minus market probability, both evaluated for `side`.
pub fn pick_edge(
    home_win_prob: f64,
    side: Side,
    matchup: &Matchup,
    cfg: &ProbabilityConfig,
) -> Option<f64> {
    let (market, _) = market_probability(matchup, side, cfg)?;
    Some(side_probability(home_win_prob, side) - market)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn matchup(home_line: Option<f64>, home_odds: Option<i32>, away_odds: Option<i32>) -> Matchup {
        Matchup {
            week: 6,
            home_team: "SF".into(),
            away_team: "SEA".into(),
            home_line,
            away_line: None,
            home_odds,
            away_odds,
            home_score: None,
            away_score: None,
        }
    }

    #[test]
    fn even_advantage_is_exactly_half() {
        assert_eq!(win_probability(0.0, 0.10), 0.5);
        assert_eq!(win_probability(0.0, 3.0), 0.5);
    }

    #[test]
    fn probability_strictly_increasing() {
        let mut last = 0.0;
        for i in -300..=300 {
            let p = win_probability(i as f64 * 0.1, 0.10);
            assert!(p > last);
            assert!((0.0..=1.0).contains(&p));
            last = p;
        }
    }

    #[test]
    fn probability_symmetric() {
        let p = win_probability(7.5, 0.10);
        let q = win_probability(-7.5, 0.10);
        assert_relative_eq!(p + q, 1.0, epsilon = 1e-12);
        assert_relative_eq!(p, 1.0 / (1.0 + (-0.75f64).exp()), epsilon = 1e-12);
    }

    #[test]
    fn normal_cdf_reference_points() {
        assert_relative_eq!(normal_cdf(0.0), 0.5, epsilon = 1e-7);
        assert_relative_eq!(normal_cdf(1.0), 0.841_344_7, epsilon = 1e-6);
        assert_relative_eq!(normal_cdf(-1.96), 0.024_997_9, epsilon = 1e-6);
    }

    #[test]
    fn spread_favorite_above_half() {
        let p = spread_probability(-7.0, 13.5);
        assert!(p > 0.5);
        assert_relative_eq!(p, normal_cdf(7.0 / 13.5), epsilon = 1e-12);
        assert_relative_eq!(spread_probability(0.0, 13.5), 0.5, epsilon = 1e-7);
    }

    #[test]
    fn standardize_zero_mean_unit_variance() {
        let z = standardize(&[Some(1.0), None, Some(3.0), Some(5.0)]).unwrap();
        assert_eq!(z[1], None);
        let defined: Vec<f64> = z.iter().flatten().copied().collect();
        let mean = defined.iter().sum::<f64>() / 3.0;
        let var = defined.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / 3.0;
        assert_relative_eq!(mean, 0.0, epsilon = 1e-12);
        assert_relative_eq!(var, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn standardize_needs_spread() {
        assert!(standardize(&[Some(2.0)]).is_none());
        assert!(standardize(&[Some(2.0), Some(2.0)]).is_none());
    }

    #[test]
    fn market_prefers_moneyline_then_spread() {
        let cfg = ProbabilityConfig::default();
        let m = matchup(Some(-3.0), Some(-150), Some(130));
        let (p, src) = market_probability(&m, Side::Home, &cfg).unwrap();
        assert_eq!(src, MarketSource::Moneyline);
        assert_relative_eq!(p, 0.6, epsilon = 1e-12);

        let m = matchup(Some(-3.0), None, None);
        let (home, src) = market_probability(&m, Side::Home, &cfg).unwrap();
        let (away, _) = market_probability(&m, Side::Away, &cfg).unwrap();
        assert_eq!(src, MarketSource::Spread);
        assert_relative_eq!(home + away, 1.0, epsilon = 1e-12);

        assert!(market_probability(&matchup(None, None, None), Side::Home, &cfg).is_none());
    }

    #[test]
    fn edge_inverted_for_away_pick() {
        let cfg = ProbabilityConfig::default();
        let m = matchup(None, Some(-150), Some(130));
        // model says home 0.45 → away 0.55; away market 100/230
        let edge = pick_edge(0.45, Side::Away, &m, &cfg).unwrap();
        assert_relative_eq!(edge, 0.55 - 100.0 / 230.0, epsilon = 1e-12);
    }
}

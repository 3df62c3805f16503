//! Prior/current season grade shrinkage.
//!
//! For metric `m` with shrinkage constant `k_m` and `n` games played the
//! current-season weight starts at `n / (n + k_m)`, is floored at
//! `ramp_min_weight` once a game has been played, and is then capped at
//! `ramp_cap_fraction * week / ramp_cap_week` through the ramp window.
//! The cap is applied last, so early-season weeks never exceed it.

use crate::config::BlendConfig;
use crate::db::models::{BlendedGrade, Metric, MetricValues, TeamGrade};

/// Current-season weight in [0, 1]; exactly 0 with no games played.
pub fn blend_weight(games_played: u32, k: f64, current_week: u32, cfg: &BlendConfig) -> f64 {
    if games_played == 0 {
        return 0.0;
    }
    let n = games_played as f64;
    let mut weight = n / (n + k);

    weight = weight.max(cfg.ramp_min_weight);

    if current_week <= cfg.ramp_cap_week {
        let cap = cfg.ramp_cap_fraction * (current_week as f64 / cfg.ramp_cap_week as f64);
        weight = weight.min(cap);
    }

    weight.clamp(0.0, 1.0)
}

/// Blend one metric for one team.
pub fn blend_metric(
    team: &str,
    metric: Metric,
    prior: Option<f64>,
    current: Option<f64>,
    games_played: u32,
    week: u32,
    cfg: &BlendConfig,
) -> BlendedGrade {
    let (weight, blended) = match (prior, current) {
        (Some(p), Some(c)) => {
            let w = blend_weight(games_played, cfg.shrinkage.k(metric), week, cfg);
            (w, Some(w * c + (1.0 - w) * p))
        }
        (Some(p), None) => (0.0, Some(p)),
        (None, Some(c)) => (1.0, Some(c)),
        (None, None) => (0.0, None),
    };
    BlendedGrade {
        team: team.to_string(),
        metric,
        prior_value: prior,
        current_value: current,
        games_played,
        weight_current: weight,
        blended_value: blended,
        week,
    }
}

/// Blend all twelve metrics for a team. Either snapshot may be absent.
pub fn blend_team(
    team: &str,
    prior: Option<&TeamGrade>,
    current: Option<&TeamGrade>,
    week: u32,
    cfg: &BlendConfig,
) -> Vec<BlendedGrade> {
    let games_played = current.map(|c| c.games_played).unwrap_or(0);
    Metric::ALL
        .iter()
        .map(|m| {
            blend_metric(
                team,
                *m,
                prior.and_then(|p| p.grades.get(*m)),
                current.and_then(|c| c.grades.get(*m)),
                games_played,
                week,
                cfg,
            )
        })
        .collect()
}

pub fn blended_values(grades: &[BlendedGrade]) -> MetricValues {
    grades.iter().map(|g| (g.metric, g.blended_value)).collect()
}

/// The grade row the advantage calculator should see for a team.
///
/// With blending disabled this is the raw current-season row, falling back to
/// the prior row for teams with no current snapshot yet.
pub fn team_rating(
    team: &str,
    prior: Option<&TeamGrade>,
    current: Option<&TeamGrade>,
    week: u32,
    cfg: &BlendConfig,
) -> Option<MetricValues> {
    if prior.is_none() && current.is_none() {
        return None;
    }
    if cfg.disable_blend {
        return current.or(prior).map(|g| g.grades);
    }
    Some(blended_values(&blend_team(team, prior, current, week, cfg)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShrinkageConfig;
    use crate::db::models::Vintage;
    use approx::assert_relative_eq;

    fn cfg_k(k: f64) -> BlendConfig {
        BlendConfig {
            shrinkage: ShrinkageConfig::uniform(k),
            ..BlendConfig::default()
        }
    }

    fn grade(vintage: Vintage, ovr: f64, games: u32) -> TeamGrade {
        TeamGrade {
            team: "DET".into(),
            vintage,
            week: if vintage == Vintage::Prior { 0 } else { 2 },
            games_played: games,
            grades: MetricValues::default().with(Metric::Overall, ovr),
        }
    }

    #[test]
    fn early_season_cap_limits_weight() {
        // prior 80, current 70, k=4, two games, week 2 of a 5-week ramp
        let cfg = cfg_k(4.0);
        let w = blend_weight(2, 4.0, 2, &cfg);
        assert_relative_eq!(w, 0.30, epsilon = 1e-12);

        let g = blend_metric("DET", Metric::Overall, Some(80.0), Some(70.0), 2, 2, &cfg);
        assert_relative_eq!(g.weight_current, 0.30, epsilon = 1e-12);
        assert_relative_eq!(g.blended_value.unwrap(), 77.0, epsilon = 1e-9);
    }

    #[test]
    fn zero_games_is_pure_prior() {
        let cfg = cfg_k(4.0);
        assert_eq!(blend_weight(0, 4.0, 9, &cfg), 0.0);
        let g = blend_metric("DET", Metric::Overall, Some(80.0), Some(70.0), 0, 9, &cfg);
        assert_eq!(g.blended_value, Some(80.0));
    }

    #[test]
    fn floor_applies_after_ramp() {
        let cfg = cfg_k(6.0);
        // 1 / 7 ≈ 0.14 raised to the 0.55 floor once the cap is lifted
        assert_relative_eq!(blend_weight(1, 6.0, 8, &cfg), 0.55, epsilon = 1e-12);
        // large n dominates the floor
        assert_relative_eq!(blend_weight(14, 6.0, 15, &cfg), 0.70, epsilon = 1e-12);
    }

    #[test]
    fn weight_in_unit_interval_and_monotone_in_games() {
        for week in 1..=18 {
            for k in [4.0, 5.5, 7.0] {
                let cfg = cfg_k(k);
                let mut last = 0.0;
                for n in 0..=17 {
                    let w = blend_weight(n, k, week, &cfg);
                    assert!((0.0..=1.0).contains(&w));
                    assert!(w >= last, "week {} k {} n {}: {} < {}", week, k, n, w, last);
                    last = w;
                }
            }
        }
    }

    #[test]
    fn missing_side_forces_weight() {
        let cfg = cfg_k(4.0);
        let only_prior = blend_metric("DET", Metric::Defense, Some(65.0), None, 6, 8, &cfg);
        assert_eq!(only_prior.weight_current, 0.0);
        assert_eq!(only_prior.blended_value, Some(65.0));

        let only_current = blend_metric("DET", Metric::Defense, None, Some(71.0), 6, 8, &cfg);
        assert_eq!(only_current.weight_current, 1.0);
        assert_eq!(only_current.blended_value, Some(71.0));

        let neither = blend_metric("DET", Metric::Defense, None, None, 6, 8, &cfg);
        assert_eq!(neither.blended_value, None);
    }

    #[test]
    fn blending_is_idempotent() {
        let cfg = BlendConfig::default();
        let prior = grade(Vintage::Prior, 81.3, 0);
        let current = grade(Vintage::Current, 66.9, 3);
        let a = blend_team("DET", Some(&prior), Some(&current), 4, &cfg);
        let b = blend_team("DET", Some(&prior), Some(&current), 4, &cfg);
        assert_eq!(a, b);
        assert_eq!(
            a[0].blended_value.map(f64::to_bits),
            b[0].blended_value.map(f64::to_bits)
        );
    }

    #[test]
    fn disabled_blend_uses_raw_current() {
        let cfg = BlendConfig {
            disable_blend: true,
            ..BlendConfig::default()
        };
        let prior = grade(Vintage::Prior, 81.0, 0);
        let current = grade(Vintage::Current, 66.0, 3);
        let rating = team_rating("DET", Some(&prior), Some(&current), 4, &cfg).unwrap();
        assert_eq!(rating.get(Metric::Overall), Some(66.0));
        let fallback = team_rating("DET", Some(&prior), None, 4, &cfg).unwrap();
        assert_eq!(fallback.get(Metric::Overall), Some(81.0));
        assert!(team_rating("DET", None, None, 4, &cfg).is_none());
    }
}

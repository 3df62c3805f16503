//! Weekly evaluation: grades → blended ratings → differentials → probabilities.
//!
//! Every stage is a pure function of its inputs; a matchup that cannot be
//! evaluated is skipped with a [`Diagnostic`] and the rest of the week proceeds.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info};

use super::advantage::{compute_advantages, unit_composite};
use super::blend::team_rating;
use super::win_probability::{blended_advantage, standardize, win_probability};
use crate::config::ModelConfig;
use crate::db::models::{Matchup, Metric, MetricValues, TeamGrade, Vintage};
use crate::error::{Diagnostic, SkipReason};

/// Grade snapshots visible when evaluating one week.
#[derive(Debug, Clone, Default)]
pub struct GradeBook {
    prior: HashMap<String, TeamGrade>,
    current: HashMap<String, TeamGrade>,
}

impl GradeBook {
    /// Keep every prior-season row and, per team, the latest current-season
    /// snapshot whose week is not after `week`.
    pub fn as_of(grades: impl IntoIterator<Item = TeamGrade>, week: u32) -> Self {
        let mut book = GradeBook::default();
        for grade in grades {
            match grade.vintage {
                Vintage::Prior => {
                    book.prior.insert(grade.team.clone(), grade);
                }
                Vintage::Current => {
                    if grade.week > week {
                        continue;
                    }
                    let newer = book
                        .current
                        .get(&grade.team)
                        .map_or(true, |existing| grade.week >= existing.week);
                    if newer {
                        book.current.insert(grade.team.clone(), grade);
                    }
                }
            }
        }
        book
    }

    pub fn prior(&self, team: &str) -> Option<&TeamGrade> {
        self.prior.get(team)
    }

    pub fn current(&self, team: &str) -> Option<&TeamGrade> {
        self.current.get(team)
    }
}

/// Everything the decision engine and the tuner need about one matchup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchupEvaluation {
    pub matchup: Matchup,
    pub advantages: MetricValues,
    /// Mean unit-level differential before standardization.
    pub composite: Option<f64>,
    pub normalized_composite: Option<f64>,
    pub blended_advantage: Option<f64>,
    /// Model P(home wins).
    pub home_win_prob: f64,
}

impl MatchupEvaluation {
    /// The scalar fed to the logistic.
    pub fn model_advantage(&self) -> Option<f64> {
        self.blended_advantage.or(self.advantages.get(Metric::Overall))
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WeekEvaluation {
    pub week: u32,
    pub evaluations: Vec<MatchupEvaluation>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Evaluate every matchup scheduled in `week`.
pub fn evaluate_week(
    week: u32,
    book: &GradeBook,
    matchups: &[Matchup],
    cfg: &ModelConfig,
) -> WeekEvaluation {
    let mut diagnostics = Vec::new();
    let mut staged: Vec<(Matchup, MetricValues, Option<f64>)> = Vec::new();

    for m in matchups.iter().filter(|m| m.week == week) {
        let rating = |team: &str| {
            team_rating(team, book.prior(team), book.current(team), week, &cfg.blend)
        };
        let (Some(home), Some(away)) = (rating(&m.home_team), rating(&m.away_team)) else {
            diagnostics.push(
                Diagnostic::new(
                    Some(week),
                    m.key(),
                    SkipReason::InsufficientData("no grades for one or both teams".into()),
                )
                .logged(),
            );
            continue;
        };
        let advantages = compute_advantages(&home, &away);
        if advantages.get(Metric::Overall).is_none() {
            diagnostics.push(
                Diagnostic::new(
                    Some(week),
                    m.key(),
                    SkipReason::UndefinedValue("overall advantage".into()),
                )
                .logged(),
            );
            continue;
        }
        let composite = if cfg.probability.disable_composite {
            None
        } else {
            unit_composite(&advantages)
        };
        staged.push((m.clone(), advantages, composite));
    }

    let composites: Vec<Option<f64>> = staged.iter().map(|(_, _, c)| *c).collect();
    let normalized = standardize(&composites).unwrap_or_else(|| vec![None; staged.len()]);
    if !cfg.probability.disable_composite && normalized.iter().all(Option::is_none) {
        debug!("Week {}: composite signal unavailable, using overall only", week);
    }

    let evaluations: Vec<MatchupEvaluation> = staged
        .into_iter()
        .zip(normalized)
        .filter_map(|((matchup, advantages, composite), z)| {
            let overall = advantages.get(Metric::Overall)?;
            let blended =
                z.map(|z| blended_advantage(overall, z, cfg.probability.composite_weight));
            let advantage = blended.unwrap_or(overall);
            Some(MatchupEvaluation {
                matchup,
                advantages,
                composite,
                normalized_composite: z,
                blended_advantage: blended,
                home_win_prob: win_probability(advantage, cfg.probability.probability_scale),
            })
        })
        .collect();

    info!(
        "Week {}: evaluated {} matchup(s), skipped {}",
        week,
        evaluations.len(),
        diagnostics.len()
    );

    WeekEvaluation {
        week,
        evaluations,
        diagnostics,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_relative_eq;

    pub(crate) fn grade(team: &str, vintage: Vintage, week: u32, games: u32, base: f64) -> TeamGrade {
        TeamGrade {
            team: team.into(),
            vintage,
            week,
            games_played: games,
            grades: Metric::ALL.iter().map(|m| (*m, Some(base))).collect(),
        }
    }

    pub(crate) fn matchup(week: u32, home: &str, away: &str) -> Matchup {
        Matchup {
            week,
            home_team: home.into(),
            away_team: away.into(),
            home_line: Some(-3.0),
            away_line: None,
            home_odds: Some(-150),
            away_odds: Some(130),
            home_score: None,
            away_score: None,
        }
    }

    #[test]
    fn grade_book_takes_latest_snapshot_not_after_week() {
        let grades = vec![
            grade("GB", Vintage::Prior, 0, 17, 70.0),
            grade("GB", Vintage::Current, 2, 1, 60.0),
            grade("GB", Vintage::Current, 4, 3, 65.0),
            grade("GB", Vintage::Current, 6, 5, 90.0),
        ];
        let book = GradeBook::as_of(grades, 5);
        assert_eq!(book.current("GB").unwrap().week, 4);
        assert_eq!(book.prior("GB").unwrap().games_played, 17);
        assert!(book.current("CHI").is_none());
    }

    #[test]
    fn overall_only_probability_when_composite_flat() {
        // every metric identical per team → unit composite equals overall,
        // a single matchup cannot be standardized → overall alone drives P
        let cfg = ModelConfig::default();
        let grades = vec![
            grade("GB", Vintage::Prior, 0, 17, 75.0),
            grade("CHI", Vintage::Prior, 0, 17, 65.0),
        ];
        let book = GradeBook::as_of(grades, 1);
        let week = evaluate_week(1, &book, &[matchup(1, "GB", "CHI")], &cfg);
        assert_eq!(week.evaluations.len(), 1);
        let e = &week.evaluations[0];
        assert_eq!(e.advantages.get(Metric::Overall), Some(10.0));
        assert_eq!(e.blended_advantage, None);
        assert_relative_eq!(e.home_win_prob, win_probability(10.0, 0.10), epsilon = 1e-12);
    }

    #[test]
    fn composite_blends_when_week_has_spread() {
        let cfg = ModelConfig::default();
        let grades = vec![
            grade("GB", Vintage::Prior, 0, 17, 75.0),
            grade("CHI", Vintage::Prior, 0, 17, 65.0),
            grade("DAL", Vintage::Prior, 0, 17, 70.0),
            grade("NYG", Vintage::Prior, 0, 17, 71.0),
        ];
        let book = GradeBook::as_of(grades, 1);
        let week = evaluate_week(
            1,
            &book,
            &[matchup(1, "GB", "CHI"), matchup(1, "DAL", "NYG")],
            &cfg,
        );
        let gb = &week.evaluations[0];
        // composites 10 and −1 → z = +1 and −1
        assert_relative_eq!(gb.normalized_composite.unwrap(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(gb.blended_advantage.unwrap(), 0.7 * 10.0 + 0.3, epsilon = 1e-12);
        let dal = &week.evaluations[1];
        assert_relative_eq!(dal.blended_advantage.unwrap(), 0.7 * -1.0 - 0.3, epsilon = 1e-12);
    }

    #[test]
    fn missing_team_is_skipped_with_diagnostic() {
        let cfg = ModelConfig::default();
        let book = GradeBook::as_of(vec![grade("GB", Vintage::Prior, 0, 17, 75.0)], 1);
        let week = evaluate_week(
            1,
            &book,
            &[matchup(1, "GB", "CHI"), matchup(2, "GB", "DET")],
            &cfg,
        );
        assert!(week.evaluations.is_empty());
        assert_eq!(week.diagnostics.len(), 1);
        assert!(matches!(
            week.diagnostics[0].reason,
            SkipReason::InsufficientData(_)
        ));
    }

    #[test]
    fn evaluation_is_deterministic() {
        let cfg = ModelConfig::default();
        let grades = vec![
            grade("GB", Vintage::Prior, 0, 17, 75.0),
            grade("GB", Vintage::Current, 3, 2, 69.5),
            grade("CHI", Vintage::Prior, 0, 17, 65.0),
            grade("CHI", Vintage::Current, 3, 2, 71.2),
        ];
        let book = GradeBook::as_of(grades, 3);
        let ms = [matchup(3, "GB", "CHI")];
        let a = evaluate_week(3, &book, &ms, &cfg);
        let b = evaluate_week(3, &book, &ms, &cfg);
        assert_eq!(a.evaluations, b.evaluations);
    }
}

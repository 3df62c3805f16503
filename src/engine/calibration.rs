//! Probability calibration: Brier score, log-loss, a binned calibration curve
//! and an optional Platt-scaling suggestion.
//!
//! Platt scaling is `p_calibrated = sigmoid(a * logit(p_raw) + b)`. The fit is
//! reported for review only; it is never applied to live picks.
use serde::Serialize;

use super::pipeline::MatchupEvaluation;
use super::win_probability::sigmoid;
use crate::error::SkipReason;

const EPS: f64 = 1e-6;
pub const CALIBRATION_BINS: usize = 10;
/// Minimum outcomes before a Platt fit is attempted.
const PLATT_MIN_SAMPLES: usize = 8;
const PLATT_MAX_ITERS: usize = 50;
const PLATT_MAX_STEP: f64 = 5.0;
const PLATT_TOLERANCE: f64 = 1e-10;
const PLATT_L2: f64 = 1e-3;

/// A (predicted probability, outcome ∈ {0, 1}) pair.
pub type Sample = (f64, f64);

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlattCalibration {
    pub a: f64,
    pub b: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlattFit {
    pub calibration: PlattCalibration,
    pub logloss_before: f64,
    pub logloss_after: f64,
    pub brier_before: f64,
    pub brier_after: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationBin {
    pub lower: f64,
    pub upper: f64,
    pub predicted_mean: Option<f64>,
    pub actual_freq: Option<f64>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationReport {
    /// `None` for a multi-week report.
    pub week: Option<u32>,
    pub samples: usize,
    pub brier: f64,
    pub log_loss: f64,
    /// Count-weighted mean |predicted − actual| across non-empty bins.
    pub calibration_error: f64,
    pub bins: Vec<CalibrationBin>,
    pub platt: Option<PlattFit>,
}

/// log(p / (1 − p)) with p kept away from 0 and 1.
fn log_odds(p: f64) -> f64 {
    let p = p.clamp(EPS, 1.0 - EPS);
    p.ln() - (1.0 - p).ln()
}

fn sample_log_loss(p: f64, outcome: f64) -> f64 {
    let p = p.clamp(EPS, 1.0 - EPS);
    if outcome > 0.5 {
        -p.ln()
    } else {
        -(1.0 - p).ln()
    }
}

/// Home-win samples from evaluated matchups with a decisive final score.
pub fn samples_from(evaluations: &[MatchupEvaluation]) -> Vec<Sample> {
    evaluations
        .iter()
        .filter_map(|e| e.matchup.home_outcome().map(|y| (e.home_win_prob, y)))
        .collect()
}

pub fn brier_score(samples: &[Sample]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let sum: f64 = samples.iter().map(|(p, y)| (p - y).powi(2)).sum();
    Some(sum / samples.len() as f64)
}

pub fn log_loss(samples: &[Sample]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let sum: f64 = samples.iter().map(|(p, y)| sample_log_loss(*p, *y)).sum();
    Some(sum / samples.len() as f64)
}

/// Equal-width probability bins; p = 1.0 lands in the top bin.
pub fn calibration_bins(samples: &[Sample], bins: usize) -> Vec<CalibrationBin> {
    let bins = bins.max(1);
    let mut sums = vec![(0.0f64, 0.0f64, 0usize); bins];
    for (p, y) in samples {
        let idx = ((p.clamp(0.0, 1.0) * bins as f64) as usize).min(bins - 1);
        sums[idx].0 += p;
        sums[idx].1 += y;
        sums[idx].2 += 1;
    }
    sums.into_iter()
        .enumerate()
        .map(|(i, (p_sum, y_sum, count))| {
            let (predicted_mean, actual_freq) = if count > 0 {
                (Some(p_sum / count as f64), Some(y_sum / count as f64))
            } else {
                (None, None)
            };
            CalibrationBin {
                lower: i as f64 / bins as f64,
                upper: (i + 1) as f64 / bins as f64,
                predicted_mean,
                actual_freq,
                count,
            }
        })
        .collect()
}

fn expected_calibration_error(bins: &[CalibrationBin], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    bins.iter()
        .filter_map(|b| {
            let (p, y) = (b.predicted_mean?, b.actual_freq?);
            Some(b.count as f64 * (p - y).abs())
        })
        .sum::<f64>()
        / total as f64
}

pub fn apply_platt(raw_prob: f64, model: PlattCalibration) -> f64 {
    sigmoid(model.a * log_odds(raw_prob) + model.b)
}

/// Newton fit of the Platt parameters with a small ridge penalty on `a`.
/// `None` with too few samples, a single outcome class, or a singular system.
pub fn fit_platt(samples: &[Sample], max_iters: usize, l2: f64) -> Option<PlattFit> {
    if samples.len() < PLATT_MIN_SAMPLES {
        return None;
    }
    let wins = samples.iter().filter(|(_, y)| *y > 0.5).count();
    if wins == 0 || wins == samples.len() {
        return None;
    }

    let xs: Vec<f64> = samples.iter().map(|(p, _)| log_odds(*p)).collect();
    let n = samples.len() as f64;
    let (mut a, mut b) = (1.0f64, 0.0f64);

    for _ in 0..max_iters {
        // gradient (ga, gb) and Hessian [[haa, hab], [hab, hbb]] of the mean loss
        let (mut ga, mut gb, mut haa, mut hab, mut hbb) = (0.0, 0.0, 0.0, 0.0, 0.0);
        for (x, (_, y)) in xs.iter().zip(samples) {
            let s = sigmoid(a * x + b);
            let w = s * (1.0 - s);
            ga += (s - y) * x;
            gb += s - y;
            haa += w * x * x;
            hab += w * x;
            hbb += w;
        }
        ga = ga / n + l2 * a;
        gb /= n;
        haa = haa / n + l2;
        hab /= n;
        hbb /= n;

        let det = haa * hbb - hab * hab;
        if det.abs() < 1e-12 {
            return None;
        }
        let mut da = (hbb * ga - hab * gb) / det;
        let mut db = (haa * gb - hab * ga) / det;
        let norm = da.hypot(db);
        if norm > PLATT_MAX_STEP {
            da *= PLATT_MAX_STEP / norm;
            db *= PLATT_MAX_STEP / norm;
        }
        a -= da;
        b -= db;
        if !(a.is_finite() && b.is_finite()) {
            return None;
        }
        if norm < PLATT_TOLERANCE {
            break;
        }
    }

    let calibration = PlattCalibration { a, b };
    let recalibrated: Vec<Sample> = samples
        .iter()
        .map(|(p, y)| (apply_platt(*p, calibration), *y))
        .collect();
    Some(PlattFit {
        calibration,
        logloss_before: log_loss(samples)?,
        logloss_after: log_loss(&recalibrated)?,
        brier_before: brier_score(samples)?,
        brier_after: brier_score(&recalibrated)?,
    })
}

/// Full report, or `InsufficientData` when no outcome is known yet.
pub fn calibration_report(week: Option<u32>, samples: &[Sample]) -> Result<CalibrationReport, SkipReason> {
    let (Some(brier), Some(log_loss)) = (brier_score(samples), log_loss(samples)) else {
        return Err(SkipReason::InsufficientData(
            "no completed games with a decisive result".into(),
        ));
    };
    let bins = calibration_bins(samples, CALIBRATION_BINS);
    let calibration_error = expected_calibration_error(&bins, samples.len());
    Ok(CalibrationReport {
        week,
        samples: samples.len(),
        brier,
        log_loss,
        calibration_error,
        bins,
        platt: fit_platt(samples, PLATT_MAX_ITERS, PLATT_L2),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn brier_and_log_loss_known_values() {
        let samples = [(0.8, 1.0), (0.3, 0.0), (0.6, 0.0)];
        // (0.04 + 0.09 + 0.36) / 3
        assert_relative_eq!(brier_score(&samples).unwrap(), 0.49 / 3.0, epsilon = 1e-12);
        let expected = -((0.8f64).ln() + (0.7f64).ln() + (0.4f64).ln()) / 3.0;
        assert_relative_eq!(log_loss(&samples).unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn bins_are_equal_width_and_count_everything() {
        let samples = [(0.05, 0.0), (0.15, 1.0), (0.12, 0.0), (0.95, 1.0), (1.0, 1.0)];
        let bins = calibration_bins(&samples, 10);
        assert_eq!(bins.len(), 10);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), samples.len());
        assert_eq!(bins[1].count, 2);
        assert_relative_eq!(bins[1].predicted_mean.unwrap(), 0.135, epsilon = 1e-12);
        assert_relative_eq!(bins[1].actual_freq.unwrap(), 0.5, epsilon = 1e-12);
        assert_eq!(bins[9].count, 2);
        assert_eq!(bins[5].predicted_mean, None);
        assert_relative_eq!(bins[3].lower, 0.3, epsilon = 1e-12);
    }

    #[test]
    fn report_requires_outcomes() {
        assert!(matches!(
            calibration_report(Some(3), &[]),
            Err(SkipReason::InsufficientData(_))
        ));
    }

    #[test]
    fn perfectly_calibrated_bins_have_zero_error() {
        let mut samples = Vec::new();
        for i in 0..10 {
            samples.push((0.25, if i < 1 { 1.0 } else { 0.0 }));
        }
        let exact = [(0.25, 1.0), (0.25, 0.0), (0.25, 0.0), (0.25, 0.0)];
        let report = calibration_report(None, &exact).unwrap();
        assert_relative_eq!(report.calibration_error, 0.0, epsilon = 1e-12);
        // ten at 0.25 with a single hit: actual 0.10
        let skewed = calibration_report(None, &samples).unwrap();
        assert_relative_eq!(skewed.calibration_error, 0.15, epsilon = 1e-12);
    }

    #[test]
    fn platt_shrinks_overconfident_forecasts() {
        // forecasts at 10/30/70/90% that actually hit 30/40/60/70%
        let mut samples = Vec::new();
        for (p, hits) in [(0.1, 3), (0.3, 4), (0.7, 6), (0.9, 7)] {
            for i in 0..10 {
                samples.push((p, if i < hits { 1.0 } else { 0.0 }));
            }
        }
        let fit = fit_platt(&samples, 50, 1e-3).unwrap();
        assert!(fit.calibration.a > 0.0 && fit.calibration.a < 1.0);
        assert_relative_eq!(fit.calibration.b, 0.0, epsilon = 1e-6);
        assert!(fit.logloss_after < fit.logloss_before);
        assert!(fit.brier_after < fit.brier_before);
    }

    #[test]
    fn platt_needs_both_classes() {
        let samples = vec![(0.7, 1.0); 20];
        assert!(fit_platt(&samples, 50, 1e-3).is_none());
        assert!(fit_platt(&[(0.7, 1.0), (0.2, 0.0)], 50, 1e-3).is_none());
    }

    #[test]
    fn identity_platt_leaves_probabilities_alone() {
        let m = PlattCalibration { a: 1.0, b: 0.0 };
        assert_relative_eq!(apply_platt(0.37, m), 0.37, epsilon = 1e-9);
        assert!((0.0..=1.0).contains(&apply_platt(0.999_999_9, PlattCalibration { a: 3.0, b: 2.0 })));
    }
}

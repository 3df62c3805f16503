//! Directional differentials between a home and away grade row.
//!
//! Each differential is keyed by the home-side metric it starts from, so the
//! result reuses [`MetricValues`]. Undefined inputs give undefined outputs.

use crate::db::models::{Metric, MetricValues};

fn diff(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    Some(a? - b?)
}

fn avg(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    Some((a? + b?) / 2.0)
}

/// Compute the twelve matchup differentials from the home team's perspective.
pub fn compute_advantages(home: &MetricValues, away: &MetricValues) -> MetricValues {
    use Metric::*;
    let h = |m: Metric| home.get(m);
    let a = |m: Metric| away.get(m);

    let mut out = MetricValues::default();
    out.set(Overall, diff(h(Overall), a(Overall)));
    out.set(Offense, diff(h(Offense), a(Defense)));
    out.set(Defense, diff(h(Defense), a(Offense)));
    out.set(Passing, diff(h(Passing), a(Coverage)));
    out.set(PassBlock, diff(h(PassBlock), a(PassRush)));
    out.set(Receiving, diff(h(Receiving), a(Coverage)));
    out.set(Running, diff(h(Running), a(RunDefense)));
    out.set(RunBlock, diff(h(RunBlock), a(RunDefense)));
    out.set(RunDefense, diff(h(RunDefense), avg(a(Running), a(RunBlock))));
    out.set(PassRush, diff(h(PassRush), avg(a(PassBlock), a(Passing))));
    out.set(Coverage, diff(h(Coverage), avg(a(Receiving), a(PassBlock))));
    out.set(Tackling, diff(h(Tackling), a(Running)));
    out
}

/// Mean of the defined unit-level differentials; `None` when none are defined.
pub fn unit_composite(advantages: &MetricValues) -> Option<f64> {
    let defined: Vec<f64> = Metric::UNITS
        .iter()
        .filter_map(|m| advantages.get(*m))
        .collect();
    if defined.is_empty() {
        return None;
    }
    Some(defined.iter().sum::<f64>() / defined.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn row(values: [f64; 12]) -> MetricValues {
        Metric::ALL
            .iter()
            .zip(values)
            .map(|(m, v)| (*m, Some(v)))
            .collect()
    }

    #[test]
    fn differentials_cross_match_units() {
        // OVR OFF DEF PASS PBLK RECV RUN RBLK PRSH COV RDEF TACK
        let home = row([80.0, 75.0, 70.0, 72.0, 68.0, 66.0, 64.0, 62.0, 78.0, 74.0, 71.0, 60.0]);
        let away = row([70.0, 65.0, 73.0, 60.0, 58.0, 63.0, 67.0, 69.0, 76.0, 62.0, 61.0, 55.0]);
        let adv = compute_advantages(&home, &away);

        assert_relative_eq!(adv.get(Metric::Overall).unwrap(), 10.0);
        assert_relative_eq!(adv.get(Metric::Offense).unwrap(), 75.0 - 73.0);
        assert_relative_eq!(adv.get(Metric::Defense).unwrap(), 70.0 - 65.0);
        assert_relative_eq!(adv.get(Metric::Passing).unwrap(), 72.0 - 62.0);
        assert_relative_eq!(adv.get(Metric::PassBlock).unwrap(), 68.0 - 76.0);
        assert_relative_eq!(adv.get(Metric::Receiving).unwrap(), 66.0 - 62.0);
        assert_relative_eq!(adv.get(Metric::Running).unwrap(), 64.0 - 61.0);
        assert_relative_eq!(adv.get(Metric::RunBlock).unwrap(), 62.0 - 61.0);
        assert_relative_eq!(adv.get(Metric::RunDefense).unwrap(), 71.0 - (67.0 + 69.0) / 2.0);
        assert_relative_eq!(adv.get(Metric::PassRush).unwrap(), 78.0 - (58.0 + 60.0) / 2.0);
        assert_relative_eq!(adv.get(Metric::Coverage).unwrap(), 74.0 - (63.0 + 58.0) / 2.0);
        assert_relative_eq!(adv.get(Metric::Tackling).unwrap(), 60.0 - 67.0);
    }

    #[test]
    fn missing_metric_is_undefined_not_zero() {
        let home = MetricValues::default()
            .with(Metric::Overall, 70.0)
            .with(Metric::RunDefense, 65.0);
        let away = MetricValues::default()
            .with(Metric::Overall, 70.0)
            .with(Metric::Running, 60.0);
        let adv = compute_advantages(&home, &away);
        assert_eq!(adv.get(Metric::Overall), Some(0.0));
        // away RBLK missing → average undefined
        assert_eq!(adv.get(Metric::RunDefense), None);
        assert_eq!(adv.get(Metric::Offense), None);
    }

    #[test]
    fn composite_averages_defined_units_only() {
        let adv = MetricValues::default()
            .with(Metric::Overall, 50.0)
            .with(Metric::Passing, 2.0)
            .with(Metric::Coverage, -4.0);
        assert_relative_eq!(unit_composite(&adv).unwrap(), -1.0);
        assert_eq!(unit_composite(&MetricValues::default().with(Metric::Overall, 1.0)), None);
    }
}

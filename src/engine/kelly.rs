//! Fractional Kelly sizing for one side at American odds.
//!
//! With net payout `b` per unit staked (decimal price − 1) and win
//! probability `p`, the full-Kelly bankroll share is `p − (1 − p) / b`.
//! The result is scaled by the configured fraction.

use super::odds::to_decimal;

/// Share of bankroll to stake, in [0, 1]. Zero without a positive edge.
pub fn kelly_stake(win_prob: f64, odds: i32, kelly_fraction: f64) -> f64 {
    let net_payout = to_decimal(odds) - 1.0;
    if net_payout <= 0.0 || !(0.0..=1.0).contains(&win_prob) {
        return 0.0;
    }
    let full = win_prob - (1.0 - win_prob) / net_payout;
    if full > 0.0 {
        (full * kelly_fraction.clamp(0.0, 1.0)).min(1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn coin_flip_at_even_money_stakes_nothing() {
        assert_relative_eq!(kelly_stake(0.5, 100, 1.0), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn even_money_edge() {
        // 0.6 − 0.4 / 1
        assert_relative_eq!(kelly_stake(0.6, 100, 1.0), 0.2, epsilon = 1e-12);
        assert_relative_eq!(kelly_stake(0.6, 100, 0.25), 0.05, epsilon = 1e-12);
    }

    #[test]
    fn favourite_price_needs_more_than_implied() {
        // −110 implies ≈ 52.4%
        assert_eq!(kelly_stake(0.52, -110, 1.0), 0.0);
        let f = kelly_stake(0.56, -110, 1.0);
        assert_relative_eq!(f, 0.56 - 0.44 / (100.0 / 110.0), epsilon = 1e-12);
    }

    #[test]
    fn underdog_stake_bounded() {
        let f = kelly_stake(0.99, 900, 1.0);
        assert!(f > 0.0 && f <= 1.0);
        assert_eq!(kelly_stake(1.5, 900, 1.0), 0.0);
    }
}

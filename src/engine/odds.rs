//! American / decimal odds conversions and settlement math.
//!
//! American odds: +150 wins $150 on a $100 stake, −150 needs $150 to win $100.
//! Decimal odds: total return per unit staked, stake included.

/// Implied probability of American odds (vig included).
pub fn implied_probability(odds: i32) -> f64 {
    let o = odds as f64;
    if odds > 0 {
        100.0 / (o + 100.0)
    } else {
        let abs = o.abs();
        abs / (abs + 100.0)
    }
}

/// American odds → decimal price.
pub fn to_decimal(odds: i32) -> f64 {
    let o = odds as f64;
    if odds > 0 {
        1.0 + o / 100.0
    } else {
        1.0 + 100.0 / o.abs()
    }
}

/// Decimal price → American odds, rounded to the nearest integer.
/// Returns `None` for prices at or below even money's lower bound (≤ 1.0).
pub fn to_american(decimal: f64) -> Option<i32> {
    if !(decimal > 1.0) || !decimal.is_finite() {
        return None;
    }
    let american = if decimal >= 2.0 {
        (decimal - 1.0) * 100.0
    } else {
        -100.0 / (decimal - 1.0)
    };
    Some(american.round() as i32)
}

/// Net profit on a winning stake at American odds.
pub fn win_profit(stake: f64, odds: i32) -> f64 {
    let o = odds as f64;
    if odds > 0 {
        stake * o / 100.0
    } else {
        stake * 100.0 / o.abs()
    }
}

/// Net profit on a winning stake at a decimal price.
pub fn payout(stake: f64, decimal: f64) -> f64 {
    stake * (decimal - 1.0)
}

/// Expected profit per unit staked given a win probability.
pub fn expected_value(win_prob: f64, odds: i32) -> f64 {
    win_prob * win_profit(1.0, odds) - (1.0 - win_prob)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn implied_probability_both_signs() {
        assert_relative_eq!(implied_probability(150), 0.4, epsilon = 1e-12);
        assert_relative_eq!(implied_probability(-150), 0.6, epsilon = 1e-12);
        assert_relative_eq!(implied_probability(100), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn decimal_conversion() {
        assert_relative_eq!(to_decimal(140), 2.4, epsilon = 1e-12);
        assert_relative_eq!(to_decimal(-135), 1.0 + 100.0 / 135.0, epsilon = 1e-12);
        assert_relative_eq!(to_decimal(-110), 1.909_090_909, epsilon = 1e-6);
    }

    #[test]
    fn american_from_decimal() {
        assert_eq!(to_american(2.4), Some(140));
        assert_eq!(to_american(to_decimal(-135)), Some(-135));
        assert_eq!(to_american(1.0), None);
    }

    #[test]
    fn favorite_win_pays_less_than_stake() {
        // $10 at −135 → 7.41
        assert_relative_eq!(win_profit(10.0, -135), 7.407_407, epsilon = 1e-5);
        assert_relative_eq!(win_profit(10.0, 140), 14.0, epsilon = 1e-12);
        assert_relative_eq!(payout(10.0, to_decimal(140)), 14.0, epsilon = 1e-12);
    }

    #[test]
    fn expected_value_sign() {
        assert!(expected_value(0.6, 150) > 0.0);
        assert!(expected_value(0.4, -150) < 0.0);
        assert_relative_eq!(expected_value(0.5, 100), 0.0, epsilon = 1e-12);
    }
}

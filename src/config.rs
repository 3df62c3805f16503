use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::db::models::Metric;
use crate::engine::tuner::GridAxis;
use crate::error::ConfigError;

pub const DEFAULT_RAMP_CAP_WEEK: u32 = 5;
pub const DEFAULT_RAMP_CAP_FRACTION: f64 = 0.75;
pub const DEFAULT_RAMP_MIN_WEIGHT: f64 = 0.55;
pub const DEFAULT_PROBABILITY_SCALE: f64 = 0.10;
pub const DEFAULT_COMPOSITE_WEIGHT: f64 = 0.70;
pub const DEFAULT_SPREAD_STDDEV: f64 = 13.5;
pub const DEFAULT_THRESHOLD: f64 = 2.0;
pub const DEFAULT_MAX_PICKS: usize = 8;
pub const DEFAULT_KELLY_FRACTION: f64 = 0.25;
pub const DEFAULT_TEASER_POINTS: f64 = 6.0;
pub const DEFAULT_TEASER_PRICES: [i32; 4] = [-135, 140, 240, 333];
pub const DEFAULT_STAKE: f64 = 10.0;
pub const DEFAULT_FALLBACK_ODDS: i32 = -110;

/// Weekly team-grade pick engine
#[derive(Parser, Debug, Clone)]
#[command(name = "edgeline", version, about)]
pub struct Config {
    /// SQLite database path
    #[arg(long, env = "DATABASE_PATH", default_value = "edgeline.db")]
    pub database_path: String,

    #[command(flatten)]
    pub model: ModelConfig,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Load grade and matchup records from JSON files into the database
    Import {
        /// JSON array of grade records
        #[arg(long)]
        grades: Option<PathBuf>,
        /// JSON array of matchup records
        #[arg(long)]
        matchups: Option<PathBuf>,
    },
    /// Compute and store the week's picks (replaces any earlier run)
    Picks {
        #[arg(long)]
        week: u32,
    },
    /// Grade the week's stored picks, straight and teased
    Grade {
        #[arg(long)]
        week: u32,
    },
    /// Picks followed by grading for one week
    Run {
        #[arg(long)]
        week: u32,
    },
    /// Probability calibration report for one week, or every completed week
    Calibrate {
        #[arg(long)]
        week: Option<u32>,
    },
    /// Parlay / teaser combinations over the week's stored picks
    Combos {
        #[arg(long)]
        week: u32,
        /// Only report combinations of this size
        #[arg(long)]
        size: Option<usize>,
    },
    /// Grid-search significance thresholds over completed weeks
    Tune {
        /// Overall threshold axis, start:end:step
        #[arg(long, default_value = "1:5:0.5")]
        overall: GridAxis,
        /// Offense threshold axis, start:end:step
        #[arg(long, default_value = "1:5:0.5")]
        offense: GridAxis,
        /// Defense threshold axis, start:end:step
        #[arg(long, default_value = "1:5:0.5")]
        defense: GridAxis,
        /// Candidates producing fewer picks are discarded
        #[arg(long, default_value_t = 10)]
        min_picks: usize,
        #[arg(long)]
        from_week: Option<u32>,
        #[arg(long)]
        to_week: Option<u32>,
        /// Number of ranked candidates to print
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Season record, units and teaser-combo results over all graded weeks
    Summary,
}

/// Immutable model configuration passed into every engine call.
#[derive(Args, Debug, Clone, PartialEq, Default)]
pub struct ModelConfig {
    #[command(flatten)]
    pub blend: BlendConfig,
    #[command(flatten)]
    pub probability: ProbabilityConfig,
    #[command(flatten)]
    pub picks: PickConfig,
    #[command(flatten)]
    pub wagers: WagerConfig,
}

impl ModelConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.blend.validate()?;
        self.probability.validate()?;
        self.picks.validate()?;
        self.wagers.validate()?;
        Ok(())
    }
}

/// Per-metric shrinkage constants `k_m` for the grade blender.
#[derive(Args, Debug, Clone, PartialEq)]
pub struct ShrinkageConfig {
    #[arg(long, env = "K_OVERALL", default_value_t = 5.0)]
    pub k_overall: f64,
    #[arg(long, env = "K_OFFENSE", default_value_t = 5.0)]
    pub k_offense: f64,
    #[arg(long, env = "K_DEFENSE", default_value_t = 6.0)]
    pub k_defense: f64,
    #[arg(long, env = "K_PASSING", default_value_t = 4.0)]
    pub k_passing: f64,
    #[arg(long, env = "K_PASS_BLOCK", default_value_t = 6.0)]
    pub k_pass_block: f64,
    #[arg(long, env = "K_RECEIVING", default_value_t = 5.0)]
    pub k_receiving: f64,
    #[arg(long, env = "K_RUNNING", default_value_t = 5.0)]
    pub k_running: f64,
    #[arg(long, env = "K_RUN_BLOCK", default_value_t = 6.0)]
    pub k_run_block: f64,
    #[arg(long, env = "K_PASS_RUSH", default_value_t = 5.0)]
    pub k_pass_rush: f64,
    #[arg(long, env = "K_COVERAGE", default_value_t = 7.0)]
    pub k_coverage: f64,
    #[arg(long, env = "K_RUN_DEFENSE", default_value_t = 6.0)]
    pub k_run_defense: f64,
    #[arg(long, env = "K_TACKLING", default_value_t = 7.0)]
    pub k_tackling: f64,
}

impl ShrinkageConfig {
    pub fn k(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Overall => self.k_overall,
            Metric::Offense => self.k_offense,
            Metric::Defense => self.k_defense,
            Metric::Passing => self.k_passing,
            Metric::PassBlock => self.k_pass_block,
            Metric::Receiving => self.k_receiving,
            Metric::Running => self.k_running,
            Metric::RunBlock => self.k_run_block,
            Metric::PassRush => self.k_pass_rush,
            Metric::Coverage => self.k_coverage,
            Metric::RunDefense => self.k_run_defense,
            Metric::Tackling => self.k_tackling,
        }
    }

    /// Same constant for every metric.
    pub fn uniform(k: f64) -> Self {
        ShrinkageConfig {
            k_overall: k,
            k_offense: k,
            k_defense: k,
            k_passing: k,
            k_pass_block: k,
            k_receiving: k,
            k_running: k,
            k_run_block: k,
            k_pass_rush: k,
            k_coverage: k,
            k_run_defense: k,
            k_tackling: k,
        }
    }
}

impl Default for ShrinkageConfig {
    fn default() -> Self {
        ShrinkageConfig {
            k_overall: 5.0,
            k_offense: 5.0,
            k_defense: 6.0,
            k_passing: 4.0,
            k_pass_block: 6.0,
            k_receiving: 5.0,
            k_running: 5.0,
            k_run_block: 6.0,
            k_pass_rush: 5.0,
            k_coverage: 7.0,
            k_run_defense: 6.0,
            k_tackling: 7.0,
        }
    }
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct BlendConfig {
    /// Use raw current-season grades instead of the prior/current blend
    #[arg(long, env = "DISABLE_BLEND", default_value = "false")]
    pub disable_blend: bool,

    #[command(flatten)]
    pub shrinkage: ShrinkageConfig,

    /// Last league week of the early-season weight cap
    #[arg(long, env = "RAMP_CAP_WEEK", default_value_t = DEFAULT_RAMP_CAP_WEEK)]
    pub ramp_cap_week: u32,

    /// Maximum current-season weight reached at the end of the ramp
    #[arg(long, env = "RAMP_CAP_FRACTION", default_value_t = DEFAULT_RAMP_CAP_FRACTION)]
    pub ramp_cap_fraction: f64,

    /// Minimum current-season weight once a team has played a game
    #[arg(long, env = "RAMP_MIN_WEIGHT", default_value_t = DEFAULT_RAMP_MIN_WEIGHT)]
    pub ramp_min_weight: f64,
}

impl Default for BlendConfig {
    fn default() -> Self {
        BlendConfig {
            disable_blend: false,
            shrinkage: ShrinkageConfig::default(),
            ramp_cap_week: DEFAULT_RAMP_CAP_WEEK,
            ramp_cap_fraction: DEFAULT_RAMP_CAP_FRACTION,
            ramp_min_weight: DEFAULT_RAMP_MIN_WEIGHT,
        }
    }
}

impl BlendConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        for metric in Metric::ALL {
            positive("shrinkage constant", self.shrinkage.k(metric))?;
        }
        if self.ramp_cap_week == 0 {
            return Err(ConfigError::NotPositive {
                field: "ramp_cap_week",
                value: 0.0,
            });
        }
        unit_interval("ramp_cap_fraction", self.ramp_cap_fraction)?;
        unit_interval("ramp_min_weight", self.ramp_min_weight)?;
        Ok(())
    }
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct ProbabilityConfig {
    /// Logistic scale K in P = 1 / (1 + exp(-K * advantage))
    #[arg(long, env = "PROBABILITY_SCALE", default_value_t = DEFAULT_PROBABILITY_SCALE)]
    pub probability_scale: f64,

    /// Weight α of the overall differential when blending with the composite signal
    #[arg(long, env = "COMPOSITE_WEIGHT", default_value_t = DEFAULT_COMPOSITE_WEIGHT)]
    pub composite_weight: f64,

    /// Ignore the unit-level composite signal
    #[arg(long, env = "DISABLE_COMPOSITE", default_value = "false")]
    pub disable_composite: bool,

    /// Standard deviation of the final margin around the spread, in points
    #[arg(long, env = "SPREAD_STDDEV", default_value_t = DEFAULT_SPREAD_STDDEV)]
    pub spread_stddev: f64,
}

impl Default for ProbabilityConfig {
    fn default() -> Self {
        ProbabilityConfig {
            probability_scale: DEFAULT_PROBABILITY_SCALE,
            composite_weight: DEFAULT_COMPOSITE_WEIGHT,
            disable_composite: false,
            spread_stddev: DEFAULT_SPREAD_STDDEV,
        }
    }
}

impl ProbabilityConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        positive("probability_scale", self.probability_scale)?;
        unit_interval("composite_weight", self.composite_weight)?;
        positive("spread_stddev", self.spread_stddev)?;
        Ok(())
    }
}

/// How the individual signals combine into a side.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecisionRule {
    /// Any signal fires for a side and none opposes it
    #[default]
    Disjunctive,
    /// Every defined signal must fire for the same side
    Conjunctive,
}

/// Significance thresholds for the voting signals.
#[derive(Args, Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    #[arg(long, env = "THRESHOLD_OVERALL", default_value_t = DEFAULT_THRESHOLD)]
    pub threshold_overall: f64,
    #[arg(long, env = "THRESHOLD_OFFENSE", default_value_t = DEFAULT_THRESHOLD)]
    pub threshold_offense: f64,
    #[arg(long, env = "THRESHOLD_DEFENSE", default_value_t = DEFAULT_THRESHOLD)]
    pub threshold_defense: f64,
    #[arg(long, env = "THRESHOLD_BLENDED", default_value_t = DEFAULT_THRESHOLD)]
    pub threshold_blended: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            threshold_overall: DEFAULT_THRESHOLD,
            threshold_offense: DEFAULT_THRESHOLD,
            threshold_defense: DEFAULT_THRESHOLD,
            threshold_blended: DEFAULT_THRESHOLD,
        }
    }
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct PickConfig {
    #[command(flatten)]
    pub thresholds: Thresholds,

    #[arg(long, env = "DECISION_RULE", value_enum, default_value_t = DecisionRule::Disjunctive)]
    pub decision_rule: DecisionRule,

    /// Drop picks whose absolute edge is below this (unset = no filter)
    #[arg(long, env = "MIN_EDGE")]
    pub min_edge: Option<f64>,

    /// Maximum picks stored per week
    #[arg(long, env = "MAX_PICKS", default_value_t = DEFAULT_MAX_PICKS)]
    pub max_picks: usize,

    /// Fractional Kelly multiplier for stake suggestions (0.0–1.0)
    #[arg(long, env = "KELLY_FRACTION", default_value_t = DEFAULT_KELLY_FRACTION)]
    pub kelly_fraction: f64,
}

impl Default for PickConfig {
    fn default() -> Self {
        PickConfig {
            thresholds: Thresholds::default(),
            decision_rule: DecisionRule::Disjunctive,
            min_edge: None,
            max_picks: DEFAULT_MAX_PICKS,
            kelly_fraction: DEFAULT_KELLY_FRACTION,
        }
    }
}

impl PickConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.thresholds;
        non_negative("threshold_overall", t.threshold_overall)?;
        non_negative("threshold_offense", t.threshold_offense)?;
        non_negative("threshold_defense", t.threshold_defense)?;
        non_negative("threshold_blended", t.threshold_blended)?;
        if let Some(min_edge) = self.min_edge {
            unit_interval("min_edge", min_edge)?;
        }
        if self.max_picks == 0 {
            return Err(ConfigError::NotPositive {
                field: "max_picks",
                value: 0.0,
            });
        }
        unit_interval("kelly_fraction", self.kelly_fraction)?;
        Ok(())
    }
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct WagerConfig {
    /// Points added to each leg's line when teased
    #[arg(long, env = "TEASER_POINTS", default_value_t = DEFAULT_TEASER_POINTS)]
    pub teaser_points: f64,

    /// House price for a 2-leg teaser (American odds)
    #[arg(long, env = "TEASER_PRICE_2", default_value_t = DEFAULT_TEASER_PRICES[0], allow_negative_numbers = true)]
    pub teaser_price_2: i32,
    /// House price for a 3-leg teaser
    #[arg(long, env = "TEASER_PRICE_3", default_value_t = DEFAULT_TEASER_PRICES[1], allow_negative_numbers = true)]
    pub teaser_price_3: i32,
    /// House price for a 4-leg teaser
    #[arg(long, env = "TEASER_PRICE_4", default_value_t = DEFAULT_TEASER_PRICES[2], allow_negative_numbers = true)]
    pub teaser_price_4: i32,
    /// House price for a 5-leg teaser
    #[arg(long, env = "TEASER_PRICE_5", default_value_t = DEFAULT_TEASER_PRICES[3], allow_negative_numbers = true)]
    pub teaser_price_5: i32,

    /// Stake per wager used in backtests and payout reports (USD)
    #[arg(long, env = "STAKE", default_value_t = DEFAULT_STAKE)]
    pub stake: f64,

    /// Odds assumed for a side with no posted price
    #[arg(long, env = "FALLBACK_ODDS", default_value_t = DEFAULT_FALLBACK_ODDS, allow_negative_numbers = true)]
    pub fallback_odds: i32,
}

impl Default for WagerConfig {
    fn default() -> Self {
        WagerConfig {
            teaser_points: DEFAULT_TEASER_POINTS,
            teaser_price_2: DEFAULT_TEASER_PRICES[0],
            teaser_price_3: DEFAULT_TEASER_PRICES[1],
            teaser_price_4: DEFAULT_TEASER_PRICES[2],
            teaser_price_5: DEFAULT_TEASER_PRICES[3],
            stake: DEFAULT_STAKE,
            fallback_odds: DEFAULT_FALLBACK_ODDS,
        }
    }
}

impl WagerConfig {
    /// Fixed house price for a teaser of `legs` legs, if one is offered.
    pub fn teaser_price(&self, legs: usize) -> Option<i32> {
        match legs {
            2 => Some(self.teaser_price_2),
            3 => Some(self.teaser_price_3),
            4 => Some(self.teaser_price_4),
            5 => Some(self.teaser_price_5),
            _ => None,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        positive("teaser_points", self.teaser_points)?;
        positive("stake", self.stake)?;
        for (field, odds) in [
            ("teaser_price_2", self.teaser_price_2),
            ("teaser_price_3", self.teaser_price_3),
            ("teaser_price_4", self.teaser_price_4),
            ("teaser_price_5", self.teaser_price_5),
            ("fallback_odds", self.fallback_odds),
        ] {
            if odds.abs() < 100 {
                return Err(ConfigError::InvalidOdds { field, value: odds });
            }
        }
        Ok(())
    }
}

fn unit_interval(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::OutOfRange {
            field,
            min: 0.0,
            max: 1.0,
            value,
        });
    }
    Ok(())
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(value > 0.0 && value.is_finite()) {
        return Err(ConfigError::NotPositive { field, value });
    }
    Ok(())
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(value >= 0.0 && value.is_finite()) {
        return Err(ConfigError::OutOfRange {
            field,
            min: 0.0,
            max: f64::INFINITY,
            value,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(ModelConfig::default().validate().is_ok());
    }

    #[test]
    fn cli_defaults_match_default_impl() {
        let cfg = Config::parse_from(["edgeline", "summary"]);
        assert_eq!(cfg.model, ModelConfig::default());
    }

    #[test]
    fn composite_weight_outside_unit_interval_rejected() {
        let mut cfg = ModelConfig::default();
        cfg.probability.composite_weight = 1.2;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::OutOfRange {
                field: "composite_weight",
                ..
            })
        ));
    }

    #[test]
    fn odds_inside_dead_zone_rejected() {
        let mut cfg = ModelConfig::default();
        cfg.wagers.teaser_price_3 = 50;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidOdds { .. })
        ));
    }

    #[test]
    fn zero_teaser_points_rejected() {
        let mut cfg = ModelConfig::default();
        cfg.wagers.teaser_points = 0.0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::NotPositive {
                field: "teaser_points",
                ..
            })
        ));
        let cli = Config::parse_from(["edgeline", "--teaser-points", "0", "summary"]);
        assert!(cli.model.validate().is_err());
    }

    #[test]
    fn negative_teaser_price_parses_from_cli() {
        let cfg = Config::parse_from(["edgeline", "--teaser-price-2", "-120", "summary"]);
        assert_eq!(cfg.model.wagers.teaser_price_2, -120);
        assert_eq!(cfg.model.wagers.teaser_price(2), Some(-120));
        assert_eq!(cfg.model.wagers.teaser_price(6), None);
    }

    #[test]
    fn conjunctive_rule_selectable() {
        let cfg = Config::parse_from(["edgeline", "--decision-rule", "conjunctive", "summary"]);
        assert_eq!(cfg.model.picks.decision_rule, DecisionRule::Conjunctive);
    }
}

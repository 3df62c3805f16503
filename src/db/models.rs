use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// One of the twelve fixed team-strength metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Overall,
    Offense,
    Defense,
    Passing,
    PassBlock,
    Receiving,
    Running,
    RunBlock,
    PassRush,
    Coverage,
    RunDefense,
    Tackling,
}

impl Metric {
    pub const ALL: [Metric; 12] = [
        Metric::Overall,
        Metric::Offense,
        Metric::Defense,
        Metric::Passing,
        Metric::PassBlock,
        Metric::Receiving,
        Metric::Running,
        Metric::RunBlock,
        Metric::PassRush,
        Metric::Coverage,
        Metric::RunDefense,
        Metric::Tackling,
    ];

    /// Unit-level metrics, i.e. everything except the three primary ones.
    pub const UNITS: [Metric; 9] = [
        Metric::Passing,
        Metric::PassBlock,
        Metric::Receiving,
        Metric::Running,
        Metric::RunBlock,
        Metric::PassRush,
        Metric::Coverage,
        Metric::RunDefense,
        Metric::Tackling,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Column / JSON key name.
    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Overall => "overall",
            Metric::Offense => "offense",
            Metric::Defense => "defense",
            Metric::Passing => "passing",
            Metric::PassBlock => "pass_block",
            Metric::Receiving => "receiving",
            Metric::Running => "running",
            Metric::RunBlock => "run_block",
            Metric::PassRush => "pass_rush",
            Metric::Coverage => "coverage",
            Metric::RunDefense => "run_defense",
            Metric::Tackling => "tackling",
        }
    }

    /// Short label used by the grade sheets (OVR, OFF, ...).
    pub fn abbreviation(self) -> &'static str {
        match self {
            Metric::Overall => "OVR",
            Metric::Offense => "OFF",
            Metric::Defense => "DEF",
            Metric::Passing => "PASS",
            Metric::PassBlock => "PBLK",
            Metric::Receiving => "RECV",
            Metric::Running => "RUN",
            Metric::RunBlock => "RBLK",
            Metric::PassRush => "PRSH",
            Metric::Coverage => "COV",
            Metric::RunDefense => "RDEF",
            Metric::Tackling => "TACK",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace(['-', ' '], "_");
        let metric = match key.as_str() {
            "overall" | "ovr" => Metric::Overall,
            "offense" | "off" => Metric::Offense,
            "defense" | "def" => Metric::Defense,
            "passing" | "pass" => Metric::Passing,
            "pass_block" | "pblk" => Metric::PassBlock,
            "receiving" | "recv" => Metric::Receiving,
            "running" | "run" => Metric::Running,
            "run_block" | "rblk" => Metric::RunBlock,
            "pass_rush" | "prsh" => Metric::PassRush,
            "coverage" | "cov" => Metric::Coverage,
            "run_defense" | "rdef" => Metric::RunDefense,
            "tackling" | "tack" => Metric::Tackling,
            _ => return Err(format!("unknown metric '{}'", s)),
        };
        Ok(metric)
    }
}

/// A value per metric, where `None` means undefined (never zero-filled).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MetricValues {
    values: [Option<f64>; 12],
}

impl MetricValues {
    pub fn get(&self, metric: Metric) -> Option<f64> {
        self.values[metric.index()]
    }

    pub fn set(&mut self, metric: Metric, value: Option<f64>) {
        self.values[metric.index()] = value;
    }

    pub fn with(mut self, metric: Metric, value: f64) -> Self {
        self.set(metric, Some(value));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, Option<f64>)> + '_ {
        Metric::ALL.iter().map(move |m| (*m, self.get(*m)))
    }

    pub fn defined_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }
}

impl FromIterator<(Metric, Option<f64>)> for MetricValues {
    fn from_iter<I: IntoIterator<Item = (Metric, Option<f64>)>>(iter: I) -> Self {
        let mut out = MetricValues::default();
        for (metric, value) in iter {
            out.set(metric, value);
        }
        out
    }
}

impl Serialize for MetricValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(12))?;
        for (metric, value) in self.iter() {
            map.serialize_entry(metric.as_str(), &value)?;
        }
        map.end()
    }
}

/// Which season a grade snapshot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vintage {
    /// Last completed season, written once at season start.
    Prior,
    /// In-progress season, refreshed weekly.
    Current,
}

impl Vintage {
    pub fn as_str(self) -> &'static str {
        match self {
            Vintage::Prior => "prior",
            Vintage::Current => "current",
        }
    }
}

impl FromStr for Vintage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "prior" | "previous" | "last" => Ok(Vintage::Prior),
            "current" | "this" => Ok(Vintage::Current),
            other => Err(format!("unknown vintage '{}'", other)),
        }
    }
}

/// Team-strength snapshot for one vintage as of one week.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamGrade {
    pub team: String,
    pub vintage: Vintage,
    /// Snapshot week (0 for prior-season grades).
    pub week: u32,
    pub games_played: u32,
    pub grades: MetricValues,
}

/// Derived per-(team, metric) blend of prior and current grades.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlendedGrade {
    pub team: String,
    pub metric: Metric,
    pub prior_value: Option<f64>,
    pub current_value: Option<f64>,
    pub games_played: u32,
    /// Weight given to the current season, in [0, 1].
    pub weight_current: f64,
    pub blended_value: Option<f64>,
    pub week: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Home,
    Away,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Home => Side::Away,
            Side::Away => Side::Home,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Home => "home",
            Side::Away => "away",
        }
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "home" => Ok(Side::Home),
            "away" => Ok(Side::Away),
            other => Err(format!("unknown side '{}'", other)),
        }
    }
}

/// A scheduled or completed game with its market lines.
///
/// Line sign convention: negative = favorite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matchup {
    pub week: u32,
    pub home_team: String,
    pub away_team: String,
    pub home_line: Option<f64>,
    pub away_line: Option<f64>,
    pub home_odds: Option<i32>,
    pub away_odds: Option<i32>,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
}

impl Matchup {
    pub fn team(&self, side: Side) -> &str {
        match side {
            Side::Home => &self.home_team,
            Side::Away => &self.away_team,
        }
    }

    pub fn odds(&self, side: Side) -> Option<i32> {
        match side {
            Side::Home => self.home_odds,
            Side::Away => self.away_odds,
        }
    }

    pub fn own_line(&self, side: Side) -> Option<f64> {
        match side {
            Side::Home => self.home_line,
            Side::Away => self.away_line,
        }
    }

    /// The side's own line, or the negated opponent line when only that one is posted.
    pub fn line(&self, side: Side) -> Option<f64> {
        self.own_line(side)
            .or_else(|| self.own_line(side.opposite()).map(|l| -l))
    }

    pub fn score(&self, side: Side) -> Option<i32> {
        match side {
            Side::Home => self.home_score,
            Side::Away => self.away_score,
        }
    }

    pub fn is_final(&self) -> bool {
        self.home_score.is_some() && self.away_score.is_some()
    }

    /// 1.0 home win, 0.0 away win, None for ties or unplayed games.
    pub fn home_outcome(&self) -> Option<f64> {
        match (self.home_score, self.away_score) {
            (Some(h), Some(a)) if h > a => Some(1.0),
            (Some(h), Some(a)) if h < a => Some(0.0),
            _ => None,
        }
    }

    pub fn key(&self) -> String {
        format!("{}@{}", self.away_team, self.home_team)
    }
}

/// Directional reading of one differential against its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Significance {
    HomeSignificant,
    AwaySignificant,
    Insignificant,
}

impl Significance {
    pub fn as_str(self) -> &'static str {
        match self {
            Significance::HomeSignificant => "home_significant",
            Significance::AwaySignificant => "away_significant",
            Significance::Insignificant => "insignificant",
        }
    }
}

impl FromStr for Significance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "home_significant" => Ok(Significance::HomeSignificant),
            "away_significant" => Ok(Significance::AwaySignificant),
            "insignificant" => Ok(Significance::Insignificant),
            other => Err(format!("unknown significance '{}'", other)),
        }
    }
}

/// Classification of each voting signal; `None` when the differential is undefined.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SignalTags {
    pub overall: Option<Significance>,
    pub offense: Option<Significance>,
    pub defense: Option<Significance>,
    pub blended: Option<Significance>,
}

impl SignalTags {
    pub fn votes(&self) -> impl Iterator<Item = Significance> + '_ {
        [self.overall, self.offense, self.defense, self.blended]
            .into_iter()
            .flatten()
    }
}

/// A ranked wager recommendation for one matchup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pick {
    pub week: u32,
    pub home_team: String,
    pub away_team: String,
    pub picked_side: Side,
    pub picked_team: String,
    pub advantages: MetricValues,
    pub significance: SignalTags,
    pub blended_advantage: Option<f64>,
    /// Model P(home wins), in [0, 1].
    pub home_win_prob: f64,
    /// Model probability minus market-implied probability, both for the picked side.
    pub pick_edge: Option<f64>,
    /// Fractional-Kelly share of bankroll for the picked side.
    pub kelly_stake: Option<f64>,
    /// Expected profit per unit staked at the side's odds.
    pub expected_value: Option<f64>,
    pub rank: u32,
}

impl Pick {
    /// Model probability for the picked side.
    pub fn side_probability(&self) -> f64 {
        match self.picked_side {
            Side::Home => self.home_win_prob,
            Side::Away => 1.0 - self.home_win_prob,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GradeStatus {
    Pending,
    Win,
    Loss,
    Push,
    NotApplicable,
}

impl GradeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            GradeStatus::Pending => "PENDING",
            GradeStatus::Win => "WIN",
            GradeStatus::Loss => "LOSS",
            GradeStatus::Push => "PUSH",
            GradeStatus::NotApplicable => "NOT_APPLICABLE",
        }
    }

    pub fn is_settled(self) -> bool {
        matches!(self, GradeStatus::Win | GradeStatus::Loss | GradeStatus::Push)
    }
}

impl FromStr for GradeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(GradeStatus::Pending),
            "WIN" => Ok(GradeStatus::Win),
            "LOSS" => Ok(GradeStatus::Loss),
            "PUSH" => Ok(GradeStatus::Push),
            "NOT_APPLICABLE" => Ok(GradeStatus::NotApplicable),
            other => Err(format!("unknown grade status '{}'", other)),
        }
    }
}

/// Outcome of one pick under one line adjustment (0 = straight, teaser points = teased).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradedResult {
    pub week: u32,
    pub home_team: String,
    pub away_team: String,
    pub picked_side: Side,
    pub line_adjustment: f64,
    pub status: GradeStatus,
    pub effective_line: Option<f64>,
    /// picked score + effective line − opponent score.
    pub adjusted_margin: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matchup() -> Matchup {
        Matchup {
            week: 3,
            home_team: "KC".into(),
            away_team: "BUF".into(),
            home_line: None,
            away_line: Some(2.5),
            home_odds: Some(-120),
            away_odds: Some(100),
            home_score: None,
            away_score: None,
        }
    }

    #[test]
    fn metric_parses_long_names_and_abbreviations() {
        assert_eq!("OVR".parse::<Metric>().unwrap(), Metric::Overall);
        assert_eq!("pass-block".parse::<Metric>().unwrap(), Metric::PassBlock);
        assert_eq!("RDEF".parse::<Metric>().unwrap(), Metric::RunDefense);
        assert!("speed".parse::<Metric>().is_err());
        for m in Metric::ALL {
            assert_eq!(m.as_str().parse::<Metric>().unwrap(), m);
            assert_eq!(m.abbreviation().parse::<Metric>().unwrap(), m);
        }
    }

    #[test]
    fn metric_values_keep_undefined_distinct_from_zero() {
        let v = MetricValues::default().with(Metric::Overall, 0.0);
        assert_eq!(v.get(Metric::Overall), Some(0.0));
        assert_eq!(v.get(Metric::Offense), None);
        assert_eq!(v.defined_count(), 1);
    }

    #[test]
    fn line_falls_back_to_negated_opponent_line() {
        let m = matchup();
        assert_eq!(m.line(Side::Away), Some(2.5));
        assert_eq!(m.line(Side::Home), Some(-2.5));
    }

    #[test]
    fn home_outcome_ignores_ties_and_unplayed() {
        let mut m = matchup();
        assert_eq!(m.home_outcome(), None);
        m.home_score = Some(20);
        m.away_score = Some(20);
        assert_eq!(m.home_outcome(), None);
        m.away_score = Some(17);
        assert_eq!(m.home_outcome(), Some(1.0));
    }

    #[test]
    fn metric_values_serialize_as_named_map() {
        let v = MetricValues::default().with(Metric::Coverage, 1.5);
        let json = serde_json::to_value(v).unwrap();
        assert_eq!(json["coverage"], 1.5);
        assert!(json["overall"].is_null());
    }
}

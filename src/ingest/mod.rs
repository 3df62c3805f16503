//! Record sources and validation at the ingestion boundary.
//!
//! Raw records arrive with string weeks and free-form metric keys; each is
//! validated into a [`TeamGrade`] or [`Matchup`] before anything downstream
//! sees it. A bad record becomes a [`Diagnostic`] and is skipped.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::db::models::{Matchup, Metric, MetricValues, TeamGrade, Vintage};
use crate::error::{Diagnostic, SkipReason};

/// Week as supplied upstream: a number or a label such as "Week 5".
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum WeekField {
    Number(u32),
    Text(String),
}

impl WeekField {
    pub fn parse(&self) -> Result<u32, SkipReason> {
        match self {
            WeekField::Number(n) => Ok(*n),
            WeekField::Text(s) => parse_week(s),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GradeRecord {
    pub team: String,
    pub vintage: String,
    #[serde(default)]
    pub week: Option<WeekField>,
    #[serde(default)]
    pub games_played: Option<u32>,
    pub grades: BTreeMap<String, Option<f64>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchupRecord {
    pub week: WeekField,
    pub home_team: String,
    pub away_team: String,
    #[serde(default)]
    pub home_line: Option<f64>,
    #[serde(default)]
    pub away_line: Option<f64>,
    #[serde(default)]
    pub home_odds: Option<i32>,
    #[serde(default)]
    pub away_odds: Option<i32>,
    #[serde(default)]
    pub home_score: Option<i32>,
    #[serde(default)]
    pub away_score: Option<i32>,
}

/// "5", "Week 5", "week5", "WK 5" → 5.
pub fn parse_week(raw: &str) -> Result<u32, SkipReason> {
    let lower = raw.trim().to_lowercase();
    let digits = lower
        .strip_prefix("week")
        .or_else(|| lower.strip_prefix("wk"))
        .unwrap_or(lower.as_str())
        .trim_start_matches(['.', ' '])
        .trim();
    digits
        .parse::<u32>()
        .map_err(|_| SkipReason::InvalidRecord(format!("unrecognised week '{}'", raw)))
}

fn invalid(msg: impl Into<String>) -> SkipReason {
    SkipReason::InvalidRecord(msg.into())
}

fn team_name(raw: &str, field: &str) -> Result<String, SkipReason> {
    let team = raw.trim();
    if team.is_empty() {
        return Err(invalid(format!("{} is empty", field)));
    }
    Ok(team.to_string())
}

pub fn validate_grade_record(record: &GradeRecord) -> Result<TeamGrade, SkipReason> {
    let team = team_name(&record.team, "team")?;
    let vintage: Vintage = record.vintage.parse().map_err(invalid)?;
    let week = match (&record.week, vintage) {
        (Some(w), _) => w.parse()?,
        (None, Vintage::Prior) => 0,
        (None, Vintage::Current) => return Err(invalid("current-season grade without a week")),
    };

    let mut grades = MetricValues::default();
    for (key, value) in &record.grades {
        let metric: Metric = key.parse().map_err(invalid)?;
        if let Some(v) = value {
            if !v.is_finite() {
                return Err(invalid(format!("{} is not a finite number", key)));
            }
        }
        grades.set(metric, *value);
    }

    Ok(TeamGrade {
        team,
        vintage,
        week,
        games_played: record.games_played.unwrap_or(0),
        grades,
    })
}

pub fn validate_matchup_record(record: &MatchupRecord) -> Result<Matchup, SkipReason> {
    let week = record.week.parse()?;
    if week == 0 {
        return Err(invalid("matchup week must be at least 1"));
    }
    let home_team = team_name(&record.home_team, "home_team")?;
    let away_team = team_name(&record.away_team, "away_team")?;
    if home_team == away_team {
        return Err(invalid(format!("{} cannot play itself", home_team)));
    }
    for (field, line) in [("home_line", record.home_line), ("away_line", record.away_line)] {
        if line.is_some_and(|l| !l.is_finite()) {
            return Err(invalid(format!("{} is not a finite number", field)));
        }
    }
    for (field, odds) in [("home_odds", record.home_odds), ("away_odds", record.away_odds)] {
        if odds.is_some_and(|o| o.abs() < 100) {
            return Err(invalid(format!("{} {:?} is not valid American odds", field, odds)));
        }
    }
    for (field, score) in [("home_score", record.home_score), ("away_score", record.away_score)] {
        if score.is_some_and(|s| s < 0) {
            return Err(invalid(format!("{} is negative", field)));
        }
    }

    Ok(Matchup {
        week,
        home_team,
        away_team,
        home_line: record.home_line,
        away_line: record.away_line,
        home_odds: record.home_odds,
        away_odds: record.away_odds,
        home_score: record.home_score,
        away_score: record.away_score,
    })
}

/// Decode one raw element; a shape or type mismatch is an invalid record.
fn decode<T: DeserializeOwned>(raw: Value) -> Result<T, SkipReason> {
    serde_json::from_value(raw).map_err(|e| invalid(e.to_string()))
}

/// Best-effort label for a record that may not have decoded.
fn raw_field(raw: &Value, key: &str) -> String {
    match raw.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "?".to_string(),
    }
}

/// Anything that can hand over raw grade and matchup records.
///
/// Records are returned undecoded so one malformed element is skipped on
/// its own instead of failing the whole batch.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn grade_records(&self) -> Result<Vec<Value>>;

    async fn matchup_records(&self) -> Result<Vec<Value>>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}

/// Reads JSON arrays of records from local files. A missing path yields no records.
pub struct JsonFileSource {
    grades: Option<PathBuf>,
    matchups: Option<PathBuf>,
}

impl JsonFileSource {
    pub fn new(grades: Option<PathBuf>, matchups: Option<PathBuf>) -> Self {
        JsonFileSource { grades, matchups }
    }

    async fn read_array(path: Option<&PathBuf>) -> Result<Vec<Value>> {
        let Some(path) = path else {
            return Ok(Vec::new());
        };
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
    }
}

#[async_trait]
impl RecordSource for JsonFileSource {
    async fn grade_records(&self) -> Result<Vec<Value>> {
        Self::read_array(self.grades.as_ref()).await
    }

    async fn matchup_records(&self) -> Result<Vec<Value>> {
        Self::read_array(self.matchups.as_ref()).await
    }

    fn name(&self) -> &str {
        "json-file"
    }
}

/// Validated records ready for persistence.
#[derive(Debug, Default)]
pub struct ImportBatch {
    pub grades: Vec<TeamGrade>,
    pub matchups: Vec<Matchup>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Pull every record from `source` and validate it.
pub async fn collect(source: &dyn RecordSource) -> Result<ImportBatch> {
    let mut batch = ImportBatch::default();

    for (i, raw) in source.grade_records().await?.into_iter().enumerate() {
        let unit = format!("grade record #{} ({})", i, raw_field(&raw, "team"));
        let validated = decode::<GradeRecord>(raw).and_then(|r| validate_grade_record(&r));
        match validated {
            Ok(grade) => batch.grades.push(grade),
            Err(reason) => batch
                .diagnostics
                .push(Diagnostic::new(None, unit, reason).logged()),
        }
    }
    for (i, raw) in source.matchup_records().await?.into_iter().enumerate() {
        let week = raw
            .get("week")
            .cloned()
            .and_then(|w| serde_json::from_value::<WeekField>(w).ok())
            .and_then(|w| w.parse().ok());
        let unit = format!(
            "matchup record #{} ({}@{})",
            i,
            raw_field(&raw, "away_team"),
            raw_field(&raw, "home_team")
        );
        let validated = decode::<MatchupRecord>(raw).and_then(|r| validate_matchup_record(&r));
        match validated {
            Ok(matchup) => batch.matchups.push(matchup),
            Err(reason) => batch
                .diagnostics
                .push(Diagnostic::new(week, unit, reason).logged()),
        }
    }

    info!(
        "{}: {} grade(s), {} matchup(s), {} rejected",
        source.name(),
        batch.grades.len(),
        batch.matchups.len(),
        batch.diagnostics.len()
    );
    Ok(batch)
}

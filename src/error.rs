use serde::Serialize;
use thiserror::Error;
use tracing::warn;

/// Configuration values outside their valid domain. Raised at load time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be within [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: f64 },
    #[error("{field} is not valid American odds: {value}")]
    InvalidOdds { field: &'static str, value: i32 },
    #[error("invalid grid axis '{0}': expected start:end:step with step > 0 and start <= end")]
    InvalidAxis(String),
}

/// Why a single unit of work (matchup, metric, record, candidate) was skipped.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    #[error("undefined value: {0}")]
    UndefinedValue(String),
    #[error("insufficient data: {0}")]
    InsufficientData(String),
    #[error("no usable line to grade against")]
    GradingAmbiguity,
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

/// A per-unit diagnostic surfaced to the operator instead of failing the batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub week: Option<u32>,
    pub unit: String,
    pub reason: SkipReason,
}

impl Diagnostic {
    pub fn new(week: Option<u32>, unit: impl Into<String>, reason: SkipReason) -> Self {
        Diagnostic {
            week,
            unit: unit.into(),
            reason,
        }
    }

    /// Log at warn level and return self, for use in `push(..)` chains.
    pub fn logged(self) -> Self {
        match self.week {
            Some(week) => warn!("Skipping {} (week {}): {}", self.unit, week, self.reason),
            None => warn!("Skipping {}: {}", self.unit, self.reason),
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_serializes_reason_kind() {
        let d = Diagnostic::new(
            Some(4),
            "NYJ@MIA",
            SkipReason::UndefinedValue("overall advantage".into()),
        );
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["reason"]["kind"], "undefined_value");
        assert_eq!(json["week"], 4);
    }

    #[test]
    fn config_error_message_names_field() {
        let e = ConfigError::OutOfRange {
            field: "composite_weight",
            min: 0.0,
            max: 1.0,
            value: 1.5,
        };
        assert!(e.to_string().contains("composite_weight"));
    }
}

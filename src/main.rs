use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

mod config;
mod db;
mod engine;
mod error;
mod ingest;

use config::{Command, Config, ModelConfig};
use db::Database;
use engine::backtest::{combo_outcome, summarize_season};
use engine::calibration::{calibration_report, samples_from};
use engine::combos::{build_legs, generate_combos, ComboReport};
use engine::grading::grade_picks;
use engine::picks::select_picks;
use engine::pipeline::{evaluate_week, GradeBook, WeekEvaluation};
use engine::tuner::{run_grid_parallel, GridSpec};
use error::Diagnostic;
use ingest::{collect, JsonFileSource};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging; stdout is reserved for JSON reports
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.model.validate()?;

    let db = Database::open(&config.database_path)?;
    info!("Database opened: {}", config.database_path);

    let cfg = &config.model;
    match config.command.clone() {
        Command::Import { grades, matchups } => {
            let source = JsonFileSource::new(grades, matchups);
            let batch = collect(&source).await?;
            for grade in &batch.grades {
                db.upsert_grade(grade)?;
            }
            for matchup in &batch.matchups {
                db.upsert_matchup(matchup)?;
            }
            print_json(&json!({
                "grades": batch.grades.len(),
                "matchups": batch.matchups.len(),
                "diagnostics": batch.diagnostics,
            }))?;
        }
        Command::Picks { week } => {
            let report = run_picks(&db, week, cfg)?;
            print_json(&report)?;
        }
        Command::Grade { week } => {
            let report = run_grading(&db, week, cfg)?;
            print_json(&report)?;
        }
        Command::Run { week } => {
            let picks = run_picks(&db, week, cfg)?;
            let grading = run_grading(&db, week, cfg)?;
            print_json(&json!({ "picks": picks, "grading": grading }))?;
        }
        Command::Calibrate { week } => {
            let weeks = match week {
                Some(w) => vec![w],
                None => db.completed_weeks()?,
            };
            let mut samples = Vec::new();
            let mut diagnostics = Vec::new();
            for w in weeks {
                let evaluation = evaluate_stored_week(&db, w, cfg)?;
                samples.extend(samples_from(&evaluation.evaluations));
                diagnostics.extend(evaluation.diagnostics);
            }
            match calibration_report(week, &samples) {
                Ok(report) => print_json(&json!({ "report": report, "diagnostics": diagnostics }))?,
                Err(reason) => {
                    let diagnostic = Diagnostic::new(week, "calibration", reason).logged();
                    diagnostics.push(diagnostic);
                    print_json(&json!({ "report": null, "diagnostics": diagnostics }))?;
                }
            }
        }
        Command::Combos { week, size } => {
            let picks = db.load_picks(Some(week))?;
            let matchups = db.load_matchups(Some(week))?;
            let results = db.load_graded_results(Some(week))?;
            let legs = build_legs(&picks, &matchups, &cfg.wagers);
            let rows: Vec<_> = generate_combos(week, &legs, &cfg.wagers)
                .iter()
                .filter(|bet| size.map_or(true, |s| bet.size == s))
                .map(|bet| {
                    json!({
                        "combo": ComboReport::from(bet),
                        "legs": bet.legs,
                        "combined_decimal_price": bet.combined_decimal_price,
                        "fair_decimal_price": bet.fair_decimal_price,
                        "edge": bet.edge,
                        "static_teaser_price": bet.static_teaser_price,
                        "parlay_payout": bet.parlay_payout,
                        "teaser_payout": bet.teaser_payout,
                        "teaser_outcome": combo_outcome(bet, &results, cfg.wagers.teaser_points),
                    })
                })
                .collect();
            info!("Week {}: {} combination(s) over {} pick(s)", week, rows.len(), picks.len());
            print_json(&rows)?;
        }
        Command::Tune {
            overall,
            offense,
            defense,
            min_picks,
            from_week,
            to_week,
            top,
        } => {
            let weeks: Vec<u32> = db
                .completed_weeks()?
                .into_iter()
                .filter(|w| from_week.map_or(true, |f| *w >= f))
                .filter(|w| to_week.map_or(true, |t| *w <= t))
                .collect();
            if weeks.is_empty() {
                warn!("No completed weeks in range; nothing to tune");
            }
            let mut evaluations = Vec::new();
            for w in &weeks {
                evaluations.extend(evaluate_stored_week(&db, *w, cfg)?.evaluations);
            }
            let grid = GridSpec {
                overall,
                offense,
                defense,
                min_picks,
            };
            let mut report = run_grid_parallel(Arc::new(evaluations), &grid, cfg).await?;
            report.candidates.truncate(top);
            print_json(&json!({ "weeks": weeks, "report": report }))?;
        }
        Command::Summary => {
            let picks = db.load_picks(None)?;
            let results = db.load_graded_results(None)?;
            let matchups = db.load_matchups(None)?;
            print_json(&summarize_season(&picks, &results, &matchups, &cfg.wagers))?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn evaluate_stored_week(db: &Database, week: u32, cfg: &ModelConfig) -> Result<WeekEvaluation> {
    let grades = db.load_grades()?;
    let matchups = db.load_matchups(Some(week))?;
    let book = GradeBook::as_of(grades, week);
    Ok(evaluate_week(week, &book, &matchups, cfg))
}

fn run_picks(db: &Database, week: u32, cfg: &ModelConfig) -> Result<serde_json::Value> {
    let evaluation = evaluate_stored_week(db, week, cfg)?;
    let selection = select_picks(&evaluation.evaluations, cfg);
    db.replace_picks(week, &selection.picks, cfg.picks.max_picks)
        .with_context(|| format!("storing picks for week {}", week))?;
    info!(
        "Week {}: {} pick(s) stored ({} no-pick, {} below edge, {} over cap)",
        week,
        selection.picks.len(),
        selection.no_pick,
        selection.dropped_by_edge,
        selection.dropped_by_cap
    );
    Ok(json!({
        "week": week,
        "picks": selection.picks,
        "no_pick": selection.no_pick,
        "dropped_by_edge": selection.dropped_by_edge,
        "dropped_by_cap": selection.dropped_by_cap,
        "diagnostics": evaluation.diagnostics,
    }))
}

fn run_grading(db: &Database, week: u32, cfg: &ModelConfig) -> Result<serde_json::Value> {
    let picks = db.load_picks(Some(week))?;
    let matchups = db.load_matchups(Some(week))?;
    let (results, diagnostics) = grade_picks(&picks, &matchups, &cfg.wagers);
    db.replace_graded_results(week, &results)
        .with_context(|| format!("storing graded results for week {}", week))?;
    info!("Week {}: graded {} pick(s)", week, picks.len());
    Ok(json!({
        "week": week,
        "results": results,
        "diagnostics": diagnostics,
    }))
}

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

pub mod models;
use models::*;

/// Thread-safe SQLite connection pool (single connection with mutex)
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the SQLite database at the given path
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("opening database {}", path))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Self::from_connection(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database connection mutex poisoned"))
    }

    /// Run schema migrations (idempotent)
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    // ── Team grades ───────────────────────────────────────────────────────────

    /// Insert or overwrite the snapshot for (team, vintage, week)
    pub fn upsert_grade(&self, grade: &TeamGrade) -> Result<()> {
        let conn = self.conn()?;
        let sql = format!(
            "INSERT INTO team_grades (team, vintage, week, games_played, {cols}, updated_at)
             VALUES (?1, ?2, ?3, ?4, {placeholders}, ?{ts})
             ON CONFLICT(team, vintage, week) DO UPDATE SET
                games_played=excluded.games_played, {updates},
                updated_at=excluded.updated_at",
            cols = metric_columns(""),
            placeholders = (5..5 + Metric::ALL.len())
                .map(|i| format!("?{}", i))
                .collect::<Vec<_>>()
                .join(", "),
            ts = 5 + Metric::ALL.len(),
            updates = Metric::ALL
                .iter()
                .map(|m| format!("{0}=excluded.{0}", m.as_str()))
                .collect::<Vec<_>>()
                .join(", "),
        );
        let mut values: Vec<rusqlite::types::Value> = vec![
            grade.team.clone().into(),
            grade.vintage.as_str().to_string().into(),
            i64::from(grade.week).into(),
            i64::from(grade.games_played).into(),
        ];
        values.extend(grade.grades.iter().map(|(_, v)| opt_real(v)));
        values.push(Utc::now().to_rfc3339().into());
        conn.execute(&sql, params_from_iter(values))?;
        Ok(())
    }

    pub fn load_grades(&self) -> Result<Vec<TeamGrade>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT team, vintage, week, games_played, {} FROM team_grades
             ORDER BY team, vintage, week",
            metric_columns("")
        );
        let mut stmt = conn.prepare(&sql)?;
        let grades = stmt
            .query_map([], map_team_grade)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(grades)
    }

    // ── Matchups ──────────────────────────────────────────────────────────────

    /// Upsert a matchup; later lines, odds and scores overwrite earlier ones
    pub fn upsert_matchup(&self, m: &Matchup) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO matchups (week, home_team, away_team, home_line, away_line,
                                   home_odds, away_odds, home_score, away_score, updated_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)
             ON CONFLICT(week, home_team, away_team) DO UPDATE SET
                home_line=excluded.home_line,
                away_line=excluded.away_line,
                home_odds=excluded.home_odds,
                away_odds=excluded.away_odds,
                home_score=excluded.home_score,
                away_score=excluded.away_score,
                updated_at=excluded.updated_at",
            params![
                m.week,
                m.home_team,
                m.away_team,
                m.home_line,
                m.away_line,
                m.home_odds,
                m.away_odds,
                m.home_score,
                m.away_score,
                Utc::now(),
            ],
        )?;
        Ok(())
    }

    /// Matchups for one week, or every week when `None`
    pub fn load_matchups(&self, week: Option<u32>) -> Result<Vec<Matchup>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT week, home_team, away_team, home_line, away_line,
                    home_odds, away_odds, home_score, away_score
             FROM matchups WHERE (?1 IS NULL OR week = ?1)
             ORDER BY week, home_team, away_team",
        )?;
        let matchups = stmt
            .query_map(params![week], map_matchup)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(matchups)
    }

    /// Weeks with at least one final score
    pub fn completed_weeks(&self) -> Result<Vec<u32>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT week FROM matchups
             WHERE home_score IS NOT NULL AND away_score IS NOT NULL
             ORDER BY week",
        )?;
        let weeks = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<u32>>>()?;
        Ok(weeks)
    }

    // ── Picks ─────────────────────────────────────────────────────────────────

    /// Replace the week's picks. Earlier picks and their graded results are
    /// removed in the same transaction.
    pub fn replace_picks(&self, week: u32, picks: &[Pick], max_picks: usize) -> Result<()> {
        if picks.len() > max_picks {
            bail!(
                "refusing to store {} picks for week {} (limit {})",
                picks.len(),
                week,
                max_picks
            );
        }
        if let Some(stray) = picks.iter().find(|p| p.week != week) {
            bail!("pick {}@{} belongs to week {}, not {}", stray.away_team, stray.home_team, stray.week, week);
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM graded_results WHERE week = ?1", params![week])?;
        tx.execute("DELETE FROM picks WHERE week = ?1", params![week])?;
        {
            let sql = format!(
                "INSERT INTO picks (week, home_team, away_team, picked_side, picked_team,
                                    {adv}, sig_overall, sig_offense, sig_defense, sig_blended,
                                    blended_advantage, home_win_prob, pick_edge, kelly_stake,
                                    expected_value, rank, created_at)
                 VALUES ({placeholders})",
                adv = metric_columns("adv_"),
                placeholders = (1..=5 + Metric::ALL.len() + 11)
                    .map(|i| format!("?{}", i))
                    .collect::<Vec<_>>()
                    .join(", "),
            );
            let mut stmt = tx.prepare(&sql)?;
            let created_at = Utc::now().to_rfc3339();
            for pick in picks {
                let mut values: Vec<rusqlite::types::Value> = vec![
                    i64::from(pick.week).into(),
                    pick.home_team.clone().into(),
                    pick.away_team.clone().into(),
                    pick.picked_side.as_str().to_string().into(),
                    pick.picked_team.clone().into(),
                ];
                values.extend(pick.advantages.iter().map(|(_, v)| opt_real(v)));
                for tag in [
                    pick.significance.overall,
                    pick.significance.offense,
                    pick.significance.defense,
                    pick.significance.blended,
                ] {
                    values.push(opt_text(tag.map(Significance::as_str)));
                }
                values.extend([
                    opt_real(pick.blended_advantage),
                    pick.home_win_prob.into(),
                    opt_real(pick.pick_edge),
                    opt_real(pick.kelly_stake),
                    opt_real(pick.expected_value),
                    i64::from(pick.rank).into(),
                    created_at.clone().into(),
                ]);
                stmt.execute(params_from_iter(values))?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Picks in rank order for one week, or every week when `None`
    pub fn load_picks(&self, week: Option<u32>) -> Result<Vec<Pick>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT week, home_team, away_team, picked_side, picked_team,
                    {adv}, sig_overall, sig_offense, sig_defense, sig_blended,
                    blended_advantage, home_win_prob, pick_edge, kelly_stake,
                    expected_value, rank
             FROM picks WHERE (?1 IS NULL OR week = ?1)
             ORDER BY week, rank",
            adv = metric_columns("adv_")
        );
        let mut stmt = conn.prepare(&sql)?;
        let picks = stmt
            .query_map(params![week], map_pick)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(picks)
    }

    // ── Graded results ────────────────────────────────────────────────────────

    /// Replace every graded result for the week (straight and teased variants)
    pub fn replace_graded_results(&self, week: u32, results: &[GradedResult]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM graded_results WHERE week = ?1", params![week])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO graded_results (week, home_team, away_team, picked_side,
                                             line_adjustment, status, effective_line,
                                             adjusted_margin, graded_at)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)",
            )?;
            let graded_at = Utc::now();
            for r in results.iter().filter(|r| r.week == week) {
                stmt.execute(params![
                    r.week,
                    r.home_team,
                    r.away_team,
                    r.picked_side.as_str(),
                    r.line_adjustment,
                    r.status.as_str(),
                    r.effective_line,
                    r.adjusted_margin,
                    graded_at,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn load_graded_results(&self, week: Option<u32>) -> Result<Vec<GradedResult>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT week, home_team, away_team, picked_side, line_adjustment,
                    status, effective_line, adjusted_margin
             FROM graded_results WHERE (?1 IS NULL OR week = ?1)
             ORDER BY week, home_team, away_team, line_adjustment",
        )?;
        let results = stmt
            .query_map(params![week], map_graded_result)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(results)
    }
}

// ── SQL helpers ────────────────────────────────────────────────────────────────

fn metric_columns(prefix: &str) -> String {
    Metric::ALL
        .iter()
        .map(|m| format!("{}{}", prefix, m.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn opt_real(v: Option<f64>) -> rusqlite::types::Value {
    v.map_or(rusqlite::types::Value::Null, rusqlite::types::Value::Real)
}

fn opt_text(v: Option<&str>) -> rusqlite::types::Value {
    v.map_or(rusqlite::types::Value::Null, |s| {
        rusqlite::types::Value::Text(s.to_string())
    })
}

fn parse_text<T: FromStr<Err = String>>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

fn parse_opt_text<T: FromStr<Err = String>>(row: &Row, idx: usize) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        s.parse().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into())
        })
    })
    .transpose()
}

fn read_metrics(row: &Row, offset: usize) -> rusqlite::Result<MetricValues> {
    let mut values = MetricValues::default();
    for (i, metric) in Metric::ALL.iter().enumerate() {
        values.set(*metric, row.get(offset + i)?);
    }
    Ok(values)
}

fn map_team_grade(row: &Row) -> rusqlite::Result<TeamGrade> {
    Ok(TeamGrade {
        team: row.get(0)?,
        vintage: parse_text(row, 1)?,
        week: row.get(2)?,
        games_played: row.get(3)?,
        grades: read_metrics(row, 4)?,
    })
}

fn map_matchup(row: &Row) -> rusqlite::Result<Matchup> {
    Ok(Matchup {
        week: row.get(0)?,
        home_team: row.get(1)?,
        away_team: row.get(2)?,
        home_line: row.get(3)?,
        away_line: row.get(4)?,
        home_odds: row.get(5)?,
        away_odds: row.get(6)?,
        home_score: row.get(7)?,
        away_score: row.get(8)?,
    })
}

fn map_pick(row: &Row) -> rusqlite::Result<Pick> {
    let n = Metric::ALL.len();
    let tags = 5 + n;
    let rest = tags + 4;
    Ok(Pick {
        week: row.get(0)?,
        home_team: row.get(1)?,
        away_team: row.get(2)?,
        picked_side: parse_text(row, 3)?,
        picked_team: row.get(4)?,
        advantages: read_metrics(row, 5)?,
        significance: SignalTags {
            overall: parse_opt_text(row, tags)?,
            offense: parse_opt_text(row, tags + 1)?,
            defense: parse_opt_text(row, tags + 2)?,
            blended: parse_opt_text(row, tags + 3)?,
        },
        blended_advantage: row.get(rest)?,
        home_win_prob: row.get(rest + 1)?,
        pick_edge: row.get(rest + 2)?,
        kelly_stake: row.get(rest + 3)?,
        expected_value: row.get(rest + 4)?,
        rank: row.get(rest + 5)?,
    })
}

fn map_graded_result(row: &Row) -> rusqlite::Result<GradedResult> {
    Ok(GradedResult {
        week: row.get(0)?,
        home_team: row.get(1)?,
        away_team: row.get(2)?,
        picked_side: parse_text(row, 3)?,
        line_adjustment: row.get(4)?,
        status: parse_text(row, 5)?,
        effective_line: row.get(6)?,
        adjusted_margin: row.get(7)?,
    })
}

/// SQLite schema (idempotent CREATE IF NOT EXISTS)
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS team_grades (
    team         TEXT    NOT NULL,
    vintage      TEXT    NOT NULL,
    week         INTEGER NOT NULL,
    games_played INTEGER NOT NULL DEFAULT 0,
    overall      REAL,
    offense      REAL,
    defense      REAL,
    passing      REAL,
    pass_block   REAL,
    receiving    REAL,
    running      REAL,
    run_block    REAL,
    pass_rush    REAL,
    coverage     REAL,
    run_defense  REAL,
    tackling     REAL,
    updated_at   TEXT    NOT NULL,
    PRIMARY KEY (team, vintage, week)
);

CREATE TABLE IF NOT EXISTS matchups (
    week        INTEGER NOT NULL,
    home_team   TEXT    NOT NULL,
    away_team   TEXT    NOT NULL,
    home_line   REAL,
    away_line   REAL,
    home_odds   INTEGER,
    away_odds   INTEGER,
    home_score  INTEGER,
    away_score  INTEGER,
    updated_at  TEXT    NOT NULL,
    PRIMARY KEY (week, home_team, away_team)
);

CREATE TABLE IF NOT EXISTS picks (
    week              INTEGER NOT NULL,
    home_team         TEXT    NOT NULL,
    away_team         TEXT    NOT NULL,
    picked_side       TEXT    NOT NULL,
    picked_team       TEXT    NOT NULL,
    adv_overall       REAL,
    adv_offense       REAL,
    adv_defense       REAL,
    adv_passing       REAL,
    adv_pass_block    REAL,
    adv_receiving     REAL,
    adv_running       REAL,
    adv_run_block     REAL,
    adv_pass_rush     REAL,
    adv_coverage      REAL,
    adv_run_defense   REAL,
    adv_tackling      REAL,
    sig_overall       TEXT,
    sig_offense       TEXT,
    sig_defense       TEXT,
    sig_blended       TEXT,
    blended_advantage REAL,
    home_win_prob     REAL    NOT NULL,
    pick_edge         REAL,
    kelly_stake       REAL,
    expected_value    REAL,
    rank              INTEGER NOT NULL,
    created_at        TEXT    NOT NULL,
    PRIMARY KEY (week, home_team, away_team)
);

CREATE TABLE IF NOT EXISTS graded_results (
    week            INTEGER NOT NULL,
    home_team       TEXT    NOT NULL,
    away_team       TEXT    NOT NULL,
    picked_side     TEXT    NOT NULL,
    line_adjustment REAL    NOT NULL,
    status          TEXT    NOT NULL,
    effective_line  REAL,
    adjusted_margin REAL,
    graded_at       TEXT    NOT NULL,
    PRIMARY KEY (week, home_team, away_team, line_adjustment)
);

CREATE INDEX IF NOT EXISTS idx_team_grades_team ON team_grades(team);
CREATE INDEX IF NOT EXISTS idx_picks_week ON picks(week);
CREATE INDEX IF NOT EXISTS idx_graded_results_week ON graded_results(week);
"#;

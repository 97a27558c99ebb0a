use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use rusqlite::params_from_iter;
use tracker_core::{
    DailyStats, DurationTotals, MonthlyCost, SessionDuration, SessionStats, StatsFilter,
    SubagentStats, Summary, TokenCounts, TurnSpan, cost_usd, cost_without_cache_usd,
    duration_totals,
};

use crate::Db;
use crate::error::Result;
use crate::helpers::{row_to_turn_row, row_to_usage_row};
use crate::types::{TurnRow, UsageRow};

/// Conditions over the `sessions s` alias plus their positional parameters.
#[derive(Debug, Default)]
struct SqlFilter {
    clauses: Vec<String>,
    params: Vec<String>,
}

impl SqlFilter {
    fn top_level_sessions() -> Self {
        Self {
            clauses: vec!["s.external_id NOT LIKE 'agent-%'".to_string()],
            params: Vec::new(),
        }
    }

    fn push(&mut self, clause: &str, value: Option<&str>) {
        if let Some(value) = value {
            self.clauses.push(clause.to_string());
            self.params.push(value.to_string());
        }
    }

    fn with_session_fields(mut self, filter: &StatsFilter) -> Self {
        self.push("s.project = ?", non_empty(&filter.project));
        self.push("s.custom_title = ?", non_empty(&filter.custom_title));
        self
    }

    fn with_session_dates(mut self, filter: &StatsFilter) -> Self {
        self.push("date(s.start_time) >= ?", non_empty(&filter.from));
        self.push("date(s.start_time) <= ?", non_empty(&filter.to));
        self
    }

    fn with_record_dates(mut self, filter: &StatsFilter) -> Self {
        self.push("date(u.timestamp) >= ?", non_empty(&filter.from));
        self.push("date(u.timestamp) <= ?", non_empty(&filter.to));
        self
    }

    fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    tokens: TokenCounts,
    cost_usd: f64,
    cost_without_cache_usd: f64,
    records: u64,
}

impl Tally {
    fn add(&mut self, row: &UsageRow) {
        let model = row.model.as_deref();
        self.tokens = self.tokens.add(row.tokens);
        self.cost_usd += cost_usd(model, &row.tokens);
        self.cost_without_cache_usd += cost_without_cache_usd(model, &row.tokens);
        self.records += 1;
    }
}

#[derive(Debug)]
struct SessionHeader {
    id: i64,
    external_id: String,
    project: Option<String>,
    custom_title: Option<String>,
    start_time: Option<String>,
    end_time: Option<String>,
    subagent_count: u64,
}

impl Db {
    /// One row per top-level session, newest first. Sub-agent usage counts
    /// toward the owning session.
    pub fn session_stats(&self, filter: &StatsFilter) -> Result<Vec<SessionStats>> {
        let scope = SqlFilter::top_level_sessions()
            .with_session_fields(filter)
            .with_session_dates(filter);
        let headers = self.load_session_headers(&scope)?;

        let mut tallies: HashMap<i64, Tally> = HashMap::new();
        for row in self.load_usage_rows(&scope)? {
            tallies.entry(row.session_id).or_default().add(&row);
        }
        let turns = group_turns(self.load_turn_rows(&scope)?);

        Ok(headers
            .into_iter()
            .map(|header| {
                let tally = tallies.get(&header.id).copied().unwrap_or_default();
                let (durations, exchange_count) = turns
                    .get(&header.id)
                    .map(|spans| (duration_totals(&spans.spans), spans.count))
                    .unwrap_or_default();
                SessionStats {
                    id: header.id,
                    external_id: header.external_id,
                    project: header.project,
                    custom_title: header.custom_title,
                    start_time: header.start_time,
                    end_time: header.end_time,
                    tokens: tally.tokens,
                    estimated_cost_usd: tally.cost_usd,
                    usage_record_count: tally.records,
                    subagent_count: header.subagent_count,
                    exchange_count,
                    wall_clock_seconds: durations.wall_clock_seconds,
                    active_seconds: durations.active_seconds,
                }
            })
            .collect())
    }

    /// Per sub-agent usage of one session, earliest sub-agent first.
    pub fn subagent_stats(&self, session_id: i64) -> Result<Vec<SubagentStats>> {
        let subagents = self.list_subagents(session_id)?;
        let mut stmt = self.conn.prepare(
            r#"
            SELECT u.session_id, u.subagent_id, u.timestamp, u.model,
                   u.input_tokens, u.output_tokens, u.cache_creation_input_tokens, u.cache_read_input_tokens
            FROM usage_records u
            JOIN subagents sa ON sa.id = u.subagent_id
            WHERE sa.session_id = ?1
            "#,
        )?;
        let rows = stmt
            .query_map([session_id], row_to_usage_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut tallies: HashMap<i64, Tally> = HashMap::new();
        for row in &rows {
            if let Some(subagent_id) = row.subagent_id {
                tallies.entry(subagent_id).or_default().add(row);
            }
        }

        Ok(subagents
            .into_iter()
            .map(|subagent| {
                let tally = tallies.get(&subagent.id).copied().unwrap_or_default();
                SubagentStats {
                    id: subagent.id,
                    external_id: subagent.external_id,
                    agent_type: subagent.agent_type,
                    start_time: subagent.start_time,
                    end_time: subagent.end_time,
                    tokens: tally.tokens,
                    estimated_cost_usd: tally.cost_usd,
                    usage_record_count: tally.records,
                }
            })
            .collect())
    }

    /// Usage grouped by UTC calendar date of each record, newest first.
    pub fn daily_stats(&self, filter: &StatsFilter) -> Result<Vec<DailyStats>> {
        let scope = SqlFilter::default()
            .with_session_fields(filter)
            .with_record_dates(filter);
        let mut days: BTreeMap<String, (Tally, HashSet<i64>)> = BTreeMap::new();
        for row in self.load_usage_rows(&scope)? {
            let (tally, sessions) = days.entry(record_date(&row.timestamp)).or_default();
            tally.add(&row);
            sessions.insert(row.session_id);
        }
        Ok(days
            .into_iter()
            .rev()
            .map(|(date, (tally, sessions))| DailyStats {
                date,
                tokens: tally.tokens,
                cost_usd: tally.cost_usd,
                session_count: sessions.len() as u64,
                usage_record_count: tally.records,
            })
            .collect())
    }

    /// Usage grouped by `YYYY-MM`, oldest first.
    pub fn monthly_costs(&self, filter: &StatsFilter) -> Result<Vec<MonthlyCost>> {
        let scope = SqlFilter::default()
            .with_session_fields(filter)
            .with_record_dates(filter);
        let mut months: BTreeMap<String, (Tally, HashSet<i64>)> = BTreeMap::new();
        for row in self.load_usage_rows(&scope)? {
            let date = record_date(&row.timestamp);
            let month = date.get(..7).unwrap_or(date.as_str()).to_string();
            let (tally, sessions) = months.entry(month).or_default();
            tally.add(&row);
            sessions.insert(row.session_id);
        }
        Ok(months
            .into_iter()
            .map(|(month, (tally, sessions))| MonthlyCost {
                month,
                api_cost_usd: tally.cost_usd,
                tokens: tally.tokens,
                session_count: sessions.len() as u64,
                usage_record_count: tally.records,
            })
            .collect())
    }

    pub fn summary(&self, filter: &StatsFilter) -> Result<Summary> {
        let record_scope = SqlFilter::default()
            .with_session_fields(filter)
            .with_record_dates(filter);
        let mut tally = Tally::default();
        for row in self.load_usage_rows(&record_scope)? {
            tally.add(&row);
        }

        let session_scope = SqlFilter::top_level_sessions()
            .with_session_fields(filter)
            .with_session_dates(filter);
        let sql = format!(
            "SELECT COUNT(*), MIN(s.start_time), MAX(s.start_time) FROM sessions s{}",
            session_scope.where_sql()
        );
        let (session_count, first_session, last_session) = self.conn.query_row(
            &sql,
            params_from_iter(session_scope.params.iter()),
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            },
        )?;

        let mut durations = DurationTotals::default();
        for spans in group_turns(self.load_turn_rows(&session_scope)?).values() {
            let totals = duration_totals(&spans.spans);
            durations.wall_clock_seconds += totals.wall_clock_seconds;
            durations.active_seconds += totals.active_seconds;
        }

        Ok(Summary {
            tokens: tally.tokens,
            total_cost_usd: tally.cost_usd,
            cost_without_cache_usd: tally.cost_without_cache_usd,
            session_count: session_count.max(0) as u64,
            first_session: first_session.map(|value| date_part(&value)),
            last_session: last_session.map(|value| date_part(&value)),
            wall_clock_seconds: durations.wall_clock_seconds,
            active_seconds: durations.active_seconds,
        })
    }

    pub fn projects(&self) -> Result<Vec<String>> {
        self.distinct_session_values("project")
    }

    pub fn custom_titles(&self) -> Result<Vec<String>> {
        self.distinct_session_values("custom_title")
    }

    /// Wall-clock and active time per top-level session, or for one session.
    pub fn session_durations(&self, session_id: Option<i64>) -> Result<Vec<SessionDuration>> {
        let mut scope = SqlFilter::top_level_sessions();
        let id_param = session_id.map(|id| id.to_string());
        scope.push("s.id = ?", id_param.as_deref());
        let headers = self.load_session_headers(&scope)?;
        let turns = group_turns(self.load_turn_rows(&scope)?);
        Ok(headers
            .into_iter()
            .map(|header| {
                let (totals, exchange_count) = turns
                    .get(&header.id)
                    .map(|spans| (duration_totals(&spans.spans), spans.count))
                    .unwrap_or_default();
                SessionDuration {
                    session_id: header.id,
                    external_id: header.external_id,
                    wall_clock_seconds: totals.wall_clock_seconds,
                    active_seconds: totals.active_seconds,
                    block_count: totals.block_count,
                    exchange_count,
                }
            })
            .collect())
    }

    fn distinct_session_values(&self, column: &str) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT DISTINCT {column} FROM sessions \
             WHERE {column} IS NOT NULL AND external_id NOT LIKE 'agent-%' \
             ORDER BY {column}"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    fn load_session_headers(&self, scope: &SqlFilter) -> Result<Vec<SessionHeader>> {
        let sql = format!(
            r#"
            SELECT s.id, s.external_id, s.project, s.custom_title, s.start_time, s.end_time,
                   (SELECT COUNT(*) FROM subagents sa WHERE sa.session_id = s.id)
            FROM sessions s{}
            ORDER BY s.start_time DESC, s.id ASC
            "#,
            scope.where_sql()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(scope.params.iter()), |row| {
            Ok(SessionHeader {
                id: row.get(0)?,
                external_id: row.get(1)?,
                project: row.get(2)?,
                custom_title: row.get(3)?,
                start_time: row.get(4)?,
                end_time: row.get(5)?,
                subagent_count: row.get::<_, i64>(6)?.max(0) as u64,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    fn load_usage_rows(&self, scope: &SqlFilter) -> Result<Vec<UsageRow>> {
        let sql = format!(
            r#"
            SELECT u.session_id, u.subagent_id, u.timestamp, u.model,
                   u.input_tokens, u.output_tokens, u.cache_creation_input_tokens, u.cache_read_input_tokens
            FROM usage_records u
            JOIN sessions s ON s.id = u.session_id{}
            ORDER BY u.timestamp ASC, u.id ASC
            "#,
            scope.where_sql()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(scope.params.iter()), row_to_usage_row)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    fn load_turn_rows(&self, scope: &SqlFilter) -> Result<Vec<TurnRow>> {
        let sql = format!(
            r#"
            SELECT e.session_id, e.user_timestamp, e.assistant_timestamp, e.duration_seconds
            FROM exchanges e
            JOIN sessions s ON s.id = e.session_id{}
            ORDER BY e.session_id ASC, e.user_timestamp ASC, e.id ASC
            "#,
            scope.where_sql()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(scope.params.iter()), row_to_turn_row)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }
}

#[derive(Debug, Default)]
struct SessionTurns {
    spans: Vec<TurnSpan>,
    count: u64,
}

/// Buckets turns by session, preserving row order within each session so
/// equal start times keep insertion order.
fn group_turns(rows: Vec<TurnRow>) -> HashMap<i64, SessionTurns> {
    let mut grouped: HashMap<i64, SessionTurns> = HashMap::new();
    for row in rows {
        let entry = grouped.entry(row.session_id).or_default();
        entry.count += 1;
        if let Some(span) = turn_span(&row) {
            entry.spans.push(span);
        }
    }
    grouped
}

fn turn_span(row: &TurnRow) -> Option<TurnSpan> {
    let end = row.assistant_timestamp.as_deref().unwrap_or(&row.user_timestamp);
    let duration = row.duration_seconds.filter(|seconds| *seconds >= 0.0);
    TurnSpan::from_timestamps(&row.user_timestamp, end, duration)
}

fn record_date(timestamp: &str) -> String {
    match DateTime::parse_from_rfc3339(timestamp) {
        Ok(parsed) => parsed.with_timezone(&Utc).format("%Y-%m-%d").to_string(),
        Err(_) => date_part(timestamp),
    }
}

fn date_part(timestamp: &str) -> String {
    timestamp
        .split('T')
        .next()
        .unwrap_or(timestamp)
        .to_string()
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

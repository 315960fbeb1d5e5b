//! Read-only insights over the batch analysis table.
//!
//! Queries go straight to the warehouse, not through the tool layer. Results
//! are cached process-wide for five minutes; failures are never cached.

use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use thiserror::Error;
use tracing::{debug, info, warn};
use workspace_client::{PlatformError, StatementExecution};

use crate::{
    config::AppConfig,
    gateway::sql_string_literal,
    presentation::{Axis, ChartPanel, Orientation, Series},
};

pub const CACHE_TTL: Duration = Duration::from_secs(300);
pub const TOP_RED_FLAGS: usize = 10;

pub const NO_KPI_DATA: &str =
    "📊 No data available yet. Process some claims in Batch Processing to see insights!";
pub const NO_FRAUD_TYPE_DATA: &str =
    "📊 No fraud type data available yet. Process claims to see distribution.";
pub const NO_RED_FLAG_DATA: &str =
    "📊 No indicator data available yet. Process claims to see red flags.";
pub const NO_TREND_DATA: &str =
    "📊 No trend data available yet. Process more claims to see trends over time.";

type Rows = Arc<Vec<Vec<Value>>>;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("{0}")]
    Statement(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InsightQuery {
    Kpis,
    FraudByType,
    RedFlags,
    Trends,
}

impl InsightQuery {
    pub fn sql(self, table: &str) -> String {
        match self {
            InsightQuery::Kpis => format!(
                "SELECT COUNT(*) AS total_claims, \
                 SUM(CASE WHEN is_fraudulent THEN 1 ELSE 0 END) AS fraud_cases, \
                 ROUND(AVG(CASE WHEN is_fraudulent THEN 1.0 ELSE 0.0 END) * 100, 2) AS fraud_rate, \
                 ROUND(AVG(risk_score), 2) AS avg_risk_score \
                 FROM {table}"
            ),
            InsightQuery::FraudByType => format!(
                "SELECT fraud_type, COUNT(*) AS count FROM {table} \
                 WHERE is_fraudulent = TRUE GROUP BY fraud_type ORDER BY count DESC"
            ),
            InsightQuery::RedFlags => format!(
                "SELECT indicator, COUNT(*) AS count FROM (\
                 SELECT explode(red_flags) AS indicator FROM {table} \
                 WHERE is_fraudulent = TRUE AND red_flags IS NOT NULL) \
                 GROUP BY indicator ORDER BY count DESC, indicator LIMIT {TOP_RED_FLAGS}"
            ),
            InsightQuery::Trends => format!(
                "SELECT DATE(analysis_timestamp) AS date, COUNT(*) AS total_claims, \
                 SUM(CASE WHEN is_fraudulent THEN 1 ELSE 0 END) AS fraud_cases \
                 FROM {table} GROUP BY DATE(analysis_timestamp) ORDER BY date"
            ),
        }
    }
}

/// Time-windowed result cache shared by every request.
pub struct QueryCache {
    ttl: Duration,
    entries: DashMap<InsightQuery, (Instant, Rows)>,
}

impl QueryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    pub fn get(&self, query: InsightQuery) -> Option<Rows> {
        let (stored_at, rows) = {
            let entry = self.entries.get(&query)?;
            (entry.0, entry.1.clone())
        };
        if stored_at.elapsed() < self.ttl {
            return Some(rows);
        }
        self.entries.remove(&query);
        None
    }

    pub fn insert(&self, query: InsightQuery, rows: Rows) {
        self.entries.insert(query, (Instant::now(), rows));
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(CACHE_TTL)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiSummary {
    pub total_claims: i64,
    pub fraud_cases: i64,
    pub fraud_rate: f64,
    pub avg_risk_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KpiCard {
    Metrics(KpiSummary),
    Placeholder { message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct InsightsDashboard {
    pub kpis: KpiCard,
    pub fraud_types: ChartPanel,
    pub red_flags: ChartPanel,
    pub trends: ChartPanel,
    pub warnings: Vec<String>,
    pub refresh_seconds: u64,
}

#[derive(Clone)]
pub struct InsightsService {
    statements: StatementExecution,
    warehouse_id: String,
    table: String,
    cache: Arc<QueryCache>,
}

impl InsightsService {
    pub fn new(
        statements: StatementExecution,
        warehouse_id: impl Into<String>,
        table: impl Into<String>,
        cache: Arc<QueryCache>,
    ) -> Self {
        Self {
            statements,
            warehouse_id: warehouse_id.into(),
            table: table.into(),
            cache,
        }
    }

    async fn rows(&self, query: InsightQuery) -> Result<Rows, AnalyticsError> {
        if let Some(rows) = self.cache.get(query) {
            debug!(?query, "Insight query served from cache");
            return Ok(rows);
        }

        let response = self
            .statements
            .query(&self.warehouse_id, query.sql(&self.table))
            .await?;
        if !response.succeeded() {
            let message = response
                .error_message()
                .map(str::to_string)
                .unwrap_or_else(|| format!("statement ended in state {:?}", response.status.state));
            return Err(AnalyticsError::Statement(message));
        }

        if response.has_more_chunks() {
            warn!(?query, "Insight query result has further chunks; only the first was read");
        }
        let rows: Rows = Arc::new(response.rows().to_vec());
        debug!(?query, rows = rows.len(), "Insight query executed");
        self.cache.insert(query, rows.clone());
        Ok(rows)
    }

    pub async fn dashboard(&self) -> InsightsDashboard {
        let (kpis, fraud_types, red_flags, trends) = tokio::join!(
            self.rows(InsightQuery::Kpis),
            self.rows(InsightQuery::FraudByType),
            self.rows(InsightQuery::RedFlags),
            self.rows(InsightQuery::Trends),
        );

        let mut warnings = Vec::new();

        let kpis = match kpis {
            Ok(rows) => kpi_card(&rows),
            Err(e) => {
                warn!(error = %e, "KPI query failed");
                warnings.push(format!("❌ Error fetching statistics: {e}"));
                if is_missing_table(&e) {
                    warnings.push(
                        "📊 Table Not Found: the fraud_analysis table may not exist yet. Run batch processing first to populate data."
                            .to_string(),
                    );
                }
                placeholder_card()
            }
        };

        let fraud_types = chart_or_warning(
            fraud_types,
            fraud_type_chart,
            "⚠️ Cannot fetch fraud types",
            NO_FRAUD_TYPE_DATA,
            &mut warnings,
        );
        let red_flags = chart_or_warning(
            red_flags,
            red_flag_chart,
            "⚠️ Cannot fetch indicators",
            NO_RED_FLAG_DATA,
            &mut warnings,
        );
        let trends = chart_or_warning(
            trends,
            trend_chart,
            "⚠️ Cannot fetch trends",
            NO_TREND_DATA,
            &mut warnings,
        );

        info!(warnings = warnings.len(), "Insights dashboard assembled");
        InsightsDashboard {
            kpis,
            fraud_types,
            red_flags,
            trends,
            warnings,
            refresh_seconds: CACHE_TTL.as_secs(),
        }
    }
}

fn chart_or_warning(
    rows: Result<Rows, AnalyticsError>,
    build: fn(&[Vec<Value>]) -> Option<ChartPanel>,
    failure_prefix: &str,
    empty_message: &str,
    warnings: &mut Vec<String>,
) -> ChartPanel {
    match rows {
        Ok(rows) => build(&rows).unwrap_or_else(|| ChartPanel::placeholder(empty_message)),
        Err(e) => {
            warn!(error = %e, "{failure_prefix}");
            warnings.push(format!("{failure_prefix}: {e}"));
            ChartPanel::placeholder(empty_message)
        }
    }
}

fn is_missing_table(error: &AnalyticsError) -> bool {
    let text = error.to_string().to_lowercase();
    text.contains("not found") || text.contains("does not exist")
}

fn placeholder_card() -> KpiCard {
    KpiCard::Placeholder {
        message: NO_KPI_DATA.to_string(),
    }
}

fn kpi_card(rows: &[Vec<Value>]) -> KpiCard {
    let Some(row) = rows.first() else {
        return placeholder_card();
    };
    let summary = KpiSummary {
        total_claims: cell_i64(row.first()),
        fraud_cases: cell_i64(row.get(1)),
        fraud_rate: cell_f64(row.get(2)),
        avg_risk_score: cell_f64(row.get(3)),
    };
    if summary.total_claims == 0 {
        return placeholder_card();
    }
    KpiCard::Metrics(summary)
}

fn fraud_type_chart(rows: &[Vec<Value>]) -> Option<ChartPanel> {
    if rows.is_empty() {
        return None;
    }
    Some(ChartPanel::Pie {
        title: "Distribution of Fraud Types".to_string(),
        labels: rows
            .iter()
            .map(|row| cell_label(row.first(), "Unknown"))
            .collect(),
        values: rows.iter().map(|row| cell_f64(row.get(1))).collect(),
    })
}

/// Red flag counts from `(indicator, count)` rows; most frequent first, ties
/// by name.
pub fn top_red_flags(rows: &[Vec<Value>], limit: usize) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = rows
        .iter()
        .filter_map(|row| match row.first() {
            Some(Value::String(flag)) => Some((flag.clone(), cell_f64(row.get(1)) as usize)),
            _ => None,
        })
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts.truncate(limit);
    counts
}

fn red_flag_chart(rows: &[Vec<Value>]) -> Option<ChartPanel> {
    let flags = top_red_flags(rows, TOP_RED_FLAGS);
    if flags.is_empty() {
        return None;
    }
    Some(ChartPanel::Bar {
        title: "Most Common Fraud Indicators".to_string(),
        orientation: Orientation::Horizontal,
        label_axis: "Red Flag".to_string(),
        value_axis: "Number of Occurrences".to_string(),
        labels: flags.iter().map(|(flag, _)| flag.clone()).collect(),
        values: flags.iter().map(|(_, count)| *count as f64).collect(),
    })
}

/// Daily fraud rate in percent, one decimal; zero for days without claims.
pub fn fraud_rate(fraud_cases: f64, total_claims: f64) -> f64 {
    if total_claims <= 0.0 {
        return 0.0;
    }
    (fraud_cases / total_claims * 1000.0).round() / 10.0
}

fn trend_chart(rows: &[Vec<Value>]) -> Option<ChartPanel> {
    if rows.is_empty() {
        return None;
    }
    let totals: Vec<f64> = rows.iter().map(|row| cell_f64(row.get(1))).collect();
    let frauds: Vec<f64> = rows.iter().map(|row| cell_f64(row.get(2))).collect();
    let rates = totals
        .iter()
        .zip(&frauds)
        .map(|(total, fraud)| fraud_rate(*fraud, *total))
        .collect();

    Some(ChartPanel::TimeSeries {
        title: "Claims Analysis and Fraud Rate Over Time".to_string(),
        dates: rows.iter().map(|row| cell_label(row.first(), "")).collect(),
        series: vec![
            Series {
                name: "Total Claims".to_string(),
                values: totals,
                axis: Axis::Primary,
            },
            Series {
                name: "Fraud Cases".to_string(),
                values: frauds,
                axis: Axis::Primary,
            },
            Series {
                name: "Fraud Rate (%)".to_string(),
                values: rates,
                axis: Axis::Secondary,
            },
        ],
    })
}

/// Looks up the Genie space: environment first, then the config table.
pub async fn resolve_genie_space(
    config: &AppConfig,
    statements: &StatementExecution,
) -> Option<String> {
    if let Some(space_id) = &config.genie_space_id {
        return Some(space_id.clone());
    }

    let statement = format!(
        "SELECT config_value FROM {} WHERE config_key = {}",
        config.genie_config_table(),
        sql_string_literal("genie_space_id")
    );
    match statements.query(&config.warehouse_id, statement).await {
        Ok(response) if response.succeeded() => match response.first_cell() {
            Some(Value::String(space_id)) if !space_id.trim().is_empty() => {
                info!(%space_id, "Genie space discovered from config table");
                Some(space_id.trim().to_string())
            }
            _ => None,
        },
        Ok(response) => {
            debug!(error = response.error_message().unwrap_or("none"), "Genie config lookup did not succeed");
            None
        }
        Err(e) => {
            debug!(error = %e, "Genie config lookup failed");
            None
        }
    }
}

fn cell_f64(cell: Option<&Value>) -> f64 {
    match cell {
        Some(Value::Number(n)) => n.as_f64().unwrap_or_default(),
        Some(Value::String(text)) => text.trim().parse().unwrap_or_default(),
        _ => 0.0,
    }
}

fn cell_i64(cell: Option<&Value>) -> i64 {
    cell_f64(cell) as i64
}

fn cell_label(cell: Option<&Value>, fallback: &str) -> String {
    match cell {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Null) | None => fallback.to_string(),
        Some(other) => other.to_string(),
    }
}

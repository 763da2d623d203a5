use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::models::{MetricQuery, TimeRange};
use crate::{GatewayError, Result};

pub mod flatten;
pub mod query;

pub use flatten::{flatten, EMPTY_METRIC_ERROR};
pub use query::build_query;

/// Characters Elasticsearch refuses in index names.
const FORBIDDEN_INDEX_CHARS: &[char] = &['\\', '/', '*', '?', '"', '<', '>', '|', ',', '#', ':', ' '];

/// Characters an index name may not start with.
const FORBIDDEN_LEADING_CHARS: &[char] = &['-', '_', '+'];

/// Query-string parameters of a statistics request.
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsParams {
    pub metrics: Vec<String>,
    pub host: Option<String>,
    pub time_range: Option<TimeRange>,
}

impl StatisticsParams {
    /// Normalizes raw query pairs. `metric` may repeat; `from`/`to` only apply
    /// when both are present.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Result<Self> {
        let mut metrics = Vec::new();
        let mut host = None;
        let mut from = None;
        let mut to = None;

        for (key, value) in pairs {
            match key.as_str() {
                "metric" => metrics.push(value),
                "host" if !value.is_empty() => host = Some(value),
                "from" if !value.is_empty() => from = Some(value),
                "to" if !value.is_empty() => to = Some(value),
                _ => {}
            }
        }

        metrics.retain(|m| !m.is_empty());
        if metrics.is_empty() {
            return Err(GatewayError::MissingParameter(
                "the 'metric' query parameter is required".to_string(),
            ));
        }

        Ok(Self {
            metrics,
            host,
            time_range: time_range(from, to)?,
        })
    }

    pub fn into_query(self, type_filter: Option<&str>) -> MetricQuery {
        let mut query = MetricQuery::new(self.metrics).with_time_range(self.time_range);
        if let Some(host) = self.host {
            query = query.with_host_prefix(host);
        }
        if let Some(type_filter) = type_filter {
            query = query.with_type(type_filter);
        }
        query
    }
}

/// Pairs the bounds into a range. Bounds that both parse as timestamps must
/// be ordered; anything else is handed to the store verbatim.
pub fn time_range(from: Option<String>, to: Option<String>) -> Result<Option<TimeRange>> {
    let (from, to) = match (from, to) {
        (Some(from), Some(to)) => (from, to),
        _ => return Ok(None),
    };

    if let (Some(start), Some(end)) = (timestamp_millis(&from), timestamp_millis(&to)) {
        if start > end {
            return Err(GatewayError::InvalidQuery(format!(
                "'from' ({}) is after 'to' ({})",
                from, to
            )));
        }
    }

    Ok(Some(TimeRange { from, to }))
}

fn timestamp_millis(raw: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.and_utc().timestamp_millis());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp_millis());
    }
    raw.parse::<i64>().ok()
}

/// Rejects identifiers that cannot be part of an index name.
pub fn validate_identifier(kind: &str, id: &str) -> Result<()> {
    if id.is_empty() || id.contains(FORBIDDEN_INDEX_CHARS) {
        return Err(GatewayError::InvalidQuery(format!(
            "{} '{}' contains characters not allowed in an index name",
            kind, id
        )));
    }
    if id.starts_with(FORBIDDEN_LEADING_CHARS) {
        return Err(GatewayError::InvalidQuery(format!(
            "{} '{}' must not start with '-', '_' or '+'",
            kind, id
        )));
    }
    Ok(())
}

/// Index holding the measurements of one task of a workflow.
pub fn data_index(workflow_id: &str, task_id: &str) -> String {
    format!("{}_{}", workflow_id, task_id).to_lowercase()
}

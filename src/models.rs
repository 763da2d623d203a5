use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Link to a gateway resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Href {
    pub href: String,
}

impl Href {
    pub fn new(href: impl Into<String>) -> Self {
        Self { href: href.into() }
    }
}

/// One step of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A workflow definition: ordered tasks plus whatever descriptive fields
/// the client stored alongside them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Workflow {
    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.name.as_str()).collect()
    }
}

/// Inclusive `[from, to]` window on the measurement timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeRange {
    pub from: String,
    pub to: String,
}

/// Everything needed to build one statistics query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricQuery {
    pub metrics: Vec<String>,
    pub type_filter: Option<String>,
    pub host_prefix: Option<String>,
    pub time_range: Option<TimeRange>,
}

impl MetricQuery {
    pub fn new(metrics: Vec<String>) -> Self {
        Self {
            metrics,
            ..Default::default()
        }
    }

    pub fn with_type(mut self, type_filter: impl Into<String>) -> Self {
        self.type_filter = Some(type_filter.into());
        self
    }

    pub fn with_host_prefix(mut self, host: impl Into<String>) -> Self {
        self.host_prefix = Some(host.into());
        self
    }

    pub fn with_time_range(mut self, time_range: Option<TimeRange>) -> Self {
        self.time_range = time_range;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StdDeviationBounds {
    pub upper: f64,
    pub lower: f64,
}

/// The `extended_stats` block reported for a metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendedStats {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub sum: f64,
    pub sum_of_squares: f64,
    pub variance: f64,
    pub std_deviation: f64,
    pub std_deviation_bounds: StdDeviationBounds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricOutcome {
    Found {
        statistics: ExtendedStats,
        min: Value,
        max: Value,
        workflow: Href,
    },
    Empty {
        error: String,
    },
}

/// Per-metric entry of a statistics response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub metric: String,
    #[serde(flatten)]
    pub outcome: MetricOutcome,
}

impl MetricSummary {
    pub fn is_empty(&self) -> bool {
        matches!(self.outcome, MetricOutcome::Empty { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_workflow_keeps_unknown_fields() {
        let raw = json!({
            "application": "ms2",
            "author": "Random Guy",
            "tasks": [
                { "name": "T1", "exec": "/home/ubuntu/ms2/t1.sh", "cores_nr": "1-2" },
                { "name": "T2.1", "exec": "/home/ubuntu/ms2/t21.sh", "previous": "T1" }
            ]
        });

        let workflow: Workflow = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(workflow.task_names(), vec!["T1", "T2.1"]);
        assert_eq!(workflow.tasks[1].previous.as_deref(), Some("T1"));
        assert_eq!(serde_json::to_value(&workflow).unwrap(), raw);
    }

    #[test]
    fn test_empty_summary_serializes_error_only() {
        let summary = MetricSummary {
            metric: "power".to_string(),
            outcome: MetricOutcome::Empty {
                error: "response is empty for the metric".to_string(),
            },
        };
        assert!(summary.is_empty());
        assert_eq!(
            serde_json::to_value(&summary).unwrap(),
            json!({ "metric": "power", "error": "response is empty for the metric" })
        );
    }
}

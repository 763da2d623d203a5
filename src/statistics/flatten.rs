use serde_json::Value;

use super::query::{max_agg_name, min_agg_name, stats_agg_name, FILTERED_AGG};
use crate::models::{ExtendedStats, Href, MetricOutcome, MetricSummary};
use crate::{GatewayError, Result};

pub const EMPTY_METRIC_ERROR: &str = "response is empty for the metric";

/// Flattens the `aggregations` object of a search response.
///
/// Output order follows `metrics`, duplicates included.
pub fn flatten(
    aggregations: &Value,
    metrics: &[String],
    workflow_href: &str,
    time_range: bool,
) -> Result<Vec<MetricSummary>> {
    let root = if time_range {
        aggregations.get(FILTERED_AGG).ok_or_else(|| {
            GatewayError::MalformedResponse(format!("missing aggregation {}", FILTERED_AGG))
        })?
    } else {
        aggregations
    };

    metrics
        .iter()
        .map(|metric| summarize(root, metric, workflow_href))
        .collect()
}

fn summarize(root: &Value, metric: &str, workflow_href: &str) -> Result<MetricSummary> {
    let stats = aggregation(root, &stats_agg_name(metric))?;
    let min_hits = aggregation(root, &min_agg_name(metric))?;
    let max_hits = aggregation(root, &max_agg_name(metric))?;

    // Documents lacking the field still count as top-hits, so check the stats too.
    let count = stats.get("count").and_then(Value::as_u64).unwrap_or(0);
    if total_hits(min_hits) == 0 || count == 0 {
        return Ok(MetricSummary {
            metric: metric.to_string(),
            outcome: MetricOutcome::Empty {
                error: EMPTY_METRIC_ERROR.to_string(),
            },
        });
    }

    let statistics: ExtendedStats = serde_json::from_value(stats.clone())?;

    Ok(MetricSummary {
        metric: metric.to_string(),
        outcome: MetricOutcome::Found {
            statistics,
            min: first_source(min_hits, metric)?,
            max: first_source(max_hits, metric)?,
            workflow: Href::new(workflow_href),
        },
    })
}

fn aggregation<'a>(root: &'a Value, name: &str) -> Result<&'a Value> {
    root.get(name)
        .ok_or_else(|| GatewayError::MalformedResponse(format!("missing aggregation {}", name)))
}

/// Hit total of a `top_hits` node; accepts both `total: n` and `total: { value: n }`.
fn total_hits(top_hits: &Value) -> u64 {
    let hits = &top_hits["hits"];
    match &hits["total"] {
        Value::Number(n) => n.as_u64().unwrap_or(0),
        Value::Object(total) => total.get("value").and_then(Value::as_u64).unwrap_or(0),
        _ => hits["hits"].as_array().map_or(0, |h| h.len() as u64),
    }
}

fn first_source(top_hits: &Value, metric: &str) -> Result<Value> {
    top_hits
        .pointer("/hits/hits/0/_source")
        .cloned()
        .ok_or_else(|| {
            GatewayError::MalformedResponse(format!("top hit for {} has no document", metric))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const HREF: &str = "http://localhost:3030/workflows/ms2";

    fn stats(count: u64) -> Value {
        json!({
            "count": count,
            "min": 1.0,
            "max": 9.0,
            "avg": 5.0,
            "sum": 10.0 * count as f64,
            "sum_of_squares": 82.0,
            "variance": 16.0,
            "std_deviation": 4.0,
            "std_deviation_bounds": { "upper": 13.0, "lower": -3.0 }
        })
    }

    fn top_hits(total: Value, source: Option<Value>) -> Value {
        let hits: Vec<Value> = source
            .into_iter()
            .map(|s| json!({ "_id": "x", "_source": s }))
            .collect();
        json!({ "hits": { "total": total, "hits": hits } })
    }

    fn metric_aggs(metric: &str, count: u64) -> Vec<(String, Value)> {
        let (min, max) = if count > 0 {
            (
                Some(json!({ "host": "node01", metric: 1.0 })),
                Some(json!({ "host": "node02", metric: 9.0 })),
            )
        } else {
            (None, None)
        };
        vec![
            (stats_agg_name(metric), stats(count)),
            (min_agg_name(metric), top_hits(json!(count), min)),
            (max_agg_name(metric), top_hits(json!(count), max)),
        ]
    }

    fn aggregations(parts: &[(&str, u64)]) -> Value {
        let mut map = serde_json::Map::new();
        for (metric, count) in parts {
            map.extend(metric_aggs(metric, *count));
        }
        Value::Object(map)
    }

    #[test]
    fn test_found_metric() {
        let aggs = aggregations(&[("CPU0::PAPI_TOT_CYC", 2)]);
        let out = flatten(&aggs, &["CPU0::PAPI_TOT_CYC".to_string()], HREF, false).unwrap();

        assert_eq!(out.len(), 1);
        match &out[0].outcome {
            MetricOutcome::Found {
                statistics,
                min,
                max,
                workflow,
            } => {
                assert_eq!(statistics.count, 2);
                assert_eq!(min["CPU0::PAPI_TOT_CYC"], 1.0);
                assert_eq!(max["host"], "node02");
                assert_eq!(workflow.href, HREF);
            }
            other => panic!("expected statistics, got {:?}", other),
        }

        let rendered = serde_json::to_value(&out[0]).unwrap();
        assert!(rendered.get("error").is_none());
        assert!(rendered.get("statistics").is_some());
    }

    #[test]
    fn test_zero_hits_yields_error_only() {
        let aggs = aggregations(&[("power", 0)]);
        let out = flatten(&aggs, &["power".to_string()], HREF, false).unwrap();

        assert_eq!(
            serde_json::to_value(&out).unwrap(),
            json!([{ "metric": "power", "error": EMPTY_METRIC_ERROR }])
        );
    }

    #[test]
    fn test_hits_without_metric_values_are_empty() {
        let mut aggs = aggregations(&[("power", 3)]);
        aggs["power_Stats"] = stats(0);
        let out = flatten(&aggs, &["power".to_string()], HREF, false).unwrap();
        assert!(out[0].is_empty());
    }

    #[test]
    fn test_object_hit_total() {
        let mut aggs = aggregations(&[("A", 1)]);
        aggs["Minimum_A"]["hits"]["total"] = json!({ "value": 0, "relation": "eq" });
        let out = flatten(&aggs, &["A".to_string()], HREF, false).unwrap();
        assert!(out[0].is_empty());
    }

    #[test]
    fn test_order_and_duplicates_preserved() {
        let aggs = aggregations(&[("A", 1), ("B", 0)]);
        let metrics: Vec<String> = ["B", "A", "B"].iter().map(|s| s.to_string()).collect();
        let out = flatten(&aggs, &metrics, HREF, false).unwrap();

        let names: Vec<&str> = out.iter().map(|s| s.metric.as_str()).collect();
        assert_eq!(names, vec!["B", "A", "B"]);
        assert!(out[0].is_empty());
        assert!(!out[1].is_empty());
        assert!(out[2].is_empty());
    }

    #[test]
    fn test_time_range_reads_filtered_node() {
        let inner = aggregations(&[("A", 4)]);
        let aggs = json!({ FILTERED_AGG: inner, "doc_count": 4 });

        let out = flatten(&aggs, &["A".to_string()], HREF, true).unwrap();
        assert!(!out[0].is_empty());

        // Without the flag the root is used and the metric clauses are not there.
        let err = flatten(&aggs, &["A".to_string()], HREF, false).unwrap_err();
        assert!(matches!(err, GatewayError::MalformedResponse(_)));
    }

    #[test]
    fn test_missing_filtered_node() {
        let aggs = aggregations(&[("A", 4)]);
        let err = flatten(&aggs, &["A".to_string()], HREF, true).unwrap_err();
        assert!(matches!(err, GatewayError::MalformedResponse(_)));
    }
}

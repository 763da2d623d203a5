use serde_json::{json, Map, Value};
use std::collections::HashSet;

use crate::models::{MetricQuery, TimeRange};
use crate::{GatewayError, Result};

pub const TIMESTAMP_FIELD: &str = "@timestamp";
pub const TYPE_FIELD: &str = "type";
pub const HOST_FIELD: &str = "host";

/// Aggregation wrapping the per-metric clauses when a time range applies.
pub const FILTERED_AGG: &str = "filtered_stats";

pub fn stats_agg_name(metric: &str) -> String {
    format!("{}_Stats", metric)
}

pub fn min_agg_name(metric: &str) -> String {
    format!("Minimum_{}", metric)
}

pub fn max_agg_name(metric: &str) -> String {
    format!("Maximum_{}", metric)
}

pub fn build_query(query: &MetricQuery) -> Result<Value> {
    if query.metrics.is_empty() {
        return Err(GatewayError::InvalidQuery(
            "at least one metric is required".to_string(),
        ));
    }

    let metric_aggs = metric_aggregations(&query.metrics)?;
    let aggs = match &query.time_range {
        Some(range) => json!({
            FILTERED_AGG: {
                "filter": range_filter(range),
                "aggs": metric_aggs,
            }
        }),
        None => Value::Object(metric_aggs),
    };

    Ok(json!({
        "size": 0,
        "query": document_filter(query),
        "aggs": aggs,
    }))
}

fn metric_aggregations(metrics: &[String]) -> Result<Map<String, Value>> {
    let mut aggs = Map::new();
    let mut seen = HashSet::new();
    for metric in metrics {
        // Repeated metrics share their clauses.
        if !seen.insert(metric.as_str()) {
            continue;
        }

        let clauses = [
            (stats_agg_name(metric), json!({ "extended_stats": { "field": metric } })),
            (min_agg_name(metric), top_hit(metric, "asc")),
            (max_agg_name(metric), top_hit(metric, "desc")),
        ];
        for (name, clause) in clauses {
            if aggs.contains_key(&name) {
                return Err(GatewayError::InvalidQuery(format!(
                    "metric '{}' produces aggregation name '{}' already used by another metric",
                    metric, name
                )));
            }
            aggs.insert(name, clause);
        }
    }
    Ok(aggs)
}

fn top_hit(metric: &str, order: &str) -> Value {
    let mut sort = Map::new();
    sort.insert(
        metric.to_string(),
        json!({ "order": order, "unmapped_type": "double" }),
    );

    json!({
        "top_hits": {
            "size": 1,
            "sort": [Value::Object(sort)],
        }
    })
}

fn range_filter(range: &TimeRange) -> Value {
    json!({
        "range": {
            TIMESTAMP_FIELD: {
                "gte": range.from,
                "lte": range.to,
            }
        }
    })
}

/// Top-level query restricting documents by experiment type and host prefix.
fn document_filter(query: &MetricQuery) -> Value {
    let mut filters = Vec::new();
    if let Some(type_filter) = &query.type_filter {
        filters.push(json!({ "term": { TYPE_FIELD: type_filter } }));
    }
    if let Some(host) = &query.host_prefix {
        filters.push(json!({ "prefix": { HOST_FIELD: host } }));
    }

    if filters.is_empty() {
        json!({ "match_all": {} })
    } else {
        json!({ "bool": { "filter": filters } })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn metrics(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_metrics_rejected() {
        let err = build_query(&MetricQuery::new(Vec::new())).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidQuery(_)));
    }

    #[test]
    fn test_unfiltered_query_shape() {
        let body = build_query(&MetricQuery::new(metrics(&["CPU0::PAPI_TOT_CYC"]))).unwrap();

        assert_eq!(
            body,
            json!({
                "size": 0,
                "query": { "match_all": {} },
                "aggs": {
                    "CPU0::PAPI_TOT_CYC_Stats": {
                        "extended_stats": { "field": "CPU0::PAPI_TOT_CYC" }
                    },
                    "Minimum_CPU0::PAPI_TOT_CYC": {
                        "top_hits": {
                            "size": 1,
                            "sort": [{ "CPU0::PAPI_TOT_CYC": { "order": "asc", "unmapped_type": "double" } }]
                        }
                    },
                    "Maximum_CPU0::PAPI_TOT_CYC": {
                        "top_hits": {
                            "size": 1,
                            "sort": [{ "CPU0::PAPI_TOT_CYC": { "order": "desc", "unmapped_type": "double" } }]
                        }
                    }
                }
            })
        );
    }

    #[test]
    fn test_three_clauses_per_metric() {
        let body = build_query(&MetricQuery::new(metrics(&["A", "B", "C"]))).unwrap();
        let aggs = body["aggs"].as_object().unwrap();

        assert_eq!(aggs.len(), 9);
        for m in ["A", "B", "C"] {
            assert!(aggs[&stats_agg_name(m)].get("extended_stats").is_some());
            assert_eq!(aggs[&min_agg_name(m)]["top_hits"]["sort"][0][m]["order"], "asc");
            assert_eq!(aggs[&max_agg_name(m)]["top_hits"]["sort"][0][m]["order"], "desc");
        }
    }

    #[test]
    fn test_host_filter_uses_top_level_query() {
        let query = MetricQuery::new(metrics(&["A", "B"])).with_host_prefix("node01");
        let body = build_query(&query).unwrap();

        assert_eq!(
            body["query"],
            json!({ "bool": { "filter": [{ "prefix": { "host": "node01" } }] } })
        );
        assert!(body["aggs"].get(FILTERED_AGG).is_none());
        assert!(body["aggs"].get("A_Stats").is_some());
    }

    #[test]
    fn test_type_and_host_filters_combined() {
        let query = MetricQuery::new(metrics(&["A"]))
            .with_type("AVx9O6YJ8GaVDOxtmVOE")
            .with_host_prefix("node");
        let body = build_query(&query).unwrap();

        assert_eq!(
            body["query"]["bool"]["filter"],
            json!([
                { "term": { "type": "AVx9O6YJ8GaVDOxtmVOE" } },
                { "prefix": { "host": "node" } }
            ])
        );
    }

    #[test]
    fn test_time_range_nests_aggregations() {
        let query = MetricQuery::new(metrics(&["A"]))
            .with_host_prefix("node01")
            .with_time_range(Some(TimeRange {
                from: "2016-05-10T17:35:00.000".to_string(),
                to: "2016-05-10T17:40:00.000".to_string(),
            }));
        let body = build_query(&query).unwrap();

        let filtered = &body["aggs"][FILTERED_AGG];
        assert_eq!(
            filtered["filter"],
            json!({
                "range": {
                    "@timestamp": {
                        "gte": "2016-05-10T17:35:00.000",
                        "lte": "2016-05-10T17:40:00.000"
                    }
                }
            })
        );
        assert_eq!(filtered["aggs"].as_object().unwrap().len(), 3);
        assert!(body["aggs"].get("A_Stats").is_none());
        assert_eq!(
            body["query"],
            json!({ "bool": { "filter": [{ "prefix": { "host": "node01" } }] } })
        );
    }

    #[test]
    fn test_repeated_metric_emits_clauses_once() {
        let body = build_query(&MetricQuery::new(metrics(&["A", "B", "A"]))).unwrap();
        assert_eq!(body["aggs"].as_object().unwrap().len(), 6);
    }

    #[test]
    fn test_colliding_clause_names_rejected() {
        // `Minimum_A` yields `Minimum_A_Stats`, which is also the min clause of `A_Stats`.
        let err = build_query(&MetricQuery::new(metrics(&["Minimum_A", "A_Stats"]))).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidQuery(_)));

        let err = build_query(&MetricQuery::new(metrics(&["A_Stats", "Minimum_A"]))).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidQuery(_)));
    }

    #[test]
    fn test_hostile_values_stay_data() {
        let hostile = r#"x"}},"match_all":{"#;
        let query = MetricQuery::new(vec![hostile.to_string()]).with_host_prefix(hostile);
        let body = build_query(&query).unwrap();

        assert_eq!(body["query"]["bool"]["filter"][0]["prefix"]["host"], hostile);
        assert_eq!(
            body["aggs"][stats_agg_name(hostile)]["extended_stats"]["field"],
            hostile
        );
        let reparsed: Value = serde_json::from_str(&body.to_string()).unwrap();
        assert_eq!(reparsed, body);
    }
}

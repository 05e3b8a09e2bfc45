// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Raw Strava activity records and the per-category summary.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One activity exactly as Strava returned it.
///
/// Records are deliberately schema-less: the export preserves every field the
/// API sent, and downstream analysis defines its own column mapping. The core
/// only ever looks at the numeric `id` and the sport category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityRecord(pub Map<String, Value>);

impl ActivityRecord {
    /// Platform-assigned activity ID, unique within the account.
    pub fn id(&self) -> Option<u64> {
        self.0.get("id").and_then(Value::as_u64)
    }

    /// Sport category, falling back from `sport_type` to the legacy `type`.
    pub fn category(&self) -> &str {
        for key in ["sport_type", "type"] {
            if let Some(s) = self.0.get(key).and_then(Value::as_str) {
                if !s.is_empty() {
                    return s;
                }
            }
        }
        "Unknown"
    }
}

/// Count activities per sport category, most frequent first.
///
/// Ties break alphabetically so the summary is deterministic.
pub fn summarize_by_category(records: &[ActivityRecord]) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for record in records {
        *counts.entry(record.category()).or_insert(0) += 1;
    }

    let mut summary: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(category, count)| (category.to_string(), count))
        .collect();
    summary.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> ActivityRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_category_prefers_sport_type() {
        let rec = record(json!({ "sport_type": "TrailRun", "type": "Run" }));
        assert_eq!(rec.category(), "TrailRun");
    }

    #[test]
    fn test_category_falls_back_to_type() {
        let rec = record(json!({ "type": "Ride" }));
        assert_eq!(rec.category(), "Ride");

        // Present-but-null sport_type must not swallow the fallback
        let rec = record(json!({ "sport_type": null, "type": "Ride" }));
        assert_eq!(rec.category(), "Ride");
    }

    #[test]
    fn test_category_unknown_when_absent() {
        let rec = record(json!({ "id": 7 }));
        assert_eq!(rec.category(), "Unknown");
    }

    #[test]
    fn test_id_extraction() {
        let rec = record(json!({ "id": 123456789 }));
        assert_eq!(rec.id(), Some(123456789));

        let rec = record(json!({ "name": "no id" }));
        assert_eq!(rec.id(), None);
    }

    #[test]
    fn test_summary_orders_by_count_then_name() {
        let records: Vec<ActivityRecord> = [
            json!({ "sport_type": "Run" }),
            json!({ "sport_type": "Run" }),
            json!({ "sport_type": "Hike" }),
            json!({ "sport_type": "Ride" }),
            json!({ "type": "Ride" }),
            json!({}),
        ]
        .into_iter()
        .map(record)
        .collect();

        let summary = summarize_by_category(&records);
        assert_eq!(
            summary,
            vec![
                ("Ride".to_string(), 2),
                ("Run".to_string(), 2),
                ("Hike".to_string(), 1),
                ("Unknown".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_record_roundtrips_unknown_fields() {
        let raw = json!({
            "id": 42,
            "sport_type": "Ride",
            "suffer_score": 55,
            "map": { "summary_polyline": "abc" }
        });
        let rec = record(raw.clone());
        assert_eq!(serde_json::to_value(&rec).unwrap(), raw);
    }
}

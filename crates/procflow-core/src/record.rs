//! Records produced by the external mining engine.
//!
//! Field names follow the engine's JSON document verbatim.

use serde::{Deserialize, Serialize};

/// One row of `graphData`: an observed transition between two activities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    #[serde(rename = "Source_Activity", default)]
    pub source: Option<String>,
    #[serde(rename = "Target_Activity", default)]
    pub target: Option<String>,
    #[serde(rename = "Mean_Duration_Seconds", default)]
    pub mean_duration_seconds: Option<f64>,
    /// Present when the engine keeps the raw total column.
    #[serde(
        rename = "Total_Duration_Seconds",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub total_duration_seconds: Option<f64>,
    #[serde(rename = "Tooltip_Total_Time", default)]
    pub tooltip_total_time: String,
    #[serde(rename = "Tooltip_Mean_Time", default)]
    pub tooltip_mean_time: String,
    #[serde(rename = "Weight_Value", default)]
    pub weight: f64,
    #[serde(rename = "Edge_Label", default)]
    pub label: String,
}

impl EdgeRecord {
    pub fn new(source: &str, target: &str, weight: f64) -> Self {
        Self {
            source: Some(source.to_string()),
            target: Some(target.to_string()),
            weight,
            label: weight.to_string(),
            ..Default::default()
        }
    }

    /// Source and target, if both are present and non-blank.
    pub fn endpoints(&self) -> Option<(&str, &str)> {
        let source = self.source.as_deref().filter(|s| !s.trim().is_empty())?;
        let target = self.target.as_deref().filter(|s| !s.trim().is_empty())?;
        Some((source, target))
    }
}

/// A pre-mined end-to-end process variant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariantRecord {
    #[serde(rename = "Variant_Path")]
    pub path: Vec<String>,
    #[serde(rename = "Frequency", default)]
    pub frequency: u64,
    /// Mean seconds from case start, one entry per activity.
    #[serde(rename = "Avg_Timings", default)]
    pub avg_timings: Vec<f64>,
    #[serde(rename = "Total_Timings", default)]
    pub total_timings: Vec<f64>,
    #[serde(rename = "Percentage", default)]
    pub percentage: f64,
}

/// The engine's main response document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineOutput {
    #[serde(default)]
    pub graph_data: Vec<EdgeRecord>,
    #[serde(default)]
    pub variants: Vec<VariantRecord>,
    #[serde(default)]
    pub outliers: Vec<VariantRecord>,
    #[serde(default)]
    pub start_activities: Vec<String>,
    #[serde(default)]
    pub end_activities: Vec<String>,
}

/// A single case resolved to its activity sequence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseTrace {
    pub case_id: String,
    pub path: Vec<String>,
    /// Seconds spent on each transition; `path.len() - 1` entries.
    #[serde(default)]
    pub durations: Vec<f64>,
}

/// Distribution data for a single edge or the whole log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Histogram {
    #[serde(default)]
    pub bin_edges: Vec<f64>,
    #[serde(default)]
    pub counts: Vec<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_output_parses_engine_field_names() {
        let json = r#"{
            "graphData": [
                {"Source_Activity": "A", "Target_Activity": "B",
                 "Mean_Duration_Seconds": 30.0, "Tooltip_Total_Time": "01m",
                 "Tooltip_Mean_Time": "30s", "Weight_Value": 2, "Edge_Label": "2"},
                {"Source_Activity": null, "Target_Activity": "B", "Weight_Value": 1}
            ],
            "variants": [
                {"Variant_Path": ["A", "B"], "Frequency": 2,
                 "Avg_Timings": [0.0, 30.0], "Total_Timings": [0.0, 60.0],
                 "Percentage": 100.0, "True_Start_Count": 2}
            ],
            "startActivities": ["A"],
            "endActivities": ["B"]
        }"#;

        let output: EngineOutput = serde_json::from_str(json).unwrap();
        assert_eq!(output.graph_data.len(), 2);
        assert_eq!(output.graph_data[0].endpoints(), Some(("A", "B")));
        assert_eq!(output.graph_data[1].endpoints(), None);
        assert_eq!(output.variants[0].frequency, 2);
        assert!(output.outliers.is_empty());
        assert_eq!(output.start_activities, vec!["A"]);
    }

    #[test]
    fn test_blank_endpoint_is_rejected() {
        let mut record = EdgeRecord::new("A", "B", 1.0);
        record.target = Some("   ".to_string());
        assert_eq!(record.endpoints(), None);
    }
}

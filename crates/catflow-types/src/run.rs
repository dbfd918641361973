//! Events and records produced while a cat runs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Recorded input/output/timing of one executed step.
///
/// Only present when the caller asked for debug output. Every field is
/// defaulted so that partially populated records from the server still load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DebugStep {
    #[serde(default)]
    pub index: u32,

    #[serde(default)]
    pub client_model: String,

    #[serde(default)]
    pub provider_model: String,

    #[serde(default)]
    pub duration_ms: u64,

    #[serde(default)]
    pub output_text: String,

    /// `None` unless the step's raw output parsed as JSON.
    #[serde(default)]
    pub parsed_json: Option<Value>,
}

/// How far a run has advanced. Transient, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub step: u32,
    pub total_steps: u32,
    pub step_name: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn debug_step_tolerates_missing_fields() {
        let step: DebugStep = serde_json::from_value(json!({"index": 3})).unwrap();
        assert_eq!(step.index, 3);
        assert!(step.output_text.is_empty());
        assert!(step.parsed_json.is_none());
    }

    #[test]
    fn debug_step_null_parsed_json() {
        let step: DebugStep = serde_json::from_value(json!({
            "index": 1,
            "client_model": "gemini-3-flash",
            "provider_model": "google/gemini-3-flash",
            "duration_ms": 1234,
            "output_text": "plain words",
            "parsed_json": null
        }))
        .unwrap();
        assert_eq!(step.duration_ms, 1234);
        assert!(step.parsed_json.is_none());
    }

    #[test]
    fn progress_update_wire_shape() {
        let update = ProgressUpdate {
            step: 2,
            total_steps: 4,
            step_name: "Gutter Overlay".into(),
            message: "Running vision step...".into(),
        };
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({"step": 2, "totalSteps": 4, "stepName": "Gutter Overlay", "message": "Running vision step..."})
        );
    }
}

//! Run results and the JSON result artifact
//!
//! A [`WorkflowResult`] is the complete, inspectable record of one run: an
//! ordered mapping of step id to [`StepResult`], overall status, and total
//! wall-clock time. It serializes to the artifact consumed by external
//! persistence collaborators:
//!
//! ```json
//! {"workflowName": ..., "totalExecutionTime": ..., "status": ...,
//!  "steps": {"step_id": {"prompt": ..., "result": ..., "outputs": ...,
//!            "model": ..., "temperature": ..., "executionTime": ..., "status": ...}}}
//! ```
//!
//! Parsing the artifact back reproduces every prompt, output, model, and
//! status field exactly; step order is preserved.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::MaestroError;

/// Per-step lifecycle: `Pending → Running → {Succeeded, SucceededWithWarning, Failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Succeeded,
    /// Outputs were recovered heuristically rather than structurally
    SucceededWithWarning,
    Failed,
}

/// Run lifecycle: `Pending → Running → {Completed, Failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Record of one executed step
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    /// Set from the enclosing map key in the artifact
    #[serde(skip)]
    pub step_id: String,
    /// Fully-substituted prompt sent to the model
    pub prompt: String,
    /// Raw model response (object for structured calls, string otherwise)
    pub result: Value,
    /// Extracted outputs merged into the run context
    pub outputs: BTreeMap<String, Value>,
    pub model: String,
    pub temperature: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,
    /// Wall-clock time around the model call, in seconds
    #[serde(with = "duration_secs")]
    pub execution_time: Duration,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Complete record of one workflow run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowResult {
    pub workflow_name: String,
    #[serde(with = "duration_secs")]
    pub total_execution_time: Duration,
    pub status: WorkflowStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(
        serialize_with = "steps_to_map",
        deserialize_with = "steps_from_map"
    )]
    pub steps: Vec<StepResult>,
}

impl WorkflowResult {
    pub fn is_completed(&self) -> bool {
        self.status == WorkflowStatus::Completed
    }

    pub fn step(&self, step_id: &str) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.step_id == step_id)
    }

    /// Serialize to the result artifact
    pub fn to_json(&self) -> Result<String, MaestroError> {
        serde_json::to_string_pretty(self).map_err(|e| MaestroError::Io(e.into()))
    }

    /// Parse a result artifact back
    pub fn from_json(json: &str) -> Result<Self, MaestroError> {
        serde_json::from_str(json).map_err(|e| MaestroError::Io(e.into()))
    }
}

/// Serialize the ordered step list as a JSON object keyed by step id,
/// preserving execution order in the document
fn steps_to_map<S>(steps: &[StepResult], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(steps.len()))?;
    for step in steps {
        map.serialize_entry(&step.step_id, step)?;
    }
    map.end()
}

fn steps_from_map<'de, D>(deserializer: D) -> Result<Vec<StepResult>, D::Error>
where
    D: Deserializer<'de>,
{
    struct StepsVisitor;

    impl<'de> Visitor<'de> for StepsVisitor {
        type Value = Vec<StepResult>;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            f.write_str("a map of step id to step result")
        }

        fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut steps = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((step_id, mut step)) = access.next_entry::<String, StepResult>()? {
                step.step_id = step_id;
                steps.push(step);
            }
            Ok(steps)
        }
    }

    deserializer.deserialize_map(StepsVisitor)
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        if secs.is_finite() && secs >= 0.0 {
            Ok(Duration::from_secs_f64(secs))
        } else {
            Err(serde::de::Error::custom(format!(
                "invalid duration: {secs}"
            )))
        }
    }
}

//! Workflow model and YAML loader

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::MaestroError;

/// Workflow parsed from YAML (raw)
#[derive(Debug, Deserialize)]
struct WorkflowRaw {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: String,
    pub steps: Vec<Step>,
}

/// Immutable workflow description with Arc-wrapped steps for efficient sharing.
///
/// Step order is semantically significant: it is the only allowed dependency
/// direction. A workflow is constructed once and never mutated; each run gets
/// its own context and result.
#[derive(Debug, Serialize)]
pub struct Workflow {
    pub name: String,
    pub description: String,
    pub version: String,
    pub steps: Vec<Arc<Step>>,
}

impl<'de> Deserialize<'de> for Workflow {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = WorkflowRaw::deserialize(deserializer)?;
        Ok(Workflow {
            name: raw.name,
            description: raw.description,
            version: raw.version,
            steps: raw.steps.into_iter().map(Arc::new).collect(),
        })
    }
}

impl Workflow {
    /// Parse a workflow definition from YAML content
    pub fn from_yaml(yaml: &str) -> Result<Self, MaestroError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Render the workflow back to YAML
    pub fn to_yaml(&self) -> Result<String, MaestroError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// A single prompt step with declared inputs and outputs
#[derive(Debug, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub prompt: String,
    #[serde(default)]
    pub inputs: Vec<InputSpec>,
    #[serde(default)]
    pub outputs: Vec<OutputSpec>,
}

impl Step {
    /// Declared output names, in declaration order
    pub fn output_names(&self) -> impl Iterator<Item = &str> {
        self.outputs.iter().map(|o| o.name.as_str())
    }
}

/// Declared input: a placeholder name plus where its value comes from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSpec {
    pub name: String,
    pub source: InputSource,
    #[serde(default)]
    pub description: String,
}

/// Where an input value comes from: the user, or an earlier step's output.
///
/// Serialized as the literal string `user` or the source step's id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InputSource {
    User,
    Step(String),
}

impl InputSource {
    pub fn is_user(&self) -> bool {
        matches!(self, InputSource::User)
    }

    /// The source step id, if this input references one
    pub fn step_id(&self) -> Option<&str> {
        match self {
            InputSource::User => None,
            InputSource::Step(id) => Some(id),
        }
    }
}

impl From<String> for InputSource {
    fn from(s: String) -> Self {
        if s == "user" {
            InputSource::User
        } else {
            InputSource::Step(s)
        }
    }
}

impl From<InputSource> for String {
    fn from(source: InputSource) -> Self {
        match source {
            InputSource::User => "user".to_string(),
            InputSource::Step(id) => id,
        }
    }
}

/// Declared output: a plain key used both as a schema property and as a
/// later-step placeholder name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

//! Workflow compiler/validator
//!
//! Checks structural and referential soundness of a workflow before any run:
//! unique step ids, backward-only source references, and exact agreement
//! between declared inputs and `{{name}}` placeholders. All violations are
//! accumulated so a user sees every problem at once. Compilation is pure: it
//! never touches the filesystem or a model client.
//!
//! On success it yields an [`ExecutionPlan`] (the validated step sequence)
//! and a [`Specification`] (a read-only summary for external introspection).

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::template;
use crate::workflow::{Step, Workflow};

/// A single validation violation, tagged by kind and carrying the offending
/// step id and name
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompileError {
    #[error("duplicate step id '{step_id}'")]
    DuplicateStepId { step_id: String },

    #[error("step '{step_id}' input '{name}' references '{source_step}', which is not an earlier step")]
    UndefinedSource {
        step_id: String,
        name: String,
        #[serde(rename = "source")]
        source_step: String,
    },

    #[error("step '{step_id}' prompt uses '{{{{{name}}}}}' with no matching declared input")]
    UndeclaredPlaceholder { step_id: String, name: String },

    #[error("step '{step_id}' declares input '{name}' that never appears in the prompt")]
    UnusedInput { step_id: String, name: String },
}

/// Advisory diagnostics that do not block compilation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompileWarning {
    /// Two steps declare the same output name; the later one overwrites the
    /// earlier value in context (last write wins)
    OutputNameReuse {
        name: String,
        first_step: String,
        step_id: String,
    },
}

impl fmt::Display for CompileWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileWarning::OutputNameReuse {
                name,
                first_step,
                step_id,
            } => write!(
                f,
                "output '{name}' of step '{step_id}' overwrites the value produced by step '{first_step}'"
            ),
        }
    }
}

/// A validated workflow, guaranteed referentially sound
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    workflow: Arc<Workflow>,
    specification: Specification,
    warnings: Vec<CompileWarning>,
}

impl ExecutionPlan {
    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    /// Steps in execution order
    pub fn steps(&self) -> &[Arc<Step>] {
        &self.workflow.steps
    }

    pub fn specification(&self) -> &Specification {
        &self.specification
    }

    pub fn warnings(&self) -> &[CompileWarning] {
        &self.warnings
    }
}

/// Read-only summary of a validated workflow: per-step input/output names and
/// sources, the deduplicated user inputs, and the final step's outputs.
/// Intended for documentation generation and agent tooling.
#[derive(Debug, Clone, Serialize)]
pub struct Specification {
    pub name: String,
    pub description: String,
    pub version: String,
    pub steps: Vec<StepSummary>,
    /// Inputs the caller must supply, deduplicated by name
    pub user_inputs: Vec<IoSummary>,
    /// Outputs of the last step
    pub final_outputs: Vec<IoSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepSummary {
    pub id: String,
    pub inputs: Vec<InputSummary>,
    pub outputs: Vec<IoSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InputSummary {
    pub name: String,
    /// `user` or the source step's id
    pub source: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IoSummary {
    pub name: String,
    pub description: String,
}

impl fmt::Display for Specification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Workflow: {}", self.name)?;
        if !self.description.is_empty() {
            writeln!(f, "Description: {}", self.description)?;
        }

        writeln!(f, "\nSteps:")?;
        for step in &self.steps {
            let inputs: Vec<String> = step
                .inputs
                .iter()
                .map(|i| format!("{} <- {}", i.name, i.source))
                .collect();
            let outputs: Vec<&str> = step.outputs.iter().map(|o| o.name.as_str()).collect();
            writeln!(
                f,
                "- {} (inputs: {}; outputs: {})",
                step.id,
                if inputs.is_empty() { "none".to_string() } else { inputs.join(", ") },
                if outputs.is_empty() { "none".to_string() } else { outputs.join(", ") },
            )?;
        }

        writeln!(f, "\nUser Inputs:")?;
        if self.user_inputs.is_empty() {
            writeln!(f, "- None")?;
        }
        for input in &self.user_inputs {
            if input.description.is_empty() {
                writeln!(f, "- {}", input.name)?;
            } else {
                writeln!(f, "- {} ({})", input.name, input.description)?;
            }
        }

        writeln!(f, "\nWorkflow Outputs:")?;
        if self.final_outputs.is_empty() {
            writeln!(f, "- None")?;
        }
        for output in &self.final_outputs {
            if output.description.is_empty() {
                writeln!(f, "- {}", output.name)?;
            } else {
                writeln!(f, "- {} ({})", output.name, output.description)?;
            }
        }

        Ok(())
    }
}

/// Validate a workflow, accumulating every violation.
///
/// Checks run in order: duplicate ids, undefined sources, undeclared
/// placeholders, unused inputs. Returns the full error list rather than
/// stopping at the first problem.
pub fn compile(workflow: &Arc<Workflow>) -> Result<ExecutionPlan, Vec<CompileError>> {
    let mut errors = Vec::new();

    // Duplicate step ids
    let mut seen: HashSet<&str> = HashSet::with_capacity(workflow.steps.len());
    for step in &workflow.steps {
        if !seen.insert(step.id.as_str()) {
            errors.push(CompileError::DuplicateStepId {
                step_id: step.id.clone(),
            });
        }
    }

    // Sources must name a strictly earlier step: forward references, self
    // references, and unknown ids all fail the same check, which is what
    // keeps the dependency relation acyclic without a graph search.
    let mut earlier: HashSet<&str> = HashSet::with_capacity(workflow.steps.len());
    for step in &workflow.steps {
        for input in &step.inputs {
            if let Some(source) = input.source.step_id() {
                if !earlier.contains(source) {
                    errors.push(CompileError::UndefinedSource {
                        step_id: step.id.clone(),
                        name: input.name.clone(),
                        source_step: source.to_string(),
                    });
                }
            }
        }
        earlier.insert(step.id.as_str());
    }

    // Every placeholder must be a declared input
    for step in &workflow.steps {
        let declared: HashSet<&str> = step.inputs.iter().map(|i| i.name.as_str()).collect();
        for name in template::placeholders(&step.prompt) {
            if !declared.contains(name.as_str()) {
                errors.push(CompileError::UndeclaredPlaceholder {
                    step_id: step.id.clone(),
                    name,
                });
            }
        }
    }

    // Every declared input must appear as a placeholder
    for step in &workflow.steps {
        let used = template::placeholders(&step.prompt);
        for input in &step.inputs {
            if !used.iter().any(|n| n == &input.name) {
                errors.push(CompileError::UnusedInput {
                    step_id: step.id.clone(),
                    name: input.name.clone(),
                });
            }
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(ExecutionPlan {
        warnings: collect_warnings(workflow),
        specification: build_specification(workflow),
        workflow: Arc::clone(workflow),
    })
}

fn collect_warnings(workflow: &Workflow) -> Vec<CompileWarning> {
    let mut first_declared: HashMap<&str, &str> = HashMap::new();
    let mut warnings = Vec::new();

    for step in &workflow.steps {
        for output in &step.outputs {
            match first_declared.get(output.name.as_str()) {
                Some(first_step) => warnings.push(CompileWarning::OutputNameReuse {
                    name: output.name.clone(),
                    first_step: (*first_step).to_string(),
                    step_id: step.id.clone(),
                }),
                None => {
                    first_declared.insert(output.name.as_str(), step.id.as_str());
                }
            }
        }
    }

    warnings
}

fn build_specification(workflow: &Workflow) -> Specification {
    let steps: Vec<StepSummary> = workflow
        .steps
        .iter()
        .map(|step| StepSummary {
            id: step.id.clone(),
            inputs: step
                .inputs
                .iter()
                .map(|i| InputSummary {
                    name: i.name.clone(),
                    source: String::from(i.source.clone()),
                    description: i.description.clone(),
                })
                .collect(),
            outputs: step
                .outputs
                .iter()
                .map(|o| IoSummary {
                    name: o.name.clone(),
                    description: o.description.clone(),
                })
                .collect(),
        })
        .collect();

    // Deduplicate user inputs by name, keeping the first declaration
    let mut user_inputs: Vec<IoSummary> = Vec::new();
    for step in &workflow.steps {
        for input in &step.inputs {
            if input.source.is_user() && !user_inputs.iter().any(|u| u.name == input.name) {
                user_inputs.push(IoSummary {
                    name: input.name.clone(),
                    description: input.description.clone(),
                });
            }
        }
    }

    let final_outputs = workflow
        .steps
        .last()
        .map(|step| {
            step.outputs
                .iter()
                .map(|o| IoSummary {
                    name: o.name.clone(),
                    description: o.description.clone(),
                })
                .collect()
        })
        .unwrap_or_default();

    Specification {
        name: workflow.name.clone(),
        description: workflow.description.clone(),
        version: workflow.version.clone(),
        steps,
        user_inputs,
        final_outputs,
    }
}

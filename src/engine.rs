//! Execution engine
//!
//! Walks a validated plan in step order: gathers inputs, substitutes
//! placeholders, invokes the model client, extracts outputs into the run
//! context, and records a full trace. Strictly sequential within one run; the
//! only await point is the client call, so concurrent runs in the same
//! process never block each other. Fail-fast: the first fatal condition stops
//! the run, but the returned [`WorkflowResult`] retains every step recorded
//! so far. `execute` never propagates an error past its boundary.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::client::{GenerateRequest, LanguageModel, DEFAULT_TEMPERATURE};
use crate::compiler::ExecutionPlan;
use crate::context::Context;
use crate::error::MaestroError;
use crate::event_log::{EventKind, EventLog};
use crate::extract::{self, Extraction};
use crate::result::{StepResult, StepStatus, WorkflowResult, WorkflowStatus};
use crate::schema::SchemaDescriptor;
use crate::template;
use crate::workflow::{InputSource, Step};

/// Progress hook fired when a step starts, with the step id
pub type StepStartHook = Box<dyn Fn(&str) + Send + Sync>;

/// Progress hook fired when a step finishes (in any status)
pub type StepCompleteHook = Box<dyn Fn(&str, &StepResult) + Send + Sync>;

/// Per-run configuration. Hooks are side-effecting only; they never influence
/// control flow or outcomes.
#[derive(Default)]
pub struct ExecutionConfig {
    /// Model identifier; the client's default when unset
    pub model: Option<String>,
    /// Sampling temperature; 0.7 when unset
    pub temperature: Option<f32>,
    pub system_message: Option<String>,
    pub on_step_start: Option<StepStartHook>,
    pub on_step_complete: Option<StepCompleteHook>,
    /// Checked at step boundaries only; a call already in flight relies on
    /// the client's own interruption support
    pub cancellation: Option<CancellationToken>,
    /// Sink for the fine-grained trace; a run without one traces into a
    /// private throwaway log
    pub event_log: Option<EventLog>,
}

impl ExecutionConfig {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_system_message(mut self, message: impl Into<String>) -> Self {
        self.system_message = Some(message.into());
        self
    }

    pub fn on_step_start(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_step_start = Some(Box::new(hook));
        self
    }

    pub fn on_step_complete(
        mut self,
        hook: impl Fn(&str, &StepResult) + Send + Sync + 'static,
    ) -> Self {
        self.on_step_complete = Some(Box::new(hook));
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn with_event_log(mut self, log: EventLog) -> Self {
        self.event_log = Some(log);
        self
    }
}

/// Workflow execution engine.
///
/// Holds only the injected model client; every run owns its own context and
/// result, so one engine can serve concurrent runs of the same plan.
pub struct Engine {
    client: Arc<dyn LanguageModel>,
}

impl Engine {
    pub fn new(client: Arc<dyn LanguageModel>) -> Self {
        Self { client }
    }

    /// Run a validated plan to completion or first failure
    pub async fn execute(
        &self,
        plan: &ExecutionPlan,
        user_inputs: BTreeMap<String, Value>,
        config: &ExecutionConfig,
    ) -> WorkflowResult {
        let log = config.event_log.clone().unwrap_or_default();
        let run_start = Instant::now();
        let mut context = Context::from_inputs(user_inputs);
        let mut steps: Vec<StepResult> = Vec::with_capacity(plan.steps().len());
        let mut run_error: Option<MaestroError> = None;
        let mut failed_step: Option<String> = None;

        log.emit(EventKind::WorkflowStarted {
            step_count: plan.steps().len(),
        });

        for step in plan.steps() {
            if let Some(token) = &config.cancellation {
                if token.is_cancelled() {
                    run_error = Some(MaestroError::Cancelled {
                        step_id: step.id.clone(),
                    });
                    failed_step = Some(step.id.clone());
                    break;
                }
            }

            if let Some(hook) = &config.on_step_start {
                hook(&step.id);
            }

            match self.run_step(step, &context, config, &log).await {
                Ok(result) => {
                    context.merge(&result.outputs);
                    log.emit(EventKind::StepCompleted {
                        step_id: step.id.as_str().into(),
                        status: result.status,
                        outputs: serde_json::to_value(&result.outputs).unwrap_or(Value::Null),
                        duration_ms: result.execution_time.as_millis() as u64,
                    });
                    if let Some(hook) = &config.on_step_complete {
                        hook(&step.id, &result);
                    }
                    steps.push(result);
                }
                Err((result, err)) => {
                    log.emit(EventKind::StepFailed {
                        step_id: step.id.as_str().into(),
                        error: err.to_string(),
                        duration_ms: result.execution_time.as_millis() as u64,
                    });
                    if let Some(hook) = &config.on_step_complete {
                        hook(&step.id, &result);
                    }
                    steps.push(result);
                    run_error = Some(err);
                    failed_step = Some(step.id.clone());
                    break;
                }
            }
        }

        let status = if run_error.is_none() {
            WorkflowStatus::Completed
        } else {
            WorkflowStatus::Failed
        };
        let total = run_start.elapsed();

        match &run_error {
            None => log.emit(EventKind::WorkflowCompleted {
                status,
                total_duration_ms: total.as_millis() as u64,
            }),
            Some(err) => log.emit(EventKind::WorkflowFailed {
                error: err.to_string(),
                failed_step: failed_step.as_deref().map(Arc::from),
            }),
        };

        WorkflowResult {
            workflow_name: plan.workflow().name.clone(),
            total_execution_time: total,
            status,
            error: run_error.map(|e| e.to_string()),
            steps,
        }
    }

    #[instrument(skip_all, fields(step_id = %step.id))]
    async fn run_step(
        &self,
        step: &Step,
        context: &Context,
        config: &ExecutionConfig,
        log: &EventLog,
    ) -> Result<StepResult, (StepResult, MaestroError)> {
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| self.client.default_model().to_string());
        let temperature = config.temperature.unwrap_or(DEFAULT_TEMPERATURE);

        // 1. Gather: every declared input must be in context by now. User
        // inputs were seeded at run start; step-sourced values were merged
        // when the source step succeeded (the compiler guarantees ordering).
        for input in &step.inputs {
            if !context.contains(&input.name) {
                let err = match &input.source {
                    InputSource::User => MaestroError::MissingUserInput {
                        step_id: step.id.clone(),
                        name: input.name.clone(),
                    },
                    InputSource::Step(source) => MaestroError::MissingOutputValue {
                        step_id: step.id.clone(),
                        name: input.name.clone(),
                        source_step: source.clone(),
                    },
                };
                let result = failed_result(
                    step,
                    template::render(&step.prompt, context),
                    Value::Null,
                    &model,
                    temperature,
                    config,
                    Duration::ZERO,
                    &err,
                );
                return Err((result, err));
            }
        }

        // 2. Substitute
        let prompt = template::render(&step.prompt, context);
        log.emit(EventKind::StepStarted {
            step_id: step.id.as_str().into(),
            prompt: prompt.clone(),
        });

        // 3. Invoke: structured when the step declares outputs, free text otherwise
        let schema =
            (!step.outputs.is_empty()).then(|| SchemaDescriptor::for_outputs(&step.outputs));
        let request = GenerateRequest {
            prompt: prompt.clone(),
            model: model.clone(),
            temperature,
            system_message: config.system_message.clone(),
        };

        log.emit(EventKind::ClientCalled {
            step_id: step.id.as_str().into(),
            model: model.clone(),
            structured: schema.is_some(),
            prompt_len: prompt.len(),
        });
        debug!(structured = schema.is_some(), "Invoking model client");

        let call_start = Instant::now();
        let response = match &schema {
            Some(descriptor) => self.client.generate_structured(request, descriptor).await,
            None => self.client.generate_text(request).await.map(Value::String),
        };
        let elapsed = call_start.elapsed();

        let raw = match response {
            Ok(value) => value,
            Err(e) => {
                let err = MaestroError::ClientCall {
                    step_id: step.id.clone(),
                    details: e.to_string(),
                };
                let result = failed_result(
                    step, prompt, Value::Null, &model, temperature, config, elapsed, &err,
                );
                return Err((result, err));
            }
        };

        log.emit(EventKind::ClientResponded {
            step_id: step.id.as_str().into(),
            output_len: response_len(&raw),
        });

        // 4. Extract. Steps without declared outputs keep the raw text under
        // the step id; heuristic recoveries succeed with a warning.
        let (outputs, status) = match &schema {
            None => (
                BTreeMap::from([(step.id.clone(), raw.clone())]),
                StepStatus::Succeeded,
            ),
            Some(descriptor) => match extract::classify(&raw, descriptor) {
                Ok(Extraction::Structured(map)) => (map, StepStatus::Succeeded),
                Ok(Extraction::Heuristic(map)) => (map, StepStatus::SucceededWithWarning),
                Ok(Extraction::Unparsed(text)) => (
                    BTreeMap::from([(step.id.clone(), Value::String(text))]),
                    StepStatus::SucceededWithWarning,
                ),
                Err(missing) => {
                    let err = MaestroError::Extraction {
                        step_id: step.id.clone(),
                        missing: missing.join(", "),
                    };
                    let result =
                        failed_result(step, prompt, raw, &model, temperature, config, elapsed, &err);
                    return Err((result, err));
                }
            },
        };

        Ok(StepResult {
            step_id: step.id.clone(),
            prompt,
            result: raw,
            outputs,
            model,
            temperature,
            system_message: config.system_message.clone(),
            execution_time: elapsed,
            status,
            error: None,
        })
    }
}

#[allow(clippy::too_many_arguments)]
fn failed_result(
    step: &Step,
    prompt: String,
    raw: Value,
    model: &str,
    temperature: f32,
    config: &ExecutionConfig,
    elapsed: Duration,
    err: &MaestroError,
) -> StepResult {
    StepResult {
        step_id: step.id.clone(),
        prompt,
        result: raw,
        outputs: BTreeMap::new(),
        model: model.to_string(),
        temperature,
        system_message: config.system_message.clone(),
        execution_time: elapsed,
        status: StepStatus::Failed,
        error: Some(err.to_string()),
    }
}

fn response_len(value: &Value) -> usize {
    match value {
        Value::String(s) => s.len(),
        other => other.to_string().len(),
    }
}

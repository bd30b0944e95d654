//! Maestro - declarative LLM workflow compiler and execution engine
//!
//! A workflow is an ordered, immutable sequence of prompt steps with declared
//! inputs and outputs. The [`compiler`] checks referential soundness and
//! produces an [`compiler::ExecutionPlan`] plus a read-only
//! [`compiler::Specification`]; the [`engine`] runs the plan against an
//! injected [`client::LanguageModel`], substituting prior results into later
//! prompts and recording a full [`result::WorkflowResult`] trace.

pub mod client;
pub mod compiler;
pub mod context;
pub mod engine;
pub mod error;
pub mod event_log;
pub mod extract;
pub mod result;
pub mod schema;
pub mod template;
pub mod workflow;

pub use client::{create_client, GenerateRequest, LanguageModel, MockClient, OpenAiClient};
pub use compiler::{compile, CompileError, CompileWarning, ExecutionPlan, Specification};
pub use context::Context;
pub use engine::{Engine, ExecutionConfig};
pub use error::{FixSuggestion, MaestroError};
pub use event_log::{Event, EventKind, EventLog};
pub use extract::Extraction;
pub use result::{StepResult, StepStatus, WorkflowResult, WorkflowStatus};
pub use schema::SchemaDescriptor;
pub use workflow::{InputSource, InputSpec, OutputSpec, Step, Workflow};

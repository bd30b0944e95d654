//! Runtime error types with fix suggestions

use thiserror::Error;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// Errors that can abort a workflow run.
///
/// Compile diagnostics are deliberately separate (see [`crate::compiler::CompileError`]):
/// they accumulate instead of failing fast, so a user sees every problem at once.
#[derive(Error, Debug)]
pub enum MaestroError {
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ─────────────────────────────────────────────────────────────
    // Input gathering (MAESTRO-010 to MAESTRO-011)
    // ─────────────────────────────────────────────────────────────
    #[error("MAESTRO-010: Step '{step_id}' requires user input '{name}', which was not supplied")]
    MissingUserInput { step_id: String, name: String },

    #[error("MAESTRO-011: Step '{step_id}' input '{name}' has no value (step '{source_step}' ran but did not produce it)")]
    MissingOutputValue {
        step_id: String,
        name: String,
        source_step: String,
    },

    #[error("MAESTRO-012: Invalid input argument: {details}")]
    InvalidInput { details: String },

    // ─────────────────────────────────────────────────────────────
    // Model invocation and extraction (MAESTRO-020 to MAESTRO-021)
    // ─────────────────────────────────────────────────────────────
    #[error("MAESTRO-020: Model call failed for step '{step_id}': {details}")]
    ClientCall { step_id: String, details: String },

    #[error("MAESTRO-021: Structured response for step '{step_id}' is missing required key(s): {missing}")]
    Extraction { step_id: String, missing: String },

    // ─────────────────────────────────────────────────────────────
    // Run control (MAESTRO-030)
    // ─────────────────────────────────────────────────────────────
    #[error("MAESTRO-030: Run cancelled before step '{step_id}'")]
    Cancelled { step_id: String },

    // ─────────────────────────────────────────────────────────────
    // CLI boundary (MAESTRO-040)
    // ─────────────────────────────────────────────────────────────
    #[error("MAESTRO-040: Workflow failed validation with {count} error(s)")]
    Invalid { count: usize },

    // ─────────────────────────────────────────────────────────────
    // Client selection and construction (MAESTRO-050 to MAESTRO-051)
    // ─────────────────────────────────────────────────────────────
    #[error("MAESTRO-050: Unknown model client '{name}'. Available: mock, openai")]
    UnknownClient { name: String },

    #[error("MAESTRO-051: Client configuration error: {details}")]
    ClientConfig { details: String },
}

impl FixSuggestion for MaestroError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            MaestroError::YamlParse(_) => Some("Check YAML syntax: indentation and quoting"),
            MaestroError::Io(_) => Some("Check file path and permissions"),
            MaestroError::MissingUserInput { .. } => {
                Some("Pass the value with --input name=value (or in user_inputs)")
            }
            MaestroError::MissingOutputValue { .. } => {
                Some("Declare the value as an output of the source step, or check its extraction")
            }
            MaestroError::InvalidInput { .. } => Some("Use --input name=value"),
            MaestroError::ClientCall { .. } => {
                Some("Check the model client configuration (API key, network, model name)")
            }
            MaestroError::Extraction { .. } => {
                Some("Lower the temperature or rephrase the prompt to ask for every declared output")
            }
            MaestroError::Cancelled { .. } => None,
            MaestroError::Invalid { .. } => {
                Some("Run `maestro compile` to see every validation error")
            }
            MaestroError::UnknownClient { .. } => Some("Pass --client mock or --client openai"),
            MaestroError::ClientConfig { .. } => {
                Some("Check the client's API key env var is set (OPENAI_API_KEY)")
            }
        }
    }
}

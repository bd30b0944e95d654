//! Maestro CLI - declarative LLM workflow runner

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::Value;

use maestro::client::create_client;
use maestro::compiler::compile;
use maestro::engine::{Engine, ExecutionConfig};
use maestro::error::{FixSuggestion, MaestroError};
use maestro::workflow::Workflow;

#[derive(Parser)]
#[command(name = "maestro")]
#[command(about = "Maestro - LLM workflow orchestration")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a workflow file and print its specification
    Compile {
        /// Path to workflow YAML file
        file: PathBuf,

        /// Print the specification as JSON (for agent tooling)
        #[arg(long)]
        json: bool,
    },

    /// Run a workflow file
    Run {
        /// Path to workflow YAML file
        file: PathBuf,

        /// Model client (mock, openai)
        #[arg(short, long, default_value = "openai")]
        client: String,

        /// Override the client's default model
        #[arg(short, long)]
        model: Option<String>,

        /// Sampling temperature
        #[arg(short, long)]
        temperature: Option<f32>,

        /// System message for every step
        #[arg(short, long)]
        system_message: Option<String>,

        /// User input as name=value (repeatable; value may be JSON)
        #[arg(short, long = "input", value_name = "NAME=VALUE")]
        inputs: Vec<String>,

        /// Write the result artifact to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compile { file, json } => compile_workflow(&file, json).await,
        Commands::Run {
            file,
            client,
            model,
            temperature,
            system_message,
            inputs,
            output,
        } => {
            run_workflow(
                &file,
                &client,
                model,
                temperature,
                system_message,
                &inputs,
                output,
            )
            .await
        }
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.fix_suggestion() {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

async fn load_and_compile(
    file: &PathBuf,
) -> Result<maestro::compiler::ExecutionPlan, MaestroError> {
    let yaml = tokio::fs::read_to_string(file).await?;
    let workflow = std::sync::Arc::new(Workflow::from_yaml(&yaml)?);

    match compile(&workflow) {
        Ok(plan) => {
            for warning in plan.warnings() {
                eprintln!("{} {}", "Warning:".yellow().bold(), warning);
            }
            Ok(plan)
        }
        Err(errors) => {
            for error in &errors {
                eprintln!("{} {}", "-".red(), error);
            }
            Err(MaestroError::Invalid {
                count: errors.len(),
            })
        }
    }
}

async fn compile_workflow(file: &PathBuf, json: bool) -> Result<(), MaestroError> {
    let plan = load_and_compile(file).await?;

    if json {
        let rendered = serde_json::to_string_pretty(plan.specification())
            .map_err(|e| MaestroError::Io(e.into()))?;
        println!("{rendered}");
    } else {
        println!("{}", plan.specification());
        println!("{}", "Valid".green().bold());
    }
    Ok(())
}

async fn run_workflow(
    file: &PathBuf,
    client_name: &str,
    model: Option<String>,
    temperature: Option<f32>,
    system_message: Option<String>,
    inputs: &[String],
    output: Option<PathBuf>,
) -> Result<(), MaestroError> {
    let plan = load_and_compile(file).await?;
    let client = create_client(client_name)?;
    let user_inputs = parse_inputs(inputs)?;

    println!(
        "{} Running '{}' with client: {}",
        "→".cyan(),
        plan.workflow().name.cyan().bold(),
        client.name().cyan()
    );

    let mut config = ExecutionConfig::default()
        .on_step_start(|id| println!("{} {}", "Starting step:".blue(), id))
        .on_step_complete(|id, result| {
            println!(
                "{} {} ({:?}, {:.2}s)",
                "Completed step:".blue(),
                id,
                result.status,
                result.execution_time.as_secs_f64()
            )
        });
    config.model = model;
    config.temperature = temperature;
    config.system_message = system_message;

    let engine = Engine::new(client.into());
    let result = engine.execute(&plan, user_inputs, &config).await;

    println!(
        "\n{} in {:.2}s",
        if result.is_completed() {
            "Completed".green().bold()
        } else {
            "Failed".red().bold()
        },
        result.total_execution_time.as_secs_f64()
    );
    if let Some(error) = &result.error {
        eprintln!("{} {}", "Cause:".red(), error);
    }

    let artifact = result.to_json()?;
    match output {
        Some(path) => {
            tokio::fs::write(&path, &artifact).await?;
            println!("Results saved to {}", path.display());
        }
        None => println!("{artifact}"),
    }

    if !result.is_completed() {
        std::process::exit(1);
    }
    Ok(())
}

/// Parse repeated `name=value` flags; values that parse as JSON are kept
/// structured, anything else is a plain string
fn parse_inputs(inputs: &[String]) -> Result<BTreeMap<String, Value>, MaestroError> {
    let mut parsed = BTreeMap::new();
    for input in inputs {
        let Some((name, value)) = input.split_once('=') else {
            return Err(MaestroError::InvalidInput {
                details: format!("'{input}' is not name=value"),
            });
        };
        let value = serde_json::from_str(value).unwrap_or(Value::String(value.to_string()));
        parsed.insert(name.to_string(), value);
    }
    Ok(parsed)
}

//! End-to-end engine tests against the deterministic mock client

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{json, Value};

use maestro::client::MockClient;
use maestro::compiler::{compile, ExecutionPlan};
use maestro::engine::{Engine, ExecutionConfig};
use maestro::result::{StepStatus, WorkflowResult, WorkflowStatus};
use maestro::workflow::Workflow;

const TWO_STEP_YAML: &str = r#"
name: two-step
steps:
  - id: s1
    prompt: "go"
    outputs:
      - name: x
  - id: s2
    prompt: "use {{x}}"
    inputs:
      - name: x
        source: s1
    outputs:
      - name: y
"#;

fn plan_from(yaml: &str) -> ExecutionPlan {
    let workflow = Arc::new(Workflow::from_yaml(yaml).unwrap());
    compile(&workflow).unwrap()
}

async fn run(yaml: &str, responses: Vec<Value>) -> WorkflowResult {
    run_with_inputs(yaml, responses, BTreeMap::new()).await
}

async fn run_with_inputs(
    yaml: &str,
    responses: Vec<Value>,
    inputs: BTreeMap<String, Value>,
) -> WorkflowResult {
    let plan = plan_from(yaml);
    let engine = Engine::new(Arc::new(MockClient::with_responses(responses)));
    engine
        .execute(&plan, inputs, &ExecutionConfig::default())
        .await
}

#[tokio::test]
async fn two_step_chain_substitutes_upstream_output() {
    let result = run(
        TWO_STEP_YAML,
        vec![json!({"x": "hello"}), json!({"y": "HELLO"})],
    )
    .await;

    assert_eq!(result.status, WorkflowStatus::Completed);
    assert_eq!(result.steps.len(), 2);

    let s1 = result.step("s1").unwrap();
    assert_eq!(s1.status, StepStatus::Succeeded);
    assert_eq!(s1.outputs["x"], json!("hello"));

    let s2 = result.step("s2").unwrap();
    assert_eq!(s2.prompt, "use hello");
    assert_eq!(s2.outputs["y"], json!("HELLO"));
}

#[tokio::test]
async fn structured_response_missing_key_fails_the_run() {
    // s1's structured response omits "x": extraction error, fail-fast
    let result = run(TWO_STEP_YAML, vec![json!({}), json!({"y": "unused"})]).await;

    assert_eq!(result.status, WorkflowStatus::Failed);
    assert_eq!(result.steps.len(), 1, "s2 must not run");

    let s1 = result.step("s1").unwrap();
    assert_eq!(s1.status, StepStatus::Failed);
    assert!(s1.error.as_deref().unwrap().contains("MAESTRO-021"));
    assert!(s1.error.as_deref().unwrap().contains('x'));
}

#[tokio::test]
async fn plain_string_response_extracts_heuristically() {
    let result = run(
        TWO_STEP_YAML,
        vec![json!({"x": "hello"}), json!("the answer is y: HELLO")],
    )
    .await;

    assert_eq!(result.status, WorkflowStatus::Completed);
    let s2 = result.step("s2").unwrap();
    assert_eq!(s2.status, StepStatus::SucceededWithWarning);
    assert_eq!(s2.outputs["y"], json!("HELLO"));
}

#[tokio::test]
async fn unparseable_string_lands_under_step_id_with_warning() {
    let result = run(
        TWO_STEP_YAML,
        vec![json!({"x": "hello"}), json!("free prose, no keys at all")],
    )
    .await;

    assert_eq!(result.status, WorkflowStatus::Completed);
    let s2 = result.step("s2").unwrap();
    assert_eq!(s2.status, StepStatus::SucceededWithWarning);
    assert_eq!(s2.outputs["s2"], json!("free prose, no keys at all"));
    assert!(s2.outputs.get("y").is_none());
}

#[tokio::test]
async fn three_step_chain_passes_values_verbatim() {
    let yaml = r#"
name: chain
steps:
  - id: a
    prompt: "start"
    outputs:
      - name: seed
  - id: b
    prompt: "grow {{seed}}"
    inputs:
      - name: seed
        source: a
    outputs:
      - name: sprout
  - id: c
    prompt: "harvest {{sprout}}"
    inputs:
      - name: sprout
        source: b
    outputs:
      - name: crop
"#;
    let result = run(
        yaml,
        vec![
            json!({"seed": "an acorn"}),
            json!({"sprout": "a sapling, twelve inches tall"}),
            json!({"crop": "an oak"}),
        ],
    )
    .await;

    assert_eq!(result.status, WorkflowStatus::Completed);
    let b_output = result.step("b").unwrap().outputs["sprout"]
        .as_str()
        .unwrap()
        .to_string();
    let c_prompt = &result.step("c").unwrap().prompt;
    assert!(
        c_prompt.contains(&b_output),
        "c's prompt {c_prompt:?} must contain b's recorded output verbatim"
    );
    assert_eq!(c_prompt, "harvest a sapling, twelve inches tall");
}

#[tokio::test]
async fn user_inputs_feed_first_step() {
    let yaml = r#"
name: user-fed
steps:
  - id: s1
    prompt: "write about {{topic}}"
    inputs:
      - name: topic
        source: user
    outputs:
      - name: text
"#;
    let inputs = BTreeMap::from([("topic".to_string(), json!("owls"))]);
    let result = run_with_inputs(yaml, vec![json!({"text": "Owls."})], inputs).await;

    assert_eq!(result.status, WorkflowStatus::Completed);
    assert_eq!(result.step("s1").unwrap().prompt, "write about owls");
}

#[tokio::test]
async fn missing_user_input_fails_without_calling_the_model() {
    let yaml = r#"
name: user-fed
steps:
  - id: s1
    prompt: "write about {{topic}}"
    inputs:
      - name: topic
        source: user
"#;
    let plan = plan_from(yaml);
    let client = Arc::new(MockClient::new());
    let engine = Engine::new(Arc::clone(&client) as Arc<dyn maestro::LanguageModel>);

    let result = engine
        .execute(&plan, BTreeMap::new(), &ExecutionConfig::default())
        .await;

    assert_eq!(result.status, WorkflowStatus::Failed);
    assert!(result.error.as_deref().unwrap().contains("MAESTRO-010"));
    assert!(client.requests().is_empty(), "no model call may happen");
}

#[tokio::test]
async fn structured_value_substitutes_as_canonical_json() {
    let yaml = r#"
name: structured-pass
steps:
  - id: s1
    prompt: "go"
    outputs:
      - name: profile
  - id: s2
    prompt: "describe {{profile}}"
    inputs:
      - name: profile
        source: s1
    outputs:
      - name: bio
"#;
    let result = run(
        yaml,
        vec![
            json!({"profile": {"name": "Ada", "age": 36}}),
            json!({"bio": "Ada is 36."}),
        ],
    )
    .await;

    assert_eq!(
        result.step("s2").unwrap().prompt,
        r#"describe {"age":36,"name":"Ada"}"#
    );
}

#[tokio::test]
async fn identical_runs_are_byte_identical() {
    let responses = vec![json!({"x": "hello"}), json!({"y": "HELLO"})];
    let first = run(TWO_STEP_YAML, responses.clone()).await;
    let second = run(TWO_STEP_YAML, responses).await;

    for (a, b) in first.steps.iter().zip(&second.steps) {
        assert_eq!(a.prompt, b.prompt);
        assert_eq!(a.outputs, b.outputs);
        assert_eq!(a.result, b.result);
        assert_eq!(a.status, b.status);
    }
}

#[tokio::test]
async fn artifact_round_trips_after_a_real_run() {
    let result = run(
        TWO_STEP_YAML,
        vec![json!({"x": "hello"}), json!({"y": "HELLO"})],
    )
    .await;

    let parsed = WorkflowResult::from_json(&result.to_json().unwrap()).unwrap();
    assert_eq!(parsed.workflow_name, result.workflow_name);
    assert_eq!(parsed.status, result.status);
    assert_eq!(parsed.steps.len(), result.steps.len());
    for (restored, original) in parsed.steps.iter().zip(&result.steps) {
        assert_eq!(restored.step_id, original.step_id);
        assert_eq!(restored.prompt, original.prompt);
        assert_eq!(restored.outputs, original.outputs);
        assert_eq!(restored.model, original.model);
        assert_eq!(restored.status, original.status);
    }
}

#[tokio::test]
async fn output_name_reuse_takes_last_value() {
    // Both steps declare "text"; the later one overwrites (last write wins)
    let yaml = r#"
name: reuse
steps:
  - id: s1
    prompt: "go"
    outputs:
      - name: text
  - id: s2
    prompt: "riff on {{text}}"
    inputs:
      - name: text
        source: s1
    outputs:
      - name: text
  - id: s3
    prompt: "polish {{text}}"
    inputs:
      - name: text
        source: s2
"#;
    let plan = plan_from(yaml);
    assert_eq!(plan.warnings().len(), 1);

    let engine = Engine::new(Arc::new(MockClient::with_responses(vec![
        json!({"text": "first"}),
        json!({"text": "second"}),
        json!("done"),
    ])));
    let result = engine
        .execute(&plan, BTreeMap::new(), &ExecutionConfig::default())
        .await;

    assert_eq!(result.status, WorkflowStatus::Completed);
    assert_eq!(result.step("s3").unwrap().prompt, "polish second");
}

#[tokio::test]
async fn config_model_and_temperature_reach_the_client() {
    let yaml = r#"
name: configured
steps:
  - id: s1
    prompt: "go"
"#;
    let plan = plan_from(yaml);
    let client = Arc::new(MockClient::new());
    let engine = Engine::new(Arc::clone(&client) as Arc<dyn maestro::LanguageModel>);

    let config = ExecutionConfig::default()
        .with_model("mock-xl")
        .with_temperature(0.2)
        .with_system_message("Be terse");
    let result = engine.execute(&plan, BTreeMap::new(), &config).await;

    assert!(result.is_completed());
    let request = client.last_request().unwrap().request;
    assert_eq!(request.model, "mock-xl");
    assert_eq!(request.temperature, 0.2);
    assert_eq!(request.system_message.as_deref(), Some("Be terse"));

    let step = result.step("s1").unwrap();
    assert_eq!(step.model, "mock-xl");
    assert_eq!(step.temperature, 0.2);
}

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use change_metis::clients::{GeneratorError, NarrativeGenerator, NarrativePrompt};
use change_metis::narrative::REQUIRED_SECTIONS;
use change_metis::{
    Assessment, ChangeMetisError, Mitigation, StakeholderInput, StrategyNarrative,
    StrategyOrchestrator, StrategyResult,
};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

enum Script {
    Reply(String),
    Fail,
    Hang,
}

struct ScriptedGenerator {
    script: Script,
    calls: AtomicUsize,
    last_prompt: std::sync::Mutex<Option<NarrativePrompt>>,
}

impl ScriptedGenerator {
    fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicUsize::new(0),
            last_prompt: std::sync::Mutex::new(None),
        })
    }

    fn reply(v: Value) -> Arc<Self> {
        Self::new(Script::Reply(v.to_string()))
    }
}

#[async_trait]
impl NarrativeGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &NarrativePrompt) -> Result<String, GeneratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap() = Some(prompt.clone());
        match &self.script {
            Script::Reply(text) => Ok(text.clone()),
            Script::Fail => Err(GeneratorError::Status {
                status: 503,
                body: "upstream unavailable".into(),
            }),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(String::new())
            }
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn orchestrator(generator: Arc<ScriptedGenerator>) -> StrategyOrchestrator {
    StrategyOrchestrator::new(generator, Duration::from_millis(200))
}

fn assessment() -> Assessment {
    Assessment {
        organization_size: "medium".into(),
        industry: "Financial Services".into(),
        stakeholders: vec![
            StakeholderInput::new("Executive Leadership", 5.0, 4.0),
            StakeholderInput::new("Frontline Employees", 3.0, 4.0),
            StakeholderInput::new("Customers", 1.0, 2.0),
        ],
        number_of_stakeholders: "500".into(),
        change_types: vec!["Technology".into(), "Process".into()],
        urgency: "high".into(),
        ..Default::default()
    }
}

fn narrative(mitigations: Value) -> Value {
    json!({
        "summary": "Your bank is ready for this.",
        "actionPlan": ["Name a sponsor", "Map the journey"],
        "stakeholderFocus": "Start with leadership.",
        "trainingLevel": "Moderate, role-based.",
        "communicationFrequency": "Weekly stand-ups.",
        "frameworks": "ADKAR with Lean Change.",
        "resources": [{"title": "HBR", "url": "https://hbr.org/topic/change-management"}],
        "humanElements": {"likelyEmotions": ["uncertainty"]},
        "stakeholderMitigations": mitigations
    })
}

fn assert_fully_populated(result: &StrategyResult, stakeholders: usize) {
    let v = serde_json::to_value(result).unwrap();
    for key in REQUIRED_SECTIONS {
        assert!(v.get(key).is_some(), "section {} missing", key);
    }
    let parsed: StrategyNarrative = serde_json::from_value(v).unwrap();
    assert!(parsed.is_complete());
    assert_eq!(result.stakeholder_mitigations.len(), stakeholders);
    assert_eq!(result.stakeholder_impact.stakeholders.len(), stakeholders);
    let mut mitigation_names: Vec<&str> = result
        .stakeholder_mitigations
        .iter()
        .map(|m| m.name.as_str())
        .collect();
    let mut stakeholder_names: Vec<&str> = result
        .stakeholder_impact
        .stakeholders
        .iter()
        .map(|s| s.name.as_str())
        .collect();
    mitigation_names.sort();
    stakeholder_names.sort();
    assert_eq!(mitigation_names, stakeholder_names);
}

#[tokio::test]
async fn complete_narrative_is_used_as_is() {
    let generator = ScriptedGenerator::reply(narrative(json!([
        {"name": "Executive Leadership", "mitigation": ["Weekly sponsor sync"]},
        {"name": "Frontline Employees", "mitigation": "Floor walk-throughs"},
        {"name": "Customers", "mitigation": ["Release notes"]}
    ])));
    let result = orchestrator(generator.clone())
        .generate(&assessment())
        .await
        .unwrap();

    assert!(!result.fallback_used);
    assert_eq!(result.summary.as_text(), Some("Your bank is ready for this."));
    assert_eq!(
        result.stakeholder_mitigations[1].mitigation,
        Mitigation::Text("Floor walk-throughs".into())
    );
    assert!(result.human_elements.is_some());
    assert_fully_populated(&result, 3);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn prompt_carries_rendered_stakeholders() {
    let generator = ScriptedGenerator::new(Script::Fail);
    orchestrator(generator.clone())
        .generate(&assessment())
        .await
        .unwrap();
    let prompt = generator.last_prompt.lock().unwrap().clone().unwrap();
    assert!(prompt.system.contains(
        "Executive Leadership (Severity 5/5, Likelihood 4/5, Risk 20, High)"
    ));
    assert!(prompt.system.contains("Customers (Severity 1/5, Likelihood 2/5, Risk 2, Low)"));
}

#[tokio::test]
async fn missing_frameworks_falls_back_with_all_sections() {
    let mut body = narrative(json!([]));
    body.as_object_mut().unwrap().remove("frameworks");
    let result = orchestrator(ScriptedGenerator::reply(body))
        .generate(&assessment())
        .await
        .unwrap();

    assert!(result.fallback_used);
    assert!(result.human_elements.is_none());
    assert!(!result.frameworks.is_empty());
    assert_fully_populated(&result, 3);
}

#[tokio::test]
async fn partial_mitigations_are_filled_with_tiered_defaults() {
    let generator = ScriptedGenerator::reply(narrative(json!([
        {"name": "Frontline Employees", "mitigation": ["Champions on every shift"]}
    ])));
    let result = orchestrator(generator).generate(&assessment()).await.unwrap();

    assert!(!result.fallback_used);
    assert_fully_populated(&result, 3);
    let by_name = |name: &str| {
        result
            .stakeholder_mitigations
            .iter()
            .find(|m| m.name == name)
            .unwrap()
            .mitigation
            .clone()
    };
    assert_eq!(
        by_name("Frontline Employees"),
        Mitigation::Actions(vec!["Champions on every shift".into()])
    );
    let Mitigation::Actions(exec) = by_name("Executive Leadership") else {
        panic!("expected default actions");
    };
    assert!(exec.iter().any(|a| a.contains("sponsor")));
    let Mitigation::Actions(customers) = by_name("Customers") else {
        panic!("expected default actions");
    };
    assert!(customers.iter().any(|a| a.contains("light-touch")));
}

#[tokio::test]
async fn malformed_mitigation_entry_is_repaired_not_fallen_back() {
    let generator = ScriptedGenerator::reply(narrative(json!([
        {"name": "Executive Leadership", "mitigation": ["Sponsor roadshow"]},
        {"name": "Frontline Employees", "mitigation": null},
        {"mitigation": "no name"}
    ])));
    let result = orchestrator(generator).generate(&assessment()).await.unwrap();

    assert!(!result.fallback_used);
    assert_eq!(result.summary.as_text(), Some("Your bank is ready for this."));
    assert_fully_populated(&result, 3);
    assert_eq!(
        result.stakeholder_mitigations[0].mitigation,
        Mitigation::Actions(vec!["Sponsor roadshow".into()])
    );
}

#[tokio::test]
async fn loosely_typed_human_elements_are_kept() {
    let mut body = narrative(json!([]));
    body["humanElements"] = json!({"likelyEmotions": "anxiety, uncertainty"});
    let result = orchestrator(ScriptedGenerator::reply(body))
        .generate(&assessment())
        .await
        .unwrap();

    assert!(!result.fallback_used);
    let human = result.human_elements.clone().unwrap();
    assert_eq!(human.likely_emotions, vec!["anxiety, uncertainty".to_string()]);
    assert_fully_populated(&result, 3);

    let mut body = narrative(json!([]));
    body["humanElements"] = json!(["not", "an", "object"]);
    let result = orchestrator(ScriptedGenerator::reply(body))
        .generate(&assessment())
        .await
        .unwrap();
    assert!(!result.fallback_used);
    assert!(result.human_elements.is_none());
}

#[tokio::test]
async fn fenced_narrative_is_accepted() {
    let text = format!(
        "```json\n{}\n```",
        serde_json::to_string_pretty(&narrative(json!([]))).unwrap()
    );
    let result = orchestrator(ScriptedGenerator::new(Script::Reply(text)))
        .generate(&assessment())
        .await
        .unwrap();
    assert!(!result.fallback_used);
    assert_fully_populated(&result, 3);
}

#[tokio::test]
async fn transport_failure_falls_back() {
    let result = orchestrator(ScriptedGenerator::new(Script::Fail))
        .generate(&assessment())
        .await
        .unwrap();
    assert!(result.fallback_used);
    assert_fully_populated(&result, 3);
    let summary = result.summary.as_text().unwrap();
    assert!(summary.contains("rapid deployment"));
    assert!(summary.contains("balanced coordination"));
}

#[tokio::test]
async fn unparsable_narrative_falls_back() {
    let result = orchestrator(ScriptedGenerator::new(Script::Reply(
        "Here is a great strategy for you!".into(),
    )))
    .generate(&assessment())
    .await
    .unwrap();
    assert!(result.fallback_used);
    assert_fully_populated(&result, 3);
}

#[tokio::test]
async fn slow_generator_times_out_into_fallback() {
    let result = orchestrator(ScriptedGenerator::new(Script::Hang))
        .generate(&assessment())
        .await
        .unwrap();
    assert!(result.fallback_used);
    assert_fully_populated(&result, 3);
}

#[tokio::test]
async fn cancellation_stops_waiting() {
    let generator = ScriptedGenerator::new(Script::Hang);
    let orch = StrategyOrchestrator::new(generator, Duration::from_secs(60));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = orch
        .generate_with_cancel(&assessment(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ChangeMetisError::Cancelled));
}

#[tokio::test]
async fn missing_input_is_the_only_error() {
    let generator = ScriptedGenerator::new(Script::Fail);
    let mut a = assessment();
    a.urgency = String::new();
    let err = orchestrator(generator.clone())
        .generate(&a)
        .await
        .unwrap_err();
    match err {
        ChangeMetisError::InvalidInput { field } => assert_eq!(field, "urgency"),
        other => panic!("expected InvalidInput, got {:?}", other),
    }
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn legacy_groups_land_in_the_middle_cell() {
    let mut a = assessment();
    a.stakeholders.clear();
    a.stakeholder_groups = vec!["Finance".into(), "Sales".into()];
    let result = orchestrator(ScriptedGenerator::new(Script::Fail))
        .generate(&a)
        .await
        .unwrap();
    let cell = result.stakeholder_impact.matrix.cell(3, 3).unwrap();
    assert_eq!(cell.len(), 2);
    assert_eq!(result.stakeholder_impact.summary.medium, 2);
    assert_fully_populated(&result, 2);
}

#[tokio::test]
async fn no_stakeholders_still_yields_a_strategy() {
    let mut a = assessment();
    a.stakeholders.clear();
    let result = orchestrator(ScriptedGenerator::reply(narrative(json!([]))))
        .generate(&a)
        .await
        .unwrap();
    assert!(!result.fallback_used);
    assert!(result.stakeholder_impact.matrix.is_empty());
    assert!(result.stakeholder_mitigations.is_empty());
}

#[tokio::test]
async fn fallback_strategy_skips_the_generator() {
    let generator = ScriptedGenerator::reply(narrative(json!([])));
    let result = orchestrator(generator.clone())
        .fallback_strategy(&assessment())
        .unwrap();
    assert!(result.fallback_used);
    assert_fully_populated(&result, 3);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
}

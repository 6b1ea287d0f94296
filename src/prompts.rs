//! Prompt construction for the narrative generator.
//!
//! The generator only sees text. Stakeholder scores are rendered one per line so
//! the model can tailor mitigations, and the reply shape is spelled out as JSON
//! using the canonical section keys from [`crate::narrative::REQUIRED_SECTIONS`].

use crate::clients::NarrativePrompt;
use crate::risk::StakeholderResult;
use crate::schemas::Assessment;

const SYSTEM_PREAMBLE: &str = "You are a friendly, practical change management advisor. \
Many readers are leading change for the first time: use plain English, avoid consulting jargon, \
and keep every recommendation achievable for the organization described. \
You know Kotter's 8-Step Process, ADKAR, Lean Change Management and the Bridges Transition Model.";

const RESPONSE_CONTRACT: &str = r#"Respond with a single JSON object and nothing else, using exactly these keys:
{
  "summary": "2-3 sentence overview of their situation and the path ahead",
  "actionPlan": ["3-5 concrete first steps for this week"],
  "stakeholderFocus": "which groups to engage first and why (2-3 sentences)",
  "trainingLevel": "what learning and support the team needs (2-3 sentences)",
  "communicationFrequency": "how often and through which channels to communicate (2-3 sentences)",
  "frameworks": "which change approaches fit and why (2-3 sentences)",
  "resources": [{"title": "...", "url": "...", "description": "..."}],
  "humanElements": {
    "likelyEmotions": ["..."],
    "resistancePatterns": ["..."],
    "managerTalkingPoints": ["..."],
    "motivationBoosters": ["..."],
    "inclusionAccessibility": ["..."]
  },
  "stakeholderMitigations": [{"name": "<stakeholder name exactly as listed>", "mitigation": ["action", "action"]}]
}
Provide one stakeholderMitigations entry for every stakeholder listed, using the same names.
Red (High) stakeholders need the most hands-on mitigation; frame benefits as "what's in it for me"."#;

/// Human-readable stakeholder block, one line per scored stakeholder.
pub fn render_stakeholders(results: &[StakeholderResult]) -> String {
    if results.is_empty() {
        return "- (no stakeholder groups rated)".to_string();
    }
    results
        .iter()
        .map(|r| match r.notes.as_deref().map(str::trim) {
            Some(notes) if !notes.is_empty() => format!("- {} - notes: {}", r.describe(), notes),
            _ => format!("- {}", r.describe()),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn join_or(items: &[String], empty: &str) -> String {
    let items: Vec<&str> = items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if items.is_empty() {
        empty.to_string()
    } else {
        items.join(", ")
    }
}

/// Build the strategy prompt from the assessment and its scored stakeholders.
pub fn strategy_prompt(assessment: &Assessment, results: &[StakeholderResult]) -> NarrativePrompt {
    let system = format!(
        "{preamble}\n\n\
         Organization profile:\n\
         - Organization Size: {size}\n\
         - Industry: {industry}\n\
         - Number of Stakeholders: {count}\n\
         - Types of Changes: {changes}\n\
         - Urgency: {urgency}\n\n\
         Stakeholder risk assessment (severity x likelihood, 1-5 scales):\n\
         {stakeholders}\n\n\
         {contract}",
        preamble = SYSTEM_PREAMBLE,
        size = assessment.organization_size.trim(),
        industry = assessment.industry.trim(),
        count = assessment.number_of_stakeholders.trim(),
        changes = join_or(&assessment.change_types, "not specified"),
        urgency = assessment.urgency.trim(),
        stakeholders = render_stakeholders(results),
        contract = RESPONSE_CONTRACT,
    );
    let user = "Generate a change management strategy based on this organization profile."
        .to_string();
    tracing::debug!("strategy prompt built (system_len={})", system.len());
    NarrativePrompt { system, user }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::normalize;
    use crate::schemas::StakeholderInput;

    #[test]
    fn stakeholders_render_with_scores_and_notes() {
        let mut input = StakeholderInput::new("Customers", 5.0, 4.0);
        input.notes = Some("contract renewals due".into());
        let rendered = render_stakeholders(&[normalize(&input)]);
        assert_eq!(
            rendered,
            "- Customers (Severity 5/5, Likelihood 4/5, Risk 20, High) - notes: contract renewals due"
        );
    }

    #[test]
    fn prompt_mentions_profile_and_contract() {
        let assessment = Assessment {
            organization_size: "small".into(),
            industry: "Education".into(),
            number_of_stakeholders: "40".into(),
            change_types: vec!["Process".into(), "Culture".into()],
            urgency: "low".into(),
            ..Default::default()
        };
        let results = vec![normalize(&StakeholderInput::new("Teachers", 2.0, 2.0))];
        let prompt = strategy_prompt(&assessment, &results);
        assert!(prompt.system.contains("Industry: Education"));
        assert!(prompt.system.contains("Types of Changes: Process, Culture"));
        assert!(prompt.system.contains("Teachers (Severity 2/5, Likelihood 2/5, Risk 4, Low)"));
        assert!(prompt.system.contains("\"stakeholderMitigations\""));
        assert!(!prompt.user.is_empty());
    }

    #[test]
    fn empty_lists_are_spelled_out() {
        let prompt = strategy_prompt(&Assessment::default(), &[]);
        assert!(prompt.system.contains("Types of Changes: not specified"));
        assert!(prompt.system.contains("(no stakeholder groups rated)"));
    }
}

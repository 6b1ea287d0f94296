//! Deterministic strategy templates.
//!
//! Used whenever the narrative generator is unavailable or its output is
//! unusable, and for any stakeholder the narrative left without a mitigation.

use serde_json::json;

use crate::narrative::{Mitigation, MitigationEntry, NarrativeSection, StrategySections};
use crate::risk::{RiskStatus, StakeholderResult};
use crate::schemas::{Assessment, OrganizationSize, Urgency};

/// Status-tiered mitigation actions.
pub fn default_mitigation(status: RiskStatus) -> Mitigation {
    let actions: &[&str] = match status {
        RiskStatus::High => &[
            "Assign a sponsor-level owner and hold weekly check-ins with this group",
            "Deliver role-based training before the change reaches them",
            "Track concerns transparently and report back on how each one was resolved",
        ],
        RiskStatus::Medium => &[
            "Clarify the personal benefit for this group (what's in it for me)",
            "Host a Q&A session ahead of rollout",
            "Share quick-reference materials they can return to",
        ],
        RiskStatus::Low => &[
            "Maintain light-touch awareness communication",
            "Monitor sentiment through existing channels and escalate if it shifts",
        ],
    };
    Mitigation::Actions(actions.iter().map(|a| a.to_string()).collect())
}

pub fn default_mitigation_entry(result: &StakeholderResult) -> MitigationEntry {
    MitigationEntry {
        name: result.name.clone(),
        mitigation: default_mitigation(result.status),
    }
}

fn urgency_approach(urgency: Urgency) -> &'static str {
    match urgency {
        Urgency::High => "rapid deployment",
        Urgency::Medium => "structured phased approach",
        Urgency::Low => "comprehensive long-term strategy",
    }
}

fn size_coordination(size: OrganizationSize) -> &'static str {
    match size {
        OrganizationSize::Small => "agile and flexible",
        OrganizationSize::Medium => "balanced coordination",
        OrganizationSize::Large => "enterprise-wide orchestration",
    }
}

fn change_type_phrase(assessment: &Assessment, separator: &str) -> String {
    let types: Vec<String> = assessment
        .change_types
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    if types.is_empty() {
        "organizational".to_string()
    } else {
        types.join(separator)
    }
}

fn summary(assessment: &Assessment, stakeholder_count: usize) -> NarrativeSection {
    format!(
        "Based on your {size} {industry} organization implementing {changes} changes, we recommend a \
         {approach} with {coordination} focusing on your {count} key stakeholder groups. This strategy \
         should emphasize clear communication, structured training, and continuous feedback loops to \
         ensure successful adoption across approximately {people} impacted individuals.",
        size = assessment.organization_size.trim(),
        industry = assessment.industry.trim().to_lowercase(),
        changes = change_type_phrase(assessment, ", "),
        approach = urgency_approach(assessment.urgency_level()),
        coordination = size_coordination(assessment.size_class()),
        count = stakeholder_count,
        people = assessment.number_of_stakeholders.trim(),
    )
    .into()
}

fn action_plan(assessment: &Assessment, stakeholder_count: usize) -> NarrativeSection {
    let urgent: [&str; 3] = match assessment.urgency_level() {
        Urgency::High => [
            "Establish a change leadership team within 48 hours",
            "Run a rapid stakeholder impact assessment",
            "Send an immediate, plain-language announcement to every affected group",
        ],
        Urgency::Medium => [
            "Form a cross-functional change team",
            "Develop a stakeholder engagement plan",
            "Create a change timeline with clear milestones",
        ],
        Urgency::Low => [
            "Conduct an organizational readiness assessment",
            "Build a coalition of change champions across departments",
            "Design a phased rollout that starts with a pilot",
        ],
    };
    let mut steps: Vec<String> = urgent.iter().map(|s| s.to_string()).collect();
    steps.push(format!(
        "Tailor training programs for {} changes",
        change_type_phrase(assessment, " and ")
    ));
    steps.push(format!(
        "Establish feedback mechanisms for your {} stakeholder groups",
        stakeholder_count
    ));
    NarrativeSection::list(steps)
}

fn focus_phrase(name: &str) -> Option<&'static str> {
    let lower = name.to_lowercase();
    if lower.contains("executive") || lower.contains("leadership") || lower.contains("board") {
        Some("executive alignment and sponsorship")
    } else if lower.contains("frontline") {
        Some("day-to-day operational adaptation")
    } else if lower.contains("customer") {
        Some("experience continuity and value communication")
    } else if lower.contains("supplier") || lower.contains("vendor") {
        Some("partnership alignment and process integration")
    } else if lower.contains("partner") {
        Some("collaborative transition and mutual benefits")
    } else {
        None
    }
}

fn stakeholder_focus(results: &[StakeholderResult]) -> NarrativeSection {
    if results.is_empty() {
        return "Start by mapping who is affected by this change and how strongly. Each stakeholder \
                group will need tailored messaging and engagement to address its specific concerns."
            .into();
    }
    let mut ranked: Vec<&StakeholderResult> = results.iter().collect();
    // stable: equal scores keep questionnaire order
    ranked.sort_by(|a, b| b.risk_score.cmp(&a.risk_score));
    let priorities: Vec<String> = ranked
        .iter()
        .map(|r| match focus_phrase(&r.name) {
            Some(phrase) => format!("{} ({}, {} risk)", r.name, phrase, r.status.as_str().to_lowercase()),
            None => format!("{} ({} risk)", r.name, r.status.as_str().to_lowercase()),
        })
        .collect();
    format!(
        "Primary focus areas, highest risk first: {}. Each stakeholder group requires tailored \
         messaging and engagement strategies to address their specific concerns and ensure buy-in \
         throughout the change process.",
        priorities.join(", ")
    )
    .into()
}

/// Number of change types plus an urgency weight.
pub fn training_complexity(assessment: &Assessment) -> usize {
    let types = assessment
        .change_types
        .iter()
        .filter(|t| !t.trim().is_empty())
        .count();
    types + assessment.urgency_level().weight()
}

fn training_level(assessment: &Assessment) -> NarrativeSection {
    let score = training_complexity(assessment);
    let text = if score >= 4 {
        "Intensive training program with multiple touchpoints, hands-on workshops, and ongoing support. \
         Plan for 40+ hours of training content with role-specific modules."
    } else if score >= 2 {
        "Moderate training approach with focused sessions and practical exercises. \
         Plan for 20-30 hours of training with follow-up reinforcement."
    } else {
        "Basic orientation and awareness sessions with self-paced learning resources. \
         Plan for 10-15 hours of foundational training."
    };
    text.into()
}

fn communication_frequency(assessment: &Assessment) -> NarrativeSection {
    let cadence = match assessment.urgency_level() {
        Urgency::High => {
            "Daily updates during implementation, weekly town halls, and bi-weekly leadership briefings"
        }
        Urgency::Medium => {
            "Bi-weekly updates, monthly all-hands meetings, and quarterly stakeholder reviews"
        }
        Urgency::Low => "Weekly updates, monthly progress reports, and quarterly milestone celebrations",
    };
    format!(
        "{}. Use multiple channels including email, intranet, team meetings, and a change champion \
         network to keep messaging consistent across all stakeholder groups.",
        cadence
    )
    .into()
}

/// Framework shortlist for this profile; ADKAR is always included.
pub fn select_frameworks(assessment: &Assessment, results: &[StakeholderResult]) -> Vec<&'static str> {
    let mut frameworks = vec!["ADKAR (Awareness, Desire, Knowledge, Ability, Reinforcement)"];
    if assessment.size_class() == OrganizationSize::Large {
        frameworks.push("Kotter's 8-Step Process");
    }
    if assessment.has_change_type("Technology") || assessment.has_change_type("Platform") {
        frameworks.push("Lean Change Management");
    }
    if assessment.has_change_type("Culture") {
        frameworks.push("Bridges Transition Model");
    }
    if assessment.urgency_level() == Urgency::High {
        frameworks.push("Agile Change Management");
    }
    if results
        .iter()
        .any(|r| r.name.to_lowercase().contains("customer"))
    {
        frameworks.push("Design Thinking for Change");
    }
    frameworks
}

fn resources(assessment: &Assessment) -> NarrativeSection {
    let industry = assessment.industry.trim().to_lowercase();
    let specific = if industry.contains("information technology") || industry == "it" {
        json!({
            "title": "Digital Transformation Playbook (BCG)",
            "url": "https://www.bcg.com/publications/2020/accelerating-digital-transformation"
        })
    } else if industry.contains("health") {
        json!({
            "title": "Healthcare Change Management Lessons (HealthLeaders)",
            "url": "https://www.healthleadersmedia.com/innovation/mayo-clinic-shares-lessons-learned-transformation-patient-centered-care"
        })
    } else if industry.contains("financ") {
        json!({
            "title": "Change Management in Financial Services",
            "url": "https://www.edstellar.com/blog/change-management-in-financial-services"
        })
    } else {
        json!({
            "title": "Change Management Best Practices (Prosci)",
            "url": "https://www.prosci.com/blog/change-management-best-practices"
        })
    };
    NarrativeSection::List(vec![
        specific,
        json!({
            "title": "Harvard Business Review: Change Management",
            "url": "https://hbr.org/topic/change-management"
        }),
        json!({
            "title": "Kotter International Resources",
            "url": "https://www.kotterinc.com/resources/"
        }),
    ])
}

/// All seven sections from templates.
pub fn template_sections(assessment: &Assessment, results: &[StakeholderResult]) -> StrategySections {
    let count = results.len();
    StrategySections {
        summary: summary(assessment, count),
        action_plan: action_plan(assessment, count),
        stakeholder_focus: stakeholder_focus(results),
        training_level: training_level(assessment),
        communication_frequency: communication_frequency(assessment),
        frameworks: NarrativeSection::list(select_frameworks(assessment, results)),
        resources: resources(assessment),
    }
}

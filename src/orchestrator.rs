//! Strategy orchestration: one narrative call, validation, reconciliation, and a
//! template fallback that guarantees a fully-populated result.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::clients::{GeneratorError, NarrativeGenerator};
use crate::error::{ChangeMetisError, Result};
use crate::fallback::{default_mitigation_entry, template_sections};
use crate::narrative::{
    HumanElements, MitigationEntry, NarrativeError, NarrativeSection, StrategySections,
    parse_narrative,
};
use crate::prompts::strategy_prompt;
use crate::risk::{StakeholderImpact, StakeholderResult, build_impact};
use crate::schemas::Assessment;

/// Complete strategy handed back to callers. Same shape whichever path produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyResult {
    pub id: Uuid,
    pub summary: NarrativeSection,
    pub action_plan: NarrativeSection,
    pub stakeholder_focus: NarrativeSection,
    pub training_level: NarrativeSection,
    pub communication_frequency: NarrativeSection,
    pub frameworks: NarrativeSection,
    pub resources: NarrativeSection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub human_elements: Option<HumanElements>,
    pub stakeholder_impact: StakeholderImpact,
    pub stakeholder_mitigations: Vec<MitigationEntry>,
    pub fallback_used: bool,
    pub generated_at: DateTime<Utc>,
}

impl StrategyResult {
    fn assemble(
        sections: StrategySections,
        human_elements: Option<HumanElements>,
        stakeholder_impact: StakeholderImpact,
        stakeholder_mitigations: Vec<MitigationEntry>,
        fallback_used: bool,
    ) -> Self {
        StrategyResult {
            id: Uuid::new_v4(),
            summary: sections.summary,
            action_plan: sections.action_plan,
            stakeholder_focus: sections.stakeholder_focus,
            training_level: sections.training_level,
            communication_frequency: sections.communication_frequency,
            frameworks: sections.frameworks,
            resources: sections.resources,
            human_elements,
            stakeholder_impact,
            stakeholder_mitigations,
            fallback_used,
            generated_at: Utc::now(),
        }
    }
}

/// Why a request ended on the template path.
#[derive(Debug)]
pub enum FallbackReason {
    Transport(GeneratorError),
    Narrative(NarrativeError),
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackReason::Transport(e) => write!(f, "transport: {}", e),
            FallbackReason::Narrative(e) => write!(f, "narrative: {}", e),
        }
    }
}

/// Outcome of merging narrative mitigations with the scored stakeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// Narrative covered every stakeholder one-to-one.
    Kept,
    /// Entries were rebuilt; `defaulted` stakeholders got status-tiered text.
    Synthesized { defaulted: usize },
}

fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Stakeholder and entry names match as multisets (trimmed, case-insensitive).
fn same_names(results: &[StakeholderResult], entries: &[MitigationEntry]) -> bool {
    if results.len() != entries.len() {
        return false;
    }
    let mut pending: HashMap<String, usize> = HashMap::new();
    for r in results {
        *pending.entry(name_key(&r.name)).or_default() += 1;
    }
    entries.iter().all(|e| match pending.get_mut(&name_key(&e.name)) {
        Some(n) if *n > 0 => {
            *n -= 1;
            true
        }
        _ => false,
    })
}

/// Ensure exactly one mitigation per stakeholder.
///
/// The narrative list is kept untouched when it has one usable entry per
/// stakeholder; otherwise a list is rebuilt in stakeholder order, reusing
/// narrative entries by (trimmed, case-insensitive) name and defaulting the rest.
pub fn reconcile_mitigations(
    results: &[StakeholderResult],
    narrative: Option<Vec<MitigationEntry>>,
) -> (Vec<MitigationEntry>, Reconciliation) {
    let narrative: Vec<MitigationEntry> = narrative
        .unwrap_or_default()
        .into_iter()
        .filter(|e| !e.mitigation.is_empty())
        .collect();

    let mut by_name: HashMap<String, usize> = HashMap::new();
    for (idx, entry) in narrative.iter().enumerate() {
        by_name.entry(name_key(&entry.name)).or_insert(idx);
    }

    if same_names(results, &narrative) {
        return (narrative, Reconciliation::Kept);
    }

    let mut defaulted = 0;
    let merged = results
        .iter()
        .map(|r| match by_name.get(&name_key(&r.name)) {
            Some(&idx) => MitigationEntry {
                name: r.name.clone(),
                mitigation: narrative[idx].mitigation.clone(),
            },
            None => {
                defaulted += 1;
                default_mitigation_entry(r)
            }
        })
        .collect();
    (merged, Reconciliation::Synthesized { defaulted })
}

/// Runs one assessment through the narrative generator, falling back to templates.
#[derive(Clone)]
pub struct StrategyOrchestrator {
    generator: Arc<dyn NarrativeGenerator>,
    timeout: Duration,
}

impl StrategyOrchestrator {
    pub fn new(generator: Arc<dyn NarrativeGenerator>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    pub fn generator_name(&self) -> &str {
        self.generator.name()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Produce a strategy. Only a missing required input field is an error.
    pub async fn generate(&self, assessment: &Assessment) -> Result<StrategyResult> {
        self.generate_with_cancel(assessment, &CancellationToken::new())
            .await
    }

    /// As [`generate`](Self::generate), but stops waiting on the generator once
    /// `cancel` fires and returns [`ChangeMetisError::Cancelled`].
    pub async fn generate_with_cancel(
        &self,
        assessment: &Assessment,
        cancel: &CancellationToken,
    ) -> Result<StrategyResult> {
        assessment.validate()?;
        let impact = build_impact(&assessment.stakeholder_inputs());

        let attempt = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("strategy request cancelled while waiting on {}", self.generator.name());
                return Err(ChangeMetisError::Cancelled);
            }
            attempt = self.request_narrative(assessment, &impact.stakeholders) => attempt,
        };

        match attempt {
            Ok((sections, human, mitigations)) => {
                let (mitigations, outcome) =
                    reconcile_mitigations(&impact.stakeholders, mitigations);
                if let Reconciliation::Synthesized { defaulted } = outcome {
                    tracing::info!(
                        "narrative mitigations incomplete; synthesized list ({} of {} defaulted)",
                        defaulted,
                        impact.stakeholders.len()
                    );
                }
                tracing::info!(
                    "strategy generated by {} for {} {}",
                    self.generator.name(),
                    assessment.organization_size.trim(),
                    assessment.industry.trim()
                );
                Ok(StrategyResult::assemble(
                    sections,
                    human,
                    impact,
                    mitigations,
                    false,
                ))
            }
            Err(reason) => {
                tracing::warn!("falling back to template strategy ({})", reason);
                Ok(self.fallback(assessment, impact))
            }
        }
    }

    /// Template-only strategy; never touches the generator.
    pub fn fallback_strategy(&self, assessment: &Assessment) -> Result<StrategyResult> {
        assessment.validate()?;
        let impact = build_impact(&assessment.stakeholder_inputs());
        Ok(self.fallback(assessment, impact))
    }

    fn fallback(&self, assessment: &Assessment, impact: StakeholderImpact) -> StrategyResult {
        let sections = template_sections(assessment, &impact.stakeholders);
        let (mitigations, _) = reconcile_mitigations(&impact.stakeholders, None);
        StrategyResult::assemble(sections, None, impact, mitigations, true)
    }

    #[allow(clippy::type_complexity)]
    async fn request_narrative(
        &self,
        assessment: &Assessment,
        results: &[StakeholderResult],
    ) -> std::result::Result<
        (
            StrategySections,
            Option<HumanElements>,
            Option<Vec<MitigationEntry>>,
        ),
        FallbackReason,
    > {
        let prompt = strategy_prompt(assessment, results);
        let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
        let text = match tokio::time::timeout(self.timeout, self.generator.generate(&prompt)).await
        {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => return Err(FallbackReason::Transport(e)),
            Err(_) => {
                return Err(FallbackReason::Transport(GeneratorError::Timeout {
                    timeout_ms,
                }));
            }
        };
        tracing::debug!("narrative received ({} bytes)", text.len());

        parse_narrative(&text)
            .and_then(|n| n.into_parts())
            .map_err(FallbackReason::Narrative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narrative::Mitigation;
    use crate::risk::normalize;
    use crate::schemas::StakeholderInput;

    fn results(names: &[(&str, f64)]) -> Vec<StakeholderResult> {
        names
            .iter()
            .map(|(n, r)| normalize(&StakeholderInput::new(*n, *r, *r)))
            .collect()
    }

    fn entry(name: &str, text: &str) -> MitigationEntry {
        MitigationEntry {
            name: name.into(),
            mitigation: Mitigation::Text(text.into()),
        }
    }

    #[test]
    fn complete_narrative_list_is_kept_as_is() {
        let rs = results(&[("Sales", 5.0), ("Finance", 1.0)]);
        let narrative = vec![entry("finance", "memo"), entry("Sales", "workshops")];
        let (merged, outcome) = reconcile_mitigations(&rs, Some(narrative.clone()));
        assert_eq!(outcome, Reconciliation::Kept);
        assert_eq!(merged, narrative);
    }

    #[test]
    fn missing_entries_get_tiered_defaults() {
        let rs = results(&[("Sales", 5.0), ("Finance", 3.0), ("IT", 1.0)]);
        let (merged, outcome) = reconcile_mitigations(&rs, Some(vec![entry("Finance", "Q&A")]));
        assert_eq!(outcome, Reconciliation::Synthesized { defaulted: 2 });
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].name, "Sales");
        assert_eq!(merged[1].mitigation, Mitigation::Text("Q&A".into()));
        assert_eq!(
            merged[2].mitigation,
            crate::fallback::default_mitigation(crate::risk::RiskStatus::Low)
        );
    }

    #[test]
    fn extra_or_blank_entries_force_synthesis() {
        let rs = results(&[("Sales", 5.0)]);
        let narrative = vec![entry("Sales", "ok"), entry("Ghost", "??")];
        let (merged, outcome) = reconcile_mitigations(&rs, Some(narrative));
        assert_eq!(outcome, Reconciliation::Synthesized { defaulted: 0 });
        assert_eq!(merged, vec![entry("Sales", "ok")]);

        let (merged, outcome) = reconcile_mitigations(&rs, Some(vec![entry("Sales", "  ")]));
        assert_eq!(outcome, Reconciliation::Synthesized { defaulted: 1 });
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn duplicate_stakeholder_names_each_get_an_entry() {
        let rs = results(&[("Ops", 5.0), ("Ops", 1.0)]);
        let (merged, _) = reconcile_mitigations(&rs, Some(vec![entry("Ops", "huddles")]));
        assert_eq!(merged.len(), 2);
        assert!(merged.iter().all(|m| m.mitigation == Mitigation::Text("huddles".into())));
    }

    #[test]
    fn stray_name_among_duplicates_is_not_kept() {
        let rs = results(&[("Ops", 5.0), ("Ops", 1.0)]);
        let narrative = vec![entry("Ops", "huddles"), entry("Ghost", "??")];
        let (merged, outcome) = reconcile_mitigations(&rs, Some(narrative));
        assert_eq!(outcome, Reconciliation::Synthesized { defaulted: 0 });
        let names: Vec<&str> = merged.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Ops", "Ops"]);
    }

    #[test]
    fn duplicate_names_with_matching_counts_are_kept() {
        let rs = results(&[("Ops", 5.0), ("Ops", 1.0), ("IT", 2.0)]);
        let narrative = vec![entry("it", "demo"), entry("Ops", "a"), entry(" ops ", "b")];
        let (merged, outcome) = reconcile_mitigations(&rs, Some(narrative.clone()));
        assert_eq!(outcome, Reconciliation::Kept);
        assert_eq!(merged, narrative);
    }

    #[test]
    fn no_stakeholders_no_mitigations() {
        let (merged, outcome) = reconcile_mitigations(&[], None);
        assert!(merged.is_empty());
        assert_eq!(outcome, Reconciliation::Kept);
    }
}

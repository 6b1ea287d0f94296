//! Structured output expected from the narrative generator.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::deserializers::{
    de_option_forgiving, de_option_vec_skip_invalid, de_string_list_forgiving,
};

/// Canonical keys of the seven required sections, in display order.
pub const REQUIRED_SECTIONS: [&str; 7] = [
    "summary",
    "actionPlan",
    "stakeholderFocus",
    "trainingLevel",
    "communicationFrequency",
    "frameworks",
    "resources",
];

static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)\r?\n?```$").expect("fence regex is valid")
});

#[derive(Debug, Error, PartialEq)]
pub enum NarrativeError {
    #[error("narrative is not valid JSON: {0}")]
    Parse(String),
    #[error("narrative is missing required sections: {}", .0.join(", "))]
    MissingSections(Vec<&'static str>),
}

/// A free-form section. The core only checks that it is present and non-empty;
/// rendering each shape is up to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NarrativeSection {
    Text(String),
    List(Vec<Value>),
    KeyedSections(Map<String, Value>),
}

impl NarrativeSection {
    pub fn is_empty(&self) -> bool {
        match self {
            NarrativeSection::Text(s) => s.trim().is_empty(),
            NarrativeSection::List(items) => items.is_empty(),
            NarrativeSection::KeyedSections(map) => map.is_empty(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            NarrativeSection::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        NarrativeSection::List(items.into_iter().map(|s| Value::String(s.into())).collect())
    }
}

impl From<String> for NarrativeSection {
    fn from(s: String) -> Self {
        NarrativeSection::Text(s)
    }
}

impl From<&str> for NarrativeSection {
    fn from(s: &str) -> Self {
        NarrativeSection::Text(s.to_string())
    }
}

/// Mitigation text for one stakeholder: prose or a list of actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Mitigation {
    Text(String),
    Actions(Vec<String>),
}

impl Mitigation {
    pub fn is_empty(&self) -> bool {
        match self {
            Mitigation::Text(s) => s.trim().is_empty(),
            Mitigation::Actions(actions) => actions.iter().all(|a| a.trim().is_empty()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MitigationEntry {
    pub name: String,
    pub mitigation: Mitigation,
}

/// Optional people-side guidance the generator may add.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HumanElements {
    #[serde(
        default,
        deserialize_with = "de_string_list_forgiving",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub likely_emotions: Vec<String>,
    #[serde(
        default,
        deserialize_with = "de_string_list_forgiving",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub resistance_patterns: Vec<String>,
    #[serde(
        default,
        deserialize_with = "de_string_list_forgiving",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub manager_talking_points: Vec<String>,
    #[serde(
        default,
        deserialize_with = "de_string_list_forgiving",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub motivation_boosters: Vec<String>,
    #[serde(
        default,
        deserialize_with = "de_string_list_forgiving",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub inclusion_accessibility: Vec<String>,
}

impl HumanElements {
    pub fn is_empty(&self) -> bool {
        self.likely_emotions.is_empty()
            && self.resistance_patterns.is_empty()
            && self.manager_talking_points.is_empty()
            && self.motivation_boosters.is_empty()
            && self.inclusion_accessibility.is_empty()
    }
}

/// The seven required sections, all present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategySections {
    pub summary: NarrativeSection,
    pub action_plan: NarrativeSection,
    pub stakeholder_focus: NarrativeSection,
    pub training_level: NarrativeSection,
    pub communication_frequency: NarrativeSection,
    pub frameworks: NarrativeSection,
    pub resources: NarrativeSection,
}

/// Generator output as parsed, before validation. Older prompt revisions used
/// different keys; those are accepted as aliases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyNarrative {
    #[serde(default, alias = "strategySummary", skip_serializing_if = "Option::is_none")]
    pub summary: Option<NarrativeSection>,
    #[serde(default, alias = "immediateActionPlan", skip_serializing_if = "Option::is_none")]
    pub action_plan: Option<NarrativeSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stakeholder_focus: Option<NarrativeSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training_level: Option<NarrativeSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub communication_frequency: Option<NarrativeSection>,
    #[serde(default, alias = "recommendedFrameworks", skip_serializing_if = "Option::is_none")]
    pub frameworks: Option<NarrativeSection>,
    #[serde(
        default,
        alias = "recommendedResources",
        alias = "relatedResources",
        skip_serializing_if = "Option::is_none"
    )]
    pub resources: Option<NarrativeSection>,
    #[serde(
        default,
        alias = "humanFactors",
        deserialize_with = "de_option_forgiving",
        skip_serializing_if = "Option::is_none"
    )]
    pub human_elements: Option<HumanElements>,
    /// Unusable entries are dropped here; reconciliation fills the gaps.
    #[serde(
        default,
        deserialize_with = "de_option_vec_skip_invalid",
        skip_serializing_if = "Option::is_none"
    )]
    pub stakeholder_mitigations: Option<Vec<MitigationEntry>>,
}

fn present(section: &Option<NarrativeSection>) -> bool {
    section.as_ref().is_some_and(|s| !s.is_empty())
}

impl StrategyNarrative {
    /// Canonical names of required sections that are absent or empty.
    pub fn missing_sections(&self) -> Vec<&'static str> {
        let checks = [
            present(&self.summary),
            present(&self.action_plan),
            present(&self.stakeholder_focus),
            present(&self.training_level),
            present(&self.communication_frequency),
            present(&self.frameworks),
            present(&self.resources),
        ];
        REQUIRED_SECTIONS
            .iter()
            .zip(checks)
            .filter(|(_, ok)| !ok)
            .map(|(name, _)| *name)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_sections().is_empty()
    }

    /// Split into the validated sections and the optional enrichments.
    #[allow(clippy::type_complexity)]
    pub fn into_parts(
        self,
    ) -> Result<
        (
            StrategySections,
            Option<HumanElements>,
            Option<Vec<MitigationEntry>>,
        ),
        NarrativeError,
    > {
        let missing = self.missing_sections();
        if !missing.is_empty() {
            return Err(NarrativeError::MissingSections(missing));
        }
        let (
            Some(summary),
            Some(action_plan),
            Some(stakeholder_focus),
            Some(training_level),
            Some(communication_frequency),
            Some(frameworks),
            Some(resources),
        ) = (
            self.summary,
            self.action_plan,
            self.stakeholder_focus,
            self.training_level,
            self.communication_frequency,
            self.frameworks,
            self.resources,
        )
        else {
            return Err(NarrativeError::MissingSections(REQUIRED_SECTIONS.to_vec()));
        };
        let sections = StrategySections {
            summary,
            action_plan,
            stakeholder_focus,
            training_level,
            communication_frequency,
            frameworks,
            resources,
        };
        let human = self.human_elements.filter(|h| !h.is_empty());
        Ok((sections, human, self.stakeholder_mitigations))
    }
}

impl From<StrategySections> for StrategyNarrative {
    fn from(s: StrategySections) -> Self {
        StrategyNarrative {
            summary: Some(s.summary),
            action_plan: Some(s.action_plan),
            stakeholder_focus: Some(s.stakeholder_focus),
            training_level: Some(s.training_level),
            communication_frequency: Some(s.communication_frequency),
            frameworks: Some(s.frameworks),
            resources: Some(s.resources),
            human_elements: None,
            stakeholder_mitigations: None,
        }
    }
}

/// Remove a surrounding ```` ```json ... ``` ```` (or bare ```` ``` ````) wrapper.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    match FENCED_BLOCK.captures(trimmed).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => trimmed,
    }
}

/// Parse generator text into a narrative. Presence of sections is not checked here.
pub fn parse_narrative(text: &str) -> Result<StrategyNarrative, NarrativeError> {
    let body = strip_code_fences(text);
    serde_json::from_str(body).map_err(|e| NarrativeError::Parse(e.to_string()))
}

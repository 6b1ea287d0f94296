//! Inbound assessment payload types.

use serde::{Deserialize, Serialize};

use crate::deserializers::{de_option_rating_forgiving, de_string_or_number, de_vec_string_or_null};
use crate::error::{ChangeMetisError, Result};

/// Rating assumed when a stakeholder arrives without one (legacy groups, blanks).
pub const MIDPOINT_RATING: f64 = 3.0;

/// One stakeholder group as typed into the questionnaire. Ratings are raw and
/// untrusted; see [`crate::risk::normalize`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakeholderInput {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "de_option_rating_forgiving")]
    pub severity: Option<f64>,
    #[serde(default, deserialize_with = "de_option_rating_forgiving")]
    pub likelihood: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl StakeholderInput {
    pub fn new(name: impl Into<String>, severity: f64, likelihood: f64) -> Self {
        Self {
            name: name.into(),
            severity: Some(severity),
            likelihood: Some(likelihood),
            notes: None,
        }
    }

    /// A legacy group name with no ratings; it lands in the middle of the matrix.
    pub fn from_group(name: impl Into<String>) -> Self {
        Self::new(name, MIDPOINT_RATING, MIDPOINT_RATING)
    }
}

/// The questionnaire as submitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    #[serde(default)]
    pub organization_size: String,
    #[serde(default)]
    pub industry: String,
    #[serde(default)]
    pub stakeholders: Vec<StakeholderInput>,
    /// Older clients only send group names.
    #[serde(default, deserialize_with = "de_vec_string_or_null")]
    pub stakeholder_groups: Vec<String>,
    #[serde(default, deserialize_with = "de_string_or_number")]
    pub number_of_stakeholders: String,
    #[serde(default, deserialize_with = "de_vec_string_or_null")]
    pub change_types: Vec<String>,
    #[serde(default)]
    pub urgency: String,
}

impl Assessment {
    /// Checks the fields the strategy cannot be written without.
    /// Returns the camelCase name of the first missing one.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("organizationSize", &self.organization_size),
            ("industry", &self.industry),
            ("numberOfStakeholders", &self.number_of_stakeholders),
            ("urgency", &self.urgency),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ChangeMetisError::missing(field));
            }
        }
        Ok(())
    }

    /// Detailed stakeholders when supplied, otherwise the legacy group list
    /// rated at the midpoint.
    pub fn stakeholder_inputs(&self) -> Vec<StakeholderInput> {
        if !self.stakeholders.is_empty() {
            return self.stakeholders.clone();
        }
        self.stakeholder_groups
            .iter()
            .map(StakeholderInput::from_group)
            .collect()
    }

    pub fn urgency_level(&self) -> Urgency {
        Urgency::parse(&self.urgency)
    }

    pub fn size_class(&self) -> OrganizationSize {
        OrganizationSize::parse(&self.organization_size)
    }

    pub fn has_change_type(&self, change_type: &str) -> bool {
        self.change_types
            .iter()
            .any(|t| t.trim().eq_ignore_ascii_case(change_type))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
}

impl Urgency {
    /// Unknown values get the middle phrasing rather than an error.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "high" | "urgent" | "critical" => Urgency::High,
            "low" => Urgency::Low,
            _ => Urgency::Medium,
        }
    }

    /// Contribution to the training complexity score.
    pub fn weight(&self) -> usize {
        match self {
            Urgency::High => 2,
            Urgency::Medium => 1,
            Urgency::Low => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrganizationSize {
    Small,
    Medium,
    Large,
}

impl OrganizationSize {
    pub fn parse(raw: &str) -> Self {
        let lower = raw.trim().to_lowercase();
        if lower.starts_with("small") {
            OrganizationSize::Small
        } else if lower.starts_with("large") || lower.starts_with("enterprise") {
            OrganizationSize::Large
        } else {
            OrganizationSize::Medium
        }
    }
}

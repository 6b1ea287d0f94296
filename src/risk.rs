//! Stakeholder risk scoring.
//!
//! Turns raw questionnaire entries into scored, classified records and buckets
//! them into a 5x5 likelihood/severity matrix. Nothing here touches the network.

use serde::{Deserialize, Serialize};

use crate::schemas::{MIDPOINT_RATING, StakeholderInput};

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;
pub const MATRIX_SIZE: usize = MAX_RATING as usize;

/// Lowest score classified as [`RiskStatus::High`].
pub const HIGH_THRESHOLD: u8 = 16;
/// Lowest score classified as [`RiskStatus::Medium`].
pub const MEDIUM_THRESHOLD: u8 = 9;

/// Three-tier classification of a risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskStatus {
    High,
    Medium,
    Low,
}

impl RiskStatus {
    /// The only place risk tiers are decided.
    pub fn from_score(score: u8) -> Self {
        if score >= HIGH_THRESHOLD {
            RiskStatus::High
        } else if score >= MEDIUM_THRESHOLD {
            RiskStatus::Medium
        } else {
            RiskStatus::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskStatus::High => "High",
            RiskStatus::Medium => "Medium",
            RiskStatus::Low => "Low",
        }
    }

    /// Red/amber/green label used by dashboards.
    pub fn rag(&self) -> &'static str {
        match self {
            RiskStatus::High => "Red",
            RiskStatus::Medium => "Amber",
            RiskStatus::Low => "Green",
        }
    }
}

impl std::fmt::Display for RiskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakeholderResult {
    pub name: String,
    pub severity: u8,
    pub likelihood: u8,
    pub risk_score: u8,
    pub status: RiskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl StakeholderResult {
    /// `Name (Severity 4/5, Likelihood 3/5, Risk 12, Medium)`
    pub fn describe(&self) -> String {
        format!(
            "{} (Severity {}/{max}, Likelihood {}/{max}, Risk {}, {})",
            self.name,
            self.severity,
            self.likelihood,
            self.risk_score,
            self.status,
            max = MAX_RATING
        )
    }
}

impl From<&StakeholderResult> for StakeholderInput {
    fn from(result: &StakeholderResult) -> Self {
        StakeholderInput {
            name: result.name.clone(),
            severity: Some(f64::from(result.severity)),
            likelihood: Some(f64::from(result.likelihood)),
            notes: result.notes.clone(),
        }
    }
}

/// Round to nearest, then clamp into [1, 5]. Missing and NaN ratings become the midpoint.
fn clamp_rating(raw: Option<f64>) -> u8 {
    let value = raw.filter(|v| !v.is_nan()).unwrap_or(MIDPOINT_RATING);
    value
        .round()
        .clamp(f64::from(MIN_RATING), f64::from(MAX_RATING)) as u8
}

/// Score and classify a single stakeholder.
pub fn normalize(input: &StakeholderInput) -> StakeholderResult {
    let severity = clamp_rating(input.severity);
    let likelihood = clamp_rating(input.likelihood);
    let risk_score = severity * likelihood;
    StakeholderResult {
        name: input.name.clone(),
        severity,
        likelihood,
        risk_score,
        status: RiskStatus::from_score(risk_score),
        notes: input.notes.clone(),
    }
}

/// 5x5 grid of stakeholders indexed `[likelihood - 1][severity - 1]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImpactMatrix {
    cells: [[Vec<StakeholderResult>; MATRIX_SIZE]; MATRIX_SIZE],
}

impl ImpactMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends; several stakeholders may share a cell.
    pub fn place(&mut self, result: StakeholderResult) {
        let row = usize::from(result.likelihood.clamp(MIN_RATING, MAX_RATING) - 1);
        let col = usize::from(result.severity.clamp(MIN_RATING, MAX_RATING) - 1);
        self.cells[row][col].push(result);
    }

    /// Cell for 1-based ratings; `None` outside [1, 5].
    pub fn cell(&self, likelihood: u8, severity: u8) -> Option<&[StakeholderResult]> {
        let row = usize::from(likelihood).checked_sub(1)?;
        let col = usize::from(severity).checked_sub(1)?;
        self.cells.get(row)?.get(col).map(Vec::as_slice)
    }

    pub fn rows(&self) -> &[[Vec<StakeholderResult>; MATRIX_SIZE]; MATRIX_SIZE] {
        &self.cells
    }

    pub fn iter(&self) -> impl Iterator<Item = &StakeholderResult> {
        self.cells.iter().flatten().flatten()
    }

    /// Total number of placed stakeholders.
    pub fn len(&self) -> usize {
        self.cells.iter().flatten().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactSummary {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    /// Every stakeholder sharing the maximum score; ties are kept.
    pub highest_risk: Vec<StakeholderResult>,
}

impl ImpactSummary {
    pub fn from_results(results: &[StakeholderResult]) -> Self {
        let mut summary = ImpactSummary::default();
        for r in results {
            match r.status {
                RiskStatus::High => summary.high += 1,
                RiskStatus::Medium => summary.medium += 1,
                RiskStatus::Low => summary.low += 1,
            }
        }
        if let Some(max) = results.iter().map(|r| r.risk_score).max() {
            summary.highest_risk = results
                .iter()
                .filter(|r| r.risk_score == max)
                .cloned()
                .collect();
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.high + self.medium + self.low
    }
}

/// Scored stakeholders plus their matrix and summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakeholderImpact {
    pub stakeholders: Vec<StakeholderResult>,
    pub matrix: ImpactMatrix,
    pub summary: ImpactSummary,
}

/// Score every named stakeholder (input order preserved) and bucket the results.
/// Entries with a blank name are dropped; duplicate names are kept as separate rows.
pub fn build_impact(inputs: &[StakeholderInput]) -> StakeholderImpact {
    let stakeholders: Vec<StakeholderResult> = inputs
        .iter()
        .filter(|input| !input.name.trim().is_empty())
        .map(normalize)
        .collect();

    let mut matrix = ImpactMatrix::new();
    for result in &stakeholders {
        matrix.place(result.clone());
    }

    let summary = ImpactSummary::from_results(&stakeholders);
    tracing::debug!(
        "stakeholder impact built: {} scored (high={}, medium={}, low={})",
        stakeholders.len(),
        summary.high,
        summary.medium,
        summary.low
    );

    StakeholderImpact {
        stakeholders,
        matrix,
        summary,
    }
}

//! Domain model for opportunity records, applicant profiles, and scores.
//!
//! Record shapes mirror the upstream search API payloads; unknown enum
//! variants and missing summary fields deserialize without failing so a
//! single malformed record never poisons a batch.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of an opportunity as reported by the upstream API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpportunityStatus {
    Posted,
    Forecasted,
    Closed,
    Archived,
    #[serde(other)]
    Unknown,
}

impl Default for OpportunityStatus {
    fn default() -> Self {
        Self::Unknown
    }
}

/// Funding and deadline details nested under an opportunity record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpportunitySummary {
    pub award_ceiling: Option<f64>,
    pub award_floor: Option<f64>,
    pub expected_number_of_awards: Option<u32>,
    pub estimated_total_program_funding: Option<f64>,
    pub close_date: Option<String>,
    pub post_date: Option<String>,
    pub summary_description: Option<String>,
    #[serde(default)]
    pub applicant_types: Vec<String>,
    #[serde(default)]
    pub requires_partnerships: bool,
    #[serde(default)]
    pub requires_preliminary_data: bool,
}

impl OpportunitySummary {
    /// Best available funding figure: the ceiling, else the floor. Zero and
    /// negative amounts count as absent.
    pub fn funding_estimate(&self) -> Option<f64> {
        self.award_ceiling
            .filter(|c| *c > 0.0)
            .or_else(|| self.award_floor.filter(|f| *f > 0.0))
    }
}

/// One grant opportunity record from the upstream search API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    #[serde(default)]
    pub opportunity_id: String,
    #[serde(default)]
    pub opportunity_title: String,
    #[serde(default)]
    pub opportunity_status: OpportunityStatus,
    pub agency_code: Option<String>,
    pub agency_name: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub summary: OpportunitySummary,
}

impl Opportunity {
    /// Top-level agency, e.g. `NIH` for `NIH-NCI`.
    pub fn agency_root(&self) -> Option<&str> {
        self.agency_code
            .as_deref()
            .and_then(|code| code.split('-').next())
            .filter(|root| !root.is_empty())
    }
}

/// Applicant career stage, used to skew default weights and strategic value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CareerStage {
    EarlyCareer,
    MidCareer,
    Senior,
}

/// Optional applicant profile supplied with scoring requests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub applicant_type: Option<String>,
    #[serde(default)]
    pub research_keywords: Vec<String>,
    #[serde(default)]
    pub research_categories: Vec<String>,
    #[serde(default)]
    pub preferred_agencies: Vec<String>,
    #[serde(default)]
    pub familiar_agencies: Vec<String>,
    pub career_stage: Option<CareerStage>,
    pub grant_success_rate: Option<f64>,
    pub hourly_opportunity_cost: Option<f64>,
    pub max_concurrent_applications: Option<u32>,
    #[serde(default)]
    pub first_time_applicant: bool,
    #[serde(default)]
    pub scoring_priorities: BTreeMap<String, f64>,
}

/// A named intermediate value surfaced in a score breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ComponentValue {
    Number(f64),
    Text(String),
}

impl From<f64> for ComponentValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for ComponentValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ComponentValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Auditable result of one metric calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub value: f64,
    pub calculation: String,
    #[serde(default)]
    pub components: BTreeMap<String, ComponentValue>,
    pub interpretation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentile: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry_benchmark: Option<String>,
}

impl ScoreBreakdown {
    pub fn new(value: f64, calculation: impl Into<String>, interpretation: impl Into<String>) -> Self {
        Self {
            value,
            calculation: calculation.into(),
            components: BTreeMap::new(),
            interpretation: interpretation.into(),
            percentile: None,
            industry_benchmark: None,
        }
    }

    pub fn with_component(mut self, name: &str, value: impl Into<ComponentValue>) -> Self {
        self.components.insert(name.to_string(), value.into());
        self
    }

    pub fn with_percentile(mut self, percentile: f64) -> Self {
        self.percentile = Some(percentile);
        self
    }

    pub fn with_benchmark(mut self, benchmark: impl Into<String>) -> Self {
        self.industry_benchmark = Some(benchmark.into());
        self
    }
}

/// Relative importance of each scored dimension. Always sums to 1 after
/// [`normalized`](ScoringWeights::normalized).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub technical_fit: f64,
    pub competition: f64,
    pub roi: f64,
    pub timing: f64,
    pub success_probability: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            technical_fit: 0.25,
            competition: 0.20,
            roi: 0.20,
            timing: 0.15,
            success_probability: 0.20,
        }
    }
}

impl ScoringWeights {
    /// Rescale so the weights sum to 1. A degenerate all-zero set falls back
    /// to the defaults.
    pub fn normalized(self) -> Self {
        let total = self.technical_fit
            + self.competition
            + self.roi
            + self.timing
            + self.success_probability;
        if total <= f64::EPSILON {
            return Self::default();
        }
        Self {
            technical_fit: self.technical_fit / total,
            competition: self.competition / total,
            roi: self.roi / total,
            timing: self.timing / total,
            success_probability: self.success_probability / total,
        }
    }
}

/// Complete weighted score for one opportunity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrantScore {
    pub opportunity_id: String,
    pub opportunity_title: String,
    pub agency_code: Option<String>,
    pub total_score: f64,
    pub recommendation: String,
    pub weights: ScoringWeights,
    pub technical_fit: ScoreBreakdown,
    pub competition: ScoreBreakdown,
    pub roi: ScoreBreakdown,
    pub timing: ScoreBreakdown,
    pub success_probability: ScoreBreakdown,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub degraded_dimensions: Vec<String>,
    pub calculated_at: DateTime<Utc>,
}

/// Hidden-opportunity assessment for one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HiddenOpportunityScore {
    pub opportunity_id: String,
    pub opportunity_title: String,
    pub hidden_score: f64,
    pub visibility: ScoreBreakdown,
    pub undersubscription: ScoreBreakdown,
    pub cross_category: ScoreBreakdown,
    pub classification: String,
    pub discovery_potential: String,
}

/// Result of scoring a batch of records in one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchScoreResult {
    pub scores: Vec<GrantScore>,
    pub hidden_gems: Vec<HiddenOpportunityScore>,
    #[serde(default)]
    pub skipped: Vec<SkippedRecord>,
    #[serde(default)]
    pub total_opportunities: usize,
    #[serde(default)]
    pub scoring_time_ms: u64,
    /// Filled by the service layer; the engine itself holds no cache.
    #[serde(default)]
    pub cache_hit_rate: f64,
}

/// A record dropped from a batch, with the index it held in the input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRecord {
    pub index: usize,
    pub reason: String,
}

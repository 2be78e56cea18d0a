//! Weighted scoring engine.
//!
//! Combines the five dimension calculators into a single 0..100 score with a
//! recommendation, applies profile-driven weight adjustments, and runs whole
//! batches with per-record failure isolation. All timing-sensitive math takes
//! an explicit `as_of` instant so identical inputs always produce identical
//! scores; only `calculated_at` reads the wall clock.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, warn};

use crate::scoring::domain::{
    BatchScoreResult, CareerStage, GrantScore, HiddenOpportunityScore, Opportunity,
    ScoreBreakdown, ScoringWeights, SkippedRecord, UserProfile,
};
use crate::scoring::metrics::{self, clamp, Calculation};
use crate::scoring::tables::IndustryTables;

/// Scoring failures for a single record.
#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error("invalid opportunity record: {reason}")]
    InvalidRecord { reason: String },
}

/// Per-request scoring inputs beyond the record itself.
#[derive(Debug, Clone)]
pub struct ScoringContext {
    pub profile: Option<UserProfile>,
    /// Full replacement for the default weights, normalized before use.
    pub weight_overrides: Option<ScoringWeights>,
    /// Reference instant for all deadline math.
    pub as_of: DateTime<Utc>,
    /// Close dates of the other opportunities under consideration, used for
    /// the concurrent-deadline discount.
    pub peer_close_dates: Vec<String>,
    /// Rank of the record in the search results that produced it.
    pub search_position: Option<usize>,
    /// Whether batch scoring also runs the hidden-opportunity assessment.
    pub include_hidden: bool,
}

impl ScoringContext {
    pub fn new(as_of: DateTime<Utc>) -> Self {
        Self {
            profile: None,
            weight_overrides: None,
            as_of,
            peer_close_dates: Vec::new(),
            search_position: None,
            include_hidden: true,
        }
    }

    pub fn with_profile(mut self, profile: UserProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    fn parsed_peer_deadlines(&self) -> Vec<NaiveDate> {
        self.peer_close_dates
            .iter()
            .filter_map(|raw| metrics::timing::parse_close_date(raw))
            .collect()
    }
}

/// Evaluates opportunities against the injected benchmark tables.
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    tables: IndustryTables,
    default_weights: ScoringWeights,
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self::new(IndustryTables::default())
    }
}

impl ScoringEngine {
    pub fn new(tables: IndustryTables) -> Self {
        Self {
            tables,
            default_weights: ScoringWeights::default(),
        }
    }

    pub fn tables(&self) -> &IndustryTables {
        &self.tables
    }

    /// Resolve the weights for one request: explicit overrides win, otherwise
    /// the defaults are skewed by career stage and named priorities, then
    /// renormalized.
    pub fn effective_weights(&self, context: &ScoringContext) -> ScoringWeights {
        if let Some(overrides) = context.weight_overrides {
            return overrides.normalized();
        }

        let mut weights = self.default_weights;
        if let Some(profile) = &context.profile {
            match profile.career_stage {
                Some(CareerStage::EarlyCareer) => {
                    weights.success_probability *= 1.25;
                    weights.timing *= 1.1;
                }
                Some(CareerStage::Senior) => {
                    weights.roi *= 1.25;
                }
                Some(CareerStage::MidCareer) | None => {}
            }

            for (dimension, factor) in &profile.scoring_priorities {
                match dimension.as_str() {
                    "technical_fit" => weights.technical_fit *= factor,
                    "competition" => weights.competition *= factor,
                    "roi" => weights.roi *= factor,
                    "timing" => weights.timing *= factor,
                    "success_probability" => weights.success_probability *= factor,
                    other => debug!(dimension = other, "ignoring unknown scoring priority"),
                }
            }
        }

        weights.normalized()
    }

    /// Keyword overlap between the profile and the listing text, on the same
    /// 0..100 scale as the other dimensions. Without keywords to match the
    /// fit is a flat 50.
    fn technical_fit(&self, opportunity: &Opportunity, profile: Option<&UserProfile>) -> Calculation {
        let keywords = profile
            .map(|p| p.research_keywords.as_slice())
            .unwrap_or(&[]);

        if keywords.is_empty() {
            let breakdown = ScoreBreakdown::new(
                50.0,
                "no research keywords supplied, neutral fit applied",
                "Provide research keywords for a meaningful fit score",
            );
            return Calculation::degraded(breakdown, "no research keywords");
        }

        let text = format!(
            "{} {}",
            opportunity.opportunity_title,
            opportunity
                .summary
                .summary_description
                .as_deref()
                .unwrap_or("")
        )
        .to_ascii_lowercase();

        let matched = keywords
            .iter()
            .filter(|kw| text.contains(&kw.to_ascii_lowercase()))
            .count();
        let ratio = matched as f64 / keywords.len() as f64;
        let score = clamp(ratio * 100.0, 20.0, 100.0);

        let interpretation = if score >= 70.0 {
            "Strong topical alignment with the stated research focus"
        } else if score >= 40.0 {
            "Partial topical alignment"
        } else {
            "Weak topical alignment"
        };

        let breakdown = ScoreBreakdown::new(
            score,
            format!(
                "{matched} of {} keywords matched -> {:.0}% (floored at 20)",
                keywords.len(),
                ratio * 100.0
            ),
            interpretation,
        )
        .with_component("matched_keywords", matched as f64)
        .with_component("total_keywords", keywords.len() as f64);

        Calculation::Computed(breakdown)
    }

    /// Score a single opportunity. Records without an identifier are
    /// rejected; every other input gap degrades the affected dimension
    /// instead of failing.
    pub fn score_one(
        &self,
        opportunity: &Opportunity,
        context: &ScoringContext,
    ) -> Result<GrantScore, ScoringError> {
        if opportunity.opportunity_id.trim().is_empty() {
            return Err(ScoringError::InvalidRecord {
                reason: "empty opportunity_id".to_string(),
            });
        }

        let profile = context.profile.as_ref();
        let weights = self.effective_weights(context);
        let peer_deadlines = context.parsed_peer_deadlines();

        let days_until_close = opportunity
            .summary
            .close_date
            .as_deref()
            .and_then(metrics::timing::parse_close_date)
            .map(|deadline| metrics::timing::days_until(deadline, context.as_of));

        let technical_fit = self.technical_fit(opportunity, profile);
        let competition =
            metrics::competition::calculate(opportunity, days_until_close, &self.tables.competition);
        let success = metrics::success::calculate(
            opportunity,
            profile,
            &self.tables.success,
            &self.tables.competition,
        );
        let roi = metrics::roi::calculate(
            opportunity,
            profile,
            days_until_close,
            success.breakdown().value,
            &self.tables.roi,
            &self.tables.competition,
        );
        let timing = metrics::timing::calculate(
            opportunity,
            profile,
            context.as_of,
            &peer_deadlines,
            &self.tables.timing,
        );

        let dimensions = [
            ("technical_fit", &technical_fit),
            ("competition", &competition),
            ("roi", &roi),
            ("timing", &timing),
            ("success_probability", &success),
        ];
        let degraded_dimensions: Vec<String> = dimensions
            .iter()
            .filter(|(_, calc)| calc.is_degraded())
            .map(|(name, _)| name.to_string())
            .collect();
        for (name, calc) in &dimensions {
            if let Some(reason) = calc.degraded_reason() {
                debug!(
                    opportunity_id = %opportunity.opportunity_id,
                    dimension = name,
                    reason,
                    "dimension degraded to fallback"
                );
            }
        }

        let total_score = clamp(
            weights.technical_fit * technical_fit.breakdown().value
                + weights.competition * competition.breakdown().value
                + weights.roi * roi.breakdown().value
                + weights.timing * timing.breakdown().value
                + weights.success_probability * success.breakdown().value,
            0.0,
            100.0,
        );

        let recommendation = recommendation(
            total_score,
            competition.breakdown().value,
            timing.breakdown().value,
            roi.breakdown().value,
            success.breakdown().value,
            opportunity.summary.award_ceiling,
        );

        Ok(GrantScore {
            opportunity_id: opportunity.opportunity_id.clone(),
            opportunity_title: opportunity.opportunity_title.clone(),
            agency_code: opportunity.agency_code.clone(),
            total_score,
            recommendation,
            weights,
            technical_fit: technical_fit.into_breakdown(),
            competition: competition.into_breakdown(),
            roi: roi.into_breakdown(),
            timing: timing.into_breakdown(),
            success_probability: success.into_breakdown(),
            degraded_dimensions,
            calculated_at: Utc::now(),
        })
    }

    /// Hidden-opportunity assessment for one record.
    pub fn score_hidden(
        &self,
        opportunity: &Opportunity,
        context: &ScoringContext,
    ) -> HiddenOpportunityScore {
        metrics::hidden::calculate(
            opportunity,
            context.profile.as_ref(),
            context.search_position,
            context.as_of,
            &self.tables.hidden,
        )
    }

    /// Score a batch, skipping invalid records instead of failing the whole
    /// request. Results are sorted best-first; hidden gems carry their search
    /// position and only surface above the gem threshold.
    pub fn score_batch(
        &self,
        opportunities: &[Opportunity],
        context: &ScoringContext,
    ) -> BatchScoreResult {
        let started = std::time::Instant::now();
        let peer_dates: Vec<String> = opportunities
            .iter()
            .filter_map(|o| o.summary.close_date.clone())
            .collect();

        let mut scores = Vec::with_capacity(opportunities.len());
        let mut hidden_gems = Vec::new();
        let mut skipped = Vec::new();

        for (index, opportunity) in opportunities.iter().enumerate() {
            let mut record_context = context.clone();
            record_context.search_position = Some(index + 1);
            record_context.peer_close_dates = peer_dates
                .iter()
                .enumerate()
                .filter(|(i, _)| {
                    // A record is not its own concurrent deadline.
                    opportunities
                        .get(*i)
                        .map(|peer| peer.opportunity_id != opportunity.opportunity_id)
                        .unwrap_or(true)
                })
                .map(|(_, date)| date.clone())
                .collect();

            match self.score_one(opportunity, &record_context) {
                Ok(score) => scores.push(score),
                Err(err) => {
                    warn!(index, error = %err, "skipping unscorable record");
                    skipped.push(SkippedRecord {
                        index,
                        reason: err.to_string(),
                    });
                    continue;
                }
            }

            if context.include_hidden {
                let hidden = self.score_hidden(opportunity, &record_context);
                if hidden.hidden_score > self.tables.hidden.gem_threshold {
                    hidden_gems.push(hidden);
                }
            }
        }

        scores.sort_by(|a, b| b.total_score.total_cmp(&a.total_score));
        hidden_gems.sort_by(|a, b| b.hidden_score.total_cmp(&a.hidden_score));

        BatchScoreResult {
            scores,
            hidden_gems,
            skipped,
            total_opportunities: opportunities.len(),
            scoring_time_ms: started.elapsed().as_millis() as u64,
            cache_hit_rate: 0.0,
        }
    }
}

fn recommendation(
    total: f64,
    competition: f64,
    timing: f64,
    roi: f64,
    success: f64,
    award_ceiling: Option<f64>,
) -> String {
    let label = if total >= 80.0 {
        "HIGH PRIORITY"
    } else if total >= 60.0 {
        "RECOMMENDED"
    } else if total >= 40.0 {
        "CONDITIONAL"
    } else {
        "NOT RECOMMENDED"
    };

    let mut callouts = Vec::new();
    if competition < 30.0 {
        callouts.push("expect heavy competition");
    }
    if timing < 40.0 {
        callouts.push("deadline pressure is severe");
    }
    if roi > 70.0 {
        callouts.push("outstanding return on preparation effort");
    }
    if success > 60.0 {
        callouts.push("strong odds of award");
    } else if success < 30.0 {
        callouts.push("low odds of award");
    }
    if matches!(award_ceiling, Some(ceiling) if ceiling > 1_000_000.0) {
        callouts.push("consider a partnership to carry an award this large");
    }

    if callouts.is_empty() {
        label.to_string()
    } else {
        format!("{label}: {}", callouts.join("; "))
    }
}

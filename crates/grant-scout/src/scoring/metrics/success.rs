//! Success probability.
//!
//! Starts from awards over the estimated applicant pool, then multiplies in
//! eligibility, technical fit against the applicant profile, and a history
//! modifier built from agency and applicant success rates. The result is a
//! percentage clamped to a credible [1, 90] band.

use crate::scoring::domain::{Opportunity, ScoreBreakdown, UserProfile};
use crate::scoring::metrics::{clamp, Calculation};
use crate::scoring::tables::{CompetitionTables, SuccessTables};

const DEGRADED_SCORE: f64 = 20.0;
const ELIGIBILITY_MISMATCH_FACTOR: f64 = 0.3;
const NEUTRAL_FIT: f64 = 0.5;

pub fn calculate(
    opportunity: &Opportunity,
    profile: Option<&UserProfile>,
    tables: &SuccessTables,
    competition_tables: &CompetitionTables,
) -> Calculation {
    let Some(ceiling) = opportunity.summary.funding_estimate() else {
        let breakdown = ScoreBreakdown::new(
            DEGRADED_SCORE,
            "award amounts unavailable, conservative success estimate applied",
            "Success probability defaulted without funding details",
        );
        return Calculation::degraded(breakdown, "missing award ceiling and floor");
    };

    let agency = opportunity.agency_root();
    let base_applicants = competition_tables.applicant_tiers.lookup(ceiling);
    let estimated_applicants = (base_applicants
        * competition_tables.agency_applicant_factor.lookup(agency)
        * competition_tables
            .category_applicant_factor
            .lookup(opportunity.category.as_deref()))
    .max(competition_tables.minimum_applicants);

    let awards = f64::from(opportunity.summary.expected_number_of_awards.unwrap_or(1).max(1));
    let base = (awards / estimated_applicants * 100.0).min(100.0);

    let eligibility = eligibility_factor(opportunity, profile, tables);
    let fit = technical_fit_factor(opportunity, profile);
    let history = history_modifier(agency, profile, tables);

    let probability = clamp(
        base * eligibility * fit * history,
        tables.minimum_probability,
        tables.maximum_probability,
    );
    let percentile = clamp(probability / 40.0 * 100.0, 1.0, 99.0);

    let calculation = format!(
        "Base: {base:.1}% x Eligibility: {eligibility:.2} x Fit: {fit:.2} x History: {history:.2} \
         = {probability:.1}%"
    );

    let interpretation = if probability >= 50.0 {
        "Strong odds relative to typical federal programs".to_string()
    } else if probability >= 20.0 {
        "Average odds for a competitive program".to_string()
    } else {
        "Long odds: consider only with strong strategic reasons".to_string()
    };

    let agency_rate = tables.agency_success_rate.lookup(agency);
    let breakdown = ScoreBreakdown::new(probability, calculation, interpretation)
        .with_component("base_probability", base)
        .with_component("eligibility_factor", eligibility)
        .with_component("fit_factor", fit)
        .with_component("history_modifier", history)
        .with_percentile(percentile)
        .with_benchmark(format!(
            "Agency historical success rate: {:.0}%",
            agency_rate * 100.0
        ));

    Calculation::Computed(breakdown)
}

/// 1.0 when the applicant type matches a listed eligible type (or nothing is
/// listed), otherwise a heavy discount.
fn eligibility_factor(
    opportunity: &Opportunity,
    profile: Option<&UserProfile>,
    tables: &SuccessTables,
) -> f64 {
    let Some(applicant_type) = profile.and_then(|p| p.applicant_type.as_deref()) else {
        return 1.0;
    };
    let eligible = &opportunity.summary.applicant_types;
    if eligible.is_empty() {
        return 1.0;
    }

    let key = applicant_type.trim().to_ascii_lowercase();
    let synonyms = tables
        .applicant_type_synonyms
        .get(&key)
        .cloned()
        .unwrap_or_else(|| vec![key.clone()]);

    let matches = eligible.iter().any(|listed| {
        let listed = listed.to_ascii_lowercase();
        synonyms.iter().any(|syn| listed.contains(syn))
    });

    if matches {
        1.0
    } else {
        ELIGIBILITY_MISMATCH_FACTOR
    }
}

/// Weighted blend of keyword, category, and agency alignment, each a 0..1
/// sub-score defaulting to 0.5 when the profile gives nothing to match on.
fn technical_fit_factor(opportunity: &Opportunity, profile: Option<&UserProfile>) -> f64 {
    let Some(profile) = profile else {
        return NEUTRAL_FIT;
    };

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

    let keyword_score = if profile.research_keywords.is_empty() {
        0.5
    } else {
        let matched = profile
            .research_keywords
            .iter()
            .filter(|kw| text.contains(&kw.to_ascii_lowercase()))
            .count();
        (matched as f64 / profile.research_keywords.len() as f64).max(0.1)
    };

    let category_score = match (&opportunity.category, profile.research_categories.is_empty()) {
        (_, true) | (None, _) => 0.5,
        (Some(category), false) => {
            let category_lower = category.to_ascii_lowercase();
            if profile
                .research_categories
                .iter()
                .any(|c| c.eq_ignore_ascii_case(category))
            {
                1.0
            } else if profile.research_categories.iter().any(|c| {
                let c = c.to_ascii_lowercase();
                category_lower
                    .split_whitespace()
                    .any(|word| c.split_whitespace().any(|cw| cw == word))
            }) {
                0.7
            } else {
                0.3
            }
        }
    };

    let agency_score = if profile.preferred_agencies.is_empty() {
        0.5
    } else {
        let code = opportunity.agency_code.as_deref().unwrap_or("");
        if profile
            .preferred_agencies
            .iter()
            .any(|preferred| code.to_ascii_uppercase().contains(&preferred.to_ascii_uppercase()))
        {
            1.0
        } else {
            0.3
        }
    };

    keyword_score * 0.5 + category_score * 0.3 + agency_score * 0.2
}

/// Agency track record relative to the baseline, nudged by the applicant's
/// own win rate and clamped to [0.5, 2.0].
fn history_modifier(
    agency_root: Option<&str>,
    profile: Option<&UserProfile>,
    tables: &SuccessTables,
) -> f64 {
    let agency_rate = tables.agency_success_rate.lookup(agency_root);
    let agency_component = (agency_rate / tables.baseline_success_rate).sqrt();

    let user_component = match profile.and_then(|p| p.grant_success_rate) {
        Some(rate) if rate > 0.3 => 1.2,
        Some(rate) if rate < 0.1 => 0.8,
        Some(_) => 1.0,
        None => 1.0,
    };

    clamp(agency_component * user_component, 0.5, 2.0)
}

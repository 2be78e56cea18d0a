//! Weighted competition index.
//!
//! Estimates the applicant pool from the award ceiling, agency, and category,
//! turns it into an applicants-per-award index, then weights the index by
//! award size, agency competitiveness, and deadline proximity. The dimension
//! score rewards low competition: `clamp(100 - weighted_index, 0, 100)`.

use crate::scoring::domain::{Opportunity, ScoreBreakdown};
use crate::scoring::metrics::{clamp, normal_cdf, Calculation};
use crate::scoring::tables::CompetitionTables;

const DEGRADED_SCORE: f64 = 50.0;

pub fn calculate(
    opportunity: &Opportunity,
    days_until_close: Option<i64>,
    tables: &CompetitionTables,
) -> Calculation {
    let Some(ceiling) = opportunity.summary.funding_estimate() else {
        let breakdown = ScoreBreakdown::new(
            DEGRADED_SCORE,
            "award amounts unavailable, neutral competition score applied",
            "Competition could not be estimated without funding details",
        );
        return Calculation::degraded(breakdown, "missing award ceiling and floor");
    };

    let agency = opportunity.agency_root();
    let base_applicants = tables.applicant_tiers.lookup(ceiling);
    let agency_factor = tables.agency_applicant_factor.lookup(agency);
    let category_factor = tables
        .category_applicant_factor
        .lookup(opportunity.category.as_deref());
    let estimated_applicants =
        (base_applicants * agency_factor * category_factor).max(tables.minimum_applicants);

    let awards = opportunity
        .summary
        .expected_number_of_awards
        .unwrap_or(1)
        .max(0);
    let basic_index = if awards == 0 {
        100.0
    } else {
        estimated_applicants / f64::from(awards) * 100.0
    };

    // Larger pots draw proportionally fewer applicants per dollar.
    let amount_factor = clamp(1.0 / (ceiling / 100_000.0).sqrt(), 0.5, 2.0);
    let competition_factor = tables.agency_competition_factor.lookup(agency);
    let deadline_factor = match days_until_close {
        Some(days) if days < 30 => 0.8,
        Some(days) if days > 180 => 1.1,
        Some(_) => 1.0,
        None => 1.0,
    };

    let weighted_index = basic_index * amount_factor * competition_factor * deadline_factor;
    let score = clamp(100.0 - weighted_index, 0.0, 100.0);
    let percentile = clamp(
        normal_cdf(weighted_index, tables.index_mean, tables.index_stddev) * 100.0,
        0.0,
        100.0,
    );

    let calculation = format!(
        "{estimated_applicants:.0} estimated applicants / {awards} award(s) x 100 = {basic_index:.1}; \
         x{amount_factor:.2} amount x{competition_factor:.2} agency x{deadline_factor:.2} deadline \
         = {weighted_index:.1}"
    );

    let interpretation = if weighted_index < tables.low_index {
        "Low competition: favorable applicant-to-award ratio".to_string()
    } else if weighted_index < tables.high_index {
        "Moderate competition: solid proposals remain viable".to_string()
    } else {
        "High competition: expect a crowded applicant field".to_string()
    };

    let benchmark = match agency {
        Some("NIH") => Some(format!(
            "NIH programs average a weighted index near {:.0}",
            tables.nih_average_index
        )),
        Some("NSF") => Some(format!(
            "NSF programs average a weighted index near {:.0}",
            tables.nsf_average_index
        )),
        _ => None,
    };

    let mut breakdown = ScoreBreakdown::new(score, calculation, interpretation)
        .with_component("estimated_applicants", estimated_applicants)
        .with_component("basic_index", basic_index)
        .with_component("amount_factor", amount_factor)
        .with_component("agency_factor", competition_factor)
        .with_component("deadline_factor", deadline_factor)
        .with_component("weighted_index", weighted_index)
        .with_percentile(percentile);
    if let Some(benchmark) = benchmark {
        breakdown = breakdown.with_benchmark(benchmark);
    }

    Calculation::Computed(breakdown)
}

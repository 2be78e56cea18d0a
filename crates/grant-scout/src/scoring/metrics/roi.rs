//! Return on investment.
//!
//! Estimates proposal preparation effort from the award ceiling and agency,
//! prices it at a standard hourly rate, then adjusts the raw award-to-cost
//! ratio for failure risk and strategic value. The dimension score maps the
//! adjusted percentage onto 0..100 at a 1000% ROI ceiling.

use crate::scoring::domain::{CareerStage, Opportunity, ScoreBreakdown, UserProfile};
use crate::scoring::metrics::{clamp, Calculation};
use crate::scoring::tables::{CompetitionTables, RoiTables};

const DEGRADED_SCORE: f64 = 50.0;
const ROI_SCALE: f64 = 1000.0;
const CROWDED_POOL_THRESHOLD: f64 = 100.0;
const COLLABORATION_STEMS: [&str; 3] = ["collaborat", "partnership", "consortium"];

pub fn calculate(
    opportunity: &Opportunity,
    profile: Option<&UserProfile>,
    days_until_close: Option<i64>,
    success_probability: f64,
    tables: &RoiTables,
    competition_tables: &CompetitionTables,
) -> Calculation {
    let Some(ceiling) = opportunity.summary.funding_estimate() else {
        let breakdown = ScoreBreakdown::new(
            DEGRADED_SCORE,
            "award amounts unavailable, neutral ROI score applied",
            "ROI could not be estimated without funding details",
        );
        return Calculation::degraded(breakdown, "missing award ceiling and floor");
    };

    let agency = opportunity.agency_root();
    let first_time_agency = profile
        .map(|p| {
            !p.familiar_agencies
                .iter()
                .any(|known| agency.is_some_and(|root| known.eq_ignore_ascii_case(root)))
        })
        .unwrap_or(false);

    let mut hours = tables.effort_tiers.lookup(ceiling)
        * tables.agency_complexity_factor.lookup(agency);
    if opportunity.summary.requires_partnerships {
        hours *= 1.2;
    }
    if opportunity.summary.requires_preliminary_data {
        hours *= 1.1;
    }
    if first_time_agency {
        hours *= 1.3;
    }

    let preparation_cost = hours * tables.default_hourly_rate;
    let expected_award = match opportunity.summary.award_floor.filter(|f| *f > 0.0) {
        Some(floor) => (ceiling + floor) / 2.0,
        None => ceiling,
    };
    let basic_roi = (expected_award - preparation_cost) / preparation_cost * 100.0;

    let hourly_cost = profile
        .and_then(|p| p.hourly_opportunity_cost)
        .unwrap_or(tables.default_hourly_rate);
    let effort_adjusted = basic_roi / (hours * hourly_cost) * 1000.0;

    let estimated_applicants = (competition_tables.applicant_tiers.lookup(ceiling)
        * competition_tables.agency_applicant_factor.lookup(agency)
        * competition_tables
            .category_applicant_factor
            .lookup(opportunity.category.as_deref()))
    .max(competition_tables.minimum_applicants);

    let mut risk: f64 = 0.1;
    if first_time_agency {
        risk += 0.1;
    }
    if matches!(days_until_close, Some(days) if days < 45) {
        risk += 0.05;
    }
    if estimated_applicants > CROWDED_POOL_THRESHOLD {
        risk += 0.1;
    }
    if matches!(agency, Some("NIH") | Some("DOD")) {
        risk += 0.05;
    }
    let risk = risk.min(0.5);

    let risk_adjusted = basic_roi * (success_probability / 100.0) * (1.0 - risk);

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
    let collaborative = COLLABORATION_STEMS.iter().any(|stem| text.contains(stem));

    let career_factor = match profile.and_then(|p| p.career_stage) {
        Some(CareerStage::EarlyCareer) => 1.2,
        Some(CareerStage::Senior) => 0.9,
        _ => 1.0,
    };
    let mut strategic = tables.agency_prestige_factor.lookup(agency) * career_factor;
    if ceiling > 500_000.0 {
        strategic *= 1.1;
    }
    if collaborative {
        strategic *= 1.1;
    }
    let strategic = clamp(strategic, tables.strategic_floor, tables.strategic_ceiling);

    let final_roi = risk_adjusted * strategic;
    let score = clamp(final_roi / ROI_SCALE * 100.0, 0.0, 100.0);

    let calculation = format!(
        "(${expected_award:.0} - ${preparation_cost:.0}) / ${preparation_cost:.0} x 100 \
         = {basic_roi:.1}%; x{success:.3} success x{survival:.2} survival x{strategic:.2} strategic \
         = {final_roi:.1}%",
        success = success_probability / 100.0,
        survival = 1.0 - risk,
    );

    let interpretation = if final_roi >= 500.0 {
        "Exceptional expected return on preparation effort".to_string()
    } else if final_roi >= 100.0 {
        "Positive expected return after risk adjustment".to_string()
    } else if final_roi >= 0.0 {
        "Marginal expected return: effort may outweigh the award".to_string()
    } else {
        "Negative expected return at this success probability".to_string()
    };

    let breakdown = ScoreBreakdown::new(score, calculation, interpretation)
        .with_component("estimated_hours", hours)
        .with_component("preparation_cost", preparation_cost)
        .with_component("expected_award", expected_award)
        .with_component("basic_roi", basic_roi)
        .with_component("effort_adjusted_roi", effort_adjusted)
        .with_component("risk_factor", risk)
        .with_component("risk_adjusted_roi", risk_adjusted)
        .with_component("strategic_multiplier", strategic)
        .with_component("final_roi", final_roi);

    Calculation::Computed(breakdown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::domain::OpportunitySummary;
    use crate::scoring::tables::IndustryTables;
    use crate::scoring::ComponentValue;

    fn opportunity(ceiling: f64, agency: &str) -> Opportunity {
        Opportunity {
            opportunity_id: "OPP-1".to_string(),
            opportunity_title: "Test Program".to_string(),
            agency_code: Some(agency.to_string()),
            summary: OpportunitySummary {
                award_ceiling: Some(ceiling),
                expected_number_of_awards: Some(1),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn component(calc: &Calculation, name: &str) -> f64 {
        match calc.breakdown().components.get(name) {
            Some(ComponentValue::Number(n)) => *n,
            other => panic!("component {name} missing or non-numeric: {other:?}"),
        }
    }

    #[test]
    fn nsf_midsize_award_baseline() {
        let tables = IndustryTables::default();
        let calc = calculate(
            &opportunity(100_000.0, "NSF"),
            None,
            None,
            50.0,
            &tables.roi,
            &tables.competition,
        );
        assert!(!calc.is_degraded());

        // 60 base hours x 1.3 NSF complexity = 78 hours, $5850 at $75/hr.
        assert!((component(&calc, "estimated_hours") - 78.0).abs() < 1e-9);
        assert!((component(&calc, "preparation_cost") - 5850.0).abs() < 1e-9);

        let basic = (100_000.0 - 5850.0) / 5850.0 * 100.0;
        assert!((component(&calc, "basic_roi") - basic).abs() < 1e-9);
        // No profile, no deadline, 35 applicants, NSF: base risk only.
        assert!((component(&calc, "risk_factor") - 0.1).abs() < 1e-12);
        assert!((component(&calc, "strategic_multiplier") - 1.2).abs() < 1e-9);
    }

    #[test]
    fn award_floor_moves_the_expected_award_to_the_midpoint() {
        let tables = IndustryTables::default();
        let mut record = opportunity(100_000.0, "NSF");
        record.summary.award_floor = Some(50_000.0);
        let calc = calculate(
            &record,
            None,
            None,
            50.0,
            &tables.roi,
            &tables.competition,
        );
        assert_eq!(component(&calc, "expected_award"), 75_000.0);
    }

    #[test]
    fn partnership_and_preliminary_data_inflate_hours() {
        let tables = IndustryTables::default();
        let mut record = opportunity(100_000.0, "NSF");
        record.summary.requires_partnerships = true;
        record.summary.requires_preliminary_data = true;
        let calc = calculate(
            &record,
            None,
            None,
            50.0,
            &tables.roi,
            &tables.competition,
        );
        assert!((component(&calc, "estimated_hours") - 78.0 * 1.2 * 1.1).abs() < 1e-9);
    }

    #[test]
    fn unfamiliar_agency_raises_risk_and_hours() {
        let tables = IndustryTables::default();
        let profile = UserProfile {
            familiar_agencies: vec!["NIH".to_string()],
            ..Default::default()
        };
        let calc = calculate(
            &opportunity(100_000.0, "NSF"),
            Some(&profile),
            None,
            50.0,
            &tables.roi,
            &tables.competition,
        );
        assert!((component(&calc, "estimated_hours") - 78.0 * 1.3).abs() < 1e-9);
        assert!((component(&calc, "risk_factor") - 0.2).abs() < 1e-12);
    }

    #[test]
    fn risk_accumulates_across_factors() {
        let tables = IndustryTables::default();
        let profile = UserProfile::default();
        let mut record = opportunity(2_000_000.0, "NIH");
        record.category = Some("Health".to_string());
        // First-time agency + tight deadline + crowded pool + complex agency.
        let calc = calculate(
            &record,
            Some(&profile),
            Some(10),
            50.0,
            &tables.roi,
            &tables.competition,
        );
        assert!((component(&calc, "risk_factor") - 0.4).abs() < 1e-12);
    }

    #[test]
    fn early_career_on_prestige_agency_boosts_strategy() {
        let tables = IndustryTables::default();
        let profile = UserProfile {
            career_stage: Some(CareerStage::EarlyCareer),
            familiar_agencies: vec!["NIH".to_string()],
            ..Default::default()
        };
        let calc = calculate(
            &opportunity(750_000.0, "NIH"),
            Some(&profile),
            None,
            50.0,
            &tables.roi,
            &tables.competition,
        );
        // 1.3 prestige x 1.2 early career x 1.1 large award = 1.716
        assert!((component(&calc, "strategic_multiplier") - 1.716).abs() < 1e-9);
    }

    #[test]
    fn strategic_multiplier_stacks_all_bonuses() {
        let tables = IndustryTables::default();
        let profile = UserProfile {
            career_stage: Some(CareerStage::EarlyCareer),
            familiar_agencies: vec!["NIH".to_string()],
            ..Default::default()
        };
        let mut record = opportunity(2_000_000.0, "NIH");
        record.opportunity_title = "Collaborative consortium partnership".to_string();
        let calc = calculate(
            &record,
            Some(&profile),
            None,
            50.0,
            &tables.roi,
            &tables.competition,
        );
        // 1.3 prestige x 1.2 early career x 1.1 large award x 1.1 collaborative
        assert!((component(&calc, "strategic_multiplier") - 1.8876).abs() < 1e-9);
    }

    #[test]
    fn strategic_multiplier_is_clamped_to_the_table_ceiling() {
        let mut tables = IndustryTables::default();
        tables.roi.strategic_ceiling = 1.5;
        let profile = UserProfile {
            career_stage: Some(CareerStage::EarlyCareer),
            familiar_agencies: vec!["NIH".to_string()],
            ..Default::default()
        };
        let mut record = opportunity(2_000_000.0, "NIH");
        record.opportunity_title = "Collaborative consortium partnership".to_string();
        let calc = calculate(
            &record,
            Some(&profile),
            None,
            50.0,
            &tables.roi,
            &tables.competition,
        );
        // Unclamped product is 1.8876; the lowered ceiling must bind.
        assert_eq!(component(&calc, "strategic_multiplier"), 1.5);
    }

    #[test]
    fn missing_amounts_degrade_to_neutral() {
        let tables = IndustryTables::default();
        let mut record = opportunity(0.0, "NSF");
        record.summary.award_ceiling = None;
        let calc = calculate(&record, None, None, 50.0, &tables.roi, &tables.competition);
        assert!(calc.is_degraded());
        assert_eq!(calc.breakdown().value, 50.0);

        // A floor alone yields a real estimate with the floor as the award.
        record.summary.award_floor = Some(100_000.0);
        let calc = calculate(&record, None, None, 50.0, &tables.roi, &tables.competition);
        assert!(!calc.is_degraded());
        assert_eq!(component(&calc, "expected_award"), 100_000.0);
    }
}

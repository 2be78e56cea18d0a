//! Deadline timing quality.
//!
//! Compares the time remaining before the close date against the preparation
//! window the opportunity realistically needs, then discounts for concurrent
//! deadlines and adjusts for agency resubmission cycles. A missing close date
//! is common for forecasted records and scores neutral rather than degraded.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};

use crate::scoring::domain::{Opportunity, ScoreBreakdown, UserProfile};
use crate::scoring::metrics::{clamp, Calculation};
use crate::scoring::tables::TimingTables;

const NEUTRAL_ADEQUACY: f64 = 50.0;
const CONCURRENT_WINDOW_DAYS: i64 = 14;

const DATE_FORMATS: [&str; 7] = [
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%B %d, %Y",
    "%b %d, %Y",
];

/// Parse the close-date spellings seen in upstream payloads.
pub(crate) fn parse_close_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
        if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(datetime.date());
        }
    }
    // Timestamps with sub-second or zone suffixes still start with the date.
    // `get` keeps a non-boundary byte 10 from panicking on multibyte input.
    if let Some(prefix) = trimmed.get(..10) {
        if let Ok(date) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
            return Some(date);
        }
    }
    None
}

/// Whole days from `as_of` until the deadline, floored at zero.
pub(crate) fn days_until(deadline: NaiveDate, as_of: DateTime<Utc>) -> i64 {
    (deadline - as_of.date_naive()).num_days().max(0)
}

pub fn calculate(
    opportunity: &Opportunity,
    profile: Option<&UserProfile>,
    as_of: DateTime<Utc>,
    peer_deadlines: &[NaiveDate],
    tables: &TimingTables,
) -> Calculation {
    let agency = opportunity.agency_root();
    let deadline = opportunity
        .summary
        .close_date
        .as_deref()
        .and_then(parse_close_date);

    let ceiling = opportunity.summary.award_ceiling.unwrap_or(0.0);
    let first_submission = profile.map(|p| p.first_time_applicant).unwrap_or(true);

    let mut required_days = tables.preparation_tiers.lookup(ceiling)
        * tables.agency_preparation_factor.lookup(agency);
    if opportunity.summary.requires_partnerships {
        required_days *= 1.2;
    }
    if opportunity.summary.requires_preliminary_data {
        required_days *= 1.1;
    }
    if first_submission {
        required_days *= 1.1;
    }

    let (adequacy, days_remaining) = match deadline {
        Some(deadline) => {
            let days = days_until(deadline, as_of);
            let ratio = days as f64 / required_days;
            let adequacy = if ratio >= 1.0 {
                // Diminishing credit for time beyond the required window.
                100.0 - 10.0 / ratio
            } else {
                ratio * 100.0
            };
            (adequacy, Some(days))
        }
        None => (NEUTRAL_ADEQUACY, None),
    };

    let concurrent_factor = match deadline {
        Some(deadline) => {
            let nearby = peer_deadlines
                .iter()
                .filter(|peer| (**peer - deadline).num_days().abs() <= CONCURRENT_WINDOW_DAYS)
                .count() as f64;
            let capacity = profile
                .and_then(|p| p.max_concurrent_applications)
                .unwrap_or(tables.default_concurrent_capacity);
            if nearby == 0.0 {
                1.0
            } else if nearby < f64::from(capacity) {
                1.0 - 0.1 * nearby
            } else {
                (1.0 - 0.2 * nearby).max(0.3)
            }
        }
        None => 1.0,
    };

    let cycle_factor = match deadline.map(|d| d.month()) {
        Some(3) | Some(6) | Some(9) | Some(12) => 1.05,
        Some(1) | Some(7) => 1.1,
        _ => 1.0,
    };
    let resubmission_factor = tables.agency_resubmission_factor.lookup(agency) * cycle_factor;

    let score = clamp(adequacy * concurrent_factor * resubmission_factor, 0.0, 100.0);

    let calculation = match days_remaining {
        Some(days) => format!(
            "{days} days remaining vs {required_days:.0} required -> adequacy {adequacy:.1}; \
             x{concurrent_factor:.2} concurrency x{resubmission_factor:.2} cycle = {score:.1}"
        ),
        None => format!(
            "no close date published, neutral adequacy {NEUTRAL_ADEQUACY:.0}; \
             x{concurrent_factor:.2} concurrency x{resubmission_factor:.2} cycle = {score:.1}"
        ),
    };

    let interpretation = match days_remaining {
        None => "No deadline announced yet: monitor for the posted close date".to_string(),
        Some(_) if adequacy >= 80.0 => "Comfortable preparation window".to_string(),
        Some(_) if adequacy >= 50.0 => "Workable but tight preparation window".to_string(),
        Some(_) => "Insufficient time for a competitive submission".to_string(),
    };

    let mut breakdown = ScoreBreakdown::new(score, calculation, interpretation)
        .with_component("required_preparation_days", required_days)
        .with_component("adequacy", adequacy)
        .with_component("concurrent_factor", concurrent_factor)
        .with_component("resubmission_factor", resubmission_factor);
    if let Some(days) = days_remaining {
        breakdown = breakdown.with_component("days_remaining", days as f64);
    }

    Calculation::Computed(breakdown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::domain::OpportunitySummary;
    use crate::scoring::tables::IndustryTables;
    use crate::scoring::ComponentValue;
    use chrono::TimeZone;

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 10, 0, 0, 0).unwrap()
    }

    fn opportunity(close_date: Option<&str>, agency: &str) -> Opportunity {
        Opportunity {
            opportunity_id: "OPP-1".to_string(),
            opportunity_title: "Test".to_string(),
            agency_code: Some(agency.to_string()),
            summary: OpportunitySummary {
                award_ceiling: Some(100_000.0),
                close_date: close_date.map(str::to_string),
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
    fn close_date_parses_common_spellings() {
        let expected = NaiveDate::from_ymd_opt(2025, 4, 15).unwrap();
        for raw in [
            "2025-04-15",
            "04/15/2025",
            "2025-04-15T00:00:00",
            "2025-04-15 00:00:00",
            "April 15, 2025",
            "Apr 15, 2025",
            "2025-04-15T12:30:00.000Z",
        ] {
            assert_eq!(parse_close_date(raw), Some(expected), "failed on {raw}");
        }
        assert_eq!(parse_close_date("sometime in spring"), None);
    }

    #[test]
    fn multibyte_close_date_is_unparseable_not_a_panic() {
        // A two-byte character straddling byte 10 must not split the string.
        assert_eq!(parse_close_date("2025-04-1é"), None);
        assert_eq!(parse_close_date("février 15, 2025"), None);

        let tables = IndustryTables::default();
        let calc = calculate(
            &opportunity(Some("2025-04-1é"), "NSF"),
            None,
            as_of(),
            &[],
            &tables.timing,
        );
        assert!(!calc.is_degraded());
        assert_eq!(component(&calc, "adequacy"), 50.0);
    }

    #[test]
    fn missing_close_date_is_neutral_not_degraded() {
        let tables = IndustryTables::default();
        let calc = calculate(&opportunity(None, "NSF"), None, as_of(), &[], &tables.timing);
        assert!(!calc.is_degraded());
        assert_eq!(component(&calc, "adequacy"), 50.0);
        // NSF resubmission 1.1, no deadline month factor.
        assert!((calc.breakdown().value - 55.0).abs() < 1e-9);
    }

    #[test]
    fn ample_window_earns_high_adequacy() {
        let tables = IndustryTables::default();
        // NSF 100k, no profile: 45 x 1.1 x 1.1 first submission = 54.45 days.
        let calc = calculate(
            &opportunity(Some("2025-08-10"), "NSF"),
            None,
            as_of(),
            &[],
            &tables.timing,
        );
        let required = component(&calc, "required_preparation_days");
        assert!((required - 54.45).abs() < 1e-9);

        let ratio = 181.0 / required;
        let expected_adequacy = 100.0 - 10.0 / ratio;
        assert!((component(&calc, "adequacy") - expected_adequacy).abs() < 1e-9);
        assert!(calc.breakdown().interpretation.contains("Comfortable"));
    }

    #[test]
    fn short_window_scales_linearly() {
        let tables = IndustryTables::default();
        let calc = calculate(
            &opportunity(Some("2025-02-20"), "NSF"),
            None,
            as_of(),
            &[],
            &tables.timing,
        );
        let required = component(&calc, "required_preparation_days");
        let expected = 10.0 / required * 100.0;
        assert!((component(&calc, "adequacy") - expected).abs() < 1e-9);
        assert!(calc
            .breakdown()
            .interpretation
            .contains("Insufficient time"));
    }

    #[test]
    fn past_deadline_floors_at_zero_days() {
        let tables = IndustryTables::default();
        let calc = calculate(
            &opportunity(Some("2025-01-01"), "NSF"),
            None,
            as_of(),
            &[],
            &tables.timing,
        );
        assert_eq!(component(&calc, "days_remaining"), 0.0);
        assert_eq!(component(&calc, "adequacy"), 0.0);
        assert_eq!(calc.breakdown().value, 0.0);
    }

    #[test]
    fn concurrent_deadlines_discount_the_score() {
        let tables = IndustryTables::default();
        let peers = vec![
            NaiveDate::from_ymd_opt(2025, 8, 5).unwrap(),
            NaiveDate::from_ymd_opt(2025, 8, 20).unwrap(),
        ];
        let calc = calculate(
            &opportunity(Some("2025-08-10"), "NSF"),
            None,
            as_of(),
            &peers,
            &tables.timing,
        );
        // Two peers within the window, under the default capacity of 3.
        assert!((component(&calc, "concurrent_factor") - 0.8).abs() < 1e-9);
    }

    #[test]
    fn overload_uses_the_steeper_discount() {
        let tables = IndustryTables::default();
        let profile = UserProfile {
            max_concurrent_applications: Some(2),
            first_time_applicant: false,
            ..Default::default()
        };
        let peers = vec![
            NaiveDate::from_ymd_opt(2025, 8, 5).unwrap(),
            NaiveDate::from_ymd_opt(2025, 8, 12).unwrap(),
            NaiveDate::from_ymd_opt(2025, 8, 20).unwrap(),
        ];
        let calc = calculate(
            &opportunity(Some("2025-08-10"), "NSF"),
            Some(&profile),
            as_of(),
            &peers,
            &tables.timing,
        );
        assert!((component(&calc, "concurrent_factor") - 0.4).abs() < 1e-9);
    }

    #[test]
    fn quarter_end_deadline_gets_the_cycle_bonus() {
        let tables = IndustryTables::default();
        let march = calculate(
            &opportunity(Some("2025-03-20"), "DOE"),
            None,
            as_of(),
            &[],
            &tables.timing,
        );
        let july = calculate(
            &opportunity(Some("2025-07-20"), "DOE"),
            None,
            as_of(),
            &[],
            &tables.timing,
        );
        // DOE resubmission factor is 1.0, so the cycle factor shows through.
        assert!((component(&march, "resubmission_factor") - 1.05).abs() < 1e-9);
        assert!((component(&july, "resubmission_factor") - 1.1).abs() < 1e-9);
    }
}

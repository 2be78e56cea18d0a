//! Hidden-opportunity detection.
//!
//! Scores how likely a record is to be overlooked: a visibility index (how
//! findable the listing is), an undersubscription index (how thin the
//! applicant pool likely is), and a cross-category index (matches searchers
//! miss because the program straddles disciplines). The calculator is total:
//! every missing input has a documented neutral fallback.

use chrono::{DateTime, NaiveDate, Utc};

use crate::scoring::domain::{HiddenOpportunityScore, Opportunity, ScoreBreakdown, UserProfile};
use crate::scoring::tables::HiddenTables;

const VAGUE_TITLE_WORDS: [&str; 5] = ["various", "multiple", "miscellaneous", "other", "general"];
const TECHNICAL_TITLE_WORDS: [&str; 4] = ["advanced", "specialized", "innovative", "novel"];
const DISCOVERY_KEYWORDS: [&str; 10] = [
    "research",
    "development",
    "innovation",
    "technology",
    "science",
    "education",
    "training",
    "program",
    "project",
    "study",
];
const CATEGORY_KEYWORDS: [&str; 10] = [
    "health",
    "education",
    "technology",
    "environment",
    "energy",
    "agriculture",
    "transportation",
    "security",
    "economics",
    "social",
];
const INTERDISCIPLINARY_INDICATORS: [&str; 8] = [
    "interdisciplinary",
    "multidisciplinary",
    "cross-cutting",
    "integrated",
    "collaborative",
    "partnership",
    "consortium",
    "multi-sector",
];
const NOVEL_COMBINATIONS: [(&str, &str); 7] = [
    ("art", "technology"),
    ("social", "engineering"),
    ("health", "economics"),
    ("education", "manufacturing"),
    ("agriculture", "artificial intelligence"),
    ("environment", "business"),
    ("security", "social science"),
];

pub fn calculate(
    opportunity: &Opportunity,
    profile: Option<&UserProfile>,
    search_position: Option<usize>,
    as_of: DateTime<Utc>,
    tables: &HiddenTables,
) -> HiddenOpportunityScore {
    let text = searchable_text(opportunity);

    let (visibility_index, visibility) =
        visibility_index(opportunity, search_position, &text);
    let (undersubscription_index, undersubscription) =
        undersubscription_index(opportunity, as_of, tables);
    let (cross_index, cross_category) = cross_category_index(profile, &text);

    let hidden_score = tables.undersubscription_weight * undersubscription_index
        + tables.low_visibility_weight * (100.0 - visibility_index)
        + tables.cross_category_weight * cross_index;

    let classification = classify(visibility_index, undersubscription_index, cross_index);
    let discovery_potential = discovery_potential(&visibility, &undersubscription, &cross_category);

    HiddenOpportunityScore {
        opportunity_id: opportunity.opportunity_id.clone(),
        opportunity_title: opportunity.opportunity_title.clone(),
        hidden_score,
        visibility,
        undersubscription,
        cross_category,
        classification,
        discovery_potential,
    }
}

fn searchable_text(opportunity: &Opportunity) -> String {
    format!(
        "{} {}",
        opportunity.opportunity_title,
        opportunity
            .summary
            .summary_description
            .as_deref()
            .unwrap_or("")
    )
    .to_ascii_lowercase()
}

/// How findable the listing is. Low values mean the record is easy to miss,
/// so the breakdown value is inverted: higher = more hidden.
fn visibility_index(
    opportunity: &Opportunity,
    search_position: Option<usize>,
    text: &str,
) -> (f64, ScoreBreakdown) {
    let position_score = search_position
        .map(|pos| (pos as f64 * 10.0).min(100.0))
        .unwrap_or(50.0);

    let title = opportunity.opportunity_title.to_ascii_lowercase();
    let title_clarity = if VAGUE_TITLE_WORDS.iter().any(|w| title.contains(w)) {
        30.0
    } else if TECHNICAL_TITLE_WORDS.iter().any(|w| title.contains(w)) {
        60.0
    } else {
        70.0
    };

    let category = opportunity
        .category
        .as_deref()
        .unwrap_or("")
        .to_ascii_lowercase();
    let category_specificity = if ["general", "other", "miscellaneous"].contains(&category.as_str())
    {
        20.0
    } else if category.split_whitespace().count() > 3 {
        40.0
    } else {
        70.0
    };

    let keyword_hits = DISCOVERY_KEYWORDS.iter().filter(|kw| text.contains(*kw)).count();
    let keyword_density = (keyword_hits as f64 * 20.0).min(100.0);

    let index = 0.3 * position_score
        + 0.3 * title_clarity
        + 0.2 * category_specificity
        + 0.2 * keyword_density;

    let breakdown = ScoreBreakdown::new(
        100.0 - index,
        format!(
            "100 - (0.3 x {position_score:.0} position + 0.3 x {title_clarity:.0} title \
             + 0.2 x {category_specificity:.0} category + 0.2 x {keyword_density:.0} keywords)"
        ),
        if index < 40.0 {
            "Easily missed in typical searches"
        } else if index < 60.0 {
            "Moderately visible listing"
        } else {
            "Prominent, well-indexed listing"
        },
    )
    .with_component("search_position_score", position_score)
    .with_component("title_clarity", title_clarity)
    .with_component("category_specificity", category_specificity)
    .with_component("keyword_density", keyword_density);

    (index, breakdown)
}

/// How thin the applicant pool likely is, from funding ratios, agency
/// competition pressure, award size appeal, and deadline pressure.
fn undersubscription_index(
    opportunity: &Opportunity,
    as_of: DateTime<Utc>,
    tables: &HiddenTables,
) -> (f64, ScoreBreakdown) {
    let summary = &opportunity.summary;
    let awards = f64::from(summary.expected_number_of_awards.unwrap_or(1).max(1));

    let funding_ratio_score = match (summary.estimated_total_program_funding, summary.award_ceiling)
    {
        (Some(funding), Some(ceiling)) if funding > 0.0 && ceiling > 0.0 => {
            let implied_awards = funding / ceiling;
            if implied_awards > awards {
                (implied_awards / awards * 50.0).min(100.0)
            } else {
                30.0
            }
        }
        _ => 50.0,
    };

    let agency_score = tables
        .agency_competition_score
        .lookup(opportunity.agency_root());

    let size_score = match summary.award_ceiling {
        Some(ceiling) if ceiling < 50_000.0 => 70.0,
        Some(ceiling) if ceiling > 2_000_000.0 => 60.0,
        Some(ceiling) if (100_000.0..=500_000.0).contains(&ceiling) => 20.0,
        Some(_) => 40.0,
        None => 50.0,
    };

    let deadline_score = summary
        .close_date
        .as_deref()
        .and_then(parse_iso_prefix)
        .map(|deadline| {
            let days = (deadline - as_of.date_naive()).num_days();
            if days < 30 {
                80.0
            } else if days > 180 {
                30.0
            } else {
                50.0
            }
        })
        .unwrap_or(50.0);

    let index = 0.3 * funding_ratio_score
        + 0.3 * agency_score
        + 0.2 * size_score
        + 0.2 * deadline_score;

    let breakdown = ScoreBreakdown::new(
        index,
        format!(
            "0.3 x {funding_ratio_score:.0} funding ratio + 0.3 x {agency_score:.0} agency \
             + 0.2 x {size_score:.0} size + 0.2 x {deadline_score:.0} deadline"
        ),
        if index > 70.0 {
            "Likely undersubscribed relative to available funding"
        } else if index > 50.0 {
            "Possibly undersubscribed"
        } else {
            "Demand likely matches supply"
        },
    )
    .with_component("funding_ratio_score", funding_ratio_score)
    .with_component("agency_competition", agency_score)
    .with_component("award_size_appeal", size_score)
    .with_component("deadline_advantage", deadline_score);

    (index, breakdown)
}

/// Matches that discipline-scoped searches miss.
fn cross_category_index(profile: Option<&UserProfile>, text: &str) -> (f64, ScoreBreakdown) {
    let breadth_hits = CATEGORY_KEYWORDS.iter().filter(|kw| text.contains(*kw)).count();
    let breadth = match breadth_hits {
        n if n >= 3 => 80.0,
        2 => 60.0,
        _ => 30.0,
    };

    let indicator_hits = INTERDISCIPLINARY_INDICATORS
        .iter()
        .filter(|kw| text.contains(*kw))
        .count();
    let interdisciplinary = (indicator_hits as f64 * 30.0).min(100.0);

    let profile_alignment = match profile {
        None => 50.0,
        Some(profile) => {
            let relevant = profile
                .research_categories
                .iter()
                .filter(|category| text.contains(&category.to_ascii_lowercase()))
                .count();
            match relevant {
                n if n >= 2 => 80.0,
                1 => 40.0,
                _ => 20.0,
            }
        }
    };

    let novel_pairs = NOVEL_COMBINATIONS
        .iter()
        .filter(|(a, b)| text.contains(a) && text.contains(b))
        .count();
    let novelty = (novel_pairs as f64 * 20.0).min(80.0);

    let index =
        0.3 * breadth + 0.3 * interdisciplinary + 0.2 * profile_alignment + 0.2 * novelty;

    let breakdown = ScoreBreakdown::new(
        index,
        format!(
            "0.3 x {breadth:.0} breadth + 0.3 x {interdisciplinary:.0} indicators \
             + 0.2 x {profile_alignment:.0} profile + 0.2 x {novelty:.0} novelty"
        ),
        if index > 70.0 {
            "Strong cross-disciplinary signals"
        } else if index > 50.0 {
            "Some cross-disciplinary signals"
        } else {
            "Single-discipline program"
        },
    )
    .with_component("category_breadth", breadth)
    .with_component("interdisciplinary", interdisciplinary)
    .with_component("profile_alignment", profile_alignment)
    .with_component("novel_combination", novelty);

    (index, breakdown)
}

fn parse_iso_prefix(raw: &str) -> Option<NaiveDate> {
    let prefix = raw.trim().get(..10)?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

fn classify(visibility: f64, undersubscription: f64, cross: f64) -> String {
    if visibility < 40.0 {
        if undersubscription > 60.0 {
            "Hidden Gem (Low Visibility + Undersubscribed)".to_string()
        } else {
            "Overlooked Opportunity (Low Visibility)".to_string()
        }
    } else if undersubscription > 70.0 {
        "Niche Opportunity (Undersubscribed)".to_string()
    } else if cross > 70.0 {
        "Interdisciplinary Opportunity (Cross-Category Match)".to_string()
    } else if visibility < 60.0 && undersubscription > 50.0 && cross > 50.0 {
        "Multi-Factor Hidden Opportunity".to_string()
    } else {
        "Potential Hidden Opportunity".to_string()
    }
}

fn discovery_potential(
    visibility: &ScoreBreakdown,
    undersubscription: &ScoreBreakdown,
    cross: &ScoreBreakdown,
) -> String {
    let number = |breakdown: &ScoreBreakdown, name: &str| -> f64 {
        match breakdown.components.get(name) {
            Some(crate::scoring::domain::ComponentValue::Number(n)) => *n,
            _ => 0.0,
        }
    };

    let mut reasons = Vec::new();
    if number(visibility, "title_clarity") < 40.0 {
        reasons.push("vague title hides the program from keyword searches");
    }
    if number(visibility, "category_specificity") < 40.0 {
        reasons.push("broad category placement buries it in listings");
    }
    if number(undersubscription, "award_size_appeal") > 60.0 {
        reasons.push("award size attracts fewer applicants than the funding supports");
    }
    if number(undersubscription, "deadline_advantage") > 70.0 {
        reasons.push("imminent deadline thins the late applicant pool");
    }
    if number(undersubscription, "agency_competition") > 60.0 {
        reasons.push("agency historically draws light competition");
    }
    if number(cross, "interdisciplinary") > 60.0 {
        reasons.push("interdisciplinary scope falls outside standard search filters");
    }
    if number(cross, "novel_combination") > 50.0 {
        reasons.push("unusual field combination rarely searched together");
    }
    if reasons.is_empty() {
        reasons.push("multiple moderate factors suggest limited applicant awareness");
    }

    format!("Identified due to: {}", reasons.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::domain::{ComponentValue, OpportunitySummary};
    use crate::scoring::tables::IndustryTables;
    use chrono::TimeZone;

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 10, 0, 0, 0).unwrap()
    }

    fn component(breakdown: &ScoreBreakdown, name: &str) -> f64 {
        match breakdown.components.get(name) {
            Some(ComponentValue::Number(n)) => *n,
            other => panic!("component {name} missing or non-numeric: {other:?}"),
        }
    }

    fn vague_record() -> Opportunity {
        Opportunity {
            opportunity_id: "OPP-9".to_string(),
            opportunity_title: "Various Other Activities".to_string(),
            agency_code: Some("USDA".to_string()),
            category: Some("Other".to_string()),
            summary: OpportunitySummary {
                award_ceiling: Some(40_000.0),
                expected_number_of_awards: Some(1),
                estimated_total_program_funding: Some(400_000.0),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn vague_undersubscribed_record_is_a_hidden_gem() {
        let tables = IndustryTables::default();
        let score = calculate(&vague_record(), None, Some(9), as_of(), &tables.hidden);

        // position 90, title 30, category 20, keywords 0 -> visibility 40 is
        // not < 40; push the record deeper in the results.
        let deep = calculate(&vague_record(), None, Some(2), as_of(), &tables.hidden);
        assert_eq!(component(&deep.visibility, "title_clarity"), 30.0);
        assert_eq!(component(&deep.visibility, "category_specificity"), 20.0);

        // position 20: 0.3x20 + 0.3x30 + 0.2x20 + 0.2x0 = 19 -> low visibility.
        // undersubscription: 0.3x100 funding + 0.3x65 USDA + 0.2x70 size
        // + 0.2x50 deadline = 73.5 -> gem.
        assert_eq!(deep.classification, "Hidden Gem (Low Visibility + Undersubscribed)");
        assert!(deep.hidden_score > score.hidden_score);
        assert!(deep
            .discovery_potential
            .starts_with("Identified due to: vague title"));
    }

    #[test]
    fn funding_ratio_flags_more_awards_than_announced() {
        let tables = IndustryTables::default();
        let record = vague_record();
        // 400k funding / 40k ceiling = 10 implied awards vs 1 announced.
        let score = calculate(&record, None, None, as_of(), &tables.hidden);
        assert_eq!(component(&score.undersubscription, "funding_ratio_score"), 100.0);
    }

    #[test]
    fn interdisciplinary_text_raises_cross_category_index() {
        let tables = IndustryTables::default();
        let mut record = vague_record();
        record.opportunity_title = "Health Technology Initiative".to_string();
        record.summary.summary_description = Some(
            "Interdisciplinary collaborative consortium for health economics and education research"
                .to_string(),
        );

        let score = calculate(&record, None, None, as_of(), &tables.hidden);
        assert_eq!(component(&score.cross_category, "category_breadth"), 80.0);
        assert!(component(&score.cross_category, "interdisciplinary") >= 60.0);
        assert_eq!(component(&score.cross_category, "novel_combination"), 20.0);
    }

    #[test]
    fn profile_alignment_uses_research_categories() {
        let tables = IndustryTables::default();
        let mut record = vague_record();
        record.summary.summary_description =
            Some("health and education outcomes research".to_string());
        let profile = UserProfile {
            research_categories: vec!["Health".to_string(), "Education".to_string()],
            ..Default::default()
        };
        let score = calculate(&record, Some(&profile), None, as_of(), &tables.hidden);
        assert_eq!(component(&score.cross_category, "profile_alignment"), 80.0);

        let unaligned = UserProfile {
            research_categories: vec!["Astrophysics".to_string()],
            ..Default::default()
        };
        let score = calculate(&record, Some(&unaligned), None, as_of(), &tables.hidden);
        assert_eq!(component(&score.cross_category, "profile_alignment"), 20.0);
    }

    #[test]
    fn imminent_deadline_scores_as_an_advantage() {
        let tables = IndustryTables::default();
        let mut record = vague_record();
        record.summary.close_date = Some("2025-02-25".to_string());
        let score = calculate(&record, None, None, as_of(), &tables.hidden);
        assert_eq!(component(&score.undersubscription, "deadline_advantage"), 80.0);

        record.summary.close_date = Some("2025-12-31".to_string());
        let score = calculate(&record, None, None, as_of(), &tables.hidden);
        assert_eq!(component(&score.undersubscription, "deadline_advantage"), 30.0);

        // Multibyte garbage around byte 10 is unparseable, never a panic.
        record.summary.close_date = Some("2025-12-3é".to_string());
        let score = calculate(&record, None, None, as_of(), &tables.hidden);
        assert_eq!(component(&score.undersubscription, "deadline_advantage"), 50.0);
    }

    #[test]
    fn prominent_listing_is_only_potential() {
        let tables = IndustryTables::default();
        let record = Opportunity {
            opportunity_id: "OPP-10".to_string(),
            opportunity_title: "Cancer Research Program".to_string(),
            agency_code: Some("NIH".to_string()),
            category: Some("Health".to_string()),
            summary: OpportunitySummary {
                award_ceiling: Some(250_000.0),
                expected_number_of_awards: Some(10),
                ..Default::default()
            },
            ..Default::default()
        };
        let score = calculate(&record, None, Some(1), as_of(), &tables.hidden);
        assert_eq!(score.classification, "Potential Hidden Opportunity");
    }

    #[test]
    fn fallback_reason_when_nothing_stands_out() {
        let tables = IndustryTables::default();
        let record = Opportunity {
            opportunity_id: "OPP-11".to_string(),
            opportunity_title: "Engineering Fellowship".to_string(),
            agency_code: Some("NSF".to_string()),
            category: Some("Science".to_string()),
            summary: OpportunitySummary {
                award_ceiling: Some(250_000.0),
                expected_number_of_awards: Some(5),
                ..Default::default()
            },
            ..Default::default()
        };
        let score = calculate(&record, None, Some(3), as_of(), &tables.hidden);
        assert_eq!(
            score.discovery_potential,
            "Identified due to: multiple moderate factors suggest limited applicant awareness"
        );
    }
}

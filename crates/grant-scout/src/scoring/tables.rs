//! Benchmark tables driving the metric calculators.
//!
//! Every multiplier the calculators consult lives here so alternate table
//! sets can be injected for tests or recalibration. `Default` carries the
//! published federal-grant heuristics. Tier tables use inclusive upper
//! bounds; lookups fall through to the listed default when the agency or
//! category is unrecognized.

use std::collections::BTreeMap;

/// Amount tiers: `(inclusive_upper_bound, value)`, checked in order, with a
/// final value for anything above the last bound.
#[derive(Debug, Clone, PartialEq)]
pub struct AmountTiers {
    bounds: Vec<(f64, f64)>,
    above: f64,
}

impl AmountTiers {
    pub fn new(bounds: Vec<(f64, f64)>, above: f64) -> Self {
        Self { bounds, above }
    }

    pub fn lookup(&self, amount: f64) -> f64 {
        for (bound, value) in &self.bounds {
            if amount <= *bound {
                return *value;
            }
        }
        self.above
    }
}

/// Agency-keyed multiplier map with a fallback for unlisted agencies.
#[derive(Debug, Clone, PartialEq)]
pub struct AgencyTable {
    values: BTreeMap<String, f64>,
    default: f64,
}

impl AgencyTable {
    pub fn new(pairs: &[(&str, f64)], default: f64) -> Self {
        Self {
            values: pairs
                .iter()
                .map(|(agency, value)| (agency.to_string(), *value))
                .collect(),
            default,
        }
    }

    /// Look up by top-level agency code. `None` and unlisted codes both get
    /// the default.
    pub fn lookup(&self, agency_root: Option<&str>) -> f64 {
        agency_root
            .and_then(|root| self.values.get(&root.to_ascii_uppercase()))
            .copied()
            .unwrap_or(self.default)
    }
}

/// Ordered keyword multipliers matched case-insensitively as substrings.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordTable {
    entries: Vec<(String, f64)>,
    default: f64,
}

impl KeywordTable {
    pub fn new(pairs: &[(&str, f64)], default: f64) -> Self {
        Self {
            entries: pairs
                .iter()
                .map(|(keyword, value)| (keyword.to_ascii_lowercase(), *value))
                .collect(),
            default,
        }
    }

    /// First entry whose keyword appears in `text` wins.
    pub fn lookup(&self, text: Option<&str>) -> f64 {
        let Some(text) = text else {
            return self.default;
        };
        let haystack = text.to_ascii_lowercase();
        self.entries
            .iter()
            .find(|(keyword, _)| haystack.contains(keyword))
            .map(|(_, value)| *value)
            .unwrap_or(self.default)
    }
}

/// Competition-index tables.
#[derive(Debug, Clone, PartialEq)]
pub struct CompetitionTables {
    /// Estimated applicant pool by award ceiling.
    pub applicant_tiers: AmountTiers,
    pub minimum_applicants: f64,
    pub agency_applicant_factor: AgencyTable,
    pub category_applicant_factor: KeywordTable,
    pub agency_competition_factor: AgencyTable,
    /// Mean and standard deviation of weighted competition indexes used for
    /// the percentile estimate.
    pub index_mean: f64,
    pub index_stddev: f64,
    /// Thresholds separating low / moderate / high competition.
    pub low_index: f64,
    pub high_index: f64,
    /// Published average indexes quoted in benchmark strings.
    pub nih_average_index: f64,
    pub nsf_average_index: f64,
}

/// Success-probability tables.
#[derive(Debug, Clone, PartialEq)]
pub struct SuccessTables {
    pub agency_success_rate: AgencyTable,
    pub baseline_success_rate: f64,
    /// Applicant-type synonyms accepted by eligibility matching.
    pub applicant_type_synonyms: BTreeMap<String, Vec<String>>,
    pub minimum_probability: f64,
    pub maximum_probability: f64,
}

/// Return-on-investment tables.
#[derive(Debug, Clone, PartialEq)]
pub struct RoiTables {
    /// Proposal preparation hours by award ceiling.
    pub effort_tiers: AmountTiers,
    pub agency_complexity_factor: AgencyTable,
    pub default_hourly_rate: f64,
    pub agency_prestige_factor: AgencyTable,
    pub strategic_floor: f64,
    pub strategic_ceiling: f64,
}

/// Deadline and preparation-window tables.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingTables {
    /// Required preparation days by award ceiling.
    pub preparation_tiers: AmountTiers,
    pub agency_preparation_factor: AgencyTable,
    pub agency_resubmission_factor: AgencyTable,
    pub default_concurrent_capacity: u32,
}

/// Hidden-opportunity tables.
#[derive(Debug, Clone, PartialEq)]
pub struct HiddenTables {
    /// Relative competition pressure per agency; higher means less contested.
    pub agency_competition_score: AgencyTable,
    pub undersubscription_weight: f64,
    pub low_visibility_weight: f64,
    pub cross_category_weight: f64,
    /// Minimum hidden score for a record to surface as a gem.
    pub gem_threshold: f64,
}

/// Complete, immutable table set injected into the scoring engine.
#[derive(Debug, Clone, PartialEq)]
pub struct IndustryTables {
    pub competition: CompetitionTables,
    pub success: SuccessTables,
    pub roi: RoiTables,
    pub timing: TimingTables,
    pub hidden: HiddenTables,
}

impl Default for IndustryTables {
    fn default() -> Self {
        Self {
            competition: CompetitionTables {
                applicant_tiers: AmountTiers::new(
                    vec![
                        (49_999.0, 20.0),
                        (100_000.0, 35.0),
                        (500_000.0, 60.0),
                        (1_000_000.0, 100.0),
                    ],
                    150.0,
                ),
                minimum_applicants: 5.0,
                agency_applicant_factor: AgencyTable::new(
                    &[
                        ("NIH", 1.2),
                        ("NSF", 1.0),
                        ("DOE", 0.8),
                        ("DOD", 0.7),
                        ("NASA", 0.9),
                        ("EPA", 0.8),
                        ("USDA", 0.7),
                    ],
                    1.0,
                ),
                category_applicant_factor: KeywordTable::new(
                    &[
                        ("health", 1.3),
                        ("science", 1.2),
                        ("technology", 1.2),
                        ("education", 1.1),
                        ("environment", 1.0),
                        ("agriculture", 0.8),
                        ("transportation", 0.7),
                    ],
                    1.0,
                ),
                agency_competition_factor: AgencyTable::new(
                    &[
                        ("NIH", 1.2),
                        ("NSF", 1.1),
                        ("DOE", 0.9),
                        ("DOD", 0.8),
                        ("NASA", 1.0),
                        ("EPA", 0.9),
                        ("USDA", 0.8),
                    ],
                    1.0,
                ),
                index_mean: 25.0,
                index_stddev: 15.0,
                low_index: 20.0,
                high_index: 60.0,
                nih_average_index: 25.0,
                nsf_average_index: 40.0,
            },
            success: SuccessTables {
                agency_success_rate: AgencyTable::new(
                    &[
                        ("NIH", 0.20),
                        ("NSF", 0.25),
                        ("DOE", 0.30),
                        ("DOD", 0.35),
                        ("NASA", 0.28),
                        ("EPA", 0.32),
                        ("USDA", 0.35),
                    ],
                    0.25,
                ),
                baseline_success_rate: 0.20,
                applicant_type_synonyms: [
                    (
                        "university",
                        vec!["university", "college", "academic", "education"],
                    ),
                    ("nonprofit", vec!["nonprofit", "non-profit", "foundation"]),
                    (
                        "government",
                        vec!["government", "federal", "state", "local"],
                    ),
                    (
                        "industry",
                        vec!["industry", "business", "commercial", "for-profit"],
                    ),
                    ("individual", vec!["individual", "person", "researcher"]),
                ]
                .into_iter()
                .map(|(k, v)| {
                    (
                        k.to_string(),
                        v.into_iter().map(str::to_string).collect(),
                    )
                })
                .collect(),
                minimum_probability: 1.0,
                maximum_probability: 90.0,
            },
            roi: RoiTables {
                effort_tiers: AmountTiers::new(
                    vec![
                        (49_999.0, 40.0),
                        (100_000.0, 60.0),
                        (500_000.0, 100.0),
                        (1_000_000.0, 150.0),
                    ],
                    200.0,
                ),
                agency_complexity_factor: AgencyTable::new(
                    &[
                        ("NIH", 1.5),
                        ("NSF", 1.3),
                        ("DOE", 1.4),
                        ("DOD", 1.6),
                        ("NASA", 1.4),
                        ("EPA", 1.2),
                        ("USDA", 1.1),
                    ],
                    1.2,
                ),
                default_hourly_rate: 75.0,
                agency_prestige_factor: AgencyTable::new(
                    &[
                        ("NIH", 1.3),
                        ("NSF", 1.2),
                        ("DOE", 1.1),
                        ("NASA", 1.2),
                        ("DOD", 1.1),
                        ("EPA", 1.0),
                        ("USDA", 1.0),
                    ],
                    1.0,
                ),
                strategic_floor: 0.8,
                strategic_ceiling: 2.0,
            },
            timing: TimingTables {
                preparation_tiers: AmountTiers::new(
                    vec![(100_000.0, 45.0), (1_000_000.0, 75.0)],
                    120.0,
                ),
                agency_preparation_factor: AgencyTable::new(
                    &[
                        ("NIH", 1.3),
                        ("NSF", 1.1),
                        ("DOE", 1.2),
                        ("DOD", 1.4),
                        ("NASA", 1.2),
                        ("EPA", 1.1),
                        ("USDA", 1.0),
                    ],
                    1.1,
                ),
                agency_resubmission_factor: AgencyTable::new(
                    &[
                        ("NIH", 1.2),
                        ("NSF", 1.1),
                        ("DOE", 1.0),
                        ("DOD", 0.9),
                        ("NASA", 0.9),
                        ("EPA", 1.0),
                        ("USDA", 1.1),
                    ],
                    1.0,
                ),
                default_concurrent_capacity: 3,
            },
            hidden: HiddenTables {
                agency_competition_score: AgencyTable::new(
                    &[
                        ("NIH", 20.0),
                        ("NSF", 25.0),
                        ("DOE", 40.0),
                        ("NASA", 35.0),
                        ("DOD", 50.0),
                        ("EPA", 60.0),
                        ("USDA", 65.0),
                        ("DOT", 70.0),
                        ("HHS", 30.0),
                    ],
                    50.0,
                ),
                undersubscription_weight: 0.40,
                low_visibility_weight: 0.35,
                cross_category_weight: 0.25,
                gem_threshold: 40.0,
            },
        }
    }
}

impl IndustryTables {
    /// The hidden-score weights must form a convex combination.
    pub fn validate(&self) -> Result<(), String> {
        let sum = self.hidden.undersubscription_weight
            + self.hidden.low_visibility_weight
            + self.hidden.cross_category_weight;
        if (sum - 1.0).abs() > 1e-9 {
            return Err(format!("hidden score weights sum to {sum}, expected 1.0"));
        }
        Ok(())
    }
}

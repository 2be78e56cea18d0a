use crate::infra::parse_date;
use chrono::{NaiveDate, TimeZone, Utc};
use clap::Args;
use grant_scout::error::AppError;
use grant_scout::scoring::{
    GrantScore, HiddenOpportunityScore, IndustryTables, Opportunity, ScoringContext,
    ScoringEngine, UserProfile,
};
use serde_json::Value;
use std::path::PathBuf;

#[derive(Args, Debug, Default)]
pub(crate) struct ScoreArgs {
    /// JSON file holding opportunity records: either a plain array or a
    /// search response with a top-level "data" array.
    #[arg(long)]
    pub(crate) input: PathBuf,
    /// Optional applicant profile JSON file.
    #[arg(long)]
    pub(crate) profile: Option<PathBuf>,
    /// Reference date for deadline math (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) as_of: Option<NaiveDate>,
    /// Print at most this many scored opportunities.
    #[arg(long, default_value_t = 10)]
    pub(crate) top: usize,
}

pub(crate) fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let raw = std::fs::read_to_string(&args.input)?;
    let parsed: Value = serde_json::from_str(&raw)
        .map_err(|err| AppError::InvalidInput(format!("input is not valid JSON: {err}")))?;
    let records = match &parsed {
        Value::Array(records) => records.clone(),
        Value::Object(map) => map
            .get("data")
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| {
                AppError::InvalidInput("expected an array or an object with 'data'".to_string())
            })?,
        _ => {
            return Err(AppError::InvalidInput(
                "expected an array or an object with 'data'".to_string(),
            ))
        }
    };

    let opportunities: Vec<Opportunity> = records
        .into_iter()
        .map(serde_json::from_value)
        .collect::<Result<_, _>>()
        .map_err(|err| AppError::InvalidInput(format!("bad opportunity record: {err}")))?;

    let profile: Option<UserProfile> = match &args.profile {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            Some(serde_json::from_str(&raw).map_err(|err| {
                AppError::InvalidInput(format!("bad profile file: {err}"))
            })?)
        }
        None => None,
    };

    let as_of = match args.as_of {
        Some(date) => Utc
            .from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default()),
        None => Utc::now(),
    };

    let engine = ScoringEngine::new(IndustryTables::default());
    let mut context = ScoringContext::new(as_of);
    context.profile = profile;
    let result = engine.score_batch(&opportunities, &context);

    println!(
        "Scored {} of {} opportunities (as of {})",
        result.scores.len(),
        result.scores.len() + result.skipped.len(),
        as_of.format("%Y-%m-%d")
    );

    for score in result.scores.iter().take(args.top) {
        print_score(score);
    }

    if !result.hidden_gems.is_empty() {
        println!("\nHidden opportunities");
        for gem in &result.hidden_gems {
            print_hidden(gem);
        }
    }

    for skipped in &result.skipped {
        println!("\nSkipped record {}: {}", skipped.index, skipped.reason);
    }

    Ok(())
}

fn print_score(score: &GrantScore) {
    println!("\n{} ({})", score.opportunity_title, score.opportunity_id);
    if let Some(agency) = &score.agency_code {
        println!("  Agency: {agency}");
    }
    println!("  Total score: {:.1} / 100", score.total_score);
    println!("  Recommendation: {}", score.recommendation);
    for (label, breakdown) in [
        ("Technical fit", &score.technical_fit),
        ("Competition", &score.competition),
        ("ROI", &score.roi),
        ("Timing", &score.timing),
        ("Success probability", &score.success_probability),
    ] {
        println!(
            "  - {label}: {:.1} ({})",
            breakdown.value, breakdown.interpretation
        );
    }
    if !score.degraded_dimensions.is_empty() {
        println!(
            "  Degraded dimensions: {}",
            score.degraded_dimensions.join(", ")
        );
    }
}

fn print_hidden(gem: &HiddenOpportunityScore) {
    println!(
        "- {} ({}): {:.1} | {}",
        gem.opportunity_title, gem.opportunity_id, gem.hidden_score, gem.classification
    );
    println!("  {}", gem.discovery_potential);
}

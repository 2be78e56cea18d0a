//! Opportunity scoring: domain model, metric calculators, engine, and the
//! service/router layer that hosts them.

pub mod domain;
pub mod engine;
pub mod metrics;
pub mod router;
pub mod service;
pub mod store;
pub mod tables;

pub use domain::{
    BatchScoreResult, ComponentValue, GrantScore, HiddenOpportunityScore, Opportunity,
    OpportunityStatus, OpportunitySummary, ScoreBreakdown, ScoringWeights, UserProfile,
};
pub use engine::{ScoringContext, ScoringEngine, ScoringError};
pub use metrics::Calculation;
pub use router::scoring_router;
pub use service::{ScoringService, ServiceError};
pub use store::{ScoreRepository, ScoringSession, SessionStats, StoreError, StoredScore};
pub use tables::IndustryTables;

#[cfg(test)]
mod tests;

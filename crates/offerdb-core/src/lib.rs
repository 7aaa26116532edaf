//! Domain types and configuration shared across the offerdb workspace.

mod app_config;
pub mod config;
pub mod deals;
pub mod fingerprint;
pub mod rules;
pub mod sources;

use thiserror::Error;

pub use app_config::{AppConfig, Environment, ScanWindow};
pub use config::{load_app_config, load_app_config_from_env};
pub use deals::{
    BatchMember, BatchStatus, CandidateDraft, CandidateStatus, Category, DealDetails,
    DiscountType, NewRawCandidate, ProcessingBatch, QualityTier, RatedBy, Rating, RawCandidate,
    StoredRating, StructuredDeal,
};
pub use fingerprint::fingerprint;
pub use rules::{load_rules, CategoryKeywords, RulesFile, ScoringRules};
pub use sources::{load_sources, RenderMode, SourceConfig, SourceRecord, SourcesFile};

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid {kind}: {value}")]
    InvalidEnumValue { kind: &'static str, value: String },

    #[error("illegal status transition: {from} -> {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read {path}: {source}")]
    FileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    FileParse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("config validation failed: {0}")]
    Validation(String),
}

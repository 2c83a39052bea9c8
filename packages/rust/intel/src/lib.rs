//! Threat-intelligence lookups for free-text chat messages.
//!
//! This crate provides:
//! - [`entities`]: finds an IP, URL, or domain mentioned in a message
//! - [`reputation`]: queries VirusTotal and AbuseIPDB for those entities
//!   and turns every outcome, including failures, into evidence

pub mod entities;
pub mod reputation;

pub use entities::{DetectedEntities, Entity, EntityKind, detect_entities};
pub use reputation::{
    AbuseIpDbClient, AnalysisStats, ReputationBackend, ReputationGateway, ReputationResult,
    ReputationSignal, ReputationVerdict, Source, VirusTotalClient, url_identifier,
};

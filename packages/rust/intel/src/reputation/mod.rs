//! Reputation lookups against external threat-intelligence backends.
//!
//! Every query returns a [`ReputationResult`]; transport failures,
//! non-success statuses and missing credentials are all folded into that
//! value so callers never have to handle an error path.

mod abuseipdb;
mod virustotal;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use cybvector_shared::{Credentials, CybVectorError, Evidence, ReputationConfig, Result};

use crate::entities::{DetectedEntities, Entity, EntityKind};

pub use abuseipdb::AbuseIpDbClient;
pub use virustotal::{VirusTotalClient, url_identifier};

/// User-Agent string for lookup requests.
const USER_AGENT: &str = concat!("CybVector/", env!("CARGO_PKG_VERSION"));

/// Evidence labels, one per kind of report.
pub const VIRUSTOTAL_IP_LABEL: &str = "virustotal_ip_report";
pub const ABUSEIPDB_LABEL: &str = "abuseipdb_report";
pub const VIRUSTOTAL_URL_LABEL: &str = "virustotal_url_report";
pub const VIRUSTOTAL_DOMAIN_LABEL: &str = "virustotal_domain_report";

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Which backend produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Source {
    VirusTotal,
    #[serde(rename = "AbuseIPDB")]
    AbuseIpDb,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VirusTotal => f.write_str("VirusTotal"),
            Self::AbuseIpDb => f.write_str("AbuseIPDB"),
        }
    }
}

/// VirusTotal `last_analysis_stats`: engine verdict tallies.
///
/// A tally VirusTotal did not send stays `None` and serializes as `null`.
/// Keys beyond the five common ones (`failure`, `type-unsupported`, ...)
/// are carried through unchanged in `other`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct AnalysisStats {
    #[serde(default)]
    pub harmless: Option<u64>,
    #[serde(default)]
    pub malicious: Option<u64>,
    #[serde(default)]
    pub suspicious: Option<u64>,
    #[serde(default)]
    pub undetected: Option<u64>,
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

/// Backend-specific reputation fields. Absent fields stay `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ReputationSignal {
    VirusTotal {
        reputation: Option<i64>,
        last_analysis_stats: Option<AnalysisStats>,
    },
    AbuseIpDb {
        abuse_confidence_score: Option<u32>,
        total_reports: Option<u64>,
    },
}

/// A successful lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReputationVerdict {
    pub source: Source,
    #[serde(rename = "type")]
    pub entity_type: EntityKind,
    pub value: String,
    #[serde(flatten)]
    pub signal: ReputationSignal,
}

/// Outcome of one lookup against one backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReputationResult {
    Ok(ReputationVerdict),
    /// Transport failure, non-success status, or unreadable body.
    Err { source: Source, error: String },
    /// No credential was configured, so no request was made.
    Unconfigured { source: Source },
}

impl ReputationResult {
    pub fn source(&self) -> Source {
        match self {
            Self::Ok(verdict) => verdict.source,
            Self::Err { source, .. } | Self::Unconfigured { source } => *source,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    /// Fold a backend call into a result, logging failures.
    pub(crate) fn from_outcome(
        source: Source,
        entity: &Entity,
        outcome: Result<ReputationVerdict>,
    ) -> Self {
        match outcome {
            Ok(verdict) => Self::Ok(verdict),
            Err(e) => {
                warn!(%source, kind = entity.kind.as_str(), error = %e, "reputation lookup failed");
                Self::Err {
                    source,
                    error: e.detail(),
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Backend trait
// ---------------------------------------------------------------------------

/// A reputation service that can be asked about an entity.
///
/// Implementations must not fail: every outcome is a [`ReputationResult`].
#[async_trait]
pub trait ReputationBackend: Send + Sync {
    fn source(&self) -> Source;

    async fn lookup(&self, entity: &Entity) -> ReputationResult;
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// Uniform entry point for IP, domain, and URL reputation queries.
#[derive(Clone)]
pub struct ReputationGateway {
    virustotal: Arc<dyn ReputationBackend>,
    abuseipdb: Arc<dyn ReputationBackend>,
}

impl ReputationGateway {
    pub fn new(virustotal: Arc<dyn ReputationBackend>, abuseipdb: Arc<dyn ReputationBackend>) -> Self {
        Self {
            virustotal,
            abuseipdb,
        }
    }

    /// Build HTTP clients for both backends from config and resolved keys.
    pub fn from_config(config: &ReputationConfig, credentials: &Credentials) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let virustotal =
            VirusTotalClient::new(&config.virustotal, &credentials.virustotal, timeout)?;
        let abuseipdb = AbuseIpDbClient::new(
            &config.abuseipdb,
            &credentials.abuseipdb,
            timeout,
            config.abuse_max_age_days,
        )?;
        Ok(Self::new(Arc::new(virustotal), Arc::new(abuseipdb)))
    }

    /// Query both IP backends concurrently. Results are returned separately,
    /// VirusTotal first.
    #[instrument(skip(self))]
    pub async fn check_ip(&self, ip: &str) -> (ReputationResult, ReputationResult) {
        let entity = Entity::ip(ip);
        tokio::join!(self.virustotal.lookup(&entity), self.abuseipdb.lookup(&entity))
    }

    #[instrument(skip(self))]
    pub async fn check_domain(&self, domain: &str) -> ReputationResult {
        self.virustotal.lookup(&Entity::domain(domain)).await
    }

    #[instrument(skip(self))]
    pub async fn check_url(&self, url: &str) -> ReputationResult {
        self.virustotal.lookup(&Entity::url(url)).await
    }

    /// Look up everything detected in one message and collect the evidence.
    ///
    /// A URL takes precedence over a domain (only one of them is queried);
    /// an IP is always queried alongside whichever of those applies.
    #[instrument(skip_all, fields(ip = ?entities.ip, url = ?entities.url, domain = ?entities.domain))]
    pub async fn investigate(&self, entities: &DetectedEntities) -> Evidence {
        let ip_lookup = async {
            match &entities.ip {
                Some(ip) => Some(self.check_ip(ip).await),
                None => None,
            }
        };
        let site_lookup = async {
            if let Some(url) = &entities.url {
                Some((VIRUSTOTAL_URL_LABEL, self.check_url(url).await))
            } else if let Some(domain) = &entities.domain {
                Some((VIRUSTOTAL_DOMAIN_LABEL, self.check_domain(domain).await))
            } else {
                None
            }
        };

        let (ip_results, site_result) = tokio::join!(ip_lookup, site_lookup);

        let mut evidence = Evidence::new();
        if let Some((vt, abuse)) = ip_results {
            evidence.push(VIRUSTOTAL_IP_LABEL, &vt);
            evidence.push(ABUSEIPDB_LABEL, &abuse);
        }
        if let Some((label, result)) = site_result {
            evidence.push(label, &result);
        }

        debug!(items = evidence.len(), "investigation complete");
        evidence
    }
}

// ---------------------------------------------------------------------------
// HTTP helpers
// ---------------------------------------------------------------------------

/// Build a reqwest client with the lookup timeout.
fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| CybVectorError::Network(format!("failed to build HTTP client: {e}")))
}

/// Send a request and decode a JSON body, mapping non-success statuses to
/// [`CybVectorError::Backend`] with the raw body attached.
async fn send_json<T: DeserializeOwned>(source: Source, request: RequestBuilder) -> Result<T> {
    let response = request
        .send()
        .await
        .map_err(|e| CybVectorError::Network(format!("{source}: {e}")))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| CybVectorError::Network(format!("{source}: failed to read body: {e}")))?;

    if !status.is_success() {
        return Err(CybVectorError::Backend {
            source_name: source.to_string(),
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str(&body)
        .map_err(|e| CybVectorError::parse(format!("{source}: unexpected response body: {e}")))
}

/// Join an API root and a path without doubling slashes.
fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    /// Backend double that records what it was asked and answers `Ok`.
    struct RecordingBackend {
        source: Source,
        calls: Mutex<Vec<Entity>>,
    }

    impl RecordingBackend {
        fn new(source: Source) -> Arc<Self> {
            Arc::new(Self {
                source,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<Entity> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReputationBackend for RecordingBackend {
        fn source(&self) -> Source {
            self.source
        }

        async fn lookup(&self, entity: &Entity) -> ReputationResult {
            self.calls.lock().unwrap().push(entity.clone());
            ReputationResult::Ok(ReputationVerdict {
                source: self.source,
                entity_type: entity.kind,
                value: entity.value.clone(),
                signal: ReputationSignal::VirusTotal {
                    reputation: Some(0),
                    last_analysis_stats: None,
                },
            })
        }
    }

    fn gateway() -> (ReputationGateway, Arc<RecordingBackend>, Arc<RecordingBackend>) {
        let vt = RecordingBackend::new(Source::VirusTotal);
        let abuse = RecordingBackend::new(Source::AbuseIpDb);
        let gw = ReputationGateway::new(vt.clone(), abuse.clone());
        (gw, vt, abuse)
    }

    fn labels(evidence: &Evidence) -> Vec<&str> {
        evidence.items().iter().map(|i| i.label.as_str()).collect()
    }

    #[tokio::test]
    async fn ip_queries_both_backends() {
        let (gw, vt, abuse) = gateway();
        let entities = DetectedEntities {
            ip: Some("8.8.8.8".into()),
            ..Default::default()
        };

        let evidence = gw.investigate(&entities).await;

        assert_eq!(labels(&evidence), vec![VIRUSTOTAL_IP_LABEL, ABUSEIPDB_LABEL]);
        assert_eq!(vt.calls(), vec![Entity::ip("8.8.8.8")]);
        assert_eq!(abuse.calls(), vec![Entity::ip("8.8.8.8")]);
    }

    #[tokio::test]
    async fn url_wins_over_domain() {
        let (gw, vt, abuse) = gateway();
        let entities = DetectedEntities {
            ip: None,
            url: Some("https://a.example.com/x".into()),
            domain: Some("other.org".into()),
        };

        let evidence = gw.investigate(&entities).await;

        assert_eq!(labels(&evidence), vec![VIRUSTOTAL_URL_LABEL]);
        assert_eq!(vt.calls(), vec![Entity::url("https://a.example.com/x")]);
        assert!(abuse.calls().is_empty());
    }

    #[tokio::test]
    async fn ip_and_domain_both_run() {
        let (gw, vt, _abuse) = gateway();
        let entities = DetectedEntities {
            ip: Some("1.2.3.4".into()),
            url: None,
            domain: Some("example.org".into()),
        };

        let evidence = gw.investigate(&entities).await;

        assert_eq!(
            labels(&evidence),
            vec![VIRUSTOTAL_IP_LABEL, ABUSEIPDB_LABEL, VIRUSTOTAL_DOMAIN_LABEL]
        );
        assert_eq!(vt.calls().len(), 2);
    }

    #[tokio::test]
    async fn nothing_detected_yields_no_evidence() {
        let (gw, vt, abuse) = gateway();
        let evidence = gw.investigate(&DetectedEntities::default()).await;
        assert!(evidence.is_empty());
        assert!(vt.calls().is_empty());
        assert!(abuse.calls().is_empty());
    }

    #[test]
    fn results_serialize_with_status_tag() {
        let ok = ReputationResult::Ok(ReputationVerdict {
            source: Source::AbuseIpDb,
            entity_type: EntityKind::Ip,
            value: "8.8.8.8".into(),
            signal: ReputationSignal::AbuseIpDb {
                abuse_confidence_score: Some(0),
                total_reports: None,
            },
        });
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["source"], "AbuseIPDB");
        assert_eq!(json["type"], "ip");
        assert_eq!(json["abuse_confidence_score"], 0);
        assert!(json["total_reports"].is_null());

        let err = ReputationResult::Err {
            source: Source::VirusTotal,
            error: "boom".into(),
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["status"], "err");
        assert_eq!(json["source"], "VirusTotal");
        assert_eq!(json["error"], "boom");

        let json = serde_json::to_value(ReputationResult::Unconfigured {
            source: Source::AbuseIpDb,
        })
        .unwrap();
        assert_eq!(json["status"], "unconfigured");
    }

    #[test]
    fn endpoint_joins_cleanly() {
        assert_eq!(endpoint("http://h/api/v3/", "/domains/x.com"), "http://h/api/v3/domains/x.com");
        assert_eq!(endpoint("http://h/api/v2", "check"), "http://h/api/v2/check");
    }
}

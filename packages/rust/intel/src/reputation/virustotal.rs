//! VirusTotal v3 client for IP, domain, and URL reports.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use cybvector_shared::{BackendConfig, BackendStatus, Result};

use super::{
    AnalysisStats, ReputationBackend, ReputationResult, ReputationSignal, ReputationVerdict,
    Source, build_client, endpoint, send_json,
};
use crate::entities::{Entity, EntityKind};

/// VirusTotal's identifier for a URL: unpadded URL-safe base64 of the raw URL.
pub fn url_identifier(url: &str) -> String {
    URL_SAFE_NO_PAD.encode(url.as_bytes())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ObjectResponse {
    data: ObjectData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ObjectData {
    attributes: ObjectAttributes,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ObjectAttributes {
    reputation: Option<i64>,
    last_analysis_stats: Option<AnalysisStats>,
}

/// VirusTotal lookups authenticated with an `x-apikey` header.
pub struct VirusTotalClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl VirusTotalClient {
    pub fn new(config: &BackendConfig, status: &BackendStatus, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: config.base_url.clone(),
            api_key: status.api_key().map(String::from),
        })
    }

    fn object_path(entity: &Entity) -> String {
        match entity.kind {
            EntityKind::Ip => format!("ip_addresses/{}", entity.value),
            EntityKind::Domain => format!("domains/{}", entity.value),
            EntityKind::Url => format!("urls/{}", url_identifier(&entity.value)),
        }
    }

    async fn fetch(&self, api_key: &str, entity: &Entity) -> Result<ReputationVerdict> {
        let url = endpoint(&self.base_url, &Self::object_path(entity));
        debug!(kind = entity.kind.as_str(), "querying VirusTotal");

        let request = self.client.get(&url).header("x-apikey", api_key);
        let body: ObjectResponse = send_json(Source::VirusTotal, request).await?;
        let attrs = body.data.attributes;

        Ok(ReputationVerdict {
            source: Source::VirusTotal,
            entity_type: entity.kind,
            value: entity.value.clone(),
            signal: ReputationSignal::VirusTotal {
                reputation: attrs.reputation,
                last_analysis_stats: attrs.last_analysis_stats,
            },
        })
    }
}

#[async_trait]
impl ReputationBackend for VirusTotalClient {
    fn source(&self) -> Source {
        Source::VirusTotal
    }

    #[instrument(skip_all, fields(kind = entity.kind.as_str()))]
    async fn lookup(&self, entity: &Entity) -> ReputationResult {
        let Some(api_key) = self.api_key.as_deref() else {
            return ReputationResult::Unconfigured {
                source: Source::VirusTotal,
            };
        };

        let outcome = self.fetch(api_key, entity).await;
        ReputationResult::from_outcome(Source::VirusTotal, entity, outcome)
    }
}

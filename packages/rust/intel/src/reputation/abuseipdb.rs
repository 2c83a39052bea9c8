//! AbuseIPDB v2 `check` client (IP addresses only).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use cybvector_shared::{BackendConfig, BackendStatus, CybVectorError, Result};

use super::{
    ReputationBackend, ReputationResult, ReputationSignal, ReputationVerdict, Source,
    build_client, endpoint, send_json,
};
use crate::entities::{Entity, EntityKind};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CheckResponse {
    data: CheckData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CheckData {
    abuse_confidence_score: Option<u32>,
    total_reports: Option<u64>,
}

/// AbuseIPDB lookups authenticated with a `Key` header.
pub struct AbuseIpDbClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    max_age_days: u32,
}

impl AbuseIpDbClient {
    pub fn new(
        config: &BackendConfig,
        status: &BackendStatus,
        timeout: Duration,
        max_age_days: u32,
    ) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: config.base_url.clone(),
            api_key: status.api_key().map(String::from),
            max_age_days,
        })
    }

    async fn fetch(&self, api_key: &str, entity: &Entity) -> Result<ReputationVerdict> {
        if entity.kind != EntityKind::Ip {
            return Err(CybVectorError::validation(format!(
                "AbuseIPDB only checks IP addresses, not {}",
                entity.kind.as_str()
            )));
        }

        debug!(max_age_days = self.max_age_days, "querying AbuseIPDB");
        let max_age = self.max_age_days.to_string();
        let request = self
            .client
            .get(endpoint(&self.base_url, "check"))
            .header("Accept", "application/json")
            .header("Key", api_key)
            .query(&[("ipAddress", entity.value.as_str()), ("maxAgeInDays", max_age.as_str())]);

        let body: CheckResponse = send_json(Source::AbuseIpDb, request).await?;

        Ok(ReputationVerdict {
            source: Source::AbuseIpDb,
            entity_type: EntityKind::Ip,
            value: entity.value.clone(),
            signal: ReputationSignal::AbuseIpDb {
                abuse_confidence_score: body.data.abuse_confidence_score,
                total_reports: body.data.total_reports,
            },
        })
    }
}

#[async_trait]
impl ReputationBackend for AbuseIpDbClient {
    fn source(&self) -> Source {
        Source::AbuseIpDb
    }

    #[instrument(skip_all, fields(kind = entity.kind.as_str()))]
    async fn lookup(&self, entity: &Entity) -> ReputationResult {
        let Some(api_key) = self.api_key.as_deref() else {
            return ReputationResult::Unconfigured {
                source: Source::AbuseIpDb,
            };
        };

        let outcome = self.fetch(api_key, entity).await;
        ReputationResult::from_outcome(Source::AbuseIpDb, entity, outcome)
    }
}

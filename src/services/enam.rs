// src/services/enam.rs
//
// Authoritative adapter for the data.gov.in AGMARKNET family of resources
// (the datasets backing eNAM mandi prices). The API is slow, rate-limited
// and exact-match on commodity spelling, so one logical fetch walks a
// (dataset x spelling-variant) sequence until it has enough records.

use std::env;
use std::time::Duration;

use log::{info, warn};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::time::sleep;

use crate::models::PriceRecord;
use crate::services::normalize::{clamp_limit, expand_commodity, MAX_UPSTREAM_LIMIT};
use crate::services::record::{normalize, RawMarketRecord};
use crate::BoxError;

pub const ENAM_LIVE_LABEL: &str = "eNAM (live)";
pub const ENAM_CACHE_LABEL: &str = "eNAM (cache)";

const API_KEY_VAR: &str = "DATA_GOV_IN_API_KEY";
const DEFAULT_BASE_URL: &str = "https://api.data.gov.in/resource";

/// Current and legacy AGMARKNET resource identifiers, most recent first.
/// The datasets overlap in coverage but not completely; a commodity missing
/// from one often appears in another.
const DATASET_RESOURCES: &[&str] = &[
    "9ef84268-d588-465a-a308-a864a43d0070",
    "35985678-0d79-46b4-9ed6-6f13308a1d24",
];

/// Per-request timeout. A stuck upstream call fails that candidate only.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
/// Pause after a 429 before moving on to the next candidate request.
const RATE_LIMIT_BACKOFF: Duration = Duration::from_millis(1500);

#[derive(Debug, Deserialize)]
struct EnamResponse {
    #[serde(default)]
    records: Vec<RawMarketRecord>,
}

struct CandidateRequest<'a> {
    resource: &'a str,
    variant: &'a str,
}

pub struct EnamClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl EnamClient {
    pub fn new(api_key: Option<String>, base_url: impl Into<String>) -> Result<Self, BoxError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.into(),
        })
    }

    /// Reads the API key from `DATA_GOV_IN_API_KEY`. A missing key is not an
    /// error here; `fetch` reports it per request so the engine can degrade
    /// to synthetic output.
    pub fn from_env() -> Result<Self, BoxError> {
        let api_key = env::var(API_KEY_VAR).ok().filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            warn!("{API_KEY_VAR} not set; eNAM fetches will be skipped");
        }
        Self::new(api_key, DEFAULT_BASE_URL)
    }

    /// Lazy, finite sequence of candidate requests: every dataset crossed
    /// with every spelling variant. Consumed until the running collected
    /// count satisfies the limit.
    fn candidate_requests<'a>(
        &self,
        variants: &'a [String],
    ) -> impl Iterator<Item = CandidateRequest<'a>> {
        DATASET_RESOURCES.iter().copied().flat_map(move |resource| {
            variants.iter().map(move |variant| CandidateRequest {
                resource,
                variant: variant.as_str(),
            })
        })
    }

    /// Fetch up to `limit` records for (state, commodity). Failures of
    /// individual candidate requests are logged and skipped; only a missing
    /// credential fails the fetch as a whole.
    pub async fn fetch(
        &self,
        state: &str,
        commodity: &str,
        limit: usize,
    ) -> Result<Vec<PriceRecord>, BoxError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| format!("{API_KEY_VAR} is not configured"))?;

        let limit = clamp_limit(limit, MAX_UPSTREAM_LIMIT);
        let variants = expand_commodity(commodity);
        let mut collected: Vec<PriceRecord> = Vec::new();

        for candidate in self.candidate_requests(&variants) {
            if collected.len() >= limit {
                break;
            }

            let url = format!("{}/{}", self.base_url, candidate.resource);
            let mut query: Vec<(String, String)> = vec![
                ("api-key".into(), api_key.to_string()),
                ("format".into(), "json".into()),
                ("limit".into(), limit.to_string()),
                ("filters[commodity]".into(), candidate.variant.to_string()),
            ];
            if !state.trim().is_empty() && !state.trim().eq_ignore_ascii_case("all") {
                query.push(("filters[state]".into(), state.trim().to_string()));
            }

            let resp = match self.client.get(&url).query(&query).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    warn!(
                        "eNAM request failed for {} ({}): {e}",
                        candidate.variant, candidate.resource
                    );
                    continue;
                }
            };

            if resp.status() == StatusCode::TOO_MANY_REQUESTS {
                warn!("eNAM rate limited on {}; backing off", candidate.variant);
                sleep(RATE_LIMIT_BACKOFF).await;
                continue;
            }
            if !resp.status().is_success() {
                warn!(
                    "eNAM returned {} for {} ({})",
                    resp.status(),
                    candidate.variant,
                    candidate.resource
                );
                continue;
            }

            let payload: EnamResponse = match resp.json().await {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("eNAM payload malformed for {}: {e}", candidate.variant);
                    continue;
                }
            };

            let before = collected.len();
            for raw in &payload.records {
                if collected.len() >= limit {
                    break;
                }
                let mut record = normalize(raw, state, commodity);
                if record.price <= 0.0 {
                    continue;
                }
                record.source = ENAM_LIVE_LABEL.to_string();
                collected.push(record);
            }
            info!(
                "eNAM {} ({}): {} usable records",
                candidate.variant,
                candidate.resource,
                collected.len() - before
            );
        }

        Ok(collected)
    }
}

// src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of a price movement. Derived locally, never taken from upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

/// Canonical price record, the unit of engine output.
///
/// `price` is currency units per quintal; records with a non-positive price
/// are discarded before they reach a caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceRecord {
    pub commodity: String,
    pub market: String,
    pub price: f64,
    pub unit: String,
    pub trend: Trend,
    pub change: f64,
    pub date: String,
    pub source: String,
}

impl PriceRecord {
    /// De-dup identity: records are unique per (market, commodity) after
    /// case/whitespace normalization.
    pub fn dedup_key(&self) -> (String, String) {
        (
            self.market.trim().to_lowercase(),
            self.commodity.trim().to_lowercase(),
        )
    }
}

/// Accounting for the authoritative (eNAM) path of one request.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnamReport {
    pub attempted: bool,
    pub from_cache: bool,
    pub records: usize,
    pub error: Option<String>,
}

/// Accounting for synthetic top-up.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FallbackReport {
    pub used: bool,
    pub records: usize,
}

/// Echo of the normalized request. The state is serialized as `region`,
/// the generic name consumers key on.
#[derive(Debug, Clone, Serialize)]
pub struct RequestedQuery {
    #[serde(rename = "region")]
    pub state: String,
    pub commodity: String,
    pub limit: usize,
}

/// Per-request diagnostics. Not persisted anywhere; exists so responses are
/// debuggable and testable without re-deriving provenance from labels.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub generated_at: DateTime<Utc>,
    pub cache_ttl_seconds: u64,
    pub enam: EnamReport,
    pub fallback: FallbackReport,
    pub requested: RequestedQuery,
}

/// Wire envelope for `GET /api/v1/prices/{state}/{commodity}`.
#[derive(Debug, Serialize)]
pub struct PriceResponse {
    pub success: bool,
    pub data: Vec<PriceRecord>,
    pub total: usize,
    pub sources: Vec<String>,
    pub metadata: ResponseMetadata,
}

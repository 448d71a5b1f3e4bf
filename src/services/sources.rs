// src/services/sources.rs
//
// The fan-out seam. Every provider implements `MarketSource`, and the
// contract is infallible by construction: network errors, bad statuses and
// malformed payloads are logged and become an empty result for that source,
// never a propagated failure.

use std::time::Duration;

use async_trait::async_trait;
use log::{info, warn};
use reqwest::Client;
use scraper::{Html, Selector};
use serde_json::Value;

use crate::models::PriceRecord;
use crate::services::enam::EnamClient;
use crate::services::record::{normalize, RawMarketRecord};
use crate::BoxError;

const AUX_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[async_trait]
pub trait MarketSource: Send + Sync {
    /// Provenance label stamped on this source's records.
    fn name(&self) -> &str;

    /// Fetch up to `limit` records. Must never fail; a broken upstream
    /// yields an empty vec.
    async fn fetch(&self, state: &str, commodity: &str, limit: usize) -> Vec<PriceRecord>;
}

/// The authoritative path is the one source whose failure reason the engine
/// reports in response metadata, so unlike `MarketSource` its errors are
/// surfaced (and then contained by the aggregator, not the adapter).
#[async_trait]
pub trait AuthoritativeSource: Send + Sync {
    async fn fetch(
        &self,
        state: &str,
        commodity: &str,
        limit: usize,
    ) -> Result<Vec<PriceRecord>, BoxError>;
}

#[async_trait]
impl AuthoritativeSource for EnamClient {
    async fn fetch(
        &self,
        state: &str,
        commodity: &str,
        limit: usize,
    ) -> Result<Vec<PriceRecord>, BoxError> {
        EnamClient::fetch(self, state, commodity, limit).await
    }
}

// Agmarknet portal (HTML)

/// Scrapes the public Agmarknet search page. The portal predates its own
/// API and still renders the freshest arrivals as a plain HTML table.
pub struct AgmarknetPortal {
    client: Client,
    base_url: String,
}

const AGMARKNET_LABEL: &str = "Agmarknet Portal";
const AGMARKNET_BASE: &str = "https://agmarknet.gov.in/SearchCmmMkt.aspx";

impl AgmarknetPortal {
    pub fn new(base_url: impl Into<String>) -> Result<Self, BoxError> {
        let client = Client::builder()
            .timeout(AUX_REQUEST_TIMEOUT)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn default_endpoint() -> Result<Self, BoxError> {
        Self::new(AGMARKNET_BASE)
    }

    /// Cell layout: market, min, max, modal, date. The cells are fed through
    /// the record normalizer so price/trend/change derivation lives in one
    /// place; rows without a usable price are dropped.
    fn record_from_cells(cells: &[String], state: &str, commodity: &str) -> Option<PriceRecord> {
        let raw = RawMarketRecord {
            commodity: Some(commodity.to_string()),
            market: Some(cells[0].clone()),
            min_price: Some(Value::String(cells[1].clone())),
            max_price: Some(Value::String(cells[2].clone())),
            modal_price: Some(Value::String(cells[3].clone())),
            arrival_date: Some(cells[4].clone()).filter(|d| !d.trim().is_empty()),
            ..Default::default()
        };
        let mut record = normalize(&raw, state, commodity);
        if record.price <= 0.0 {
            return None;
        }
        record.source = AGMARKNET_LABEL.to_string();
        Some(record)
    }

    async fn fetch_table(
        &self,
        state: &str,
        commodity: &str,
        limit: usize,
    ) -> Result<Vec<PriceRecord>, BoxError> {
        let body = self
            .client
            .get(&self.base_url)
            .query(&[("Tx_Commodity", commodity), ("Tx_State", state)])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let document = Html::parse_document(&body);
        let row_sel = Selector::parse("table tr").map_err(|e| format!("bad selector: {e:?}"))?;
        let cell_sel = Selector::parse("td").map_err(|e| format!("bad selector: {e:?}"))?;

        let mut records = Vec::new();
        for row in document.select(&row_sel) {
            if records.len() >= limit {
                break;
            }
            let cells: Vec<String> = row
                .select(&cell_sel)
                .map(|c| c.text().collect::<String>().trim().to_string())
                .collect();
            if cells.len() < 5 {
                continue;
            }
            if let Some(record) = Self::record_from_cells(&cells, state, commodity) {
                records.push(record);
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl MarketSource for AgmarknetPortal {
    fn name(&self) -> &str {
        AGMARKNET_LABEL
    }

    async fn fetch(&self, state: &str, commodity: &str, limit: usize) -> Vec<PriceRecord> {
        match self.fetch_table(state, commodity, limit).await {
            Ok(records) => {
                info!("{AGMARKNET_LABEL}: {} records for {commodity}", records.len());
                records
            }
            Err(e) => {
                warn!("{AGMARKNET_LABEL} failed for {commodity}: {e}");
                Vec::new()
            }
        }
    }
}

// State marketing-board bulletin (CSV)

/// Fetches a daily rates bulletin published as CSV by several state
/// marketing boards. Header names vary slightly, so columns are located by
/// name rather than position.
pub struct StateBulletin {
    client: Client,
    url: String,
}

const BULLETIN_LABEL: &str = "State Bulletin";
const BULLETIN_URL: &str = "https://enam.gov.in/web/dashboard/trade-data.csv";

impl StateBulletin {
    pub fn new(url: impl Into<String>) -> Result<Self, BoxError> {
        let client = Client::builder().timeout(AUX_REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn default_endpoint() -> Result<Self, BoxError> {
        Self::new(BULLETIN_URL)
    }

    /// One bulletin row, canonicalized by the record normalizer (the
    /// bulletin only publishes a modal rate, so trend/change follow the
    /// modal-driven derivation).
    fn record_from_fields(
        commodity: &str,
        market: &str,
        modal: &str,
        date: Option<&str>,
        state: &str,
    ) -> Option<PriceRecord> {
        let raw = RawMarketRecord {
            commodity: Some(commodity.to_string()),
            market: Some(market.to_string()),
            modal_price: Some(Value::String(modal.to_string())),
            arrival_date: date
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            ..Default::default()
        };
        let mut record = normalize(&raw, state, commodity);
        if record.price <= 0.0 {
            return None;
        }
        record.source = BULLETIN_LABEL.to_string();
        Some(record)
    }

    async fn fetch_csv(
        &self,
        state: &str,
        commodity: &str,
        limit: usize,
    ) -> Result<Vec<PriceRecord>, BoxError> {
        let csv_text = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let mut rdr = csv::Reader::from_reader(csv_text.as_bytes());
        let headers = rdr.headers()?.clone();
        let find = |names: &[&str]| {
            headers.iter().position(|h| {
                let h = h.trim().to_lowercase();
                names.iter().any(|n| h == *n)
            })
        };

        let idx_market = find(&["market", "apmc", "mandi"]).ok_or("no market column")?;
        let idx_commodity = find(&["commodity"]).ok_or("no commodity column")?;
        let idx_modal = find(&["modal price", "modal_price", "modal rate"]).ok_or("no modal price column")?;
        let idx_date = find(&["date", "created date", "price date"]);
        let idx_state = find(&["state"]);

        let want = commodity.trim().to_lowercase();
        let want_state = state.trim().to_lowercase();

        let mut records = Vec::new();
        for row in rdr.records() {
            if records.len() >= limit {
                break;
            }
            let row = row?;
            let row_commodity = row.get(idx_commodity).unwrap_or("").trim();
            if !row_commodity.to_lowercase().contains(&want) {
                continue;
            }
            if want_state != "all" {
                if let Some(idx) = idx_state {
                    let row_state = row.get(idx).unwrap_or("").trim().to_lowercase();
                    if !row_state.is_empty() && row_state != want_state {
                        continue;
                    }
                }
            }
            let record = Self::record_from_fields(
                row_commodity,
                row.get(idx_market).unwrap_or("").trim(),
                row.get(idx_modal).unwrap_or(""),
                idx_date.and_then(|i| row.get(i)),
                state,
            );
            if let Some(record) = record {
                records.push(record);
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl MarketSource for StateBulletin {
    fn name(&self) -> &str {
        BULLETIN_LABEL
    }

    async fn fetch(&self, state: &str, commodity: &str, limit: usize) -> Vec<PriceRecord> {
        match self.fetch_csv(state, commodity, limit).await {
            Ok(records) => {
                info!("{BULLETIN_LABEL}: {} records for {commodity}", records.len());
                records
            }
            Err(e) => {
                warn!("{BULLETIN_LABEL} failed for {commodity}: {e}");
                Vec::new()
            }
        }
    }
}

// src/services/record.rs
//
// Canonicalizes heterogeneous upstream records. The government datasets are
// equivalent in content but disagree on field names and casing, and price
// fields arrive as strings more often than numbers.

use chrono::Utc;
use log::debug;
use regex::Regex;
use serde::Deserialize;

use crate::models::{PriceRecord, Trend};
use crate::services::normalize::display_case;

/// One row as it may arrive from any of the AGMARKNET-family datasets.
/// Field aliases cover the known schema variations; prices are kept as
/// permissive JSON values because some resources serve `"2450"` and others
/// `2450`.
#[derive(Debug, Default, Deserialize)]
pub struct RawMarketRecord {
    #[serde(default, alias = "Commodity")]
    pub commodity: Option<String>,
    #[serde(default, alias = "Market", alias = "market_name")]
    pub market: Option<String>,
    #[serde(default, alias = "District", alias = "district_name")]
    pub district: Option<String>,
    #[serde(default, alias = "State", alias = "state_name")]
    pub state: Option<String>,
    #[serde(default, alias = "Modal_Price", alias = "modal_price_rs_quintal")]
    pub modal_price: Option<serde_json::Value>,
    #[serde(default, alias = "Max_Price", alias = "max_price_rs_quintal")]
    pub max_price: Option<serde_json::Value>,
    #[serde(default, alias = "Min_Price", alias = "min_price_rs_quintal")]
    pub min_price: Option<serde_json::Value>,
    #[serde(default, alias = "Arrival_Date", alias = "price_date")]
    pub arrival_date: Option<String>,
}

/// Parse a permissive price value. String prices may carry currency
/// prefixes and thousands separators ("Rs 2,450"), so the numeric token is
/// extracted rather than parsed whole. Zero and unparseable both come back
/// as `None` so the fallback chain can move on.
fn parse_price(value: &Option<serde_json::Value>) -> Option<f64> {
    let parsed = match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => {
            let re = Regex::new(r"[0-9][0-9,]*\.?[0-9]*").ok()?;
            re.find(s)
                .and_then(|m| m.as_str().replace(',', "").parse::<f64>().ok())
        }
        _ => None,
    };
    parsed.filter(|p| *p > 0.0)
}

/// Convert an upstream row into the canonical record shape.
///
/// Price policy: modal price first, then max, then min; if all three are
/// absent the price is 0 and the aggregator will discard the record.
/// Change: `|max - min|` when both sides are present, otherwise a bounded
/// volatility estimate `max(price * 0.05, 10)`.
pub fn normalize(raw: &RawMarketRecord, fallback_state: &str, fallback_commodity: &str) -> PriceRecord {
    let modal = parse_price(&raw.modal_price);
    let max = parse_price(&raw.max_price);
    let min = parse_price(&raw.min_price);

    let price = modal.or(max).or(min).unwrap_or(0.0);

    let change = match (max, min) {
        (Some(max), Some(min)) => (max - min).abs(),
        _ => (price * 0.05).max(10.0),
    };

    let trend = if price <= 0.0 {
        Trend::Stable
    } else if modal.map_or(false, |m| m >= price) {
        Trend::Up
    } else {
        Trend::Down
    };

    let market = raw
        .market
        .as_deref()
        .or(raw.district.as_deref())
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(|m| m.to_string())
        .unwrap_or_else(|| format!("{} Mandi", display_case(fallback_state)));

    let commodity = raw
        .commodity
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(fallback_commodity);

    let date = raw
        .arrival_date
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(|d| d.to_string())
        .unwrap_or_else(|| Utc::now().format("%Y-%m-%d").to_string());

    if price <= 0.0 {
        debug!("record for {commodity} at {market} carries no usable price");
    }

    PriceRecord {
        commodity: display_case(commodity),
        market,
        price,
        unit: "per quintal".to_string(),
        trend,
        change,
        date,
        source: String::new(),
    }
}

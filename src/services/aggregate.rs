// src/services/aggregate.rs
//
// Orchestration core: cache check, parallel fan-out across sources, merge,
// de-dup, and synthetic top-up. Everything the engine touches (cache,
// adapters) is injected at construction so tests run against isolated
// instances.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use log::{info, warn};

use crate::models::{
    EnamReport, FallbackReport, PriceRecord, RequestedQuery, ResponseMetadata,
};
use crate::services::cache::PriceCache;
use crate::services::enam::{EnamClient, ENAM_CACHE_LABEL, ENAM_LIVE_LABEL};
use crate::services::normalize::{cache_key, clamp_limit, normalize_query, MAX_LIMIT};
use crate::services::sources::{AgmarknetPortal, AuthoritativeSource, MarketSource, StateBulletin};
use crate::services::synthetic;
use crate::BoxError;

/// Two-tier aggregation result. Real and synthetic records stay separate
/// until the response is assembled, so provenance is carried by type rather
/// than by label alone.
#[derive(Debug, Default)]
pub struct Aggregation {
    pub real: Vec<PriceRecord>,
    pub synthetic: Vec<PriceRecord>,
}

impl Aggregation {
    /// Ordered output: real records first, synthetic top-up after.
    pub fn into_records(self) -> Vec<PriceRecord> {
        let mut out = self.real;
        out.extend(self.synthetic);
        out
    }
}

/// One engine answer: the ordered records, the distinct provenance labels,
/// and the per-request diagnostics.
#[derive(Debug)]
pub struct EngineResult {
    pub records: Vec<PriceRecord>,
    pub sources: Vec<String>,
    pub metadata: ResponseMetadata,
}

pub struct PriceEngine {
    cache: PriceCache,
    authoritative: Arc<dyn AuthoritativeSource>,
    auxiliary: Vec<Arc<dyn MarketSource>>,
}

impl PriceEngine {
    pub fn new(
        cache: PriceCache,
        authoritative: Arc<dyn AuthoritativeSource>,
        auxiliary: Vec<Arc<dyn MarketSource>>,
    ) -> Self {
        Self {
            cache,
            authoritative,
            auxiliary,
        }
    }

    /// Production wiring: eNAM as the authoritative source plus the two
    /// auxiliary feeds.
    pub fn from_env() -> Result<Self, BoxError> {
        Ok(Self::new(
            PriceCache::default(),
            Arc::new(EnamClient::from_env()?),
            vec![
                Arc::new(AgmarknetPortal::default_endpoint()?),
                Arc::new(StateBulletin::default_endpoint()?),
            ],
        ))
    }

    /// Cache entry count, for the health route.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Answer "what is `commodity` selling for in `state`", best effort.
    /// Always returns at least one record for any valid limit.
    pub async fn get_prices(&self, state: &str, commodity: &str, limit: usize) -> EngineResult {
        let (state, commodity) = normalize_query(state, commodity);
        let limit = clamp_limit(limit, MAX_LIMIT);
        let key = cache_key(&state, &commodity, limit);

        let requested = RequestedQuery {
            state: state.clone(),
            commodity: commodity.clone(),
            limit,
        };

        if let Some(mut records) = self.cache.get(&key) {
            info!("serving {commodity}/{state} (limit {limit}) from cache");
            for record in &mut records {
                if record.source == ENAM_LIVE_LABEL {
                    record.source = ENAM_CACHE_LABEL.to_string();
                }
            }
            let count = records.len();
            return self.assemble(
                Aggregation {
                    real: records,
                    synthetic: Vec::new(),
                },
                EnamReport {
                    attempted: false,
                    from_cache: true,
                    records: count,
                    error: None,
                },
                requested,
            );
        }

        // Full fan-out: the authoritative fetch and every auxiliary fetch
        // run concurrently, and the merge waits for all of them to settle.
        // Auxiliary adapters are infallible by contract, so a broken feed
        // is an empty vec, never a cancelled sibling.
        let aux_futures = join_all(
            self.auxiliary
                .iter()
                .map(|source| source.fetch(&state, &commodity, limit)),
        );
        let (enam_result, aux_results) = tokio::join!(
            self.authoritative.fetch(&state, &commodity, limit),
            aux_futures
        );

        let (enam_records, enam_error) = match enam_result {
            Ok(records) => (records, None),
            Err(e) => {
                warn!("authoritative fetch failed for {commodity}/{state}: {e}");
                (Vec::new(), Some(e.to_string()))
            }
        };

        let mut enam_report = EnamReport {
            attempted: true,
            from_cache: false,
            records: 0,
            error: enam_error,
        };

        // Merge with authoritative records first so first-seen de-dup
        // prefers them over auxiliary duplicates.
        let mut seen = std::collections::HashSet::new();
        let mut real: Vec<PriceRecord> = Vec::new();
        for record in enam_records.into_iter().chain(aux_results.into_iter().flatten()) {
            if record.price <= 0.0 {
                continue;
            }
            if !seen.insert(record.dedup_key()) {
                continue;
            }
            if record.source == ENAM_LIVE_LABEL {
                enam_report.records += 1;
            }
            real.push(record);
        }
        real.truncate(limit);

        // Only real data is worth caching; synthetic output is recomputed
        // every time so its dates never look stale.
        if !real.is_empty() {
            self.cache.put(&key, real.clone());
        }

        let mut synthetic = Vec::new();
        if real.len() < limit {
            let remaining = limit - real.len();
            // 2x headroom so market-name collisions with real records can
            // be dropped and still leave enough candidates.
            let candidates = synthetic::generate(&state, &commodity, remaining * 2, None);
            let taken_markets: std::collections::HashSet<String> = real
                .iter()
                .map(|r| r.market.trim().to_lowercase())
                .collect();
            synthetic = candidates
                .into_iter()
                .filter(|c| !taken_markets.contains(&c.market.trim().to_lowercase()))
                .take(remaining)
                .collect();
            info!(
                "topping up {commodity}/{state} with {} synthetic records ({} real)",
                synthetic.len(),
                real.len()
            );
        }

        self.assemble(Aggregation { real, synthetic }, enam_report, requested)
    }

    fn assemble(
        &self,
        aggregation: Aggregation,
        enam: EnamReport,
        requested: RequestedQuery,
    ) -> EngineResult {
        let fallback = FallbackReport {
            used: !aggregation.synthetic.is_empty(),
            records: aggregation.synthetic.len(),
        };
        let records = aggregation.into_records();

        let mut sources = Vec::new();
        for record in &records {
            if !sources.contains(&record.source) {
                sources.push(record.source.clone());
            }
        }

        EngineResult {
            records,
            sources,
            metadata: ResponseMetadata {
                generated_at: Utc::now(),
                cache_ttl_seconds: self.cache.ttl_seconds(),
                enam,
                fallback,
                requested,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Trend;
    use crate::services::synthetic::{NEARBY_LABEL, SYNTHETIC_LABEL};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn record(market: &str, commodity: &str, price: f64, source: &str) -> PriceRecord {
        PriceRecord {
            commodity: commodity.into(),
            market: market.into(),
            price,
            unit: "per quintal".into(),
            trend: Trend::Stable,
            change: 10.0,
            date: "2026-08-24".into(),
            source: source.into(),
        }
    }

    struct MockAuthoritative {
        records: Vec<PriceRecord>,
        error: Option<String>,
        calls: AtomicUsize,
    }

    impl MockAuthoritative {
        fn returning(records: Vec<PriceRecord>) -> Self {
            Self {
                records,
                error: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                records: Vec::new(),
                error: Some(message.to_string()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AuthoritativeSource for MockAuthoritative {
        async fn fetch(
            &self,
            _state: &str,
            _commodity: &str,
            limit: usize,
        ) -> Result<Vec<PriceRecord>, BoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.error {
                Some(message) => Err(message.clone().into()),
                None => Ok(self.records.iter().take(limit).cloned().collect()),
            }
        }
    }

    struct MockAux {
        records: Vec<PriceRecord>,
        calls: AtomicUsize,
    }

    impl MockAux {
        fn returning(records: Vec<PriceRecord>) -> Self {
            Self {
                records,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self::returning(Vec::new())
        }
    }

    #[async_trait]
    impl MarketSource for MockAux {
        fn name(&self) -> &str {
            "Mock Aux"
        }

        async fn fetch(&self, _state: &str, _commodity: &str, _limit: usize) -> Vec<PriceRecord> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.records.clone()
        }
    }

    fn engine(
        auth: Arc<MockAuthoritative>,
        aux: Vec<Arc<MockAux>>,
    ) -> PriceEngine {
        PriceEngine::new(
            PriceCache::new(Duration::from_secs(60)),
            auth,
            aux.into_iter()
                .map(|a| a as Arc<dyn MarketSource>)
                .collect(),
        )
    }

    #[tokio::test]
    async fn two_real_records_and_failed_aux_top_up_to_exactly_limit() {
        let auth = Arc::new(MockAuthoritative::returning(vec![
            record("Khanna", "Wheat", 2450.0, ENAM_LIVE_LABEL),
            record("Moga", "Wheat", 2410.0, ENAM_LIVE_LABEL),
        ]));
        let engine = engine(auth, vec![Arc::new(MockAux::failing())]);

        let result = engine.get_prices("Punjab", "Wheat", 5).await;

        assert_eq!(result.records.len(), 5);
        let real: Vec<_> = result
            .records
            .iter()
            .filter(|r| r.source == ENAM_LIVE_LABEL)
            .collect();
        let synthetic: Vec<_> = result
            .records
            .iter()
            .filter(|r| r.source == SYNTHETIC_LABEL || r.source == NEARBY_LABEL)
            .collect();
        assert_eq!(real.len(), 2);
        assert_eq!(synthetic.len(), 3);
        assert!(result.metadata.fallback.used);
        assert_eq!(result.metadata.fallback.records, 3);
        assert_eq!(result.metadata.enam.records, 2);
        assert!(result.metadata.enam.attempted);
    }

    #[tokio::test]
    async fn repeat_request_within_ttl_hits_cache_and_skips_upstream() {
        let auth = Arc::new(MockAuthoritative::returning(vec![
            record("Khanna", "Wheat", 2450.0, ENAM_LIVE_LABEL),
            record("Moga", "Wheat", 2410.0, ENAM_LIVE_LABEL),
        ]));
        let aux = Arc::new(MockAux::failing());
        let engine = engine(auth.clone(), vec![aux.clone()]);

        let first = engine.get_prices("Punjab", "Wheat", 2).await;
        assert!(!first.metadata.enam.from_cache);
        assert_eq!(auth.calls.load(Ordering::SeqCst), 1);

        let second = engine.get_prices(" punjab ", "WHEAT", 2).await;
        assert!(second.metadata.enam.from_cache);
        assert!(!second.metadata.enam.attempted);
        assert_eq!(auth.calls.load(Ordering::SeqCst), 1, "no new upstream call");
        assert_eq!(aux.calls.load(Ordering::SeqCst), 1);
        assert!(second
            .records
            .iter()
            .all(|r| r.source == ENAM_CACHE_LABEL));
        assert!(!second.metadata.fallback.used);
    }

    #[tokio::test]
    async fn merge_dedups_by_market_commodity_keeping_first_seen() {
        let auth = Arc::new(MockAuthoritative::returning(vec![record(
            "Khanna", "Wheat", 2450.0, ENAM_LIVE_LABEL,
        )]));
        let aux = Arc::new(MockAux::returning(vec![
            // same market/commodity modulo case, different price
            record("  KHANNA ", "wheat", 9999.0, "Mock Aux"),
            record("Ludhiana", "Wheat", 2300.0, "Mock Aux"),
        ]));
        let engine = engine(auth, vec![aux]);

        let result = engine.get_prices("Punjab", "Wheat", 2).await;

        assert_eq!(result.records.len(), 2);
        assert_eq!(result.records[0].market.trim(), "Khanna");
        assert_eq!(result.records[0].price, 2450.0, "first seen wins");
        assert_eq!(result.records[1].market, "Ludhiana");
    }

    #[tokio::test]
    async fn non_positive_prices_never_reach_the_caller() {
        let auth = Arc::new(MockAuthoritative::returning(vec![
            record("Khanna", "Wheat", 0.0, ENAM_LIVE_LABEL),
            record("Moga", "Wheat", -5.0, ENAM_LIVE_LABEL),
            record("Bathinda", "Wheat", 2400.0, ENAM_LIVE_LABEL),
        ]));
        let engine = engine(auth, vec![]);

        let result = engine.get_prices("Punjab", "Wheat", 3).await;

        assert!(result.records.iter().all(|r| r.price > 0.0));
        assert_eq!(result.metadata.enam.records, 1);
    }

    #[tokio::test]
    async fn total_failure_degrades_to_full_synthetic_with_error_noted() {
        let auth = Arc::new(MockAuthoritative::failing("DATA_GOV_IN_API_KEY is not configured"));
        let engine = engine(auth, vec![Arc::new(MockAux::failing())]);

        let result = engine.get_prices("Punjab", "Wheat", 4).await;

        assert_eq!(result.records.len(), 4);
        assert!(result
            .records
            .iter()
            .all(|r| r.source == SYNTHETIC_LABEL || r.source == NEARBY_LABEL));
        assert!(result.metadata.enam.error.as_deref().unwrap().contains("API_KEY"));
        assert!(result.metadata.fallback.used);
        assert_eq!(result.metadata.fallback.records, 4);
        // synthetic-only results are never cached
        assert_eq!(engine.cache_len(), 0);
    }

    #[tokio::test]
    async fn results_are_truncated_to_limit_and_cached() {
        let auth = Arc::new(MockAuthoritative::returning(
            (0..10)
                .map(|i| record(&format!("Market {i}"), "Wheat", 2000.0 + i as f64, ENAM_LIVE_LABEL))
                .collect(),
        ));
        let engine = engine(auth, vec![]);

        let result = engine.get_prices("Punjab", "Wheat", 3).await;
        assert_eq!(result.records.len(), 3);
        assert!(!result.metadata.fallback.used);
        assert_eq!(engine.cache_len(), 1);
    }

    #[tokio::test]
    async fn synthetic_market_collisions_with_real_records_are_filtered() {
        // a real record occupying the first synthetic label template
        let auth = Arc::new(MockAuthoritative::returning(vec![record(
            "Punjab Mandi", "Wheat", 2450.0, ENAM_LIVE_LABEL,
        )]));
        let engine = engine(auth, vec![]);

        let result = engine.get_prices("Punjab", "Wheat", 3).await;

        assert_eq!(result.records.len(), 3);
        let markets: Vec<_> = result.records.iter().map(|r| r.market.to_lowercase()).collect();
        let mut unique = markets.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), markets.len(), "no duplicate markets");
    }

    #[tokio::test]
    async fn sources_list_is_distinct_and_ordered() {
        let auth = Arc::new(MockAuthoritative::returning(vec![
            record("Khanna", "Wheat", 2450.0, ENAM_LIVE_LABEL),
            record("Moga", "Wheat", 2410.0, ENAM_LIVE_LABEL),
        ]));
        let engine = engine(auth, vec![]);

        let result = engine.get_prices("Punjab", "Wheat", 3).await;

        assert_eq!(result.sources[0], ENAM_LIVE_LABEL);
        assert!(result.sources.len() >= 2, "synthetic label present too");
        let mut deduped = result.sources.clone();
        deduped.dedup();
        assert_eq!(deduped, result.sources);
    }
}

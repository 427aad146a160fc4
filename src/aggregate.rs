use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use serde::Serialize;

use crate::config::ResolvedConfig;
use crate::domain::{CompoundQuery, CompoundRecord, ProviderKind, UNKNOWN_FORMULA};
use crate::http::HttpBackend;
use crate::providers::{CompoundProvider, HmdbClient, MassbankClient, PubchemClient};
use crate::report::ProviderReport;

#[derive(Debug, Clone, Serialize)]
pub struct AggregateResult {
    pub records: Vec<CompoundRecord>,
    pub reports: Vec<ProviderReport>,
}

#[derive(Clone)]
pub struct Aggregator {
    providers: Vec<Arc<dyn CompoundProvider>>,
    dedupe_weight_decimals: u32,
}

impl Aggregator {
    pub fn new(providers: Vec<Arc<dyn CompoundProvider>>) -> Self {
        Self {
            providers,
            dedupe_weight_decimals: 2,
        }
    }

    pub fn from_config(config: &ResolvedConfig, backend: Arc<dyn HttpBackend>) -> Self {
        let mut providers: Vec<Arc<dyn CompoundProvider>> = vec![
            Arc::new(PubchemClient::new(config.pubchem.clone(), backend.clone())),
            Arc::new(MassbankClient::new(config.massbank.clone(), backend.clone())),
        ];
        if config.hmdb.enabled {
            providers.push(Arc::new(HmdbClient::new(config.hmdb.clone(), backend)));
        }
        Self {
            providers,
            dedupe_weight_decimals: config.aggregation.dedupe_weight_decimals,
        }
    }

    pub fn only(mut self, kinds: &[ProviderKind]) -> Self {
        if !kinds.is_empty() {
            self.providers
                .retain(|provider| kinds.contains(&provider.kind()));
        }
        self
    }

    pub fn providers(&self) -> Vec<ProviderKind> {
        self.providers.iter().map(|provider| provider.kind()).collect()
    }

    pub async fn aggregate(&self, query: &CompoundQuery) -> Vec<CompoundRecord> {
        self.aggregate_with_reports(query).await.records
    }

    pub async fn aggregate_with_reports(&self, query: &CompoundQuery) -> AggregateResult {
        if query.is_empty() {
            return AggregateResult {
                records: Vec::new(),
                reports: Vec::new(),
            };
        }

        let started = Instant::now();
        let responses = join_all(
            self.providers
                .iter()
                .map(|provider| provider.search(query)),
        )
        .await;

        let mut records = Vec::new();
        let mut reports = Vec::with_capacity(responses.len());
        for response in responses {
            response.report.log();
            records.extend(response.records);
            reports.push(response.report);
        }

        tracing::info!(
            records = records.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "aggregate search finished"
        );
        AggregateResult { records, reports }
    }

    pub async fn aggregate_deduplicated(&self, query: &CompoundQuery) -> Vec<CompoundRecord> {
        dedupe(self.aggregate(query).await, self.dedupe_weight_decimals)
    }
}

/// Keeps the first record per (formula, weight rounded to `decimals`).
/// Records without a known formula are always kept.
pub fn dedupe(records: Vec<CompoundRecord>, decimals: u32) -> Vec<CompoundRecord> {
    let scale = 10f64.powi(decimals.min(12) as i32);
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| {
            if record.formula() == UNKNOWN_FORMULA {
                return true;
            }
            let weight = (record.weight() * scale).round() as i64;
            seen.insert((record.formula().to_string(), weight))
        })
        .collect()
}

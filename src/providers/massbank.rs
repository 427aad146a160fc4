use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::config::MassbankSettings;
use crate::domain::{CompoundQuery, CompoundRecord, PeakList, ProviderKind};
use crate::error::HubError;
use crate::gate::gated_fan_out;
use crate::http::{HttpBackend, HttpSession, SessionProfile, get_json};
use crate::normalize::{massbank_accessions, massbank_record};
use crate::providers::CompoundProvider;
use crate::report::ProviderResponse;

#[derive(Clone)]
pub struct MassbankClient {
    settings: MassbankSettings,
    backend: Arc<dyn HttpBackend>,
}

impl MassbankClient {
    pub fn new(settings: MassbankSettings, backend: Arc<dyn HttpBackend>) -> Self {
        Self { settings, backend }
    }

    pub fn default_threshold(&self) -> f64 {
        self.settings.peak_threshold
    }

    pub fn search_url(&self, query: &CompoundQuery) -> Option<String> {
        let mut params = Vec::new();
        if let Some(name) = &query.name {
            params.push(format!("compound_name={}", urlencoding::encode(name)));
        }
        if let Some(formula) = &query.formula {
            params.push(format!("formula={}", urlencoding::encode(formula)));
        }
        if let Some(weight) = query.weight {
            params.push(format!("exact_mass={weight:.4}"));
            params.push(format!("mass_tolerance={}", self.settings.mass_tolerance));
        }
        if params.is_empty() {
            return None;
        }
        Some(format!("{}/search?{}", self.settings.base_url, params.join("&")))
    }

    pub fn peak_search_url(&self, peaks: &PeakList, threshold: f64) -> String {
        format!(
            "{}/search?peak_list={}&peak_list_threshold={threshold}",
            self.settings.base_url,
            peaks.query_value()
        )
    }

    pub fn detail_url(&self, accession: &str) -> String {
        format!(
            "{}/{}",
            self.settings.base_url,
            urlencoding::encode(accession)
        )
    }

    pub fn record_url(&self, accession: &str) -> String {
        format!(
            "{}?id={}",
            self.settings.record_url,
            urlencoding::encode(accession)
        )
    }

    pub async fn search_by_peaks(
        &self,
        peaks: &PeakList,
        threshold: Option<f64>,
    ) -> ProviderResponse {
        let started = Instant::now();
        if peaks.is_empty() {
            return ProviderResponse::skipped(ProviderKind::Massbank);
        }
        let threshold = threshold
            .filter(|value| value.is_finite() && *value >= 0.0)
            .unwrap_or(self.settings.peak_threshold);
        let url = self.peak_search_url(peaks, threshold);
        tracing::info!(peaks = %peaks, threshold, "MassBank peak search");
        self.search_then_fetch(
            &url,
            SessionProfile::with_timeout(self.settings.peak_timeout),
            started,
        )
        .await
    }

    async fn search_then_fetch(
        &self,
        url: &str,
        profile: SessionProfile,
        started: Instant,
    ) -> ProviderResponse {
        let session = match self.backend.open(&profile) {
            Ok(session) => session,
            Err(err) => {
                return ProviderResponse::failed(ProviderKind::Massbank, err.to_string(), started);
            }
        };
        let session = session.as_ref();

        let response = match session.get(url).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(error = %err, "MassBank search request failed");
                return ProviderResponse::failed(ProviderKind::Massbank, err.to_string(), started);
            }
        };
        if !response.is_success() {
            tracing::warn!(
                status = response.status,
                body = response.preview(),
                "MassBank search returned an error status"
            );
            return ProviderResponse::failed(
                ProviderKind::Massbank,
                format!("search returned status {}", response.status),
                started,
            );
        }
        let raw = match response.json(url) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    body = response.preview(),
                    "MassBank search payload unreadable"
                );
                return ProviderResponse::failed(ProviderKind::Massbank, err.to_string(), started);
            }
        };

        let (accessions, skipped) = massbank_accessions(&raw);
        if skipped > 0 {
            tracing::debug!(skipped, "MassBank entries without accession");
        }
        tracing::debug!(accessions = accessions.len(), "MassBank search matched");

        let details = gated_fan_out(
            accessions,
            self.settings.max_concurrent,
            |accession| async move {
                let detail = self.fetch_detail(session, &accession).await;
                (accession, detail)
            },
        )
        .await;

        let mut failed_units = 0;
        let mut records = Vec::with_capacity(details.len());
        for (accession, detail) in details {
            match detail {
                Ok(record) => records.push(record),
                Err(err) => {
                    tracing::warn!(
                        accession = %accession,
                        error = %err,
                        "dropping MassBank record"
                    );
                    failed_units += 1;
                }
            }
        }

        ProviderResponse::completed(ProviderKind::Massbank, records, failed_units, started)
    }

    async fn fetch_detail(
        &self,
        session: &dyn HttpSession,
        accession: &str,
    ) -> Result<CompoundRecord, HubError> {
        let raw = get_json(session, &self.detail_url(accession)).await?;
        Ok(massbank_record(&raw, self.record_url(accession)))
    }
}

#[async_trait]
impl CompoundProvider for MassbankClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Massbank
    }

    async fn search(&self, query: &CompoundQuery) -> ProviderResponse {
        let started = Instant::now();
        let Some(url) = self.search_url(query) else {
            return ProviderResponse::skipped(ProviderKind::Massbank);
        };
        self.search_then_fetch(
            &url,
            SessionProfile::with_timeout(self.settings.timeout),
            started,
        )
        .await
    }
}

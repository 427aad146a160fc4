use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::config::HmdbSettings;
use crate::domain::{CompoundQuery, ProviderKind};
use crate::http::{HttpBackend, SessionProfile, get_json};
use crate::normalize::hmdb_records;
use crate::providers::CompoundProvider;
use crate::report::ProviderResponse;

#[derive(Clone)]
pub struct HmdbClient {
    settings: HmdbSettings,
    backend: Arc<dyn HttpBackend>,
}

impl HmdbClient {
    pub fn new(settings: HmdbSettings, backend: Arc<dyn HttpBackend>) -> Self {
        Self { settings, backend }
    }

    pub fn search_url(&self, query: &CompoundQuery) -> Option<String> {
        let terms = query.joined_terms();
        if terms.is_empty() {
            return None;
        }
        let separator = if self.settings.base_url.contains('?') { '&' } else { '?' };
        Some(format!(
            "{}{separator}query={}",
            self.settings.base_url,
            urlencoding::encode(&terms)
        ))
    }

    fn profile(&self) -> SessionProfile {
        SessionProfile {
            timeout: self.settings.timeout,
            connect_timeout: Some(self.settings.connect_timeout),
            bearer_token: self.settings.api_key.clone(),
        }
    }
}

#[async_trait]
impl CompoundProvider for HmdbClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Hmdb
    }

    async fn search(&self, query: &CompoundQuery) -> ProviderResponse {
        let started = Instant::now();
        let Some(url) = self.search_url(query) else {
            return ProviderResponse::skipped(ProviderKind::Hmdb);
        };

        let raw = match self.backend.open(&self.profile()) {
            Ok(session) => get_json(session.as_ref(), &url).await,
            Err(err) => Err(err),
        };
        match raw {
            Ok(raw) => {
                let records = hmdb_records(&raw, &self.settings.record_url);
                ProviderResponse::completed(ProviderKind::Hmdb, records, 0, started)
            }
            Err(err) => {
                tracing::warn!(error = %err, "HMDB search failed");
                ProviderResponse::failed(ProviderKind::Hmdb, err.to_string(), started)
            }
        }
    }
}

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, LazyLock};
use std::time::Instant;

use async_trait::async_trait;
use futures::future::join_all;
use regex::Regex;

use crate::config::PubchemSettings;
use crate::domain::{CompoundQuery, CompoundRecord, ProviderKind};
use crate::error::HubError;
use crate::gate::gated_fan_out;
use crate::http::{HttpBackend, HttpSession, SessionProfile, get_json};
use crate::normalize::{pubchem_identifiers, pubchem_list_key, pubchem_record};
use crate::poll::poll_until_ready;
use crate::providers::CompoundProvider;
use crate::report::ProviderResponse;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

const DETAIL_PROPERTIES: &str = "MolecularFormula,MolecularWeight,IUPACName,Title";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchAttribute {
    Name,
    Formula,
    Weight,
}

impl fmt::Display for SearchAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchAttribute::Name => write!(f, "name"),
            SearchAttribute::Formula => write!(f, "formula"),
            SearchAttribute::Weight => write!(f, "weight"),
        }
    }
}

pub fn normalize_formula(formula: &str) -> String {
    WHITESPACE.replace_all(formula.trim(), "").into_owned()
}

/// AND semantics across attributes. Attributes that produced nothing do not
/// take part, so an empty input yields an empty set.
pub fn intersect_identifiers(sets: Vec<BTreeSet<u64>>) -> BTreeSet<u64> {
    let mut sets = sets.into_iter().filter(|set| !set.is_empty());
    let Some(first) = sets.next() else {
        return BTreeSet::new();
    };
    sets.fold(first, |acc, set| acc.intersection(&set).copied().collect())
}

#[derive(Clone)]
pub struct PubchemClient {
    settings: PubchemSettings,
    backend: Arc<dyn HttpBackend>,
}

impl PubchemClient {
    pub fn new(settings: PubchemSettings, backend: Arc<dyn HttpBackend>) -> Self {
        Self { settings, backend }
    }

    pub fn search_urls(&self, query: &CompoundQuery) -> Vec<(SearchAttribute, String)> {
        let base = &self.settings.base_url;
        let mut urls = Vec::new();
        if let Some(name) = &query.name {
            urls.push((
                SearchAttribute::Name,
                format!("{base}/compound/name/{}/cids/JSON", urlencoding::encode(name)),
            ));
        }
        if let Some(formula) = &query.formula {
            let formula = normalize_formula(formula);
            urls.push((
                SearchAttribute::Formula,
                format!(
                    "{base}/compound/formula/{}/cids/JSON",
                    urlencoding::encode(&formula)
                ),
            ));
        }
        if let Some(weight) = query.weight {
            urls.push((
                SearchAttribute::Weight,
                format!("{base}/compound/molecular_weight/equals/{weight}/cids/JSON"),
            ));
        }
        urls
    }

    pub fn list_key_url(&self, list_key: &str) -> String {
        format!(
            "{}/compound/listkey/{}/cids/JSON",
            self.settings.base_url,
            urlencoding::encode(list_key)
        )
    }

    pub fn detail_url(&self, cid: u64) -> String {
        format!(
            "{}/compound/cid/{cid}/property/{DETAIL_PROPERTIES}/JSON",
            self.settings.base_url
        )
    }

    pub fn record_url(&self, cid: u64) -> String {
        format!("{}/{cid}", self.settings.record_url)
    }

    async fn resolve_attribute(
        &self,
        session: &dyn HttpSession,
        attribute: SearchAttribute,
        url: &str,
    ) -> Result<BTreeSet<u64>, HubError> {
        let response = session.get(url).await?;
        // PubChem reports "no hits" as 404.
        if response.status == 404 {
            tracing::debug!(%attribute, "no PubChem hits");
            return Ok(BTreeSet::new());
        }
        let raw = response.into_success(url)?.json(url)?;

        if let Some(cids) = pubchem_identifiers(&raw) {
            return Ok(cids.into_iter().collect());
        }

        let Some(list_key) = pubchem_list_key(&raw) else {
            return Err(HubError::Decode {
                url: url.to_string(),
                message: "neither IdentifierList nor Waiting.ListKey present".to_string(),
            });
        };

        let poll_url = self.list_key_url(&list_key);
        tracing::debug!(%attribute, list_key = %list_key, "polling PubChem list key");
        let cids = poll_until_ready(
            &self.settings.poll,
            |_| get_json(session, &poll_url),
            |raw| pubchem_identifiers(&raw),
        )
        .await;
        match cids {
            Some(cids) => Ok(cids.into_iter().collect()),
            None => {
                tracing::warn!(
                    %attribute,
                    list_key = %list_key,
                    attempts = self.settings.poll.max_attempts(),
                    "PubChem list key never became ready"
                );
                Ok(BTreeSet::new())
            }
        }
    }

    async fn fetch_detail(
        &self,
        session: &dyn HttpSession,
        cid: u64,
    ) -> Result<CompoundRecord, HubError> {
        let raw = get_json(session, &self.detail_url(cid)).await?;
        Ok(pubchem_record(&raw, self.record_url(cid)))
    }
}

#[async_trait]
impl CompoundProvider for PubchemClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Pubchem
    }

    async fn search(&self, query: &CompoundQuery) -> ProviderResponse {
        let started = Instant::now();
        let urls = self.search_urls(query);
        if urls.is_empty() {
            return ProviderResponse::skipped(ProviderKind::Pubchem);
        }

        let session = match self
            .backend
            .open(&SessionProfile::with_timeout(self.settings.timeout))
        {
            Ok(session) => session,
            Err(err) => {
                return ProviderResponse::failed(ProviderKind::Pubchem, err.to_string(), started);
            }
        };
        let session = session.as_ref();

        let lookups = join_all(
            urls.iter()
                .map(|(attribute, url)| self.resolve_attribute(session, *attribute, url)),
        )
        .await;

        let mut failed_units = 0;
        let mut sets = Vec::with_capacity(lookups.len());
        for ((attribute, _), lookup) in urls.iter().zip(lookups) {
            match lookup {
                Ok(cids) => {
                    tracing::debug!(%attribute, cids = cids.len(), "PubChem attribute resolved");
                    sets.push(cids);
                }
                Err(err) => {
                    tracing::warn!(%attribute, error = %err, "PubChem attribute search failed");
                    failed_units += 1;
                }
            }
        }
        if failed_units == urls.len() {
            return ProviderResponse::failed(
                ProviderKind::Pubchem,
                "every attribute search failed",
                started,
            );
        }

        let cids = intersect_identifiers(sets);
        if cids.is_empty() {
            return ProviderResponse::completed(
                ProviderKind::Pubchem,
                Vec::new(),
                failed_units,
                started,
            );
        }

        let details = gated_fan_out(cids, self.settings.max_concurrent, |cid| async move {
            (cid, self.fetch_detail(session, cid).await)
        })
        .await;

        let mut records = Vec::with_capacity(details.len());
        for (cid, detail) in details {
            match detail {
                Ok(record) => records.push(record),
                Err(err) => {
                    tracing::warn!(cid, error = %err, "dropping PubChem compound");
                    failed_units += 1;
                }
            }
        }

        ProviderResponse::completed(ProviderKind::Pubchem, records, failed_units, started)
    }
}

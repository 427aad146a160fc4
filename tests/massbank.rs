mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use serde_json::json;

use compound_hub::domain::{CompoundQuery, PeakList};
use compound_hub::providers::{CompoundProvider, MassbankClient};
use compound_hub::report::Outcome;

use common::{MASSBANK, Reply, ScriptedBackend, massbank_detail, massbank_hits, test_config};

fn client(backend: &ScriptedBackend) -> MassbankClient {
    MassbankClient::new(test_config().massbank, backend.shared())
}

fn detail_url(accession: &str) -> String {
    format!("{MASSBANK}/{accession}")
}

#[tokio::test(start_paused = true)]
async fn peak_search_fetches_every_accession() {
    let backend = ScriptedBackend::new();
    let search =
        format!("{MASSBANK}/search?peak_list=56.04%3B10,69.04%3B42&peak_list_threshold=0.01");
    backend
        .with_latency(Duration::from_millis(100))
        .json(&search, massbank_hits(&["MSBNK-001", "MSBNK-002"]))
        .json(detail_url("MSBNK-001"), massbank_detail("Pyrrolidine", "C4H9N", 71.0735))
        .json(detail_url("MSBNK-002"), massbank_detail("Piperidine", "C5H11N", 85.0891));

    let response = client(&backend)
        .search_by_peaks(&PeakList::new("56.04;10,69.04;42"), Some(0.01))
        .await;

    assert_eq!(response.records.len(), 2);
    assert_eq!(backend.calls_to(&search), 1);
    assert_eq!(backend.peak_in_flight(), 2);
    let mut urls: Vec<_> = response.records.iter().map(|r| r.url().to_string()).collect();
    urls.sort();
    assert_eq!(
        urls,
        vec![
            "https://massbank.eu/MassBank/RecordDisplay?id=MSBNK-001",
            "https://massbank.eu/MassBank/RecordDisplay?id=MSBNK-002",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn peak_list_whitespace_is_stripped_before_request() {
    let backend = ScriptedBackend::new();
    let search = format!("{MASSBANK}/search?peak_list=56.04%3B10,69.04%3B42,83.06%3B51&peak_list_threshold=0.01");
    backend.json(&search, massbank_hits(&[]));

    client(&backend)
        .search_by_peaks(&PeakList::new(" 56.04; 10 ,69.04;42,\n83.06;51 "), None)
        .await;

    assert_eq!(backend.calls(), vec![search]);
}

#[tokio::test(start_paused = true)]
async fn peak_search_uses_extended_timeout() {
    let backend = ScriptedBackend::new();
    backend.json(
        format!("{MASSBANK}/search?peak_list=56.04%3B10&peak_list_threshold=0.05"),
        massbank_hits(&[]),
    );

    client(&backend)
        .search_by_peaks(&PeakList::new("56.04;10"), Some(0.05))
        .await;

    assert_eq!(backend.sessions_opened()[0].timeout, Duration::from_secs(120));
}

#[tokio::test(start_paused = true)]
async fn empty_peak_list_issues_no_request() {
    let backend = ScriptedBackend::new();
    let response = client(&backend)
        .search_by_peaks(&PeakList::new("  \t "), None)
        .await;

    assert!(response.records.is_empty());
    assert!(backend.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn peak_detail_fetches_are_bounded() {
    let backend = ScriptedBackend::new();
    let accessions: Vec<String> = (0..25).map(|i| format!("MSBNK-{i:03}")).collect();
    let refs: Vec<&str> = accessions.iter().map(String::as_str).collect();
    backend
        .with_latency(Duration::from_millis(20))
        .json(
            format!("{MASSBANK}/search?peak_list=56.04%3B10&peak_list_threshold=0.01"),
            massbank_hits(&refs),
        );
    for accession in &accessions {
        backend.json(detail_url(accession), massbank_detail("x", "C", 12.0));
    }

    let response = client(&backend)
        .search_by_peaks(&PeakList::new("56.04;10"), None)
        .await;

    assert_eq!(response.records.len(), 25);
    assert_eq!(backend.peak_in_flight(), 10);
}

#[tokio::test(start_paused = true)]
async fn attribute_search_combines_parameters() {
    let backend = ScriptedBackend::new();
    let search = format!(
        "{MASSBANK}/search?compound_name=caffeine&formula=C8H10N4O2&exact_mass=194.0804&mass_tolerance=0.1"
    );
    backend
        .json(&search, massbank_hits(&["MSBNK-CAF"]))
        .json(detail_url("MSBNK-CAF"), massbank_detail("Caffeine", "C8H10N4O2", 194.0804));

    let query = CompoundQuery::new(
        Some("caffeine".to_string()),
        Some("C8H10N4O2".to_string()),
        Some(194.0804),
    );
    let response = client(&backend).search(&query).await;

    assert_eq!(response.records.len(), 1);
    assert_eq!(response.records[0].name(), "Caffeine");
    assert_eq!(backend.calls_to(&search), 1);
}

#[tokio::test(start_paused = true)]
async fn server_error_yields_empty_list() {
    let backend = ScriptedBackend::new();
    backend.on(
        format!("{MASSBANK}/search?compound_name=aspirin"),
        Reply::Text(500, "Internal Server Error".to_string()),
    );

    let query = CompoundQuery::new(Some("aspirin".to_string()), None, None);
    let response = client(&backend).search(&query).await;

    assert!(response.records.is_empty());
    assert_matches!(response.report.outcome, Outcome::Failed { .. });
}

#[tokio::test(start_paused = true)]
async fn records_without_accession_are_skipped() {
    let backend = ScriptedBackend::new();
    backend
        .json(
            format!("{MASSBANK}/search?formula=C2H6O"),
            json!({"data": [{"accession": "MSBNK-ETH"}, {"title": "no accession"}]}),
        )
        .json(detail_url("MSBNK-ETH"), json!({"compound": {}}));

    let query = CompoundQuery::new(None, Some("C2H6O".to_string()), None);
    let response = client(&backend).search(&query).await;

    assert_eq!(response.records.len(), 1);
    let record = &response.records[0];
    assert_eq!(record.name(), "unknown");
    assert_eq!(record.formula(), "N/A");
    assert_eq!(record.weight(), 0.0);
    assert_eq!(response.report.outcome, Outcome::Success);
}

#[tokio::test(start_paused = true)]
async fn failed_detail_drops_only_that_record() {
    let backend = ScriptedBackend::new();
    backend
        .json(
            format!("{MASSBANK}/search?compound_name=mix"),
            massbank_hits(&["A", "B", "C"]),
        )
        .json(detail_url("A"), massbank_detail("a", "C1", 1.0))
        .on(detail_url("B"), Reply::Text(502, "bad gateway".to_string()))
        .json(detail_url("C"), massbank_detail("c", "C3", 3.0));

    let query = CompoundQuery::new(Some("mix".to_string()), None, None);
    let response = client(&backend).search(&query).await;

    assert_eq!(response.records.len(), 2);
    assert_eq!(response.report.outcome, Outcome::Partial { failed_units: 1 });
}

#[tokio::test(start_paused = true)]
async fn empty_attribute_query_issues_no_request() {
    let backend = ScriptedBackend::new();
    let response = client(&backend).search(&CompoundQuery::default()).await;

    assert!(response.records.is_empty());
    assert!(backend.calls().is_empty());
}

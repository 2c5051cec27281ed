//! Scans against a fake registry served by wiremock.

use std::time::Duration;

use cadastre_scan::block::{BlockId, ScanRange};
use cadastre_scan::checkpoint::CheckpointStore;
use cadastre_scan::config::{LookupConfig, ScanPolicy};
use cadastre_scan::parse::PARCEL_CATEGORY;
use cadastre_scan::request::{NspdClient, ParcelLookup};
use cadastre_scan::scanner::{ScanState, Scanner, StopReason};
use cadastre_scan::shutdown::Shutdown;
use cadastre_scan::Error;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SEARCH_PATH: &str = "/api/geoportal/v2/search/geoportal";

fn block() -> BlockId {
    "77:01:0001001".parse().expect("valid block")
}

fn client_for(server: &MockServer) -> NspdClient {
    let config = LookupConfig {
        search_url: format!("{}{SEARCH_PATH}", server.uri()),
        timeout: Duration::from_secs(2),
        ..LookupConfig::default()
    };
    NspdClient::new(&config, &block()).expect("client")
}

fn parcel_payload(cad_num: &str) -> serde_json::Value {
    json!({ "data": { "type": "FeatureCollection", "features": [{
        "properties": {
            "categoryName": PARCEL_CATEGORY,
            "options": {
                "cad_num": cad_num,
                "readable_address": "Moscow, Arbat st. 10",
                "area": 812,
                "status": "Registered"
            }
        },
        "geometry": { "type": "Point", "coordinates": [37.59, 55.75] }
    }] } })
}

#[tokio::test]
async fn lookup_sends_query_and_browser_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("query", "77:01:0001001:3"))
        .and(query_param("thematicSearchId", "1"))
        .and(header("referer", "https://nspd.gov.ru/map?kadastr=77%3A01%3A0001001"))
        .and(header_exists("user-agent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(parcel_payload("77:01:0001001:3")))
        .expect(1)
        .mount(&server)
        .await;

    let payload = client_for(&server)
        .lookup("77:01:0001001:3")
        .await
        .expect("lookup succeeds")
        .expect("payload present");
    assert_eq!(
        payload["data"]["features"][0]["properties"]["options"]["cad_num"],
        "77:01:0001001:3"
    );
}

#[tokio::test]
async fn not_found_status_is_absence() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let result = client_for(&server).lookup("77:01:0001001:1").await;
    assert!(matches!(result, Ok(None)));
}

#[tokio::test]
async fn other_status_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let result = client_for(&server).lookup("77:01:0001001:1").await;
    assert!(matches!(
        result,
        Err(Error::UnexpectedStatus { status: 503, .. })
    ));
}

#[tokio::test]
async fn non_json_body_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let result = client_for(&server).lookup("77:01:0001001:1").await;
    assert!(matches!(result, Err(Error::Reqwest(_))));
}

#[tokio::test]
async fn scans_block_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("query", "77:01:0001001:3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(parcel_payload("77:01:0001001:3")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("query", "77:01:0001001:4"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("query", "77:01:0001001:2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "features": [] } })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .with_priority(10)
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("temp dir");
    let store = CheckpointStore::new(dir.path().join("results"));
    let policy = ScanPolicy {
        delay: Duration::ZERO,
        ..ScanPolicy::default()
    };
    let state = ScanState::new(ScanRange::new(block(), 1, 5).expect("range"));

    let report = Scanner::new(client_for(&server), store.clone(), policy, state)
        .run(&Shutdown::new())
        .await
        .expect("scan");

    assert_eq!(report.summary.stop, StopReason::Exhausted);
    assert_eq!(report.summary.probed, 5);
    assert_eq!(report.summary.errors, 1);
    assert_eq!(report.state.records.len(), 1);
    let record = &report.state.records[0];
    assert_eq!(record.cadastral_number, "77:01:0001001:3");
    assert_eq!(record.address, "Moscow, Arbat st. 10");
    assert_eq!(record.area, "812");
    assert_eq!(record.coordinates, "[37.59,55.75]");

    let saved = store.load(&block()).await.expect("checkpoint");
    assert_eq!(saved.last_checked(), 5);
    assert_eq!(saved.found_count(), 1);

    let csv = std::fs::read_to_string(store.export_path(&block())).expect("export");
    assert_eq!(csv.lines().count(), 2);
    assert!(csv.contains("77:01:0001001:3,\"Moscow, Arbat st. 10\",812"));
}

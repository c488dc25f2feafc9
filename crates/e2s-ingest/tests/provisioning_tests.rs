//! Provisioning against a mocked Splunk management API
//!
//! Covers:
//! - first run against an empty instance (everything created)
//! - reruns against a provisioned instance (no writes)
//! - index creation races (409)
//! - credential and transport failures

mod common;

use common::*;
use e2s_ingest::config::ProxySettings;
use e2s_ingest::error::{IngestError, ProvisionStep};
use e2s_ingest::splunk::{ProvisionState, Provisioner, SplunkClient};
use wiremock::matchers::{basic_auth, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provisioner(server: &MockServer) -> Provisioner {
    let settings = settings_for(server);
    let client = SplunkClient::new(&settings.splunk, &ProxySettings::default()).unwrap();
    Provisioner::new(client, INDEX)
}

async fn mount_probe(server: &MockServer, status: u16) {
    Mock::given(method("GET"))
        .and(path(PROBE_PATH))
        .and(basic_auth(USER, PASS))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_fresh_instance_creates_everything() {
    let server = MockServer::start().await;
    mount_probe(&server, 200).await;

    Mock::given(method("GET"))
        .and(path(index_path(INDEX)))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(INDEXES_PATH))
        .and(body_string_contains("name=winevt"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    // The input does not exist on the first lookup
    Mock::given(method("GET"))
        .and(path(INPUT_PATH))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(PROBE_PATH))
        .and(body_string_contains("name=evtx2splunk"))
        .respond_with(ResponseTemplate::new(201).set_body_string(hec_input_xml(Some(TOKEN), &["main"])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(INPUT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(hec_input_xml(Some(TOKEN), &["main"])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(INPUT_PATH))
        .and(body_string_contains("indexes=main%2Cwinevt"))
        .and(body_string_contains("index=main"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut provisioner = provisioner(&server);
    let provisioned = provisioner.provision().await.unwrap();

    assert_eq!(provisioner.state(), ProvisionState::Ready);
    assert_eq!(provisioned.index, INDEX);
    assert_eq!(provisioned.token, TOKEN);
    assert!(provisioned.associated);
}

#[tokio::test]
async fn test_provisioning_is_idempotent() {
    let server = MockServer::start().await;
    mount_provisioned(&server, INDEX).await;

    for _ in 0..2 {
        let mut provisioner = provisioner(&server);
        let provisioned = provisioner.provision().await.unwrap();

        assert_eq!(provisioner.state(), ProvisionState::Ready);
        assert_eq!(provisioned.token, TOKEN);
    }
    // Dropping the server verifies that no POST was made
}

#[tokio::test]
async fn test_index_conflict_counts_as_existing() {
    let server = MockServer::start().await;
    mount_probe(&server, 200).await;

    Mock::given(method("GET"))
        .and(path(index_path(INDEX)))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(INDEXES_PATH))
        .respond_with(ResponseTemplate::new(409))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(INPUT_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(hec_input_xml(Some(TOKEN), &[INDEX])),
        )
        .mount(&server)
        .await;

    let mut provisioner = provisioner(&server);
    provisioner.provision().await.unwrap();
    assert_eq!(provisioner.state(), ProvisionState::Ready);
}

#[tokio::test]
async fn test_bad_credentials_stop_at_connect() {
    let server = MockServer::start().await;
    mount_probe(&server, 401).await;

    Mock::given(method("GET"))
        .and(path(index_path(INDEX)))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut provisioner = provisioner(&server);
    let err = provisioner.provision().await.unwrap_err();

    assert!(err.is_provisioning());
    assert!(matches!(
        err,
        IngestError::Provisioning {
            step: ProvisionStep::Connect,
            status: 401,
            ..
        }
    ));
    assert_eq!(provisioner.state(), ProvisionState::Unavailable);
}

#[tokio::test]
async fn test_index_creation_failure_is_fatal() {
    let server = MockServer::start().await;
    mount_probe(&server, 200).await;

    Mock::given(method("GET"))
        .and(path(index_path(INDEX)))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(INDEXES_PATH))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = provisioner(&server).provision().await.unwrap_err();
    assert!(matches!(
        err,
        IngestError::Provisioning {
            step: ProvisionStep::EnsureIndex,
            status: 403,
            ..
        }
    ));
}

#[tokio::test]
async fn test_listed_input_without_token_is_created() {
    let server = MockServer::start().await;
    mount_probe(&server, 200).await;

    Mock::given(method("GET"))
        .and(path(index_path(INDEX)))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    // Listed, but the entry carries no token
    Mock::given(method("GET"))
        .and(path(INPUT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(hec_input_xml(None, &["main", INDEX])))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(PROBE_PATH))
        .and(body_string_contains("name=evtx2splunk"))
        .respond_with(ResponseTemplate::new(201).set_body_string(hec_input_xml(Some(TOKEN), &["main", INDEX])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(INPUT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(hec_input_xml(Some(TOKEN), &["main", INDEX])))
        .mount(&server)
        .await;

    let mut provisioner = provisioner(&server);
    let provisioned = provisioner.provision().await.unwrap();

    assert_eq!(provisioner.state(), ProvisionState::Ready);
    assert_eq!(provisioned.token, TOKEN);
    assert!(provisioned.associated);
}

#[tokio::test]
async fn test_created_input_without_token() {
    let server = MockServer::start().await;
    mount_probe(&server, 200).await;

    Mock::given(method("GET"))
        .and(path(index_path(INDEX)))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(INPUT_PATH))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(PROBE_PATH))
        .respond_with(ResponseTemplate::new(201).set_body_string(hec_input_xml(None, &["main"])))
        .mount(&server)
        .await;

    let err = provisioner(&server).provision().await.unwrap_err();
    assert!(matches!(
        err,
        IngestError::UnexpectedResponse {
            step: ProvisionStep::EnsureToken,
            ..
        }
    ));
}

#[tokio::test]
async fn test_unreachable_splunk() {
    let server = MockServer::start().await;
    let mut settings = settings_for(&server);
    // Nothing listens on the discard port
    settings.splunk.management_url = Some("http://127.0.0.1:9".to_string());
    settings.splunk.request_timeout_secs = 2;

    let client = SplunkClient::new(&settings.splunk, &ProxySettings::default()).unwrap();
    let mut provisioner = Provisioner::new(client, INDEX);
    let err = provisioner.provision().await.unwrap_err();

    assert!(matches!(err, IngestError::Unreachable { .. }));
    assert_eq!(provisioner.state(), ProvisionState::Unavailable);
}

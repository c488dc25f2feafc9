//! Shared fixtures for the Splunk mock server tests

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use e2s_ingest::config::{ConverterSettings, Settings, SplunkSettings};
use std::path::PathBuf;
use wiremock::matchers::{basic_auth, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const USER: &str = "admin";
pub const PASS: &str = "changeme";
pub const TOKEN: &str = "5c3a1d2e-1111-2222-3333-444455556666";
pub const INDEX: &str = "winevt";

pub const PROBE_PATH: &str = "/services/data/inputs/http";
pub const INPUT_PATH: &str = "/services/data/inputs/http/evtx2splunk";
pub const INDEXES_PATH: &str = "/services/data/indexes";
pub const COLLECTOR_PATH: &str = "/services/collector/event";

pub fn index_path(index: &str) -> String {
    format!("{}/{}", INDEXES_PATH, index)
}

/// Settings pointing both APIs at `server`
pub fn settings_for(server: &MockServer) -> Settings {
    Settings {
        splunk: SplunkSettings {
            username: USER.to_string(),
            password: PASS.to_string(),
            management_url: Some(server.uri()),
            hec_url: Some(server.uri()),
            request_timeout_secs: 5,
            ..SplunkSettings::default()
        },
        converter: ConverterSettings::default(),
        resolver_file: PathBuf::from("/nonexistent/evtx_data.json"),
    }
}

/// Atom body of the `evtx2splunk` HEC input
pub fn hec_input_xml(token: Option<&str>, indexes: &[&str]) -> String {
    let token = token
        .map(|t| format!(r#"<s:key name="token">{}</s:key>"#, t))
        .unwrap_or_default();
    let items: String = indexes
        .iter()
        .map(|i| format!("<s:item>{}</s:item>", i))
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:s="http://dev.splunk.com/ns/rest">
  <entry>
    <title>http://evtx2splunk</title>
    <content type="text/xml">
      <s:dict>
        <s:key name="disabled">0</s:key>
        <s:key name="index">{first}</s:key>
        <s:key name="indexes"><s:list>{items}</s:list></s:key>
        {token}
      </s:dict>
    </content>
  </entry>
</feed>"#,
        first = indexes.first().copied().unwrap_or("main"),
        items = items,
        token = token,
    )
}

/// Mount the answers of an instance where everything already exists.
/// No create or associate call is expected.
pub async fn mount_provisioned(server: &MockServer, index: &str) {
    Mock::given(method("GET"))
        .and(path(PROBE_PATH))
        .and(basic_auth(USER, PASS))
        .respond_with(ResponseTemplate::new(200).set_body_string("<feed/>"))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(index_path(index)))
        .respond_with(ResponseTemplate::new(200).set_body_string("<feed/>"))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(INPUT_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(hec_input_xml(Some(TOKEN), &["main", index])),
        )
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path_regex("^/services/data/"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .named("no management POST")
        .mount(server)
        .await;
}

/// A record as produced by `evtx_dump -o jsonl`
pub fn evtx_line(host: &str, event_id: u32, record_id: u64) -> String {
    format!(
        r##"{{"Event":{{"#attributes":{{"xmlns":"http://schemas.microsoft.com/win/2004/08/events/event"}},"System":{{"Provider":{{"#attributes":{{"Name":"Microsoft-Windows-Security-Auditing"}}}},"EventID":{event_id},"EventRecordID":{record_id},"TimeCreated":{{"#attributes":{{"SystemTime":"2020-06-16T12:54:38.766579Z"}}}},"Channel":"Security","Computer":"{host}"}}}}}}"##
    )
}

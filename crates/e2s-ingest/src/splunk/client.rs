//! HTTP client for the Splunk management REST API

use reqwest::{Client, Proxy, StatusCode};
use tracing::{debug, error};

use crate::config::{ProxySettings, SplunkSettings};
use crate::error::{IngestError, Result};

/// Build the reqwest client shared by management and HEC calls.
///
/// Proxies and certificate verification apply to both.
pub fn build_http_client(settings: &SplunkSettings, proxy: &ProxySettings) -> Result<Client> {
    let mut builder = Client::builder()
        .timeout(settings.request_timeout())
        .danger_accept_invalid_certs(!settings.ssl_verify);

    if let Some(url) = &proxy.http {
        builder = builder.proxy(Proxy::http(url)?);
    }
    if let Some(url) = &proxy.https {
        builder = builder.proxy(Proxy::https(url)?);
    }

    Ok(builder.build()?)
}

/// Status and body of a management API call
#[derive(Debug, Clone)]
pub struct ManagementResponse {
    pub status: StatusCode,
    pub body: String,
}

impl ManagementResponse {
    /// 200 or 201
    pub fn is_ok(&self) -> bool {
        self.status == StatusCode::OK || self.status == StatusCode::CREATED
    }
}

/// Authenticated client for the management API
#[derive(Debug, Clone)]
pub struct SplunkClient {
    client: Client,
    base_url: String,
    username: String,
    password: String,
}

impl SplunkClient {
    pub fn new(settings: &SplunkSettings, proxy: &ProxySettings) -> Result<Self> {
        Ok(Self {
            client: build_http_client(settings, proxy)?,
            base_url: settings.management_base_url(),
            username: settings.username.clone(),
            password: settings.password.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get(&self, url: &str) -> Result<ManagementResponse> {
        debug!(url, "GET");
        let request = self
            .client
            .get(url)
            .basic_auth(&self.username, Some(&self.password));
        self.send(url, request).await
    }

    pub async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<ManagementResponse> {
        debug!(url, "POST");
        let request = self
            .client
            .post(url)
            .basic_auth(&self.username, Some(&self.password))
            .form(form);
        self.send(url, request).await
    }

    async fn send(&self, url: &str, request: reqwest::RequestBuilder) -> Result<ManagementResponse> {
        let response = request.send().await.map_err(|source| IngestError::Unreachable {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            error!(
                url,
                user = %self.username,
                "Splunk rejected the credentials. Check SPLUNK_USER and SPLUNK_PASS."
            );
        }

        let body = response.text().await?;
        Ok(ManagementResponse { status, body })
    }
}

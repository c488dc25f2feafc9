//! Splunk provisioning
//!
//! Before any event is sent the target index must exist, the `evtx2splunk`
//! HEC input must exist and its token be known, and the index must be allowed
//! for that token. Every step checks first and only creates what is missing, so
//! running against an already provisioned instance makes no changes.
//!
//! The index association is a read-modify-write of the input's `indexes` list.
//! Two runs associating different indexes at the same moment may lose one of
//! the updates; a single writer is assumed.

use reqwest::StatusCode;
use tracing::{debug, error, info, warn};

use super::client::SplunkClient;
use super::endpoints::{self, HEC_INPUT_NAME};
use super::xml;
use crate::error::{IngestError, ProvisionStep, Result};

/// Progress of the provisioning sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionState {
    Disconnected,
    Connected,
    IndexEnsured,
    TokenEnsured,
    Associated,
    Ready,
    /// A step failed; nothing may be sent
    Unavailable,
}

/// What provisioning established on the remote side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningState {
    pub index: String,
    pub token: String,
    /// Index is in the token's allowed list
    pub associated: bool,
}

pub struct Provisioner {
    client: SplunkClient,
    index: String,
    state: ProvisionState,
}

impl Provisioner {
    pub fn new(client: SplunkClient, index: impl Into<String>) -> Self {
        Self {
            client,
            index: index.into(),
            state: ProvisionState::Disconnected,
        }
    }

    pub fn state(&self) -> ProvisionState {
        self.state
    }

    /// Run the whole sequence. On failure the state is `Unavailable`.
    pub async fn provision(&mut self) -> Result<ProvisioningState> {
        match self.run().await {
            Ok(provisioned) => {
                self.state = ProvisionState::Ready;
                info!(index = %provisioned.index, "Splunk is ready to receive events");
                Ok(provisioned)
            },
            Err(e) => {
                error!(state = ?self.state, error = %e, "Splunk provisioning failed");
                self.state = ProvisionState::Unavailable;
                Err(e)
            },
        }
    }

    async fn run(&mut self) -> Result<ProvisioningState> {
        self.connect().await?;
        self.state = ProvisionState::Connected;

        self.ensure_index().await?;
        self.state = ProvisionState::IndexEnsured;

        let token = self.ensure_token().await?;
        self.state = ProvisionState::TokenEnsured;

        self.associate_index().await?;
        self.state = ProvisionState::Associated;

        Ok(ProvisioningState {
            index: self.index.clone(),
            token,
            associated: true,
        })
    }

    async fn connect(&self) -> Result<()> {
        let url = endpoints::hec_inputs_url(self.client.base_url());
        let response = self.client.get(&url).await?;

        if !response.is_ok() {
            return Err(IngestError::provisioning(
                ProvisionStep::Connect,
                response.status.as_u16(),
                "Splunk management API refused the connection probe",
            ));
        }

        info!(url = %self.client.base_url(), "Connected to Splunk");
        Ok(())
    }

    /// Returns true when the index had to be created
    async fn ensure_index(&self) -> Result<bool> {
        let base = self.client.base_url();
        let response = self.client.get(&endpoints::index_url(base, &self.index)).await?;

        if response.status == StatusCode::OK {
            info!(index = %self.index, "Index already exists");
            return Ok(false);
        }

        debug!(index = %self.index, status = %response.status, "Index not found, creating it");
        let response = self
            .client
            .post_form(&endpoints::indexes_url(base), &[("name", self.index.as_str())])
            .await?;

        if response.status == StatusCode::CONFLICT {
            info!(index = %self.index, "Index already exists");
            return Ok(false);
        }

        if !response.is_ok() {
            return Err(IngestError::provisioning(
                ProvisionStep::EnsureIndex,
                response.status.as_u16(),
                format!("Unable to create index '{}'", self.index),
            ));
        }

        info!(index = %self.index, "Index created");
        Ok(true)
    }

    async fn ensure_token(&self) -> Result<String> {
        let base = self.client.base_url();
        let response = self.client.get(&endpoints::hec_input_url(base)).await?;

        if response.status == StatusCode::OK {
            if let Some(token) = xml::key_text(&response.body, "token")? {
                info!(input = HEC_INPUT_NAME, "Using existing HEC token");
                return Ok(token);
            }
            warn!(input = HEC_INPUT_NAME, "HEC input listed without a token, creating it");
        } else {
            debug!(input = HEC_INPUT_NAME, status = %response.status, "HEC input not found, creating it");
        }

        let response = self
            .client
            .post_form(&endpoints::hec_inputs_url(base), &[("name", HEC_INPUT_NAME)])
            .await?;

        if !response.is_ok() {
            return Err(IngestError::provisioning(
                ProvisionStep::EnsureToken,
                response.status.as_u16(),
                format!("Unable to create HEC input '{}'", HEC_INPUT_NAME),
            ));
        }

        let token = xml::key_text(&response.body, "token")?.ok_or_else(|| {
            IngestError::unexpected(
                ProvisionStep::EnsureToken,
                "HEC input was created but the response carries no token",
            )
        })?;

        info!(input = HEC_INPUT_NAME, "HEC token created");
        Ok(token)
    }

    /// Returns true when the token's index list had to be updated
    async fn associate_index(&self) -> Result<bool> {
        let url = endpoints::hec_input_url(self.client.base_url());
        let response = self.client.get(&url).await?;

        let mut indexes = if response.is_ok() {
            xml::key_items(&response.body, "indexes")?
        } else {
            warn!(status = %response.status, "Unable to read the HEC token's indexes");
            Vec::new()
        };

        if indexes.iter().any(|index| *index == self.index) {
            info!(index = %self.index, "Index already associated with the HEC token");
            return Ok(false);
        }

        indexes.push(self.index.clone());
        let joined = indexes.join(",");
        let default_index = indexes[0].clone();

        let response = self
            .client
            .post_form(
                &url,
                &[("indexes", joined.as_str()), ("index", default_index.as_str())],
            )
            .await?;

        if !response.is_ok() {
            return Err(IngestError::provisioning(
                ProvisionStep::AssociateIndex,
                response.status.as_u16(),
                format!("Unable to allow index '{}' for the HEC token", self.index),
            ));
        }

        info!(index = %self.index, indexes = %joined, "Index associated with the HEC token");
        Ok(true)
    }
}

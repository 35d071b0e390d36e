use crate::retell_types::{
    BatchCallResponse, CallResponse, CreateBatchCallRequest, CreatePhoneCallRequest,
};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request to provider failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("provider returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("failed to decode provider response: {0}")]
    Decode(#[source] reqwest::Error),
}

/// Outbound calling provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VoiceProvider: Send + Sync {
    async fn create_phone_call(
        &self,
        request: &CreatePhoneCallRequest,
    ) -> Result<CallResponse, ProviderError>;

    async fn retrieve_call(&self, call_id: &str) -> Result<CallResponse, ProviderError>;

    async fn create_batch_call(
        &self,
        request: &CreateBatchCallRequest,
    ) -> Result<BatchCallResponse, ProviderError>;
}

pub struct RetellClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RetellClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read_json<T: DeserializeOwned>(
        resp: reqwest::Response,
        what: &str,
    ) -> Result<T, ProviderError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!(%status, body=%body, "retell {what} rejected");
            return Err(ProviderError::Status { status, body });
        }
        resp.json::<T>().await.map_err(|e| {
            error!(error=%e, "failed to deserialize retell {what} response");
            ProviderError::Decode(e)
        })
    }
}

#[async_trait]
impl VoiceProvider for RetellClient {
    async fn create_phone_call(
        &self,
        request: &CreatePhoneCallRequest,
    ) -> Result<CallResponse, ProviderError> {
        debug!(to=%request.to_number, "creating retell phone call");
        let resp = self
            .http_client
            .post(self.url("/v2/create-phone-call"))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!(error=%e, "failed to send create-phone-call request to retell");
                ProviderError::Request(e)
            })?;
        Self::read_json(resp, "create-phone-call").await
    }

    async fn retrieve_call(&self, call_id: &str) -> Result<CallResponse, ProviderError> {
        debug!(call_id, "retrieving retell call");
        let resp = self
            .http_client
            .get(self.url(&format!("/v2/get-call/{call_id}")))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| {
                error!(error=%e, "failed to send get-call request to retell");
                ProviderError::Request(e)
            })?;
        Self::read_json(resp, "get-call").await
    }

    async fn create_batch_call(
        &self,
        request: &CreateBatchCallRequest,
    ) -> Result<BatchCallResponse, ProviderError> {
        debug!(tasks = request.tasks.len(), "creating retell batch call");
        let resp = self
            .http_client
            .post(self.url("/create-batch-call"))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!(error=%e, "failed to send create-batch-call request to retell");
                ProviderError::Request(e)
            })?;
        Self::read_json(resp, "create-batch-call").await
    }
}

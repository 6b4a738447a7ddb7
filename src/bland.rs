use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::error;

use crate::bland_types::{ReportCallRequest, SendCallRequest, SendCallResponse, VoiceInfo};
use crate::config::Config;
use crate::error::ApiError;

/// Provider seam for the flows that mix provider calls with local state
/// (call placement, voice sync).  `BlandClient` is the production
/// implementation; tests drive the same flows with a canned provider.
#[async_trait]
pub trait CallProvider {
    async fn send_call(&self, request: &SendCallRequest) -> Result<SendCallResponse, ApiError>;
    async fn voices(&self) -> Result<Vec<VoiceInfo>, ApiError>;
}

#[async_trait]
impl CallProvider for BlandClient {
    async fn send_call(&self, request: &SendCallRequest) -> Result<SendCallResponse, ApiError> {
        BlandClient::send_call(self, request).await
    }

    async fn voices(&self) -> Result<Vec<VoiceInfo>, ApiError> {
        BlandClient::voices(self).await
    }
}

/// Thin client over the Bland HTTP API.  Credentials are injected once at
/// construction; every call is a single blocking round-trip with no retries.
#[derive(Clone)]
pub struct BlandClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl BlandClient {
    pub fn new(http_client: reqwest::Client, config: &Config) -> Self {
        Self {
            http_client,
            base_url: config.bland_api_url.trim_end_matches('/').to_string(),
            api_key: config.bland_api_key.clone(),
        }
    }

    pub async fn send_call(&self, request: &SendCallRequest) -> Result<SendCallResponse, ApiError> {
        self.request(Method::POST, "/v1/send-call", Some(request))
            .await
    }

    pub async fn analyze_call(&self, call_id: &str) -> Result<Value, ApiError> {
        self.request(
            Method::POST,
            &format!("/v1/calls/{call_id}/analyze"),
            Some(&Value::Object(Default::default())),
        )
        .await
    }

    pub async fn call_logs(&self) -> Result<Value, ApiError> {
        self.request::<Value, ()>(Method::GET, "/v1/call-logs", None)
            .await
    }

    pub async fn stop_call(&self, call_id: &str) -> Result<Value, ApiError> {
        self.request(
            Method::POST,
            &format!("/v1/calls/{call_id}/stop"),
            Some(&Value::Object(Default::default())),
        )
        .await
    }

    // The upstream transcript endpoint takes no call id.
    pub async fn transcript(&self) -> Result<Value, ApiError> {
        self.request::<Value, ()>(Method::GET, "/v1/transcript", None)
            .await
    }

    pub async fn voices(&self) -> Result<Vec<VoiceInfo>, ApiError> {
        self.request::<Vec<VoiceInfo>, ()>(Method::GET, "/v1/voices", None)
            .await
    }

    pub async fn report_call(&self, call_id: &str, reason: String) -> Result<Value, ApiError> {
        self.request(
            Method::POST,
            &format!("/v1/calls/{call_id}/report"),
            Some(&ReportCallRequest { reason }),
        )
        .await
    }

    async fn request<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        let url = format!("{}{path}", self.base_url);
        let mut builder = self
            .http_client
            .request(method, url.as_str())
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", self.api_key),
            );
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let resp = builder.send().await.map_err(|e| {
            error!(error=%e, url=%url, "failed to send request to Bland");
            ApiError::Provider("Failed to reach call provider".to_string())
        })?;

        let status = resp.status();
        if !status.is_success() {
            error!(status=%status, url=%url, "Bland returned an error status");
            return Err(ApiError::Provider(format!(
                "Call provider returned {status}"
            )));
        }

        resp.json::<T>().await.map_err(|e| {
            error!(error=%e, url=%url, "failed to deserialize Bland response");
            ApiError::Provider("Failed to decode call provider response".to_string())
        })
    }
}

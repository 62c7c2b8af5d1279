//! Collector transport over HTTPS

use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use tracing::trace;
use vigil_core::{MetricTransport, TransportError};
use vigil_domain::{AgentConfig, Envelope, Result, VigilError};

use crate::http::HttpClient;

/// Posts envelopes to the collector with bearer authentication
///
/// One attempt per envelope. The response body is never read.
pub struct HttpTransport {
    client: HttpClient,
    endpoint: String,
    authorization: Option<HeaderValue>,
}

impl HttpTransport {
    pub fn new(
        client: HttpClient,
        endpoint: impl Into<String>,
        api_key: Option<&str>,
    ) -> Result<Self> {
        let authorization = api_key.map(bearer).transpose()?;
        Ok(Self { client, endpoint: endpoint.into(), authorization })
    }

    /// Transport for the configured endpoint, key and timeouts.
    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        let client = HttpClient::builder()
            .connect_timeout(config.transport.open_timeout())
            .read_timeout(config.transport.read_timeout())
            .build()?;

        Self::new(client, config.endpoint_url(), config.api_key())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("endpoint", &self.endpoint)
            .field("authorized", &self.authorization.is_some())
            .finish()
    }
}

#[async_trait]
impl MetricTransport for HttpTransport {
    async fn send(&self, envelope: &Envelope) -> std::result::Result<u16, TransportError> {
        let body = serde_json::to_vec(envelope)
            .map_err(|err| TransportError::Serialization(err.to_string()))?;

        let mut request = self
            .client
            .request(Method::POST, self.endpoint.as_str())
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .body(body);
        if let Some(authorization) = &self.authorization {
            request = request.header(AUTHORIZATION, authorization.clone());
        }

        let response = self.client.send(request).await.map_err(transport_error)?;
        let status = response.status().as_u16();
        trace!(event = %envelope.event, status, "Collector responded");
        Ok(status)
    }
}

fn bearer(api_key: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|_| {
        VigilError::Config("api_key contains characters not allowed in a header".to_string())
    })?;
    value.set_sensitive(true);
    Ok(value)
}

fn transport_error(err: VigilError) -> TransportError {
    match err {
        VigilError::Timeout(message) => TransportError::Timeout(message),
        VigilError::Network(message) if message.starts_with("HTTP connection failure") => {
            TransportError::Connect(message)
        }
        other => TransportError::Request(other.to_string()),
    }
}

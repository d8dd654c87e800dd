//! REST API client for the Horde endpoints.
//!
//! Wraps the Horde v2 HTTP API (generation, interrogation, rating,
//! users, workers and status) using [`reqwest`]. Every request carries
//! the `apikey` and `Client-Agent` headers.

use horde_core::response::{validate_response, ResponseFailure};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::messages::{
    GenerationRating, InterrogationRequest, InterrogationStatus, NewsItem, PerformanceStats,
    RatingReceipt, RequestStatus, SubmitResponse, UserDetails, WorkerDetails,
};

/// Key used by anonymous clients.
pub const ANONYMOUS_API_KEY: &str = "0000000000";

/// HTTP client for one Horde deployment.
#[derive(Clone)]
pub struct HordeApi {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    client_agent: String,
}

/// Errors from the Horde REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum HordeApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The response failed validation (unexpected status or empty body).
    #[error(transparent)]
    Rejected(#[from] ResponseFailure),

    /// The body validated but did not have the expected shape.
    #[error("{context}: unexpected response body: {source}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl HordeApiError {
    /// HTTP status of a rejected response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected(failure) => Some(failure.status),
            Self::Request(e) => e.status().map(|s| s.as_u16()),
            Self::Decode { .. } => None,
        }
    }
}

impl HordeApi {
    /// Create a new API client.
    ///
    /// * `api_url` - Base URL including the `/api` prefix, e.g.
    ///   `https://aihorde.net/api`.
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        client_agent: impl Into<String>,
    ) -> Self {
        Self::with_client(reqwest::Client::new(), api_url, api_key, client_agent)
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(
        client: reqwest::Client,
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        client_agent: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client_agent: client_agent.into(),
        }
    }

    /// A copy of this client that authenticates with a different key.
    pub fn with_api_key(&self, api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..self.clone()
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn is_anonymous(&self) -> bool {
        self.api_key == ANONYMOUS_API_KEY
    }

    // ---- generation ----

    /// Queue a generation. Expects `202 Accepted`.
    pub async fn submit_generation(&self, body: &Value) -> Result<SubmitResponse, HordeApiError> {
        let request = self.post("/v2/generate/async").json(body);
        send(request, &[202], "Submit generation").await
    }

    /// Lightweight progress check without image payloads.
    pub async fn check_generation(&self, id: &str) -> Result<RequestStatus, HordeApiError> {
        let request = self.get(&format!("/v2/generate/check/{id}"));
        send(request, &[200], "Check generation").await
    }

    /// Full status including finished generations.
    pub async fn generation_status(&self, id: &str) -> Result<RequestStatus, HordeApiError> {
        let request = self.get(&format!("/v2/generate/status/{id}"));
        send(request, &[200], "Generation status").await
    }

    /// Cancel a queued or running generation. Returns whatever finished.
    pub async fn cancel_generation(&self, id: &str) -> Result<RequestStatus, HordeApiError> {
        let request = self
            .authed(self.client.delete(self.url(&format!("/v2/generate/status/{id}"))));
        send(request, &[200], "Cancel generation").await
    }

    /// Rate the images of a finished generation request.
    pub async fn rate_generation(
        &self,
        id: &str,
        rating: &GenerationRating,
    ) -> Result<RatingReceipt, HordeApiError> {
        let request = self.post(&format!("/v2/generate/rate/{id}")).json(rating);
        send(request, &[200], "Rate generation").await
    }

    // ---- interrogation ----

    /// Queue an interrogation. Expects `202 Accepted`.
    pub async fn submit_interrogation(
        &self,
        body: &InterrogationRequest,
    ) -> Result<SubmitResponse, HordeApiError> {
        let request = self.post("/v2/interrogate/async").json(body);
        send(request, &[202], "Submit interrogation").await
    }

    pub async fn interrogation_status(
        &self,
        id: &str,
    ) -> Result<InterrogationStatus, HordeApiError> {
        let request = self.get(&format!("/v2/interrogate/status/{id}"));
        send(request, &[200], "Interrogation status").await
    }

    /// Cancel a queued or running interrogation.
    pub async fn cancel_interrogation(
        &self,
        id: &str,
    ) -> Result<InterrogationStatus, HordeApiError> {
        let request = self
            .authed(self.client.delete(self.url(&format!("/v2/interrogate/status/{id}"))));
        send(request, &[200], "Cancel interrogation").await
    }

    // ---- users, workers, status ----

    /// The user owning the configured API key.
    pub async fn find_user(&self) -> Result<UserDetails, HordeApiError> {
        send(self.get("/v2/find_user"), &[200], "Find user").await
    }

    pub async fn users(&self) -> Result<Vec<UserDetails>, HordeApiError> {
        send(self.get("/v2/users"), &[200], "Users").await
    }

    pub async fn workers(&self) -> Result<Vec<WorkerDetails>, HordeApiError> {
        send(self.get("/v2/workers"), &[200], "Workers").await
    }

    pub async fn performance(&self) -> Result<PerformanceStats, HordeApiError> {
        send(self.get("/v2/status/performance"), &[200], "Performance").await
    }

    pub async fn news(&self) -> Result<Vec<NewsItem>, HordeApiError> {
        send(self.get("/v2/status/news"), &[200], "News").await
    }

    /// Fetch raw bytes, e.g. an image hosted at an `r2` URL.
    pub async fn download_bytes(&self, url: &str) -> Result<Vec<u8>, HordeApiError> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        if !response.status().is_success() {
            return Err(HordeApiError::Rejected(ResponseFailure {
                status,
                message: format!("Download image: Got response code {status}"),
            }));
        }
        Ok(response.bytes().await?.to_vec())
    }

    // ---- private helpers ----

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_url)
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .header("Client-Agent", &self.client_agent)
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.authed(self.client.get(self.url(path)))
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.authed(self.client.post(self.url(path)))
    }
}

/// Send a request and decode the validated JSON body.
pub(crate) async fn send<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
    expected: &[u16],
    context: &str,
) -> Result<T, HordeApiError> {
    let response = request.send().await?;
    parse_response(response, expected, context).await
}

/// Validate a response against `expected` and decode its body.
///
/// A body that is not JSON is treated as absent, so it fails validation
/// with the status-code message.
pub(crate) async fn parse_response<T: DeserializeOwned>(
    response: reqwest::Response,
    expected: &[u16],
    context: &str,
) -> Result<T, HordeApiError> {
    let status = response.status().as_u16();
    let text = response.text().await?;
    let body: Option<Value> = serde_json::from_str(&text).ok();

    if let Err(failure) = validate_response(status, body.as_ref(), expected, context) {
        tracing::debug!(status, context, "Response rejected");
        return Err(failure.into());
    }

    serde_json::from_value(body.unwrap_or_default()).map_err(|source| HordeApiError::Decode {
        context: context.to_string(),
        source,
    })
}

//! Client for the separate image ratings service.

use crate::api::{send, HordeApiError};
use crate::messages::{DatasetImage, DatasetRating, RatingReceipt};

#[derive(Clone)]
pub struct RatingsApi {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    client_agent: String,
}

impl RatingsApi {
    /// * `api_url` - Base URL including the `/api` prefix, e.g.
    ///   `https://ratings.aihorde.net/api`.
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        client_agent: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client_agent: client_agent.into(),
        }
    }

    /// Fetch the next dataset image to rate.
    pub async fn new_rating(&self) -> Result<DatasetImage, HordeApiError> {
        let request = self.authed(self.client.get(format!("{}/v1/rating/new", self.api_url)));
        send(request, &[200], "New rating").await
    }

    /// Submit a rating. Expects `201 Created`.
    pub async fn submit_rating(
        &self,
        image_id: &str,
        rating: &DatasetRating,
    ) -> Result<RatingReceipt, HordeApiError> {
        let request = self
            .authed(self.client.post(format!("{}/v1/rating/{image_id}", self.api_url)))
            .json(rating);
        send(request, &[201], "Submit rating").await
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .header("Client-Agent", &self.client_agent)
    }
}

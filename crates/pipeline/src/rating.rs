//! Rating: community dataset images and the user's own generations.
//!
//! Unlike generation and interrogation there is nothing to poll; each
//! rating is one request and one response.

use std::future::Future;
use std::sync::Arc;

use horde_client::messages::{
    DatasetImage, DatasetRating, GenerationRating, ImageRating, RatingReceipt,
};
use horde_client::{ErrorReporter, HordeApi, RatingsApi};
use horde_core::error::CoreError;
use horde_core::types::OutputId;
use tokio_util::sync::CancellationToken;

use crate::error::SessionError;
use crate::events::EventBus;
use crate::outputs::OutputStore;
use crate::session::{cancellable, LifecycleKind, SessionState, SessionTracker};

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 10;
pub const MAX_ARTIFACTS: u8 = 5;

pub struct RatingLifecycle {
    api: HordeApi,
    ratings: RatingsApi,
    store: Arc<OutputStore>,
    reporter: Arc<dyn ErrorReporter>,
    tracker: SessionTracker,
}

impl RatingLifecycle {
    pub fn new(
        api: HordeApi,
        ratings: RatingsApi,
        store: Arc<OutputStore>,
        reporter: Arc<dyn ErrorReporter>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            api,
            ratings,
            store,
            reporter,
            tracker: SessionTracker::new(LifecycleKind::Rating, events),
        }
    }

    pub fn state(&self) -> SessionState {
        self.tracker.state()
    }

    /// Fetch the next dataset image awaiting a rating.
    pub async fn fetch_next(&self) -> Result<DatasetImage, SessionError> {
        self.ratings.new_rating().await.map_err(|e| {
            let e = SessionError::from(e);
            self.reporter.report(&e.to_string());
            e
        })
    }

    /// Rate a dataset image.
    pub async fn submit(
        &self,
        image_id: &str,
        rating: u8,
        artifacts: u8,
        cancel: &CancellationToken,
    ) -> Result<RatingReceipt, SessionError> {
        self.guarded(cancel, Some(image_id), |token| async move {
            validate_rating(rating, Some(artifacts))?;
            let body = DatasetRating { rating, artifacts };
            let receipt = cancellable(&token, async {
                self.ratings.submit_rating(image_id, &body).await.map_err(SessionError::from)
            })
            .await?;
            tracing::info!(image_id, rating, reward = receipt.reward, "Dataset image rated");
            Ok(receipt)
        })
        .await
    }

    /// Rate one of the user's own outputs and mark it rated.
    pub async fn rate_output(
        &self,
        output_id: OutputId,
        rating: u8,
        artifacts: Option<u8>,
        cancel: &CancellationToken,
    ) -> Result<RatingReceipt, SessionError> {
        let record = match self.store.get(output_id).await {
            Ok(record) => record,
            Err(e) => {
                self.reporter.report(&e.to_string());
                return Err(e);
            }
        };
        let job_id = record.job_id.clone();

        self.guarded(cancel, job_id.as_deref(), |token| async move {
            validate_rating(rating, artifacts)?;
            if record.rated {
                return Err(CoreError::Conflict(format!("Output {output_id} is already rated")).into());
            }
            let (Some(job_id), Some(generation_id)) = (&record.job_id, &record.generation_id) else {
                return Err(CoreError::Validation(format!(
                    "Output {output_id} has no Horde generation to rate"
                ))
                .into());
            };

            let body = GenerationRating {
                ratings: vec![ImageRating {
                    id: generation_id.clone(),
                    rating,
                    artifacts,
                }],
            };
            let receipt = cancellable(&token, async {
                self.api.rate_generation(job_id, &body).await.map_err(SessionError::from)
            })
            .await?;
            // The Horde has the rating now; record it even if cancelled meanwhile.
            self.store.mark_rated(output_id).await?;
            tracing::info!(output_id, remote_id = %job_id, rating, "Output rated");
            Ok(receipt)
        })
        .await
    }

    /// Run `work` as one rating session with busy guard, state transitions
    /// and reporting. `work` gets the session token and decides which of
    /// its steps may be cancelled.
    async fn guarded<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        remote_id: Option<&str>,
        work: F,
    ) -> Result<T, SessionError>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, SessionError>>,
    {
        let session = match self.tracker.begin(cancel) {
            Ok(session) => session,
            Err(e) => {
                let e = SessionError::from(e);
                self.reporter.report(&e.to_string());
                return Err(e);
            }
        };

        self.tracker.transition(SessionState::Submitting, remote_id);
        let result = work(session.token.clone()).await;

        match result {
            Ok(value) => {
                self.tracker.transition(SessionState::Done, remote_id);
                Ok(value)
            }
            Err(e) => {
                if !e.is_cancelled() {
                    self.reporter.report(&e.to_string());
                }
                self.tracker.finish_with_error(&e, remote_id);
                Err(e)
            }
        }
    }
}

/// Ratings are 1-10; artifact scores 0 (none) to 5 (severe).
pub fn validate_rating(rating: u8, artifacts: Option<u8>) -> Result<(), CoreError> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(CoreError::Validation(format!(
            "Rating must be between {MIN_RATING} and {MAX_RATING}"
        )));
    }
    if artifacts.is_some_and(|a| a > MAX_ARTIFACTS) {
        return Err(CoreError::Validation(format!(
            "Artifacts must be between 0 and {MAX_ARTIFACTS}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn rating_bounds() {
        assert!(validate_rating(1, None).is_ok());
        assert!(validate_rating(10, Some(5)).is_ok());
        assert_matches!(validate_rating(0, None), Err(CoreError::Validation(_)));
        assert_matches!(validate_rating(11, None), Err(CoreError::Validation(_)));
        assert_matches!(validate_rating(5, Some(6)), Err(CoreError::Validation(_)));
    }
}

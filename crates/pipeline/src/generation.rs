//! Image generation lifecycle.
//!
//! Submits a snapshot of the live form, polls `check/<id>` until the Horde
//! reports the request done, then fetches `status/<id>` once and appends
//! every returned image to the [`OutputStore`]. Records are built from the
//! snapshot, so edits to the live form after submission never leak into
//! stored outputs.

use std::sync::Arc;

use horde_client::{ErrorReporter, HordeApi};
use horde_core::media::encode_base64;
use horde_core::params::GenerationRequest;
use horde_core::progress::compute_progress;
use horde_core::registry::OutputRecord;
use horde_core::types::OutputId;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::SessionError;
use crate::events::{EventBus, HordeEvent};
use crate::outputs::OutputStore;
use crate::session::{
    cancellable, poll_until, ActiveSession, LifecycleKind, PollConfig, SessionState,
    SessionTracker,
};

/// Result of a completed generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationOutcome {
    pub remote_id: String,
    /// Positional ids of the new outputs, valid until the next delete.
    pub ids: Vec<OutputId>,
    /// Kudos charged at submission.
    pub kudos: f64,
}

pub struct GenerationLifecycle {
    api: HordeApi,
    store: Arc<OutputStore>,
    reporter: Arc<dyn ErrorReporter>,
    tracker: SessionTracker,
    config: PollConfig,
}

impl GenerationLifecycle {
    pub fn new(
        api: HordeApi,
        store: Arc<OutputStore>,
        reporter: Arc<dyn ErrorReporter>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            api,
            store,
            reporter,
            tracker: SessionTracker::new(LifecycleKind::Generation, events),
            config: PollConfig::generation(),
        }
    }

    pub fn with_config(mut self, config: PollConfig) -> Self {
        self.config = config;
        self
    }

    pub fn state(&self) -> SessionState {
        self.tracker.state()
    }

    pub fn tracker(&self) -> &SessionTracker {
        &self.tracker
    }

    /// Cancel the running generation. Returns `false` when idle.
    pub fn cancel(&self) -> bool {
        self.tracker.cancel()
    }

    /// Submit the current contents of the live form.
    pub async fn run(
        &self,
        form: &RwLock<GenerationRequest>,
        cancel: &CancellationToken,
    ) -> Result<GenerationOutcome, SessionError> {
        let snapshot = form.read().await.clone();
        self.run_request(snapshot, cancel).await
    }

    /// Run one generation to completion.
    ///
    /// Every failure except cancellation is reported before it is returned.
    pub async fn run_request(
        &self,
        request: GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<GenerationOutcome, SessionError> {
        let session = match self.tracker.begin(cancel) {
            Ok(session) => session,
            Err(e) => {
                let e = SessionError::from(e);
                self.reporter.report(&e.to_string());
                return Err(e);
            }
        };

        let mut remote_id = None;
        let result = self.execute(&request, &session, &mut remote_id).await;

        match result {
            Ok(outcome) => {
                self.tracker
                    .transition(SessionState::Done, Some(&outcome.remote_id));
                Ok(outcome)
            }
            Err(e) => {
                if let (Some(id), SessionError::Cancelled | SessionError::TimedOut(_)) =
                    (remote_id.as_deref(), &e)
                {
                    self.cancel_remote(id).await;
                }
                if !e.is_cancelled() {
                    tracing::warn!(
                        session_id = %session.session_id,
                        remote_id = remote_id.as_deref().unwrap_or("-"),
                        error = %e,
                        "Generation failed"
                    );
                    self.reporter.report(&e.to_string());
                }
                self.tracker.finish_with_error(&e, remote_id.as_deref());
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        request: &GenerationRequest,
        session: &ActiveSession<'_>,
        remote_id: &mut Option<String>,
    ) -> Result<GenerationOutcome, SessionError> {
        request.validate_for_submit()?;

        self.tracker.transition(SessionState::Submitting, None);
        let body = request.to_submit_body();
        let submitted = cancellable(&session.token, async {
            self.api.submit_generation(&body).await.map_err(SessionError::from)
        })
        .await?;
        let id = submitted.id.clone();
        *remote_id = Some(id.clone());
        tracing::info!(
            session_id = %session.session_id,
            remote_id = %id,
            kudos = submitted.kudos,
            "Generation submitted"
        );

        self.tracker.transition(SessionState::Polling, Some(&id));
        self.poll(&id, &session.token).await?;

        let records = cancellable(&session.token, self.collect(request, &id)).await?;
        let ids = self.store.append_many(records).await?;
        tracing::info!(
            session_id = %session.session_id,
            remote_id = %id,
            images = ids.len(),
            "Generation finished"
        );
        self.tracker.events().publish(HordeEvent::OutputsAdded {
            remote_id: id.clone(),
            ids: ids.clone(),
        });

        Ok(GenerationOutcome {
            remote_id: id,
            ids,
            kudos: submitted.kudos,
        })
    }

    async fn poll(&self, id: &str, cancel: &CancellationToken) -> Result<(), SessionError> {
        let api = &self.api;
        let events = self.tracker.events();
        poll_until(&self.config, cancel, |elapsed| async move {
            let status = api.check_generation(id).await?;
            if status.faulted {
                return Err(SessionError::Faulted("Generation faulted".to_string()));
            }
            if !status.is_possible {
                return Err(SessionError::Faulted(
                    "No worker can currently fulfil this request".to_string(),
                ));
            }

            let progress = compute_progress(status.wait_time, elapsed.as_secs_f64());
            tracing::debug!(remote_id = %id, progress, queue_position = status.queue_position, "Generation progress");
            events.publish(HordeEvent::Progress {
                kind: LifecycleKind::Generation,
                remote_id: id.to_string(),
                progress,
                queue_position: status.queue_position,
                wait_time: status.wait_time,
            });

            Ok(status.done.then_some(()))
        })
        .await
    }

    /// Fetch the finished images and build records from the snapshot.
    ///
    /// Nothing is stored here, so a failed download leaves the store as it was.
    async fn collect(
        &self,
        request: &GenerationRequest,
        id: &str,
    ) -> Result<Vec<OutputRecord>, SessionError> {
        let status = self.api.generation_status(id).await?;
        if status.faulted {
            return Err(SessionError::Faulted("Generation faulted".to_string()));
        }

        let mut records = Vec::with_capacity(status.generations.len());
        for generation in status.generations {
            let image = if is_remote(&generation.img) {
                encode_base64(&self.api.download_bytes(&generation.img).await?)
            } else {
                generation.img
            };

            records.push(OutputRecord {
                id: 0,
                storage_key: None,
                image,
                prompt: request.prompt.clone(),
                request: request.clone(),
                seed: generation.seed,
                model: generation.model,
                worker_id: generation.worker_id,
                worker_name: generation.worker_name,
                job_id: Some(id.to_string()),
                generation_id: generation.id,
                starred: false,
                rated: false,
                censored: generation.censored,
                created_at: chrono::Utc::now(),
            });
        }
        Ok(records)
    }

    async fn cancel_remote(&self, id: &str) {
        match self.api.cancel_generation(id).await {
            Ok(status) => {
                tracing::info!(remote_id = %id, finished = status.finished, "Generation cancelled");
            }
            Err(e) => {
                tracing::warn!(remote_id = %id, error = %e, "Failed to cancel generation");
            }
        }
    }
}

fn is_remote(img: &str) -> bool {
    img.starts_with("https://") || img.starts_with("http://")
}

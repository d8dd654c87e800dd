//! Image interrogation lifecycle (caption, NSFW check, tag ranking).

use std::sync::Arc;

use horde_client::messages::{FormStatus, InterrogationForm, InterrogationRequest};
use horde_client::{ErrorReporter, HordeApi};
use horde_core::error::CoreError;
use horde_core::progress::forms_progress;
use tokio_util::sync::CancellationToken;

use crate::error::SessionError;
use crate::events::{EventBus, HordeEvent};
use crate::session::{
    cancellable, poll_until, ActiveSession, LifecycleKind, PollConfig, SessionState,
    SessionTracker,
};

#[derive(Debug, Clone, PartialEq)]
pub struct InterrogationOutcome {
    pub remote_id: String,
    pub forms: Vec<FormStatus>,
}

impl InterrogationOutcome {
    /// The result object for `form`, if that form finished.
    pub fn result(&self, form: InterrogationForm) -> Option<&serde_json::Value> {
        self.forms
            .iter()
            .find(|f| f.form == form)
            .and_then(|f| f.result.as_ref())
    }
}

pub struct InterrogationLifecycle {
    api: HordeApi,
    reporter: Arc<dyn ErrorReporter>,
    tracker: SessionTracker,
    config: PollConfig,
}

impl InterrogationLifecycle {
    pub fn new(api: HordeApi, reporter: Arc<dyn ErrorReporter>, events: Arc<EventBus>) -> Self {
        Self {
            api,
            reporter,
            tracker: SessionTracker::new(LifecycleKind::Interrogation, events),
            config: PollConfig::interrogation(),
        }
    }

    pub fn with_config(mut self, config: PollConfig) -> Self {
        self.config = config;
        self
    }

    pub fn state(&self) -> SessionState {
        self.tracker.state()
    }

    pub fn cancel(&self) -> bool {
        self.tracker.cancel()
    }

    /// Interrogate `source_image` (a URL or base64 payload).
    pub async fn run(
        &self,
        source_image: &str,
        forms: &[InterrogationForm],
        cancel: &CancellationToken,
    ) -> Result<InterrogationOutcome, SessionError> {
        let session = match self.tracker.begin(cancel) {
            Ok(session) => session,
            Err(e) => {
                let e = SessionError::from(e);
                self.reporter.report(&e.to_string());
                return Err(e);
            }
        };

        let mut remote_id = None;
        match self.execute(source_image, forms, &session, &mut remote_id).await {
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
                        "Interrogation failed"
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
        source_image: &str,
        forms: &[InterrogationForm],
        session: &ActiveSession<'_>,
        remote_id: &mut Option<String>,
    ) -> Result<InterrogationOutcome, SessionError> {
        if source_image.trim().is_empty() {
            return Err(CoreError::Validation("Interrogation requires a source image".into()).into());
        }
        if forms.is_empty() {
            return Err(CoreError::Validation("Select at least one interrogation form".into()).into());
        }

        self.tracker.transition(SessionState::Submitting, None);
        let body = InterrogationRequest::new(source_image, forms);
        let submitted = cancellable(&session.token, async {
            self.api.submit_interrogation(&body).await.map_err(SessionError::from)
        })
        .await?;
        let id = submitted.id;
        *remote_id = Some(id.clone());
        tracing::info!(session_id = %session.session_id, remote_id = %id, "Interrogation submitted");

        self.tracker.transition(SessionState::Polling, Some(&id));
        let api = &self.api;
        let events = self.tracker.events();
        let remote = id.as_str();
        let forms = poll_until(&self.config, &session.token, |_| async move {
            let status = api.interrogation_status(remote).await?;
            if status.is_faulted() {
                return Err(SessionError::Faulted(format!(
                    "Interrogation {}",
                    status.state
                )));
            }

            let done = status.forms.iter().filter(|f| f.state == "done").count();
            events.publish(HordeEvent::Progress {
                kind: LifecycleKind::Interrogation,
                remote_id: remote.to_string(),
                progress: forms_progress(done, status.forms.len()),
                queue_position: 0,
                wait_time: 0.0,
            });

            Ok(status.is_done().then_some(status.forms))
        })
        .await?;

        Ok(InterrogationOutcome {
            remote_id: id,
            forms,
        })
    }

    async fn cancel_remote(&self, id: &str) {
        match self.api.cancel_interrogation(id).await {
            Ok(status) => {
                tracing::info!(remote_id = %id, state = %status.state, "Interrogation cancelled");
            }
            Err(e) => {
                tracing::warn!(remote_id = %id, error = %e, "Failed to cancel interrogation");
            }
        }
    }
}

//! Horde request and response payloads.
//!
//! Response types default every field the Horde may omit, so a partial
//! body that passed validation still decodes.

use horde_core::leaderboard::UserStanding;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Body returned by the async submit endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    /// Remote id of the queued request.
    pub id: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub kudos: f64,
}

/// Snapshot returned by `generate/check` and `generate/status`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RequestStatus {
    pub finished: u32,
    pub processing: u32,
    pub restarted: u32,
    pub waiting: u32,
    pub done: bool,
    pub faulted: bool,
    /// Estimated seconds until done.
    pub wait_time: f64,
    pub queue_position: u32,
    pub kudos: f64,
    pub is_possible: bool,
    /// Only populated by `generate/status`.
    pub generations: Vec<Generation>,
}

impl Default for RequestStatus {
    fn default() -> Self {
        Self {
            finished: 0,
            processing: 0,
            restarted: 0,
            waiting: 0,
            done: false,
            faulted: false,
            wait_time: 0.0,
            queue_position: 0,
            kudos: 0.0,
            is_possible: true,
            generations: Vec::new(),
        }
    }
}

/// One finished image.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Generation {
    /// Base64 WEBP, or a download URL when the request set `r2`.
    pub img: String,
    #[serde(default)]
    pub seed: String,
    #[serde(default)]
    pub censored: bool,
    #[serde(default)]
    pub worker_id: Option<String>,
    #[serde(default)]
    pub worker_name: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    /// Generation id, used for rating.
    #[serde(default)]
    pub id: Option<String>,
}

/// Body for `POST /v2/generate/rate/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRating {
    pub ratings: Vec<ImageRating>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageRating {
    /// Generation id being rated.
    pub id: String,
    /// 1-10.
    pub rating: u8,
    /// 0 (none) to 5 (severe).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<u8>,
}

/// Reward returned for a rating.
#[derive(Debug, Clone, Deserialize)]
pub struct RatingReceipt {
    #[serde(default)]
    pub reward: f64,
    #[serde(default)]
    pub message: Option<String>,
}

// ---------------------------------------------------------------------------
// Interrogation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterrogationForm {
    Caption,
    Nsfw,
    Interrogation,
}

impl std::str::FromStr for InterrogationForm {
    type Err = horde_core::error::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "caption" => Ok(Self::Caption),
            "nsfw" => Ok(Self::Nsfw),
            "interrogation" => Ok(Self::Interrogation),
            other => Err(horde_core::error::CoreError::Validation(format!(
                "Invalid interrogation form '{other}'. Must be one of: caption, nsfw, interrogation"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FormRequest {
    pub name: InterrogationForm,
}

/// Body for `POST /v2/interrogate/async`.
#[derive(Debug, Clone, Serialize)]
pub struct InterrogationRequest {
    pub forms: Vec<FormRequest>,
    /// Image URL or base64 payload.
    pub source_image: String,
    pub slow_workers: bool,
}

impl InterrogationRequest {
    pub fn new(source_image: impl Into<String>, forms: &[InterrogationForm]) -> Self {
        Self {
            forms: forms.iter().map(|&name| FormRequest { name }).collect(),
            source_image: source_image.into(),
            slow_workers: true,
        }
    }
}

/// Body returned by `GET /v2/interrogate/status/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct InterrogationStatus {
    /// `waiting`, `processing`, `done`, `faulted` or `cancelled`.
    pub state: String,
    pub forms: Vec<FormStatus>,
}

impl InterrogationStatus {
    pub fn is_done(&self) -> bool {
        self.state == "done"
    }

    pub fn is_faulted(&self) -> bool {
        matches!(self.state.as_str(), "faulted" | "cancelled")
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FormStatus {
    pub form: InterrogationForm,
    #[serde(default)]
    pub state: String,
    /// Form-specific result, e.g. `{"caption": "..."}`.
    #[serde(default)]
    pub result: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Users, workers, status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserDetails {
    pub id: i64,
    pub username: String,
    pub kudos: f64,
    pub kudos_details: Option<serde_json::Value>,
    pub worker_count: u32,
    pub usage: UsageDetails,
    pub contributions: ContributionDetails,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageDetails {
    pub megapixelsteps: f64,
    pub requests: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContributionDetails {
    pub megapixelsteps: f64,
    pub fulfillments: u64,
}

impl From<&UserDetails> for UserStanding {
    fn from(user: &UserDetails) -> Self {
        UserStanding {
            id: user.id,
            username: user.username.clone(),
            kudos: user.kudos,
            megapixelsteps: user.contributions.megapixelsteps,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerDetails {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub worker_type: String,
    pub online: bool,
    pub trusted: bool,
    pub maintenance_mode: bool,
    pub models: Vec<String>,
    /// Human-readable speed, e.g. `"1.2 megapixelsteps per second"`.
    pub performance: String,
    /// Seconds.
    pub uptime: u64,
    pub requests_fulfilled: u64,
    pub kudos_rewards: f64,
    pub megapixelsteps_generated: f64,
    pub max_pixels: u64,
    pub nsfw: bool,
    pub img2img: bool,
    pub painting: bool,
    #[serde(rename = "post-processing")]
    pub post_processing: bool,
}

/// Body of `GET /v2/status/performance`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceStats {
    pub queued_requests: u64,
    pub queued_megapixelsteps: f64,
    pub past_minute_megapixelsteps: f64,
    pub worker_count: u32,
    pub thread_count: u32,
    pub interrogator_count: u32,
    pub queued_forms: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsItem {
    pub date_published: String,
    pub newspiece: String,
    pub importance: String,
}

// ---------------------------------------------------------------------------
// Ratings service
// ---------------------------------------------------------------------------

/// An image to rate, from `GET /v1/rating/new`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DatasetImage {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub dataset_id: Option<String>,
}

/// Body for `POST /v1/rating/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetRating {
    /// 1-10.
    pub rating: u8,
    /// 0-5.
    pub artifacts: u8,
}

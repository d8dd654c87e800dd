//! Generation request parameters and submit-time validation.
//!
//! [`GenerationRequest`] mirrors the JSON body accepted by
//! `POST /api/v2/generate/async`. The live form state in the front end is
//! one of these; the lifecycle deep-copies it at submit time and builds
//! every output from that copy.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Defaults and limits
// ---------------------------------------------------------------------------

/// Separator the Horde uses between the prompt and the negative prompt.
pub const NEGATIVE_PROMPT_SEPARATOR: &str = " ### ";

pub const DEFAULT_SAMPLER: &str = "k_euler_a";
pub const DEFAULT_STEPS: u32 = 30;
pub const DEFAULT_CFG_SCALE: f32 = 7.0;
pub const DEFAULT_DIMENSION: u32 = 512;

/// Width and height must be multiples of this value.
pub const DIMENSION_STEP: u32 = 64;

/// Samplers accepted by the Horde.
pub const VALID_SAMPLERS: &[&str] = &[
    "k_lms",
    "k_heun",
    "k_euler",
    "k_euler_a",
    "k_dpm_2",
    "k_dpm_2_a",
    "k_dpm_fast",
    "k_dpm_adaptive",
    "k_dpmpp_2s_a",
    "k_dpmpp_2m",
    "k_dpmpp_sde",
    "dpmsolver",
    "DDIM",
    "lcm",
];

/// Post-processors accepted by the Horde.
pub const VALID_POST_PROCESSORS: &[&str] = &[
    "GFPGAN",
    "RealESRGAN_x4plus",
    "RealESRGAN_x2plus",
    "RealESRGAN_x4plus_anime_6B",
    "NMKD_Siax",
    "4x_AnimeSharp",
    "CodeFormers",
    "strip_background",
];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// How a source image is used by the generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceProcessing {
    Img2img,
    Inpainting,
    Outpainting,
}

/// The parameter bag nested under `params` in the submit body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct GenerationParams {
    #[validate(custom(function = "validate_sampler"))]
    pub sampler_name: String,
    #[validate(range(min = 0.0, max = 100.0))]
    pub cfg_scale: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.01, max = 1.0))]
    pub denoising_strength: Option<f32>,
    /// Seeds are strings on the wire; empty means "server picks".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<String>,
    #[validate(range(min = 64, max = 3072), custom(function = "validate_dimension"))]
    pub height: u32,
    #[validate(range(min = 64, max = 3072), custom(function = "validate_dimension"))]
    pub width: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, max = 1000))]
    pub seed_variation: Option<u32>,
    #[serde(default)]
    #[validate(custom(function = "validate_post_processing"))]
    pub post_processing: Vec<String>,
    #[serde(default)]
    pub karras: bool,
    #[serde(default)]
    pub tiling: bool,
    #[serde(default)]
    pub hires_fix: bool,
    #[serde(default = "default_clip_skip")]
    #[validate(range(min = 1, max = 12))]
    pub clip_skip: u32,
    #[validate(range(min = 1, max = 500))]
    pub steps: u32,
    /// Number of images requested.
    #[serde(default = "default_n")]
    #[validate(range(min = 1, max = 20))]
    pub n: u32,
}

fn default_clip_skip() -> u32 {
    1
}

fn default_n() -> u32 {
    1
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            sampler_name: DEFAULT_SAMPLER.to_string(),
            cfg_scale: DEFAULT_CFG_SCALE,
            denoising_strength: None,
            seed: None,
            height: DEFAULT_DIMENSION,
            width: DEFAULT_DIMENSION,
            seed_variation: None,
            post_processing: Vec::new(),
            karras: true,
            tiling: false,
            hires_fix: false,
            clip_skip: default_clip_skip(),
            steps: DEFAULT_STEPS,
            n: default_n(),
        }
    }
}

/// A complete generation submission.
///
/// `prompt` holds only the positive prompt; [`GenerationRequest::full_prompt`]
/// joins in the negative prompt the way the Horde expects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    #[validate(nested)]
    pub params: GenerationParams,
    #[serde(default)]
    pub nsfw: bool,
    #[serde(default)]
    pub censor_nsfw: bool,
    #[serde(default)]
    pub trusted_workers: bool,
    #[serde(default = "default_true")]
    pub slow_workers: bool,
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default)]
    pub workers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_mask: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_processing: Option<SourceProcessing>,
    #[serde(default = "default_true")]
    pub r2: bool,
    #[serde(default)]
    pub shared: bool,
    #[serde(default)]
    pub replacement_filter: bool,
}

fn default_true() -> bool {
    true
}

impl Default for GenerationRequest {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            negative_prompt: None,
            params: GenerationParams::default(),
            nsfw: false,
            censor_nsfw: false,
            trusted_workers: false,
            slow_workers: true,
            models: Vec::new(),
            workers: Vec::new(),
            source_image: None,
            source_mask: None,
            source_processing: None,
            r2: true,
            shared: false,
            replacement_filter: false,
        }
    }
}

impl GenerationRequest {
    /// Create a text-to-image request with default parameters.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    /// The prompt as sent to the Horde: `positive ### negative`.
    pub fn full_prompt(&self) -> String {
        match self.negative_prompt.as_deref().map(str::trim) {
            Some(negative) if !negative.is_empty() => {
                format!("{}{NEGATIVE_PROMPT_SEPARATOR}{negative}", self.prompt.trim())
            }
            _ => self.prompt.trim().to_string(),
        }
    }

    /// Build the JSON body for `POST /generate/async`.
    ///
    /// Differs from plain serialization in that the negative prompt is
    /// folded into `prompt` and `source_processing` is only sent when a
    /// source image is present.
    pub fn to_submit_body(&self) -> serde_json::Value {
        let mut body = serde_json::json!({
            "prompt": self.full_prompt(),
            "params": self.params,
            "nsfw": self.nsfw,
            "censor_nsfw": self.censor_nsfw,
            "trusted_workers": self.trusted_workers,
            "slow_workers": self.slow_workers,
            "r2": self.r2,
            "shared": self.shared,
            "replacement_filter": self.replacement_filter,
        });

        if !self.models.is_empty() {
            body["models"] = serde_json::json!(self.models);
        }
        if !self.workers.is_empty() {
            body["workers"] = serde_json::json!(self.workers);
        }
        if let Some(source) = &self.source_image {
            body["source_image"] = serde_json::json!(source);
            body["source_processing"] =
                serde_json::json!(self.source_processing.unwrap_or(SourceProcessing::Img2img));
            if let Some(mask) = &self.source_mask {
                body["source_mask"] = serde_json::json!(mask);
            }
        }
        body
    }

    /// Check local preconditions before any network call is made.
    ///
    /// - The prompt must not be blank.
    /// - Inpainting needs both a source image and a mask; img2img and
    ///   outpainting need a source image.
    /// - All parameter ranges must hold.
    pub fn validate_for_submit(&self) -> Result<(), CoreError> {
        if self.prompt.trim().is_empty() {
            return Err(CoreError::Validation("Prompt must not be empty".to_string()));
        }

        match self.source_processing {
            Some(SourceProcessing::Inpainting) => {
                if self.source_image.is_none() {
                    return Err(CoreError::Validation(
                        "Inpainting requires a source image".to_string(),
                    ));
                }
                if self.source_mask.is_none() {
                    return Err(CoreError::Validation(
                        "Inpainting requires a mask".to_string(),
                    ));
                }
            }
            Some(mode) if self.source_image.is_none() => {
                return Err(CoreError::Validation(format!(
                    "{mode:?} requires a source image"
                )));
            }
            _ => {}
        }

        self.validate()
            .map_err(|e| CoreError::Validation(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Custom validators
// ---------------------------------------------------------------------------

fn validate_dimension(value: u32) -> Result<(), ValidationError> {
    if value % DIMENSION_STEP == 0 {
        Ok(())
    } else {
        Err(ValidationError::new("multiple_of_64"))
    }
}

fn validate_sampler(value: &str) -> Result<(), ValidationError> {
    if VALID_SAMPLERS.contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::new("unknown_sampler"))
    }
}

fn validate_post_processing(values: &[String]) -> Result<(), ValidationError> {
    if values
        .iter()
        .all(|v| VALID_POST_PROCESSORS.contains(&v.as_str()))
    {
        Ok(())
    } else {
        Err(ValidationError::new("unknown_post_processor"))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn default_request_is_valid_once_prompt_is_set() {
        let request = GenerationRequest::new("a cat");
        assert!(request.validate_for_submit().is_ok());
    }

    #[test]
    fn blank_prompt_is_rejected() {
        let request = GenerationRequest::new("   ");
        let err = request.validate_for_submit().unwrap_err();
        assert_matches!(err, CoreError::Validation(msg) if msg.contains("Prompt"));
    }

    #[test]
    fn dimensions_must_be_multiples_of_64() {
        let mut request = GenerationRequest::new("a cat");
        request.params.width = 500;
        assert!(request.validate_for_submit().is_err());

        request.params.width = 576;
        assert!(request.validate_for_submit().is_ok());
    }

    #[test]
    fn steps_out_of_range_are_rejected() {
        let mut request = GenerationRequest::new("a cat");
        request.params.steps = 0;
        assert!(request.validate_for_submit().is_err());
        request.params.steps = 501;
        assert!(request.validate_for_submit().is_err());
    }

    #[test]
    fn unknown_sampler_is_rejected() {
        let mut request = GenerationRequest::new("a cat");
        request.params.sampler_name = "k_nonsense".into();
        assert!(request.validate_for_submit().is_err());
    }

    #[test]
    fn unknown_post_processor_is_rejected() {
        let mut request = GenerationRequest::new("a cat");
        request.params.post_processing = vec!["GFPGAN".into(), "Sharpen9000".into()];
        assert!(request.validate_for_submit().is_err());
    }

    #[test]
    fn inpainting_requires_source_and_mask() {
        let mut request = GenerationRequest::new("a cat");
        request.source_processing = Some(SourceProcessing::Inpainting);
        assert!(request.validate_for_submit().is_err());

        request.source_image = Some("aGVsbG8=".into());
        assert!(request.validate_for_submit().is_err());

        request.source_mask = Some("aGVsbG8=".into());
        assert!(request.validate_for_submit().is_ok());
    }

    #[test]
    fn img2img_requires_source_image() {
        let mut request = GenerationRequest::new("a cat");
        request.source_processing = Some(SourceProcessing::Img2img);
        assert!(request.validate_for_submit().is_err());
    }

    #[test]
    fn full_prompt_joins_negative() {
        let mut request = GenerationRequest::new("a cat ");
        assert_eq!(request.full_prompt(), "a cat");

        request.negative_prompt = Some("blurry".into());
        assert_eq!(request.full_prompt(), "a cat ### blurry");

        request.negative_prompt = Some("  ".into());
        assert_eq!(request.full_prompt(), "a cat");
    }

    #[test]
    fn submit_body_omits_source_fields_for_txt2img() {
        let request = GenerationRequest::new("a cat");
        let body = request.to_submit_body();
        assert_eq!(body["prompt"], "a cat");
        assert_eq!(body["params"]["steps"], DEFAULT_STEPS);
        assert!(body.get("source_image").is_none());
        assert!(body.get("source_processing").is_none());
        assert!(body.get("models").is_none());
    }

    #[test]
    fn submit_body_includes_source_fields_for_img2img() {
        let mut request = GenerationRequest::new("a cat");
        request.source_image = Some("aGVsbG8=".into());
        request.models = vec!["stable_diffusion".into()];
        let body = request.to_submit_body();
        assert_eq!(body["source_image"], "aGVsbG8=");
        assert_eq!(body["source_processing"], "img2img");
        assert_eq!(body["models"][0], "stable_diffusion");
    }

    #[test]
    fn params_omit_unset_seed() {
        let params = GenerationParams::default();
        let json = serde_json::to_value(&params).unwrap();
        assert!(json.get("seed").is_none());
        assert_eq!(json["sampler_name"], DEFAULT_SAMPLER);
    }
}

//! Share links.
//!
//! A share payload is the JSON form of [`SharedParams`], raw-deflate
//! compressed and then encoded as URL-safe base64 without padding. It
//! travels in the `share` query parameter.

use std::io::{Read, Write};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::params::{GenerationRequest, NEGATIVE_PROMPT_SEPARATOR};

/// Name of the query parameter carrying a share payload.
pub const SHARE_PARAM: &str = "share";

/// Upper bound on the inflated payload, to refuse deflate bombs.
const MAX_INFLATED_BYTES: u64 = 64 * 1024;

/// The parameter subset that can be carried in a link.
///
/// Every field is optional; absent fields leave the form default alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SharedParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampler_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cfg_scale: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub karras: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_processing: Option<Vec<String>>,
}

impl SharedParams {
    /// Capture the shareable part of a request. The prompt is stored in
    /// its joined `positive ### negative` form.
    pub fn from_request(request: &GenerationRequest) -> Self {
        let params = &request.params;
        Self {
            prompt: Some(request.full_prompt()),
            sampler_name: Some(params.sampler_name.clone()),
            seed: params.seed.clone().filter(|s| !s.is_empty()),
            model_name: request.models.first().cloned(),
            steps: Some(params.steps),
            cfg_scale: Some(params.cfg_scale),
            height: Some(params.height),
            width: Some(params.width),
            karras: Some(params.karras),
            post_processing: (!params.post_processing.is_empty())
                .then(|| params.post_processing.clone()),
        }
    }

    /// Fill every field that is unset here from `other`.
    pub fn or(self, other: SharedParams) -> Self {
        Self {
            prompt: self.prompt.or(other.prompt),
            sampler_name: self.sampler_name.or(other.sampler_name),
            seed: self.seed.or(other.seed),
            model_name: self.model_name.or(other.model_name),
            steps: self.steps.or(other.steps),
            cfg_scale: self.cfg_scale.or(other.cfg_scale),
            height: self.height.or(other.height),
            width: self.width.or(other.width),
            karras: self.karras.or(other.karras),
            post_processing: self.post_processing.or(other.post_processing),
        }
    }

    /// Overwrite the matching fields of `request`.
    pub fn apply_to(&self, request: &mut GenerationRequest) {
        if let Some(prompt) = &self.prompt {
            match prompt.split_once(NEGATIVE_PROMPT_SEPARATOR) {
                Some((positive, negative)) => {
                    request.prompt = positive.to_string();
                    request.negative_prompt = Some(negative.to_string());
                }
                None => {
                    request.prompt = prompt.clone();
                    request.negative_prompt = None;
                }
            }
        }
        if let Some(model) = &self.model_name {
            request.models = vec![model.clone()];
        }
        let params = &mut request.params;
        if let Some(sampler) = &self.sampler_name {
            params.sampler_name = sampler.clone();
        }
        if let Some(seed) = &self.seed {
            params.seed = Some(seed.clone());
        }
        if let Some(steps) = self.steps {
            params.steps = steps;
        }
        if let Some(cfg) = self.cfg_scale {
            params.cfg_scale = cfg;
        }
        if let Some(height) = self.height {
            params.height = height;
        }
        if let Some(width) = self.width {
            params.width = width;
        }
        if let Some(karras) = self.karras {
            params.karras = karras;
        }
        if let Some(post) = &self.post_processing {
            params.post_processing = post.clone();
        }
    }
}

/// Encode params into a `share` payload.
pub fn encode_share(params: &SharedParams) -> Result<String, CoreError> {
    let json = serde_json::to_vec(params).map_err(|e| CoreError::Internal(e.to_string()))?;
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
    encoder
        .write_all(&json)
        .map_err(|e| CoreError::Internal(e.to_string()))?;
    let compressed = encoder
        .finish()
        .map_err(|e| CoreError::Internal(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(compressed))
}

/// Decode a `share` payload. Trailing `=` padding is tolerated.
pub fn decode_share(payload: &str) -> Result<SharedParams, CoreError> {
    let compressed = URL_SAFE_NO_PAD
        .decode(payload.trim().trim_end_matches('='))
        .map_err(|e| CoreError::Validation(format!("Invalid share link: {e}")))?;

    let mut json = Vec::new();
    DeflateDecoder::new(compressed.as_slice())
        .take(MAX_INFLATED_BYTES)
        .read_to_end(&mut json)
        .map_err(|e| CoreError::Validation(format!("Invalid share link: {e}")))?;

    serde_json::from_slice(&json)
        .map_err(|e| CoreError::Validation(format!("Invalid share link: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn payload_is_url_safe() {
        let params = SharedParams {
            prompt: Some("a cat??? >>> on a mat ### dogs".into()),
            steps: Some(40),
            ..Default::default()
        };
        let encoded = encode_share(&params).unwrap();
        assert!(encoded
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_eq!(decode_share(&encoded).unwrap(), params);
    }

    #[test]
    fn garbage_is_a_validation_error() {
        assert_matches!(decode_share("not*base64"), Err(CoreError::Validation(_)));
        assert_matches!(decode_share("aGVsbG8"), Err(CoreError::Validation(_)));
    }

    #[test]
    fn request_survives_a_share_link() {
        let mut request = GenerationRequest::new("a cat");
        request.negative_prompt = Some("blurry".into());
        request.params.steps = 42;
        request.params.seed = Some("1234".into());
        request.models = vec!["Deliberate".into()];

        let link = encode_share(&SharedParams::from_request(&request)).unwrap();
        let mut restored = GenerationRequest::default();
        decode_share(&link).unwrap().apply_to(&mut restored);

        assert_eq!(restored.prompt, "a cat");
        assert_eq!(restored.negative_prompt.as_deref(), Some("blurry"));
        assert_eq!(restored.params.steps, 42);
        assert_eq!(restored.params.seed.as_deref(), Some("1234"));
        assert_eq!(restored.models, vec!["Deliberate".to_string()]);
    }

    #[test]
    fn or_prefers_self() {
        let explicit = SharedParams {
            steps: Some(10),
            ..Default::default()
        };
        let shared = SharedParams {
            steps: Some(50),
            width: Some(768),
            ..Default::default()
        };
        let merged = explicit.or(shared);
        assert_eq!(merged.steps, Some(10));
        assert_eq!(merged.width, Some(768));
    }
}

//! Initial form state from URL query parameters.
//!
//! Recognised parameters: `prompt`, `sampler_name`, `seed`, `model_name`,
//! `steps`, `cfg_scale`, `height`, `width`, `karras`, `post_processing`
//! (comma separated) and `share`. When both a `share` payload and an
//! explicit parameter set the same field, the explicit parameter wins.

use std::str::FromStr;

use url::Url;

use crate::error::CoreError;
use crate::params::GenerationRequest;
use crate::share::{self, SharedParams, SHARE_PARAM};

/// Parse a query string (with or without the leading `?`).
///
/// Unknown parameters are ignored. Empty values are treated as absent.
pub fn parse_query(query: &str) -> Result<SharedParams, CoreError> {
    let query = query.strip_prefix('?').unwrap_or(query);
    let mut explicit = SharedParams::default();
    let mut shared = None;

    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match &*key {
            "prompt" => explicit.prompt = Some(value.to_string()),
            "sampler_name" => explicit.sampler_name = Some(value.to_string()),
            "seed" => explicit.seed = Some(value.to_string()),
            "model_name" => explicit.model_name = Some(value.to_string()),
            "steps" => explicit.steps = Some(parse_number("steps", value)?),
            "cfg_scale" => explicit.cfg_scale = Some(parse_number("cfg_scale", value)?),
            "height" => explicit.height = Some(parse_number("height", value)?),
            "width" => explicit.width = Some(parse_number("width", value)?),
            "karras" => explicit.karras = Some(parse_flag(value)),
            "post_processing" => {
                explicit.post_processing = Some(
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect(),
                );
            }
            SHARE_PARAM => shared = Some(share::decode_share(value)?),
            _ => {}
        }
    }

    Ok(match shared {
        Some(shared) => explicit.or(shared),
        None => explicit,
    })
}

/// Build the initial form state for a query string.
pub fn initial_request(query: &str) -> Result<GenerationRequest, CoreError> {
    let mut request = GenerationRequest::default();
    parse_query(query)?.apply_to(&mut request);
    Ok(request)
}

/// Build the initial form state from a full URL.
pub fn request_from_url(url: &Url) -> Result<GenerationRequest, CoreError> {
    initial_request(url.query().unwrap_or_default())
}

/// A link to `base` that reproduces `request` through the `share` parameter.
pub fn share_url(base: &Url, request: &GenerationRequest) -> Result<Url, CoreError> {
    let payload = share::encode_share(&SharedParams::from_request(request))?;
    let mut url = base.clone();
    url.query_pairs_mut()
        .clear()
        .append_pair(SHARE_PARAM, &payload);
    Ok(url)
}

fn parse_number<T: FromStr>(name: &str, value: &str) -> Result<T, CoreError> {
    value
        .parse()
        .map_err(|_| CoreError::Validation(format!("Invalid value '{value}' for {name}")))
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

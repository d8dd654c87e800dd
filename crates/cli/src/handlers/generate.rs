//! `generate` and `share`.

use std::path::Path;

use anyhow::{bail, Context, Result};
use horde_core::media::{decode_image, encode_base64, encode_image, DownloadFormat};
use horde_core::params::{GenerationRequest, SourceProcessing};
use horde_core::query::{parse_query, share_url};
use horde_core::share::{decode_share, SharedParams};
use horde_pipeline::events::HordeEvent;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::RwLock;
use url::Url;

use crate::cli::GenerateArgs;
use crate::context::{cancel_on_ctrl_c, AppContext};

pub async fn execute(ctx: &AppContext, form: &GenerateArgs) -> Result<()> {
    let live = RwLock::new(build_request(form)?);
    let lifecycle = ctx.generation();
    let cancel = cancel_on_ctrl_c();

    let progress = tokio::spawn(print_progress(ctx.events.subscribe()));
    let result = lifecycle.run(&live, &cancel).await;
    progress.abort();
    eprintln!();

    let outcome = result?;
    println!("Request {} finished, {} kudos.", outcome.remote_id, outcome.kudos);
    for record in ctx.store.get_many(&outcome.ids).await? {
        println!(
            "  #{:<4} seed {:<12} {} ({})",
            record.id,
            record.seed,
            record.model.as_deref().unwrap_or("--"),
            record.worker_name.as_deref().unwrap_or("unknown worker"),
        );
    }
    if !ctx.store.is_persistent() {
        println!("Storage is unavailable; these outputs will not be kept.");
    }
    Ok(())
}

pub fn share(form: &GenerateArgs, base_url: &str) -> Result<()> {
    let request = build_request(form)?;
    let base = Url::parse(base_url).with_context(|| format!("Invalid base URL '{base_url}'"))?;
    println!("{}", share_url(&base, &request)?);
    Ok(())
}

/// Turn the command-line form into a request.
///
/// Precedence, highest first: explicit flags, `--share`, `--url`.
pub fn build_request(form: &GenerateArgs) -> Result<GenerationRequest> {
    let from_url = match &form.url {
        Some(raw) => {
            let url = Url::parse(raw).with_context(|| format!("Invalid URL '{raw}'"))?;
            parse_query(url.query().unwrap_or_default())?
        }
        None => SharedParams::default(),
    };
    let from_share = match &form.share {
        Some(payload) => decode_share(payload)?,
        None => SharedParams::default(),
    };
    let explicit = SharedParams {
        prompt: form.prompt.clone(),
        sampler_name: form.sampler.clone(),
        seed: form.seed.clone(),
        model_name: form.model.clone(),
        steps: form.steps,
        cfg_scale: form.cfg_scale,
        height: form.height,
        width: form.width,
        karras: form.karras,
        post_processing: (!form.post_processing.is_empty()).then(|| form.post_processing.clone()),
    };

    let mut request = GenerationRequest::default();
    explicit.or(from_share).or(from_url).apply_to(&mut request);

    if let Some(negative) = &form.negative {
        request.negative_prompt = Some(negative.clone());
    }
    if let Some(n) = form.n {
        request.params.n = n;
    }
    request.params.denoising_strength = form.denoising_strength;
    request.nsfw = form.nsfw;
    request.censor_nsfw = !form.nsfw;
    request.trusted_workers = form.trusted_workers;

    if let Some(path) = &form.source_image {
        request.source_image = Some(load_as_webp(path)?);
        request.source_processing = Some(SourceProcessing::Img2img);
    }
    if let Some(path) = &form.source_mask {
        request.source_mask = Some(load_as_webp(path)?);
        request.source_processing = Some(SourceProcessing::Inpainting);
    }
    if let Some(mode) = &form.source_processing {
        request.source_processing = Some(match mode.as_str() {
            "img2img" => SourceProcessing::Img2img,
            "inpainting" => SourceProcessing::Inpainting,
            "outpainting" => SourceProcessing::Outpainting,
            other => bail!("Invalid source processing '{other}'. Must be one of: img2img, inpainting, outpainting"),
        });
    }

    request.validate_for_submit()?;
    Ok(request)
}

/// Read an image file and re-encode it as base64 WebP.
pub fn load_as_webp(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let image = decode_image(&bytes)?;
    Ok(encode_base64(&encode_image(&image, DownloadFormat::Webp)?))
}

async fn print_progress(mut events: broadcast::Receiver<HordeEvent>) {
    loop {
        match events.recv().await {
            Ok(HordeEvent::Progress {
                progress,
                queue_position,
                wait_time,
                ..
            }) => {
                eprint!("\r{progress:>6.2}%  queue {queue_position:<4} eta {wait_time:>4.0}s");
            }
            Ok(HordeEvent::StateChanged { state, .. }) => {
                tracing::debug!(?state, "Generation state");
            }
            Ok(_) | Err(RecvError::Lagged(_)) => {}
            Err(RecvError::Closed) => break,
        }
    }
}

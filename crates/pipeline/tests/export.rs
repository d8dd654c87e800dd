use std::io::{Cursor, Read};

use horde_core::media::{encode_base64, DownloadFormat};
use horde_core::params::GenerationRequest;
use horde_core::registry::OutputRecord;
use horde_pipeline::export::{export_zip_file, render_image, write_image, ExportOptions};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

fn png_base64() -> String {
    let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 255])));
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png).unwrap();
    encode_base64(&buffer.into_inner())
}

fn record(id: u32) -> OutputRecord {
    let mut request = GenerationRequest::new("a red fox");
    request.negative_prompt = Some("blurry".into());
    OutputRecord {
        id,
        storage_key: None,
        image: png_base64(),
        prompt: "a red fox".into(),
        request,
        seed: "1234".into(),
        model: Some("stable_diffusion".into()),
        worker_id: None,
        worker_name: Some("worker".into()),
        job_id: Some("job-1".into()),
        generation_id: Some("gen-1".into()),
        starred: false,
        rated: false,
        censored: false,
        created_at: chrono::Utc::now(),
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[test]
fn zip_holds_image_and_metadata_pairs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out").join("outputs.zip");
    let options = ExportOptions {
        format: DownloadFormat::Png,
        embed_metadata: false,
    };

    export_zip_file(&path, &[record(1), record(2)], options).unwrap();

    let mut archive = zip::ZipArchive::new(std::fs::File::open(&path).unwrap()).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    assert_eq!(names, vec!["1.json", "1.png", "2.json", "2.png"]);

    let mut json = String::new();
    archive.by_name("2.json").unwrap().read_to_string(&mut json).unwrap();
    let metadata: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(metadata["id"], 2);
    assert_eq!(metadata["prompt"], "a red fox");
    assert_eq!(metadata["negative_prompt"], "blurry");
    assert_eq!(metadata["seed"], "1234");

    let mut png = Vec::new();
    archive.by_name("1.png").unwrap().read_to_end(&mut png).unwrap();
    assert!(image::load_from_memory(&png).is_ok());
}

#[test]
fn embedded_metadata_lands_in_png_and_jpeg() {
    for format in [DownloadFormat::Png, DownloadFormat::Jpeg] {
        let bytes = render_image(
            &record(1),
            ExportOptions {
                format,
                embed_metadata: true,
            },
        )
        .unwrap();
        assert!(contains(&bytes, b"a red fox"), "{format:?} lacks metadata");
        assert!(image::load_from_memory(&bytes).is_ok());
    }
}

#[test]
fn webp_is_written_without_metadata() {
    let bytes = render_image(
        &record(1),
        ExportOptions {
            format: DownloadFormat::Webp,
            embed_metadata: true,
        },
    )
    .unwrap();
    assert!(!contains(&bytes, b"a red fox"));
    assert!(image::load_from_memory(&bytes).is_ok());
}

#[test]
fn single_image_is_named_by_id() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_image(dir.path(), &record(7), ExportOptions::default()).unwrap();
    assert_eq!(path.file_name().unwrap(), "7.webp");
    assert!(path.exists());
}

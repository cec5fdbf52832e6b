//! Optimizer integration tests.
//!
//! Run with: `cargo test -p imgopt-services --test optimizer_test`

mod helpers;

use helpers::{TestHarness, LIBRARY_FOLDER, SITE};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imgopt_core::{AssetMut, AssetRef, SiteSettings};
use imgopt_processing::{
    EmbeddedMetadata, ImageCompressor, ImageFormatKind, ImageHandle, TransformStrategy,
};
use imgopt_services::test_helpers::{
    attachment, attachment_version, jpeg_fixture, jpeg_with_metadata_fixture, media_file,
    meta_file, png24_fixture, EmptyOutputPipeline, RecordedPhase,
};
use imgopt_storage::{media_file_key, meta_file_key, Storage};
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Debug)]
struct ForceWebP;

impl TransformStrategy for ForceWebP {
    fn apply(&self, image: &mut ImageHandle) -> anyhow::Result<()> {
        image.set_format(ImageFormatKind::WebP);
        Ok(())
    }
}

#[derive(Debug)]
struct Panicking;

impl TransformStrategy for Panicking {
    fn apply(&self, _image: &mut ImageHandle) -> anyhow::Result<()> {
        panic!("strategy bug");
    }
}

fn format_of(data: &[u8]) -> ImageFormatKind {
    ImageFormatKind::detect(data).unwrap()
}

#[tokio::test]
async fn test_disabled_site_leaves_every_kind_untouched() {
    let harness = TestHarness::new(SiteSettings {
        optimization_enabled: false,
        ..SiteSettings::all_enabled()
    });
    let optimizer = harness.optimizer();
    let jpeg = jpeg_fixture();

    let mut media = media_file("photo", ".jpg", Some(jpeg.clone()));
    let mut meta = meta_file("avatar", ".jpg", Some(jpeg.clone()));
    let mut live = attachment(5, "scan", ".jpg", Some(jpeg.clone()));
    let mut version = attachment_version(Uuid::new_v4(), ".jpg", Some(jpeg.clone()), 0);

    optimizer.optimize(&mut media).await;
    optimizer.optimize(&mut meta).await;
    optimizer.optimize(&mut live).await;
    optimizer.optimize(&mut version).await;

    assert_eq!(media.file_binary.as_deref(), Some(jpeg.as_slice()));
    assert_eq!(meta.meta_file_binary.as_deref(), Some(jpeg.as_slice()));
    assert_eq!(live.attachment_binary.as_deref(), Some(jpeg.as_slice()));
    assert_eq!(version.attachment_binary.as_deref(), Some(jpeg.as_slice()));
    assert_eq!(media.file_size, jpeg.len() as i64);
    assert!(harness.recorder.is_empty());
    assert_eq!(harness.pipeline.runs(), 0);
}

#[tokio::test]
async fn test_kind_flags_gate_each_variant() {
    let harness = TestHarness::new(SiteSettings {
        optimize_media_files: false,
        optimize_meta_files: false,
        ..SiteSettings::all_enabled()
    });
    let optimizer = harness.optimizer();
    let jpeg = jpeg_fixture();

    let mut media = media_file("photo", ".jpg", Some(jpeg.clone()));
    let mut meta = meta_file("avatar", ".jpg", Some(jpeg.clone()));
    optimizer.optimize(&mut media).await;
    optimizer.optimize(&mut meta).await;
    assert_eq!(media.file_binary.as_deref(), Some(jpeg.as_slice()));
    assert_eq!(meta.meta_file_binary.as_deref(), Some(jpeg.as_slice()));
    assert!(harness.recorder.is_empty());

    // Attachments and versions share the page attachment flag
    let mut live = attachment(5, "scan", ".jpg", Some(jpeg.clone()));
    let mut version = attachment_version(Uuid::new_v4(), ".jpg", Some(jpeg.clone()), 0);
    optimizer.optimize(&mut live).await;
    optimizer.optimize(&mut version).await;
    assert_eq!(
        format_of(live.attachment_binary.as_deref().unwrap()),
        ImageFormatKind::ProgressiveJpeg
    );
    assert_eq!(
        format_of(version.attachment_binary.as_deref().unwrap()),
        ImageFormatKind::ProgressiveJpeg
    );
    assert_eq!(harness.pipeline.runs(), 2);
}

#[tokio::test]
async fn test_extension_gate() {
    let harness = TestHarness::new(SiteSettings {
        file_extensions: ".png | .gif".to_string(),
        ..SiteSettings::all_enabled()
    });
    let optimizer = harness.optimizer();
    let jpeg = jpeg_fixture();

    let mut file = media_file("photo", ".jpg", Some(jpeg.clone()));
    optimizer.optimize(&mut file).await;
    assert_eq!(file.file_binary.as_deref(), Some(jpeg.as_slice()));
    assert!(harness.recorder.is_empty());

    harness.update_settings(SiteSettings {
        file_extensions: "PNG;JPG".to_string(),
        ..SiteSettings::all_enabled()
    });
    optimizer.optimize(&mut file).await;
    assert_eq!(
        format_of(file.file_binary.as_deref().unwrap()),
        ImageFormatKind::ProgressiveJpeg
    );
}

#[tokio::test]
async fn test_before_cancel_stops_optimization() {
    let harness = TestHarness::enabled();
    harness.events.before.subscribe(|event| {
        event.cancel();
        Ok(())
    });
    let jpeg = jpeg_fixture();
    let mut file = media_file("photo", ".jpg", Some(jpeg.clone()));

    harness.optimizer().optimize(&mut file).await;

    assert_eq!(file.file_binary.as_deref(), Some(jpeg.as_slice()));
    assert_eq!(file.file_size, jpeg.len() as i64);
    assert_eq!(harness.recorder.phases(), vec![RecordedPhase::Before]);
    assert_eq!(harness.pipeline.runs(), 0);
}

#[tokio::test]
async fn test_jpeg_becomes_progressive_without_metadata() {
    let harness = TestHarness::new(SiteSettings {
        image_quality: 60,
        ..SiteSettings::all_enabled()
    });
    let source = jpeg_with_metadata_fixture();
    assert!(!EmbeddedMetadata::read(&source, ImageFormatKind::Jpeg).is_empty());

    let mut file = media_file("photo", ".jpg", Some(source.clone()));
    harness.optimizer().optimize(&mut file).await;

    let output = file.file_binary.clone().unwrap();
    assert_eq!(format_of(&output), ImageFormatKind::ProgressiveJpeg);
    assert!(EmbeddedMetadata::read(&output, ImageFormatKind::ProgressiveJpeg).is_empty());
    assert_eq!(file.file_size, output.len() as i64);

    // Same pixels encoded at the configured quality give the same bytes
    let decoded = ImageHandle::decode(&source).unwrap();
    let expected =
        ImageCompressor::encode(decoded.image(), ImageFormatKind::ProgressiveJpeg, Some(60))
            .unwrap();
    assert_eq!(output, expected);

    assert_eq!(
        harness.recorder.phases(),
        vec![
            RecordedPhase::Before,
            RecordedPhase::After {
                size: output.len() as i64
            }
        ]
    );
}

#[tokio::test]
async fn test_png24_becomes_paletted() {
    let harness = TestHarness::enabled();
    let source = png24_fixture();
    assert_eq!(format_of(&source), ImageFormatKind::Png24);

    let mut file = meta_file("banner", ".png", Some(source));
    harness.optimizer().optimize(&mut file).await;

    let output = file.meta_file_binary.clone().unwrap();
    assert_eq!(format_of(&output), ImageFormatKind::Png8);
    assert_eq!(file.meta_file_size, output.len() as i32);
}

#[tokio::test]
async fn test_normalization_is_idempotent() {
    let harness = TestHarness::enabled();
    let optimizer = harness.optimizer();

    let mut jpeg = attachment(5, "scan", ".jpg", Some(jpeg_with_metadata_fixture()));
    optimizer.optimize(&mut jpeg).await;
    optimizer.optimize(&mut jpeg).await;
    let output = jpeg.attachment_binary.clone().unwrap();
    assert_eq!(format_of(&output), ImageFormatKind::ProgressiveJpeg);
    assert!(EmbeddedMetadata::read(&output, ImageFormatKind::ProgressiveJpeg).is_empty());

    let mut png = attachment(5, "chart", ".png", Some(png24_fixture()));
    optimizer.optimize(&mut png).await;
    let first = png.attachment_binary.clone().unwrap();
    optimizer.optimize(&mut png).await;
    let second = png.attachment_binary.clone().unwrap();
    assert_eq!(format_of(&second), ImageFormatKind::Png8);
    // An 8-bit palette survives a second pass without losing colors
    let first_pixels = image::load_from_memory(&first).unwrap().to_rgba8();
    let second_pixels = image::load_from_memory(&second).unwrap().to_rgba8();
    assert_eq!(first_pixels, second_pixels);
}

#[tokio::test]
async fn test_empty_output_is_an_error() {
    let harness = TestHarness::enabled();
    let context = harness
        .context()
        .with_pipeline(Arc::new(EmptyOutputPipeline));
    let optimizer = imgopt_services::ImageOptimizer::new(SITE, context);

    let jpeg = jpeg_fixture();
    let mut file = attachment(5, "scan", ".jpg", Some(jpeg.clone()));
    optimizer.optimize(&mut file).await;

    assert_eq!(file.attachment_binary.as_deref(), Some(jpeg.as_slice()));
    assert_eq!(file.attachment_size, jpeg.len() as i32);
    assert_eq!(
        harness.recorder.phases(),
        vec![
            RecordedPhase::Before,
            RecordedPhase::Error {
                code: "EMPTY_OUTPUT",
                successful: false
            }
        ]
    );
}

#[tokio::test]
async fn test_invalid_quality_reports_error() {
    let harness = TestHarness::new(SiteSettings {
        image_quality: 150,
        ..SiteSettings::all_enabled()
    });
    let jpeg = jpeg_fixture();
    let mut file = media_file("photo", ".jpg", Some(jpeg.clone()));

    harness.optimizer().optimize(&mut file).await;

    assert_eq!(file.file_binary.as_deref(), Some(jpeg.as_slice()));
    assert_eq!(
        harness.recorder.phases(),
        vec![
            RecordedPhase::Before,
            RecordedPhase::Error {
                code: "INVALID_QUALITY",
                successful: false
            }
        ]
    );
}

#[tokio::test]
async fn test_media_file_read_from_storage() {
    let harness = TestHarness::enabled();
    let mut file = media_file("hero", ".jpg", None);
    file.file_path = "banners/hero.jpg".to_string();

    let key = media_file_key(SITE, LIBRARY_FOLDER, &file.file_path);
    assert_eq!(key, "sites/corporate/media/Images/banners/hero.jpg");
    harness
        .storage
        .upload_with_key(&key, jpeg_fixture())
        .await
        .unwrap();

    harness.optimizer().optimize(&mut file).await;

    let output = file.file_binary.clone().unwrap();
    assert_eq!(format_of(&output), ImageFormatKind::ProgressiveJpeg);
    assert_eq!(file.file_size, output.len() as i64);
}

#[tokio::test]
async fn test_meta_file_read_from_storage() {
    let harness = TestHarness::enabled();
    let mut file = meta_file("icon", ".png", None);

    let key = meta_file_key(SITE, file.guid, &file.meta_file_extension);
    harness
        .storage
        .upload_with_key(&key, png24_fixture())
        .await
        .unwrap();

    harness.optimizer().optimize(&mut file).await;

    let output = file.meta_file_binary.clone().unwrap();
    assert_eq!(format_of(&output), ImageFormatKind::Png8);
}

#[tokio::test]
async fn test_missing_source_file_reports_error() {
    let harness = TestHarness::enabled();
    let mut file = media_file("ghost", ".jpg", None);

    harness.optimizer().optimize(&mut file).await;

    assert!(file.file_binary.is_none());
    assert_eq!(file.file_size, 0);
    assert_eq!(
        harness.recorder.phases(),
        vec![
            RecordedPhase::Before,
            RecordedPhase::Error {
                code: "SOURCE_NOT_FOUND",
                successful: false
            }
        ]
    );
}

#[tokio::test]
async fn test_attachment_without_binary_reports_error() {
    let harness = TestHarness::enabled();
    let mut file = attachment(5, "scan", ".png", None);

    harness.optimizer().optimize(AssetMut::from(&mut file)).await;

    assert_eq!(
        harness.recorder.phases(),
        vec![
            RecordedPhase::Before,
            RecordedPhase::Error {
                code: "MISSING_BINARY",
                successful: false
            }
        ]
    );
}

#[tokio::test]
async fn test_failing_before_observer_reports_error() {
    let harness = TestHarness::enabled();
    harness
        .events
        .before
        .subscribe(|_| anyhow::bail!("audit log unavailable"));
    let jpeg = jpeg_fixture();
    let mut file = media_file("photo", ".jpg", Some(jpeg.clone()));

    harness.optimizer().optimize(&mut file).await;

    assert_eq!(file.file_binary.as_deref(), Some(jpeg.as_slice()));
    assert_eq!(harness.pipeline.runs(), 0);
    assert_eq!(
        harness.recorder.phases(),
        vec![
            RecordedPhase::Before,
            RecordedPhase::Error {
                code: "OBSERVER_ERROR",
                successful: false
            }
        ]
    );
}

#[tokio::test]
async fn test_failing_after_observer_reports_error() {
    let harness = TestHarness::enabled();
    harness
        .events
        .after
        .subscribe(|_| anyhow::bail!("cache purge failed"));
    let mut file = media_file("photo", ".jpg", Some(jpeg_fixture()));

    harness.optimizer().optimize(&mut file).await;

    let output = file.file_binary.clone().unwrap();
    assert_eq!(format_of(&output), ImageFormatKind::ProgressiveJpeg);
    assert_eq!(
        harness.recorder.phases(),
        vec![
            RecordedPhase::Before,
            RecordedPhase::After {
                size: output.len() as i64
            },
            RecordedPhase::Error {
                code: "OBSERVER_ERROR",
                successful: true
            }
        ]
    );
}

#[tokio::test]
async fn test_failing_error_observer_is_swallowed() {
    let harness = TestHarness::enabled();
    harness
        .events
        .error
        .subscribe(|_| anyhow::bail!("error sink down"));
    let mut file = attachment(5, "scan", ".png", None);

    harness.optimizer().optimize(&mut file).await;

    assert_eq!(harness.recorder.phases().len(), 2);
}

#[tokio::test]
async fn test_strategy_replacement_applies_to_next_call() {
    let harness = TestHarness::enabled();
    let optimizer = harness.optimizer();

    let mut first = media_file("a", ".jpg", Some(jpeg_fixture()));
    optimizer.optimize(&mut first).await;
    assert_eq!(
        format_of(first.file_binary.as_deref().unwrap()),
        ImageFormatKind::ProgressiveJpeg
    );

    harness.strategy.set(Arc::new(ForceWebP));

    let mut second = media_file("b", ".jpg", Some(jpeg_fixture()));
    optimizer.optimize(&mut second).await;
    assert_eq!(
        format_of(second.file_binary.as_deref().unwrap()),
        ImageFormatKind::WebP
    );

    // A new optimizer does not reinstall the default over a custom strategy
    let mut third = media_file("c", ".jpg", Some(jpeg_fixture()));
    harness.optimizer().optimize(&mut third).await;
    assert_eq!(
        format_of(third.file_binary.as_deref().unwrap()),
        ImageFormatKind::WebP
    );
}

#[tokio::test]
async fn test_settings_changes_apply_without_restart() {
    let harness = TestHarness::new(SiteSettings::default());
    let optimizer = harness.optimizer();
    let jpeg = jpeg_fixture();

    let mut file = media_file("photo", ".jpg", Some(jpeg.clone()));
    optimizer.optimize(&mut file).await;
    assert_eq!(file.file_binary.as_deref(), Some(jpeg.as_slice()));

    harness.update_settings(SiteSettings {
        image_quality: 30,
        ..SiteSettings::all_enabled()
    });
    optimizer.optimize(&mut file).await;

    let decoded = ImageHandle::decode(&jpeg).unwrap();
    let expected =
        ImageCompressor::encode(decoded.image(), ImageFormatKind::ProgressiveJpeg, Some(30))
            .unwrap();
    assert_eq!(file.file_binary.as_deref(), Some(expected.as_slice()));
}

#[tokio::test]
async fn test_settings_failure_skips_silently() {
    let harness = TestHarness::enabled();
    let context = imgopt_services::OptimizerContext {
        settings: Arc::new(imgopt_services::test_helpers::FailingSettings),
        ..harness.context()
    };
    let optimizer = imgopt_services::ImageOptimizer::new(SITE, context);

    let jpeg = jpeg_fixture();
    let mut file = media_file("photo", ".jpg", Some(jpeg.clone()));
    optimizer.optimize(&mut file).await;

    assert_eq!(file.file_binary.as_deref(), Some(jpeg.as_slice()));
    assert!(harness.recorder.is_empty());
}

#[tokio::test]
async fn test_oversized_webp_reports_encode_error() {
    let harness = TestHarness::enabled();
    harness.strategy.set(Arc::new(ForceWebP));

    // WebP caps each dimension at 16383 px
    let mut wide = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::from_pixel(17_000, 1, Rgb([10, 20, 30])))
        .write_to(&mut Cursor::new(&mut wide), ImageFormat::Png)
        .unwrap();
    let mut file = media_file("panorama", ".png", Some(wide.clone()));

    harness.optimizer().optimize(&mut file).await;

    assert_eq!(file.file_binary.as_deref(), Some(wide.as_slice()));
    assert_eq!(
        harness.recorder.phases(),
        vec![
            RecordedPhase::Before,
            RecordedPhase::Error {
                code: "ENCODE_ERROR",
                successful: false
            }
        ]
    );
}

#[tokio::test]
async fn test_panicking_strategy_reports_error() {
    let harness = TestHarness::enabled();
    harness.strategy.set(Arc::new(Panicking));
    let jpeg = jpeg_fixture();
    let mut file = attachment(5, "scan", ".jpg", Some(jpeg.clone()));

    harness.optimizer().optimize(&mut file).await;

    assert_eq!(file.attachment_binary.as_deref(), Some(jpeg.as_slice()));
    assert_eq!(file.attachment_size, jpeg.len() as i32);
    assert_eq!(
        harness.recorder.phases(),
        vec![
            RecordedPhase::Before,
            RecordedPhase::Error {
                code: "PIPELINE_PANIC",
                successful: false
            }
        ]
    );
}

#[tokio::test]
async fn test_before_observer_vetoes_by_library() {
    const ARCHIVE_LIBRARY: i64 = 2;

    let harness = TestHarness::enabled();
    harness.events.before.subscribe(|event| {
        if let AssetRef::MediaFile(file) = event.asset() {
            if file.library_id == ARCHIVE_LIBRARY {
                event.cancel();
            }
        }
        Ok(())
    });
    let optimizer = harness.optimizer();
    let jpeg = jpeg_fixture();

    let mut archived = media_file("scan", ".jpg", Some(jpeg.clone()));
    archived.library_id = ARCHIVE_LIBRARY;
    optimizer.optimize(&mut archived).await;
    assert_eq!(archived.file_binary.as_deref(), Some(jpeg.as_slice()));

    let mut current = media_file("scan", ".jpg", Some(jpeg.clone()));
    optimizer.optimize(&mut current).await;
    assert_eq!(
        format_of(current.file_binary.as_deref().unwrap()),
        ImageFormatKind::ProgressiveJpeg
    );
    assert_eq!(harness.pipeline.runs(), 1);
}

#[tokio::test]
async fn test_after_observer_sees_optimized_record() {
    let harness = TestHarness::enabled();
    let seen = Arc::new(Mutex::new(None));
    let sink = seen.clone();
    harness.events.after.subscribe(move |event| {
        let asset = event.asset();
        assert_eq!(asset.size(), asset.binary().map_or(0, |b| b.len() as i64));
        if let AssetRef::Attachment(attachment) = asset {
            let snapshot = (attachment.document_id, attachment.attachment_binary.clone());
            *sink.lock().unwrap() = Some(snapshot);
        }
        Ok(())
    });
    let mut file = attachment(5, "scan", ".jpg", Some(jpeg_fixture()));

    harness.optimizer().optimize(&mut file).await;

    let (document_id, binary) = seen.lock().unwrap().take().unwrap();
    assert_eq!(document_id, 5);
    assert_eq!(binary, file.attachment_binary);
    assert_eq!(
        format_of(binary.as_deref().unwrap()),
        ImageFormatKind::ProgressiveJpeg
    );
}

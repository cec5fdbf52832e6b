//! Record and image fixtures

use bytes::Bytes;
use chrono::{Duration, Utc};
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use imgopt_core::{Attachment, AttachmentVersion, Document, MediaFile, MetaFile, WorkflowStep};
use imgopt_processing::{EmbeddedMetadata, ImageFormatKind};
use std::io::Cursor;
use uuid::Uuid;

/// Little-endian TIFF header with an empty IFD
pub const MINIMAL_EXIF: &[u8] = b"II\x2a\x00\x08\x00\x00\x00\x00\x00\x00\x00\x00\x00";

fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            ((x + y) * 127 / (width + height).max(1)) as u8,
        ])
    }))
}

fn encode(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), format)
        .unwrap();
    buffer
}

/// Baseline JPEG without metadata
pub fn jpeg_fixture() -> Vec<u8> {
    encode(&gradient(48, 32), ImageFormat::Jpeg)
}

/// Baseline JPEG carrying EXIF and a comment
pub fn jpeg_with_metadata_fixture() -> Vec<u8> {
    let metadata = EmbeddedMetadata {
        exif: Some(Bytes::from_static(MINIMAL_EXIF)),
        icc_profile: None,
        comments: vec!["Taken at the summer party".to_string()],
    };
    metadata
        .embed(jpeg_fixture(), ImageFormatKind::Jpeg)
        .unwrap()
}

/// 24-bit RGB PNG
pub fn png24_fixture() -> Vec<u8> {
    encode(&gradient(40, 40), ImageFormat::Png)
}

pub fn media_file(name: &str, extension: &str, binary: Option<Vec<u8>>) -> MediaFile {
    MediaFile {
        id: 1,
        guid: Uuid::new_v4(),
        library_id: 1,
        file_name: name.to_string(),
        file_extension: extension.to_string(),
        file_path: format!("{}{}", name, extension),
        file_mime_type: "image/jpeg".to_string(),
        file_size: binary.as_ref().map(|b| b.len() as i64).unwrap_or(0),
        file_binary: binary,
        modified_at: Utc::now(),
    }
}

pub fn meta_file(name: &str, extension: &str, binary: Option<Vec<u8>>) -> MetaFile {
    MetaFile {
        id: 1,
        guid: Uuid::new_v4(),
        object_id: 42,
        object_type: "cms.user".to_string(),
        meta_file_name: name.to_string(),
        meta_file_extension: extension.to_string(),
        meta_file_mime_type: "image/png".to_string(),
        meta_file_size: binary.as_ref().map(|b| b.len() as i32).unwrap_or(0),
        meta_file_binary: binary,
    }
}

pub fn attachment(
    document_id: i64,
    name: &str,
    extension: &str,
    binary: Option<Vec<u8>>,
) -> Attachment {
    Attachment {
        id: 10,
        guid: Uuid::new_v4(),
        document_id,
        attachment_name: name.to_string(),
        attachment_extension: extension.to_string(),
        attachment_mime_type: "image/jpeg".to_string(),
        attachment_size: binary.as_ref().map(|b| b.len() as i32).unwrap_or(0),
        attachment_binary: binary,
        last_modified: Utc::now(),
    }
}

/// Version of `attachment_guid`, modified `age_minutes` ago
pub fn attachment_version(
    attachment_guid: Uuid,
    extension: &str,
    binary: Option<Vec<u8>>,
    age_minutes: i64,
) -> AttachmentVersion {
    AttachmentVersion {
        history_id: age_minutes,
        attachment_guid,
        document_id: 5,
        attachment_name: "brochure".to_string(),
        attachment_extension: extension.to_string(),
        attachment_mime_type: "image/jpeg".to_string(),
        attachment_size: binary.as_ref().map(|b| b.len() as i32).unwrap_or(0),
        attachment_binary: binary,
        last_modified: Utc::now() - Duration::minutes(age_minutes),
    }
}

pub fn document(id: i64, pending_workflow: bool) -> Document {
    Document {
        id,
        name: format!("Page {}", id),
        workflow_step: pending_workflow.then(|| WorkflowStep {
            id: 3,
            name: "approval".to_string(),
            display_name: "Approval".to_string(),
        }),
    }
}

use bytes::Bytes;
use image::{DynamicImage, GenericImageView};
use img_parts::jpeg::{Jpeg, JpegSegment};
use img_parts::png::{Png, PngChunk};
use img_parts::{ImageEXIF, ImageICC};
use imgopt_core::{OptimizeError, OptimizeResult};

use super::format::ImageFormatKind;
use crate::compression::ImageCompressor;

const JPEG_COM_MARKER: u8 = 0xFE;
const PNG_TEXT_CHUNK: [u8; 4] = *b"tEXt";
const PNG_IEND_CHUNK: [u8; 4] = *b"IEND";
const PNG_COMMENT_KEYWORD: &str = "Comment";

/// Metadata carried alongside the pixels of a JPEG or PNG file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbeddedMetadata {
    pub exif: Option<Bytes>,
    pub icc_profile: Option<Bytes>,
    /// JPEG COM segments or PNG tEXt chunk values
    pub comments: Vec<String>,
}

impl EmbeddedMetadata {
    pub fn is_empty(&self) -> bool {
        self.exif.is_none() && self.icc_profile.is_none() && self.comments.is_empty()
    }

    /// Read metadata from an encoded file. Formats other than JPEG and PNG
    /// yield empty metadata.
    pub fn read(data: &[u8], format: ImageFormatKind) -> Self {
        if format.is_jpeg() {
            if let Ok(jpeg) = Jpeg::from_bytes(Bytes::copy_from_slice(data)) {
                let comments = jpeg
                    .segments()
                    .iter()
                    .filter(|segment| segment.marker() == JPEG_COM_MARKER)
                    .map(|segment| String::from_utf8_lossy(segment.contents()).into_owned())
                    .collect();
                return Self {
                    exif: jpeg.exif(),
                    icc_profile: jpeg.icc_profile(),
                    comments,
                };
            }
        } else if format.is_png() {
            if let Ok(png) = Png::from_bytes(Bytes::copy_from_slice(data)) {
                let comments = png
                    .chunks()
                    .iter()
                    .filter(|chunk| chunk.kind() == PNG_TEXT_CHUNK)
                    .filter_map(|chunk| {
                        let contents = chunk.contents();
                        // keyword, NUL separator, then Latin-1 text
                        let separator = contents.iter().position(|b| *b == 0)?;
                        Some(String::from_utf8_lossy(&contents[separator + 1..]).into_owned())
                    })
                    .collect();
                return Self {
                    exif: png.exif(),
                    icc_profile: png.icc_profile(),
                    comments,
                };
            }
        }

        Self::default()
    }

    /// Write the metadata into freshly encoded bytes.
    ///
    /// Only JPEG and PNG outputs carry metadata; other formats and empty
    /// metadata return the input unchanged.
    pub fn embed(&self, encoded: Vec<u8>, format: ImageFormatKind) -> OptimizeResult<Vec<u8>> {
        if self.is_empty() || encoded.is_empty() {
            return Ok(encoded);
        }

        if format.is_jpeg() {
            let mut jpeg = Jpeg::from_bytes(Bytes::from(encoded))
                .map_err(|e| OptimizeError::Encode(format!("Failed to reparse JPEG: {}", e)))?;
            jpeg.set_exif(self.exif.clone());
            jpeg.set_icc_profile(self.icc_profile.clone());

            if !self.comments.is_empty() {
                // Comments go after the APPn block so readers find JFIF/EXIF first
                let segments = jpeg.segments_mut();
                let insert_at = segments
                    .iter()
                    .position(|segment| !(0xE0..=0xEF).contains(&segment.marker()))
                    .unwrap_or(segments.len());
                for (offset, comment) in self.comments.iter().enumerate() {
                    segments.insert(
                        insert_at + offset,
                        JpegSegment::new_with_contents(
                            JPEG_COM_MARKER,
                            Bytes::copy_from_slice(comment.as_bytes()),
                        ),
                    );
                }
            }

            return Ok(jpeg.encoder().bytes().to_vec());
        }

        if format.is_png() {
            let mut png = Png::from_bytes(Bytes::from(encoded))
                .map_err(|e| OptimizeError::Encode(format!("Failed to reparse PNG: {}", e)))?;
            png.set_exif(self.exif.clone());
            png.set_icc_profile(self.icc_profile.clone());

            if !self.comments.is_empty() {
                let chunks = png.chunks_mut();
                let insert_at = chunks
                    .iter()
                    .position(|chunk| chunk.kind() == PNG_IEND_CHUNK)
                    .unwrap_or(chunks.len());
                for (offset, comment) in self.comments.iter().enumerate() {
                    let mut contents = Vec::with_capacity(PNG_COMMENT_KEYWORD.len() + 1 + comment.len());
                    contents.extend_from_slice(PNG_COMMENT_KEYWORD.as_bytes());
                    contents.push(0);
                    contents.extend_from_slice(comment.as_bytes());
                    chunks.insert(
                        insert_at + offset,
                        PngChunk::new(PNG_TEXT_CHUNK, Bytes::from(contents)),
                    );
                }
            }

            return Ok(png.encoder().bytes().to_vec());
        }

        Ok(encoded)
    }
}

/// A decoded image together with the settings used to encode it again.
///
/// Transformation strategies mutate the handle in place: output format,
/// quality and metadata are all taken from here when the image is encoded.
#[derive(Debug, Clone)]
pub struct ImageHandle {
    image: DynamicImage,
    source_format: ImageFormatKind,
    format: ImageFormatKind,
    quality: Option<i32>,
    metadata: EmbeddedMetadata,
}

impl ImageHandle {
    /// Decode an encoded image, remembering its format and metadata
    pub fn decode(data: &[u8]) -> OptimizeResult<Self> {
        if data.is_empty() {
            return Err(OptimizeError::Decode("Image data is empty".to_string()));
        }

        let source_format = ImageFormatKind::detect(data)?;
        let image = image::load_from_memory_with_format(data, source_format.to_image_format())
            .map_err(|e| OptimizeError::Decode(e.to_string()))?;
        let metadata = EmbeddedMetadata::read(data, source_format);

        tracing::debug!(
            format = ?source_format,
            width = image.width(),
            height = image.height(),
            has_metadata = !metadata.is_empty(),
            "Decoded image"
        );

        Ok(Self {
            image,
            source_format,
            format: source_format,
            quality: None,
            metadata,
        })
    }

    /// Wrap an already decoded image; it encodes as `format` with no metadata
    pub fn from_image(image: DynamicImage, format: ImageFormatKind) -> Self {
        Self {
            image,
            source_format: format,
            format,
            quality: None,
            metadata: EmbeddedMetadata::default(),
        }
    }

    /// Format the input was decoded from
    pub fn source_format(&self) -> ImageFormatKind {
        self.source_format
    }

    /// Format the image will be encoded as
    pub fn format(&self) -> ImageFormatKind {
        self.format
    }

    pub fn set_format(&mut self, format: ImageFormatKind) {
        self.format = format;
    }

    pub fn quality(&self) -> Option<i32> {
        self.quality
    }

    /// Set the encoder quality. 0 selects the encoder's default; values
    /// outside 0..=100 are rejected when encoding.
    pub fn set_quality(&mut self, quality: i32) {
        self.quality = Some(quality);
    }

    /// Drop all embedded metadata from the output
    pub fn strip(&mut self) {
        self.metadata = EmbeddedMetadata::default();
    }

    pub fn metadata(&self) -> &EmbeddedMetadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut EmbeddedMetadata {
        &mut self.metadata
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut DynamicImage {
        &mut self.image
    }

    pub fn replace_image(&mut self, image: DynamicImage) {
        self.image = image;
    }

    /// Encode with the current format, quality and metadata
    pub fn encode(&self) -> OptimizeResult<Vec<u8>> {
        let quality = match self.quality {
            None | Some(0) => None,
            Some(q) if (1..=100).contains(&q) => Some(q as u8),
            Some(q) => return Err(OptimizeError::InvalidQuality(q)),
        };

        let encoded = ImageCompressor::encode(&self.image, self.format, quality)?;
        self.metadata.embed(encoded, self.format)
    }
}

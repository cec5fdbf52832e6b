use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, GenericImageView, ImageFormat};
use imgopt_core::{OptimizeError, OptimizeResult};
use std::io::Cursor;
use std::panic::{self, AssertUnwindSafe};

use crate::image::ImageFormatKind;
use crate::palette::{self, MAX_PALETTE_SIZE};

pub const DEFAULT_JPEG_QUALITY: u8 = 75;
pub const DEFAULT_WEBP_QUALITY: f32 = 80.0;

/// Zlib level and row filter derived from a 0-100 quality value.
///
/// The tens digit picks the compression level and the units digit the
/// filter, so 75 means best compression with adaptive filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PngSettings {
    compression: CompressionType,
    filter: FilterType,
}

impl PngSettings {
    fn from_quality(quality: Option<u8>) -> Self {
        let Some(quality) = quality else {
            return Self {
                compression: CompressionType::Default,
                filter: FilterType::Adaptive,
            };
        };

        let compression = match quality / 10 {
            0..=3 => CompressionType::Fast,
            4..=6 => CompressionType::Default,
            _ => CompressionType::Best,
        };
        let filter = match quality % 10 {
            0 => FilterType::NoFilter,
            1 => FilterType::Sub,
            2 => FilterType::Up,
            3 => FilterType::Avg,
            4 => FilterType::Paeth,
            _ => FilterType::Adaptive,
        };

        Self { compression, filter }
    }

    fn indexed_compression(self) -> png::Compression {
        match self.compression {
            CompressionType::Fast => png::Compression::Fast,
            CompressionType::Best => png::Compression::Best,
            _ => png::Compression::Default,
        }
    }
}

/// Encoder front-end for every supported output format
pub struct ImageCompressor;

impl ImageCompressor {
    /// Encode `img` as `format`. `quality` is 1-100, `None` selects the
    /// format's default.
    pub fn encode(
        img: &DynamicImage,
        format: ImageFormatKind,
        quality: Option<u8>,
    ) -> OptimizeResult<Vec<u8>> {
        let start = std::time::Instant::now();

        let data = match format {
            ImageFormatKind::Jpeg => Self::compress_jpeg(img, quality)?,
            ImageFormatKind::ProgressiveJpeg => Self::compress_progressive_jpeg(img, quality)?,
            ImageFormatKind::Png8 => Self::compress_png8(img, quality)?,
            ImageFormatKind::Png
            | ImageFormatKind::Png24
            | ImageFormatKind::Png32
            | ImageFormatKind::Png48
            | ImageFormatKind::Png64 => Self::compress_png(img, format, quality)?,
            ImageFormatKind::WebP => Self::compress_webp(img, quality)?,
            ImageFormatKind::Gif | ImageFormatKind::Bmp | ImageFormatKind::Tiff => {
                Self::write_as(img, format.to_image_format())?
            }
        };

        tracing::debug!(
            format = ?format,
            quality = ?quality,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Encoded image"
        );

        Ok(data)
    }

    /// Baseline JPEG
    fn compress_jpeg(img: &DynamicImage, quality: Option<u8>) -> OptimizeResult<Vec<u8>> {
        let mut buffer = Vec::new();
        let encoder = JpegEncoder::new_with_quality(
            &mut buffer,
            quality.unwrap_or(DEFAULT_JPEG_QUALITY),
        );

        DynamicImage::ImageRgb8(img.to_rgb8())
            .write_with_encoder(encoder)
            .map_err(|e| OptimizeError::Encode(e.to_string()))?;

        Ok(buffer)
    }

    /// Progressive JPEG using mozjpeg
    fn compress_progressive_jpeg(
        img: &DynamicImage,
        quality: Option<u8>,
    ) -> OptimizeResult<Vec<u8>> {
        let rgb_img = img.to_rgb8();
        let (width, height) = rgb_img.dimensions();
        let quality = quality.unwrap_or(DEFAULT_JPEG_QUALITY);

        // mozjpeg reports libjpeg errors by panicking
        let result = panic::catch_unwind(AssertUnwindSafe(|| -> std::io::Result<Vec<u8>> {
            let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
            comp.set_size(width as usize, height as usize);
            comp.set_quality(f32::from(quality));
            comp.set_progressive_mode();
            comp.set_optimize_coding(true);

            let mut comp = comp.start_compress(Vec::new())?;
            comp.write_scanlines(&rgb_img)?;
            comp.finish()
        }));

        match result {
            Ok(Ok(data)) => Ok(data),
            Ok(Err(e)) => Err(OptimizeError::Encode(e.to_string())),
            Err(_) => Err(OptimizeError::Encode(
                "mozjpeg failed to compress image".to_string(),
            )),
        }
    }

    /// Paletted PNG, quantizing down to 256 colors when needed
    fn compress_png8(img: &DynamicImage, quality: Option<u8>) -> OptimizeResult<Vec<u8>> {
        let indexed = palette::quantize(&img.to_rgba8(), MAX_PALETTE_SIZE);
        let settings = PngSettings::from_quality(quality);

        let rgb_palette: Vec<u8> = indexed
            .palette
            .iter()
            .flat_map(|color| [color[0], color[1], color[2]])
            .collect();

        let mut buffer = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut buffer, indexed.width, indexed.height);
            encoder.set_color(png::ColorType::Indexed);
            encoder.set_depth(png::BitDepth::Eight);
            encoder.set_palette(rgb_palette);
            if indexed.has_transparency() {
                let trns: Vec<u8> = indexed.palette.iter().map(|color| color[3]).collect();
                encoder.set_trns(trns);
            }
            encoder.set_compression(settings.indexed_compression());

            let mut writer = encoder
                .write_header()
                .map_err(|e| OptimizeError::Encode(e.to_string()))?;
            writer
                .write_image_data(&indexed.indices)
                .map_err(|e| OptimizeError::Encode(e.to_string()))?;
            writer
                .finish()
                .map_err(|e| OptimizeError::Encode(e.to_string()))?;
        }

        Ok(buffer)
    }

    /// Truecolor or grayscale PNG in the pixel layout of `format`
    fn compress_png(
        img: &DynamicImage,
        format: ImageFormatKind,
        quality: Option<u8>,
    ) -> OptimizeResult<Vec<u8>> {
        let converted = match format {
            ImageFormatKind::Png24 => DynamicImage::ImageRgb8(img.to_rgb8()),
            ImageFormatKind::Png32 => DynamicImage::ImageRgba8(img.to_rgba8()),
            ImageFormatKind::Png48 => DynamicImage::ImageRgb16(img.to_rgb16()),
            ImageFormatKind::Png64 => DynamicImage::ImageRgba16(img.to_rgba16()),
            _ => match img {
                DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => {
                    DynamicImage::ImageRgba16(img.to_rgba16())
                }
                other => other.clone(),
            },
        };

        let settings = PngSettings::from_quality(quality);
        let mut buffer = Vec::new();
        let encoder =
            PngEncoder::new_with_quality(&mut buffer, settings.compression, settings.filter);

        converted
            .write_with_encoder(encoder)
            .map_err(|e| OptimizeError::Encode(e.to_string()))?;

        Ok(buffer)
    }

    /// Compress to WebP
    fn compress_webp(img: &DynamicImage, quality: Option<u8>) -> OptimizeResult<Vec<u8>> {
        let (width, height) = img.dimensions();
        let quality = quality.map(f32::from).unwrap_or(DEFAULT_WEBP_QUALITY);

        // Convert to RGBA for WebP encoding
        let rgba_img = img.to_rgba8();

        // `Encoder::encode` unwraps libwebp's status; dimensions above 16383 px fail
        let encoder = webp::Encoder::from_rgba(&rgba_img, width, height);
        let webp_data = encoder
            .encode_simple(false, quality)
            .map_err(|e| OptimizeError::Encode(format!("WebP encoding failed: {:?}", e)))?;

        Ok(webp_data.to_vec())
    }

    fn write_as(img: &DynamicImage, format: ImageFormat) -> OptimizeResult<Vec<u8>> {
        let mut buffer = Vec::new();
        let mut cursor = Cursor::new(&mut buffer);

        DynamicImage::ImageRgba8(img.to_rgba8())
            .write_to(&mut cursor, format)
            .map_err(|e| OptimizeError::Encode(e.to_string()))?;

        Ok(buffer)
    }
}

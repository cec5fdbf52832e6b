use bytes::Bytes;
use image::ImageFormat;
use img_parts::jpeg::Jpeg;
use imgopt_core::{OptimizeError, OptimizeResult};

/// SOF markers of progressive JPEG scans (huffman, differential, arithmetic)
const PROGRESSIVE_SOF_MARKERS: [u8; 4] = [0xC2, 0xC6, 0xCA, 0xCE];

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Encoded image format, with the JPEG and PNG sub-variants the optimizer
/// distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormatKind {
    /// Baseline JPEG
    Jpeg,
    /// Progressive JPEG
    ProgressiveJpeg,
    /// PNG keeping the decoded pixel layout (grayscale, or unknown layout)
    Png,
    /// Paletted 8-bit PNG
    Png8,
    /// 8-bit RGB PNG
    Png24,
    /// 8-bit RGBA PNG
    Png32,
    /// 16-bit RGB PNG
    Png48,
    /// 16-bit RGBA PNG
    Png64,
    Gif,
    WebP,
    Bmp,
    Tiff,
}

impl ImageFormatKind {
    /// Detect the encoded format from the file signature
    pub fn detect(data: &[u8]) -> OptimizeResult<Self> {
        let format = image::guess_format(data)
            .map_err(|e| OptimizeError::UnsupportedFormat(e.to_string()))?;

        match format {
            ImageFormat::Jpeg => Ok(if is_progressive_jpeg(data) {
                ImageFormatKind::ProgressiveJpeg
            } else {
                ImageFormatKind::Jpeg
            }),
            ImageFormat::Png => Ok(png_variant(data)),
            ImageFormat::Gif => Ok(ImageFormatKind::Gif),
            ImageFormat::WebP => Ok(ImageFormatKind::WebP),
            ImageFormat::Bmp => Ok(ImageFormatKind::Bmp),
            ImageFormat::Tiff => Ok(ImageFormatKind::Tiff),
            other => Err(OptimizeError::UnsupportedFormat(format!("{:?}", other))),
        }
    }

    pub fn is_jpeg(self) -> bool {
        matches!(self, ImageFormatKind::Jpeg | ImageFormatKind::ProgressiveJpeg)
    }

    pub fn is_png(self) -> bool {
        matches!(
            self,
            ImageFormatKind::Png
                | ImageFormatKind::Png8
                | ImageFormatKind::Png24
                | ImageFormatKind::Png32
                | ImageFormatKind::Png48
                | ImageFormatKind::Png64
        )
    }

    pub fn to_image_format(self) -> ImageFormat {
        match self {
            ImageFormatKind::Jpeg | ImageFormatKind::ProgressiveJpeg => ImageFormat::Jpeg,
            ImageFormatKind::Png
            | ImageFormatKind::Png8
            | ImageFormatKind::Png24
            | ImageFormatKind::Png32
            | ImageFormatKind::Png48
            | ImageFormatKind::Png64 => ImageFormat::Png,
            ImageFormatKind::Gif => ImageFormat::Gif,
            ImageFormatKind::WebP => ImageFormat::WebP,
            ImageFormatKind::Bmp => ImageFormat::Bmp,
            ImageFormatKind::Tiff => ImageFormat::Tiff,
        }
    }

    pub fn to_mime_type(self) -> &'static str {
        match self.to_image_format() {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Gif => "image/gif",
            ImageFormat::WebP => "image/webp",
            ImageFormat::Bmp => "image/bmp",
            ImageFormat::Tiff => "image/tiff",
            _ => "application/octet-stream",
        }
    }
}

fn is_progressive_jpeg(data: &[u8]) -> bool {
    match Jpeg::from_bytes(Bytes::copy_from_slice(data)) {
        Ok(jpeg) => jpeg
            .segments()
            .iter()
            .any(|segment| PROGRESSIVE_SOF_MARKERS.contains(&segment.marker())),
        Err(_) => false,
    }
}

/// Read bit depth and color type from the IHDR chunk, which must come first
fn png_variant(data: &[u8]) -> ImageFormatKind {
    if data.len() < 26 || data[..8] != PNG_SIGNATURE || &data[12..16] != b"IHDR" {
        return ImageFormatKind::Png;
    }

    let bit_depth = data[24];
    let color_type = data[25];

    match (color_type, bit_depth) {
        (3, _) => ImageFormatKind::Png8,
        (2, 16) => ImageFormatKind::Png48,
        (2, _) => ImageFormatKind::Png24,
        (6, 16) => ImageFormatKind::Png64,
        (6, _) => ImageFormatKind::Png32,
        _ => ImageFormatKind::Png,
    }
}

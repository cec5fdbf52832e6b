//! Image handle module
//!
//! - Format detection, including JPEG scan mode and PNG bit layout (format)
//! - Decoded image with mutable output settings (handle)

pub mod format;
pub mod handle;

pub use format::ImageFormatKind;
pub use handle::{EmbeddedMetadata, ImageHandle};

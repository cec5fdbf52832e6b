//! imgopt Processing Library
//!
//! Decoding, format normalization and re-encoding of images, plus the
//! pluggable [`TransformStrategy`] applied between decode and encode.

pub mod compression;
pub mod image;
pub mod palette;
pub mod pipeline;
pub mod strategy;

pub use compression::ImageCompressor;
pub use crate::image::{EmbeddedMetadata, ImageFormatKind, ImageHandle};
pub use pipeline::{CodecPipeline, ImagePipeline};
pub use strategy::{set_strategy, DefaultTransformStrategy, StrategySlot, TransformStrategy};

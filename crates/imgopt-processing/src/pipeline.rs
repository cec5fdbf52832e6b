//! Decode, transform and re-encode in one step

use imgopt_core::{OptimizeError, OptimizeResult};

use crate::image::ImageHandle;
use crate::strategy::TransformStrategy;

/// Turns raw source bytes into optimized bytes using a strategy.
///
/// The optimizer only talks to this trait, so embedders can route the byte
/// work through another engine.
pub trait ImagePipeline: Send + Sync {
    fn run(&self, data: &[u8], strategy: &dyn TransformStrategy) -> OptimizeResult<Vec<u8>>;
}

/// Pipeline backed by [`ImageHandle`]
#[derive(Debug, Clone, Copy, Default)]
pub struct CodecPipeline;

impl ImagePipeline for CodecPipeline {
    fn run(&self, data: &[u8], strategy: &dyn TransformStrategy) -> OptimizeResult<Vec<u8>> {
        let mut image = ImageHandle::decode(data)?;
        strategy.apply(&mut image).map_err(OptimizeError::Strategy)?;
        image.encode()
    }
}

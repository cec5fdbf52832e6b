//! Pluggable image transformation
//!
//! The strategy runs between decode and encode and decides the output
//! format, quality and metadata handling. One strategy is active per
//! process; it can be replaced at any time and the next optimization call
//! uses the replacement.

use imgopt_core::SettingsProvider;
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};

use crate::image::{ImageFormatKind, ImageHandle};

/// Transformation applied to every decoded image before it is re-encoded
pub trait TransformStrategy: Send + Sync + fmt::Debug {
    fn apply(&self, image: &mut ImageHandle) -> anyhow::Result<()>;
}

/// Default transformation:
///
/// - JPEG inputs are re-encoded as progressive JPEG
/// - PNG inputs are reduced to an 8-bit palette
/// - all embedded metadata is removed
/// - quality comes from the site's `image_quality` setting
pub struct DefaultTransformStrategy {
    site_name: String,
    settings: Arc<dyn SettingsProvider>,
}

impl DefaultTransformStrategy {
    pub fn new(site_name: impl Into<String>, settings: Arc<dyn SettingsProvider>) -> Self {
        Self {
            site_name: site_name.into(),
            settings,
        }
    }

    pub fn site_name(&self) -> &str {
        &self.site_name
    }
}

impl fmt::Debug for DefaultTransformStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultTransformStrategy")
            .field("site_name", &self.site_name)
            .finish_non_exhaustive()
    }
}

impl TransformStrategy for DefaultTransformStrategy {
    fn apply(&self, image: &mut ImageHandle) -> anyhow::Result<()> {
        // Read on every call so quality changes apply without a restart
        let settings = self.settings.site_settings(&self.site_name)?;

        let format = image.format();
        if format.is_jpeg() {
            image.set_format(ImageFormatKind::ProgressiveJpeg);
        } else if format.is_png() {
            image.set_format(ImageFormatKind::Png8);
        }

        image.strip();
        image.set_quality(settings.image_quality);

        tracing::debug!(
            site = %self.site_name,
            from = ?format,
            to = ?image.format(),
            quality = settings.image_quality,
            "Applied default transformation"
        );

        Ok(())
    }
}

/// Holder of the active strategy.
///
/// Callers read the current strategy once per optimization, so a
/// replacement never affects a call that already started.
#[derive(Debug, Default)]
pub struct StrategySlot {
    current: RwLock<Option<Arc<dyn TransformStrategy>>>,
}

static GLOBAL_STRATEGY: OnceLock<Arc<StrategySlot>> = OnceLock::new();

impl StrategySlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide slot
    pub fn global() -> Arc<Self> {
        GLOBAL_STRATEGY
            .get_or_init(|| Arc::new(StrategySlot::new()))
            .clone()
    }

    /// Replace the active strategy
    pub fn set(&self, strategy: Arc<dyn TransformStrategy>) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        tracing::info!(strategy = ?strategy, "Image transformation strategy replaced");
        *current = Some(strategy);
    }

    pub fn current(&self) -> Option<Arc<dyn TransformStrategy>> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Install `strategy` unless one is already set; returns whether it was installed
    pub fn install_if_empty(&self, strategy: Arc<dyn TransformStrategy>) -> bool {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        if current.is_some() {
            return false;
        }
        *current = Some(strategy);
        true
    }

    pub fn is_set(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}

/// Replace the process-wide transformation strategy
pub fn set_strategy(strategy: Arc<dyn TransformStrategy>) {
    StrategySlot::global().set(strategy);
}

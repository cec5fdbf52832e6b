//! Image optimization orchestrator
//!
//! [`ImageOptimizer::optimize`] gates an asset on the site settings, fires
//! the Before phase, reads the source bytes, runs them through the active
//! [`TransformStrategy`] and writes the result back onto the record. Failures
//! after the Before phase never reach the caller; they are reported through
//! the Error phase instead.

use imgopt_core::{
    AssetKind, AssetMut, MediaLibraryRepository, OptimizeError, OptimizeResult, SettingsProvider,
};
use imgopt_processing::{
    CodecPipeline, DefaultTransformStrategy, ImagePipeline, StrategySlot, TransformStrategy,
};
use imgopt_storage::{media_file_key, meta_file_key, Storage};
use std::any::Any;
use std::borrow::Cow;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::events::{OptimizationEvent, OptimizerEvents};

/// Collaborators shared by every optimizer of a process
#[derive(Clone)]
pub struct OptimizerContext {
    pub settings: Arc<dyn SettingsProvider>,
    /// Site storage, read when a media or meta file is not held in memory
    pub storage: Arc<dyn Storage>,
    pub media_libraries: Arc<dyn MediaLibraryRepository>,
    pub strategy: Arc<StrategySlot>,
    pub events: Arc<OptimizerEvents>,
    pub pipeline: Arc<dyn ImagePipeline>,
}

impl OptimizerContext {
    /// Context using the process-wide strategy slot and notification bus
    pub fn new(
        settings: Arc<dyn SettingsProvider>,
        storage: Arc<dyn Storage>,
        media_libraries: Arc<dyn MediaLibraryRepository>,
    ) -> Self {
        Self {
            settings,
            storage,
            media_libraries,
            strategy: StrategySlot::global(),
            events: OptimizerEvents::global(),
            pipeline: Arc::new(CodecPipeline),
        }
    }

    pub fn with_strategy_slot(mut self, strategy: Arc<StrategySlot>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_events(mut self, events: Arc<OptimizerEvents>) -> Self {
        self.events = events;
        self
    }

    pub fn with_pipeline(mut self, pipeline: Arc<dyn ImagePipeline>) -> Self {
        self.pipeline = pipeline;
        self
    }
}

/// Optimizer bound to one site
#[derive(Clone)]
pub struct ImageOptimizer {
    site_name: String,
    context: OptimizerContext,
}

impl ImageOptimizer {
    /// Create an optimizer for `site_name`. Installs a
    /// [`DefaultTransformStrategy`] for the site when no strategy is set yet.
    pub fn new(site_name: impl Into<String>, context: OptimizerContext) -> Self {
        let site_name = site_name.into();

        let default: Arc<dyn TransformStrategy> = Arc::new(DefaultTransformStrategy::new(
            site_name.clone(),
            context.settings.clone(),
        ));
        if context.strategy.install_if_empty(default) {
            tracing::debug!(site = %site_name, "Installed default image transformation strategy");
        }

        Self { site_name, context }
    }

    pub fn site_name(&self) -> &str {
        &self.site_name
    }

    pub fn context(&self) -> &OptimizerContext {
        &self.context
    }

    pub fn events(&self) -> &Arc<OptimizerEvents> {
        &self.context.events
    }

    /// Optimize one asset in place.
    ///
    /// Ineligible assets and cancelled optimizations are left untouched and
    /// produce no further notification.
    pub async fn optimize<'a>(&self, asset: impl Into<AssetMut<'a>>) {
        let mut asset = asset.into();
        self.optimize_asset(&mut asset).await;
    }

    #[tracing::instrument(
        skip(self, asset),
        fields(site = %self.site_name, kind = %asset.kind(), extension = %asset.extension())
    )]
    pub async fn optimize_asset(&self, asset: &mut AssetMut<'_>) {
        if !self.is_eligible(asset) {
            return;
        }

        let cancelled = {
            let mut event = OptimizationEvent::new(&self.site_name, asset.as_asset_ref());
            if let Err(e) = self.context.events.before.publish(&mut event) {
                event.set_error(OptimizeError::Observer(e));
                self.report_error(&event);
                return;
            }
            event.is_cancelled()
        };

        if cancelled {
            tracing::debug!("Image optimization cancelled by observer");
            return;
        }

        let original_size = asset.size();
        let outcome = self.transform(asset).await;

        // Observers of the outcome see the record as written back
        let mut event = OptimizationEvent::new(&self.site_name, asset.as_asset_ref());
        match outcome {
            Ok(()) => {
                event.mark_successful();

                tracing::info!(
                    guid = %event.asset().guid(),
                    original_size,
                    optimized_size = event.asset().size(),
                    "Image optimized"
                );

                if let Err(e) = self.context.events.after.publish(&event) {
                    event.set_error(OptimizeError::Observer(e));
                    self.report_error(&event);
                }
            }
            Err(e) => {
                event.set_error(e);
                self.report_error(&event);
            }
        }
    }

    /// Eligibility gates: global flag, per-kind flag, configured extension
    fn is_eligible(&self, asset: &AssetMut<'_>) -> bool {
        let settings = match self.context.settings.site_settings(&self.site_name) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(error = %e, "Could not read image optimization settings");
                return false;
            }
        };

        if !settings.optimization_enabled {
            tracing::debug!("Image optimization disabled for site");
            return false;
        }

        if !settings.kind_enabled(asset.kind()) {
            tracing::debug!("Image optimization disabled for asset kind");
            return false;
        }

        if !settings.is_extension_eligible(asset.extension()) {
            tracing::debug!(
                eligible = %settings.file_extensions,
                "Extension not eligible for image optimization"
            );
            return false;
        }

        true
    }

    async fn transform(&self, asset: &mut AssetMut<'_>) -> OptimizeResult<()> {
        let strategy = self.context.strategy.current().ok_or_else(|| {
            OptimizeError::Strategy(anyhow::anyhow!("No image transformation strategy set"))
        })?;

        let optimized = {
            let source = self.source_bytes(asset).await?;
            // A panicking strategy or codec ends in the Error phase
            panic::catch_unwind(AssertUnwindSafe(|| {
                self.context.pipeline.run(&source, strategy.as_ref())
            }))
            .map_err(|payload| OptimizeError::Panicked(panic_message(&*payload)))??
        };

        if optimized.is_empty() {
            return Err(OptimizeError::EmptyOutput);
        }

        asset.write_back(optimized)
    }

    /// Bytes to optimize: the record's in-memory payload, or for media and
    /// meta files the copy in site storage
    async fn source_bytes<'s>(&self, asset: &'s AssetMut<'_>) -> OptimizeResult<Cow<'s, [u8]>> {
        if let Some(binary) = asset.in_memory_binary() {
            return Ok(Cow::Borrowed(binary));
        }

        let key = match asset {
            AssetMut::MediaFile(file) => {
                let folder = self
                    .context
                    .media_libraries
                    .library_folder(file.library_id)
                    .await
                    .map_err(OptimizeError::Repository)?
                    .ok_or_else(|| {
                        OptimizeError::SourceNotFound(format!(
                            "media library {} does not exist",
                            file.library_id
                        ))
                    })?;
                media_file_key(&self.site_name, &folder, &file.file_path)
            }
            AssetMut::MetaFile(file) => {
                meta_file_key(&self.site_name, file.guid, &file.meta_file_extension)
            }
            AssetMut::Attachment(_) => {
                return Err(OptimizeError::MissingBinary(AssetKind::Attachment))
            }
            AssetMut::AttachmentVersion(_) => {
                return Err(OptimizeError::MissingBinary(AssetKind::AttachmentVersion))
            }
        };

        tracing::debug!(key = %key, "Reading image from site storage");
        let data = self.context.storage.download(&key).await?;
        Ok(Cow::Owned(data))
    }

    fn report_error(&self, event: &OptimizationEvent<'_>) {
        if let Err(e) = self.context.events.error.publish(event) {
            tracing::warn!(error = %e, "Image optimization error observer failed");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

//! Shared setup for optimizer integration tests

#![allow(dead_code)]

use imgopt_core::{InMemorySettings, SiteSettings};
use imgopt_processing::StrategySlot;
use imgopt_services::test_helpers::{
    CountingPipeline, EventRecorder, InMemoryAttachmentHistory, InMemoryAttachments,
    InMemoryDocuments, InMemoryMediaLibraries,
};
use imgopt_services::{ChangeInterceptor, ImageOptimizer, OptimizerContext, OptimizerEvents};
use imgopt_storage::MemoryStorage;
use std::sync::Arc;

pub const SITE: &str = "corporate";
pub const LIBRARY_ID: i64 = 1;
pub const LIBRARY_FOLDER: &str = "Images";

/// Isolated optimizer wiring: its own strategy slot and notification bus,
/// with a recorder attached to every phase
pub struct TestHarness {
    pub settings: Arc<InMemorySettings>,
    pub storage: Arc<MemoryStorage>,
    pub libraries: Arc<InMemoryMediaLibraries>,
    pub strategy: Arc<StrategySlot>,
    pub events: Arc<OptimizerEvents>,
    pub pipeline: Arc<CountingPipeline>,
    pub recorder: EventRecorder,
    pub attachments: Arc<InMemoryAttachments>,
    pub history: Arc<InMemoryAttachmentHistory>,
    pub documents: Arc<InMemoryDocuments>,
}

impl TestHarness {
    pub fn new(settings: SiteSettings) -> Self {
        let events = Arc::new(OptimizerEvents::new());
        let recorder = EventRecorder::attach(&events);

        let libraries = Arc::new(InMemoryMediaLibraries::new());
        libraries.add_library(LIBRARY_ID, LIBRARY_FOLDER);

        Self {
            settings: Arc::new(InMemorySettings::new(settings)),
            storage: Arc::new(MemoryStorage::new()),
            libraries,
            strategy: Arc::new(StrategySlot::new()),
            events,
            pipeline: Arc::new(CountingPipeline::codec()),
            recorder,
            attachments: Arc::new(InMemoryAttachments::new()),
            history: Arc::new(InMemoryAttachmentHistory::new()),
            documents: Arc::new(InMemoryDocuments::new()),
        }
    }

    pub fn enabled() -> Self {
        Self::new(SiteSettings::all_enabled())
    }

    pub fn context(&self) -> OptimizerContext {
        OptimizerContext::new(
            self.settings.clone(),
            self.storage.clone(),
            self.libraries.clone(),
        )
        .with_strategy_slot(self.strategy.clone())
        .with_events(self.events.clone())
        .with_pipeline(self.pipeline.clone())
    }

    pub fn optimizer(&self) -> ImageOptimizer {
        ImageOptimizer::new(SITE, self.context())
    }

    pub fn interceptor(&self) -> ChangeInterceptor {
        ChangeInterceptor::new(
            self.context(),
            self.attachments.clone(),
            self.history.clone(),
            self.documents.clone(),
        )
    }

    /// Replace the site's settings
    pub fn update_settings(&self, settings: SiteSettings) {
        self.settings.update(SITE, settings);
    }
}

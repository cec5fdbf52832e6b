//! Recorders for notifications and pipeline runs

use imgopt_core::{OptimizeError, OptimizeResult};
use imgopt_processing::{CodecPipeline, ImagePipeline, TransformStrategy};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::events::OptimizerEvents;

/// Notification phase as seen by an observer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedPhase {
    Before,
    After { size: i64 },
    Error { code: &'static str, successful: bool },
}

/// Subscribes to all three phases of a bus and records what it sees
#[derive(Clone, Default)]
pub struct EventRecorder {
    phases: Arc<Mutex<Vec<RecordedPhase>>>,
}

impl EventRecorder {
    pub fn attach(events: &OptimizerEvents) -> Self {
        let recorder = Self::default();

        let phases = recorder.phases.clone();
        events.before.subscribe(move |_| {
            phases.lock().unwrap().push(RecordedPhase::Before);
            Ok(())
        });

        let phases = recorder.phases.clone();
        events.after.subscribe(move |event| {
            phases.lock().unwrap().push(RecordedPhase::After {
                size: event.asset().size(),
            });
            Ok(())
        });

        let phases = recorder.phases.clone();
        events.error.subscribe(move |event| {
            phases.lock().unwrap().push(RecordedPhase::Error {
                code: event.error().map(OptimizeError::error_code).unwrap_or(""),
                successful: event.is_successful(),
            });
            Ok(())
        });

        recorder
    }

    pub fn phases(&self) -> Vec<RecordedPhase> {
        self.phases.lock().unwrap().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.lock().unwrap().is_empty()
    }
}

/// Wraps a pipeline and counts how often it runs
pub struct CountingPipeline {
    inner: Arc<dyn ImagePipeline>,
    runs: AtomicUsize,
}

impl CountingPipeline {
    pub fn new(inner: Arc<dyn ImagePipeline>) -> Self {
        Self {
            inner,
            runs: AtomicUsize::new(0),
        }
    }

    pub fn codec() -> Self {
        Self::new(Arc::new(CodecPipeline))
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

impl ImagePipeline for CountingPipeline {
    fn run(&self, data: &[u8], strategy: &dyn TransformStrategy) -> OptimizeResult<Vec<u8>> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.inner.run(data, strategy)
    }
}

/// Pipeline that always produces zero bytes
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyOutputPipeline;

impl ImagePipeline for EmptyOutputPipeline {
    fn run(&self, _data: &[u8], _strategy: &dyn TransformStrategy) -> OptimizeResult<Vec<u8>> {
        Ok(Vec::new())
    }
}

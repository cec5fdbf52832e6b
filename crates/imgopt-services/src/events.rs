//! Optimization lifecycle notifications
//!
//! Every optimization call that passes the eligibility gates produces one
//! [`OptimizationEvent`] and publishes it in up to three phases:
//!
//! - **Before**: observers may cancel the optimization
//! - **After**: the optimized bytes were written back to the record
//! - **Error**: extraction, transformation, write-back or an observer failed
//!
//! Observers run synchronously on the calling task, in registration order.

use imgopt_core::{AssetRef, LogLevel, OptimizeError};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, RwLock};

/// Observer of the Before phase, the only phase allowed to mutate the event
pub type BeforeObserver =
    dyn Fn(&mut OptimizationEvent<'_>) -> anyhow::Result<()> + Send + Sync;

/// Observer of the After and Error phases
pub type EventObserver = dyn Fn(&OptimizationEvent<'_>) -> anyhow::Result<()> + Send + Sync;

/// Notification payload of one optimization call.
///
/// Borrows the record being optimized, so observers see every field of the
/// variant that triggered the call. During After the record already holds
/// the optimized binary and size.
#[derive(Debug)]
pub struct OptimizationEvent<'a> {
    site_name: &'a str,
    asset: AssetRef<'a>,
    cancel_image_optimization: bool,
    image_optimization_successful: bool,
    error: Option<OptimizeError>,
}

impl<'a> OptimizationEvent<'a> {
    pub(crate) fn new(site_name: &'a str, asset: AssetRef<'a>) -> Self {
        Self {
            site_name,
            asset,
            cancel_image_optimization: false,
            image_optimization_successful: false,
            error: None,
        }
    }

    pub fn site_name(&self) -> &'a str {
        self.site_name
    }

    pub fn asset(&self) -> AssetRef<'a> {
        self.asset
    }

    /// Veto the optimization. Only has an effect during the Before phase.
    pub fn cancel(&mut self) {
        self.cancel_image_optimization = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_image_optimization
    }

    pub fn is_successful(&self) -> bool {
        self.image_optimization_successful
    }

    pub fn error(&self) -> Option<&OptimizeError> {
        self.error.as_ref()
    }

    pub(crate) fn mark_successful(&mut self) {
        self.image_optimization_successful = true;
    }

    pub(crate) fn set_error(&mut self, error: OptimizeError) {
        self.error = Some(error);
    }
}

/// Ordered list of observers for one phase
pub struct ObserverSlot<O: ?Sized> {
    observers: RwLock<Vec<Arc<O>>>,
}

impl<O: ?Sized> Default for ObserverSlot<O> {
    fn default() -> Self {
        Self {
            observers: RwLock::new(Vec::new()),
        }
    }
}

impl<O: ?Sized> fmt::Debug for ObserverSlot<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverSlot")
            .field("observers", &self.len())
            .finish()
    }
}

impl<O: ?Sized> ObserverSlot<O> {
    fn push(&self, observer: Arc<O>) {
        self.observers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(observer);
    }

    /// Observers are cloned out so one may subscribe further observers
    /// while the phase is being published
    fn snapshot(&self) -> Vec<Arc<O>> {
        self.observers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.observers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ObserverSlot<BeforeObserver> {
    pub fn subscribe<F>(&self, observer: F)
    where
        F: Fn(&mut OptimizationEvent<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.push(Arc::new(observer));
    }

    /// Run every observer in order, stopping at the first failure
    pub fn publish(&self, event: &mut OptimizationEvent<'_>) -> anyhow::Result<()> {
        for observer in self.snapshot() {
            observer(&mut *event)?;
        }
        Ok(())
    }
}

impl ObserverSlot<EventObserver> {
    pub fn subscribe<F>(&self, observer: F)
    where
        F: Fn(&OptimizationEvent<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.push(Arc::new(observer));
    }

    /// Run every observer in order, stopping at the first failure
    pub fn publish(&self, event: &OptimizationEvent<'_>) -> anyhow::Result<()> {
        for observer in self.snapshot() {
            observer(event)?;
        }
        Ok(())
    }
}

/// The three notification phases of image optimization
#[derive(Debug, Default)]
pub struct OptimizerEvents {
    pub before: ObserverSlot<BeforeObserver>,
    pub after: ObserverSlot<EventObserver>,
    pub error: ObserverSlot<EventObserver>,
    error_logging: AtomicBool,
}

static GLOBAL_EVENTS: OnceLock<Arc<OptimizerEvents>> = OnceLock::new();

impl OptimizerEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide notification bus
    pub fn global() -> Arc<Self> {
        GLOBAL_EVENTS
            .get_or_init(|| Arc::new(OptimizerEvents::new()))
            .clone()
    }
}

/// Subscribe an Error observer that writes failures to `tracing` at the
/// error's log level. Attaches at most once per bus.
pub fn attach_error_logging(events: &OptimizerEvents) {
    if events.error_logging.swap(true, Ordering::SeqCst) {
        return;
    }

    events.error.subscribe(|event| {
        let Some(error) = event.error() else {
            return Ok(());
        };
        let asset = event.asset();

        match error.log_level() {
            LogLevel::Debug => tracing::debug!(
                site = %event.site_name(),
                kind = %asset.kind(),
                guid = %asset.guid(),
                name = %asset.name(),
                error_code = error.error_code(),
                error = %error,
                "Image optimization skipped"
            ),
            LogLevel::Warn => tracing::warn!(
                site = %event.site_name(),
                kind = %asset.kind(),
                guid = %asset.guid(),
                name = %asset.name(),
                error_code = error.error_code(),
                error = %error,
                "Image optimization failed"
            ),
            LogLevel::Error => tracing::error!(
                site = %event.site_name(),
                kind = %asset.kind(),
                guid = %asset.guid(),
                name = %asset.name(),
                error_code = error.error_code(),
                error = ?error,
                "Image optimization failed"
            ),
        }

        Ok(())
    });
}

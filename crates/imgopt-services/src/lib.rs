//! imgopt Services Library
//!
//! The optimization orchestrator, its notification bus, the record
//! lifecycle interceptor and process bootstrap.

pub mod bootstrap;
pub mod events;
pub mod interceptor;
pub mod optimizer;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use bootstrap::{ensure_cache_directory, init_tracing, HookRegistrar, ImageOptimizationModule};
pub use events::{attach_error_logging, OptimizationEvent, OptimizerEvents};
pub use interceptor::{ChangeInterceptor, LifecycleHook};
pub use optimizer::{ImageOptimizer, OptimizerContext};

// Strategy substitution is part of the public surface of this crate
pub use imgopt_processing::{set_strategy, DefaultTransformStrategy, TransformStrategy};

//! Process start for hosts embedding the optimizer
//!
//! - `init_tracing` installs the fmt subscriber
//! - `ensure_cache_directory` creates the image cache under the app root
//! - `ImageOptimizationModule` registers the interceptor on every hook

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::events::attach_error_logging;
use crate::interceptor::{ChangeInterceptor, LifecycleHook};

/// Initialize tracing with `RUST_LOG`, defaulting to `info`.
///
/// Does nothing when a global subscriber is already installed.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}

/// Create `{app_root}/{cache_directory}` if it is missing.
///
/// Leading and trailing slashes of `cache_directory` are ignored. Failures are
/// logged and reported as `None`; they never stop the process.
pub fn ensure_cache_directory(app_root: &Path, cache_directory: &str) -> Option<PathBuf> {
    let relative = cache_directory.trim_matches(['/', '\\']);
    if relative.is_empty() {
        tracing::warn!("Image cache directory is not configured");
        return None;
    }

    let path = app_root.join(relative);
    match std::fs::create_dir_all(&path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "Image cache directory ready");
            Some(path)
        }
        Err(e) => {
            tracing::error!(
                error = %e,
                path = %path.display(),
                "Failed to create image cache directory"
            );
            None
        }
    }
}

/// Host side of hook registration
pub trait HookRegistrar {
    fn register(&mut self, hook: LifecycleHook, interceptor: Arc<ChangeInterceptor>);
}

/// Wires image optimization into a host on startup
pub struct ImageOptimizationModule;

impl ImageOptimizationModule {
    /// Prepare the site's cache directory, log optimization failures and bind
    /// the interceptor to all seven lifecycle hooks
    pub fn init(
        app_root: &Path,
        site_name: &str,
        interceptor: ChangeInterceptor,
        registrar: &mut dyn HookRegistrar,
    ) -> Arc<ChangeInterceptor> {
        let context = interceptor.context();

        match context.settings.site_settings(site_name) {
            Ok(settings) => {
                ensure_cache_directory(app_root, &settings.cache_directory);
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    site = %site_name,
                    "Could not read settings, image cache directory not created"
                );
            }
        }

        attach_error_logging(&context.events);

        let interceptor = Arc::new(interceptor);
        for hook in LifecycleHook::ALL {
            registrar.register(hook, interceptor.clone());
        }

        tracing::info!(
            site = %site_name,
            hooks = LifecycleHook::ALL.len(),
            "Image optimization module initialized"
        );
        interceptor
    }
}

//! Configuration module
//!
//! Per-site optimization settings. Values are resolved through a
//! [`SettingsProvider`] on every eligibility check and strategy invocation, so
//! changes take effect on the next call without a restart.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::sync::RwLock;

use crate::error::{OptimizeError, OptimizeResult};
use crate::models::AssetKind;

pub const KEY_OPTIMIZATION_ENABLED: &str = "IMAGE_OPTIMIZATION_ENABLED";
pub const KEY_OPTIMIZE_MEDIA_FILES: &str = "IMAGE_OPTIMIZE_MEDIA_FILES";
pub const KEY_OPTIMIZE_PAGE_ATTACHMENTS: &str = "IMAGE_OPTIMIZE_PAGE_ATTACHMENTS";
pub const KEY_OPTIMIZE_META_FILES: &str = "IMAGE_OPTIMIZE_META_FILES";
pub const KEY_FILE_EXTENSIONS: &str = "IMAGE_FILE_EXTENSIONS";
pub const KEY_IMAGE_QUALITY: &str = "IMAGE_QUALITY";
pub const KEY_CACHE_DIRECTORY: &str = "IMAGE_CACHE_DIRECTORY";

const DEFAULT_FILE_EXTENSIONS: &str = "jpg;jpeg;png";
const DEFAULT_IMAGE_QUALITY: i32 = 75;
const DEFAULT_CACHE_DIRECTORY: &str = "App_Data/ImageCache";

/// Separators accepted in the eligible extension list
const EXTENSION_DELIMITERS: [char; 4] = [',', ';', '|', ' '];

/// Resolved settings for one site
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteSettings {
    pub optimization_enabled: bool,
    pub optimize_media_files: bool,
    pub optimize_page_attachments: bool,
    pub optimize_meta_files: bool,
    /// Delimited list of eligible extensions, e.g. `".jpg;.png"`
    pub file_extensions: String,
    pub image_quality: i32,
    pub cache_directory: String,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            optimization_enabled: false,
            optimize_media_files: false,
            optimize_page_attachments: false,
            optimize_meta_files: false,
            file_extensions: DEFAULT_FILE_EXTENSIONS.to_string(),
            image_quality: DEFAULT_IMAGE_QUALITY,
            cache_directory: DEFAULT_CACHE_DIRECTORY.to_string(),
        }
    }
}

impl SiteSettings {
    /// Settings with every flag switched on, handy for hosts that opt in globally
    pub fn all_enabled() -> Self {
        Self {
            optimization_enabled: true,
            optimize_media_files: true,
            optimize_page_attachments: true,
            optimize_meta_files: true,
            ..Default::default()
        }
    }

    /// Per-kind enabled flag; both attachment kinds share the page attachment flag
    pub fn kind_enabled(&self, kind: AssetKind) -> bool {
        match kind {
            AssetKind::MediaFile => self.optimize_media_files,
            AssetKind::MetaFile => self.optimize_meta_files,
            AssetKind::Attachment | AssetKind::AttachmentVersion => {
                self.optimize_page_attachments
            }
        }
    }

    /// Eligible extensions in configured order, empty entries removed
    pub fn eligible_extensions(&self) -> Vec<&str> {
        self.file_extensions
            .split(EXTENSION_DELIMITERS)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Case-insensitive extension match; a leading `.` is ignored on both sides
    pub fn is_extension_eligible(&self, extension: &str) -> bool {
        let wanted = extension.trim().trim_start_matches('.');
        if wanted.is_empty() {
            return false;
        }
        self.eligible_extensions()
            .iter()
            .any(|candidate| candidate.trim_start_matches('.').eq_ignore_ascii_case(wanted))
    }
}

/// Source of per-site settings.
///
/// Implementations must not cache: every call reflects the current values.
pub trait SettingsProvider: Send + Sync {
    fn site_settings(&self, site_name: &str) -> OptimizeResult<SiteSettings>;
}

/// Settings held in memory, with a fallback used for sites without an entry
#[derive(Debug, Default)]
pub struct InMemorySettings {
    default: RwLock<SiteSettings>,
    sites: RwLock<HashMap<String, SiteSettings>>,
}

impl InMemorySettings {
    pub fn new(default: SiteSettings) -> Self {
        Self {
            default: RwLock::new(default),
            sites: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the settings of one site
    pub fn update(&self, site_name: impl Into<String>, settings: SiteSettings) {
        let mut sites = self.sites.write().unwrap_or_else(|e| e.into_inner());
        sites.insert(site_name.into(), settings);
    }

    /// Replace the fallback settings
    pub fn set_default(&self, settings: SiteSettings) {
        *self.default.write().unwrap_or_else(|e| e.into_inner()) = settings;
    }
}

impl SettingsProvider for InMemorySettings {
    fn site_settings(&self, site_name: &str) -> OptimizeResult<SiteSettings> {
        let sites = self
            .sites
            .read()
            .map_err(|_| OptimizeError::Settings("settings lock poisoned".to_string()))?;
        if let Some(settings) = sites.get(site_name) {
            return Ok(settings.clone());
        }
        drop(sites);

        self.default
            .read()
            .map(|settings| settings.clone())
            .map_err(|_| OptimizeError::Settings("settings lock poisoned".to_string()))
    }
}

/// Settings read from environment variables.
///
/// A site-specific value `KEY__SITENAME` (site name upper-cased, non
/// alphanumeric characters replaced by `_`) wins over the plain `KEY`.
#[derive(Debug, Clone, Default)]
pub struct EnvSettings;

impl EnvSettings {
    /// Create the provider, loading a `.env` file when one is present
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        EnvSettings
    }

    fn site_suffix(site_name: &str) -> String {
        site_name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect()
    }

    fn var(key: &str, site_name: &str) -> Option<String> {
        if !site_name.is_empty() {
            let scoped = format!("{}__{}", key, Self::site_suffix(site_name));
            if let Ok(value) = env::var(scoped) {
                return Some(value);
            }
        }
        env::var(key).ok()
    }

    fn bool_var(key: &str, site_name: &str, default: bool) -> bool {
        Self::var(key, site_name)
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on"))
            .unwrap_or(default)
    }
}

impl SettingsProvider for EnvSettings {
    fn site_settings(&self, site_name: &str) -> OptimizeResult<SiteSettings> {
        let defaults = SiteSettings::default();

        let image_quality = match Self::var(KEY_IMAGE_QUALITY, site_name) {
            Some(raw) => raw.trim().parse::<i32>().map_err(|_| {
                OptimizeError::Settings(format!(
                    "{} must be a valid integer, got '{}'",
                    KEY_IMAGE_QUALITY, raw
                ))
            })?,
            None => defaults.image_quality,
        };

        Ok(SiteSettings {
            optimization_enabled: Self::bool_var(
                KEY_OPTIMIZATION_ENABLED,
                site_name,
                defaults.optimization_enabled,
            ),
            optimize_media_files: Self::bool_var(
                KEY_OPTIMIZE_MEDIA_FILES,
                site_name,
                defaults.optimize_media_files,
            ),
            optimize_page_attachments: Self::bool_var(
                KEY_OPTIMIZE_PAGE_ATTACHMENTS,
                site_name,
                defaults.optimize_page_attachments,
            ),
            optimize_meta_files: Self::bool_var(
                KEY_OPTIMIZE_META_FILES,
                site_name,
                defaults.optimize_meta_files,
            ),
            file_extensions: Self::var(KEY_FILE_EXTENSIONS, site_name)
                .unwrap_or(defaults.file_extensions),
            image_quality,
            cache_directory: Self::var(KEY_CACHE_DIRECTORY, site_name)
                .unwrap_or(defaults.cache_directory),
        })
    }
}

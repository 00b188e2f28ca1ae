//! Blocking policy: which page structures count as short-form content, which
//! locations are the landing page and the immersive viewer, and the tunable
//! timings of the processing pipeline.

use qf_core::QfError;
use qf_core::QfResult;
use serde::Deserialize;
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use url::Url;

/// Attribute stamped on every node the pipeline creates.
pub const OWNED_MARKER_ATTRIBUTE: &str = "data-quietfeed";
/// Attribute on an overlay naming the node it stands in for.
pub const OVERLAY_TARGET_ATTRIBUTE: &str = "data-quietfeed-target";
/// Environment variable naming a TOML config file.
pub const CONFIG_ENV_VAR: &str = "QUIETFEED_CONFIG";

const DEFAULT_TARGET_SELECTORS: &[&str] = &[
    "ytd-reel-shelf-renderer",
    "ytd-rich-shelf-renderer[is-shorts]",
    "ytd-rich-item-renderer[is-shorts]",
    "ytm-shorts-lockup-view-model",
];

const DEFAULT_ANCILLARY_SELECTORS: &[&str] = &[
    "#navigation-button-up",
    "#navigation-button-down",
    "ytd-shorts .navigation-container",
];

const DEFAULT_SCROLL_KEYS: &[&str] = &["ArrowUp", "ArrowDown", "PageUp", "PageDown", " ", "Home", "End"];

const MAX_DELAY_MS: u64 = 10_000;

/// Page classification derived from the current location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationMode {
    /// The feed landing page; hosts the saved-items panel.
    Landing,
    /// Full-screen short-video viewer; navigation buttons hidden, scrolling blocked.
    ImmersiveViewer,
    Other,
}

impl LocationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Landing => "landing",
            Self::ImmersiveViewer => "immersive",
            Self::Other => "other",
        }
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub timing: TimingConfig,
    pub selectors: SelectorConfig,
    pub locations: LocationConfig,
    pub scroll_lock: ScrollLockConfig,
    pub saved_items: SavedItemsConfig,
}

/// Delays of the two pass-triggering timers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Quiet period after the last qualifying mutation batch.
    pub mutation_debounce_ms: u64,
    /// Delay after a navigation so the SPA can re-render before scanning.
    pub navigation_settle_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Target content, in priority order.
    pub targets: Vec<String>,
    /// Viewer controls hidden one-way in immersive mode.
    pub ancillary: Vec<String>,
    /// Where the saved-items panel goes on the landing page.
    pub panel_container: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    pub landing_paths: Vec<String>,
    pub immersive_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollLockConfig {
    /// `KeyboardEvent.key` values cancelled while the viewer is locked.
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SavedItemsConfig {
    pub max_items: usize,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            mutation_debounce_ms: 150,
            navigation_settle_ms: 300,
        }
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            targets: to_owned_list(DEFAULT_TARGET_SELECTORS),
            ancillary: to_owned_list(DEFAULT_ANCILLARY_SELECTORS),
            panel_container: "#primary".to_owned(),
        }
    }
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            landing_paths: vec!["/".to_owned()],
            immersive_prefix: "/shorts/".to_owned(),
        }
    }
}

impl Default for ScrollLockConfig {
    fn default() -> Self {
        Self {
            keys: to_owned_list(DEFAULT_SCROLL_KEYS),
        }
    }
}

impl Default for SavedItemsConfig {
    fn default() -> Self {
        Self { max_items: 100 }
    }
}

impl TimingConfig {
    pub fn mutation_debounce(&self) -> Duration {
        Duration::from_millis(self.mutation_debounce_ms)
    }

    pub fn navigation_settle(&self) -> Duration {
        Duration::from_millis(self.navigation_settle_ms)
    }
}

impl PipelineConfig {
    pub fn from_toml_str(input: &str) -> QfResult<Self> {
        let config: Self = toml::from_str(input).map_err(|error| {
            QfError::new(
                "policy.config_parse_failed",
                format!("failed to parse pipeline config: {error}"),
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> QfResult<Self> {
        if !path.exists() {
            info!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|error| {
            QfError::new(
                "policy.config_read_failed",
                format!("failed to read config `{}`: {error}", path.display()),
            )
        })?;
        let config = Self::from_toml_str(&content)?;
        info!(path = %path.display(), "loaded pipeline config");
        Ok(config)
    }

    pub fn validate(&self) -> QfResult<()> {
        if self.selectors.targets.iter().all(|selector| selector.trim().is_empty()) {
            return Err(QfError::new(
                "policy.targets_empty",
                "at least one target selector is required",
            ));
        }

        for (name, value) in [
            ("mutation_debounce_ms", self.timing.mutation_debounce_ms),
            ("navigation_settle_ms", self.timing.navigation_settle_ms),
        ] {
            if value > MAX_DELAY_MS {
                return Err(QfError::new(
                    "policy.delay_too_large",
                    format!("{name} exceeds {MAX_DELAY_MS} ms ({value})"),
                ));
            }
        }

        if !self.locations.immersive_prefix.starts_with('/') {
            return Err(QfError::new(
                "policy.immersive_prefix_invalid",
                "immersive_prefix must be an absolute path prefix",
            ));
        }

        if self.saved_items.max_items == 0 {
            return Err(QfError::new(
                "policy.saved_items_cap_invalid",
                "saved_items.max_items must be greater than zero",
            ));
        }

        Ok(())
    }
}

/// Picks the config file: explicit path, then `QUIETFEED_CONFIG`.
pub fn resolve_config_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
    explicit.or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from))
}

/// Policy queries used by the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockingPolicy {
    pub config: PipelineConfig,
}

impl BlockingPolicy {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn target_selectors(&self) -> &[String] {
        &self.config.selectors.targets
    }

    pub fn ancillary_selectors(&self) -> &[String] {
        &self.config.selectors.ancillary
    }

    /// Classifies an absolute URL. Unparseable locations are `Other`.
    pub fn location_mode(&self, href: &str) -> LocationMode {
        let Ok(url) = Url::parse(href) else {
            return LocationMode::Other;
        };

        let path = url.path();
        let locations = &self.config.locations;
        if path.starts_with(&locations.immersive_prefix) && path.len() > locations.immersive_prefix.len() {
            return LocationMode::ImmersiveViewer;
        }
        if locations.landing_paths.iter().any(|landing| landing == path) {
            return LocationMode::Landing;
        }
        LocationMode::Other
    }

    /// Returns true if this key should be swallowed while the viewer is locked.
    pub fn blocks_key(&self, key: &str) -> bool {
        self.config.scroll_lock.keys.iter().any(|blocked| blocked == key)
    }
}

fn to_owned_list(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_owned()).collect()
}

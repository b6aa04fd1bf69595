use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::core::error::ScoutError;

// ---------------------------------------------------------------------------
// ScoutConfig: file-based config loader (contact-scout.json) with env-var fallback
// ---------------------------------------------------------------------------

pub const ENV_CONFIG_PATH: &str = "CONTACT_SCOUT_CONFIG";
pub const ENV_CHROME_EXECUTABLE: &str = "CHROME_EXECUTABLE";
pub const ENV_EXPORT_DIR: &str = "CONTACT_SCOUT_EXPORT_DIR";
pub const ENV_HEADLESS: &str = "CONTACT_SCOUT_HEADLESS";
pub const ENV_TARGET_URL: &str = "CONTACT_SCOUT_URL";

pub const DEFAULT_TARGET_URL: &str = "https://contacts.google.com/directory";
pub const DEFAULT_EXPECTED_LOCATION: &str = "contacts.google.com/directory";

/// Scroll-loop tuning (the `scroll` key in contact-scout.json).
///
/// Speeds are in CSS pixels per iteration; delays in milliseconds.
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ScrollTuning {
    pub initial_speed: u32,
    pub min_speed: u32,
    pub max_speed: u32,
    /// Speed to fall back to after saturating at `max_speed` without reaching target.
    pub fallback_speed: u32,
    /// Minimum step used when accelerating (the step is otherwise half the current speed).
    pub speed_increment_floor: u32,
    pub speed_decrement: u32,
    /// Larger decrement applied when scrolling fails while nothing is being found.
    pub stall_decrement: u32,
    pub stall_no_yield_threshold: u32,
    /// New contacts per scroll at which the current speed is frozen as optimal.
    pub target_contacts_per_scroll: usize,
    /// Consecutive zero-yield iterations before the page counts as exhausted.
    pub exhaustion_threshold: u32,
    /// Consecutive failed scrolls before giving up on the container.
    pub max_scroll_attempts: u32,
    /// Consecutive failed iterations before the run ends in error.
    pub max_loop_retries: u32,
    pub initial_load_delay_ms: u64,
    pub settle_delay_ms: u64,
    pub iteration_delay_ms: u64,
    pub retry_delay_ms: u64,
}

impl Default for ScrollTuning {
    fn default() -> Self {
        Self {
            initial_speed: 5_000,
            min_speed: 2_000,
            max_speed: 20_000,
            fallback_speed: 10_000,
            speed_increment_floor: 2_000,
            speed_decrement: 2_000,
            stall_decrement: 4_000,
            stall_no_yield_threshold: 2,
            target_contacts_per_scroll: 14,
            exhaustion_threshold: 5,
            max_scroll_attempts: 2_000,
            max_loop_retries: 3,
            initial_load_delay_ms: 2_000,
            settle_delay_ms: 1_000,
            iteration_delay_ms: 2_000,
            retry_delay_ms: 2_000,
        }
    }
}

impl ScrollTuning {
    /// Same thresholds, no waiting. Used by tests and dry runs against in-memory pages.
    pub fn without_delays(mut self) -> Self {
        self.initial_load_delay_ms = 0;
        self.settle_delay_ms = 0;
        self.iteration_delay_ms = 0;
        self.retry_delay_ms = 0;
        self
    }

    pub fn initial_load_delay(&self) -> Duration {
        Duration::from_millis(self.initial_load_delay_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn iteration_delay(&self) -> Duration {
        Duration::from_millis(self.iteration_delay_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Reject settings the loop cannot run with: an inverted speed range or
    /// thresholds that end or freeze a run on its first pass.
    pub fn validate(&self) -> Result<(), ScoutError> {
        let invalid = |msg: String| Err(ScoutError::Config(format!("scroll: {}", msg)));
        if self.min_speed == 0 {
            return invalid("min_speed must be at least 1".into());
        }
        if self.min_speed > self.max_speed {
            return invalid(format!(
                "min_speed ({}) is above max_speed ({})",
                self.min_speed, self.max_speed
            ));
        }
        for (key, value) in [
            ("exhaustion_threshold", self.exhaustion_threshold as usize),
            ("target_contacts_per_scroll", self.target_contacts_per_scroll),
            ("max_scroll_attempts", self.max_scroll_attempts as usize),
        ] {
            if value == 0 {
                return invalid(format!("{} must be at least 1", key));
            }
        }
        Ok(())
    }
}

/// CSS selectors describing one directory layout (the `selectors` key).
///
/// Defaults target the Google Workspace contacts directory.
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PageSelectors {
    /// Scrollable element holding the virtualized list.
    pub container: String,
    /// One rendered contact row.
    pub contact_item: String,
    /// Attribute carrying the email, read from the first descendant that has it.
    pub email_attribute: String,
    /// Element whose text is the display name.
    pub display_name: String,
    /// Rows used by the scroll-into-view strategy.
    pub scroll_anchor: String,
}

impl Default for PageSelectors {
    fn default() -> Self {
        Self {
            container: ".ZvpjBb.C8Dkz".to_string(),
            contact_item: ".pkxbt".to_string(),
            email_attribute: "data-email".to_string(),
            display_name: ".AYDrSb".to_string(),
            scroll_anchor: ".XXcuqd".to_string(),
        }
    }
}

/// Page to open and the location a run must be started from (the `target` key).
#[derive(Deserialize, Default, Clone, Debug)]
pub struct TargetConfig {
    pub url: Option<String>,
    pub expected_location: Option<String>,
}

impl TargetConfig {
    /// URL: JSON field → `CONTACT_SCOUT_URL` env var → the Google directory.
    pub fn resolve_url(&self) -> String {
        if let Some(u) = &self.url {
            if !u.trim().is_empty() {
                return u.trim().to_string();
            }
        }
        std::env::var(ENV_TARGET_URL)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TARGET_URL.to_string())
    }

    /// Substring the active page URL must contain before a run may start.
    pub fn resolve_expected_location(&self) -> String {
        self.expected_location
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_EXPECTED_LOCATION)
            .to_string()
    }
}

/// Browser launch sub-config (the `browser` key).
#[derive(Deserialize, Default, Clone, Debug)]
pub struct BrowserSettings {
    /// Run without a window. Defaults to `false`: the user has to sign in by hand.
    pub headless: Option<bool>,
    /// Chromium profile directory, so a signed-in session survives restarts.
    pub user_data_dir: Option<String>,
    pub chrome_executable: Option<String>,
}

impl BrowserSettings {
    /// Headless: JSON field → `CONTACT_SCOUT_HEADLESS` env var → `false`.
    pub fn resolve_headless(&self) -> bool {
        if let Some(b) = self.headless {
            return b;
        }
        std::env::var(ENV_HEADLESS)
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false)
    }

    /// Profile dir: JSON field → `~/.contact-scout/profile`.
    pub fn resolve_user_data_dir(&self) -> Option<PathBuf> {
        if let Some(p) = &self.user_data_dir {
            if !p.trim().is_empty() {
                return Some(PathBuf::from(p.trim()));
            }
        }
        dirs::home_dir().map(|h| h.join(".contact-scout").join("profile"))
    }

    /// Explicit executable from config; otherwise the env override (see [`chrome_executable_override`]).
    pub fn resolve_chrome_executable(&self) -> Option<String> {
        self.chrome_executable
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty() && Path::new(p).exists())
            .map(str::to_string)
            .or_else(chrome_executable_override)
    }
}

/// Top-level config loaded from `contact-scout.json`.
#[derive(Deserialize, Default, Clone, Debug)]
pub struct ScoutConfig {
    #[serde(default)]
    pub scroll: ScrollTuning,
    #[serde(default)]
    pub selectors: PageSelectors,
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub browser: BrowserSettings,
    pub export_dir: Option<String>,
}

impl ScoutConfig {
    /// Export dir: JSON field → `CONTACT_SCOUT_EXPORT_DIR` → current directory.
    pub fn resolve_export_dir(&self) -> PathBuf {
        if let Some(d) = &self.export_dir {
            if !d.trim().is_empty() {
                return PathBuf::from(d.trim());
            }
        }
        std::env::var(ENV_EXPORT_DIR)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Parse a config file. Unlike [`load_scout_config`] this reports errors, for explicit `--config` paths.
pub fn load_scout_config_from(path: &Path) -> Result<ScoutConfig, ScoutError> {
    let contents = std::fs::read_to_string(path)?;
    let cfg: ScoutConfig = serde_json::from_str(&contents)
        .map_err(|e| ScoutError::Config(format!("{}: {}", path.display(), e)))?;
    cfg.scroll.validate()?;
    Ok(cfg)
}

/// Parse and validate config JSON.
pub fn parse_scout_config(contents: &str) -> Result<ScoutConfig, ScoutError> {
    let cfg: ScoutConfig =
        serde_json::from_str(contents).map_err(|e| ScoutError::Config(e.to_string()))?;
    cfg.scroll.validate()?;
    Ok(cfg)
}

/// Load `contact-scout.json` from standard locations.
///
/// Search order (first found wins):
/// 1. `CONTACT_SCOUT_CONFIG` env var path
/// 2. `./contact-scout.json`
/// 3. `~/.contact-scout/contact-scout.json`
///
/// Missing file → `ScoutConfig::default()` (silent, env-var fallbacks apply).
/// Parse or validation error → log a warning, return `ScoutConfig::default()`.
pub fn load_scout_config() -> ScoutConfig {
    let mut candidates = vec![PathBuf::from("contact-scout.json")];
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".contact-scout").join("contact-scout.json"));
    }
    if let Ok(env_path) = std::env::var(ENV_CONFIG_PATH) {
        candidates.insert(0, PathBuf::from(env_path));
    }

    for path in &candidates {
        let Ok(contents) = std::fs::read_to_string(path) else {
            continue;
        };
        return match parse_scout_config(&contents) {
            Ok(cfg) => {
                tracing::info!("contact-scout.json loaded from {}", path.display());
                cfg
            }
            Err(e) => {
                tracing::warn!(
                    "contact-scout.json rejected at {}: {}, using defaults",
                    path.display(),
                    e
                );
                ScoutConfig::default()
            }
        };
    }

    ScoutConfig::default()
}

/// Optional override for the Chromium-family browser executable.
///
/// Only returns a value when `CHROME_EXECUTABLE` is set to an existing path.
pub fn chrome_executable_override() -> Option<String> {
    let p = std::env::var(ENV_CHROME_EXECUTABLE).ok()?;
    let p = p.trim();
    if p.is_empty() {
        return None;
    }
    if Path::new(p).exists() {
        Some(p.to_string())
    } else {
        None
    }
}

#![forbid(unsafe_code)]

//! Render configuration.
//!
//! [`RenderConfig`] collects the process-level knobs: the primary strategy,
//! extra named strategies, whether commits run inside the host's execution
//! zone, and the scheduler's frame budget. With the `policy-config` feature
//! it can be loaded from TOML or JSON.
//!
//! ```toml
//! primary_strategy = "local"
//! patch_zone = true
//! frame_budget_ms = 8.0
//!
//! [[strategies]]
//! name = "paint"
//! timing = "animation-frame"
//! commit = "mark-for-check"
//! ```
//!
//! # Failure Modes
//!
//! | Condition | Behavior |
//! |-----------|----------|
//! | Unreadable file | [`ConfigError::Io`] |
//! | Malformed TOML/JSON | [`ConfigError::Parse`] |
//! | Unknown timing or commit mode | [`ConfigError::Invalid`], nothing registered |
//! | Unknown primary strategy | Reported via the error handler; current primary kept |
//! | Non-finite or negative frame budget | Replaced by the default |
//! | Frame budget above [`MAX_FRAME_BUDGET_MS`] | Clamped to the maximum |

use std::fmt;
use std::time::Duration;

use rxt_core::ErrorHandler;

use crate::manager::RenderOptions;
use crate::report::TracingErrorHandler;
use crate::scheduler::{SchedulerConfig, Timing};
use crate::strategy::{CommitMode, StrategyDescriptor, StrategyRegistry};

/// Default scheduler frame budget in milliseconds.
pub const DEFAULT_FRAME_BUDGET_MS: f64 = 5.0;

/// Largest accepted frame budget in milliseconds.
pub const MAX_FRAME_BUDGET_MS: f64 = 1000.0;

// =============================================================================
// Errors
// =============================================================================

/// Errors from loading or applying a [`RenderConfig`].
#[derive(Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    Io(std::io::Error),
    /// The config text is not valid TOML/JSON for this schema.
    Parse(String),
    /// A value is well-formed but not meaningful.
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "config I/O error: {err}"),
            Self::Parse(msg) => write!(f, "config parse error: {msg}"),
            Self::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

// =============================================================================
// Schema
// =============================================================================

/// One extra named strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "policy-config",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct StrategySpec {
    /// Registry key.
    pub name: String,
    /// One of `sync`, `microtask`, `animation-frame`, `immediate`,
    /// `user-blocking`, `normal`, `low`, `idle`.
    pub timing: String,
    /// One of `detect-changes`, `mark-for-check`, `noop`.
    #[cfg_attr(feature = "policy-config", serde(default = "default_commit"))]
    pub commit: String,
}

#[cfg_attr(not(feature = "policy-config"), allow(dead_code))]
fn default_commit() -> String {
    CommitMode::DetectChanges.as_str().to_string()
}

impl StrategySpec {
    /// Parse into a descriptor.
    pub fn to_descriptor(&self) -> Result<StrategyDescriptor, ConfigError> {
        let timing: Timing = self.timing.parse().map_err(|err: String| {
            ConfigError::Invalid(format!("strategy '{}': {err}", self.name))
        })?;
        let commit: CommitMode = self.commit.parse().map_err(|err: String| {
            ConfigError::Invalid(format!("strategy '{}': {err}", self.name))
        })?;
        Ok(StrategyDescriptor::new(self.name.clone(), timing, commit))
    }
}

/// Process-level render configuration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "policy-config",
    derive(serde::Serialize, serde::Deserialize)
)]
#[cfg_attr(feature = "policy-config", serde(default))]
pub struct RenderConfig {
    /// Primary strategy name. `None` keeps the library default.
    pub primary_strategy: Option<String>,

    /// Run commits inside the host's execution zone.
    /// Default: false
    pub patch_zone: bool,

    /// Scheduler budget for non-expired priority tasks per frame.
    /// Default: 5.0, clamped to `[0, MAX_FRAME_BUDGET_MS]`
    pub frame_budget_ms: f64,

    /// Extra strategies registered next to the built-ins.
    pub strategies: Vec<StrategySpec>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            primary_strategy: None,
            patch_zone: false,
            frame_budget_ms: DEFAULT_FRAME_BUDGET_MS,
            strategies: Vec::new(),
        }
    }
}

impl RenderConfig {
    /// Return a copy with values normalized into their valid ranges.
    #[must_use]
    pub fn sanitized(&self) -> Self {
        let mut config = self.clone();
        config.primary_strategy = normalize_name(config.primary_strategy.as_deref());
        config.frame_budget_ms = normalize_budget(config.frame_budget_ms);
        config.strategies = config
            .strategies
            .iter()
            .filter_map(|spec| {
                let name = normalize_name(Some(&spec.name))?;
                Some(StrategySpec {
                    name,
                    timing: spec.timing.trim().to_string(),
                    commit: spec.commit.trim().to_string(),
                })
            })
            .collect();
        config
    }

    /// Parse every extra strategy.
    pub fn strategy_descriptors(&self) -> Result<Vec<StrategyDescriptor>, ConfigError> {
        self.strategies
            .iter()
            .map(StrategySpec::to_descriptor)
            .collect()
    }

    /// Install strategies and the primary name into `registry`.
    ///
    /// Invalid strategies abort before anything is registered. An unknown
    /// primary name is reported through `errors` and leaves the current
    /// primary in place.
    pub fn apply(
        &self,
        registry: &StrategyRegistry,
        errors: &dyn ErrorHandler,
    ) -> Result<(), ConfigError> {
        let config = self.sanitized();
        let descriptors = config.strategy_descriptors()?;
        for descriptor in descriptors {
            registry.register(descriptor);
        }
        if let Some(primary) = &config.primary_strategy
            && let Err(err) = registry.set_primary(primary)
        {
            errors.handle_error(&err);
        }
        tracing::info!(
            primary = %registry.primary_name(),
            extra = config.strategies.len(),
            patch_zone = config.patch_zone,
            "render config applied"
        );
        Ok(())
    }

    /// [`apply`](Self::apply) to the process-wide registry, logging errors.
    pub fn apply_global(&self) -> Result<(), ConfigError> {
        self.apply(&StrategyRegistry::global(), &TracingErrorHandler)
    }

    /// Scheduler settings derived from this config.
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            frame_budget: Duration::from_secs_f64(normalize_budget(self.frame_budget_ms) / 1000.0),
            ..SchedulerConfig::default()
        }
    }

    /// Per-anchor options derived from this config.
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions::new().patch_zone(self.patch_zone)
    }
}

#[cfg(feature = "policy-config")]
impl RenderConfig {
    /// Parse from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str::<Self>(text)
            .map(|config| config.sanitized())
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Parse from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str::<Self>(text)
            .map(|config| config.sanitized())
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Load from a file; `.json` is parsed as JSON, anything else as TOML.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "loading render config");
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&text),
            _ => Self::from_toml_str(&text),
        }
    }
}

fn normalize_name(name: Option<&str>) -> Option<String> {
    let name = name?.trim();
    (!name.is_empty()).then(|| name.to_string())
}

fn normalize_budget(ms: f64) -> f64 {
    if ms.is_finite() && ms >= 0.0 {
        ms.min(MAX_FRAME_BUDGET_MS)
    } else {
        DEFAULT_FRAME_BUDGET_MS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rxt_core::RenderError;
    use std::cell::RefCell;

    fn spec(name: &str, timing: &str, commit: &str) -> StrategySpec {
        StrategySpec {
            name: name.into(),
            timing: timing.into(),
            commit: commit.into(),
        }
    }

    #[test]
    fn defaults() {
        let config = RenderConfig::default();
        assert_eq!(config.primary_strategy, None);
        assert!(!config.patch_zone);
        assert_eq!(
            config.scheduler_config().frame_budget,
            Duration::from_millis(5)
        );
    }

    #[test]
    fn sanitize_fixes_budget_and_names() {
        let config = RenderConfig {
            primary_strategy: Some("  ".into()),
            frame_budget_ms: f64::NAN,
            strategies: vec![spec(" paint ", "idle", "noop"), spec("", "idle", "noop")],
            ..RenderConfig::default()
        }
        .sanitized();
        assert_eq!(config.primary_strategy, None);
        assert_eq!(config.frame_budget_ms, DEFAULT_FRAME_BUDGET_MS);
        assert_eq!(config.strategies, [spec("paint", "idle", "noop")]);

        let negative = RenderConfig {
            frame_budget_ms: -1.0,
            ..RenderConfig::default()
        };
        assert_eq!(negative.sanitized().frame_budget_ms, DEFAULT_FRAME_BUDGET_MS);
    }

    #[test]
    fn huge_budget_is_clamped() {
        let config = RenderConfig {
            frame_budget_ms: 1e300,
            ..RenderConfig::default()
        };
        assert_eq!(config.sanitized().frame_budget_ms, MAX_FRAME_BUDGET_MS);
        assert_eq!(
            config.scheduler_config().frame_budget,
            Duration::from_millis(1000)
        );
    }

    #[test]
    fn apply_registers_strategies_and_primary() {
        let registry = StrategyRegistry::with_builtins();
        let config = RenderConfig {
            primary_strategy: Some("paint".into()),
            strategies: vec![spec("paint", "animation-frame", "mark-for-check")],
            ..RenderConfig::default()
        };
        let errors = RefCell::new(Vec::new());
        let handler = |err: &RenderError| errors.borrow_mut().push(err.clone());
        config.apply(&registry, &handler).unwrap();
        assert_eq!(registry.primary_name(), "paint");
        assert_eq!(registry.primary().timing(), Timing::AnimationFrame);
        assert!(errors.borrow().is_empty());
    }

    #[test]
    fn unknown_primary_is_reported_and_default_kept() {
        let registry = StrategyRegistry::with_builtins();
        let config = RenderConfig {
            primary_strategy: Some("turbo".into()),
            ..RenderConfig::default()
        };
        let errors = RefCell::new(Vec::new());
        let handler = |err: &RenderError| errors.borrow_mut().push(err.clone());
        config.apply(&registry, &handler).unwrap();
        assert_eq!(registry.primary_name(), "normal");
        assert_eq!(errors.borrow().len(), 1);
    }

    #[test]
    fn invalid_timing_registers_nothing() {
        let registry = StrategyRegistry::with_builtins();
        let config = RenderConfig {
            strategies: vec![
                spec("ok", "low", "noop"),
                spec("bad", "whenever", "noop"),
            ],
            ..RenderConfig::default()
        };
        let err = config.apply(&registry, &|_: &RenderError| {}).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("bad"));
        assert!(!registry.contains("ok"));
    }

    #[test]
    fn render_options_carry_zone_flag() {
        let config = RenderConfig {
            patch_zone: true,
            ..RenderConfig::default()
        };
        assert!(config.render_options().patches_zone());
    }

    #[cfg(feature = "policy-config")]
    mod loading {
        use super::*;
        use std::io::Write;

        const TOML: &str = r#"
primary_strategy = "local"
patch_zone = true
frame_budget_ms = 8.0

[[strategies]]
name = "paint"
timing = "animation-frame"
"#;

        #[test]
        fn parses_toml_with_defaults() {
            let config = RenderConfig::from_toml_str(TOML).unwrap();
            assert_eq!(config.primary_strategy.as_deref(), Some("local"));
            assert!(config.patch_zone);
            assert_eq!(config.frame_budget_ms, 8.0);
            assert_eq!(config.strategies[0].commit, "detect-changes");
        }

        #[test]
        fn parses_json() {
            let config =
                RenderConfig::from_json_str(r#"{ "primary_strategy": "idle" }"#).unwrap();
            assert_eq!(config.primary_strategy.as_deref(), Some("idle"));
            assert_eq!(config.frame_budget_ms, DEFAULT_FRAME_BUDGET_MS);
        }

        #[test]
        fn malformed_text_is_parse_error() {
            assert!(matches!(
                RenderConfig::from_toml_str("patch_zone = maybe"),
                Err(ConfigError::Parse(_))
            ));
        }

        #[test]
        fn load_dispatches_on_extension() {
            let mut toml_file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
            toml_file.write_all(TOML.as_bytes()).unwrap();
            assert!(RenderConfig::load(toml_file.path()).unwrap().patch_zone);

            let mut json_file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
            json_file.write_all(br#"{ "patch_zone": true }"#).unwrap();
            assert!(RenderConfig::load(json_file.path()).unwrap().patch_zone);
        }

        #[test]
        fn missing_file_is_io_error() {
            let dir = tempfile::tempdir().unwrap();
            let err = RenderConfig::load(dir.path().join("absent.toml")).unwrap_err();
            assert!(matches!(err, ConfigError::Io(_)));
        }
    }
}

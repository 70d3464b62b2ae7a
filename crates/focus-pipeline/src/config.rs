//! Pipeline configuration: coalescing delay, source polling, resolver limits.
//!
//! Configuration is read from a RON file. Every field has a default, so a
//! partial file (or no file at all) is valid:
//!
//! ```ron
//! (
//!     coalesce_ms: 300,
//!     resolver: (timeout_ms: 1500),
//! )
//! ```

use std::{
    env, fs,
    path::{Path, PathBuf},
    result::Result as StdResult,
    time::Duration,
};

use ron::error::SpannedError;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default coalescing delay between deliveries.
pub const DEFAULT_COALESCE_MS: u64 = 200;
/// Default sampling interval for polling native sources.
pub const DEFAULT_POLL_MS: u64 = 250;
/// Default subprocess timeout for tab URL queries.
pub const DEFAULT_RESOLVER_TIMEOUT_MS: u64 = 3000;
/// Default cap on captured subprocess output.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 256 * 1024;

/// Settings for the browser tab resolver's subprocess.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverCfg {
    /// Hard timeout for a single query, in milliseconds.
    pub timeout_ms: u64,
    /// Maximum number of stdout bytes accepted from a query.
    pub max_output_bytes: usize,
    /// Script interpreter to execute.
    pub program: String,
    /// Flag that precedes the inline script argument.
    pub script_flag: String,
}

impl Default for ResolverCfg {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_RESOLVER_TIMEOUT_MS,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            program: "osascript".to_string(),
            script_flag: "-e".to_string(),
        }
    }
}

impl ResolverCfg {
    /// Query timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Top-level configuration for the observation pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineCfg {
    /// Minimum spacing between deliveries, in milliseconds.
    pub coalesce_ms: u64,
    /// Sampling interval for polling native sources, in milliseconds.
    pub poll_ms: u64,
    /// Tab resolver settings.
    pub resolver: ResolverCfg,
}

impl Default for PipelineCfg {
    fn default() -> Self {
        Self {
            coalesce_ms: DEFAULT_COALESCE_MS,
            poll_ms: DEFAULT_POLL_MS,
            resolver: ResolverCfg::default(),
        }
    }
}

impl PipelineCfg {
    /// Parse a configuration from RON text.
    pub fn from_ron(text: &str) -> StdResult<Self, SpannedError> {
        ron::from_str(text)
    }

    /// Load a configuration file. Missing fields take their defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_ron(&text).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Render the configuration as pretty RON.
    pub fn to_ron(&self) -> Result<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| Error::Encode(e.to_string()))
    }

    /// Coalescing delay; never zero, so the timer always yields.
    pub fn coalesce_delay(&self) -> Duration {
        Duration::from_millis(self.coalesce_ms.max(1))
    }

    /// Native source polling interval; never zero.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_ms.max(1))
    }
}

/// Preferred user config path (`~/.focusd/config.ron`).
pub fn default_config_path() -> PathBuf {
    let mut p = PathBuf::from(env::var_os("HOME").unwrap_or_default());
    p.push(".focusd");
    p.push("config.ron");
    p
}

/// Resolve and load the effective configuration.
///
/// Policy:
/// 1) Load `explicit` when provided; failures are errors.
/// 2) Else load `~/.focusd/config.ron` when it exists.
/// 3) Else use built-in defaults.
pub fn resolve_config(explicit: Option<&Path>) -> Result<PipelineCfg> {
    if let Some(path) = explicit {
        return PipelineCfg::load_from_path(path);
    }
    let preferred = default_config_path();
    if preferred.exists() {
        return PipelineCfg::load_from_path(&preferred);
    }
    Ok(PipelineCfg::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = PipelineCfg::default();
        assert_eq!(cfg.coalesce_delay(), Duration::from_millis(200));
        assert_eq!(cfg.resolver.timeout(), Duration::from_millis(3000));
        assert_eq!(cfg.resolver.max_output_bytes, 262_144);
        assert_eq!(cfg.resolver.program, "osascript");
        assert_eq!(cfg.resolver.script_flag, "-e");
    }

    #[test]
    fn partial_ron_keeps_defaults() {
        let cfg = PipelineCfg::from_ron("(coalesce_ms: 50, resolver: (timeout_ms: 10))").unwrap();
        assert_eq!(cfg.coalesce_ms, 50);
        assert_eq!(cfg.poll_ms, DEFAULT_POLL_MS);
        assert_eq!(cfg.resolver.timeout_ms, 10);
        assert_eq!(cfg.resolver.max_output_bytes, DEFAULT_MAX_OUTPUT_BYTES);
    }

    #[test]
    fn zero_delay_is_clamped() {
        let cfg = PipelineCfg {
            coalesce_ms: 0,
            ..PipelineCfg::default()
        };
        assert_eq!(cfg.coalesce_delay(), Duration::from_millis(1));
    }

    #[test]
    fn pretty_output_parses_back() {
        let cfg = PipelineCfg {
            poll_ms: 75,
            ..PipelineCfg::default()
        };
        let text = cfg.to_ron().unwrap();
        assert!(text.contains("poll_ms: 75"), "{text}");
        assert_eq!(PipelineCfg::from_ron(&text).unwrap(), cfg);
    }

    #[test]
    fn missing_file_reports_path() {
        let path = Path::new("/nonexistent/focusd/config.ron");
        match PipelineCfg::load_from_path(path) {
            Err(Error::Config { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected config error, got {:?}", other),
        }
    }
}

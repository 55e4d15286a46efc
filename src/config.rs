//! # Configuration
//!
//! Settings come from `manifix.toml` (all keys optional) with `MANIFIX_*`
//! environment variables taking precedence. CLI flags override both; that
//! layering happens in the handlers, not here.

use crate::synthesize::SynthConfig;

use instant::Duration;
use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "manifix.toml";
pub const DEFAULT_MAX_ITERS: usize = 10;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    pub max_candidates: Option<usize>,
    pub timeout_seconds: Option<u64>,
    pub max_iters: Option<usize>,
    /// Fix Bank path; absent means no persistent bank unless the CLI says
    /// otherwise.
    pub fixbank: Option<String>,
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("ignoring unparseable {}={}", name, raw);
            None
        }
    }
}

impl Config {
    /// Load configuration. An explicitly given path must exist and parse;
    /// the default `manifix.toml` is optional. Environment variables are
    /// applied on top.
    pub fn load(path: Option<&Path>) -> Result<Config, String> {
        let mut config = match path {
            Some(path) => Config::from_file(path)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Config::from_file(default)?
                } else {
                    Config::default()
                }
            }
        };
        config.apply_env();
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Config, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
        toml::from_str(&text)
            .map_err(|e| format!("cannot parse {}: {}", path.display(), e))
    }

    fn apply_env(&mut self) {
        if let Some(v) = env_parse("MANIFIX_MAX_CANDIDATES") {
            self.max_candidates = Some(v);
        }
        if let Some(v) = env_parse("MANIFIX_TIMEOUT_SECONDS") {
            self.timeout_seconds = Some(v);
        }
        if let Some(v) = env_parse("MANIFIX_MAX_ITERS") {
            self.max_iters = Some(v);
        }
        if let Ok(v) = std::env::var("MANIFIX_FIXBANK") {
            self.fixbank = Some(v);
        }
    }

    pub fn synth_config(&self) -> SynthConfig {
        let defaults = SynthConfig::default();
        SynthConfig {
            max_candidates: self
                .max_candidates
                .unwrap_or(defaults.max_candidates),
            timeout: self
                .timeout_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }

    pub fn max_iters(&self) -> usize {
        self.max_iters.unwrap_or(DEFAULT_MAX_ITERS)
    }
}

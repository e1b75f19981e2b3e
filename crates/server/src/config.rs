//! Server configuration: a TOML file plus a few environment overrides.

use anyhow::{bail, Context, Result};
use pvscan_ocr::{ExtractionProfile, UploadLimits};
use serde::Deserialize;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Env var naming the config file.
pub const CONFIG_ENV: &str = "PVSCAN_CONFIG";
/// Env var overriding `bind`.
pub const BIND_ENV: &str = "PVSCAN_BIND";
/// Looked up in the working directory when `PVSCAN_CONFIG` is unset.
pub const DEFAULT_CONFIG_FILE: &str = "pvscan.toml";

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    #[default]
    Tesseract,
    Mock,
}

/// A canned recognition result served by the mock engine.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MockHit {
    pub text: String,
    #[serde(default = "full_confidence")]
    pub confidence: f32,
}

fn full_confidence() -> f32 {
    1.0
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub kind: EngineKind,
    /// Directory holding `<language>.traineddata`; system default when unset.
    pub data_path: Option<String>,
    pub language: String,
    pub char_whitelist: Option<String>,
    pub mock_hits: Vec<MockHit>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kind: EngineKind::default(),
            data_path: None,
            language: "eng".into(),
            char_whitelist: None,
            mock_hits: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub max_upload_bytes: usize,
    pub max_dimension: u32,
    /// Hard cap on the whole multipart body.
    pub max_request_bytes: usize,
    pub uploads_dir: Option<PathBuf>,
    pub log_format: LogFormat,
    pub engine: EngineConfig,
    pub profiles: Vec<ExtractionProfile>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let limits = UploadLimits::default();
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 5000)),
            max_upload_bytes: limits.max_bytes,
            max_dimension: limits.max_dimension,
            max_request_bytes: 10 * 1024 * 1024,
            uploads_dir: None,
            log_format: LogFormat::default(),
            engine: EngineConfig::default(),
            profiles: ExtractionProfile::defaults(),
        }
    }
}

impl ServerConfig {
    /// Resolve the config file, apply env overrides and validate.
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(bind) = lookup(BIND_ENV) {
            self.bind = bind
                .parse()
                .with_context(|| format!("{BIND_ENV} is not a socket address: '{bind}'"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_upload_bytes == 0 {
            bail!("max_upload_bytes must be greater than zero");
        }
        if self.max_dimension == 0 {
            bail!("max_dimension must be greater than zero");
        }
        if self.max_request_bytes < self.max_upload_bytes {
            bail!(
                "max_request_bytes ({}) must be at least max_upload_bytes ({})",
                self.max_request_bytes,
                self.max_upload_bytes
            );
        }
        if self.profiles.is_empty() {
            bail!("at least one extraction profile is required");
        }
        let mut seen = HashSet::new();
        for p in &self.profiles {
            if !p.path.starts_with('/') {
                bail!("profile path must start with '/': '{}'", p.path);
            }
            if p.path == crate::routes::HEALTH_PATH {
                bail!("profile path '{}' is reserved", p.path);
            }
            if !seen.insert(p.path.as_str()) {
                bail!("duplicate profile path: '{}'", p.path);
            }
        }
        Ok(())
    }

    pub fn limits(&self) -> UploadLimits {
        UploadLimits {
            max_bytes: self.max_upload_bytes,
            max_dimension: self.max_dimension,
        }
    }
}

//! Configuration file – reads/writes `~/.arlens/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use arlens_perception::{Framing, ProjectorConfig, StabilizerConfig, StabilizerStrategy};
use arlens_runtime::provider::DEFAULT_GOURMET_URL;
use arlens_types::{ArError, GeoPoint, SearchFilters};

/// Where points of interest come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Local JSON dataset (bundled unless `dataset` is set).
    #[default]
    Static,
    /// Gourmet-search web service.
    Http,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FramingChoice {
    #[default]
    Portrait,
    Landscape,
}

impl FramingChoice {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "portrait" => Some(Self::Portrait),
            "landscape" => Some(Self::Landscape),
            _ => None,
        }
    }
}

impl std::fmt::Display for FramingChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FramingChoice::Portrait => write!(f, "portrait"),
            FramingChoice::Landscape => write!(f, "landscape"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StabilizerChoice {
    #[default]
    Complementary,
    Deadzone,
}

impl StabilizerChoice {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "complementary" => Some(Self::Complementary),
            "deadzone" => Some(Self::Deadzone),
            _ => None,
        }
    }
}

impl std::fmt::Display for StabilizerChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StabilizerChoice::Complementary => write!(f, "complementary"),
            StabilizerChoice::Deadzone => write!(f, "deadzone"),
        }
    }
}

/// Persisted user configuration stored in `~/.arlens/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderKind,

    /// Path to a JSON dataset; the bundled one is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<PathBuf>,

    /// Base URL of the gourmet-search service.
    #[serde(default = "default_provider_url")]
    pub provider_url: String,

    /// Gourmet-search API key (stored as plain text; the file is written
    /// owner-only).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_key: String,

    #[serde(default)]
    pub framing: FramingChoice,

    #[serde(default)]
    pub stabilizer: StabilizerChoice,

    /// Starting point of the simulated walk.
    #[serde(default = "default_origin")]
    pub origin: GeoPoint,

    #[serde(default)]
    pub filters: SearchFilters,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("provider", &self.provider)
            .field("dataset", &self.dataset)
            .field("provider_url", &self.provider_url)
            .field(
                "api_key",
                if self.api_key.is_empty() { &"<not set>" } else { &"<redacted>" },
            )
            .field("framing", &self.framing)
            .field("stabilizer", &self.stabilizer)
            .field("origin", &self.origin)
            .field("filters", &self.filters)
            .finish()
    }
}

fn default_provider_url() -> String {
    DEFAULT_GOURMET_URL.to_string()
}

/// Shibuya crossing.
fn default_origin() -> GeoPoint {
    GeoPoint::new(35.6595, 139.7005)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            dataset: None,
            provider_url: default_provider_url(),
            api_key: String::new(),
            framing: FramingChoice::default(),
            stabilizer: StabilizerChoice::default(),
            origin: default_origin(),
            filters: SearchFilters::default(),
        }
    }
}

impl Config {
    pub fn projector_config(&self) -> ProjectorConfig {
        ProjectorConfig::for_framing(match self.framing {
            FramingChoice::Portrait => Framing::Portrait,
            FramingChoice::Landscape => Framing::Landscape,
        })
    }

    pub fn stabilizer_config(&self) -> StabilizerConfig {
        StabilizerConfig {
            strategy: match self.stabilizer {
                StabilizerChoice::Complementary => StabilizerStrategy::complementary(),
                StabilizerChoice::Deadzone => StabilizerStrategy::deadzone(),
            },
        }
    }
}

/// Return the path to `~/.arlens/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".arlens").join("config.toml")
}

/// Load the config from disk and apply `ARLENS_*` overrides. Returns `None`
/// if the file does not exist.
pub fn load() -> Result<Option<Config>, ArError> {
    let mut cfg = load_from(&config_path())?;
    if let Some(cfg) = cfg.as_mut() {
        apply_env_overrides(cfg);
    }
    Ok(cfg)
}

/// Parse the file at `path` as written, without environment overrides.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, ArError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| ArError::Config(format!("failed to read {}: {e}", path.display())))?;
    let cfg: Config = toml::from_str(&raw)
        .map_err(|e| ArError::Config(format!("failed to parse {}: {e}", path.display())))?;
    Ok(Some(cfg))
}

/// Apply `ARLENS_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `ARLENS_DATASET` | `dataset` (forces the static provider) |
/// | `ARLENS_PROVIDER_URL` | `provider_url` (forces the HTTP provider) |
/// | `ARLENS_API_KEY` | `api_key` |
/// | `ARLENS_FRAMING` | `framing` (`portrait` / `landscape`) |
/// | `ARLENS_STABILIZER` | `stabilizer` (`complementary` / `deadzone`) |
///
/// Unparseable values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("ARLENS_DATASET") {
        cfg.dataset = Some(PathBuf::from(v));
        cfg.provider = ProviderKind::Static;
    }
    if let Ok(v) = std::env::var("ARLENS_PROVIDER_URL") {
        cfg.provider_url = v;
        cfg.provider = ProviderKind::Http;
    }
    if let Ok(v) = std::env::var("ARLENS_API_KEY") {
        cfg.api_key = v;
    }
    if let Some(framing) = std::env::var("ARLENS_FRAMING")
        .ok()
        .and_then(|v| FramingChoice::parse(&v))
    {
        cfg.framing = framing;
    }
    if let Some(stabilizer) = std::env::var("ARLENS_STABILIZER")
        .ok()
        .and_then(|v| StabilizerChoice::parse(&v))
    {
        cfg.stabilizer = stabilizer;
    }
}

/// Save the config to disk, creating `~/.arlens/` if necessary.
pub fn save(cfg: &Config) -> Result<(), ArError> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), ArError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| ArError::Config(format!("failed to create config directory: {e}")))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700)).map_err(|e| {
                ArError::Config(format!("failed to set config directory permissions: {e}"))
            })?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| ArError::Config(format!("failed to serialize config: {e}")))?;
    let write_err = |e: std::io::Error| {
        ArError::Config(format!("failed to write {}: {e}", path.display()))
    };
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .map_err(write_err)?;
        file.write_all(raw.as_bytes()).map_err(write_err)?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(write_err)?;
    Ok(())
}

//! Configuration for the install pipeline.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;

use crate::error::{ModError, ModResult};

/// Attempts per network transfer.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Delay between transfer attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(30);

/// HTTP request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Gallery site serving mirror redirects.
pub const DEFAULT_GALLERY_BASE_URL: &str = "https://www.moddb.com";

/// Configuration for the install pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory holding downloaded archives and bare repository clones.
    pub cache_dir: PathBuf,

    /// Directory receiving one subdirectory per installed mod.
    pub mods_dir: PathBuf,

    /// Attempts per network transfer, including the first one.
    pub retry_attempts: u32,

    /// Fixed delay between attempts.
    pub retry_delay: Duration,

    /// HTTP request timeout.
    pub timeout: Duration,

    /// User agent sent with every request.
    pub user_agent: String,

    /// External 7-Zip executable.
    pub seven_zip_binary: PathBuf,

    /// External git executable.
    pub git_binary: PathBuf,

    /// Base URL the gallery mirror paths are resolved against.
    pub gallery_base_url: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            mods_dir: PathBuf::from("mods"),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            timeout: DEFAULT_TIMEOUT,
            user_agent: format!("modforge/{}", env!("CARGO_PKG_VERSION")),
            seven_zip_binary: PathBuf::from("7z"),
            git_binary: PathBuf::from("git"),
            gallery_base_url: DEFAULT_GALLERY_BASE_URL.to_string(),
        }
    }
}

/// Platform cache directory, falling back to the system temp directory.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("modforge")
        .join("downloads")
}

impl PipelineConfig {
    /// Create a configuration with the given cache and mods directories.
    pub fn new(cache_dir: PathBuf, mods_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            mods_dir,
            ..Default::default()
        }
    }

    /// Load a configuration file over the defaults.
    ///
    /// ```ini
    /// [paths]
    /// cache_dir = /data/cache
    /// mods_dir = /data/mods
    ///
    /// [download]
    /// retry_attempts = 3
    /// retry_delay_secs = 30
    /// timeout_secs = 300
    /// user_agent = modforge
    ///
    /// [tools]
    /// seven_zip = /usr/bin/7z
    /// git = /usr/bin/git
    /// ```
    ///
    /// Unknown sections and keys are ignored.
    pub fn load(path: &Path) -> ModResult<Self> {
        let ini = Ini::load_from_file(path).map_err(|e| {
            ModError::InvalidConfig(format!("{}: {}", path.display(), e))
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> ModResult<Self> {
        let mut config = Self::default();

        if let Some(paths) = ini.section(Some("paths")) {
            if let Some(v) = paths.get("cache_dir") {
                config.cache_dir = PathBuf::from(v);
            }
            if let Some(v) = paths.get("mods_dir") {
                config.mods_dir = PathBuf::from(v);
            }
        }

        if let Some(download) = ini.section(Some("download")) {
            if let Some(v) = download.get("retry_attempts") {
                config.retry_attempts = parse_number("retry_attempts", v)?;
            }
            if let Some(v) = download.get("retry_delay_secs") {
                config.retry_delay = Duration::from_secs(parse_number("retry_delay_secs", v)?);
            }
            if let Some(v) = download.get("timeout_secs") {
                config.timeout = Duration::from_secs(parse_number("timeout_secs", v)?);
            }
            if let Some(v) = download.get("user_agent") {
                config.user_agent = v.to_string();
            }
        }

        if let Some(tools) = ini.section(Some("tools")) {
            if let Some(v) = tools.get("seven_zip") {
                config.seven_zip_binary = PathBuf::from(v);
            }
            if let Some(v) = tools.get("git") {
                config.git_binary = PathBuf::from(v);
            }
        }

        if config.retry_attempts == 0 {
            return Err(ModError::InvalidConfig(
                "retry_attempts must be at least 1".to_string(),
            ));
        }

        Ok(config)
    }

    /// Set the archive cache directory.
    pub fn with_cache_dir(mut self, path: PathBuf) -> Self {
        self.cache_dir = path;
        self
    }

    /// Set the install directory.
    pub fn with_mods_dir(mut self, path: PathBuf) -> Self {
        self.mods_dir = path;
        self
    }

    /// Set the number of transfer attempts.
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    /// Set the delay between transfer attempts.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set the HTTP timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_seven_zip_binary(mut self, path: PathBuf) -> Self {
        self.seven_zip_binary = path;
        self
    }

    pub fn with_git_binary(mut self, path: PathBuf) -> Self {
        self.git_binary = path;
        self
    }

    pub fn with_gallery_base_url(mut self, url: impl Into<String>) -> Self {
        self.gallery_base_url = url.into();
        self
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> ModResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ModError::InvalidConfig(format!("{} is not a number: {}", key, value)))
}

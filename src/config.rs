use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
const DEFAULT_JSON_LIMIT_BYTES: usize = 1024 * 1024;
const DEFAULT_MAX_PART_BYTES: u64 = 64 * 1024 * 1024;
const DEFAULT_RATE_LIMIT_MAX: u32 = 60;
const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value `{value}` for {key}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_RATE_LIMIT_MAX,
            window: Duration::from_secs(DEFAULT_RATE_LIMIT_WINDOW_SECS),
        }
    }
}

/// Runtime settings, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub default_template_path: PathBuf,
    pub static_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub json_limit_bytes: usize,
    /// Decompressed size ceiling for each XML part of a template.
    pub max_part_bytes: u64,
    pub rate_limit: RateLimitConfig,
    /// Empty means any origin is accepted.
    pub cors_allowed_origins: Vec<String>,
    pub workers: Option<usize>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            default_template_path: root.join("templates").join("official_letter.docx"),
            static_dir: root.join("static"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            json_limit_bytes: DEFAULT_JSON_LIMIT_BYTES,
            max_part_bytes: DEFAULT_MAX_PART_BYTES,
            rate_limit: RateLimitConfig::default(),
            cors_allowed_origins: Vec::new(),
            workers: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let rate_limit = RateLimitConfig {
            max_requests: positive(&var, "RATE_LIMIT_MAX")?
                .unwrap_or(defaults.rate_limit.max_requests),
            window: positive(&var, "RATE_LIMIT_WINDOW_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.rate_limit.window),
        };

        let cors_allowed_origins = var("CORS_ALLOWED_ORIGINS")
            .map(|origins| {
                origins
                    .split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: positive(&var, "PORT")?.unwrap_or(defaults.port),
            default_template_path: var("DEFAULT_TEMPLATE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.default_template_path),
            static_dir: var("STATIC_DIR").map(PathBuf::from).unwrap_or(defaults.static_dir),
            max_upload_bytes: positive(&var, "MAX_UPLOAD_BYTES")?
                .unwrap_or(defaults.max_upload_bytes),
            json_limit_bytes: positive(&var, "JSON_BODY_LIMIT")?
                .unwrap_or(defaults.json_limit_bytes),
            max_part_bytes: positive(&var, "MAX_PART_BYTES")?
                .unwrap_or(defaults.max_part_bytes),
            rate_limit,
            cors_allowed_origins,
            workers: positive(&var, "WORKERS")?,
        })
    }
}

/// Parse an optional, strictly positive number.
fn positive<T>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr + Default + PartialEq,
{
    let Some(raw) = var(key) else {
        return Ok(None);
    };
    match raw.parse::<T>() {
        Ok(value) if value != T::default() => Ok(Some(value)),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw,
        }),
    }
}

use crate::errors::{GatewayError, GatewayResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const ENV_CONFIG: &str = "PLM_CONFIG";
pub const ENV_URL: &str = "PLM_URL";
pub const ENV_DATABASE: &str = "PLM_DATABASE";
pub const ENV_USERNAME: &str = "PLM_USERNAME";
pub const ENV_PASSWORD: &str = "PLM_PASSWORD";
pub const ENV_ODATA_PATH: &str = "PLM_ODATA_PATH";
pub const ENV_METHOD_ADDRESSING: &str = "PLM_METHOD_ADDRESSING";
pub const ENV_TIMEOUT_SECS: &str = "PLM_TIMEOUT_SECS";
pub const ENV_BOM_METHOD: &str = "PLM_BOM_METHOD";

pub const DEFAULT_ODATA_PATH: &str = "/Server/odata";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_BOM_METHOD: &str = "aer_dcm_fetchBOMStructure";

/// Long-lived backend credentials, exchanged for a bearer token on demand
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub base_url: String,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(
        base_url: impl Into<String>,
        database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            database: database.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("base_url", &self.base_url)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// How server methods are addressed on the backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodAddressing {
    /// `{base}/method.{name}`
    #[default]
    Dotted,
    /// `{base}/Method('{name}')`
    Quoted,
}

impl FromStr for MethodAddressing {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dotted" | "method.name" => Ok(MethodAddressing::Dotted),
            "quoted" | "method('name')" => Ok(MethodAddressing::Quoted),
            other => Err(GatewayError::Configuration(format!(
                "unknown method addressing '{other}' (expected 'dotted' or 'quoted')"
            ))),
        }
    }
}

/// On-disk configuration. Every field is optional; environment fills the gaps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    pub base_url: Option<String>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub odata_path: Option<String>,
    pub method_addressing: Option<MethodAddressing>,
    pub timeout_secs: Option<u64>,
    pub bom_method: Option<String>,
}

impl FileConfig {
    pub fn from_path(path: &Path) -> GatewayResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            GatewayError::Configuration(format!("invalid JSON in {}: {e}", path.display()))
        })
    }
}

/// Process-wide gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub credentials: Credentials,
    /// Path appended to `base_url` for OData access
    pub odata_path: String,
    pub method_addressing: MethodAddressing,
    pub timeout: Duration,
    /// Server method returning a BOM tree for `{"id": ...}`
    pub bom_method: String,
}

impl GatewayConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            odata_path: DEFAULT_ODATA_PATH.to_string(),
            method_addressing: MethodAddressing::default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            bom_method: DEFAULT_BOM_METHOD.to_string(),
        }
    }

    pub fn with_method_addressing(mut self, addressing: MethodAddressing) -> Self {
        self.method_addressing = addressing;
        self
    }

    pub fn with_bom_method(mut self, method_name: impl Into<String>) -> Self {
        self.bom_method = method_name.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_odata_path(mut self, path: impl Into<String>) -> Self {
        self.odata_path = normalize_path(&path.into());
        self
    }

    /// Load configuration for the current process.
    ///
    /// Sources, lowest priority first: the JSON file (explicit `path`, then
    /// `PLM_CONFIG`, then the per-user default location if it exists), then
    /// process environment, with `.env` in the working directory loaded first.
    pub fn load(path: Option<&Path>) -> GatewayResult<Self> {
        match dotenvy::dotenv() {
            Ok(env_path) => tracing::debug!("Loaded environment from {}", env_path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!("Ignoring unreadable .env file: {e}"),
        }

        let config_path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(ENV_CONFIG).ok().map(PathBuf::from))
            .or_else(|| default_config_path().filter(|p| p.exists()));

        let file = match config_path {
            Some(ref p) => {
                tracing::info!("Loading configuration from {}", p.display());
                FileConfig::from_path(p)?
            }
            None => FileConfig::default(),
        };

        Self::from_sources(file, |key| std::env::var(key).ok())
    }

    /// Merge file values with a key lookup (normally the process environment).
    pub fn from_sources<F>(file: FileConfig, lookup: F) -> GatewayResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank counts as unset, but the value itself is kept verbatim
        let verbatim = |key: &str, fallback: Option<String>| -> Option<String> {
            lookup(key)
                .or(fallback)
                .filter(|v| !v.trim().is_empty())
        };
        let pick = |key: &str, fallback: Option<String>| -> Option<String> {
            verbatim(key, fallback).map(|v| v.trim().to_string())
        };
        let required = |key: &str, value: Option<String>| -> GatewayResult<String> {
            value.ok_or_else(|| {
                GatewayError::Configuration(format!("missing required setting {key}"))
            })
        };

        let credentials = Credentials::new(
            required(ENV_URL, pick(ENV_URL, file.base_url))?,
            required(ENV_DATABASE, pick(ENV_DATABASE, file.database))?,
            required(ENV_USERNAME, verbatim(ENV_USERNAME, file.username))?,
            required(ENV_PASSWORD, verbatim(ENV_PASSWORD, file.password))?,
        );

        let method_addressing = match lookup(ENV_METHOD_ADDRESSING) {
            Some(raw) => raw.parse()?,
            None => file.method_addressing.unwrap_or_default(),
        };

        let timeout_secs = match pick(ENV_TIMEOUT_SECS, None) {
            Some(raw) => raw.parse::<u64>().map_err(|e| {
                GatewayError::Configuration(format!("invalid {ENV_TIMEOUT_SECS} '{raw}': {e}"))
            })?,
            None => file.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
        };
        let timeout = timeout_from_secs(timeout_secs)?;

        let odata_path = pick(ENV_ODATA_PATH, file.odata_path)
            .unwrap_or_else(|| DEFAULT_ODATA_PATH.to_string());
        let bom_method = pick(ENV_BOM_METHOD, file.bom_method)
            .unwrap_or_else(|| DEFAULT_BOM_METHOD.to_string());

        Ok(Self::new(credentials)
            .with_odata_path(odata_path)
            .with_method_addressing(method_addressing)
            .with_bom_method(bom_method)
            .with_timeout(timeout))
    }

    /// Root of all entity, list and method addressing
    pub fn odata_base_url(&self) -> String {
        format!("{}{}", self.credentials.base_url, self.odata_path)
    }
}

/// Request timeout from a seconds count; zero is rejected
pub fn timeout_from_secs(secs: u64) -> GatewayResult<Duration> {
    if secs == 0 {
        return Err(GatewayError::Configuration(
            "timeout must be greater than zero".to_string(),
        ));
    }
    Ok(Duration::from_secs(secs))
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Per-user config file location (`~/.config/plm-mcp/config.json` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("plm-mcp").join("config.json"))
}

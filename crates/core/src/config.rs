use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::catalog::{Catalog, CatalogItem};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub monitoring: MonitoringConfig,
    pub backends: BackendsConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub catalog_items: Option<Vec<CatalogItem>>,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub debounce_ms: u64,
}

#[derive(Clone, Debug)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub api_key: Option<SecretString>,
    pub agent_id: String,
}

/// Credentials for the two avatar backends. Either may be absent; an adapter
/// without credentials stays on the noop transport.
#[derive(Clone, Debug)]
pub struct BackendsConfig {
    pub voice_api_key: Option<SecretString>,
    pub video_api_key: Option<SecretString>,
    pub video_replica_id: Option<String>,
    pub video_persona_id: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_model: Option<String>,
    pub llm_base_url: Option<String>,
    pub llm_debounce_ms: Option<u64>,
    pub monitoring_enabled: Option<bool>,
    pub monitoring_api_key: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                api_key: None,
                base_url: "https://api.openai.com/v1".to_string(),
                model: "gpt-4o".to_string(),
                timeout_secs: 30,
                debounce_ms: 500,
            },
            monitoring: MonitoringConfig {
                enabled: false,
                endpoint: "https://api.coval.dev/eval/transcript".to_string(),
                api_key: None,
                agent_id: "devkart-agent".to_string(),
            },
            backends: BackendsConfig {
                voice_api_key: None,
                video_api_key: None,
                video_replica_id: None,
                video_persona_id: None,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
            catalog_items: None,
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    llm: Option<LlmPatch>,
    monitoring: Option<MonitoringPatch>,
    backends: Option<BackendsPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
    catalog: Option<CatalogPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    debounce_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct MonitoringPatch {
    enabled: Option<bool>,
    endpoint: Option<String>,
    api_key: Option<String>,
    agent_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BackendsPatch {
    voice_api_key: Option<String>,
    video_api_key: Option<String>,
    video_replica_id: Option<String>,
    video_persona_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogPatch {
    items: Option<Vec<CatalogItem>>,
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("devkart.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// The effective catalog: configured items when present, built-in
    /// storefront otherwise.
    pub fn catalog(&self) -> Catalog {
        match &self.catalog_items {
            Some(items) if !items.is_empty() => Catalog::new(items.clone()),
            _ => Catalog::storefront(),
        }
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(llm) = patch.llm {
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(debounce_ms) = llm.debounce_ms {
                self.llm.debounce_ms = debounce_ms;
            }
        }

        if let Some(monitoring) = patch.monitoring {
            if let Some(enabled) = monitoring.enabled {
                self.monitoring.enabled = enabled;
            }
            if let Some(endpoint) = monitoring.endpoint {
                self.monitoring.endpoint = endpoint;
            }
            if let Some(monitoring_api_key_value) = monitoring.api_key {
                self.monitoring.api_key = Some(secret_value(monitoring_api_key_value));
            }
            if let Some(agent_id) = monitoring.agent_id {
                self.monitoring.agent_id = agent_id;
            }
        }

        if let Some(backends) = patch.backends {
            if let Some(voice_api_key_value) = backends.voice_api_key {
                self.backends.voice_api_key = Some(secret_value(voice_api_key_value));
            }
            if let Some(video_api_key_value) = backends.video_api_key {
                self.backends.video_api_key = Some(secret_value(video_api_key_value));
            }
            if let Some(replica_id) = backends.video_replica_id {
                self.backends.video_replica_id = Some(replica_id);
            }
            if let Some(persona_id) = backends.video_persona_id {
                self.backends.video_persona_id = Some(persona_id);
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        if let Some(catalog) = patch.catalog {
            if let Some(items) = catalog.items {
                self.catalog_items = Some(items);
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("DEVKART_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("DEVKART_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("DEVKART_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("DEVKART_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("DEVKART_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("DEVKART_LLM_DEBOUNCE_MS") {
            self.llm.debounce_ms = parse_u64("DEVKART_LLM_DEBOUNCE_MS", &value)?;
        }

        if let Some(value) = read_env("DEVKART_MONITORING_ENABLED") {
            self.monitoring.enabled = parse_bool("DEVKART_MONITORING_ENABLED", &value)?;
        }
        if let Some(value) = read_env("DEVKART_MONITORING_ENDPOINT") {
            self.monitoring.endpoint = value;
        }
        if let Some(value) = read_env("DEVKART_MONITORING_API_KEY") {
            self.monitoring.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("DEVKART_MONITORING_AGENT_ID") {
            self.monitoring.agent_id = value;
        }

        if let Some(value) = read_env("DEVKART_BACKENDS_VOICE_API_KEY") {
            self.backends.voice_api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("DEVKART_BACKENDS_VIDEO_API_KEY") {
            self.backends.video_api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("DEVKART_BACKENDS_VIDEO_REPLICA_ID") {
            self.backends.video_replica_id = Some(value);
        }
        if let Some(value) = read_env("DEVKART_BACKENDS_VIDEO_PERSONA_ID") {
            self.backends.video_persona_id = Some(value);
        }

        if let Some(value) = read_env("DEVKART_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("DEVKART_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port = parse_u16("DEVKART_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("DEVKART_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("DEVKART_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("DEVKART_LOGGING_LEVEL").or_else(|| read_env("DEVKART_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("DEVKART_LOGGING_FORMAT").or_else(|| read_env("DEVKART_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_base_url) = overrides.llm_base_url {
            self.llm.base_url = llm_base_url;
        }
        if let Some(debounce_ms) = overrides.llm_debounce_ms {
            self.llm.debounce_ms = debounce_ms;
        }
        if let Some(enabled) = overrides.monitoring_enabled {
            self.monitoring.enabled = enabled;
        }
        if let Some(monitoring_api_key) = overrides.monitoring_api_key {
            self.monitoring.api_key = Some(secret_value(monitoring_api_key));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_llm(&self.llm)?;
        validate_monitoring(&self.monitoring)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        validate_catalog(self.catalog_items.as_deref())?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("devkart.toml"), PathBuf::from("config/devkart.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.debounce_ms < 50 || llm.debounce_ms > 5_000 {
        return Err(ConfigError::Validation(
            "llm.debounce_ms must be in range 50..=5000".to_string(),
        ));
    }

    if !llm.base_url.starts_with("http://") && !llm.base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "llm.base_url must start with http:// or https://".to_string(),
        ));
    }

    // api_key stays optional: the structured tool-call path needs no LLM at
    // all, and `doctor` reports the missing key instead.
    Ok(())
}

fn validate_monitoring(monitoring: &MonitoringConfig) -> Result<(), ConfigError> {
    if monitoring.enabled {
        let missing = monitoring
            .api_key
            .as_ref()
            .map(|value| value.expose_secret().trim().is_empty())
            .unwrap_or(true);
        if missing {
            return Err(ConfigError::Validation(
                "monitoring.api_key is required when monitoring.enabled is true".to_string(),
            ));
        }
    }

    if !monitoring.endpoint.starts_with("http://") && !monitoring.endpoint.starts_with("https://")
    {
        return Err(ConfigError::Validation(
            "monitoring.endpoint must start with http:// or https://".to_string(),
        ));
    }

    if monitoring.agent_id.trim().is_empty() {
        return Err(ConfigError::Validation("monitoring.agent_id must not be empty".to_string()));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_catalog(items: Option<&[CatalogItem]>) -> Result<(), ConfigError> {
    let Some(items) = items else {
        return Ok(());
    };

    for (index, item) in items.iter().enumerate() {
        if item.name.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "catalog.items[{index}].name must not be empty"
            )));
        }
        if item.price.is_sign_negative() {
            return Err(ConfigError::Validation(format!(
                "catalog.items[{index}].price must be non-negative"
            )));
        }
        if items[..index].iter().any(|earlier| earlier.id == item.id) {
            return Err(ConfigError::Validation(format!(
                "catalog.items[{index}].id `{}` is duplicated",
                item.id.0
            )));
        }
    }

    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidEnvOverride {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use devkart_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    let source = |key_path: &str, env_key: &str| {
        field_source(key_path, env_key, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    lines.push(render_line("llm.model", &config.llm.model, source("llm.model", "DEVKART_LLM_MODEL")));
    lines.push(render_line(
        "llm.base_url",
        &config.llm.base_url,
        source("llm.base_url", "DEVKART_LLM_BASE_URL"),
    ));
    lines.push(render_line(
        "llm.api_key",
        redact_secret(config.llm.api_key.is_some()),
        source("llm.api_key", "DEVKART_LLM_API_KEY"),
    ));
    lines.push(render_line(
        "llm.timeout_secs",
        &config.llm.timeout_secs.to_string(),
        source("llm.timeout_secs", "DEVKART_LLM_TIMEOUT_SECS"),
    ));
    lines.push(render_line(
        "llm.debounce_ms",
        &config.llm.debounce_ms.to_string(),
        source("llm.debounce_ms", "DEVKART_LLM_DEBOUNCE_MS"),
    ));

    lines.push(render_line(
        "monitoring.enabled",
        &config.monitoring.enabled.to_string(),
        source("monitoring.enabled", "DEVKART_MONITORING_ENABLED"),
    ));
    lines.push(render_line(
        "monitoring.endpoint",
        &config.monitoring.endpoint,
        source("monitoring.endpoint", "DEVKART_MONITORING_ENDPOINT"),
    ));
    lines.push(render_line(
        "monitoring.api_key",
        redact_secret(config.monitoring.api_key.is_some()),
        source("monitoring.api_key", "DEVKART_MONITORING_API_KEY"),
    ));
    lines.push(render_line(
        "monitoring.agent_id",
        &config.monitoring.agent_id,
        source("monitoring.agent_id", "DEVKART_MONITORING_AGENT_ID"),
    ));

    lines.push(render_line(
        "backends.voice_api_key",
        redact_secret(config.backends.voice_api_key.is_some()),
        source("backends.voice_api_key", "DEVKART_BACKENDS_VOICE_API_KEY"),
    ));
    lines.push(render_line(
        "backends.video_api_key",
        redact_secret(config.backends.video_api_key.is_some()),
        source("backends.video_api_key", "DEVKART_BACKENDS_VIDEO_API_KEY"),
    ));

    lines.push(render_line(
        "server.bind_address",
        &config.server.bind_address,
        source("server.bind_address", "DEVKART_SERVER_BIND_ADDRESS"),
    ));
    lines.push(render_line(
        "server.health_check_port",
        &config.server.health_check_port.to_string(),
        source("server.health_check_port", "DEVKART_SERVER_HEALTH_CHECK_PORT"),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", "DEVKART_LOGGING_LEVEL"),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", "DEVKART_LOGGING_FORMAT"),
    ));

    lines.push(render_line(
        "catalog.items",
        &format!("{} items", config.catalog().items().len()),
        if config.catalog_items.is_some() {
            source("catalog.items", "")
        } else {
            "builtin storefront".to_string()
        },
    ));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("devkart.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/devkart.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if !env_key.is_empty() && env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_secret(present: bool) -> &'static str {
    if present {
        "<redacted>"
    } else {
        "<unset>"
    }
}

use std::env;
use std::io::Write;
use std::sync::{Mutex, OnceLock};

use devkart_cli::commands::{config, doctor, replay};
use serde_json::{json, Value};

#[test]
fn doctor_passes_with_clean_env_and_skips_optional_subsystems() {
    with_env(&[], || {
        let output = doctor::run(true);
        let payload = parse_payload(&output);

        assert_eq!(payload["overall_status"], "pass");
        let checks = payload["checks"].as_array().expect("checks array");
        assert_eq!(check_status(checks, "config_validation"), "pass");
        assert_eq!(check_status(checks, "llm_key_readiness"), "skipped");
        assert_eq!(check_status(checks, "monitoring_readiness"), "skipped");
        assert_eq!(check_status(checks, "catalog_integrity"), "pass");
    });
}

#[test]
fn doctor_reports_llm_readiness_when_key_is_present() {
    with_env(&[("DEVKART_LLM_API_KEY", "sk-test")], || {
        let output = doctor::run(true);
        let payload = parse_payload(&output);

        assert_eq!(payload["overall_status"], "pass");
        let checks = payload["checks"].as_array().expect("checks array");
        assert_eq!(check_status(checks, "llm_key_readiness"), "pass");
    });
}

#[test]
fn doctor_fails_on_invalid_config() {
    with_env(&[("DEVKART_LLM_DEBOUNCE_MS", "10")], || {
        let output = doctor::run(true);
        let payload = parse_payload(&output);

        assert_eq!(payload["overall_status"], "fail");
        let checks = payload["checks"].as_array().expect("checks array");
        assert_eq!(check_status(checks, "config_validation"), "fail");
        assert_eq!(check_status(checks, "catalog_integrity"), "skipped");
    });
}

#[test]
fn config_redacts_secrets_and_attributes_sources() {
    with_env(&[("DEVKART_LLM_API_KEY", "sk-test")], || {
        let output = config::run();

        assert!(output.contains("- llm.api_key = <redacted> (source: env (DEVKART_LLM_API_KEY))"));
        assert!(output.contains("- monitoring.api_key = <unset>"));
        assert!(!output.contains("sk-test"));
    });
}

#[test]
fn replay_runs_a_tool_call_script_offline() {
    with_env(&[], || {
        let script = write_script(&json!([
            {
                "event_type": "conversation.tool_call",
                "properties": {
                    "name": "update_kart",
                    "arguments": "{\"action\":\"add\",\"itemName\":\"Windsurf\",\"quantity\":2}"
                }
            },
            {
                "event_type": "conversation.tool_call",
                "properties": {
                    "name": "update_kart",
                    "arguments": "{\"action\":\"remove\",\"itemName\":\"Windsurf\",\"quantity\":1}"
                }
            },
            {
                "event_type": "conversation.tool_call",
                "properties": {
                    "name": "update_kart",
                    "arguments": "{\"action\":\"checkout\"}"
                }
            }
        ]));

        let result = replay::run(script.path());
        assert_eq!(result.exit_code, 0, "replay should succeed: {}", result.output);
        assert!(result.output.contains("replay: processed 3 messages"));
        assert!(result.output.contains("Windsurf x1 @ $15.00 = $15.00"));
        assert!(result.output.contains("orders:"));
        assert!(result.output.contains("total $15.00"));
    });
}

#[test]
fn replay_rejects_a_missing_script() {
    with_env(&[], || {
        let result = replay::run(std::path::Path::new("does-not-exist.json"));
        assert_eq!(result.exit_code, 2);
        assert!(result.output.contains("could not read"));
    });
}

#[test]
fn replay_rejects_a_non_array_script() {
    with_env(&[], || {
        let script = write_script(&json!({"not": "an array"}));
        let result = replay::run(script.path());
        assert_eq!(result.exit_code, 2);
        assert!(result.output.contains("not a JSON array"));
    });
}

fn write_script(value: &Value) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp script file");
    write!(file, "{value}").expect("write script");
    file
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn check_status<'a>(checks: &'a [Value], name: &str) -> &'a str {
    checks
        .iter()
        .find(|check| check["name"] == name)
        .and_then(|check| check["status"].as_str())
        .unwrap_or_else(|| panic!("missing check `{name}`"))
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "DEVKART_LLM_API_KEY",
        "DEVKART_LLM_BASE_URL",
        "DEVKART_LLM_MODEL",
        "DEVKART_LLM_TIMEOUT_SECS",
        "DEVKART_LLM_DEBOUNCE_MS",
        "DEVKART_MONITORING_ENABLED",
        "DEVKART_MONITORING_ENDPOINT",
        "DEVKART_MONITORING_API_KEY",
        "DEVKART_MONITORING_AGENT_ID",
        "DEVKART_BACKENDS_VOICE_API_KEY",
        "DEVKART_BACKENDS_VIDEO_API_KEY",
        "DEVKART_BACKENDS_VIDEO_REPLICA_ID",
        "DEVKART_BACKENDS_VIDEO_PERSONA_ID",
        "DEVKART_SERVER_BIND_ADDRESS",
        "DEVKART_SERVER_HEALTH_CHECK_PORT",
        "DEVKART_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "DEVKART_LOGGING_LEVEL",
        "DEVKART_LOGGING_FORMAT",
        "DEVKART_LOG_LEVEL",
        "DEVKART_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}

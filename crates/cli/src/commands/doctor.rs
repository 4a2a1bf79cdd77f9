use devkart_core::config::{AppConfig, LoadOptions};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_llm_readiness(&config));
            checks.push(check_monitoring_readiness(&config));
            checks.push(check_catalog(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["llm_key_readiness", "monitoring_readiness", "catalog_integrity"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let any_fail = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if any_fail { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if any_fail {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_llm_readiness(config: &AppConfig) -> DoctorCheck {
    if config.llm.api_key.is_some() {
        DoctorCheck {
            name: "llm_key_readiness",
            status: CheckStatus::Pass,
            details: format!("api key present for model `{}`", config.llm.model),
        }
    } else {
        // Not a failure: the structured tool-call path works without an LLM.
        DoctorCheck {
            name: "llm_key_readiness",
            status: CheckStatus::Skipped,
            details: "no llm api key; ai-inferred extraction is disabled".to_string(),
        }
    }
}

fn check_monitoring_readiness(config: &AppConfig) -> DoctorCheck {
    if !config.monitoring.enabled {
        return DoctorCheck {
            name: "monitoring_readiness",
            status: CheckStatus::Skipped,
            details: "monitoring disabled".to_string(),
        };
    }

    // Config validation already requires a key when enabled.
    DoctorCheck {
        name: "monitoring_readiness",
        status: CheckStatus::Pass,
        details: format!("transcript sink configured for agent `{}`", config.monitoring.agent_id),
    }
}

fn check_catalog(config: &AppConfig) -> DoctorCheck {
    let catalog = config.catalog();
    if catalog.is_empty() {
        return DoctorCheck {
            name: "catalog_integrity",
            status: CheckStatus::Fail,
            details: "catalog has no items; lookups can never resolve".to_string(),
        };
    }

    DoctorCheck {
        name: "catalog_integrity",
        status: CheckStatus::Pass,
        details: format!("{} items available", catalog.items().len()),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use pubscope_core::config::{AppConfig, LoadOptions, DEFAULT_CONFIG_FILE};
use toml::Value;

struct ConfigField {
    key_path: &'static str,
    env_key: &'static str,
    value: String,
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key_path,
            field.env_key,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key_path, &field.value, source));
    }

    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<ConfigField> {
    let field = |key_path, env_key, value: String| ConfigField { key_path, env_key, value };
    vec![
        field("database.url", "PUBSCOPE_DATABASE_URL", redact_url(&config.database.url)),
        field(
            "database.max_connections",
            "PUBSCOPE_DATABASE_MAX_CONNECTIONS",
            config.database.max_connections.to_string(),
        ),
        field(
            "database.timeout_secs",
            "PUBSCOPE_DATABASE_TIMEOUT_SECS",
            config.database.timeout_secs.to_string(),
        ),
        field("server.bind_address", "PUBSCOPE_SERVER_BIND_ADDRESS", config.server.bind_address.clone()),
        field("server.port", "PUBSCOPE_SERVER_PORT", config.server.port.to_string()),
        field(
            "server.request_timeout_secs",
            "PUBSCOPE_SERVER_REQUEST_TIMEOUT_SECS",
            config.server.request_timeout_secs.to_string(),
        ),
        field(
            "engine.tier_a_max_pct",
            "PUBSCOPE_ENGINE_TIER_A_MAX_PCT",
            config.engine.tier_a_max_pct.to_string(),
        ),
        field(
            "engine.tier_b_max_pct",
            "PUBSCOPE_ENGINE_TIER_B_MAX_PCT",
            config.engine.tier_b_max_pct.to_string(),
        ),
        field(
            "engine.lost_impact_months",
            "PUBSCOPE_ENGINE_LOST_IMPACT_MONTHS",
            config.engine.lost_impact_months.to_string(),
        ),
        field("logging.level", "PUBSCOPE_LOGGING_LEVEL", config.logging.level.clone()),
        field("logging.format", "PUBSCOPE_LOGGING_FORMAT", format!("{:?}", config.logging.format)),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from(DEFAULT_CONFIG_FILE), Path::new("config").join(DEFAULT_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
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
    if env::var_os(env_key).is_some() {
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

/// Hides query parameters, which may carry credentials for attached databases.
fn redact_url(url: &str) -> String {
    match url.split_once('?') {
        Some((base, _)) => format!("{base}?<redacted>"),
        None => url.to_string(),
    }
}

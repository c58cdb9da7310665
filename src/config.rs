use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use error_stack::{Report, ResultExt};
use serde::Deserialize;

use crate::error::ConfigError;

/// Value shipped in the sample config; left as-is it means "not configured".
pub const WEBHOOK_PLACEHOLDER: &str = "!!! PASTE YOUR WEBHOOK URL HERE !!!";

const MAX_DERIVED_TIMEOUT_SECS: u64 = 30;

fn default_vs_currency() -> String {
    "usd".into()
}

fn default_check_interval_seconds() -> u64 {
    60
}

fn default_api_base_url() -> String {
    "https://api.coingecko.com/api/v3".into()
}

fn default_requests_per_minute() -> u32 {
    30
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(alias = "notifier_endpoint")]
    pub discord_webhook_url: String,
    #[serde(default = "default_vs_currency")]
    pub vs_currency: String,
    #[serde(default = "default_check_interval_seconds")]
    pub check_interval_seconds: u64,
    #[serde(default)]
    pub assets: Vec<AssetConfig>,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    pub request_timeout_seconds: Option<u64>,
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Accepted values: `"text"` | `"json"`
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetConfig {
    pub id: String,
    pub alert_threshold_percent: f64,
}

impl Config {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_seconds)
    }

    /// Timeout for a single quote request. Always finite and never longer than
    /// the poll interval.
    pub fn request_timeout(&self) -> Duration {
        let secs = self.request_timeout_seconds.unwrap_or_else(|| {
            (self.check_interval_seconds / 2).clamp(1, MAX_DERIVED_TIMEOUT_SECS)
        });
        Duration::from_secs(secs.clamp(1, self.check_interval_seconds.max(1)))
    }

    pub fn asset_ids(&self) -> Vec<String> {
        self.assets.iter().map(|a| a.id.clone()).collect()
    }
}

/// Load and validate a `Config` from `path`.
///
/// Files ending in `.json` are read as JSON, everything else as TOML.
pub fn load(path: &Path) -> Result<Config, Report<ConfigError>> {
    let content = std::fs::read_to_string(path)
        .change_context(ConfigError::ReadFile)
        .attach_with(|| format!("path: {}", path.display()))
        .attach("create the file or pass another one with --config <path>")?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let parsed = if is_json {
        parse_json(&content)
    } else {
        parse_toml(&content)
    };
    let config = parsed.attach_with(|| format!("path: {}", path.display()))?;

    validate(config)
}

fn parse_json(content: &str) -> Result<Config, Report<ConfigError>> {
    serde_json::from_str(content).change_context(ConfigError::Parse {
        reason: "malformed JSON or schema mismatch".into(),
    })
}

fn parse_toml(content: &str) -> Result<Config, Report<ConfigError>> {
    toml::from_str(content).change_context(ConfigError::Parse {
        reason: "invalid TOML syntax or schema mismatch".into(),
    })
}

fn invalid(field: impl Into<String>, hint: &'static str) -> Report<ConfigError> {
    Report::new(ConfigError::Validation {
        field: field.into(),
    })
    .attach(hint)
}

/// Check every constraint and normalise `vs_currency` to lowercase.
fn validate(mut config: Config) -> Result<Config, Report<ConfigError>> {
    validate_webhook(&config)?;
    validate_currency(&mut config)?;
    validate_intervals(&config)?;
    validate_assets(&config)?;
    validate_log_format(&config)?;
    Ok(config)
}

fn validate_webhook(config: &Config) -> Result<(), Report<ConfigError>> {
    let url = config.discord_webhook_url.trim();
    if url.is_empty() {
        return Err(invalid(
            "discord_webhook_url is empty",
            "set discord_webhook_url to the webhook URL of your alert channel",
        ));
    }
    if url == WEBHOOK_PLACEHOLDER {
        return Err(invalid(
            "discord_webhook_url still holds the placeholder value",
            "replace the placeholder in discord_webhook_url with your real webhook URL",
        ));
    }
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return Err(invalid(
            format!("discord_webhook_url \"{url}\" is not an http(s) URL"),
            "discord_webhook_url must start with https://",
        ));
    }
    Ok(())
}

fn validate_currency(config: &mut Config) -> Result<(), Report<ConfigError>> {
    let currency = config.vs_currency.trim().to_ascii_lowercase();
    if currency.is_empty() {
        return Err(invalid(
            "vs_currency is empty",
            "set vs_currency to a quote currency code such as \"usd\"",
        ));
    }
    config.vs_currency = currency;
    Ok(())
}

fn validate_intervals(config: &Config) -> Result<(), Report<ConfigError>> {
    if config.check_interval_seconds == 0 {
        return Err(invalid(
            "check_interval_seconds must be > 0",
            "set check_interval_seconds to a positive number of seconds",
        ));
    }
    if config.request_timeout_seconds == Some(0) {
        return Err(invalid(
            "request_timeout_seconds must be > 0",
            "remove request_timeout_seconds or set it to a positive number of seconds",
        ));
    }
    if config.requests_per_minute == 0 {
        return Err(invalid(
            "requests_per_minute must be > 0",
            "remove requests_per_minute or set it to a positive number",
        ));
    }
    // The rate limiter wait counts against the tick, so the quota must allow
    // at least one request per interval.
    if u64::from(config.requests_per_minute).saturating_mul(config.check_interval_seconds) < 60 {
        return Err(invalid(
            format!(
                "requests_per_minute {} is too low for check_interval_seconds {}",
                config.requests_per_minute, config.check_interval_seconds
            ),
            "raise requests_per_minute or check_interval_seconds so that their product is at least 60",
        ));
    }
    Ok(())
}

fn validate_assets(config: &Config) -> Result<(), Report<ConfigError>> {
    if config.assets.is_empty() {
        return Err(invalid(
            "assets must not be empty",
            "add at least one { id, alert_threshold_percent } entry to assets",
        ));
    }

    let mut seen = HashSet::new();
    for (idx, asset) in config.assets.iter().enumerate() {
        if asset.id.trim().is_empty() {
            return Err(invalid(
                format!("assets[{idx}].id is empty"),
                "every asset needs the price-source id, e.g. \"bitcoin\"",
            ));
        }
        if !seen.insert(asset.id.as_str()) {
            return Err(invalid(
                format!("assets: duplicate id \"{}\"", asset.id),
                "list each asset id only once",
            ));
        }
        let threshold = asset.alert_threshold_percent;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(invalid(
                format!(
                    "assets[\"{}\"].alert_threshold_percent {threshold} must be a non-negative number",
                    asset.id
                ),
                "use a percentage such as 0.5 for half a percent",
            ));
        }
    }
    Ok(())
}

fn validate_log_format(config: &Config) -> Result<(), Report<ConfigError>> {
    match config.log_format.as_str() {
        "text" | "json" => Ok(()),
        other => Err(invalid(
            format!("log_format \"{other}\" is not valid"),
            "log_format accepts \"text\" or \"json\"",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEBHOOK: &str = "https://discord.com/api/webhooks/1/abc";

    fn parse(json: &str) -> Config {
        serde_json::from_str(json).expect("parse failed")
    }

    fn with_assets(assets: &str) -> Config {
        parse(&format!(
            r#"{{ "discord_webhook_url": "{WEBHOOK}", "assets": {assets} }}"#
        ))
    }

    #[test]
    fn valid_full_json_config_parses() {
        let json = r#"
{
    "discord_webhook_url": "https://discord.com/api/webhooks/1/abc",
    "vs_currency": "EUR",
    "check_interval_seconds": 30,
    "assets": [
        { "id": "bitcoin", "alert_threshold_percent": 0.5 },
        { "id": "ethereum", "alert_threshold_percent": 1.0 }
    ],
    "request_timeout_seconds": 5,
    "log_level": "debug",
    "log_format": "json"
}"#;
        let config = validate(parse(json)).expect("valid config");
        assert_eq!(config.vs_currency, "eur");
        assert_eq!(config.check_interval_seconds, 30);
        assert_eq!(config.asset_ids(), vec!["bitcoin", "ethereum"]);
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.log_format, "json");
    }

    #[test]
    fn valid_toml_config_parses() {
        let toml = r#"
notifier_endpoint = "https://discord.com/api/webhooks/1/abc"
check_interval_seconds = 10

[[assets]]
id = "solana"
alert_threshold_percent = 2.5
"#;
        let config = validate(parse_toml(toml).expect("parse failed")).expect("valid config");
        assert_eq!(config.discord_webhook_url, WEBHOOK);
        assert_eq!(config.assets[0].alert_threshold_percent, 2.5);
    }

    #[test]
    fn defaults_applied_when_fields_omitted() {
        let config = with_assets(r#"[{ "id": "bitcoin", "alert_threshold_percent": 0.5 }]"#);
        assert_eq!(config.vs_currency, "usd");
        assert_eq!(config.check_interval_seconds, 60);
        assert_eq!(config.api_base_url, "https://api.coingecko.com/api/v3");
        assert_eq!(config.requests_per_minute, 30);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, "text");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn derived_timeout_never_exceeds_interval() {
        let mut config = with_assets(r#"[{ "id": "bitcoin", "alert_threshold_percent": 0.5 }]"#);
        config.check_interval_seconds = 1;
        assert_eq!(config.request_timeout(), Duration::from_secs(1));
        config.check_interval_seconds = 10;
        config.request_timeout_seconds = Some(120);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn malformed_json_rejected() {
        assert!(parse_json(r#"{ "discord_webhook_url": "#).is_err());
    }

    #[test]
    fn missing_webhook_rejected() {
        assert!(parse_json(r#"{ "assets": [] }"#).is_err());
    }

    #[test]
    fn placeholder_webhook_rejected() {
        let mut config = with_assets(r#"[{ "id": "bitcoin", "alert_threshold_percent": 0.5 }]"#);
        config.discord_webhook_url = WEBHOOK_PLACEHOLDER.into();
        assert!(validate(config).is_err());
    }

    #[test]
    fn non_http_webhook_rejected() {
        let mut config = with_assets(r#"[{ "id": "bitcoin", "alert_threshold_percent": 0.5 }]"#);
        config.discord_webhook_url = "discord.com/api/webhooks/1".into();
        assert!(validate(config).is_err());
    }

    #[test]
    fn empty_assets_rejected() {
        assert!(validate(with_assets("[]")).is_err());
    }

    #[test]
    fn duplicate_asset_ids_rejected() {
        let config = with_assets(
            r#"[
                { "id": "bitcoin", "alert_threshold_percent": 0.5 },
                { "id": "bitcoin", "alert_threshold_percent": 1.0 }
            ]"#,
        );
        assert!(validate(config).is_err());
    }

    #[test]
    fn negative_threshold_rejected() {
        let config = with_assets(r#"[{ "id": "bitcoin", "alert_threshold_percent": -1.0 }]"#);
        assert!(validate(config).is_err());
    }

    #[test]
    fn zero_interval_rejected() {
        let mut config = with_assets(r#"[{ "id": "bitcoin", "alert_threshold_percent": 0.5 }]"#);
        config.check_interval_seconds = 0;
        assert!(validate(config).is_err());
    }

    #[test]
    fn quota_below_one_request_per_interval_rejected() {
        let mut config = with_assets(r#"[{ "id": "bitcoin", "alert_threshold_percent": 0.5 }]"#);
        config.check_interval_seconds = 1;
        config.requests_per_minute = 6;
        let err = validate(config).unwrap_err();
        assert!(matches!(
            err.current_context(),
            ConfigError::Validation { field } if field.contains("requests_per_minute")
        ));
    }

    #[test]
    fn quota_of_exactly_one_request_per_interval_accepted() {
        let mut config = with_assets(r#"[{ "id": "bitcoin", "alert_threshold_percent": 0.5 }]"#);
        config.check_interval_seconds = 2;
        config.requests_per_minute = 30;
        assert!(validate(config).is_ok());
    }

    #[test]
    fn unknown_log_format_rejected() {
        let mut config = with_assets(r#"[{ "id": "bitcoin", "alert_threshold_percent": 0.5 }]"#);
        config.log_format = "xml".into();
        assert!(validate(config).is_err());
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = load(Path::new("/nonexistent/price-alert.json")).unwrap_err();
        assert!(matches!(err.current_context(), ConfigError::ReadFile));
    }
}

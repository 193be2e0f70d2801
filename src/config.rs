use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub channel: ChannelConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// ws:// or wss:// endpoint serving snapshot updates
    pub url: String,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

fn default_reconnect_delay_ms() -> u64 {
    3000
}

impl ChannelConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

impl Config {
    /// Load configuration from a YAML file with environment variable substitution
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        // Expand environment variables in the format $(VAR_NAME)
        let expanded = expand_env_vars(content);

        let config: Config = serde_yaml::from_str(&expanded)?;
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let url = self.channel.url.trim();
        if url.is_empty() {
            return Err(AppError::Config("Channel url cannot be empty".to_string()));
        }

        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(AppError::Config(format!(
                "Channel url must use ws:// or wss://, got {}",
                url
            )));
        }

        if self.channel.reconnect_delay_ms == 0 {
            return Err(AppError::Config(
                "Channel reconnect_delay_ms cannot be 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Expand environment variables in the format $(VAR_NAME)
fn expand_env_vars(content: &str) -> String {
    let re = regex::Regex::new(r"\$\(([A-Z_][A-Z0-9_]*)\)").expect("env var pattern is valid");

    re.replace_all(content, |caps: &regex::Captures| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("GRID_MONITOR_TEST_VAR", "test_value");

        let input = "url: $(GRID_MONITOR_TEST_VAR)";
        let output = expand_env_vars(input);

        assert_eq!(output, "url: test_value");

        std::env::remove_var("GRID_MONITOR_TEST_VAR");
    }

    #[test]
    fn test_expand_env_vars_not_found() {
        let input = "url: $(NONEXISTENT_VAR)";
        let output = expand_env_vars(input);

        // Should leave it unchanged if not found
        assert_eq!(output, "url: $(NONEXISTENT_VAR)");
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_yaml("channel:\n  url: \"ws://localhost:8000/ws/client\"\n").unwrap();

        assert_eq!(config.channel.reconnect_delay(), Duration::from_millis(3000));
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_rejects_non_websocket_url() {
        let result = Config::from_yaml("channel:\n  url: \"https://example.com\"\n");
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_rejects_zero_delay() {
        let result =
            Config::from_yaml("channel:\n  url: \"ws://localhost\"\n  reconnect_delay_ms: 0\n");
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}

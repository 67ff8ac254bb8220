use crate::error::Result;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::info;

/// Pipeline configuration loaded from `config.toml`.
///
/// Every field carries a default so the pipeline runs without a config file;
/// the file only overrides the knobs it names.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub validity: ValidityConfig,
    pub timing: TimingConfig,
    pub channel: ChannelConfig,
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ValidityConfig {
    /// Email suffixes used by internal test accounts.
    pub test_domains: Vec<String>,
    /// Exact addresses known to be test traffic.
    pub denylisted_emails: Vec<String>,
    /// Case-insensitive substrings marking a test name.
    pub test_keywords: Vec<String>,
    /// Referrer prefix of the administrative panel.
    pub admin_referrer_prefix: String,
}

impl Default for ValidityConfig {
    fn default() -> Self {
        Self {
            test_domains: vec!["@v-ycfz.com".to_string(), "@vertu.cn".to_string()],
            denylisted_emails: vec!["katrinayu0815@gmail.com".to_string()],
            test_keywords: vec![
                "test".to_string(),
                "testing".to_string(),
                "测试".to_string(),
                "demo".to_string(),
            ],
            admin_referrer_prefix: "https://vertu.com/wp-admin/".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// First-response SLA threshold in seconds.
    pub sla_seconds: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self { sla_seconds: 30.0 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Referrals from this domain are labeled `website_internal`.
    pub first_party_domain: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            first_party_domain: "vertu.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Model name passed to the content-analysis service.
    pub model: String,
    /// Delay between live analysis calls, to respect rate limits.
    pub call_delay_seconds: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            call_delay_seconds: 6.0,
        }
    }
}

impl Config {
    /// Load configuration from the given path, falling back to defaults when
    /// the file does not exist.
    pub fn load(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            info!("No config file at '{}', using defaults", path);
            return Ok(Self::default());
        }
        let config_content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&config_content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.timing.sla_seconds, 30.0);
        assert_eq!(config.channel.first_party_domain, "vertu.com");
        assert!(config
            .validity
            .test_domains
            .iter()
            .any(|d| d == "@v-ycfz.com"));
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config: Config = toml::from_str(
            r#"
            [timing]
            sla_seconds = 45.0
            "#,
        )
        .unwrap();
        assert_eq!(config.timing.sla_seconds, 45.0);
        // Untouched sections keep their defaults
        assert_eq!(config.channel.first_party_domain, "vertu.com");
    }
}

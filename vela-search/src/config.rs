use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct VelaConfig {
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub rate_limits: RateLimitConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OrchestratorConfig {
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_searches: usize,
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    #[serde(default = "default_per_minute")]
    pub per_minute: u32,
    #[serde(default = "default_per_hour")]
    pub per_hour: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_concurrent() -> usize { 8 }
fn default_timeout_secs() -> u64 { 30 }
fn default_cache_enabled() -> bool { true }
fn default_cache_ttl() -> u64 { 300 }
fn default_per_minute() -> u32 { 30 }
fn default_per_hour() -> u32 { 500 }
fn default_max_retries() -> u32 { 3 }
fn default_initial_delay_ms() -> u64 { 500 }
fn default_backoff_multiplier() -> f64 { 2.0 }

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_searches: default_max_concurrent(),
            default_timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            ttl_secs: default_cache_ttl(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_minute: default_per_minute(),
            per_hour: default_per_hour(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl Default for VelaConfig {
    fn default() -> Self {
        Self {
            orchestrator: OrchestratorConfig::default(),
            cache: CacheConfig::default(),
            rate_limits: RateLimitConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl VelaConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default").required(false))
            // Add in the current environment file, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides that stay out of git
            .add_source(config::File::with_name("config/local").required(false))
            // Environment wins: VELA_ORCHESTRATOR__MAX_CONCURRENT_SEARCHES=4
            .add_source(config::Environment::with_prefix("VELA").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_usable_without_files() {
        let config = VelaConfig::default();
        assert_eq!(config.orchestrator.max_concurrent_searches, 8);
        assert_eq!(config.orchestrator.default_timeout_secs, 30);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.ttl_secs, 300);
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn test_partial_document_fills_in_defaults() {
        let config: VelaConfig = serde_json::from_str(
            r#"{ "orchestrator": { "max_concurrent_searches": 2 } }"#,
        )
        .unwrap();
        assert_eq!(config.orchestrator.max_concurrent_searches, 2);
        assert_eq!(config.orchestrator.default_timeout_secs, 30);
        assert_eq!(config.rate_limits.per_minute, 30);
    }
}

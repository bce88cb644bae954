use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("{key} must be greater than zero")]
    Zero { key: &'static str },
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: String,
    pub gemini_model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub upstream_timeout_secs: Option<u64>,
    pub rate_limit_window_secs: u64,
    pub rate_limit_requests: u32,
    pub rate_limit_max_clients: usize,
    pub cache_ttl_secs: u64,
    pub cache_max_entries: usize,
    pub max_concurrent: usize,
    pub history_limit: usize,
    pub sweep_interval_secs: u64,
    pub fallback_reply: String,
    pub server_host: String,
    pub server_port: u16,
}

impl Default for Config {
    /// 窗口 60 秒 / 20 次，缓存 5 分钟，上游并发 2，保留最近 6 轮对话
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            gemini_base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
            gemini_model: "gemini-2.5-flash".into(),
            temperature: 0.6,
            max_output_tokens: 512,
            upstream_timeout_secs: None,
            rate_limit_window_secs: 60,
            rate_limit_requests: 20,
            rate_limit_max_clients: 10_000,
            cache_ttl_secs: 300,
            cache_max_entries: 1_000,
            max_concurrent: 2,
            history_limit: 6,
            sweep_interval_secs: 60,
            fallback_reply: "Unable to generate a reply.".into(),
            server_host: "0.0.0.0".into(),
            server_port: 3000,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 从任意键值来源加载配置，未设置的键使用默认值
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let text = |key: &str, default: String| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
        };

        let config = Config {
            gemini_api_key: lookup("GEMINI_API_KEY")
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            gemini_base_url: text("GEMINI_BASE_URL", defaults.gemini_base_url),
            gemini_model: text("GEMINI_MODEL", defaults.gemini_model),
            temperature: parse(&lookup, "GEMINI_TEMPERATURE", defaults.temperature)?,
            max_output_tokens: parse(
                &lookup,
                "GEMINI_MAX_OUTPUT_TOKENS",
                defaults.max_output_tokens,
            )?,
            upstream_timeout_secs: parse_optional(&lookup, "UPSTREAM_TIMEOUT_SECS")?,
            rate_limit_window_secs: parse(
                &lookup,
                "RATE_LIMIT_WINDOW",
                defaults.rate_limit_window_secs,
            )?,
            rate_limit_requests: parse(
                &lookup,
                "RATE_LIMIT_REQUESTS",
                defaults.rate_limit_requests,
            )?,
            rate_limit_max_clients: parse(
                &lookup,
                "RATE_LIMIT_MAX_CLIENTS",
                defaults.rate_limit_max_clients,
            )?,
            cache_ttl_secs: parse(&lookup, "CACHE_TTL", defaults.cache_ttl_secs)?,
            cache_max_entries: parse(&lookup, "CACHE_MAX_ENTRIES", defaults.cache_max_entries)?,
            max_concurrent: parse(&lookup, "MAX_CONCURRENT", defaults.max_concurrent)?,
            history_limit: parse(&lookup, "HISTORY_LIMIT", defaults.history_limit)?,
            sweep_interval_secs: parse(
                &lookup,
                "SWEEP_INTERVAL",
                defaults.sweep_interval_secs,
            )?,
            fallback_reply: text("FALLBACK_REPLY", defaults.fallback_reply),
            server_host: text("SERVER_HOST", defaults.server_host),
            server_port: parse(&lookup, "SERVER_PORT", defaults.server_port)?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let positive: [(&'static str, u64); 8] = [
            ("RATE_LIMIT_WINDOW", self.rate_limit_window_secs),
            ("RATE_LIMIT_REQUESTS", self.rate_limit_requests.into()),
            ("RATE_LIMIT_MAX_CLIENTS", self.rate_limit_max_clients as u64),
            ("CACHE_TTL", self.cache_ttl_secs),
            ("CACHE_MAX_ENTRIES", self.cache_max_entries as u64),
            ("MAX_CONCURRENT", self.max_concurrent as u64),
            ("HISTORY_LIMIT", self.history_limit as u64),
            ("SWEEP_INTERVAL", self.sweep_interval_secs),
        ];
        match positive.iter().find(|(_, value)| *value == 0) {
            Some(&(key, _)) => Err(ConfigError::Zero { key }),
            None => Ok(()),
        }
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn upstream_timeout(&self) -> Option<Duration> {
        self.upstream_timeout_secs.map(Duration::from_secs)
    }
}

fn parse<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    Ok(parse_optional(lookup, key)?.unwrap_or(default))
}

fn parse_optional<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key).map(|v| v.trim().to_string()) {
        None => Ok(None),
        Some(v) if v.is_empty() => Ok(None),
        Some(v) => v
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value: v }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.gemini_api_key, None);
        assert_eq!(config.rate_limit_window(), Duration::from_secs(60));
        assert_eq!(config.rate_limit_requests, 20);
        assert_eq!(config.cache_ttl(), Duration::from_secs(300));
        assert_eq!(config.max_concurrent, 2);
        assert_eq!(config.history_limit, 6);
        assert_eq!(config.upstream_timeout(), None);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = load(&[
            ("GEMINI_API_KEY", " secret "),
            ("RATE_LIMIT_REQUESTS", "5"),
            ("CACHE_TTL", "10"),
            ("UPSTREAM_TIMEOUT_SECS", "30"),
            ("SERVER_PORT", "8080"),
        ])
        .unwrap();
        assert_eq!(config.gemini_api_key.as_deref(), Some("secret"));
        assert_eq!(config.rate_limit_requests, 5);
        assert_eq!(config.cache_ttl(), Duration::from_secs(10));
        assert_eq!(config.upstream_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.server_port, 8080);
    }

    #[test]
    fn blank_api_key_is_treated_as_missing() {
        let config = load(&[("GEMINI_API_KEY", "   ")]).unwrap();
        assert_eq!(config.gemini_api_key, None);
    }

    #[test]
    fn unparsable_value_is_rejected() {
        let err = load(&[("MAX_CONCURRENT", "two")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "MAX_CONCURRENT", .. }));
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let err = load(&[("MAX_CONCURRENT", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::Zero { key: "MAX_CONCURRENT" }));
    }
}

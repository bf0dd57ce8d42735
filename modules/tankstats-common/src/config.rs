use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::info;

use crate::error::TankStatsError;

/// Scraper configuration loaded from environment variables.
/// Every key has a default; only malformed values are errors.
#[derive(Debug, Clone)]
pub struct Config {
    // Site
    pub base_url: String,
    pub referer: String,

    // Static fetch
    pub http_timeout: Duration,
    pub fetch_attempts: u32,

    // Rendered fetch
    pub render_enabled: bool,
    pub chrome_bin: String,
    pub block_fonts: bool,
    pub min_ready_values: usize,
    pub ready_timeout: Duration,

    // Text proxy
    pub text_proxy_enabled: bool,
    pub text_proxy_base: String,
    pub text_proxy_min_len: usize,
    pub proxy_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "https://tanki.su/ru/community/accounts".to_string(),
            referer: "https://tanki.su/".to_string(),
            http_timeout: Duration::from_secs(30),
            fetch_attempts: 3,
            render_enabled: true,
            chrome_bin: "chromium".to_string(),
            block_fonts: false,
            min_ready_values: 1,
            ready_timeout: Duration::from_secs(60),
            text_proxy_enabled: true,
            text_proxy_base: "https://r.jina.ai/http/".to_string(),
            text_proxy_min_len: 500,
            proxy_timeout: Duration::from_secs(60),
        }
    }
}

impl Config {
    /// Load configuration from the environment (after `.env`, if present).
    pub fn from_env() -> Result<Self, TankStatsError> {
        let _ = dotenvy::dotenv();
        let d = Self::default();

        Ok(Self {
            base_url: env::var("TANKSTATS_BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(d.base_url),
            referer: env::var("TANKSTATS_REFERER").unwrap_or(d.referer),
            http_timeout: secs_env("TANKSTATS_HTTP_TIMEOUT_SECS", d.http_timeout)?,
            fetch_attempts: parsed_env("TANKSTATS_FETCH_ATTEMPTS", d.fetch_attempts)?.max(1),
            render_enabled: parsed_env("TANKSTATS_RENDER_ENABLED", d.render_enabled)?,
            chrome_bin: env::var("CHROME_BIN").unwrap_or(d.chrome_bin),
            block_fonts: parsed_env("TANKSTATS_BLOCK_FONTS", d.block_fonts)?,
            min_ready_values: parsed_env("TANKSTATS_MIN_READY_VALUES", d.min_ready_values)?,
            ready_timeout: secs_env("TANKSTATS_READY_TIMEOUT_SECS", d.ready_timeout)?,
            text_proxy_enabled: parsed_env("TANKSTATS_TEXT_PROXY_ENABLED", d.text_proxy_enabled)?,
            text_proxy_base: env::var("TANKSTATS_TEXT_PROXY_BASE").unwrap_or(d.text_proxy_base),
            text_proxy_min_len: parsed_env("TANKSTATS_TEXT_PROXY_MIN_LEN", d.text_proxy_min_len)?,
            proxy_timeout: secs_env("TANKSTATS_PROXY_TIMEOUT_SECS", d.proxy_timeout)?,
        })
    }

    /// Build the canonical profile URL: `<base>/<id>-<name>/`, or `<base>/<id>/`
    /// without a name.
    pub fn profile_url(&self, account_id: u64, nickname: Option<&str>) -> String {
        match nickname {
            Some(name) if !name.is_empty() => format!("{}/{}-{}/", self.base_url, account_id, name),
            _ => format!("{}/{}/", self.base_url, account_id),
        }
    }

    pub fn log_summary(&self) {
        info!(
            base_url = self.base_url.as_str(),
            fetch_attempts = self.fetch_attempts,
            http_timeout_secs = self.http_timeout.as_secs(),
            render_enabled = self.render_enabled,
            chrome_bin = self.chrome_bin.as_str(),
            block_fonts = self.block_fonts,
            min_ready_values = self.min_ready_values,
            text_proxy_enabled = self.text_proxy_enabled,
            text_proxy_base = self.text_proxy_base.as_str(),
            "Config loaded"
        );
    }
}

fn parsed_env<T: FromStr>(key: &str, default: T) -> Result<T, TankStatsError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| TankStatsError::Config(format!("{key} has invalid value {raw:?}"))),
        Err(_) => Ok(default),
    }
}

fn secs_env(key: &str, default: Duration) -> Result<Duration, TankStatsError> {
    parsed_env(key, default.as_secs()).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_url_with_and_without_name() {
        let config = Config::default();
        assert_eq!(
            config.profile_url(12345, Some("Ivan")),
            "https://tanki.su/ru/community/accounts/12345-Ivan/"
        );
        assert_eq!(
            config.profile_url(12345, None),
            "https://tanki.su/ru/community/accounts/12345/"
        );
        assert_eq!(
            config.profile_url(12345, Some("")),
            "https://tanki.su/ru/community/accounts/12345/"
        );
    }

    #[test]
    fn malformed_env_value_is_a_config_error() {
        env::set_var("TANKSTATS_TEST_ONLY_ATTEMPTS", "three");
        let err = parsed_env::<u32>("TANKSTATS_TEST_ONLY_ATTEMPTS", 3).unwrap_err();
        assert!(matches!(err, TankStatsError::Config(_)));
        env::remove_var("TANKSTATS_TEST_ONLY_ATTEMPTS");
    }

    #[test]
    fn missing_env_value_uses_default() {
        assert_eq!(parsed_env::<u32>("TANKSTATS_TEST_ONLY_UNSET", 7).unwrap(), 7);
    }
}

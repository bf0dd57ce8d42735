// Tier 1: plain HTTP fetch of the profile page, parsed with CSS selectors.

use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, REFERER, USER_AGENT};
use scraper::{ElementRef, Html, Selector};
use tankstats_common::Config;
use tracing::{info, warn};

use crate::normalize::canonicalize_label;
use crate::traits::{ProfileSource, ProfileTarget, RawProfile, Tier};

/// Linear backoff unit: attempt `n` failing waits `n` units before the next.
const RETRY_BACKOFF: Duration = Duration::from_secs(1);

static H1: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").expect("valid selector"));
static STATS_INNER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".stats_inner").expect("valid selector"));
static STATS_ITEM: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".stats_item").expect("valid selector"));
static STATS_TEXT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".stats_text").expect("valid selector"));
static STATS_VALUE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".stats_value").expect("valid selector"));

pub struct StaticPageSource {
    client: reqwest::Client,
    attempts: u32,
    backoff: Duration,
}

impl StaticPageSource {
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(super::USER_AGENT));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(super::ACCEPT_LANGUAGE));
        headers.insert(
            REFERER,
            HeaderValue::from_str(&config.referer).context("Invalid referer")?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.http_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            attempts: config.fetch_attempts,
            backoff: RETRY_BACKOFF,
        })
    }

    /// Override the retry backoff unit.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// GET with retries on any transport or status error. The last error is
    /// returned once attempts run out.
    async fn fetch_html(&self, url: &str) -> Result<String> {
        let mut attempt = 1;
        loop {
            let result = match self.client.get(url).send().await.and_then(|r| r.error_for_status()) {
                Ok(resp) => resp.text().await,
                Err(e) => Err(e),
            };

            match result {
                Ok(html) => return Ok(html),
                Err(e) if attempt < self.attempts => {
                    warn!(url, attempt, error = %e, "static: fetch failed, retrying");
                    tokio::time::sleep(self.backoff * attempt).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("GET {url} failed after {attempt} attempts"));
                }
            }
        }
    }
}

#[async_trait]
impl ProfileSource for StaticPageSource {
    fn tier(&self) -> Tier {
        Tier::Static
    }

    async fn fetch(&self, target: &ProfileTarget) -> Result<Option<RawProfile>> {
        let html = self.fetch_html(&target.url).await?;
        let raw = parse_profile_html(&html, &target.url);
        info!(
            url = target.url.as_str(),
            bytes = html.len(),
            labels = raw.labels.len(),
            "static: page fetched"
        );
        Ok(Some(raw))
    }
}

/// Read the labeled stats block and nickname out of profile markup. The
/// markup itself is kept as fallback text for the pattern pass.
pub fn parse_profile_html(html: &str, url: &str) -> RawProfile {
    let document = Html::parse_document(html);

    let nickname = document
        .select(&H1)
        .next()
        .map(|h1| h1.text().map(str::trim).collect::<String>())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| nickname_from_url(url));

    let mut labels = HashMap::new();
    if let Some(inner) = document.select(&STATS_INNER).next() {
        for item in inner.select(&STATS_ITEM) {
            let (Some(label), Some(value)) = (
                item.select(&STATS_TEXT).next(),
                item.select(&STATS_VALUE).next(),
            ) else {
                continue;
            };
            labels.insert(
                canonicalize_label(&label.text().collect::<String>()),
                joined_text(value),
            );
        }
    }

    RawProfile {
        labels,
        nickname: Some(nickname),
        fallback_text: Some(html.to_string()),
    }
}

/// Slug part of a profile URL: "…/12345-Ivan/" → "Ivan", "…/12345/" → "12345".
pub fn nickname_from_url(url: &str) -> String {
    let tail = url.trim_end_matches('/').rsplit('/').next().unwrap_or(url);
    match tail.split_once('-') {
        Some((_, name)) => name.to_string(),
        None => tail.to_string(),
    }
}

fn joined_text(el: ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILE: &str = r#"<html><body>
        <h1> Ivan </h1>
        <div class="stats_inner">
          <div class="stats_item"><span class="stats_text">Личный рейтинг</span><span class="stats_value">5 000</span></div>
          <div class="stats_item"><span class="stats_text">Бои</span><span class="stats_value"><b>1</b> 234</span></div>
          <div class="stats_item"><span class="stats_text">Победы</span><span class="stats_value">55,5 %</span></div>
          <div class="stats_item"><span class="stats_text">Средний урон</span><span class="stats_value">987</span></div>
          <div class="stats_item"><span class="stats_text">Без значения</span></div>
        </div>
      </body></html>"#;

    #[test]
    fn reads_labeled_items() {
        let raw = parse_profile_html(PROFILE, "https://tanki.su/ru/community/accounts/12345-Ivan/");
        assert_eq!(raw.nickname.as_deref(), Some("Ivan"));
        assert_eq!(raw.labels.get("личный рейтинг").map(String::as_str), Some("5 000"));
        assert_eq!(raw.labels.get("бои").map(String::as_str), Some("1 234"));
        assert_eq!(raw.labels.get("победы").map(String::as_str), Some("55,5 %"));
        assert_eq!(raw.labels.len(), 4);
        assert_eq!(raw.fallback_text.as_deref(), Some(PROFILE));
    }

    #[test]
    fn nickname_falls_back_to_slug() {
        let raw = parse_profile_html("<html><body></body></html>", "https://x/accounts/777-Petr-2/");
        assert_eq!(raw.nickname.as_deref(), Some("Petr-2"));
        assert!(raw.labels.is_empty());
    }

    #[test]
    fn slug_without_name_is_the_id() {
        assert_eq!(nickname_from_url("https://x/accounts/777/"), "777");
        assert_eq!(nickname_from_url("https://x/accounts/777-Ivan"), "Ivan");
    }
}

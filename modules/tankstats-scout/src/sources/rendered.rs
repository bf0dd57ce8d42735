// Tier 2: headless Chrome over CDP, reading stats from the live DOM once the
// client-side render has filled them in.
//
// One browser per call. The context and the process are released on every
// path out of `render`, success or failure.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use cdp_client::{Browser, BrowserContext, LaunchOptions, Page, ResourceType, WaitUntil};
use serde::Deserialize;
use serde_json::Value;
use tankstats_common::Config;
use tracing::{debug, info, warn};

use crate::traits::{ProfileSource, ProfileTarget, RawProfile, Tier};

/// Navigation readiness ladder: each rung waits for more of the page.
pub const NAVIGATION_STEPS: [(WaitUntil, Duration); 3] = [
    (WaitUntil::Commit, Duration::from_secs(30)),
    (WaitUntil::DomContentLoaded, Duration::from_secs(60)),
    (WaitUntil::Load, Duration::from_secs(120)),
];
const NAVIGATION_BACKOFF: Duration = Duration::from_millis(1500);
const READY_POLL: Duration = Duration::from_millis(250);
const VIEWPORT: (u32, u32) = (1280, 900);

const STEALTH_SCRIPT: &str = r#"
Object.defineProperty(navigator, 'webdriver', {get: () => undefined});
window.chrome = { runtime: {} };
Object.defineProperty(navigator, 'languages', {get: () => ['ru-RU', 'ru', 'en-US', 'en']});
Object.defineProperty(navigator, 'platform', {get: () => 'Win32'});
"#;

const EXTRACT_SCRIPT: &str = r#"(() => {
    const stats = {};
    document.querySelectorAll('.stats_inner .stats_item').forEach(it => {
        const l = it.querySelector('.stats_text')?.textContent?.trim() || '';
        const v = it.querySelector('.stats_value')?.textContent?.trim() || '';
        if (l) stats[l.toLowerCase()] = v;
    });
    const h1 = document.querySelector('h1');
    return { stats, nickname: h1 ? h1.textContent.trim() : null };
})()"#;

/// One attempt at dismissing a cookie-consent overlay.
#[derive(Debug, Clone, Copy)]
enum ConsentStep {
    /// First `<button>` whose text contains this fragment.
    ButtonText(&'static str),
    Css(&'static str),
}

const CONSENT_STEPS: &[ConsentStep] = &[
    ConsentStep::ButtonText("Соглас"),
    ConsentStep::ButtonText("Принять"),
    ConsentStep::Css(r#"[data-qa*="cookie"] button"#),
    ConsentStep::Css("#cookie_policy_button"),
    ConsentStep::Css(".cookie-accept, .cookies-accept, .cookies__button"),
];

impl ConsentStep {
    /// Script that clicks the match and reports whether it found one.
    fn script(self) -> String {
        let finder = match self {
            ConsentStep::ButtonText(text) => format!(
                "Array.from(document.querySelectorAll('button')).find(b => (b.textContent || '').includes({}))",
                js_string(text)
            ),
            ConsentStep::Css(selector) => format!("document.querySelector({})", js_string(selector)),
        };
        format!("(() => {{ const el = {finder}; if (!el) return false; el.click(); return true; }})()")
    }
}

#[derive(Debug, Deserialize)]
struct DomGrab {
    #[serde(default)]
    stats: HashMap<String, String>,
    nickname: Option<String>,
}

pub struct RenderedSource {
    launch: LaunchOptions,
    referer: String,
    block_fonts: bool,
    min_ready_values: usize,
    ready_timeout: Duration,
}

impl RenderedSource {
    pub fn new(config: &Config) -> Self {
        let launch = LaunchOptions {
            chrome_bin: config.chrome_bin.clone(),
            args: vec![
                "--disable-blink-features=AutomationControlled".to_string(),
                "--no-sandbox".to_string(),
                "--disable-dev-shm-usage".to_string(),
                "--ignore-certificate-errors".to_string(),
                format!("--window-size={},{}", VIEWPORT.0, VIEWPORT.1),
            ],
            ..LaunchOptions::default()
        };

        Self {
            launch,
            referer: config.referer.clone(),
            block_fonts: config.block_fonts,
            min_ready_values: config.min_ready_values.max(1),
            ready_timeout: config.ready_timeout,
        }
    }

    async fn render(&self, url: &str) -> Result<RawProfile> {
        let browser = Browser::launch(&self.launch)
            .await
            .context("Failed to launch Chrome")?;
        let outcome = self.render_in_browser(&browser, url).await;
        if let Err(e) = browser.close().await {
            warn!(url, error = %e, "rendered: browser close failed");
        }
        outcome
    }

    async fn render_in_browser(&self, browser: &Browser, url: &str) -> Result<RawProfile> {
        let context = browser
            .new_context()
            .await
            .context("Failed to create browser context")?;
        let outcome = self.render_in_context(&context, url).await;
        if let Err(e) = context.dispose().await {
            debug!(url, error = %e, "rendered: context dispose failed");
        }
        outcome
    }

    async fn render_in_context(&self, context: &BrowserContext, url: &str) -> Result<RawProfile> {
        let mut page = context.new_page().await.context("Failed to open page")?;
        self.prepare(&mut page).await?;

        let page_ref = &page;
        let reached = navigate_with_fallback(&NAVIGATION_STEPS, NAVIGATION_BACKOFF, move |wait, timeout| {
            page_ref.navigate(url, wait, timeout)
        })
        .await
        .with_context(|| format!("Navigation to {url} failed"))?;
        debug!(url, reached = ?reached, "rendered: navigated");

        dismiss_consent(&page).await;

        page.wait_for_function(&ready_expression(self.min_ready_values), self.ready_timeout, READY_POLL)
            .await
            .context("Stats block never rendered")?;

        let grabbed: DomGrab = serde_json::from_value(
            page.evaluate(EXTRACT_SCRIPT)
                .await
                .context("DOM extraction failed")?,
        )
        .context("Unexpected DOM extraction shape")?;

        if let Err(e) = page.close().await {
            debug!(url, error = %e, "rendered: page close failed");
        }

        Ok(RawProfile {
            labels: grabbed.stats,
            nickname: grabbed.nickname.filter(|n| !n.is_empty()),
            fallback_text: None,
        })
    }

    /// Fingerprint, locale and request-blocking setup before the first navigation.
    async fn prepare(&self, page: &mut Page) -> Result<()> {
        page.enable().await?;
        page.add_init_script(STEALTH_SCRIPT).await?;
        page.set_user_agent(super::USER_AGENT, super::ACCEPT_LANGUAGE, "Win32")
            .await?;
        page.set_extra_headers(&[
            ("Accept-Language", super::ACCEPT_LANGUAGE),
            ("Referer", self.referer.as_str()),
        ])
        .await?;
        if let Err(e) = page.set_locale("ru-RU").await {
            debug!(error = %e, "rendered: locale override unsupported");
        }
        page.set_viewport(VIEWPORT.0, VIEWPORT.1).await?;

        let mut blocked = vec![ResourceType::Image, ResourceType::Media];
        if self.block_fonts {
            blocked.push(ResourceType::Font);
        }
        page.block_resource_types(&blocked).await?;
        Ok(())
    }
}

#[async_trait]
impl ProfileSource for RenderedSource {
    fn tier(&self) -> Tier {
        Tier::Rendered
    }

    async fn fetch(&self, target: &ProfileTarget) -> Result<Option<RawProfile>> {
        let raw = self.render(&target.url).await?;
        info!(
            url = target.url.as_str(),
            labels = raw.labels.len(),
            "rendered: DOM read"
        );
        if raw.labels.is_empty() {
            return Ok(None);
        }
        Ok(Some(raw))
    }
}

/// Try each readiness rung in turn, sleeping `backoff × (i + 1)` after a
/// failure. Returns the rung that succeeded; only the last rung's error
/// escapes.
pub async fn navigate_with_fallback<F, Fut, E>(
    steps: &[(WaitUntil, Duration)],
    backoff: Duration,
    mut attempt: F,
) -> std::result::Result<WaitUntil, E>
where
    F: FnMut(WaitUntil, Duration) -> Fut,
    Fut: Future<Output = std::result::Result<(), E>>,
    E: std::fmt::Display,
{
    let mut last_err = None;
    for (i, &(wait, timeout)) in steps.iter().enumerate() {
        match attempt(wait, timeout).await {
            Ok(()) => return Ok(wait),
            Err(e) => {
                debug!(wait = ?wait, error = %e, "rendered: navigation rung failed");
                if i + 1 < steps.len() {
                    tokio::time::sleep(backoff * (i as u32 + 1)).await;
                }
                last_err = Some(e);
            }
        }
    }
    match last_err {
        Some(e) => Err(e),
        // No rungs configured: nothing to wait for.
        None => Ok(WaitUntil::Commit),
    }
}

/// Click the first consent control that exists. Failures are ignored; the
/// overlay only matters if it hides the stats.
async fn dismiss_consent(page: &Page) {
    for step in CONSENT_STEPS {
        match page.evaluate(&step.script()).await {
            Ok(Value::Bool(true)) => {
                debug!(step = ?step, "rendered: consent dismissed");
                return;
            }
            Ok(_) => {}
            Err(e) => debug!(step = ?step, error = %e, "rendered: consent step failed"),
        }
    }
}

/// Truthy once at least `min` stat values contain a digit.
fn ready_expression(min: usize) -> String {
    format!(
        "Array.from(document.querySelectorAll('.stats_inner .stats_item .stats_value'))\
         .filter(n => /\\d/.test(n.textContent || '')).length >= {min}"
    )
}

fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn navigation_escalates_until_a_rung_succeeds() {
        let calls = AtomicUsize::new(0);
        let reached = navigate_with_fallback(&NAVIGATION_STEPS, Duration::ZERO, |wait, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if wait == WaitUntil::Load {
                    Ok(())
                } else {
                    Err("timeout")
                }
            }
        })
        .await;

        assert_eq!(reached, Ok(WaitUntil::Load));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn navigation_stops_at_first_success() {
        let calls = AtomicUsize::new(0);
        let reached = navigate_with_fallback(&NAVIGATION_STEPS, Duration::ZERO, |_, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<(), &str>(()) }
        })
        .await;

        assert_eq!(reached, Ok(WaitUntil::Commit));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn navigation_surfaces_the_last_error() {
        let mut n = 0;
        let reached = navigate_with_fallback(&NAVIGATION_STEPS, Duration::ZERO, |_, _| {
            n += 1;
            let msg = format!("fail {n}");
            async move { Err::<(), String>(msg) }
        })
        .await;

        assert_eq!(reached, Err("fail 3".to_string()));
    }

    #[test]
    fn consent_scripts_quote_their_arguments() {
        let script = ConsentStep::Css(r#"[data-qa*="cookie"] button"#).script();
        assert!(script.contains(r#"document.querySelector("[data-qa*=\"cookie\"] button")"#));

        let script = ConsentStep::ButtonText("Принять").script();
        assert!(script.contains(r#".includes("Принять")"#));
        assert!(script.ends_with("})()"));
    }

    #[test]
    fn ready_expression_embeds_minimum() {
        assert!(ready_expression(3).ends_with(">= 3"));
    }

    #[test]
    fn dom_grab_tolerates_missing_nickname() {
        let grab: DomGrab = serde_json::from_value(serde_json::json!({
            "stats": { "бои": "1 234" },
            "nickname": null
        }))
        .unwrap();
        assert_eq!(grab.stats.get("бои").map(String::as_str), Some("1 234"));
        assert!(grab.nickname.is_none());
    }
}

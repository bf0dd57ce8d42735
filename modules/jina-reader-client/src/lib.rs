pub mod error;

pub use error::{JinaError, Result};

use std::time::Duration;

use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://r.jina.ai/http/";

pub struct JinaReaderClient {
    client: reqwest::Client,
    base_url: String,
    min_len: usize,
}

impl JinaReaderClient {
    pub fn new(base_url: &str, timeout: Duration, min_len: usize) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            min_len,
        })
    }

    /// Fetch the reader's plain-text rendering of `url`.
    ///
    /// Bodies shorter than `min_len` are reported as [`JinaError::TooShort`]:
    /// the reader answers blocked or empty pages with a short stub.
    pub async fn read(&self, url: &str) -> Result<String> {
        let endpoint = proxied_url(&self.base_url, url);
        debug!(endpoint = endpoint.as_str(), "jina: requesting text");

        let resp = self
            .client
            .get(&endpoint)
            .header("User-Agent", "Mozilla/5.0")
            .header("Accept-Language", "ru,en;q=0.9")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(JinaError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let text = resp.text().await?;
        let len = text.chars().count();
        if len <= self.min_len {
            return Err(JinaError::TooShort {
                len,
                min: self.min_len,
            });
        }
        Ok(text)
    }
}

/// Build the reader URL: the target without scheme or trailing slash,
/// appended to the reader base.
pub fn proxied_url(base_url: &str, url: &str) -> String {
    let bare = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    format!("{}{}", base_url, bare.trim_end_matches('/'))
}

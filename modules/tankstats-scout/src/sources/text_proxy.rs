// Tier 3: a remote reader service's plain-text rendering of the profile.
// There is no label block here; everything goes through the pattern pass.

use anyhow::{Context, Result};
use async_trait::async_trait;
use jina_reader_client::JinaReaderClient;
use tankstats_common::Config;
use tracing::{info, warn};

use crate::traits::{ProfileSource, ProfileTarget, RawProfile, Tier};

pub struct TextProxySource {
    client: JinaReaderClient,
}

impl TextProxySource {
    pub fn new(config: &Config) -> Result<Self> {
        let client = JinaReaderClient::new(
            &config.text_proxy_base,
            config.proxy_timeout,
            config.text_proxy_min_len,
        )
        .context("Failed to build text proxy client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ProfileSource for TextProxySource {
    fn tier(&self) -> Tier {
        Tier::TextProxy
    }

    /// Never fails: any reader error just means this tier has nothing.
    async fn fetch(&self, target: &ProfileTarget) -> Result<Option<RawProfile>> {
        match self.client.read(&target.url).await {
            Ok(text) => {
                info!(url = target.url.as_str(), chars = text.chars().count(), "text_proxy: text received");
                Ok(Some(RawProfile {
                    labels: Default::default(),
                    nickname: None,
                    fallback_text: Some(text),
                }))
            }
            Err(e) => {
                warn!(url = target.url.as_str(), error = %e, "text_proxy: unusable");
                Ok(None)
            }
        }
    }
}

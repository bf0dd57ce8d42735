pub mod rendered;
pub mod static_page;
pub mod text_proxy;

use anyhow::Result;
use tankstats_common::Config;
use tracing::info;

use crate::traits::ProfileSource;

pub use rendered::RenderedSource;
pub use static_page::StaticPageSource;
pub use text_proxy::TextProxySource;

/// Desktop Chrome on Windows; the site serves the full stats block to it.
pub(crate) const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/121.0 Safari/537.36";
pub(crate) const ACCEPT_LANGUAGE: &str = "ru,en;q=0.9";

/// The enabled tiers, cheapest first.
pub fn from_config(config: &Config) -> Result<Vec<Box<dyn ProfileSource>>> {
    let mut sources: Vec<Box<dyn ProfileSource>> = vec![Box::new(StaticPageSource::new(config)?)];
    if config.render_enabled {
        sources.push(Box::new(RenderedSource::new(config)));
    }
    if config.text_proxy_enabled {
        sources.push(Box::new(TextProxySource::new(config)?));
    }

    let tiers: Vec<&str> = sources.iter().map(|s| s.tier().as_str()).collect();
    info!(tiers = ?tiers, "Retrieval tiers configured");
    Ok(sources)
}

// Retrieval tier abstraction. Each tier turns a profile target into a raw
// label→value mapping; the cascade maps and judges it.
//
// Mock implementations live in `testing` so the cascade and runner can be
// exercised without network or a browser.

use std::collections::HashMap;
use std::fmt;

use anyhow::Result;
use async_trait::async_trait;

/// The profile being scraped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileTarget {
    pub account_id: u64,
    /// Nickname supplied with the job, if any.
    pub nickname: Option<String>,
    pub url: String,
}

/// Unmapped output of one tier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawProfile {
    /// Page label → value text, as shown on the page.
    pub labels: HashMap<String, String>,
    /// Nickname the tier found on the page itself.
    pub nickname: Option<String>,
    /// Raw text for the pattern pass, when the tier has any.
    pub fallback_text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Static,
    Rendered,
    TextProxy,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Static => "static",
            Tier::Rendered => "rendered",
            Tier::TextProxy => "text_proxy",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait ProfileSource: Send + Sync {
    fn tier(&self) -> Tier;

    /// `Ok(None)` means the tier ran but had nothing to offer.
    async fn fetch(&self, target: &ProfileTarget) -> Result<Option<RawProfile>>;
}

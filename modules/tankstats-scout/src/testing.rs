// Test mocks for the retrieval cascade.
//
// - MockSource (ProfileSource): canned replies keyed by account id, with a
//   shared call counter that survives boxing into a `Cascade`.
//
// Plus helpers for building raw profiles and targets.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::traits::{ProfileSource, ProfileTarget, RawProfile, Tier};

// ---------------------------------------------------------------------------
// MockSource
// ---------------------------------------------------------------------------

/// What a mock tier does when asked for an account.
#[derive(Debug, Clone)]
pub enum MockReply {
    Profile(RawProfile),
    Nothing,
    Fail(String),
}

/// Builder pattern: `.on(id, reply)`, `.otherwise(reply)`.
/// Unregistered accounts get the fallback reply (`Nothing` by default).
pub struct MockSource {
    tier: Tier,
    replies: HashMap<u64, MockReply>,
    fallback: MockReply,
    calls: Arc<AtomicUsize>,
}

impl MockSource {
    pub fn new(tier: Tier) -> Self {
        Self {
            tier,
            replies: HashMap::new(),
            fallback: MockReply::Nothing,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn on(mut self, account_id: u64, reply: MockReply) -> Self {
        self.replies.insert(account_id, reply);
        self
    }

    pub fn otherwise(mut self, reply: MockReply) -> Self {
        self.fallback = reply;
        self
    }

    /// Handle on the call count; keep it before moving the mock into a cascade.
    pub fn call_counter(&self) -> CallCounter {
        CallCounter(self.calls.clone())
    }
}

#[async_trait]
impl ProfileSource for MockSource {
    fn tier(&self) -> Tier {
        self.tier
    }

    async fn fetch(&self, target: &ProfileTarget) -> Result<Option<RawProfile>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.replies.get(&target.account_id).unwrap_or(&self.fallback) {
            MockReply::Profile(raw) => Ok(Some(raw.clone())),
            MockReply::Nothing => Ok(None),
            MockReply::Fail(msg) => bail!("{}", msg),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A profile with the given (label, value) pairs and nickname.
pub fn labeled_profile(pairs: &[(&str, &str)], nickname: Option<&str>) -> RawProfile {
    RawProfile {
        labels: pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        nickname: nickname.map(str::to_string),
        fallback_text: None,
    }
}

/// A label-less profile carrying only text for the pattern pass.
pub fn text_profile(text: &str) -> RawProfile {
    RawProfile {
        labels: HashMap::new(),
        nickname: None,
        fallback_text: Some(text.to_string()),
    }
}

/// The fully populated profile used across the end-to-end tests.
pub fn ivan_profile() -> RawProfile {
    labeled_profile(
        &[
            ("личный рейтинг", "5 000"),
            ("бои", "1 234"),
            ("победы", "55,5 %"),
            ("средний урон", "987"),
        ],
        Some("Ivan"),
    )
}

pub fn target(account_id: u64, nickname: Option<&str>) -> ProfileTarget {
    let url = match nickname {
        Some(name) => format!("https://tanki.su/ru/community/accounts/{account_id}-{name}/"),
        None => format!("https://tanki.su/ru/community/accounts/{account_id}/"),
    };
    ProfileTarget {
        account_id,
        nickname: nickname.map(str::to_string),
        url,
    }
}

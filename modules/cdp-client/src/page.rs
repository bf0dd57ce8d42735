// A single attached page session: emulation overrides, request blocking,
// navigation with a readiness mode, and script evaluation.

use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::connection::Connection;
use crate::error::{CdpError, Result};

/// How far a navigation must progress before `navigate` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    /// The navigation response was committed.
    Commit,
    DomContentLoaded,
    Load,
}

impl WaitUntil {
    fn event(self) -> Option<&'static str> {
        match self {
            WaitUntil::Commit => None,
            WaitUntil::DomContentLoaded => Some("Page.domContentEventFired"),
            WaitUntil::Load => Some("Page.loadEventFired"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    Image,
    Media,
    Font,
    Stylesheet,
}

impl ResourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::Image => "Image",
            ResourceType::Media => "Media",
            ResourceType::Font => "Font",
            ResourceType::Stylesheet => "Stylesheet",
        }
    }
}

pub struct Page {
    conn: Connection,
    target_id: String,
    session_id: String,
    interceptor: Option<JoinHandle<()>>,
}

impl Drop for Page {
    fn drop(&mut self) {
        if let Some(task) = self.interceptor.take() {
            task.abort();
        }
    }
}

impl Page {
    pub(crate) fn new(conn: Connection, target_id: String, session_id: String) -> Self {
        Self {
            conn,
            target_id,
            session_id,
            interceptor: None,
        }
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        self.conn.call(method, params, Some(&self.session_id)).await
    }

    /// Enable the Page and Network domains; lifecycle events and header
    /// overrides depend on them.
    pub async fn enable(&self) -> Result<()> {
        self.call("Page.enable", json!({})).await?;
        self.call("Network.enable", json!({})).await?;
        Ok(())
    }

    /// Run `source` in every new document before any page script.
    pub async fn add_init_script(&self, source: &str) -> Result<()> {
        self.call(
            "Page.addScriptToEvaluateOnNewDocument",
            json!({ "source": source }),
        )
        .await?;
        Ok(())
    }

    pub async fn set_user_agent(&self, user_agent: &str, accept_language: &str, platform: &str) -> Result<()> {
        self.call(
            "Network.setUserAgentOverride",
            json!({
                "userAgent": user_agent,
                "acceptLanguage": accept_language,
                "platform": platform,
            }),
        )
        .await?;
        Ok(())
    }

    pub async fn set_extra_headers(&self, headers: &[(&str, &str)]) -> Result<()> {
        let map: serde_json::Map<String, Value> = headers
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect();
        self.call("Network.setExtraHTTPHeaders", json!({ "headers": map }))
            .await?;
        Ok(())
    }

    pub async fn set_viewport(&self, width: u32, height: u32) -> Result<()> {
        self.call(
            "Emulation.setDeviceMetricsOverride",
            json!({
                "width": width,
                "height": height,
                "deviceScaleFactor": 1,
                "mobile": false,
            }),
        )
        .await?;
        Ok(())
    }

    pub async fn set_locale(&self, locale: &str) -> Result<()> {
        self.call("Emulation.setLocaleOverride", json!({ "locale": locale }))
            .await?;
        Ok(())
    }

    /// Fail every request of the given resource types before it is sent.
    ///
    /// Interception runs on a background task that lives as long as the page.
    pub async fn block_resource_types(&mut self, types: &[ResourceType]) -> Result<()> {
        if types.is_empty() {
            return Ok(());
        }

        let patterns: Vec<Value> = types
            .iter()
            .map(|t| json!({ "urlPattern": "*", "resourceType": t.as_str(), "requestStage": "Request" }))
            .collect();

        let mut events = self.conn.subscribe();
        self.call("Fetch.enable", json!({ "patterns": patterns })).await?;

        let conn = self.conn.clone();
        let session_id = self.session_id.clone();
        let task = tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "cdp: interceptor lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                if event.method != "Fetch.requestPaused"
                    || event.session_id.as_deref() != Some(session_id.as_str())
                {
                    continue;
                }
                let Some(request_id) = event.params["requestId"].as_str() else {
                    continue;
                };
                trace!(request_id, "cdp: blocking request");
                let _ = conn
                    .call(
                        "Fetch.failRequest",
                        json!({ "requestId": request_id, "errorReason": "BlockedByClient" }),
                        Some(&session_id),
                    )
                    .await;
            }
        });

        if let Some(old) = self.interceptor.replace(task) {
            old.abort();
        }
        Ok(())
    }

    /// Navigate and wait until `wait` is reached, bounded by `timeout`.
    pub async fn navigate(&self, url: &str, wait: WaitUntil, timeout: Duration) -> Result<()> {
        let mut events = self.conn.subscribe();

        let flow = async {
            let result = self.call("Page.navigate", json!({ "url": url })).await?;
            if let Some(error_text) = result["errorText"].as_str() {
                return Err(CdpError::Navigation(format!("{url}: {error_text}")));
            }

            let Some(expected) = wait.event() else {
                return Ok(());
            };
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if event.method == expected
                            && event.session_id.as_deref() == Some(self.session_id.as_str())
                        {
                            return Ok(());
                        }
                    }
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => return Err(CdpError::ConnectionClosed),
                }
            }
        };

        match tokio::time::timeout(timeout, flow).await {
            Ok(result) => result,
            Err(_) => Err(CdpError::Timeout(format!(
                "navigation to {url} did not reach {wait:?} within {}s",
                timeout.as_secs()
            ))),
        }
    }

    /// Evaluate an expression in the page and return its JSON value.
    /// Promises are awaited.
    pub async fn evaluate(&self, expression: &str) -> Result<Value> {
        let result = self
            .call(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;

        if let Some(details) = result.get("exceptionDetails") {
            let message = details["exception"]["description"]
                .as_str()
                .or_else(|| details["text"].as_str())
                .unwrap_or("unknown exception");
            return Err(CdpError::Evaluation(message.to_string()));
        }

        Ok(result["result"]["value"].clone())
    }

    /// Poll `expression` until it evaluates truthy.
    ///
    /// Evaluation errors while polling (for example a context torn down by a
    /// client-side redirect) count as "not yet".
    pub async fn wait_for_function(&self, expression: &str, timeout: Duration, poll: Duration) -> Result<()> {
        let started = Instant::now();
        loop {
            match self.evaluate(expression).await {
                Ok(value) if is_truthy(&value) => return Ok(()),
                Ok(_) => {}
                Err(e) => debug!(error = %e, "cdp: wait_for_function evaluation failed"),
            }
            if started.elapsed() >= timeout {
                return Err(CdpError::Timeout(format!(
                    "condition not met within {}s",
                    timeout.as_secs()
                )));
            }
            tokio::time::sleep(poll).await;
        }
    }

    pub async fn close(self) -> Result<()> {
        self.conn
            .call(
                "Target.closeTarget",
                json!({ "targetId": self.target_id }),
                None,
            )
            .await?;
        Ok(())
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_follows_javascript() {
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!(3)));
        assert!(is_truthy(&json!("x")));
        assert!(is_truthy(&json!([])));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&Value::Null));
    }

    #[test]
    fn readiness_events() {
        assert_eq!(WaitUntil::Commit.event(), None);
        assert_eq!(
            WaitUntil::DomContentLoaded.event(),
            Some("Page.domContentEventFired")
        );
        assert_eq!(WaitUntil::Load.event(), Some("Page.loadEventFired"));
    }
}

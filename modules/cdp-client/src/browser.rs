// Chrome process lifecycle and isolated browser contexts.

use std::process::Stdio;
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tracing::{debug, info, trace, warn};

use crate::connection::Connection;
use crate::error::{CdpError, Result};
use crate::page::Page;

const DEVTOOLS_BANNER: &str = "DevTools listening on ";
const CLOSE_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub chrome_bin: String,
    pub headless: bool,
    /// Extra command-line switches, appended after the defaults.
    pub args: Vec<String>,
    pub launch_timeout: Duration,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            chrome_bin: "chromium".to_string(),
            headless: true,
            args: Vec::new(),
            launch_timeout: Duration::from_secs(30),
        }
    }
}

/// A running Chrome process with a DevTools connection to its browser target.
/// The process is killed when the value is dropped; prefer [`Browser::close`].
pub struct Browser {
    child: Child,
    conn: Connection,
    _profile_dir: TempDir,
}

impl Browser {
    pub async fn launch(opts: &LaunchOptions) -> Result<Self> {
        let profile_dir = tempfile::tempdir()?;

        let mut cmd = Command::new(&opts.chrome_bin);
        if opts.headless {
            cmd.arg("--headless=new");
        }
        cmd.args([
            "--remote-debugging-port=0",
            "--no-first-run",
            "--no-default-browser-check",
            "--disable-gpu",
        ])
        .arg(format!("--user-data-dir={}", profile_dir.path().display()))
        .args(&opts.args)
        .arg("about:blank")
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| CdpError::Launch(format!("{}: {e}", opts.chrome_bin)))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| CdpError::Launch("stderr not captured".into()))?;

        let ws_url = match tokio::time::timeout(opts.launch_timeout, wait_for_ws_url(stderr)).await {
            Ok(found) => found?,
            Err(_) => {
                let _ = child.kill().await;
                return Err(CdpError::Timeout(format!(
                    "no DevTools endpoint after {}s",
                    opts.launch_timeout.as_secs()
                )));
            }
        };

        let conn = match Connection::connect(&ws_url).await {
            Ok(conn) => conn,
            Err(e) => {
                let _ = child.kill().await;
                return Err(e);
            }
        };

        info!(pid = child.id(), "cdp: browser launched");

        Ok(Self {
            child,
            conn,
            _profile_dir: profile_dir,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Create an isolated context (separate cookies, cache and storage).
    pub async fn new_context(&self) -> Result<BrowserContext> {
        let result = self
            .conn
            .call("Target.createBrowserContext", json!({ "disposeOnDetach": true }), None)
            .await?;
        let id = result["browserContextId"]
            .as_str()
            .ok_or_else(|| CdpError::UnexpectedResponse("missing browserContextId".into()))?
            .to_string();

        Ok(BrowserContext {
            id,
            conn: self.conn.clone(),
        })
    }

    /// Ask Chrome to exit, killing it if it has not gone within a grace period.
    pub async fn close(mut self) -> Result<()> {
        if let Err(e) = self.conn.call("Browser.close", json!({}), None).await {
            debug!(error = %e, "cdp: Browser.close failed");
        }
        match tokio::time::timeout(CLOSE_GRACE, self.child.wait()).await {
            Ok(status) => {
                debug!(status = ?status.ok(), "cdp: browser exited");
            }
            Err(_) => {
                warn!("cdp: browser ignored close, killing");
                self.child.kill().await?;
            }
        }
        Ok(())
    }
}

pub struct BrowserContext {
    id: String,
    conn: Connection,
}

impl BrowserContext {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Open a blank page in this context and attach a flattened session to it.
    pub async fn new_page(&self) -> Result<Page> {
        let created = self
            .conn
            .call(
                "Target.createTarget",
                json!({ "url": "about:blank", "browserContextId": self.id }),
                None,
            )
            .await?;
        let target_id = created["targetId"]
            .as_str()
            .ok_or_else(|| CdpError::UnexpectedResponse("missing targetId".into()))?
            .to_string();

        let attached = self
            .conn
            .call(
                "Target.attachToTarget",
                json!({ "targetId": target_id, "flatten": true }),
                None,
            )
            .await?;
        let session_id = attached["sessionId"]
            .as_str()
            .ok_or_else(|| CdpError::UnexpectedResponse("missing sessionId".into()))?
            .to_string();

        Ok(Page::new(self.conn.clone(), target_id, session_id))
    }

    pub async fn dispose(self) -> Result<()> {
        self.conn
            .call(
                "Target.disposeBrowserContext",
                json!({ "browserContextId": self.id }),
                None,
            )
            .await?;
        Ok(())
    }
}

async fn wait_for_ws_url(stderr: ChildStderr) -> Result<String> {
    let mut lines = BufReader::new(stderr).lines();
    while let Some(line) = lines.next_line().await? {
        if let Some(url) = parse_devtools_banner(&line) {
            // Keep draining so a chatty browser never blocks on a full pipe.
            tokio::spawn(async move {
                while let Ok(Some(line)) = lines.next_line().await {
                    trace!(line = line.as_str(), "chrome stderr");
                }
            });
            return Ok(url);
        }
        trace!(line = line.as_str(), "chrome stderr");
    }
    Err(CdpError::Launch(
        "browser exited before printing its DevTools endpoint".into(),
    ))
}

fn parse_devtools_banner(line: &str) -> Option<String> {
    let idx = line.find(DEVTOOLS_BANNER)?;
    let url = line[idx + DEVTOOLS_BANNER.len()..].trim();
    url.starts_with("ws://").then(|| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_devtools_banner() {
        let line = "DevTools listening on ws://127.0.0.1:40123/devtools/browser/8c1f-4a";
        assert_eq!(
            parse_devtools_banner(line).as_deref(),
            Some("ws://127.0.0.1:40123/devtools/browser/8c1f-4a")
        );
    }

    #[test]
    fn ignores_other_stderr_lines() {
        assert!(parse_devtools_banner("[0101/000000.000:ERROR:gpu_init.cc] failed").is_none());
        assert!(parse_devtools_banner("DevTools listening on http://nope").is_none());
    }
}

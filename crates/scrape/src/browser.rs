use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fantoccini::elements::Element;
use fantoccini::{Client, ClientBuilder, Locator};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::ScrapeError;
use crate::onclick::DownloadRequest;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    pub webdriver_url: String,
    pub user_agent: String,
    pub navigation_timeout_secs: u64,
    pub download_timeout_secs: u64,
    pub headless: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:4444".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
                .to_string(),
            navigation_timeout_secs: 30,
            download_timeout_secs: 60,
            headless: true,
        }
    }
}

impl BrowserConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("WEBDRIVER_URL") {
            config.webdriver_url = url;
        }
        config
    }
}

/// One WebDriver session against a single portal. Navigation commands
/// return only once the document is interactive, within the navigation
/// timeout; downloads go through a cookie-sharing HTTP client.
pub struct BrowserHarness {
    client: Client,
    http: reqwest::Client,
    config: BrowserConfig,
}

impl BrowserHarness {
    pub async fn connect(config: BrowserConfig) -> Result<Self, ScrapeError> {
        let mut args = vec![
            "--disable-gpu".to_string(),
            "--no-sandbox".to_string(),
            "--window-size=1920,1080".to_string(),
            format!("--user-agent={}", config.user_agent),
        ];
        if config.headless {
            args.push("--headless=new".to_string());
        }
        let mut caps = serde_json::map::Map::new();
        caps.insert(
            "goog:chromeOptions".to_string(),
            serde_json::json!({ "args": args }),
        );

        let client = ClientBuilder::native()
            .capabilities(caps)
            .connect(&config.webdriver_url)
            .await?;
        info!(webdriver = %config.webdriver_url, "browser session opened");

        Ok(Self {
            client,
            http: reqwest::Client::new(),
            config,
        })
    }

    /// Navigates and blocks until the document is at least interactive.
    pub async fn open(&self, url: &str) -> Result<(), ScrapeError> {
        debug!(url, "navigating");
        self.with_timeout("navigate", self.client.goto(url)).await?;
        self.wait_ready().await
    }

    pub async fn wait_ready(&self) -> Result<(), ScrapeError> {
        let deadline = Instant::now() + Duration::from_secs(self.config.navigation_timeout_secs);
        loop {
            let state = self
                .with_timeout(
                    "readyState",
                    self.client.execute("return document.readyState", Vec::new()),
                )
                .await?;
            if matches!(state.as_str(), Some("interactive") | Some("complete")) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(ScrapeError::Timeout {
                    operation: "document ready".to_string(),
                    secs: self.config.navigation_timeout_secs,
                });
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    }

    pub async fn current_url(&self) -> Result<String, ScrapeError> {
        let url = self.with_timeout("current url", self.client.current_url()).await?;
        Ok(url.to_string())
    }

    pub async fn find(&self, selector: &str) -> Result<Element, ScrapeError> {
        match self
            .with_timeout("find", self.client.find(Locator::Css(selector)))
            .await
        {
            Ok(element) => Ok(element),
            Err(ScrapeError::WebDriver(e)) if e.is_no_such_element() => Err(ScrapeError::MissingElement {
                selector: selector.to_string(),
            }),
            Err(e) => Err(e),
        }
    }

    pub async fn query_all(&self, selector: &str) -> Result<Vec<Element>, ScrapeError> {
        self.with_timeout("query", self.client.find_all(Locator::Css(selector)))
            .await
    }

    pub async fn click(&self, selector: &str) -> Result<(), ScrapeError> {
        let element = self.find(selector).await?;
        self.with_timeout("click", element.click()).await
    }

    /// Evaluates a portal JS handler in the page. The post-condition is the
    /// handler's own: either the page navigates (follow with `wait_ready`)
    /// or a download becomes fetchable via `expect_download`.
    pub async fn invoke(&self, js: &str) -> Result<serde_json::Value, ScrapeError> {
        let script = js.trim().trim_start_matches("javascript:");
        self.with_timeout("invoke", self.client.execute(script, Vec::new()))
            .await
    }

    /// Polls for `selector` until it appears or `timeout` elapses.
    pub async fn wait_for(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Element, ScrapeError> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.client.find(Locator::Css(selector)).await {
                Ok(element) => return Ok(element),
                Err(e) if e.is_no_such_element() => {
                    if Instant::now() >= deadline {
                        return Err(ScrapeError::Timeout {
                            operation: format!("wait for {selector}"),
                            secs: timeout.as_secs(),
                        });
                    }
                    tokio::time::sleep(Duration::from_millis(200)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub async fn text_of(&self, selector: &str) -> Result<String, ScrapeError> {
        let element = self.find(selector).await?;
        self.with_timeout("text", element.text()).await
    }

    pub async fn attr_of(
        &self,
        selector: &str,
        attribute: &str,
    ) -> Result<Option<String>, ScrapeError> {
        let element = self.find(selector).await?;
        self.with_timeout("attr", element.attr(attribute)).await
    }

    /// Opens a new tab and switches the session to it.
    pub async fn new_tab(&self) -> Result<(), ScrapeError> {
        let window = self.with_timeout("new tab", self.client.new_window(true)).await?;
        self.with_timeout("switch tab", self.client.switch_to_window(window.handle))
            .await
    }

    /// Resolves a download request to a saved file, or fails. The session
    /// cookies ride along so authenticated attachments resolve too; the
    /// body streams to disk under the download timeout.
    pub async fn expect_download(
        &self,
        request: &DownloadRequest,
        dest_dir: &Path,
    ) -> Result<PathBuf, ScrapeError> {
        let cookie_header = self.cookie_header().await?;
        let mut response = self
            .http
            .get(&request.url)
            .header(reqwest::header::COOKIE, cookie_header)
            .header(reqwest::header::USER_AGENT, &self.config.user_agent)
            .timeout(Duration::from_secs(self.config.download_timeout_secs))
            .send()
            .await
            .map_err(|e| ScrapeError::Download {
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(ScrapeError::Download {
                reason: format!("status {} for {}", response.status(), request.url),
            });
        }

        let file_name = request
            .file_name
            .clone()
            .or_else(|| file_name_from_disposition(response.headers()))
            .or_else(|| file_name_from_url(&request.url))
            .unwrap_or_else(|| "attachment.bin".to_string());
        let dest = dest_dir.join(sanitize_file_name(&file_name));

        let mut file = tokio::fs::File::create(&dest).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(|e| ScrapeError::Download {
            reason: e.to_string(),
        })? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        if written == 0 {
            let _ = tokio::fs::remove_file(&dest).await;
            return Err(ScrapeError::Download {
                reason: format!("empty body for {}", request.url),
            });
        }
        info!(file = %dest.display(), bytes = written, "attachment downloaded");
        Ok(dest)
    }

    pub async fn close(&self) -> Result<(), ScrapeError> {
        self.client.clone().close().await?;
        Ok(())
    }

    async fn cookie_header(&self) -> Result<String, ScrapeError> {
        let cookies = self
            .with_timeout("cookies", self.client.get_all_cookies())
            .await?;
        let header = cookies
            .iter()
            .map(|c| format!("{}={}", c.name(), c.value()))
            .collect::<Vec<_>>()
            .join("; ");
        Ok(header)
    }

    async fn with_timeout<T, F>(&self, operation: &str, fut: F) -> Result<T, ScrapeError>
    where
        F: Future<Output = Result<T, fantoccini::error::CmdError>>,
    {
        let secs = self.config.navigation_timeout_secs;
        match tokio::time::timeout(Duration::from_secs(secs), fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(ScrapeError::Timeout {
                operation: operation.to_string(),
                secs,
            }),
        }
    }
}

fn file_name_from_disposition(headers: &reqwest::header::HeaderMap) -> Option<String> {
    let raw = headers
        .get(reqwest::header::CONTENT_DISPOSITION)?
        .to_str()
        .ok()?;
    let re = Regex::new(r#"filename\*?="?([^";]+)"?"#).unwrap();
    let caps = re.captures(raw)?;
    let name = caps[1].trim().trim_start_matches("UTF-8''").to_string();
    if name.is_empty() { None } else { Some(name) }
}

fn file_name_from_url(raw: &str) -> Option<String> {
    let url = url::Url::parse(raw).ok()?;
    let segment = url.path_segments()?.filter(|s| !s.is_empty()).next_back()?;
    if segment.contains('.') {
        Some(segment.to_string())
    } else {
        None
    }
}

/// Keeps the name usable as a single path component.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        "attachment.bin".to_string()
    } else {
        trimmed.to_string()
    }
}

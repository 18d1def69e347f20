use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::config::ScraperConfig;
use crate::error::{Error, Result};

/// Frame carrying the interstitial advertisement, when one is showing.
const AD_FRAME_SELECTOR: &str = "iframe[title='Advertisement']";
/// Dismiss control inside that frame.
const AD_DISMISS_SELECTOR: &str = "div#dismiss-button";
/// Readiness condition: the document root has been attached.
const READY_SELECTOR: &str = "body";
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// A loaded page: the DOM snapshot plus the URL the browser actually ended
/// up on, which may differ from the requested one after redirects.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub html: String,
    pub url: String,
}

/// The capability set the pipeline needs from a browser. Extraction works
/// on the HTML snapshot and never sees this, so everything below the trait
/// can be swapped for a fixture-backed session in tests.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<()>;
    /// True when at least one element matches in the current lookup context.
    async fn exists(&self, selector: &str) -> bool;
    async fn click(&self, selector: &str) -> Result<()>;
    /// Switch the lookup context into an embedded frame. Every successful
    /// call must be paired with `exit_frame`.
    async fn enter_frame(&self, selector: &str) -> Result<()>;
    /// Restore the top-level lookup context. Always succeeds.
    async fn exit_frame(&self);
    async fn content(&self) -> Result<String>;
    async fn current_url(&self) -> Option<String>;
    async fn close(&mut self);
}

/// Loads pages through a [`BrowserSession`] with a two-phase wait and ad
/// dismissal, producing [`RenderedDocument`]s for the extractors.
pub struct PageFetcher<S: BrowserSession> {
    session: S,
    config: ScraperConfig,
}

impl<S: BrowserSession> PageFetcher<S> {
    pub fn new(session: S, config: ScraperConfig) -> Self {
        Self { session, config }
    }

    /// Navigate to `url` and return the rendered DOM once the page has
    /// settled. Readiness of the document root does not guarantee readiness
    /// of dynamically injected content, so a fixed settle delay follows the
    /// explicit wait.
    pub async fn load(&self, url: &str) -> Result<RenderedDocument> {
        self.session.navigate(url).await?;
        self.wait_ready(url).await?;
        sleep(self.config.settle_delay).await;
        self.dismiss_ad().await;

        let html = self.session.content().await?;
        let resolved = self
            .session
            .current_url()
            .await
            .unwrap_or_else(|| url.to_string());
        Ok(RenderedDocument {
            html,
            url: resolved,
        })
    }

    async fn wait_ready(&self, url: &str) -> Result<()> {
        let deadline = Instant::now() + self.config.load_timeout;
        loop {
            if self.session.exists(READY_SELECTOR).await {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(Error::LoadTimeout {
                    url: url.to_string(),
                    timeout: self.config.load_timeout,
                });
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Dismiss the interstitial ad if one is showing. Once the frame has
    /// been entered, the outer context is restored on every path; no early
    /// return sits between enter and exit.
    async fn dismiss_ad(&self) {
        if !self.session.exists(AD_FRAME_SELECTOR).await {
            return;
        }
        if let Err(e) = self.session.enter_frame(AD_FRAME_SELECTOR).await {
            warn!("could not enter ad frame: {e}");
            return;
        }
        let clicked = match self.session.click(AD_DISMISS_SELECTOR).await {
            Ok(()) => true,
            Err(e) => {
                debug!("no dismiss control in ad frame: {e}");
                false
            }
        };
        self.session.exit_frame().await;
        if clicked {
            sleep(self.config.ad_dismiss_delay).await;
        }
    }

    /// Tear down the underlying browser session.
    pub async fn shutdown(mut self) {
        self.session.close().await;
    }
}

/// Chromium-backed session via chromiumoxide. CDP has no WebDriver-style
/// frame context, so an entered frame is emulated: lookups go through the
/// frame element's contentDocument instead.
pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    events: JoinHandle<()>,
    frame: Mutex<Option<String>>,
}

impl ChromiumSession {
    /// Launch a headless browser and open the single page this session
    /// drives for its whole lifetime.
    pub async fn launch(config: &ScraperConfig) -> Result<Self> {
        let browser_config = BrowserConfig::builder()
            .no_sandbox()
            .window_size(1920, 1080)
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .request_timeout(Duration::from_secs(30))
            .build()
            .map_err(Error::Session)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(session_err)?;
        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(session_err)?;
        page.set_user_agent(config.user_agent.as_str())
            .await
            .map_err(session_err)?;

        Ok(Self {
            browser,
            page,
            events,
            frame: Mutex::new(None),
        })
    }

    async fn current_frame(&self) -> Option<String> {
        self.frame.lock().await.clone()
    }

    /// Query (and optionally click) a selector inside an embedded frame via
    /// its contentDocument. Returns whether the element was found.
    async fn frame_query(&self, frame: &str, selector: &str, click: bool) -> Result<bool> {
        let frame_js = serde_json::to_string(frame).map_err(session_err)?;
        let selector_js = serde_json::to_string(selector).map_err(session_err)?;
        let script = format!(
            r#"(() => {{
                const frame = document.querySelector({frame_js});
                const doc = frame && frame.contentDocument;
                const el = doc && doc.querySelector({selector_js});
                if (!el) return false;
                if ({click}) el.click();
                return true;
            }})()"#
        );
        let found: bool = self
            .page
            .evaluate(script)
            .await
            .map_err(session_err)?
            .into_value()
            .unwrap_or(false);
        Ok(found)
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.page.goto(url).await.map_err(session_err)?;
        Ok(())
    }

    async fn exists(&self, selector: &str) -> bool {
        match self.current_frame().await {
            None => self.page.find_element(selector).await.is_ok(),
            Some(frame) => self
                .frame_query(&frame, selector, false)
                .await
                .unwrap_or(false),
        }
    }

    async fn click(&self, selector: &str) -> Result<()> {
        match self.current_frame().await {
            None => {
                let element = self
                    .page
                    .find_element(selector)
                    .await
                    .map_err(|_| Error::ElementNotFound(selector.to_string()))?;
                element.click().await.map_err(session_err)?;
                Ok(())
            }
            Some(frame) => {
                if self.frame_query(&frame, selector, true).await? {
                    Ok(())
                } else {
                    Err(Error::ElementNotFound(selector.to_string()))
                }
            }
        }
    }

    async fn enter_frame(&self, selector: &str) -> Result<()> {
        self.page
            .find_element(selector)
            .await
            .map_err(|_| Error::ElementNotFound(selector.to_string()))?;
        *self.frame.lock().await = Some(selector.to_string());
        Ok(())
    }

    async fn exit_frame(&self) {
        *self.frame.lock().await = None;
    }

    async fn content(&self) -> Result<String> {
        self.page.content().await.map_err(session_err)
    }

    async fn current_url(&self) -> Option<String> {
        self.page.url().await.ok().flatten()
    }

    async fn close(&mut self) {
        if let Err(e) = self.browser.close().await {
            debug!("browser close: {e}");
        }
        if let Err(e) = self.browser.wait().await {
            debug!("browser wait: {e}");
        }
        self.events.abort();
    }
}

fn session_err(e: impl fmt::Display) -> Error {
    Error::Session(e.to_string())
}

// ── Tests ──

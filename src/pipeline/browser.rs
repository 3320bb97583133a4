//! Headless-browser seam: the operations the render procedure needs.
//!
//! The render pipeline only talks to these traits. [`ChromiumLauncher`]
//! implements them over the Chrome DevTools Protocol via `chromiumoxide`;
//! each `launch` starts a private Chrome process, so two workers never share
//! a browser, a page, or a cookie jar.
//!
//! Timeouts are not handled here. The caller wraps each navigation in its own
//! deadline (see [`crate::pipeline::render`]).

use crate::config::RenderSettings;
use crate::error::{BookError, RenderError};
use crate::pipeline::style::{PdfOptions, ViewportSize};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::emulation::SetEmulatedMediaParams;
use chromiumoxide::cdp::browser_protocol::page::{
    EventDomContentEventFired, EventLoadEventFired, NavigateParams, PrintToPdfParams, ReloadParams,
};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Lifecycle event a navigation waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    /// `load`: every subresource finished.
    Load,
    /// `DOMContentLoaded`: the document is parsed; subresources may be pending.
    DomContentLoaded,
}

impl std::fmt::Display for WaitUntil {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WaitUntil::Load => f.write_str("load"),
            WaitUntil::DomContentLoaded => f.write_str("domcontentloaded"),
        }
    }
}

/// Starts one isolated browser instance per call.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, viewport: ViewportSize) -> Result<Box<dyn BrowserSession>, BookError>;
}

/// A running browser owned by exactly one worker.
#[async_trait]
pub trait BrowserSession: Send {
    /// Open a fresh page.
    async fn new_tab(&mut self) -> Result<Box<dyn BrowserTab>, RenderError>;

    /// Close the browser and reap its process.
    async fn shutdown(self: Box<Self>);
}

/// One page inside a [`BrowserSession`].
#[async_trait]
pub trait BrowserTab: Send {
    async fn navigate(&mut self, url: &str, wait: WaitUntil) -> Result<(), RenderError>;

    async fn reload(&mut self, wait: WaitUntil) -> Result<(), RenderError>;

    /// Apply `screen` media rules instead of `print` ones.
    async fn emulate_screen_media(&mut self) -> Result<(), RenderError>;

    async fn inject_style(&mut self, css: &str) -> Result<(), RenderError>;

    /// `Page.printToPDF`, returning the PDF bytes.
    async fn print_pdf(&mut self, options: &PdfOptions) -> Result<Vec<u8>, RenderError>;

    async fn close(self: Box<Self>) -> Result<(), RenderError>;
}

// ── chromiumoxide implementation ─────────────────────────────────────────

/// CDP command timeout; longer than the slowest navigation stage.
const CDP_REQUEST_TIMEOUT: Duration = Duration::from_secs(150);

/// Launches local Chrome/Chromium through `chromiumoxide`.
#[derive(Debug, Clone, Default)]
pub struct ChromiumLauncher {
    executable: Option<PathBuf>,
    headful: bool,
}

impl ChromiumLauncher {
    pub fn new(executable: Option<PathBuf>, headful: bool) -> Self {
        Self {
            executable,
            headful,
        }
    }

    pub fn from_settings(settings: &RenderSettings) -> Self {
        Self::new(settings.chrome_executable.clone(), settings.headful)
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self, viewport: ViewportSize) -> Result<Box<dyn BrowserSession>, BookError> {
        let mut builder = BrowserConfig::builder()
            .window_size(viewport.width, viewport.height)
            .viewport(Viewport {
                width: viewport.width,
                height: viewport.height,
                device_scale_factor: None,
                emulating_mobile: false,
                is_landscape: false,
                has_touch: false,
            })
            .request_timeout(CDP_REQUEST_TIMEOUT);
        if self.headful {
            builder = builder.with_head();
        }
        if let Some(ref exe) = self.executable {
            builder = builder.chrome_executable(exe);
        }
        let config = builder.build().map_err(BookError::BrowserLaunchFailed)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BookError::BrowserLaunchFailed(e.to_string()))?;

        // The handler drives the CDP connection and must be polled for the
        // browser to make progress.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler error: {}", e);
                }
            }
        });

        debug!(
            "Chrome launched with viewport {}x{}",
            viewport.width, viewport.height
        );
        Ok(Box::new(ChromiumSession {
            browser,
            handler_task,
        }))
    }
}

struct ChromiumSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn new_tab(&mut self) -> Result<Box<dyn BrowserTab>, RenderError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| RenderError::Browser(format!("new page: {e}")))?;
        Ok(Box::new(ChromiumTab { page }))
    }

    async fn shutdown(self: Box<Self>) {
        let mut this = *self;
        if let Err(e) = this.browser.close().await {
            debug!("Browser close failed: {}", e);
        }
        if let Err(e) = this.browser.wait().await {
            debug!("Browser wait failed: {}", e);
        }
        this.handler_task.abort();
    }
}

enum NavAction<'a> {
    Goto(&'a str),
    Reload,
}

struct ChromiumTab {
    page: Page,
}

impl ChromiumTab {
    /// Subscribe to the lifecycle event first, then trigger, then wait.
    async fn run(&mut self, action: NavAction<'_>, wait: WaitUntil) -> Result<(), RenderError> {
        let closed = || RenderError::Browser(format!("page closed before {wait} fired"));
        match wait {
            WaitUntil::Load => {
                let mut events = self
                    .page
                    .event_listener::<EventLoadEventFired>()
                    .await
                    .map_err(|e| RenderError::Browser(e.to_string()))?;
                self.trigger(action, wait).await?;
                events.next().await.ok_or_else(closed)?;
            }
            WaitUntil::DomContentLoaded => {
                let mut events = self
                    .page
                    .event_listener::<EventDomContentEventFired>()
                    .await
                    .map_err(|e| RenderError::Browser(e.to_string()))?;
                self.trigger(action, wait).await?;
                events.next().await.ok_or_else(closed)?;
            }
        }
        Ok(())
    }

    async fn trigger(&self, action: NavAction<'_>, wait: WaitUntil) -> Result<(), RenderError> {
        match (action, wait) {
            // `Page.navigate` only answers once the frame reaches `load`, so a
            // DOM-ready navigation is started from inside the page instead.
            (NavAction::Goto(url), WaitUntil::DomContentLoaded) => {
                self.page
                    .evaluate(dom_ready_navigation_script(url))
                    .await
                    .map_err(|e| RenderError::Browser(format!("navigate: {e}")))?;
            }
            (NavAction::Goto(url), WaitUntil::Load) => {
                let response = self
                    .page
                    .execute(NavigateParams::new(url))
                    .await
                    .map_err(|e| RenderError::Browser(e.to_string()))?;
                if let Some(ref err) = response.result.error_text {
                    return Err(RenderError::Browser(err.clone()));
                }
            }
            (NavAction::Reload, _) => {
                self.page
                    .execute(ReloadParams::default())
                    .await
                    .map_err(|e| RenderError::Browser(e.to_string()))?;
            }
        }
        Ok(())
    }
}

/// Script that starts a navigation to `url` and returns immediately.
pub fn dom_ready_navigation_script(url: &str) -> String {
    let literal = serde_json::Value::String(url.to_string()).to_string();
    format!("void (window.location.href = {literal})")
}

#[async_trait]
impl BrowserTab for ChromiumTab {
    async fn navigate(&mut self, url: &str, wait: WaitUntil) -> Result<(), RenderError> {
        self.run(NavAction::Goto(url), wait).await
    }

    async fn reload(&mut self, wait: WaitUntil) -> Result<(), RenderError> {
        self.run(NavAction::Reload, wait).await
    }

    async fn emulate_screen_media(&mut self) -> Result<(), RenderError> {
        self.page
            .execute(SetEmulatedMediaParams::builder().media("screen").build())
            .await
            .map_err(|e| RenderError::Browser(format!("emulate media: {e}")))?;
        Ok(())
    }

    async fn inject_style(&mut self, css: &str) -> Result<(), RenderError> {
        let script = crate::pipeline::style::style_injection_script(css);
        self.page
            .evaluate(script)
            .await
            .map_err(|e| RenderError::StyleInjection(e.to_string()))?;
        Ok(())
    }

    async fn print_pdf(&mut self, options: &PdfOptions) -> Result<Vec<u8>, RenderError> {
        let params = PrintToPdfParams {
            print_background: Some(options.print_background),
            scale: Some(options.scale),
            paper_width: Some(options.paper_width_in),
            paper_height: Some(options.paper_height_in),
            margin_top: Some(options.margin_top_in),
            margin_bottom: Some(options.margin_bottom_in),
            margin_left: Some(options.margin_left_in),
            margin_right: Some(options.margin_right_in),
            prefer_css_page_size: Some(false),
            ..Default::default()
        };
        self.page
            .pdf(params)
            .await
            .map_err(|e| RenderError::PdfExport(e.to_string()))
    }

    async fn close(self: Box<Self>) -> Result<(), RenderError> {
        self.page
            .close()
            .await
            .map_err(|e| RenderError::Browser(format!("close page: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_until_display() {
        assert_eq!(WaitUntil::Load.to_string(), "load");
        assert_eq!(WaitUntil::DomContentLoaded.to_string(), "domcontentloaded");
    }

    #[test]
    fn launcher_from_settings() {
        let settings = RenderSettings {
            chrome_executable: Some(PathBuf::from("/usr/bin/chromium")),
            headful: true,
            ..RenderSettings::default()
        };
        let launcher = ChromiumLauncher::from_settings(&settings);
        assert_eq!(launcher.executable, Some(PathBuf::from("/usr/bin/chromium")));
        assert!(launcher.headful);
    }

    #[test]
    fn dom_ready_navigation_quotes_url() {
        assert_eq!(
            dom_ready_navigation_script("https://spaces.ac.cn/archives/10001"),
            r#"void (window.location.href = "https://spaces.ac.cn/archives/10001")"#
        );
        let script = dom_ready_navigation_script(r#"https://x/a"b\c"#);
        assert_eq!(script, r#"void (window.location.href = "https://x/a\"b\\c")"#);
    }
}

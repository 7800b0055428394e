//! chromiumoxide-backed implementation of the page ports.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams,
    DispatchMouseEventType, InsertTextParams, MouseButton,
};
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, NavigateParams};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use stepwright_core_types::{ElementRef, Point, Viewport};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::scripts::{self, ScriptReply};
use crate::{
    metrics, AdapterError, AdapterErrorKind, AnchorDescriptor, CdpConfig, ClickMode, ElementInfo,
    Key, PageDriver, PageQuery,
};

/// A launched browser plus the task pumping its protocol handler.
pub struct ChromiumSession {
    browser: Browser,
    handler: JoinHandle<()>,
    config: CdpConfig,
}

impl ChromiumSession {
    pub async fn launch(config: CdpConfig) -> Result<Self, AdapterError> {
        let mut builder = BrowserConfig::builder()
            .user_data_dir(&config.user_data_dir)
            .window_size(config.window_width, config.window_height)
            .request_timeout(Duration::from_millis(config.launch_timeout_ms));
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &config.executable {
            builder = builder.chrome_executable(executable);
        }
        let browser_config = builder
            .build()
            .map_err(|err| AdapterError::new(AdapterErrorKind::Launch).with_hint(err))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|err| AdapterError::new(AdapterErrorKind::Launch).with_hint(err.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(?err, "browser handler stopped");
                    break;
                }
            }
        });

        info!(headless = config.headless, "Chromium launched");
        Ok(Self {
            browser,
            handler,
            config,
        })
    }

    /// Opens a blank tab with downloads routed to the configured directory.
    pub async fn new_page(&self) -> Result<ChromiumPage, AdapterError> {
        tokio::fs::create_dir_all(&self.config.download_dir)
            .await
            .map_err(|err| AdapterError::internal(format!("download dir: {err}")))?;
        let download_dir = std::fs::canonicalize(&self.config.download_dir)
            .unwrap_or_else(|_| self.config.download_dir.clone());

        let page = self.browser.new_page("about:blank").await?;

        let behavior = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Allow)
            .download_path(download_dir.display().to_string())
            .build()
            .map_err(AdapterError::internal)?;
        if let Err(err) = self.browser.execute(behavior).await {
            warn!(%err, "could not route downloads; download checks will rely on page signals");
        }

        Ok(ChromiumPage::new(page, Some(download_dir)))
    }

    pub async fn close(mut self) -> Result<(), AdapterError> {
        self.browser.close().await?;
        let _ = self.browser.wait().await;
        self.handler.abort();
        Ok(())
    }
}

/// One Chromium tab.
pub struct ChromiumPage {
    page: Page,
    download_dir: Option<PathBuf>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawViewport {
    width: f64,
    height: f64,
    device_pixel_ratio: f64,
}

impl ChromiumPage {
    pub fn new(page: Page, download_dir: Option<PathBuf>) -> Self {
        Self { page, download_dir }
    }

    pub fn inner(&self) -> &Page {
        &self.page
    }

    async fn eval<T: DeserializeOwned>(
        &self,
        method: &'static str,
        expression: String,
    ) -> Result<T, AdapterError> {
        let started = Instant::now();
        let outcome = match self.page.evaluate(expression).await {
            Ok(result) => result
                .into_value::<T>()
                .map_err(|err| AdapterError::internal(format!("{method}: {err}"))),
            Err(err) => Err(AdapterError::from(err)),
        };
        metrics::record_command(method, started.elapsed(), outcome.is_ok());
        outcome
    }

    async fn on_element(
        &self,
        method: &'static str,
        element: &ElementRef,
        body: &str,
    ) -> Result<ScriptReply, AdapterError> {
        let reply: ScriptReply = self
            .eval(method, scripts::with_element(element, body))
            .await?;
        if !reply.ok {
            return Err(AdapterError::not_found(format!(
                "{}: {}",
                element,
                reply.error.unwrap_or_else(|| "element unavailable".into())
            )));
        }
        Ok(reply)
    }

    async fn mouse(
        &self,
        kind: DispatchMouseEventType,
        point: Point,
        click_count: i64,
    ) -> Result<(), AdapterError> {
        let started = Instant::now();
        let params = DispatchMouseEventParams::builder()
            .r#type(kind)
            .x(point.x)
            .y(point.y)
            .button(MouseButton::Left)
            .click_count(click_count)
            .build()
            .map_err(AdapterError::internal)?;
        let outcome = self.page.execute(params).await.map(|_| ()).map_err(AdapterError::from);
        metrics::record_command("Input.dispatchMouseEvent", started.elapsed(), outcome.is_ok());
        outcome
    }

    async fn mouse_click(&self, point: Point, click_count: i64) -> Result<(), AdapterError> {
        self.mouse(DispatchMouseEventType::MouseMoved, point, 0).await?;
        self.mouse(DispatchMouseEventType::MousePressed, point, click_count)
            .await?;
        tokio::time::sleep(Duration::from_millis(100)).await;
        self.mouse(DispatchMouseEventType::MouseReleased, point, click_count)
            .await
    }

    async fn scroll_and_locate(&self, element: &ElementRef) -> Result<(Point, bool), AdapterError> {
        let reply = self
            .on_element("DOM.scrollIntoView", element, scripts::SCROLL_AND_HIT_TEST)
            .await?;
        match (reply.x, reply.y) {
            (Some(x), Some(y)) => Ok((Point::new(x, y), reply.hit.unwrap_or(false))),
            _ => Err(AdapterError::internal("element geometry unavailable")),
        }
    }

    async fn key_event(&self, kind: DispatchKeyEventType, key: Key) -> Result<(), AdapterError> {
        let mut builder = DispatchKeyEventParams::builder()
            .r#type(kind.clone())
            .key(key.key())
            .code(key.code())
            .windows_virtual_key_code(key.key_code());
        if let (DispatchKeyEventType::KeyDown, Some(text)) = (kind, key.text()) {
            builder = builder.text(text);
        }
        let params = builder.build().map_err(AdapterError::internal)?;
        self.page.execute(params).await?;
        Ok(())
    }
}

#[async_trait]
impl PageQuery for ChromiumPage {
    async fn query(&self, anchor: &AnchorDescriptor) -> Result<Vec<ElementInfo>, AdapterError> {
        self.eval("DOM.query", scripts::query(&anchor.to_query_json()))
            .await
    }

    async fn element_at(&self, point: Point) -> Result<Option<ElementInfo>, AdapterError> {
        let reply: ScriptReply = self
            .eval("DOM.elementFromPoint", scripts::element_at(point))
            .await?;
        Ok(reply.element)
    }

    async fn parent_of(&self, element: &ElementRef) -> Result<Option<ElementInfo>, AdapterError> {
        let reply = self.on_element("DOM.parent", element, scripts::PARENT).await?;
        Ok(reply.element)
    }

    async fn viewport_metrics(&self) -> Result<Viewport, AdapterError> {
        let raw: RawViewport = self
            .eval("Runtime.viewport", scripts::VIEWPORT.to_string())
            .await?;
        Ok(Viewport::new(raw.width, raw.height, raw.device_pixel_ratio))
    }

    async fn url(&self) -> Result<String, AdapterError> {
        Ok(self.page.url().await?.unwrap_or_default())
    }

    async fn title(&self) -> Result<String, AdapterError> {
        Ok(self.page.get_title().await?.unwrap_or_default())
    }

    async fn capture_screenshot(&self, path: &Path) -> Result<(), AdapterError> {
        let started = Instant::now();
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        let outcome = self
            .page
            .save_screenshot(params, path)
            .await
            .map(|_| ())
            .map_err(AdapterError::from);
        metrics::record_command("Page.captureScreenshot", started.elapsed(), outcome.is_ok());
        outcome
    }
}

#[async_trait]
impl PageDriver for ChromiumPage {
    async fn click_element(
        &self,
        element: &ElementRef,
        mode: ClickMode,
    ) -> Result<(), AdapterError> {
        match mode {
            ClickMode::Script => {
                self.on_element("DOM.click", element, scripts::SCRIPT_CLICK)
                    .await?;
                Ok(())
            }
            ClickMode::Regular => {
                let (center, hit) = self.scroll_and_locate(element).await?;
                if !hit {
                    return Err(AdapterError::new(AdapterErrorKind::NotClickable)
                        .with_hint("another element would receive the click"));
                }
                self.mouse_click(center, 1).await
            }
            ClickMode::Force => {
                let (center, _) = self.scroll_and_locate(element).await?;
                self.mouse_click(center, 1).await
            }
        }
    }

    async fn click_at(&self, point: Point) -> Result<(), AdapterError> {
        self.mouse_click(point, 1).await
    }

    async fn script_click_at(&self, point: Point) -> Result<(), AdapterError> {
        let reply: ScriptReply = self
            .eval("DOM.clickAtPoint", scripts::script_click_at(point))
            .await?;
        if reply.ok {
            Ok(())
        } else {
            Err(AdapterError::not_found(
                reply.error.unwrap_or_else(|| "no element at point".into()),
            ))
        }
    }

    async fn hover(&self, element: &ElementRef) -> Result<(), AdapterError> {
        let (center, _) = self.scroll_and_locate(element).await?;
        self.mouse(DispatchMouseEventType::MouseMoved, center, 0)
            .await
    }

    async fn double_click(&self, element: &ElementRef) -> Result<(), AdapterError> {
        let (center, _) = self.scroll_and_locate(element).await?;
        self.mouse_click(center, 1).await?;
        self.mouse_click(center, 2).await
    }

    async fn dispatch_events(
        &self,
        element: &ElementRef,
        events: &[&str],
    ) -> Result<(), AdapterError> {
        self.on_element("DOM.dispatchEvents", element, &scripts::dispatch_events(events))
            .await?;
        Ok(())
    }

    async fn press_key(&self, key: Key) -> Result<(), AdapterError> {
        self.key_event(DispatchKeyEventType::KeyDown, key).await?;
        self.key_event(DispatchKeyEventType::KeyUp, key).await
    }

    async fn focus(&self, element: &ElementRef) -> Result<(), AdapterError> {
        self.on_element("DOM.focus", element, scripts::FOCUS).await?;
        Ok(())
    }

    async fn clear(&self, element: &ElementRef) -> Result<(), AdapterError> {
        self.on_element("DOM.clear", element, scripts::CLEAR).await?;
        Ok(())
    }

    async fn insert_text(&self, element: &ElementRef, text: &str) -> Result<(), AdapterError> {
        self.focus(element).await?;
        self.page.execute(InsertTextParams::new(text)).await?;
        Ok(())
    }

    async fn input_value(&self, element: &ElementRef) -> Result<String, AdapterError> {
        let reply = self
            .on_element("DOM.inputValue", element, scripts::INPUT_VALUE)
            .await?;
        Ok(reply.value.unwrap_or_default())
    }

    async fn set_input_files(
        &self,
        element: &ElementRef,
        files: &[PathBuf],
    ) -> Result<(), AdapterError> {
        let token = format!("upload-{}", element.0);
        self.on_element("DOM.markUpload", element, &scripts::mark_upload(&token))
            .await?;
        let input = self
            .page
            .find_element(format!("[data-sw-upload='{}']", token))
            .await?;
        let params = SetFileInputFilesParams::builder()
            .files(files.iter().map(|path| path.display().to_string()))
            .object_id(input.remote_object_id.clone())
            .build()
            .map_err(AdapterError::internal)?;
        self.page.execute(params).await?;
        Ok(())
    }

    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), AdapterError> {
        let started = Instant::now();
        let outcome = match tokio::time::timeout(timeout, self.page.goto(NavigateParams::new(url))).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(err)) => Err(AdapterError::from(err)),
            Err(_) => Err(AdapterError::new(AdapterErrorKind::NavTimeout)
                .with_hint(format!("{} after {:?}", url, timeout))),
        };
        metrics::record_command("Page.navigate", started.elapsed(), outcome.is_ok());
        outcome
    }

    async fn wait_for_load(&self, timeout: Duration) -> Result<(), AdapterError> {
        let deadline = Instant::now() + timeout;
        loop {
            match self
                .eval::<String>("Runtime.readyState", scripts::READY_STATE.to_string())
                .await
            {
                Ok(state) if state != "loading" => return Ok(()),
                Ok(_) => {}
                // The document may be swapped while we poll.
                Err(err) if err.is_navigation_interrupted() => {}
                Err(err) => return Err(err),
            }
            if Instant::now() >= deadline {
                return Err(AdapterError::new(AdapterErrorKind::NavTimeout)
                    .with_hint("document did not finish loading"));
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    fn download_dir(&self) -> Option<PathBuf> {
        self.download_dir.clone()
    }
}

//! Ports the engine uses to reach a page.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use stepwright_core_types::{ElementRef, Point, Viewport};

use crate::{AdapterError, AnchorDescriptor, ElementInfo};

/// How an element click is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClickMode {
    /// Scroll into view, require the element to receive the hit test, then click
    Regular,
    /// Click at the element center without actionability checks
    Force,
    /// `element.click()` from page script
    Script,
}

impl ClickMode {
    pub fn name(&self) -> &'static str {
        match self {
            ClickMode::Regular => "regular",
            ClickMode::Force => "force",
            ClickMode::Script => "script",
        }
    }
}

/// Keys the executor may press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Enter,
    Space,
    ArrowDown,
    Tab,
    Escape,
}

impl Key {
    pub fn key(&self) -> &'static str {
        match self {
            Key::Enter => "Enter",
            Key::Space => " ",
            Key::ArrowDown => "ArrowDown",
            Key::Tab => "Tab",
            Key::Escape => "Escape",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Key::Enter => "Enter",
            Key::Space => "Space",
            Key::ArrowDown => "ArrowDown",
            Key::Tab => "Tab",
            Key::Escape => "Escape",
        }
    }

    pub fn key_code(&self) -> i64 {
        match self {
            Key::Enter => 13,
            Key::Space => 32,
            Key::ArrowDown => 40,
            Key::Tab => 9,
            Key::Escape => 27,
        }
    }

    /// Text inserted by the key, if any.
    pub fn text(&self) -> Option<&'static str> {
        match self {
            Key::Enter => Some("\r"),
            Key::Space => Some(" "),
            _ => None,
        }
    }
}

/// Read-only page access used by the resolver.
#[async_trait]
pub trait PageQuery: Send + Sync {
    /// Elements matching `anchor`, in document order.
    async fn query(&self, anchor: &AnchorDescriptor) -> Result<Vec<ElementInfo>, AdapterError>;

    /// Topmost element at a viewport point.
    async fn element_at(&self, point: Point) -> Result<Option<ElementInfo>, AdapterError>;

    async fn parent_of(&self, element: &ElementRef) -> Result<Option<ElementInfo>, AdapterError>;

    /// `innerWidth`, `innerHeight` and `devicePixelRatio`.
    async fn viewport_metrics(&self) -> Result<Viewport, AdapterError>;

    async fn url(&self) -> Result<String, AdapterError>;

    async fn title(&self) -> Result<String, AdapterError>;

    /// Writes a PNG of the visible viewport to `path`.
    async fn capture_screenshot(&self, path: &Path) -> Result<(), AdapterError>;

    /// First visible match for `anchor`.
    async fn find_visible(
        &self,
        anchor: &AnchorDescriptor,
    ) -> Result<Option<ElementInfo>, AdapterError> {
        Ok(self.query(anchor).await?.into_iter().find(|el| el.visible))
    }

    async fn count_visible(&self, anchor: &AnchorDescriptor) -> Result<usize, AdapterError> {
        Ok(self
            .query(anchor)
            .await?
            .iter()
            .filter(|el| el.visible)
            .count())
    }
}

/// Page mutation, reserved for the action executor.
#[async_trait]
pub trait PageDriver: PageQuery {
    async fn click_element(&self, element: &ElementRef, mode: ClickMode)
        -> Result<(), AdapterError>;

    /// Mouse press and release at a viewport point.
    async fn click_at(&self, point: Point) -> Result<(), AdapterError>;

    /// Script click on whatever `elementFromPoint` returns.
    async fn script_click_at(&self, point: Point) -> Result<(), AdapterError>;

    async fn hover(&self, element: &ElementRef) -> Result<(), AdapterError>;

    async fn double_click(&self, element: &ElementRef) -> Result<(), AdapterError>;

    /// Dispatches synthetic DOM events (`mousedown`, `mouseup`, `click`, ...) and focuses.
    async fn dispatch_events(
        &self,
        element: &ElementRef,
        events: &[&str],
    ) -> Result<(), AdapterError>;

    async fn press_key(&self, key: Key) -> Result<(), AdapterError>;

    async fn focus(&self, element: &ElementRef) -> Result<(), AdapterError>;

    async fn clear(&self, element: &ElementRef) -> Result<(), AdapterError>;

    async fn insert_text(&self, element: &ElementRef, text: &str) -> Result<(), AdapterError>;

    async fn input_value(&self, element: &ElementRef) -> Result<String, AdapterError>;

    async fn set_input_files(
        &self,
        element: &ElementRef,
        files: &[PathBuf],
    ) -> Result<(), AdapterError>;

    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), AdapterError>;

    /// Waits for `document.readyState` to leave `loading`.
    async fn wait_for_load(&self, timeout: Duration) -> Result<(), AdapterError>;

    /// Directory the browser writes downloads into.
    fn download_dir(&self) -> Option<PathBuf>;
}

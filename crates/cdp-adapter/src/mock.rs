//! In-memory page for tests.
//!
//! Anchors are matched by their display form, so a test registers exactly the
//! selectors it expects the engine to ask for. Input methods are recorded and can
//! trigger scripted reactions (revealing a menu, navigating, interrupting).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use stepwright_core_types::{ElementRef, Point, Viewport};

use crate::{
    AdapterError, AdapterErrorKind, AnchorDescriptor, ClickMode, ElementInfo, Key, PageDriver,
    PageQuery,
};

/// Input recorded by [`MockPage`].
#[derive(Debug, Clone, PartialEq)]
pub enum MockAction {
    Click { element: ElementRef, mode: ClickMode },
    ClickAt(Point),
    ScriptClickAt(Point),
    Hover(ElementRef),
    DoubleClick(ElementRef),
    Dispatch { element: ElementRef, events: Vec<String> },
    Key(Key),
    Focus(ElementRef),
    Clear(ElementRef),
    Insert { element: ElementRef, text: String },
    Upload { element: ElementRef, files: Vec<PathBuf> },
    Goto(String),
}

/// Scripted page change after an element is activated.
#[derive(Debug, Clone)]
pub enum Reaction {
    Reveal {
        anchor: AnchorDescriptor,
        elements: Vec<ElementInfo>,
    },
    Navigate {
        url: String,
        title: String,
    },
    /// The activating call fails with a destroyed execution context.
    Interrupt,
}

struct MockState {
    url: String,
    title: String,
    viewport: Viewport,
    viewport_failures: usize,
    anchors: HashMap<String, Vec<ElementInfo>>,
    placed: Vec<ElementInfo>,
    parents: HashMap<ElementRef, ElementInfo>,
    values: HashMap<ElementRef, String>,
    value_overrides: HashMap<ElementRef, String>,
    click_failures: HashMap<(ElementRef, ClickMode), AdapterError>,
    point_failure: Option<AdapterError>,
    reactions: HashMap<ElementRef, Vec<Reaction>>,
    key_reactions: HashMap<Key, Vec<Reaction>>,
    actions: Vec<MockAction>,
    queries: Vec<String>,
    download_dir: Option<PathBuf>,
    screenshots: usize,
}

pub struct MockPage {
    state: Mutex<MockState>,
}

impl Default for MockPage {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPage {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                url: "https://app.example.com/".into(),
                title: "Example App".into(),
                viewport: Viewport::new(1280.0, 800.0, 1.0),
                viewport_failures: 0,
                anchors: HashMap::new(),
                placed: Vec::new(),
                parents: HashMap::new(),
                values: HashMap::new(),
                value_overrides: HashMap::new(),
                click_failures: HashMap::new(),
                point_failure: None,
                reactions: HashMap::new(),
                key_reactions: HashMap::new(),
                actions: Vec::new(),
                queries: Vec::new(),
                download_dir: None,
                screenshots: 0,
            }),
        }
    }

    pub fn with_url(self, url: impl Into<String>) -> Self {
        self.state.lock().url = url.into();
        self
    }

    pub fn with_title(self, title: impl Into<String>) -> Self {
        self.state.lock().title = title.into();
        self
    }

    pub fn with_viewport(self, viewport: Viewport) -> Self {
        self.state.lock().viewport = viewport;
        self
    }

    pub fn with_download_dir(self, dir: impl Into<PathBuf>) -> Self {
        self.state.lock().download_dir = Some(dir.into());
        self
    }

    pub fn set_url(&self, url: impl Into<String>) {
        self.state.lock().url = url.into();
    }

    pub fn set_title(&self, title: impl Into<String>) {
        self.state.lock().title = title.into();
    }

    /// Registers the elements returned for `anchor`.
    pub fn add(&self, anchor: AnchorDescriptor, elements: Vec<ElementInfo>) {
        self.state
            .lock()
            .anchors
            .entry(anchor.to_string())
            .or_default()
            .extend(elements);
    }

    /// Makes `element` hit-testable by [`PageQuery::element_at`]; later placements are on top.
    pub fn place(&self, element: ElementInfo) {
        self.state.lock().placed.push(element);
    }

    pub fn set_parent(&self, child: &ElementRef, parent: ElementInfo) {
        self.state.lock().parents.insert(child.clone(), parent);
    }

    pub fn fail_click(&self, element: &ElementRef, mode: ClickMode, error: AdapterError) {
        self.state
            .lock()
            .click_failures
            .insert((element.clone(), mode), error);
    }

    /// Every coordinate click (mouse and script) fails with `error`.
    pub fn fail_point_clicks(&self, error: AdapterError) {
        self.state.lock().point_failure = Some(error);
    }

    /// The next `times` viewport reads fail.
    pub fn fail_viewport(&self, times: usize) {
        self.state.lock().viewport_failures = times;
    }

    pub fn on_activate(&self, element: &ElementRef, reaction: Reaction) {
        self.state
            .lock()
            .reactions
            .entry(element.clone())
            .or_default()
            .push(reaction);
    }

    pub fn on_key(&self, key: Key, reaction: Reaction) {
        self.state
            .lock()
            .key_reactions
            .entry(key)
            .or_default()
            .push(reaction);
    }

    /// Reads of `element` return `value` regardless of what was typed.
    pub fn override_value(&self, element: &ElementRef, value: impl Into<String>) {
        self.state
            .lock()
            .value_overrides
            .insert(element.clone(), value.into());
    }

    pub fn actions(&self) -> Vec<MockAction> {
        self.state.lock().actions.clone()
    }

    /// Display forms of every anchor queried so far.
    pub fn queries(&self) -> Vec<String> {
        self.state.lock().queries.clone()
    }

    pub fn screenshots_taken(&self) -> usize {
        self.state.lock().screenshots
    }

    fn record(&self, action: MockAction) {
        self.state.lock().actions.push(action);
    }

    fn apply(state: &mut MockState, reactions: Vec<Reaction>) -> Result<(), AdapterError> {
        let mut interrupted = false;
        for reaction in reactions {
            match reaction {
                Reaction::Reveal { anchor, elements } => {
                    state
                        .anchors
                        .entry(anchor.to_string())
                        .or_default()
                        .extend(elements);
                }
                Reaction::Navigate { url, title } => {
                    state.url = url;
                    state.title = title;
                }
                Reaction::Interrupt => interrupted = true,
            }
        }
        if interrupted {
            return Err(AdapterError::from_protocol(
                "Execution context was destroyed, most likely because of a navigation",
            ));
        }
        Ok(())
    }

    fn activate(&self, element: &ElementRef) -> Result<(), AdapterError> {
        let mut state = self.state.lock();
        let reactions = state.reactions.get(element).cloned().unwrap_or_default();
        Self::apply(&mut state, reactions)
    }

    fn element_at_point(&self, point: Point) -> Option<ElementInfo> {
        self.state
            .lock()
            .placed
            .iter()
            .rev()
            .find(|el| el.bounding_box.contains(point))
            .cloned()
    }

    fn known(&self, element: &ElementRef) -> bool {
        let state = self.state.lock();
        state
            .anchors
            .values()
            .flatten()
            .chain(state.placed.iter())
            .chain(state.parents.values())
            .any(|el| &el.handle == element)
    }
}

#[async_trait]
impl PageQuery for MockPage {
    async fn query(&self, anchor: &AnchorDescriptor) -> Result<Vec<ElementInfo>, AdapterError> {
        let key = anchor.to_string();
        let mut state = self.state.lock();
        state.queries.push(key.clone());
        Ok(state.anchors.get(&key).cloned().unwrap_or_default())
    }

    async fn element_at(&self, point: Point) -> Result<Option<ElementInfo>, AdapterError> {
        Ok(self.element_at_point(point))
    }

    async fn parent_of(&self, element: &ElementRef) -> Result<Option<ElementInfo>, AdapterError> {
        Ok(self.state.lock().parents.get(element).cloned())
    }

    async fn viewport_metrics(&self) -> Result<Viewport, AdapterError> {
        let mut state = self.state.lock();
        if state.viewport_failures > 0 {
            state.viewport_failures -= 1;
            return Err(AdapterError::new(AdapterErrorKind::CdpIo).with_hint("viewport unavailable"));
        }
        Ok(state.viewport)
    }

    async fn url(&self) -> Result<String, AdapterError> {
        Ok(self.state.lock().url.clone())
    }

    async fn title(&self) -> Result<String, AdapterError> {
        Ok(self.state.lock().title.clone())
    }

    async fn capture_screenshot(&self, path: &Path) -> Result<(), AdapterError> {
        std::fs::write(path, b"\x89PNG\r\n\x1a\nmock")
            .map_err(|err| AdapterError::internal(err.to_string()))?;
        self.state.lock().screenshots += 1;
        Ok(())
    }
}

#[async_trait]
impl PageDriver for MockPage {
    async fn click_element(
        &self,
        element: &ElementRef,
        mode: ClickMode,
    ) -> Result<(), AdapterError> {
        self.record(MockAction::Click {
            element: element.clone(),
            mode,
        });
        if let Some(err) = self
            .state
            .lock()
            .click_failures
            .get(&(element.clone(), mode))
            .cloned()
        {
            return Err(err);
        }
        if !self.known(element) {
            return Err(AdapterError::not_found(format!("{}: stale element handle", element)));
        }
        self.activate(element)
    }

    async fn click_at(&self, point: Point) -> Result<(), AdapterError> {
        self.record(MockAction::ClickAt(point));
        if let Some(err) = self.state.lock().point_failure.clone() {
            return Err(err);
        }
        match self.element_at_point(point) {
            Some(el) => self.activate(&el.handle),
            None => Ok(()),
        }
    }

    async fn script_click_at(&self, point: Point) -> Result<(), AdapterError> {
        self.record(MockAction::ScriptClickAt(point));
        if let Some(err) = self.state.lock().point_failure.clone() {
            return Err(err);
        }
        match self.element_at_point(point) {
            Some(el) => self.activate(&el.handle),
            None => Err(AdapterError::not_found("no element at point")),
        }
    }

    async fn hover(&self, element: &ElementRef) -> Result<(), AdapterError> {
        self.record(MockAction::Hover(element.clone()));
        Ok(())
    }

    async fn double_click(&self, element: &ElementRef) -> Result<(), AdapterError> {
        self.record(MockAction::DoubleClick(element.clone()));
        self.activate(element)
    }

    async fn dispatch_events(
        &self,
        element: &ElementRef,
        events: &[&str],
    ) -> Result<(), AdapterError> {
        self.record(MockAction::Dispatch {
            element: element.clone(),
            events: events.iter().map(|e| e.to_string()).collect(),
        });
        if events.contains(&"click") {
            self.activate(element)?;
        }
        Ok(())
    }

    async fn press_key(&self, key: Key) -> Result<(), AdapterError> {
        self.record(MockAction::Key(key));
        let mut state = self.state.lock();
        let reactions = state.key_reactions.get(&key).cloned().unwrap_or_default();
        Self::apply(&mut state, reactions)
    }

    async fn focus(&self, element: &ElementRef) -> Result<(), AdapterError> {
        self.record(MockAction::Focus(element.clone()));
        Ok(())
    }

    async fn clear(&self, element: &ElementRef) -> Result<(), AdapterError> {
        self.record(MockAction::Clear(element.clone()));
        self.state.lock().values.insert(element.clone(), String::new());
        Ok(())
    }

    async fn insert_text(&self, element: &ElementRef, text: &str) -> Result<(), AdapterError> {
        self.record(MockAction::Insert {
            element: element.clone(),
            text: text.to_string(),
        });
        self.state
            .lock()
            .values
            .entry(element.clone())
            .or_default()
            .push_str(text);
        Ok(())
    }

    async fn input_value(&self, element: &ElementRef) -> Result<String, AdapterError> {
        let state = self.state.lock();
        if let Some(value) = state.value_overrides.get(element) {
            return Ok(value.clone());
        }
        Ok(state.values.get(element).cloned().unwrap_or_default())
    }

    async fn set_input_files(
        &self,
        element: &ElementRef,
        files: &[PathBuf],
    ) -> Result<(), AdapterError> {
        self.record(MockAction::Upload {
            element: element.clone(),
            files: files.to_vec(),
        });
        Ok(())
    }

    async fn goto(&self, url: &str, _timeout: Duration) -> Result<(), AdapterError> {
        self.record(MockAction::Goto(url.to_string()));
        self.state.lock().url = url.to_string();
        Ok(())
    }

    async fn wait_for_load(&self, _timeout: Duration) -> Result<(), AdapterError> {
        Ok(())
    }

    fn download_dir(&self) -> Option<PathBuf> {
        self.state.lock().download_dir.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepwright_core_types::BoundingBox;

    #[tokio::test]
    async fn clicking_a_trigger_reveals_its_menu() {
        let page = MockPage::new();
        let trigger = ElementInfo::new("sw-1", "button", "Create");
        let item = ElementInfo::new("sw-2", "div", "Chatbot")
            .with_role("menuitem")
            .in_menu();
        let menu = AnchorDescriptor::css("[role='menu']");
        page.add(AnchorDescriptor::text_exact("Create"), vec![trigger.clone()]);
        page.on_activate(
            &trigger.handle,
            Reaction::Reveal {
                anchor: menu.clone(),
                elements: vec![item],
            },
        );

        assert!(page.query(&menu).await.unwrap().is_empty());
        page.click_element(&trigger.handle, ClickMode::Regular)
            .await
            .unwrap();
        assert_eq!(page.query(&menu).await.unwrap().len(), 1);
        assert_eq!(page.queries().len(), 2);
    }

    #[tokio::test]
    async fn element_at_prefers_topmost_placement() {
        let page = MockPage::new();
        page.place(
            ElementInfo::new("sw-1", "div", "backdrop")
                .with_box(BoundingBox::new(0.0, 0.0, 500.0, 500.0)),
        );
        page.place(
            ElementInfo::new("sw-2", "button", "Go").with_box(BoundingBox::new(
                100.0, 100.0, 50.0, 20.0,
            )),
        );
        let hit = page.element_at(Point::new(110.0, 110.0)).await.unwrap();
        assert_eq!(hit.map(|el| el.handle.0), Some("sw-2".to_string()));
        let miss = page.element_at(Point::new(900.0, 900.0)).await.unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn interrupt_reaction_reports_navigation() {
        let page = MockPage::new();
        let link = ElementInfo::new("sw-9", "a", "Docs");
        page.add(AnchorDescriptor::css("a"), vec![link.clone()]);
        page.on_activate(&link.handle, Reaction::Interrupt);
        let err = page
            .click_element(&link.handle, ClickMode::Script)
            .await
            .unwrap_err();
        assert!(err.is_navigation_interrupted());
    }
}

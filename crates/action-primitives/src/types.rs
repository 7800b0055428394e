//! Core data types for the action executor

use std::path::PathBuf;

use cdp_adapter::{ElementInfo, PageQuery};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stepwright_core_types::{ActionType, BoundingBox, Point, ResolutionResult};
use tracing::debug;

use crate::errors::ActionError;

/// Page state observed after an action
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostSignals {
    pub url_after: Option<String>,
    pub title_after: Option<String>,

    /// The action moved the page to another document or URL
    pub navigated: bool,

    /// File written by a download the action triggered
    pub download: Option<PathBuf>,
}

/// Action execution report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionReport {
    pub ok: bool,

    pub action: ActionType,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub finished_at: DateTime<Utc>,

    pub latency_ms: u64,

    /// Strategy that completed the action
    pub strategy: Option<String>,

    pub post_signals: PostSignals,

    /// Human-readable outcome (verification evidence, wait mode, ...)
    pub detail: Option<String>,
}

impl ActionReport {
    pub fn success(action: ActionType, started_at: DateTime<Utc>, latency_ms: u64) -> Self {
        Self {
            ok: true,
            action,
            started_at,
            finished_at: Utc::now(),
            latency_ms,
            strategy: None,
            post_signals: PostSignals::default(),
            detail: None,
        }
    }

    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = Some(strategy.into());
        self
    }

    pub fn with_signals(mut self, signals: PostSignals) -> Self {
        self.post_signals = signals;
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// How a strategy that did not fail ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Landing {
    Completed,
    /// The page navigated underneath the input, which means it landed
    Navigated,
}

/// What a primitive hands back to the executor before the report is built.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub strategy: Option<String>,
    pub navigated: bool,
    pub download: Option<PathBuf>,
    pub detail: Option<String>,
}

impl Completion {
    pub fn by(strategy: impl Into<String>) -> Self {
        Self {
            strategy: Some(strategy.into()),
            ..Self::default()
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Outcome of one verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub passed: bool,
    pub detail: String,
}

impl VerificationOutcome {
    pub fn pass(detail: impl Into<String>) -> Self {
        Self {
            passed: true,
            detail: detail.into(),
        }
    }

    pub fn fail(detail: impl Into<String>) -> Self {
        Self {
            passed: false,
            detail: detail.into(),
        }
    }

    pub fn from_bool(passed: bool, detail: impl Into<String>) -> Self {
        Self {
            passed,
            detail: detail.into(),
        }
    }
}

/// Resolved element plus the point the resolver validated.
///
/// Cache hits carry no element handle; the element under the point is looked up
/// instead, and when nothing is there only coordinate strategies remain.
#[derive(Debug, Clone, PartialEq)]
pub struct ClickTarget {
    pub element: Option<ElementInfo>,
    pub point: Point,
}

impl ClickTarget {
    pub fn at(point: Point) -> Self {
        Self {
            element: None,
            point,
        }
    }

    pub fn element(element: ElementInfo) -> Self {
        Self {
            point: element.center(),
            element: Some(element),
        }
    }

    pub async fn from_resolution(
        resolution: &ResolutionResult,
        page: &(impl PageQuery + ?Sized),
    ) -> Result<Self, ActionError> {
        if !resolution.found {
            return Err(ActionError::NotFound(
                resolution
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "target was not resolved".into()),
            ));
        }
        let point = resolution
            .coordinates
            .ok_or_else(|| ActionError::NotFound("resolution carries no coordinates".into()))?;

        let element = match &resolution.element {
            Some(handle) => {
                let meta = &resolution.metadata;
                let mut info = ElementInfo::new(
                    handle.0.clone(),
                    meta.tag_name.clone().unwrap_or_default(),
                    meta.visible_text.clone().unwrap_or_default(),
                )
                .with_box(
                    resolution
                        .bounding_box
                        .unwrap_or_else(|| BoundingBox::new(point.x - 1.0, point.y - 1.0, 2.0, 2.0)),
                );
                info.role = meta.role.clone();
                info.aria_label = meta.aria_label.clone();
                info.test_id = meta.test_id.clone();
                info.class_name = meta.class_name.clone().unwrap_or_default();
                Some(info)
            }
            None => match page.element_at(point).await {
                Ok(hit) => hit,
                Err(err) => {
                    debug!(error = %err, "hit test for cached point failed");
                    None
                }
            },
        };
        Ok(Self { element, point })
    }

    /// Where coordinate strategies aim: the element center when its box is known.
    pub fn center(&self) -> Point {
        match &self.element {
            Some(el) if !el.bounding_box.is_empty() => el.center(),
            _ => self.point,
        }
    }

    pub fn describe(&self) -> String {
        match &self.element {
            Some(el) => {
                let text: String = el.text.trim().chars().take(100).collect();
                format!("'{}' ({})", text, el.tag)
            }
            None => format!("point ({:.0}, {:.0})", self.point.x, self.point.y),
        }
    }
}

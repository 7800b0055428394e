//! Click primitive - ordered click strategies for a resolved target

use cdp_adapter::{AdapterError, AnchorDescriptor, ClickMode, ElementInfo, PageDriver, PageQuery};
use stepwright_core_types::{ExecCtx, Point};
use tracing::debug;

use crate::errors::ActionError;
use crate::primitives::try_strategy;
use crate::types::{ClickTarget, Landing};

/// Marker some apps put on full-page overlays that swallow regular clicks.
pub const OVERLAY_MARKER: &str = "[data-pollen-overlay='true']";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickStrategy {
    Regular,
    Force,
    Script,
    /// Mouse press and release at the element center
    Center,
}

impl ClickStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            ClickStrategy::Regular => "regular_click",
            ClickStrategy::Force => "force_click",
            ClickStrategy::Script => "script_click",
            ClickStrategy::Center => "center_click",
        }
    }

    fn needs_handle(&self) -> bool {
        !matches!(self, ClickStrategy::Center)
    }
}

const SEND_OR_OVERLAY_ORDER: [ClickStrategy; 4] = [
    ClickStrategy::Force,
    ClickStrategy::Center,
    ClickStrategy::Regular,
    ClickStrategy::Script,
];

const FORCED_ORDER: [ClickStrategy; 4] = [
    ClickStrategy::Force,
    ClickStrategy::Script,
    ClickStrategy::Regular,
    ClickStrategy::Center,
];

const DEFAULT_ORDER: [ClickStrategy; 4] = [
    ClickStrategy::Regular,
    ClickStrategy::Force,
    ClickStrategy::Script,
    ClickStrategy::Center,
];

/// Traits of the clicked element that change which strategy goes first.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ElementSignature {
    /// `<svg>` whose test id mentions "send"
    pub send_button: bool,
    /// Overlay class on the element, or an overlay marker anywhere on the page
    pub overlay: bool,
}

impl ElementSignature {
    pub async fn inspect(page: &(impl PageQuery + ?Sized), element: Option<&ElementInfo>) -> Self {
        let send_button = element
            .map(|el| {
                el.tag.eq_ignore_ascii_case("svg")
                    && el
                        .test_id
                        .as_deref()
                        .map(|id| id.to_lowercase().contains("send"))
                        .unwrap_or(false)
            })
            .unwrap_or(false);
        let mut overlay = element
            .map(|el| el.class_name.to_lowercase().contains("overlay"))
            .unwrap_or(false);
        if !overlay {
            overlay = match page.query(&AnchorDescriptor::css(OVERLAY_MARKER)).await {
                Ok(found) => !found.is_empty(),
                Err(err) => {
                    debug!(error = %err, "overlay probe failed");
                    false
                }
            };
        }
        Self {
            send_button,
            overlay,
        }
    }

    pub fn prefers_force(&self) -> bool {
        self.send_button || self.overlay
    }
}

/// Strategy order for a target.
pub fn strategy_order(signature: ElementSignature, forced: bool) -> &'static [ClickStrategy] {
    if signature.prefers_force() {
        &SEND_OR_OVERLAY_ORDER
    } else if forced {
        &FORCED_ORDER
    } else {
        &DEFAULT_ORDER
    }
}

/// Mouse click at `point`, falling back to a script click on whatever is there.
pub async fn coordinate_click(page: &dyn PageDriver, point: Point) -> Result<(), AdapterError> {
    match page.click_at(point).await {
        Ok(()) => Ok(()),
        Err(err) if err.is_navigation_interrupted() => Err(err),
        Err(err) => {
            debug!(x = point.x, y = point.y, error = %err, "mouse click failed, trying script click");
            page.script_click_at(point).await
        }
    }
}

async fn run(
    page: &dyn PageDriver,
    target: &ClickTarget,
    strategy: ClickStrategy,
) -> Result<(), AdapterError> {
    let handle = target.element.as_ref().map(|el| &el.handle);
    match (strategy, handle) {
        (ClickStrategy::Regular, Some(handle)) => page.click_element(handle, ClickMode::Regular).await,
        (ClickStrategy::Force, Some(handle)) => page.click_element(handle, ClickMode::Force).await,
        (ClickStrategy::Script, Some(handle)) => page.click_element(handle, ClickMode::Script).await,
        (ClickStrategy::Center, _) => coordinate_click(page, target.center()).await,
        (_, None) => Err(AdapterError::not_found("no element handle")),
    }
}

/// Tries each strategy in order until one lands.
pub async fn click_with_strategies(
    page: &dyn PageDriver,
    ctx: &ExecCtx,
    target: &ClickTarget,
    forced: bool,
) -> Result<(&'static str, Landing), ActionError> {
    let signature = ElementSignature::inspect(page, target.element.as_ref()).await;
    let order = strategy_order(signature, forced);
    debug!(
        send_button = signature.send_button,
        overlay = signature.overlay,
        forced,
        order = ?order.iter().map(|s| s.name()).collect::<Vec<_>>(),
        "click strategy order"
    );

    let mut failures = Vec::new();
    for strategy in order {
        if strategy.needs_handle() && target.element.is_none() {
            continue;
        }
        let attempt = run(page, target, *strategy);
        if let Some(landing) =
            try_strategy("click", strategy.name(), ctx, &mut failures, attempt).await?
        {
            return Ok((strategy.name(), landing));
        }
    }

    Err(ActionError::StrategyExhausted {
        action: "click".into(),
        attempts: if failures.is_empty() {
            "no applicable strategy".into()
        } else {
            failures.join("; ")
        },
    })
}

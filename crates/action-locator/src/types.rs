//! Core types for the resolver tiers

use cdp_adapter::{AnchorDescriptor, ElementInfo};
use stepwright_core_types::{BoundingBox, ElementMetadata, Point, ResolutionResult, SourceTier};

use crate::errors::LocatorError;

/// One selector to probe, ordered by `priority` (lower first).
#[derive(Debug, Clone, PartialEq)]
pub struct SelectorCandidate {
    pub anchor: AnchorDescriptor,
    pub priority: u8,
    /// Catalogue entry that produced the selector
    pub strategy: &'static str,
}

impl SelectorCandidate {
    pub fn new(anchor: AnchorDescriptor, priority: u8, strategy: &'static str) -> Self {
        Self {
            anchor,
            priority,
            strategy,
        }
    }
}

/// Validated target produced by a tier.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub tier: SourceTier,
    pub point: Point,
    pub bounding_box: Option<BoundingBox>,
    pub confidence: f64,
    /// Element under the point, when the page reported one
    pub element: Option<ElementInfo>,
    pub metadata: ElementMetadata,
}

impl Candidate {
    /// Candidate anchored on an element reported by a selector or hit test.
    pub fn from_element(
        tier: SourceTier,
        element: ElementInfo,
        confidence: f64,
        matched_by: impl Into<String>,
    ) -> Self {
        let metadata = element.metadata(Some(matched_by.into()));
        Self {
            tier,
            point: element.center(),
            bounding_box: Some(element.bounding_box),
            confidence,
            element: Some(element),
            metadata,
        }
    }

    pub fn into_result(self) -> ResolutionResult {
        let result = ResolutionResult::found(self.tier, self.point, self.bounding_box, self.confidence)
            .with_metadata(self.metadata);
        match self.element {
            Some(element) => result.with_element(element.handle),
            None => result,
        }
    }
}

/// What one tier concluded.
#[derive(Debug, Clone)]
pub enum TierOutcome {
    /// Validated target; resolution stops here
    Accepted(Candidate),
    /// A point was proposed but failed validation; nearby search may recover it
    Rejected { point: Point, reason: LocatorError },
    /// Nothing usable; the next tier runs
    NoMatch(String),
}

impl TierOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            TierOutcome::Accepted(_) => "accepted",
            TierOutcome::Rejected { .. } => "rejected",
            TierOutcome::NoMatch(_) => "no_match",
        }
    }
}

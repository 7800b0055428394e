use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{BoundingBox, Point};

/// Opaque handle to an element registered by the page adapter.
///
/// Handles are only valid for the document they were issued from; cached results
/// never carry them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementRef(pub String);

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolver tier that produced a result, in fallback order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTier {
    Cache,
    ContextScoped,
    Semantic,
    Normalized,
    Vision,
    NearbySearch,
}

impl SourceTier {
    pub fn name(&self) -> &'static str {
        match self {
            SourceTier::Cache => "cache",
            SourceTier::ContextScoped => "context_scoped",
            SourceTier::Semantic => "semantic",
            SourceTier::Normalized => "normalized",
            SourceTier::Vision => "vision",
            SourceTier::NearbySearch => "nearby_search",
        }
    }
}

impl fmt::Display for SourceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ElementMetadata {
    pub tag_name: Option<String>,
    pub role: Option<String>,
    pub visible_text: Option<String>,
    pub aria_label: Option<String>,
    pub test_id: Option<String>,
    pub class_name: Option<String>,
    /// Selector or strategy description that matched
    pub matched_by: Option<String>,
    /// Element type as described by the vision model
    pub element_type: Option<String>,
    pub description: Option<String>,
    pub interaction_type: Option<String>,
}

/// Outcome of one resolution call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub found: bool,
    pub coordinates: Option<Point>,
    pub bounding_box: Option<BoundingBox>,
    pub confidence: f64,
    pub source_tier: Option<SourceTier>,
    #[serde(skip)]
    pub element: Option<ElementRef>,
    pub metadata: ElementMetadata,
    pub error_message: Option<String>,
}

impl ResolutionResult {
    pub fn found(
        tier: SourceTier,
        coordinates: Point,
        bounding_box: Option<BoundingBox>,
        confidence: f64,
    ) -> Self {
        Self {
            found: true,
            coordinates: Some(coordinates),
            bounding_box,
            confidence: confidence.clamp(0.0, 1.0),
            source_tier: Some(tier),
            element: None,
            metadata: ElementMetadata::default(),
            error_message: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            found: false,
            coordinates: None,
            bounding_box: None,
            confidence: 0.0,
            source_tier: None,
            element: None,
            metadata: ElementMetadata::default(),
            error_message: Some(message.into()),
        }
    }

    pub fn with_element(mut self, element: ElementRef) -> Self {
        self.element = Some(element);
        self
    }

    pub fn with_metadata(mut self, metadata: ElementMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Copy suitable for the detection cache: no live element handle, tier rewritten on read.
    pub fn detached(&self) -> Self {
        let mut copy = self.clone();
        copy.element = None;
        copy
    }
}

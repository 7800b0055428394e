//! Target resolution for natural-language test steps.
//!
//! A [`TargetResolver`] turns an action plan into a validated point on the page by
//! walking a fixed chain of tiers, stopping at the first validated result:
//! - detection cache
//! - selectors scoped to an open dropdown or dialog
//! - semantic text/attribute selectors
//! - the same selectors over normalized alternative terms
//! - vision-model detection, with nearby search when its point misses
//!
//! Results are checked against the viewport and for interactivity before they are
//! accepted, and confident ones are written back to the cache.

pub mod config;
pub mod errors;
pub mod interactivity;
pub mod metrics;
pub mod probe;
pub mod resolver;
pub mod selectors;
pub mod strategies;
pub mod types;
pub mod vision;

pub use config::ResolverConfig;
pub use errors::LocatorError;
pub use metrics::register_metrics;
pub use resolver::TargetResolver;
pub use strategies::{ContextScopedTier, NormalizedTier, SemanticTier, TierInput, TierStrategy};
pub use types::{Candidate, SelectorCandidate, TierOutcome};
pub use vision::{NearbySearch, VisionTier};

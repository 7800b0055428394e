//! Shared primitives for the stepwright engine.
//!
//! Every crate in the workspace speaks in these types: the action plan handed in by
//! the (external) instruction parser, the resolution result produced by the locator,
//! the viewport geometry used for validation and the per-step execution record.

mod ctx;
mod geometry;
mod plan;
mod resolution;
mod step;

pub use ctx::*;
pub use geometry::*;
pub use plan::*;
pub use resolution::*;
pub use step::*;

use std::fmt;

use uuid::Uuid;

#[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ActionId(pub String);

impl ActionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ActionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

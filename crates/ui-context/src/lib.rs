//! UI context tracking between test steps.
//!
//! A step such as "click on Create dropdown" opens a transient region; later steps
//! such as "click on Chatbot from dropdown" must be resolved inside it. The
//! [`UiContextTracker`] records those regions, expires them after a few steps and
//! scores which one a new instruction refers to.

mod model;
mod patterns;
mod tracker;

pub use model::{UiContext, UiElementType, UiState};
pub use patterns::extract_target;
pub use tracker::{TrackerConfig, UiContextTracker, DEFAULT_CONTEXT_LIFETIME};

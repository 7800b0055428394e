//! Page access layer for stepwright.
//!
//! The resolver and executor never talk to a browser directly. They go through two
//! ports defined here:
//!
//! - [`PageQuery`]: read-only queries (selectors, hit tests, viewport, screenshots)
//! - [`PageDriver`]: everything that mutates the page (input events, navigation)
//!
//! [`ChromiumPage`] implements both over chromiumoxide. With the `mock` feature the
//! crate also exposes [`mock::MockPage`], an in-memory page for tests.

pub mod anchor;
pub mod chromium;
pub mod config;
pub mod element;
pub mod error;
pub mod metrics;
pub mod ports;
mod scripts;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use anchor::AnchorDescriptor;
pub use chromium::{ChromiumPage, ChromiumSession};
pub use config::CdpConfig;
pub use element::ElementInfo;
pub use error::{AdapterError, AdapterErrorKind};
pub use ports::{ClickMode, Key, PageDriver, PageQuery};

//! Action executor for natural-language test steps
//!
//! Consumes a resolved target and performs the interaction through a
//! [`cdp_adapter::PageDriver`]:
//! - click with ordered strategies, dropdown menu checks and download detection
//! - typing with credential placeholders and value read-back
//! - page-state verification heuristics
//! - upload, wait and navigate
//!
//! A strategy that fails is logged and the next one runs; only exhaustion of
//! every strategy fails the action. An input that destroys the execution
//! context counts as success.

pub mod config;
pub mod credentials;
pub mod errors;
pub mod executor;
pub mod metrics;
pub mod primitives;
pub mod types;

pub use config::ExecutorConfig;
pub use credentials::{has_placeholders, resolve_placeholders, CredentialProvider, MapCredentials};
pub use errors::ActionError;
pub use executor::ActionExecutor;
pub use primitives::verify::check as check_verification;
pub use types::{ActionReport, ClickTarget, Completion, PostSignals, VerificationOutcome};

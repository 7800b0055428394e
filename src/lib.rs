//! stepwright: runs natural-language UI test steps against a browser.
//!
//! The engine lives in the workspace crates; this crate wires them into a
//! [`TestSession`] and exposes the `stepwright` command line.

pub mod cli;
pub mod config;
pub mod credentials;
pub mod errors;
pub mod metrics;
pub mod plan;
pub mod session;

pub use config::{Config, LlmSettings, ResolverSettings, RunSettings};
pub use credentials::{load_credentials_file, parse_credentials, ChainedCredentials, EnvCredentials};
pub use errors::StepwrightError;
pub use plan::TestPlan;
pub use session::{RunReport, TestSession};

use clap::Subcommand;

use super::check::CheckArgs;
use super::config::ConfigArgs;
use super::run::RunArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Run a test plan against a fresh browser
    Run(RunArgs),

    /// Parse and validate a test plan without running it
    Check(CheckArgs),

    /// Show or edit configuration
    Config(ConfigArgs),
}

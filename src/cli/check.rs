use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use stepwright_core_types::{ActionPlan, ActionType};

use super::output::{print_structured, OutputFormat};
use crate::plan::TestPlan;

#[derive(Args, Clone, Debug)]
pub struct CheckArgs {
    /// Test plan file (YAML)
    pub plan: PathBuf,
}

pub async fn cmd_check(args: CheckArgs, output: OutputFormat) -> Result<()> {
    let plan = TestPlan::load(&args.plan)
        .await
        .with_context(|| format!("checking {}", args.plan.display()))?;

    if print_structured(&plan, &output)? {
        return Ok(());
    }

    println!("Plan: {} ({} steps)", plan.name, plan.steps.len());
    if let Some(base) = &plan.base_url {
        println!("Base url: {}", base);
    }
    for (index, step) in plan.steps.iter().enumerate() {
        println!("{:>3}. {}", index + 1, describe_step(&plan, step));
    }
    println!("Plan is valid");
    Ok(())
}

fn describe_step(plan: &TestPlan, step: &ActionPlan) -> String {
    let value = step.value.as_deref().unwrap_or_default();
    let mut line = match step.action_type {
        ActionType::Navigate => {
            let raw = if value.is_empty() { step.target.as_str() } else { value };
            format!("navigate {}", plan.resolve_url(raw))
        }
        ActionType::Click => format!("click '{}'", step.target),
        ActionType::Type => format!(
            "type {} characters into '{}'",
            value.chars().count(),
            step.search_text()
        ),
        ActionType::Verify => match &step.verification {
            Some(kind) => format!("verify {} '{}'", kind.name(), value),
            None => "verify".to_string(),
        },
        ActionType::Upload => format!("upload {}", value),
        ActionType::Wait => match &step.wait {
            Some(mode) => format!("wait {:?}", mode),
            None => "wait (default)".to_string(),
        },
    };
    if step.force {
        line.push_str(" [forced]");
    }
    if !step.instruction.trim().is_empty() {
        line.push_str(&format!("  \"{}\"", step.instruction));
    }
    line
}

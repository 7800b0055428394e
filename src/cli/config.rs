use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Subcommand};
use serde_json::{Map, Value as JsonValue};
use tokio::fs;
use tracing::info;

use super::context::CliContext;
use crate::config::Config;

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration (secrets masked)
    Show,

    /// Write one dotted key, e.g. `run.stop_on_failure true`
    Set {
        key: String,
        /// Parsed as JSON when possible, otherwise kept as a string
        value: String,
    },

    /// Print one dotted key from the effective configuration
    Get { key: String },

    /// Overwrite the config file with defaults
    Reset,

    /// Parse the config file and check value ranges
    Validate,
}

pub async fn cmd_config(args: ConfigArgs, ctx: &CliContext) -> Result<()> {
    let path = ctx.config_path();
    match args.action {
        ConfigAction::Show => {
            println!("# effective configuration ({})", path.display());
            print!("{}", serde_yaml::to_string(&ctx.config().redacted())?);
        }
        ConfigAction::Get { key } => {
            let doc = serde_json::to_value(ctx.config().redacted())?;
            let segments = split_key(&key)?;
            let value = lookup(&doc, &segments)
                .ok_or_else(|| anyhow!("{} is not a configuration key", key))?;
            print!("{}", serde_yaml::to_string(value)?);
        }
        ConfigAction::Set { key, value } => {
            let mut doc = serde_json::to_value(read_file(path).await?)?;
            let segments = split_key(&key)?;
            assign(&mut doc, &segments, parse_cli_value(&value))?;
            let updated: Config = serde_json::from_value(doc)
                .with_context(|| format!("{} = {} does not fit the configuration", key, value))?;
            write_file(path, &updated).await?;
            info!(key = %key, "configuration updated");
            println!("Saved {} to {}", key, path.display());
        }
        ConfigAction::Reset => {
            write_file(path, &Config::default()).await?;
            println!("Wrote default configuration to {}", path.display());
        }
        ConfigAction::Validate => {
            if !fs::try_exists(path).await? {
                println!("No file at {}; defaults apply", path.display());
                return Ok(());
            }
            let config = read_file(path).await?;
            let problems = range_problems(&config);
            if !problems.is_empty() {
                for problem in &problems {
                    eprintln!("  - {}", problem);
                }
                bail!("{} has {} invalid value(s)", path.display(), problems.len());
            }
            println!("{} is valid", path.display());
        }
    }
    Ok(())
}

async fn read_file(path: &Path) -> Result<Config> {
    if !fs::try_exists(path).await? {
        return Ok(Config::default());
    }
    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    serde_yaml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

async fn write_file(path: &Path, config: &Config) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    fs::write(path, serde_yaml::to_string(config)?)
        .await
        .with_context(|| format!("writing {}", path.display()))
}

fn range_problems(config: &Config) -> Vec<String> {
    let mut problems = Vec::new();
    let tiers = &config.resolver.tiers;
    if tiers.probe_workers == 0 {
        problems.push("resolver.probe_workers must be at least 1".to_string());
    }
    if tiers.vision_attempts == 0 {
        problems.push("resolver.vision_attempts must be at least 1".to_string());
    }
    let min_confidence = config.resolver.cache.min_confidence;
    if !(0.0..=1.0).contains(&min_confidence) {
        problems.push(format!(
            "resolver.cache.min_confidence {} is outside 0..=1",
            min_confidence
        ));
    }
    if config.context.lifetime_steps == 0 {
        problems.push("context.lifetime_steps must be at least 1".to_string());
    }
    if config.run.step_timeout_secs == 0 {
        problems.push("run.step_timeout_secs must be at least 1".to_string());
    }
    if let Some(base) = &config.run.base_url {
        if let Err(err) = url::Url::parse(base) {
            problems.push(format!("run.base_url '{}': {}", base, err));
        }
    }
    problems
}

fn parse_cli_value(raw: &str) -> JsonValue {
    serde_json::from_str(raw).unwrap_or_else(|_| JsonValue::String(raw.to_string()))
}

fn split_key(key: &str) -> Result<Vec<&str>> {
    let segments: Vec<&str> = key.split('.').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        bail!("configuration key cannot be empty");
    }
    Ok(segments)
}

fn assign(target: &mut JsonValue, path: &[&str], value: JsonValue) -> Result<()> {
    let Some((last, parents)) = path.split_last() else {
        bail!("configuration key cannot be empty");
    };
    let mut current = target;
    for segment in parents {
        current = as_object(current, segment)?
            .entry((*segment).to_string())
            .or_insert(JsonValue::Null);
    }
    as_object(current, last)?.insert((*last).to_string(), value);
    Ok(())
}

fn as_object<'a>(value: &'a mut JsonValue, segment: &str) -> Result<&'a mut Map<String, JsonValue>> {
    if value.is_null() {
        *value = JsonValue::Object(Map::new());
    }
    match value {
        JsonValue::Object(map) => Ok(map),
        _ => bail!("'{}' sits under a scalar value", segment),
    }
}

fn lookup<'a>(value: &'a JsonValue, path: &[&str]) -> Option<&'a JsonValue> {
    path.iter()
        .try_fold(value, |current, segment| current.as_object()?.get(*segment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_keys_are_created_and_read_back() {
        let mut doc = json!({ "run": { "stop_on_failure": false } });
        assign(&mut doc, &["run", "stop_on_failure"], JsonValue::Bool(true)).unwrap();
        assign(&mut doc, &["resolver", "cache", "ttl_secs"], JsonValue::from(30)).unwrap();
        assert_eq!(
            lookup(&doc, &["run", "stop_on_failure"]),
            Some(&JsonValue::Bool(true))
        );
        assert_eq!(
            lookup(&doc, &["resolver", "cache", "ttl_secs"]),
            Some(&JsonValue::from(30))
        );
        assert!(lookup(&doc, &["run", "missing"]).is_none());
    }

    #[test]
    fn assigning_below_a_scalar_fails() {
        let mut doc = json!({ "run": { "step_timeout_secs": 120 } });
        let err = assign(&mut doc, &["run", "step_timeout_secs", "inner"], JsonValue::Null)
            .unwrap_err();
        assert!(err.to_string().contains("inner"));
    }

    #[test]
    fn cli_values_prefer_json() {
        assert_eq!(parse_cli_value("true"), JsonValue::Bool(true));
        assert_eq!(parse_cli_value("45"), JsonValue::from(45));
        assert_eq!(parse_cli_value("gpt-4o"), JsonValue::from("gpt-4o"));
    }

    #[test]
    fn out_of_range_values_are_reported() {
        let mut config = Config::default();
        config.resolver.cache.min_confidence = 1.5;
        config.run.step_timeout_secs = 0;
        let problems = range_problems(&config);
        assert_eq!(problems.len(), 2);
        assert!(range_problems(&Config::default()).is_empty());
    }

    #[tokio::test]
    async fn set_round_trips_through_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        let ctx = CliContext::new(Config::default(), path.clone());
        cmd_config(
            ConfigArgs {
                action: ConfigAction::Set {
                    key: "run.step_timeout_secs".into(),
                    value: "45".into(),
                },
            },
            &ctx,
        )
        .await
        .unwrap();
        let saved = read_file(&path).await.unwrap();
        assert_eq!(saved.run.step_timeout_secs, 45);
    }
}

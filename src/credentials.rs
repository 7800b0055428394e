//! Credential providers for `{cred:service.key}` placeholders.

use std::collections::BTreeMap;
use std::path::Path;

use action_primitives::{CredentialProvider, MapCredentials};
use tracing::{debug, info};

use crate::errors::StepwrightError;

pub const ENV_PREFIX: &str = "STEPWRIGHT_CRED_";

/// Reads `service.key` from `STEPWRIGHT_CRED_<SERVICE>_<KEY>`.
///
/// Service and key are upper-cased and every non-alphanumeric character becomes
/// `_`, so `ai-hub.api key` maps to `STEPWRIGHT_CRED_AI_HUB_API_KEY`.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvCredentials;

impl EnvCredentials {
    pub fn variable_name(path: &str) -> Option<String> {
        let (service, key) = path.trim().split_once('.')?;
        if service.is_empty() || key.is_empty() {
            return None;
        }
        Some(format!("{}{}_{}", ENV_PREFIX, env_segment(service), env_segment(key)))
    }
}

fn env_segment(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

impl CredentialProvider for EnvCredentials {
    fn get(&self, path: &str) -> Option<String> {
        let name = Self::variable_name(path)?;
        let value = std::env::var(&name).ok();
        debug!(variable = %name, found = value.is_some(), "credential lookup");
        value
    }
}

/// First provider that knows the path wins.
pub struct ChainedCredentials {
    providers: Vec<Box<dyn CredentialProvider>>,
}

impl ChainedCredentials {
    pub fn new(providers: Vec<Box<dyn CredentialProvider>>) -> Self {
        Self { providers }
    }
}

impl CredentialProvider for ChainedCredentials {
    fn get(&self, path: &str) -> Option<String> {
        self.providers.iter().find_map(|p| p.get(path))
    }
}

/// Parses `service: { key: value }` YAML into an in-memory provider.
pub fn parse_credentials(raw: &str, source_name: &str) -> Result<MapCredentials, StepwrightError> {
    let services: BTreeMap<String, BTreeMap<String, serde_yaml::Value>> =
        serde_yaml::from_str(raw).map_err(|err| StepwrightError::Credentials {
            path: source_name.to_string(),
            message: err.to_string(),
        })?;

    let mut credentials = MapCredentials::new();
    for (service, entries) in services {
        for (key, value) in entries {
            let value = match value {
                serde_yaml::Value::String(s) => s,
                serde_yaml::Value::Number(n) => n.to_string(),
                serde_yaml::Value::Bool(b) => b.to_string(),
                _ => {
                    return Err(StepwrightError::Credentials {
                        path: source_name.to_string(),
                        message: format!("{}.{} must be a scalar", service, key),
                    })
                }
            };
            credentials.insert(format!("{}.{}", service, key), value);
        }
    }
    Ok(credentials)
}

pub async fn load_credentials_file(path: &Path) -> Result<MapCredentials, StepwrightError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|err| StepwrightError::io(path, err))?;
    let credentials = parse_credentials(&raw, &path.display().to_string())?;
    info!(path = %path.display(), entries = credentials.len(), "loaded credentials file");
    Ok(credentials)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn variable_names_are_normalised() {
        assert_eq!(
            EnvCredentials::variable_name("ai-hub.api key").as_deref(),
            Some("STEPWRIGHT_CRED_AI_HUB_API_KEY")
        );
        assert_eq!(EnvCredentials::variable_name("nodot"), None);
        assert_eq!(EnvCredentials::variable_name(".password"), None);
    }

    #[test]
    #[serial]
    fn env_provider_reads_the_process_environment() {
        std::env::set_var("STEPWRIGHT_CRED_AIHUB_PASSWORD", "hunter2");
        assert_eq!(EnvCredentials.get("aihub.password").as_deref(), Some("hunter2"));
        std::env::remove_var("STEPWRIGHT_CRED_AIHUB_PASSWORD");
        assert_eq!(EnvCredentials.get("aihub.password"), None);
    }

    #[test]
    fn yaml_file_flattens_services() {
        let creds = parse_credentials(
            "aihub:\n  username: qa@example.com\n  pin: 4821\nmail:\n  token: abc\n",
            "inline",
        )
        .unwrap();
        assert_eq!(creds.len(), 3);
        assert_eq!(creds.get("aihub.username").as_deref(), Some("qa@example.com"));
        assert_eq!(creds.get("aihub.pin").as_deref(), Some("4821"));
    }

    #[test]
    fn nested_values_are_rejected() {
        let err = parse_credentials("aihub:\n  login:\n    user: x\n", "inline").unwrap_err();
        assert!(err.to_string().contains("aihub.login"));
    }

    #[test]
    #[serial]
    fn chain_prefers_the_first_provider() {
        std::env::set_var("STEPWRIGHT_CRED_MAIL_TOKEN", "from-env");
        std::env::set_var("STEPWRIGHT_CRED_MAIL_USER", "qa");
        let file = parse_credentials("mail:\n  token: from-file\n", "inline").unwrap();
        let chain = ChainedCredentials::new(vec![Box::new(file), Box::new(EnvCredentials)]);
        assert_eq!(chain.get("mail.token").as_deref(), Some("from-file"));
        assert_eq!(chain.get("mail.user").as_deref(), Some("qa"));
        std::env::remove_var("STEPWRIGHT_CRED_MAIL_TOKEN");
        std::env::remove_var("STEPWRIGHT_CRED_MAIL_USER");
    }
}

//! Test plan files: a named list of already-parsed action plans.

use std::path::Path;

use serde::{Deserialize, Serialize};
use stepwright_core_types::{ActionPlan, ActionType};
use url::Url;

use crate::errors::StepwrightError;

/// YAML test plan.
///
/// ```yaml
/// name: create chatbot
/// base_url: https://app.example.com
/// steps:
///   - action: navigate
///     value: /studio
///   - action: click
///     target: Create dropdown
///     instruction: click on Create dropdown
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestPlan {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub steps: Vec<ActionPlan>,
}

impl TestPlan {
    pub fn new(name: impl Into<String>, steps: Vec<ActionPlan>) -> Self {
        Self {
            name: name.into(),
            base_url: None,
            steps,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn from_yaml(raw: &str, source_name: &str) -> Result<Self, StepwrightError> {
        let plan: TestPlan =
            serde_yaml::from_str(raw).map_err(|err| StepwrightError::PlanParse {
                source_name: source_name.to_string(),
                message: err.to_string(),
            })?;
        plan.validate()?;
        Ok(plan)
    }

    pub async fn load(path: &Path) -> Result<Self, StepwrightError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|err| StepwrightError::io(path, err))?;
        Self::from_yaml(&raw, &path.display().to_string())
    }

    /// Checks that every step carries what its action needs.
    pub fn validate(&self) -> Result<(), StepwrightError> {
        if self.steps.is_empty() {
            return Err(StepwrightError::EmptyPlan(self.name.clone()));
        }
        if let Some(base) = &self.base_url {
            Url::parse(base).map_err(|err| StepwrightError::BaseUrl {
                url: base.clone(),
                message: err.to_string(),
            })?;
        }
        for (index, step) in self.steps.iter().enumerate() {
            if let Some(reason) = missing_input(step) {
                return Err(StepwrightError::InvalidStep {
                    step: index + 1,
                    reason: reason.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Resolves a navigate target against `base_url`. Absolute urls and plans
    /// without a base are returned unchanged.
    pub fn resolve_url(&self, raw: &str) -> String {
        resolve_against(self.base_url.as_deref(), raw)
    }
}

pub(crate) fn resolve_against(base: Option<&str>, raw: &str) -> String {
    let raw = raw.trim();
    if Url::parse(raw).is_ok() {
        return raw.to_string();
    }
    base.and_then(|b| Url::parse(b).ok())
        .and_then(|b| b.join(raw).ok())
        .map(|u| u.to_string())
        .unwrap_or_else(|| raw.to_string())
}

fn missing_input(step: &ActionPlan) -> Option<&'static str> {
    let blank = |s: &Option<String>| s.as_deref().map_or(true, |v| v.trim().is_empty());
    match step.action_type {
        ActionType::Click if step.target.trim().is_empty() => Some("click step without a target"),
        ActionType::Type if blank(&step.value) => Some("type step without text"),
        ActionType::Type if step.search_text().trim().is_empty() => {
            Some("type step without a field")
        }
        ActionType::Navigate if blank(&step.value) && step.target.trim().is_empty() => {
            Some("navigate step without a url")
        }
        ActionType::Verify if step.verification.is_none() => Some("verify step without a kind"),
        ActionType::Upload if blank(&step.value) => Some("upload step without a file"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepwright_core_types::{VerificationKind, WaitMode};

    const SAMPLE: &str = r#"
name: create chatbot
base_url: https://app.example.com/
steps:
  - action: navigate
    value: studio
  - action: click
    target: Create dropdown
    instruction: click on Create dropdown
  - action: click
    target: Chatbot
    instruction: click on Chatbot from dropdown
  - action: type
    target: bot name
    field: bot name
    value: "{cred:studio.bot_name}"
  - action: verify
    verification:
      kind: url_redirect_with_pattern
      prefix: https://app.example.com/app/
      suffix: /configuration
  - action: wait
    wait:
      mode: duration
      ms: 500
"#;

    #[test]
    fn sample_plan_parses() {
        let plan = TestPlan::from_yaml(SAMPLE, "sample").unwrap();
        assert_eq!(plan.name, "create chatbot");
        assert_eq!(plan.steps.len(), 6);
        assert_eq!(plan.steps[1].action_type, ActionType::Click);
        assert_eq!(
            plan.steps[4].verification,
            Some(VerificationKind::UrlRedirectWithPattern {
                prefix: "https://app.example.com/app/".into(),
                suffix: "/configuration".into(),
            })
        );
        assert_eq!(plan.steps[5].wait, Some(WaitMode::Duration { ms: 500 }));
    }

    #[test]
    fn relative_urls_join_the_base() {
        let plan = TestPlan::from_yaml(SAMPLE, "sample").unwrap();
        assert_eq!(plan.resolve_url("studio"), "https://app.example.com/studio");
        assert_eq!(plan.resolve_url("https://other.test/x"), "https://other.test/x");
        assert_eq!(resolve_against(None, "studio"), "studio");
    }

    #[test]
    fn steps_missing_input_are_rejected() {
        let plan = TestPlan::new(
            "broken",
            vec![
                ActionPlan::click("Save"),
                ActionPlan::new(ActionType::Type, "email"),
            ],
        );
        match plan.validate() {
            Err(StepwrightError::InvalidStep { step, reason }) => {
                assert_eq!(step, 2);
                assert_eq!(reason, "type step without text");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn empty_plan_and_bad_base_are_rejected() {
        assert!(matches!(
            TestPlan::new("nothing", Vec::new()).validate(),
            Err(StepwrightError::EmptyPlan(_))
        ));
        let plan = TestPlan::new("bad", vec![ActionPlan::click("Save")]).with_base_url("not a url");
        assert!(matches!(plan.validate(), Err(StepwrightError::BaseUrl { .. })));
    }

    #[test]
    fn unknown_action_is_a_parse_error() {
        let err = TestPlan::from_yaml("name: x\nsteps:\n  - action: hover\n", "inline").unwrap_err();
        assert!(matches!(err, StepwrightError::PlanParse { .. }));
    }
}

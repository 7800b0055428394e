use serde::{Deserialize, Serialize};

use crate::ActionType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    Failed,
    Error,
}

impl StepStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, StepStatus::Success)
    }

    pub fn name(&self) -> &'static str {
        match self {
            StepStatus::Success => "success",
            StepStatus::Failed => "failed",
            StepStatus::Error => "error",
        }
    }
}

/// Per-phase timings in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimingBreakdown {
    pub parse_ms: u64,
    pub resolve_ms: u64,
    pub execute_ms: u64,
    pub total_ms: u64,
}

/// Terminal record of one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepExecutionResult {
    pub step_number: usize,
    pub instruction: String,
    pub action_type: ActionType,
    pub status: StepStatus,
    pub timing: TimingBreakdown,
    pub error_message: Option<String>,
}

impl StepExecutionResult {
    pub fn success(
        step_number: usize,
        instruction: impl Into<String>,
        action_type: ActionType,
        timing: TimingBreakdown,
    ) -> Self {
        Self {
            step_number,
            instruction: instruction.into(),
            action_type,
            status: StepStatus::Success,
            timing,
            error_message: None,
        }
    }

    pub fn failed(
        step_number: usize,
        instruction: impl Into<String>,
        action_type: ActionType,
        timing: TimingBreakdown,
        error: impl Into<String>,
    ) -> Self {
        Self {
            step_number,
            instruction: instruction.into(),
            action_type,
            status: StepStatus::Failed,
            timing,
            error_message: Some(error.into()),
        }
    }

    pub fn error(
        step_number: usize,
        instruction: impl Into<String>,
        action_type: ActionType,
        timing: TimingBreakdown,
        error: impl Into<String>,
    ) -> Self {
        Self {
            status: StepStatus::Error,
            ..Self::failed(step_number, instruction, action_type, timing, error)
        }
    }
}

//! JSON schema types for workflow definitions.
//!
//! A saved workflow is an ordered list of prompt steps plus the variables
//! substituted into them:
//!
//! ```json
//! {
//!   "name": "Bug Fix & Test",
//!   "description": "Diagnose a bug, fix it, write a regression test",
//!   "steps": [
//!     {
//!       "name": "1. Diagnose Bug",
//!       "prompt": "There is a bug in {project_path}: '{bug_description}'.",
//!       "delay_after": 5.0,
//!       "condition": "",
//!       "enabled": true
//!     }
//!   ],
//!   "variables": { "project_path": "/src/app" },
//!   "created_at": "2025-06-01T10:00:00Z"
//! }
//! ```
//!
//! Step status, result and timestamps are run-time only and never persisted.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::{Captures, Regex};
use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::RwLock;

/// A workflow shared between the authoring surface and a running engine.
pub type SharedWorkflow = Arc<RwLock<Workflow>>;

/// Execution status of a single step within one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        }
    }

    /// Whether the step reached an outcome for the current pass.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepStatus::Completed | StepStatus::Failed | StepStatus::Skipped
        )
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single prompt step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// Display label (not required to be unique)
    #[serde(default = "default_step_name")]
    pub name: String,

    /// Prompt template; `{variable}` placeholders are substituted at dispatch time
    #[serde(default)]
    pub prompt: String,

    /// Seconds to wait after this step (ignored when waiting for completion)
    #[serde(default = "default_delay_after")]
    pub delay_after: f64,

    /// Free-form condition text, carried for round-tripping; not evaluated
    #[serde(default)]
    pub condition: String,

    /// Disabled steps are recorded as skipped
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(skip)]
    pub status: StepStatus,

    /// Dispatcher status text on success, error text on failure
    #[serde(skip)]
    pub result: String,

    #[serde(skip)]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(skip)]
    pub completed_at: Option<DateTime<Utc>>,
}

fn default_step_name() -> String {
    "Untitled Step".to_string()
}

pub(crate) fn default_delay_after() -> f64 {
    3.0
}

fn default_true() -> bool {
    true
}

impl WorkflowStep {
    pub fn new(name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prompt: prompt.into(),
            delay_after: default_delay_after(),
            condition: String::new(),
            enabled: true,
            status: StepStatus::Pending,
            result: String::new(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn with_delay(mut self, seconds: f64) -> Self {
        self.delay_after = seconds;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// The post-step delay; negative or non-finite values count as zero.
    pub fn delay(&self) -> Duration {
        if self.delay_after.is_finite() && self.delay_after > 0.0 {
            Duration::try_from_secs_f64(self.delay_after).unwrap_or(Duration::ZERO)
        } else {
            Duration::ZERO
        }
    }

    /// Clear run-time state back to `pending`.
    pub fn reset(&mut self) {
        self.status = StepStatus::Pending;
        self.result.clear();
        self.started_at = None;
        self.completed_at = None;
    }
}

/// An ordered list of steps plus substitution variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(default = "default_workflow_name")]
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Execution order is list order
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,

    /// `{key}` → value, applied to every step prompt at dispatch time
    #[serde(default)]
    pub variables: HashMap<String, String>,

    #[serde(default = "Utc::now", deserialize_with = "lenient_timestamp")]
    pub created_at: DateTime<Utc>,
}

fn default_workflow_name() -> String {
    "Untitled".to_string()
}

/// Accepts RFC 3339 as well as naive ISO-8601 timestamps (no offset, read as
/// UTC); anything else falls back to the load time.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp).unwrap_or_else(Utc::now))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{([^{}]*)\}").expect("placeholder pattern is valid"))
}

impl Workflow {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            steps: Vec::new(),
            variables: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_step(mut self, step: WorkflowStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    /// Wrap into the shared handle the engine runs against.
    pub fn into_shared(self) -> SharedWorkflow {
        Arc::new(RwLock::new(self))
    }

    pub fn add_step(&mut self, step: WorkflowStep) {
        self.steps.push(step);
    }

    /// Insert at `index`, clamped to the end of the list.
    pub fn insert_step(&mut self, index: usize, step: WorkflowStep) {
        let index = index.min(self.steps.len());
        self.steps.insert(index, step);
    }

    /// Remove the step at `index`; out-of-range indices are ignored.
    pub fn remove_step(&mut self, index: usize) -> Option<WorkflowStep> {
        if index < self.steps.len() {
            Some(self.steps.remove(index))
        } else {
            None
        }
    }

    /// Move a step from `from` to `to`; a no-op unless both are in range.
    pub fn move_step(&mut self, from: usize, to: usize) {
        let len = self.steps.len();
        if from < len && to < len {
            let step = self.steps.remove(from);
            self.steps.insert(to, step);
        }
    }

    /// Substitute `{key}` for every key present in `variables`.
    ///
    /// Single pass: substituted values are not scanned again, and unknown
    /// placeholders stay as literal text.
    pub fn resolve_prompt(&self, step: &WorkflowStep) -> String {
        self.resolve_template(&step.prompt)
    }

    pub fn resolve_template(&self, template: &str) -> String {
        if self.variables.is_empty() {
            return template.to_string();
        }
        placeholder_pattern()
            .replace_all(template, |caps: &Captures| match self.variables.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    /// Placeholder names used by any step prompt, sorted and deduplicated.
    /// `{}` is not a placeholder.
    pub fn placeholders(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .steps
            .iter()
            .flat_map(|step| {
                placeholder_pattern()
                    .captures_iter(&step.prompt)
                    .map(|caps| caps[1].to_string())
            })
            .filter(|name| !name.is_empty())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Reset every step to `pending`.
    pub fn reset_steps(&mut self) {
        for step in &mut self.steps {
            step.reset();
        }
    }

    pub fn enabled_step_count(&self) -> usize {
        self.steps.iter().filter(|s| s.enabled).count()
    }

    /// Parse a workflow from its persisted JSON form.
    pub fn from_json(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| format!("Failed to parse workflow JSON: {}", e))
    }

    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize workflow '{}': {}", self.name, e))
    }
}

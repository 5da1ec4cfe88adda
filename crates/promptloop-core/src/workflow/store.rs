//! Workflow store — one JSON file per workflow in a directory.
//!
//! File names are derived from the workflow name:
//! `"Bug Fix & Test"` → `workflow_bug_fix_&_test.json`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AutomationError, Result};
use crate::workflow::schema::Workflow;

const FILE_PREFIX: &str = "workflow_";
const FILE_SUFFIX: &str = ".json";

/// Saves and loads workflows in a single directory.
#[derive(Debug, Clone)]
pub struct WorkflowStore {
    dir: PathBuf,
}

impl WorkflowStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Store rooted at `<config_dir>/promptloop/workflows`.
    pub fn default_location() -> Self {
        Self::new(default_workflow_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name for a workflow: lowercase, spaces and path separators
    /// replaced by `_`, wrapped in the fixed prefix/suffix.
    pub fn file_name_for(name: &str) -> String {
        let safe: String = name
            .to_lowercase()
            .chars()
            .map(|c| match c {
                ' ' | '/' | '\\' => '_',
                other => other,
            })
            .collect();
        format!("{}{}{}", FILE_PREFIX, safe, FILE_SUFFIX)
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(Self::file_name_for(name))
    }

    /// Write the workflow, creating the directory if needed.
    pub fn save(&self, workflow: &Workflow) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(&workflow.name);
        let json = serde_json::to_string_pretty(workflow)?;
        std::fs::write(&path, json)?;
        tracing::info!(
            "[WorkflowStore] Saved workflow '{}' to {}",
            workflow.name,
            path.display()
        );
        Ok(path)
    }

    /// Load one workflow file. Every step comes back `pending`.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Workflow> {
        load_file(path.as_ref())
    }

    /// Load a saved workflow by name.
    pub fn load_by_name(&self, name: &str) -> Result<Workflow> {
        let path = self.path_for(name);
        if !path.is_file() {
            return Err(AutomationError::NotFound(format!(
                "workflow '{}' ({})",
                name,
                path.display()
            )));
        }
        load_file(&path)
    }

    /// Load every `workflow_*.json` in the directory, keyed by workflow name.
    /// Files that fail to parse are logged and skipped; a missing directory
    /// yields an empty map.
    pub fn load_all(&self) -> HashMap<String, Workflow> {
        let mut workflows = HashMap::new();
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => return workflows,
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let file_name = entry.file_name().to_string_lossy().to_string();
            if !file_name.starts_with(FILE_PREFIX) || !file_name.ends_with(FILE_SUFFIX) {
                continue;
            }
            match load_file(&path) {
                Ok(wf) => {
                    workflows.insert(wf.name.clone(), wf);
                }
                Err(e) => {
                    tracing::warn!("[WorkflowStore] Failed to load workflow {}: {}", file_name, e);
                }
            }
        }

        workflows
    }
}

fn load_file(path: &Path) -> Result<Workflow> {
    let content = std::fs::read_to_string(path)?;
    let workflow: Workflow = serde_json::from_str(&content).map_err(|e| {
        AutomationError::Parse(format!("workflow file '{}': {}", path.display(), e))
    })?;
    Ok(workflow)
}

/// `<config_dir>/promptloop/workflows`, or `./workflows` when the platform
/// has no config directory.
pub fn default_workflow_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("promptloop").join("workflows"))
        .unwrap_or_else(|| PathBuf::from("workflows"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::schema::{StepStatus, WorkflowStep};

    #[test]
    fn test_file_name_sanitizing() {
        assert_eq!(
            WorkflowStore::file_name_for("Bug Fix & Test"),
            "workflow_bug_fix_&_test.json"
        );
        assert_eq!(
            WorkflowStore::file_name_for("Analyze/Fix Sync"),
            "workflow_analyze_fix_sync.json"
        );
    }

    #[test]
    fn test_save_load_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = WorkflowStore::new(tmp.path().join("nested"));

        let mut wf = Workflow::new("Round Trip", "desc")
            .with_variable("k", "v")
            .with_step(WorkflowStep::new("one", "hello {k}").with_delay(1.0))
            .with_step(WorkflowStep::new("two", "bye").disabled());
        wf.steps[0].status = StepStatus::Completed;

        let path = store.save(&wf).unwrap();
        assert!(path.ends_with("workflow_round_trip.json"));

        let loaded = store.load(&path).unwrap();
        assert_eq!(loaded.name, "Round Trip");
        assert_eq!(loaded.variables.get("k").map(String::as_str), Some("v"));
        assert_eq!(loaded.steps[0].status, StepStatus::Pending);
        assert!(!loaded.steps[1].enabled);
        assert_eq!(loaded.created_at, wf.created_at);

        let by_name = store.load_by_name("Round Trip").unwrap();
        assert_eq!(by_name.steps.len(), 2);
    }

    #[test]
    fn test_load_all_skips_foreign_and_broken_files() {
        let tmp = tempfile::tempdir().unwrap();
        let store = WorkflowStore::new(tmp.path());
        store.save(&Workflow::new("Good", "")).unwrap();
        std::fs::write(tmp.path().join("workflow_broken.json"), "{ not json").unwrap();
        std::fs::write(tmp.path().join("notes.json"), "{}").unwrap();

        let all = store.load_all();
        assert_eq!(all.len(), 1);
        assert!(all.contains_key("Good"));
    }

    #[test]
    fn test_load_all_missing_dir_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let store = WorkflowStore::new(tmp.path().join("does-not-exist"));
        assert!(store.load_all().is_empty());
        assert!(matches!(
            store.load_by_name("nope"),
            Err(AutomationError::NotFound(_))
        ));
    }
}

//! Runtime configuration loaded from YAML.
//!
//! ```yaml
//! project_path: "/home/me/flutter_app"
//! editor: windsurf          # antigravity | windsurf | cursor | clipboard
//! mode: auto_interact       # clipboard | file_drop | terminal | auto_interact
//! auto_focus: true
//! launch_if_missing: false
//! workflow_dir: "~/.config/promptloop/workflows"
//!
//! detector:
//!   warmup_secs: 3
//!   poll_interval_secs: 2
//!   timeout_secs: 300
//!   required_stable: 3
//!   fallback_stable: 6
//!   cpu_busy_threshold: 15
//!
//! bridge:
//!   post_completion_delay_secs: 2
//!
//! engine:
//!   loop_mode: false
//!   loop_interval_secs: 120
//!   wait_for_completion: true
//! ```
//!
//! Every key is optional; unknown keys are ignored.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::bridge::detector::{secs, DetectorConfig};
use crate::bridge::editor::BridgeSettings;
use crate::bridge::editors::{DeliveryMode, EditorKind};
use crate::error::{AutomationError, Result};
use crate::workflow::store::{default_workflow_dir, WorkflowStore};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    /// Project the prompts act on; defaults to the working directory
    pub project_path: Option<PathBuf>,
    pub editor: EditorKind,
    pub mode: DeliveryMode,
    pub auto_focus: bool,
    pub launch_if_missing: bool,
    /// Saved workflow directory; defaults to `<config_dir>/promptloop/workflows`
    pub workflow_dir: Option<PathBuf>,
    pub detector: DetectorConfig,
    pub bridge: BridgeSection,
    pub engine: EngineSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeSection {
    pub post_completion_delay_secs: f64,
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            post_completion_delay_secs: 2.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub loop_mode: bool,
    pub loop_interval_secs: f64,
    /// Dispatch with send-and-wait instead of send plus the step delay
    pub wait_for_completion: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            loop_mode: false,
            loop_interval_secs: 120.0,
            wait_for_completion: false,
        }
    }
}

impl EngineSettings {
    pub fn loop_interval(&self) -> Duration {
        secs(self.loop_interval_secs)
    }
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            project_path: None,
            editor: EditorKind::default(),
            mode: DeliveryMode::default(),
            auto_focus: true,
            launch_if_missing: false,
            workflow_dir: None,
            detector: DetectorConfig::default(),
            bridge: BridgeSection::default(),
            engine: EngineSettings::default(),
        }
    }
}

impl AutomationConfig {
    /// Load from `path`, else from [`Self::default_path`] if it exists, else
    /// return the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.is_file() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AutomationError::Config(format!("failed to read '{}': {}", path.display(), e))
        })?;
        let config = Self::from_yaml(&content)
            .map_err(|e| AutomationError::Config(format!("'{}': {}", path.display(), e)))?;
        tracing::info!("[AutomationConfig] Loaded {}", path.display());
        Ok(config)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty document deserializes to unit, not a map.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// `<config_dir>/promptloop/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("promptloop").join("config.yaml"))
    }

    pub fn validate(&self) -> Result<()> {
        self.detector.validate().map_err(AutomationError::Config)?;
        if !self.engine.loop_interval_secs.is_finite() || self.engine.loop_interval_secs < 0.0 {
            return Err(AutomationError::Config(
                "engine.loop_interval_secs must be a non-negative number".to_string(),
            ));
        }
        Ok(())
    }

    pub fn project_path(&self) -> PathBuf {
        self.project_path
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn workflow_store(&self) -> WorkflowStore {
        WorkflowStore::new(
            self.workflow_dir
                .clone()
                .unwrap_or_else(default_workflow_dir),
        )
    }

    pub fn bridge_settings(&self) -> BridgeSettings {
        BridgeSettings {
            project_path: self.project_path(),
            editor: self.editor,
            mode: self.mode,
            auto_focus: self.auto_focus,
            launch_if_missing: self.launch_if_missing,
            detector: self.detector.clone(),
            post_completion_delay: secs(self.bridge.post_completion_delay_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = AutomationConfig::from_yaml(
            r#"
editor: cursor
mode: file_drop
detector:
  timeout_secs: 60
engine:
  loop_mode: true
unknown_key: 1
"#,
        )
        .unwrap();

        assert_eq!(config.editor, EditorKind::Cursor);
        assert_eq!(config.mode, DeliveryMode::FileDrop);
        assert!(config.auto_focus);
        assert_eq!(config.detector.timeout(), Duration::from_secs(60));
        assert_eq!(config.detector.required_stable, 3);
        assert_eq!(config.detector.fallback_stable, 6);
        assert!(config.engine.loop_mode);
        assert_eq!(config.engine.loop_interval(), Duration::from_secs(120));
        assert_eq!(
            config.bridge_settings().post_completion_delay,
            Duration::from_secs(2)
        );
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let config = AutomationConfig::from_yaml("  \n").unwrap();
        assert_eq!(config.editor, EditorKind::Antigravity);
        assert_eq!(config.mode, DeliveryMode::Clipboard);
        assert!(config.auto_focus);
        assert!(!config.engine.wait_for_completion);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            AutomationConfig::from_yaml("detector:\n  poll_interval_secs: 0\n"),
            Err(AutomationError::Config(_))
        ));
        assert!(matches!(
            AutomationConfig::from_yaml("editor: notepad\n"),
            Err(AutomationError::Parse(_))
        ));
    }

    #[test]
    fn test_load_explicit_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.yaml");
        std::fs::write(
            &path,
            format!(
                "project_path: {}\nworkflow_dir: {}\n",
                tmp.path().display(),
                tmp.path().join("wf").display()
            ),
        )
        .unwrap();

        let config = AutomationConfig::load(Some(&path)).unwrap();
        assert_eq!(config.project_path(), tmp.path());
        assert_eq!(config.workflow_store().dir(), tmp.path().join("wf"));

        let missing = AutomationConfig::load(Some(&tmp.path().join("nope.yaml")));
        assert!(matches!(missing, Err(AutomationError::Config(_))));
    }
}

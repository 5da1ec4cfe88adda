//! CLI command implementations.
//!
//! Each submodule corresponds to a top-level CLI command and drives the
//! promptloop-core engine and bridge directly.

pub mod send;
pub mod workflow;

use std::path::Path;

use promptloop_core::bridge::{DeliveryMode, EditorKind};
use promptloop_core::AutomationConfig;

/// Load the configuration (explicit path, else the default location, else
/// built-in defaults).
pub fn load_config(path: Option<&Path>) -> Result<AutomationConfig, String> {
    AutomationConfig::load(path).map_err(|e| e.to_string())
}

/// Apply `--mode` / `--editor` overrides on top of the loaded config.
pub fn apply_overrides(
    config: &mut AutomationConfig,
    mode: Option<&str>,
    editor: Option<&str>,
) -> Result<(), String> {
    if let Some(mode) = mode {
        config.mode = mode.parse::<DeliveryMode>()?;
    }
    if let Some(editor) = editor {
        config.editor = editor.parse::<EditorKind>()?;
    }
    Ok(())
}

/// Parse repeated `--var KEY=VALUE` arguments.
pub fn parse_vars(raw: &[String]) -> Result<Vec<(String, String)>, String> {
    raw.iter()
        .map(|entry| match entry.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), value.to_string()))
            }
            _ => Err(format!("Invalid variable '{}', expected KEY=VALUE", entry)),
        })
        .collect()
}

/// Pretty-print a JSON value to stdout.
pub fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    );
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vars() {
        let vars = parse_vars(&["feature_name=login".to_string(), "empty=".to_string()]).unwrap();
        assert_eq!(
            vars,
            vec![
                ("feature_name".to_string(), "login".to_string()),
                ("empty".to_string(), String::new()),
            ]
        );
        assert!(parse_vars(&["novalue".to_string()]).is_err());
        assert!(parse_vars(&["=x".to_string()]).is_err());
    }

    #[test]
    fn test_overrides() {
        let mut config = AutomationConfig::default();
        apply_overrides(&mut config, Some("terminal"), Some("cursor")).unwrap();
        assert_eq!(config.mode, DeliveryMode::Terminal);
        assert_eq!(config.editor, EditorKind::Cursor);
        assert!(apply_overrides(&mut config, Some("carrier-pigeon"), None).is_err());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Code Review & Refactor", 10), "Code Revi…");
    }
}

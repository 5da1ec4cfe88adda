//! Supported AI editors and their automation profiles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How an editor is found, driven and observed.
#[derive(Debug, Clone, Copy)]
pub struct EditorProfile {
    pub display: &'static str,
    /// Process names sampled for CPU activity
    pub process_names: &'static [&'static str],
    /// Window-title keywords used to locate the main window
    pub window_keywords: &'static [&'static str],
    /// Task directory (relative to the project) for file-drop delivery
    pub task_dir: &'static str,
    pub task_file: &'static str,
    /// Hotkey that opens the assistant chat panel
    pub chat_hotkey: &'static str,
    /// Title keywords that mean the assistant is still responding
    pub thinking_keywords: &'static [&'static str],
    /// Executable used to launch the editor on a project
    pub launch_command: Option<&'static str>,
}

const ANTIGRAVITY: EditorProfile = EditorProfile {
    display: "Antigravity (Gemini)",
    process_names: &["antigravity", "antigravity.exe"],
    window_keywords: &["antigravity"],
    task_dir: ".gemini",
    task_file: "task.md",
    chat_hotkey: "ctrl+shift+i",
    thinking_keywords: &["thinking", "generating", "loading", "processing"],
    launch_command: Some("antigravity"),
};

const WINDSURF: EditorProfile = EditorProfile {
    display: "Windsurf",
    process_names: &["windsurf", "Windsurf.exe", "Code.exe"],
    window_keywords: &["windsurf"],
    task_dir: ".windsurf/tasks",
    task_file: "auto_prompt_task.md",
    chat_hotkey: "ctrl+l",
    thinking_keywords: &["thinking", "generating", "writing", "cascade"],
    launch_command: Some("windsurf"),
};

const CURSOR: EditorProfile = EditorProfile {
    display: "Cursor",
    process_names: &["cursor", "Cursor.exe"],
    window_keywords: &["cursor"],
    task_dir: ".cursor",
    task_file: "task.md",
    chat_hotkey: "ctrl+l",
    thinking_keywords: &["thinking", "generating", "loading"],
    launch_command: Some("cursor"),
};

const CLIPBOARD_ONLY: EditorProfile = EditorProfile {
    display: "Clipboard Only",
    process_names: &[],
    window_keywords: &[],
    task_dir: "",
    task_file: "",
    chat_hotkey: "",
    thinking_keywords: &[],
    launch_command: None,
};

/// Target editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorKind {
    #[default]
    Antigravity,
    Windsurf,
    Cursor,
    Clipboard,
}

impl EditorKind {
    pub const ALL: [EditorKind; 4] = [
        EditorKind::Antigravity,
        EditorKind::Windsurf,
        EditorKind::Cursor,
        EditorKind::Clipboard,
    ];

    pub fn profile(&self) -> &'static EditorProfile {
        match self {
            EditorKind::Antigravity => &ANTIGRAVITY,
            EditorKind::Windsurf => &WINDSURF,
            EditorKind::Cursor => &CURSOR,
            EditorKind::Clipboard => &CLIPBOARD_ONLY,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EditorKind::Antigravity => "antigravity",
            EditorKind::Windsurf => "windsurf",
            EditorKind::Cursor => "cursor",
            EditorKind::Clipboard => "clipboard",
        }
    }
}

impl fmt::Display for EditorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EditorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EditorKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!(
                    "Unknown editor '{}'. Use antigravity, windsurf, cursor, or clipboard",
                    s
                )
            })
    }
}

/// How a prompt reaches the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Copy to the OS clipboard and focus the editor
    #[default]
    Clipboard,
    /// Write a task file the editor may watch
    FileDrop,
    /// Write the prompt to a fixed file for CLI ingestion
    Terminal,
    /// Focus the editor, open its chat, paste and submit
    AutoInteract,
}

impl DeliveryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMode::Clipboard => "clipboard",
            DeliveryMode::FileDrop => "file_drop",
            DeliveryMode::Terminal => "terminal",
            DeliveryMode::AutoInteract => "auto_interact",
        }
    }
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "clipboard" => Ok(DeliveryMode::Clipboard),
            "file_drop" => Ok(DeliveryMode::FileDrop),
            "terminal" => Ok(DeliveryMode::Terminal),
            "auto_interact" => Ok(DeliveryMode::AutoInteract),
            _ => Err(format!(
                "Unknown mode '{}'. Use clipboard, file_drop, terminal, or auto_interact",
                s
            )),
        }
    }
}

//! Editor bridge — delivers prompts to an AI coding editor.
//!
//! ```text
//!   send_prompt ──► DeliveryMode ──┬─ clipboard ─────► set_clipboard + focus
//!                                  ├─ file_drop ─────► <task_dir>/<task_file> + trigger
//!                                  ├─ terminal ──────► .auto_prompt_current.txt
//!                                  └─ auto_interact ─► focus → chat hotkey → paste → enter
//!
//!   send_and_wait ──► auto_interact ──► CompletionDetector ──► cooldown
//! ```
//!
//! Automation failures never abort a send: `auto_interact` degrades to
//! clipboard delivery, and a failed clipboard write degrades to the
//! terminal file.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tokio::sync::watch;

use crate::bridge::desktop::{DesktopDriver, SystemDesktop, WindowId};
use crate::bridge::detector::{self, CompletionDetector, DetectorConfig, Probe, WaitOutcome};
use crate::bridge::editors::{DeliveryMode, EditorKind, EditorProfile};
use crate::bridge::probe::{self, EditorProbe};
use crate::bridge::PromptDispatcher;
use crate::error::{AutomationError, Result};

/// File written by `terminal` delivery, relative to the project.
pub const TERMINAL_PROMPT_FILE: &str = ".auto_prompt_current.txt";
/// Written next to the task file on `file_drop` delivery.
pub const TRIGGER_FILE: &str = ".auto_prompt_trigger";

const PREVIEW_CHARS: usize = 100;
const LAUNCH_SETTLE: Duration = Duration::from_secs(5);
const FOCUS_SETTLE: Duration = Duration::from_millis(500);
const CHAT_PANEL_SETTLE: Duration = Duration::from_secs(1);
const CLIPBOARD_SETTLE: Duration = Duration::from_millis(200);
const PASTE_SETTLE: Duration = Duration::from_millis(500);
const SUBMIT_SETTLE: Duration = Duration::from_millis(300);

/// Live status reported while `send_and_wait` runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BridgeStatus {
    Typing,
    Waiting,
    Cooldown,
    Done,
}

impl BridgeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BridgeStatus::Typing => "typing",
            BridgeStatus::Waiting => "waiting",
            BridgeStatus::Cooldown => "cooldown",
            BridgeStatus::Done => "done",
        }
    }
}

pub type StatusListener = Arc<dyn Fn(BridgeStatus, &str) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchState {
    Sent,
    Error,
}

/// One entry of the in-memory send history.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchRecord {
    pub timestamp: DateTime<Utc>,
    pub editor: EditorKind,
    pub mode: DeliveryMode,
    pub prompt_preview: String,
    pub state: DispatchState,
    /// Set for `send_and_wait` dispatches
    pub outcome: Option<WaitOutcome>,
    pub result: String,
}

#[derive(Debug, Clone)]
pub struct BridgeSettings {
    pub project_path: PathBuf,
    pub editor: EditorKind,
    pub mode: DeliveryMode,
    /// Focus the editor window after a clipboard copy
    pub auto_focus: bool,
    /// Launch the editor when `auto_interact` cannot find its window
    pub launch_if_missing: bool,
    pub detector: DetectorConfig,
    pub post_completion_delay: Duration,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            project_path: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            editor: EditorKind::default(),
            mode: DeliveryMode::default(),
            auto_focus: true,
            launch_if_missing: false,
            detector: DetectorConfig::default(),
            post_completion_delay: Duration::from_secs(2),
        }
    }
}

pub struct EditorBridge {
    settings: BridgeSettings,
    desktop: Arc<dyn DesktopDriver>,
    probe_override: Option<Arc<dyn Probe>>,
    history: Mutex<Vec<DispatchRecord>>,
    cancel_wait: watch::Sender<bool>,
    status_listener: Mutex<Option<StatusListener>>,
}

impl EditorBridge {
    pub fn new(settings: BridgeSettings) -> Self {
        Self::with_desktop(settings, Arc::new(SystemDesktop::new()))
    }

    pub fn with_desktop(settings: BridgeSettings, desktop: Arc<dyn DesktopDriver>) -> Self {
        let (cancel_wait, _) = watch::channel(false);
        Self {
            settings,
            desktop,
            probe_override: None,
            history: Mutex::new(Vec::new()),
            cancel_wait,
            status_listener: Mutex::new(None),
        }
    }

    /// Replace the window/CPU probe used by `send_and_wait`.
    pub fn with_probe(mut self, probe: Arc<dyn Probe>) -> Self {
        self.probe_override = Some(probe);
        self
    }

    pub fn settings(&self) -> &BridgeSettings {
        &self.settings
    }

    pub fn profile(&self) -> &'static EditorProfile {
        self.settings.editor.profile()
    }

    pub fn set_status_listener<F>(&self, listener: F)
    where
        F: Fn(BridgeStatus, &str) + Send + Sync + 'static,
    {
        *self
            .status_listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(listener));
    }

    pub fn get_history(&self) -> Vec<DispatchRecord> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear_history(&self) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Whether the editor process is running. Clipboard-only is always available.
    pub fn is_editor_running(&self) -> bool {
        let names = self.profile().process_names;
        names.is_empty() || probe::any_process_running(names)
    }

    /// Spawn the editor on `workspace` (defaults to the project path).
    pub fn launch_editor(&self, workspace: Option<&Path>) -> bool {
        let Some(command) = self.profile().launch_command else {
            return false;
        };
        let target = workspace.unwrap_or(&self.settings.project_path);
        match Command::new(command)
            .arg(target)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(_) => {
                tracing::info!("[EditorBridge] Launched {} on {}", command, target.display());
                true
            }
            Err(e) => {
                tracing::warn!("[EditorBridge] Could not launch {}: {}", command, e);
                false
            }
        }
    }

    fn emit_status(&self, status: BridgeStatus, detail: &str) {
        let listener = self
            .status_listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(listener) = listener {
            if catch_unwind(AssertUnwindSafe(|| listener(status, detail))).is_err() {
                tracing::warn!("[EditorBridge] Status listener panicked on '{}'", status.as_str());
            }
        }
    }

    fn record(
        &self,
        mode: DeliveryMode,
        prompt: &str,
        state: DispatchState,
        outcome: Option<WaitOutcome>,
        result: &str,
    ) {
        let record = DispatchRecord {
            timestamp: Utc::now(),
            editor: self.settings.editor,
            mode,
            prompt_preview: prompt.chars().take(PREVIEW_CHARS).collect(),
            state,
            outcome,
            result: result.to_string(),
        };
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    // ─── Delivery modes ─────────────────────────────────────────────────

    async fn deliver(&self, prompt: &str) -> Result<String> {
        match self.settings.mode {
            DeliveryMode::Clipboard => self.deliver_clipboard(prompt),
            DeliveryMode::FileDrop => self.deliver_file_drop(prompt),
            DeliveryMode::Terminal => self.deliver_terminal(prompt),
            DeliveryMode::AutoInteract => self.deliver_auto_interact(prompt).await,
        }
    }

    fn deliver_clipboard(&self, prompt: &str) -> Result<String> {
        match self.desktop.set_clipboard(prompt) {
            Ok(()) => {
                if self.settings.auto_focus {
                    self.try_focus_editor();
                }
                Ok(format!(
                    "✅ Prompt copied to clipboard ({} chars)",
                    prompt.chars().count()
                ))
            }
            Err(e) => {
                tracing::warn!("[EditorBridge] Clipboard copy failed: {}", e);
                self.write_terminal_file(prompt)?;
                Ok(format!(
                    "⚠️ Clipboard copy failed: {}. Prompt saved to {} instead.",
                    e, TERMINAL_PROMPT_FILE
                ))
            }
        }
    }

    fn deliver_file_drop(&self, prompt: &str) -> Result<String> {
        if self.profile().task_dir.is_empty() {
            return self.deliver_clipboard(prompt);
        }
        match self.write_task_file(prompt) {
            Ok(relative) => Ok(format!("✅ Task written to {}", relative.display())),
            Err(e) => {
                tracing::warn!("[EditorBridge] File drop failed: {}", e);
                self.degrade_to_clipboard("File drop", &e, prompt)
            }
        }
    }

    /// Write the markdown task plus its trigger file; returns the task path
    /// relative to the project.
    fn write_task_file(&self, prompt: &str) -> Result<PathBuf> {
        let profile = self.profile();
        let task_dir = self.settings.project_path.join(profile.task_dir);
        std::fs::create_dir_all(&task_dir)?;

        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let content = format!(
            "# Auto-Prompt Task\n\
             > Generated: {}\n\
             > Editor: {}\n\
             \n\
             ## Task\n\
             \n\
             {}\n\
             \n\
             ---\n\
             *Generated by promptloop*\n",
            timestamp, profile.display, prompt
        );
        std::fs::write(task_dir.join(profile.task_file), content)?;
        std::fs::write(task_dir.join(TRIGGER_FILE), &timestamp)?;

        Ok(Path::new(profile.task_dir).join(profile.task_file))
    }

    fn deliver_terminal(&self, prompt: &str) -> Result<String> {
        match self.write_terminal_file(prompt) {
            Ok(_) => Ok(format!(
                "✅ Prompt saved to {} for terminal ingestion",
                TERMINAL_PROMPT_FILE
            )),
            Err(e) => {
                tracing::warn!("[EditorBridge] Terminal file write failed: {}", e);
                self.degrade_to_clipboard("Terminal file", &e, prompt)
            }
        }
    }

    /// Clipboard delivery after another backend failed; the status names the
    /// failure. Errors only when the clipboard path fails too.
    fn degrade_to_clipboard(
        &self,
        backend: &str,
        error: &AutomationError,
        prompt: &str,
    ) -> Result<String> {
        let status = self.deliver_clipboard(prompt)?;
        Ok(format!("⚠️ {} failed: {}. {}", backend, error, status))
    }

    fn write_terminal_file(&self, prompt: &str) -> Result<PathBuf> {
        let path = self.settings.project_path.join(TERMINAL_PROMPT_FILE);
        std::fs::write(&path, prompt)?;
        Ok(path)
    }

    fn try_focus_editor(&self) {
        let keywords = self.profile().window_keywords;
        if keywords.is_empty() {
            return;
        }
        if let Some(window) = self.desktop.find_window(keywords) {
            match self.desktop.focus_window(window) {
                Ok(()) => tracing::info!("[EditorBridge] Focused {} window", self.settings.editor),
                Err(e) => tracing::debug!("[EditorBridge] Could not focus editor: {}", e),
            }
        }
    }

    async fn deliver_auto_interact(&self, prompt: &str) -> Result<String> {
        let profile = self.profile();
        let Some(window) = self.locate_window().await else {
            tracing::warn!(
                "[EditorBridge] {} window not found, falling back to clipboard",
                profile.display
            );
            return self.deliver_clipboard(prompt);
        };

        match self.drive_window(window, prompt).await {
            Ok(()) => Ok(format!(
                "✅ Prompt auto-typed into {} ({} chars)",
                profile.display,
                prompt.chars().count()
            )),
            Err(e) => {
                tracing::warn!(
                    "[EditorBridge] Auto-interact failed ({}), falling back to clipboard",
                    e
                );
                self.deliver_clipboard(prompt)
            }
        }
    }

    async fn locate_window(&self) -> Option<WindowId> {
        let keywords = self.profile().window_keywords;
        if keywords.is_empty() {
            return None;
        }
        if let Some(window) = self.desktop.find_window(keywords) {
            return Some(window);
        }
        if self.settings.launch_if_missing && self.launch_editor(None) {
            tokio::time::sleep(LAUNCH_SETTLE).await;
            return self.desktop.find_window(keywords);
        }
        None
    }

    async fn drive_window(&self, window: WindowId, prompt: &str) -> Result<()> {
        let hotkey = self.profile().chat_hotkey;

        self.desktop.focus_window(window)?;
        tokio::time::sleep(FOCUS_SETTLE).await;

        if !hotkey.is_empty() {
            self.desktop.press_hotkey(hotkey)?;
            tokio::time::sleep(CHAT_PANEL_SETTLE).await;
        }

        self.desktop.set_clipboard(prompt)?;
        tokio::time::sleep(CLIPBOARD_SETTLE).await;

        self.desktop.press_hotkey("ctrl+v")?;
        tokio::time::sleep(PASTE_SETTLE).await;

        self.desktop.press_hotkey("enter")?;
        tokio::time::sleep(SUBMIT_SETTLE).await;
        Ok(())
    }

    fn completion_probe(&self) -> Arc<dyn Probe> {
        if let Some(probe) = &self.probe_override {
            return probe.clone();
        }
        let profile = self.profile();
        let window = if profile.window_keywords.is_empty() {
            None
        } else {
            self.desktop.find_window(profile.window_keywords)
        };
        Arc::new(EditorProbe::new(
            self.desktop.clone(),
            window,
            profile.process_names,
            self.settings.detector.cpu_busy_threshold,
        ))
    }

    async fn wait_for_completion(&self, cancel: &mut watch::Receiver<bool>) -> WaitOutcome {
        let probe = self.completion_probe();
        let detector = CompletionDetector::new(
            self.settings.detector.clone(),
            self.profile().thinking_keywords.iter().copied(),
        );
        detector
            .wait(probe.as_ref(), cancel, |tick| {
                self.emit_status(BridgeStatus::Waiting, &tick.describe())
            })
            .await
    }
}

#[async_trait]
impl PromptDispatcher for EditorBridge {
    async fn send_prompt(&self, prompt: &str) -> Result<String> {
        let mode = self.settings.mode;
        match self.deliver(prompt).await {
            Ok(status) => {
                tracing::info!("[EditorBridge] Sent via {}: {}", mode, status);
                self.record(mode, prompt, DispatchState::Sent, None, &status);
                Ok(status)
            }
            Err(e) => {
                let message = format!("Failed to send prompt: {}", e);
                tracing::error!("[EditorBridge] {}", message);
                self.record(mode, prompt, DispatchState::Error, None, &message);
                Err(AutomationError::Dispatch(message))
            }
        }
    }

    async fn send_and_wait(&self, prompt: &str) -> Result<String> {
        let mut cancel = self.cancel_wait.subscribe();

        self.emit_status(BridgeStatus::Typing, "Typing prompt into editor...");
        let sent = match self.deliver_auto_interact(prompt).await {
            Ok(status) => status,
            Err(e) => {
                let message = format!("Failed to send prompt: {}", e);
                tracing::error!("[EditorBridge] {}", message);
                self.record(DeliveryMode::AutoInteract, prompt, DispatchState::Error, None, &message);
                return Err(AutomationError::Dispatch(message));
            }
        };

        self.emit_status(BridgeStatus::Waiting, "Waiting for AI to finish...");
        let mut outcome = self.wait_for_completion(&mut cancel).await;

        let status = match outcome {
            WaitOutcome::Cancelled => format!("{} → ⏹ Wait cancelled", sent),
            WaitOutcome::Timeout => format!(
                "{} → ⚠️ Timed out after {}s",
                sent,
                self.settings.detector.timeout().as_secs()
            ),
            WaitOutcome::Done => {
                let cooldown = self.settings.post_completion_delay;
                self.emit_status(
                    BridgeStatus::Cooldown,
                    &format!("AI done. Cooling down {}s...", cooldown.as_secs_f64()),
                );
                if detector::sleep_or_cancel(cooldown, &mut cancel).await {
                    outcome = WaitOutcome::Cancelled;
                    format!("{} → ⏹ Wait cancelled", sent)
                } else {
                    self.emit_status(BridgeStatus::Done, "Step complete");
                    format!("{} → ✅ AI conversation completed", sent)
                }
            }
        };

        tracing::info!("[EditorBridge] send_and_wait finished: {}", outcome.as_str());
        self.record(
            DeliveryMode::AutoInteract,
            prompt,
            DispatchState::Sent,
            Some(outcome),
            &status,
        );
        Ok(status)
    }

    fn cancel_wait(&self) {
        self.cancel_wait.send_replace(true);
    }

    fn reset_cancel(&self) {
        self.cancel_wait.send_replace(false);
    }
}

//! Prompt delivery to external AI editors.
//!
//! - [`PromptDispatcher`]: the seam the workflow engine dispatches through
//! - [`editor::EditorBridge`]: the editor-backed dispatcher
//! - [`detector::CompletionDetector`]: heuristic "response finished" detection
//! - [`desktop::DesktopDriver`]: clipboard / window / keyboard automation

pub mod desktop;
pub mod detector;
pub mod editor;
pub mod editors;
pub mod probe;

use async_trait::async_trait;

use crate::error::Result;

pub use desktop::{DesktopDriver, SystemDesktop, WindowId};
pub use detector::{CompletionDetector, DetectorConfig, DetectorTick, Probe, WaitOutcome};
pub use editor::{BridgeSettings, BridgeStatus, DispatchRecord, DispatchState, EditorBridge};
pub use editors::{DeliveryMode, EditorKind, EditorProfile};
pub use probe::EditorProbe;

/// Delivers a resolved prompt and reports a short status text.
#[async_trait]
pub trait PromptDispatcher: Send + Sync {
    /// Fire-and-forget delivery.
    async fn send_prompt(&self, prompt: &str) -> Result<String>;

    /// Deliver, then block until the consumer looks finished.
    async fn send_and_wait(&self, prompt: &str) -> Result<String> {
        self.send_prompt(prompt).await
    }

    /// Make an in-flight or upcoming `send_and_wait` return promptly.
    ///
    /// The request stays raised until [`PromptDispatcher::reset_cancel`].
    fn cancel_wait(&self) {}

    /// Clear a cancellation left over from an earlier run.
    fn reset_cancel(&self) {}
}

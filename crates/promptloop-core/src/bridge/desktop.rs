//! Desktop driver seam — clipboard, window lookup, focus and hotkeys.
//!
//! The bridge only talks to the desktop through [`DesktopDriver`], so window
//! automation can be swapped per platform (or faked in tests).
//! [`SystemDesktop`] provides the clipboard through `arboard` and reports
//! window automation as unavailable; the bridge then takes its clipboard
//! fallback path.

use std::sync::Mutex;

use crate::error::{AutomationError, Result};

/// Opaque handle to a top-level window found by a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(pub u64);

pub trait DesktopDriver: Send + Sync {
    /// Replace the OS clipboard contents.
    fn set_clipboard(&self, text: &str) -> Result<()>;

    /// First visible window whose title contains any keyword (case-insensitive).
    fn find_window(&self, keywords: &[&str]) -> Option<WindowId>;

    /// Restore and bring the window to the foreground.
    fn focus_window(&self, window: WindowId) -> Result<()>;

    /// Current title text, empty when unavailable.
    fn window_title(&self, window: WindowId) -> String;

    /// Press a combination such as `ctrl+shift+i`, `ctrl+v` or `enter`.
    fn press_hotkey(&self, hotkey: &str) -> Result<()>;
}

/// Default driver: real clipboard, no window automation.
pub struct SystemDesktop {
    // Kept alive between calls: on X11 the clipboard content is served by
    // the owning process and disappears when the handle is dropped.
    clipboard: Mutex<Option<arboard::Clipboard>>,
}

impl SystemDesktop {
    pub fn new() -> Self {
        Self {
            clipboard: Mutex::new(None),
        }
    }
}

impl Default for SystemDesktop {
    fn default() -> Self {
        Self::new()
    }
}

impl DesktopDriver for SystemDesktop {
    fn set_clipboard(&self, text: &str) -> Result<()> {
        let mut slot = self
            .clipboard
            .lock()
            .map_err(|_| AutomationError::Desktop("clipboard lock poisoned".to_string()))?;
        if slot.is_none() {
            let clipboard = arboard::Clipboard::new()
                .map_err(|e| AutomationError::Desktop(format!("clipboard unavailable: {}", e)))?;
            *slot = Some(clipboard);
        }
        match slot.as_mut() {
            Some(clipboard) => clipboard
                .set_text(text.to_string())
                .map_err(|e| AutomationError::Desktop(format!("clipboard write failed: {}", e))),
            None => Err(AutomationError::Desktop("clipboard unavailable".to_string())),
        }
    }

    fn find_window(&self, _keywords: &[&str]) -> Option<WindowId> {
        None
    }

    fn focus_window(&self, _window: WindowId) -> Result<()> {
        Err(AutomationError::Desktop(
            "window focus is not available on this platform".to_string(),
        ))
    }

    fn window_title(&self, _window: WindowId) -> String {
        String::new()
    }

    fn press_hotkey(&self, hotkey: &str) -> Result<()> {
        Err(AutomationError::Desktop(format!(
            "synthetic key input ('{}') is not available on this platform",
            hotkey
        )))
    }
}

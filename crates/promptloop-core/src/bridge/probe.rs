//! Editor probe — window title through the desktop driver, CPU activity
//! through `sysinfo`.

use std::ffi::OsStr;
use std::sync::{Arc, Mutex, PoisonError};

use sysinfo::{ProcessesToUpdate, System};

use crate::bridge::desktop::{DesktopDriver, WindowId};
use crate::bridge::detector::Probe;

/// Samples one editor. The `System` is kept between calls so CPU usage is
/// measured over the poll interval rather than from a cold start.
pub struct EditorProbe {
    desktop: Arc<dyn DesktopDriver>,
    window: Option<WindowId>,
    process_names: Vec<String>,
    threshold: f32,
    system: Mutex<System>,
}

impl EditorProbe {
    pub fn new(
        desktop: Arc<dyn DesktopDriver>,
        window: Option<WindowId>,
        process_names: &[&str],
        threshold: f32,
    ) -> Self {
        Self {
            desktop,
            window,
            process_names: process_names.iter().map(|n| n.to_lowercase()).collect(),
            threshold,
            system: Mutex::new(System::new()),
        }
    }
}

impl Probe for EditorProbe {
    fn title_text(&self) -> String {
        match self.window {
            Some(window) => self.desktop.window_title(window),
            None => String::new(),
        }
    }

    fn is_busy(&self) -> bool {
        if self.process_names.is_empty() {
            return false;
        }
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        system.refresh_processes(ProcessesToUpdate::All, true);
        system.processes().values().any(|process| {
            let name = OsStr::new(process.name()).to_string_lossy().to_lowercase();
            self.process_names.iter().any(|n| *n == name) && process.cpu_usage() > self.threshold
        })
    }
}

/// Whether any process with one of `process_names` is running.
pub fn any_process_running(process_names: &[&str]) -> bool {
    if process_names.is_empty() {
        return false;
    }
    let wanted: Vec<String> = process_names.iter().map(|n| n.to_lowercase()).collect();
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);
    system.processes().values().any(|process| {
        let name = OsStr::new(process.name()).to_string_lossy().to_lowercase();
        wanted.contains(&name)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::desktop::SystemDesktop;

    #[test]
    fn test_probe_without_targets_is_idle() {
        let probe = EditorProbe::new(Arc::new(SystemDesktop::new()), None, &[], 15.0);
        assert_eq!(probe.title_text(), "");
        assert!(!probe.is_busy());
        assert!(!any_process_running(&[]));
    }

    #[test]
    fn test_unknown_process_is_not_running() {
        assert!(!any_process_running(&["promptloop-no-such-process-xyz"]));
    }
}

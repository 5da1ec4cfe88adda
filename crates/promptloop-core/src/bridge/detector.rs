//! Completion detector — decides when an un-instrumented editor has finished
//! responding to a prompt.
//!
//! Only two signals are available, both sampled through a [`Probe`]:
//!
//! ```text
//!   title_text()  ──► contains a "thinking" keyword?  ─┐
//!   is_busy()     ──► CPU above threshold?             ├─► stable tick?
//!   title == previous title?  ─────────────────────────┘
//!
//!   done     = (saw thinking && stable >= required_stable)
//!            || stable >= fallback_stable
//!   timeout  = elapsed >= timeout
//!   cancelled as soon as the cancel flag is raised
//! ```
//!
//! The policy over-waits rather than declaring completion on a transient
//! idle tick, and the timeout bounds every wait.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::Instant;

/// Low-fidelity view of an external process.
pub trait Probe: Send + Sync {
    /// Window or status title; empty when unavailable.
    fn title_text(&self) -> String;

    /// Heuristic "still working" signal.
    fn is_busy(&self) -> bool;
}

/// Result of a completion wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitOutcome {
    Done,
    Timeout,
    Cancelled,
}

impl WaitOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitOutcome::Done => "done",
            WaitOutcome::Timeout => "timeout",
            WaitOutcome::Cancelled => "cancelled",
        }
    }
}

/// Detector tuning. The defaults were tuned empirically against desktop
/// editors; override them per environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Pause before the first sample so the editor can react to the prompt
    pub warmup_secs: f64,
    pub poll_interval_secs: f64,
    pub timeout_secs: f64,
    /// Stable ticks needed after activity was observed
    pub required_stable: u32,
    /// Stable ticks needed when activity was never observed
    pub fallback_stable: u32,
    /// CPU percentage above which an editor process counts as busy
    pub cpu_busy_threshold: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            warmup_secs: 3.0,
            poll_interval_secs: 2.0,
            timeout_secs: 300.0,
            required_stable: 3,
            fallback_stable: 6,
            cpu_busy_threshold: 15.0,
        }
    }
}

impl DetectorConfig {
    pub fn warmup(&self) -> Duration {
        secs(self.warmup_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        secs(self.poll_interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.poll_interval().is_zero() {
            return Err("detector.poll_interval_secs must be greater than 0".to_string());
        }
        if self.timeout().is_zero() {
            return Err("detector.timeout_secs must be greater than 0".to_string());
        }
        if self.required_stable == 0 || self.fallback_stable == 0 {
            return Err("detector stable tick counts must be at least 1".to_string());
        }
        Ok(())
    }
}

pub(crate) fn secs(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
    } else {
        Duration::ZERO
    }
}

/// One poll iteration, reported to the caller for live status.
#[derive(Debug, Clone)]
pub struct DetectorTick {
    pub tick: u32,
    pub elapsed: Duration,
    pub thinking: bool,
    pub busy: bool,
    pub stable_count: u32,
}

impl DetectorTick {
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if self.thinking {
            parts.push("AI is thinking".to_string());
        }
        if self.busy {
            parts.push("high CPU".to_string());
        }
        parts.push(format!("{}s elapsed", self.elapsed.as_secs()));
        format!("🔵 {}", parts.join(" | "))
    }
}

pub struct CompletionDetector {
    config: DetectorConfig,
    /// Lowercased
    thinking_keywords: Vec<String>,
}

impl CompletionDetector {
    pub fn new<I, S>(config: DetectorConfig, thinking_keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            config,
            thinking_keywords: thinking_keywords
                .into_iter()
                .map(|k| k.as_ref().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    fn is_thinking(&self, title: &str) -> bool {
        let title = title.to_lowercase();
        self.thinking_keywords.iter().any(|k| title.contains(k.as_str()))
    }

    /// Poll `probe` until the response looks finished, the timeout elapses,
    /// or `cancel` becomes `true`.
    pub async fn wait<F>(
        &self,
        probe: &dyn Probe,
        cancel: &mut watch::Receiver<bool>,
        mut on_tick: F,
    ) -> WaitOutcome
    where
        F: FnMut(&DetectorTick),
    {
        let started = Instant::now();
        let timeout = self.config.timeout();

        if sleep_or_cancel(self.config.warmup(), cancel).await {
            return WaitOutcome::Cancelled;
        }

        let mut tick = 0u32;
        let mut stable_count = 0u32;
        let mut last_title = String::new();
        let mut was_thinking = false;

        loop {
            if *cancel.borrow() {
                return WaitOutcome::Cancelled;
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                tracing::info!(
                    "[CompletionDetector] Timed out after {}s",
                    elapsed.as_secs()
                );
                return WaitOutcome::Timeout;
            }

            tick += 1;
            let title = probe.title_text();
            let thinking = self.is_thinking(&title);
            was_thinking |= thinking;
            let busy = probe.is_busy();

            if !thinking && !busy && title == last_title {
                stable_count += 1;
            } else {
                stable_count = 0;
            }

            on_tick(&DetectorTick {
                tick,
                elapsed,
                thinking,
                busy,
                stable_count,
            });

            if (was_thinking && stable_count >= self.config.required_stable)
                || stable_count >= self.config.fallback_stable
            {
                tracing::info!(
                    "[CompletionDetector] Done after {} ticks ({} stable, saw thinking: {})",
                    tick,
                    stable_count,
                    was_thinking
                );
                return WaitOutcome::Done;
            }

            last_title = title;

            if sleep_or_cancel(self.config.poll_interval(), cancel).await {
                return WaitOutcome::Cancelled;
            }
        }
    }
}

/// Sleep for `duration`; returns `true` as soon as the cancel flag is set.
pub(crate) async fn sleep_or_cancel(duration: Duration, cancel: &mut watch::Receiver<bool>) -> bool {
    if *cancel.borrow() {
        return true;
    }
    if duration.is_zero() {
        return false;
    }
    let sleep = tokio::time::sleep(duration);
    tokio::pin!(sleep);
    let raised = tokio::select! {
        _ = &mut sleep => return false,
        raised = cancel.wait_for(|flag| *flag) => raised.is_ok(),
    };
    if raised {
        return true;
    }
    // Sender gone: nobody can cancel any more.
    sleep.await;
    false
}

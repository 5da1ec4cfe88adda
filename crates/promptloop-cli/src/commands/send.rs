//! `promptloop send` — deliver a single prompt to the configured editor.

use std::sync::Arc;

use console::style;
use promptloop_core::bridge::{DispatchRecord, EditorBridge};
use promptloop_core::{AutomationConfig, PromptDispatcher};

use super::{apply_overrides, print_json};

pub async fn send(
    config: &AutomationConfig,
    prompt: &str,
    wait: bool,
    mode: Option<&str>,
    editor: Option<&str>,
) -> Result<DispatchRecord, String> {
    if prompt.trim().is_empty() {
        return Err("Prompt is empty".to_string());
    }

    let mut config = config.clone();
    apply_overrides(&mut config, mode, editor)?;

    let bridge = Arc::new(EditorBridge::new(config.bridge_settings()));
    bridge.set_status_listener(|status, detail| {
        println!("{} {}", style(format!("[{}]", status.as_str())).cyan(), detail);
    });

    let ctrl_c = {
        let bridge = bridge.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                bridge.cancel_wait();
            }
        })
    };

    let outcome = if wait {
        bridge.send_and_wait(prompt).await
    } else {
        bridge.send_prompt(prompt).await
    };
    ctrl_c.abort();

    let status = outcome.map_err(|e| e.to_string())?;
    println!("{}", status);

    // History is in-memory only; show the record this send produced.
    let record = bridge
        .get_history()
        .pop()
        .ok_or_else(|| "No dispatch was recorded".to_string())?;
    let value = serde_json::to_value(&record).map_err(|e| e.to_string())?;
    print_json(&value);
    Ok(record)
}

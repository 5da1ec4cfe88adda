//! Integration tests for the promptloop CLI commands.
//!
//! These exercise the same code paths as the binary, with temporary
//! directories for the project and the workflow store.

use std::path::Path;

use promptloop_cli::commands;
use promptloop_cli::commands::workflow::RunOptions;
use promptloop_core::bridge::{DeliveryMode, DispatchState};
use promptloop_core::{AutomationConfig, RunStatus, Workflow, WorkflowStep, WorkflowStore};

fn test_config(root: &Path) -> AutomationConfig {
    AutomationConfig {
        project_path: Some(root.to_path_buf()),
        workflow_dir: Some(root.join("workflows")),
        ..AutomationConfig::default()
    }
}

fn quick_workflow() -> Workflow {
    Workflow::new("Quick Check", "two prompts")
        .with_variable("module", "auth")
        .with_step(WorkflowStep::new("Review", "Review {module}").with_delay(0.0))
        .with_step(WorkflowStep::new("Test", "Test {module}").with_delay(0.0))
}

#[tokio::test(start_paused = true)]
async fn test_run_builtin_dry_run() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());
    let options = RunOptions {
        builtin: Some("Bug Fix & Test".to_string()),
        vars: vec!["bug_description=crash on login".to_string()],
        dry_run: true,
        ..RunOptions::default()
    };

    let status = commands::workflow::run(&config, options).await.unwrap();

    assert_eq!(status, RunStatus::Completed);
    assert!(!tmp.path().join(".auto_prompt_current.txt").exists());
}

#[tokio::test]
async fn test_run_file_in_terminal_mode() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());
    let file = tmp.path().join("quick.json");
    std::fs::write(&file, quick_workflow().to_json().unwrap()).unwrap();

    let options = RunOptions {
        file: Some(file.display().to_string()),
        vars: vec!["module=billing".to_string()],
        mode: Some("terminal".to_string()),
        ..RunOptions::default()
    };
    let status = commands::workflow::run(&config, options).await.unwrap();

    assert_eq!(status, RunStatus::Completed);
    let saved = std::fs::read_to_string(tmp.path().join(".auto_prompt_current.txt")).unwrap();
    assert_eq!(saved, "Test billing");
}

#[tokio::test]
async fn test_run_saved_workflow_by_name() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());
    config.workflow_store().save(&quick_workflow()).unwrap();

    let options = RunOptions {
        file: Some("Quick Check".to_string()),
        dry_run: true,
        ..RunOptions::default()
    };
    let status = commands::workflow::run(&config, options).await.unwrap();
    assert_eq!(status, RunStatus::Completed);

    let missing = RunOptions {
        file: Some("No Such Workflow".to_string()),
        dry_run: true,
        ..RunOptions::default()
    };
    let err = commands::workflow::run(&config, missing).await.unwrap_err();
    assert!(err.contains("Not found"), "{}", err);
}

#[tokio::test]
async fn test_run_rejects_bad_overrides() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());
    let options = RunOptions {
        builtin: Some("Full Feature Dev".to_string()),
        editor: Some("notepad".to_string()),
        ..RunOptions::default()
    };
    let err = commands::workflow::run(&config, options).await.unwrap_err();
    assert!(err.contains("Unknown editor"));
}

#[test]
fn test_validate_workflow_file() {
    let tmp = tempfile::tempdir().unwrap();
    let good = tmp.path().join("good.json");
    std::fs::write(
        &good,
        r#"{"name": "Legacy", "steps": [{"name": "s1", "prompt": "Fix {bug}"}], "created_at": "2024-01-05T09:30:00.123456"}"#,
    )
    .unwrap();
    let workflow = commands::workflow::validate(&good).unwrap();
    assert_eq!(workflow.name, "Legacy");
    assert_eq!(workflow.steps[0].delay_after, 3.0);
    assert!(workflow.steps[0].enabled);

    let bad = tmp.path().join("bad.json");
    std::fs::write(&bad, "{ nope").unwrap();
    assert!(commands::workflow::validate(&bad).is_err());
    assert!(commands::workflow::validate(&tmp.path().join("missing.json")).is_err());
}

#[test]
fn test_export_builtins_then_list() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());

    let paths = commands::workflow::export_builtins(&config, None).unwrap();
    assert_eq!(paths.len(), 4);

    let loaded = WorkflowStore::new(tmp.path().join("workflows")).load_all();
    assert_eq!(loaded.len(), 4);
    assert_eq!(loaded["Full Feature Dev"].steps.len(), 7);

    commands::workflow::list(&config).unwrap();

    let other = tmp.path().join("elsewhere");
    let paths = commands::workflow::export_builtins(&config, Some(&other)).unwrap();
    assert!(paths.iter().all(|p| p.starts_with(&other)));
}

#[tokio::test]
async fn test_send_in_terminal_mode_returns_record() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());

    let record = commands::send::send(&config, "Summarize the repo", false, Some("terminal"), None)
        .await
        .unwrap();

    assert_eq!(record.state, DispatchState::Sent);
    assert_eq!(record.mode, DeliveryMode::Terminal);
    assert_eq!(record.prompt_preview, "Summarize the repo");
    assert!(record.outcome.is_none());
    assert!(tmp.path().join(".auto_prompt_current.txt").is_file());

    assert!(commands::send::send(&config, "   ", false, None, None).await.is_err());
}

//! `promptloop run | validate | list | export-builtins` — workflow commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use console::style;
use promptloop_core::bridge::{BridgeStatus, EditorBridge};
use promptloop_core::workflow::{builtin_workflow, builtin_workflows};
use promptloop_core::{
    AutomationConfig, EngineObserver, RunStatus, StepStatus, Workflow, WorkflowEngine,
    WorkflowStep,
};

use super::{apply_overrides, parse_vars, truncate};

/// Options of `promptloop run`.
#[derive(Debug, Default, Clone)]
pub struct RunOptions {
    /// Workflow file, or the name of a saved workflow
    pub file: Option<String>,
    pub builtin: Option<String>,
    pub vars: Vec<String>,
    pub loop_mode: bool,
    pub loop_interval: Option<f64>,
    pub wait: bool,
    pub mode: Option<String>,
    pub editor: Option<String>,
    pub dry_run: bool,
}

/// Prints engine notifications as they arrive.
struct ConsoleObserver;

impl EngineObserver for ConsoleObserver {
    fn step_started(&self, index: usize, step: &WorkflowStep) {
        println!(
            "{} {} {}",
            timestamp(),
            style(format!("▶ Step {}", index + 1)).cyan().bold(),
            step.name
        );
    }

    fn step_completed(&self, _index: usize, _step: &WorkflowStep, result: &str) {
        println!("{}   {}", timestamp(), style(result).green());
    }

    fn step_failed(&self, _index: usize, _step: &WorkflowStep, error: &str) {
        println!("{}   {} {}", timestamp(), style("✗").red().bold(), style(error).red());
    }

    fn workflow_done(&self, _workflow: &Workflow, status: &RunStatus) {
        match status {
            RunStatus::Looping => println!(
                "{} {}",
                timestamp(),
                style("↻ Pass complete, looping").yellow()
            ),
            RunStatus::Completed => println!(
                "{} {}",
                timestamp(),
                style("🎉 Workflow completed").green().bold()
            ),
            RunStatus::Cancelled => {
                println!("{} {}", timestamp(), style("⏹ Workflow cancelled").yellow())
            }
            RunStatus::Errored(message) => println!(
                "{} {} {}",
                timestamp(),
                style("💥 Workflow aborted:").red().bold(),
                message
            ),
        }
    }

    fn loop_wait(&self, remaining_secs: u64) {
        if remaining_secs % 10 == 0 || remaining_secs <= 3 {
            println!("{}   next pass in {}s", timestamp(), remaining_secs);
        }
    }
}

fn timestamp() -> String {
    style(chrono::Local::now().format("[%H:%M:%S]").to_string())
        .dim()
        .to_string()
}

/// Resolve the workflow to run: a built-in preset, a JSON file, or a saved
/// workflow name.
pub fn resolve_workflow(config: &AutomationConfig, options: &RunOptions) -> Result<Workflow, String> {
    if let Some(name) = &options.builtin {
        return builtin_workflow(name).ok_or_else(|| {
            let names: Vec<String> = builtin_workflows().into_iter().map(|w| w.name).collect();
            format!(
                "Unknown built-in workflow '{}'. Available: {}",
                name,
                names.join(", ")
            )
        });
    }

    let Some(file) = &options.file else {
        return Err("Specify a workflow file, a saved workflow name, or --builtin NAME".to_string());
    };

    let store = config.workflow_store();
    let path = Path::new(file);
    if path.is_file() {
        store.load(path).map_err(|e| e.to_string())
    } else {
        store.load_by_name(file).map_err(|e| e.to_string())
    }
}

/// Run a workflow to completion, cancelling on Ctrl-C.
pub async fn run(config: &AutomationConfig, options: RunOptions) -> Result<RunStatus, String> {
    let mut config = config.clone();
    apply_overrides(&mut config, options.mode.as_deref(), options.editor.as_deref())?;

    let mut workflow = resolve_workflow(&config, &options)?;
    for (key, value) in parse_vars(&options.vars)? {
        workflow.variables.insert(key, value);
    }
    workflow
        .variables
        .entry("project_path".to_string())
        .or_insert_with(|| config.project_path().display().to_string());

    let engine = WorkflowEngine::new();
    engine.set_observer(Arc::new(ConsoleObserver));
    engine.set_loop_mode(options.loop_mode || config.engine.loop_mode);
    let loop_interval = match options.loop_interval {
        Some(secs) => Duration::try_from_secs_f64(secs)
            .map_err(|_| format!("Invalid --loop-interval {}", secs))?,
        None => config.engine.loop_interval(),
    };
    engine.set_loop_interval(loop_interval);

    let wait = options.wait || config.engine.wait_for_completion;
    let bridge = if options.dry_run {
        None
    } else {
        let bridge = Arc::new(EditorBridge::new(config.bridge_settings()));
        bridge.set_status_listener(|status, detail| {
            if status != BridgeStatus::Typing {
                println!("{}   {}", timestamp(), style(detail).dim());
            }
        });
        engine.set_dispatcher(bridge.clone());
        engine.set_wait_for_completion(wait);
        Some(bridge)
    };

    println!("📄 Workflow: {}", style(&workflow.name).bold());
    if !workflow.description.is_empty() {
        println!("   {}", workflow.description);
    }
    println!(
        "   {} step(s), {} enabled | editor: {} | mode: {}{}{}",
        workflow.steps.len(),
        workflow.enabled_step_count(),
        config.editor,
        if options.dry_run { "dry-run".to_string() } else { config.mode.to_string() },
        if wait && !options.dry_run { " | wait for completion" } else { "" },
        if engine.loop_mode() { " | loop" } else { "" },
    );
    println!();

    let shared = workflow.into_shared();
    let handle = engine.start(shared.clone()).await.map_err(|e| e.to_string())?;

    let ctrl_c = {
        let engine = engine.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                println!();
                println!("{}", style("Cancelling after the current step...").yellow());
                engine.cancel();
            }
        })
    };

    let status = handle
        .await
        .map_err(|e| format!("Workflow task failed: {}", e))?;
    ctrl_c.abort();

    let workflow = shared.read().await;
    print_summary(&workflow);

    if let Some(bridge) = bridge {
        tracing::info!("[CLI] {} prompt(s) dispatched", bridge.get_history().len());
    }

    run_outcome(status, &workflow)
}

/// A run fails the command when it aborted or any step failed.
fn run_outcome(status: RunStatus, workflow: &Workflow) -> Result<RunStatus, String> {
    if let RunStatus::Errored(message) = &status {
        return Err(format!("Workflow aborted: {}", message));
    }
    let failed: Vec<&str> = workflow
        .steps
        .iter()
        .filter(|s| s.status == StepStatus::Failed)
        .map(|s| s.name.as_str())
        .collect();
    if !failed.is_empty() {
        return Err(format!("Workflow finished with failed steps: {}", failed.join(", ")));
    }
    Ok(status)
}

fn print_summary(workflow: &Workflow) {
    println!();
    println!("┌────┬──────────────────────────────┬───────────┐");
    println!("│ #  │ Step                         │ Status    │");
    println!("├────┼──────────────────────────────┼───────────┤");
    for (i, step) in workflow.steps.iter().enumerate() {
        println!(
            "│ {:<2} │ {:<28} │ {:<9} │",
            i + 1,
            truncate(&step.name, 28),
            step.status
        );
    }
    println!("└────┴──────────────────────────────┴───────────┘");
}

/// Validate a workflow file without running it.
pub fn validate(file: &Path) -> Result<Workflow, String> {
    let content = std::fs::read_to_string(file)
        .map_err(|e| format!("Failed to read '{}': {}", file.display(), e))?;
    let workflow = Workflow::from_json(&content)?;

    println!("✅ Workflow '{}' is valid", workflow.name);
    println!(
        "   Steps: {} ({} enabled)",
        workflow.steps.len(),
        workflow.enabled_step_count()
    );
    for (i, step) in workflow.steps.iter().enumerate() {
        println!(
            "   {}. {} (delay: {}s{})",
            i + 1,
            step.name,
            step.delay_after,
            if step.enabled { "" } else { ", disabled" }
        );
    }

    let missing = unset_variables(&workflow);
    if !missing.is_empty() {
        println!("   ⚠️  Unset variables: {}", missing.join(", "));
    }

    Ok(workflow)
}

/// Placeholders with no value; `project_path` is filled in at run time.
fn unset_variables(workflow: &Workflow) -> Vec<String> {
    workflow
        .placeholders()
        .into_iter()
        .filter(|key| key != "project_path" && !workflow.variables.contains_key(key))
        .collect()
}

/// List saved and built-in workflows.
pub fn list(config: &AutomationConfig) -> Result<(), String> {
    let store = config.workflow_store();
    let mut saved: Vec<Workflow> = store.load_all().into_values().collect();
    saved.sort_by(|a, b| a.name.cmp(&b.name));

    println!("Workflows in {}", store.dir().display());
    println!();
    println!("┌──────────────────────────────┬───────┬──────────┐");
    println!("│ Name                         │ Steps │ Source   │");
    println!("├──────────────────────────────┼───────┼──────────┤");
    for wf in &saved {
        println!("│ {:<28} │ {:<5} │ {:<8} │", truncate(&wf.name, 28), wf.steps.len(), "saved");
    }
    for wf in builtin_workflows() {
        if !saved.iter().any(|s| s.name == wf.name) {
            println!("│ {:<28} │ {:<5} │ {:<8} │", truncate(&wf.name, 28), wf.steps.len(), "builtin");
        }
    }
    println!("└──────────────────────────────┴───────┴──────────┘");
    Ok(())
}

/// Save every built-in preset as a workflow file.
pub fn export_builtins(config: &AutomationConfig, dir: Option<&Path>) -> Result<Vec<PathBuf>, String> {
    let store = match dir {
        Some(dir) => promptloop_core::WorkflowStore::new(dir),
        None => config.workflow_store(),
    };
    let mut paths = Vec::new();
    for workflow in builtin_workflows() {
        let path = store.save(&workflow).map_err(|e| e.to_string())?;
        println!("💾 {} → {}", workflow.name, path.display());
        paths.push(path);
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_variables_ignores_known_and_empty_keys() {
        let workflow = Workflow::new("Vars", "")
            .with_variable("module", "auth")
            .with_step(WorkflowStep::new("a", "Review {module} in {project_path}"))
            .with_step(WorkflowStep::new("b", "Fix {bug} {} {bug}"));

        assert_eq!(unset_variables(&workflow), vec!["bug".to_string()]);
    }

    #[test]
    fn test_run_outcome_reports_failed_steps() {
        let mut workflow = Workflow::new("Quick", "")
            .with_step(WorkflowStep::new("Review", "a"))
            .with_step(WorkflowStep::new("Test", "b"))
            .with_step(WorkflowStep::new("Ship", "c"));
        workflow.steps[0].status = StepStatus::Failed;
        workflow.steps[1].status = StepStatus::Completed;
        workflow.steps[2].status = StepStatus::Failed;

        assert_eq!(
            run_outcome(RunStatus::Completed, &workflow).unwrap_err(),
            "Workflow finished with failed steps: Review, Ship"
        );
        assert_eq!(
            run_outcome(RunStatus::Errored("boom".to_string()), &workflow).unwrap_err(),
            "Workflow aborted: boom"
        );

        workflow.steps[0].status = StepStatus::Skipped;
        workflow.steps[2].status = StepStatus::Skipped;
        assert_eq!(
            run_outcome(RunStatus::Cancelled, &workflow).unwrap(),
            RunStatus::Cancelled
        );
    }

    #[test]
    fn test_resolve_requires_a_source() {
        let config = AutomationConfig::default();
        assert!(resolve_workflow(&config, &RunOptions::default()).is_err());

        let options = RunOptions {
            builtin: Some("bug fix & test".to_string()),
            ..RunOptions::default()
        };
        assert_eq!(resolve_workflow(&config, &options).unwrap().steps.len(), 4);

        let unknown = RunOptions {
            builtin: Some("nope".to_string()),
            ..RunOptions::default()
        };
        let err = resolve_workflow(&config, &unknown).unwrap_err();
        assert!(err.contains("Full Feature Dev"));
    }
}

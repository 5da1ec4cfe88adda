//! Built-in workflow presets for a Flutter project.
//!
//! Placeholders used: `{project_path}`, `{feature_name}`,
//! `{bug_description}`, `{file_path}`.

use crate::workflow::schema::{Workflow, WorkflowStep};

/// All built-in presets, in display order.
pub fn builtin_workflows() -> Vec<Workflow> {
    vec![
        full_feature_dev(),
        bug_fix_and_test(),
        code_review_and_refactor(),
        analyze_fix_and_sync(),
    ]
}

/// Look up a preset by name (case-insensitive).
pub fn builtin_workflow(name: &str) -> Option<Workflow> {
    builtin_workflows()
        .into_iter()
        .find(|wf| wf.name.eq_ignore_ascii_case(name))
}

fn step(name: &str, prompt: &str, delay_after: f64) -> WorkflowStep {
    WorkflowStep::new(name, prompt).with_delay(delay_after)
}

fn full_feature_dev() -> Workflow {
    Workflow::new(
        "Full Feature Dev",
        "End-to-end feature development: analyze → model → UI → state → test",
    )
    .with_step(step(
        "1. Analyze Project",
        "Analyze the project at {project_path}. \
         Review the folder structure, existing screens, providers, models, and services. \
         Summarize what the app does and list all existing features.",
        5.0,
    ))
    .with_step(step(
        "2. Design Feature",
        "Based on the project analysis, design the '{feature_name}' feature. \
         Create a detailed implementation plan including:\n\
         - Data models needed\n\
         - API endpoints / Supabase tables\n\
         - UI screens and widgets\n\
         - State management (Provider/Riverpod)\n\
         - Navigation flow\n\
         Write the plan as a markdown checklist.",
        5.0,
    ))
    .with_step(step(
        "3. Create Data Models",
        "Implement the data models for '{feature_name}' as designed in the plan. \
         Create Dart model classes in lib/models/ with:\n\
         - JSON serialization (fromJson / toJson)\n\
         - copyWith method\n\
         - Proper type annotations\n\
         Follow the existing code style in the project.",
        5.0,
    ))
    .with_step(step(
        "4. Build UI Screens",
        "Build the UI screens for '{feature_name}' in lib/screens/. \
         Create responsive Flutter widgets following Material 3 design. \
         Use the existing theme and design patterns from the project. \
         Include proper error states, loading indicators, and empty states.",
        5.0,
    ))
    .with_step(step(
        "5. Add State Management",
        "Create the state management for '{feature_name}'. \
         Add Provider/ChangeNotifier classes in lib/providers/. \
         Connect the UI screens to the providers. \
         Handle loading states, error states, and data caching. \
         Follow the existing provider patterns in the project.",
        5.0,
    ))
    .with_step(step(
        "6. Write Tests",
        "Write tests for the '{feature_name}' feature:\n\
         - Unit tests for models and providers\n\
         - Widget tests for UI components\n\
         Put tests in the test/ directory mirroring the lib/ structure. \
         Cover the edge cases.",
        3.0,
    ))
    .with_step(step(
        "7. Integration Check",
        "Review all the code created for '{feature_name}'. Check for:\n\
         - Missing imports\n\
         - Navigation routes registered\n\
         - Provider registered in main.dart\n\
         - No compile errors\n\
         Fix any issues found and confirm the feature is fully integrated.",
        2.0,
    ))
}

fn bug_fix_and_test() -> Workflow {
    Workflow::new(
        "Bug Fix & Test",
        "Diagnose a bug, fix it, write a regression test, and verify",
    )
    .with_step(step(
        "1. Diagnose Bug",
        "There is a bug in the project at {project_path}: '{bug_description}'. \
         Investigate the issue by:\n\
         - Reading the relevant source files\n\
         - Tracing the data flow\n\
         - Identifying the root cause\n\
         Explain what's happening and why.",
        5.0,
    ))
    .with_step(step(
        "2. Implement Fix",
        "Fix the bug identified in the previous step. \
         Make the minimal necessary changes. \
         Explain each change you make and why it fixes the issue.",
        5.0,
    ))
    .with_step(step(
        "3. Write Regression Test",
        "Write a regression test that would catch this bug if it reappears. The test should:\n\
         - Reproduce the exact scenario that triggered the bug\n\
         - Verify the fix works correctly\n\
         - Cover any related edge cases",
        3.0,
    ))
    .with_step(step(
        "4. Verify Fix",
        "Run the tests and verify the bug fix is working. \
         Also check that no other tests broke. \
         Summarize the fix, the test results, and any remaining concerns.",
        2.0,
    ))
}

fn code_review_and_refactor() -> Workflow {
    Workflow::new(
        "Code Review & Refactor",
        "Deep code review, identify improvements, refactor, and verify",
    )
    .with_step(step(
        "1. Deep Code Review",
        "Perform a thorough code review of {file_path} in the project at {project_path}. Analyze:\n\
         - Code quality and readability\n\
         - Performance issues\n\
         - Security concerns\n\
         - Design pattern violations\n\
         - Missing error handling\n\
         Rate each issue by severity (Critical/High/Medium/Low).",
        5.0,
    ))
    .with_step(step(
        "2. Refactor Code",
        "Refactor the code based on the review findings. \
         Priority order: Critical → High → Medium. \
         Improve naming, extract methods, add proper error handling, and optimize performance. \
         Keep the public API stable.",
        5.0,
    ))
    .with_step(step(
        "3. Add Documentation",
        "Document the refactored code:\n\
         - Class-level dartdoc comments\n\
         - Method documentation with parameters and return values\n\
         - Inline comments for complex logic\n\
         - Update any existing README if needed",
        3.0,
    ))
    .with_step(step(
        "4. Verify Refactoring",
        "Verify the refactoring didn't break anything:\n\
         - Run all existing tests\n\
         - Check for compile errors\n\
         - Ensure public API hasn't changed unexpectedly\n\
         Provide a summary of improvements made with before/after comparison.",
        2.0,
    ))
}

fn analyze_fix_and_sync() -> Workflow {
    Workflow::new(
        "Analyze, Fix & Sync",
        "Continuous improvement: analyze needs → fix/refactor → GitHub sync",
    )
    .with_step(step(
        "1. Analyze Needs",
        "Analyze the project at {project_path}.\n\
         1. Run 'flutter analyze' and identify core issues.\n\
         2. Check 'git status' for uncommitted changes.\n\
         3. Identify what needs to be fixed, refactored, or organized.",
        5.0,
    ))
    .with_step(step(
        "2. Organize & Refactor",
        "Based on the analysis, organize the file structure and fix issues. \
         Move related widgets into subfolders, ensure coding standards are met, \
         and fix any syntax or linting errors found.",
        10.0,
    ))
    .with_step(step(
        "3. Sync to GitHub",
        "Commit all changes to the local repository with a clear message \
         summarizing the fixes and organization done. \
         Push the changes to the remote branch on GitHub.",
        5.0,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_presets() {
        let presets = builtin_workflows();
        let shape: Vec<(&str, usize)> = presets
            .iter()
            .map(|wf| (wf.name.as_str(), wf.steps.len()))
            .collect();
        assert_eq!(
            shape,
            vec![
                ("Full Feature Dev", 7),
                ("Bug Fix & Test", 4),
                ("Code Review & Refactor", 4),
                ("Analyze, Fix & Sync", 3),
            ]
        );
        assert!(presets.iter().all(|wf| wf.steps.iter().all(|s| s.enabled)));
    }

    #[test]
    fn test_builtin_lookup_is_case_insensitive() {
        let wf = builtin_workflow("bug fix & test").unwrap();
        assert_eq!(wf.name, "Bug Fix & Test");
        assert!(wf.steps[0].prompt.contains("{bug_description}"));
        assert!(builtin_workflow("unknown").is_none());
    }
}

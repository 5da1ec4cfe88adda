//! promptloop-core — sequenced prompt automation for AI coding editors.
//!
//! A [`Workflow`] is an ordered list of prompt templates. The
//! [`WorkflowEngine`] resolves each template against the workflow's variables
//! and hands it to a [`PromptDispatcher`], optionally waiting for the editor's
//! assistant to finish before moving on.
//!
//! - `workflow`: data model, persistence, presets and the engine
//! - `bridge`: delivery to editors and completion detection
//! - `config`: YAML configuration

pub mod bridge;
pub mod config;
pub mod error;
pub mod workflow;

pub use bridge::{EditorBridge, PromptDispatcher};
pub use config::AutomationConfig;
pub use error::{AutomationError, Result};
pub use workflow::{
    EngineObserver, RunStatus, SharedWorkflow, StepStatus, Workflow, WorkflowEngine, WorkflowStep,
    WorkflowStore,
};

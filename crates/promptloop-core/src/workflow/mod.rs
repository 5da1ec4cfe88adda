//! Prompt workflows — ordered prompt steps sent to an AI editor one by one.
//!
//! # Architecture
//!
//! ```text
//! workflow_*.json ──► WorkflowStore ──► Workflow ──► WorkflowEngine
//!                                                        │
//!   builtin presets ─────────────────────────────────────┤
//!                                                        │
//!                                              PromptDispatcher
//!                                                        │
//!                                         EditorBridge (clipboard / file /
//!                                         terminal / auto-interact + wait)
//! ```

pub mod builtin;
pub mod engine;
pub mod schema;
pub mod store;

pub use builtin::{builtin_workflow, builtin_workflows};
pub use engine::{EngineObserver, RunPhase, RunStatus, WorkflowEngine};
pub use schema::{SharedWorkflow, StepStatus, Workflow, WorkflowStep};
pub use store::WorkflowStore;

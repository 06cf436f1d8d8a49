//! # replay-core
//!
//! Core engine for api-replay:
//! - Request payload synthesis from resolved OpenAPI schemas
//! - HTTP dispatch with timeout and retry
//! - Execution planning and dependency graphs
//! - Result storage and per-endpoint metrics

pub mod dispatcher;
pub mod error;
pub mod graph;
pub mod llm;
pub mod metrics;
pub mod payload;
pub mod planner;
pub mod settings;
pub mod store;
pub mod workflow;

pub use dispatcher::{ExecutionRecord, PreparedRequest, RequestDispatcher};
pub use error::{ReplayError, Result};
pub use graph::ExecutionGraph;
pub use llm::LlmPlanner;
pub use metrics::{ApiMetrics, ExecutionMetrics};
pub use payload::PayloadBuilder;
pub use planner::{ExecutionPlan, FixedPlanner, MethodPriorityPlanner, SequencePlanner};
pub use settings::{LlmSettings, ReplaySettings, SettingsManager};
pub use store::ResultStore;
pub use workflow::{WorkflowEvent, WorkflowReport, WorkflowRunner};

//! Execution order planning

use async_trait::async_trait;
use openapi_parser::{ApiOperation, HttpMethod};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{ReplayError, Result};

/// An ordered list of endpoint keys (`METHOD /path`)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub execution_order: Vec<String>,
}

impl ExecutionPlan {
    pub fn new(execution_order: Vec<String>) -> Self {
        Self { execution_order }
    }

    /// Parse a `{"execution_order": [...]}` document
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| ReplayError::InvalidPlan(e.to_string()))
    }

    /// Check every entry names a known operation, and none repeats
    pub fn validate(&self, operations: &[ApiOperation]) -> Result<()> {
        let known: HashSet<String> = operations.iter().map(ApiOperation::key).collect();
        let mut seen = HashSet::new();

        for api in &self.execution_order {
            if !known.contains(api) {
                return Err(ReplayError::UnknownOperation(api.clone()));
            }
            if !seen.insert(api.as_str()) {
                return Err(ReplayError::InvalidPlan(format!("duplicate entry: {}", api)));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.execution_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.execution_order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.execution_order.iter().map(String::as_str)
    }
}

/// Decides the order in which operations are executed
#[async_trait]
pub trait SequencePlanner: Send + Sync {
    /// Produce an execution plan for the given operations
    async fn plan(&self, operations: &[ApiOperation]) -> Result<ExecutionPlan>;

    /// Human-readable planner name
    fn name(&self) -> &'static str;
}

/// Orders by method so resources exist before they are read, changed
/// and finally deleted: POST, GET, PUT, PATCH, DELETE, then the rest.
/// Declaration order is kept within a method.
#[derive(Debug, Clone, Copy, Default)]
pub struct MethodPriorityPlanner;

impl MethodPriorityPlanner {
    fn rank(method: HttpMethod) -> u8 {
        match method {
            HttpMethod::Post => 0,
            HttpMethod::Get => 1,
            HttpMethod::Put => 2,
            HttpMethod::Patch => 3,
            HttpMethod::Delete => 5,
            HttpMethod::Head | HttpMethod::Options | HttpMethod::Trace => 4,
        }
    }
}

#[async_trait]
impl SequencePlanner for MethodPriorityPlanner {
    async fn plan(&self, operations: &[ApiOperation]) -> Result<ExecutionPlan> {
        let mut ordered: Vec<&ApiOperation> = operations.iter().collect();
        // Stable sort keeps declaration order within a method
        ordered.sort_by_key(|op| Self::rank(op.method));

        let plan = ExecutionPlan::new(ordered.into_iter().map(ApiOperation::key).collect());
        debug!("Planned {} operations by method priority", plan.len());
        Ok(plan)
    }

    fn name(&self) -> &'static str {
        "method-priority"
    }
}

/// Replays an order produced elsewhere (for example by an LLM planner)
#[derive(Debug, Clone)]
pub struct FixedPlanner {
    plan: ExecutionPlan,
}

impl FixedPlanner {
    pub fn new(plan: ExecutionPlan) -> Self {
        Self { plan }
    }

    /// Load a plan document from disk
    pub fn from_file(path: &Path) -> Result<Self> {
        info!("Loading execution plan from {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Ok(Self::new(ExecutionPlan::from_json(&content)?))
    }
}

#[async_trait]
impl SequencePlanner for FixedPlanner {
    async fn plan(&self, operations: &[ApiOperation]) -> Result<ExecutionPlan> {
        self.plan.validate(operations)?;
        Ok(self.plan.clone())
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

//! End-to-end replay of a spec's operations against a live base URL

use openapi_parser::{
    ApiOperation, ExampleGenerator, ParsedSpec, ResolverConfig, SchemaDefinitions, SchemaResolver,
};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::dispatcher::{ExecutionRecord, PreparedRequest, RequestDispatcher};
use crate::error::{ReplayError, Result};
use crate::metrics::ExecutionMetrics;
use crate::payload::PayloadBuilder;
use crate::planner::{ExecutionPlan, MethodPriorityPlanner, SequencePlanner};
use crate::settings::ReplaySettings;
use crate::store::ResultStore;

/// Progress notifications emitted while a workflow runs
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    Planned {
        planner: String,
        order: Vec<String>,
    },
    Started {
        api: String,
        index: usize,
        total: usize,
    },
    Completed {
        record: ExecutionRecord,
    },
    Skipped {
        api: String,
        reason: String,
    },
    Finished {
        succeeded: usize,
        failed: usize,
    },
}

/// Summary of a finished run
#[derive(Debug, Clone)]
pub struct WorkflowReport {
    pub plan: ExecutionPlan,
    pub records: Vec<ExecutionRecord>,
    pub metrics: ExecutionMetrics,
}

impl WorkflowReport {
    pub fn succeeded(&self) -> usize {
        self.records.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.records.len() - self.succeeded()
    }
}

/// Plans, synthesizes and dispatches every operation of a spec
pub struct WorkflowRunner {
    spec: ParsedSpec,
    settings: ReplaySettings,
    definitions: SchemaDefinitions,
    examples: ExampleGenerator,
    dispatcher: RequestDispatcher,
    planner: Box<dyn SequencePlanner>,
    store: ResultStore,
    events: Option<mpsc::UnboundedSender<WorkflowEvent>>,
}

impl WorkflowRunner {
    /// Create a runner; the base URL comes from settings, else the spec
    pub fn new(spec: ParsedSpec, settings: ReplaySettings) -> Result<Self> {
        let base_url = settings
            .base_url
            .clone()
            .or_else(|| spec.base_url().map(str::to_string))
            .ok_or(ReplayError::MissingBaseUrl)?;

        let dispatcher = RequestDispatcher::new(&base_url, &settings)?;
        let store = match &settings.results_file {
            Some(path) => ResultStore::with_file(path.clone()),
            None => ResultStore::in_memory(),
        };

        info!(
            "Replaying {} operations from {} against {}",
            spec.operations.len(),
            spec.title,
            dispatcher.base_url()
        );

        Ok(Self {
            definitions: spec.definitions(),
            examples: ExampleGenerator::new(settings.example_mode()),
            spec,
            settings,
            dispatcher,
            planner: Box::new(MethodPriorityPlanner),
            store,
            events: None,
        })
    }

    /// Use a different planner
    pub fn with_planner(mut self, planner: Box<dyn SequencePlanner>) -> Self {
        self.planner = planner;
        self
    }

    /// Use a different result store
    pub fn with_store(mut self, store: ResultStore) -> Self {
        self.store = store;
        self
    }

    /// Stream progress events to a new receiver
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<WorkflowEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        rx
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    pub fn spec(&self) -> &ParsedSpec {
        &self.spec
    }

    fn payloads(&self) -> PayloadBuilder<'_> {
        let config = ResolverConfig {
            cache: !matches!(
                self.examples.mode(),
                openapi_parser::ExampleMode::Random
            ),
            ..self.settings.resolver_config()
        };
        PayloadBuilder::new(SchemaResolver::with_config(
            &self.definitions,
            &self.examples,
            config,
        ))
    }

    fn emit(&self, event: WorkflowEvent) {
        if let Some(tx) = &self.events {
            // A dropped receiver just means nobody is listening
            let _ = tx.send(event);
        }
    }

    /// Build the requests a run would send, without sending them
    pub async fn preview(&self) -> Result<Vec<PreparedRequest>> {
        let plan = self.planner.plan(&self.spec.operations).await?;
        let payloads = self.payloads();
        let created = self.store.created_ids().await;

        Ok(plan
            .iter()
            .filter_map(|api| self.spec.operation(api))
            .map(|op| prepare(&payloads, op, &created))
            .collect())
    }

    /// Run the whole workflow
    pub async fn run(&self) -> Result<WorkflowReport> {
        self.store.load().await?;

        let plan = self.planner.plan(&self.spec.operations).await?;
        info!("Planner {} produced {} steps", self.planner.name(), plan.len());
        self.emit(WorkflowEvent::Planned {
            planner: self.planner.name().to_string(),
            order: plan.execution_order.clone(),
        });

        let payloads = self.payloads();
        let mut metrics = ExecutionMetrics::new();
        let mut records = Vec::with_capacity(plan.len());
        let total = plan.len();

        for (index, api) in plan.iter().enumerate() {
            let Some(operation) = self.spec.operation(api) else {
                warn!("Skipping {}: not in spec", api);
                self.emit(WorkflowEvent::Skipped {
                    api: api.to_string(),
                    reason: "operation not found in spec".to_string(),
                });
                continue;
            };

            self.emit(WorkflowEvent::Started {
                api: api.to_string(),
                index,
                total,
            });

            let created = self.store.created_ids().await;
            let request = prepare(&payloads, operation, &created);
            let record = self.dispatcher.execute(&request).await;

            if record.is_success() && operation.method.has_body() {
                if let Some(id) = record.created_id() {
                    debug!("{} created resource {}", api, id);
                    self.store.save_created_id(api, id).await;
                }
            }

            metrics.record(&record);
            self.store.save_result(record.clone()).await;
            self.emit(WorkflowEvent::Completed {
                record: record.clone(),
            });
            records.push(record);
        }

        self.store.save().await?;

        let report = WorkflowReport {
            plan,
            records,
            metrics,
        };
        info!(
            "Workflow finished: {} succeeded, {} failed",
            report.succeeded(),
            report.failed()
        );
        self.emit(WorkflowEvent::Finished {
            succeeded: report.succeeded(),
            failed: report.failed(),
        });

        Ok(report)
    }
}

/// Characters escaped in a path segment; unlike form encoding, a space
/// becomes `%20` and `/` cannot split the segment
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Build a request for one operation
fn prepare(
    payloads: &PayloadBuilder<'_>,
    operation: &ApiOperation,
    created: &indexmap::IndexMap<String, serde_json::Value>,
) -> PreparedRequest {
    let mut path = operation.path.clone();
    for (name, value) in payloads.path_values(operation, created) {
        let encoded = utf8_percent_encode(&value, PATH_SEGMENT).to_string();
        path = path.replace(&format!("{{{}}}", name), &encoded);
    }

    let body = if operation.method.has_body() {
        payloads.build_body(operation)
    } else {
        None
    };

    PreparedRequest {
        api: operation.key(),
        method: operation.method,
        path,
        query: payloads.query_values(operation),
        body,
    }
}

//! api-replay CLI - replay an OpenAPI spec's endpoints against a live server
//!
//! Loads a spec, orders its operations, synthesizes request payloads from the
//! component schemas and sends them, printing progress as it goes.
//!
//! Settings are read from `settings.json` in the user config directory (or
//! `--settings`); command-line flags override them.

use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use openapi_parser::{ExampleGenerator, OpenApiParser, ParsedSpec, SchemaResolver};
use replay_core::{
    ExecutionGraph, ExecutionPlan, FixedPlanner, LlmPlanner, LlmSettings, MethodPriorityPlanner,
    PayloadBuilder, ReplaySettings, SequencePlanner, SettingsManager, WorkflowEvent,
    WorkflowRunner,
};

/// api-replay - synthesize payloads from an OpenAPI spec and replay its endpoints
#[derive(Parser, Debug)]
#[command(name = "api-replay")]
#[command(author = "Symbia Labs")]
#[command(version = "0.1.0")]
#[command(about = "Replay OpenAPI endpoints with synthesized payloads")]
struct Cli {
    /// Settings file (defaults to settings.json in the user config directory)
    #[arg(long, global = true, env = "API_REPLAY_SETTINGS")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute every operation in planned order
    Run(RunArgs),
    /// Print a synthesized payload for a schema or operation
    Payload(PayloadArgs),
    /// Print the execution order
    Plan(SpecArgs),
    /// Print the dependency graph as Graphviz DOT
    Graph(GraphArgs),
    /// List the operations found in the spec
    Operations(OperationsArgs),
}

#[derive(Args, Debug)]
struct SpecArgs {
    /// Spec file path or URL
    #[arg(long)]
    spec: String,

    /// Execution plan document ({"execution_order": [...]})
    #[arg(long)]
    plan: Option<PathBuf>,

    #[command(flatten)]
    llm: LlmArgs,
}

#[derive(Args, Debug)]
struct LlmArgs {
    /// Ask a chat model for the execution order
    #[arg(long, conflicts_with = "plan")]
    llm: bool,

    /// Chat model name
    #[arg(long)]
    llm_model: Option<String>,

    /// OpenAI-compatible chat-completions endpoint
    #[arg(long)]
    llm_endpoint: Option<String>,

    /// API key for the chat endpoint
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    llm_api_key: Option<String>,
}

#[derive(Args, Debug)]
struct OperationsArgs {
    /// Spec file path or URL
    #[arg(long)]
    spec: String,
}

#[derive(Args, Debug)]
struct ExampleArgs {
    /// Seed for reproducible random examples
    #[arg(long)]
    seed: Option<u64>,

    /// Use random examples instead of fixed placeholders
    #[arg(long)]
    random: bool,

    /// Schema resolution depth bound
    #[arg(long)]
    max_depth: Option<usize>,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    spec: SpecArgs,

    #[command(flatten)]
    examples: ExampleArgs,

    /// Base URL (defaults to the spec's first server)
    #[arg(long, env = "API_REPLAY_BASE_URL")]
    base_url: Option<String>,

    /// Attempts per request
    #[arg(long)]
    retries: Option<u32>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Persist results to this JSON file
    #[arg(long)]
    output: Option<PathBuf>,

    /// Extra header, as `Name: value` (repeatable)
    #[arg(long = "header", value_parser = parse_header)]
    headers: Vec<(String, String)>,

    /// Print the requests without sending them
    #[arg(long)]
    dry_run: bool,

    /// Print progress events as JSON lines on stdout
    #[arg(long)]
    events: bool,
}

#[derive(Args, Debug)]
struct PayloadArgs {
    /// Spec file path or URL
    #[arg(long)]
    spec: String,

    /// Component schema name
    #[arg(long, conflicts_with = "operation", required_unless_present = "operation")]
    schema: Option<String>,

    /// Operation key, e.g. "POST /pet"
    #[arg(long)]
    operation: Option<String>,

    #[command(flatten)]
    examples: ExampleArgs,
}

#[derive(Args, Debug)]
struct GraphArgs {
    #[command(flatten)]
    spec: SpecArgs,

    /// Infer edges from paths instead of chaining the plan
    #[arg(long)]
    infer: bool,

    /// Graph title
    #[arg(long, default_value = "API Execution Flow")]
    title: String,
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected `Name: value`, got `{}`", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty header name in `{}`", raw));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

fn load_settings(path: Option<PathBuf>) -> anyhow::Result<ReplaySettings> {
    let manager = match path {
        Some(path) => SettingsManager::from_file(path),
        None => SettingsManager::new(&SettingsManager::default_dir()?),
    };
    Ok(manager.into_settings())
}

fn apply_example_overrides(settings: &mut ReplaySettings, args: &ExampleArgs) {
    if args.seed.is_some() {
        settings.example_seed = args.seed;
    }
    if args.random {
        settings.random_examples = true;
    }
    if let Some(depth) = args.max_depth {
        settings.max_depth = depth;
    }
}

fn apply_run_overrides(settings: &mut ReplaySettings, args: &RunArgs) {
    apply_example_overrides(settings, &args.examples);

    if let Some(base_url) = &args.base_url {
        settings.base_url = Some(base_url.clone());
    }
    if let Some(retries) = args.retries {
        settings.max_retries = retries;
    }
    if let Some(timeout) = args.timeout {
        settings.timeout_secs = timeout;
    }
    if let Some(output) = &args.output {
        settings.results_file = Some(output.clone());
    }
    for (name, value) in &args.headers {
        settings.headers.insert(name.clone(), value.clone());
    }
}

fn apply_llm_overrides(settings: &mut LlmSettings, args: &LlmArgs) {
    if let Some(model) = &args.llm_model {
        settings.model = model.clone();
    }
    if let Some(endpoint) = &args.llm_endpoint {
        settings.endpoint = endpoint.clone();
    }
    if args.llm_api_key.is_some() {
        settings.api_key = args.llm_api_key.clone();
    }
}

fn planner(args: &SpecArgs, settings: &ReplaySettings) -> anyhow::Result<Box<dyn SequencePlanner>> {
    if let Some(path) = &args.plan {
        return Ok(Box::new(FixedPlanner::from_file(path)?));
    }
    if args.llm.llm {
        let mut llm = settings.llm.clone();
        apply_llm_overrides(&mut llm, &args.llm);
        return Ok(Box::new(LlmPlanner::new(llm)?));
    }
    Ok(Box::new(MethodPriorityPlanner))
}

async fn load_spec(location: &str) -> anyhow::Result<ParsedSpec> {
    OpenApiParser::load(location)
        .await
        .with_context(|| format!("Failed to load spec from {}", location))
}

async fn run(args: RunArgs, mut settings: ReplaySettings) -> anyhow::Result<()> {
    apply_run_overrides(&mut settings, &args);
    let spec = load_spec(&args.spec.spec).await?;

    let sequence = planner(&args.spec, &settings)?;
    let mut runner = WorkflowRunner::new(spec, settings)?.with_planner(sequence);

    if args.dry_run {
        for request in runner.preview().await? {
            println!("{} {}", request.method, request.path);
            if !request.query.is_empty() {
                println!("  query: {:?}", request.query);
            }
            if let Some(body) = &request.body {
                println!("  body: {}", serde_json::to_string_pretty(body)?);
            }
        }
        return Ok(());
    }

    let printer = if args.events {
        let mut events = runner.subscribe();
        Some(tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let finished = matches!(event, WorkflowEvent::Finished { .. });
                if let Ok(line) = serde_json::to_string(&event) {
                    println!("{}", line);
                }
                if finished {
                    break;
                }
            }
        }))
    } else {
        None
    };

    let report = runner.run().await?;
    drop(runner);
    if let Some(printer) = printer {
        printer.await?;
    }

    eprintln!("{}", report.metrics.report());
    if report.failed() > 0 {
        return Err(anyhow!("{} of {} requests failed", report.failed(), report.records.len()));
    }
    Ok(())
}

async fn payload(args: PayloadArgs, mut settings: ReplaySettings) -> anyhow::Result<()> {
    apply_example_overrides(&mut settings, &args.examples);
    let spec = load_spec(&args.spec).await?;

    let definitions = spec.definitions();
    let examples = ExampleGenerator::new(settings.example_mode());
    let resolver = SchemaResolver::with_config(&definitions, &examples, settings.resolver_config());

    let value = match (&args.schema, &args.operation) {
        (Some(name), _) => {
            if !definitions.contains(name) {
                info!("Schema {} is not defined; resolving to an empty object", name);
            }
            resolver.resolve_named(name)
        }
        (None, Some(key)) => {
            let operation = spec
                .operation(key)
                .ok_or_else(|| anyhow!("Unknown operation: {}", key))?;
            PayloadBuilder::new(resolver)
                .build_body(operation)
                .ok_or_else(|| anyhow!("{} has no request body", key))?
        }
        (None, None) => return Err(anyhow!("Pass --schema or --operation")),
    };

    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

async fn plan(args: SpecArgs, settings: ReplaySettings) -> anyhow::Result<()> {
    let spec = load_spec(&args.spec).await?;
    let plan = planner(&args, &settings)?.plan(&spec.operations).await?;
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

async fn graph(args: GraphArgs, settings: ReplaySettings) -> anyhow::Result<()> {
    let spec = load_spec(&args.spec.spec).await?;
    let graph = if args.infer {
        ExecutionGraph::from_operations(&spec.operations)
    } else {
        let plan: ExecutionPlan = planner(&args.spec, &settings)?
            .plan(&spec.operations)
            .await?;
        ExecutionGraph::from_plan(&plan)
    };
    print!("{}", graph.to_dot(&args.title));
    Ok(())
}

async fn operations(args: OperationsArgs) -> anyhow::Result<()> {
    let spec = load_spec(&args.spec).await?;
    println!("{} {} ({} operations)", spec.title, spec.version, spec.operations.len());
    for op in &spec.operations {
        let summary = op.summary.as_deref().unwrap_or("");
        println!("  {:<40} {}", op.key(), summary);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let settings = load_settings(cli.settings)?;

    match cli.command {
        Command::Run(args) => run(args, settings).await,
        Command::Payload(args) => payload(args, settings).await,
        Command::Plan(args) => plan(args, settings).await,
        Command::Graph(args) => graph(args, settings).await,
        Command::Operations(args) => operations(args).await,
    }
}

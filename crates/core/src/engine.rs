//! Execution scheduler.
//!
//! One engine serves many concurrent runs, but within a run nodes execute
//! strictly one at a time, which keeps step ordering and branch skipping
//! deterministic. Cancellation is cooperative: a watch channel is checked
//! before each node visit and never pre-empts in-flight I/O.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::{watch, RwLock};
use tracing::{error, info, warn};

use crate::condition::RunContext;
use crate::config::{lenient_object, ActionConfig, ConditionConfig};
use crate::dag::FlowDag;
use crate::error::EngineError;
use crate::events::{RunEvent, RunEvents};
use crate::executors::{self, ActionOutcome, FileAccessPolicy, PluginHost};
use crate::store::{FlowGraph, FlowStore};
use crate::types::{
    Execution, ExecutionId, ExecutionStatus, ExecutionStep, FlowId, FlowNode, NodeId, NodeKind,
    StepId, StepStatus,
};
use crate::validator::{validate_graph, ValidationReport};

/// How a traversal ended
enum Walk {
    Completed,
    Cancelled,
    Failed(String),
}

/// Orchestrates flow runs: validation, traversal, step bookkeeping,
/// cancellation and progress events
#[derive(Clone)]
pub struct Engine {
    store: Arc<dyn FlowStore>,
    events: Arc<dyn RunEvents>,
    plugins: Arc<dyn PluginHost>,
    file_access: Arc<FileAccessPolicy>,
    // Cancellation handles of in-flight runs
    active_runs: Arc<RwLock<HashMap<ExecutionId, watch::Sender<bool>>>>,
}

impl Engine {
    pub fn new(
        store: Arc<dyn FlowStore>,
        events: Arc<dyn RunEvents>,
        plugins: Arc<dyn PluginHost>,
    ) -> Self {
        Self {
            store,
            events,
            plugins,
            file_access: Arc::new(FileAccessPolicy::default()),
            active_runs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Override the directories the file executor may read from
    pub fn with_file_access(mut self, policy: FileAccessPolicy) -> Self {
        self.file_access = Arc::new(policy);
        self
    }

    /// Validate a stored flow without running it
    pub async fn validate(&self, flow_id: FlowId) -> Result<ValidationReport, EngineError> {
        let graph = self
            .store
            .load_graph(flow_id)
            .await?
            .ok_or(EngineError::FlowNotFound(flow_id))?;
        Ok(validate_graph(&graph.nodes, &graph.edges))
    }

    /// Start a run of a stored flow. Validation failures abort before any
    /// execution record exists; otherwise the run proceeds on a background
    /// task and its id is returned immediately.
    pub async fn run(&self, flow_id: FlowId) -> Result<ExecutionId, EngineError> {
        let graph = self
            .store
            .load_graph(flow_id)
            .await?
            .ok_or(EngineError::FlowNotFound(flow_id))?;

        let report = validate_graph(&graph.nodes, &graph.edges);
        if !report.valid {
            return Err(EngineError::InvalidFlow(report.issues));
        }

        let trigger_type = lenient_object(&graph.flow.trigger_config)
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("manual")
            .to_string();

        let execution = Execution {
            id: ExecutionId::new(),
            flow_id,
            status: ExecutionStatus::Running,
            trigger_type,
            started_at: Some(Utc::now()),
            completed_at: None,
            error: None,
            created_at: Utc::now(),
        };
        self.store.insert_execution(&execution).await?;

        let (cancel_tx, cancel_rx) = watch::channel(false);
        self.active_runs
            .write()
            .await
            .insert(execution.id, cancel_tx);

        info!(execution_id = %execution.id, flow_id = %flow_id, "Starting flow run");

        let engine = self.clone();
        let execution_id = execution.id;
        tokio::spawn(async move {
            engine.drive(execution, graph, cancel_rx).await;
        });

        Ok(execution_id)
    }

    /// Signal cancellation of a run. Returns true iff a cancellable run was
    /// found; the run itself transitions at its next node boundary.
    pub async fn cancel(&self, execution_id: ExecutionId) -> bool {
        let active_runs = self.active_runs.read().await;
        match active_runs.get(&execution_id) {
            Some(cancel_tx) => {
                info!(execution_id = %execution_id, "Cancellation requested");
                cancel_tx.send(true).is_ok()
            }
            None => false,
        }
    }

    /// Run the traversal to completion and settle the execution record
    async fn drive(
        &self,
        mut execution: Execution,
        graph: FlowGraph,
        cancel_rx: watch::Receiver<bool>,
    ) {
        let result = self.walk(execution.id, &graph, cancel_rx).await;

        let (status, error) = match result {
            Ok(Walk::Completed) => (ExecutionStatus::Success, None),
            Ok(Walk::Cancelled) => (ExecutionStatus::Cancelled, None),
            Ok(Walk::Failed(message)) => (ExecutionStatus::Failed, Some(message)),
            Err(e) => (ExecutionStatus::Failed, Some(e.to_string())),
        };

        execution.status = status;
        execution.error = error.clone();
        execution.completed_at = Some(Utc::now());

        if let Err(e) = self.store.update_execution(&execution).await {
            error!(execution_id = %execution.id, "Failed to persist run status: {}", e);
        }
        self.active_runs.write().await.remove(&execution.id);

        match status {
            ExecutionStatus::Success => {
                info!(execution_id = %execution.id, "Flow run completed")
            }
            ExecutionStatus::Cancelled => {
                info!(execution_id = %execution.id, "Flow run cancelled")
            }
            _ => error!(
                execution_id = %execution.id,
                "Flow run failed: {}",
                execution.error.as_deref().unwrap_or("unknown error")
            ),
        }

        // The completion event is the last event emitted for this run
        self.events.emit(RunEvent::Completed {
            id: execution.id,
            status,
            error: execution.error.clone(),
        });
    }

    /// Walk the graph from the trigger in topological order
    async fn walk(
        &self,
        execution_id: ExecutionId,
        graph: &FlowGraph,
        cancel_rx: watch::Receiver<bool>,
    ) -> anyhow::Result<Walk> {
        let dag = FlowDag::build(&graph.nodes, &graph.edges);
        let nodes: HashMap<NodeId, &FlowNode> =
            graph.nodes.iter().map(|n| (n.id.clone(), n)).collect();

        // Validation guarantees exactly one trigger
        let Some(trigger) = graph.nodes.iter().find(|n| n.kind == NodeKind::Trigger) else {
            return Ok(Walk::Failed("Flow has no trigger node".to_string()));
        };
        let reachable = dag.reachable_from(&trigger.id);
        let order: Vec<NodeId> = dag
            .topological_order()
            .into_iter()
            .filter(|id| reachable.contains(id))
            .collect();

        let mut ctx = RunContext::new(lenient_object(&graph.flow.trigger_config));
        let mut completed: HashSet<NodeId> = HashSet::new();
        let mut branch_taken: HashMap<NodeId, bool> = HashMap::new();

        for node_id in order {
            // Cooperative cancellation, observed at node boundaries only
            if *cancel_rx.borrow() {
                return Ok(Walk::Cancelled);
            }

            let Some(&node) = nodes.get(&node_id) else {
                continue;
            };

            if node.kind == NodeKind::Trigger {
                let trigger_output = ctx.trigger.clone();
                self.record_finished_step(execution_id, node, StepStatus::Success, &trigger_output)
                    .await?;
                ctx.record_output(node_id.clone(), trigger_output);
                completed.insert(node_id);
                continue;
            }

            let live = dag.incoming(&node_id).iter().any(|conn| {
                completed.contains(&conn.node_id)
                    && branch_selects(branch_taken.get(&conn.node_id), conn.branch.as_deref())
            });
            if !live {
                // Deselected branches and their exclusive descendants get a
                // skipped step instead of executing
                self.record_skipped_step(execution_id, node).await?;
                continue;
            }

            match &node.kind {
                NodeKind::Condition => {
                    let mut step = self.record_started_step(execution_id, node).await?;
                    let started = Instant::now();
                    let result = match ConditionConfig::parse(&node.config) {
                        ConditionConfig::Expr(condition) => condition.evaluate(&ctx),
                        // Validation rejects these; evaluate defensively false
                        _ => false,
                    };
                    finish_step(&mut step, StepStatus::Success, json!(result), None, started);
                    self.record_step_update(&step).await?;

                    branch_taken.insert(node_id.clone(), result);
                    ctx.record_output(node_id.clone(), Value::Bool(result));
                    completed.insert(node_id);
                }
                _ => {
                    let mut step = self.record_started_step(execution_id, node).await?;
                    let started = Instant::now();
                    let outcome = self.execute_action(node).await;
                    let status = if outcome.success {
                        StepStatus::Success
                    } else {
                        StepStatus::Error
                    };
                    let step_error = outcome.error_message();
                    finish_step(
                        &mut step,
                        status,
                        outcome.output.clone(),
                        step_error.clone(),
                        started,
                    );
                    self.record_step_update(&step).await?;

                    if outcome.success {
                        ctx.record_output(node_id.clone(), outcome.output);
                        completed.insert(node_id);
                    } else {
                        // Nodes downstream of the failure are never visited
                        let message = format!(
                            "Node {} failed: {}",
                            node_name(node),
                            step_error.unwrap_or_else(|| "unknown error".to_string())
                        );
                        warn!(execution_id = %execution_id, node_id = %node.id, "{}", message);
                        return Ok(Walk::Failed(message));
                    }
                }
            }
        }

        Ok(Walk::Completed)
    }

    /// Dispatch an action node to its executor
    async fn execute_action(&self, node: &FlowNode) -> ActionOutcome {
        match ActionConfig::parse(&node.config) {
            ActionConfig::Shell(config) => executors::shell::execute(&config).await,
            ActionConfig::Http(config) => executors::http::execute(&config).await,
            ActionConfig::FileRead(config) => {
                executors::file::execute(&config, &self.file_access).await
            }
            ActionConfig::Plugin(config) => {
                executors::plugin::execute(&config, self.plugins.as_ref()).await
            }
            // Validation catches these before a run starts
            ActionConfig::Missing => {
                ActionOutcome::failure(json!({"error": "Action node has no configuration"}))
            }
            ActionConfig::Untyped => ActionOutcome::failure(
                json!({"error": "Action node has no action type configured"}),
            ),
            ActionConfig::Other { action_type, .. } => ActionOutcome::failure(json!({
                "error": format!("No executor registered for action type {}", action_type),
            })),
        }
    }

    async fn record_started_step(
        &self,
        execution_id: ExecutionId,
        node: &FlowNode,
    ) -> anyhow::Result<ExecutionStep> {
        let step = ExecutionStep {
            id: StepId::new(),
            execution_id,
            node_id: node.id.clone(),
            status: StepStatus::Running,
            input: Some(node.config.clone()),
            output: None,
            error: None,
            started_at: Some(Utc::now()),
            completed_at: None,
            duration_ms: None,
        };
        self.store.insert_step(&step).await?;
        self.events.emit(RunEvent::StepUpdated { step: step.clone() });
        Ok(step)
    }

    /// A step that is terminal from the start (trigger's implicit success)
    async fn record_finished_step(
        &self,
        execution_id: ExecutionId,
        node: &FlowNode,
        status: StepStatus,
        output: &Value,
    ) -> anyhow::Result<()> {
        let now = Utc::now();
        let step = ExecutionStep {
            id: StepId::new(),
            execution_id,
            node_id: node.id.clone(),
            status,
            input: None,
            output: Some(output.to_string()),
            error: None,
            started_at: Some(now),
            completed_at: Some(now),
            duration_ms: Some(0),
        };
        self.store.insert_step(&step).await?;
        self.events.emit(RunEvent::StepUpdated { step });
        Ok(())
    }

    async fn record_skipped_step(
        &self,
        execution_id: ExecutionId,
        node: &FlowNode,
    ) -> anyhow::Result<()> {
        let step = ExecutionStep {
            id: StepId::new(),
            execution_id,
            node_id: node.id.clone(),
            status: StepStatus::Skipped,
            input: None,
            output: None,
            error: None,
            started_at: None,
            completed_at: None,
            duration_ms: None,
        };
        self.store.insert_step(&step).await?;
        self.events.emit(RunEvent::StepUpdated { step });
        Ok(())
    }

    async fn record_step_update(&self, step: &ExecutionStep) -> anyhow::Result<()> {
        self.store.update_step(step).await?;
        self.events.emit(RunEvent::StepUpdated { step: step.clone() });
        Ok(())
    }
}

/// Whether an edge out of `source` selects its target, given the source's
/// condition result (if the source was a condition). Unlabeled edges are
/// always followed.
fn branch_selects(condition_result: Option<&bool>, branch: Option<&str>) -> bool {
    match (condition_result, branch) {
        (Some(result), Some(branch)) => {
            branch.eq_ignore_ascii_case(if *result { "true" } else { "false" })
        }
        _ => true,
    }
}

fn finish_step(
    step: &mut ExecutionStep,
    status: StepStatus,
    output: Value,
    error: Option<String>,
    started: Instant,
) {
    step.status = status;
    step.output = Some(output.to_string());
    step.error = error;
    step.completed_at = Some(Utc::now());
    step.duration_ms = Some(started.elapsed().as_millis() as i64);
}

fn node_name(node: &FlowNode) -> String {
    let label = node.label.trim();
    if label.is_empty() {
        format!("\"{}\"", node.kind)
    } else {
        label.to_string()
    }
}

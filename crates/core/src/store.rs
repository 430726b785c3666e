//! External Store boundary.
//!
//! Persistence of flows, executions and steps belongs to a database-like
//! collaborator outside this crate; the engine only depends on the
//! `FlowStore` trait. `MemoryFlowStore` backs tests and embedders that do
//! not need durability. The store is expected to serialize writes per
//! execution id; the engine itself never writes to one execution from two
//! tasks.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::types::{Execution, ExecutionId, ExecutionStep, Flow, FlowEdge, FlowId, FlowNode};

/// A flow together with its node and edge sets, loaded as one immutable
/// snapshot per run
#[derive(Debug, Clone)]
pub struct FlowGraph {
    pub flow: Flow,
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
}

/// Persistence boundary the engine reads flows from and writes run records to
#[async_trait]
pub trait FlowStore: Send + Sync {
    async fn load_graph(&self, flow_id: FlowId) -> Result<Option<FlowGraph>>;

    async fn insert_execution(&self, execution: &Execution) -> Result<()>;
    async fn update_execution(&self, execution: &Execution) -> Result<()>;
    async fn get_execution(&self, execution_id: ExecutionId) -> Result<Option<Execution>>;

    async fn insert_step(&self, step: &ExecutionStep) -> Result<()>;
    async fn update_step(&self, step: &ExecutionStep) -> Result<()>;
    /// Steps of an execution in insertion (visit) order
    async fn list_steps(&self, execution_id: ExecutionId) -> Result<Vec<ExecutionStep>>;
}

/// In-memory store for tests and embedded use
#[derive(Default)]
pub struct MemoryFlowStore {
    graphs: RwLock<HashMap<FlowId, FlowGraph>>,
    executions: RwLock<HashMap<ExecutionId, Execution>>,
    steps: RwLock<HashMap<ExecutionId, Vec<ExecutionStep>>>,
}

impl MemoryFlowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a flow graph so the engine can run it
    pub async fn put_graph(&self, graph: FlowGraph) {
        self.graphs.write().await.insert(graph.flow.id, graph);
    }

    pub async fn execution_count(&self) -> usize {
        self.executions.read().await.len()
    }
}

#[async_trait]
impl FlowStore for MemoryFlowStore {
    async fn load_graph(&self, flow_id: FlowId) -> Result<Option<FlowGraph>> {
        Ok(self.graphs.read().await.get(&flow_id).cloned())
    }

    async fn insert_execution(&self, execution: &Execution) -> Result<()> {
        self.executions
            .write()
            .await
            .insert(execution.id, execution.clone());
        Ok(())
    }

    async fn update_execution(&self, execution: &Execution) -> Result<()> {
        self.executions
            .write()
            .await
            .insert(execution.id, execution.clone());
        Ok(())
    }

    async fn get_execution(&self, execution_id: ExecutionId) -> Result<Option<Execution>> {
        Ok(self.executions.read().await.get(&execution_id).cloned())
    }

    async fn insert_step(&self, step: &ExecutionStep) -> Result<()> {
        self.steps
            .write()
            .await
            .entry(step.execution_id)
            .or_default()
            .push(step.clone());
        Ok(())
    }

    async fn update_step(&self, step: &ExecutionStep) -> Result<()> {
        let mut steps = self.steps.write().await;
        if let Some(rows) = steps.get_mut(&step.execution_id) {
            if let Some(row) = rows.iter_mut().find(|r| r.id == step.id) {
                *row = step.clone();
            }
        }
        Ok(())
    }

    async fn list_steps(&self, execution_id: ExecutionId) -> Result<Vec<ExecutionStep>> {
        Ok(self
            .steps
            .read()
            .await
            .get(&execution_id)
            .cloned()
            .unwrap_or_default())
    }
}

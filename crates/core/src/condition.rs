//! Condition expression trees and their evaluation.
//!
//! A condition is a small closed expression grammar stored inside a condition
//! node's configuration. Evaluation is total: ill-formed or unresolvable
//! expressions evaluate to `false` rather than failing the run.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::NodeId;

/// Comparison operators supported by `compare` expressions
pub const OPERATORS: [&str; 6] = ["eq", "neq", "gt", "gte", "lt", "lte"];

/// A condition expression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Condition {
    /// A literal string, number or boolean
    Literal {
        #[serde(default)]
        value: Option<Value>,
    },
    /// A dot-path lookup into the run's trigger/context data
    Context {
        #[serde(default)]
        path: Option<String>,
    },
    /// A dot-path lookup into a prior node's recorded output
    Node {
        #[serde(default, rename = "nodeId")]
        node_id: Option<String>,
        #[serde(default)]
        path: Option<String>,
    },
    /// Comparison of two sub-expressions
    Compare {
        #[serde(default)]
        left: Option<Box<Condition>>,
        #[serde(default)]
        operator: Option<String>,
        #[serde(default)]
        right: Option<Box<Condition>>,
    },
    /// True iff every sub-condition is true
    And {
        #[serde(default)]
        conditions: Vec<Condition>,
    },
    /// True iff any sub-condition is true
    Or {
        #[serde(default)]
        conditions: Vec<Condition>,
    },
}

/// Run-scoped data available to condition expressions: the trigger payload
/// plus the outputs of every node that has completed so far.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    pub trigger: Value,
    pub outputs: HashMap<NodeId, Value>,
}

impl RunContext {
    pub fn new(trigger: Value) -> Self {
        Self {
            trigger,
            outputs: HashMap::new(),
        }
    }

    /// Record a node's output so downstream conditions can reference it
    pub fn record_output(&mut self, node_id: NodeId, output: Value) {
        self.outputs.insert(node_id, output);
    }
}

impl Condition {
    /// Evaluate against run data. Never panics; anything unresolvable or
    /// ill-formed yields `false`.
    pub fn evaluate(&self, ctx: &RunContext) -> bool {
        match self {
            Condition::And { conditions } => {
                !conditions.is_empty() && conditions.iter().all(|c| c.evaluate(ctx))
            }
            Condition::Or { conditions } => conditions.iter().any(|c| c.evaluate(ctx)),
            Condition::Compare {
                left,
                operator,
                right,
            } => {
                let (Some(left), Some(operator), Some(right)) = (left, operator, right) else {
                    return false;
                };
                compare(left.resolve(ctx), operator, right.resolve(ctx))
            }
            // A bare value in condition position is truthy-checked
            leaf => is_truthy(&leaf.resolve(ctx)),
        }
    }

    /// Structural well-formedness, independent of run data
    pub fn is_well_formed(&self) -> bool {
        match self {
            Condition::Literal { value } => value.is_some(),
            Condition::Context { path } => path.is_some(),
            Condition::Node { node_id, .. } => node_id.is_some(),
            Condition::Compare {
                left,
                operator,
                right,
            } => {
                let operator_ok = operator
                    .as_deref()
                    .is_some_and(|op| OPERATORS.contains(&op));
                operator_ok
                    && left.as_deref().is_some_and(Condition::is_well_formed)
                    && right.as_deref().is_some_and(Condition::is_well_formed)
            }
            Condition::And { conditions } | Condition::Or { conditions } => {
                !conditions.is_empty() && conditions.iter().all(Condition::is_well_formed)
            }
        }
    }

    /// Resolve this expression to a value. `None` marks an unresolved
    /// reference, which coerces to the empty string in comparisons.
    fn resolve(&self, ctx: &RunContext) -> Option<Value> {
        match self {
            Condition::Literal { value } => value.clone(),
            Condition::Context { path } => lookup_path(&ctx.trigger, path.as_deref()?),
            Condition::Node { node_id, path } => {
                let output = ctx.outputs.get(&NodeId::new(node_id.clone()?))?;
                match path.as_deref() {
                    Some(path) if !path.is_empty() => lookup_path(output, path),
                    _ => Some(output.clone()),
                }
            }
            // Nested compound/compare operands resolve to their boolean result
            nested => Some(Value::Bool(nested.evaluate(ctx))),
        }
    }
}

/// Dot-path lookup into a JSON value; array segments may be numeric indices.
/// Missing segments resolve to `None`.
fn lookup_path(value: &Value, path: &str) -> Option<Value> {
    if path.is_empty() {
        return Some(value.clone());
    }
    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current.clone())
}

/// Compare two resolved operands.
///
/// Both sides are first normalized: if both parse as finite numbers (numeric
/// or numeric string), every operator compares numerically. Otherwise both
/// sides coerce to strings, with unresolved references becoming the empty
/// string; `eq`/`neq` compare those strings and the ordering operators have
/// no non-numeric meaning, so they yield `false`. Flows depend on these
/// exact edge cases (`"10" gt "5"` is numeric, a dangling node reference
/// compares equal to `""`).
fn compare(left: Option<Value>, operator: &str, right: Option<Value>) -> bool {
    if let (Some(l), Some(r)) = (as_number(&left), as_number(&right)) {
        return match operator {
            "eq" => l == r,
            "neq" => l != r,
            "gt" => l > r,
            "gte" => l >= r,
            "lt" => l < r,
            "lte" => l <= r,
            _ => false,
        };
    }

    let l = as_string(&left);
    let r = as_string(&right);
    match operator {
        "eq" => l == r,
        "neq" => l != r,
        _ => false,
    }
}

fn as_number(value: &Option<Value>) -> Option<f64> {
    let number = match value.as_ref()? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}

fn as_string(value: &Option<Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => other.to_string(),
    }
}

fn is_truthy(value: &Option<Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

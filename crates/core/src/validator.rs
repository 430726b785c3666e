//! Graph validation.
//!
//! `validate_graph` is a pure function over a flow's node and edge sets. It
//! never fails: every problem is collected into the report so callers can
//! display the full list, and structural checks keep running after earlier
//! ones have already found issues.

use serde::{Deserialize, Serialize};

use crate::condition::Condition;
use crate::config::{ActionConfig, ConditionConfig};
use crate::dag::FlowDag;
use crate::types::{FlowEdge, FlowNode, NodeId, NodeKind};

/// One validation problem, optionally tied to a specific node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub node_id: Option<NodeId>,
    pub message: String,
}

impl ValidationIssue {
    pub fn graph(message: impl Into<String>) -> Self {
        Self {
            node_id: None,
            message: message.into(),
        }
    }

    pub fn node(node_id: &NodeId, message: impl Into<String>) -> Self {
        Self {
            node_id: Some(node_id.clone()),
            message: message.into(),
        }
    }
}

/// Result of validating a flow graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    fn from_issues(issues: Vec<ValidationIssue>) -> Self {
        Self {
            valid: issues.is_empty(),
            issues,
        }
    }
}

/// Validate a flow graph structurally and semantically, accumulating every
/// applicable issue
pub fn validate_graph(nodes: &[FlowNode], edges: &[FlowEdge]) -> ValidationReport {
    let mut issues = Vec::new();

    // Nothing else is checkable against an empty graph
    if nodes.is_empty() {
        issues.push(ValidationIssue::graph("Flow has no nodes"));
        return ValidationReport::from_issues(issues);
    }

    let triggers: Vec<&FlowNode> = nodes
        .iter()
        .filter(|n| n.kind == NodeKind::Trigger)
        .collect();

    match triggers.len() {
        0 => issues.push(ValidationIssue::graph("Flow must have a trigger node")),
        1 => {}
        _ => {
            let extras = triggers[1..]
                .iter()
                .map(|n| display_name(n))
                .collect::<Vec<_>>()
                .join(", ");
            issues.push(ValidationIssue::graph(format!(
                "Multiple trigger nodes: {}",
                extras
            )));
        }
    }

    if let Some(trigger) = triggers.first() {
        if !edges.iter().any(|e| e.source == trigger.id) {
            issues.push(ValidationIssue::node(
                &trigger.id,
                "Trigger node has no outgoing connections",
            ));
        }
    }

    if !nodes.iter().any(|n| n.kind != NodeKind::Trigger) {
        issues.push(ValidationIssue::graph(
            "Flow must have at least one action or condition node",
        ));
    }

    for node in nodes.iter().filter(|n| n.kind != NodeKind::Trigger) {
        if !edges.iter().any(|e| e.target == node.id) {
            issues.push(ValidationIssue::node(
                &node.id,
                format!("Node {} is not connected", display_name(node)),
            ));
        }
    }

    // A single issue per graph regardless of how many cycles exist
    if FlowDag::build(nodes, edges).is_cyclic() {
        issues.push(ValidationIssue::graph("Flow contains a cycle"));
    }

    for node in nodes {
        match node.kind {
            NodeKind::Action => validate_action_node(node, &mut issues),
            NodeKind::Condition => validate_condition_node(node, &mut issues),
            _ => {}
        }
    }

    ValidationReport::from_issues(issues)
}

/// The name a validation message refers to a node by: its label when set,
/// otherwise its quoted kind (e.g. `"action"`)
fn display_name(node: &FlowNode) -> String {
    let label = node.label.trim();
    if label.is_empty() {
        format!("\"{}\"", node.kind)
    } else {
        label.to_string()
    }
}

fn validate_action_node(node: &FlowNode, issues: &mut Vec<ValidationIssue>) {
    match ActionConfig::parse(&node.config) {
        ActionConfig::Missing => issues.push(ValidationIssue::node(
            &node.id,
            format!("Node {} has no configuration", display_name(node)),
        )),
        ActionConfig::Untyped => issues.push(ValidationIssue::node(
            &node.id,
            format!("Node {} has no action type configured", display_name(node)),
        )),
        ActionConfig::Shell(config) => {
            if is_blank(&config.command) {
                issues.push(ValidationIssue::node(
                    &node.id,
                    "Shell action requires a command",
                ));
            }
        }
        ActionConfig::Http(config) => {
            // URL and method are reported independently
            if is_blank(&config.url) {
                issues.push(ValidationIssue::node(&node.id, "HTTP action requires a URL"));
            }
            if is_blank(&config.method) {
                issues.push(ValidationIssue::node(
                    &node.id,
                    "HTTP action requires a method",
                ));
            }
        }
        ActionConfig::FileRead(config) => {
            if is_blank(&config.path) {
                issues.push(ValidationIssue::node(
                    &node.id,
                    "File read action requires a path",
                ));
            }
        }
        // Plugin ids are checked at execution time; unknown action types are
        // accepted for forward compatibility
        ActionConfig::Plugin(_) | ActionConfig::Other { .. } => {}
    }
}

fn validate_condition_node(node: &FlowNode, issues: &mut Vec<ValidationIssue>) {
    match ConditionConfig::parse(&node.config) {
        ConditionConfig::Missing => issues.push(ValidationIssue::node(
            &node.id,
            "Condition node has no condition configured",
        )),
        ConditionConfig::Invalid => {
            issues.push(ValidationIssue::node(&node.id, "Condition has invalid type"))
        }
        ConditionConfig::Expr(condition) => validate_condition(&condition, &node.id, issues),
    }
}

fn validate_condition(condition: &Condition, node_id: &NodeId, issues: &mut Vec<ValidationIssue>) {
    match condition {
        Condition::Compare {
            left,
            operator,
            right,
        } => {
            if left.is_none() {
                issues.push(ValidationIssue::node(
                    node_id,
                    "Condition is missing left value",
                ));
            }
            if operator.is_none() {
                issues.push(ValidationIssue::node(
                    node_id,
                    "Condition is missing operator",
                ));
            }
            if right.is_none() {
                issues.push(ValidationIssue::node(
                    node_id,
                    "Condition is missing right value",
                ));
            }
            if let Some(left) = left {
                validate_condition(left, node_id, issues);
            }
            if let Some(right) = right {
                validate_condition(right, node_id, issues);
            }
        }
        Condition::And { conditions } => {
            if conditions.is_empty() {
                issues.push(ValidationIssue::node(
                    node_id,
                    "Compound AND condition has no sub-conditions",
                ));
            }
            for condition in conditions {
                validate_condition(condition, node_id, issues);
            }
        }
        Condition::Or { conditions } => {
            if conditions.is_empty() {
                issues.push(ValidationIssue::node(
                    node_id,
                    "Compound OR condition has no sub-conditions",
                ));
            }
            for condition in conditions {
                validate_condition(condition, node_id, issues);
            }
        }
        Condition::Literal { .. } | Condition::Context { .. } | Condition::Node { .. } => {}
    }
}

fn is_blank(field: &Option<String>) -> bool {
    field.as_deref().map_or(true, |s| s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EdgeId, FlowId, Position};
    use chrono::Utc;

    fn node(flow_id: FlowId, id: &str, kind: NodeKind, config: &str) -> FlowNode {
        FlowNode {
            id: NodeId::new(id),
            flow_id,
            kind,
            label: String::new(),
            position: Position::default(),
            config: config.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn edge(flow_id: FlowId, id: &str, source: &str, target: &str) -> FlowEdge {
        FlowEdge {
            id: EdgeId::new(id),
            flow_id,
            source: NodeId::new(source),
            target: NodeId::new(target),
            source_handle: None,
            target_handle: None,
            label: None,
            created_at: Utc::now(),
        }
    }

    const SHELL_OK: &str = r#"{"actionType": "shell.exec", "command": "echo ok"}"#;

    fn messages(report: &ValidationReport) -> Vec<&str> {
        report.issues.iter().map(|i| i.message.as_str()).collect()
    }

    #[test]
    fn test_empty_graph() {
        let report = validate_graph(&[], &[]);
        assert!(!report.valid);
        assert_eq!(messages(&report), vec!["Flow has no nodes"]);
    }

    #[test]
    fn test_missing_trigger() {
        let flow_id = FlowId::new();
        let nodes = vec![node(flow_id, "a", NodeKind::Action, SHELL_OK)];
        let edges = vec![edge(flow_id, "e1", "x", "a")];
        let report = validate_graph(&nodes, &edges);
        assert!(!report.valid);
        assert!(messages(&report).contains(&"Flow must have a trigger node"));
    }

    #[test]
    fn test_multiple_triggers_named() {
        let flow_id = FlowId::new();
        let mut second = node(flow_id, "t2", NodeKind::Trigger, "{}");
        second.label = "Backup Trigger".to_string();
        let nodes = vec![
            node(flow_id, "t1", NodeKind::Trigger, "{}"),
            second,
            node(flow_id, "a", NodeKind::Action, SHELL_OK),
        ];
        let edges = vec![edge(flow_id, "e1", "t1", "a")];
        let report = validate_graph(&nodes, &edges);
        assert!(!report.valid);
        assert!(report
            .issues
            .iter()
            .any(|i| i.message.starts_with("Multiple trigger nodes")
                && i.message.contains("Backup Trigger")));
    }

    #[test]
    fn test_trigger_without_outgoing_edges() {
        let flow_id = FlowId::new();
        let nodes = vec![
            node(flow_id, "t", NodeKind::Trigger, "{}"),
            node(flow_id, "a", NodeKind::Action, SHELL_OK),
        ];
        // The action is fed by something unknown, the trigger dangles
        let edges = vec![edge(flow_id, "e1", "ghost", "a")];
        let report = validate_graph(&nodes, &edges);
        assert!(messages(&report).contains(&"Trigger node has no outgoing connections"));
    }

    #[test]
    fn test_trigger_only_flow() {
        let flow_id = FlowId::new();
        let nodes = vec![node(flow_id, "t", NodeKind::Trigger, "{}")];
        let report = validate_graph(&nodes, &[]);
        assert!(messages(&report)
            .contains(&"Flow must have at least one action or condition node"));
    }

    #[test]
    fn test_orphan_node_named_by_label_or_kind() {
        let flow_id = FlowId::new();
        let mut labeled = node(flow_id, "b", NodeKind::Action, SHELL_OK);
        labeled.label = "Send Report".to_string();
        let nodes = vec![
            node(flow_id, "t", NodeKind::Trigger, "{}"),
            node(flow_id, "a", NodeKind::Action, SHELL_OK),
            labeled,
        ];
        let edges = vec![edge(flow_id, "e1", "t", "a")];
        let report = validate_graph(&nodes, &edges);
        assert!(report
            .issues
            .iter()
            .any(|i| i.message == "Node Send Report is not connected"));

        // Unlabeled orphans fall back to the quoted kind
        let nodes = vec![
            node(flow_id, "t", NodeKind::Trigger, "{}"),
            node(flow_id, "a", NodeKind::Action, SHELL_OK),
            node(flow_id, "b", NodeKind::Action, SHELL_OK),
        ];
        let report = validate_graph(&nodes, &edges);
        assert!(report
            .issues
            .iter()
            .any(|i| i.message == "Node \"action\" is not connected"));
    }

    #[test]
    fn test_cycle_reported_once() {
        let flow_id = FlowId::new();
        let nodes = vec![
            node(flow_id, "t", NodeKind::Trigger, "{}"),
            node(flow_id, "a", NodeKind::Action, SHELL_OK),
            node(flow_id, "b", NodeKind::Action, SHELL_OK),
        ];
        let edges = vec![
            edge(flow_id, "e1", "t", "a"),
            edge(flow_id, "e2", "a", "b"),
            edge(flow_id, "e3", "b", "a"),
        ];
        let report = validate_graph(&nodes, &edges);
        assert!(!report.valid);
        let cycle_issues = report
            .issues
            .iter()
            .filter(|i| i.message == "Flow contains a cycle")
            .count();
        assert_eq!(cycle_issues, 1);
    }

    #[test]
    fn test_self_loop_is_a_cycle() {
        let flow_id = FlowId::new();
        let nodes = vec![
            node(flow_id, "t", NodeKind::Trigger, "{}"),
            node(flow_id, "a", NodeKind::Action, SHELL_OK),
        ];
        let edges = vec![
            edge(flow_id, "e1", "t", "a"),
            edge(flow_id, "e2", "a", "a"),
        ];
        let report = validate_graph(&nodes, &edges);
        assert!(messages(&report).contains(&"Flow contains a cycle"));
    }

    #[test]
    fn test_issues_accumulate() {
        // No trigger, an orphan, and a misconfigured action in one call
        let flow_id = FlowId::new();
        let nodes = vec![
            node(flow_id, "a", NodeKind::Action, SHELL_OK),
            node(
                flow_id,
                "b",
                NodeKind::Action,
                r#"{"actionType": "shell.exec"}"#,
            ),
        ];
        let edges = vec![edge(flow_id, "e1", "a", "b")];
        let report = validate_graph(&nodes, &edges);
        assert!(!report.valid);
        assert!(report.issues.len() >= 3);
        let msgs = messages(&report);
        assert!(msgs.contains(&"Flow must have a trigger node"));
        assert!(msgs.iter().any(|m| m.contains("is not connected")));
        assert!(msgs.contains(&"Shell action requires a command"));
    }

    #[test]
    fn test_action_config_issues() {
        let flow_id = FlowId::new();
        let cases = [
            ("", "has no configuration"),
            ("{}", "has no action type configured"),
            ("{broken", "has no action type configured"),
            (
                r#"{"actionType": "shell.exec", "command": "   "}"#,
                "Shell action requires a command",
            ),
            (
                r#"{"actionType": "file.read"}"#,
                "File read action requires a path",
            ),
        ];
        for (config, expected) in cases {
            let nodes = vec![
                node(flow_id, "t", NodeKind::Trigger, "{}"),
                node(flow_id, "a", NodeKind::Action, config),
            ];
            let edges = vec![edge(flow_id, "e1", "t", "a")];
            let report = validate_graph(&nodes, &edges);
            assert!(
                report.issues.iter().any(|i| i.message.contains(expected)),
                "config {:?} should produce {:?}, got {:?}",
                config,
                expected,
                report.issues
            );
        }
    }

    #[test]
    fn test_http_url_and_method_reported_independently() {
        let flow_id = FlowId::new();
        let nodes = vec![
            node(flow_id, "t", NodeKind::Trigger, "{}"),
            node(
                flow_id,
                "a",
                NodeKind::Action,
                r#"{"actionType": "http.request"}"#,
            ),
        ];
        let edges = vec![edge(flow_id, "e1", "t", "a")];
        let report = validate_graph(&nodes, &edges);
        let msgs = messages(&report);
        assert!(msgs.contains(&"HTTP action requires a URL"));
        assert!(msgs.contains(&"HTTP action requires a method"));
    }

    #[test]
    fn test_unknown_action_type_accepted() {
        let flow_id = FlowId::new();
        let nodes = vec![
            node(flow_id, "t", NodeKind::Trigger, "{}"),
            node(
                flow_id,
                "a",
                NodeKind::Action,
                r#"{"actionType": "email.send"}"#,
            ),
        ];
        let edges = vec![edge(flow_id, "e1", "t", "a")];
        let report = validate_graph(&nodes, &edges);
        assert!(report.valid, "unexpected issues: {:?}", report.issues);
    }

    #[test]
    fn test_condition_issues() {
        let flow_id = FlowId::new();
        let missing_parts = r#"{"condition": {"type": "compare"}}"#;
        let nodes = vec![
            node(flow_id, "t", NodeKind::Trigger, "{}"),
            node(flow_id, "c", NodeKind::Condition, missing_parts),
        ];
        let edges = vec![edge(flow_id, "e1", "t", "c")];
        let report = validate_graph(&nodes, &edges);
        let msgs = messages(&report);
        assert!(msgs.contains(&"Condition is missing left value"));
        assert!(msgs.contains(&"Condition is missing operator"));
        assert!(msgs.contains(&"Condition is missing right value"));

        let unconfigured = vec![
            node(flow_id, "t", NodeKind::Trigger, "{}"),
            node(flow_id, "c", NodeKind::Condition, "{}"),
        ];
        let report = validate_graph(&unconfigured, &edges);
        assert!(messages(&report).contains(&"Condition node has no condition configured"));

        let invalid = vec![
            node(flow_id, "t", NodeKind::Trigger, "{}"),
            node(
                flow_id,
                "c",
                NodeKind::Condition,
                r#"{"condition": {"type": "regex", "pattern": ".*"}}"#,
            ),
        ];
        let report = validate_graph(&invalid, &edges);
        assert!(messages(&report).contains(&"Condition has invalid type"));
    }

    #[test]
    fn test_nested_compound_conditions() {
        let flow_id = FlowId::new();
        let nested = r#"{"condition": {"type": "and", "conditions": [
            {"type": "or", "conditions": []},
            {"type": "compare",
             "left": {"type": "literal", "value": 1},
             "operator": "eq",
             "right": {"type": "literal", "value": 1}}
        ]}}"#;
        let nodes = vec![
            node(flow_id, "t", NodeKind::Trigger, "{}"),
            node(flow_id, "c", NodeKind::Condition, nested),
        ];
        let edges = vec![edge(flow_id, "e1", "t", "c")];
        let report = validate_graph(&nodes, &edges);
        assert!(messages(&report).contains(&"Compound OR condition has no sub-conditions"));

        let empty_and = r#"{"condition": {"type": "and", "conditions": []}}"#;
        let nodes = vec![
            node(flow_id, "t", NodeKind::Trigger, "{}"),
            node(flow_id, "c", NodeKind::Condition, empty_and),
        ];
        let report = validate_graph(&nodes, &edges);
        assert!(messages(&report).contains(&"Compound AND condition has no sub-conditions"));
    }

    #[test]
    fn test_valid_linear_flow() {
        let flow_id = FlowId::new();
        let nodes = vec![
            node(flow_id, "t", NodeKind::Trigger, "{}"),
            node(flow_id, "a", NodeKind::Action, SHELL_OK),
            node(flow_id, "b", NodeKind::Action, SHELL_OK),
        ];
        let edges = vec![
            edge(flow_id, "e1", "t", "a"),
            edge(flow_id, "e2", "a", "b"),
        ];
        let report = validate_graph(&nodes, &edges);
        assert!(report.valid, "unexpected issues: {:?}", report.issues);
        assert!(report.issues.is_empty());
    }
}

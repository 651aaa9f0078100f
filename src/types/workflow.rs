// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use kube::CustomResource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Argo Workflow, modelled only as far as run submission and monitoring need.
/// Other workflow spec fields pass through untouched.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[kube(group = "argoproj.io", version = "v1alpha1", kind = "Workflow")]
#[kube(namespaced)]
#[kube(status = "WorkflowStatus")]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Arguments>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
pub struct Arguments {
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, schemars::JsonSchema)]
pub struct Parameter {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nodes: Option<BTreeMap<String, NodeStatus>>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}

/// Step counts across the nodes of a workflow
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeProgress {
    pub total: usize,
    pub succeeded: usize,
    pub running: usize,
    pub pending: usize,
    pub failed: Vec<String>,
}

impl NodeProgress {
    pub fn percent(&self) -> usize {
        if self.total == 0 {
            0
        } else {
            self.succeeded * 100 / self.total
        }
    }
}

impl Workflow {
    pub fn phase(&self) -> &str {
        self.status
            .as_ref()
            .and_then(|s| s.phase.as_deref())
            .unwrap_or("Pending")
    }

    /// Succeeded, Failed and Error are final
    pub fn is_finished(&self) -> bool {
        matches!(self.phase(), "Succeeded" | "Failed" | "Error")
    }

    pub fn node_progress(&self) -> NodeProgress {
        let mut progress = NodeProgress::default();
        let Some(nodes) = self.status.as_ref().and_then(|s| s.nodes.as_ref()) else {
            return progress;
        };

        for (name, node) in nodes {
            progress.total += 1;
            match node.phase.as_deref() {
                Some("Succeeded") => progress.succeeded += 1,
                Some("Running") => progress.running += 1,
                Some("Failed") | Some("Error") => progress
                    .failed
                    .push(node.display_name.clone().unwrap_or_else(|| name.clone())),
                _ => progress.pending += 1,
            }
        }
        progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workflow_from_json(value: serde_json::Value) -> Workflow {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_unknown_spec_fields_are_preserved() {
        let wf = workflow_from_json(serde_json::json!({
            "apiVersion": "argoproj.io/v1alpha1",
            "kind": "Workflow",
            "metadata": { "generateName": "instructlab-" },
            "spec": {
                "entrypoint": "main",
                "arguments": { "parameters": [{ "name": "sdg_repo_url" }] },
                "templates": [{ "name": "main" }]
            }
        }));

        assert_eq!(wf.spec.extra["entrypoint"], "main");
        let out = serde_json::to_value(&wf).unwrap();
        assert_eq!(out["spec"]["templates"][0]["name"], "main");
        assert_eq!(out["spec"]["arguments"]["parameters"][0]["name"], "sdg_repo_url");
    }

    #[test]
    fn test_phase_defaults_to_pending() {
        let wf = workflow_from_json(serde_json::json!({
            "apiVersion": "argoproj.io/v1alpha1",
            "kind": "Workflow",
            "metadata": { "name": "wf" },
            "spec": {}
        }));
        assert_eq!(wf.phase(), "Pending");
        assert!(!wf.is_finished());
    }

    #[test]
    fn test_node_progress() {
        let wf = workflow_from_json(serde_json::json!({
            "apiVersion": "argoproj.io/v1alpha1",
            "kind": "Workflow",
            "metadata": { "name": "wf" },
            "spec": {},
            "status": {
                "phase": "Running",
                "nodes": {
                    "wf-1": { "phase": "Succeeded" },
                    "wf-2": { "phase": "Succeeded" },
                    "wf-3": { "phase": "Running" },
                    "wf-4": { "phase": "Failed", "displayName": "sdg-op" }
                }
            }
        }));

        let progress = wf.node_progress();
        assert_eq!(progress.total, 4);
        assert_eq!(progress.succeeded, 2);
        assert_eq!(progress.running, 1);
        assert_eq!(progress.failed, vec!["sdg-op".to_string()]);
        assert_eq!(progress.percent(), 50);
    }

    #[test]
    fn test_finished_phases() {
        for (phase, finished) in [("Succeeded", true), ("Error", true), ("Running", false)] {
            let wf = workflow_from_json(serde_json::json!({
                "apiVersion": "argoproj.io/v1alpha1",
                "kind": "Workflow",
                "metadata": { "name": "wf" },
                "spec": {},
                "status": { "phase": phase }
            }));
            assert_eq!(wf.is_finished(), finished, "phase {}", phase);
        }
    }
}

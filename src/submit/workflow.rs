// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use super::{RunRequest, RunStatus, RunSubmitter, SubmittedRun};
use crate::error::{DeployError, Result};
use crate::types::workflow::{Arguments, Parameter};
use crate::types::Workflow;
use async_trait::async_trait;
use kube::api::{Api, PostParams};
use kube::Client;
use std::path::Path;
use tracing::{info, instrument};

const DEFAULT_GENERATE_NAME: &str = "instructlab-";
const DISPLAY_NAME_ANNOTATION: &str = "pipelines.kubeflow.org/run_name";

/// Submits runs by creating an Argo Workflow from a compiled template
pub struct WorkflowSubmitter {
    client: Client,
    namespace: String,
    template: Workflow,
}

impl WorkflowSubmitter {
    pub fn new(client: Client, namespace: impl Into<String>, template: Workflow) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            template,
        }
    }

    pub fn from_template_file(
        client: Client,
        namespace: impl Into<String>,
        path: &Path,
    ) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let template = parse_template(&text)
            .map_err(|e| DeployError::ManifestError(format!("{}: {}", path.display(), e)))?;
        Ok(Self::new(client, namespace, template))
    }

    /// The workflow to create: the template with namespace and arguments filled in
    pub fn render(&self, request: &RunRequest) -> Workflow {
        let mut wf = self.template.clone();
        let meta = &mut wf.metadata;
        meta.namespace = Some(self.namespace.clone());
        meta.resource_version = None;
        meta.uid = None;
        if meta.name.is_none() && meta.generate_name.is_none() {
            meta.generate_name = Some(DEFAULT_GENERATE_NAME.to_string());
        }
        meta.annotations.get_or_insert_with(Default::default).insert(
            DISPLAY_NAME_ANNOTATION.to_string(),
            request.display_name().to_string(),
        );
        wf.status = None;

        let arguments = wf.spec.arguments.get_or_insert_with(Arguments::default);
        let values = request.parameters().to_workflow_parameters();
        merge_parameters(&mut arguments.parameters, values);
        wf
    }
}

/// Overwrite values of parameters the template declares, append the rest
fn merge_parameters(declared: &mut Vec<Parameter>, values: Vec<Parameter>) {
    for value in values {
        match declared.iter_mut().find(|p| p.name == value.name) {
            Some(existing) => existing.value = value.value,
            None => declared.push(value),
        }
    }
}

pub fn parse_template(text: &str) -> std::result::Result<Workflow, serde_yaml::Error> {
    serde_yaml::from_str(text)
}

/// Map a cluster API failure to the same error classes the REST path reports
fn classify_kube_error(e: kube::Error, missing: impl FnOnce() -> String) -> DeployError {
    match e {
        kube::Error::Api(resp) if resp.code == 401 || resp.code == 403 => {
            DeployError::Authentication {
                status: resp.code,
                message: resp.message,
            }
        }
        kube::Error::Api(resp) if resp.code == 404 => DeployError::PipelineNotFound(missing()),
        kube::Error::HyperError(e) => DeployError::Connectivity(e.to_string()),
        kube::Error::Service(e) => DeployError::Connectivity(e.to_string()),
        other => DeployError::KubeError(other),
    }
}

#[async_trait]
impl RunSubmitter for WorkflowSubmitter {
    #[instrument(
        skip(self, request),
        fields(namespace = %self.namespace, run = %request.display_name())
    )]
    async fn submit(&self, request: &RunRequest) -> Result<SubmittedRun> {
        let api: Api<Workflow> = Api::namespaced(self.client.clone(), &self.namespace);
        let created = api
            .create(&PostParams::default(), &self.render(request))
            .await
            .map_err(|e| {
                classify_kube_error(e, || {
                    format!("the Workflow API is not served in {}", self.namespace)
                })
            })?;

        let run_id = created.metadata.name.ok_or_else(|| DeployError::ApiError {
            status: 201,
            message: "created workflow has no name".to_string(),
        })?;
        info!("Created workflow {}", run_id);

        Ok(SubmittedRun {
            run_id,
            display_name: request.display_name().to_string(),
        })
    }

    async fn status(&self, run_id: &str) -> Result<RunStatus> {
        let api: Api<Workflow> = Api::namespaced(self.client.clone(), &self.namespace);
        let wf = api.get(run_id).await.map_err(|e| {
            classify_kube_error(e, || {
                format!("workflow {} not found in {}", run_id, self.namespace)
            })
        })?;
        let progress = wf.node_progress();

        let mut detail = format!(
            "{}% of {} steps, {} running",
            progress.percent(),
            progress.total,
            progress.running
        );
        if !progress.failed.is_empty() {
            detail.push_str(&format!(", failed: {}", progress.failed.join(", ")));
        }
        if let Some(message) = wf.status.as_ref().and_then(|s| s.message.as_deref()) {
            detail.push_str(&format!(", {}", message));
        }

        Ok(RunStatus {
            run_id: run_id.to_string(),
            state: wf.phase().to_string(),
            finished: wf.is_finished(),
            succeeded: wf.phase() == "Succeeded",
            detail: Some(detail),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submit::params::{self, PipelineParameters};
    use crate::test_utils::{status_json, MockService};
    use serde_json::json;

    const NS: &str = "petloan-instructlab";
    const WORKFLOWS: &str = "/apis/argoproj.io/v1alpha1/namespaces/petloan-instructlab/workflows";

    const TEMPLATE: &str = r#"
apiVersion: argoproj.io/v1alpha1
kind: Workflow
metadata:
  generateName: ilab-
spec:
  entrypoint: pipeline
  serviceAccountName: pipeline-runner-dspa
  arguments:
    parameters:
      - name: sdg_repo_url
        value: https://example.com/placeholder
      - name: sdg_scale_factor
        value: "2"
  templates:
    - name: pipeline
"#;

    fn request() -> RunRequest {
        let mut p = PipelineParameters::new();
        p.set(params::REPO_URL, json!("https://github.com/org/taxonomy"))
            .set(params::BASE_MODEL, json!("microsoft/DialoGPT-medium"))
            .set(params::OUTPUT_MODEL_NAME, json!("test-model"))
            .set("sdg_scale_factor", json!(5));
        RunRequest::new("instructlab-test", "", p).unwrap()
    }

    fn workflow_json(name: &str, phase: &str, nodes: serde_json::Value) -> String {
        json!({
            "apiVersion": "argoproj.io/v1alpha1",
            "kind": "Workflow",
            "metadata": { "name": name, "namespace": NS },
            "spec": { "entrypoint": "pipeline" },
            "status": { "phase": phase, "nodes": nodes }
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_render_injects_parameters_and_keeps_template() {
        let mock = MockService::new();
        let wf = submitter(&mock).render(&request());
        assert_eq!(wf.metadata.namespace.as_deref(), Some(NS));
        assert_eq!(wf.metadata.generate_name.as_deref(), Some("ilab-"));
        assert_eq!(wf.spec.extra["serviceAccountName"], "pipeline-runner-dspa");

        let parameters = &wf.spec.arguments.as_ref().unwrap().parameters;
        assert_eq!(parameters[0].name, "sdg_repo_url");
        assert_eq!(parameters[0].value.as_deref(), Some("https://github.com/org/taxonomy"));
        assert_eq!(parameters[1].value.as_deref(), Some("5"));
        assert_eq!(parameters.len(), 4);
    }

    #[tokio::test]
    async fn test_render_defaults_generate_name() {
        let mock = MockService::new();
        let bare = "apiVersion: argoproj.io/v1alpha1\nkind: Workflow\nmetadata: {}\nspec: {}\n";
        let template = parse_template(bare).unwrap();
        let wf = WorkflowSubmitter::new(mock.client(), NS, template).render(&request());

        assert_eq!(wf.metadata.generate_name.as_deref(), Some(DEFAULT_GENERATE_NAME));
        assert_eq!(wf.spec.arguments.unwrap().parameters.len(), 4);
    }

    #[tokio::test]
    async fn test_submit_returns_generated_name() {
        let created = workflow_json("ilab-x7k2p", "Pending", json!({}));
        let mock = MockService::new().on_post(WORKFLOWS, 201, &created);

        let submitted = submitter(&mock).submit(&request()).await.unwrap();
        assert_eq!(submitted.run_id, "ilab-x7k2p");

        let body: serde_json::Value = serde_json::from_str(&mock.requests()[0].body).unwrap();
        assert_eq!(body["metadata"]["generateName"], "ilab-");
        assert_eq!(body["spec"]["entrypoint"], "pipeline");
    }

    fn submitter(mock: &MockService) -> WorkflowSubmitter {
        WorkflowSubmitter::new(mock.client(), NS, parse_template(TEMPLATE).unwrap())
    }

    #[tokio::test]
    async fn test_submit_forbidden_is_authentication() {
        let mock = MockService::new().on_post(
            WORKFLOWS,
            403,
            &status_json(403, "Forbidden", "workflows.argoproj.io is forbidden"),
        );

        let err = submitter(&mock).submit(&request()).await.unwrap_err();
        assert!(matches!(err, DeployError::Authentication { status: 403, .. }));
        assert!(err.to_string().contains("forbidden"));
        assert!(err.remediation().is_some());
    }

    #[tokio::test]
    async fn test_submit_without_workflow_api_is_pipeline_not_found() {
        let mock = MockService::new().on_post(
            WORKFLOWS,
            404,
            &status_json(404, "NotFound", "the server could not find the requested resource"),
        );

        let err = submitter(&mock).submit(&request()).await.unwrap_err();
        assert!(matches!(err, DeployError::PipelineNotFound(_)));
        assert!(err.to_string().contains(NS));
    }

    #[tokio::test]
    async fn test_status_of_unknown_workflow_is_pipeline_not_found() {
        let mock = MockService::new();

        let err = submitter(&mock).status("ilab-gone").await.unwrap_err();
        assert!(matches!(err, DeployError::PipelineNotFound(_)));
        assert!(err.to_string().contains("ilab-gone"));
    }

    #[test]
    fn test_transport_failure_is_connectivity() {
        let refused = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = classify_kube_error(kube::Error::Service(Box::new(refused)), String::new);
        assert!(matches!(err, DeployError::Connectivity(_)));
    }

    #[test]
    fn test_other_api_failures_stay_kube_errors() {
        let conflict = kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: "already exists".to_string(),
            reason: "AlreadyExists".to_string(),
            code: 409,
        };
        let err = classify_kube_error(kube::Error::Api(conflict), String::new);
        assert!(matches!(err, DeployError::KubeError(_)));
    }

    #[tokio::test]
    async fn test_status_reports_progress() {
        let nodes = json!({
            "a": { "displayName": "sdg", "phase": "Succeeded" },
            "b": { "displayName": "train", "phase": "Running" }
        });
        let mock = MockService::new().on_get(
            &format!("{}/ilab-x7k2p", WORKFLOWS),
            200,
            &workflow_json("ilab-x7k2p", "Running", nodes),
        );
        let status = submitter(&mock).status("ilab-x7k2p").await.unwrap();
        assert_eq!(status.state, "Running");
        assert!(!status.finished);
        assert_eq!(status.detail.as_deref(), Some("50% of 2 steps, 1 running"));
    }

    #[tokio::test]
    async fn test_template_file_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        std::fs::write(&path, "kind: [").unwrap();

        let mock = MockService::new();
        let err = WorkflowSubmitter::from_template_file(mock.client(), NS, &path)
            .err()
            .unwrap();
        assert!(err.to_string().contains("broken.yaml"));
    }
}

// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use super::api::{CreateRun, PipelineApiClient, PipelineVersionReference, RuntimeConfig};
use super::{RunRequest, RunStatus, RunSubmitter, SubmittedRun};
use crate::error::{DeployError, Result};
use async_trait::async_trait;
use tracing::{info, instrument};

const TERMINAL_STATES: &[&str] = &["SUCCEEDED", "FAILED", "CANCELED", "SKIPPED"];

/// Submits runs of a registered pipeline through the pipeline REST API
pub struct ManagedApiSubmitter {
    api: PipelineApiClient,
    pipeline_display_name: String,
}

impl ManagedApiSubmitter {
    pub fn new(api: PipelineApiClient, pipeline_display_name: impl Into<String>) -> Self {
        Self {
            api,
            pipeline_display_name: pipeline_display_name.into(),
        }
    }

    /// Resolve the pipeline and the version runs are created against
    async fn resolve(&self) -> Result<PipelineVersionReference> {
        let pipeline = self.api.find_pipeline(&self.pipeline_display_name).await?;
        let version = self
            .api
            .list_versions(&pipeline.pipeline_id)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                DeployError::PipelineNotFound(format!(
                    "pipeline '{}' has no versions",
                    self.pipeline_display_name
                ))
            })?;

        info!(
            "Using pipeline {} version {}",
            pipeline.pipeline_id, version.pipeline_version_id
        );
        Ok(PipelineVersionReference {
            pipeline_id: pipeline.pipeline_id,
            pipeline_version_id: version.pipeline_version_id,
        })
    }
}

#[async_trait]
impl RunSubmitter for ManagedApiSubmitter {
    #[instrument(skip(self, request), fields(run = %request.display_name()))]
    async fn submit(&self, request: &RunRequest) -> Result<SubmittedRun> {
        let reference = self.resolve().await?;
        let body = CreateRun {
            display_name: request.display_name().to_string(),
            description: request.description().to_string(),
            pipeline_version_reference: reference,
            runtime_config: RuntimeConfig {
                parameters: request.parameters().as_map().clone(),
            },
        };

        let run = self.api.create_run(&body).await?;
        info!("Created run {}", run.run_id);
        Ok(SubmittedRun {
            run_id: run.run_id,
            display_name: run.display_name.unwrap_or(body.display_name),
        })
    }

    async fn status(&self, run_id: &str) -> Result<RunStatus> {
        let run = self.api.get_run(run_id).await?;
        let state = run.state.unwrap_or_else(|| "PENDING".to_string());
        let detail = run
            .error
            .as_ref()
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
            .map(str::to_string);

        Ok(RunStatus {
            run_id: run_id.to_string(),
            finished: TERMINAL_STATES.contains(&state.as_str()),
            succeeded: state == "SUCCEEDED",
            state,
            detail,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submit::params::{self, PipelineParameters};
    use crate::test_utils::{mount_json, received};
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PIPELINES: &str = r#"{"pipelines":[
        {"pipeline_id":"p-iris","display_name":"iris"},
        {"pipeline_id":"p-ilab","display_name":"InstructLab"}
    ]}"#;

    fn submitter(base_url: &str) -> ManagedApiSubmitter {
        let api = PipelineApiClient::new(
            base_url,
            Some("token".to_string()),
            true,
            Duration::from_secs(5),
        )
        .unwrap();
        ManagedApiSubmitter::new(api, "InstructLab")
    }

    fn request() -> RunRequest {
        let mut p = PipelineParameters::new();
        p.set(params::REPO_URL, json!("https://example.com/org/taxonomy.git"))
            .set(params::BASE_MODEL, json!("microsoft/DialoGPT-medium"))
            .set(params::OUTPUT_MODEL_NAME, json!("test-model"));
        RunRequest::new("instructlab-test", "integration run", p).unwrap()
    }

    #[tokio::test]
    async fn test_submit_creates_run_against_first_version() {
        let server = MockServer::start().await;
        mount_json(&server, "GET", "/apis/v2beta1/pipelines", 200, PIPELINES).await;
        mount_json(
            &server,
            "GET",
            "/apis/v2beta1/pipelines/p-ilab/versions",
            200,
            r#"{"pipeline_versions":[
                {"pipeline_version_id":"v-2"},
                {"pipeline_version_id":"v-1"}
            ]}"#,
        )
        .await;
        mount_json(
            &server,
            "POST",
            "/apis/v2beta1/runs",
            200,
            r#"{"run_id":"run-42","display_name":"instructlab-test","state":"PENDING"}"#,
        )
        .await;

        let submitted = submitter(&server.uri()).submit(&request()).await.unwrap();
        assert_eq!(submitted.run_id, "run-42");

        let posts = received(&server, "POST", "/apis/v2beta1/runs").await;
        assert_eq!(posts.len(), 1);
        let body = &posts[0];
        assert_eq!(body["pipeline_version_reference"]["pipeline_id"], "p-ilab");
        assert_eq!(body["pipeline_version_reference"]["pipeline_version_id"], "v-2");
        let parameters = &body["runtime_config"]["parameters"];
        assert_eq!(parameters["output_model_name"], "test-model");
        assert_eq!(parameters["sdg_base_model"], "microsoft/DialoGPT-medium");
    }

    #[tokio::test]
    async fn test_submit_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/apis/v2beta1/pipelines"))
            .and(header("authorization", "Bearer token"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(PIPELINES, "application/json"))
            .expect(1)
            .mount(&server)
            .await;

        // The versions route is not mounted, so resolution stops after the listing
        let err = submitter(&server.uri()).submit(&request()).await.unwrap_err();
        assert!(matches!(err, DeployError::PipelineNotFound(_)));
        server.verify().await;
    }

    #[tokio::test]
    async fn test_submit_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/apis/v2beta1/pipelines"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
            .mount(&server)
            .await;

        let err = submitter(&server.uri()).submit(&request()).await.unwrap_err();
        assert!(matches!(err, DeployError::Authentication { status: 401, .. }));
        assert!(err.remediation().is_some());
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_submit_without_registered_pipeline() {
        let server = MockServer::start().await;
        mount_json(
            &server,
            "GET",
            "/apis/v2beta1/pipelines",
            200,
            r#"{"pipelines":[{"pipeline_id":"p-iris","display_name":"iris"}]}"#,
        )
        .await;

        let err = submitter(&server.uri()).submit(&request()).await.unwrap_err();
        assert!(matches!(err, DeployError::PipelineNotFound(_)));
        let requests = server.received_requests().await.unwrap();
        assert!(requests.iter().all(|r| r.method.to_string() == "GET"));
    }

    #[tokio::test]
    async fn test_versions_endpoint_missing_is_pipeline_not_found() {
        let server = MockServer::start().await;
        mount_json(&server, "GET", "/apis/v2beta1/pipelines", 200, PIPELINES).await;

        let err = submitter(&server.uri()).submit(&request()).await.unwrap_err();
        assert!(matches!(err, DeployError::PipelineNotFound(_)));
        assert!(received(&server, "POST", "/apis/v2beta1/runs").await.is_empty());
    }

    #[tokio::test]
    async fn test_submit_unreachable_api() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = submitter(&format!("http://127.0.0.1:{}", port))
            .submit(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::Connectivity(_)));
    }

    #[tokio::test]
    async fn test_status_maps_terminal_states() {
        let server = MockServer::start().await;
        mount_json(
            &server,
            "GET",
            "/apis/v2beta1/runs/run-ok",
            200,
            r#"{"run_id":"run-ok","state":"SUCCEEDED"}"#,
        )
        .await;
        mount_json(
            &server,
            "GET",
            "/apis/v2beta1/runs/run-bad",
            200,
            &json!({
                "run_id": "run-bad",
                "state": "FAILED",
                "error": { "message": "training step OOMKilled" }
            })
            .to_string(),
        )
        .await;
        mount_json(
            &server,
            "GET",
            "/apis/v2beta1/runs/run-busy",
            200,
            r#"{"run_id":"run-busy","state":"RUNNING"}"#,
        )
        .await;
        let s = submitter(&server.uri());

        let ok = s.status("run-ok").await.unwrap();
        assert!(ok.finished && ok.succeeded);

        let bad = s.status("run-bad").await.unwrap();
        assert!(bad.finished && !bad.succeeded);
        assert_eq!(bad.detail.as_deref(), Some("training step OOMKilled"));

        let busy = s.status("run-busy").await.unwrap();
        assert!(!busy.finished);
    }
}

// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! HTTP client for the Kubeflow Pipelines v2beta1 REST API served by the DSPA.

use crate::constants::api_paths;
use crate::error::{DeployError, Result};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineSummary {
    pub pipeline_id: String,
    pub display_name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ListPipelinesResponse {
    #[serde(default)]
    pipelines: Vec<PipelineSummary>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineVersion {
    pub pipeline_version_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ListVersionsResponse {
    #[serde(default)]
    pipeline_versions: Vec<PipelineVersion>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineVersionReference {
    pub pipeline_id: String,
    pub pipeline_version_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RuntimeConfig {
    pub parameters: BTreeMap<String, serde_json::Value>,
}

/// Body of `POST /apis/v2beta1/runs`
#[derive(Debug, Clone, Serialize)]
pub struct CreateRun {
    pub display_name: String,
    pub description: String,
    pub pipeline_version_reference: PipelineVersionReference,
    pub runtime_config: RuntimeConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiRun {
    #[serde(default)]
    pub run_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct PipelineApiClient {
    base_url: String,
    token: Option<String>,
    client: Client,
}

impl PipelineApiClient {
    /// `insecure` skips certificate verification, needed for the self-signed
    /// certificate behind a local port-forward.
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        insecure: bool,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(insecure)
            .timeout(timeout)
            .build()
            .map_err(|e| DeployError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self::with_client(base_url, token, client))
    }

    pub fn with_client(base_url: impl Into<String>, token: Option<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response> {
        self.authorized(builder)
            .send()
            .await
            .map_err(|e| DeployError::Connectivity(format!("{}: {}", self.base_url, e)))
    }

    /// Check the status code and deserialize the body
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(classify_status(status, message));
        }

        response.json().await.map_err(|e| DeployError::ApiError {
            status: status.as_u16(),
            message: format!("Failed to parse response: {}", e),
        })
    }

    /// `GET /apis/v2beta1/healthz`
    #[instrument(skip(self), fields(api = %self.base_url))]
    pub async fn healthz(&self) -> Result<serde_json::Value> {
        let url = format!("{}{}", self.base_url, api_paths::HEALTHZ);
        let response = self.send(self.client.get(&url)).await?;
        self.handle_response(response).await
    }

    /// All registered pipelines, following pagination
    #[instrument(skip(self), fields(api = %self.base_url))]
    pub async fn list_pipelines(&self) -> Result<Vec<PipelineSummary>> {
        let url = format!("{}{}", self.base_url, api_paths::PIPELINES);
        let mut pipelines = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.client.get(&url).query(&[("page_size", "100")]);
            if let Some(token) = &page_token {
                request = request.query(&[("page_token", token.as_str())]);
            }
            let response = self.send(request).await?;
            let page: ListPipelinesResponse = self.handle_response(response).await?;
            pipelines.extend(page.pipelines);

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        debug!("Found {} pipelines", pipelines.len());
        Ok(pipelines)
    }

    /// Find a registered pipeline by display name
    pub async fn find_pipeline(&self, display_name: &str) -> Result<PipelineSummary> {
        self.list_pipelines()
            .await?
            .into_iter()
            .find(|p| p.display_name == display_name)
            .ok_or_else(|| {
                DeployError::PipelineNotFound(format!(
                    "no pipeline named '{}' is registered at {}",
                    display_name, self.base_url
                ))
            })
    }

    pub async fn list_versions(&self, pipeline_id: &str) -> Result<Vec<PipelineVersion>> {
        let url = format!(
            "{}{}/{}/versions",
            self.base_url,
            api_paths::PIPELINES,
            pipeline_id
        );
        let response = self.send(self.client.get(&url)).await?;
        let versions: ListVersionsResponse =
            self.handle_response(response).await.map_err(|e| match e {
                DeployError::ApiError { status: 404, .. } => DeployError::PipelineNotFound(
                    format!("pipeline {} has no versions endpoint", pipeline_id),
                ),
                other => other,
            })?;
        Ok(versions.pipeline_versions)
    }

    #[instrument(skip(self, run), fields(api = %self.base_url, run = %run.display_name))]
    pub async fn create_run(&self, run: &CreateRun) -> Result<ApiRun> {
        let url = format!("{}{}", self.base_url, api_paths::RUNS);
        let response = self.send(self.client.post(&url).json(run)).await?;
        let created: ApiRun = self.handle_response(response).await?;

        if created.run_id.is_empty() {
            return Err(DeployError::ApiError {
                status: 200,
                message: "create-run response has no run_id".to_string(),
            });
        }
        Ok(created)
    }

    pub async fn get_run(&self, run_id: &str) -> Result<ApiRun> {
        let url = format!("{}{}/{}", self.base_url, api_paths::RUNS, run_id);
        let response = self.send(self.client.get(&url)).await?;
        self.handle_response(response).await
    }
}

/// Map an unsuccessful status to the error class that drives remediation
pub fn classify_status(status: StatusCode, message: String) -> DeployError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => DeployError::Authentication {
            status: status.as_u16(),
            message,
        },
        _ => DeployError::ApiError {
            status: status.as_u16(),
            message,
        },
    }
}

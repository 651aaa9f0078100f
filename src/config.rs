// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::{defaults, timing};
use anyhow::{Context, Result};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// How a pipeline run is handed to the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SubmitStrategy {
    /// Create the run through the managed pipeline REST API
    #[default]
    ManagedApi,
    /// Create an Argo Workflow directly from a template manifest
    Workflow,
}

impl SubmitStrategy {
    /// Whether runs go through the pipeline REST API, the only endpoint reached by tunnel
    pub fn uses_pipeline_api(self) -> bool {
        matches!(self, SubmitStrategy::ManagedApi)
    }
}

impl FromStr for SubmitStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "managed-api" => Ok(SubmitStrategy::ManagedApi),
            "workflow" => Ok(SubmitStrategy::Workflow),
            other => Err(format!("unknown submit strategy '{}'", other)),
        }
    }
}

impl fmt::Display for SubmitStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitStrategy::ManagedApi => f.write_str("managed-api"),
            SubmitStrategy::Workflow => f.write_str("workflow"),
        }
    }
}

/// Names of the credential secrets the pipeline expects to find
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretNames {
    pub git: String,
    pub object_storage: String,
    pub registry: String,
    pub model_endpoint: String,
}

impl SecretNames {
    pub fn all(&self) -> [&str; 4] {
        [
            &self.git,
            &self.object_storage,
            &self.registry,
            &self.model_endpoint,
        ]
    }
}

/// Object store the DSPA writes artifacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStorageConfig {
    pub host: String,
    pub bucket: String,
    pub region: String,
}

/// Deployment configuration, threaded through every component
#[derive(Debug, Clone)]
pub struct Config {
    pub namespace: String,
    /// Name of the DataSciencePipelinesApplication resource
    pub application_name: String,
    pub service_account: String,
    /// ClusterRole bound to the pipeline service account
    pub cluster_role: String,
    pub secrets: SecretNames,
    pub object_storage: ObjectStorageConfig,
    pub pipeline_display_name: String,
    /// Pipeline API base URL; defaults to the local tunnel endpoint
    pub api_url: Option<String>,
    pub api_port: u16,
    pub token: Option<String>,
    pub insecure_tls: bool,
    pub ready_timeout: Duration,
    pub poll_interval: Duration,
    pub probe_timeout: Duration,
    pub submit_strategy: SubmitStrategy,
    pub workflow_template: Option<PathBuf>,
    pub min_kubernetes_minor: u32,
    /// Cluster CLI used for port-forward tunnels
    pub kubectl: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            namespace: defaults::NAMESPACE.to_string(),
            application_name: defaults::APPLICATION_NAME.to_string(),
            service_account: defaults::SERVICE_ACCOUNT.to_string(),
            cluster_role: defaults::CLUSTER_ROLE.to_string(),
            secrets: SecretNames {
                git: defaults::GIT_SECRET.to_string(),
                object_storage: defaults::STORAGE_SECRET.to_string(),
                registry: defaults::REGISTRY_SECRET.to_string(),
                model_endpoint: defaults::MODEL_ENDPOINT_SECRET.to_string(),
            },
            object_storage: ObjectStorageConfig {
                host: defaults::OBJECT_STORAGE_HOST.to_string(),
                bucket: defaults::OBJECT_STORAGE_BUCKET.to_string(),
                region: defaults::OBJECT_STORAGE_REGION.to_string(),
            },
            pipeline_display_name: defaults::PIPELINE_DISPLAY_NAME.to_string(),
            api_url: None,
            api_port: defaults::API_PORT,
            token: None,
            insecure_tls: true,
            ready_timeout: Duration::from_secs(timing::READY_TIMEOUT_SECS),
            poll_interval: Duration::from_secs(timing::POLL_INTERVAL_SECS),
            probe_timeout: Duration::from_secs(timing::PROBE_TIMEOUT_SECS),
            submit_strategy: SubmitStrategy::default(),
            workflow_template: None,
            min_kubernetes_minor: defaults::MIN_KUBERNETES_MINOR,
            kubectl: "kubectl".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        let base = Config::default();

        Ok(Config {
            namespace: env_or("DSPA_NAMESPACE", base.namespace),
            application_name: env_or("DSPA_NAME", base.application_name),
            service_account: env_or("DSPA_SERVICE_ACCOUNT", base.service_account),
            cluster_role: env_or("DSPA_CLUSTER_ROLE", base.cluster_role),
            secrets: SecretNames {
                git: env_or("DSPA_GIT_SECRET", base.secrets.git),
                object_storage: env_or("DSPA_STORAGE_SECRET", base.secrets.object_storage),
                registry: env_or("DSPA_REGISTRY_SECRET", base.secrets.registry),
                model_endpoint: env_or("DSPA_MODEL_SECRET", base.secrets.model_endpoint),
            },
            object_storage: ObjectStorageConfig {
                host: env_or("DSPA_S3_HOST", base.object_storage.host),
                bucket: env_or("DSPA_S3_BUCKET", base.object_storage.bucket),
                region: env_or("DSPA_S3_REGION", base.object_storage.region),
            },
            pipeline_display_name: env_or("DSPA_PIPELINE_NAME", base.pipeline_display_name),
            api_url: env::var("DSPA_API_URL").ok(),
            api_port: env_parse("DSPA_API_PORT", base.api_port)?,
            token: env::var("DSPA_TOKEN").ok(),
            insecure_tls: env_parse("DSPA_INSECURE_TLS", base.insecure_tls)?,
            ready_timeout: Duration::from_secs(env_parse(
                "DSPA_READY_TIMEOUT_SECS",
                timing::READY_TIMEOUT_SECS,
            )?),
            poll_interval: Duration::from_secs(env_parse(
                "DSPA_POLL_INTERVAL_SECS",
                timing::POLL_INTERVAL_SECS,
            )?),
            probe_timeout: Duration::from_secs(env_parse(
                "DSPA_PROBE_TIMEOUT_SECS",
                timing::PROBE_TIMEOUT_SECS,
            )?),
            submit_strategy: match env::var("DSPA_SUBMIT_STRATEGY") {
                Ok(v) => v.parse().map_err(anyhow::Error::msg)?,
                Err(_) => base.submit_strategy,
            },
            workflow_template: env::var("DSPA_WORKFLOW_TEMPLATE").ok().map(PathBuf::from),
            min_kubernetes_minor: env_parse("DSPA_MIN_K8S_MINOR", base.min_kubernetes_minor)?,
            kubectl: env_or("DSPA_KUBECTL", base.kubectl),
        })
    }

    /// Name of the pipeline API server service (and its deployment)
    pub fn api_service_name(&self) -> String {
        format!("ds-pipeline-{}", self.application_name)
    }

    /// Base URL of the pipeline API, the local tunnel endpoint unless overridden
    pub fn api_base_url(&self) -> Result<Url> {
        let raw = self
            .api_url
            .clone()
            .unwrap_or_else(|| format!("https://localhost:{}", self.api_port));
        Url::parse(&raw).with_context(|| format!("Invalid pipeline API URL '{}'", raw))
    }

    /// Pod name prefixes that must be running once the DSPA has converged
    pub fn expected_pod_prefixes(&self) -> Vec<String> {
        let app = &self.application_name;
        vec![
            format!("ds-pipeline-{}", app),
            format!("ds-pipeline-persistenceagent-{}", app),
            format!("ds-pipeline-scheduledworkflow-{}", app),
            format!("ds-pipeline-metadata-envoy-{}", app),
            format!("ds-pipeline-metadata-grpc-{}", app),
            format!("mariadb-{}", app),
        ]
    }

    /// Services the DSPA operator is expected to create
    pub fn expected_services(&self) -> Vec<String> {
        let app = &self.application_name;
        vec![
            format!("ds-pipeline-{}", app),
            format!("ds-pipeline-metadata-grpc-{}", app),
            format!("mariadb-{}", app),
        ]
    }

    /// Name of the RoleBinding granting the service account its role
    pub fn role_binding_name(&self) -> String {
        format!("{}-{}", self.service_account, self.cluster_role)
    }
}

fn env_or(key: &str, default: String) -> String {
    env::var(key).unwrap_or(default)
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(v) => v
            .parse()
            .with_context(|| format!("{} has an invalid value '{}'", key, v)),
        Err(_) => Ok(default),
    }
}

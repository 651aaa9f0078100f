// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Failed to read kubeconfig: {0}")]
    KubeconfigError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Invalid manifest: {0}")]
    ManifestError(String),

    #[error("Failed to apply {kind} '{name}': {source}")]
    ApplyError {
        kind: String,
        name: String,
        #[source]
        source: kube::Error,
    },

    #[error("Tunnel error: {0}")]
    TunnelError(String),

    #[error("Authentication rejected (status {status}): {message}")]
    Authentication { status: u16, message: String },

    #[error("Pipeline not found: {0}")]
    PipelineNotFound(String),

    #[error("Cannot reach the API server: {0}")]
    Connectivity(String),

    #[error("Pipeline API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid pipeline parameters: {0}")]
    InvalidParameters(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DeployError {
    /// Remediation hint for submission failures, one per failure class
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            DeployError::Authentication { .. } => {
                Some("Re-authenticate (`oc login`) or pass a fresh bearer token with --token")
            }
            DeployError::PipelineNotFound(_) => Some(concat!(
                "Enable the managed pipeline with `dspactl enable-pipeline` ",
                "and wait for the API server to register it"
            )),
            DeployError::Connectivity(_) => Some(concat!(
                "Check connectivity to the API server; is ",
                "`kubectl port-forward svc/ds-pipeline-<name> 8888:8888` running?"
            )),
            DeployError::InvalidParameters(_) => {
                Some("Fix the pipeline parameters; see `dspactl submit --help`")
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, DeployError>;

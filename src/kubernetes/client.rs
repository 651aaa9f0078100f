// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Cluster client creation and bearer-token lookup from the kubeconfig

use crate::error::{DeployError, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Client;
use secrecy::ExposeSecret;
use tracing::{debug, info};

/// Create a client for the cluster of the current kubeconfig context (or in-cluster config)
pub async fn create_client() -> Result<Client> {
    let client = Client::try_default()
        .await
        .map_err(|e| DeployError::KubeconfigError(format!("Failed to create client: {}", e)))?;
    info!("Connected to Kubernetes cluster");
    Ok(client)
}

/// Bearer token of the current context's user, if it authenticates with one
pub async fn session_token(kubeconfig: Kubeconfig) -> Result<Option<String>> {
    let config = kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .map_err(|e| DeployError::KubeconfigError(format!("Failed to load kubeconfig: {}", e)))?;

    Ok(config
        .auth_info
        .token
        .as_ref()
        .map(|token| token.expose_secret().to_string()))
}

/// Resolve the bearer token for the pipeline API: an explicit token wins,
/// otherwise the token of the current session. Every file listed in
/// `$KUBECONFIG` is merged, else `~/.kube/config` is read.
pub async fn resolve_bearer_token(explicit: Option<&str>) -> Result<String> {
    if let Some(token) = explicit {
        return Ok(token.to_string());
    }

    let kubeconfig = Kubeconfig::read().map_err(|e| DeployError::KubeconfigError(e.to_string()))?;
    debug!("Reading bearer token of context {:?}", kubeconfig.current_context);

    session_token(kubeconfig)
        .await?
        .ok_or_else(|| DeployError::Authentication {
            status: 0,
            message: "the current kubeconfig context has no bearer token; log in with `oc login`"
                .to_string(),
        })
}

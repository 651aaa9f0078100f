// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Post-deployment validation.
//!
//! Reads what a deployment should have produced and records one result per
//! expected object. Nothing is modified. A missing object is recorded and
//! the remaining checks still run.

use crate::config::Config;
use crate::constants::{defaults, timing};
use crate::kubernetes::{resolve_bearer_token, Tunnel};
use crate::report::{CheckResult, Report};
use crate::submit::PipelineApiClient;
use crate::types::DataSciencePipelinesApplication;
use k8s_openapi::api::core::v1::{Namespace, Pod, Secret, Service, ServiceAccount};
use k8s_openapi::api::rbac::v1::RoleBinding;
use kube::api::{Api, ListParams};
use kube::runtime::wait::{conditions::is_pod_running, Condition};
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::time::Duration;
use tracing::{debug, info, instrument};

const NAMESPACE: &str = "namespace";
const APPLICATION: &str = "application";
const IDENTITY: &str = "identity";
const SECRETS: &str = "secrets";
const PODS: &str = "pods";
const SERVICES: &str = "services";
const API: &str = "api";

pub struct Validator {
    client: Client,
    config: Config,
}

impl Validator {
    pub fn new(client: Client, config: Config) -> Self {
        Self { client, config }
    }

    /// Run every check. The liveness probe opens a temporary tunnel when enabled.
    #[instrument(skip(self), fields(namespace = %self.config.namespace))]
    pub async fn run(&self, probe_liveness: bool) -> Report {
        let mut report = Report::new(format!(
            "Validation of {}/{}",
            self.config.namespace, self.config.application_name
        ));
        report.extend(self.check_resources().await);
        if probe_liveness {
            report.push(self.check_liveness().await);
        }
        info!(
            "Validation finished: {} failed, {} warnings",
            report.failures(),
            report.warnings()
        );
        report
    }

    /// All cluster-object checks
    pub async fn check_resources(&self) -> Vec<CheckResult> {
        let mut results = vec![self.check_namespace().await, self.check_application().await];
        results.extend(self.check_identity().await);
        results.extend(self.check_secrets().await);
        results.extend(self.check_pods().await);
        results.extend(self.check_services().await);
        results
    }

    async fn check_namespace(&self) -> CheckResult {
        let api: Api<Namespace> = Api::all(self.client.clone());
        presence(&api, NAMESPACE, &self.config.namespace)
            .await
            .with_remediation("Run `dspactl deploy` to create the namespace")
    }

    async fn check_application(&self) -> CheckResult {
        let api: Api<DataSciencePipelinesApplication> =
            Api::namespaced(self.client.clone(), &self.config.namespace);
        let name = &self.config.application_name;

        match api.get_opt(name).await {
            Ok(Some(app)) if app.is_ready() => CheckResult::ok(APPLICATION, name, "Ready"),
            Ok(Some(app)) => {
                let reason = app
                    .condition(crate::constants::dspa::READY_CONDITION)
                    .and_then(|c| c.message.clone().or_else(|| c.reason.clone()))
                    .unwrap_or_else(|| "no Ready condition yet".to_string());
                CheckResult::warning(APPLICATION, name, format!("not Ready: {}", reason))
                    .with_remediation(
                        "Wait for the operator to finish reconciling, then validate again",
                    )
            }
            Ok(None) => CheckResult::failed(APPLICATION, name, "not found")
                .with_remediation("Run `dspactl deploy` to create the application"),
            Err(e) => CheckResult::failed(APPLICATION, name, format!("lookup failed: {}", e)),
        }
    }

    async fn check_identity(&self) -> Vec<CheckResult> {
        let namespace = &self.config.namespace;
        let accounts: Api<ServiceAccount> = Api::namespaced(self.client.clone(), namespace);
        let bindings: Api<RoleBinding> = Api::namespaced(self.client.clone(), namespace);

        vec![
            presence(&accounts, IDENTITY, &self.config.service_account).await,
            presence(&bindings, IDENTITY, &self.config.role_binding_name()).await,
        ]
    }

    async fn check_secrets(&self) -> Vec<CheckResult> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &self.config.namespace);
        let mut results = Vec::new();
        for name in self.config.secrets.all() {
            let hint = format!(
                "Create it with `dspactl create-secret {} --from-literal key=value`",
                name
            );
            results.push(presence(&api, SECRETS, name).await.with_remediation(hint));
        }
        results
    }

    /// Each expected pod prefix must match at least one running pod with all containers ready
    async fn check_pods(&self) -> Vec<CheckResult> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), &self.config.namespace);
        let prefixes = self.config.expected_pod_prefixes();

        let pods = match api.list(&ListParams::default()).await {
            Ok(list) => list.items,
            Err(e) => {
                return prefixes
                    .iter()
                    .map(|p| CheckResult::failed(PODS, p, format!("cannot list pods: {}", e)))
                    .collect()
            }
        };

        prefixes
            .iter()
            .map(|prefix| {
                let matching: Vec<&Pod> = pods
                    .iter()
                    .filter(|pod| {
                        pod.metadata
                            .name
                            .as_deref()
                            .is_some_and(|n| n.starts_with(prefix.as_str()))
                    })
                    .collect();
                debug!("{} pods match {}", matching.len(), prefix);

                match matching.iter().find(|pod| pod_healthy(pod)) {
                    Some(pod) => CheckResult::ok(
                        PODS,
                        prefix,
                        format!("{} running", pod.metadata.name.as_deref().unwrap_or_default()),
                    ),
                    None if matching.is_empty() => CheckResult::failed(PODS, prefix, "no pod found")
                        .with_remediation("Check the application status and operator logs"),
                    None => CheckResult::failed(
                        PODS,
                        prefix,
                        format!("{} pod(s) present, none running and ready", matching.len()),
                    )
                    .with_remediation("Inspect the pod events with `oc describe pod`"),
                }
            })
            .collect()
    }

    async fn check_services(&self) -> Vec<CheckResult> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), &self.config.namespace);
        let mut results = Vec::new();
        for name in self.config.expected_services() {
            results.push(presence(&api, SERVICES, &name).await);
        }
        results
    }

    /// Liveness of the pipeline API through a temporary tunnel. Never blocking.
    async fn check_liveness(&self) -> CheckResult {
        let startup = Duration::from_secs(timing::TUNNEL_STARTUP_SECS);
        let service = self.config.api_service_name();

        let opened = Tunnel::open(&self.config, &service, defaults::API_PORT, startup).await;
        let tunnel = match opened {
            Ok(tunnel) => tunnel,
            Err(e) => {
                return CheckResult::warning(API, "liveness", format!("tunnel failed: {}", e))
                    .with_remediation(
                        "Ensure kubectl is installed and may port-forward in the namespace",
                    )
            }
        };

        let token = resolve_bearer_token(self.config.token.as_deref()).await.ok();
        let insecure = self.config.insecure_tls;
        let timeout = self.config.probe_timeout;
        tunnel
            .scoped(|url| async move { probe_liveness(&url, token, insecure, timeout).await })
            .await
    }
}

/// Probe `GET /apis/v2beta1/healthz` at `base_url`; failures are reported as warnings
pub async fn probe_liveness(
    base_url: &str,
    token: Option<String>,
    insecure: bool,
    timeout: Duration,
) -> CheckResult {
    let api = match PipelineApiClient::new(base_url, token, insecure, timeout) {
        Ok(api) => api,
        Err(e) => return CheckResult::warning(API, "liveness", e.to_string()),
    };

    match api.healthz().await {
        Ok(info) => {
            let version = info
                .get("tag_name")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown version");
            CheckResult::ok(API, "liveness", format!("healthy ({})", version))
        }
        Err(e) => CheckResult::warning(API, "liveness", e.to_string())
            .with_remediation("Check the ds-pipeline API server pod logs"),
    }
}

fn pod_healthy(pod: &Pod) -> bool {
    let containers_ready = pod
        .status
        .as_ref()
        .and_then(|s| s.container_statuses.as_ref())
        .is_some_and(|statuses| !statuses.is_empty() && statuses.iter().all(|c| c.ready));
    is_pod_running().matches_object(Some(pod)) && containers_ready
}

/// OK when the named object exists, FAILED otherwise
async fn presence<K>(api: &Api<K>, category: &str, name: &str) -> CheckResult
where
    K: Resource + Clone + DeserializeOwned + Debug,
    K::DynamicType: Default,
{
    let kind = K::kind(&Default::default()).to_string();
    match api.get_opt(name).await {
        Ok(Some(_)) => CheckResult::ok(category, name, format!("{} present", kind)),
        Ok(None) => CheckResult::failed(category, name, format!("{} not found", kind)),
        Err(e) => CheckResult::failed(category, name, format!("{} lookup failed: {}", kind, e)),
    }
}

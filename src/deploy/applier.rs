// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Ordered server-side apply of the deployment manifests and the readiness wait.

use crate::config::Config;
use crate::constants::FIELD_MANAGER;
use crate::deploy::manifests::{order, Manifest};
use crate::error::{DeployError, Result};
use crate::types::application::{ManagedPipeline, ManagedPipelines, MANAGED};
use crate::types::DataSciencePipelinesApplication;
use crate::wait::{poll_until, WaitOutcome};
use k8s_openapi::NamespaceResourceScope;
use kube::{
    api::{Patch, PatchParams},
    Api, Client, Resource,
};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;
use tracing::{info, instrument, warn};

/// What a deploy did
#[derive(Debug, Clone)]
pub struct DeploySummary {
    /// `Kind/name` of every applied resource, in apply order
    pub applied: Vec<String>,
    /// Present when an application resource was part of the deploy
    pub readiness: Option<WaitOutcome>,
}

impl DeploySummary {
    pub fn ready(&self) -> bool {
        self.readiness.map_or(true, |r| r.is_ready())
    }
}

pub struct Applier {
    client: Client,
    config: Config,
}

impl Applier {
    pub fn new(client: Client, config: Config) -> Self {
        Self { client, config }
    }

    /// Apply `manifests` in dependency order. The first rejected resource
    /// aborts the sequence. If an application resource was applied, wait for
    /// it to report Ready; a timeout is logged and does not fail the deploy.
    pub async fn deploy(&self, mut manifests: Vec<Manifest>) -> Result<DeploySummary> {
        order(&mut manifests);

        let mut applied = Vec::with_capacity(manifests.len());
        let mut application = None;

        for manifest in &manifests {
            self.apply(manifest).await?;
            applied.push(format!("{}/{}", manifest.kind(), manifest.name()));
            if let Manifest::Application(app) = manifest {
                application = Some(app.clone());
            }
        }

        let readiness = match application {
            Some(app) => {
                let namespace = app
                    .metadata
                    .namespace
                    .clone()
                    .unwrap_or_else(|| self.config.namespace.clone());
                let name = app.metadata.name.clone().unwrap_or_default();
                let outcome = self.wait_ready(&namespace, &name).await;
                if !outcome.is_ready() {
                    warn!(
                        "{} '{}' not Ready after {} checks; run `dspactl validate` to verify",
                        app_kind(),
                        name,
                        outcome.attempts()
                    );
                }
                Some(outcome)
            }
            None => None,
        };

        Ok(DeploySummary { applied, readiness })
    }

    /// Create or update one resource with server-side apply
    #[instrument(skip(self, manifest), fields(kind = manifest.kind(), name = %manifest.name()))]
    pub async fn apply(&self, manifest: &Manifest) -> Result<()> {
        match manifest {
            Manifest::Namespace(r) => {
                apply_object(Api::all(self.client.clone()), r, manifest).await
            }
            Manifest::ServiceAccount(r) => {
                apply_object(self.namespaced(r.metadata.namespace.as_deref()), r, manifest).await
            }
            Manifest::RoleBinding(r) => {
                apply_object(self.namespaced(r.metadata.namespace.as_deref()), r, manifest).await
            }
            Manifest::Secret(r) => {
                apply_object(self.namespaced(r.metadata.namespace.as_deref()), r, manifest).await
            }
            Manifest::Application(r) => {
                apply_object(self.namespaced(r.metadata.namespace.as_deref()), r, manifest).await
            }
        }
    }

    /// Api in the manifest's namespace, else the configured one
    fn namespaced<K>(&self, namespace: Option<&str>) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        let namespace = namespace.unwrap_or(self.config.namespace.as_str());
        Api::namespaced(self.client.clone(), namespace)
    }

    /// Poll the application's Ready condition at the configured interval until the timeout
    #[instrument(skip(self))]
    pub async fn wait_ready(&self, namespace: &str, name: &str) -> WaitOutcome {
        let api: Api<DataSciencePipelinesApplication> =
            Api::namespaced(self.client.clone(), namespace);
        info!(
            "Waiting up to {:?} for {} '{}' to become Ready (every {:?})",
            self.config.ready_timeout,
            app_kind(),
            name,
            self.config.poll_interval
        );

        let outcome = poll_until(self.config.ready_timeout, self.config.poll_interval, || {
            let api = api.clone();
            let name = name.to_string();
            async move { api.get(&name).await.map(|app| app.is_ready()) }
        })
        .await;

        if let WaitOutcome::Ready { elapsed, .. } = outcome {
            info!("{} '{}' Ready after {:?}", app_kind(), name, elapsed);
        }
        outcome
    }

    /// Switch the managed InstructLab pipeline on with a targeted merge patch
    #[instrument(skip(self))]
    pub async fn enable_managed_pipeline(&self) -> Result<()> {
        let api: Api<DataSciencePipelinesApplication> =
            Api::namespaced(self.client.clone(), &self.config.namespace);
        let patch = serde_json::json!({
            "spec": {
                "apiServer": {
                    "managedPipelines": ManagedPipelines {
                        instruct_lab: Some(ManagedPipeline { state: MANAGED.to_string() }),
                    }
                }
            }
        });

        api.patch(
            &self.config.application_name,
            &PatchParams::default(),
            &Patch::Merge(&patch),
        )
        .await
        .map_err(|source| DeployError::ApplyError {
            kind: app_kind().to_string(),
            name: self.config.application_name.clone(),
            source,
        })?;

        info!(
            "Managed InstructLab pipeline enabled on {}/{}",
            self.config.namespace, self.config.application_name
        );
        Ok(())
    }
}

fn app_kind() -> &'static str {
    crate::constants::dspa::KIND
}

async fn apply_object<K>(api: Api<K>, object: &K, manifest: &Manifest) -> Result<()>
where
    K: Resource + Clone + DeserializeOwned + Serialize + Debug,
{
    let name = manifest.name();
    let pp = PatchParams::apply(FIELD_MANAGER).force();

    api.patch(&name, &pp, &Patch::Apply(object))
        .await
        .map_err(|source| DeployError::ApplyError {
            kind: manifest.kind().to_string(),
            name: name.clone(),
            source,
        })?;

    info!("Applied {} '{}'", manifest.kind(), name);
    Ok(())
}

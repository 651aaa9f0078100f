// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::config::Config;
use crate::constants::dspa::READY_CONDITION;
use kube::api::ObjectMeta;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// State value that tells the operator to register a managed pipeline
pub const MANAGED: &str = "Managed";

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[kube(
    group = "datasciencepipelinesapplications.opendatahub.io",
    version = "v1alpha1",
    kind = "DataSciencePipelinesApplication",
    shortname = "dspa"
)]
#[kube(namespaced)]
#[kube(status = "ApplicationStatus")]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dsp_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_server: Option<ApiServer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<Database>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_storage: Option<ObjectStorage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mlmd: Option<Mlmd>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiServer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deploy: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_sample_pipeline: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub managed_pipelines: Option<ManagedPipelines>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManagedPipelines {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instruct_lab: Option<ManagedPipeline>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
pub struct ManagedPipeline {
    /// "Managed" or "Removed"
    pub state: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Database {
    #[serde(rename = "mariaDB", skip_serializing_if = "Option::is_none")]
    pub maria_db: Option<MariaDb>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MariaDb {
    pub deploy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pvc_size: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObjectStorage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_storage: Option<ExternalStorage>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExternalStorage {
    pub host: String,
    pub bucket: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    pub s3_credentials_secret: S3CredentialsSecret,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct S3CredentialsSecret {
    pub secret_name: String,
    pub access_key: String,
    pub secret_key: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
pub struct Mlmd {
    pub deploy: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<Condition>>,
}

#[derive(Serialize, Deserialize, Clone, Debug, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DataSciencePipelinesApplication {
    /// Build the desired application for a configuration: MariaDB, MLMD,
    /// external object storage, and the InstructLab pipeline managed.
    pub fn desired(config: &Config) -> Self {
        let storage = &config.object_storage;
        DataSciencePipelinesApplication {
            metadata: ObjectMeta {
                name: Some(config.application_name.clone()),
                namespace: Some(config.namespace.clone()),
                ..Default::default()
            },
            spec: ApplicationSpec {
                dsp_version: Some("v2".to_string()),
                api_server: Some(ApiServer {
                    deploy: Some(true),
                    enable_sample_pipeline: Some(false),
                    managed_pipelines: Some(ManagedPipelines {
                        instruct_lab: Some(ManagedPipeline {
                            state: MANAGED.to_string(),
                        }),
                    }),
                }),
                database: Some(Database {
                    maria_db: Some(MariaDb {
                        deploy: true,
                        pvc_size: Some("10Gi".to_string()),
                    }),
                }),
                object_storage: Some(ObjectStorage {
                    external_storage: Some(ExternalStorage {
                        host: storage.host.clone(),
                        bucket: storage.bucket.clone(),
                        region: Some(storage.region.clone()),
                        scheme: Some("https".to_string()),
                        s3_credentials_secret: S3CredentialsSecret {
                            secret_name: config.secrets.object_storage.clone(),
                            access_key: "AWS_ACCESS_KEY_ID".to_string(),
                            secret_key: "AWS_SECRET_ACCESS_KEY".to_string(),
                        },
                    }),
                }),
                mlmd: Some(Mlmd { deploy: true }),
            },
            status: None,
        }
    }

    /// Check if the application is ready based on its status conditions
    pub fn is_ready(&self) -> bool {
        self.condition(READY_CONDITION)
            .is_some_and(|c| c.status == "True")
    }

    pub fn condition(&self, condition_type: &str) -> Option<&Condition> {
        self.status
            .as_ref()
            .and_then(|s| s.conditions.as_ref())
            .and_then(|conditions| {
                conditions
                    .iter()
                    .find(|c| c.condition_type == condition_type)
            })
    }

    /// Whether the managed InstructLab pipeline is switched on
    pub fn instructlab_managed(&self) -> bool {
        self.spec
            .api_server
            .as_ref()
            .and_then(|a| a.managed_pipelines.as_ref())
            .and_then(|m| m.instruct_lab.as_ref())
            .is_some_and(|p| p.state == MANAGED)
    }
}

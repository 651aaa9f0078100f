// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// The field manager used for server-side apply
pub const FIELD_MANAGER: &str = "dspactl";

/// Defaults for the deployment target. Every value can be overridden through `Config`.
pub mod defaults {
    pub const NAMESPACE: &str = "petloan-instructlab";
    pub const APPLICATION_NAME: &str = "dspa";
    pub const SERVICE_ACCOUNT: &str = "pipeline-runner-dspa";
    pub const CLUSTER_ROLE: &str = "edit";
    pub const PIPELINE_DISPLAY_NAME: &str = "InstructLab";
    pub const API_PORT: u16 = 8888;
    pub const MIN_KUBERNETES_MINOR: u32 = 25;

    /// Git credentials for the taxonomy repository
    pub const GIT_SECRET: &str = "taxonomy-repo-secret";
    /// Object storage credentials used by the DSPA
    pub const STORAGE_SECRET: &str = "dspa-object-storage";
    /// Registry push credentials for the output model image
    pub const REGISTRY_SECRET: &str = "oci-output-push-secret";
    /// Teacher/judge model endpoint credentials
    pub const MODEL_ENDPOINT_SECRET: &str = "teacher-secret";

    pub const OBJECT_STORAGE_HOST: &str = "s3.amazonaws.com";
    pub const OBJECT_STORAGE_BUCKET: &str = "instructlab-pipelines";
    pub const OBJECT_STORAGE_REGION: &str = "us-east-1";
}

/// Readiness and probe timing, in seconds
pub mod timing {
    pub const READY_TIMEOUT_SECS: u64 = 600;
    pub const POLL_INTERVAL_SECS: u64 = 30;
    pub const PROBE_TIMEOUT_SECS: u64 = 10;
    pub const API_REQUEST_TIMEOUT_SECS: u64 = 60;
    pub const TUNNEL_STARTUP_SECS: u64 = 5;
    pub const RUN_WATCH_TIMEOUT_SECS: u64 = 4 * 60 * 60;
}

/// The Data Science Pipelines operator API group
pub mod dspa {
    pub const GROUP: &str = "datasciencepipelinesapplications.opendatahub.io";
    pub const VERSION: &str = "v1alpha1";
    pub const KIND: &str = "DataSciencePipelinesApplication";
    pub const READY_CONDITION: &str = "Ready";
}

/// Paths of the pipeline server REST API
pub mod api_paths {
    pub const PIPELINES: &str = "/apis/v2beta1/pipelines";
    pub const RUNS: &str = "/apis/v2beta1/runs";
    pub const HEALTHZ: &str = "/apis/v2beta1/healthz";
}

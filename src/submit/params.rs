// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! InstructLab pipeline parameters: the accepted schema, the training
//! profile defaults, and validation ahead of any network call.

use crate::config::Config;
use crate::error::{DeployError, Result};
use crate::types::workflow::Parameter;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;

pub const REPO_URL: &str = "sdg_repo_url";
pub const TAXONOMY_PATH: &str = "sdg_taxonomy_path";
pub const BASE_MODEL: &str = "sdg_base_model";
pub const OUTPUT_MODEL_NAME: &str = "output_model_name";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
}

impl ParamType {
    fn accepts(self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Object => value.is_object(),
            ParamType::Array => value.is_array(),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Object => "object",
            ParamType::Array => "array",
        };
        f.write_str(name)
    }
}

/// Every parameter the InstructLab pipeline declares
pub const SCHEMA: &[(&str, ParamType)] = &[
    // generation
    (REPO_URL, ParamType::String),
    ("sdg_repo_branch", ParamType::String),
    ("sdg_repo_pr", ParamType::Integer),
    ("sdg_repo_secret", ParamType::String),
    (TAXONOMY_PATH, ParamType::String),
    (BASE_MODEL, ParamType::String),
    ("sdg_teacher_secret", ParamType::String),
    ("sdg_scale_factor", ParamType::Integer),
    ("sdg_pipeline", ParamType::String),
    ("sdg_max_batch_len", ParamType::Integer),
    ("sdg_sample_size", ParamType::Number),
    ("sdg_batch_size", ParamType::Integer),
    ("sdg_num_workers", ParamType::Integer),
    // training
    ("train_node_selectors", ParamType::Object),
    ("train_tolerations", ParamType::Array),
    ("train_gpu_identifier", ParamType::String),
    ("train_gpu_per_worker", ParamType::Integer),
    ("train_cpu_per_worker", ParamType::String),
    ("train_memory_per_worker", ParamType::String),
    ("train_num_workers", ParamType::Integer),
    ("train_num_epochs_phase_1", ParamType::Integer),
    ("train_num_epochs_phase_2", ParamType::Integer),
    ("train_effective_batch_size_phase_1", ParamType::Integer),
    ("train_effective_batch_size_phase_2", ParamType::Integer),
    ("train_learning_rate_phase_1", ParamType::Number),
    ("train_learning_rate_phase_2", ParamType::Number),
    ("train_num_warmup_steps_phase_1", ParamType::Integer),
    ("train_num_warmup_steps_phase_2", ParamType::Integer),
    ("train_save_samples", ParamType::Integer),
    ("train_max_batch_len", ParamType::Integer),
    ("train_seed", ParamType::Integer),
    // evaluation
    ("eval_gpu_identifier", ParamType::String),
    ("eval_judge_secret", ParamType::String),
    ("mt_bench_max_workers", ParamType::String),
    ("mt_bench_merge_system_user_message", ParamType::Boolean),
    ("final_eval_max_workers", ParamType::String),
    ("final_eval_few_shots", ParamType::Integer),
    ("final_eval_batch_size", ParamType::String),
    ("final_eval_merge_system_user_message", ParamType::Boolean),
    // storage and output
    ("k8s_storage_class_name", ParamType::String),
    ("k8s_storage_size", ParamType::String),
    (OUTPUT_MODEL_NAME, ParamType::String),
    ("output_model_version", ParamType::String),
    ("output_model_registry_name", ParamType::String),
    ("output_model_registry_api_url", ParamType::String),
    ("output_oci_model_uri", ParamType::String),
    ("output_oci_registry_secret", ParamType::String),
];

pub fn param_type(name: &str) -> Option<ParamType> {
    SCHEMA.iter().find(|(n, _)| *n == name).map(|(_, t)| *t)
}

/// A named set of parameter values for one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineParameters {
    values: BTreeMap<String, Value>,
}

impl PipelineParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// The full training profile, with credential parameters pointing at the configured secrets
    pub fn training_profile(config: &Config) -> Self {
        let defaults = json!({
            "sdg_repo_secret": config.secrets.git,
            "sdg_teacher_secret": config.secrets.model_endpoint,
            "eval_judge_secret": config.secrets.model_endpoint,
            "output_oci_registry_secret": config.secrets.registry,
            "sdg_base_model": "oci://registry.redhat.io/rhoai/granite-7b-starter",
            "sdg_scale_factor": 5,
            "sdg_pipeline": "/usr/share/instructlab/sdg/pipelines/full",
            "sdg_max_batch_len": 4096,
            "sdg_sample_size": 1.0,
            "sdg_batch_size": 4,
            "sdg_num_workers": 4,
            "train_node_selectors": {},
            "train_tolerations": [{
                "key": "nvidia.com/gpu",
                "operator": "Exists",
                "effect": "NoSchedule"
            }],
            "train_gpu_identifier": "nvidia.com/gpu",
            "train_gpu_per_worker": 1,
            "train_cpu_per_worker": "6",
            "train_memory_per_worker": "24Gi",
            "train_num_workers": 1,
            "train_num_epochs_phase_1": 2,
            "train_num_epochs_phase_2": 3,
            "train_effective_batch_size_phase_1": 256,
            "train_effective_batch_size_phase_2": 256,
            "train_learning_rate_phase_1": 2e-5,
            "train_learning_rate_phase_2": 1e-5,
            "train_num_warmup_steps_phase_1": 100,
            "train_num_warmup_steps_phase_2": 100,
            "train_save_samples": 50000,
            "train_max_batch_len": 4096,
            "train_seed": 42,
            "eval_gpu_identifier": "nvidia.com/gpu",
            "mt_bench_max_workers": "auto",
            "mt_bench_merge_system_user_message": false,
            "final_eval_max_workers": "auto",
            "final_eval_few_shots": 5,
            "final_eval_batch_size": "auto",
            "final_eval_merge_system_user_message": false,
            "k8s_storage_class_name": "gp3",
            "k8s_storage_size": "50Gi",
            "output_model_version": "1"
        });

        let values = match defaults {
            Value::Object(map) => map.into_iter().collect(),
            _ => BTreeMap::new(),
        };
        Self { values }
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) -> &mut Self {
        self.values.insert(name.into(), value);
        self
    }

    /// Set a string parameter when a value was given
    pub fn set_opt(&mut self, name: &str, value: Option<&str>) -> &mut Self {
        if let Some(v) = value {
            self.set(name, Value::String(v.to_string()));
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_map(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// Check names, types and required values, reporting every problem at once
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        for (name, value) in &self.values {
            match param_type(name) {
                None => problems.push(format!("unknown parameter '{}'", name)),
                Some(expected) if !expected.accepts(value) => problems.push(format!(
                    "parameter '{}' must be {}, got {}",
                    name, expected, value
                )),
                Some(_) => {}
            }
        }

        if !self.has_text(REPO_URL) && !self.has_text(TAXONOMY_PATH) {
            problems.push(format!("one of '{}' or '{}' is required", REPO_URL, TAXONOMY_PATH));
        }
        for required in [BASE_MODEL, OUTPUT_MODEL_NAME] {
            if !self.has_text(required) {
                problems.push(format!("'{}' is required", required));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(DeployError::InvalidParameters(problems.join("; ")))
        }
    }

    fn has_text(&self, name: &str) -> bool {
        self.values
            .get(name)
            .and_then(Value::as_str)
            .is_some_and(|s| !s.trim().is_empty())
    }

    /// Workflow arguments carry strings only; non-string values are JSON-encoded
    pub fn to_workflow_parameters(&self) -> Vec<Parameter> {
        self.values
            .iter()
            .map(|(name, value)| Parameter {
                name: name.clone(),
                value: Some(match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                }),
            })
            .collect()
    }
}

/// Parse `name=value`. Values of string parameters are kept verbatim; any
/// other value is read as JSON when it parses, else as a plain string.
pub fn parse_assignment(raw: &str) -> Result<(String, Value)> {
    let (name, value) = raw.split_once('=').ok_or_else(|| {
        DeployError::InvalidParameters(format!("expected name=value, got '{}'", raw))
    })?;

    let name = name.trim();
    if name.is_empty() {
        return Err(DeployError::InvalidParameters(format!(
            "missing parameter name in '{}'",
            raw
        )));
    }

    let value = match param_type(name) {
        Some(ParamType::String) => Value::String(value.to_string()),
        _ => serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string())),
    };
    Ok((name.to_string(), value))
}

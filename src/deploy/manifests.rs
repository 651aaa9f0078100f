// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Declarative resources applied by `deploy`, and how they are loaded and ordered.

use crate::config::Config;
use crate::error::{DeployError, Result};
use crate::types::DataSciencePipelinesApplication;
use k8s_openapi::api::core::v1::{Namespace, Secret, ServiceAccount};
use k8s_openapi::api::rbac::v1::{RoleBinding, RoleRef, Subject};
use kube::api::ObjectMeta;
use kube::ResourceExt;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// One resource to apply. Variants are listed in dependency order.
#[derive(Debug, Clone)]
pub enum Manifest {
    Namespace(Namespace),
    ServiceAccount(ServiceAccount),
    RoleBinding(RoleBinding),
    Secret(Secret),
    Application(DataSciencePipelinesApplication),
}

impl Manifest {
    pub fn kind(&self) -> &'static str {
        match self {
            Manifest::Namespace(_) => "Namespace",
            Manifest::ServiceAccount(_) => "ServiceAccount",
            Manifest::RoleBinding(_) => "RoleBinding",
            Manifest::Secret(_) => "Secret",
            Manifest::Application(_) => "DataSciencePipelinesApplication",
        }
    }

    pub fn name(&self) -> String {
        match self {
            Manifest::Namespace(r) => r.name_any(),
            Manifest::ServiceAccount(r) => r.name_any(),
            Manifest::RoleBinding(r) => r.name_any(),
            Manifest::Secret(r) => r.name_any(),
            Manifest::Application(r) => r.name_any(),
        }
    }

    /// Position in the apply sequence; later ranks depend on earlier ones
    pub fn rank(&self) -> u8 {
        match self {
            Manifest::Namespace(_) => 0,
            Manifest::ServiceAccount(_) => 1,
            Manifest::RoleBinding(_) => 2,
            Manifest::Secret(_) => 3,
            Manifest::Application(_) => 4,
        }
    }

    /// Parse one or more YAML documents. Namespaced resources without a
    /// namespace are placed in `namespace`.
    pub fn from_yaml(text: &str, namespace: &str) -> Result<Vec<Manifest>> {
        let mut manifests = Vec::new();

        for document in serde_yaml::Deserializer::from_str(text) {
            let value = serde_yaml::Value::deserialize(document)
                .map_err(|e| DeployError::ManifestError(format!("Invalid YAML: {}", e)))?;
            if value.is_null() {
                continue;
            }
            manifests.push(Self::from_value(value, namespace)?);
        }

        Ok(manifests)
    }

    fn from_value(value: serde_yaml::Value, namespace: &str) -> Result<Manifest> {
        let kind = value
            .get("kind")
            .and_then(|k| k.as_str())
            .ok_or_else(|| DeployError::ManifestError("Document has no kind".to_string()))?
            .to_string();

        let mut manifest = match kind.as_str() {
            "Namespace" => Manifest::Namespace(parse(value, &kind)?),
            "ServiceAccount" => Manifest::ServiceAccount(parse(value, &kind)?),
            "RoleBinding" => Manifest::RoleBinding(parse(value, &kind)?),
            "Secret" => Manifest::Secret(parse(value, &kind)?),
            "DataSciencePipelinesApplication" => Manifest::Application(parse(value, &kind)?),
            other => {
                return Err(DeployError::ManifestError(format!(
                    "Unsupported kind '{}'",
                    other
                )))
            }
        };

        if manifest.name().is_empty() {
            return Err(DeployError::ManifestError(format!(
                "{} has no metadata.name",
                kind
            )));
        }

        manifest.default_namespace(namespace);
        Ok(manifest)
    }

    fn default_namespace(&mut self, namespace: &str) {
        let meta = match self {
            Manifest::Namespace(_) => return,
            Manifest::ServiceAccount(r) => &mut r.metadata,
            Manifest::RoleBinding(r) => &mut r.metadata,
            Manifest::Secret(r) => &mut r.metadata,
            Manifest::Application(r) => &mut r.metadata,
        };
        if meta.namespace.is_none() {
            meta.namespace = Some(namespace.to_string());
        }
    }

    /// Load every `*.yaml`/`*.yml` file in `dir`, in file-name order
    pub fn load_dir(dir: &Path, namespace: &str) -> Result<Vec<Manifest>> {
        let mut files: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e == "yaml" || e == "yml")
            })
            .collect();
        files.sort();

        let mut manifests = Vec::new();
        for file in files {
            debug!("Loading manifests from {}", file.display());
            let text = std::fs::read_to_string(&file)?;
            let loaded = Self::from_yaml(&text, namespace).map_err(|e| {
                DeployError::ManifestError(format!("{}: {}", file.display(), e))
            })?;
            manifests.extend(loaded);
        }
        Ok(manifests)
    }
}

fn parse<T: serde::de::DeserializeOwned>(value: serde_yaml::Value, kind: &str) -> Result<T> {
    serde_yaml::from_value(value)
        .map_err(|e| DeployError::ManifestError(format!("Invalid {}: {}", kind, e)))
}

/// Sort into dependency order, keeping the given order within a kind
pub fn order(manifests: &mut [Manifest]) {
    manifests.sort_by_key(Manifest::rank);
}

/// Namespace, pipeline service account and its role binding, and the
/// application itself. Secrets are never generated here.
pub fn default_plan(config: &Config) -> Vec<Manifest> {
    vec![
        namespace(config),
        Manifest::ServiceAccount(ServiceAccount {
            metadata: ObjectMeta {
                name: Some(config.service_account.clone()),
                namespace: Some(config.namespace.clone()),
                ..Default::default()
            },
            ..Default::default()
        }),
        Manifest::RoleBinding(RoleBinding {
            metadata: ObjectMeta {
                name: Some(config.role_binding_name()),
                namespace: Some(config.namespace.clone()),
                ..Default::default()
            },
            role_ref: RoleRef {
                api_group: "rbac.authorization.k8s.io".to_string(),
                kind: "ClusterRole".to_string(),
                name: config.cluster_role.clone(),
            },
            subjects: Some(vec![Subject {
                kind: "ServiceAccount".to_string(),
                name: config.service_account.clone(),
                namespace: Some(config.namespace.clone()),
                ..Default::default()
            }]),
        }),
        Manifest::Application(DataSciencePipelinesApplication::desired(config)),
    ]
}

pub fn namespace(config: &Config) -> Manifest {
    Manifest::Namespace(Namespace {
        metadata: ObjectMeta {
            name: Some(config.namespace.clone()),
            ..Default::default()
        },
        ..Default::default()
    })
}

/// An Opaque secret built from operator-supplied key/value pairs
pub fn secret_from_literals(
    config: &Config,
    name: &str,
    literals: &[(String, String)],
) -> Manifest {
    let string_data: BTreeMap<String, String> = literals.iter().cloned().collect();
    Manifest::Secret(Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(config.namespace.clone()),
            ..Default::default()
        },
        string_data: Some(string_data),
        type_: Some("Opaque".to_string()),
        ..Default::default()
    })
}

/// Parse `key=value`; the value may itself contain `=`
pub fn parse_literal(raw: &str) -> Result<(String, String)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(DeployError::ManifestError(format!(
            "Expected key=value, got '{}'",
            raw
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRETS: &str = r#"
apiVersion: v1
kind: Secret
metadata:
  name: taxonomy-repo-secret
type: Opaque
stringData:
  username: git
  password: token
---
apiVersion: v1
kind: Secret
metadata:
  name: teacher-secret
  namespace: models
stringData:
  api_key: abc
---
"#;

    #[test]
    fn test_from_yaml_multiple_documents() {
        let manifests = Manifest::from_yaml(SECRETS, "ml").unwrap();

        assert_eq!(manifests.len(), 2);
        assert!(manifests.iter().all(|m| m.kind() == "Secret"));
        let Manifest::Secret(first) = &manifests[0] else {
            panic!("expected a secret");
        };
        assert_eq!(first.metadata.namespace.as_deref(), Some("ml"));
        let Manifest::Secret(second) = &manifests[1] else {
            panic!("expected a secret");
        };
        assert_eq!(second.metadata.namespace.as_deref(), Some("models"));
    }

    #[test]
    fn test_from_yaml_rejects_unknown_kind() {
        let yaml = "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: x\n";
        let err = Manifest::from_yaml(yaml, "ml").unwrap_err();
        assert!(err.to_string().contains("Unsupported kind 'Deployment'"));
    }

    #[test]
    fn test_from_yaml_requires_kind_and_name() {
        assert!(Manifest::from_yaml("metadata:\n  name: x\n", "ml").is_err());
        assert!(Manifest::from_yaml("apiVersion: v1\nkind: Secret\nmetadata: {}\n", "ml").is_err());
    }

    #[test]
    fn test_application_from_yaml() {
        let yaml = r#"
apiVersion: datasciencepipelinesapplications.opendatahub.io/v1alpha1
kind: DataSciencePipelinesApplication
metadata:
  name: dspa
spec:
  dspVersion: v2
  apiServer:
    managedPipelines:
      instructLab:
        state: Managed
"#;
        let manifests = Manifest::from_yaml(yaml, "ml").unwrap();
        let Manifest::Application(app) = &manifests[0] else {
            panic!("expected an application");
        };
        assert!(app.instructlab_managed());
        assert_eq!(app.metadata.namespace.as_deref(), Some("ml"));
    }

    #[test]
    fn test_order_follows_dependencies() {
        let config = Config::default();
        let mut manifests = vec![
            Manifest::Application(DataSciencePipelinesApplication::desired(&config)),
            secret_from_literals(&config, "b", &[]),
            namespace(&config),
            secret_from_literals(&config, "a", &[]),
        ];
        manifests.extend(default_plan(&config).into_iter().skip(1).take(2));

        order(&mut manifests);

        let kinds: Vec<_> = manifests.iter().map(|m| m.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                "Namespace",
                "ServiceAccount",
                "RoleBinding",
                "Secret",
                "Secret",
                "DataSciencePipelinesApplication"
            ]
        );
        // stable within a kind
        assert_eq!(manifests[3].name(), "b");
        assert_eq!(manifests[4].name(), "a");
    }

    #[test]
    fn test_default_plan_has_no_secrets() {
        let plan = default_plan(&Config::default());
        assert_eq!(plan.len(), 4);
        assert!(plan.iter().all(|m| m.kind() != "Secret"));
    }

    #[test]
    fn test_role_binding_binds_service_account() {
        let config = Config::default();
        let plan = default_plan(&config);
        let Manifest::RoleBinding(rb) = &plan[2] else {
            panic!("expected a role binding");
        };
        assert_eq!(rb.role_ref.name, "edit");
        assert_eq!(
            rb.subjects.as_ref().unwrap()[0].name,
            config.service_account
        );
    }

    #[test]
    fn test_parse_literal() {
        assert_eq!(
            parse_literal("token=a=b").unwrap(),
            ("token".to_string(), "a=b".to_string())
        );
        assert!(parse_literal("novalue").is_err());
        assert!(parse_literal("=x").is_err());
    }

    #[test]
    fn test_load_dir_reads_yaml_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("20-teacher.yaml"),
            "apiVersion: v1\nkind: Secret\nmetadata:\n  name: teacher-secret\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("10-git.yml"),
            "apiVersion: v1\nkind: Secret\nmetadata:\n  name: taxonomy-repo-secret\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("README.md"), "ignored").unwrap();

        let manifests = Manifest::load_dir(dir.path(), "ml").unwrap();
        let names: Vec<_> = manifests.iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["taxonomy-repo-secret", "teacher-secret"]);
    }
}

// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Prerequisite checks: local tools and cluster-side conditions.
//!
//! Every check runs regardless of earlier failures; the report decides the
//! overall status.

use crate::config::Config;
use crate::constants::dspa;
use crate::kubernetes::{create_client, kind_is_served};
use crate::report::{CheckResult, Report};
use k8s_openapi::apimachinery::pkg::version::Info;
use kube::Client;
use tokio::process::Command;
use tracing::{debug, instrument};

const TOOLS: &str = "tools";
const CLUSTER: &str = "cluster";

/// A local tool, satisfied by the first candidate binary that can be executed
#[derive(Debug, Clone)]
pub struct ToolRequirement {
    pub label: &'static str,
    pub candidates: &'static [&'static str],
    /// Arguments that print a version without contacting any server
    pub version_args: &'static [&'static str],
    pub required: bool,
    pub remediation: &'static str,
}

pub fn default_tools() -> Vec<ToolRequirement> {
    vec![
        ToolRequirement {
            label: "cluster CLI",
            candidates: &["oc", "kubectl"],
            version_args: &["version", "--client"],
            required: true,
            remediation: "Install the OpenShift CLI (oc) or kubectl and put it on PATH",
        },
        ToolRequirement {
            label: "git",
            candidates: &["git"],
            version_args: &["--version"],
            required: true,
            remediation: "Install git to clone and push the taxonomy repository",
        },
        ToolRequirement {
            label: "python3",
            candidates: &["python3"],
            version_args: &["--version"],
            required: false,
            remediation: "Install Python 3 to run the pipeline helper scripts",
        },
        ToolRequirement {
            label: "curl",
            candidates: &["curl"],
            version_args: &["--version"],
            required: false,
            remediation: "Install curl for manual API calls",
        },
    ]
}

/// Run all prerequisite checks and collect them into one report
pub async fn run(config: &Config) -> Report {
    let mut report = Report::new("Prerequisite check");

    for tool in default_tools() {
        report.push(check_tool(&tool).await);
    }

    match create_client().await {
        Ok(client) => report.extend(check_cluster(&client, config).await),
        Err(e) => report.extend(no_session(&e.to_string())),
    }

    report
}

#[instrument(skip(tool), fields(tool = tool.label))]
pub async fn check_tool(tool: &ToolRequirement) -> CheckResult {
    for candidate in tool.candidates {
        match Command::new(candidate).args(tool.version_args).output().await {
            Ok(output) => {
                let version = first_line(&output.stdout)
                    .or_else(|| first_line(&output.stderr))
                    .unwrap_or_else(|| "version unknown".to_string());
                debug!("Found {}: {}", candidate, version);
                return CheckResult::ok(TOOLS, tool.label, format!("{} ({})", candidate, version));
            }
            Err(e) => debug!("{} not usable: {}", candidate, e),
        }
    }

    let result = CheckResult::failed(
        TOOLS,
        tool.label,
        format!("none of {} found", tool.candidates.join(", ")),
    )
    .with_remediation(tool.remediation);

    if tool.required {
        result
    } else {
        result.optional()
    }
}

fn first_line(bytes: &[u8]) -> Option<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(|l| l.chars().take(80).collect())
}

/// Session, platform version, and operator checks against a live client
#[instrument(skip(client, config))]
pub async fn check_cluster(client: &Client, config: &Config) -> Vec<CheckResult> {
    let info = match client.apiserver_version().await {
        Ok(info) => info,
        Err(e) => return no_session(&e.to_string()),
    };

    let mut results = vec![CheckResult::ok(
        CLUSTER,
        "session",
        format!("authenticated, server {}", info.git_version),
    )];

    results.push(check_version(&info, config.min_kubernetes_minor));

    let operator = "pipelines operator";
    results.push(
        match kind_is_served(client, dspa::GROUP, dspa::VERSION, dspa::KIND).await {
            Ok(true) => CheckResult::ok(CLUSTER, operator, format!("{} available", dspa::KIND)),
            Ok(false) => CheckResult::failed(
                CLUSTER,
                operator,
                format!("{} ({}) is not served", dspa::KIND, dspa::GROUP),
            )
            .with_remediation(
                "Install the Data Science Pipelines operator (OpenShift AI / Open Data Hub)",
            ),
            Err(e) => CheckResult::failed(CLUSTER, operator, format!("discovery failed: {}", e))
                .with_remediation("Check that your user may list API groups"),
        },
    );

    results
}

/// Results reported when no authenticated session could be established
fn no_session(reason: &str) -> Vec<CheckResult> {
    vec![
        CheckResult::failed(CLUSTER, "session", reason.to_string())
            .with_remediation("Log in with `oc login` or point KUBECONFIG at a valid config"),
        CheckResult::failed(CLUSTER, "platform version", "skipped: no cluster session"),
        CheckResult::failed(CLUSTER, "pipelines operator", "skipped: no cluster session"),
    ]
}

fn check_version(info: &Info, min_minor: u32) -> CheckResult {
    match parse_version(info) {
        Some((major, minor)) if major > 1 || minor >= min_minor => CheckResult::ok(
            CLUSTER,
            "platform version",
            format!("Kubernetes {}.{}", major, minor),
        ),
        Some((major, minor)) => CheckResult::failed(
            CLUSTER,
            "platform version",
            format!("Kubernetes {}.{} is older than 1.{}", major, minor, min_minor),
        )
        .with_remediation("Upgrade the cluster to a supported OpenShift/Kubernetes release"),
        None => CheckResult::warning(
            CLUSTER,
            "platform version",
            format!("cannot parse server version '{}.{}'", info.major, info.minor),
        ),
    }
}

/// Major and minor from version info; providers append suffixes such as "28+"
pub fn parse_version(info: &Info) -> Option<(u32, u32)> {
    fn leading_number(s: &str) -> Option<u32> {
        let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse().ok()
    }
    Some((leading_number(&info.major)?, leading_number(&info.minor)?))
}

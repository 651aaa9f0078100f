// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Pipeline run submission and monitoring.
//!
//! Two interchangeable paths implement [`RunSubmitter`]: the managed pipeline
//! REST API ([`managed::ManagedApiSubmitter`]) and direct Argo Workflow
//! creation ([`workflow::WorkflowSubmitter`]).

pub mod api;
pub mod managed;
pub mod params;
pub mod workflow;

use crate::error::{DeployError, Result};
use crate::wait::{poll_until, WaitOutcome};
use async_trait::async_trait;
use std::cell::RefCell;
use std::fmt;
use std::time::Duration;
use tracing::info;

pub use api::PipelineApiClient;
pub use managed::ManagedApiSubmitter;
pub use params::PipelineParameters;
pub use workflow::WorkflowSubmitter;

/// A run ready to submit. Only constructible from parameters that passed validation.
#[derive(Debug, Clone)]
pub struct RunRequest {
    display_name: String,
    description: String,
    parameters: PipelineParameters,
}

impl RunRequest {
    pub fn new(
        display_name: impl Into<String>,
        description: impl Into<String>,
        parameters: PipelineParameters,
    ) -> Result<Self> {
        parameters.validate()?;
        let display_name = display_name.into();
        if display_name.trim().is_empty() {
            return Err(DeployError::InvalidParameters("run display name is empty".to_string()));
        }

        Ok(Self {
            display_name,
            description: description.into(),
            parameters,
        })
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn parameters(&self) -> &PipelineParameters {
        &self.parameters
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedRun {
    pub run_id: String,
    pub display_name: String,
}

/// Point-in-time state of a submitted run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStatus {
    pub run_id: String,
    pub state: String,
    pub finished: bool,
    pub succeeded: bool,
    pub detail: Option<String>,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.run_id, self.state)?;
        if let Some(detail) = &self.detail {
            write!(f, " ({})", detail)?;
        }
        Ok(())
    }
}

#[async_trait]
pub trait RunSubmitter: Send + Sync {
    /// Create the run and return its identifier
    async fn submit(&self, request: &RunRequest) -> Result<SubmittedRun>;

    async fn status(&self, run_id: &str) -> Result<RunStatus>;
}

/// Poll a run until it finishes or `timeout` elapses; returns the last observed status
pub async fn watch(
    submitter: &dyn RunSubmitter,
    run_id: &str,
    timeout: Duration,
    interval: Duration,
) -> Result<(WaitOutcome, RunStatus)> {
    let last = RefCell::new(None);

    let outcome = poll_until(timeout, interval, || {
        let last = &last;
        async move {
            let status = submitter.status(run_id).await?;
            info!("Run {}", status);
            let finished = status.finished;
            *last.borrow_mut() = Some(status);
            Ok::<bool, DeployError>(finished)
        }
    })
    .await;

    match last.into_inner() {
        Some(status) => Ok((outcome, status)),
        // every poll failed; surface the underlying error
        None => submitter.status(run_id).await.map(|s| (outcome, s)),
    }
}

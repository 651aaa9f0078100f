// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Custom resource types for the pipelines platform.

pub mod application;
pub mod workflow;

pub use application::DataSciencePipelinesApplication;
pub use workflow::Workflow;

// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Resource application: namespace, identity, secrets, then the pipelines application.

pub mod applier;
pub mod manifests;

pub use applier::{Applier, DeploySummary};
pub use manifests::Manifest;

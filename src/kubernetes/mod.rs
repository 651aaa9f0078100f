// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes utilities for client creation, API discovery, and port-forward tunnels.

pub mod client;
pub mod crd;
pub mod tunnel;

pub use client::{create_client, resolve_bearer_token};
pub use crd::kind_is_served;
pub use tunnel::Tunnel;

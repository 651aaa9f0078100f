// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! API discovery for operator-provided resource kinds

use crate::error::Result;
use kube::{discovery::Discovery, Client};
use tracing::{debug, instrument};

/// Check whether the cluster serves `kind` in `group`/`version`.
#[instrument(skip(client))]
pub async fn kind_is_served(
    client: &Client,
    group: &str,
    version: &str,
    kind: &str,
) -> Result<bool> {
    let discovery = Discovery::new(client.clone())
        .filter(&[group])
        .run()
        .await?;

    let found = discovery
        .groups()
        .filter(|g| g.name() == group)
        .flat_map(|g| g.versioned_resources(version))
        .any(|(ar, _)| ar.kind == kind);

    debug!("{}/{} {} served: {}", group, version, kind, found);
    Ok(found)
}

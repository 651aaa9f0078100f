// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Temporary port-forward tunnels to cluster services.
//!
//! A [`Tunnel`] owns the `kubectl port-forward` child process. The child is
//! spawned with `kill_on_drop`, so it dies with the guard even when the
//! caller bails out early or panics. [`Tunnel::close`] additionally waits for
//! the process to be reaped so the local port is free when it returns.

use crate::config::Config;
use crate::error::{DeployError, Result};
use std::future::Future;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::process::{Child, Command};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, instrument, warn};

const CONNECT_RETRY: Duration = Duration::from_millis(200);

pub struct Tunnel {
    child: Child,
    local_port: u16,
}

impl Tunnel {
    /// Forward a free local port to `remote_port` of `service`, then wait for it to accept
    #[instrument(skip(config), fields(namespace = %config.namespace))]
    pub async fn open(
        config: &Config,
        service: &str,
        remote_port: u16,
        startup: Duration,
    ) -> Result<Self> {
        let local_port = free_local_port().await?;
        let mut cmd = Command::new(&config.kubectl);
        cmd.args([
            "port-forward",
            "--address",
            "127.0.0.1",
            "-n",
            &config.namespace,
            &format!("svc/{}", service),
            &format!("{}:{}", local_port, remote_port),
        ]);

        info!(
            "Opening tunnel localhost:{} -> svc/{}:{}",
            local_port, service, remote_port
        );
        let mut tunnel = Self::spawn(cmd, local_port)?;
        tunnel.wait_ready(startup).await?;
        Ok(tunnel)
    }

    /// Spawn the forwarding process without waiting for the port
    pub fn spawn(mut cmd: Command, local_port: u16) -> Result<Self> {
        let child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DeployError::TunnelError(format!("Failed to start port-forward: {}", e)))?;

        Ok(Self { child, local_port })
    }

    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Base URL of the forwarded HTTPS endpoint
    pub fn https_url(&self) -> String {
        format!("https://localhost:{}", self.local_port)
    }

    /// Wait until the local port accepts connections, the process exits, or `startup` elapses
    pub async fn wait_ready(&mut self, startup: Duration) -> Result<()> {
        let deadline = Instant::now() + startup;

        loop {
            if let Some(status) = self.child.try_wait()? {
                let mut stderr = String::new();
                if let Some(mut pipe) = self.child.stderr.take() {
                    let _ = pipe.read_to_string(&mut stderr).await;
                }
                return Err(DeployError::TunnelError(format!(
                    "port-forward exited with {}: {}",
                    status,
                    stderr.trim()
                )));
            }

            if TcpStream::connect(("127.0.0.1", self.local_port)).await.is_ok() {
                debug!("Tunnel on port {} is accepting connections", self.local_port);
                return Ok(());
            }

            if Instant::now() >= deadline {
                return Err(DeployError::TunnelError(format!(
                    "port {} not ready after {:?}",
                    self.local_port, startup
                )));
            }
            sleep(CONNECT_RETRY).await;
        }
    }

    /// Terminate the forwarding process and reap it
    pub async fn close(mut self) -> Result<()> {
        if self.child.try_wait()?.is_none() {
            self.child.kill().await?;
        }
        debug!("Tunnel on port {} closed", self.local_port);
        Ok(())
    }

    /// Run `f` against the tunnel URL, closing the tunnel afterwards whatever `f` returned
    pub async fn scoped<F, Fut, T>(self, f: F) -> T
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = T>,
    {
        let out = f(self.https_url()).await;
        if let Err(e) = self.close().await {
            warn!("Failed to close tunnel: {}", e);
        }
        out
    }
}

/// Ask the OS for an unused local port
async fn free_local_port() -> Result<u16> {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
    Ok(listener.local_addr()?.port())
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use coalesce::Probe;
use futures::{FutureExt, future::BoxFuture};
use tokio::net::TcpStream;

/// Checks that a TCP endpoint accepts connections.
///
/// Used for the durable datastore, which the server never queries itself.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    name: String,
    addr: String,
}

impl TcpProbe {
    /// Creates a probe reported as `name` that connects to `addr` (`host:port`).
    #[must_use]
    pub fn new(name: impl Into<String>, addr: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            addr: addr.into(),
        }
    }
}

impl Probe for TcpProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self) -> BoxFuture<'_, Result<(), String>> {
        async move {
            TcpStream::connect(self.addr.as_str())
                .await
                .map(drop)
                .map_err(|error| format!("connect to {} failed: {error}", self.addr))
        }
        .boxed()
    }
}

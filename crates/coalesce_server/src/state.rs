// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use coalesce::{HealthProber, Resolver};

use crate::MarketProducer;

/// Shared state of the HTTP handlers.
#[derive(Debug, Clone)]
pub struct AppState<S> {
    /// Resolves keys through the shared store.
    pub resolver: Resolver<S>,
    /// Backs `/healthz`.
    pub prober: Arc<HealthProber>,
    /// Computes values for resolvable keys.
    pub producer: MarketProducer,
}

impl<S> AppState<S> {
    /// Creates the state with the default [`MarketProducer`].
    #[must_use]
    pub fn new(resolver: Resolver<S>, prober: HealthProber) -> Self {
        Self {
            resolver,
            prober: Arc::new(prober),
            producer: MarketProducer::default(),
        }
    }
}

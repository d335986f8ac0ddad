// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use coalesce::ConfigError;
use coalesce_store::StoreError;

/// An error that prevents the server from starting or running.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ServerError {
    /// An environment variable holds a value that cannot be parsed.
    #[error("invalid value {value:?} for {var}")]
    InvalidEnv {
        /// The variable name.
        var: &'static str,
        /// The rejected value.
        value: String,
    },

    /// The coalescing configuration is invalid.
    #[error("invalid coalescing configuration: {0}")]
    Coalesce(#[from] ConfigError),

    /// The store could not be reached.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Binding or serving failed.
    #[error("server io error: {0}")]
    Io(#[from] std::io::Error),
}

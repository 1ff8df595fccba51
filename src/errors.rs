// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the cluster DNS synchronizer.
//!
//! This module provides specialized error types for:
//! - Domain name derivation (reverse names, service and pod names)
//! - Bootstrapping the watch machinery (Kubernetes client, zone origin, caches)
//!
//! Naming errors never escape an event handler: the reconciler logs them and
//! skips the one mutation that needed the name.

use thiserror::Error;

/// Errors that can occur while deriving a domain name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NamingError {
    /// The input is not a parseable IPv4 or IPv6 literal
    ///
    /// Returned by reverse-name derivation and by record synthesis when an
    /// address field holds something other than an IP.
    #[error("Invalid IP address '{address}'")]
    InvalidAddress {
        /// The rejected input
        address: String,
    },

    /// A label or the assembled name breaks DNS length or syntax rules
    ///
    /// Returned when an external target or a name built from object metadata
    /// cannot be represented as a domain name.
    #[error("Invalid domain name '{name}': {reason}")]
    InvalidName {
        /// The name (or label) that could not be parsed
        name: String,
        /// Parser error message
        reason: String,
    },
}

impl NamingError {
    /// Short, stable label used for the skipped-derivation metric.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            NamingError::InvalidAddress { .. } => "invalid_address",
            NamingError::InvalidName { .. } => "invalid_name",
        }
    }
}

/// Errors that can stop the synchronizer from starting or running.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The configured zone origin is not a valid domain name
    #[error("Invalid zone origin '{zone}': {reason}")]
    InvalidZone {
        /// The configured origin
        zone: String,
        /// Parser error message
        reason: String,
    },

    /// Kubernetes client or watch failure
    #[error("Kubernetes client error: {0}")]
    Kube(#[from] kube::Error),

    /// The Service reflector was dropped before its first full listing
    #[error("Service cache was dropped before it became ready")]
    CacheNotReady,

    /// IO error (metrics listener, signal handling)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Command-line and environment configuration.
//!
//! Every flag can also be set through an environment variable, which is how
//! the synchronizer is normally configured when it runs in a pod.

use crate::constants::{DEFAULT_RECORD_TTL_SECS, DEFAULT_ZONE_ORIGIN};
use crate::errors::SyncError;
use crate::naming::NamingPolicy;
use crate::synthesize::Synthesizer;
use clap::{Parser, ValueEnum};
use std::net::SocketAddr;

/// Keeps a DNS zone in sync with the Services and Endpoints of a cluster.
#[derive(Parser, Debug, Clone)]
#[command(name = "clusterdns")]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Zone origin every service and pod name is placed under.
    #[arg(long, env = "CLUSTERDNS_ZONE", default_value = DEFAULT_ZONE_ORIGIN)]
    pub zone: String,

    /// TTL in seconds applied to every published RRset.
    #[arg(long, env = "CLUSTERDNS_TTL", default_value_t = DEFAULT_RECORD_TTL_SECS)]
    pub ttl: u32,

    /// Only watch objects in this namespace (all namespaces when unset).
    #[arg(long, env = "CLUSTERDNS_NAMESPACE")]
    pub namespace: Option<String>,

    /// Serve Prometheus metrics on this address.
    #[arg(long, env = "CLUSTERDNS_METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,

    /// Log output format.
    #[arg(long, env = "RUST_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Log output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Compact human-readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

impl Config {
    /// Naming policy for the configured zone origin.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidZone`] if the zone origin does not parse.
    pub fn naming_policy(&self) -> Result<NamingPolicy, SyncError> {
        NamingPolicy::new(&self.zone)
    }

    /// Synthesizer for the configured zone origin and TTL.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidZone`] if the zone origin does not parse.
    pub fn synthesizer(&self) -> Result<Synthesizer, SyncError> {
        Ok(Synthesizer::new(self.naming_policy()?, self.ttl))
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;

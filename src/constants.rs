// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the cluster DNS synchronizer.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// DNS Record Constants
// ============================================================================

/// Default TTL applied to every synthesized RRset (30 seconds)
pub const DEFAULT_RECORD_TTL_SECS: u32 = 30;

/// Priority published in every SRV record
pub const DEFAULT_SRV_PRIORITY: u16 = 0;

/// Weight published in every SRV record
pub const DEFAULT_SRV_WEIGHT: u16 = 100;

/// Default zone origin that service and pod names are placed under
pub const DEFAULT_ZONE_ORIGIN: &str = "cluster.local.";

/// Serial passed to `RecordSet::insert`; the in-memory zone does not version RRsets
pub const RECORD_SET_SERIAL: u32 = 0;

// ============================================================================
// Kubernetes Constants
// ============================================================================

/// `spec.clusterIP` sentinel marking a headless Service
pub const HEADLESS_CLUSTER_IP: &str = "None";

/// Protocol assumed for an Endpoints port that does not declare one
pub const DEFAULT_PORT_PROTOCOL: &str = "TCP";

/// Kind name for `Service` objects, used in logs and metric labels
pub const KIND_SERVICE: &str = "Service";

/// Kind name for `Endpoints` objects, used in logs and metric labels
pub const KIND_ENDPOINTS: &str = "Endpoints";

// ============================================================================
// Runtime Constants
// ============================================================================

/// Capacity of the channel carrying translated watch events to the reconciler
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Number of Tokio worker threads
pub const TOKIO_WORKER_THREADS: usize = 2;

/// Path the Prometheus metrics are served on
pub const METRICS_PATH: &str = "/metrics";

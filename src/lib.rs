// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # clusterdns - Kubernetes Service DNS synchronizer
//!
//! clusterdns keeps an authoritative DNS zone in step with the `Service` and
//! `Endpoints` objects of a Kubernetes cluster. Every watch event is turned
//! into full RRset replacements or deletions, so the zone never holds stale
//! records for pods or services that are gone.
//!
//! ## Modules
//!
//! - [`naming`] - Domain names for services, pods, named ports and reverse lookups
//! - [`classify`] - Normal / headless / external service classification
//! - [`synthesize`] - Object state to zone mutations
//! - [`reconciler`] - Event routing and mutation application
//! - [`zone`] - Zone store boundary and the in-memory zone
//! - [`watch`] - kube watchers and reflector feeding the reconciler
//! - [`model`] - DNS-relevant projections of `Service` and `Endpoints`
//! - [`config`] - Command-line and environment configuration
//!
//! ## Example
//!
//! ```rust,no_run
//! use clusterdns::model::ServiceRecord;
//! use clusterdns::naming::NamingPolicy;
//! use clusterdns::synthesize::Synthesizer;
//! use clusterdns::zone::MemoryZone;
//!
//! let synthesizer = Synthesizer::new(NamingPolicy::new("cluster.local.").unwrap(), 30);
//! let zone = MemoryZone::new();
//!
//! let web = ServiceRecord::new("web", "default", "10.0.0.5");
//! for mutation in synthesizer.service_create(&web) {
//!     mutation.apply_to(&zone);
//! }
//! ```

pub mod classify;
pub mod config;
pub mod constants;
pub mod errors;
pub mod metrics;
pub mod model;
pub mod naming;
pub mod reconciler;
pub mod synthesize;
pub mod watch;
pub mod zone;

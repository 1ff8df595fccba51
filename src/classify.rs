// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Service classification.
//!
//! Every Service the synchronizer acts on falls into exactly one
//! [`ServiceClass`]. The predicates are evaluated in a fixed priority
//! (headless, then external, then normal) so the classes never overlap.

use crate::constants::HEADLESS_CLUSTER_IP;
use crate::model::ServiceRecord;
use std::fmt;

/// The DNS shape a Service is published with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ServiceClass {
    /// Concrete cluster IP: one A record plus its PTR
    Normal,
    /// `clusterIP: None`: A records come from the Endpoints
    Headless,
    /// `externalName` set: one CNAME
    External,
}

impl ServiceClass {
    /// Classify a Service, or `None` when it carries neither a cluster
    /// address nor an external target.
    #[must_use]
    pub fn of(service: &ServiceRecord) -> Option<Self> {
        if is_headless(service) {
            Some(ServiceClass::Headless)
        } else if is_external(service) {
            Some(ServiceClass::External)
        } else if is_normal(service) {
            Some(ServiceClass::Normal)
        } else {
            None
        }
    }

    /// Lowercase name used in logs and metric labels.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceClass::Normal => "normal",
            ServiceClass::Headless => "headless",
            ServiceClass::External => "external",
        }
    }
}

impl fmt::Display for ServiceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_headless_sentinel(address: &str) -> bool {
    address.eq_ignore_ascii_case(HEADLESS_CLUSTER_IP)
}

/// `clusterIP` is explicitly the `None` sentinel.
#[must_use]
pub fn is_headless(service: &ServiceRecord) -> bool {
    is_headless_sentinel(&service.cluster_address)
}

/// An external target is set and the service is not headless.
#[must_use]
pub fn is_external(service: &ServiceRecord) -> bool {
    !is_headless(service)
        && service
            .external_target
            .as_deref()
            .is_some_and(|target| !target.is_empty())
}

/// A concrete cluster address and no external target.
#[must_use]
pub fn is_normal(service: &ServiceRecord) -> bool {
    !service.cluster_address.is_empty()
        && !is_headless_sentinel(&service.cluster_address)
        && !is_external(service)
}

#[cfg(test)]
#[path = "classify_tests.rs"]
mod classify_tests;

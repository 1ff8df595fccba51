// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Transient views of the Kubernetes objects the synchronizer consumes.
//!
//! The watch layer converts every `Service` and `Endpoints` it receives into
//! these plain types before handing them to the reconciler, so the core never
//! touches `k8s_openapi` option soup directly. Values live for one event.
//!
//! Only the fields that influence DNS are kept. Equality on [`Subset`] is
//! structural and order-sensitive, which is what the Endpoints no-op check
//! relies on.

use crate::constants::DEFAULT_PORT_PROTOCOL;
use k8s_openapi::api::core::v1::{
    EndpointAddress, EndpointPort, EndpointSubset, Endpoints, Service,
};
use kube::ResourceExt;

/// DNS-relevant projection of a `Service`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServiceRecord {
    /// Object name
    pub name: String,
    /// Object namespace
    pub namespace: String,
    /// `spec.clusterIP`: empty, the headless sentinel `None`, or an IP literal
    pub cluster_address: String,
    /// `spec.externalName`, present for `ExternalName` services
    pub external_target: Option<String>,
}

impl ServiceRecord {
    /// Build a record from its identity and cluster address.
    #[must_use]
    pub fn new(name: &str, namespace: &str, cluster_address: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            cluster_address: cluster_address.to_string(),
            external_target: None,
        }
    }

    /// Build an `ExternalName` style record pointing at `target`.
    #[must_use]
    pub fn external(name: &str, namespace: &str, target: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            cluster_address: String::new(),
            external_target: Some(target.to_string()),
        }
    }
}

impl From<&Service> for ServiceRecord {
    fn from(service: &Service) -> Self {
        let spec = service.spec.as_ref();
        Self {
            name: service.name_any(),
            namespace: service.namespace().unwrap_or_default(),
            cluster_address: spec
                .and_then(|s| s.cluster_ip.clone())
                .unwrap_or_default(),
            external_target: spec
                .and_then(|s| s.external_name.clone())
                .filter(|target| !target.is_empty()),
        }
    }
}

/// DNS-relevant projection of an `Endpoints` object.
///
/// The identity always equals the owning Service's identity.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EndpointSet {
    /// Object name (same as the Service)
    pub name: String,
    /// Object namespace (same as the Service)
    pub namespace: String,
    /// Ordered subsets
    pub subsets: Vec<Subset>,
}

impl EndpointSet {
    /// Build an endpoint set from its identity and subsets.
    #[must_use]
    pub fn new(name: &str, namespace: &str, subsets: Vec<Subset>) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            subsets,
        }
    }

    /// Whether two endpoint sets carry identical subsets (order-sensitive).
    ///
    /// Object metadata such as `resourceVersion` is not part of the comparison.
    #[must_use]
    pub fn same_subsets(&self, other: &EndpointSet) -> bool {
        self.subsets == other.subsets
    }

    /// Every address of every subset, in declaration order.
    pub fn addresses(&self) -> impl Iterator<Item = &Address> {
        self.subsets.iter().flat_map(|subset| subset.addresses.iter())
    }
}

impl From<&Endpoints> for EndpointSet {
    fn from(endpoints: &Endpoints) -> Self {
        Self {
            name: endpoints.name_any(),
            namespace: endpoints.namespace().unwrap_or_default(),
            subsets: endpoints
                .subsets
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(Subset::from)
                .collect(),
        }
    }
}

/// A group of ready addresses sharing the same ports.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Subset {
    pub addresses: Vec<Address>,
    pub ports: Vec<Port>,
}

impl From<&EndpointSubset> for Subset {
    fn from(subset: &EndpointSubset) -> Self {
        Self {
            addresses: subset
                .addresses
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(Address::from)
                .collect(),
            ports: subset
                .ports
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(Port::from)
                .collect(),
        }
    }
}

/// One endpoint address.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Address {
    pub ip: String,
    pub hostname: Option<String>,
    pub subdomain: Option<String>,
}

impl Address {
    /// An address without a declared hostname.
    #[must_use]
    pub fn new(ip: &str) -> Self {
        Self {
            ip: ip.to_string(),
            hostname: None,
            subdomain: None,
        }
    }

    /// An address that declares a pod hostname.
    #[must_use]
    pub fn with_hostname(ip: &str, hostname: &str) -> Self {
        Self {
            hostname: Some(hostname.to_string()),
            ..Self::new(ip)
        }
    }
}

impl From<&EndpointAddress> for Address {
    fn from(address: &EndpointAddress) -> Self {
        Self {
            ip: address.ip.clone(),
            hostname: non_empty(address.hostname.as_deref()),
            // Endpoints only publish a hostname when the pod's subdomain
            // matches the Service, so the subdomain is implied by the name.
            subdomain: None,
        }
    }
}

/// One endpoint port.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Port {
    pub name: Option<String>,
    pub protocol: String,
    /// Raw port number as published by the API server
    pub port: i32,
}

impl Port {
    /// A named port.
    #[must_use]
    pub fn named(name: &str, protocol: &str, port: i32) -> Self {
        Self {
            name: Some(name.to_string()),
            protocol: protocol.to_string(),
            port,
        }
    }

    /// The port name when it is set and non-empty.
    #[must_use]
    pub fn srv_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|name| !name.is_empty())
    }
}

impl From<&EndpointPort> for Port {
    fn from(port: &EndpointPort) -> Self {
        Self {
            name: non_empty(port.name.as_deref()),
            protocol: non_empty(port.protocol.as_deref())
                .unwrap_or_else(|| DEFAULT_PORT_PROTOCOL.to_string()),
            port: port.port,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod model_tests;

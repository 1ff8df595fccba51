// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Record synthesis: from Service/Endpoints state to zone mutations.
//!
//! Every operation here is pure. It takes object state and returns the
//! ordered list of [`Mutation`]s that makes the zone reflect it. Nothing is
//! diffed against the zone: updates delete everything derived from the old
//! object and then recreate from the new one.
//!
//! # Records produced
//!
//! | Source | Records |
//! |---|---|
//! | Normal service | A/AAAA at the service name, PTR back to it |
//! | External service | CNAME at the service name |
//! | Endpoints address | A/AAAA at the pod name (merged per name), PTR per IP |
//! | Named endpoints port | SRV at `_port._proto`, targeting pods (headless) or the service |
//! | Headless service | aggregate A/AAAA at the service name over every address |
//!
//! Fallible derivations (IP parsing, name building, port ranges) never fail
//! the whole operation; the one affected mutation is logged and dropped.

use crate::classify::ServiceClass;
use crate::constants::{DEFAULT_SRV_PRIORITY, DEFAULT_SRV_WEIGHT, RECORD_SET_SERIAL};
use crate::errors::NamingError;
use crate::metrics;
use crate::model::{EndpointSet, ServiceRecord};
use crate::naming::{parse_ip, parse_target, reverse_name_for, NamingPolicy};
use crate::zone::{Mutation, ZoneTarget};
use hickory_client::rr::rdata::{A, AAAA, CNAME, PTR, SRV};
use hickory_client::rr::{DNSClass, Name, RData, Record, RecordSet, RecordType};
use std::net::IpAddr;
use tracing::{debug, warn};

/// Builds zone mutations from object state.
#[derive(Clone, Debug)]
pub struct Synthesizer {
    naming: NamingPolicy,
    ttl: u32,
    srv_priority: u16,
    srv_weight: u16,
}

/// Addresses merged under one pod name.
#[derive(Debug)]
struct MergedPod {
    name: Name,
    ips: Vec<IpAddr>,
}

/// Pod names of an Endpoints object, merged across subsets, plus the pod
/// names each subset contributed (used for headless SRV targets).
#[derive(Debug, Default)]
struct PodIndex {
    pods: Vec<MergedPod>,
    by_subset: Vec<Vec<Name>>,
}

impl Synthesizer {
    /// Create a synthesizer with the default SRV priority and weight.
    #[must_use]
    pub fn new(naming: NamingPolicy, ttl: u32) -> Self {
        Self {
            naming,
            ttl,
            srv_priority: DEFAULT_SRV_PRIORITY,
            srv_weight: DEFAULT_SRV_WEIGHT,
        }
    }

    /// The naming policy records are keyed by.
    #[must_use]
    pub fn naming(&self) -> &NamingPolicy {
        &self.naming
    }

    /// TTL applied to every RRset.
    #[must_use]
    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    // ------------------------------------------------------------------
    // Service operations
    // ------------------------------------------------------------------

    /// Records a newly seen Service publishes on its own.
    ///
    /// Headless services publish nothing here; their A records follow the
    /// Endpoints.
    #[must_use]
    pub fn service_create(&self, service: &ServiceRecord) -> Vec<Mutation> {
        match ServiceClass::of(service) {
            Some(ServiceClass::Normal) => self.cluster_address_records(service),
            Some(ServiceClass::External) => self.external_records(service),
            Some(ServiceClass::Headless) | None => Vec::new(),
        }
    }

    /// Deletions for every key [`Self::service_create`] (or, for headless
    /// services, the Endpoints aggregate) populates.
    #[must_use]
    pub fn service_delete(&self, service: &ServiceRecord) -> Vec<Mutation> {
        match ServiceClass::of(service) {
            Some(ServiceClass::Normal) => self.cluster_address_deletes(service),
            Some(ServiceClass::External) => self.external_deletes(service),
            Some(ServiceClass::Headless) => self.headless_delete(service),
            None => Vec::new(),
        }
    }

    /// Mutations for a Service that changed.
    ///
    /// A changed cluster address is delete-then-create. A changed external
    /// target overwrites the CNAME in place. A change of class removes the old
    /// class's records and publishes the new class's.
    #[must_use]
    pub fn service_update(&self, old: &ServiceRecord, new: &ServiceRecord) -> Vec<Mutation> {
        match (ServiceClass::of(old), ServiceClass::of(new)) {
            (Some(ServiceClass::Normal), Some(ServiceClass::Normal)) => {
                if old.cluster_address == new.cluster_address {
                    return Vec::new();
                }
                let mut mutations = self.cluster_address_deletes(old);
                mutations.extend(self.cluster_address_records(new));
                mutations
            }
            (Some(ServiceClass::External), Some(ServiceClass::External)) => {
                if old.external_target == new.external_target {
                    return Vec::new();
                }
                let replaced = self.external_records(new);
                if replaced.is_empty() {
                    // The new target did not parse; drop the stale alias.
                    self.external_deletes(old)
                } else {
                    replaced
                }
            }
            (Some(ServiceClass::Headless), Some(ServiceClass::Headless)) | (None, None) => {
                Vec::new()
            }
            (old_class, new_class) => {
                debug!(
                    service = %new.name,
                    namespace = %new.namespace,
                    from = old_class.map_or("none", ServiceClass::as_str),
                    to = new_class.map_or("none", ServiceClass::as_str),
                    "Service changed class, republishing"
                );
                let mut mutations = self.service_delete(old);
                mutations.extend(self.service_create(new));
                mutations
            }
        }
    }

    // ------------------------------------------------------------------
    // Endpoints operations
    // ------------------------------------------------------------------

    /// Pod, SRV and (for headless services) aggregate records of an Endpoints object.
    #[must_use]
    pub fn endpoints_create(&self, service: &ServiceRecord, endpoints: &EndpointSet) -> Vec<Mutation> {
        let index = self.pod_index(endpoints);
        let headless = ServiceClass::of(service) == Some(ServiceClass::Headless);
        let mut mutations = Vec::new();

        for pod in &index.pods {
            mutations.extend(self.address_rrsets(&pod.name, &pod.ips));
            for ip in &pod.ips {
                mutations.push(self.ptr_record(ZoneTarget::PodReverse, *ip, &pod.name));
            }
        }

        mutations.extend(self.srv_records(service, endpoints, &index, headless));

        if headless {
            mutations.extend(self.headless_aggregate(service, endpoints));
        }
        mutations
    }

    /// Deletions for every pod, PTR and SRV key [`Self::endpoints_create`]
    /// derives from `endpoints`.
    ///
    /// The headless aggregate lives at the service name and is removed with
    /// [`Self::headless_delete`].
    #[must_use]
    pub fn endpoints_delete(&self, endpoints: &EndpointSet) -> Vec<Mutation> {
        let index = self.pod_index(endpoints);
        let mut mutations = Vec::new();

        for pod in &index.pods {
            for record_type in address_types(&pod.ips) {
                mutations.push(Mutation::delete(ZoneTarget::Service, pod.name.clone(), record_type));
            }
            for ip in &pod.ips {
                mutations.push(Mutation::delete(
                    ZoneTarget::PodReverse,
                    reverse_name_for(*ip),
                    RecordType::PTR,
                ));
            }
        }

        for name in self.srv_names(endpoints) {
            mutations.push(Mutation::delete(ZoneTarget::Service, name, RecordType::SRV));
        }
        mutations
    }

    /// Mutations for an Endpoints object that changed.
    ///
    /// Identical subsets (order-sensitive) produce nothing. Otherwise every
    /// record derived from `old` is deleted and `new` is published from scratch.
    #[must_use]
    pub fn endpoints_update(
        &self,
        service: &ServiceRecord,
        old: &EndpointSet,
        new: &EndpointSet,
    ) -> Vec<Mutation> {
        if old.same_subsets(new) {
            return Vec::new();
        }

        let mut mutations = self.endpoints_delete(old);
        if ServiceClass::of(service) == Some(ServiceClass::Headless) {
            mutations.extend(self.headless_delete(service));
        }
        mutations.extend(self.endpoints_create(service, new));
        mutations
    }

    /// Deletions for the aggregate A/AAAA RRsets of a headless service.
    #[must_use]
    pub fn headless_delete(&self, service: &ServiceRecord) -> Vec<Mutation> {
        let Some(name) = skip_invalid(self.naming.service_domain(service)) else {
            return Vec::new();
        };
        vec![
            Mutation::delete(ZoneTarget::Service, name.clone(), RecordType::A),
            Mutation::delete(ZoneTarget::Service, name, RecordType::AAAA),
        ]
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn cluster_address_records(&self, service: &ServiceRecord) -> Vec<Mutation> {
        let Some(name) = skip_invalid(self.naming.service_domain(service)) else {
            return Vec::new();
        };
        let Some(ip) = skip_invalid(parse_ip(&service.cluster_address)) else {
            return Vec::new();
        };

        vec![
            Mutation::replace(
                ZoneTarget::Service,
                self.rrset(&name, address_type(ip), [address_rdata(ip)]),
            ),
            self.ptr_record(ZoneTarget::ServiceReverse, ip, &name),
        ]
    }

    fn cluster_address_deletes(&self, service: &ServiceRecord) -> Vec<Mutation> {
        let Some(name) = skip_invalid(self.naming.service_domain(service)) else {
            return Vec::new();
        };

        match parse_ip(&service.cluster_address) {
            Ok(ip) => vec![
                Mutation::delete(ZoneTarget::Service, name, address_type(ip)),
                Mutation::delete(ZoneTarget::ServiceReverse, reverse_name_for(ip), RecordType::PTR),
            ],
            // Nothing was published for an unparseable address beyond what an
            // A key could hold.
            Err(_) => vec![Mutation::delete(ZoneTarget::Service, name, RecordType::A)],
        }
    }

    fn external_records(&self, service: &ServiceRecord) -> Vec<Mutation> {
        let Some(name) = skip_invalid(self.naming.service_domain(service)) else {
            return Vec::new();
        };
        let target = service.external_target.as_deref().unwrap_or_default();
        let Some(target) = skip_invalid(parse_target(target)) else {
            return Vec::new();
        };

        vec![Mutation::replace(
            ZoneTarget::Service,
            self.rrset(&name, RecordType::CNAME, [RData::CNAME(CNAME(target))]),
        )]
    }

    fn external_deletes(&self, service: &ServiceRecord) -> Vec<Mutation> {
        skip_invalid(self.naming.service_domain(service))
            .map(|name| Mutation::delete(ZoneTarget::Service, name, RecordType::CNAME))
            .into_iter()
            .collect()
    }

    fn headless_aggregate(&self, service: &ServiceRecord, endpoints: &EndpointSet) -> Vec<Mutation> {
        let ips: Vec<IpAddr> = endpoints
            .addresses()
            .filter(|address| !address.ip.is_empty())
            .filter_map(|address| skip_invalid(parse_ip(&address.ip)))
            .collect();
        if ips.is_empty() {
            return Vec::new();
        }
        let Some(name) = skip_invalid(self.naming.service_domain(service)) else {
            return Vec::new();
        };
        self.address_rrsets(&name, &ips)
    }

    /// Merge addresses by pod name across every subset.
    fn pod_index(&self, endpoints: &EndpointSet) -> PodIndex {
        let mut index = PodIndex::default();

        for subset in &endpoints.subsets {
            let mut subset_pods: Vec<Name> = Vec::new();
            for address in &subset.addresses {
                let Some(ip) = skip_invalid(parse_ip(&address.ip)) else {
                    continue;
                };
                let Some(name) = skip_invalid(self.naming.pod_address_domain(
                    address,
                    &endpoints.name,
                    &endpoints.namespace,
                )) else {
                    continue;
                };

                match index.pods.iter_mut().find(|pod| pod.name == name) {
                    Some(pod) => {
                        if !pod.ips.contains(&ip) {
                            pod.ips.push(ip);
                        }
                    }
                    None => index.pods.push(MergedPod {
                        name: name.clone(),
                        ips: vec![ip],
                    }),
                }
                if !subset_pods.contains(&name) {
                    subset_pods.push(name);
                }
            }
            index.by_subset.push(subset_pods);
        }
        index
    }

    fn srv_records(
        &self,
        service: &ServiceRecord,
        endpoints: &EndpointSet,
        index: &PodIndex,
        headless: bool,
    ) -> Vec<Mutation> {
        let service_domain = if headless {
            None
        } else {
            skip_invalid(self.naming.service_domain(service))
        };
        let mut srv: Vec<(Name, Vec<RData>)> = Vec::new();

        for (subset, pods) in endpoints.subsets.iter().zip(&index.by_subset) {
            for port in &subset.ports {
                let Some(port_name) = port.srv_name() else {
                    continue;
                };
                let Ok(port_number) = u16::try_from(port.port) else {
                    warn!(
                        endpoints = %endpoints.name,
                        namespace = %endpoints.namespace,
                        port = port.port,
                        "Skipping SRV record for out-of-range port"
                    );
                    metrics::record_skipped_derivation("invalid_port");
                    continue;
                };
                let Some(name) = skip_invalid(self.naming.port_name(
                    port_name,
                    &port.protocol,
                    &endpoints.name,
                    &endpoints.namespace,
                )) else {
                    continue;
                };

                let targets: Vec<&Name> = if headless {
                    pods.iter().collect()
                } else {
                    service_domain.iter().collect()
                };
                let rdatas = targets.into_iter().map(|target| {
                    RData::SRV(SRV::new(
                        self.srv_priority,
                        self.srv_weight,
                        port_number,
                        target.clone(),
                    ))
                });

                match srv.iter_mut().find(|(existing, _)| *existing == name) {
                    Some((_, existing)) => existing.extend(rdatas),
                    None => srv.push((name, rdatas.collect())),
                }
            }
        }

        srv.into_iter()
            .filter(|(_, rdatas)| !rdatas.is_empty())
            .map(|(name, rdatas)| {
                Mutation::replace(ZoneTarget::Service, self.rrset(&name, RecordType::SRV, rdatas))
            })
            .collect()
    }

    /// Every SRV name an Endpoints object publishes, deduplicated.
    fn srv_names(&self, endpoints: &EndpointSet) -> Vec<Name> {
        let mut names: Vec<Name> = Vec::new();
        for port in endpoints.subsets.iter().flat_map(|subset| subset.ports.iter()) {
            let Some(port_name) = port.srv_name() else {
                continue;
            };
            if let Some(name) = skip_invalid(self.naming.port_name(
                port_name,
                &port.protocol,
                &endpoints.name,
                &endpoints.namespace,
            )) {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// One A RRset for the IPv4 addresses and one AAAA RRset for the IPv6
    /// addresses, each only when non-empty.
    fn address_rrsets(&self, name: &Name, ips: &[IpAddr]) -> Vec<Mutation> {
        address_types(ips)
            .into_iter()
            .map(|record_type| {
                let rdatas = ips
                    .iter()
                    .filter(|ip| address_type(**ip) == record_type)
                    .map(|ip| address_rdata(*ip));
                Mutation::replace(ZoneTarget::Service, self.rrset(name, record_type, rdatas))
            })
            .collect()
    }

    fn ptr_record(&self, target: ZoneTarget, ip: IpAddr, points_at: &Name) -> Mutation {
        let reverse = reverse_name_for(ip);
        Mutation::replace(
            target,
            self.rrset(&reverse, RecordType::PTR, [RData::PTR(PTR(points_at.clone()))]),
        )
    }

    fn rrset(
        &self,
        name: &Name,
        record_type: RecordType,
        rdatas: impl IntoIterator<Item = RData>,
    ) -> RecordSet {
        let mut rrset = RecordSet::with_ttl(name.clone(), record_type, self.ttl);
        for rdata in rdatas {
            let mut record = Record::from_rdata(name.clone(), self.ttl, rdata);
            record.set_dns_class(DNSClass::IN);
            rrset.insert(record, RECORD_SET_SERIAL);
        }
        rrset
    }
}

/// Log and count a failed derivation, turning it into `None`.
fn skip_invalid<T>(result: Result<T, NamingError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(error = %e, "Skipping record with invalid input");
            metrics::record_skipped_derivation(e.reason());
            None
        }
    }
}

fn address_type(ip: IpAddr) -> RecordType {
    match ip {
        IpAddr::V4(_) => RecordType::A,
        IpAddr::V6(_) => RecordType::AAAA,
    }
}

fn address_rdata(ip: IpAddr) -> RData {
    match ip {
        IpAddr::V4(v4) => RData::A(A::from(v4)),
        IpAddr::V6(v6) => RData::AAAA(AAAA::from(v6)),
    }
}

/// Record types needed to hold `ips`, A before AAAA.
fn address_types(ips: &[IpAddr]) -> Vec<RecordType> {
    [RecordType::A, RecordType::AAAA]
        .into_iter()
        .filter(|record_type| ips.iter().any(|ip| address_type(*ip) == *record_type))
        .collect()
}

#[cfg(test)]
#[path = "synthesize_tests.rs"]
mod synthesize_tests;

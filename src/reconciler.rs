// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Event reconciler: routes Service and Endpoints events to the synthesizer
//! and writes the resulting mutations to the zone.
//!
//! Every event is handled to completion before the next one. Nothing here
//! returns an error: a missing owning Service, a malformed address or an
//! unparseable name is logged, counted, and skipped so the watch loop keeps
//! going.
//!
//! # Event routing
//!
//! | Event | Service lookup | Synthesizer call |
//! |---|---|---|
//! | Service create/update/delete | no | `service_*` (+ Endpoints rebuild on a class change) |
//! | Endpoints create | required | `endpoints_create` |
//! | Endpoints update | required unless both subset lists are empty | `endpoints_update` |
//! | Endpoints delete | optional (headless aggregate only) | `endpoints_delete` (+ `headless_delete`) |
//! | Generic | no | none |

use crate::classify::ServiceClass;
use crate::constants::{KIND_ENDPOINTS, KIND_SERVICE};
use crate::metrics;
use crate::model::{EndpointSet, ServiceRecord};
use crate::synthesize::Synthesizer;
use crate::zone::{Mutation, ZoneStore};
use std::time::Instant;
use tracing::{debug, trace};

/// A change observed on one object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ObjectEvent<T> {
    Create(T),
    Update { old: T, new: T },
    Delete(T),
    /// Anything else the platform reports; carries no DNS meaning
    Generic(T),
}

impl<T> ObjectEvent<T> {
    /// Lowercase operation name used in logs and metric labels.
    #[must_use]
    pub fn operation(&self) -> &'static str {
        match self {
            ObjectEvent::Create(_) => "create",
            ObjectEvent::Update { .. } => "update",
            ObjectEvent::Delete(_) => "delete",
            ObjectEvent::Generic(_) => "generic",
        }
    }

    /// Convert the carried object(s), keeping the operation.
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> ObjectEvent<U> {
        match self {
            ObjectEvent::Create(object) => ObjectEvent::Create(f(object)),
            ObjectEvent::Update { old, new } => ObjectEvent::Update {
                old: f(old),
                new: f(new),
            },
            ObjectEvent::Delete(object) => ObjectEvent::Delete(f(object)),
            ObjectEvent::Generic(object) => ObjectEvent::Generic(f(object)),
        }
    }
}

/// Any event the reconciler accepts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClusterEvent {
    Service(ObjectEvent<ServiceRecord>),
    Endpoints(ObjectEvent<EndpointSet>),
}

impl ClusterEvent {
    /// Kubernetes kind of the object the event is about.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ClusterEvent::Service(_) => KIND_SERVICE,
            ClusterEvent::Endpoints(_) => KIND_ENDPOINTS,
        }
    }

    /// Operation of the wrapped [`ObjectEvent`].
    #[must_use]
    pub fn operation(&self) -> &'static str {
        match self {
            ClusterEvent::Service(event) => event.operation(),
            ClusterEvent::Endpoints(event) => event.operation(),
        }
    }
}

/// Result of handling one event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// This many mutations were written
    Applied(usize),
    /// The event required no change
    Unchanged,
    /// A precondition failed (owning Service not found)
    Dropped,
    /// The event carries no DNS meaning
    Ignored,
}

/// Resolves the Service that owns an Endpoints object.
pub trait ServiceLookup {
    /// The current state of Service `namespace/name`, if known.
    fn lookup_service(&self, name: &str, namespace: &str) -> Option<ServiceRecord>;
}

/// Resolves the cached Endpoints object of a Service.
pub trait EndpointsLookup {
    /// The current state of Endpoints `namespace/name`, if known.
    fn lookup_endpoints(&self, name: &str, namespace: &str) -> Option<EndpointSet>;
}

/// Applies cluster events to a zone.
pub struct Reconciler<L, Z> {
    synthesizer: Synthesizer,
    lookup: L,
    zone: Z,
}

impl<L: ServiceLookup + EndpointsLookup, Z: ZoneStore> Reconciler<L, Z> {
    #[must_use]
    pub fn new(synthesizer: Synthesizer, lookup: L, zone: Z) -> Self {
        Self {
            synthesizer,
            lookup,
            zone,
        }
    }

    /// The zone mutations are written to.
    pub fn zone(&self) -> &Z {
        &self.zone
    }

    /// Handle one event to completion.
    pub fn handle(&self, event: ClusterEvent) -> Outcome {
        let start = Instant::now();
        let kind = event.kind();
        let operation = event.operation();
        metrics::record_event(kind, operation);

        let outcome = match event {
            ClusterEvent::Service(event) => self.handle_service(event),
            ClusterEvent::Endpoints(event) => self.handle_endpoints(event),
        };

        metrics::record_event_duration(kind, start.elapsed());
        trace!(kind, operation, ?outcome, "Event handled");
        outcome
    }

    fn handle_service(&self, event: ObjectEvent<ServiceRecord>) -> Outcome {
        let mutations = match &event {
            ObjectEvent::Create(service) => {
                debug!(service = %service.name, namespace = %service.namespace, "Service created");
                self.synthesizer.service_create(service)
            }
            ObjectEvent::Update { old, new } => {
                let mut mutations = self.synthesizer.service_update(old, new);
                if ServiceClass::of(old) != ServiceClass::of(new) {
                    mutations.extend(self.republish_endpoints(new));
                }
                mutations
            }
            ObjectEvent::Delete(service) => {
                debug!(service = %service.name, namespace = %service.namespace, "Service deleted");
                self.synthesizer.service_delete(service)
            }
            ObjectEvent::Generic(_) => return Outcome::Ignored,
        };
        self.apply(mutations)
    }

    fn handle_endpoints(&self, event: ObjectEvent<EndpointSet>) -> Outcome {
        match event {
            ObjectEvent::Create(endpoints) => {
                let Some(service) = self.owning_service(&endpoints) else {
                    return Outcome::Dropped;
                };
                self.apply(self.synthesizer.endpoints_create(&service, &endpoints))
            }
            ObjectEvent::Update { old, new } => {
                if old.subsets.is_empty() && new.subsets.is_empty() {
                    return Outcome::Unchanged;
                }
                let Some(service) = self.owning_service(&new) else {
                    return Outcome::Dropped;
                };
                self.apply(self.synthesizer.endpoints_update(&service, &old, &new))
            }
            ObjectEvent::Delete(endpoints) => {
                let mut mutations = self.synthesizer.endpoints_delete(&endpoints);
                // The Service is usually deleted first; pod records go regardless.
                if let Some(service) = self
                    .lookup
                    .lookup_service(&endpoints.name, &endpoints.namespace)
                {
                    if ServiceClass::of(&service) == Some(ServiceClass::Headless) {
                        mutations.extend(self.synthesizer.headless_delete(&service));
                    }
                }
                self.apply(mutations)
            }
            ObjectEvent::Generic(_) => Outcome::Ignored,
        }
    }

    /// SRV targets and the headless aggregate depend on the service class, so
    /// a class change rebuilds everything derived from the cached Endpoints.
    fn republish_endpoints(&self, service: &ServiceRecord) -> Vec<Mutation> {
        let Some(endpoints) = self
            .lookup
            .lookup_endpoints(&service.name, &service.namespace)
        else {
            return Vec::new();
        };
        debug!(
            service = %service.name,
            namespace = %service.namespace,
            "Rebuilding Endpoints records after class change"
        );
        let mut mutations = self.synthesizer.endpoints_delete(&endpoints);
        mutations.extend(self.synthesizer.endpoints_create(service, &endpoints));
        mutations
    }

    fn owning_service(&self, endpoints: &EndpointSet) -> Option<ServiceRecord> {
        let service = self
            .lookup
            .lookup_service(&endpoints.name, &endpoints.namespace);
        if service.is_none() {
            debug!(
                endpoints = %endpoints.name,
                namespace = %endpoints.namespace,
                "No Service found for Endpoints, dropping event"
            );
            metrics::record_event_dropped(KIND_ENDPOINTS, "service_not_found");
        }
        service
    }

    fn apply(&self, mutations: Vec<Mutation>) -> Outcome {
        if mutations.is_empty() {
            return Outcome::Unchanged;
        }
        let applied = mutations.len();
        for mutation in mutations {
            mutation.apply_to(&self.zone);
        }
        debug!(mutations = applied, "Zone updated");
        Outcome::Applied(applied)
    }
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod reconciler_tests;

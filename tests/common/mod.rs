// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

// Common test utilities for integration tests

#![allow(dead_code)]

use clusterdns::model::{EndpointSet, ServiceRecord};
use clusterdns::naming::NamingPolicy;
use clusterdns::reconciler::{ClusterEvent, Outcome, Reconciler};
use clusterdns::synthesize::Synthesizer;
use clusterdns::watch::{ClusterCache, EventTranslator};
use clusterdns::zone::{MemoryZone, Partition};
use hickory_client::rr::{Name, RecordType};
use k8s_openapi::api::core::v1::{Endpoints, Service};
use kube::api::{Api, DeleteParams, PostParams};
use kube::client::Client;
use kube::runtime::reflector::store::Writer;
use kube::runtime::watcher::Event;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

// ============================================================================
// Object fixtures
// ============================================================================

/// A `Service` with the given cluster IP (`None` for headless).
pub fn service(name: &str, namespace: &str, version: &str, cluster_ip: &str) -> Service {
    serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "Service",
        "metadata": { "name": name, "namespace": namespace, "resourceVersion": version },
        "spec": { "clusterIP": cluster_ip }
    }))
    .unwrap()
}

/// An `ExternalName` `Service`.
pub fn external_service(name: &str, namespace: &str, version: &str, target: &str) -> Service {
    serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "Service",
        "metadata": { "name": name, "namespace": namespace, "resourceVersion": version },
        "spec": { "type": "ExternalName", "externalName": target }
    }))
    .unwrap()
}

/// An `Endpoints` object with one subset of `(ip, hostname)` addresses and
/// `(name, port)` TCP ports.
pub fn endpoints(
    name: &str,
    namespace: &str,
    version: &str,
    addresses: &[(&str, Option<&str>)],
    ports: &[(&str, i32)],
) -> Endpoints {
    let addresses: Vec<_> = addresses
        .iter()
        .map(|(ip, hostname)| match hostname {
            Some(hostname) => json!({ "ip": ip, "hostname": hostname }),
            None => json!({ "ip": ip }),
        })
        .collect();
    let ports: Vec<_> = ports
        .iter()
        .map(|(name, port)| json!({ "name": name, "port": port, "protocol": "TCP" }))
        .collect();
    let subsets = if addresses.is_empty() {
        json!([])
    } else {
        json!([{ "addresses": addresses, "ports": ports }])
    };

    serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "Endpoints",
        "metadata": { "name": name, "namespace": namespace, "resourceVersion": version },
        "subsets": subsets
    }))
    .unwrap()
}

// ============================================================================
// In-process harness
// ============================================================================

/// Drives the reconciler the same way the watch loop does, without an API
/// server: objects go through an [`EventTranslator`] and also land in the
/// reflector stores used for lookups.
pub struct Harness {
    pub zone: Arc<MemoryZone>,
    reconciler: Reconciler<ClusterCache, Arc<MemoryZone>>,
    services: Writer<Service>,
    endpoints: Writer<Endpoints>,
    service_events: EventTranslator<ServiceRecord>,
    endpoints_events: EventTranslator<EndpointSet>,
}

impl Harness {
    /// A harness publishing under `zone` (`.` gives names like `web.default.`).
    pub fn new(zone: &str) -> Self {
        let (service_store, services) = kube::runtime::reflector::store::<Service>();
        let (endpoints_store, endpoints) = kube::runtime::reflector::store::<Endpoints>();
        let cache = ClusterCache {
            services: service_store,
            endpoints: endpoints_store,
        };
        let zone_store = Arc::new(MemoryZone::new());
        let synthesizer = Synthesizer::new(NamingPolicy::new(zone).unwrap(), 30);
        Self {
            zone: Arc::clone(&zone_store),
            reconciler: Reconciler::new(synthesizer, cache, zone_store),
            services,
            endpoints,
            service_events: EventTranslator::new(),
            endpoints_events: EventTranslator::new(),
        }
    }

    pub fn apply_service(&mut self, service: Service) -> Vec<Outcome> {
        self.service_event(Event::Apply(service))
    }

    pub fn delete_service(&mut self, service: Service) -> Vec<Outcome> {
        self.service_event(Event::Delete(service))
    }

    pub fn apply_endpoints(&mut self, endpoints: Endpoints) -> Vec<Outcome> {
        self.endpoints_event(Event::Apply(endpoints))
    }

    pub fn delete_endpoints(&mut self, endpoints: Endpoints) -> Vec<Outcome> {
        self.endpoints_event(Event::Delete(endpoints))
    }

    fn service_event(&mut self, event: Event<Service>) -> Vec<Outcome> {
        self.services.apply_watcher_event(&event);
        self.service_events
            .translate(event)
            .into_iter()
            .map(|event| self.reconciler.handle(ClusterEvent::Service(event)))
            .collect()
    }

    fn endpoints_event(&mut self, event: Event<Endpoints>) -> Vec<Outcome> {
        self.endpoints.apply_watcher_event(&event);
        self.endpoints_events
            .translate(event)
            .into_iter()
            .map(|event| self.reconciler.handle(ClusterEvent::Endpoints(event)))
            .collect()
    }

    /// Sorted rdata of the RRset at `(name, record_type)`, empty when absent.
    pub fn rdata(&self, name: &str, record_type: RecordType) -> Vec<String> {
        let partition = if record_type == RecordType::PTR {
            Partition::Reverse
        } else {
            Partition::Service
        };
        let Some(rrset) = self
            .zone
            .get(partition, &Name::from_ascii(name).unwrap(), record_type)
        else {
            return Vec::new();
        };
        let mut values: Vec<String> = rrset
            .records_without_rrsigs()
            .filter_map(|record| record.data())
            .map(ToString::to_string)
            .collect();
        values.sort();
        values
    }
}

// ============================================================================
// Live cluster helpers
// ============================================================================

/// Get a Kubernetes client or skip the test if not in a cluster
pub async fn get_kube_client_or_skip() -> Option<Client> {
    match Client::try_default().await {
        Ok(client) => Some(client),
        Err(e) => {
            eprintln!("Skipping integration test: not running in Kubernetes cluster: {}", e);
            None
        }
    }
}

/// Create a test namespace
pub async fn create_test_namespace(
    client: &Client,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let namespaces: Api<k8s_openapi::api::core::v1::Namespace> = Api::all(client.clone());

    let ns = serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": {
            "name": name,
            "labels": {
                "test": "integration",
                "managed-by": "clusterdns-test"
            }
        }
    }))?;

    match namespaces.create(&PostParams::default(), &ns).await {
        Ok(_) => {
            println!("Created test namespace: {}", name);
            Ok(())
        }
        Err(kube::Error::Api(ae)) if ae.code == 409 => {
            println!("Test namespace already exists: {}", name);
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

/// Cleanup test namespace
pub async fn cleanup_test_namespace(
    client: &Client,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let namespaces: Api<k8s_openapi::api::core::v1::Namespace> = Api::all(client.clone());

    match namespaces.delete(name, &DeleteParams::default()).await {
        Ok(_) => {
            println!("Deleted test namespace: {}", name);
            Ok(())
        }
        Err(kube::Error::Api(ae)) if ae.code == 404 => {
            println!("Test namespace already deleted: {}", name);
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

/// Create a Service from a JSON spec
pub async fn create_service(
    client: &Client,
    namespace: &str,
    name: &str,
    spec: serde_json::Value,
) -> Result<Service, Box<dyn std::error::Error>> {
    let services: Api<Service> = Api::namespaced(client.clone(), namespace);
    let service: Service = serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "Service",
        "metadata": { "name": name, "namespace": namespace },
        "spec": spec
    }))?;

    let created = services.create(&PostParams::default(), &service).await?;
    println!("Created Service: {}/{}", namespace, name);
    Ok(created)
}

/// Give the watch loop time to observe changes
pub async fn wait_for_sync(duration: Duration) {
    println!("Waiting {} seconds for the zone to sync...", duration.as_secs());
    sleep(duration).await;
}

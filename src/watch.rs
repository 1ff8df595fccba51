// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes watch bootstrap.
//!
//! Services and Endpoints are watched through reflectors so the reconciler can
//! look up the owning Service of an Endpoints object, and the Endpoints of a
//! Service that changed class, from memory. Endpoints are watched
//! only after the Service cache has completed its first listing, otherwise
//! early Endpoints events would be dropped for lack of an owner.
//!
//! kube's watcher reports `Apply` and `Delete` without the previous object,
//! and re-lists after every reconnect. [`EventTranslator`] keeps the last
//! seen version and projection per key to turn that stream into
//! create/update/delete events:
//! - an `Apply` whose `resourceVersion` did not move is dropped
//! - objects missing from a re-list are reported as deleted
//!
//! Both watch streams feed one channel; a single loop drains it into the
//! [`Reconciler`], so events are handled one at a time.

use crate::config::Config;
use crate::constants::{EVENT_CHANNEL_CAPACITY, KIND_ENDPOINTS, KIND_SERVICE};
use crate::errors::SyncError;
use crate::model::{EndpointSet, ServiceRecord};
use crate::reconciler::{ClusterEvent, EndpointsLookup, ObjectEvent, Reconciler, ServiceLookup};
use crate::zone::ZoneStore;
use futures::{Stream, StreamExt};
use k8s_openapi::api::core::v1::{Endpoints, Service};
use kube::runtime::reflector::{ObjectRef, Store};
use kube::runtime::{reflector, watcher, WatchStreamExt};
use kube::{Api, Client, Resource, ResourceExt};
use std::collections::{HashMap, HashSet};
use std::pin::pin;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

impl ServiceLookup for Store<Service> {
    fn lookup_service(&self, name: &str, namespace: &str) -> Option<ServiceRecord> {
        self.get(&ObjectRef::new(name).within(namespace))
            .map(|service| ServiceRecord::from(service.as_ref()))
    }
}

impl EndpointsLookup for Store<Endpoints> {
    fn lookup_endpoints(&self, name: &str, namespace: &str) -> Option<EndpointSet> {
        self.get(&ObjectRef::new(name).within(namespace))
            .map(|endpoints| EndpointSet::from(endpoints.as_ref()))
    }
}

/// Reflector caches the reconciler reads related objects from.
#[derive(Clone)]
pub struct ClusterCache {
    pub services: Store<Service>,
    pub endpoints: Store<Endpoints>,
}

impl ServiceLookup for ClusterCache {
    fn lookup_service(&self, name: &str, namespace: &str) -> Option<ServiceRecord> {
        self.services.lookup_service(name, namespace)
    }
}

impl EndpointsLookup for ClusterCache {
    fn lookup_endpoints(&self, name: &str, namespace: &str) -> Option<EndpointSet> {
        self.endpoints.lookup_endpoints(name, namespace)
    }
}

type ObjectKey = (String, String);

fn key_of<K: Resource>(object: &K) -> ObjectKey {
    (object.namespace().unwrap_or_default(), object.name_any())
}

/// Last seen `resourceVersion` and projection of one object.
#[derive(Debug)]
struct Seen<T> {
    version: Option<String>,
    object: T,
}

/// Turns raw watcher events into [`ObjectEvent`]s over the projection `T`
/// ([`ServiceRecord`] or [`EndpointSet`]).
#[derive(Debug)]
pub struct EventTranslator<T> {
    known: HashMap<ObjectKey, Seen<T>>,
    /// Keys seen since the current re-list started
    relisted: Option<HashSet<ObjectKey>>,
}

impl<T> Default for EventTranslator<T> {
    fn default() -> Self {
        Self {
            known: HashMap::new(),
            relisted: None,
        }
    }
}

impl<T: Clone> EventTranslator<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects currently tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.known.len()
    }

    /// Whether no object is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    /// Translate one watcher event into zero or more object events.
    pub fn translate<K>(&mut self, event: watcher::Event<K>) -> Vec<ObjectEvent<T>>
    where
        K: Resource,
        T: for<'a> From<&'a K>,
    {
        match event {
            watcher::Event::Apply(object) => self.apply(&object).into_iter().collect(),
            watcher::Event::Delete(object) => {
                self.known.remove(&key_of(&object));
                vec![ObjectEvent::Delete(T::from(&object))]
            }
            watcher::Event::Init => {
                self.relisted = Some(HashSet::new());
                Vec::new()
            }
            watcher::Event::InitApply(object) => {
                if let Some(seen) = self.relisted.as_mut() {
                    seen.insert(key_of(&object));
                }
                self.apply(&object).into_iter().collect()
            }
            watcher::Event::InitDone => {
                let Some(seen) = self.relisted.take() else {
                    return Vec::new();
                };
                let vanished: Vec<ObjectKey> = self
                    .known
                    .keys()
                    .filter(|key| !seen.contains(*key))
                    .cloned()
                    .collect();
                vanished
                    .into_iter()
                    .filter_map(|key| self.known.remove(&key))
                    .map(|gone| ObjectEvent::Delete(gone.object))
                    .collect()
            }
        }
    }

    fn apply<K>(&mut self, object: &K) -> Option<ObjectEvent<T>>
    where
        K: Resource,
        T: for<'a> From<&'a K>,
    {
        let version = object.resource_version();
        let projection = T::from(object);
        let previous = self.known.insert(
            key_of(object),
            Seen {
                version: version.clone(),
                object: projection.clone(),
            },
        );
        match previous {
            None => Some(ObjectEvent::Create(projection)),
            Some(old) => {
                if version.is_some() && old.version == version {
                    return None;
                }
                Some(ObjectEvent::Update {
                    old: old.object,
                    new: projection,
                })
            }
        }
    }
}

/// Translate a watch stream and forward its events until the stream or the
/// receiving side ends.
async fn forward<K, T, S>(
    kind: &'static str,
    stream: S,
    events: mpsc::Sender<ClusterEvent>,
    wrap: fn(ObjectEvent<T>) -> ClusterEvent,
) where
    K: Resource,
    T: Clone + for<'a> From<&'a K>,
    S: Stream<Item = Result<watcher::Event<K>, watcher::Error>>,
{
    let mut translator = EventTranslator::new();
    let mut stream = pin!(stream);

    while let Some(item) = stream.next().await {
        match item {
            Ok(event) => {
                for event in translator.translate(event) {
                    if events.send(wrap(event)).await.is_err() {
                        debug!(kind, "Event receiver closed, stopping watch");
                        return;
                    }
                }
            }
            Err(e) => warn!(kind, error = %e, "Watch stream error, retrying"),
        }
    }
}

/// Watch Services and Endpoints and keep `zone` in sync until the watches end.
///
/// # Errors
///
/// Returns [`SyncError::InvalidZone`] for a bad zone origin and
/// [`SyncError::CacheNotReady`] if the Service watch stops before its first
/// full listing.
pub async fn run<Z: ZoneStore>(client: Client, config: &Config, zone: Z) -> Result<(), SyncError> {
    let synthesizer = config.synthesizer()?;
    let (services, endpoints): (Api<Service>, Api<Endpoints>) = match config.namespace.as_deref() {
        Some(namespace) => (
            Api::namespaced(client.clone(), namespace),
            Api::namespaced(client, namespace),
        ),
        None => (Api::all(client.clone()), Api::all(client)),
    };

    let (service_store, service_writer) = reflector::store::<Service>();
    let (endpoints_store, endpoints_writer) = reflector::store::<Endpoints>();
    let (tx, mut rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

    info!(
        zone = %synthesizer.naming().zone(),
        namespace = config.namespace.as_deref().unwrap_or("<all>"),
        "Starting Service watch"
    );
    let service_stream = reflector(
        service_writer,
        watcher(services, watcher::Config::default()).default_backoff(),
    );
    let service_watch = tokio::spawn(forward(
        KIND_SERVICE,
        service_stream,
        tx.clone(),
        ClusterEvent::Service,
    ));

    let ready = service_store.clone();
    let endpoints_watch = tokio::spawn(async move {
        ready
            .wait_until_ready()
            .await
            .map_err(|_| SyncError::CacheNotReady)?;
        info!("Service cache synced, starting Endpoints watch");
        let endpoints_stream = reflector(
            endpoints_writer,
            watcher(endpoints, watcher::Config::default()).default_backoff(),
        );
        forward(KIND_ENDPOINTS, endpoints_stream, tx, ClusterEvent::Endpoints).await;
        Ok::<(), SyncError>(())
    });

    let cache = ClusterCache {
        services: service_store,
        endpoints: endpoints_store,
    };
    let reconciler = Reconciler::new(synthesizer, cache, zone);
    while let Some(event) = rx.recv().await {
        reconciler.handle(event);
    }

    service_watch.abort();
    match endpoints_watch.await {
        Ok(result) => result,
        Err(e) => {
            warn!(error = %e, "Endpoints watch task failed");
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod watch_tests;

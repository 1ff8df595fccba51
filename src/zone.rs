// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Zone store boundary and the in-memory zone.
//!
//! The synchronizer never edits records in place. Every change is a
//! [`Mutation`]: a full replacement of the RRset at one (name, type) key, or
//! its deletion. Stores only have to make each call atomic per key.
//!
//! Two partitions are addressed:
//! - the **service** partition holds A, AAAA, SRV and CNAME RRsets
//! - the **reverse** partition holds PTR RRsets, written through separate
//!   entry points for service addresses and pod addresses

use crate::metrics;
use hickory_client::rr::{Name, RecordSet, RecordType};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::trace;

/// Entry point a mutation is written through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ZoneTarget {
    /// Forward, SRV and CNAME records
    Service,
    /// PTR records for service cluster addresses
    ServiceReverse,
    /// PTR records for pod addresses
    PodReverse,
}

impl ZoneTarget {
    /// The partition this entry point writes into.
    #[must_use]
    pub fn partition(self) -> Partition {
        match self {
            ZoneTarget::Service => Partition::Service,
            ZoneTarget::ServiceReverse | ZoneTarget::PodReverse => Partition::Reverse,
        }
    }
}

/// Storage partition of the zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Partition {
    Service,
    Reverse,
}

impl Partition {
    /// Lowercase name used in metric labels.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Partition::Service => "service",
            Partition::Reverse => "reverse",
        }
    }
}

/// A single replace-or-delete of the RRset at `(name, record_type)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mutation {
    pub target: ZoneTarget,
    pub name: Name,
    pub record_type: RecordType,
    /// `Some` replaces the RRset atomically, `None` deletes it
    pub rrset: Option<RecordSet>,
}

impl Mutation {
    /// Replace the RRset at the key of `rrset`.
    #[must_use]
    pub fn replace(target: ZoneTarget, rrset: RecordSet) -> Self {
        Self {
            target,
            name: rrset.name().clone(),
            record_type: rrset.record_type(),
            rrset: Some(rrset),
        }
    }

    /// Delete whatever RRset exists at `(name, record_type)`.
    #[must_use]
    pub fn delete(target: ZoneTarget, name: Name, record_type: RecordType) -> Self {
        Self {
            target,
            name,
            record_type,
            rrset: None,
        }
    }

    /// Whether this mutation removes the key.
    #[must_use]
    pub fn is_delete(&self) -> bool {
        self.rrset.is_none()
    }

    /// Write this mutation through the matching entry point of `store`.
    pub fn apply_to<Z: ZoneStore + ?Sized>(self, store: &Z) {
        metrics::record_mutation(self.record_type, self.is_delete());
        match self.target {
            ZoneTarget::Service => {
                store.replace_service_rrset(&self.name, self.record_type, self.rrset);
            }
            ZoneTarget::ServiceReverse => {
                store.replace_service_reverse_rrset(&self.name, self.record_type, self.rrset);
            }
            ZoneTarget::PodReverse => {
                store.replace_pod_reverse_rrset(&self.name, self.record_type, self.rrset);
            }
        }
    }
}

/// Narrow mutation interface of the authoritative zone.
///
/// Every call fully replaces (`Some`) or deletes (`None`) the RRset at one
/// key and is idempotent. Implementations must be safe to call concurrently
/// for distinct keys; concurrent calls on the same key are last-write-wins.
pub trait ZoneStore: Send + Sync {
    /// Replace or delete a forward, SRV or CNAME RRset.
    fn replace_service_rrset(&self, name: &Name, record_type: RecordType, rrset: Option<RecordSet>);

    /// Replace or delete the PTR RRset of a service cluster address.
    fn replace_service_reverse_rrset(
        &self,
        name: &Name,
        record_type: RecordType,
        rrset: Option<RecordSet>,
    );

    /// Replace or delete the PTR RRset of a pod address.
    fn replace_pod_reverse_rrset(
        &self,
        name: &Name,
        record_type: RecordType,
        rrset: Option<RecordSet>,
    );
}

impl<Z: ZoneStore + ?Sized> ZoneStore for std::sync::Arc<Z> {
    fn replace_service_rrset(&self, name: &Name, record_type: RecordType, rrset: Option<RecordSet>) {
        (**self).replace_service_rrset(name, record_type, rrset);
    }

    fn replace_service_reverse_rrset(
        &self,
        name: &Name,
        record_type: RecordType,
        rrset: Option<RecordSet>,
    ) {
        (**self).replace_service_reverse_rrset(name, record_type, rrset);
    }

    fn replace_pod_reverse_rrset(
        &self,
        name: &Name,
        record_type: RecordType,
        rrset: Option<RecordSet>,
    ) {
        (**self).replace_pod_reverse_rrset(name, record_type, rrset);
    }
}

type RrsetMap = HashMap<(Name, RecordType), RecordSet>;

/// Thread-safe in-memory zone with one lock per partition.
#[derive(Debug, Default)]
pub struct MemoryZone {
    service: RwLock<RrsetMap>,
    reverse: RwLock<RrsetMap>,
}

impl MemoryZone {
    /// Create an empty zone.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn partition(&self, partition: Partition) -> &RwLock<RrsetMap> {
        match partition {
            Partition::Service => &self.service,
            Partition::Reverse => &self.reverse,
        }
    }

    fn replace(
        &self,
        partition: Partition,
        name: &Name,
        record_type: RecordType,
        rrset: Option<RecordSet>,
    ) {
        let lock = self.partition(partition);
        let mut rrsets = lock.write().unwrap_or_else(PoisonError::into_inner);
        let key = (name.clone(), record_type);
        match rrset {
            Some(rrset) => {
                trace!(name = %name, record_type = %record_type, partition = partition.as_str(), "replacing RRset");
                rrsets.insert(key, rrset);
            }
            None => {
                trace!(name = %name, record_type = %record_type, partition = partition.as_str(), "deleting RRset");
                rrsets.remove(&key);
            }
        }
        metrics::record_zone_size(partition.as_str(), rrsets.len());
    }

    /// The RRset stored at `(name, record_type)` in `partition`, if any.
    #[must_use]
    pub fn get(&self, partition: Partition, name: &Name, record_type: RecordType) -> Option<RecordSet> {
        self.partition(partition)
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(name.clone(), record_type))
            .cloned()
    }

    /// Number of RRsets stored in `partition`.
    #[must_use]
    pub fn len(&self, partition: Partition) -> usize {
        self.partition(partition)
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether both partitions are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len(Partition::Service) == 0 && self.len(Partition::Reverse) == 0
    }

    /// Every key in `partition`, sorted for stable output.
    #[must_use]
    pub fn keys(&self, partition: Partition) -> Vec<(Name, RecordType)> {
        let mut keys: Vec<_> = self
            .partition(partition)
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        keys.sort_by(|a, b| {
            a.0.cmp(&b.0)
                .then_with(|| u16::from(a.1).cmp(&u16::from(b.1)))
        });
        keys
    }
}

impl ZoneStore for MemoryZone {
    fn replace_service_rrset(&self, name: &Name, record_type: RecordType, rrset: Option<RecordSet>) {
        self.replace(Partition::Service, name, record_type, rrset);
    }

    fn replace_service_reverse_rrset(
        &self,
        name: &Name,
        record_type: RecordType,
        rrset: Option<RecordSet>,
    ) {
        self.replace(Partition::Reverse, name, record_type, rrset);
    }

    fn replace_pod_reverse_rrset(
        &self,
        name: &Name,
        record_type: RecordType,
        rrset: Option<RecordSet>,
    ) {
        self.replace(Partition::Reverse, name, record_type, rrset);
    }
}

#[cfg(test)]
#[path = "zone_tests.rs"]
mod zone_tests;

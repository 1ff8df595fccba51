// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Domain name derivation for services, pods, named ports and reverse lookups.
//!
//! All names are placed under a single configured zone origin:
//!
//! | Object | Name |
//! |---|---|
//! | Service | `<service>.<namespace>.<zone>` |
//! | Pod with hostname | `<hostname>.<subdomain or endpoints>.<namespace>.<zone>` |
//! | Pod without hostname | `<ip, dashed>.<endpoints>.<namespace>.<zone>` |
//! | Named port | `_<port>._<protocol>.<endpoints>.<namespace>.<zone>` |
//! | Reverse | `<reversed octets>.in-addr.arpa.` / `<nibbles>.ip6.arpa.` |
//!
//! Every function is pure. Two addresses that declare the same hostname in the
//! same Endpoints object map to the same pod name, which is what lets the
//! synthesizer merge them into one RRset.

use crate::errors::{NamingError, SyncError};
use crate::model::{Address, ServiceRecord};
use hickory_client::rr::Name;
use std::net::IpAddr;

/// Derives every domain name the synchronizer publishes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamingPolicy {
    zone: Name,
}

impl NamingPolicy {
    /// Create a policy rooted at `zone` (e.g. `cluster.local.`, or `.` for the root).
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidZone`] if `zone` is not a valid domain name.
    pub fn new(zone: &str) -> Result<Self, SyncError> {
        let zone = if zone.trim_end_matches('.').is_empty() {
            Name::root()
        } else {
            let mut name = Name::from_ascii(zone).map_err(|e| SyncError::InvalidZone {
                zone: zone.to_string(),
                reason: e.to_string(),
            })?;
            name.set_fqdn(true);
            name
        };
        Ok(Self { zone })
    }

    /// The zone origin all forward names are placed under.
    #[must_use]
    pub fn zone(&self) -> &Name {
        &self.zone
    }

    /// `<service>.<namespace>.<zone>`
    ///
    /// # Errors
    ///
    /// Returns [`NamingError::InvalidName`] if the metadata does not form valid labels.
    pub fn service_domain(&self, service: &ServiceRecord) -> Result<Name, NamingError> {
        self.under_zone(&format!("{}.{}", service.name, service.namespace))
    }

    /// Domain name of one endpoint address.
    ///
    /// With a hostname the pod lives under its subdomain (falling back to the
    /// Endpoints name); without one the dashed IP is used as the leaf label.
    ///
    /// # Errors
    ///
    /// Returns [`NamingError::InvalidName`] if the derived labels are not valid.
    pub fn pod_address_domain(
        &self,
        address: &Address,
        endpoints_name: &str,
        endpoints_namespace: &str,
    ) -> Result<Name, NamingError> {
        let relative = match address.hostname.as_deref() {
            Some(hostname) => {
                let subdomain = address.subdomain.as_deref().unwrap_or(endpoints_name);
                format!("{hostname}.{subdomain}.{endpoints_namespace}")
            }
            None => format!(
                "{}.{endpoints_name}.{endpoints_namespace}",
                address.ip.replace(&['.', ':'][..], "-")
            ),
        };
        self.under_zone(&relative)
    }

    /// `_<port>._<protocol>.<endpoints>.<namespace>.<zone>`, protocol lowercased.
    ///
    /// # Errors
    ///
    /// Returns [`NamingError::InvalidName`] if the derived labels are not valid.
    pub fn port_name(
        &self,
        port_name: &str,
        protocol: &str,
        endpoints_name: &str,
        endpoints_namespace: &str,
    ) -> Result<Name, NamingError> {
        self.under_zone(&format!(
            "_{port_name}._{}.{endpoints_name}.{endpoints_namespace}",
            protocol.to_ascii_lowercase()
        ))
    }

    /// The reverse-lookup name for `ip`.
    ///
    /// # Errors
    ///
    /// Returns [`NamingError::InvalidAddress`] if `ip` is not an IPv4/IPv6 literal.
    pub fn reverse_name(&self, ip: &str) -> Result<Name, NamingError> {
        reverse_name(ip)
    }

    fn under_zone(&self, relative: &str) -> Result<Name, NamingError> {
        Name::from_ascii(relative)
            .map_err(|e| invalid_name(relative, &e))?
            .append_domain(&self.zone)
            .map_err(|e| invalid_name(relative, &e))
    }
}

fn invalid_name(name: &str, reason: &dyn std::fmt::Display) -> NamingError {
    NamingError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

/// Parse an IP literal, mapping failures to [`NamingError::InvalidAddress`].
///
/// # Errors
///
/// Returns [`NamingError::InvalidAddress`] if `ip` does not parse.
pub fn parse_ip(ip: &str) -> Result<IpAddr, NamingError> {
    ip.parse::<IpAddr>()
        .map_err(|_| NamingError::InvalidAddress {
            address: ip.to_string(),
        })
}

/// Parse an external target hostname as an absolute domain name.
///
/// # Errors
///
/// Returns [`NamingError::InvalidName`] if `target` is empty or not a valid name.
pub fn parse_target(target: &str) -> Result<Name, NamingError> {
    if target.trim_end_matches('.').is_empty() {
        return Err(invalid_name(target, &"empty target"));
    }
    let mut name = Name::from_ascii(target).map_err(|e| invalid_name(target, &e))?;
    name.set_fqdn(true);
    Ok(name)
}

/// The canonical `in-addr.arpa.` / `ip6.arpa.` name for `ip`.
///
/// # Errors
///
/// Returns [`NamingError::InvalidAddress`] if `ip` is not an IPv4/IPv6 literal.
pub fn reverse_name(ip: &str) -> Result<Name, NamingError> {
    Ok(reverse_name_for(parse_ip(ip)?))
}

/// The reverse-lookup name of an already parsed address.
#[must_use]
pub fn reverse_name_for(ip: IpAddr) -> Name {
    let mut name = Name::from(ip);
    name.set_fqdn(true);
    name
}

#[cfg(test)]
#[path = "naming_tests.rs"]
mod naming_tests;

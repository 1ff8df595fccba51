// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! End-to-end zone synchronization scenarios.
//!
//! Objects flow through the same translation and reconciliation path the
//! watch loop uses, into an in-memory zone rooted at `.`.

mod common;

use clusterdns::reconciler::Outcome;
use clusterdns::zone::Partition;
use common::{endpoints, external_service, service, Harness};
use hickory_client::rr::RecordType;

#[test]
fn test_normal_service_lifecycle() {
    let mut cluster = Harness::new(".");
    let web = service("web", "default", "1", "10.0.0.5");

    assert_eq!(cluster.apply_service(web.clone()), vec![Outcome::Applied(2)]);
    assert_eq!(cluster.rdata("web.default.", RecordType::A), vec!["10.0.0.5"]);
    assert_eq!(
        cluster.rdata("5.0.0.10.in-addr.arpa.", RecordType::PTR),
        vec!["web.default."]
    );

    cluster.delete_service(web);
    assert!(cluster.zone.is_empty());
}

#[test]
fn test_resync_of_unchanged_service_is_silent() {
    let mut cluster = Harness::new(".");
    cluster.apply_service(service("web", "default", "1", "10.0.0.5"));

    assert!(cluster
        .apply_service(service("web", "default", "1", "10.0.0.5"))
        .is_empty());
}

#[test]
fn test_service_address_change_moves_records() {
    let mut cluster = Harness::new(".");
    cluster.apply_service(service("web", "default", "1", "10.0.0.5"));
    cluster.apply_service(service("web", "default", "2", "10.0.0.6"));

    assert_eq!(cluster.rdata("web.default.", RecordType::A), vec!["10.0.0.6"]);
    assert!(cluster.rdata("5.0.0.10.in-addr.arpa.", RecordType::PTR).is_empty());
    assert_eq!(
        cluster.rdata("6.0.0.10.in-addr.arpa.", RecordType::PTR),
        vec!["web.default."]
    );
}

#[test]
fn test_headless_service_with_endpoints() {
    let mut cluster = Harness::new(".");
    cluster.apply_service(service("db", "default", "1", "None"));
    cluster.apply_endpoints(endpoints(
        "db",
        "default",
        "1",
        &[("10.0.1.1", Some("db-0")), ("10.0.1.2", Some("db-1"))],
        &[("cql", 9042)],
    ));

    assert_eq!(cluster.rdata("db-0.db.default.", RecordType::A), vec!["10.0.1.1"]);
    assert_eq!(cluster.rdata("db-1.db.default.", RecordType::A), vec!["10.0.1.2"]);
    assert_eq!(
        cluster.rdata("db.default.", RecordType::A),
        vec!["10.0.1.1", "10.0.1.2"]
    );
    assert_eq!(
        cluster.rdata("_cql._tcp.db.default.", RecordType::SRV),
        vec!["0 100 9042 db-0.db.default.", "0 100 9042 db-1.db.default."]
    );
    assert_eq!(
        cluster.rdata("2.1.0.10.in-addr.arpa.", RecordType::PTR),
        vec!["db-1.db.default."]
    );
}

#[test]
fn test_headless_scale_down_leaves_no_stale_records() {
    let mut cluster = Harness::new(".");
    cluster.apply_service(service("db", "default", "1", "None"));
    cluster.apply_endpoints(endpoints(
        "db",
        "default",
        "1",
        &[("10.0.1.1", Some("db-0")), ("10.0.1.2", Some("db-1"))],
        &[("cql", 9042)],
    ));
    cluster.apply_endpoints(endpoints(
        "db",
        "default",
        "2",
        &[("10.0.1.1", Some("db-0"))],
        &[("cql", 9042)],
    ));

    assert!(cluster.rdata("db-1.db.default.", RecordType::A).is_empty());
    assert!(cluster.rdata("2.1.0.10.in-addr.arpa.", RecordType::PTR).is_empty());
    assert_eq!(cluster.rdata("db.default.", RecordType::A), vec!["10.0.1.1"]);
    assert_eq!(
        cluster.rdata("_cql._tcp.db.default.", RecordType::SRV),
        vec!["0 100 9042 db-0.db.default."]
    );

    cluster.apply_endpoints(endpoints("db", "default", "3", &[], &[]));
    assert!(cluster.zone.is_empty());
}

#[test]
fn test_headless_teardown_service_first() {
    let mut cluster = Harness::new(".");
    let db = service("db", "default", "1", "None");
    let db_endpoints = endpoints(
        "db",
        "default",
        "1",
        &[("10.0.1.1", Some("db-0"))],
        &[("cql", 9042)],
    );
    cluster.apply_service(db.clone());
    cluster.apply_endpoints(db_endpoints.clone());

    cluster.delete_service(db);
    assert!(cluster.rdata("db.default.", RecordType::A).is_empty());
    assert!(!cluster.rdata("db-0.db.default.", RecordType::A).is_empty());

    cluster.delete_endpoints(db_endpoints);
    assert!(cluster.zone.is_empty());
}

#[test]
fn test_normal_service_with_endpoints() {
    let mut cluster = Harness::new(".");
    cluster.apply_service(service("web", "default", "1", "10.0.0.5"));
    cluster.apply_endpoints(endpoints(
        "web",
        "default",
        "1",
        &[("10.0.2.1", None), ("10.0.2.2", None)],
        &[("http", 80)],
    ));

    assert_eq!(cluster.rdata("10-0-2-1.web.default.", RecordType::A), vec!["10.0.2.1"]);
    assert_eq!(
        cluster.rdata("_http._tcp.web.default.", RecordType::SRV),
        vec!["0 100 80 web.default."]
    );
    // The service A stays the cluster IP; no aggregate for normal services.
    assert_eq!(cluster.rdata("web.default.", RecordType::A), vec!["10.0.0.5"]);
}

#[test]
fn test_endpoints_before_service_are_dropped() {
    let mut cluster = Harness::new(".");

    let outcomes = cluster.apply_endpoints(endpoints(
        "db",
        "default",
        "1",
        &[("10.0.1.1", Some("db-0"))],
        &[],
    ));
    assert_eq!(outcomes, vec![Outcome::Dropped]);
    assert!(cluster.zone.is_empty());
}

#[test]
fn test_external_service_lifecycle() {
    let mut cluster = Harness::new(".");
    let api = external_service("api", "default", "1", "backend.example.com.");

    cluster.apply_service(api);
    assert_eq!(
        cluster.rdata("api.default.", RecordType::CNAME),
        vec!["backend.example.com."]
    );

    cluster.apply_service(external_service("api", "default", "2", "other.example.com."));
    assert_eq!(
        cluster.rdata("api.default.", RecordType::CNAME),
        vec!["other.example.com."]
    );

    cluster.delete_service(external_service("api", "default", "3", "other.example.com."));
    assert!(cluster.zone.is_empty());
}

#[test]
fn test_external_service_becomes_normal() {
    let mut cluster = Harness::new(".");
    cluster.apply_service(external_service("api", "default", "1", "backend.example.com."));
    cluster.apply_service(service("api", "default", "2", "10.0.0.9"));

    assert!(cluster.rdata("api.default.", RecordType::CNAME).is_empty());
    assert_eq!(cluster.rdata("api.default.", RecordType::A), vec!["10.0.0.9"]);
}

#[test]
fn test_names_under_configured_zone() {
    let mut cluster = Harness::new("cluster.local.");
    cluster.apply_service(service("web", "default", "1", "10.0.0.5"));

    assert_eq!(
        cluster.rdata("web.default.cluster.local.", RecordType::A),
        vec!["10.0.0.5"]
    );
    assert_eq!(cluster.zone.len(Partition::Service), 1);
}

#[test]
fn test_headless_pods_without_hostnames() {
    let mut cluster = Harness::new(".");
    cluster.apply_service(service("db", "default", "1", "None"));
    cluster.apply_endpoints(endpoints(
        "db",
        "default",
        "1",
        &[("10.0.1.1", None), ("10.0.1.2", None)],
        &[("cql", 9042)],
    ));

    assert_eq!(
        cluster.rdata("db.default.", RecordType::A),
        vec!["10.0.1.1", "10.0.1.2"]
    );
    assert_eq!(cluster.rdata("10-0-1-1.db.default.", RecordType::A), vec!["10.0.1.1"]);
    assert_eq!(cluster.rdata("10-0-1-2.db.default.", RecordType::A), vec!["10.0.1.2"]);
    assert_eq!(
        cluster.rdata("_cql._tcp.db.default.", RecordType::SRV),
        vec![
            "0 100 9042 10-0-1-1.db.default.",
            "0 100 9042 10-0-1-2.db.default."
        ]
    );
    assert_eq!(
        cluster.rdata("1.1.0.10.in-addr.arpa.", RecordType::PTR),
        vec!["10-0-1-1.db.default."]
    );
}

#[test]
fn test_normal_service_becomes_headless() {
    let mut cluster = Harness::new(".");
    cluster.apply_service(service("web", "default", "1", "10.0.0.5"));
    cluster.apply_endpoints(endpoints(
        "web",
        "default",
        "1",
        &[("10.0.2.1", None)],
        &[("http", 80)],
    ));

    cluster.apply_service(service("web", "default", "2", "None"));

    assert_eq!(
        cluster.rdata("_http._tcp.web.default.", RecordType::SRV),
        vec!["0 100 80 10-0-2-1.web.default."]
    );
    assert_eq!(cluster.rdata("web.default.", RecordType::A), vec!["10.0.2.1"]);
    assert!(cluster.rdata("5.0.0.10.in-addr.arpa.", RecordType::PTR).is_empty());
    assert_eq!(
        cluster.rdata("1.2.0.10.in-addr.arpa.", RecordType::PTR),
        vec!["10-0-2-1.web.default."]
    );
}

#[test]
fn test_headless_service_becomes_normal() {
    let mut cluster = Harness::new(".");
    cluster.apply_service(service("db", "default", "1", "None"));
    cluster.apply_endpoints(endpoints(
        "db",
        "default",
        "1",
        &[("10.0.1.1", Some("db-0")), ("10.0.1.2", Some("db-1"))],
        &[("cql", 9042)],
    ));

    cluster.apply_service(service("db", "default", "2", "10.0.0.7"));

    assert_eq!(cluster.rdata("db.default.", RecordType::A), vec!["10.0.0.7"]);
    assert_eq!(
        cluster.rdata("_cql._tcp.db.default.", RecordType::SRV),
        vec!["0 100 9042 db.default."]
    );
    assert_eq!(cluster.rdata("db-0.db.default.", RecordType::A), vec!["10.0.1.1"]);
}

#[test]
fn test_pod_ptr_is_keyed_by_address_only() {
    let mut cluster = Harness::new(".");
    cluster.apply_service(service("web", "default", "1", "10.0.0.5"));
    cluster.apply_service(service("web2", "default", "1", "10.0.0.6"));
    let web_endpoints = endpoints("web", "default", "1", &[("10.0.2.1", None)], &[]);
    cluster.apply_endpoints(web_endpoints.clone());
    cluster.apply_endpoints(endpoints("web2", "default", "1", &[("10.0.2.1", None)], &[]));

    // The last writer owns the PTR, and a delete removes it for both.
    assert_eq!(
        cluster.rdata("1.2.0.10.in-addr.arpa.", RecordType::PTR),
        vec!["10-0-2-1.web2.default."]
    );
    cluster.delete_endpoints(web_endpoints);
    assert_eq!(cluster.rdata("10-0-2-1.web2.default.", RecordType::A), vec!["10.0.2.1"]);
    assert!(cluster.rdata("1.2.0.10.in-addr.arpa.", RecordType::PTR).is_empty());
}

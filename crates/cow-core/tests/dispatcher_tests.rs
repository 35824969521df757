//! Integration tests for the per-host dispatcher

use async_trait::async_trait;
use cow_core::dialer::Connection;
use cow_core::{Dialer, Error, PerHost, Route};
use mockall::mock;
use std::io;
use std::sync::Arc;

mock! {
    pub Factory {}

    #[async_trait]
    impl Dialer for Factory {
        async fn dial(&self, network: &str, address: &str) -> io::Result<Connection>;
    }
}

fn pipe() -> Connection {
    let (client, _server) = tokio::io::duplex(64);
    Box::new(client)
}

fn expect_dial(factory: &mut MockFactory, address: &'static str) {
    factory
        .expect_dial()
        .withf(move |network: &str, addr: &str| network == "tcp" && addr == address)
        .times(1)
        .returning(|_, _| Ok(pipe()));
}

fn blocked_rules() -> &'static str {
    "DOMAIN-SUFFIX,.blocked.com\nIP-CIDR,10.0.0.0/8\n"
}

// ============ Routing scenario ============

#[tokio::test]
async fn test_blocked_suffix_goes_through_bypass() {
    let direct = MockFactory::new();
    let mut bypass = MockFactory::new();
    expect_dial(&mut bypass, "a.blocked.com:443");

    let mut per_host = PerHost::new(Arc::new(direct), Arc::new(bypass));
    per_host.load_rules(blocked_rules());

    assert!(per_host.dial("tcp", "a.blocked.com:443").await.is_ok());
}

#[tokio::test]
async fn test_cidr_literal_goes_through_bypass() {
    let direct = MockFactory::new();
    let mut bypass = MockFactory::new();
    expect_dial(&mut bypass, "10.1.2.3:80");

    let mut per_host = PerHost::new(Arc::new(direct), Arc::new(bypass));
    per_host.load_rules(blocked_rules());

    assert!(per_host.dial("tcp", "10.1.2.3:80").await.is_ok());
}

#[tokio::test]
async fn test_unmatched_goes_direct() {
    let mut direct = MockFactory::new();
    let bypass = MockFactory::new();
    expect_dial(&mut direct, "8.8.8.8:53");

    let mut per_host = PerHost::new(Arc::new(direct), Arc::new(bypass));
    per_host.load_rules(blocked_rules());

    assert!(per_host.dial("tcp", "8.8.8.8:53").await.is_ok());
}

#[tokio::test]
async fn test_address_without_port_fails_before_dialing() {
    // No expectations: any call on either mock panics
    let mut per_host = PerHost::new(Arc::new(MockFactory::new()), Arc::new(MockFactory::new()));
    per_host.load_rules(blocked_rules());

    let err = per_host.dial("tcp", "bad-address").await.unwrap_err();
    assert!(matches!(err, Error::AddressFormat { ref address, .. } if address == "bad-address"));
    assert_eq!(per_host.rules().evaluations(), 0);
}

// ============ Pass-through behavior ============

#[tokio::test]
async fn test_network_and_full_address_passed_through() {
    let mut direct = MockFactory::new();
    direct
        .expect_dial()
        .withf(|network: &str, addr: &str| network == "tcp6" && addr == "[2001:db8::1]:8443")
        .times(1)
        .returning(|_, _| Ok(pipe()));

    let per_host = PerHost::new(Arc::new(direct), Arc::new(MockFactory::new()));
    assert!(per_host.dial("tcp6", "[2001:db8::1]:8443").await.is_ok());
}

#[tokio::test]
async fn test_factory_error_returned_verbatim_without_fallback() {
    let mut direct = MockFactory::new();
    direct
        .expect_dial()
        .times(1)
        .returning(|_, _| Err(io::Error::new(io::ErrorKind::ConnectionRefused, "nope")));
    // The bypass factory must not be tried after the direct one fails
    let bypass = MockFactory::new();

    let per_host = PerHost::new(Arc::new(direct), Arc::new(bypass));
    let err = per_host.dial("tcp", "example.com:80").await.unwrap_err();

    match err {
        Error::Dial(inner) => {
            assert_eq!(inner.kind(), io::ErrorKind::ConnectionRefused);
            assert_eq!(inner.to_string(), "nope");
        }
        other => panic!("expected dial error, got {other:?}"),
    }
}

// ============ Memoization ============

#[tokio::test]
async fn test_same_host_evaluated_once() {
    let direct = MockFactory::new();
    let mut bypass = MockFactory::new();
    bypass
        .expect_dial()
        .times(2)
        .returning(|_, _| Ok(pipe()));

    let mut per_host = PerHost::new(Arc::new(direct), Arc::new(bypass));
    per_host.add_rule("DOMAIN-KEYWORD,blocked");

    per_host.dial("tcp", "www.blocked.org:80").await.unwrap();
    per_host.dial("tcp", "www.blocked.org:443").await.unwrap();

    assert_eq!(per_host.rules().evaluations(), 1);
    assert_eq!(per_host.route("www.blocked.org"), Route::Bypass);
    assert_eq!(per_host.rules().evaluations(), 1);
}

#[tokio::test]
async fn test_concurrent_dials_share_cache() {
    let mut direct = MockFactory::new();
    direct.expect_dial().times(64).returning(|_, _| Ok(pipe()));

    let per_host = Arc::new(PerHost::new(Arc::new(direct), Arc::new(MockFactory::new())));

    let tasks: Vec<_> = (0..64)
        .map(|i| {
            let per_host = Arc::clone(&per_host);
            tokio::spawn(async move {
                let address = format!("host{}.example:{}", i % 4, 1000 + i);
                per_host.dial("tcp", &address).await.map(|_| ())
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let stats = per_host.stats();
    assert_eq!(stats.cached_hosts, 4);
    assert_eq!(stats.direct_dials, 64);
    assert_eq!(stats.cache_hits + stats.cache_misses, 64);
    // racing first lookups may each evaluate, but never more than once per dial
    assert!(per_host.rules().evaluations() >= 4);
    assert!(per_host.rules().evaluations() <= 64);
}

#[tokio::test]
async fn test_cache_keys_are_not_normalized() {
    let mut per_host = PerHost::new(Arc::new(MockFactory::new()), Arc::new(MockFactory::new()));
    per_host.add_rule("DOMAIN,example.com");

    assert_eq!(per_host.route("example.com"), Route::Bypass);
    assert_eq!(per_host.route("EXAMPLE.COM"), Route::Direct);
    assert_eq!(per_host.stats().cached_hosts, 2);
}

// ============ Chaining ============

#[tokio::test]
async fn test_dispatcher_is_a_dialer() {
    let mut bypass = MockFactory::new();
    expect_dial(&mut bypass, "inner.blocked.com:443");

    let mut inner = PerHost::new(Arc::new(MockFactory::new()), Arc::new(bypass));
    inner.add_rule("DOMAIN-SUFFIX,.blocked.com");

    // Outer dispatcher routes everything direct, i.e. into the inner one
    let outer = PerHost::new(Arc::new(inner), Arc::new(MockFactory::new()));
    assert!(outer.dial("tcp", "inner.blocked.com:443").await.is_ok());
}

//! Coordinator behaviour against mock probes.
//!
//! Mocks record how often and how concurrently they were called, so ordering,
//! completeness, and pool limits can be checked without touching the network.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use netsweep_core::{
    PortResult, ReachabilityResult, ScanConfig, ScanMode, ScanReport, SweepError,
};
use netsweep_engine::{PortProber, ReachabilityProber, ScanCoordinator};

#[derive(Default, Clone)]
struct Counters {
    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl Counters {
    fn enter(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

struct MockPort {
    open: HashSet<Ipv4Addr>,
    delays: HashMap<Ipv4Addr, Duration>,
    default_delay: Duration,
    counters: Counters,
}

impl MockPort {
    fn new(open: &[Ipv4Addr], counters: &Counters) -> Self {
        Self {
            open: open.iter().copied().collect(),
            delays: HashMap::new(),
            default_delay: Duration::from_millis(5),
            counters: counters.clone(),
        }
    }

    fn with_delay(mut self, address: Ipv4Addr, delay: Duration) -> Self {
        self.delays.insert(address, delay);
        self
    }

    fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }
}

impl PortProber for MockPort {
    fn probe(
        &self,
        address: Ipv4Addr,
        port: u16,
        _timeout: Duration,
    ) -> impl Future<Output = PortResult> + Send {
        async move {
            self.counters.enter();
            let delay = self.delays.get(&address).copied().unwrap_or(self.default_delay);
            tokio::time::sleep(delay).await;
            self.counters.leave();

            if self.open.contains(&address) {
                PortResult::open(address, port, format!("telnet://{address}:{port}"))
            } else {
                PortResult::closed(address, port)
            }
        }
    }
}

struct MockReach {
    reachable: HashSet<Ipv4Addr>,
    hang: HashSet<Ipv4Addr>,
    counters: Counters,
}

impl MockReach {
    fn new(reachable: &[Ipv4Addr], counters: &Counters) -> Self {
        Self {
            reachable: reachable.iter().copied().collect(),
            hang: HashSet::new(),
            counters: counters.clone(),
        }
    }

    fn hanging_on(mut self, address: Ipv4Addr) -> Self {
        self.hang.insert(address);
        self
    }
}

impl ReachabilityProber for MockReach {
    fn probe(
        &self,
        address: Ipv4Addr,
        _timeout: Duration,
    ) -> impl Future<Output = ReachabilityResult> + Send {
        async move {
            self.counters.enter();
            if self.hang.contains(&address) {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            self.counters.leave();
            ReachabilityResult::new(address, self.reachable.contains(&address))
        }
    }
}

fn ip(last: u8) -> Ipv4Addr {
    Ipv4Addr::new(192, 168, 1, last)
}

fn coordinator(
    config: ScanConfig,
    port: MockPort,
    reach: MockReach,
) -> ScanCoordinator<MockPort, MockReach> {
    ScanCoordinator::with_probers(config, port, reach).unwrap()
}

fn default_coordinator(port: MockPort, counters: &Counters) -> ScanCoordinator<MockPort, MockReach> {
    coordinator(ScanConfig::default(), port, MockReach::new(&[], counters))
}

#[tokio::test]
async fn test_three_host_port_scan() {
    let counters = Counters::default();
    let coord = default_coordinator(MockPort::new(&[ip(2)], &counters), &counters);

    let results = coord
        .scan_ports("192.168.1.1-192.168.1.3", 23)
        .await
        .unwrap();

    let json: serde_json::Value = serde_json::from_str(&results.to_json(false).unwrap()).unwrap();
    assert_eq!(
        json,
        serde_json::json!([
            {"ip": "192.168.1.1", "port": 23, "isOpen": false},
            {"ip": "192.168.1.2", "port": 23, "isOpen": true, "uri": "telnet://192.168.1.2:23"},
            {"ip": "192.168.1.3", "port": 23, "isOpen": false}
        ])
    );
    assert_eq!(counters.calls(), 3);
    assert_eq!(results.summary().positive, 1);
    assert_eq!(results.summary().negative, 2);
    assert!(!results.summary().deadline_exceeded);
}

#[tokio::test]
async fn test_order_is_independent_of_completion_order() {
    let counters = Counters::default();
    // Earlier addresses finish later.
    let mut port = MockPort::new(&[ip(1), ip(4), ip(9)], &counters);
    for last in 1..=10u8 {
        port = port.with_delay(ip(last), Duration::from_millis(u64::from(11 - last) * 10));
    }
    let coord = default_coordinator(port, &counters);

    let results = coord.scan_ports("192.168.1.1-10", 8080).await.unwrap();

    let ips: Vec<Ipv4Addr> = results.entries().iter().map(PortResult::ip).collect();
    let expected: Vec<Ipv4Addr> = (1..=10).map(ip).collect();
    assert_eq!(ips, expected);

    let open: Vec<u8> = results
        .entries()
        .iter()
        .filter(|r| r.is_open())
        .map(|r| r.ip().octets()[3])
        .collect();
    assert_eq!(open, vec![1, 4, 9]);
}

#[tokio::test]
async fn test_list_range_is_complete_and_sorted() {
    let counters = Counters::default();
    let coord = default_coordinator(MockPort::new(&[], &counters), &counters);

    let results = coord
        .scan_ports("192.168.1.9, 192.168.1.0/30, 192.168.1.2-4", 22)
        .await
        .unwrap();

    let lasts: Vec<u8> = results.entries().iter().map(|r| r.ip().octets()[3]).collect();
    assert_eq!(lasts, vec![0, 1, 2, 3, 4, 9]);
    assert_eq!(counters.calls(), 6);
}

#[tokio::test]
async fn test_invalid_range_runs_no_probes() {
    let counters = Counters::default();
    let coord = default_coordinator(MockPort::new(&[], &counters), &counters);

    let err = coord.scan_ports("not-an-ip", 23).await.unwrap_err();
    assert!(matches!(err, SweepError::InvalidRangeFormat { .. }));
    assert_eq!(err.status_code(), 400);

    let err = coord
        .run("not-an-ip", None, ScanMode::Reachability)
        .await
        .unwrap_err();
    assert!(matches!(err, SweepError::InvalidRangeFormat { .. }));
    assert_eq!(counters.calls(), 0);
}

#[tokio::test]
async fn test_range_over_ceiling_runs_no_probes() {
    let counters = Counters::default();
    let config = ScanConfig {
        max_hosts: 256,
        ..Default::default()
    };
    let coord = coordinator(
        config,
        MockPort::new(&[], &counters),
        MockReach::new(&[], &counters),
    );

    let err = coord.scan_ports("10.0.0.0/8", 23).await.unwrap_err();
    assert!(matches!(err, SweepError::RangeTooLarge { limit: 256, .. }));
    assert_eq!(counters.calls(), 0);

    // A /24 fits exactly.
    let results = coord.scan_ports("10.0.0.0/24", 23).await.unwrap();
    assert_eq!(results.len(), 256);
}

#[tokio::test]
async fn test_port_mode_requires_port() {
    let counters = Counters::default();
    let coord = default_coordinator(MockPort::new(&[], &counters), &counters);

    let err = coord
        .run("192.168.1.1", None, ScanMode::Port)
        .await
        .unwrap_err();
    assert!(matches!(err, SweepError::MissingPort));

    let err = coord.scan_ports("192.168.1.1", 0).await.unwrap_err();
    assert!(matches!(err, SweepError::InvalidPort(_)));
    assert_eq!(counters.calls(), 0);
}

#[tokio::test]
async fn test_concurrency_is_capped_by_pool() {
    let counters = Counters::default();
    let config = ScanConfig {
        concurrency: 3,
        ..Default::default()
    };
    let port = MockPort::new(&[], &counters).with_default_delay(Duration::from_millis(20));
    let coord = coordinator(config, port, MockReach::new(&[], &counters));

    let results = coord.scan_ports("192.168.1.1-20", 80).await.unwrap();

    assert_eq!(results.len(), 20);
    assert_eq!(counters.calls(), 20);
    assert!(counters.max_in_flight() <= 3, "saw {}", counters.max_in_flight());
    assert_eq!(coord.available_slots(), 3);
}

#[tokio::test]
async fn test_concurrent_requests_share_the_pool() {
    let counters = Counters::default();
    let config = ScanConfig {
        concurrency: 2,
        ..Default::default()
    };
    let port = MockPort::new(&[], &counters).with_default_delay(Duration::from_millis(20));
    let coord = coordinator(config, port, MockReach::new(&[], &counters));

    let (a, b) = tokio::join!(
        coord.scan_ports("192.168.1.1-8", 80),
        coord.scan_ports("10.0.0.1-8", 80)
    );

    assert_eq!(a.unwrap().len(), 8);
    assert_eq!(b.unwrap().len(), 8);
    assert!(counters.max_in_flight() <= 2, "saw {}", counters.max_in_flight());
}

#[tokio::test]
async fn test_slow_probe_yields_negative_entry() {
    let counters = Counters::default();
    let config = ScanConfig {
        ping_timeout_ms: 50,
        ..Default::default()
    };
    let reach = MockReach::new(&[ip(1), ip(2), ip(3)], &counters).hanging_on(ip(2));
    let coord = coordinator(config, MockPort::new(&[], &counters), reach);

    let results = coord.scan_reachability("192.168.1.1-3").await.unwrap();

    let reachable: Vec<bool> = results
        .entries()
        .iter()
        .map(ReachabilityResult::is_reachable)
        .collect();
    assert_eq!(reachable, vec![true, false, true]);
    assert_eq!(results.entries()[1].ip(), ip(2));
    assert_eq!(results.summary().timed_out, 1);
    assert!(!results.summary().deadline_exceeded);
    assert_eq!(coord.available_slots(), ScanConfig::default().concurrency);
}

#[tokio::test]
async fn test_open_result_after_timeout_is_reported_closed() {
    let counters = Counters::default();
    let config = ScanConfig {
        connect_timeout_ms: 100,
        ..Default::default()
    };
    let target = Ipv4Addr::new(10, 0, 0, 1);
    let port = MockPort::new(&[target], &counters).with_delay(target, Duration::from_millis(200));
    let coord = coordinator(config, port, MockReach::new(&[], &counters));

    let results = coord.scan_ports("10.0.0.1", 23).await.unwrap();

    assert_eq!(results.len(), 1);
    let entry = &results.entries()[0];
    assert_eq!(entry.ip(), target);
    assert!(!entry.is_open());
    assert!(entry.uri().is_none());
    assert_eq!(results.summary().timed_out, 1);
    assert_eq!(results.summary().positive, 0);
    assert!(!results.summary().deadline_exceeded);
}

#[tokio::test]
async fn test_request_deadline_fills_unfinished_targets() {
    let counters = Counters::default();
    let config = ScanConfig {
        concurrency: 1,
        connect_timeout_ms: 10_000,
        request_deadline_ms: 250,
        ..Default::default()
    };
    let all: Vec<Ipv4Addr> = (1..=5).map(ip).collect();
    let port = MockPort::new(&all, &counters).with_default_delay(Duration::from_millis(100));
    let coord = coordinator(config, port, MockReach::new(&[], &counters));

    let results = coord.scan_ports("192.168.1.1-5", 23).await.unwrap();

    assert_eq!(results.len(), 5);
    let ips: Vec<Ipv4Addr> = results.entries().iter().map(PortResult::ip).collect();
    assert_eq!(ips, all);

    // The first probe finished well before the deadline; the last never ran.
    assert!(results.entries()[0].is_open());
    assert!(!results.entries()[4].is_open());
    assert!(results.entries()[4].uri().is_none());

    let summary = results.summary();
    assert!(summary.deadline_exceeded);
    assert!(summary.timed_out >= 2);
    assert_eq!(summary.timed_out + summary.positive, 5);

    // Aborted probes give their worker slot back.
    assert_eq!(coord.available_slots(), 1);
}

#[tokio::test]
async fn test_uri_present_iff_open() {
    let counters = Counters::default();
    let open: Vec<Ipv4Addr> = (1..=32).filter(|n| n % 3 == 0).map(ip).collect();
    let coord = default_coordinator(MockPort::new(&open, &counters), &counters);

    let results = coord.scan_ports("192.168.1.1-32", 23).await.unwrap();

    for entry in results.entries() {
        assert_eq!(entry.is_open(), entry.uri().is_some(), "{entry:?}");
    }
    assert_eq!(results.summary().positive, open.len());
}

#[tokio::test]
async fn test_repeated_scans_are_identical() {
    let counters = Counters::default();
    let mut port = MockPort::new(&[ip(3), ip(7)], &counters);
    port = port.with_delay(ip(3), Duration::from_millis(30));
    let coord = default_coordinator(port, &counters);

    let first = coord.scan_ports("192.168.1.0/28", 23).await.unwrap();
    let second = coord.scan_ports("192.168.1.0/28", 23).await.unwrap();

    assert_eq!(first.entries(), second.entries());
    assert_ne!(first.scan_id(), second.scan_id());
}

#[tokio::test]
async fn test_run_reachability_report() {
    let counters = Counters::default();
    let reach = MockReach::new(&[Ipv4Addr::new(10, 0, 0, 2)], &counters);
    let coord = coordinator(ScanConfig::default(), MockPort::new(&[], &counters), reach);

    let report = coord
        .run("10.0.0.1-10.0.0.2", Some(23), ScanMode::Reachability)
        .await
        .unwrap();

    assert!(!report.is_empty());
    assert_eq!(report.len(), 2);
    assert_eq!(report.summary().positive, 1);

    let ScanReport::Reachability(results) = &report else {
        panic!("expected a reachability report");
    };
    assert_eq!(report.scan_id(), results.scan_id());
    assert_eq!(results.mode(), ScanMode::Reachability);
    assert_eq!(results.range(), "10.0.0.1-10.0.0.2");

    let json: serde_json::Value = serde_json::from_str(&report.to_json(false).unwrap()).unwrap();
    assert_eq!(
        json,
        serde_json::json!([
            {"ip": "10.0.0.1", "isReachable": false},
            {"ip": "10.0.0.2", "isReachable": true}
        ])
    );
}

#[tokio::test]
async fn test_loopback_scan_with_real_probe() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let coord = ScanCoordinator::from_config(ScanConfig::default()).unwrap();
    let report = coord
        .run("127.0.0.1", Some(port), ScanMode::Port)
        .await
        .unwrap();

    let ScanReport::Port(results) = report else {
        panic!("expected a port report");
    };
    assert_eq!(results.len(), 1);
    let entry = &results.entries()[0];
    assert!(entry.is_open());
    assert_eq!(entry.uri(), Some(format!("telnet://127.0.0.1:{port}").as_str()));
}

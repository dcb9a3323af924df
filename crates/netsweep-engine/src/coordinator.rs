//! Scan coordination engine.
//!
//! Expands the range once, fans one probe task per address across a bounded
//! worker pool, and reassembles the records in canonical address order. A
//! semaphore shared by every request on the coordinator caps the number of
//! probes in flight.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio::time::{timeout, timeout_at, Instant};
use uuid::Uuid;

use netsweep_core::{
    PortResult, ProbeRecord, ReachabilityResult, Result, ResultSet, ScanConfig, ScanMode,
    ScanReport, ScanTarget, SweepError, TargetState,
};

use crate::label::TemplateLabel;
use crate::probe::{PingProbe, PortProber, ReachabilityProber, TcpPortProbe};
use crate::range;

/// What a probe task hands back to the coordinator.
enum TaskOutcome<T> {
    Done(T),
    TimedOut,
}

/// Per-request bookkeeping. Only the coordinator writes here, one slot per
/// target index.
struct Slots<T> {
    records: Vec<Option<T>>,
    states: Vec<TargetState>,
}

impl<T: ProbeRecord> Slots<T> {
    fn new(len: usize) -> Self {
        Self {
            records: (0..len).map(|_| None).collect(),
            states: vec![TargetState::Pending; len],
        }
    }

    fn collect(&mut self, joined: std::result::Result<(usize, TaskOutcome<T>), JoinError>) {
        match joined {
            Ok((index, TaskOutcome::Done(record))) => {
                self.states[index] = if record.is_positive() {
                    TargetState::Succeeded
                } else {
                    TargetState::Failed
                };
                self.records[index] = Some(record);
            }
            Ok((index, TaskOutcome::TimedOut)) => {
                self.states[index] = TargetState::TimedOut;
            }
            Err(e) if e.is_cancelled() => {}
            Err(e) => tracing::error!(error = %e, "Probe task panicked"),
        }
    }

    /// Fill every unfinished slot with the negative record.
    /// Returns the records in target order and the timed-out count.
    fn seal(self, targets: &[ScanTarget], deadline_exceeded: bool) -> (Vec<T>, usize) {
        let mut timed_out = 0;
        let records: Vec<T> = targets
            .iter()
            .zip(self.records)
            .zip(self.states)
            .map(|((target, record), mut state)| {
                if !state.is_terminal() {
                    state = if deadline_exceeded {
                        TargetState::TimedOut
                    } else {
                        TargetState::Failed
                    };
                }
                if state == TargetState::TimedOut {
                    timed_out += 1;
                }
                record.unwrap_or_else(|| T::negative(target))
            })
            .collect();
        (records, timed_out)
    }
}

/// Runs port and reachability scans over a shared, bounded worker pool.
pub struct ScanCoordinator<P = TcpPortProbe, R = PingProbe> {
    config: ScanConfig,
    port_prober: Arc<P>,
    reachability_prober: Arc<R>,
    pool: Arc<Semaphore>,
}

impl ScanCoordinator {
    /// Build a coordinator with the production probes configured from `config`.
    pub fn from_config(config: ScanConfig) -> Result<Self> {
        let port_prober = TcpPortProbe::new(TemplateLabel::new(config.uri_template.clone()));
        let reachability_prober = PingProbe::new(&config.ping_path, config.fallback_ports.clone());
        Self::with_probers(config, port_prober, reachability_prober)
    }
}

impl<P: PortProber, R: ReachabilityProber> ScanCoordinator<P, R> {
    pub fn with_probers(config: ScanConfig, port_prober: P, reachability_prober: R) -> Result<Self> {
        config.validate()?;
        let pool = Arc::new(Semaphore::new(config.concurrency));
        Ok(Self {
            config,
            port_prober: Arc::new(port_prober),
            reachability_prober: Arc::new(reachability_prober),
            pool,
        })
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Worker slots not currently held by a probe.
    pub fn available_slots(&self) -> usize {
        self.pool.available_permits()
    }

    /// Run a scan in either mode. Port mode requires `port`.
    pub async fn run(&self, range: &str, port: Option<u16>, mode: ScanMode) -> Result<ScanReport> {
        match mode {
            ScanMode::Port => {
                let port = port.ok_or(SweepError::MissingPort)?;
                Ok(ScanReport::Port(self.scan_ports(range, port).await?))
            }
            ScanMode::Reachability => Ok(ScanReport::Reachability(
                self.scan_reachability(range).await?,
            )),
        }
    }

    /// TCP-connect `port` on every address in `range`.
    pub async fn scan_ports(&self, range: &str, port: u16) -> Result<ResultSet<PortResult>> {
        if port == 0 {
            return Err(SweepError::InvalidPort("port 0 cannot be scanned".into()));
        }

        let prober = Arc::clone(&self.port_prober);
        let probe_timeout = self.config.connect_timeout();
        self.execute(
            range,
            Some(port),
            ScanMode::Port,
            probe_timeout,
            move |target: ScanTarget| {
                let prober = Arc::clone(&prober);
                async move { prober.probe(target.address, port, probe_timeout).await }
            },
        )
        .await
    }

    /// Check every address in `range` for liveness.
    pub async fn scan_reachability(&self, range: &str) -> Result<ResultSet<ReachabilityResult>> {
        let prober = Arc::clone(&self.reachability_prober);
        let probe_timeout = self.config.ping_timeout();
        self.execute(
            range,
            None,
            ScanMode::Reachability,
            probe_timeout,
            move |target: ScanTarget| {
                let prober = Arc::clone(&prober);
                async move { prober.probe(target.address, probe_timeout).await }
            },
        )
        .await
    }

    async fn execute<T, F, Fut>(
        &self,
        range: &str,
        port: Option<u16>,
        mode: ScanMode,
        probe_timeout: Duration,
        probe: F,
    ) -> Result<ResultSet<T>>
    where
        T: ProbeRecord,
        F: Fn(ScanTarget) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let addresses = range::expand(range, self.config.max_hosts)?;
        let targets: Vec<ScanTarget> = addresses
            .into_iter()
            .enumerate()
            .map(|(index, address)| ScanTarget {
                index,
                address,
                port,
            })
            .collect();

        let scan_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();
        let deadline = start + self.config.request_deadline();

        tracing::info!(
            scan_id = %scan_id,
            target = %range,
            mode = %mode,
            hosts = targets.len(),
            "Starting scan"
        );

        let mut slots = Slots::new(targets.len());
        let mut tasks = JoinSet::new();

        let dispatched = timeout_at(
            deadline,
            self.dispatch(&targets, &probe, probe_timeout, &mut tasks, &mut slots),
        )
        .await;
        let deadline_exceeded = match dispatched {
            Ok(dispatched) => {
                dispatched?;
                false
            }
            Err(_elapsed) => {
                tracing::warn!(
                    scan_id = %scan_id,
                    in_flight = tasks.len(),
                    "Request deadline exceeded, cancelling probes"
                );
                tasks.abort_all();
                true
            }
        };

        // Records that finished before the abort landed are still kept.
        while let Some(joined) = tasks.join_next().await {
            slots.collect(joined);
        }

        let (entries, timed_out) = slots.seal(&targets, deadline_exceeded);
        let results = ResultSet::new(
            scan_id,
            range,
            mode,
            started_at,
            entries,
            timed_out,
            deadline_exceeded,
        );

        tracing::info!(
            scan_id = %scan_id,
            target = %range,
            hosts = results.len(),
            positive = results.summary().positive,
            timed_out,
            duration_ms = start.elapsed().as_millis(),
            "Scan complete"
        );

        Ok(results)
    }

    /// Spawn one task per target as worker slots free up, then drain them.
    async fn dispatch<T, F, Fut>(
        &self,
        targets: &[ScanTarget],
        probe: &F,
        probe_timeout: Duration,
        tasks: &mut JoinSet<(usize, TaskOutcome<T>)>,
        slots: &mut Slots<T>,
    ) -> Result<()>
    where
        T: ProbeRecord,
        F: Fn(ScanTarget) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        for target in targets {
            let permit = loop {
                tokio::select! {
                    biased;
                    Some(joined) = tasks.join_next(), if !tasks.is_empty() => slots.collect(joined),
                    permit = Arc::clone(&self.pool).acquire_owned() => {
                        break permit.map_err(|_| {
                            SweepError::InternalScheduling("worker pool closed".into())
                        })?;
                    }
                }
            };

            let index = target.index;
            slots.states[index] = TargetState::Probing;
            let fut = probe(*target);
            // A record that arrives after `probe_timeout` is never reported,
            // whatever the prober returned.
            tasks.spawn(async move {
                let outcome = match timeout(probe_timeout, fut).await {
                    Ok(record) => TaskOutcome::Done(record),
                    Err(_elapsed) => TaskOutcome::TimedOut,
                };
                drop(permit);
                (index, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            slots.collect(joined);
        }
        Ok(())
    }
}

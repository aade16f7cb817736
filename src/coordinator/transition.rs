//! Transition coordinator
//!
//! After servers change group the scheduler has to notice, unassign the
//! partitions that no longer belong on them and reassign them elsewhere.
//! There is no completion signal for that, so the coordinator polls the
//! live state until none of the moved servers is in transition, or the
//! operation timeout elapses.
//!
//! The wait never holds the registry write lock and never undoes a move.

use crate::common::metrics::METRICS;
use crate::common::{timestamp_now_millis, Config, Result, ServerId};
use crate::coordinator::observer::{AssignmentObserver, LiveState, TransitionStatus};
use crate::coordinator::registry::{GroupRegistry, ServerMove};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// A server that is mid-move, kept only while a wait is running
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub server: ServerId,
    pub source_group: String,
    pub target_group: String,
    /// Unix millis
    pub started_at: u64,
    #[serde(skip)]
    op_id: u64,
}

/// One entry of the diagnostic transition listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerTransition {
    pub server: ServerId,
    /// Group the server is transitioning into (its registry group)
    pub target_group: String,
    /// Known only while a move of this server is being waited on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_group: Option<String>,
    pub status: TransitionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<u64>,
    pub foreign_tables: BTreeSet<String>,
}

type RecordMap = Mutex<HashMap<ServerId, TransitionRecord>>;

/// Removes the records a wait registered, on every exit path
struct RecordGuard<'a> {
    records: &'a RecordMap,
    op_id: u64,
    servers: Vec<ServerId>,
}

impl Drop for RecordGuard<'_> {
    fn drop(&mut self) {
        let mut records = self.records.lock();
        for server in &self.servers {
            // a later move of the same server owns the record now
            if records.get(server).is_some_and(|r| r.op_id == self.op_id) {
                records.remove(server);
            }
        }
    }
}

pub struct TransitionCoordinator {
    registry: Arc<GroupRegistry>,
    observer: Arc<dyn AssignmentObserver>,
    operation_timeout: Duration,
    poll_interval: Duration,
    records: RecordMap,
    next_op: AtomicU64,
}

impl TransitionCoordinator {
    pub fn new(
        registry: Arc<GroupRegistry>,
        observer: Arc<dyn AssignmentObserver>,
        config: &Config,
    ) -> Self {
        Self {
            registry,
            observer,
            operation_timeout: config.operation_timeout(),
            poll_interval: config.poll_interval(),
            records: Mutex::new(HashMap::new()),
            next_op: AtomicU64::new(1),
        }
    }

    pub fn operation_timeout(&self) -> Duration {
        self.operation_timeout
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Records of the waits currently in flight
    pub fn records(&self) -> Vec<TransitionRecord> {
        let mut records: Vec<TransitionRecord> = self.records.lock().values().cloned().collect();
        records.sort_by(|a, b| a.server.cmp(&b.server));
        records
    }

    fn register(&self, moves: &[ServerMove]) -> RecordGuard<'_> {
        let op_id = self.next_op.fetch_add(1, Ordering::Relaxed);
        let started_at = timestamp_now_millis();
        let mut records = self.records.lock();
        for mv in moves {
            records.insert(
                mv.server.clone(),
                TransitionRecord {
                    server: mv.server.clone(),
                    source_group: mv.from.clone(),
                    target_group: mv.to.clone(),
                    started_at,
                    op_id,
                },
            );
        }
        RecordGuard {
            records: &self.records,
            op_id,
            servers: moves.iter().map(|mv| mv.server.clone()).collect(),
        }
    }

    /// Servers whose state currently blocks convergence
    pub async fn servers_in_transition(&self) -> Result<BTreeSet<ServerId>> {
        let live = LiveState::fetch(self.observer.as_ref()).await?;
        let evaluated = live.evaluate(&self.registry.read());
        Ok(evaluated
            .into_iter()
            .filter(|(_, state)| state.status.blocks_convergence())
            .map(|(server, _)| server)
            .collect())
    }

    /// Block until none of the moved servers is in transition.
    ///
    /// Fails with `TransitionTimeout` once the operation timeout has passed,
    /// with `Cancelled` if `cancel` fires first, and with the observer's own
    /// error if the scheduler cannot be read. The registry keeps the new
    /// membership in every case.
    pub async fn wait_for_transitions(
        &self,
        moves: &[ServerMove],
        cancel: &CancellationToken,
    ) -> Result<()> {
        if moves.is_empty() {
            return Ok(());
        }

        let started = Instant::now();
        let deadline = started + self.operation_timeout;
        let _guard = self.register(moves);
        let watched: BTreeSet<&ServerId> = moves.iter().map(|mv| &mv.server).collect();

        let result = loop {
            let pending = match self.servers_in_transition().await {
                Ok(pending) => pending,
                Err(e) => break Err(e),
            };

            let stuck: Vec<String> = pending
                .iter()
                .filter(|s| watched.contains(s))
                .map(ServerId::to_string)
                .collect();
            if stuck.is_empty() {
                break Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                break Err(crate::Error::TransitionTimeout {
                    servers: stuck,
                    waited: now - started,
                });
            }

            tracing::debug!(
                "Waiting on {} server(s) in transition: {:?}",
                stuck.len(),
                stuck
            );

            let wake = (now + self.poll_interval).min(deadline);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break Err(crate::Error::Cancelled),
                _ = tokio::time::sleep_until(wake) => {}
            }
        };

        let elapsed = started.elapsed();
        METRICS.record_wait(elapsed, &result);
        match &result {
            Ok(()) => tracing::info!(
                "{} server(s) converged after {:?}",
                watched.len(),
                elapsed
            ),
            Err(e) => tracing::warn!("Server transition wait ended: {}", e),
        }
        result
    }

    /// Diagnostic snapshot of every server not in a steady state
    pub async fn list_servers_in_transition(&self) -> Result<BTreeMap<ServerId, ServerTransition>> {
        let live = LiveState::fetch(self.observer.as_ref()).await?;
        let evaluated = live.evaluate(&self.registry.read());
        let records = self.records.lock().clone();

        let listing: BTreeMap<ServerId, ServerTransition> = evaluated
            .into_iter()
            .map(|(server, state)| {
                let record = records.get(&server);
                let entry = ServerTransition {
                    server: server.clone(),
                    target_group: state.group,
                    source_group: record.map(|r| r.source_group.clone()),
                    status: state.status,
                    started_at: record.map(|r| r.started_at),
                    foreign_tables: state.foreign_tables,
                };
                (server, entry)
            })
            .collect();

        let blocking = listing
            .values()
            .filter(|t| t.status.blocks_convergence())
            .count();
        METRICS.servers_in_transition.set(blocking as u64);

        Ok(listing)
    }
}

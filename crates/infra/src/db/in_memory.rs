//! In-memory result store for tests/dev.
//!
//! Behaves like a bounded connection pool in front of `job_results`: each
//! transaction holds one of `capacity` permits until it commits or rolls back,
//! and acquisition gives up after the configured timeout. Failures can be
//! injected into upcoming reads, commits and rollbacks to exercise the retry
//! and rollback paths.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use jobexport_core::{JobId, JobResultRecord};

use crate::export::JobResultReader;
use crate::tx::{TransactionSource, Transactional, TxError};

/// Failure to inject into a read, commit or rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFault {
    /// Transient: the server refused the connection.
    ConnectionRefused,
    /// Transient: lock wait timed out.
    LockTimeout,
    /// Transient: deadlock detected.
    Deadlock,
    /// Permanent: the query itself failed.
    QueryFailure,
}

impl InjectedFault {
    fn into_error(self, operation: &'static str) -> TxError {
        match self {
            InjectedFault::ConnectionRefused => TxError::transient(operation, "connection refused"),
            InjectedFault::LockTimeout => TxError::transient(operation, "lock wait timeout"),
            InjectedFault::Deadlock => TxError::transient(operation, "deadlock detected"),
            InjectedFault::QueryFailure => {
                TxError::database(operation, "relation \"job_results\" does not exist")
            }
        }
    }
}

/// Transaction counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub begun: u32,
    pub committed: u32,
    pub rolled_back: u32,
    pub reads: u32,
}

#[derive(Debug)]
struct Inner {
    records: RwLock<HashMap<JobId, JobResultRecord>>,
    read_faults: Mutex<VecDeque<InjectedFault>>,
    commit_faults: Mutex<VecDeque<InjectedFault>>,
    rollback_faults: Mutex<VecDeque<InjectedFault>>,
    stats: Mutex<StoreStats>,
    permits: Arc<Semaphore>,
    capacity: usize,
    acquire_timeout: Duration,
}

impl Inner {
    fn stats_mut(&self) -> std::sync::MutexGuard<'_, StoreStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_fault(queue: &Mutex<VecDeque<InjectedFault>>) -> Option<InjectedFault> {
        queue.lock().unwrap_or_else(PoisonError::into_inner).pop_front()
    }
}

/// In-memory `job_results` table behind a bounded pool.
#[derive(Debug, Clone)]
pub struct InMemoryResultStore {
    inner: Arc<Inner>,
}

impl InMemoryResultStore {
    /// Pool of 10 connections with a 30s acquisition timeout.
    pub fn new() -> Self {
        Self::with_capacity(10, Duration::from_secs(30))
    }

    pub fn with_capacity(capacity: usize, acquire_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                records: RwLock::new(HashMap::new()),
                read_faults: Mutex::new(VecDeque::new()),
                commit_faults: Mutex::new(VecDeque::new()),
                rollback_faults: Mutex::new(VecDeque::new()),
                stats: Mutex::new(StoreStats::default()),
                permits: Arc::new(Semaphore::new(capacity)),
                capacity,
                acquire_timeout,
            }),
        }
    }

    /// Insert or replace the record for `job_id`.
    pub fn insert(&self, job_id: JobId, result_data: serde_json::Value) {
        let record = JobResultRecord::new(job_id.clone(), result_data);
        self.inner
            .records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(job_id, record);
    }

    pub fn get(&self, job_id: &JobId) -> Option<JobResultRecord> {
        self.inner
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(job_id)
            .cloned()
    }

    /// Make the next `count` reads fail with `fault`.
    pub fn fail_next_reads(&self, count: usize, fault: InjectedFault) {
        enqueue(&self.inner.read_faults, count, fault);
    }

    /// Make the next `count` commits fail with `fault`.
    pub fn fail_next_commits(&self, count: usize, fault: InjectedFault) {
        enqueue(&self.inner.commit_faults, count, fault);
    }

    /// Make the next `count` rollbacks fail with `fault`.
    pub fn fail_next_rollbacks(&self, count: usize, fault: InjectedFault) {
        enqueue(&self.inner.rollback_faults, count, fault);
    }

    pub fn stats(&self) -> StoreStats {
        *self.inner.stats_mut()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Connections not currently held by an open transaction.
    pub fn available_connections(&self) -> usize {
        self.inner.permits.available_permits()
    }
}

fn enqueue(queue: &Mutex<VecDeque<InjectedFault>>, count: usize, fault: InjectedFault) {
    queue
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .extend(std::iter::repeat_n(fault, count));
}

impl Default for InMemoryResultStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransactionSource for InMemoryResultStore {
    type Tx = InMemoryTx;

    async fn begin(&self) -> Result<InMemoryTx, TxError> {
        let acquire = self.inner.permits.clone().acquire_owned();
        let permit = match tokio::time::timeout(self.inner.acquire_timeout, acquire).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_closed)) => return Err(TxError::database("acquire", "pool closed")),
            Err(_elapsed) => {
                return Err(TxError::PoolExhausted {
                    timeout: self.inner.acquire_timeout,
                });
            }
        };

        self.inner.stats_mut().begun += 1;
        Ok(InMemoryTx {
            inner: self.inner.clone(),
            _permit: permit,
        })
    }
}

/// Open transaction on an [`InMemoryResultStore`]; holds one pool permit.
///
/// The permit is released when the transaction is consumed, whether or not
/// the commit or rollback succeeded.
#[derive(Debug)]
pub struct InMemoryTx {
    inner: Arc<Inner>,
    _permit: OwnedSemaphorePermit,
}

#[async_trait]
impl Transactional for InMemoryTx {
    async fn commit(self) -> Result<(), TxError> {
        if let Some(fault) = Inner::next_fault(&self.inner.commit_faults) {
            return Err(fault.into_error("commit"));
        }
        self.inner.stats_mut().committed += 1;
        Ok(())
    }

    async fn rollback(self) -> Result<(), TxError> {
        if let Some(fault) = Inner::next_fault(&self.inner.rollback_faults) {
            return Err(fault.into_error("rollback"));
        }
        self.inner.stats_mut().rolled_back += 1;
        Ok(())
    }
}

#[async_trait]
impl JobResultReader for InMemoryTx {
    async fn fetch_result_data(
        &mut self,
        job_id: &JobId,
    ) -> Result<Option<serde_json::Value>, TxError> {
        self.inner.stats_mut().reads += 1;

        if let Some(fault) = Inner::next_fault(&self.inner.read_faults) {
            return Err(fault.into_error("select_result"));
        }

        let records = self.inner.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(records.get(job_id).map(|r| r.result_data.clone()))
    }
}

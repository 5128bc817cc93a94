//! Common test utilities for invoice numbering integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::TempDir;

use invoice_numbering_core::{OrganizationId, TenantId};
use invoice_numbering_service::{
    AuditEvent, AuditSink, Clock, CollaboratorError, InvoiceNumbering, RetryPolicy,
    ServiceConfig, TenantDirectory,
};
#[cfg(feature = "rocksdb-backend")]
use invoice_numbering_store::RocksStore;
use invoice_numbering_store::{MemoryStore, Store};

/// Clock that starts at a fixed instant and moves `step` per reading.
pub struct TestClock {
    current: Mutex<DateTime<Utc>>,
    step: Duration,
}

impl TestClock {
    /// Always returns `at`.
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::stepping(at, Duration::zero())
    }

    /// Returns `start`, then `start + step`, and so on.
    pub fn stepping(start: DateTime<Utc>, step: Duration) -> Self {
        Self {
            current: Mutex::new(start),
            step,
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.current.lock().unwrap() = at;
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        let mut current = self.current.lock().unwrap();
        let now = *current;
        *current = now + self.step;
        now
    }
}

/// Sink that keeps every event in memory.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(AuditEvent::name).collect()
    }
}

#[async_trait]
impl AuditSink for RecordingSink {
    async fn emit(&self, event: AuditEvent) -> Result<(), CollaboratorError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

/// Sink that rejects every event.
pub struct FailingSink;

#[async_trait]
impl AuditSink for FailingSink {
    async fn emit(&self, _event: AuditEvent) -> Result<(), CollaboratorError> {
        Err("audit backend unavailable".into())
    }
}

/// Directory that knows a fixed set of organizations.
pub struct StaticDirectory {
    known: HashSet<(TenantId, OrganizationId)>,
}

impl StaticDirectory {
    pub fn new(known: &[(u64, u64)]) -> Self {
        Self {
            known: known
                .iter()
                .map(|&(t, o)| (TenantId::new(t), OrganizationId::new(o)))
                .collect(),
        }
    }
}

#[async_trait]
impl TenantDirectory for StaticDirectory {
    async fn organization_exists(
        &self,
        tenant_id: TenantId,
        organization_id: OrganizationId,
    ) -> Result<bool, CollaboratorError> {
        Ok(self.known.contains(&(tenant_id, organization_id)))
    }
}

/// Storage backend under test.
#[derive(Debug, Clone, Copy)]
pub enum Backend {
    Memory,
    #[cfg(feature = "rocksdb-backend")]
    Rocks,
}

impl Backend {
    #[cfg(feature = "rocksdb-backend")]
    pub const ALL: [Self; 2] = [Self::Memory, Self::Rocks];
    #[cfg(not(feature = "rocksdb-backend"))]
    pub const ALL: [Self; 1] = [Self::Memory];
}

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The service under test.
    pub service: InvoiceNumbering,
    /// The shared store, for building more instances or inspecting state.
    pub store: Arc<dyn Store>,
    /// Recorded audit events.
    pub audit: Arc<RecordingSink>,
    /// The service clock.
    pub clock: Arc<TestClock>,
    /// Temporary directory for the database (kept alive for test duration).
    pub _temp_dir: Option<TempDir>,
}

impl TestHarness {
    /// A harness with default config on `backend`.
    pub fn new(backend: Backend) -> Self {
        Self::with_config(backend, test_config())
    }

    /// A harness with `config` on `backend`.
    pub fn with_config(backend: Backend, config: ServiceConfig) -> Self {
        let (store, temp_dir): (Arc<dyn Store>, Option<TempDir>) = match backend {
            Backend::Memory => (Arc::new(MemoryStore::new()), None),
            #[cfg(feature = "rocksdb-backend")]
            Backend::Rocks => {
                let temp_dir = TempDir::new().expect("Failed to create temp directory");
                let store = RocksStore::open(temp_dir.path()).expect("Failed to open store");
                (Arc::new(store), Some(temp_dir))
            }
        };

        let audit = Arc::new(RecordingSink::default());
        let clock = Arc::new(TestClock::stepping(jan_2025(), Duration::milliseconds(1)));
        let service = InvoiceNumbering::new(Arc::clone(&store), &config)
            .expect("Failed to build service")
            .with_audit_sink(audit.clone())
            .with_clock(clock.clone());

        Self {
            service,
            store,
            audit,
            clock,
            _temp_dir: temp_dir,
        }
    }

    /// A separate service instance over the same store, with its own lock
    /// table, as a second process would have.
    pub fn second_instance(&self) -> InvoiceNumbering {
        InvoiceNumbering::new(Arc::clone(&self.store), &test_config())
            .expect("Failed to build service")
            .with_clock(self.clock.clone())
    }
}

/// Config with a generous retry budget and short backoff.
pub fn test_config() -> ServiceConfig {
    ServiceConfig {
        data_dir: String::new(),
        max_issue_attempts: 200,
        retry_initial_backoff_ms: 1,
        retry_max_backoff_ms: 5,
        ..ServiceConfig::default()
    }
}

/// A retry policy that gives up immediately.
pub fn no_retry() -> RetryPolicy {
    RetryPolicy::no_retry()
}

pub fn jan_2025() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 15, 9, 0, 0).unwrap()
}

pub fn tenant(id: u64) -> TenantId {
    TenantId::new(id)
}

pub fn org(id: u64) -> OrganizationId {
    OrganizationId::new(id)
}

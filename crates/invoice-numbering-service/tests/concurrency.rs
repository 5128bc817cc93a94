//! Concurrency and timeout tests.

mod common;

use std::collections::HashSet;
use std::time::Duration;

use common::{org, tenant, Backend, TestHarness};
use futures::future::join_all;
use invoice_numbering_core::{HistoryFilter, SortOrder};
use invoice_numbering_service::{InvoiceNumbering, RetryPolicy};

async fn issue_many(service: &InvoiceNumbering, count: usize, tenant_id: u64) -> Vec<u64> {
    let tasks = (0..count).map(|_| {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .generate_next(tenant(tenant_id), org(1), 2025, 1)
                .await
                .map(|entry| (entry.sequence, entry.invoice_number))
        })
    });

    let mut sequences = Vec::with_capacity(count);
    let mut numbers = HashSet::new();
    for result in join_all(tasks).await {
        let (sequence, number) = result.unwrap().unwrap();
        sequences.push(sequence);
        assert!(numbers.insert(number), "rendered number issued twice");
    }
    sequences.sort_unstable();
    sequences
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_hundred_concurrent_calls_are_gapless() {
    for backend in Backend::ALL {
        let h = TestHarness::new(backend);

        for _ in 0..5 {
            h.service.generate_next(tenant(1), org(1), 2025, 1).await.unwrap();
        }

        let sequences = issue_many(&h.service, 100, 1).await;
        assert_eq!(sequences, (6..=105).collect::<Vec<u64>>(), "{backend:?}");

        let current = h.service.peek_current(tenant(1), org(1), 2025, 1).await.unwrap();
        assert_eq!(current.sequence, 105);
        assert_eq!(h.service.active_scopes(), 0);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_two_instances_sharing_a_store_stay_gapless() {
    for backend in Backend::ALL {
        let h = TestHarness::new(backend);
        let other = h.second_instance();

        let (a, b) = tokio::join!(issue_many(&h.service, 50, 1), issue_many(&other, 50, 1));

        let mut all: Vec<u64> = a.into_iter().chain(b).collect();
        all.sort_unstable();
        assert_eq!(all, (1..=100).collect::<Vec<u64>>(), "{backend:?}");

        let page = h
            .service
            .list_history(
                tenant(1),
                HistoryFilter {
                    limit: 500,
                    ..HistoryFilter::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(page.total, 100);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_independent_scopes_proceed_in_parallel() {
    for backend in Backend::ALL {
        let h = TestHarness::new(backend);

        let per_tenant = join_all((1..=10).map(|tenant_id| {
            let service = h.service.clone();
            async move { issue_many(&service, 10, tenant_id).await }
        }))
        .await;

        for (tenant_id, sequences) in (1..=10).zip(per_tenant) {
            assert_eq!(sequences, (1..=10).collect::<Vec<u64>>(), "{backend:?}");
            assert_eq!(h.service.list_counters(tenant(tenant_id)).await.unwrap().len(), 1);
        }
        assert_eq!(h.service.active_scopes(), 0);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_timeouts_never_leave_counter_ahead_of_ledger() {
    for backend in Backend::ALL {
        let h = TestHarness::new(backend);

        let attempts = (0..60).map(|i| {
            let service = h.service.clone();
            tokio::spawn(async move {
                let budget = Duration::from_micros(50 * (i % 7));
                tokio::time::timeout(budget, service.generate_next(tenant(1), org(1), 2025, 1))
                    .await
            })
        });
        let finished = join_all(attempts)
            .await
            .into_iter()
            .filter(|r| matches!(r, Ok(Ok(Ok(_)))))
            .count();

        // Waits behind any commit still holding the scope
        let last = h.service.generate_next(tenant(1), org(1), 2025, 1).await.unwrap();
        assert!(last.sequence > u64::try_from(finished).unwrap());

        let page = h
            .service
            .list_history(
                tenant(1),
                HistoryFilter {
                    order: SortOrder::Ascending,
                    limit: 500,
                    ..HistoryFilter::default()
                },
            )
            .await
            .unwrap();

        let mut ledger: Vec<u64> = page.entries.iter().map(|e| e.sequence).collect();
        ledger.sort_unstable();
        assert_eq!(ledger, (1..=last.sequence).collect::<Vec<u64>>(), "{backend:?}");

        let current = h.service.peek_current(tenant(1), org(1), 2025, 1).await.unwrap();
        assert_eq!(current.sequence, last.sequence);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_voids_have_one_winner() {
    for backend in Backend::ALL {
        let h = TestHarness::new(backend);
        let entry = h.service.generate_next(tenant(1), org(1), 2025, 1).await.unwrap();

        let voids = (0..10).map(|i| {
            let service = h.service.clone();
            let number = entry.invoice_number.clone();
            tokio::spawn(async move {
                service
                    .void_number(tenant(1), &number, &format!("attempt {i}"))
                    .await
            })
        });

        let results: Vec<_> = join_all(voids)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        let winners = results.iter().filter(|r| r.is_ok()).count();
        let rejected = results
            .iter()
            .filter(|r| {
                matches!(r, Err(e) if e.kind() == invoice_numbering_service::ErrorKind::InvalidState)
            })
            .count();
        assert_eq!(winners, 1, "{backend:?}");
        assert_eq!(rejected, 9, "{backend:?}");
    }
}

#[tokio::test]
async fn test_exhausted_retry_budget_reports_conflict() {
    // A store whose counter always moves underneath the caller
    use invoice_numbering_core::{
        HistoryPage, NumberFormat, NumberLogEntry, OrganizationId, ScopeKey, SequenceCounter,
        TenantId,
    };
    use invoice_numbering_service::ServiceConfig;
    use invoice_numbering_store::{EntryUpdate, Result as StoreResult, Store, StoreError};
    use std::sync::Arc;

    struct Contended;

    impl Store for Contended {
        fn get_counter(&self, _: &ScopeKey) -> StoreResult<Option<SequenceCounter>> {
            Ok(None)
        }
        fn list_counters(&self, _: TenantId) -> StoreResult<Vec<SequenceCounter>> {
            Ok(Vec::new())
        }
        fn issue_number(&self, c: &SequenceCounter, _: &NumberLogEntry) -> StoreResult<()> {
            Err(StoreError::Conflict {
                entity: "counter",
                id: c.scope.to_string(),
            })
        }
        fn get_log_entry(&self, _: TenantId, _: &str) -> StoreResult<Option<NumberLogEntry>> {
            Ok(None)
        }
        fn update_log_entry(
            &self,
            _: TenantId,
            n: &str,
            _: EntryUpdate<'_>,
        ) -> StoreResult<NumberLogEntry> {
            Err(StoreError::NotFound {
                entity: "invoice number",
                id: n.to_string(),
            })
        }
        fn list_log_entries(&self, _: TenantId, _: &HistoryFilter) -> StoreResult<HistoryPage> {
            Ok(HistoryPage::default())
        }
        fn get_format(
            &self,
            _: TenantId,
            _: OrganizationId,
        ) -> StoreResult<Option<NumberFormat>> {
            Ok(None)
        }
        fn put_format(&self, _: TenantId, _: OrganizationId, _: &NumberFormat) -> StoreResult<()> {
            Ok(())
        }
    }

    let service = InvoiceNumbering::new(Arc::new(Contended), &ServiceConfig::default())
        .unwrap()
        .with_retry_policy(RetryPolicy {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        });

    let err = service
        .generate_next(tenant(1), org(1), 2025, 1)
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert!(matches!(
        err,
        invoice_numbering_service::NumberingError::Conflict { attempts: 4, .. }
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_abandoned_call_still_audits_its_number() {
    // A store whose commits take long enough for the caller to give up
    use invoice_numbering_core::{
        HistoryPage, NumberFormat, NumberLogEntry, OrganizationId, ScopeKey, SequenceCounter,
        TenantId,
    };
    use invoice_numbering_store::{EntryUpdate, MemoryStore, Result as StoreResult, Store};
    use std::sync::Arc;

    struct SlowCommit(MemoryStore);

    impl Store for SlowCommit {
        fn get_counter(&self, scope: &ScopeKey) -> StoreResult<Option<SequenceCounter>> {
            self.0.get_counter(scope)
        }
        fn list_counters(&self, t: TenantId) -> StoreResult<Vec<SequenceCounter>> {
            self.0.list_counters(t)
        }
        fn issue_number(&self, c: &SequenceCounter, e: &NumberLogEntry) -> StoreResult<()> {
            std::thread::sleep(Duration::from_millis(50));
            self.0.issue_number(c, e)
        }
        fn get_log_entry(&self, t: TenantId, n: &str) -> StoreResult<Option<NumberLogEntry>> {
            self.0.get_log_entry(t, n)
        }
        fn update_log_entry(
            &self,
            t: TenantId,
            n: &str,
            update: EntryUpdate<'_>,
        ) -> StoreResult<NumberLogEntry> {
            self.0.update_log_entry(t, n, update)
        }
        fn list_log_entries(&self, t: TenantId, f: &HistoryFilter) -> StoreResult<HistoryPage> {
            self.0.list_log_entries(t, f)
        }
        fn get_format(
            &self,
            t: TenantId,
            o: OrganizationId,
        ) -> StoreResult<Option<NumberFormat>> {
            self.0.get_format(t, o)
        }
        fn put_format(&self, t: TenantId, o: OrganizationId, f: &NumberFormat) -> StoreResult<()> {
            self.0.put_format(t, o, f)
        }
    }

    let audit = Arc::new(common::RecordingSink::default());
    let service = InvoiceNumbering::new(
        Arc::new(SlowCommit(MemoryStore::new())),
        &common::test_config(),
    )
    .unwrap()
    .with_audit_sink(audit.clone());

    let outcome = tokio::time::timeout(
        Duration::from_millis(5),
        service.generate_next(tenant(1), org(1), 2025, 1),
    )
    .await;
    assert!(outcome.is_err(), "the commit should outlast the caller");

    let mut waited = 0;
    while audit.events().is_empty() && waited < 200 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        waited += 1;
    }

    let committed = service.find_number(tenant(1), "INV-2025-0001").await.unwrap();
    assert_eq!(committed.sequence, 1);
    assert_eq!(audit.names(), vec!["number_generated"]);
    assert_eq!(service.active_scopes(), 0);
}

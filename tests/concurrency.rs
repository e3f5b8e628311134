mod common;

use std::time::Duration;

use anyhow::Result;
use tenant_isolation::database::models::Patient;
use tenant_isolation::tenant::{JobRunner, Principal, SessionBoundary, TenantContext, TenantId};
use uuid::Uuid;

use common::Fixture;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn interleaved_units_of_work_never_cross_talk() -> Result<()> {
    let fx = Fixture::seeded(6, 9).await?;
    let tenants = [(fx.acme.id, 6usize), (fx.globex.id, 9usize)];

    let mut handles = Vec::new();
    for round in 0..40 {
        let (tenant_id, expected) = tenants[round % 2];
        let db = fx.db.clone();
        let principal = Principal::tenant_user(Uuid::new_v4(), tenant_id);
        handles.push(SessionBoundary::spawn(principal, async move {
            let rows = db.query::<Patient>()?.select_all().await?;
            tokio::time::sleep(Duration::from_millis((round % 3) as u64)).await;
            let count = db.query::<Patient>()?.limit(100, Some(0))?.count().await?;
            Ok::<_, anyhow::Error>((tenant_id, expected, rows, count, TenantContext::get()))
        }));
    }

    for handle in handles {
        let (tenant_id, expected, rows, count, ambient) = handle.await??;
        assert_eq!(ambient, Some(tenant_id));
        assert_eq!(rows.len(), expected);
        assert_eq!(count, expected as i64);
        assert!(rows.iter().all(|p| p.tenant_id == tenant_id), "cross-tenant rows for {}", tenant_id);
    }
    Ok(())
}

#[tokio::test]
async fn context_is_cleared_between_requests_on_the_same_task() -> Result<()> {
    let fx = Fixture::seeded(1, 1).await?;

    for tenant_id in [fx.acme.id, fx.globex.id, fx.acme.id] {
        let db = fx.db.clone();
        let seen = SessionBoundary::run(&Principal::service(tenant_id), async move {
            db.query::<Patient>()?.select_one().await
        })
        .await?;
        assert_eq!(seen.tenant_id, tenant_id);
        assert_eq!(TenantContext::get(), None);
    }
    Ok(())
}

#[tokio::test]
async fn timed_out_unit_of_work_is_torn_down() -> Result<()> {
    let tenant_id = TenantId::random();
    let result = SessionBoundary::run_with_timeout(
        &Principal::service(tenant_id),
        Duration::from_millis(10),
        tokio::time::sleep(Duration::from_secs(60)),
    )
    .await;

    assert!(result.is_err());
    assert_eq!(TenantContext::get(), None);
    Ok(())
}

#[tokio::test]
async fn per_tenant_job_sees_only_the_tenant_it_runs_for() -> Result<()> {
    let fx = Fixture::seeded(2, 7).await?;
    let db = fx.db.clone();

    let counts = JobRunner::run_per_tenant([fx.acme.id, fx.globex.id, fx.suspended.id], |tenant_id| {
        let db = db.clone();
        async move {
            assert_eq!(TenantContext::get(), Some(tenant_id));
            db.query::<Patient>()?.count().await
        }
    })
    .await;

    let counts = counts.into_iter().collect::<Result<Vec<_>, _>>()?;
    assert_eq!(counts, vec![2, 7, 0]);
    assert_eq!(TenantContext::get(), None);
    Ok(())
}

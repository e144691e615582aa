use crate::janitor::CacheJanitor;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::info;

/// Run cache sweeps on a cron schedule, on top of the startup sweep.
///
/// The expression uses the six-field form with seconds first,
/// e.g. `0 0 3 * * *` for 03:00 UTC every day.
pub async fn start_cleanup_schedule(
    janitor: Arc<CacheJanitor>,
    cron_expr: &str,
) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_async(cron_expr, move |_uuid, _l| {
        let janitor = Arc::clone(&janitor);
        Box::pin(async move {
            info!("⏰ Scheduled cache sweep triggered");
            let report = janitor.sweep().await;
            info!("Scheduled sweep removed {} entries", report.total_removed());
        })
    })
    .context(format!("Invalid CLEANUP_SCHEDULE expression: '{}'", cron_expr))?;

    scheduler.add(job).await?;
    scheduler.start().await?;
    info!("✓ Cleanup scheduled ({})", cron_expr);

    Ok(scheduler)
}

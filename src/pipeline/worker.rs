use crate::fetch::{Fetcher, SessionSlot};
use crate::pipeline::{PageLoader, PageTask, PipelineStats, StageHandler, StageKind, WorkQueue};
use crate::NestError;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Everything one worker needs
pub struct WorkerContext {
    pub id: usize,
    pub queue: WorkQueue<PageTask>,
    pub handler: Arc<dyn StageHandler>,
    pub loader: PageLoader,
    pub fetcher: Arc<dyn Fetcher>,
    pub stop: CancellationToken,
    pub stats: Arc<PipelineStats>,
}

/// What a worker did before it exited cleanly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerReport {
    pub stage: StageKind,
    pub worker: usize,
    pub processed: u64,
}

/// Serves a stage queue until it is closed or `stop` is cancelled
///
/// Cancellation is checked between tasks, so a claimed task is always
/// finished. The worker's fetch session is released on every exit path.
///
/// # Errors
///
/// Returns the first fatal error raised while loading or handling a task.
pub async fn run_worker(ctx: WorkerContext) -> Result<WorkerReport, NestError> {
    let span = tracing::info_span!("worker", stage = %ctx.handler.kind(), worker = ctx.id);

    async move {
        let mut session = SessionSlot::new(Arc::clone(&ctx.fetcher));
        let result = work(&ctx, &mut session).await;
        session.release().await;

        match &result {
            Ok(report) => tracing::debug!("Worker finished after {} tasks", report.processed),
            Err(e) => tracing::error!("Worker failed: {}", e),
        }
        result
    }
    .instrument(span)
    .await
}

async fn work(ctx: &WorkerContext, session: &mut SessionSlot) -> Result<WorkerReport, NestError> {
    let stage = ctx.handler.kind();
    let mut report = WorkerReport {
        stage,
        worker: ctx.id,
        processed: 0,
    };

    loop {
        let claimed = tokio::select! {
            biased;
            _ = ctx.stop.cancelled() => break,
            claimed = ctx.queue.pop() => match claimed {
                Some(claimed) => claimed,
                None => break,
            },
        };

        let (task, ack) = claimed.into_parts();
        tracing::debug!("Processing '{}' at {}", task.name, task.url);

        let page = ctx.loader.load(session, &task.url, &task.name).await?;
        let produced = ctx.handler.handle(task, page).await?;

        ctx.stats.record_processed(stage, produced);
        report.processed += 1;
        drop(ack);
    }

    Ok(report)
}

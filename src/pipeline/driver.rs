//! Pipeline driver: seeding, draining and finalizing a run

use crate::cache::PageCache;
use crate::config::{Config, SelectorConfig};
use crate::document::{Document, DocumentError, Link, Locator};
use crate::fetch::{Fetcher, SessionSlot};
use crate::output::{RunSummary, Sink};
use crate::pipeline::{
    run_worker, ExpandStage, LeafStage, Metadata, PageLoader, PageTask, PipelineStats, Pushed,
    StageHandler, StageKind, StopReason, WorkQueue, WorkerContext, WorkerReport,
};
use crate::NestError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Cache label of the index page
const INDEX_LABEL: &str = "index";

type WorkerOutcome = Result<WorkerReport, NestError>;

/// Compiled locators for every page type
#[derive(Debug, Clone)]
struct Locators {
    regions: Locator,
    areas: Locator,
    neighborhoods: Locator,
    residents: Locator,
    homeowners: Locator,
}

impl Locators {
    fn from_config(selectors: &SelectorConfig) -> Result<Self, DocumentError> {
        Ok(Self {
            regions: Locator::links(&selectors.region_links)?,
            areas: Locator::links(&selectors.area_links)?,
            neighborhoods: Locator::section(
                &selectors.section_heading,
                &selectors.section_heading_text,
                &selectors.section_block,
                &selectors.section_links,
            )?,
            residents: Locator::labelled(&selectors.detail_label, &selectors.residents_label)?,
            homeowners: Locator::labelled(&selectors.detail_label, &selectors.homeowners_label)?,
        })
    }
}

/// The queues of one run, upstream first
struct Queues {
    region: WorkQueue<PageTask>,
    area: WorkQueue<PageTask>,
    leaf: WorkQueue<PageTask>,
}

impl Queues {
    fn new(config: &Config) -> Self {
        let policy = config.crawler.queue;
        Self {
            region: WorkQueue::new("region", policy),
            area: WorkQueue::new("area", policy),
            leaf: WorkQueue::new("leaf", policy),
        }
    }

    /// Resolves once every queue has drained
    ///
    /// Stages push their outputs before acknowledging their input, so once
    /// an upstream queue is drained nothing more can reach the next one.
    async fn drained(&self) {
        self.region.join().await;
        self.area.join().await;
        self.leaf.join().await;
    }

    fn close(&self) {
        let discarded = self.region.close() + self.area.close() + self.leaf.close();
        if discarded > 0 {
            tracing::info!("Discarded {} unclaimed tasks", discarded);
        }
    }
}

/// Worker tasks of a run, with the stage and index of each
#[derive(Default)]
struct WorkerPool {
    tasks: JoinSet<WorkerOutcome>,
    origins: HashMap<tokio::task::Id, (StageKind, usize)>,
}

impl WorkerPool {
    fn spawn(&mut self, ctx: WorkerContext) {
        let origin = (ctx.handler.kind(), ctx.id);
        let handle = self.tasks.spawn(run_worker(ctx));
        self.origins.insert(handle.id(), origin);
    }

    /// Records a finished worker, turning failures and panics into errors
    fn settle(&mut self, joined: Result<WorkerOutcome, JoinError>) -> Result<(), NestError> {
        match joined {
            Ok(Ok(report)) => {
                tracing::debug!(
                    "{} worker {} exited after {} tasks",
                    report.stage,
                    report.worker,
                    report.processed
                );
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(e) => {
                let origin = self.origins.get(&e.id()).copied();
                if e.is_panic() {
                    let payload = e.into_panic();
                    let message = payload
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    match origin {
                        Some((stage, worker)) => Err(NestError::WorkerPanicked {
                            stage,
                            worker,
                            message,
                        }),
                        None => Err(NestError::WorkerJoin(message)),
                    }
                } else {
                    Err(NestError::WorkerJoin(e.to_string()))
                }
            }
        }
    }

    /// Waits for every worker, keeping the first failure
    async fn shutdown(&mut self) -> Result<(), NestError> {
        let mut first_error = None;
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = self.settle(joined) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Runs the three-stage crawl
///
/// # Example
///
/// ```no_run
/// use nestcrawl::{Config, HttpFetcher, PageCache, Pipeline};
/// use std::sync::Arc;
///
/// # async fn run() -> nestcrawl::Result<()> {
/// let config = Config::default();
/// let cache = PageCache::open("/tmp/nestcrawl")?;
/// let fetcher = Arc::new(HttpFetcher::new(config.fetch.clone()));
/// let summary = Pipeline::new(config, fetcher, cache)?.run().await?;
/// println!("{} records", summary.records_written);
/// # Ok(())
/// # }
/// ```
pub struct Pipeline {
    config: Config,
    fetcher: Arc<dyn Fetcher>,
    cache: PageCache,
    locators: Locators,
}

impl Pipeline {
    /// Creates a pipeline from a validated configuration
    ///
    /// # Errors
    ///
    /// Fails if a configured selector does not compile.
    pub fn new(config: Config, fetcher: Arc<dyn Fetcher>, cache: PageCache) -> Result<Self, NestError> {
        let locators = Locators::from_config(&config.selectors)?;
        Ok(Self {
            config,
            fetcher,
            cache,
            locators,
        })
    }

    /// Runs the crawl to completion and writes the output file
    ///
    /// # Errors
    ///
    /// Returns the first fatal error raised by seeding or by any worker.
    /// Every worker is stopped and every session released before returning,
    /// and no output file is written.
    pub async fn run(&self) -> Result<RunSummary, NestError> {
        let started_at = chrono::Utc::now();
        let crawler = &self.config.crawler;
        let stats = Arc::new(PipelineStats::default());
        let timeout = self.config.fetch.timeout_ms.map(Duration::from_millis);
        let loader = PageLoader::new(self.cache.clone(), timeout, Arc::clone(&stats));
        let sink = Sink::new(crawler.stop.record_limit());

        let queues = Queues::new(&self.config);
        let shutdown = CancellationToken::new();
        let leaf_stop = shutdown.child_token();

        let handlers: [(Arc<dyn StageHandler>, &WorkQueue<PageTask>, usize, &CancellationToken); 3] = [
            (
                Arc::new(ExpandStage::regions(
                    self.locators.areas.clone(),
                    queues.area.clone(),
                    Arc::clone(&stats),
                )),
                &queues.region,
                crawler.region_workers,
                &shutdown,
            ),
            (
                Arc::new(ExpandStage::areas(
                    self.locators.neighborhoods.clone(),
                    queues.leaf.clone(),
                    Arc::clone(&stats),
                )),
                &queues.area,
                crawler.area_workers,
                &shutdown,
            ),
            (
                Arc::new(LeafStage::new(
                    self.locators.residents.clone(),
                    self.locators.homeowners.clone(),
                    sink.clone(),
                    leaf_stop.clone(),
                )),
                &queues.leaf,
                crawler.leaf_workers,
                &leaf_stop,
            ),
        ];

        let mut pool = WorkerPool::default();
        for (handler, queue, workers, stop) in handlers {
            for id in 0..workers {
                pool.spawn(WorkerContext {
                    id,
                    queue: queue.clone(),
                    handler: Arc::clone(&handler),
                    loader: loader.clone(),
                    fetcher: Arc::clone(&self.fetcher),
                    stop: stop.clone(),
                    stats: Arc::clone(&stats),
                });
            }
        }
        tracing::info!(
            "Started {} region, {} area and {} leaf workers",
            crawler.region_workers,
            crawler.area_workers,
            crawler.leaf_workers
        );

        let outcome = self
            .seed_and_drain(&loader, &queues, &mut pool, &leaf_stop, &stats)
            .await;

        // Finalize: stop every pool, wake anything blocked, and wait
        shutdown.cancel();
        queues.close();
        let teardown = pool.shutdown().await;

        let (regions_seeded, stop_reason) = outcome?;
        teardown?;

        let records_written = sink.flush(&self.config.output.path)?;
        let summary = RunSummary {
            started_at,
            finished_at: chrono::Utc::now(),
            stop_reason,
            regions_seeded,
            stats: stats.snapshot(),
            records_written,
            output_path: self.config.output.path.clone(),
        };

        tracing::info!(
            "Crawl finished ({}): {} records, {} fetches, {} cache hits",
            summary.stop_reason,
            summary.records_written,
            summary.stats.fetches,
            summary.stats.cache_hits
        );
        Ok(summary)
    }

    async fn seed_and_drain(
        &self,
        loader: &PageLoader,
        queues: &Queues,
        pool: &mut WorkerPool,
        leaf_stop: &CancellationToken,
        stats: &PipelineStats,
    ) -> Result<(usize, StopReason), NestError> {
        // Not raced: the index session must be released whatever happens
        let regions = self.load_index(loader, stats).await?;

        let deadline = self.config.crawler.stop.deadline();
        let expired = async move {
            match deadline {
                Some(deadline) => tokio::time::sleep(deadline).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(expired);

        // Pushing regions can block on a bounded queue, so it races the
        // stop conditions like everything else
        let seeded = AtomicUsize::new(0);
        let seed = Self::seed(regions, &queues.region, stats, &seeded);
        let drained = queues.drained();
        tokio::pin!(seed, drained);
        let mut seeding = true;

        let reason = loop {
            tokio::select! {
                biased;
                Some(joined) = pool.tasks.join_next() => pool.settle(joined)?,
                _ = leaf_stop.cancelled() => break StopReason::LimitReached,
                _ = &mut expired => break StopReason::DeadlineReached,
                _ = &mut seed, if seeding => {
                    seeding = false;
                    tracing::info!("Seeded {} regions", seeded.load(Ordering::Relaxed));
                }
                _ = &mut drained, if !seeding => break StopReason::Drained,
            }
        };
        tracing::info!("Stopping: {}", reason);

        Ok((seeded.load(Ordering::Relaxed), reason))
    }

    /// Loads the index page with a scoped session and returns its region links
    async fn load_index(&self, loader: &PageLoader, stats: &PipelineStats) -> Result<Vec<Link>, NestError> {
        let index_url = Url::parse(&self.config.crawler.index_url)?;
        tracing::info!("Seeding from {}", index_url);

        let mut session = SessionSlot::new(Arc::clone(&self.fetcher));
        let page = loader.load(&mut session, &index_url, INDEX_LABEL).await;
        session.release().await;

        let Some(page) = page? else {
            tracing::warn!("Index page {} is unavailable, nothing to crawl", index_url);
            return Ok(Vec::new());
        };

        let found = Document::parse(&page, &index_url).links(&self.locators.regions);
        if found.malformed > 0 {
            stats.record_malformed_links(found.malformed);
        }
        Ok(found.links)
    }

    /// Queues one region task per link, counting each into `seeded`
    async fn seed(regions: Vec<Link>, queue: &WorkQueue<PageTask>, stats: &PipelineStats, seeded: &AtomicUsize) {
        for link in regions {
            match queue
                .push(PageTask::new(link.text, link.href, Metadata::new()))
                .await
            {
                Ok(Pushed::Queued) => {
                    seeded.fetch_add(1, Ordering::Relaxed);
                }
                Ok(Pushed::Dropped) => stats.record_dropped_task(),
                Err(_) => break,
            }
        }
    }
}

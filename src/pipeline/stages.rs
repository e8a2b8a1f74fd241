//! Per-stage page handling

use crate::document::{Document, Locator};
use crate::output::{Admission, LeafRecord, Sink, NOT_AVAILABLE};
use crate::pipeline::{PageTask, PipelineStats, Pushed, StageKind, WorkQueue, CITY, STATE};
use crate::NestError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Logic a stage applies to each loaded page
#[async_trait]
pub trait StageHandler: Send + Sync {
    fn kind(&self) -> StageKind;

    /// Handles one task whose page is `page`, or `None` if the page could
    /// not be loaded
    ///
    /// Returns how many outputs were emitted downstream.
    async fn handle(&self, task: PageTask, page: Option<String>) -> Result<usize, NestError>;
}

/// Turns each link on a page into a task for the next stage
///
/// Children inherit the parent's metadata extended with
/// `label = parent task name`.
pub struct ExpandStage {
    kind: StageKind,
    label: &'static str,
    locator: Locator,
    downstream: WorkQueue<PageTask>,
    stats: Arc<PipelineStats>,
}

impl ExpandStage {
    pub fn new(
        kind: StageKind,
        label: &'static str,
        locator: Locator,
        downstream: WorkQueue<PageTask>,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            kind,
            label,
            locator,
            downstream,
            stats,
        }
    }

    /// Region pages: children are tagged with the region as `state`
    pub fn regions(locator: Locator, downstream: WorkQueue<PageTask>, stats: Arc<PipelineStats>) -> Self {
        Self::new(StageKind::Region, STATE, locator, downstream, stats)
    }

    /// Area pages: children are tagged with the area as `city`
    pub fn areas(locator: Locator, downstream: WorkQueue<PageTask>, stats: Arc<PipelineStats>) -> Self {
        Self::new(StageKind::Area, CITY, locator, downstream, stats)
    }
}

#[async_trait]
impl StageHandler for ExpandStage {
    fn kind(&self) -> StageKind {
        self.kind
    }

    async fn handle(&self, task: PageTask, page: Option<String>) -> Result<usize, NestError> {
        let Some(page) = page else {
            tracing::debug!("No page for {} '{}', nothing to expand", self.kind, task.name);
            return Ok(0);
        };

        // The parsed document must not live across an await
        let found = Document::parse(&page, &task.url).links(&self.locator);
        if found.malformed > 0 {
            self.stats.record_malformed_links(found.malformed);
        }

        let meta = task.meta.with(self.label, task.name.as_str());
        let mut produced = 0;

        for link in found.links {
            match self
                .downstream
                .push(PageTask::new(link.text, link.href, meta.clone()))
                .await
            {
                Ok(Pushed::Queued) => produced += 1,
                Ok(Pushed::Dropped) => self.stats.record_dropped_task(),
                Err(_) => {
                    tracing::debug!(
                        "{} queue closed while expanding '{}'",
                        self.downstream.name(),
                        task.name
                    );
                    break;
                }
            }
        }

        tracing::debug!("{} '{}' produced {} tasks", self.kind, task.name, produced);
        Ok(produced)
    }
}

/// Flattens a leaf page into a [`LeafRecord`]
///
/// Cancels `stop` once the sink reaches its record limit.
pub struct LeafStage {
    residents: Locator,
    homeowners: Locator,
    sink: Sink,
    stop: CancellationToken,
}

impl LeafStage {
    pub fn new(residents: Locator, homeowners: Locator, sink: Sink, stop: CancellationToken) -> Self {
        Self {
            residents,
            homeowners,
            sink,
            stop,
        }
    }

    fn record(&self, task: &PageTask, page: Option<&str>) -> LeafRecord {
        // Details come as a pair: if either is missing, neither is trusted
        let details = page.and_then(|page| {
            let doc = Document::parse(page, &task.url);
            Some((doc.text(&self.residents)?, doc.text(&self.homeowners)?))
        });
        let (residents, homeowners) = details.unwrap_or_else(|| {
            (NOT_AVAILABLE.to_string(), NOT_AVAILABLE.to_string())
        });

        let label = |name: &str| task.meta.get(name).unwrap_or(NOT_AVAILABLE).to_string();

        LeafRecord {
            state: label(STATE),
            city: label(CITY),
            neighborhood: task.name.clone(),
            residents,
            homeowners,
            url: task.url.to_string(),
        }
    }
}

#[async_trait]
impl StageHandler for LeafStage {
    fn kind(&self) -> StageKind {
        StageKind::Leaf
    }

    async fn handle(&self, task: PageTask, page: Option<String>) -> Result<usize, NestError> {
        let record = self.record(&task, page.as_deref());
        if record.is_unavailable() {
            tracing::warn!("No details found for '{}' at {}", task.name, task.url);
        }

        match self.sink.accept(record) {
            Admission::Accepted {
                total,
                limit_reached,
            } => {
                tracing::debug!("Recorded '{}' ({} total)", task.name, total);
                if limit_reached {
                    tracing::info!("Record limit of {} reached", total);
                    self.stop.cancel();
                }
                Ok(1)
            }
            Admission::Rejected => {
                self.stop.cancel();
                Ok(0)
            }
        }
    }
}

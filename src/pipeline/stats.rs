//! Run-wide counters shared by every worker

use crate::pipeline::StageKind;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one stage
#[derive(Debug, Default)]
struct StageCounters {
    processed: AtomicU64,
    produced: AtomicU64,
}

/// Counters updated concurrently by workers
#[derive(Debug, Default)]
pub struct PipelineStats {
    region: StageCounters,
    area: StageCounters,
    leaf: StageCounters,
    cache_hits: AtomicU64,
    fetches: AtomicU64,
    transient_failures: AtomicU64,
    malformed_links: AtomicU64,
    dropped_tasks: AtomicU64,
}

impl PipelineStats {
    fn stage(&self, stage: StageKind) -> &StageCounters {
        match stage {
            StageKind::Region => &self.region,
            StageKind::Area => &self.area,
            StageKind::Leaf => &self.leaf,
        }
    }

    /// Records one task finished by `stage` and how many outputs it produced
    pub fn record_processed(&self, stage: StageKind, produced: usize) {
        let counters = self.stage(stage);
        counters.processed.fetch_add(1, Ordering::Relaxed);
        counters
            .produced
            .fetch_add(produced as u64, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch(&self) {
        self.fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transient_failure(&self) {
        self.transient_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed_links(&self, count: usize) {
        self.malformed_links
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_dropped_task(&self) {
        self.dropped_tasks.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> StatsSnapshot {
        let stage = |stage: StageKind| {
            let counters = self.stage(stage);
            StageSnapshot {
                processed: counters.processed.load(Ordering::Relaxed),
                produced: counters.produced.load(Ordering::Relaxed),
            }
        };

        StatsSnapshot {
            region: stage(StageKind::Region),
            area: stage(StageKind::Area),
            leaf: stage(StageKind::Leaf),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            transient_failures: self.transient_failures.load(Ordering::Relaxed),
            malformed_links: self.malformed_links.load(Ordering::Relaxed),
            dropped_tasks: self.dropped_tasks.load(Ordering::Relaxed),
        }
    }
}

/// Counters of one stage at a point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageSnapshot {
    /// Tasks claimed and finished
    pub processed: u64,

    /// Tasks or records emitted downstream
    pub produced: u64,
}

/// Frozen copy of [`PipelineStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub region: StageSnapshot,
    pub area: StageSnapshot,
    pub leaf: StageSnapshot,

    /// Pages served from the on-disk cache
    pub cache_hits: u64,

    /// Pages loaded through a fetch session
    pub fetches: u64,

    /// Pages that timed out or were gone
    pub transient_failures: u64,

    /// Anchors skipped for a missing or unparsable href
    pub malformed_links: u64,

    /// Tasks discarded by a full drop-newest queue
    pub dropped_tasks: u64,
}

impl StatsSnapshot {
    pub fn stage(&self, stage: StageKind) -> StageSnapshot {
        match stage {
            StageKind::Region => self.region,
            StageKind::Area => self.area,
            StageKind::Leaf => self.leaf,
        }
    }
}

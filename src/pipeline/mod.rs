//! Three-stage crawl pipeline
//!
//! Tasks flow Region -> Area -> Leaf through one [`WorkQueue`] per stage.
//! Each stage is served by a pool of workers that load pages through the
//! cache, run the stage logic, and push results downstream. The
//! [`Pipeline`] driver seeds the Region queue from the index page, waits for
//! the queues to drain or the stop policy to fire, then tears everything
//! down and writes the collected records.

mod driver;
mod loader;
mod policy;
mod queue;
mod stages;
mod stats;
mod task;
mod worker;

pub use driver::Pipeline;
pub use loader::PageLoader;
pub use policy::{QueuePolicy, StopPolicy, StopReason};
pub use queue::{Ack, Claimed, Pushed, QueueClosed, WorkQueue};
pub use stages::{ExpandStage, LeafStage, StageHandler};
pub use stats::{PipelineStats, StageSnapshot, StatsSnapshot};
pub use task::{Metadata, PageTask, CITY, STATE};
pub use worker::{run_worker, WorkerContext, WorkerReport};

use std::fmt;

/// The level of the hierarchy a stage handles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Region,
    Area,
    Leaf,
}

impl StageKind {
    pub const ALL: [StageKind; 3] = [StageKind::Region, StageKind::Area, StageKind::Leaf];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Region => "region",
            StageKind::Area => "area",
            StageKind::Leaf => "leaf",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

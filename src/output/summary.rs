//! Run summary reporting

use crate::pipeline::{StageKind, StatsSnapshot, StopReason};
use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// Outcome of a completed run
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// When the run started seeding
    pub started_at: DateTime<Utc>,

    /// When the output file was written
    pub finished_at: DateTime<Utc>,

    /// What ended the draining phase
    pub stop_reason: StopReason,

    /// Region tasks pushed from the index page
    pub regions_seeded: usize,

    /// Counters at the end of the run
    pub stats: StatsSnapshot,

    /// Rows written to the output file
    pub records_written: usize,

    pub output_path: PathBuf,
}

impl RunSummary {
    /// Wall-clock duration of the run in seconds
    pub fn duration_seconds(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

/// Prints the summary to stdout
pub fn print_summary(summary: &RunSummary) {
    println!("=== Crawl Summary ===\n");

    println!("Run:");
    println!("  Started: {}", summary.started_at.to_rfc3339());
    println!("  Finished: {}", summary.finished_at.to_rfc3339());
    println!("  Duration: {:.1}s", summary.duration_seconds());
    println!("  Stopped because: {}", summary.stop_reason);
    println!();

    println!("Stages:");
    println!("  Regions seeded: {}", summary.regions_seeded);
    for kind in StageKind::ALL {
        let stage = summary.stats.stage(kind);
        println!(
            "  {}: {} processed, {} produced",
            kind, stage.processed, stage.produced
        );
    }
    println!();

    let stats = &summary.stats;
    let loaded = stats.cache_hits + stats.fetches;
    let hit_rate = if loaded > 0 {
        (stats.cache_hits as f64 / loaded as f64) * 100.0
    } else {
        0.0
    };

    println!("Pages:");
    println!("  Network fetches: {}", stats.fetches);
    println!("  Cache hits: {} ({:.1}%)", stats.cache_hits, hit_rate);
    println!("  Not found or timed out: {}", stats.transient_failures);
    println!();

    if stats.malformed_links > 0 || stats.dropped_tasks > 0 {
        println!("Skipped:");
        println!("  Malformed links: {}", stats.malformed_links);
        println!("  Dropped tasks: {}", stats.dropped_tasks);
        println!();
    }

    println!(
        "Wrote {} records to {}",
        summary.records_written,
        summary.output_path.display()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_duration_seconds() {
        let started_at = Utc::now();
        let summary = RunSummary {
            started_at,
            finished_at: started_at + Duration::milliseconds(2500),
            stop_reason: StopReason::Drained,
            regions_seeded: 3,
            stats: StatsSnapshot::default(),
            records_written: 0,
            output_path: PathBuf::from("data.csv"),
        };

        assert!((summary.duration_seconds() - 2.5).abs() < f64::EPSILON);
    }
}

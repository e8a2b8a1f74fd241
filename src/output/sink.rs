use crate::output::{write_csv, LeafRecord, OutputResult};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Result of offering a record to the [`Sink`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The record was kept
    Accepted {
        /// Records held after this one
        total: usize,

        /// True if this record filled the sink to its limit
        limit_reached: bool,
    },

    /// The sink was already full and the record was discarded
    Rejected,
}

/// Collects leaf records until the run finalizes
///
/// Cloning shares the underlying buffer. With a limit set the sink never
/// holds more than `limit` records, however many workers offer them.
#[derive(Debug, Clone)]
pub struct Sink {
    records: Arc<Mutex<Vec<LeafRecord>>>,
    limit: Option<usize>,
}

impl Sink {
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
            limit,
        }
    }

    /// Offers a record
    pub fn accept(&self, record: LeafRecord) -> Admission {
        let mut records = self.lock();

        if let Some(limit) = self.limit {
            if records.len() >= limit {
                return Admission::Rejected;
            }
        }

        records.push(record);
        let total = records.len();
        Admission::Accepted {
            total,
            limit_reached: self.limit.is_some_and(|limit| total >= limit),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the records collected so far, in acceptance order
    pub fn records(&self) -> Vec<LeafRecord> {
        self.lock().clone()
    }

    /// Writes every collected record to `path` as CSV
    ///
    /// Returns the number of records written.
    pub fn flush(&self, path: &Path) -> OutputResult<usize> {
        let records = self.lock();
        write_csv(path, &records)?;
        tracing::info!("Wrote {} records to {}", records.len(), path.display());
        Ok(records.len())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LeafRecord>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::NOT_AVAILABLE;

    fn record(name: &str) -> LeafRecord {
        LeafRecord {
            state: "California".to_string(),
            city: "Oakland".to_string(),
            neighborhood: name.to_string(),
            residents: NOT_AVAILABLE.to_string(),
            homeowners: NOT_AVAILABLE.to_string(),
            url: format!("https://example.com/n/{}", name.to_lowercase()),
        }
    }

    #[test]
    fn test_limit_enforced() {
        let sink = Sink::new(Some(2));

        assert_eq!(
            sink.accept(record("Rockridge")),
            Admission::Accepted {
                total: 1,
                limit_reached: false
            }
        );
        assert_eq!(
            sink.accept(record("Temescal")),
            Admission::Accepted {
                total: 2,
                limit_reached: true
            }
        );
        assert_eq!(sink.accept(record("Fruitvale")), Admission::Rejected);
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn test_unlimited_sink() {
        let sink = Sink::new(None);
        for i in 0..50 {
            assert!(matches!(
                sink.accept(record(&format!("N{}", i))),
                Admission::Accepted {
                    limit_reached: false,
                    ..
                }
            ));
        }
        assert_eq!(sink.len(), 50);
    }

    #[test]
    fn test_clones_share_records() {
        let sink = Sink::new(Some(10));
        let other = sink.clone();
        let _ = other.accept(record("Rockridge"));

        assert_eq!(sink.records()[0].neighborhood, "Rockridge");
    }

    #[test]
    fn test_concurrent_accept_respects_limit() {
        let sink = Sink::new(Some(25));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let sink = sink.clone();
                std::thread::spawn(move || {
                    let mut limit_hits = 0;
                    for i in 0..10 {
                        if let Admission::Accepted {
                            limit_reached: true,
                            ..
                        } = sink.accept(record(&format!("T{}N{}", t, i)))
                        {
                            limit_hits += 1;
                        }
                    }
                    limit_hits
                })
            })
            .collect();

        let limit_hits: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(sink.len(), 25);
        assert_eq!(limit_hits, 1);
    }

    #[test]
    fn test_flush_writes_csv() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("data.csv");
        let sink = Sink::new(None);
        let _ = sink.accept(record("Rockridge"));

        assert_eq!(sink.flush(&path).unwrap(), 1);
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("state,city,neighborhood,residents,homeowners,url\n"));
        assert!(written.contains("California,Oakland,Rockridge,N/A,N/A,"));
    }
}

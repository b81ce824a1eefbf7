//! In-memory scan
//!
//! Holds samples ordered by `(timestamp, series_id)` and replays them in
//! either direction within inclusive time bounds. `run` is the scan loop
//! that drives a [`QueryProcessor`]: match, put, then complete.

use crate::index::IdTable;
use crate::query::QueryProcessor;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{Direction, Sample, TimeBounds};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Counters reported by a completed scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Samples inside the bounds
    pub scanned: u64,
    /// Samples that entered the pipeline
    pub matched: u64,
}

/// Sorted sample store standing in for the storage cursor
#[derive(Debug, Clone, Default)]
pub struct MemoryScan {
    samples: Vec<Sample>,
}

impl MemoryScan {
    /// Create a scan over `samples`, in any order
    pub fn new(mut samples: Vec<Sample>) -> Self {
        samples.sort_by_key(Sample::sort_key);
        Self { samples }
    }

    /// Load `timestamp,series,value` rows, interning series names into `ids`.
    ///
    /// Columns are located by header name, so their order is free.
    pub fn from_csv<R: Read>(reader: R, ids: &mut IdTable) -> StorageResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        let column = |name: &str| -> StorageResult<usize> {
            headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name))
                .ok_or_else(|| StorageError::InvalidSample {
                    line: 1,
                    reason: format!("missing '{}' column", name),
                })
        };
        let ts_col = column("timestamp")?;
        let series_col = column("series")?;
        let value_col = column("value")?;

        let mut samples = Vec::new();
        for result in reader.records() {
            let record = result?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);

            let ts_str = field(&record, ts_col, line, "timestamp")?;
            let timestamp = ts_str.parse::<u64>().map_err(|_| StorageError::InvalidSample {
                line,
                reason: format!("invalid timestamp '{}'", ts_str),
            })?;

            let value_str = field(&record, value_col, line, "value")?;
            let value = value_str.parse::<f64>().map_err(|_| StorageError::InvalidSample {
                line,
                reason: format!("invalid value '{}'", value_str),
            })?;

            let series_id = ids.intern(field(&record, series_col, line, "series")?);
            samples.push(Sample::new(timestamp, series_id, value));
        }

        debug!("loaded {} samples, {} series", samples.len(), ids.len());
        Ok(Self::new(samples))
    }

    /// Load a CSV file; see [`from_csv`](Self::from_csv)
    pub fn from_path(path: &Path, ids: &mut IdTable) -> StorageResult<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_csv(file, ids)
    }

    /// Samples within `bounds`, ascending for forward scans and
    /// descending for backward ones
    pub fn scan(
        &self,
        bounds: TimeBounds,
        direction: Direction,
    ) -> Box<dyn Iterator<Item = Sample> + '_> {
        let start = self.samples.partition_point(|s| s.timestamp < bounds.lower);
        let stop = self.samples.partition_point(|s| s.timestamp <= bounds.upper);
        let window = &self.samples[start..stop.max(start)];

        match direction {
            Direction::Forward => Box::new(window.iter().copied()),
            Direction::Backward => Box::new(window.iter().rev().copied()),
        }
    }

    /// Drive `processor` over its bounds and direction, then complete it
    pub fn run(&self, processor: &mut QueryProcessor) -> ScanStats {
        let mut stats = ScanStats::default();
        for sample in self.scan(processor.bounds(), processor.direction()) {
            stats.scanned += 1;
            if processor.process(sample) {
                stats.matched += 1;
            }
        }
        processor.complete();

        info!(
            "scan complete: {} scanned, {} matched ({})",
            stats.scanned,
            stats.matched,
            processor.direction()
        );
        stats
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

fn field<'r>(
    record: &'r csv::StringRecord,
    idx: usize,
    line: u64,
    what: &str,
) -> StorageResult<&'r str> {
    record
        .get(idx)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| StorageError::InvalidSample {
            line,
            reason: format!("missing {}", what),
        })
}

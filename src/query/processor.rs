//! Query Processor
//!
//! Owns one pipeline for the lifetime of one query, together with the
//! query's time bounds, scan direction and the series of interest. The
//! scan loop asks [`QueryProcessor::match_id`] before pushing a sample so
//! that irrelevant series never enter the pipeline:
//!
//! ```text
//! for sample in scan(lowerbound, upperbound, direction):
//!     if processor.match_id(sample.series_id).is_some():
//!         processor.put(sample)
//! processor.complete()
//! ```
//!
//! Bounds are the scan's business; the processor does not re-check them.

use crate::index::IdLookup;
use crate::query::error::QueryResult;
use crate::query::node::NodeRef;
use crate::storage::{Direction, Sample, TimeBounds};
use std::collections::HashMap;

/// Per-query pipeline owner
pub struct QueryProcessor {
    lowerbound: u64,
    upperbound: u64,
    direction: Direction,
    /// Metrics of interest, in group order
    metrics: Vec<String>,
    /// Series id → group
    names_of_interest: HashMap<u64, usize>,
    /// Root of the processing topology
    root: NodeRef,
    completed: bool,
}

impl QueryProcessor {
    /// Create a new query processor.
    ///
    /// `begin`/`end` may be given in either order: `begin > end` means a
    /// backward scan. Every metric name must be known to `ids`.
    pub fn new(
        root: NodeRef,
        metrics: Vec<String>,
        begin: u64,
        end: u64,
        ids: &dyn IdLookup,
    ) -> QueryResult<Self> {
        let names_of_interest = ids.match_table(&metrics)?;
        let bounds = TimeBounds::from_range(begin, end);

        tracing::debug!(
            "query processor: {} metrics, [{}, {}] {}",
            metrics.len(),
            bounds.lower,
            bounds.upper,
            Direction::from_range(begin, end)
        );

        Ok(Self {
            lowerbound: bounds.lower,
            upperbound: bounds.upper,
            direction: Direction::from_range(begin, end),
            metrics,
            names_of_interest,
            root,
            completed: false,
        })
    }

    /// Group of a series id, or `None` when the series is not of interest
    pub fn match_id(&self, series_id: u64) -> Option<usize> {
        self.names_of_interest.get(&series_id).copied()
    }

    /// Push a sample into the pipeline root
    pub fn put(&mut self, sample: Sample) {
        if self.completed {
            tracing::warn!("query processor: put after complete, ignored");
            return;
        }
        self.root.borrow_mut().put(sample);
    }

    /// Signal end of scan; honored once
    pub fn complete(&mut self) {
        if self.completed {
            tracing::warn!("query processor: complete called twice, ignored");
            return;
        }
        self.completed = true;
        self.root.borrow_mut().complete();
    }

    /// Match, then put when the sample is of interest.
    ///
    /// Returns whether the sample entered the pipeline.
    pub fn process(&mut self, sample: Sample) -> bool {
        if self.match_id(sample.series_id).is_none() {
            return false;
        }
        self.put(sample);
        true
    }

    pub fn lowerbound(&self) -> u64 {
        self.lowerbound
    }

    pub fn upperbound(&self) -> u64 {
        self.upperbound
    }

    /// Bounds to hand to the scan
    pub fn bounds(&self) -> TimeBounds {
        TimeBounds {
            lower: self.lowerbound,
            upper: self.upperbound,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn metrics(&self) -> &[String] {
        &self.metrics
    }

    /// Root of the processing topology
    pub fn root(&self) -> &NodeRef {
        &self.root
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }
}

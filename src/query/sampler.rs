//! Random Sampler
//!
//! Reservoir sampling ("Algorithm R"): keeps a uniform random subset of
//! at most `capacity` samples from a stream of unknown length. Nothing
//! is forwarded until `complete`, when the reservoir is emitted ordered
//! by `(timestamp, series_id)`.

use crate::logging::Logger;
use crate::query::node::{after_complete, Node, NodeRef, NodeType};
use crate::storage::Sample;
use rand::rngs::StdRng;
use rand::Rng;

/// Reservoir sampling stage
pub struct RandomSampler<R: Rng = StdRng> {
    /// Maximum number of samples kept
    capacity: usize,
    /// Number of samples seen so far
    seen: u64,
    reservoir: Vec<Sample>,
    rng: R,
    next: NodeRef,
    logger: Logger,
    completed: bool,
}

impl<R: Rng> RandomSampler<R> {
    /// Create a sampler. `capacity` must be positive; the node builder
    /// validates it.
    pub(crate) fn new(capacity: usize, rng: R, next: NodeRef, logger: Logger) -> Self {
        Self {
            capacity,
            seen: 0,
            reservoir: Vec::with_capacity(capacity.min(4096)),
            rng,
            next,
            logger,
            completed: false,
        }
    }
}

impl<R: Rng> Node for RandomSampler<R> {
    fn put(&mut self, sample: Sample) {
        if after_complete(self.completed, NodeType::RandomSampler, "put", &self.logger) {
            return;
        }

        if self.reservoir.len() < self.capacity {
            self.reservoir.push(sample);
        } else {
            let slot = self.rng.gen_range(0..=self.seen);
            if slot < self.capacity as u64 {
                self.reservoir[slot as usize] = sample;
            }
        }
        self.seen += 1;
    }

    fn complete(&mut self) {
        if after_complete(self.completed, NodeType::RandomSampler, "complete", &self.logger) {
            return;
        }
        self.completed = true;

        self.reservoir.sort_by_key(Sample::sort_key);
        self.logger.debug(&format!(
            "random sampler: emitting {} of {} samples",
            self.reservoir.len(),
            self.seen
        ));

        let mut next = self.next.borrow_mut();
        for sample in self.reservoir.drain(..) {
            next.put(sample);
        }
        next.complete();
    }

    fn node_type(&self) -> NodeType {
        NodeType::RandomSampler
    }
}

//! Resampler
//!
//! Downsamples the stream into fixed-width time buckets, producing one
//! aggregate per `(bucket, series)` pair. Arrival order is not assumed,
//! so every bucket stays open until `complete`.

use crate::logging::Logger;
use crate::query::ast::AggregationFunc;
use crate::query::node::{after_complete, Node, NodeRef, NodeType};
use crate::storage::Sample;
use std::collections::BTreeMap;

/// Running state for one `(bucket, series)` pair
#[derive(Debug, Clone, Copy)]
struct Accumulator {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    /// Earliest `(timestamp, value)`; ties keep the first arrival
    first: (u64, f64),
    /// Latest `(timestamp, value)`; ties keep the last arrival
    last: (u64, f64),
}

impl Accumulator {
    fn new(sample: &Sample) -> Self {
        Self {
            count: 1,
            sum: sample.value,
            min: sample.value,
            max: sample.value,
            first: (sample.timestamp, sample.value),
            last: (sample.timestamp, sample.value),
        }
    }

    fn add(&mut self, sample: &Sample) {
        self.count += 1;
        self.sum += sample.value;
        self.min = self.min.min(sample.value);
        self.max = self.max.max(sample.value);
        if sample.timestamp < self.first.0 {
            self.first = (sample.timestamp, sample.value);
        }
        if sample.timestamp >= self.last.0 {
            self.last = (sample.timestamp, sample.value);
        }
    }

    fn reduce(&self, func: AggregationFunc) -> f64 {
        match func {
            AggregationFunc::Avg => self.sum / self.count as f64,
            AggregationFunc::Sum => self.sum,
            AggregationFunc::Min => self.min,
            AggregationFunc::Max => self.max,
            AggregationFunc::Count => self.count as f64,
            AggregationFunc::First => self.first.1,
            AggregationFunc::Last => self.last.1,
        }
    }
}

/// Time-bucket downsampling stage
pub struct Resampler {
    /// Bucket width in timestamp units, always positive
    width: u64,
    reducer: AggregationFunc,
    /// Keyed by `(bucket_start, series_id)` so iteration is output order
    buckets: BTreeMap<(u64, u64), Accumulator>,
    next: NodeRef,
    logger: Logger,
    completed: bool,
}

impl Resampler {
    pub(crate) fn new(width: u64, reducer: AggregationFunc, next: NodeRef, logger: Logger) -> Self {
        Self {
            width,
            reducer,
            buckets: BTreeMap::new(),
            next,
            logger,
            completed: false,
        }
    }

    fn bucket_start(&self, timestamp: u64) -> u64 {
        (timestamp / self.width) * self.width
    }
}

impl Node for Resampler {
    fn put(&mut self, sample: Sample) {
        if after_complete(self.completed, NodeType::Resampler, "put", &self.logger) {
            return;
        }

        let key = (self.bucket_start(sample.timestamp), sample.series_id);
        self.buckets
            .entry(key)
            .and_modify(|acc| acc.add(&sample))
            .or_insert_with(|| Accumulator::new(&sample));
    }

    fn complete(&mut self) {
        if after_complete(self.completed, NodeType::Resampler, "complete", &self.logger) {
            return;
        }
        self.completed = true;

        self.logger.debug(&format!(
            "resampler: emitting {} {} buckets of width {}",
            self.buckets.len(),
            self.reducer,
            self.width
        ));

        let buckets = std::mem::take(&mut self.buckets);
        let mut next = self.next.borrow_mut();
        for ((bucket_start, series_id), acc) in buckets {
            next.put(Sample::new(bucket_start, series_id, acc.reduce(self.reducer)));
        }
        next.complete();
    }

    fn node_type(&self) -> NodeType {
        NodeType::Resampler
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::node::mock::MockNode;
    use crate::query::NodeBuilder;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn resample(width: u64, reducer: AggregationFunc, input: &[(u64, u64, f64)]) -> Rc<RefCell<MockNode>> {
        let mock = MockNode::shared();
        let node =
            NodeBuilder::make_resampler(width, reducer, mock.clone(), &Logger::silent()).unwrap();
        for &(ts, id, value) in input {
            node.borrow_mut().put(Sample::new(ts, id, value));
        }
        node.borrow_mut().complete();
        mock
    }

    #[test]
    fn test_average_per_bucket() {
        let mock = resample(
            10,
            AggregationFunc::Avg,
            &[(1, 1, 1.0), (5, 1, 3.0), (12, 1, 10.0), (19, 1, 20.0)],
        );

        let mock = mock.borrow();
        assert_eq!(mock.timestamps, vec![0, 10]);
        assert_eq!(mock.ids, vec![1, 1]);
        assert_eq!(mock.values, vec![2.0, 15.0]);
        assert_eq!(mock.completions, 1);
    }

    #[test]
    fn test_output_ordered_by_bucket_then_series() {
        let mock = resample(
            100,
            AggregationFunc::Count,
            &[
                (250, 2, 0.0),
                (10, 9, 0.0),
                (20, 3, 0.0),
                (260, 1, 0.0),
                (30, 3, 0.0),
            ],
        );

        let mock = mock.borrow();
        assert_eq!(mock.timestamps, vec![0, 0, 200, 200]);
        assert_eq!(mock.ids, vec![3, 9, 1, 2]);
        assert_eq!(mock.values, vec![2.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_nothing_emitted_before_complete() {
        let mock = MockNode::shared();
        let node =
            NodeBuilder::make_resampler(10, AggregationFunc::Sum, mock.clone(), &Logger::silent())
                .unwrap();
        for ts in 0..100 {
            node.borrow_mut().put(Sample::new(ts, 1, 1.0));
        }
        assert!(mock.borrow().timestamps.is_empty());

        node.borrow_mut().complete();
        let mock = mock.borrow();
        assert_eq!(mock.timestamps.len(), 10);
        assert!(mock.values.iter().all(|&v| v == 10.0));
    }

    #[test]
    fn test_min_max_sum() {
        let input = [(0, 1, 4.0), (1, 1, -2.0), (2, 1, 7.0)];

        assert_eq!(resample(10, AggregationFunc::Min, &input).borrow().values, vec![-2.0]);
        assert_eq!(resample(10, AggregationFunc::Max, &input).borrow().values, vec![7.0]);
        assert_eq!(resample(10, AggregationFunc::Sum, &input).borrow().values, vec![9.0]);
    }

    #[test]
    fn test_first_last_follow_timestamps_not_arrival() {
        // Backward scan order
        let input = [(9, 1, 90.0), (5, 1, 50.0), (1, 1, 10.0)];

        assert_eq!(resample(10, AggregationFunc::First, &input).borrow().values, vec![10.0]);
        assert_eq!(resample(10, AggregationFunc::Last, &input).borrow().values, vec![90.0]);
    }

    #[test]
    fn test_empty_input_completes() {
        let mock = resample(10, AggregationFunc::Avg, &[]);
        let mock = mock.borrow();
        assert!(mock.timestamps.is_empty());
        assert_eq!(mock.completions, 1);
    }
}

//! Node Builder
//!
//! Factory for pipeline stages. Chains are built tail first: every
//! constructor takes the already built downstream handle and returns the
//! new stage as a shared handle, ready to be wired upstream or handed to
//! a [`QueryProcessor`](crate::query::QueryProcessor).
//!
//! Invalid parameters are reported to the logger at error level and
//! returned as a [`NodeError`] tagged with the stage kind.

use crate::logging::Logger;
use crate::query::ast::AggregationFunc;
use crate::query::error::NodeError;
use crate::query::filter::{FilterById, FilterByIdList};
use crate::query::join::{join_by_timestamp, JoinInputs};
use crate::query::node::{shared, NodeRef, NodeType};
use crate::query::resampler::Resampler;
use crate::query::sampler::RandomSampler;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;

/// Name of the only supported sampling algorithm
pub const RESERVOIR_ALGORITHM: &str = "reservoir";

/// Stage factory
pub struct NodeBuilder;

impl NodeBuilder {
    /// Create a random sampling node seeded from system entropy
    pub fn make_random_sampler(
        algorithm: &str,
        buffer_size: usize,
        next: NodeRef,
        logger: &Logger,
    ) -> Result<NodeRef, NodeError> {
        Self::make_sampler(algorithm, buffer_size, StdRng::from_entropy(), next, logger)
    }

    /// Create a random sampling node with a fixed seed
    pub fn make_random_sampler_seeded(
        algorithm: &str,
        buffer_size: usize,
        seed: u64,
        next: NodeRef,
        logger: &Logger,
    ) -> Result<NodeRef, NodeError> {
        Self::make_sampler(
            algorithm,
            buffer_size,
            StdRng::seed_from_u64(seed),
            next,
            logger,
        )
    }

    fn make_sampler(
        algorithm: &str,
        buffer_size: usize,
        rng: StdRng,
        next: NodeRef,
        logger: &Logger,
    ) -> Result<NodeRef, NodeError> {
        if !algorithm.eq_ignore_ascii_case(RESERVOIR_ALGORITHM) {
            return Err(reject(
                NodeType::RandomSampler,
                format!("unknown sampling algorithm '{}'", algorithm),
                logger,
            ));
        }
        if buffer_size == 0 {
            return Err(reject(
                NodeType::RandomSampler,
                "buffer size must be positive",
                logger,
            ));
        }

        logger.debug(&format!("creating reservoir sampler, buffer size {}", buffer_size));
        Ok(shared(RandomSampler::new(
            buffer_size,
            rng,
            next,
            logger.clone(),
        )))
    }

    /// Create a time-bucket resampling node
    pub fn make_resampler(
        bucket_width: u64,
        reducer: AggregationFunc,
        next: NodeRef,
        logger: &Logger,
    ) -> Result<NodeRef, NodeError> {
        if bucket_width == 0 {
            return Err(reject(
                NodeType::Resampler,
                "bucket width must be positive",
                logger,
            ));
        }

        logger.debug(&format!(
            "creating resampler, width {}, reducer {}",
            bucket_width, reducer
        ));
        Ok(shared(Resampler::new(
            bucket_width,
            reducer,
            next,
            logger.clone(),
        )))
    }

    /// Create filtering node
    pub fn make_filter_by_id(
        id: u64,
        next: NodeRef,
        logger: &Logger,
    ) -> Result<NodeRef, NodeError> {
        logger.debug(&format!("creating filter by id {}", id));
        Ok(shared(FilterById::new(id, next, logger.clone())))
    }

    /// Create filtering node
    pub fn make_filter_by_id_list(
        ids: Vec<u64>,
        next: NodeRef,
        logger: &Logger,
    ) -> Result<NodeRef, NodeError> {
        if ids.is_empty() {
            return Err(reject(
                NodeType::FilterByIdList,
                "id list is empty",
                logger,
            ));
        }

        let ids: HashSet<u64> = ids.into_iter().collect();
        logger.debug(&format!("creating filter by id list ({} ids)", ids.len()));
        Ok(shared(FilterByIdList::new(ids, next, logger.clone())))
    }

    /// Create a join node; feed the left and right chains into the
    /// returned handles
    pub fn make_join_by_timestamp(next: NodeRef, logger: &Logger) -> JoinInputs {
        logger.debug("creating join by timestamp");
        join_by_timestamp(next, logger.clone())
    }
}

fn reject(node_type: NodeType, message: impl Into<String>, logger: &Logger) -> NodeError {
    let err = NodeError::new(node_type, message);
    logger.error(&err.to_string());
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::node::Collector;
    use std::sync::{Arc, Mutex};
    use tracing::Level;

    fn sink() -> NodeRef {
        shared(Collector::new())
    }

    #[test]
    fn test_rejects_zero_buffer_size() {
        let err =
            NodeBuilder::make_random_sampler("reservoir", 0, sink(), &Logger::silent()).unwrap_err();
        assert_eq!(err.node_type(), NodeType::RandomSampler);
    }

    #[test]
    fn test_rejects_unknown_algorithm() {
        let err = NodeBuilder::make_random_sampler("bernoulli", 10, sink(), &Logger::silent())
            .unwrap_err();
        assert_eq!(err.node_type(), NodeType::RandomSampler);
        assert!(err.message.contains("bernoulli"));
    }

    #[test]
    fn test_algorithm_name_is_case_insensitive() {
        let node =
            NodeBuilder::make_random_sampler("Reservoir", 10, sink(), &Logger::silent()).unwrap();
        assert_eq!(node.borrow().node_type(), NodeType::RandomSampler);
    }

    #[test]
    fn test_rejects_empty_id_list() {
        let err =
            NodeBuilder::make_filter_by_id_list(vec![], sink(), &Logger::silent()).unwrap_err();
        assert_eq!(err.node_type(), NodeType::FilterByIdList);
    }

    #[test]
    fn test_rejects_zero_bucket_width() {
        let err = NodeBuilder::make_resampler(0, AggregationFunc::Avg, sink(), &Logger::silent())
            .unwrap_err();
        assert_eq!(err.node_type(), NodeType::Resampler);
    }

    #[test]
    fn test_errors_reported_to_logger() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let logger = Logger::from_fn(move |level, msg| {
            log.lock().unwrap().push((level, msg.to_string()));
        });

        assert!(NodeBuilder::make_random_sampler("reservoir", 0, sink(), &logger).is_err());

        let seen = seen.lock().unwrap();
        let errors: Vec<_> = seen.iter().filter(|(level, _)| *level == Level::ERROR).collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].1.contains("random_sampler"));
    }

    #[test]
    fn test_node_types() {
        let logger = Logger::silent();
        let resampler =
            NodeBuilder::make_resampler(60, AggregationFunc::Sum, sink(), &logger).unwrap();
        let filter = NodeBuilder::make_filter_by_id(1, sink(), &logger).unwrap();
        let list = NodeBuilder::make_filter_by_id_list(vec![1, 2], sink(), &logger).unwrap();
        let join = NodeBuilder::make_join_by_timestamp(sink(), &logger);

        assert_eq!(resampler.borrow().node_type(), NodeType::Resampler);
        assert_eq!(filter.borrow().node_type(), NodeType::FilterById);
        assert_eq!(list.borrow().node_type(), NodeType::FilterByIdList);
        assert_eq!(join.left.borrow().node_type(), NodeType::JoinByTimestamp);
        assert_eq!(join.right.borrow().node_type(), NodeType::JoinByTimestamp);
    }
}

//! Node contract
//!
//! Every pipeline stage implements [`Node`]. Stages are chained through
//! shared [`NodeRef`] handles: a stage pushes its output into the next
//! handle synchronously, and `complete` travels down the chain once the
//! scan is exhausted.
//!
//! ```text
//! scan → FilterByIdList → RandomSampler → Collector
//!          put/complete ──────────────────────▶
//! ```

use crate::logging::Logger;
use crate::storage::Sample;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

/// Kind of a pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    // Samplers
    RandomSampler,
    Resampler,
    // Joins
    JoinByTimestamp,
    // Filtering
    FilterById,
    FilterByIdList,
    // Terminal
    Collector,
    // Testing
    Mock,
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RandomSampler => write!(f, "random_sampler"),
            Self::Resampler => write!(f, "resampler"),
            Self::JoinByTimestamp => write!(f, "join_by_timestamp"),
            Self::FilterById => write!(f, "filter_by_id"),
            Self::FilterByIdList => write!(f, "filter_by_id_list"),
            Self::Collector => write!(f, "collector"),
            Self::Mock => write!(f, "mock"),
        }
    }
}

/// A pipeline stage.
///
/// Calls are single-threaded and never block. `complete` is called at
/// most once, after the last `put`.
pub trait Node {
    /// Process one sample
    fn put(&mut self, sample: Sample);

    /// End of input: flush buffered state downstream, then forward `complete`
    fn complete(&mut self);

    /// Kind of this stage
    fn node_type(&self) -> NodeType;
}

impl std::fmt::Debug for dyn Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("node_type", &self.node_type())
            .finish()
    }
}

/// Shared handle to a stage
pub type NodeRef = Rc<RefCell<dyn Node>>;

/// Wrap a stage into a shared handle
pub fn shared<N: Node + 'static>(node: N) -> NodeRef {
    Rc::new(RefCell::new(node))
}

/// Guard against calls that arrive after `complete`.
///
/// Returns true when the call must be ignored.
pub(crate) fn after_complete(
    completed: bool,
    node_type: NodeType,
    call: &str,
    logger: &Logger,
) -> bool {
    if completed {
        logger.warn(&format!(
            "{} node: {} called after complete, ignored",
            node_type, call
        ));
    }
    completed
}

/// Terminal stage that materializes the result set.
#[derive(Debug, Default)]
pub struct Collector {
    samples: Vec<Sample>,
    completed: bool,
    logger: Logger,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a collector reporting misuse to `logger`
    pub fn with_logger(logger: Logger) -> Self {
        Self {
            logger,
            ..Self::default()
        }
    }

    /// Create a collector already wrapped for sharing.
    ///
    /// Keep the typed handle to read results; pass a clone as the chain tail.
    pub fn shared() -> Rc<RefCell<Collector>> {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Samples received so far, in arrival order
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Take the collected samples
    pub fn take(&mut self) -> Vec<Sample> {
        std::mem::take(&mut self.samples)
    }

    /// Whether `complete` has arrived
    pub fn is_complete(&self) -> bool {
        self.completed
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl Node for Collector {
    fn put(&mut self, sample: Sample) {
        if after_complete(self.completed, NodeType::Collector, "put", &self.logger) {
            return;
        }
        self.samples.push(sample);
    }

    fn complete(&mut self) {
        if after_complete(self.completed, NodeType::Collector, "complete", &self.logger) {
            return;
        }
        self.completed = true;
    }

    fn node_type(&self) -> NodeType {
        NodeType::Collector
    }
}

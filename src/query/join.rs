//! Join-by-Timestamp
//!
//! Inner join of two upstream chains on exact timestamp equality. Each
//! side feeds its own input handle; both handles share one join state.
//!
//! ```text
//! left chain  ─▶ JoinInput(Left)  ─┐
//!                                  ├─▶ JoinState ─▶ next
//! right chain ─▶ JoinInput(Right) ─┘
//! ```
//!
//! A joined record is emitted downstream as the left sample immediately
//! followed by the right sample.

use crate::logging::Logger;
use crate::query::node::{after_complete, shared, Node, NodeRef, NodeType};
use crate::storage::Sample;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Which upstream a sample came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left = 0,
    Right = 1,
}

impl Side {
    fn other(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

/// The two input handles of a join node
pub struct JoinInputs {
    pub left: NodeRef,
    pub right: NodeRef,
}

struct JoinState {
    /// Unmatched samples per side, keyed by timestamp
    pending: [HashMap<u64, Sample>; 2],
    /// Whether each side has completed
    done: [bool; 2],
    completed: bool,
    next: NodeRef,
    logger: Logger,
}

impl JoinState {
    fn put(&mut self, side: Side, sample: Sample) {
        if self.done[side as usize] {
            self.logger.warn(&format!(
                "join_by_timestamp node: put on completed {:?} input, ignored",
                side
            ));
            return;
        }

        match self.pending[side.other() as usize].remove(&sample.timestamp) {
            Some(other) => {
                self.pending[side as usize].remove(&sample.timestamp);
                let (left, right) = match side {
                    Side::Left => (sample, other),
                    Side::Right => (other, sample),
                };
                let mut next = self.next.borrow_mut();
                next.put(left);
                next.put(right);
            }
            None => {
                // A newer unmatched value replaces the stale one
                self.pending[side as usize].insert(sample.timestamp, sample);
            }
        }
    }

    fn complete(&mut self, side: Side) {
        if after_complete(
            self.done[side as usize],
            NodeType::JoinByTimestamp,
            "complete",
            &self.logger,
        ) {
            return;
        }
        self.done[side as usize] = true;

        if self.done.iter().all(|&d| d) && !self.completed {
            self.completed = true;
            let unmatched: usize = self.pending.iter().map(HashMap::len).sum();
            self.logger.debug(&format!(
                "join by timestamp: dropping {} unmatched samples",
                unmatched
            ));
            for pending in &mut self.pending {
                pending.clear();
            }
            self.next.borrow_mut().complete();
        }
    }
}

/// One side of a join
struct JoinInput {
    side: Side,
    state: Rc<RefCell<JoinState>>,
}

impl Node for JoinInput {
    fn put(&mut self, sample: Sample) {
        self.state.borrow_mut().put(self.side, sample);
    }

    fn complete(&mut self) {
        self.state.borrow_mut().complete(self.side);
    }

    fn node_type(&self) -> NodeType {
        NodeType::JoinByTimestamp
    }
}

pub(crate) fn join_by_timestamp(next: NodeRef, logger: Logger) -> JoinInputs {
    let state = Rc::new(RefCell::new(JoinState {
        pending: [HashMap::new(), HashMap::new()],
        done: [false, false],
        completed: false,
        next,
        logger,
    }));

    JoinInputs {
        left: shared(JoinInput {
            side: Side::Left,
            state: Rc::clone(&state),
        }),
        right: shared(JoinInput {
            side: Side::Right,
            state,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::node::mock::MockNode;
    use crate::query::NodeBuilder;
    use std::sync::{Arc, Mutex};
    use tracing::Level;

    fn join() -> (JoinInputs, Rc<RefCell<MockNode>>) {
        let mock = MockNode::shared();
        let inputs = NodeBuilder::make_join_by_timestamp(mock.clone(), &Logger::silent());
        (inputs, mock)
    }

    #[test]
    fn test_matching_timestamps_are_joined() {
        let (inputs, mock) = join();

        inputs.left.borrow_mut().put(Sample::new(1, 10, 1.0));
        inputs.right.borrow_mut().put(Sample::new(1, 20, 2.0));
        inputs.right.borrow_mut().put(Sample::new(2, 20, 3.0));
        inputs.left.borrow_mut().put(Sample::new(2, 10, 4.0));

        let mock = mock.borrow();
        assert_eq!(mock.timestamps, vec![1, 1, 2, 2]);
        assert_eq!(mock.ids, vec![10, 20, 10, 20]);
        assert_eq!(mock.values, vec![1.0, 2.0, 4.0, 3.0]);
    }

    #[test]
    fn test_unmatched_timestamps_are_dropped() {
        let (inputs, mock) = join();

        inputs.left.borrow_mut().put(Sample::new(1, 10, 1.0));
        inputs.left.borrow_mut().put(Sample::new(3, 10, 1.0));
        inputs.right.borrow_mut().put(Sample::new(2, 20, 2.0));
        inputs.right.borrow_mut().put(Sample::new(3, 20, 2.0));
        inputs.left.borrow_mut().complete();
        inputs.right.borrow_mut().complete();

        let mock = mock.borrow();
        assert_eq!(mock.timestamps, vec![3, 3]);
        assert_eq!(mock.completions, 1);
    }

    #[test]
    fn test_complete_waits_for_both_sides() {
        let (inputs, mock) = join();

        inputs.left.borrow_mut().complete();
        assert_eq!(mock.borrow().completions, 0);

        inputs.right.borrow_mut().put(Sample::new(5, 20, 1.0));
        inputs.right.borrow_mut().complete();
        assert_eq!(mock.borrow().completions, 1);
        assert!(mock.borrow().timestamps.is_empty());
    }

    #[test]
    fn test_complete_forwarded_once() {
        let (inputs, mock) = join();

        inputs.left.borrow_mut().complete();
        inputs.right.borrow_mut().complete();
        inputs.right.borrow_mut().complete();
        inputs.left.borrow_mut().complete();

        assert_eq!(mock.borrow().completions, 1);
    }

    #[test]
    fn test_stale_entry_replaced() {
        let (inputs, mock) = join();

        inputs.left.borrow_mut().put(Sample::new(7, 10, 1.0));
        inputs.left.borrow_mut().put(Sample::new(7, 11, 9.0));
        inputs.right.borrow_mut().put(Sample::new(7, 20, 2.0));

        let mock = mock.borrow();
        assert_eq!(mock.ids, vec![11, 20]);
        assert_eq!(mock.values, vec![9.0, 2.0]);
    }

    #[test]
    fn test_match_consumes_pending_entry() {
        let (inputs, mock) = join();

        inputs.left.borrow_mut().put(Sample::new(4, 10, 1.0));
        inputs.right.borrow_mut().put(Sample::new(4, 20, 2.0));
        inputs.right.borrow_mut().put(Sample::new(4, 21, 3.0));

        assert_eq!(mock.borrow().timestamps.len(), 2);

        inputs.left.borrow_mut().put(Sample::new(4, 12, 5.0));
        let mock = mock.borrow();
        assert_eq!(mock.ids, vec![10, 20, 12, 21]);
    }

    #[test]
    fn test_put_after_side_complete_is_ignored() {
        let (inputs, mock) = join();

        inputs.right.borrow_mut().put(Sample::new(1, 20, 2.0));
        inputs.left.borrow_mut().complete();
        inputs.left.borrow_mut().put(Sample::new(1, 10, 1.0));

        assert!(mock.borrow().timestamps.is_empty());
    }

    #[test]
    fn test_join_fed_by_filters() {
        let mock = MockNode::shared();
        let logger = Logger::silent();
        let inputs = NodeBuilder::make_join_by_timestamp(mock.clone(), &logger);
        let left = NodeBuilder::make_filter_by_id(1, inputs.left.clone(), &logger).unwrap();
        let right = NodeBuilder::make_filter_by_id(2, inputs.right.clone(), &logger).unwrap();

        // Merge-scan interleaving of two series plus noise
        for ts in 0..4u64 {
            for id in 0..4u64 {
                let sample = Sample::new(ts, id, (ts * 10 + id) as f64);
                left.borrow_mut().put(sample);
                right.borrow_mut().put(sample);
            }
        }
        left.borrow_mut().complete();
        right.borrow_mut().complete();

        let mock = mock.borrow();
        assert_eq!(mock.timestamps, vec![0, 0, 1, 1, 2, 2, 3, 3]);
        assert_eq!(mock.ids, vec![1, 2, 1, 2, 1, 2, 1, 2]);
        assert_eq!(inputs.left.borrow().node_type(), NodeType::JoinByTimestamp);
        assert_eq!(mock.completions, 1);
    }
    #[test]
    fn test_late_calls_reported_to_logger() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let logger = Logger::from_fn(move |level, msg| {
            log.lock().unwrap().push((level, msg.to_string()));
        });

        let mock = MockNode::shared();
        let inputs = NodeBuilder::make_join_by_timestamp(mock.clone(), &logger);
        inputs.left.borrow_mut().complete();
        inputs.left.borrow_mut().put(Sample::new(1, 10, 1.0));
        inputs.left.borrow_mut().complete();

        let seen = seen.lock().unwrap();
        let warnings: Vec<_> = seen.iter().filter(|(level, _)| *level == Level::WARN).collect();
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().all(|(_, msg)| msg.contains("join_by_timestamp")));
        assert_eq!(mock.borrow().completions, 0);
    }
}

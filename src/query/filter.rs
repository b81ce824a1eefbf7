//! Id filters
//!
//! Pass-through stages that forward a sample only when its series id is
//! the configured one (or one of the configured ones). They hold no
//! state of their own, so `complete` is forwarded as is.

use crate::logging::Logger;
use crate::query::node::{after_complete, Node, NodeRef, NodeType};
use crate::storage::Sample;
use std::collections::HashSet;

/// Forwards samples of a single series
pub struct FilterById {
    id: u64,
    next: NodeRef,
    logger: Logger,
    completed: bool,
}

impl FilterById {
    pub(crate) fn new(id: u64, next: NodeRef, logger: Logger) -> Self {
        Self {
            id,
            next,
            logger,
            completed: false,
        }
    }
}

impl Node for FilterById {
    fn put(&mut self, sample: Sample) {
        if after_complete(self.completed, NodeType::FilterById, "put", &self.logger) {
            return;
        }
        if sample.series_id == self.id {
            self.next.borrow_mut().put(sample);
        }
    }

    fn complete(&mut self) {
        if after_complete(self.completed, NodeType::FilterById, "complete", &self.logger) {
            return;
        }
        self.completed = true;
        self.next.borrow_mut().complete();
    }

    fn node_type(&self) -> NodeType {
        NodeType::FilterById
    }
}

/// Forwards samples whose series is in a set
pub struct FilterByIdList {
    ids: HashSet<u64>,
    next: NodeRef,
    logger: Logger,
    completed: bool,
}

impl FilterByIdList {
    pub(crate) fn new(ids: HashSet<u64>, next: NodeRef, logger: Logger) -> Self {
        Self {
            ids,
            next,
            logger,
            completed: false,
        }
    }
}

impl Node for FilterByIdList {
    fn put(&mut self, sample: Sample) {
        if after_complete(self.completed, NodeType::FilterByIdList, "put", &self.logger) {
            return;
        }
        if self.ids.contains(&sample.series_id) {
            self.next.borrow_mut().put(sample);
        }
    }

    fn complete(&mut self) {
        if after_complete(self.completed, NodeType::FilterByIdList, "complete", &self.logger) {
            return;
        }
        self.completed = true;
        self.next.borrow_mut().complete();
    }

    fn node_type(&self) -> NodeType {
        NodeType::FilterByIdList
    }
}

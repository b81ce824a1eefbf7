//! Query error types
//!
//! Defines all error conditions that can occur while building a pipeline
//! or parsing a query definition.

use crate::index::UnknownName;
use crate::query::node::NodeType;
use crate::stream::StreamError;
use thiserror::Error;

/// Construction error raised by the node builder.
///
/// Tagged with the kind of node that was being built.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{node_type} node: {message}")]
pub struct NodeError {
    /// Kind of node that rejected its parameters
    pub node_type: NodeType,
    /// What was wrong
    pub message: String,
}

impl NodeError {
    pub fn new(node_type: NodeType, message: impl Into<String>) -> Self {
        Self {
            node_type,
            message: message.into(),
        }
    }

    /// Kind of node that failed
    pub fn node_type(&self) -> NodeType {
        self.node_type
    }
}

/// Errors that can occur during query operations
#[derive(Error, Debug)]
pub enum QueryError {
    /// A node rejected its parameters
    #[error("Invalid pipeline: {0}")]
    Node(#[from] NodeError),

    /// Reading the query text failed
    #[error("Stream error:\n{0}")]
    Stream(#[from] StreamError),

    /// Query text is malformed
    #[error("Syntax error: {message}\n{context}")]
    Syntax {
        message: String,
        context: StreamError,
    },

    /// Referenced series does not exist
    #[error("Metric not found: {0}")]
    MetricNotFound(String),

    /// Definition is structurally invalid
    #[error("Invalid query definition: {0}")]
    InvalidDefinition(String),

    /// JSON definition could not be decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<UnknownName> for QueryError {
    fn from(err: UnknownName) -> Self {
        QueryError::MetricNotFound(err.0)
    }
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;

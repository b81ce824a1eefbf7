//! Chronicle Scan Layer
//!
//! The pieces of storage the query pipeline sees:
//!
//! - **types**: `Sample`, scan `Direction` and `TimeBounds`
//! - **scan**: in-memory sorted scan that drives a query processor
//! - **error**: error types
//!
//! # Read Path
//!
//! ```text
//! CSV → IdTable (names → ids) → MemoryScan
//!     → scan(bounds, direction) → QueryProcessor → pipeline → sink
//! ```

pub mod error;
pub mod scan;
pub mod types;

// Re-export commonly used types
pub use error::{StorageError, StorageResult};
pub use scan::{MemoryScan, ScanStats};
pub use types::{Direction, Sample, TimeBounds};

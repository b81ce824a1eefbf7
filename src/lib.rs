//! # Chronicle Query Pipeline
//!
//! Streaming query processing for time-series scans: samples produced by
//! a storage scan are pushed through a chain of stages (random sampling,
//! time-bucket resampling, id filtering, joins on timestamp) into a sink.
//!
//! ## Features
//!
//! - **Push pipeline**: stages implement one `put` / `complete` contract
//! - **Bounded sampling**: reservoir sampler with time-ordered output
//! - **Query language**: pipeline definitions from text or JSON
//! - **Diagnostics**: parse errors point at the offending byte
//!
//! ## Modules
//!
//! - [`storage`]: samples, scan direction and the in-memory scan
//! - [`index`]: series name ↔ id table
//! - [`query`]: pipeline stages, processor, definitions and parser
//! - [`stream`]: byte stream reader with error context
//! - [`logging`]: diagnostic sink and subscriber setup
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chronicle_qp::config::PipelineConfig;
//! use chronicle_qp::index::IdTable;
//! use chronicle_qp::logging::Logger;
//! use chronicle_qp::query::{parse_query, Collector};
//! use chronicle_qp::storage::MemoryScan;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut ids = IdTable::new();
//!     let csv = "timestamp,series,value\n1,cpu,0.5\n2,cpu,0.7\n";
//!     let scan = MemoryScan::from_csv(csv.as_bytes(), &mut ids)?;
//!
//!     let sink = Collector::shared();
//!     let mut processor = parse_query("SELECT cpu | SAMPLE reservoir(1)")?.build(
//!         sink.clone(),
//!         &ids,
//!         &Logger::tracing(),
//!         &PipelineConfig::default(),
//!     )?;
//!
//!     let stats = scan.run(&mut processor);
//!     println!("{} scanned, {} kept", stats.scanned, sink.borrow().len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod index;
pub mod logging;
pub mod query;
pub mod storage;
pub mod stream;

// Re-export top-level types for convenience
pub use storage::{
    Direction, MemoryScan, Sample, ScanStats, StorageError, StorageResult, TimeBounds,
};

pub use index::{IdLookup, IdTable, UnknownName};

pub use query::{
    parse_query, AggregationFunc, Collector, Node, NodeBuilder, NodeError, NodeRef, NodeType,
    QueryDefinition, QueryError, QueryProcessor, QueryResult, StageSpec,
};

pub use stream::{ByteStreamReader, MemStreamReader, StreamError};

pub use logging::Logger;

pub use config::{Config, ConfigError, LoggingConfig, PipelineConfig};

//! Chronicle Query Pipeline
//!
//! Push-based processing of scan output:
//!
//! - **Node**: the stage contract (`put` / `complete`) and the collecting sink
//! - **Stages**: reservoir sampler, resampler, id filters, join by timestamp
//! - **Builder**: validated stage construction
//! - **Processor**: per-query owner of the pipeline, bounds and series of interest
//! - **AST / Parser**: query definitions, from text or JSON
//!
//! # Query Language
//!
//! ```text
//! SELECT metric [, metric2, ...]
//! [BETWEEN <time> AND <time>]
//! [| SAMPLE reservoir(<size>)]
//! [| RESAMPLE <width> [reducer]]
//! [| FILTER id = <n> | FILTER id IN (<n>, ...)]
//! ```
//!
//! # Examples
//!
//! ## Wiring stages by hand
//!
//! ```rust,ignore
//! use chronicle_qp::query::{Collector, NodeBuilder, QueryProcessor};
//!
//! let sink = Collector::shared();
//! let sampler = NodeBuilder::make_random_sampler("reservoir", 100, sink.clone(), &logger)?;
//! let mut processor = QueryProcessor::new(sampler, vec!["cpu".into()], 0, 3_600_000, &ids)?;
//! scan.run(&mut processor);
//! ```
//!
//! ## From a query string
//!
//! ```rust,ignore
//! let definition = parse_query("SELECT cpu | RESAMPLE 60000 max")?;
//! let mut processor = definition.build(sink, &ids, &logger, &config.pipeline)?;
//! ```

mod ast;
mod builder;
mod error;
mod filter;
mod join;
mod node;
mod parser;
mod processor;
mod resampler;
mod sampler;

pub use ast::{AggregationFunc, QueryDefinition, StageSpec};
pub use builder::{NodeBuilder, RESERVOIR_ALGORITHM};
pub use error::{NodeError, QueryError, QueryResult};
pub use join::JoinInputs;
pub use node::{shared, Collector, Node, NodeRef, NodeType};
pub use parser::{parse_definition, parse_query};
pub use processor::QueryProcessor;

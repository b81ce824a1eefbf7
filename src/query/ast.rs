//! Query Definitions
//!
//! A [`QueryDefinition`] is the declarative form of a query: which metrics
//! to read, over which time range, and the stages to push the scan
//! through. Definitions come from the text syntax (see
//! [`parse_query`](crate::query::parse_query)) or from JSON:
//!
//! ```json
//! {
//!   "metrics": ["cpu", "mem"],
//!   "begin": 0,
//!   "end": 3600000,
//!   "stages": [
//!     { "type": "resample", "width": 60000, "reducer": "max" },
//!     { "type": "sample", "algorithm": "reservoir", "size": 100 }
//!   ]
//! }
//! ```
//!
//! Stages apply in order: the first stage receives the scan output.

use crate::config::PipelineConfig;
use crate::index::IdLookup;
use crate::logging::Logger;
use crate::query::builder::NodeBuilder;
use crate::query::error::{QueryError, QueryResult};
use crate::query::node::NodeRef;
use crate::query::processor::QueryProcessor;
use crate::storage::Direction;
use serde::{Deserialize, Serialize};

/// Reducers available to the resampler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationFunc {
    /// Average of values
    Avg,
    /// Sum of values
    Sum,
    /// Minimum value
    Min,
    /// Maximum value
    Max,
    /// Count of values
    Count,
    /// Value with the latest timestamp
    Last,
    /// Value with the earliest timestamp
    First,
}

impl AggregationFunc {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "avg" | "average" | "mean" => Some(Self::Avg),
            "sum" => Some(Self::Sum),
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            "count" => Some(Self::Count),
            "last" => Some(Self::Last),
            "first" => Some(Self::First),
            _ => None,
        }
    }
}

impl std::fmt::Display for AggregationFunc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Avg => write!(f, "AVG"),
            Self::Sum => write!(f, "SUM"),
            Self::Min => write!(f, "MIN"),
            Self::Max => write!(f, "MAX"),
            Self::Count => write!(f, "COUNT"),
            Self::Last => write!(f, "LAST"),
            Self::First => write!(f, "FIRST"),
        }
    }
}

/// One processing stage of a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StageSpec {
    /// Bounded random sample of the stream
    Sample { algorithm: String, size: usize },
    /// Time-bucket downsampling; reducer falls back to the configured default
    Resample {
        width: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reducer: Option<AggregationFunc>,
    },
    /// Keep a single series
    FilterId { id: u64 },
    /// Keep a set of series
    FilterIds { ids: Vec<u64> },
}

impl std::fmt::Display for StageSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sample { algorithm, size } => write!(f, "SAMPLE {}({})", algorithm, size),
            Self::Resample { width, reducer: Some(r) } => write!(f, "RESAMPLE {} {}", width, r),
            Self::Resample { width, reducer: None } => write!(f, "RESAMPLE {}", width),
            Self::FilterId { id } => write!(f, "FILTER id = {}", id),
            Self::FilterIds { ids } => {
                let ids: Vec<String> = ids.iter().map(u64::to_string).collect();
                write!(f, "FILTER id IN ({})", ids.join(", "))
            }
        }
    }
}

/// Declarative query
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryDefinition {
    /// Metric names of interest, in group order
    pub metrics: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub begin: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<u64>,
    #[serde(default)]
    pub stages: Vec<StageSpec>,
}

impl QueryDefinition {
    /// Create a definition over the given metrics with no range and no stages
    pub fn new(metrics: &[&str]) -> Self {
        Self {
            metrics: metrics.iter().map(|m| m.to_string()).collect(),
            ..Default::default()
        }
    }

    /// Set the time range; `begin > end` selects a backward scan
    pub fn between(mut self, begin: u64, end: u64) -> Self {
        self.begin = Some(begin);
        self.end = Some(end);
        self
    }

    /// Append a stage
    pub fn stage(mut self, stage: StageSpec) -> Self {
        self.stages.push(stage);
        self
    }

    /// Parse a JSON definition
    pub fn from_json(json: &str) -> QueryResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> QueryResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Resolve the `(begin, end)` pair handed to the processor.
    ///
    /// With no bounds at all, `default_direction` decides: forward yields
    /// `(0, u64::MAX)`, backward `(u64::MAX, 0)`. With one bound given,
    /// the missing one is open on its own side (`begin` → `0`,
    /// `end` → `u64::MAX`) and `default_direction` is not consulted, so
    /// a half-open range always scans forward.
    pub fn range(&self, default_direction: Direction) -> (u64, u64) {
        match (self.begin, self.end, default_direction) {
            (Some(begin), Some(end), _) => (begin, end),
            (Some(begin), None, _) => (begin, u64::MAX),
            (None, Some(end), _) => (0, end),
            (None, None, Direction::Forward) => (0, u64::MAX),
            (None, None, Direction::Backward) => (u64::MAX, 0),
        }
    }

    /// Build the stage chain in front of `sink` and wrap it in a processor
    pub fn build(
        &self,
        sink: NodeRef,
        ids: &dyn IdLookup,
        logger: &Logger,
        config: &PipelineConfig,
    ) -> QueryResult<QueryProcessor> {
        if self.metrics.is_empty() {
            return Err(QueryError::InvalidDefinition(
                "at least one metric is required".to_string(),
            ));
        }

        // Tail first: each stage wraps the chain built so far
        let mut head = sink;
        for stage in self.stages.iter().rev() {
            head = match stage {
                StageSpec::Sample { algorithm, size } => match config.reservoir_seed {
                    Some(seed) => NodeBuilder::make_random_sampler_seeded(
                        algorithm, *size, seed, head, logger,
                    )?,
                    None => NodeBuilder::make_random_sampler(algorithm, *size, head, logger)?,
                },
                StageSpec::Resample { width, reducer } => NodeBuilder::make_resampler(
                    *width,
                    reducer.unwrap_or(config.default_reducer),
                    head,
                    logger,
                )?,
                StageSpec::FilterId { id } => NodeBuilder::make_filter_by_id(*id, head, logger)?,
                StageSpec::FilterIds { ids } => {
                    NodeBuilder::make_filter_by_id_list(ids.clone(), head, logger)?
                }
            };
        }

        let (begin, end) = self.range(config.default_direction);
        logger.debug(&format!(
            "built pipeline: {} stages over {} metrics",
            self.stages.len(),
            self.metrics.len()
        ));
        QueryProcessor::new(head, self.metrics.clone(), begin, end, ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IdTable;
    use crate::query::node::{Collector, NodeType};
    use crate::storage::Sample;

    fn table() -> IdTable {
        let mut table = IdTable::new();
        table.intern("cpu");
        table.intern("mem");
        table
    }

    #[test]
    fn test_aggregation_from_str() {
        assert_eq!(AggregationFunc::from_str("avg"), Some(AggregationFunc::Avg));
        assert_eq!(AggregationFunc::from_str("MEAN"), Some(AggregationFunc::Avg));
        assert_eq!(AggregationFunc::from_str("Last"), Some(AggregationFunc::Last));
        assert_eq!(AggregationFunc::from_str("median"), None);
    }

    #[test]
    fn test_json_definition() {
        let json = r#"{
            "metrics": ["cpu"],
            "begin": 100,
            "end": 0,
            "stages": [
                {"type": "filter_ids", "ids": [0, 1]},
                {"type": "resample", "width": 10, "reducer": "max"},
                {"type": "sample", "algorithm": "reservoir", "size": 3},
                {"type": "filter_id", "id": 0},
                {"type": "resample", "width": 5}
            ]
        }"#;

        let def = QueryDefinition::from_json(json).unwrap();
        assert_eq!(def.metrics, vec!["cpu"]);
        assert_eq!(def.range(Direction::Forward), (100, 0));
        assert_eq!(
            def.stages,
            vec![
                StageSpec::FilterIds { ids: vec![0, 1] },
                StageSpec::Resample { width: 10, reducer: Some(AggregationFunc::Max) },
                StageSpec::Sample { algorithm: "reservoir".to_string(), size: 3 },
                StageSpec::FilterId { id: 0 },
                StageSpec::Resample { width: 5, reducer: None },
            ]
        );
    }

    #[test]
    fn test_json_survives_serialization() {
        let def = QueryDefinition::new(&["cpu", "mem"])
            .between(5, 10)
            .stage(StageSpec::Resample { width: 2, reducer: None });
        let back = QueryDefinition::from_json(&def.to_json().unwrap()).unwrap();
        assert_eq!(back, def);
    }

    #[test]
    fn test_invalid_json() {
        let result = QueryDefinition::from_json(r#"{"metrics": ["cpu"], "stages": [{"type": "median"}]}"#);
        assert!(matches!(result, Err(QueryError::Json(_))));
    }

    #[test]
    fn test_open_range() {
        let def = QueryDefinition::new(&["cpu"]);
        assert_eq!(def.range(Direction::Forward), (0, u64::MAX));
        assert_eq!(def.range(Direction::Backward), (u64::MAX, 0));

        // Half-open ranges ignore the default direction
        let begin_only = QueryDefinition { begin: Some(7), ..def.clone() };
        assert_eq!(begin_only.range(Direction::Backward), (7, u64::MAX));
        let end_only = QueryDefinition { end: Some(9), ..def };
        assert_eq!(end_only.range(Direction::Backward), (0, 9));
    }

    #[test]
    fn test_build_empty_metrics() {
        let def = QueryDefinition::default();
        let result = def.build(
            crate::query::shared(Collector::new()),
            &table(),
            &Logger::silent(),
            &PipelineConfig::default(),
        );
        assert!(matches!(result, Err(QueryError::InvalidDefinition(_))));
    }

    #[test]
    fn test_build_invalid_stage() {
        let def = QueryDefinition::new(&["cpu"])
            .stage(StageSpec::Sample { algorithm: "reservoir".to_string(), size: 0 });
        let result = def.build(
            crate::query::shared(Collector::new()),
            &table(),
            &Logger::silent(),
            &PipelineConfig::default(),
        );
        match result {
            Err(QueryError::Node(err)) => assert_eq!(err.node_type(), NodeType::RandomSampler),
            other => panic!("expected node error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_build_applies_stages_in_order() {
        let ids = table();
        let collector = Collector::shared();
        let def = QueryDefinition::new(&["cpu", "mem"])
            .stage(StageSpec::FilterId { id: 1 })
            .stage(StageSpec::Resample { width: 10, reducer: None });
        let config = PipelineConfig {
            default_reducer: AggregationFunc::Sum,
            ..Default::default()
        };

        let mut qp = def
            .build(collector.clone(), &ids, &Logger::silent(), &config)
            .unwrap();
        assert_eq!(qp.root().borrow().node_type(), NodeType::FilterById);

        for ts in 0..20 {
            qp.process(Sample::new(ts, ts % 2, 1.0));
        }
        qp.complete();

        let collector = collector.borrow();
        assert!(collector.is_complete());
        assert_eq!(
            collector.samples(),
            &[Sample::new(0, 1, 5.0), Sample::new(10, 1, 5.0)]
        );
    }

    #[test]
    fn test_seeded_build_is_deterministic() {
        let ids = table();
        let config = PipelineConfig {
            reservoir_seed: Some(42),
            ..Default::default()
        };
        let def = QueryDefinition::new(&["cpu"])
            .stage(StageSpec::Sample { algorithm: "reservoir".to_string(), size: 4 });

        let run = || {
            let collector = Collector::shared();
            let mut qp = def
                .build(collector.clone(), &ids, &Logger::silent(), &config)
                .unwrap();
            for ts in 0..500 {
                qp.process(Sample::new(ts, 0, ts as f64));
            }
            qp.complete();
            let samples = collector.borrow().samples().to_vec();
            samples
        };

        let first = run();
        assert_eq!(first.len(), 4);
        assert_eq!(first, run());
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(
            StageSpec::Sample { algorithm: "reservoir".to_string(), size: 5 }.to_string(),
            "SAMPLE reservoir(5)"
        );
        assert_eq!(
            StageSpec::FilterIds { ids: vec![1, 2] }.to_string(),
            "FILTER id IN (1, 2)"
        );
    }
}

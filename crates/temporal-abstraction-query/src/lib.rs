//! Query execution for temporal abstraction: configuration, data sources,
//! results sinks and the bounded key pipeline.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod sink;
pub mod source;

pub use config::{resolve_data_path, resolve_knowledge_path, QueryConfig};
pub use error::{QueryError, QueryResult};
pub use pipeline::{KeyFailure, Query, QueryPipeline, QueryReport, QueueItem};
pub use sink::{CollectingSink, JsonLinesSink, ResultsSink};
pub use source::{DataSource, JsonLinesDataSource, KeyBatch, VecDataSource};

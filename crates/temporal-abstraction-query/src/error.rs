//! Error types for query execution.

use temporal_abstraction::AbstractionError;

/// All errors that can end a query.
#[derive(thiserror::Error, Debug)]
pub enum QueryError {
    #[error("Query {query_id} aborted: {source}")]
    Aborted {
        query_id: String,
        #[source]
        source: AbstractionError,
    },

    #[error(transparent)]
    Abstraction(#[from] AbstractionError),

    #[error("Data source error: {0}")]
    DataSource(String),

    #[error("Results sink error: {0}")]
    Sink(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Pipeline task failed: {0}")]
    Task(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl QueryError {
    pub fn aborted(query_id: impl Into<String>, source: AbstractionError) -> Self {
        QueryError::Aborted {
            query_id: query_id.into(),
            source,
        }
    }
}

pub type QueryResult<T> = Result<T, QueryError>;

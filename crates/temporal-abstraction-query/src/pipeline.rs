//! Bounded producer/consumer query execution.
//!
//! A reader task pulls key batches from the [`DataSource`] into a bounded
//! queue, an executor task derives abstractions one key at a time, and a
//! writer task drains results into the [`ResultsSink`]. Any stage that stops
//! early raises the shared interrupt flag; the others see the flag or a
//! closed channel and wind down.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use temporal_abstraction::{AlgorithmSource, ErrorCategory, Executor, KeyResults, KnowledgeSource};

use crate::config::QueryConfig;
use crate::error::{QueryError, QueryResult};
use crate::sink::ResultsSink;
use crate::source::{DataSource, KeyBatch};

/// The propositions a caller wants derived, under one query id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub id: String,
    pub proposition_ids: Vec<String>,
}

impl Query {
    pub fn new<I, S>(proposition_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            proposition_ids: proposition_ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// Messages on the key batch queue.
#[derive(Debug)]
pub enum QueueItem {
    Batch(KeyBatch),
    /// No more batches follow.
    PoisonPill,
}

/// A key whose processing failed. Other keys are unaffected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyFailure {
    pub key_id: String,
    pub error: String,
}

/// Outcome of a query run that was not aborted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryReport {
    pub query_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub keys_processed: usize,
    pub failures: Vec<KeyFailure>,
    /// The run stopped before the data source was exhausted.
    pub interrupted: bool,
}

struct ConsumerOutcome {
    keys_processed: usize,
    failures: Vec<KeyFailure>,
    aborted: Option<QueryError>,
}

pub struct QueryPipeline {
    knowledge: Arc<dyn KnowledgeSource>,
    algorithms: Arc<dyn AlgorithmSource>,
    config: QueryConfig,
    interrupt: Arc<AtomicBool>,
}

impl QueryPipeline {
    pub fn new(
        knowledge: Arc<dyn KnowledgeSource>,
        algorithms: Arc<dyn AlgorithmSource>,
        config: QueryConfig,
    ) -> Self {
        Self {
            knowledge,
            algorithms,
            config,
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Flag that stops a running query once set. It stays set, so an
    /// interrupted pipeline runs no further keys.
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    pub fn interrupt(&self) {
        self.interrupt.store(true, Ordering::Relaxed);
    }

    /// Execute `query` over every key `source` yields. Returns the report and
    /// the sink once all three stages have stopped.
    pub async fn run<D, S>(&self, query: &Query, source: D, sink: S) -> QueryResult<(QueryReport, S)>
    where
        D: DataSource + 'static,
        S: ResultsSink + 'static,
    {
        self.config.validate()?;
        let started_at = Utc::now();
        let query_id = query.id.clone();

        let mut executor = Executor::new(
            Arc::clone(&self.knowledge),
            Arc::clone(&self.algorithms),
            self.config.executor_config(),
        );
        executor
            .build_rule_base(&query.proposition_ids)
            .map_err(|e| QueryError::aborted(&query_id, e))?;
        info!(
            "Query {query_id}: rule base ready for {} proposition(s)",
            query.proposition_ids.len()
        );

        let (batch_tx, batch_rx) = mpsc::channel::<QueueItem>(self.config.queue_capacity);
        let (result_tx, result_rx) = mpsc::channel::<KeyResults>(self.config.results_capacity);

        let producer = tokio::task::spawn_blocking({
            let interrupt = Arc::clone(&self.interrupt);
            move || produce(source, batch_tx, interrupt)
        });
        let consumer = tokio::task::spawn_blocking({
            let interrupt = Arc::clone(&self.interrupt);
            let query_id = query_id.clone();
            move || consume(&query_id, executor, batch_rx, result_tx, interrupt)
        });
        let writer = tokio::task::spawn_blocking({
            let interrupt = Arc::clone(&self.interrupt);
            move || write(sink, result_rx, interrupt)
        });

        let outcome = consumer.await.map_err(|e| QueryError::Task(e.to_string()))?;
        let written = writer.await.map_err(|e| QueryError::Task(e.to_string()))?;
        let produced = producer.await.map_err(|e| QueryError::Task(e.to_string()))?;

        if let Some(err) = outcome.aborted {
            return Err(err);
        }
        produced?;
        let sink = written?;

        let report = QueryReport {
            query_id,
            started_at,
            finished_at: Utc::now(),
            keys_processed: outcome.keys_processed,
            failures: outcome.failures,
            interrupted: self.interrupt.load(Ordering::Relaxed),
        };
        info!(
            "Query {}: {} key(s) processed, {} failed{}",
            report.query_id,
            report.keys_processed,
            report.failures.len(),
            if report.interrupted { ", interrupted" } else { "" }
        );
        Ok((report, sink))
    }
}

fn produce<D: DataSource>(
    mut source: D,
    tx: mpsc::Sender<QueueItem>,
    interrupt: Arc<AtomicBool>,
) -> QueryResult<()> {
    let result = loop {
        if interrupt.load(Ordering::Relaxed) {
            break Ok(());
        }
        match source.next_batch() {
            Ok(Some(batch)) => {
                debug!(key_id = %batch.key_id, facts = batch.propositions.len(), "queued key");
                if tx.blocking_send(QueueItem::Batch(batch)).is_err() {
                    interrupt.store(true, Ordering::Relaxed);
                    break Ok(());
                }
            }
            Ok(None) => break Ok(()),
            Err(e) => {
                warn!("Data source failed: {e}");
                interrupt.store(true, Ordering::Relaxed);
                break Err(e);
            }
        }
    };
    // The consumer may already be gone.
    let _ = tx.blocking_send(QueueItem::PoisonPill);
    result
}

fn consume(
    query_id: &str,
    mut executor: Executor,
    mut rx: mpsc::Receiver<QueueItem>,
    tx: mpsc::Sender<KeyResults>,
    interrupt: Arc<AtomicBool>,
) -> ConsumerOutcome {
    let mut outcome = ConsumerOutcome {
        keys_processed: 0,
        failures: Vec::new(),
        aborted: None,
    };
    while let Some(item) = rx.blocking_recv() {
        if interrupt.load(Ordering::Relaxed) {
            break;
        }
        let batch = match item {
            QueueItem::Batch(batch) => batch,
            QueueItem::PoisonPill => break,
        };
        match executor.process_key(&batch.key_id, batch.propositions) {
            Ok(results) => {
                outcome.keys_processed += 1;
                if tx.blocking_send(results).is_err() {
                    interrupt.store(true, Ordering::Relaxed);
                    break;
                }
            }
            Err(e) if e.category() == ErrorCategory::Read => {
                warn!("Query {query_id}: read failure on key {}: {e}", batch.key_id);
                interrupt.store(true, Ordering::Relaxed);
                outcome.aborted = Some(QueryError::aborted(query_id, e));
                break;
            }
            Err(e) => {
                warn!("Query {query_id}: key {} failed: {e}", batch.key_id);
                outcome.failures.push(KeyFailure {
                    key_id: batch.key_id,
                    error: e.to_string(),
                });
            }
        }
    }
    outcome
}

fn write<S: ResultsSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<KeyResults>,
    interrupt: Arc<AtomicBool>,
) -> QueryResult<S> {
    while let Some(results) = rx.blocking_recv() {
        if let Err(e) = sink.handle(results) {
            warn!("Results sink failed: {e}");
            interrupt.store(true, Ordering::Relaxed);
            return Err(e);
        }
    }
    sink.finish()?;
    Ok(sink)
}

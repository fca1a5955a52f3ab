//! Results sinks: where each key's derived facts go.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use temporal_abstraction::KeyResults;

use crate::error::{QueryError, QueryResult};

/// Receives results one key at a time, in processing order.
pub trait ResultsSink: Send {
    fn handle(&mut self, results: KeyResults) -> QueryResult<()>;

    /// Called once after the last key.
    fn finish(&mut self) -> QueryResult<()> {
        Ok(())
    }
}

/// Keeps every result in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    results: Vec<KeyResults>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> &[KeyResults] {
        &self.results
    }

    pub fn into_results(self) -> Vec<KeyResults> {
        self.results
    }
}

impl ResultsSink for CollectingSink {
    fn handle(&mut self, results: KeyResults) -> QueryResult<()> {
        self.results.push(results);
        Ok(())
    }
}

/// Writes one JSON object per key.
pub struct JsonLinesSink<W: Write + Send> {
    writer: W,
    written: usize,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonLinesSink<BufWriter<File>> {
    pub fn create(path: &Path) -> QueryResult<Self> {
        let file =
            File::create(path).map_err(|e| QueryError::Sink(format!("cannot create {}: {e}", path.display())))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write + Send> ResultsSink for JsonLinesSink<W> {
    fn handle(&mut self, results: KeyResults) -> QueryResult<()> {
        serde_json::to_writer(&mut self.writer, &results)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> QueryResult<()> {
        self.writer.flush()?;
        Ok(())
    }
}

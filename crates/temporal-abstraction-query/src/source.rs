//! Data sources: where a query's keys and their primitive facts come from.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use temporal_abstraction::Proposition;

use crate::error::{QueryError, QueryResult};

/// All input facts for one key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyBatch {
    pub key_id: String,
    #[serde(default)]
    pub propositions: Vec<Arc<Proposition>>,
}

impl KeyBatch {
    pub fn new(key_id: impl Into<String>, propositions: impl IntoIterator<Item = Arc<Proposition>>) -> Self {
        Self {
            key_id: key_id.into(),
            propositions: propositions.into_iter().collect(),
        }
    }
}

/// Yields one key at a time until exhausted.
pub trait DataSource: Send {
    fn next_batch(&mut self) -> QueryResult<Option<KeyBatch>>;
}

/// Batches held in memory.
#[derive(Debug, Default)]
pub struct VecDataSource {
    batches: VecDeque<KeyBatch>,
}

impl VecDataSource {
    pub fn new(batches: impl IntoIterator<Item = KeyBatch>) -> Self {
        Self {
            batches: batches.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.batches.len()
    }
}

impl DataSource for VecDataSource {
    fn next_batch(&mut self) -> QueryResult<Option<KeyBatch>> {
        Ok(self.batches.pop_front())
    }
}

/// One JSON-encoded [`KeyBatch`] per line. Blank lines are skipped.
pub struct JsonLinesDataSource<R> {
    lines: Lines<R>,
    line_no: usize,
}

impl<R: BufRead> JsonLinesDataSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
        }
    }
}

impl JsonLinesDataSource<BufReader<File>> {
    pub fn open(path: &Path) -> QueryResult<Self> {
        let file = File::open(path)
            .map_err(|e| QueryError::DataSource(format!("cannot open {}: {e}", path.display())))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead + Send> DataSource for JsonLinesDataSource<R> {
    fn next_batch(&mut self) -> QueryResult<Option<KeyBatch>> {
        for line in self.lines.by_ref() {
            self.line_no += 1;
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let batch = serde_json::from_str(&line)
                .map_err(|e| QueryError::DataSource(format!("line {}: {e}", self.line_no)))?;
            return Ok(Some(batch));
        }
        Ok(None)
    }
}
